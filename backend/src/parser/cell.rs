//! Cell coercion: calendar dates and finite numbers.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::models::CellValue;

/// Largest serial a spreadsheet can hold (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Day-first and ISO layouts tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Layouts without a day; the first of the month is assumed.
const MONTH_FORMATS: &[&str] = &["%Y-%m", "%Y/%m", "%b %Y", "%B %Y", "%b-%Y", "%m/%Y"];

/// Convert a spreadsheet date serial (days since 1899-12-30) to a date.
///
/// The fractional part (time of day) is discarded.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Parse a date cell, truncated to day precision.
pub fn parse_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::Empty => None,
        CellValue::Date(d) => Some(*d),
        CellValue::Number(n) => excel_serial_to_date(*n),
        CellValue::Text(s) => parse_date_str(s),
    }
}

fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(serial) = s.parse::<f64>() {
        return excel_serial_to_date(serial);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    for fmt in MONTH_FORMATS {
        let with_day = format!("01 {}", s);
        let fmt_with_day = format!("%d {}", fmt);
        if let Ok(d) = NaiveDate::parse_from_str(&with_day, &fmt_with_day) {
            return Some(d);
        }
    }

    None
}

/// Parse a numeric cell. Empty cells and non-finite values are not numbers.
pub fn parse_number(cell: &CellValue) -> Option<f64> {
    let value = match cell {
        CellValue::Number(n) => *n,
        CellValue::Text(s) => s.trim().parse::<f64>().ok()?,
        CellValue::Empty | CellValue::Date(_) => return None,
    };
    value.is_finite().then_some(value)
}
