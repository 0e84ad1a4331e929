//! Normalized CSV export (`Crop,Date,Price[,City]`).

use std::io::Write;

use crate::models::Observation;

/// Write records as CSV sorted by `(crop, date, city)`.
///
/// The `City` column is only written when at least one record has a city.
/// Returns the number of data rows written.
pub fn export_csv<R: Observation, W: Write>(records: &[R], writer: W) -> Result<usize, csv::Error> {
    let mut sorted: Vec<&R> = records.iter().collect();
    sorted.sort_by(|a, b| {
        a.entity()
            .cmp(b.entity())
            .then_with(|| a.timestamp().cmp(&b.timestamp()))
            .then_with(|| a.dimension().cmp(&b.dimension()))
    });

    let with_city = sorted.iter().any(|r| r.dimension().is_some());
    let mut out = csv::Writer::from_writer(writer);

    if with_city {
        out.write_record(["Crop", "Date", "Price", "City"])?;
    } else {
        out.write_record(["Crop", "Date", "Price"])?;
    }

    for record in &sorted {
        let date = record.timestamp().format("%Y-%m-%d").to_string();
        let price = format_price(record.value());
        if with_city {
            out.write_record([record.entity(), date.as_str(), price.as_str(), record.dimension().unwrap_or("")])?;
        } else {
            out.write_record([record.entity(), date.as_str(), price.as_str()])?;
        }
    }

    out.flush()?;
    Ok(sorted.len())
}

/// Prices keep up to four decimals, without trailing zeros.
fn format_price(value: f64) -> String {
    let fixed = format!("{:.4}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "-" || trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
