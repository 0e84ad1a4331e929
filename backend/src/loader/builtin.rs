//! Built-in sample prices, used when no configured source yields data.

use crate::models::{CellValue, RawRow, RawTable, ShapeHint};

use super::{LoadedSource, SourceFormat};

/// Display name of the built-in source.
pub const BUILTIN_SOURCE: &str = "builtin:sample-prices";

const DATES: [&str; 5] = ["2024-01-15", "2024-03-15", "2024-06-15", "2024-09-15", "2024-12-15"];

/// Rupees per quintal (hundreds), one price per entry in [`DATES`].
const SAMPLE_PRICES: &[(&str, [f64; 5])] = &[
    ("Wheat", [21.50, 21.80, 22.90, 23.00, 24.00]),
    ("Rice", [34.00, 34.20, 35.50, 35.80, 37.00]),
    ("Potato", [17.00, 17.20, 19.00, 19.20, 21.00]),
    ("Sugarcane", [3.10, 3.12, 3.25, 3.28, 3.40]),
    ("Jowar", [28.00, 28.20, 29.50, 29.80, 31.00]),
    ("Maize", [20.50, 20.70, 21.60, 21.80, 22.80]),
    ("Barley", [23.00, 23.20, 24.20, 24.30, 25.30]),
    ("Soybean", [48.00, 48.20, 50.00, 50.20, 52.00]),
    ("Mustard", [52.00, 52.30, 53.80, 53.90, 55.20]),
    ("Gram", [41.00, 41.20, 42.40, 42.50, 43.80]),
];

/// The sample dataset as a single-series table.
pub fn sample_table() -> RawTable {
    let headers = vec!["Crop".to_string(), "Date".to_string(), "Price".to_string()];
    let mut table = RawTable::new("sample", headers);

    for (crop, prices) in SAMPLE_PRICES {
        for (date, price) in DATES.iter().zip(prices.iter()) {
            let row: RawRow = [
                ("Crop".to_string(), CellValue::Text(crop.to_string())),
                ("Date".to_string(), CellValue::Text(date.to_string())),
                ("Price".to_string(), CellValue::Number(*price)),
            ]
            .into_iter()
            .collect();
            table.rows.push(row);
        }
    }

    table
}

/// The sample dataset in loader form.
pub fn sample_source() -> LoadedSource {
    LoadedSource::from_tables(
        BUILTIN_SOURCE.to_string(),
        SourceFormat::Delimited,
        vec![sample_table()],
        ShapeHint::Auto,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_is_usable_single_series() {
        let source = sample_source();

        assert_eq!(source.usable_rows(), 50);
        assert!(source.dimensions.is_empty());
        assert!(source.notes.is_empty());
    }
}
