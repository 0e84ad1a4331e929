//! Raw rows to canonical `(crop, date, price, city?)` records.
//!
//! # Table shapes
//!
//! ```text
//! Long                          Wide                          Single series
//! Crop  Date   City   Price     Crop  Date   Mumbai  Delhi    Crop  Date   Price
//! Wheat 01-15  Pune   20        Wheat 01-15  20      22       Wheat 01-15  21.5
//!   -> one record per row         -> one record per city       -> one record per row,
//!      city = City cell              column, city = header        no city
//! ```
//!
//! Rows missing a crop, a parseable date or a finite price are dropped.

use std::collections::BTreeSet;

use crate::loader::columns::ColumnMap;
use crate::models::{CanonicalRecord, RawRow, RawTable, ShapeHint};
use crate::parser::{parse_date, parse_number};

/// How a table's rows map onto records.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TableShape {
    Long { dimension: String, value: String },
    Wide { value_columns: Vec<String> },
    SingleSeries { value: String },
}

impl TableShape {
    /// City names this table contributes, counting only rows that normalize.
    pub fn dimensions(&self, table: &RawTable, columns: &ColumnMap) -> BTreeSet<String> {
        match self {
            TableShape::SingleSeries { .. } => BTreeSet::new(),
            _ => normalize_with_shape(table, columns, self)
                .into_iter()
                .filter_map(|record| record.dimension)
                .collect(),
        }
    }
}

/// Decide the shape of a table, or explain why it cannot be used.
pub fn classify(table: &RawTable, columns: &ColumnMap, hint: ShapeHint) -> Result<TableShape, String> {
    if !columns.is_usable() {
        return Err(format!(
            "missing {} column",
            match (&columns.entity, &columns.date) {
                (None, None) => "crop and date",
                (None, Some(_)) => "crop",
                _ => "date",
            }
        ));
    }

    if hint != ShapeHint::Wide {
        if let (Some(dimension), Some(value)) = (&columns.dimension, &columns.value) {
            return Ok(TableShape::Long {
                dimension: dimension.clone(),
                value: value.clone(),
            });
        }
        if hint == ShapeHint::Long {
            return Err("long layout needs both a city and a price column".to_string());
        }
    }

    let numeric: Vec<String> = columns
        .candidate_value_columns(&table.headers)
        .into_iter()
        .filter(|col| table.rows.iter().any(|row| parse_number(RawTable::cell(row, col)).is_some()))
        .cloned()
        .collect();

    if hint == ShapeHint::Auto {
        if let Some(value) = &columns.value {
            let only_value = numeric.is_empty() || (numeric.len() == 1 && &numeric[0] == value);
            if only_value {
                return Ok(TableShape::SingleSeries { value: value.clone() });
            }
        }
    }

    if !numeric.is_empty() {
        return Ok(TableShape::Wide { value_columns: numeric });
    }

    match (&columns.value, hint) {
        (Some(value), ShapeHint::Auto) => Ok(TableShape::SingleSeries { value: value.clone() }),
        _ => Err("no numeric price columns".to_string()),
    }
}

/// Normalize a table, deciding its shape from the columns.
///
/// Returns no records when the table is unusable.
pub fn normalize(table: &RawTable, columns: &ColumnMap) -> Vec<CanonicalRecord> {
    match classify(table, columns, ShapeHint::Auto) {
        Ok(shape) => normalize_with_shape(table, columns, &shape),
        Err(_) => Vec::new(),
    }
}

/// Normalize a table whose shape was already decided.
pub fn normalize_with_shape(table: &RawTable, columns: &ColumnMap, shape: &TableShape) -> Vec<CanonicalRecord> {
    let (Some(entity_col), Some(date_col)) = (&columns.entity, &columns.date) else {
        return Vec::new();
    };

    let mut records = Vec::new();
    for row in &table.rows {
        let Some((entity, date)) = row_key(row, entity_col, date_col) else {
            continue;
        };

        match shape {
            TableShape::Long { dimension, value } => {
                let Some(city) = RawTable::cell(row, dimension).as_label() else {
                    continue;
                };
                if let Some(record) = parse_number(RawTable::cell(row, value))
                    .and_then(|price| CanonicalRecord::new(entity, date, price, Some(city)))
                {
                    records.push(record);
                }
            }
            TableShape::Wide { value_columns } => {
                for column in value_columns {
                    if let Some(record) = parse_number(RawTable::cell(row, column))
                        .and_then(|price| CanonicalRecord::new(entity.clone(), date, price, Some(column.clone())))
                    {
                        records.push(record);
                    }
                }
            }
            TableShape::SingleSeries { value } => {
                if let Some(record) = parse_number(RawTable::cell(row, value))
                    .and_then(|price| CanonicalRecord::new(entity, date, price, None))
                {
                    records.push(record);
                }
            }
        }
    }

    records
}

fn row_key(row: &RawRow, entity_col: &str, date_col: &str) -> Option<(String, chrono::NaiveDate)> {
    let entity = RawTable::cell(row, entity_col).as_label()?;
    let date = parse_date(RawTable::cell(row, date_col))?;
    Some((entity, date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use chrono::NaiveDate;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        let mut t = RawTable::new("test", headers.iter().map(|h| h.to_string()).collect());
        for values in rows {
            let row: RawRow = headers
                .iter()
                .zip(values.iter())
                .map(|(h, v)| (h.to_string(), CellValue::from_text(v)))
                .collect();
            t.rows.push(row);
        }
        t
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_wide_shape_emits_one_record_per_city_column() {
        let t = table(&["Crop", "Date", "Mumbai", "Delhi"], &[&["Wheat", "2024-01-15", "20", "22"]]);
        let columns = ColumnMap::resolve(&t.headers);

        assert_eq!(
            classify(&t, &columns, ShapeHint::Auto).unwrap(),
            TableShape::Wide { value_columns: vec!["Mumbai".into(), "Delhi".into()] }
        );

        let records = normalize(&t, &columns);
        assert_eq!(
            records,
            vec![
                CanonicalRecord::new("Wheat", day(2024, 1, 15), 20.0, Some("Mumbai".into())).unwrap(),
                CanonicalRecord::new("Wheat", day(2024, 1, 15), 22.0, Some("Delhi".into())).unwrap(),
            ]
        );
    }

    #[test]
    fn test_long_shape_uses_city_cell_and_drops_blank_city() {
        let t = table(
            &["Crop", "Date", "City", "Price"],
            &[
                &["Rice", "2024-02-01", " Pune ", "34"],
                &["Rice", "2024-02-01", "", "35"],
                &["Rice", "2024-02-01", "Nashik", "36"],
            ],
        );
        let columns = ColumnMap::resolve(&t.headers);
        let records = normalize(&t, &columns);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dimension.as_deref(), Some("Pune"));
        assert_eq!(records[1].dimension.as_deref(), Some("Nashik"));
    }

    #[test]
    fn test_single_series_shape_has_no_city() {
        let t = table(&["Crop", "Date", "Price"], &[&["Potato", "2024-03-15", "17.2"]]);
        let columns = ColumnMap::resolve(&t.headers);

        assert_eq!(
            classify(&t, &columns, ShapeHint::Auto).unwrap(),
            TableShape::SingleSeries { value: "Price".into() }
        );
        let records = normalize(&t, &columns);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dimension, None);
        assert_eq!(records[0].value, 17.2);
    }

    #[test]
    fn test_malformed_rows_dropped() {
        let t = table(
            &["Crop", "Date", "Price"],
            &[
                &["Maize", "2024-01-15", "20.5"],
                &["Maize", "2024-03-15", "n/a"],
                &["Maize", "someday", "21"],
                &["", "2024-06-15", "21.6"],
                &["Maize", "2024-09-15", ""],
            ],
        );
        let records = normalize(&t, &ColumnMap::resolve(&t.headers));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, 20.5);
    }

    #[test]
    fn test_unusable_table_yields_nothing() {
        let t = table(&["Date", "Mumbai"], &[&["2024-01-15", "20"]]);
        let columns = ColumnMap::resolve(&t.headers);

        let reason = classify(&t, &columns, ShapeHint::Auto).unwrap_err();
        assert!(reason.contains("crop"));
        assert!(normalize(&t, &columns).is_empty());
    }

    #[test]
    fn test_long_hint_without_city_column_is_rejected() {
        let t = table(&["Crop", "Date", "Price"], &[&["Wheat", "2024-01-15", "20"]]);
        let columns = ColumnMap::resolve(&t.headers);
        assert!(classify(&t, &columns, ShapeHint::Long).is_err());
    }

    #[test]
    fn test_wide_hint_treats_price_column_as_a_city() {
        let t = table(&["Crop", "Date", "City", "Price"], &[&["Wheat", "2024-01-15", "Pune", "20"]]);
        let columns = ColumnMap::resolve(&t.headers);
        assert_eq!(
            classify(&t, &columns, ShapeHint::Wide).unwrap(),
            TableShape::Wide { value_columns: vec!["Price".into()] }
        );
    }

    #[test]
    fn test_dimensions_of_shapes() {
        let t = table(
            &["Crop", "Date", "Market", "Rate"],
            &[&["Gram", "2024-01-15", "Pune", "41"], &["Gram", "2024-01-15", "Thane", "42"]],
        );
        let columns = ColumnMap::resolve(&t.headers);
        let shape = classify(&t, &columns, ShapeHint::Auto).unwrap();
        let dims: Vec<String> = shape.dimensions(&t, &columns).into_iter().collect();
        assert_eq!(dims, vec!["Pune".to_string(), "Thane".to_string()]);
    }

    #[test]
    fn test_dimensions_skip_rows_that_are_dropped() {
        let t = table(
            &["Crop", "Date", "Market", "Rate"],
            &[
                &["Gram", "2024-01-15", "Pune", "41"],
                &["Gram", "not a date", "Thane", "42"],
                &["Gram", "2024-01-15", "Nashik", "n/a"],
                &["", "2024-01-15", "Satara", "40"],
            ],
        );
        let columns = ColumnMap::resolve(&t.headers);
        let shape = classify(&t, &columns, ShapeHint::Auto).unwrap();
        let dims: Vec<String> = shape.dimensions(&t, &columns).into_iter().collect();
        assert_eq!(dims, vec!["Pune".to_string()]);

        let wide = table(&["Crop", "Date", "Mumbai", "Delhi"], &[&["Wheat", "2024-01-15", "20", ""]]);
        let wide_columns = ColumnMap::resolve(&wide.headers);
        let wide_shape = classify(&wide, &wide_columns, ShapeHint::Auto).unwrap();
        let wide_dims: Vec<String> = wide_shape.dimensions(&wide, &wide_columns).into_iter().collect();
        assert_eq!(wide_dims, vec!["Mumbai".to_string()]);
    }
}
