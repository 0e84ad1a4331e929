//! Domain models for the Cropdash pipeline.
//!
//! - [`CellValue`] / [`RawRow`] / [`RawTable`] - untyped rows straight from a source
//! - [`CanonicalRecord`] - one `(crop, date, price, city?)` observation
//! - [`AggregatedRecord`] - mean of all observations sharing a key
//! - [`EntitySummary`] - latest/previous/change/average per crop
//! - [`DimensionFilter`] - one city, or the average across all of them
//! - [`Observation`] - read access shared by both record types
//! - [`ShapeHint`] - wide / long / auto table layout

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Raw rows
// =============================================================================

/// A single untyped cell as read from a sheet or delimited file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl CellValue {
    /// Build a cell from delimited text, where every value is a string.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Trimmed textual form, used for crop and city names.
    pub fn as_label(&self) -> Option<String> {
        let label = match self {
            CellValue::Empty => return None,
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        };
        if label.is_empty() {
            None
        } else {
            Some(label)
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// One row of a source table: column name to cell.
pub type RawRow = HashMap<String, CellValue>;

/// A named table (sheet or file) with its header order preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `column`, or `Empty` when the row is short.
    pub fn cell<'a>(row: &'a RawRow, column: &str) -> &'a CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        row.get(column).unwrap_or(EMPTY)
    }
}

/// Caller's expectation about a table's layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeHint {
    /// Decide per table from its columns.
    #[default]
    Auto,
    /// One column per city.
    Wide,
    /// Explicit city and price columns.
    Long,
}

impl std::str::FromStr for ShapeHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(ShapeHint::Auto),
            "wide" => Ok(ShapeHint::Wide),
            "long" => Ok(ShapeHint::Long),
            other => Err(format!("unknown shape '{}', expected auto, wide or long", other)),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// Read access shared by [`CanonicalRecord`] and [`AggregatedRecord`].
pub trait Observation {
    fn entity(&self) -> &str;
    fn timestamp(&self) -> NaiveDate;
    fn value(&self) -> f64;
    fn dimension(&self) -> Option<&str>;
}

/// A normalized observation: one crop price on one day, optionally in one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub entity: String,
    pub timestamp: NaiveDate,
    pub value: f64,
    pub dimension: Option<String>,
}

impl CanonicalRecord {
    /// Returns `None` if the invariants (non-empty entity, finite value) do not hold.
    pub fn new(
        entity: impl Into<String>,
        timestamp: NaiveDate,
        value: f64,
        dimension: Option<String>,
    ) -> Option<Self> {
        let entity = entity.into();
        if entity.trim().is_empty() || !value.is_finite() {
            return None;
        }
        Some(Self {
            entity,
            timestamp,
            value,
            dimension,
        })
    }
}

impl Observation for CanonicalRecord {
    fn entity(&self) -> &str {
        &self.entity
    }
    fn timestamp(&self) -> NaiveDate {
        self.timestamp
    }
    fn value(&self) -> f64 {
        self.value
    }
    fn dimension(&self) -> Option<&str> {
        self.dimension.as_deref()
    }
}

/// Mean of every record that shared its key, with the contributor count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedRecord {
    pub entity: String,
    pub timestamp: NaiveDate,
    pub value: f64,
    pub dimension: Option<String>,
    pub count: usize,
}

impl Observation for AggregatedRecord {
    fn entity(&self) -> &str {
        &self.entity
    }
    fn timestamp(&self) -> NaiveDate {
        self.timestamp
    }
    fn value(&self) -> f64 {
        self.value
    }
    fn dimension(&self) -> Option<&str> {
        self.dimension.as_deref()
    }
}

impl From<CanonicalRecord> for AggregatedRecord {
    fn from(record: CanonicalRecord) -> Self {
        Self {
            entity: record.entity,
            timestamp: record.timestamp,
            value: record.value,
            dimension: record.dimension,
            count: 1,
        }
    }
}

// =============================================================================
// Summaries
// =============================================================================

/// Latest-value card for one crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub entity: String,
    pub latest_value: f64,
    /// `None` when the crop has a single observation.
    pub previous_value: Option<f64>,
    pub absolute_change: f64,
    pub percent_change: f64,
    pub running_average: f64,
    pub latest_timestamp: NaiveDate,
    pub observations: usize,
}

/// Output order of [`crate::transform::summarize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryOrder {
    /// Lexicographic by crop name (codepoint order).
    #[default]
    ByName,
    /// Gainers first, ties kept in name order.
    ByPercentChangeDesc,
}

impl std::str::FromStr for SummaryOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(SummaryOrder::ByName),
            "change" => Ok(SummaryOrder::ByPercentChangeDesc),
            other => Err(format!("unknown order '{}', expected name or change", other)),
        }
    }
}

// =============================================================================
// Dimension filter
// =============================================================================

/// Selector value meaning "average across every city".
pub const ALL_DIMENSIONS: &str = "ALL";

/// Restrict records to one city, or collapse all cities into their mean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DimensionFilter {
    #[default]
    All,
    Only(String),
}

impl DimensionFilter {
    /// Parse a persisted selector value. Blank, `ALL` and the legacy `__ALL__`
    /// mean [`DimensionFilter::All`]; matching is exact, so a market named
    /// `All` stays selectable.
    pub fn parse(selected: &str) -> Self {
        let trimmed = selected.trim();
        if trimmed.is_empty() || trimmed == ALL_DIMENSIONS || trimmed == "__ALL__" {
            DimensionFilter::All
        } else {
            DimensionFilter::Only(trimmed.to_string())
        }
    }

    pub fn as_selector(&self) -> &str {
        match self {
            DimensionFilter::All => ALL_DIMENSIONS,
            DimensionFilter::Only(city) => city,
        }
    }
}

impl fmt::Display for DimensionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_selector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_record_rejects_blank_entity_and_nan() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert!(CanonicalRecord::new("  ", day, 1.0, None).is_none());
        assert!(CanonicalRecord::new("Wheat", day, f64::NAN, None).is_none());
        assert!(CanonicalRecord::new("Wheat", day, f64::INFINITY, None).is_none());
        assert!(CanonicalRecord::new("Wheat", day, 21.5, None).is_some());
    }

    #[test]
    fn test_dimension_filter_parse() {
        assert_eq!(DimensionFilter::parse("ALL"), DimensionFilter::All);
        assert_eq!(DimensionFilter::parse("All"), DimensionFilter::Only("All".into()));
        assert_eq!(DimensionFilter::parse("all"), DimensionFilter::Only("all".into()));
        assert_eq!(DimensionFilter::parse("__ALL__"), DimensionFilter::All);
        assert_eq!(DimensionFilter::parse(""), DimensionFilter::All);
        assert_eq!(
            DimensionFilter::parse(" Pune "),
            DimensionFilter::Only("Pune".into())
        );
    }

    #[test]
    fn test_cell_label_trims() {
        assert_eq!(CellValue::from_text("  Rice ").as_label(), Some("Rice".into()));
        assert_eq!(CellValue::from_text("   "), CellValue::Empty);
        assert!(CellValue::Empty.as_label().is_none());
    }
}
