//! Column resolution: find the crop, date, price and city columns of a table.
//!
//! Resolution happens once per table. Exact aliases are tried first (case
//! sensitive, in order), then the first header matching a case-insensitive
//! keyword pattern.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const ENTITY_ALIASES: &[&str] = &["Crop", "crop", "Crop Name", "Crop_Name"];
const DATE_ALIASES: &[&str] = &["Date", "date", "Month", "month", "Date Recorded"];
const DIMENSION_ALIASES: &[&str] = &["City", "city", "Location", "location", "Market", "market"];
const VALUE_ALIASES: &[&str] = &["Price", "price", "Avg Price", "Average Price", "Rate", "Value"];

static ENTITY_PATTERN: Lazy<Regex> = Lazy::new(|| keyword_pattern("crop"));
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| keyword_pattern("date|month"));
static DIMENSION_PATTERN: Lazy<Regex> = Lazy::new(|| keyword_pattern("city|market|location"));
static VALUE_PATTERN: Lazy<Regex> = Lazy::new(|| keyword_pattern("price|rate|value"));

fn keyword_pattern(alternatives: &str) -> Regex {
    Regex::new(&format!("(?i){}", alternatives)).expect("Invalid embedded keyword pattern")
}

/// The semantic role a column can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Entity,
    Date,
    Dimension,
    Value,
}

impl ColumnRole {
    fn aliases(self) -> &'static [&'static str] {
        match self {
            ColumnRole::Entity => ENTITY_ALIASES,
            ColumnRole::Date => DATE_ALIASES,
            ColumnRole::Dimension => DIMENSION_ALIASES,
            ColumnRole::Value => VALUE_ALIASES,
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            ColumnRole::Entity => &ENTITY_PATTERN,
            ColumnRole::Date => &DATE_PATTERN,
            ColumnRole::Dimension => &DIMENSION_PATTERN,
            ColumnRole::Value => &VALUE_PATTERN,
        }
    }
}

/// Resolve one role against a header list.
pub fn resolve_column(headers: &[String], role: ColumnRole) -> Option<String> {
    role.aliases()
        .iter()
        .find(|alias| headers.iter().any(|h| h.as_str() == **alias))
        .map(|alias| alias.to_string())
        .or_else(|| {
            headers
                .iter()
                .find(|h| !h.is_empty() && role.pattern().is_match(h))
                .cloned()
        })
}

/// Resolved semantic columns of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMap {
    pub entity: Option<String>,
    pub date: Option<String>,
    pub dimension: Option<String>,
    pub value: Option<String>,
}

impl ColumnMap {
    pub fn resolve(headers: &[String]) -> Self {
        let entity = resolve_column(headers, ColumnRole::Entity);
        let date = resolve_column(headers, ColumnRole::Date);
        // A header already claimed by crop or date cannot also be the city or price.
        let claimed = |h: &String| Some(h) == entity.as_ref() || Some(h) == date.as_ref();
        let unclaimed: Vec<String> = headers.iter().filter(|h| !claimed(*h)).cloned().collect();

        Self {
            dimension: resolve_column(&unclaimed, ColumnRole::Dimension),
            value: resolve_column(&unclaimed, ColumnRole::Value),
            entity,
            date,
        }
    }

    /// Crop and date are both required for a table to be usable.
    pub fn is_usable(&self) -> bool {
        self.entity.is_some() && self.date.is_some()
    }

    /// Headers that are not the crop, date or city column.
    pub fn candidate_value_columns<'a>(&self, headers: &'a [String]) -> Vec<&'a String> {
        headers
            .iter()
            .filter(|h| !h.is_empty())
            .filter(|h| Some(*h) != self.entity.as_ref())
            .filter(|h| Some(*h) != self.date.as_ref())
            .filter(|h| Some(*h) != self.dimension.as_ref())
            .collect()
    }
}
