//! Monthly chart series for the price trend chart.

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::models::Observation;

const MONTH_ABBR: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Short axis label, e.g. `Jan`.
    pub fn short_label(&self) -> &'static str {
        MONTH_ABBR[(self.month as usize + 11) % 12]
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.short_label(), self.year)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{:04}-{:02}", self.year, self.month))
    }
}

/// One line on the chart. `None` marks a month with no observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

/// Axis months plus one series per crop, aligned index by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceChart {
    pub months: Vec<MonthKey>,
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

impl PriceChart {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Build the chart from records.
///
/// Months are every distinct month in the data, ascending. A crop's value in a
/// month is its last observation of that month. Crops appear in the order they
/// first show up when records are sorted by `(date, crop)`.
pub fn build_chart<R: Observation>(records: &[R]) -> PriceChart {
    let mut sorted: Vec<&R> = records.iter().collect();
    sorted.sort_by(|a, b| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| a.entity().cmp(b.entity()))
    });

    let months: Vec<MonthKey> = sorted
        .iter()
        .map(|r| MonthKey::of(r.timestamp()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let month_index: HashMap<MonthKey, usize> = months.iter().enumerate().map(|(i, m)| (*m, i)).collect();

    let mut order: Vec<&str> = Vec::new();
    let mut values: HashMap<&str, Vec<Option<f64>>> = HashMap::new();
    for record in &sorted {
        let entity = record.entity();
        let slots = values.entry(entity).or_insert_with(|| {
            order.push(entity);
            vec![None; months.len()]
        });
        if let Some(&i) = month_index.get(&MonthKey::of(record.timestamp())) {
            slots[i] = Some(record.value());
        }
    }

    let series = order
        .into_iter()
        .map(|entity| Series {
            label: entity.to_string(),
            values: values.remove(entity).unwrap_or_default(),
        })
        .collect();

    PriceChart {
        labels: months.iter().map(|m| m.short_label().to_string()).collect(),
        months,
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalRecord;

    fn rec(entity: &str, y: i32, m: u32, d: u32, value: f64) -> CanonicalRecord {
        CanonicalRecord::new(entity, NaiveDate::from_ymd_opt(y, m, d).unwrap(), value, None).unwrap()
    }

    #[test]
    fn test_months_span_whole_dataset_with_gaps() {
        let records = vec![
            rec("Wheat", 2024, 1, 15, 21.5),
            rec("Wheat", 2024, 3, 15, 21.8),
            rec("Rice", 2024, 3, 15, 34.2),
            rec("Rice", 2024, 6, 15, 35.5),
        ];
        let chart = build_chart(&records);

        assert_eq!(chart.labels, vec!["Jan", "Mar", "Jun"]);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].label, "Wheat");
        assert_eq!(chart.series[0].values, vec![Some(21.5), Some(21.8), None]);
        assert_eq!(chart.series[1].label, "Rice");
        assert_eq!(chart.series[1].values, vec![None, Some(34.2), Some(35.5)]);
    }

    #[test]
    fn test_last_observation_in_month_wins() {
        let records = vec![rec("Gram", 2024, 5, 20, 42.0), rec("Gram", 2024, 5, 2, 41.0)];
        let chart = build_chart(&records);

        assert_eq!(chart.series[0].values, vec![Some(42.0)]);
    }

    #[test]
    fn test_months_across_years_are_chronological() {
        let records = vec![rec("Maize", 2025, 1, 1, 22.0), rec("Maize", 2024, 12, 1, 21.0)];
        let chart = build_chart(&records);

        assert_eq!(chart.months[0].to_string(), "Dec 2024");
        assert_eq!(chart.months[1].to_string(), "Jan 2025");
        assert_eq!(serde_json::to_value(&chart.months).unwrap(), serde_json::json!(["2024-12", "2025-01"]));
    }

    #[test]
    fn test_empty_chart() {
        let chart = build_chart::<CanonicalRecord>(&[]);
        assert!(chart.is_empty());
        assert!(chart.months.is_empty());
    }
}
