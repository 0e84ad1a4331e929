//! Averaging passes over canonical records.
//!
//! Two independent stages, always applied in this order:
//!
//! 1. [`deduplicate`] collapses repeated `(crop, day, city)` observations.
//! 2. [`filter_by_dimension`] either keeps one city or, for `ALL`, averages
//!    across cities per `(crop, day)`.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::models::{AggregatedRecord, DimensionFilter, Observation};

/// Running sum for one group, remembering first-seen order.
struct Accumulator {
    entity: String,
    timestamp: NaiveDate,
    dimension: Option<String>,
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn finish(self) -> AggregatedRecord {
        AggregatedRecord {
            value: self.sum / self.count as f64,
            entity: self.entity,
            timestamp: self.timestamp,
            dimension: self.dimension,
            count: self.count,
        }
    }
}

/// Group by key and average `value`; every input counts once.
///
/// Output keeps the order in which keys were first seen.
fn average_by<R, K, F>(records: &[R], key_of: F, keep_dimension: bool) -> Vec<AggregatedRecord>
where
    R: Observation,
    K: std::hash::Hash + Eq,
    F: Fn(&R) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<Accumulator> = Vec::new();

    for record in records {
        let key = key_of(record);
        match index.get(&key) {
            Some(&i) => {
                groups[i].sum += record.value();
                groups[i].count += 1;
            }
            None => {
                index.insert(key, groups.len());
                groups.push(Accumulator {
                    entity: record.entity().to_string(),
                    timestamp: record.timestamp(),
                    dimension: if keep_dimension {
                        record.dimension().map(str::to_string)
                    } else {
                        None
                    },
                    sum: record.value(),
                    count: 1,
                });
            }
        }
    }

    groups.into_iter().map(Accumulator::finish).collect()
}

/// Collapse records sharing `(crop, day, city)` into their mean.
///
/// Records without a city form their own group per `(crop, day)`.
pub fn deduplicate<R: Observation>(records: &[R]) -> Vec<AggregatedRecord> {
    average_by(
        records,
        |r| (r.entity().to_string(), r.timestamp(), r.dimension().map(str::to_string)),
        true,
    )
}

/// Keep one city, or average across all cities per `(crop, day)`.
///
/// City comparison is an exact string match. For [`DimensionFilter::All`]
/// the output has no city and `count` is the number of contributing records.
pub fn filter_by_dimension<R>(records: &[R], filter: &DimensionFilter) -> Vec<AggregatedRecord>
where
    R: Observation + Clone + Into<AggregatedRecord>,
{
    match filter {
        DimensionFilter::Only(city) => records
            .iter()
            .filter(|r| r.dimension() == Some(city.as_str()))
            .cloned()
            .map(Into::into)
            .collect(),
        DimensionFilter::All => average_by(records, |r| (r.entity().to_string(), r.timestamp()), false),
    }
}

/// Sorted distinct city names present in the records.
pub fn distinct_dimensions<R: Observation>(records: &[R]) -> Vec<String> {
    let set: std::collections::BTreeSet<&str> = records.iter().filter_map(|r| r.dimension()).collect();
    set.into_iter().map(str::to_string).collect()
}
