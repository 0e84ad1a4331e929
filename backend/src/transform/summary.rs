//! Per-crop latest-value summaries and the market overview built from them.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{EntitySummary, Observation, SummaryOrder};

/// One summary per distinct crop.
///
/// Each crop's records are sorted by date (stably, so same-day records keep
/// input order); the last is the latest value, the one before it the
/// previous value. Change and percent change are zero without a previous
/// value, and percent change is zero when the previous value is zero.
pub fn summarize<R: Observation>(records: &[R], order: SummaryOrder) -> Vec<EntitySummary> {
    let mut by_entity: BTreeMap<&str, Vec<&R>> = BTreeMap::new();
    for record in records {
        by_entity.entry(record.entity()).or_default().push(record);
    }

    let mut summaries: Vec<EntitySummary> = by_entity
        .into_iter()
        .filter_map(|(entity, mut rows)| {
            rows.sort_by_key(|r| r.timestamp());
            summarize_entity(entity, &rows)
        })
        .collect();

    if order == SummaryOrder::ByPercentChangeDesc {
        summaries.sort_by(|a, b| b.percent_change.total_cmp(&a.percent_change));
    }

    summaries
}

fn summarize_entity<R: Observation>(entity: &str, sorted: &[&R]) -> Option<EntitySummary> {
    let last = sorted.last()?;
    let previous_value = sorted.len().checked_sub(2).map(|i| sorted[i].value());

    let latest_value = last.value();
    let absolute_change = previous_value.map_or(0.0, |prev| latest_value - prev);
    let percent_change = match previous_value {
        Some(prev) if prev != 0.0 => absolute_change / prev * 100.0,
        _ => 0.0,
    };
    let running_average = sorted.iter().map(|r| r.value()).sum::<f64>() / sorted.len() as f64;

    Some(EntitySummary {
        entity: entity.to_string(),
        latest_value,
        previous_value,
        absolute_change,
        percent_change,
        running_average,
        latest_timestamp: last.timestamp(),
        observations: sorted.len(),
    })
}

// =============================================================================
// Ranking helpers
// =============================================================================
//
// Ties go to the first summary encountered, so callers get a deterministic
// pick from name-ordered input.

fn first_best<F>(summaries: &[EntitySummary], better: F) -> Option<&EntitySummary>
where
    F: Fn(&EntitySummary, &EntitySummary) -> bool,
{
    let mut iter = summaries.iter();
    let first = iter.next()?;
    Some(iter.fold(first, |best, candidate| if better(candidate, best) { candidate } else { best }))
}

/// Crop with the largest percent change.
pub fn top_gainer(summaries: &[EntitySummary]) -> Option<&EntitySummary> {
    first_best(summaries, |c, best| c.percent_change > best.percent_change)
}

/// Crop with the smallest percent change.
pub fn top_loser(summaries: &[EntitySummary]) -> Option<&EntitySummary> {
    first_best(summaries, |c, best| c.percent_change < best.percent_change)
}

/// Crop with the highest latest value.
pub fn highest_value(summaries: &[EntitySummary]) -> Option<&EntitySummary> {
    first_best(summaries, |c, best| c.latest_value > best.latest_value)
}

/// Mean of every crop's latest value.
pub fn overall_average(summaries: &[EntitySummary]) -> Option<f64> {
    if summaries.is_empty() {
        return None;
    }
    Some(summaries.iter().map(|s| s.latest_value).sum::<f64>() / summaries.len() as f64)
}

/// The quick market analysis card.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOverview {
    pub top_gainer: Option<EntitySummary>,
    pub top_loser: Option<EntitySummary>,
    pub highest_value: Option<EntitySummary>,
    pub overall_average: Option<f64>,
}

impl MarketOverview {
    pub fn from_summaries(summaries: &[EntitySummary]) -> Self {
        Self {
            top_gainer: top_gainer(summaries).cloned(),
            top_loser: top_loser(summaries).cloned(),
            highest_value: highest_value(summaries).cloned(),
            overall_average: overall_average(summaries),
        }
    }
}
