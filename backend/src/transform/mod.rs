//! Transformation module.
//!
//! Everything between loaded tables and what the dashboard displays:
//! - Normalize: raw rows to canonical records, per table shape
//! - Aggregate: de-duplication and the city filter / `ALL` average
//! - Summary: per-crop change statistics and the market overview
//! - Series: monthly chart series
//! - Export: normalized CSV
//! - Pipeline: ordered source fallback producing a [`Dataset`]

pub mod aggregate;
pub mod export;
pub mod normalize;
pub mod pipeline;
pub mod series;
pub mod summary;

pub use aggregate::{deduplicate, distinct_dimensions, filter_by_dimension};
pub use export::export_csv;
pub use normalize::{classify, normalize, normalize_with_shape, TableShape};
pub use pipeline::*;
pub use series::{build_chart, MonthKey, PriceChart, Series};
pub use summary::{highest_value, overall_average, summarize, top_gainer, top_loser, MarketOverview};
