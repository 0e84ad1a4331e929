//! High-level pipeline: try sources in order until one yields prices.
//!
//! ```text
//! strategies ──▶ SourceCache::load ──▶ normalize tables ──▶ deduplicate ──▶ Dataset
//!     │ error or zero records                                               │
//!     └──────────────────────────── next strategy                           ▼
//!                                                       view(filter) ──▶ DashboardView
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cropdash::{Pipeline, SourceCache, DatasetOutcome, DimensionFilter, SummaryOrder};
//!
//! let pipeline = Pipeline::from_config(&config);
//! let mut cache = SourceCache::new();
//! if let DatasetOutcome::Loaded(dataset) = pipeline.run(&mut cache).await? {
//!     let view = dataset.view(&DimensionFilter::All, SummaryOrder::ByName);
//!     println!("{} crops", view.summaries.len());
//! }
//! ```

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::cache::SourceCache;
use crate::config::DashboardConfig;
use crate::error::{LoadError, PipelineError, PipelineResult};
use crate::loader::builtin::{sample_source, BUILTIN_SOURCE};
use crate::loader::{LoadedSource, SourceLocator, TableNote};
use crate::models::{AggregatedRecord, CanonicalRecord, DimensionFilter, EntitySummary, ShapeHint, SummaryOrder, ALL_DIMENSIONS};

use super::aggregate::{deduplicate, distinct_dimensions, filter_by_dimension};
use super::normalize::normalize_with_shape;
use super::series::{build_chart, PriceChart};
use super::summary::{summarize, MarketOverview};

// =============================================================================
// Strategies
// =============================================================================

/// One way of obtaining price data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStrategy {
    /// A workbook or delimited file, local or remote.
    Source { locator: SourceLocator, hint: ShapeHint },
    /// The embedded sample prices.
    Builtin,
}

impl SourceStrategy {
    pub fn source(locator: impl Into<SourceLocator>) -> Self {
        SourceStrategy::Source {
            locator: locator.into(),
            hint: ShapeHint::Auto,
        }
    }
}

impl fmt::Display for SourceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStrategy::Source { locator, .. } => write!(f, "{}", locator),
            SourceStrategy::Builtin => f.write_str(BUILTIN_SOURCE),
        }
    }
}

/// Ordered source strategies.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub strategies: Vec<SourceStrategy>,
    pub timeout: Duration,
}

impl Pipeline {
    pub fn new(strategies: Vec<SourceStrategy>, timeout: Duration) -> Self {
        Self { strategies, timeout }
    }

    /// Workbook, then CSV, then (if enabled) the built-in sample.
    pub fn from_config(config: &DashboardConfig) -> Self {
        let mut strategies = vec![
            SourceStrategy::source(config.workbook.as_str()),
            SourceStrategy::source(config.csv.as_str()),
        ];
        if config.builtin_fallback {
            strategies.push(SourceStrategy::Builtin);
        }
        Self::new(strategies, config.fetch_timeout)
    }

    /// Explicit sources from the command line, with the configured fallback tail.
    pub fn from_sources(sources: &[String], hint: ShapeHint, config: &DashboardConfig) -> Self {
        if sources.is_empty() {
            return Self::from_config(config);
        }

        let mut strategies: Vec<SourceStrategy> = sources
            .iter()
            .map(|s| SourceStrategy::Source {
                locator: SourceLocator::parse(s),
                hint,
            })
            .collect();
        if config.builtin_fallback {
            strategies.push(SourceStrategy::Builtin);
        }
        Self::new(strategies, config.fetch_timeout)
    }

    /// Try each strategy in order.
    ///
    /// Errors and empty results fall through to the next strategy. The first
    /// strategy producing at least one record wins. When nothing produced
    /// records, the outcome is [`DatasetOutcome::Empty`] if any strategy
    /// loaded at all, otherwise [`PipelineError::AllSourcesFailed`].
    pub async fn run(&self, cache: &mut SourceCache) -> PipelineResult<DatasetOutcome> {
        if self.strategies.is_empty() {
            return Err(PipelineError::NoSources);
        }

        let mut failures: Vec<(String, LoadError)> = Vec::new();
        let mut last_empty: Option<String> = None;

        for (i, strategy) in self.strategies.iter().enumerate() {
            log_info(format!("Trying source {}/{}: {}", i + 1, self.strategies.len(), strategy));

            let loaded = match strategy {
                SourceStrategy::Source { locator, hint } => match cache.load(locator, *hint, self.timeout).await {
                    Ok(loaded) => loaded,
                    Err(e) => {
                        log_error(format!("{}: {}", strategy, e));
                        failures.push((strategy.to_string(), e));
                        continue;
                    }
                },
                SourceStrategy::Builtin => std::sync::Arc::new(sample_source()),
            };

            let dataset = Dataset::from_source(&loaded);
            if dataset.records.is_empty() {
                log_warning(format!("{} yielded no usable prices", strategy));
                last_empty = Some(loaded.source.clone());
                continue;
            }

            log_success(format!(
                "Using {}: {} record(s), {} crop(s), {} cit{}",
                dataset.source,
                dataset.records.len(),
                dataset.entity_count(),
                dataset.dimensions.len(),
                if dataset.dimensions.len() == 1 { "y" } else { "ies" }
            ));
            return Ok(DatasetOutcome::Loaded(dataset));
        }

        match last_empty {
            Some(source) => {
                log_warning("No source yielded prices");
                Ok(DatasetOutcome::Empty { source })
            }
            None => Err(PipelineError::AllSourcesFailed(failures)),
        }
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Result of a pipeline run. An empty dataset is a valid state, not an error.
#[derive(Debug, Clone)]
pub enum DatasetOutcome {
    Loaded(Dataset),
    Empty { source: String },
}

impl DatasetOutcome {
    pub fn dataset(&self) -> Option<&Dataset> {
        match self {
            DatasetOutcome::Loaded(dataset) => Some(dataset),
            DatasetOutcome::Empty { .. } => None,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            DatasetOutcome::Loaded(dataset) => &dataset.source,
            DatasetOutcome::Empty { source } => source,
        }
    }
}

/// De-duplicated records from the winning source.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub source: String,
    pub records: Vec<AggregatedRecord>,
    /// Sorted distinct cities.
    pub dimensions: Vec<String>,
    pub notes: Vec<TableNote>,
}

impl Dataset {
    /// Normalize every usable table of a source and de-duplicate the result.
    pub fn from_source(loaded: &LoadedSource) -> Self {
        let records = deduplicate(&canonical_records(loaded));
        Self {
            source: loaded.source.clone(),
            dimensions: distinct_dimensions(&records),
            records,
            notes: loaded.notes.clone(),
        }
    }

    pub fn entity_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.entity.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    /// Map a stored selection onto this dataset. Unknown cities become `ALL`.
    pub fn resolve_filter(&self, selected: &str) -> DimensionFilter {
        match DimensionFilter::parse(selected) {
            DimensionFilter::Only(city) if self.dimensions.iter().any(|d| *d == city) => DimensionFilter::Only(city),
            DimensionFilter::Only(city) => {
                log_warning(format!("City '{}' not in {}, showing {}", city, self.source, ALL_DIMENSIONS));
                DimensionFilter::All
            }
            DimensionFilter::All => DimensionFilter::All,
        }
    }

    /// Everything the dashboard shows for one filter.
    pub fn view(&self, filter: &DimensionFilter, order: SummaryOrder) -> DashboardView {
        let filtered = filter_by_dimension(&self.records, filter);
        let summaries = summarize(&filtered, order);

        DashboardView {
            source: self.source.clone(),
            city: filter.as_selector().to_string(),
            dimensions: self.dimensions.clone(),
            chart: build_chart(&filtered),
            overview: MarketOverview::from_summaries(&summaries),
            summaries,
        }
    }
}

/// Canonical records from every table that has a shape.
pub fn canonical_records(loaded: &LoadedSource) -> Vec<CanonicalRecord> {
    loaded
        .tables
        .values()
        .filter_map(|t| t.shape.as_ref().map(|shape| normalize_with_shape(&t.table, &t.columns, shape)))
        .flatten()
        .collect()
}

/// Chart, table and quick analysis for one city selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub source: String,
    pub city: String,
    pub dimensions: Vec<String>,
    pub chart: PriceChart,
    pub summaries: Vec<EntitySummary>,
    pub overview: MarketOverview,
}
