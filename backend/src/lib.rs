//! # Cropdash - crop price ingestion and market summaries
//!
//! Cropdash reads crop price spreadsheets (city-wise workbooks, wide or long
//! CSV files), normalizes them into `(crop, date, price, city)` records and
//! derives what the dashboard shows: a monthly price chart, per-crop change
//! statistics and a quick market overview.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ XLSX / CSV  │────▶│   Loader    │────▶│  Normalize  │────▶│  Aggregate  │
//! │ (file/URL)  │     │ (shape, cols)│    │ (records)   │     │ dedup, city │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    ▼
//!                                                   chart · summaries · overview
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cropdash::{DashboardConfig, DatasetOutcome, Pipeline, SourceCache, SummaryOrder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DashboardConfig::from_env();
//!     let mut cache = SourceCache::new();
//!     if let DatasetOutcome::Loaded(dataset) = Pipeline::from_config(&config).run(&mut cache).await? {
//!         let view = dataset.view(&dataset.resolve_filter("Pune"), SummaryOrder::ByName);
//!         println!("{} crops from {}", view.summaries.len(), view.source);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Layered error types
//! - [`models`] - Cells, tables, records, summaries, city filter
//! - [`parser`] - Delimited text and workbook decoding, cell parsing
//! - [`loader`] - Source fetching, column resolution, built-in sample
//! - [`transform`] - Normalization, averaging, summaries, chart, export, pipeline
//! - [`cache`] - Explicit source cache
//! - [`selection`] - Persisted city selection
//! - [`config`] - Environment configuration
//! - [`api`] - HTTP API server and log stream

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing and loading
pub mod loader;
pub mod parser;

// Transformation
pub mod transform;

// State
pub mod cache;
pub mod selection;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    LoadError, LoadResult, ParseError, PipelineError, PipelineResult, SelectionError, SelectionResult,
    ServerError, ServerResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    AggregatedRecord, CanonicalRecord, CellValue, DimensionFilter, EntitySummary, Observation, RawRow, RawTable,
    ShapeHint, SummaryOrder, ALL_DIMENSIONS,
};

// =============================================================================
// Re-exports - Parsing and loading
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_date, parse_delimited, parse_delimited_bytes,
    parse_number, parse_workbook,
};

pub use loader::{
    fetch_bytes, load_source, parse_source, resolve_column, ColumnMap, ColumnRole, LoadedSource, LoadedTable,
    NoteKind, SourceFormat, SourceLocator, TableNote,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    build_chart, classify, deduplicate, distinct_dimensions, export_csv, filter_by_dimension, highest_value,
    normalize, overall_average, summarize, top_gainer, top_loser, DashboardView, Dataset, DatasetOutcome,
    MarketOverview, MonthKey, Pipeline, PriceChart, Series, SourceStrategy, TableShape,
};

// =============================================================================
// Re-exports - State and config
// =============================================================================

pub use cache::SourceCache;
pub use config::DashboardConfig;
pub use selection::{FileSelectionStore, MemorySelectionStore, SelectionStore};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
