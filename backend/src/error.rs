//! Error types for the Cropdash ingestion pipeline.
//!
//! Errors are layered the same way the pipeline is:
//!
//! - [`ParseError`] - delimited text or workbook could not be decoded
//! - [`LoadError`] - a source could not be fetched or parsed
//! - [`SelectionError`] - the persisted dimension selection could not be read or written
//! - [`PipelineError`] - top-level orchestration over several sources
//! - [`ServerError`] - HTTP layer
//!
//! Conversion is automatic via `From` implementations, so `?` works across
//! layer boundaries. Row-level problems (bad date, non-numeric price, blank
//! crop) are never errors: those rows are dropped during normalization.

use thiserror::Error;

// =============================================================================
// Parsing Errors
// =============================================================================

/// Errors while decoding a fetched payload into raw tables.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Workbook payload had no bytes at all.
    #[error("Source is empty")]
    Empty,

    /// Delimited text could not be read.
    #[error("Invalid delimited text: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet workbook could not be opened or read.
    #[error("Invalid workbook: {0}")]
    Workbook(#[from] calamine::Error),
}

// =============================================================================
// Loader Errors
// =============================================================================

/// Errors from the source loader.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Source could not be read or fetched.
    #[error("Source unavailable: {locator}: {reason}")]
    SourceUnavailable { locator: String, reason: String },

    /// Source was fetched but its payload is not a readable table.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl LoadError {
    pub fn unavailable(locator: impl Into<String>, reason: impl ToString) -> Self {
        LoadError::SourceUnavailable {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Selection Errors
// =============================================================================

/// Errors from the dimension selection store.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("Selection IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Selection JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// An empty dataset is not an error: see [`crate::transform::DatasetOutcome`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loader error for a single source.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// Every source strategy failed.
    #[error("All {} sources failed: {}", .0.len(), describe_failures(.0))]
    AllSourcesFailed(Vec<(String, LoadError)>),

    /// Selection store error.
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// No source strategies were given.
    #[error("No data sources configured")]
    NoSources,
}

fn describe_failures(failures: &[(String, LoadError)]) -> String {
    failures
        .iter()
        .map(|(source, err)| format!("{} ({})", source, err))
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for selection store operations.
pub type SelectionResult<T> = Result<T, SelectionError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let parse_err = ParseError::Empty;
        let load_err: LoadError = parse_err.into();
        assert!(load_err.to_string().contains("empty"));

        let pipeline_err: PipelineError = load_err.into();
        assert!(pipeline_err.to_string().contains("empty"));
    }

    #[test]
    fn test_all_sources_failed_lists_each_source() {
        let err = PipelineError::AllSourcesFailed(vec![
            ("prices.xlsx".into(), LoadError::unavailable("prices.xlsx", "not found")),
            ("crops.csv".into(), LoadError::unavailable("crops.csv", "permission denied")),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("All 2 sources failed"));
        assert!(msg.contains("prices.xlsx"));
        assert!(msg.contains("permission denied"));
    }
}
