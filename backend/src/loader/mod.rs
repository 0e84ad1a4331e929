//! Source loader: fetch a workbook or delimited file and expose its tables.
//!
//! ```text
//! locator ──fetch──▶ bytes ──parse──▶ RawTable per sheet ──resolve──▶ ColumnMap + TableShape
//!                                                                  └─▶ dimensions, notes
//! ```
//!
//! A table without crop or date columns is skipped with a note; it never
//! fails the whole load. A source that parses to zero rows is a valid,
//! empty [`LoadedSource`].

pub mod builtin;
pub mod columns;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{LoadError, LoadResult};
use crate::models::{RawTable, ShapeHint};
use crate::parser::{is_workbook_bytes, parse_delimited_bytes, parse_workbook};
use crate::transform::normalize::{classify, TableShape};

pub use columns::{resolve_column, ColumnMap, ColumnRole};

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

// =============================================================================
// Locator and format
// =============================================================================

/// Where a source lives. Its display form is the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceLocator {
    Path(PathBuf),
    Url(String),
}

impl SourceLocator {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            SourceLocator::Url(trimmed.to_string())
        } else {
            SourceLocator::Path(PathBuf::from(trimmed))
        }
    }

    /// Last path segment without extension, used to name delimited tables.
    pub fn stem(&self) -> String {
        let name = match self {
            SourceLocator::Path(p) => p.file_stem().and_then(|s| s.to_str()).map(str::to_string),
            SourceLocator::Url(u) => u
                .split(['?', '#'])
                .next()
                .and_then(|s| s.rsplit('/').next())
                .and_then(|last| Path::new(last).file_stem())
                .and_then(|s| s.to_str())
                .map(str::to_string),
        };
        name.filter(|s| !s.is_empty()).unwrap_or_else(|| "data".to_string())
    }

    fn extension(&self) -> Option<String> {
        let path = match self {
            SourceLocator::Path(p) => p.clone(),
            SourceLocator::Url(u) => PathBuf::from(u.split(['?', '#']).next().unwrap_or(u)),
        };
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::Path(p) => write!(f, "{}", p.display()),
            SourceLocator::Url(u) => f.write_str(u),
        }
    }
}

impl From<&str> for SourceLocator {
    fn from(raw: &str) -> Self {
        SourceLocator::parse(raw)
    }
}

/// Payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Delimited,
    Workbook,
}

impl SourceFormat {
    /// Extension first, then magic bytes.
    pub fn detect(locator: &SourceLocator, bytes: &[u8]) -> Self {
        match locator.extension() {
            Some(ext) if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) => SourceFormat::Workbook,
            _ if is_workbook_bytes(bytes) => SourceFormat::Workbook,
            _ => SourceFormat::Delimited,
        }
    }
}

// =============================================================================
// Load result
// =============================================================================

/// Why a table contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    /// No usable crop/date/price layout.
    UnsupportedShape,
    /// Table has a header but no rows.
    EmptyTable,
}

/// Diagnostic attached to a skipped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableNote {
    pub table: String,
    pub kind: NoteKind,
    pub message: String,
}

impl fmt::Display for TableNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.table, self.message)
    }
}

/// A usable table with its resolved layout.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedTable {
    pub table: RawTable,
    pub columns: ColumnMap,
    pub shape: Option<TableShape>,
}

impl LoadedTable {
    pub fn row_count(&self) -> usize {
        self.table.rows.len()
    }
}

/// Everything the loader learned about one source.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedSource {
    pub source: String,
    pub format: SourceFormat,
    /// Sheet or file name to table. Skipped tables are present with no shape.
    pub tables: BTreeMap<String, LoadedTable>,
    pub dimensions: BTreeSet<String>,
    pub notes: Vec<TableNote>,
}

impl LoadedSource {
    /// Build from parsed tables, resolving columns and shape per table.
    pub fn from_tables(source: String, format: SourceFormat, tables: Vec<RawTable>, hint: ShapeHint) -> Self {
        let mut loaded = LoadedSource {
            source,
            format,
            tables: BTreeMap::new(),
            dimensions: BTreeSet::new(),
            notes: Vec::new(),
        };

        for table in tables {
            let columns = ColumnMap::resolve(&table.headers);
            let shape = if table.is_empty() {
                loaded.note(&table.name, NoteKind::EmptyTable, "no data rows");
                None
            } else {
                match classify(&table, &columns, hint) {
                    Ok(shape) => {
                        loaded.dimensions.extend(shape.dimensions(&table, &columns));
                        Some(shape)
                    }
                    Err(reason) => {
                        loaded.note(&table.name, NoteKind::UnsupportedShape, reason);
                        None
                    }
                }
            };

            loaded.tables.insert(table.name.clone(), LoadedTable { table, columns, shape });
        }

        loaded
    }

    fn note(&mut self, table: &str, kind: NoteKind, message: impl Into<String>) {
        let note = TableNote {
            table: table.to_string(),
            kind,
            message: message.into(),
        };
        log_warning(format!("Skipping table {}", note));
        self.notes.push(note);
    }

    /// Total raw rows across usable tables.
    pub fn usable_rows(&self) -> usize {
        self.tables
            .values()
            .filter(|t| t.shape.is_some())
            .map(LoadedTable::row_count)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.usable_rows() == 0
    }
}

// =============================================================================
// Fetching
// =============================================================================

/// Read a local file or download a URL.
pub async fn fetch_bytes(locator: &SourceLocator, timeout: Duration) -> LoadResult<Vec<u8>> {
    match locator {
        SourceLocator::Path(path) => tokio::fs::read(path)
            .await
            .map_err(|e| LoadError::unavailable(locator.to_string(), e)),
        SourceLocator::Url(url) => {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| LoadError::unavailable(url.clone(), e))?;

            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| LoadError::unavailable(url.clone(), e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::unavailable(url.clone(), format!("HTTP {}", status)));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| LoadError::unavailable(url.clone(), e))?;
            Ok(body.to_vec())
        }
    }
}

/// Parse an already-fetched payload.
pub fn parse_source(locator: &SourceLocator, bytes: &[u8], hint: ShapeHint) -> LoadResult<LoadedSource> {
    let format = SourceFormat::detect(locator, bytes);
    let tables = match format {
        SourceFormat::Workbook => parse_workbook(bytes)?,
        SourceFormat::Delimited => {
            let parsed = parse_delimited_bytes(&locator.stem(), bytes)?;
            log_info(format!(
                "Detected encoding {} and delimiter '{}'",
                parsed.encoding,
                display_delimiter(parsed.delimiter)
            ));
            vec![parsed.table]
        }
    };

    Ok(LoadedSource::from_tables(locator.to_string(), format, tables, hint))
}

/// Fetch and parse one source.
pub async fn load_source(locator: &SourceLocator, hint: ShapeHint, timeout: Duration) -> LoadResult<LoadedSource> {
    log_info(format!("Loading {}", locator));
    let bytes = fetch_bytes(locator, timeout).await?;
    let loaded = parse_source(locator, &bytes, hint)?;

    log_success(format!(
        "{} table(s), {} usable row(s), {} cit{}",
        loaded.tables.len(),
        loaded.usable_rows(),
        loaded.dimensions.len(),
        if loaded.dimensions.len() == 1 { "y" } else { "ies" }
    ));
    Ok(loaded)
}

fn display_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_locator_parse() {
        assert_eq!(
            SourceLocator::parse("https://example.org/data/prices.xlsx?v=2"),
            SourceLocator::Url("https://example.org/data/prices.xlsx?v=2".into())
        );
        assert_eq!(SourceLocator::parse("crops.csv"), SourceLocator::Path("crops.csv".into()));
    }

    #[test]
    fn test_locator_stem() {
        assert_eq!(SourceLocator::parse("/tmp/crops.csv").stem(), "crops");
        assert_eq!(SourceLocator::parse("https://example.org/a/prices.csv?x=1").stem(), "prices");
        assert_eq!(SourceLocator::parse("https://example.org/").stem(), "data");
    }

    #[test]
    fn test_format_detection() {
        let xlsx = SourceLocator::parse("book.XLSX");
        assert_eq!(SourceFormat::detect(&xlsx, b""), SourceFormat::Workbook);

        let unknown = SourceLocator::parse("https://example.org/export");
        assert_eq!(SourceFormat::detect(&unknown, b"PK\x03\x04...."), SourceFormat::Workbook);
        assert_eq!(SourceFormat::detect(&unknown, b"Crop,Date,Price"), SourceFormat::Delimited);
    }

    #[test]
    fn test_parse_source_collects_dimensions() {
        let locator = SourceLocator::parse("wide.csv");
        let csv = b"Crop,Date,Mumbai,Delhi\nWheat,2024-01-15,20,22\n";
        let loaded = parse_source(&locator, csv, ShapeHint::Auto).unwrap();

        assert_eq!(loaded.format, SourceFormat::Delimited);
        assert!(loaded.tables.contains_key("wide"));
        let dims: Vec<&str> = loaded.dimensions.iter().map(String::as_str).collect();
        assert_eq!(dims, vec!["Delhi", "Mumbai"]);
        assert!(loaded.notes.is_empty());
    }

    #[test]
    fn test_unusable_table_is_noted_not_fatal() {
        let locator = SourceLocator::parse("weather.csv");
        let csv = b"City,Temperature\nPune,31\n";
        let loaded = parse_source(&locator, csv, ShapeHint::Auto).unwrap();

        assert_eq!(loaded.notes.len(), 1);
        assert_eq!(loaded.notes[0].kind, NoteKind::UnsupportedShape);
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_header_only_source_is_empty_not_error() {
        let locator = SourceLocator::parse("crops.csv");
        let loaded = parse_source(&locator, b"Crop,Date,Price\n", ShapeHint::Auto).unwrap();

        assert!(loaded.is_empty());
        assert_eq!(loaded.notes[0].kind, NoteKind::EmptyTable);
    }

    #[test]
    fn test_blank_source_is_empty_not_error() {
        for bytes in [&b""[..], &b"\n\n"[..], &b"   \r\n"[..]] {
            let loaded = parse_source(&SourceLocator::parse("crops.csv"), bytes, ShapeHint::Auto).unwrap();

            assert!(loaded.is_empty());
            assert!(loaded.dimensions.is_empty());
            assert_eq!(loaded.notes.len(), 1);
            assert_eq!(loaded.notes[0].kind, NoteKind::EmptyTable);
        }
    }

    #[test]
    fn test_dimensions_only_from_usable_rows() {
        let csv = b"Crop,Date,City,Price\nWheat,2024-01-15,Pune,21.5\nWheat,someday,Thane,22\n";
        let loaded = parse_source(&SourceLocator::parse("crops.csv"), csv, ShapeHint::Auto).unwrap();

        let dims: Vec<&str> = loaded.dimensions.iter().map(String::as_str).collect();
        assert_eq!(dims, vec!["Pune"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let dir = tempdir().unwrap();
        let locator = SourceLocator::Path(dir.path().join("missing.csv"));
        let err = load_source(&locator, ShapeHint::Auto, Duration::from_secs(1)).await.unwrap_err();

        assert!(matches!(err, LoadError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_load_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crops.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Crop,Date,Price,City").unwrap();
        writeln!(file, "Wheat,2024-01-15,21.5,Pune").unwrap();
        writeln!(file, "Rice,2024-01-15,34,Thane").unwrap();

        let loaded = load_source(&SourceLocator::Path(path), ShapeHint::Auto, Duration::from_secs(1)).await.unwrap();
        assert_eq!(loaded.usable_rows(), 2);
        assert_eq!(loaded.dimensions.len(), 2);
    }
}
