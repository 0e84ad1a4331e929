//! Persisted city selection.
//!
//! The selection is a plain string: a city name or [`ALL_DIMENSIONS`]. It is
//! stored as given and only checked against a dataset when a view is built
//! (see [`crate::transform::Dataset::resolve_filter`]).
//!
//! File layout (`<state dir>/selection.json`):
//!
//! ```json
//! { "selected": "ALL", "fallback": "Pune" }
//! ```
//!
//! `fallback` is the last concrete city chosen, kept while `ALL` is selected.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::logs::log_warning;
use crate::error::SelectionResult;
use crate::models::{DimensionFilter, ALL_DIMENSIONS};

/// Where the current city selection lives.
pub trait SelectionStore: Send + Sync {
    /// Current selector, `ALL` when nothing was stored.
    fn get_selected_dimension(&self) -> SelectionResult<String>;

    /// Store a selector. Concrete cities also become the fallback city.
    fn set_selected_dimension(&mut self, selected: &str) -> SelectionResult<()>;

    /// Last concrete city chosen, if any.
    fn fallback_dimension(&self) -> SelectionResult<Option<String>>;
}

/// Stored form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub selected: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            selected: ALL_DIMENSIONS.to_string(),
            fallback: None,
        }
    }
}

impl SelectionState {
    fn apply(&mut self, selected: &str) {
        let filter = DimensionFilter::parse(selected);
        if let DimensionFilter::Only(city) = &filter {
            self.fallback = Some(city.clone());
        }
        self.selected = filter.as_selector().to_string();
    }
}

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemorySelectionStore {
    state: SelectionState,
}

impl MemorySelectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStore for MemorySelectionStore {
    fn get_selected_dimension(&self) -> SelectionResult<String> {
        Ok(self.state.selected.clone())
    }

    fn set_selected_dimension(&mut self, selected: &str) -> SelectionResult<()> {
        self.state.apply(selected);
        Ok(())
    }

    fn fallback_dimension(&self) -> SelectionResult<Option<String>> {
        Ok(self.state.fallback.clone())
    }
}

// =============================================================================
// File store
// =============================================================================

/// JSON file in the state directory.
#[derive(Debug, Clone)]
pub struct FileSelectionStore {
    path: PathBuf,
}

impl FileSelectionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store inside `dir` as `selection.json`.
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("selection.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means defaults. A corrupt file is reported and ignored.
    fn read(&self) -> SelectionResult<SelectionState> {
        if !self.path.exists() {
            return Ok(SelectionState::default());
        }

        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<SelectionState>(&content) {
            Ok(state) => Ok(state),
            Err(e) => {
                log_warning(format!("Ignoring unreadable selection file {}: {}", self.path.display(), e));
                Ok(SelectionState::default())
            }
        }
    }

    fn write(&self, state: &SelectionState) -> SelectionResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl SelectionStore for FileSelectionStore {
    fn get_selected_dimension(&self) -> SelectionResult<String> {
        Ok(self.read()?.selected)
    }

    fn set_selected_dimension(&mut self, selected: &str) -> SelectionResult<()> {
        let mut state = self.read()?;
        state.apply(selected);
        self.write(&state)
    }

    fn fallback_dimension(&self) -> SelectionResult<Option<String>> {
        Ok(self.read()?.fallback)
    }
}
