//! Source cache - reuse loaded sources until explicitly invalidated.
//!
//! The cache is an ordinary value owned by the caller (the CLI run or the
//! server state). Entries never expire on their own; call
//! [`SourceCache::invalidate`] or [`SourceCache::clear`] to force a re-fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::api::logs::log_info;
use crate::error::LoadResult;
use crate::loader::{load_source, LoadedSource, SourceLocator};
use crate::models::ShapeHint;

/// Cache key: the same file read with a different layout hint is a different entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    locator: String,
    hint: ShapeHint,
}

/// Loaded sources keyed by locator.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: HashMap<CacheKey, Arc<LoadedSource>>,
    hits: u64,
    misses: u64,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for `locator`, if any.
    pub fn get(&self, locator: &SourceLocator, hint: ShapeHint) -> Option<Arc<LoadedSource>> {
        self.entries.get(&Self::key(locator, hint)).cloned()
    }

    /// Return the cached source or load it. Failed loads are not cached.
    pub async fn load(
        &mut self,
        locator: &SourceLocator,
        hint: ShapeHint,
        timeout: Duration,
    ) -> LoadResult<Arc<LoadedSource>> {
        let key = Self::key(locator, hint);
        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            log_info(format!("Using cached {}", locator));
            return Ok(Arc::clone(hit));
        }

        self.misses += 1;
        let loaded = Arc::new(load_source(locator, hint, timeout).await?);
        self.entries.insert(key, Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Store a result loaded elsewhere.
    pub fn insert(&mut self, locator: &SourceLocator, hint: ShapeHint, loaded: LoadedSource) -> Arc<LoadedSource> {
        let loaded = Arc::new(loaded);
        self.entries.insert(Self::key(locator, hint), Arc::clone(&loaded));
        loaded
    }

    /// Drop every entry for `locator`, whatever hint it was loaded with.
    ///
    /// Returns true if something was removed.
    pub fn invalidate(&mut self, locator: &SourceLocator) -> bool {
        let target = locator.to_string();
        let before = self.entries.len();
        self.entries.retain(|key, _| key.locator != target);
        self.entries.len() != before
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            log_info(format!("Clearing {} cached source(s)", self.entries.len()));
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(hits, misses)` since creation.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    fn key(locator: &SourceLocator, hint: ShapeHint) -> CacheKey {
        CacheKey {
            locator: locator.to_string(),
            hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_second_load_does_not_refetch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crops.csv");
        std::fs::write(&path, "Crop,Date,Price\nWheat,2024-01-15,21.5\n").unwrap();
        let locator = SourceLocator::Path(path.clone());

        let mut cache = SourceCache::new();
        let first = cache.load(&locator, ShapeHint::Auto, TIMEOUT).await.unwrap();

        // Removing the file proves the second call is served from memory.
        std::fs::remove_file(&path).unwrap();
        let second = cache.load(&locator, ShapeHint::Auto, TIMEOUT).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), (1, 1));
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("crops.csv");
        std::fs::write(&path, "Crop,Date,Price\nWheat,2024-01-15,21.5\n").unwrap();
        let locator = SourceLocator::Path(path.clone());

        let mut cache = SourceCache::new();
        cache.load(&locator, ShapeHint::Auto, TIMEOUT).await.unwrap();

        std::fs::write(&path, "Crop,Date,Price\nWheat,2024-01-15,21.5\nRice,2024-01-15,34\n").unwrap();
        assert_eq!(cache.load(&locator, ShapeHint::Auto, TIMEOUT).await.unwrap().usable_rows(), 1);

        assert!(cache.invalidate(&locator));
        assert!(!cache.invalidate(&locator));
        assert_eq!(cache.load(&locator, ShapeHint::Auto, TIMEOUT).await.unwrap().usable_rows(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let dir = tempdir().unwrap();
        let locator = SourceLocator::Path(dir.path().join("later.csv"));

        let mut cache = SourceCache::new();
        assert!(cache.load(&locator, ShapeHint::Auto, TIMEOUT).await.is_err());
        assert!(cache.is_empty());

        std::fs::write(dir.path().join("later.csv"), "Crop,Date,Price\nGram,2024-01-15,41\n").unwrap();
        assert!(cache.load(&locator, ShapeHint::Auto, TIMEOUT).await.is_ok());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut cache = SourceCache::new();
        cache.insert(&SourceLocator::parse("a.csv"), ShapeHint::Auto, crate::loader::builtin::sample_source());
        cache.insert(&SourceLocator::parse("a.csv"), ShapeHint::Wide, crate::loader::builtin::sample_source());
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
