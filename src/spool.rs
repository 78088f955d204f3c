//! Spool-backed fetching.
//!
//! Some pipelines don't hit an API directly: an upstream step (HAR
//! extraction, a scheduled download) drops raw JSON records into a spool
//! directory, one file per unit, and the sync engine ingests from there.
//! The relative path of each file is its unit key — `TEX/MLB.json` is the
//! unit `("TEX", "MLB")` — so spooled data flows through exactly the same
//! hash-gated pipeline as live fetches.

use async_trait::async_trait;
use dugout_engine::{FetchError, FetchResult, Fetcher};
use dugout_store::UnitKey;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Fetcher that reads records from a local spool directory.
#[derive(Debug, Clone)]
pub struct SpoolFetcher {
    root: PathBuf,
}

impl SpoolFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Enumerate every unit present in the spool, sorted for stable runs.
    ///
    /// Files that don't end in `.json` or whose paths don't form a valid
    /// unit key are ignored with a warning rather than failing discovery.
    pub fn discover_units(&self) -> std::io::Result<Vec<UnitKey>> {
        let mut units = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(current) = stack.pop() {
            let entries = match std::fs::read_dir(&current) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if path.extension().is_none_or(|ext| ext != "json") {
                    continue;
                }
                match self.unit_for(&path) {
                    Some(key) => units.push(key),
                    None => {
                        tracing::warn!(path = %path.display(), "spool file does not map to a unit key, ignoring");
                    },
                }
            }
        }
        units.sort_by(|a, b| a.segments().cmp(b.segments()));
        Ok(units)
    }

    fn unit_for(&self, path: &Path) -> Option<UnitKey> {
        let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
        let segments: Option<Vec<&str>> = relative.iter().map(|s| s.to_str()).collect();
        UnitKey::new(segments?).ok()
    }

    fn path_for(&self, key: &UnitKey) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.segments() {
            path.push(segment);
        }
        path.set_extension("json");
        path
    }
}

#[async_trait]
impl Fetcher for SpoolFetcher {
    type Record = Value;

    async fn fetch(&self, key: &UnitKey) -> FetchResult<Option<Value>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            // The upstream producer has nothing for this unit.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FetchError::transient(format!("{}: {e}", path.display()))),
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            // A truncated or non-JSON spool file won't fix itself.
            Err(e) => Err(FetchError::permanent(format!("{}: {e}", path.display()))),
        }
    }

    fn summary(&self, record: &Value) -> Option<String> {
        // The conventional record shape carries its unit payload in a
        // top-level array (players, games, splits...).
        let (name, items) = record.as_object()?.iter().find_map(|(k, v)| Some((k, v.as_array()?)))?;
        Some(format!("{name}={}", items.len()))
    }
}
