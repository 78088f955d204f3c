//! Artifact persistence.
//!
//! Artifacts are the actual synchronized records, one JSON file per unit
//! under `<base>/data/<namespace>/`. Writes go through a temp file and a
//! rename so a concurrent reader of the same key never observes a
//! half-written artifact. There is no versioning: each write fully replaces
//! the previous artifact, and leftover timestamped snapshots from older
//! collector generations are actively swept.

use crate::error::{ErrorKind, Result};
use crate::fs::write_atomic;
use crate::key::{UnitKey, validated_namespace};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Canonical-path artifact store for a collector namespace.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (and create if needed) the artifact directory for a namespace.
    pub fn open(base: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let root = base.as_ref().join("data").join(validated_namespace(namespace)?);
        std::fs::create_dir_all(&root).map_err(ErrorKind::Io)?;
        Ok(Self { root })
    }

    /// Absolute path of the artifact for a unit.
    pub fn artifact_path(&self, key: &UnitKey) -> PathBuf {
        self.root.join(key.relative_path("json"))
    }

    /// Persist the record for a unit, replacing any previous artifact.
    ///
    /// Returns the artifact's absolute path and the number of bytes written,
    /// which is what the hash sidecar records as `size_bytes`.
    pub async fn write(&self, key: &UnitKey, record: &Value) -> Result<(PathBuf, u64)> {
        let path = self.artifact_path(key);
        let bytes = serde_json::to_vec_pretty(record).map_err(ErrorKind::Encode)?;
        write_atomic(&path, &bytes).await.map_err(ErrorKind::Io)?;
        Ok((path, bytes.len() as u64))
    }

    /// Read the artifact for a unit.
    ///
    /// # Errors
    /// Returns [`NotFound`](ErrorKind::NotFound) if the unit has never been
    /// persisted, [`Corrupt`](ErrorKind::Corrupt) if the file doesn't parse.
    pub async fn read(&self, key: &UnitKey) -> Result<Value> {
        let path = self.artifact_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                exn::bail!(ErrorKind::NotFound(path));
            },
            Err(e) => return Err(ErrorKind::Io(e).into()),
        };
        serde_json::from_slice(&bytes).map_err(|_| exn::Exn::from(ErrorKind::Corrupt(path)))
    }

    /// Remove leftover timestamped snapshots (`<stem>_*.json`) next to a
    /// unit's canonical artifact. Returns the number removed.
    ///
    /// Earlier collector generations wrote a new timestamped file per run;
    /// the canonical layout keeps exactly one file per unit, so anything
    /// matching the old pattern is unbounded growth waiting to happen.
    pub async fn sweep_snapshots(&self, key: &UnitKey) -> Result<usize> {
        let canonical = self.artifact_path(key);
        let Some((dir, stem)) = canonical.parent().zip(canonical.file_stem()) else {
            return Ok(0);
        };
        let prefix = format!("{}_", stem.to_string_lossy());
        let mut removed = 0;
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(ErrorKind::Io(e).into()),
        };
        while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name.ends_with(".json") {
                fs::remove_file(entry.path()).await.map_err(ErrorKind::Io)?;
                tracing::info!(path = %entry.path().display(), "removed stale artifact snapshot");
                removed += 1;
            }
        }
        Ok(removed)
    }
}
