//! Hash sidecar persistence.
//!
//! Each sync unit gets one small JSON sidecar under
//! `<base>/hash/<namespace>/` recording the content hash of the last
//! artifact written for it, plus enough bookkeeping to report collection
//! status without re-reading artifacts. The sidecars are an optimization
//! cache, not the source of truth: losing one only costs a re-fetch on the
//! next run, so reads are deliberately forgiving and only writes propagate
//! errors.

use crate::error::{ErrorKind, Result};
use crate::fs::write_atomic;
use crate::key::{UnitKey, validated_namespace};
use async_stream::stream;
use futures::{Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;
use tokio::fs;

type HashRecordStream<'a> = Pin<Box<dyn Stream<Item = Result<HashRecord>> + Send + 'a>>;

/// Persisted bookkeeping for one sync unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashRecord {
    /// Key of the unit this record belongs to.
    pub unit_key: UnitKey,
    /// Full content hash of the last persisted artifact (volatile fields
    /// excluded). Reason strings truncate this for display; the sidecar
    /// never does.
    pub content_hash: String,
    /// When the hash was computed.
    #[serde(with = "time::serde::rfc3339")]
    pub computed_at: OffsetDateTime,
    /// Size of the artifact as written, in bytes.
    pub size_bytes: u64,
    /// Where the artifact lives.
    pub artifact_path: PathBuf,
    /// Freeform caller-supplied digest of the record (e.g. `players=12`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl HashRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        unit_key: UnitKey,
        content_hash: impl Into<String>,
        size_bytes: u64,
        artifact_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            unit_key,
            content_hash: content_hash.into(),
            computed_at: OffsetDateTime::now_utc(),
            size_bytes,
            artifact_path: artifact_path.into(),
            summary: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// One-sidecar-per-unit hash store for a collector namespace.
///
/// Sidecar paths are derived from unit keys (one directory level per key
/// segment), so distinct keys never contend on the same file.
#[derive(Debug, Clone)]
pub struct HashStore {
    root: PathBuf,
}

impl HashStore {
    /// Open (and create if needed) the hash directory for a namespace.
    ///
    /// # Errors
    /// Returns [`InvalidKey`](ErrorKind::InvalidKey) for a namespace that
    /// can't be a directory name, or the underlying I/O error if the
    /// directory tree cannot be created.
    pub fn open(base: impl AsRef<Path>, namespace: &str) -> Result<Self> {
        let root = base.as_ref().join("hash").join(validated_namespace(namespace)?);
        // Non-async: this happens once per collector at startup and isn't
        // worth an async constructor.
        std::fs::create_dir_all(&root).map_err(ErrorKind::Io)?;
        Ok(Self { root })
    }

    /// Absolute path of the sidecar for a unit.
    pub fn sidecar_path(&self, key: &UnitKey) -> PathBuf {
        self.root.join(key.relative_path("json"))
    }

    /// Load the sidecar for a unit, or `None` if there is no usable prior
    /// record.
    ///
    /// A missing file is the normal first-run case. A corrupt or unreadable
    /// file is downgraded to `None` with a warning: a broken cache entry
    /// must trigger a re-fetch, never block the unit.
    pub async fn load(&self, key: &UnitKey) -> Option<HashRecord> {
        let path = self.sidecar_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key = %key, path = %path.display(), error = %e, "unreadable hash file, treating as no prior record");
                return None;
            },
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %key, path = %path.display(), error = %e, "corrupt hash file, treating as no prior record");
                None
            },
        }
    }

    /// Write (fully replacing) the sidecar for a unit.
    ///
    /// Unlike [`load`](Self::load), failures here propagate: the caller
    /// decides whether a lost sidecar is worth more than a warning.
    pub async fn save(&self, record: &HashRecord) -> Result<()> {
        let path = self.sidecar_path(&record.unit_key);
        let bytes = serde_json::to_vec_pretty(record).map_err(ErrorKind::Encode)?;
        write_atomic(&path, &bytes).await.map_err(ErrorKind::Io)?;
        Ok(())
    }

    /// Stream every parseable sidecar under this namespace.
    ///
    /// Malformed sidecars are skipped with a warning; they'll be rewritten
    /// by the next sync of their unit. I/O errors on the walk itself are
    /// yielded so status reporting can distinguish "empty" from "broken".
    pub fn list_stream(&self) -> HashRecordStream<'_> {
        let mut stack = vec![self.root.clone()];
        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // A namespace that was never synced has no directory;
                    // that's an empty listing, not an error.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => {
                        yield Err(exn::Exn::from(ErrorKind::Io(e)));
                        continue 'dirs;
                    },
                };
                loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break,
                        Err(e) => {
                            yield Err(exn::Exn::from(ErrorKind::Io(e)));
                            continue;
                        },
                    };
                    let path = entry.path();
                    if path.is_dir() {
                        stack.push(path);
                        continue;
                    }
                    if path.extension().is_none_or(|ext| ext != "json") {
                        continue;
                    }
                    match read_sidecar(&path).await {
                        Ok(record) => yield Ok(record),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping malformed hash file");
                        },
                    }
                }
            }
        })
    }

    /// Collect [`list_stream`](Self::list_stream) into a `Vec`.
    pub async fn list(&self) -> Result<Vec<HashRecord>> {
        self.list_stream().try_collect().await
    }

    /// Delete sidecars whose file modification time is older than
    /// `max_age`. Returns the number removed.
    ///
    /// This is periodic maintenance, never run implicitly during a sync.
    pub async fn purge_older_than(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut stack = vec![self.root.clone()];
        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ErrorKind::Io(e).into()),
            };
            while let Some(entry) = entries.next_entry().await.map_err(ErrorKind::Io)? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let modified = entry.metadata().await.map_err(ErrorKind::Io)?.modified().map_err(ErrorKind::Io)?;
                let age = now.duration_since(modified).unwrap_or_default();
                if age > max_age {
                    fs::remove_file(&path).await.map_err(ErrorKind::Io)?;
                    tracing::info!(path = %path.display(), "purged stale hash file");
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

async fn read_sidecar(path: &Path) -> Result<HashRecord> {
    let bytes = fs::read(path).await.map_err(ErrorKind::Io)?;
    serde_json::from_slice(&bytes).map_err(|_| exn::Exn::from(ErrorKind::Corrupt(path.to_path_buf())))
}
