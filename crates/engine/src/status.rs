//! Collection status reporting.
//!
//! Answers "what do we have on disk, and how fresh is it?" from the hash
//! sidecars alone — no fetching, no artifact reads. This is what the driver
//! `status` surface renders.

use crate::error::{ErrorKind, Result};
use dugout_store::{HashRecord, HashStore};
use exn::ResultExt;
use time::OffsetDateTime;

/// Summary of one collector namespace's synced state.
#[derive(Debug)]
pub struct CollectionStatus {
    pub namespace: String,
    /// Number of units with a usable sidecar.
    pub units: usize,
    /// Sum of artifact sizes as recorded at write time.
    pub total_bytes: u64,
    /// Most recent sidecar timestamp, if any unit was ever synced.
    pub last_updated: Option<OffsetDateTime>,
    /// All sidecars, sorted by unit key for stable display.
    pub records: Vec<HashRecord>,
}

impl CollectionStatus {
    /// True when the newest sync is older than `max_age` (or nothing was
    /// ever synced). Drives the staleness pre-check exit code.
    pub fn is_stale(&self, max_age: std::time::Duration, now: OffsetDateTime) -> bool {
        match self.last_updated {
            Some(last) => now - last > max_age,
            None => true,
        }
    }
}

/// Assemble the status of a namespace from its hash store.
///
/// Malformed sidecars were already skipped (with warnings) by the store;
/// only a broken walk surfaces as an error here.
pub async fn collection_status(namespace: &str, store: &HashStore) -> Result<CollectionStatus> {
    let mut records = store.list().await.or_raise(|| ErrorKind::Store)?;
    records.sort_by(|a, b| a.unit_key.segments().cmp(b.unit_key.segments()));

    let total_bytes = records.iter().map(|r| r.size_bytes).sum();
    let last_updated = records.iter().map(|r| r.computed_at).max();
    Ok(CollectionStatus {
        namespace: namespace.to_string(),
        units: records.len(),
        total_bytes,
        last_updated,
        records,
    })
}
