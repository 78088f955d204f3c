//! The concurrent sync worker pool.
//!
//! A batch run dispatches every unit key to a bounded set of workers. Each
//! worker owns one unit at a time and runs the full cycle to completion:
//! fetch (with retry/backoff and a per-attempt timeout) → hash → load prior
//! → decide → persist. Failures are isolated per unit; the pool always
//! returns a complete [`BatchOutcome`].
//!
//! Workers share no mutable state. Stores are contention-free by key
//! partitioning, and outcomes flow back through task join handles, so the
//! only synchronization is the semaphore bounding concurrency.

use crate::decision::{Decision, decide};
use crate::error::Result;
use crate::fetcher::{FetchError, FetchResult, Fetcher};
use crate::options::SyncOptions;
use crate::outcome::{BatchOutcome, UnitOutcome};
use dugout_hash::short;
use dugout_store::{ArtifactStore, HashRecord, HashStore, UnitKey};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// A worker pool bound to one collector's stores.
#[derive(Debug, Clone)]
pub struct SyncPool {
    hashes: HashStore,
    artifacts: ArtifactStore,
}

impl SyncPool {
    pub fn new(hashes: HashStore, artifacts: ArtifactStore) -> Self {
        Self { hashes, artifacts }
    }

    /// Run one batch over `units`, fetching through `fetcher`.
    ///
    /// Units complete in whatever order their latency allows; each one is
    /// counted exactly once in the returned [`BatchOutcome`]. No single
    /// unit's failure aborts the batch.
    ///
    /// Cancelling `cancel` stops dispatching new units — in-flight units
    /// finish their current cycle (including writes) and count normally;
    /// undispatched units are recorded as cancelled.
    #[tracing::instrument(skip_all, fields(units = units.len(), workers = options.max_concurrency))]
    pub async fn run<F>(
        &self,
        fetcher: &F,
        units: &[UnitKey],
        options: &SyncOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<BatchOutcome>
    where
        F: Fetcher + Clone + 'static,
    {
        let mut batch = BatchOutcome::default();
        if units.is_empty() {
            return Ok(batch);
        }

        let concurrency = options.max_concurrency.clamp(1, units.len());
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let cancel = cancel.cloned().unwrap_or_default();

        let mut handles = Vec::with_capacity(units.len());
        for key in units {
            let key = key.clone();
            let task_key = key.clone();
            let fetcher = fetcher.clone();
            let hashes = self.hashes.clone();
            let artifacts = self.artifacts.clone();
            let options = options.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return UnitOutcome::failed(task_key, "dispatch failed", "semaphore closed unexpectedly");
                    },
                };
                // The permit is the dispatch point: once we hold it, the
                // unit runs to completion even if cancellation arrives.
                if cancel.is_cancelled() {
                    return UnitOutcome::cancelled(task_key);
                }
                let outcome = sync_unit(&fetcher, &hashes, &artifacts, &task_key, &options).await;
                // Rate limit per worker slot: the delay is served while the
                // permit is still held, after the unit finishes.
                if !options.inter_request_delay.is_zero() && !cancel.is_cancelled() {
                    tokio::time::sleep(options.inter_request_delay).await;
                }
                outcome
            });
            handles.push((key, handle));
        }

        for (key, handle) in handles {
            match handle.await {
                Ok(outcome) => batch.record(outcome),
                Err(e) => batch.record(UnitOutcome::failed(key, "worker crashed", format!("task panic: {e}"))),
            }
        }

        tracing::info!(
            updated = batch.updated,
            skipped = batch.skipped,
            failed = batch.failed,
            cancelled = batch.cancelled,
            "batch complete"
        );
        Ok(batch)
    }
}

/// One unit's full decide/fetch/persist cycle.
async fn sync_unit<F: Fetcher>(
    fetcher: &F,
    hashes: &HashStore,
    artifacts: &ArtifactStore,
    key: &UnitKey,
    options: &SyncOptions,
) -> UnitOutcome {
    let record = match fetch_with_retry(fetcher, key, options).await {
        Ok(Some(record)) => record,
        // Authoritative absence is not a failure; it just isn't an update
        // either.
        Ok(None) => return UnitOutcome::skipped(key.clone(), "no data for unit"),
        Err(e) => return UnitOutcome::failed(key.clone(), "fetch failed", e.to_string()),
    };

    let value = match dugout_hash::to_value(&record) {
        Ok(value) => value,
        // Structural problem; retrying won't fix it.
        Err(e) => return UnitOutcome::failed(key.clone(), "malformed record", (*e).to_string()),
    };
    let fresh_hash = dugout_hash::content_hash(&value, &options.volatile_fields);

    let prior = hashes.load(key).await;
    let (decision, reason) = decide(&fresh_hash, prior.as_ref(), options.forced);
    match decision {
        Decision::Skip => {
            tracing::debug!(key = %key, hash = short(&fresh_hash), "skip: {reason}");
            UnitOutcome::skipped(key.clone(), reason)
        },
        Decision::Update => {
            let (artifact_path, size_bytes) = match artifacts.write(key, &value).await {
                Ok(written) => written,
                // A successful fetch that can't be durably stored is not a
                // success.
                Err(e) => return UnitOutcome::failed(key.clone(), "artifact write failed", (*e).to_string()),
            };
            // Old timestamped snapshots are cleaned opportunistically; a
            // failed sweep is tomorrow's sweep.
            _ = artifacts.sweep_snapshots(key).await;

            let mut sidecar = HashRecord::new(key.clone(), &fresh_hash, size_bytes, artifact_path);
            if let Some(summary) = fetcher.summary(&record) {
                sidecar = sidecar.with_summary(summary);
            }
            tracing::info!(key = %key, hash = short(&fresh_hash), "update: {reason}");
            match hashes.save(&sidecar).await {
                Ok(()) => UnitOutcome::updated(key.clone(), reason),
                Err(e) => {
                    // The artifact is safely on disk; losing the sidecar
                    // only costs one extra re-fetch next run.
                    let cause = (*e).to_string();
                    tracing::warn!(key = %key, error = %cause, "artifact stored but hash sidecar write failed");
                    UnitOutcome::updated(key.clone(), reason).with_warning(format!("hash save failed: {cause}"))
                },
            }
        },
    }
}

/// Fetch with a per-attempt timeout, retrying transient failures with
/// exponential backoff. Non-transient failures return immediately.
async fn fetch_with_retry<F: Fetcher>(
    fetcher: &F,
    key: &UnitKey,
    options: &SyncOptions,
) -> FetchResult<Option<F::Record>> {
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(options.fetch_timeout, fetcher.fetch(key)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::transient(format!(
                "fetch timed out after {:.1}s",
                options.fetch_timeout.as_secs_f64()
            ))),
        };
        match result {
            Ok(record) => return Ok(record),
            Err(e) if e.transient && attempt < options.backoff.max_retries => {
                let delay = options.backoff.delay(attempt);
                tracing::debug!(key = %key, attempt, delay_ms = delay.as_millis() as u64, error = %e, "transient fetch failure, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchResult;
    use crate::options::{BackoffPolicy, Profile};
    use async_trait::async_trait;
    use dugout_hash::parse_all;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Scripted fetcher: a closure from (key, zero-based attempt) to a fetch
    /// result, with per-key attempt counting.
    #[derive(Clone)]
    struct MockFetcher {
        respond: Arc<dyn Fn(&UnitKey, usize) -> FetchResult<Option<Value>> + Send + Sync>,
        calls: Arc<Mutex<HashMap<UnitKey, usize>>>,
    }

    impl MockFetcher {
        fn new(respond: impl Fn(&UnitKey, usize) -> FetchResult<Option<Value>> + Send + Sync + 'static) -> Self {
            Self { respond: Arc::new(respond), calls: Arc::new(Mutex::new(HashMap::new())) }
        }

        /// Same response for every key and attempt.
        fn returning(record: Value) -> Self {
            Self::new(move |_, _| Ok(Some(record.clone())))
        }

        fn calls_for(&self, key: &UnitKey) -> usize {
            self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl Fetcher for MockFetcher {
        type Record = Value;

        async fn fetch(&self, key: &UnitKey) -> FetchResult<Option<Value>> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(key.clone()).or_insert(0);
                *count += 1;
                *count - 1
            };
            (self.respond)(key, attempt)
        }

        fn summary(&self, record: &Value) -> Option<String> {
            let players = record.get("players")?.as_array()?;
            Some(format!("players={}", players.len()))
        }
    }

    fn pool_in(dir: &TempDir) -> SyncPool {
        SyncPool::new(
            HashStore::open(dir.path(), "roster").unwrap(),
            ArtifactStore::open(dir.path(), "roster").unwrap(),
        )
    }

    /// Options tuned for tests: no pacing, tiny backoff.
    fn options() -> SyncOptions {
        let mut options = Profile::Balanced.options();
        options.inter_request_delay = Duration::ZERO;
        options.backoff = BackoffPolicy { max_retries: 3, base: Duration::from_millis(10) };
        options.volatile_fields = parse_all(&[
            "metadata.collection_timestamp",
            "players[].loaddate",
        ])
        .unwrap();
        options
    }

    fn key(segments: &[&str]) -> UnitKey {
        UnitKey::new(segments.iter().copied()).unwrap()
    }

    fn roster(count: usize, stamp: &str) -> Value {
        let players: Vec<Value> = (0..count).map(|i| json!({"id": i, "loaddate": stamp})).collect();
        json!({"players": players, "metadata": {"collection_timestamp": stamp}})
    }

    #[tokio::test]
    async fn test_first_run_updates() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let fetcher = MockFetcher::returning(roster(12, "T1"));
        let units = [key(&["TEX", "MLB"])];

        let batch = pool.run(&fetcher, &units, &options(), None).await.unwrap();
        assert_eq!((batch.updated, batch.skipped, batch.failed), (1, 0, 0));
        assert_eq!(batch.units[0].reason, "no prior record");

        let artifact = pool.artifacts.read(&units[0]).await.unwrap();
        assert_eq!(artifact["players"].as_array().unwrap().len(), 12);
        let sidecar = pool.hashes.load(&units[0]).await.unwrap();
        assert_eq!(sidecar.content_hash.len(), 64);
        assert_eq!(sidecar.summary.as_deref(), Some("players=12"));
    }

    #[tokio::test]
    async fn test_volatile_only_change_skips() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["TEX", "MLB"])];

        pool.run(&MockFetcher::returning(roster(12, "T1")), &units, &options(), None).await.unwrap();
        let batch = pool.run(&MockFetcher::returning(roster(12, "T2")), &units, &options(), None).await.unwrap();

        assert_eq!((batch.updated, batch.skipped, batch.failed), (0, 1, 0));
        assert_eq!(batch.units[0].reason, "hash unchanged");
        // Artifact was not rewritten: it still carries the first run's stamp.
        let artifact = pool.artifacts.read(&units[0]).await.unwrap();
        assert_eq!(artifact["metadata"]["collection_timestamp"], "T1");
    }

    #[tokio::test]
    async fn test_real_change_updates_again() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["TEX", "MLB"])];

        pool.run(&MockFetcher::returning(roster(12, "T1")), &units, &options(), None).await.unwrap();
        let first_hash = pool.hashes.load(&units[0]).await.unwrap().content_hash;
        let batch = pool.run(&MockFetcher::returning(roster(13, "T2")), &units, &options(), None).await.unwrap();

        assert_eq!((batch.updated, batch.skipped, batch.failed), (1, 0, 0));
        assert!(batch.units[0].reason.starts_with("hash changed: "));
        let sidecar = pool.hashes.load(&units[0]).await.unwrap();
        assert_ne!(sidecar.content_hash, first_hash);
        assert_eq!(sidecar.summary.as_deref(), Some("players=13"));
    }

    #[tokio::test]
    async fn test_idempotent_rerun_is_all_skips() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units: Vec<UnitKey> = ["TEX", "BOS", "NYY"].iter().map(|t| key(&[t, "MLB"])).collect();
        let fetcher = MockFetcher::new(|key, _| Ok(Some(json!({"team": key.segments()[0], "players": [1, 2, 3]}))));

        let first = pool.run(&fetcher, &units, &options(), None).await.unwrap();
        assert_eq!(first.updated, 3);
        let second = pool.run(&fetcher, &units, &options(), None).await.unwrap();
        assert_eq!((second.updated, second.skipped, second.failed), (0, 3, 0));
    }

    #[tokio::test]
    async fn test_forced_updates_unchanged_unit() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["TEX", "MLB"])];
        let fetcher = MockFetcher::returning(roster(12, "T1"));

        pool.run(&fetcher, &units, &options(), None).await.unwrap();
        let mut forced = options();
        forced.forced = true;
        let batch = pool.run(&fetcher, &units, &forced, None).await.unwrap();
        assert_eq!(batch.updated, 1);
        assert_eq!(batch.units[0].reason, "forced");
    }

    #[tokio::test]
    async fn test_no_data_is_skip_not_failure() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["2025-08-06"])];
        let fetcher = MockFetcher::new(|_, _| Ok(None));

        let batch = pool.run(&fetcher, &units, &options(), None).await.unwrap();
        assert_eq!((batch.updated, batch.skipped, batch.failed), (0, 1, 0));
        assert_eq!(batch.units[0].reason, "no data for unit");
        assert!(pool.hashes.load(&units[0]).await.is_none());
    }

    #[tokio::test]
    async fn test_failure_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units: Vec<UnitKey> = ["TEX", "BOS", "NYY", "LAD", "CHC"].iter().map(|t| key(&[t, "MLB"])).collect();
        let bad = key(&["BOS", "MLB"]);

        // Seed a prior artifact for the unit that will fail.
        pool.run(&MockFetcher::returning(roster(9, "T0")), std::slice::from_ref(&bad), &options(), None)
            .await
            .unwrap();

        let bad_for_closure = bad.clone();
        let fetcher = MockFetcher::new(move |key, _| {
            if *key == bad_for_closure {
                Err(FetchError::permanent("unknown team abbreviation"))
            } else {
                Ok(Some(json!({"players": [1]})))
            }
        });
        let batch = pool.run(&fetcher, &units, &options(), None).await.unwrap();

        assert_eq!(batch.failed, 1);
        assert_eq!(batch.updated + batch.skipped, 4);
        let failure = batch.failures().next().unwrap();
        assert_eq!(failure.key, bad);
        assert_eq!(failure.error.as_deref(), Some("unknown team abbreviation"));
        // The failing unit's prior artifact is untouched.
        let artifact = pool.artifacts.read(&bad).await.unwrap();
        assert_eq!(artifact["players"].as_array().unwrap().len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["TEX", "MLB"])];
        let fetcher = MockFetcher::new(|_, attempt| {
            if attempt < 2 {
                Err(FetchError::transient("503 service unavailable"))
            } else {
                Ok(Some(json!({"players": [1]})))
            }
        });

        let batch = pool.run(&fetcher, &units, &options(), None).await.unwrap();
        assert_eq!((batch.updated, batch.failed), (1, 0));
        assert_eq!(fetcher.calls_for(&units[0]), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_fails_unit() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["TEX", "MLB"])];
        let fetcher = MockFetcher::new(|_, _| Err(FetchError::transient("connection reset")));

        let batch = pool.run(&fetcher, &units, &options(), None).await.unwrap();
        assert_eq!(batch.failed, 1);
        // Initial attempt plus max_retries.
        assert_eq!(fetcher.calls_for(&units[0]), 4);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["NOPE", "MLB"])];
        let fetcher = MockFetcher::new(|_, _| Err(FetchError::permanent("404 not found")));

        let batch = pool.run(&fetcher, &units, &options(), None).await.unwrap();
        assert_eq!(batch.failed, 1);
        assert_eq!(fetcher.calls_for(&units[0]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        /// Fetcher that never responds within any timeout.
        #[derive(Clone)]
        struct StallingFetcher;

        #[async_trait]
        impl Fetcher for StallingFetcher {
            type Record = Value;
            async fn fetch(&self, _key: &UnitKey) -> FetchResult<Option<Value>> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["TEX", "MLB"])];
        let mut opts = options();
        opts.fetch_timeout = Duration::from_secs(5);
        opts.backoff.max_retries = 1;

        let batch = pool.run(&StallingFetcher, &units, &opts, None).await.unwrap();
        assert_eq!(batch.failed, 1);
        assert!(batch.units[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_malformed_record_fails_without_retry() {
        /// Record type with non-string map keys: serializes fine as a Rust
        /// value, has no canonical JSON form.
        #[derive(Clone)]
        struct BadSchemaFetcher(Arc<Mutex<usize>>);

        #[async_trait]
        impl Fetcher for BadSchemaFetcher {
            type Record = HashMap<u32, String>;
            async fn fetch(&self, _key: &UnitKey) -> FetchResult<Option<Self::Record>> {
                *self.0.lock().unwrap() += 1;
                Ok(Some(HashMap::from([(1, "x".to_string())])))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units = [key(&["TEX", "MLB"])];
        let calls = Arc::new(Mutex::new(0));
        let fetcher = BadSchemaFetcher(Arc::clone(&calls));

        let batch = pool.run(&fetcher, &units, &options(), None).await.unwrap();
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.units[0].reason, "malformed record");
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_artifact_write_failure_fails_unit() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        // Occupy the unit's parent directory path with a plain file so the
        // artifact write cannot create it.
        std::fs::write(dir.path().join("data/roster/TEX"), b"roadblock").unwrap();
        let units = [key(&["TEX", "MLB"])];

        let batch = pool.run(&MockFetcher::returning(roster(12, "T1")), &units, &options(), None).await.unwrap();
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.units[0].reason, "artifact write failed");
        assert!(pool.hashes.load(&units[0]).await.is_none());
    }

    #[tokio::test]
    async fn test_hash_save_failure_still_counts_updated() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        // Artifact writes succeed; the sidecar's parent directory path is
        // blocked by a plain file.
        std::fs::write(dir.path().join("hash/roster/TEX"), b"roadblock").unwrap();
        let units = [key(&["TEX", "MLB"])];

        let batch = pool.run(&MockFetcher::returning(roster(12, "T1")), &units, &options(), None).await.unwrap();
        assert_eq!((batch.updated, batch.failed), (1, 0));
        assert!(batch.units[0].warning.as_deref().unwrap().contains("hash save failed"));
        // The data itself is durably stored.
        assert!(pool.artifacts.read(&units[0]).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrency_does_not_change_counts() {
        let teams: Vec<String> = (0..40).map(|i| format!("T{i:02}")).collect();
        let fetcher = MockFetcher::new(|key, _| Ok(Some(json!({"team": key.segments()[0], "players": [1, 2]}))));

        let mut counts = Vec::new();
        for workers in [1, 8] {
            let dir = tempfile::tempdir().unwrap();
            let pool = pool_in(&dir);
            let units: Vec<UnitKey> = teams.iter().map(|t| key(&[t, "MLB"])).collect();
            let mut opts = options();
            opts.max_concurrency = workers;
            let batch = pool.run(&fetcher, &units, &opts, None).await.unwrap();
            assert_eq!(batch.units.len(), 40);
            counts.push((batch.updated, batch.skipped, batch.failed));
        }
        assert_eq!(counts[0], counts[1]);
        assert_eq!(counts[0], (40, 0, 0));
    }

    #[tokio::test]
    async fn test_cancellation_stops_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units: Vec<UnitKey> = (0..10).map(|i| key(&[&format!("T{i}"), "MLB"])).collect();
        let fetcher = MockFetcher::returning(roster(1, "T1"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let batch = pool.run(&fetcher, &units, &options(), Some(&cancel)).await.unwrap();

        assert_eq!(batch.cancelled, 10);
        assert_eq!(batch.updated + batch.skipped + batch.failed, 0);
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inter_request_delay_paces_worker_slots() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let units: Vec<UnitKey> = (0..3).map(|i| key(&[&format!("T{i}"), "MLB"])).collect();
        let fetcher = MockFetcher::new(|_, _| Ok(Some(json!({"players": []}))));
        let mut opts = options();
        opts.max_concurrency = 1;
        opts.inter_request_delay = Duration::from_millis(200);

        let start = tokio::time::Instant::now();
        pool.run(&fetcher, &units, &opts, None).await.unwrap();
        // One delay per completed unit on the single worker slot.
        assert!(start.elapsed() >= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool_in(&dir);
        let fetcher = MockFetcher::returning(json!({}));
        let batch = pool.run(&fetcher, &[], &options(), None).await.unwrap();
        assert!(batch.units.is_empty());
        assert!(batch.is_clean());
    }
}
