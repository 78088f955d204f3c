//! The fetch capability.
//!
//! The engine never talks to a remote API itself. Each collector injects a
//! [`Fetcher`] — one function from unit key to record — and keeps all its
//! HTTP, session, and parsing machinery to itself. This is the seam that
//! replaces the old inherit-and-override collector base classes.

use async_trait::async_trait;
use derive_more::{Display, Error};
use dugout_store::UnitKey;
use serde::Serialize;

/// Failure reported by a [`Fetcher`].
///
/// The `transient` flag drives the retry policy: timeouts and 5xx-style
/// failures are worth retrying with backoff, a malformed unit key or a
/// schema change is not.
#[derive(Debug, Clone, Display, Error)]
#[display("{message}")]
pub struct FetchError {
    pub message: String,
    pub transient: bool,
}

impl FetchError {
    /// A failure that may succeed on retry (timeout, rate limit, 5xx).
    pub fn transient(message: impl Into<String>) -> Self {
        Self { message: message.into(), transient: true }
    }

    /// A failure retrying cannot fix (bad key, 4xx, schema drift).
    pub fn permanent(message: impl Into<String>) -> Self {
        Self { message: message.into(), transient: false }
    }
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// One collector's remote-fetch capability.
///
/// `Record` is the collector's own schema type; the engine only requires
/// that it serializes into a value tree for hashing and persistence.
///
/// Return values:
/// - `Ok(Some(record))` — data exists for this unit.
/// - `Ok(None)` — the remote authoritatively has *no* data for this unit
///   (e.g. no games on a date). The unit is skipped, nothing is written.
///   This is deliberately not a failure.
/// - `Err(_)` — the fetch failed; see [`FetchError::transient`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Record: Serialize + Send + 'static;

    async fn fetch(&self, key: &UnitKey) -> FetchResult<Option<Self::Record>>;

    /// Optional one-line digest of a fetched record (e.g. `players=12`),
    /// stored in the unit's hash sidecar for status reporting.
    fn summary(&self, _record: &Self::Record) -> Option<String> {
        None
    }
}
