//! Hash-gated incremental sync engine.
//!
//! Every collector in this workspace keeps some set of remote units (team
//! rosters, player records, dates) mirrored on local disk. The expensive
//! part — what to fetch, when to rewrite, how hard to hit the remote — is
//! identical across all of them, so it lives here once:
//!
//! - a collector injects its [`Fetcher`] (the only thing it must provide),
//! - [`SyncPool::run`] fans a batch of unit keys out over bounded workers,
//! - each unit is fetched (retry/backoff/timeout), hashed with volatile
//!   fields stripped, and compared against its stored sidecar,
//! - only real changes touch disk; everything else is a skip,
//! - per-unit failures are isolated into the returned [`BatchOutcome`].
//!
//! Two consecutive runs against unchanged remote data always converge: the
//! second run writes nothing.

pub mod decision;
pub mod error;
mod fetcher;
mod options;
mod outcome;
mod pool;
pub mod status;

pub use crate::decision::{Decision, decide};
pub use crate::fetcher::{FetchError, FetchResult, Fetcher};
pub use crate::options::{BackoffPolicy, Profile, SyncOptions};
pub use crate::outcome::{BatchOutcome, UnitOutcome, UnitStatus};
pub use crate::pool::SyncPool;
pub use crate::status::{CollectionStatus, collection_status};
