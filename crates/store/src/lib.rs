//! Filesystem persistence for hash-gated sync.
//!
//! Two stores, both rooted under a collector's data directory and both
//! partitioned by unit key so concurrent workers never touch the same file:
//!
//! - [`HashStore`] — one JSON sidecar per unit under `hash/<namespace>/`,
//!   recording the content hash of the last artifact written plus
//!   bookkeeping (timestamp, size, freeform summary). An optimization
//!   cache: reads are forgiving, only writes propagate errors.
//! - [`ArtifactStore`] — the synchronized records themselves under
//!   `data/<namespace>/`, replaced atomically (temp file + rename) so a
//!   concurrent reader never sees a partial write.

pub mod artifact;
pub mod error;
mod fs;
mod key;
pub mod sidecar;

pub use crate::artifact::ArtifactStore;
pub use crate::key::UnitKey;
pub use crate::sidecar::{HashRecord, HashStore};
