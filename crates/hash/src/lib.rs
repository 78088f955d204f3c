//! Content hashing for hash-gated incremental sync.
//!
//! Collectors fetch the same remote records over and over; most fetches
//! return data that hasn't actually changed. This crate computes a stable
//! digest of a record so callers can tell a real change apart from noise:
//!
//! 1. volatile fields (collection timestamps, request-echoed load dates)
//!    are stripped via [`FieldPath`] exclusions,
//! 2. the remainder is serialized canonically (keys sorted at every depth,
//!    compact separators),
//! 3. the UTF-8 bytes are hashed with BLAKE3.
//!
//! The full hex digest is what gets persisted; [`short`] exists only for
//! human-readable log and reason strings.

pub mod canonical;
pub mod error;
mod fields;

pub use crate::fields::{FieldPath, parse_all, strip_all};
use crate::error::{ErrorKind, Result};
use serde::Serialize;
use serde_json::Value;

/// Number of hex characters shown in reason strings and logs.
const SHORT_LEN: usize = 8;

/// Hash a value tree after stripping the given volatile fields.
///
/// Pure: the input is cloned before stripping, never mutated. Equal records
/// (modulo volatile fields) always produce equal digests, independent of key
/// insertion order.
///
/// # Examples
///
/// ```
/// use dugout_hash::{FieldPath, content_hash};
/// use serde_json::json;
///
/// let volatile = vec![FieldPath::parse("metadata.collection_timestamp").unwrap()];
/// let a = json!({"players": [1, 2], "metadata": {"collection_timestamp": "T1"}});
/// let b = json!({"metadata": {"collection_timestamp": "T2"}, "players": [1, 2]});
/// assert_eq!(content_hash(&a, &volatile), content_hash(&b, &volatile));
/// ```
pub fn content_hash(record: &Value, volatile: &[FieldPath]) -> String {
    let mut stable = record.clone();
    strip_all(&mut stable, volatile);
    blake3::hash(&canonical::to_bytes(&stable)).to_string()
}

/// Convert any serializable record into a value tree and hash it.
///
/// This is the boundary where a collector's concrete schema type meets the
/// schema-agnostic engine. Conversion failures (non-string map keys and the
/// like) surface as [`MalformedRecord`](ErrorKind::MalformedRecord) — the
/// value tree itself cannot represent non-finite numbers or cycles, so
/// anything that converts cleanly hashes cleanly.
pub fn content_hash_of<T: Serialize>(record: &T, volatile: &[FieldPath]) -> Result<String> {
    let value = to_value(record)?;
    Ok(content_hash(&value, volatile))
}

/// Convert a record into a value tree, mapping serializer failures to
/// [`MalformedRecord`](ErrorKind::MalformedRecord).
pub fn to_value<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| exn::Exn::from(ErrorKind::MalformedRecord(e.to_string())))
}

/// Shorten a digest for display. Safe on already-short strings.
pub fn short(hash: &str) -> &str {
    &hash[..hash.len().min(SHORT_LEN)]
}
