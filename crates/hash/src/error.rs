//! Hashing Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A hashing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for hashing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Record cannot be converted into a canonical value tree (non-string map
    /// keys, serializer-rejected values). Retrying cannot fix a structural
    /// problem.
    #[display("malformed record: {_0}")]
    MalformedRecord(#[error(not(source))] String),
    /// A volatile field path failed to parse.
    #[display("invalid field path: {_0:?}")]
    InvalidFieldPath(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
