//! Sync unit keys.
//!
//! Every piece of remote data kept in sync is addressed by a [`UnitKey`]: an
//! ordered, non-empty tuple of string segments. A team roster is
//! `("TEX", "MLB")`, a player record `("hitters", "12345")`, a date's box
//! scores `("2025-08-06",)`. Keys map one-to-one onto filesystem paths
//! (one directory level per segment), which is what makes the stores
//! contention-free: no two keys ever share a sidecar or artifact file.

use crate::error::{ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier of one synchronization unit within a collector's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitKey(Vec<String>);

impl UnitKey {
    /// Build a key from its segments, validating each one.
    ///
    /// Segments become path components, so anything that can't be a single
    /// file name is rejected: empty segments, `.`/`..`, separators, null
    /// bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use dugout_store::UnitKey;
    ///
    /// let key = UnitKey::new(["TEX", "MLB"]).unwrap();
    /// assert_eq!(key.to_string(), "TEX/MLB");
    /// assert!(UnitKey::new(["../escape"]).is_err());
    /// ```
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            exn::bail!(ErrorKind::InvalidKey(String::new()));
        }
        for segment in &segments {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains(['/', '\\', '\0'])
            {
                exn::bail!(ErrorKind::InvalidKey(segments.join("/")));
            }
        }
        Ok(Self(segments))
    }

    /// The key's segments, in order.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Relative file path for this key: one directory level per segment,
    /// the last segment as file stem.
    ///
    /// The extension is appended, not substituted, so a dot inside the last
    /// segment can't collapse two keys onto one path.
    pub(crate) fn relative_path(&self, extension: &str) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in &self.0[..self.0.len() - 1] {
            path.push(segment);
        }
        path.push(format!("{}.{extension}", self.0[self.0.len() - 1]));
        path
    }
}

/// Validate a collector namespace the same way key segments are validated:
/// it becomes a single directory name under the store roots.
pub(crate) fn validated_namespace(namespace: &str) -> Result<&str> {
    if namespace.is_empty()
        || namespace == "."
        || namespace == ".."
        || namespace.contains(['/', '\\', '\0'])
    {
        exn::bail!(ErrorKind::InvalidKey(namespace.to_string()));
    }
    Ok(namespace)
}

impl std::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
