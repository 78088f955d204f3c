//! Volatile field paths.
//!
//! Remote APIs echo request parameters and stamp every response with
//! collection metadata. Those fields change on every fetch regardless of
//! whether the underlying data changed, so they must be stripped before a
//! record is hashed. A [`FieldPath`] addresses one such field inside a
//! nested value tree.

use crate::error::{ErrorKind, Result};
use serde_json::Value;

/// A dot-separated path into a nested record, with array wildcards.
///
/// A segment written as `name[]` descends into the array at `name` and
/// applies the rest of the path to *every* element. The final segment names
/// the field to remove.
///
/// # Examples
///
/// ```
/// use dugout_hash::FieldPath;
///
/// // Top-level field
/// let p = FieldPath::parse("collection_timestamp").unwrap();
/// // Nested field
/// let p = FieldPath::parse("metadata.last_updated").unwrap();
/// // Field inside every element of an array
/// let p = FieldPath::parse("players[].loaddate").unwrap();
/// assert_eq!(p.to_string(), "players[].loaddate");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    /// `name[]` — apply the remainder to every element of the array.
    each: bool,
}

impl FieldPath {
    /// Parse a path like `metadata.collection_timestamp` or
    /// `players[].loaddate`.
    ///
    /// # Errors
    /// Returns [`InvalidFieldPath`](ErrorKind::InvalidFieldPath) for empty
    /// paths, empty segments, or a wildcard on the final segment (a wildcard
    /// selects elements, not a field to remove).
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            exn::bail!(ErrorKind::InvalidFieldPath(path.to_string()));
        }
        let mut segments = Vec::new();
        for raw in path.split('.') {
            let (name, each) = match raw.strip_suffix("[]") {
                Some(name) => (name, true),
                None => (raw, false),
            };
            if name.is_empty() || name.contains('[') || name.contains(']') {
                exn::bail!(ErrorKind::InvalidFieldPath(path.to_string()));
            }
            segments.push(Segment { name: name.to_string(), each });
        }
        // A trailing wildcard would mean "delete every element", which is
        // not a volatile-field exclusion.
        if segments.last().is_some_and(|s| s.each) {
            exn::bail!(ErrorKind::InvalidFieldPath(path.to_string()));
        }
        Ok(Self { segments })
    }

    /// Remove the addressed field from `value`, wherever it matches.
    ///
    /// Paths that don't match anything are silently fine — a record without
    /// the volatile field needs no stripping.
    pub fn strip(&self, value: &mut Value) {
        strip_inner(value, &self.segments);
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
            if segment.each {
                f.write_str("[]")?;
            }
        }
        Ok(())
    }
}

/// Parse a whole list of paths at once, failing on the first invalid one.
pub fn parse_all(paths: &[impl AsRef<str>]) -> Result<Vec<FieldPath>> {
    paths.iter().map(|p| FieldPath::parse(p.as_ref())).collect()
}

/// Remove every path in `volatile` from `value`.
pub fn strip_all(value: &mut Value, volatile: &[FieldPath]) {
    for path in volatile {
        path.strip(value);
    }
}

fn strip_inner(value: &mut Value, segments: &[Segment]) {
    let Some((segment, rest)) = segments.split_first() else {
        return;
    };
    let Value::Object(map) = value else {
        return;
    };
    if segment.each {
        if let Some(Value::Array(items)) = map.get_mut(&segment.name) {
            for item in items {
                strip_inner(item, rest);
            }
        }
    } else if rest.is_empty() {
        map.remove(&segment.name);
    } else if let Some(child) = map.get_mut(&segment.name) {
        strip_inner(child, rest);
    }
}
