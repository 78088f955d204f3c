//! The update/skip decision.
//!
//! This is the single place "what counts as a change" lives. It's a pure
//! function over hashes — no I/O, no clock — so the business rule can be
//! tested without a filesystem or network anywhere near it.

use dugout_hash::short;
use dugout_store::HashRecord;

/// What to do with a freshly fetched unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Persist the artifact and record the new hash.
    Update,
    /// The stored artifact is still current; write nothing.
    Skip,
}

/// Compare a fresh content hash against the stored sidecar.
///
/// Reasons are stable, human-readable strings; hash prefixes in them are
/// truncated for display only.
///
/// # Examples
///
/// ```
/// use dugout_engine::decision::{Decision, decide};
///
/// let (decision, reason) = decide("abc123", None, false);
/// assert_eq!(decision, Decision::Update);
/// assert_eq!(reason, "no prior record");
/// ```
pub fn decide(fresh_hash: &str, prior: Option<&HashRecord>, forced: bool) -> (Decision, String) {
    if forced {
        return (Decision::Update, "forced".to_string());
    }
    let Some(prior) = prior else {
        return (Decision::Update, "no prior record".to_string());
    };
    if fresh_hash == prior.content_hash {
        (Decision::Skip, "hash unchanged".to_string())
    } else {
        (
            Decision::Update,
            format!("hash changed: {} -> {}", short(&prior.content_hash), short(fresh_hash)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dugout_store::UnitKey;
    use rstest::rstest;

    fn prior(hash: &str) -> HashRecord {
        let key = UnitKey::new(["TEX", "MLB"]).unwrap();
        HashRecord::new(key, hash, 0, "/data/roster/TEX/MLB.json")
    }

    #[test]
    fn test_no_prior_updates() {
        let (decision, reason) = decide("aaaa", None, false);
        assert_eq!(decision, Decision::Update);
        assert_eq!(reason, "no prior record");
    }

    #[test]
    fn test_same_hash_skips() {
        let (decision, reason) = decide("aaaa", Some(&prior("aaaa")), false);
        assert_eq!(decision, Decision::Skip);
        assert_eq!(reason, "hash unchanged");
    }

    #[test]
    fn test_changed_hash_updates() {
        let old = "1111111111111111";
        let new = "2222222222222222";
        let (decision, reason) = decide(new, Some(&prior(old)), false);
        assert_eq!(decision, Decision::Update);
        assert_eq!(reason, "hash changed: 11111111 -> 22222222");
    }

    #[rstest]
    #[case(None)]
    #[case(Some("aaaa"))]
    #[case(Some("bbbb"))]
    fn test_forced_always_updates(#[case] stored: Option<&str>) {
        let prior_record = stored.map(prior);
        let (decision, reason) = decide("aaaa", prior_record.as_ref(), true);
        assert_eq!(decision, Decision::Update);
        assert_eq!(reason, "forced");
    }
}
