//! Batch and per-unit outcomes.

use dugout_store::UnitKey;

/// Terminal state of one unit's sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Artifact persisted and hash recorded.
    Updated,
    /// Nothing written: hash unchanged, or the remote has no data for the
    /// unit.
    Skipped,
    /// Fetch or persistence failed; any prior artifact is untouched.
    Failed,
    /// Batch was cancelled before this unit was dispatched.
    Cancelled,
}

/// Outcome record for one unit.
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub key: UnitKey,
    pub status: UnitStatus,
    /// Human-readable decision reason ("hash unchanged", "forced", ...).
    pub reason: String,
    /// Terminal error for failed units.
    pub error: Option<String>,
    /// Non-fatal problem worth surfacing (e.g. the artifact was written but
    /// its hash sidecar wasn't).
    pub warning: Option<String>,
}

impl UnitOutcome {
    pub(crate) fn updated(key: UnitKey, reason: impl Into<String>) -> Self {
        Self::new(key, UnitStatus::Updated, reason)
    }

    pub(crate) fn skipped(key: UnitKey, reason: impl Into<String>) -> Self {
        Self::new(key, UnitStatus::Skipped, reason)
    }

    pub(crate) fn failed(key: UnitKey, reason: impl Into<String>, error: impl Into<String>) -> Self {
        let mut outcome = Self::new(key, UnitStatus::Failed, reason);
        outcome.error = Some(error.into());
        outcome
    }

    pub(crate) fn cancelled(key: UnitKey) -> Self {
        Self::new(key, UnitStatus::Cancelled, "batch cancelled before dispatch")
    }

    pub(crate) fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    fn new(key: UnitKey, status: UnitStatus, reason: impl Into<String>) -> Self {
        Self { key, status, reason: reason.into(), error: None, warning: None }
    }
}

/// Aggregate result of one batch run.
///
/// Counts match per-unit terminal states exactly — each unit is recorded
/// exactly once, whatever retries happened along the way. Ephemeral:
/// constructed per run, never persisted.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Per-unit detail, in completion order.
    pub units: Vec<UnitOutcome>,
}

impl BatchOutcome {
    pub(crate) fn record(&mut self, outcome: UnitOutcome) {
        match outcome.status {
            UnitStatus::Updated => self.updated += 1,
            UnitStatus::Skipped => self.skipped += 1,
            UnitStatus::Failed => self.failed += 1,
            UnitStatus::Cancelled => self.cancelled += 1,
        }
        self.units.push(outcome);
    }

    /// Units that reached a terminal state without failing.
    pub fn succeeded(&self) -> usize {
        self.updated + self.skipped
    }

    /// True when no unit failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    /// Outcome records for failed units, for driver error listings.
    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.units.iter().filter(|u| u.status == UnitStatus::Failed)
    }
}
