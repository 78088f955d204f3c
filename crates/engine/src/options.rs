//! Sync options and performance profiles.
//!
//! Everything the worker pool needs to know is carried in one explicit
//! [`SyncOptions`] value — there is no process-wide mutable configuration.
//! The named [`Profile`]s exist purely as presets for constructing options;
//! drivers can override any field afterwards.

use dugout_hash::FieldPath;
use std::str::FromStr;
use std::time::Duration;

/// Exponential backoff for transient fetch failures.
///
/// Attempt `n` (zero-based) waits `base * 2^n` before the next try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries after the initial attempt. `max_retries = 3` means up to
    /// four fetch calls total.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base: Duration,
}

impl BackoffPolicy {
    /// Delay to sleep after failed attempt `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * 2u32.saturating_pow(attempt)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base: Duration::from_secs(1) }
    }
}

/// Options for one batch run of the sync pool.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Bounded worker count.
    pub max_concurrency: usize,
    /// Minimum spacing applied after each unit a worker finishes, so
    /// aggregate request rate stays bounded even at high concurrency.
    pub inter_request_delay: Duration,
    /// Per-attempt fetch timeout; an elapsed timeout counts as a transient
    /// failed attempt.
    pub fetch_timeout: Duration,
    /// Retry policy for transient fetch failures.
    pub backoff: BackoffPolicy,
    /// Field paths stripped before hashing.
    pub volatile_fields: Vec<FieldPath>,
    /// Re-persist every unit regardless of hash comparison.
    pub forced: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Profile::Balanced.options()
    }
}

/// Named performance presets: worker count vs. per-unit delay tradeoffs,
/// from "don't get noticed" to "the API owner knows us".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Stealth,
    Conservative,
    Balanced,
    Aggressive,
    UltraAggressive,
}

impl Profile {
    /// Construct options for this preset. Volatile fields start empty;
    /// collectors supply their own.
    pub fn options(self) -> SyncOptions {
        let (max_concurrency, delay_ms) = match self {
            Self::Stealth => (8, 500),
            Self::Conservative => (12, 300),
            Self::Balanced => (16, 200),
            Self::Aggressive => (20, 100),
            Self::UltraAggressive => (25, 50),
        };
        SyncOptions {
            max_concurrency,
            inter_request_delay: Duration::from_millis(delay_ms),
            fetch_timeout: Duration::from_secs(30),
            backoff: BackoffPolicy::default(),
            volatile_fields: Vec::new(),
            forced: false,
        }
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stealth" => Ok(Self::Stealth),
            "conservative" => Ok(Self::Conservative),
            "balanced" => Ok(Self::Balanced),
            "aggressive" => Ok(Self::Aggressive),
            "ultra-aggressive" | "ultra_aggressive" => Ok(Self::UltraAggressive),
            other => Err(format!("unknown performance profile {other:?}")),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Stealth => "stealth",
            Self::Conservative => "conservative",
            Self::Balanced => "balanced",
            Self::Aggressive => "aggressive",
            Self::UltraAggressive => "ultra-aggressive",
        })
    }
}
