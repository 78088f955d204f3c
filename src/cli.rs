//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keep local mirrors of slow-moving remote sports data, re-fetching only
/// what actually changed.
#[derive(Debug, Parser)]
#[command(name = "dugout", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file (default: ./dugout.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base data directory, overriding the configured one.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Synchronize a collector from a spool directory of fetched records.
    ///
    /// Every `<key...>.json` under the spool becomes one sync unit; records
    /// are hashed with volatile fields stripped and only persisted when
    /// their content actually changed.
    Sync {
        /// Collector namespace (e.g. `roster`, `splits`).
        #[arg(long)]
        collector: String,
        /// Directory of fetched records, one JSON file per unit.
        #[arg(long)]
        spool: PathBuf,
        /// Re-persist every unit regardless of hash comparison.
        #[arg(long)]
        force: bool,
        /// Worker count, overriding the configured profile.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Report last-sync state for a collector without fetching anything.
    Status {
        /// Collector namespace.
        #[arg(long)]
        collector: String,
        /// Exit non-zero if the newest sync is older than this many hours.
        #[arg(long)]
        stale_after_hours: Option<u64>,
        /// List every unit, not just the totals.
        #[arg(long)]
        detail: bool,
    },
    /// Delete hash sidecars older than the retention window.
    Purge {
        /// Collector namespace.
        #[arg(long)]
        collector: String,
        /// Age threshold in hours (default: configured retention).
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
}
