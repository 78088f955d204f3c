//! The dugout driver.
//!
//! Thin CLI over the sync engine: `sync` runs a spool-backed batch through
//! the worker pool, `status` reports last-synced state from hash sidecars
//! without fetching anything, `purge` sweeps sidecars past the retention
//! window. Exit code 0 means clean; any failed unit or a failed staleness
//! pre-check exits 1.

mod cli;
mod spool;

use crate::cli::{Cli, Command};
use crate::spool::SpoolFetcher;
use clap::Parser;
use dugout_config::AppConfig;
use dugout_engine::{Profile, SyncOptions, SyncPool, UnitStatus, collection_status};
use dugout_store::{ArtifactStore, HashStore};
use miette::{IntoDiagnostic, miette};
use std::path::Path;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).map_err(render)?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    match cli.command {
        Command::Sync { collector, spool, force, workers } => {
            sync(&config, &collector, &spool, force, workers).await
        },
        Command::Status { collector, stale_after_hours, detail } => {
            status(&config, &collector, stale_after_hours, detail).await
        },
        Command::Purge { collector, max_age_hours } => purge(&config, &collector, max_age_hours).await,
    }
}

async fn sync(
    config: &AppConfig,
    collector: &str,
    spool_dir: &Path,
    force: bool,
    workers: Option<usize>,
) -> miette::Result<()> {
    let options = build_options(config, force, workers)?;
    let hashes = HashStore::open(&config.data_dir, collector).map_err(render)?;
    let artifacts = ArtifactStore::open(&config.data_dir, collector).map_err(render)?;
    let fetcher = SpoolFetcher::new(spool_dir);
    let units = fetcher.discover_units().into_diagnostic()?;
    if units.is_empty() {
        println!("nothing to sync: no units under {}", spool_dir.display());
        return Ok(());
    }

    // Ctrl-C stops dispatching new units; in-flight units finish their
    // writes so no artifact is left half-written.
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, letting in-flight units finish");
            interrupt.cancel();
        }
    });

    let pool = SyncPool::new(hashes, artifacts);
    let total = units.len();
    let batch = pool.run(&fetcher, &units, &options, Some(&cancel)).await.map_err(render)?;

    println!(
        "{collector}: {} updated, {} skipped, {} failed ({} units)",
        batch.updated, batch.skipped, batch.failed, total
    );
    if batch.cancelled > 0 {
        println!("  {} units not dispatched (cancelled)", batch.cancelled);
    }
    for unit in &batch.units {
        match unit.status {
            UnitStatus::Updated => println!("  updated {}: {}", unit.key, unit.reason),
            UnitStatus::Failed => {
                println!("  FAILED {}: {}", unit.key, unit.error.as_deref().unwrap_or(&unit.reason));
            },
            UnitStatus::Skipped | UnitStatus::Cancelled => {},
        }
        if let Some(warning) = &unit.warning {
            println!("  warning {}: {warning}", unit.key);
        }
    }
    if !batch.is_clean() {
        return Err(miette!("{} of {total} units failed", batch.failed));
    }
    Ok(())
}

async fn status(
    config: &AppConfig,
    collector: &str,
    stale_after_hours: Option<u64>,
    detail: bool,
) -> miette::Result<()> {
    let hashes = HashStore::open(&config.data_dir, collector).map_err(render)?;
    let status = collection_status(collector, &hashes).await.map_err(render)?;

    println!("collector: {}", status.namespace);
    println!("units: {}, artifact bytes: {}", status.units, status.total_bytes);
    match status.last_updated {
        Some(t) => println!("last updated: {}", rfc3339(t)),
        None => println!("last updated: never"),
    }
    if detail {
        for record in &status.records {
            println!(
                "  {}  {}  {}  {}",
                record.unit_key,
                dugout_hash::short(&record.content_hash),
                rfc3339(record.computed_at),
                record.summary.as_deref().unwrap_or("-"),
            );
        }
    }
    if let Some(hours) = stale_after_hours {
        let max_age = Duration::from_secs(hours * 3600);
        if status.is_stale(max_age, OffsetDateTime::now_utc()) {
            return Err(miette!("collection {collector} is stale (no sync within {hours}h)"));
        }
    }
    Ok(())
}

async fn purge(config: &AppConfig, collector: &str, max_age_hours: Option<u64>) -> miette::Result<()> {
    let hours = max_age_hours.unwrap_or(config.retention_hours);
    let hashes = HashStore::open(&config.data_dir, collector).map_err(render)?;
    let removed = hashes.purge_older_than(Duration::from_secs(hours * 3600)).await.map_err(render)?;
    println!("{collector}: removed {removed} hash sidecar(s) older than {hours}h");
    Ok(())
}

/// Turn configuration (plus CLI overrides) into engine options.
fn build_options(config: &AppConfig, force: bool, workers: Option<usize>) -> miette::Result<SyncOptions> {
    let profile: Profile = config.profile.parse().map_err(|e: String| miette!(e))?;
    let mut options = profile.options();
    if let Some(count) = workers.or(config.workers) {
        options.max_concurrency = count;
    }
    if let Some(ms) = config.request_delay_ms {
        options.inter_request_delay = Duration::from_millis(ms);
    }
    options.volatile_fields = dugout_hash::parse_all(&config.volatile_fields).map_err(render)?;
    options.forced = force;
    Ok(options)
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| t.to_string())
}

fn render<K: std::error::Error + Send + Sync + 'static>(err: exn::Exn<K>) -> miette::Report {
    miette!("{}", &*err)
}
