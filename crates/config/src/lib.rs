//! Configuration loading for dugout.
//!
//! Settings resolve in three layers, each overriding the previous:
//!
//! 1. built-in defaults ([`AppConfig::default`]),
//! 2. a TOML file (`dugout.toml` in the working directory, or an explicit
//!    path),
//! 3. environment variables prefixed `DUGOUT_` (e.g. `DUGOUT_PROFILE`).
//!
//! The resolved [`AppConfig`] is plain data; drivers turn the profile name
//! and volatile-field strings into engine types themselves, so this crate
//! stays a leaf.

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default TOML file looked up in the working directory.
const DEFAULT_FILE: &str = "dugout.toml";

/// Fields the bundled collectors strip before hashing. Remote responses
/// stamp these on every fetch whether or not the data changed.
const DEFAULT_VOLATILE_FIELDS: &[&str] = &[
    "metadata.collection_timestamp",
    "metadata.last_updated",
    "metadata.performance",
    "players[].loaddate",
];

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base directory holding `hash/` and `data/` trees.
    pub data_dir: PathBuf,
    /// Named performance profile (worker count vs. pacing preset).
    pub profile: String,
    /// Override the profile's worker count.
    pub workers: Option<usize>,
    /// Override the profile's per-unit delay, in milliseconds.
    pub request_delay_ms: Option<u64>,
    /// Hash sidecars older than this are eligible for `purge`.
    pub retention_hours: u64,
    /// Field paths stripped before hashing.
    pub volatile_fields: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            profile: "balanced".to_string(),
            workers: None,
            request_delay_ms: None,
            retention_hours: 24,
            volatile_fields: DEFAULT_VOLATILE_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Load configuration, optionally from an explicit file.
    ///
    /// With `file = None` a missing `dugout.toml` is fine (defaults + env
    /// apply); an explicitly named file must exist.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Self::default()));
        let figment = match file {
            Some(path) => figment.merge(Toml::file_exact(path)),
            None => figment.merge(Toml::file(DEFAULT_FILE)),
        };
        let config: Self = figment.merge(Env::prefixed("DUGOUT_")).extract().or_raise(|| ErrorKind::Invalid)?;
        tracing::debug!(data_dir = %config.data_dir.display(), profile = %config.profile, "configuration resolved");
        Ok(config)
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "dugout")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("_data"))
}
