// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration: TOML file merged with environment overrides.
//!
//! Resolution order for each knob: `mproc.toml` (path from `MP_CONFIG`,
//! else `<base>/mproc.toml` if present), then environment variables, then
//! built-in defaults. The base directory itself comes from `MP_TEMP_DIR`
//! or the OS temp dir.

use mp_core::ResourceBudget;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Heartbeat touch interval for monitor claims.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Staleness margin: 10x the heartbeat, so normal scheduling jitter
/// never looks like a crash.
pub const STALE_TIMEOUT: Duration = Duration::from_secs(10);

/// Resource limit check interval.
pub const LIMIT_POLL: Duration = Duration::from_secs(1);

/// Wire shape of `mproc.toml`.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    base_dir: Option<PathBuf>,
    #[serde(default)]
    processor_paths: Vec<PathBuf>,
    budget: Option<ResourceBudget>,
}

/// Resolved daemon/CLI configuration.
#[derive(Debug, Clone)]
pub struct MprocConfig {
    /// Root for all shared state: ledger, claims, commands, tempdirs.
    pub base_dir: PathBuf,
    /// Directories scanned for `*.spec.json` processor specs.
    pub processor_paths: Vec<PathBuf>,
    pub budget: ResourceBudget,
    pub heartbeat_interval: Duration,
    pub stale_timeout: Duration,
    /// Runner loop sleep between polls.
    pub poll_interval: Duration,
}

impl Default for MprocConfig {
    fn default() -> Self {
        Self {
            base_dir: std::env::temp_dir().join("mproc"),
            processor_paths: Vec::new(),
            budget: ResourceBudget::default(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            stale_timeout: STALE_TIMEOUT,
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl MprocConfig {
    /// Load config from file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("MP_TEMP_DIR") {
            config.base_dir = PathBuf::from(dir);
        }

        let config_path = std::env::var("MP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config.base_dir.join("mproc.toml"));
        if config_path.exists() {
            config.apply_file(&config_path)?;
        }
        config.apply_env();
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = file.base_dir {
            self.base_dir = base;
        }
        if !file.processor_paths.is_empty() {
            self.processor_paths = file.processor_paths;
        }
        if let Some(budget) = file.budget {
            self.budget = budget;
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(paths) = std::env::var("MP_PROCESSOR_PATHS") {
            self.processor_paths = std::env::split_paths(&paths).collect();
        }
        if let Some(n) = env_u32("MP_MAX_PROCESSES") {
            self.budget.max_processes = n;
        }
        if let Some(n) = env_u32("MP_MAX_THREADS") {
            self.budget.max_threads = n;
        }
        if let Some(gb) = env_u32("MP_MAX_RAM_GB") {
            self.budget.max_ram_bytes = u64::from(gb) << 30;
        }
    }

    /// Directory watched for dropped `*.json` run requests.
    pub fn commands_dir(&self) -> PathBuf {
        self.base_dir.join("commands")
    }

    /// Root for per-job temporary directories.
    pub fn tempdir_root(&self) -> PathBuf {
        self.base_dir.join("tmp")
    }

    /// Where the runner writes its status snapshot.
    pub fn state_file(&self) -> PathBuf {
        self.base_dir.join("daemon_state.json")
    }

    /// Search paths for resolving `.prv` input stubs.
    pub fn prv_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.processor_paths.clone();
        paths.push(self.base_dir.clone());
        paths
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
