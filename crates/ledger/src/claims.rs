// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor claims: filesystem markers for in-flight jobs.
//!
//! A claim file asserts "a supervisor intends to run (or is running) this
//! job". Its modification time doubles as a heartbeat: a live supervisor
//! touches the file periodically, and any process may purge a claim whose
//! mtime has gone stale or whose owning pid is dead. That purge is the
//! whole crash-recovery story — no in-memory registry survives a crash.

use mp_core::{Clock, ParamValue, ResourceUsage, SystemClock};
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

mp_core::define_id! {
    /// Random identifier distinguishing claims for the same processor.
    pub struct ClaimId("clm-");
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("error writing claim file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error creating claims directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Contents of one claim file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorClaim {
    pub processor_name: String,
    pub claim_id: ClaimId,
    /// Pid of the claiming supervisor, for liveness probes.
    pub pid: u32,
    /// Creation time in epoch milliseconds. Stable across heartbeat
    /// touches, used for deterministic claim ordering.
    pub timestamp: u64,
    pub request: ResourceUsage,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

impl MonitorClaim {
    pub fn new(
        processor_name: impl Into<String>,
        request: ResourceUsage,
        parameters: BTreeMap<String, ParamValue>,
        epoch_ms: u64,
    ) -> Self {
        Self {
            processor_name: processor_name.into(),
            claim_id: ClaimId::new(),
            pid: std::process::id(),
            timestamp: epoch_ms,
            request,
            parameters,
        }
    }
}

/// The `running_processes/` directory: create, list, heartbeat, purge.
/// Staleness is judged against the store's clock, so tests can age
/// claims without touching the filesystem.
#[derive(Debug, Clone)]
pub struct ClaimStore<C: Clock = SystemClock> {
    dir: PathBuf,
    clock: C,
}

impl ClaimStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ClaimError> {
        Self::with_clock(dir, SystemClock)
    }

    /// Store rooted at `<base>/running_processes`.
    pub fn in_base(base: &Path) -> Result<Self, ClaimError> {
        Self::new(base.join(crate::RUNNING_DIR))
    }
}

impl<C: Clock> ClaimStore<C> {
    pub fn with_clock(dir: impl Into<PathBuf>, clock: C) -> Result<Self, ClaimError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ClaimError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir, clock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, claim: &MonitorClaim) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", claim.processor_name, claim.claim_id.suffix()))
    }

    /// Write a claim file and return a guard that removes it again on
    /// drop. The write is create-once; claims are never edited in place.
    pub fn write(&self, claim: &MonitorClaim) -> Result<ClaimGuard, ClaimError> {
        let path = self.path_for(claim);
        let body = serde_json::to_string(claim).unwrap_or_default();
        std::fs::write(&path, body).map_err(|source| ClaimError::Write {
            path: path.clone(),
            source,
        })?;
        Ok(ClaimGuard { path, released: false })
    }

    /// All currently parsable claims. Files that vanish mid-listing or
    /// hold garbage are skipped — a competing process may legitimately
    /// delete or still be writing them.
    pub fn list(&self) -> Vec<(PathBuf, MonitorClaim)> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        let mut claims = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<MonitorClaim>(&text) {
                Ok(claim) if !claim.processor_name.is_empty() => claims.push((path, claim)),
                _ => {}
            }
        }
        claims.sort_by(|a, b| a.0.cmp(&b.0));
        claims
    }

    /// Remove claims that are provably dead: heartbeat mtime older than
    /// `timeout` by the store's clock, or owning pid no longer running.
    /// Returns the number purged.
    pub fn purge_stale(&self, timeout: Duration) -> usize {
        let now_ms = self.clock.epoch_ms();
        let mut purged = 0;
        for (path, claim) in self.list() {
            let age_ms = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| mtime.duration_since(UNIX_EPOCH).ok())
                .map(|mtime| now_ms.saturating_sub(mtime.as_millis() as u64));
            let timed_out = age_ms.is_some_and(|age| age > timeout.as_millis() as u64);
            let pid_dead = !pid_alive(claim.pid);
            if timed_out || pid_dead {
                warn!(
                    path = %path.display(),
                    processor = %claim.processor_name,
                    timed_out,
                    pid_dead,
                    "removing stale monitor claim"
                );
                if std::fs::remove_file(&path).is_ok() {
                    purged += 1;
                }
            }
        }
        purged
    }
}

/// Whether a pid refers to a live process (signal 0 probe).
pub fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(pid), None).is_ok()
}

/// Scoped ownership of one claim file. The file is removed when the
/// guard is released or dropped, so every supervisor exit path — success,
/// failure, kill, panic unwind — cleans up its claim.
#[derive(Debug)]
pub struct ClaimGuard {
    path: PathBuf,
    released: bool,
}

impl ClaimGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Heartbeat: refresh the claim file's mtime so competing processes
    /// do not purge it as stale.
    pub fn touch(&self) -> std::io::Result<()> {
        let file = std::fs::OpenOptions::new().append(true).open(&self.path)?;
        file.set_modified(SystemTime::now())
    }

    /// Remove the claim file now.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "released claim"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "error removing claim file");
            }
        }
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

#[cfg(test)]
#[path = "claims_tests.rs"]
mod tests;
