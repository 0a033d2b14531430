// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process supervision: launch one worker, heartbeat its claim, enforce
//! resource limits, and guarantee claim cleanup on every exit path.
//!
//! The worker runs in its own process group so a kill reaches any
//! children it spawned. Termination escalates: SIGTERM to the group,
//! a grace period, then SIGKILL.

use crate::command::WorkerCommand;
use crate::protocol::JobState;
use crate::usage::{exceeds_limit, probe_usage};
use mp_core::{JobDescriptor, ResourceUsage};
use mp_ledger::ClaimGuard;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("error launching worker {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("error waiting on worker {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Supervision timing knobs.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Claim heartbeat interval.
    pub heartbeat: Duration,
    /// Resource usage probe interval.
    pub limit_poll: Duration,
    /// Delay between SIGTERM and SIGKILL.
    pub kill_grace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat: crate::env::HEARTBEAT_INTERVAL,
            limit_poll: crate::env::LIMIT_POLL,
            kill_grace: Duration::from_secs(5),
        }
    }
}

/// Terminal result of one supervised worker.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub state: JobState,
    pub exit_code: Option<i32>,
    pub detail: Option<String>,
}

impl JobOutcome {
    fn killed(detail: impl Into<String>) -> Self {
        Self {
            state: JobState::Killed,
            exit_code: None,
            detail: Some(detail.into()),
        }
    }
}

/// Run one worker to completion.
///
/// Expected output files are removed up front, so a marker left by a
/// previous run can never masquerade as this run's result. After a clean
/// exit every declared output must exist on disk or the job is failed.
/// The claim guard, when present, is heartbeated while the worker runs
/// and released when this function returns, whatever the outcome.
pub async fn supervise(
    cmd: &WorkerCommand,
    desc: &JobDescriptor,
    limit: &ResourceUsage,
    claim: Option<ClaimGuard>,
    config: &SupervisorConfig,
    cancel: CancellationToken,
) -> Result<JobOutcome, SupervisorError> {
    remove_existing_outputs(desc);

    let mut child = tokio::process::Command::new(&cmd.program)
        .args(&cmd.args)
        .process_group(0)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| SupervisorError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
    info!(
        processor = %desc.processor_name,
        pid = child.id().unwrap_or(0),
        command = %cmd.display(),
        "worker launched"
    );

    if let Some(stdout) = child.stdout.take() {
        drain_worker_output(stdout, desc.processor_name.clone(), false);
    }
    if let Some(stderr) = child.stderr.take() {
        drain_worker_output(stderr, desc.processor_name.clone(), true);
    }

    let mut heartbeat = tokio::time::interval(config.heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut limit_poll = tokio::time::interval(config.limit_poll);
    limit_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|source| SupervisorError::Wait {
                    program: cmd.program.clone(),
                    source,
                })?;
            }
            _ = heartbeat.tick() => {
                if let Some(claim) = &claim {
                    if let Err(err) = claim.touch() {
                        debug!(error = %err, "claim heartbeat failed");
                    }
                }
            }
            _ = limit_poll.tick() => {
                let over = child
                    .id()
                    .and_then(probe_usage)
                    .filter(|usage| exceeds_limit(usage, limit));
                if let Some(usage) = over {
                    warn!(
                        processor = %desc.processor_name,
                        ram_bytes = usage.ram_bytes,
                        threads = usage.threads,
                        "worker exceeded its resource request, killing"
                    );
                    kill_group(&mut child, config.kill_grace).await;
                    return Ok(JobOutcome::killed(format!(
                        "resource limit exceeded: {} bytes rss, {} threads",
                        usage.ram_bytes, usage.threads
                    )));
                }
            }
            _ = cancel.cancelled() => {
                info!(processor = %desc.processor_name, "worker cancelled, killing");
                kill_group(&mut child, config.kill_grace).await;
                return Ok(JobOutcome::killed("cancelled"));
            }
        }
    };

    let outcome = if status.success() {
        let missing = missing_outputs(desc);
        if missing.is_empty() {
            JobOutcome {
                state: JobState::Succeeded,
                exit_code: Some(0),
                detail: None,
            }
        } else {
            JobOutcome {
                state: JobState::Failed,
                exit_code: Some(0),
                detail: Some(format!(
                    "worker exited cleanly but did not produce: {}",
                    missing
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
            }
        }
    } else {
        let detail = match (status.code(), status.signal()) {
            (Some(code), _) => format!("worker exited with code {code}"),
            (None, Some(signal)) => format!("worker killed by signal {signal}"),
            (None, None) => "worker exited abnormally".to_string(),
        };
        JobOutcome {
            state: JobState::Failed,
            exit_code: status.code(),
            detail: Some(detail),
        }
    };
    info!(
        processor = %desc.processor_name,
        state = %outcome.state,
        exit_code = outcome.exit_code,
        "worker finished"
    );
    drop(claim);
    Ok(outcome)
}

/// SIGTERM the worker's process group, wait out the grace period, then
/// SIGKILL whatever is left.
async fn kill_group(child: &mut Child, grace: Duration) {
    signal_group(child, Signal::SIGTERM);
    let deadline = tokio::time::sleep(grace);
    tokio::pin!(deadline);
    tokio::select! {
        _ = child.wait() => {}
        _ = &mut deadline => {
            signal_group(child, Signal::SIGKILL);
            let _ = child.wait().await;
        }
    }
}

fn signal_group(child: &Child, signal: Signal) {
    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    // Negative pid addresses the whole group; fall back to the direct
    // pid if the group is already gone.
    if kill(Pid::from_raw(-pid), signal).is_err() {
        let _ = kill(Pid::from_raw(pid), signal);
    }
}

fn drain_worker_output<R>(reader: R, processor: String, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                warn!(target: "worker", processor = %processor, "{line}");
            } else {
                info!(target: "worker", processor = %processor, "{line}");
            }
        }
    });
}

fn remove_existing_outputs(desc: &JobDescriptor) {
    for path in desc.outputs.values().flatten() {
        if path.as_os_str().is_empty() {
            continue;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed stale output"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %path.display(), error = %err, "error removing stale output");
            }
        }
    }
}

fn missing_outputs(desc: &JobDescriptor) -> Vec<PathBuf> {
    desc.outputs
        .values()
        .flatten()
        .filter(|path| !path.as_os_str().is_empty() && !path.exists())
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
