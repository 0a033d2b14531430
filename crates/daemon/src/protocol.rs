// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner-facing job types: states, status entries, dropped run requests.

use mp_core::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mp_core::define_id! {
    /// Unique identifier for one job admitted to the runner.
    pub struct JobId("job-");
}

/// Lifecycle of a supervised job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Launching,
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Killed
        )
    }
}

mp_core::simple_display! {
    JobState {
        Queued => "queued",
        Launching => "launching",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Killed => "killed",
    }
}

/// A run request dropped into the commands directory (or enqueued
/// in-process).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub processor_name: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
    /// Skip the completion-ledger check (still records on success).
    #[serde(default)]
    pub force_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_num_threads: Option<u32>,
}

/// One row of runner status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusEntry {
    pub id: JobId,
    pub processor_name: String,
    pub state: JobState,
    /// Worker exit code, when one ran and exited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Error or kill reason for terminal states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// True when the job was satisfied from the completion ledger
    /// without running a worker.
    #[serde(default)]
    pub cached: bool,
}

/// Snapshot written to `daemon_state.json` and returned by status
/// queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub jobs: Vec<JobStatusEntry>,
}

impl StatusSnapshot {
    pub fn count_in(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|j| j.state == state).count()
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
