// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource budgets and usage accounting for slot arbitration.

use serde::{Deserialize, Serialize};

/// Global execution budget. A limit of zero means unlimited for that
/// axis, so a default config only has to pin the process count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceBudget {
    #[serde(default)]
    pub max_processes: u32,
    #[serde(default)]
    pub max_threads: u32,
    #[serde(default)]
    pub max_ram_bytes: u64,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            max_processes: 2,
            max_threads: 0,
            max_ram_bytes: 0,
        }
    }
}

impl ResourceBudget {
    /// Whether the given total usage fits inside this budget. Exact
    /// equality is allowed — limits are totals, not thresholds.
    pub fn admits(&self, usage: &ResourceUsage) -> bool {
        (self.max_processes == 0 || usage.processes <= self.max_processes)
            && (self.max_threads == 0 || usage.threads <= self.max_threads)
            && (self.max_ram_bytes == 0 || usage.ram_bytes <= self.max_ram_bytes)
    }
}

/// Resources requested by, or currently consumed by, a set of jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    #[serde(default)]
    pub processes: u32,
    #[serde(default)]
    pub threads: u32,
    #[serde(default)]
    pub ram_bytes: u64,
}

impl ResourceUsage {
    /// Default request for one job: one process, one thread.
    pub fn one_process(threads: u32) -> Self {
        Self {
            processes: 1,
            threads: threads.max(1),
            ram_bytes: 0,
        }
    }

    pub fn plus(&self, other: &ResourceUsage) -> Self {
        Self {
            processes: self.processes.saturating_add(other.processes),
            threads: self.threads.saturating_add(other.threads),
            ram_bytes: self.ram_bytes.saturating_add(other.ram_bytes),
        }
    }
}

#[cfg(test)]
#[path = "budget_tests.rs"]
mod tests;
