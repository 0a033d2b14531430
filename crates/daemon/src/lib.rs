// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mp-daemon: process supervision and the pipeline runner loop.
//!
//! The supervisor launches one worker process in its own process group,
//! heartbeats its monitor claim, polls resource usage against the job's
//! budget, and guarantees claim cleanup on every exit path. The runner
//! drives a queue of jobs through ledger check → slot claim → supervised
//! execution, picking up new work from a file-drop commands directory.

pub mod command;
pub mod env;
pub mod protocol;
pub mod runner;
pub mod supervisor;
pub mod usage;

pub use command::{build_worker_command, WorkerCommand};
pub use env::{ConfigError, MprocConfig};
pub use protocol::{JobId, JobState, JobStatusEntry, RunRequest, StatusSnapshot};
pub use runner::{enqueue, PipelineRunner, RunnerError};
pub use supervisor::{supervise, JobOutcome, SupervisorConfig, SupervisorError};
