// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mp-ledger: filesystem-coordinated persistence for the pipeline runner.
//!
//! Two shared directories are the only coordination medium between
//! independent mproc processes:
//!
//! - `completed_processes/` — one marker file per finished job, keyed by
//!   its unique code (the completion ledger);
//! - `running_processes/` — one monitor-claim file per in-flight job,
//!   heartbeat-touched while alive (the claim store).
//!
//! All mutation is create-once or create/delete-with-recheck; nothing is
//! edited in place, so races resolve through existence checks alone.

pub mod arbiter;
pub mod claims;
pub mod completed;

pub use arbiter::{BackoffPolicy, SlotArbiter};
pub use claims::{ClaimError, ClaimGuard, ClaimId, ClaimStore, MonitorClaim};
pub use completed::CompletionLedger;

/// Subdirectory of the base dir holding completion markers.
pub const COMPLETED_DIR: &str = "completed_processes";

/// Subdirectory of the base dir holding monitor claims.
pub const RUNNING_DIR: &str = "running_processes";
