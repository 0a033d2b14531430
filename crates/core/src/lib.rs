// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mp-core: data model for the mproc pipeline runner.
//!
//! Processor specs, job descriptors, file fingerprints, unique job codes,
//! and resource budgets. Everything here is pure data plus read-only
//! filesystem probes — no process is ever started from this crate.

pub mod macros;

// `define_id!` expands to paths through this crate, so downstream crates
// need no direct dependency on the id building blocks.
#[doc(hidden)]
pub use nanoid;
#[doc(hidden)]
pub use smol_str;

pub mod budget;
pub mod clock;
pub mod code;
pub mod descriptor;
pub mod fingerprint;
pub mod processor;
pub mod resolve;
pub mod value;

pub use budget::{ResourceBudget, ResourceUsage};
pub use clock::{Clock, FakeClock, SystemClock};
pub use code::{compute_code, hex_digest, UniqueCode, PIPELINE_VERSION};
pub use descriptor::{DescriptorError, JobDescriptor};
pub use fingerprint::{content_hash, file_object, quick_hash, FileFingerprint};
pub use processor::{ParamSpec, ProcessorRegistry, ProcessorSpec, RegistryError};
pub use resolve::{resolve_file_name, ResolveError};
pub use value::ParamValue;
