// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The completion ledger: memoization of successfully finished jobs.
//!
//! A marker file named `<code>.json` means "this exact job has completed
//! successfully". The ledger is an optimization, never a correctness
//! store: a lost marker only causes redundant recomputation, so write
//! failures are logged and swallowed rather than propagated.

use mp_core::code::canonical_object;
use mp_core::{compute_code, JobDescriptor, ProcessorSpec, UniqueCode};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Persisted map from unique job code to "already ran successfully".
#[derive(Debug, Clone)]
pub struct CompletionLedger {
    dir: PathBuf,
}

impl CompletionLedger {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Ledger rooted at `<base>/completed_processes`.
    pub fn in_base(base: &Path) -> std::io::Result<Self> {
        Self::new(base.join(crate::COMPLETED_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn marker_path(&self, code: &UniqueCode) -> PathBuf {
        self.dir.join(format!("{}.json", code))
    }

    /// Whether this exact job has already run successfully.
    ///
    /// A marker only counts if every input and output file the descriptor
    /// references still exists — a stale entry whose files were deleted is
    /// treated as not-completed, since re-running is the only way to bring
    /// the outputs back.
    pub fn already_completed(&self, desc: &JobDescriptor, spec: &ProcessorSpec) -> bool {
        if !desc.all_files_exist() {
            return false;
        }
        let code = compute_code(desc, spec);
        self.marker_path(&code).exists()
    }

    /// Record a successful run. Best-effort: verification or write
    /// failures are logged, never surfaced. Racing writers both land on
    /// "already exists", which is success.
    pub fn record_completed(&self, desc: &JobDescriptor, spec: &ProcessorSpec) {
        if !desc.all_files_exist() {
            warn!(
                processor = %desc.processor_name,
                "not recording completion: not all input and output files exist"
            );
            return;
        }
        let code = compute_code(desc, spec);
        let path = self.marker_path(&code);
        let body = canonical_object(desc, spec).to_string();
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                if let Err(err) = file.write_all(body.as_bytes()) {
                    warn!(path = %path.display(), error = %err, "error writing completion marker");
                } else {
                    debug!(processor = %desc.processor_name, code = %code, "recorded completion");
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                debug!(code = %code, "completion already recorded");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "error creating completion marker");
            }
        }
    }
}

#[cfg(test)]
#[path = "completed_tests.rs"]
mod tests;
