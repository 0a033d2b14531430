// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker command construction from a processor's `exe_command` template.
//!
//! Templates carry four placeholder kinds:
//! - `$(arguments)` — the full `--key=value` argument list;
//! - `$(tempdir)` — the per-job temporary directory;
//! - `$(basepath)` — the directory of the spec file that declared the
//!   processor;
//! - `$key$` — the first file path bound to input/output `key`, or a
//!   parameter's value.
//!
//! The substituted command is split on whitespace into program + args,
//! which means template tokens cannot contain embedded spaces. That is
//! the same contract the spec files have always been written against.

use mp_core::{JobDescriptor, ProcessorSpec};
use std::path::Path;

/// A fully resolved worker invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Display form for logs.
    pub fn display(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// Build the worker command line for one job.
///
/// Argument order is deterministic: inputs, outputs, parameters (each
/// key-sorted, list-valued entries repeated per file), then the runner
/// directives `--_request_num_threads` (when requested) and `--_tempdir`.
pub fn build_worker_command(
    spec: &ProcessorSpec,
    desc: &JobDescriptor,
    tempdir: &Path,
    request_num_threads: Option<u32>,
) -> WorkerCommand {
    let mut command = spec.exe_command.clone();
    command = command.replace("$(basepath)", &spec.basepath.display().to_string());
    command = command.replace("$(tempdir)", &tempdir.display().to_string());

    let mut arguments = String::new();
    for (key, paths) in desc.inputs.iter().chain(desc.outputs.iter()) {
        if let Some(first) = paths.first() {
            command = command.replace(
                &format!("${}$", key),
                &first.display().to_string(),
            );
        }
        for path in paths {
            arguments.push_str(&format!("--{}={} ", key, path.display()));
        }
    }
    for (key, value) in &desc.parameters {
        command = command.replace(&format!("${}$", key), &value.to_arg_string());
        arguments.push_str(&format!("--{}={} ", key, value.to_arg_string()));
    }
    if let Some(threads) = request_num_threads {
        arguments.push_str(&format!("--_request_num_threads={} ", threads));
    }
    arguments.push_str(&format!("--_tempdir={}", tempdir.display()));

    command = command.replace("$(arguments)", &arguments);

    let mut tokens = command.split_whitespace().map(String::from);
    let program = tokens.next().unwrap_or_default();
    WorkerCommand {
        program,
        args: tokens.collect(),
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
