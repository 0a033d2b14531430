// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource usage probe for a running worker.
//!
//! Reads `/proc/<pid>/status` (Linux). On other platforms, or once the
//! process has exited, the probe returns `None` and the limit check is
//! skipped for that tick — the exit poll catches the process shortly
//! after anyway.

use mp_core::ResourceUsage;

/// Current usage of one process: RSS bytes and thread count.
pub fn probe_usage(pid: u32) -> Option<ResourceUsage> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    let mut usage = ResourceUsage {
        processes: 1,
        threads: 0,
        ram_bytes: 0,
    };
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            usage.ram_bytes = parse_kb(rest).unwrap_or(0) * 1024;
        } else if let Some(rest) = line.strip_prefix("Threads:") {
            usage.threads = rest.trim().parse().unwrap_or(0);
        }
    }
    Some(usage)
}

fn parse_kb(rest: &str) -> Option<u64> {
    rest.trim().strip_suffix("kB")?.trim().parse().ok()
}

/// Whether `usage` violates any limit the job requested. Zero limits are
/// unenforced; thread and RAM checks are strict `>` so a worker using
/// exactly its request is in bounds.
pub fn exceeds_limit(usage: &ResourceUsage, limit: &ResourceUsage) -> bool {
    (limit.ram_bytes > 0 && usage.ram_bytes > limit.ram_bytes)
        || (limit.threads > 0 && usage.threads > limit.threads)
}

#[cfg(test)]
#[path = "usage_tests.rs"]
mod tests;
