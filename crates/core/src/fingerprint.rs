// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File fingerprints: cheap identity proxies for job memoization.
//!
//! A fingerprint is path + size + modification time. Two fingerprints that
//! agree on size and mtime are treated as "the same data" for caching; the
//! content hash is the slower, authoritative fallback. Fingerprints are
//! computed fresh for every job evaluation and never cached, since files
//! routinely change between runs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Files larger than this get the bounded-prefix quick hash instead of a
/// full-content read.
pub const QUICK_HASH_PREFIX: u64 = 1024 * 1024;

/// Identity proxy for one file: path, size, mtime, optional content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub size: u64,
    /// Modification time in epoch milliseconds. Zero when the file does
    /// not exist.
    pub last_modified_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl FileFingerprint {
    /// Fingerprint a path. Never fails: a missing file yields a zero
    /// fingerprint (`size: 0`, no timestamp), mirroring the tolerance the
    /// completion check needs for optional file slots.
    pub fn of(path: &Path) -> Self {
        let Ok(meta) = std::fs::metadata(path) else {
            return Self {
                path: path.to_path_buf(),
                size: 0,
                last_modified_ms: 0,
                content_hash: None,
            };
        };
        let last_modified_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            path: path.to_path_buf(),
            size: meta.len(),
            last_modified_ms,
            content_hash: None,
        }
    }

    /// Equal-for-caching check: size+mtime (cheap path), or content hash
    /// when both sides carry one (authoritative path).
    pub fn matches(&self, other: &FileFingerprint) -> bool {
        if let (Some(a), Some(b)) = (&self.content_hash, &other.content_hash) {
            return a == b;
        }
        self.size == other.size && self.last_modified_ms == other.last_modified_ms
    }
}

/// Canonical JSON object for one file, the unit that feeds the unique
/// job code. Missing files serialize as `{path, size: 0}`. Directories
/// additionally list their sorted files and subdirectories recursively,
/// so a changed file anywhere under a directory-valued input changes
/// the job identity.
pub fn file_object(path: &Path) -> serde_json::Value {
    if path.as_os_str().is_empty() {
        return serde_json::json!({});
    }
    let fp = FileFingerprint::of(path);
    if fp.last_modified_ms == 0 && fp.size == 0 && !path.exists() {
        return serde_json::json!({ "path": path.display().to_string(), "size": 0 });
    }
    let mut obj = serde_json::json!({
        "path": path.display().to_string(),
        "size": fp.size,
        "last_modified": fp.last_modified_ms,
    });
    if path.is_dir() {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        if let Ok(entries) = std::fs::read_dir(path) {
            let mut names: Vec<_> = entries
                .flatten()
                .filter_map(|e| e.file_name().into_string().ok())
                .collect();
            names.sort();
            for name in names {
                let child = path.join(&name);
                let entry = serde_json::json!({ "name": name, "object": file_object(&child) });
                if child.is_dir() {
                    dirs.push(entry);
                } else {
                    files.push(entry);
                }
            }
        }
        obj["files"] = serde_json::Value::Array(files);
        obj["directories"] = serde_json::Value::Array(dirs);
    }
    obj
}

/// SHA-256 of the file's full contents, hex encoded.
pub fn content_hash(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(crate::code::hex_digest(&hasher.finalize()))
}

/// Cheaper fingerprint hash for large files: SHA-256 over the first
/// [`QUICK_HASH_PREFIX`] bytes plus the total length.
pub fn quick_hash(path: &Path) -> std::io::Result<String> {
    let meta = std::fs::metadata(path)?;
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut remaining = QUICK_HASH_PREFIX;
    let mut buf = [0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }
    hasher.update(meta.len().to_le_bytes());
    Ok(crate::code::hex_digest(&hasher.finalize()))
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
