// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Indirect file-reference resolution.
//!
//! A `.prv` file is a small JSON stub standing in for a (possibly large)
//! data file: `{original_path, original_size, original_checksum}`. Inputs
//! referencing a `.prv` are resolved to a concrete local file before
//! fingerprinting, by checking the recorded path and then each configured
//! search path. Only local search — remote resolution is out of scope.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("error reading prv file {path}: {source}")]
    ReadStub {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing prv file {path}: {source}")]
    ParseStub {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to locate file originally at: {0}")]
    NotFound(PathBuf),
}

#[derive(Debug, Deserialize)]
struct PrvStub {
    original_path: PathBuf,
    #[serde(default)]
    original_size: Option<u64>,
}

/// Resolve one file reference. Plain paths pass through unchanged; a
/// `.prv` stub resolves to the first candidate whose size matches the
/// recorded one (recorded path first, then `<search>/<basename>` for each
/// search path).
pub fn resolve_file_name(
    path: &Path,
    search_paths: &[PathBuf],
) -> Result<PathBuf, ResolveError> {
    if path.extension().and_then(|e| e.to_str()) != Some("prv") {
        return Ok(path.to_path_buf());
    }

    let text = std::fs::read_to_string(path).map_err(|source| ResolveError::ReadStub {
        path: path.to_path_buf(),
        source,
    })?;
    let stub: PrvStub =
        serde_json::from_str(&text).map_err(|source| ResolveError::ParseStub {
            path: path.to_path_buf(),
            source,
        })?;

    let mut candidates = vec![stub.original_path.clone()];
    if let Some(name) = stub.original_path.file_name() {
        for dir in search_paths {
            candidates.push(dir.join(name));
        }
    }

    for candidate in candidates {
        let Ok(meta) = std::fs::metadata(&candidate) else {
            continue;
        };
        match stub.original_size {
            Some(size) if meta.len() != size => {
                warn!(
                    candidate = %candidate.display(),
                    expected = size,
                    actual = meta.len(),
                    "prv candidate has wrong size, skipping"
                );
            }
            _ => return Ok(candidate),
        }
    }

    Err(ResolveError::NotFound(stub.original_path))
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod tests;
