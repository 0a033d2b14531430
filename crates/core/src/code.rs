// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unique job codes: the memoization key for completed work.
//!
//! A code is the SHA-256 of the canonical JSON serialization of a job:
//! pipeline version, processor name and version, fingerprints of every
//! input and output file, and every parameter stringified. `serde_json`'s
//! default map is key-sorted, so the serialization is canonical without
//! any extra normalization pass — identical job content yields identical
//! bytes regardless of argument order.

use crate::descriptor::JobDescriptor;
use crate::fingerprint::file_object;
use crate::processor::ProcessorSpec;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Version stamp folded into every code. Bumping it invalidates all
/// previously recorded completions at once.
pub const PIPELINE_VERSION: &str = "0.1";

/// Fixed-length (64 hex chars) digest identifying one exact job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueCode(String);

impl UniqueCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UniqueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hex-encode a digest.
pub fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// The canonical JSON object a code is derived from. Also the contents of
/// a completion marker, so a marker is self-describing.
pub fn canonical_object(desc: &JobDescriptor, spec: &ProcessorSpec) -> serde_json::Value {
    let file_map = |map: &std::collections::BTreeMap<String, Vec<PathBuf>>| {
        let mut out = serde_json::Map::new();
        for (name, paths) in map {
            let value = if paths.len() == 1 {
                file_object(&paths[0])
            } else {
                serde_json::Value::Array(paths.iter().map(|p| file_object(p)).collect())
            };
            out.insert(name.clone(), value);
        }
        serde_json::Value::Object(out)
    };

    let mut params = serde_json::Map::new();
    for (name, value) in &desc.parameters {
        params.insert(
            name.clone(),
            serde_json::Value::String(value.to_arg_string()),
        );
    }

    serde_json::json!({
        "pipeline_version": PIPELINE_VERSION,
        "processor_name": desc.processor_name,
        "processor_version": spec.version,
        "inputs": file_map(&desc.inputs),
        "outputs": file_map(&desc.outputs),
        "parameters": serde_json::Value::Object(params),
    })
}

/// Compute the unique code for a job. Deterministic: the same semantic
/// job always yields the same code; any changed fingerprint, parameter,
/// or version changes it.
pub fn compute_code(desc: &JobDescriptor, spec: &ProcessorSpec) -> UniqueCode {
    let obj = canonical_object(desc, spec);
    let json = obj.to_string();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    UniqueCode(hex_digest(&hasher.finalize()))
}

#[cfg(test)]
#[path = "code_tests.rs"]
mod tests;
