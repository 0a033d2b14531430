// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processor specs and the processor registry.
//!
//! A processor is a named, versioned unit of work with a declared contract:
//! which inputs and outputs it touches, which parameters it accepts, and
//! the command template that invokes it. Specs are published as
//! `*.spec.json` files (an object with a `processors` array) under one or
//! more processor paths.

use crate::value::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unable to find processor: {0}")]
    UnknownProcessor(String),
    #[error("no processor paths configured")]
    NoProcessorPaths,
    #[error("error reading spec file {path}: {source}")]
    ReadSpec {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error parsing spec file {path}: {source}")]
    ParseSpec {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One declared input, output, or parameter of a processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ParamValue>,
}

/// Declared contract and invocation template for one processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSpec {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Command template. `$(arguments)`, `$(tempdir)`, `$(basepath)`, and
    /// `$name$` placeholders are substituted at launch time.
    pub exe_command: String,
    /// Directory of the spec file that declared this processor, for
    /// `$(basepath)` substitution. Set at load time, not serialized.
    #[serde(skip)]
    pub basepath: PathBuf,
    #[serde(default)]
    pub inputs: Vec<ParamSpec>,
    #[serde(default)]
    pub outputs: Vec<ParamSpec>,
    #[serde(default)]
    pub parameters: Vec<ParamSpec>,
}

impl ProcessorSpec {
    pub fn input(&self, name: &str) -> Option<&ParamSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&ParamSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Wire shape of a `*.spec.json` file.
#[derive(Debug, Deserialize)]
struct SpecFile {
    #[serde(default)]
    processors: Vec<ProcessorSpec>,
}

/// Read-only lookup of processor specs loaded from disk.
#[derive(Debug, Default, Clone)]
pub struct ProcessorRegistry {
    processors: BTreeMap<String, ProcessorSpec>,
}

impl ProcessorRegistry {
    /// Load every `*.spec.json` under the given processor paths.
    ///
    /// A later path wins on duplicate processor names. Unreadable or
    /// unparsable spec files are skipped with a warning rather than
    /// failing the whole load, so one broken package does not take down
    /// the registry.
    pub fn load(paths: &[PathBuf]) -> Result<Self, RegistryError> {
        if paths.is_empty() {
            return Err(RegistryError::NoProcessorPaths);
        }
        let mut processors = BTreeMap::new();
        for dir in paths {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "skipping unreadable processor path");
                    continue;
                }
            };
            let mut files: Vec<PathBuf> = entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(".spec.json"))
                })
                .collect();
            files.sort();
            for file in files {
                match Self::load_spec_file(&file) {
                    Ok(specs) => {
                        for spec in specs {
                            debug!(processor = %spec.name, file = %file.display(), "registered processor");
                            processors.insert(spec.name.clone(), spec);
                        }
                    }
                    Err(err) => {
                        warn!(file = %file.display(), error = %err, "skipping bad spec file");
                    }
                }
            }
        }
        Ok(Self { processors })
    }

    fn load_spec_file(path: &Path) -> Result<Vec<ProcessorSpec>, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::ReadSpec {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: SpecFile =
            serde_json::from_str(&text).map_err(|source| RegistryError::ParseSpec {
                path: path.to_path_buf(),
                source,
            })?;
        let basepath = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Ok(parsed
            .processors
            .into_iter()
            .map(|mut spec| {
                spec.basepath = basepath.clone();
                spec
            })
            .collect())
    }

    /// Build a registry from in-memory specs (tests, embedded processors).
    pub fn from_specs(specs: Vec<ProcessorSpec>) -> Self {
        let processors = specs.into_iter().map(|s| (s.name.clone(), s)).collect();
        Self { processors }
    }

    /// Look up one processor's spec.
    pub fn spec(&self, name: &str) -> Result<&ProcessorSpec, RegistryError> {
        self.processors
            .get(name)
            .ok_or_else(|| RegistryError::UnknownProcessor(name.to_string()))
    }

    /// Sorted processor names.
    pub fn names(&self) -> Vec<&str> {
        self.processors.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessorSpec> {
        self.processors.values()
    }
}

#[cfg(test)]
#[path = "processor_tests.rs"]
mod tests;
