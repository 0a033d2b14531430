// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job descriptors: a validated request to run one processor.

use crate::processor::ProcessorSpec;
use crate::value::ParamValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DescriptorError {
    #[error("missing required {kind}: {name}")]
    MissingRequired { kind: &'static str, name: String },
    #[error("unexpected parameter: {0}")]
    UnknownParameter(String),
    #[error("processor name mismatch: descriptor says {descriptor}, spec says {spec}")]
    ProcessorMismatch { descriptor: String, spec: String },
}

/// An immutable, validated description of one unit of work.
///
/// Inputs and outputs map declared names to one or more file paths;
/// parameters map names to scalar values. `BTreeMap` keeps every map
/// key-sorted so serialization is canonical by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub processor_name: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<PathBuf>>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Vec<PathBuf>>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

impl JobDescriptor {
    /// Build a descriptor from flat `--key=value` style arguments,
    /// splitting them into inputs/outputs/parameters according to the
    /// processor's declared contract.
    ///
    /// Validation happens here, before anything executes: required names
    /// must be present, unknown names are rejected, and optional
    /// parameters pick up their declared defaults. Keys starting with
    /// `_` are runner directives (`_force_run`, `_request_num_threads`),
    /// not job content, and are ignored.
    pub fn from_args(
        spec: &ProcessorSpec,
        args: &BTreeMap<String, ParamValue>,
    ) -> Result<Self, DescriptorError> {
        let mut inputs = BTreeMap::new();
        let mut outputs = BTreeMap::new();
        let mut parameters = BTreeMap::new();

        for (key, value) in args {
            if key.starts_with('_') {
                continue;
            }
            if spec.input(key).is_some() {
                inputs.insert(key.clone(), value_to_paths(value));
            } else if spec.output(key).is_some() {
                outputs.insert(key.clone(), value_to_paths(value));
            } else if spec.parameter(key).is_some() {
                parameters.insert(key.clone(), value.clone());
            } else {
                return Err(DescriptorError::UnknownParameter(key.clone()));
            }
        }

        for p in &spec.inputs {
            if !p.optional && !inputs.contains_key(&p.name) {
                return Err(DescriptorError::MissingRequired {
                    kind: "input",
                    name: p.name.clone(),
                });
            }
        }
        for p in &spec.outputs {
            if !p.optional && !outputs.contains_key(&p.name) {
                return Err(DescriptorError::MissingRequired {
                    kind: "output",
                    name: p.name.clone(),
                });
            }
        }
        for p in &spec.parameters {
            if !parameters.contains_key(&p.name) {
                if let Some(default) = &p.default_value {
                    parameters.insert(p.name.clone(), default.clone());
                } else if !p.optional {
                    return Err(DescriptorError::MissingRequired {
                        kind: "parameter",
                        name: p.name.clone(),
                    });
                }
            }
        }

        Ok(Self {
            processor_name: spec.name.clone(),
            inputs,
            outputs,
            parameters,
        })
    }

    /// Every file path referenced by this descriptor, inputs then outputs.
    pub fn referenced_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.inputs
            .values()
            .chain(self.outputs.values())
            .flatten()
    }

    /// True if every referenced input and output file currently exists.
    /// Empty path entries are ignored, matching the original tolerance
    /// for optional file slots passed as empty strings.
    pub fn all_files_exist(&self) -> bool {
        self.referenced_files()
            .filter(|p| !p.as_os_str().is_empty())
            .all(|p| p.exists())
    }
}

fn value_to_paths(value: &ParamValue) -> Vec<PathBuf> {
    match value {
        ParamValue::List(items) => items
            .iter()
            .map(|v| PathBuf::from(v.to_arg_string()))
            .collect(),
        other => vec![PathBuf::from(other.to_arg_string())],
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
