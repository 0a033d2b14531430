// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parsing of trailing `--key=value` processor arguments.
//!
//! Keys starting with `_` are runner directives, not job content:
//! `--_force_run` bypasses the completion ledger, and
//! `--_request_num_threads=N` forwards a thread request to the slot
//! arbiter and the worker. A key given more than once collects into a
//! list value.

use mp_core::ParamValue;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParamError {
    #[error("expected --key=value, got: {0}")]
    NotAFlag(String),
    #[error("invalid value for --_request_num_threads: {0}")]
    BadThreadCount(String),
}

/// Parsed trailing arguments for one processor invocation.
#[derive(Debug, Default, PartialEq)]
pub struct CliParams {
    pub values: BTreeMap<String, ParamValue>,
    pub force_run: bool,
    pub request_num_threads: Option<u32>,
}

impl CliParams {
    pub fn parse(raw: &[String]) -> Result<Self, ParamError> {
        let mut params = Self::default();
        for arg in raw {
            let Some(flag) = arg.strip_prefix("--") else {
                return Err(ParamError::NotAFlag(arg.clone()));
            };
            let (key, value) = match flag.split_once('=') {
                Some((key, value)) => (key, value),
                None => (flag, ""),
            };
            match key {
                "_force_run" => {
                    params.force_run = !matches!(value, "0" | "false");
                }
                "_request_num_threads" => {
                    let threads: u32 = value
                        .parse()
                        .map_err(|_| ParamError::BadThreadCount(value.to_string()))?;
                    params.request_num_threads = Some(threads);
                }
                _ if key.starts_with('_') => {
                    // unrecognized directives are ignored, as the original
                    // ignored underscore-prefixed keys it did not know
                }
                _ => params.insert(key, ParamValue::parse(value)),
            }
        }
        Ok(params)
    }

    fn insert(&mut self, key: &str, value: ParamValue) {
        match self.values.get_mut(key) {
            Some(ParamValue::List(items)) => items.push(value),
            Some(existing) => {
                let first = existing.clone();
                *existing = ParamValue::List(vec![first, value]);
            }
            None => {
                self.values.insert(key.to_string(), value);
            }
        }
    }
}

#[cfg(test)]
#[path = "params_tests.rs"]
mod tests;
