// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loosely-typed job parameter values.
//!
//! Worker parameters arrive either as `--key=value` command-line strings or
//! as JSON from a dropped request file. [`ParamValue`] models both without
//! losing the distinction between numbers and strings, since the canonical
//! job serialization stringifies every parameter the same way regardless of
//! origin.

use serde::{Deserialize, Serialize};

/// A single job parameter value: string, number, or list of either.
///
/// File-valued entries are not represented here — inputs and outputs live
/// in their own maps on the job descriptor and carry plain paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Num(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Parse a raw command-line value. Numeric-looking strings become
    /// numbers so `--freq_min=300` and a JSON `300` hash identically.
    pub fn parse(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<f64>() {
            if n.is_finite() {
                return ParamValue::Num(n);
            }
        }
        ParamValue::Str(raw.to_string())
    }

    /// Stable string form used for canonical serialization and for the
    /// worker command line. Integral numbers render without a decimal
    /// point; lists join with commas.
    pub fn to_arg_string(&self) -> String {
        match self {
            ParamValue::Num(n) => {
                if n.fract() == 0.0 && n.abs() < 9.0e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            ParamValue::Str(s) => s.clone(),
            ParamValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_arg_string()).collect();
                parts.join(",")
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            ParamValue::Num(n) => Some(*n),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_arg_string())
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Num(n)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Num(n as f64)
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
