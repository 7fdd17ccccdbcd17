//! Typed path access into decoded JSON
//!
//! Loosely-typed payloads (RPC responses, lookup records) are walked with
//! an explicit segment path; failures name the segment that broke so the
//! caller can report exactly which part of a response was malformed.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// One step of a traversal path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seg<'a> {
    Key(&'a str),
    Index(usize),
}

impl fmt::Display for Seg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(key) => write!(f, "{key}"),
            Seg::Index(index) => write!(f, "[{index}]"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TraverseError {
    #[error("expected an object at `{segment}`, found {kind}")]
    NotAnObject { segment: String, kind: &'static str },

    #[error("expected an array at `{segment}`, found {kind}")]
    NotAnArray { segment: String, kind: &'static str },

    #[error("key `{segment}` not found")]
    MissingKey { segment: String },

    #[error("index {index} out of range ({len} elements)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("expected {expected} at the end of the path, found {kind}")]
    WrongType {
        expected: &'static str,
        kind: &'static str,
    },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Walk `value` along `path`, returning the reached node.
pub fn traverse<'v>(value: &'v Value, path: &[Seg<'_>]) -> Result<&'v Value, TraverseError> {
    let mut current = value;
    for seg in path {
        current = match (seg, current) {
            (Seg::Key(key), Value::Object(map)) => {
                map.get(*key).ok_or_else(|| TraverseError::MissingKey {
                    segment: key.to_string(),
                })?
            }
            (Seg::Key(key), other) => {
                return Err(TraverseError::NotAnObject {
                    segment: key.to_string(),
                    kind: kind_of(other),
                });
            }
            (Seg::Index(index), Value::Array(items)) => {
                items.get(*index).ok_or(TraverseError::IndexOutOfRange {
                    index: *index,
                    len: items.len(),
                })?
            }
            (Seg::Index(index), other) => {
                return Err(TraverseError::NotAnArray {
                    segment: Seg::Index(*index).to_string(),
                    kind: kind_of(other),
                });
            }
        };
    }
    Ok(current)
}

/// Integer at `path`. Integral floats are accepted (JSON numbers from the
/// ERP arrive as either).
pub fn i64_at(value: &Value, path: &[Seg<'_>]) -> Result<i64, TraverseError> {
    let node = traverse(value, path)?;
    node.as_i64()
        .or_else(|| node.as_f64().map(|f| f as i64))
        .ok_or(TraverseError::WrongType {
            expected: "number",
            kind: kind_of(node),
        })
}

pub fn str_at<'v>(value: &'v Value, path: &[Seg<'_>]) -> Result<&'v str, TraverseError> {
    let node = traverse(value, path)?;
    node.as_str().ok_or(TraverseError::WrongType {
        expected: "string",
        kind: kind_of(node),
    })
}

pub fn f64_at(value: &Value, path: &[Seg<'_>]) -> Result<f64, TraverseError> {
    let node = traverse(value, path)?;
    node.as_f64().ok_or(TraverseError::WrongType {
        expected: "number",
        kind: kind_of(node),
    })
}

/// Fallback variants: any failure yields the fallback.
pub fn i64_or(value: &Value, path: &[Seg<'_>], fallback: i64) -> i64 {
    i64_at(value, path).unwrap_or(fallback)
}

pub fn str_or<'v>(value: &'v Value, path: &[Seg<'_>], fallback: &'v str) -> &'v str {
    str_at(value, path).unwrap_or(fallback)
}
