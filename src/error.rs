//! Typed failures surfaced through `anyhow::Error`.
//! Callers that need to branch on a kind use `err.downcast_ref::<RowError>()` etc.

use std::io;
use thiserror::Error;

/// A data line (or the document framing) could not be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    /// The line did not split into exactly three fields.
    #[error("row must have exactly 3 fields, found {fields}: line='{line}'")]
    Malformed { line: String, fields: usize },

    /// A field did not parse to its numeric type.
    #[error("cannot parse field `{field}` ({reason}): line='{line}'")]
    Parse {
        line: String,
        field: &'static str,
        reason: String,
    },

    /// The decompressed document had no lines at all, not even the header.
    #[error("document is empty: missing header line")]
    MissingHeader,
}

/// Failures reported by the object store, passed through without retry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("access denied to {bucket}/{key}: {reason}")]
    Access {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("object store failure on {bucket}/{key}: {reason}")]
    Backend {
        bucket: String,
        key: String,
        reason: String,
    },

    #[error("object store i/o: {0}")]
    Io(#[from] io::Error),
}

/// Rejected settings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("workers must be at least 1")]
    NoWorkers,

    #[error("customer id range is empty: min={min} max={max}")]
    EmptyIdRange { min: i64, max: i64 },

    #[error("unknown {what} `{value}`")]
    Unknown { what: &'static str, value: String },
}
