//! Fatal configuration errors.
//!
//! Anything in here aborts the running stage before it writes output. Row-level
//! problems are never reported through this type; stages count them in their
//! summaries instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("table {table} is missing required column {column:?}")]
    MissingColumn { table: String, column: String },

    #[error("vector dimension mismatch: internal vectors have {internal} dimensions, external vectors have {external}")]
    DimensionMismatch { internal: usize, external: usize },

    #[error("row count mismatch: expected {expected} vectors, found {actual}")]
    RowCountMismatch { expected: usize, actual: usize },

    #[error("cached vectors under key {key} were computed for a different label list")]
    CacheLabelMismatch { key: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("no usable {what} in input")]
    EmptyInput { what: String },
}

impl ConfigError {
    pub fn missing_column(table: &str, column: &str) -> Self {
        ConfigError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub fn invalid(name: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
