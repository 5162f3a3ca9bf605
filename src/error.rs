//! Crate-wide error type.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{stage}: input series is empty")]
    EmptyInput { stage: &'static str },
    #[error("invalid sample at index {index} ({timestamp}): {reason}")]
    Validation {
        index: usize,
        timestamp: NaiveDateTime,
        reason: String,
    },
    #[error("{actual} actual values against {committed} committed values")]
    SeriesLength { actual: usize, committed: usize },
    #[error("lookup failed: {what}")]
    NotFound { what: String },
    #[error("cannot parse timestamp \"{raw}\"")]
    Timestamp { raw: String },
    #[error("line {line}: invalid {field} \"{raw}\"")]
    Field {
        line: u64,
        field: &'static str,
        raw: String,
    },
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}
