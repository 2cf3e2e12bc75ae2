//! Error types for quotediff.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    #[error("Extraction error in block {block}: {reason}")]
    Extraction { block: usize, reason: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Backend timed out after {0}ms")]
    BackendTimeout(u64),

    #[error("Schema mismatch for {field}: {value:?} ({reason})")]
    SchemaMismatch {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Nothing to compare: {0}")]
    NothingToCompare(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether another attempt against the backend may succeed.
    /// `Http` covers client errors (4xx other than 429) and is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Backend(_) | Error::BackendTimeout(_) | Error::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
