//! Error types for the ingest module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for ingest operations
#[derive(Debug, Error)]
pub enum IngestError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// The endpoint rejected a batch
    #[error("endpoint returned {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Error summary reported by the endpoint
        message: String,
    },

    /// Missing or invalid ingest configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<IngestError> for CrateError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Http(e) => CrateError::Http(e),
            IngestError::Json(e) => CrateError::Json(e),
            IngestError::UrlParse(e) => CrateError::Url(e),
            IngestError::Config(msg) => CrateError::Config(msg),
            other => CrateError::Ingest(other.to_string()),
        }
    }
}
