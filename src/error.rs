//! Error types for the inagle crate

use thiserror::Error;

/// Result type for inagle operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for inagle operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// A scrape target answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Harvest error
    #[error("Harvest error: {0}")]
    Harvest(String),

    /// Ingest error
    #[error("Ingest error: {0}")]
    Ingest(String),
}
