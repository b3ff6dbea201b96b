//! Error types for the harvest module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The scrape target answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A CSS selector failed to parse
    #[error("Invalid selector '{selector}': {message}")]
    Selector {
        /// The selector source
        selector: String,
        /// Parser message
        message: String,
    },

    /// Invalid harvest configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<HarvestError> for CrateError {
    fn from(err: HarvestError) -> Self {
        match err {
            HarvestError::Http(e) => CrateError::Http(e),
            HarvestError::UrlParse(e) => CrateError::Url(e),
            HarvestError::Status { status, url } => CrateError::Status { status, url },
            HarvestError::Config(msg) => CrateError::Config(msg),
            other => CrateError::Harvest(other.to_string()),
        }
    }
}
