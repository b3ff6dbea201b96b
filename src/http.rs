//! Page fetching for the harvest loops
//!
//! This module provides the [`PageFetcher`] capability the harvesters are
//! written against, and the reqwest-backed [`HttpFetcher`] used in
//! production.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::USER_AGENT;
use reqwest::{Client as ReqwestClient, StatusCode};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::harvest::{HarvestConfig, HarvestError};

/// Fetches the HTML body of a page.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Fetch `url`, optionally overriding the user agent.
    ///
    /// A non-success status is an error; an empty body is not.
    async fn fetch(&self, url: &Url, user_agent: Option<&str>) -> Result<String, HarvestError>;
}

/// HTTP page fetcher with timeout, retry and optional pacing
#[derive(Clone)]
pub struct HttpFetcher {
    /// The underlying reqwest client
    client: ReqwestClient,

    /// Retries for transient failures
    max_retries: u32,

    /// Delay before the first retry
    retry_backoff: Duration,

    /// Spacing between requests, when enabled
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpFetcher {
    /// Create a fetcher from the harvest configuration
    pub fn new(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let client = ReqwestClient::builder()
            .timeout(config.request_timeout)
            .build()?;

        let limiter = Quota::with_period(Duration::from_millis(config.rate_limit_ms))
            .map(|quota| Arc::new(RateLimiter::direct(quota.allow_burst(NonZeroU32::MIN))));

        Ok(Self {
            client,
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff,
            limiter,
        })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, url: &Url, user_agent: Option<&str>) -> Result<String, HarvestError> {
        let mut attempt = 0;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let mut request = self.client.get(url.clone());
            if let Some(user_agent) = user_agent {
                request = request.header(USER_AGENT, user_agent);
            }

            debug!("Sending GET request to {} (attempt {})", url, attempt + 1);
            let err = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.text().await?);
                }
                Ok(response) => {
                    let status = response.status();
                    let err = HarvestError::Status {
                        status: status.as_u16(),
                        url: url.to_string(),
                    };
                    if !is_transient_status(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) if e.is_timeout() || e.is_connect() => HarvestError::Http(e),
                Err(e) => return Err(e.into()),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            let delay = self.retry_backoff.saturating_mul(1 << attempt.min(16));
            warn!(
                "Transient failure fetching {}: {}; retrying in {:?}",
                url, err, delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}
