//! # Ingest Configuration Module
//!
//! Settings for the batch uploader. Values come from the process environment
//! (a `.env` file is loaded by the binary) and may be overridden through the
//! builder.
//!
//! ## Environment
//!
//! - `INGEST_API_URL`: base URL the endpoint names are joined onto
//!   (`API_URL_INGEST` is read when it is unset)
//! - `INGEST_KEY`: shared secret sent as `x-ingest-key`
//! - `SUPABASE_ANON_KEY`: optional bearer token
//! - `UPSERT_BATCH_SIZE`: records per request

use std::time::Duration;

use url::Url;

use super::error::IngestError;

pub const ENV_API_URL: &str = "INGEST_API_URL";
pub const ENV_API_URL_FALLBACK: &str = "API_URL_INGEST";
pub const ENV_INGEST_KEY: &str = "INGEST_KEY";
pub const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_BATCH_SIZE: &str = "UPSERT_BATCH_SIZE";

/// Ingestion endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Players,
    SpecialMoves,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Players => "ingest-players",
            Self::SpecialMoves => "ingest-special-moves",
        }
    }
}

/// Configuration for an upload run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Base URL of the ingestion functions; required unless `dry_run`
    pub api_base: Option<Url>,

    /// Shared secret; required unless `dry_run`
    pub ingest_key: Option<String>,

    /// Bearer token for the functions gateway
    pub anon_key: Option<String>,

    /// Records per request
    pub batch_size: usize,

    /// Pause between two requests
    pub batch_delay: Duration,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Harvest and report without uploading
    pub dry_run: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            ingest_key: None,
            anon_key: None,
            batch_size: 200,
            batch_delay: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
            dry_run: false,
        }
    }
}

/// Builder for IngestConfig
#[derive(Debug, Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
    batch_size_raw: Option<String>,
    api_base_raw: Option<String>,
}

impl IngestConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the builder from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Seed the builder from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            config: IngestConfig {
                ingest_key: non_empty(ENV_INGEST_KEY),
                anon_key: non_empty(ENV_ANON_KEY),
                ..IngestConfig::default()
            },
            batch_size_raw: non_empty(ENV_BATCH_SIZE),
            api_base_raw: non_empty(ENV_API_URL).or_else(|| non_empty(ENV_API_URL_FALLBACK)),
        }
    }

    /// Set the API base URL
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base_raw = Some(api_base.into());
        self
    }

    /// Set the shared secret
    pub fn ingest_key(mut self, ingest_key: impl Into<String>) -> Self {
        self.config.ingest_key = Some(ingest_key.into());
        self
    }

    /// Set the bearer token
    pub fn anon_key(mut self, anon_key: impl Into<String>) -> Self {
        self.config.anon_key = Some(anon_key.into());
        self
    }

    /// Set the batch size
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self.batch_size_raw = None;
        self
    }

    /// Set the pause between requests
    pub fn batch_delay(mut self, batch_delay: Duration) -> Self {
        self.config.batch_delay = batch_delay;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.config.request_timeout = request_timeout;
        self
    }

    /// Enable or disable dry-run mode
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let mut config = self.config;

        if let Some(raw) = self.batch_size_raw {
            config.batch_size = raw.trim().parse().map_err(|_| {
                IngestError::Config(format!("{ENV_BATCH_SIZE} is not a number: {raw}"))
            })?;
        }
        if config.batch_size == 0 {
            return Err(IngestError::Config("batch size must be positive".into()));
        }

        if let Some(raw) = self.api_base_raw {
            config.api_base = Some(parse_api_base(&raw)?);
        }

        if !config.dry_run {
            if config.api_base.is_none() {
                return Err(IngestError::Config(format!("{ENV_API_URL} is not set")));
            }
            if config.ingest_key.is_none() {
                return Err(IngestError::Config(format!("{ENV_INGEST_KEY} is not set")));
            }
        }
        Ok(config)
    }
}

impl IngestConfig {
    /// Create a new builder
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder::new()
    }

    /// Full URL of `endpoint`
    pub fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url, IngestError> {
        let base = self
            .api_base
            .as_ref()
            .ok_or_else(|| IngestError::Config(format!("{ENV_API_URL} is not set")))?;
        Ok(base.join(endpoint.path())?)
    }
}

/// Parse the base URL, making sure relative joins append to its path.
fn parse_api_base(raw: &str) -> Result<Url, IngestError> {
    let raw = raw.trim();
    let url = if raw.ends_with('/') {
        Url::parse(raw)?
    } else {
        Url::parse(&format!("{raw}/"))?
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Err(IngestError::Config(format!(
            "unsupported {ENV_API_URL} scheme: {url}"
        )));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_from_environment() {
        let config = IngestConfigBuilder::from_lookup(env(&[
            (ENV_API_URL, "https://x.supabase.co/functions/v1"),
            (ENV_INGEST_KEY, "secret"),
            (ENV_BATCH_SIZE, "50"),
        ]))
        .build()
        .unwrap();

        assert_eq!(config.batch_size, 50);
        assert_eq!(config.ingest_key.as_deref(), Some("secret"));
        assert_eq!(config.anon_key, None);
        assert_eq!(
            config.endpoint_url(Endpoint::Players).unwrap().as_str(),
            "https://x.supabase.co/functions/v1/ingest-players"
        );
        assert_eq!(
            config.endpoint_url(Endpoint::SpecialMoves).unwrap().as_str(),
            "https://x.supabase.co/functions/v1/ingest-special-moves"
        );
    }

    #[test]
    fn test_api_url_fallback_variable() {
        let config = IngestConfigBuilder::from_lookup(env(&[
            (ENV_API_URL_FALLBACK, "https://old.supabase.co/functions/v1"),
            (ENV_INGEST_KEY, "secret"),
        ]))
        .build()
        .unwrap();
        assert_eq!(
            config.endpoint_url(Endpoint::Players).unwrap().as_str(),
            "https://old.supabase.co/functions/v1/ingest-players"
        );

        let config = IngestConfigBuilder::from_lookup(env(&[
            (ENV_API_URL, "https://new.supabase.co/functions/v1"),
            (ENV_API_URL_FALLBACK, "https://old.supabase.co/functions/v1"),
            (ENV_INGEST_KEY, "secret"),
        ]))
        .build()
        .unwrap();
        assert_eq!(
            config.endpoint_url(Endpoint::Players).unwrap().as_str(),
            "https://new.supabase.co/functions/v1/ingest-players"
        );
    }

    #[test]
    fn test_builder_overrides_environment() {
        let config = IngestConfigBuilder::from_lookup(env(&[
            (ENV_API_URL, "https://x.supabase.co/functions/v1/"),
            (ENV_INGEST_KEY, "secret"),
            (ENV_BATCH_SIZE, "not-a-number"),
        ]))
        .batch_size(10)
        .build()
        .unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.batch_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_secret_is_an_error_unless_dry_run() {
        let lookup = env(&[(ENV_API_URL, "https://x.supabase.co/functions/v1/")]);
        let err = IngestConfigBuilder::from_lookup(&lookup).build().unwrap_err();
        assert!(matches!(err, IngestError::Config(msg) if msg.contains(ENV_INGEST_KEY)));

        let config = IngestConfigBuilder::from_lookup(&lookup)
            .dry_run(true)
            .build()
            .unwrap();
        assert!(config.dry_run);
    }

    #[test]
    fn test_invalid_values() {
        assert!(
            IngestConfigBuilder::from_lookup(env(&[(ENV_BATCH_SIZE, "abc")]))
                .dry_run(true)
                .build()
                .is_err()
        );
        assert!(IngestConfig::builder().dry_run(true).batch_size(0).build().is_err());
        assert!(
            IngestConfig::builder()
                .dry_run(true)
                .api_base("not a url")
                .build()
                .is_err()
        );
    }
}
