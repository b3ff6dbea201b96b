//! # Harvest Configuration Module
//!
//! Settings for the three pagination loops and the page fetcher, with a
//! builder in the same shape as the rest of the crate's configuration.
//!
//! Defaults mirror the catalog site's own paging: 200 rows per page, at most
//! 999 pages, and five consecutive empty pages before a loop gives up.

use std::time::Duration;

use url::Url;

use super::SpecialMoveCategory;
use super::error::HarvestError;

/// Production catalog host
pub const DEFAULT_BASE_URL: &str = "https://zukan.inazuma.jp";

/// User agent sent with detail and special-move page requests
pub const DETAIL_USER_AGENT: &str = "Mozilla/5.0 (scraper; +cheerio)";

/// How special moves are numbered across the harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveNumbering {
    /// Every list item consumes a number, including placeholder entries
    /// that are filtered out afterwards
    #[default]
    CountAll,

    /// Only emitted moves are numbered, without gaps
    EmittedOnly,
}

/// Configuration for a harvest run
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Root of the catalog site
    pub base_url: Url,

    /// Rows requested per detail page
    pub per_page: u32,

    /// Rows requested per list page
    pub list_per_page: u32,

    /// Upper bound on pages per pagination loop
    pub max_pages: u32,

    /// Consecutive empty pages tolerated before a loop stops
    pub empty_stop: u32,

    /// User agent for detail and special-move pages
    pub user_agent: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Retries for transient failures
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further attempt
    pub retry_backoff: Duration,

    /// Minimum milliseconds between page requests, 0 to disable
    pub rate_limit_ms: u64,

    /// Opaque site query value for each special-move category, in harvest order
    pub move_categories: Vec<(SpecialMoveCategory, String)>,

    /// Special-move numbering policy
    pub move_numbering: MoveNumbering,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL must parse"),
            per_page: 200,
            list_per_page: 200,
            max_pages: 999,
            empty_stop: 5,
            user_agent: DETAIL_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            rate_limit_ms: 0,
            // Unconfirmed query values; override with `move_category`
            move_categories: vec![
                (SpecialMoveCategory::Shoot, "sh".to_string()),
                (SpecialMoveCategory::Offense, "of".to_string()),
                (SpecialMoveCategory::Defense, "df".to_string()),
                (SpecialMoveCategory::Keeper, "kp".to_string()),
            ],
            move_numbering: MoveNumbering::default(),
        }
    }
}

/// Builder for HarvestConfig
#[derive(Debug, Default)]
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HarvestConfig::default(),
        }
    }

    /// Set the catalog root
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.config.base_url = base_url;
        self
    }

    /// Set the detail page size
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.config.per_page = per_page;
        self
    }

    /// Set the list page size
    pub fn list_per_page(mut self, list_per_page: u32) -> Self {
        self.config.list_per_page = list_per_page;
        self
    }

    /// Set the page bound per loop
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the consecutive-empty-page threshold
    pub fn empty_stop(mut self, empty_stop: u32) -> Self {
        self.config.empty_stop = empty_stop;
        self
    }

    /// Set the detail user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.config.request_timeout = request_timeout;
        self
    }

    /// Set the retry budget for transient failures
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the initial retry backoff
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.config.retry_backoff = retry_backoff;
        self
    }

    /// Set the minimum spacing between page requests
    pub fn rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.config.rate_limit_ms = rate_limit_ms;
        self
    }

    /// Override the query value of one special-move category
    pub fn move_category(mut self, category: SpecialMoveCategory, query: impl Into<String>) -> Self {
        let query = query.into();
        match self
            .config
            .move_categories
            .iter_mut()
            .find(|(c, _)| *c == category)
        {
            Some(slot) => slot.1 = query,
            None => self.config.move_categories.push((category, query)),
        }
        self
    }

    /// Set the special-move numbering policy
    pub fn move_numbering(mut self, move_numbering: MoveNumbering) -> Self {
        self.config.move_numbering = move_numbering;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let config = self.config;
        if config.per_page == 0 || config.list_per_page == 0 {
            return Err(HarvestError::Config("page size must be positive".into()));
        }
        if config.empty_stop == 0 {
            return Err(HarvestError::Config(
                "empty-page threshold must be positive".into(),
            ));
        }
        if !matches!(config.base_url.scheme(), "http" | "https") {
            return Err(HarvestError::Config(format!(
                "unsupported base URL scheme: {}",
                config.base_url
            )));
        }
        Ok(config)
    }
}

impl HarvestConfig {
    /// Create a new builder
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder::new()
    }

    /// `{base}/chara_list/?page={page}&per_page={list_per_page}`
    pub fn list_page_url(&self, page: u32) -> Result<Url, HarvestError> {
        let mut url = self.section_url("chara_list")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.list_per_page.to_string());
        Ok(url)
    }

    /// `{base}/chara_param/?page={page}&per_page={per_page}`
    pub fn detail_page_url(&self, page: u32) -> Result<Url, HarvestError> {
        let mut url = self.section_url("chara_param")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.per_page.to_string());
        Ok(url)
    }

    /// `{base}/skill/?page={page}&q={query}`
    pub fn move_page_url(&self, page: u32, query: &str) -> Result<Url, HarvestError> {
        let mut url = self.section_url("skill")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("q", query);
        Ok(url)
    }

    fn section_url(&self, section: &str) -> Result<Url, HarvestError> {
        let root = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{root}/{section}/"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarvestConfig::default();
        assert_eq!(config.per_page, 200);
        assert_eq!(config.max_pages, 999);
        assert_eq!(config.empty_stop, 5);
        assert_eq!(config.user_agent, DETAIL_USER_AGENT);
        assert_eq!(config.move_categories.len(), 4);
        assert_eq!(config.move_numbering, MoveNumbering::CountAll);
    }

    #[test]
    fn test_page_urls() {
        let config = HarvestConfig::builder()
            .base_url(Url::parse("https://zukan.example.jp/").unwrap())
            .per_page(50)
            .build()
            .unwrap();
        assert_eq!(
            config.list_page_url(3).unwrap().as_str(),
            "https://zukan.example.jp/chara_list/?page=3&per_page=200"
        );
        assert_eq!(
            config.detail_page_url(1).unwrap().as_str(),
            "https://zukan.example.jp/chara_param/?page=1&per_page=50"
        );
        assert_eq!(
            config.move_page_url(2, "sh").unwrap().as_str(),
            "https://zukan.example.jp/skill/?page=2&q=sh"
        );
    }

    #[test]
    fn test_move_category_override_keeps_order() {
        let config = HarvestConfig::builder()
            .move_category(SpecialMoveCategory::Defense, "xyz")
            .build()
            .unwrap();
        assert_eq!(
            config.move_categories[2],
            (SpecialMoveCategory::Defense, "xyz".to_string())
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(HarvestConfig::builder().per_page(0).build().is_err());
        assert!(HarvestConfig::builder().empty_stop(0).build().is_err());
        assert!(
            HarvestConfig::builder()
                .base_url(Url::parse("ftp://zukan.example.jp").unwrap())
                .build()
                .is_err()
        );
    }
}
