//! # inagle - Character Catalog Harvest and Ingest
//!
//! This crate scrapes a paginated character-catalog site, reconciles its
//! compact list view with its detailed parameter view through an opaque join
//! key, and upserts the resulting players and special moves into a remote
//! datastore through an authenticated ingestion endpoint.
//!
//! ## Features
//!
//! - Tolerant HTML field extraction (furigana stripping, `<br>`-aware text,
//!   header-driven table lookup)
//! - Consecutive-empty-page pagination with explicit per-row skip reasons
//! - Page fetching with timeouts, retry with backoff and optional pacing
//! - Sequential batch upload with partial-failure accounting
//! - JSON snapshots of a harvest
//!
//! ## Example
//!
//! ```rust,no_run
//! use inagle::harvest::{HarvestConfig, build_index, harvest_players};
//! use inagle::http::HttpFetcher;
//!
//! #[tokio::main]
//! async fn main() -> inagle::Result<()> {
//!     let config = HarvestConfig::builder().max_pages(10).build()?;
//!     let fetcher = HttpFetcher::new(&config)?;
//!
//!     let index = build_index(&fetcher, &config).await?;
//!     let harvest = harvest_players(&fetcher, &config, &index).await?;
//!
//!     println!("{} players", harvest.players.len());
//!     Ok(())
//! }
//! ```

mod error;
pub mod extract;
pub mod harvest;
pub mod http;
pub mod ingest;

pub use error::{Error, Result};

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::harvest::{HarvestConfig, PlayerRecord, SpecialMoveRecord};
    pub use crate::ingest::{BatchUploader, IngestConfig, UploadSummary};
}
