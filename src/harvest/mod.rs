//! # Catalog Harvest Module
//!
//! This module scrapes the catalog site and reconciles its two views of every
//! character into unified records. It is the first stage of the pipeline;
//! its output is handed to [`crate::ingest`].
//!
//! ## Key Components
//!
//! - `build_index`: walks the compact list pages into a [`ListIndex`]
//! - `harvest_players`: walks the detail pages and joins them against the index
//! - `harvest_special_moves`: walks the four special-move listings
//! - `HarvestConfig`: pagination, politeness and endpoint settings
//!
//! Pagination is strictly sequential: every loop's stop condition depends on
//! the page before it.

mod config;
mod error;
mod list_index;
mod pagination;
mod players;
pub mod snapshot;
mod special_moves;

pub use config::{
    DEFAULT_BASE_URL, DETAIL_USER_AGENT, HarvestConfig, HarvestConfigBuilder, MoveNumbering,
};
pub use error::HarvestError;
pub use list_index::{ListIndex, ListRowSkip, build_index, build_index_with, parse_list_page};
pub use pagination::{EmptyPageStreak, PageOutcome};
pub use players::{
    DetailRowSkip, PlayerHarvest, UnresolvedRow, harvest_players, parse_detail_page,
};
pub use special_moves::{
    MoveDraft, MoveRowSkip, SequenceCounter, harvest_special_moves, parse_move_page,
    special_move_id,
};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names the site shows for characters and moves that are not released yet.
pub const PLACEHOLDER_NAMES: [&str; 2] = ["？？？", "???"];

/// Whether `name` can never identify a real record.
pub fn is_placeholder_name(name: &str) -> bool {
    name.is_empty() || PLACEHOLDER_NAMES.contains(&name)
}

/// Auxiliary attributes of one character, sourced from the list pages only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListIndexEntry {
    /// Public identifier taken from the name link; may be empty
    pub display_id: String,

    /// Kana reading of the name
    pub kana_reading: String,

    /// Catalog number from the "No" column
    pub sequence_number: Option<i64>,

    /// Category tags in page order
    pub category_tags: Vec<String>,

    /// Team affiliations in page order
    pub affiliation_tags: Vec<String>,
}

/// Player position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    FW,
    MF,
    DF,
    GK,
}

impl FromStr for Position {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FW" => Ok(Self::FW),
            "MF" => Ok(Self::MF),
            "DF" => Ok(Self::DF),
            "GK" => Ok(Self::GK),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Player element, serialized as the glyph the site and the datastore use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Element {
    #[serde(rename = "風")]
    Wind,
    #[serde(rename = "林")]
    Forest,
    #[serde(rename = "火")]
    Fire,
    #[serde(rename = "山")]
    Mountain,
}

impl FromStr for Element {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "風" => Ok(Self::Wind),
            "林" => Ok(Self::Forest),
            "火" => Ok(Self::Fire),
            "山" => Ok(Self::Mountain),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// A value outside one of the fixed vocabularies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value '{0}'")]
pub struct UnknownValue(pub String);

/// Special-move category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialMoveCategory {
    Shoot,
    Offense,
    Defense,
    Keeper,
}

impl SpecialMoveCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shoot => "shoot",
            Self::Offense => "offense",
            Self::Defense => "defense",
            Self::Keeper => "keeper",
        }
    }
}

impl fmt::Display for SpecialMoveCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A character reconciled from its detail row and list-index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Stable identifier
    pub id: String,

    /// Join key the record was resolved through
    pub join_key: String,

    pub sequence_number: Option<i64>,
    pub name: String,
    pub kana_reading: String,
    pub nickname: String,
    pub appeared_works: String,
    pub description: String,
    pub image_url: String,
    pub detail_page_url: String,

    pub position: Option<Position>,
    pub element: Option<Element>,
    pub kick: Option<i32>,
    pub control: Option<i32>,
    pub technique: Option<i32>,
    pub pressure: Option<i32>,
    pub physical: Option<i32>,
    pub agility: Option<i32>,
    pub intelligence: Option<i32>,

    pub age_group: String,
    pub grade: String,
    pub gender: String,
    pub category_tags: Vec<String>,
    pub affiliation_tags: Vec<String>,
}

/// A special move from one of the category listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialMoveRecord {
    /// SHA-256 of `name|<data-movie attribute as written>`
    pub id: String,
    pub sequence_number: u32,
    pub name: String,
    pub description: String,
    pub media_url: String,
    pub category: SpecialMoveCategory,
}

/// Per-reason skip tally for one harvest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipCounts {
    counts: BTreeMap<&'static str, usize>,
}

impl SkipCounts {
    pub fn record(&mut self, reason: &'static str) {
        *self.counts.entry(reason).or_default() += 1;
    }

    pub fn get(&self, reason: &str) -> usize {
        self.counts.get(reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

impl fmt::Display for SkipCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(reason, count)| format!("{reason}={count}"))
            .collect();
        f.write_str(&parts.join(" "))
    }
}
