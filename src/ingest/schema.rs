//! Wire payloads for the ingestion endpoints
//!
//! Harvested records are adapted into these rows at the uploader boundary.
//! The players endpoint has two row layouts, selected by [`PlayerSchema`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::harvest::{
    Element, PlayerRecord, Position, SpecialMoveCategory, SpecialMoveRecord, UnknownValue,
};

/// A payload the endpoint merges on a conflict key.
pub trait ConflictKey {
    fn conflict_key(&self) -> String;
}

/// Player row layout accepted by the players endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerSchema {
    /// Row carries `id`; the endpoint merges on it
    #[default]
    Keyed,

    /// Row without `id`; the endpoint merges on [`canonical_key`] and
    /// requires a positive `number`
    Canonical,
}

impl PlayerSchema {
    /// Adapt `record` to this layout.
    ///
    /// Returns `None` when the layout cannot represent the record.
    pub fn adapt(&self, record: &PlayerRecord) -> Option<PlayerPayload> {
        let mut row = PlayerPayload::from(record);
        match self {
            Self::Keyed => Some(row),
            Self::Canonical => {
                row.id = None;
                row.number.filter(|n| *n > 0).map(|_| row)
            }
        }
    }
}

impl fmt::Display for PlayerSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyed => "keyed",
            Self::Canonical => "canonical",
        })
    }
}

impl FromStr for PlayerSchema {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyed" => Ok(Self::Keyed),
            "canonical" => Ok(Self::Canonical),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Player row as the endpoint stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub number: Option<i64>,
    pub name: String,
    pub ruby: String,
    pub nickname: String,
    pub appeared_works: String,
    pub description: String,
    pub get_methods: Vec<serde_json::Value>,
    pub img_url: String,
    pub view_url: String,

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
    pub category: Vec<String>,
    pub affiliation: Vec<String>,
}

impl From<&PlayerRecord> for PlayerPayload {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            number: record.sequence_number,
            name: record.name.clone(),
            ruby: record.kana_reading.clone(),
            nickname: record.nickname.clone(),
            appeared_works: record.appeared_works.clone(),
            description: record.description.clone(),
            get_methods: Vec::new(),
            img_url: record.image_url.clone(),
            view_url: record.detail_page_url.clone(),
            position: record.position,
            element: record.element,
            kick: record.kick,
            control: record.control,
            technique: record.technique,
            pressure: record.pressure,
            physical: record.physical,
            agility: record.agility,
            intelligence: record.intelligence,
            age_group: record.age_group.clone(),
            grade: record.grade.clone(),
            gender: record.gender.clone(),
            category: record.category_tags.clone(),
            affiliation: record.affiliation_tags.clone(),
        }
    }
}

impl ConflictKey for PlayerPayload {
    fn conflict_key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => canonical_key(self),
        }
    }
}

/// Lowercased `name|ruby|appeared_works|age_group|grade|description|categories`
/// with the categories sorted and comma-joined.
pub fn canonical_key(row: &PlayerPayload) -> String {
    let mut category = row.category.clone();
    category.sort();
    let categories = category.join(",");
    [
        row.name.as_str(),
        row.ruby.as_str(),
        row.appeared_works.as_str(),
        row.age_group.as_str(),
        row.grade.as_str(),
        row.description.as_str(),
        categories.as_str(),
    ]
    .join("|")
    .to_lowercase()
}

/// Special-move row as the endpoint stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialMovePayload {
    pub id: String,
    pub number: u32,
    pub name: String,
    pub description: String,
    pub movie_url: String,
    #[serde(rename = "type")]
    pub kind: SpecialMoveCategory,
}

impl From<&SpecialMoveRecord> for SpecialMovePayload {
    fn from(record: &SpecialMoveRecord) -> Self {
        Self {
            id: record.id.clone(),
            number: record.sequence_number,
            name: record.name.clone(),
            description: record.description.clone(),
            movie_url: record.media_url.clone(),
            kind: record.category,
        }
    }
}

impl ConflictKey for SpecialMovePayload {
    fn conflict_key(&self) -> String {
        self.id.clone()
    }
}
