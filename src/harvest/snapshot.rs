//! JSON snapshots of harvested records
//!
//! A snapshot is the harvest output written to disk instead of, or in
//! addition to, being uploaded.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{PlayerRecord, SpecialMoveRecord};
use crate::error::Result;

/// Players snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub players: Vec<PlayerRecord>,
}

/// Special-moves snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialMoveSnapshot {
    pub generated_at: DateTime<Utc>,
    pub count: usize,
    pub special_moves: Vec<SpecialMoveRecord>,
}

impl PlayerSnapshot {
    pub fn new(players: Vec<PlayerRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            count: players.len(),
            players,
        }
    }
}

impl SpecialMoveSnapshot {
    pub fn new(special_moves: Vec<SpecialMoveRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            count: special_moves.len(),
            special_moves,
        }
    }
}

/// Write `document` as pretty JSON, creating parent directories.
pub async fn write_snapshot<T: Serialize>(path: &Path, document: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(document)?;
    tokio::fs::write(path, json).await?;
    info!("Wrote snapshot to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::{SpecialMoveCategory, special_move_id};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_special_move_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("moves.json");
        let moves = vec![SpecialMoveRecord {
            id: special_move_id("ゴッドハンド", ""),
            sequence_number: 1,
            name: "ゴッドハンド".into(),
            description: String::new(),
            media_url: String::new(),
            category: SpecialMoveCategory::Keeper,
        }];

        write_snapshot(&path, &SpecialMoveSnapshot::new(moves))
            .await
            .unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["count"], 1);
        assert_eq!(written["specialMoves"][0]["name"], "ゴッドハンド");
        assert_eq!(written["specialMoves"][0]["category"], "keeper");
        assert!(written["generatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_empty_player_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("players.json");

        write_snapshot(&path, &PlayerSnapshot::new(Vec::new()))
            .await
            .unwrap();

        let read: PlayerSnapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read.count, 0);
        assert!(read.players.is_empty());
    }
}
