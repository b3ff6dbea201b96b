//! # Ingest Module
//!
//! This module pushes harvested records to the remote ingestion endpoints.
//!
//! ## Key Components
//!
//! - `schema`: wire rows for both endpoints and the player layouts
//! - `BatchUploader`: deduplication, chunking, pacing and run statistics
//! - `HttpIngestTransport`: authenticated POSTs to the endpoints
//! - `IngestConfig`: endpoint, secrets and batch settings from the environment

mod config;
mod error;
pub mod schema;
mod transport;
mod uploader;

pub use config::{
    ENV_ANON_KEY, ENV_API_URL, ENV_API_URL_FALLBACK, ENV_BATCH_SIZE, ENV_INGEST_KEY, Endpoint,
    IngestConfig, IngestConfigBuilder,
};
pub use error::IngestError;
pub use schema::{
    ConflictKey, PlayerPayload, PlayerSchema, SpecialMovePayload, canonical_key,
};
pub use transport::{
    HttpIngestTransport, INGEST_KEY_HEADER, IngestResponse, IngestTransport, InvalidEntry,
};
pub use uploader::{BatchProgress, BatchUploader, UploadSummary, dedup_by_conflict_key};

use tracing::warn;

use crate::harvest::{PlayerRecord, SpecialMoveRecord};

/// Adapt player records to `schema`, dropping rows the layout cannot carry.
pub fn player_payloads(records: &[PlayerRecord], schema: PlayerSchema) -> Vec<PlayerPayload> {
    records
        .iter()
        .filter_map(|record| {
            let row = schema.adapt(record);
            if row.is_none() {
                warn!(
                    "Dropping {} ({}): no catalog number for the {} layout",
                    record.name, record.id, schema
                );
            }
            row
        })
        .collect()
}

/// Adapt special-move records to their wire rows.
pub fn special_move_payloads(records: &[SpecialMoveRecord]) -> Vec<SpecialMovePayload> {
    records.iter().map(SpecialMovePayload::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::schema::tests::record;

    #[test]
    fn test_canonical_layout_drops_unnumbered_players() {
        let records = vec![record("a", Some(1)), record("b", None), record("c", Some(2))];

        assert_eq!(player_payloads(&records, PlayerSchema::Keyed).len(), 3);

        let rows = player_payloads(&records, PlayerSchema::Canonical);
        let numbers: Vec<_> = rows.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![Some(1), Some(2)]);
    }
}
