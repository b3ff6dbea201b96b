//! Sequential batch upload with partial-failure accounting

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::config::{Endpoint, IngestConfig};
use super::schema::ConflictKey;
use super::transport::IngestTransport;

/// Largest number of invalid entries logged per batch
const MAX_LOGGED_INVALID: usize = 20;

/// Progress notification sent after each batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based batch number
    pub batch: usize,
    pub total_batches: usize,
    pub size: usize,
    pub succeeded: bool,
}

/// Counters for one upload run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Payloads sent after deduplication
    pub total_records: usize,
    /// Payloads dropped as duplicates of an earlier conflict key
    pub duplicates: usize,
    pub total_batches: usize,
    pub total_upserted: usize,
    pub total_invalid: usize,
    pub failed_batches: usize,
}

impl UploadSummary {
    /// Every batch failed and nothing was written.
    pub fn is_total_failure(&self) -> bool {
        self.failed_batches > 0 && self.total_upserted == 0
    }
}

/// Keep the first payload of every conflict key.
///
/// Returns the kept payloads in input order and the number dropped.
pub fn dedup_by_conflict_key<P: ConflictKey>(payloads: Vec<P>) -> (Vec<P>, usize) {
    let mut seen = HashSet::new();
    let before = payloads.len();
    let kept: Vec<P> = payloads
        .into_iter()
        .filter(|p| seen.insert(p.conflict_key()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Uploads payloads in fixed-size batches, one request at a time.
pub struct BatchUploader<T> {
    transport: T,
    batch_size: usize,
    batch_delay: Duration,
}

impl<T: IngestTransport> BatchUploader<T> {
    pub fn new(transport: T, config: &IngestConfig) -> Self {
        Self {
            transport,
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay,
        }
    }

    /// Deduplicate, chunk and send `payloads` to `endpoint`.
    ///
    /// A failed batch is logged and counted; the remaining batches are still
    /// sent. The fixed delay separates consecutive batches.
    #[instrument(skip(self, endpoint, payloads, progress), fields(path = endpoint.path(), records = payloads.len()))]
    pub async fn upload<P: Serialize + ConflictKey + Sync>(
        &self,
        endpoint: Endpoint,
        payloads: Vec<P>,
        progress: Option<mpsc::Sender<BatchProgress>>,
    ) -> UploadSummary {
        let (payloads, duplicates) = dedup_by_conflict_key(payloads);
        if duplicates > 0 {
            warn!("Dropped {} payloads with a duplicate conflict key", duplicates);
        }

        let total_batches = payloads.len().div_ceil(self.batch_size);
        let mut summary = UploadSummary {
            total_records: payloads.len(),
            duplicates,
            total_batches,
            ..UploadSummary::default()
        };

        for (i, batch) in payloads.chunks(self.batch_size).enumerate() {
            if i > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let number = i + 1;
            let succeeded = match self.transport.send_batch(endpoint, batch).await {
                Ok(response) => {
                    let upserted = response.upserted.unwrap_or(batch.len());
                    summary.total_upserted += upserted;
                    if response.invalid_count > 0 {
                        summary.total_invalid += response.invalid_count;
                        for entry in response.invalid.iter().flatten().take(MAX_LOGGED_INVALID) {
                            warn!("  invalid row {}: {}", entry.index, entry.reason);
                        }
                    }
                    info!(
                        "Batch {}/{}: upserted {} (invalid {})",
                        number, total_batches, upserted, response.invalid_count
                    );
                    true
                }
                Err(e) => {
                    warn!("Batch {}/{} failed: {}", number, total_batches, e);
                    summary.failed_batches += 1;
                    false
                }
            };

            if let Some(progress) = &progress {
                let _ = progress
                    .send(BatchProgress {
                        batch: number,
                        total_batches,
                        size: batch.len(),
                        succeeded,
                    })
                    .await;
            }
        }

        info!(
            "Upload finished: {} upserted, {} invalid, {}/{} batches failed",
            summary.total_upserted, summary.total_invalid, summary.failed_batches, total_batches
        );
        summary
    }
}
