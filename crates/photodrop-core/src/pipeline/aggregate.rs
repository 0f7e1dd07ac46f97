//! Turns per-asset outcomes into a batch result and persists metadata.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::BatchError;
use crate::store::MetadataStore;
use crate::types::{Attribution, BatchId, BatchResult, MetadataRecord, UploadOutcome};

/// Collects scheduler outcomes and writes one metadata record per success.
#[derive(Clone)]
pub struct BatchResultAggregator {
    metadata_store: Arc<dyn MetadataStore>,
}

impl BatchResultAggregator {
    pub fn new(metadata_store: Arc<dyn MetadataStore>) -> Self {
        Self { metadata_store }
    }

    /// Build the batch result, persisting records for successful assets in a
    /// single `insert_many` call.
    ///
    /// The call is skipped when nothing succeeded. If it fails, the uploaded
    /// objects stay where they are and their keys come back in
    /// [`BatchError::MetadataWrite`].
    pub async fn aggregate(
        &self,
        batch_id: BatchId,
        attribution: &Attribution,
        outcomes: Vec<UploadOutcome>,
    ) -> Result<BatchResult, BatchError> {
        if outcomes.is_empty() {
            return Err(BatchError::Validation("no files were submitted".to_string()));
        }

        let records = build_records(batch_id, attribution, &outcomes);
        if !records.is_empty() {
            if let Err(e) = self.metadata_store.insert_many(&records).await {
                let orphaned_keys: Vec<String> =
                    records.iter().map(|r| r.storage_key.clone()).collect();
                tracing::error!(
                    %batch_id,
                    orphaned = orphaned_keys.len(),
                    "Metadata write failed after upload: {e}"
                );
                return Err(BatchError::MetadataWrite {
                    message: e.to_string(),
                    orphaned_keys,
                });
            }
        }

        let submitted = outcomes.len();
        let succeeded = records.len();
        let result = BatchResult {
            batch_id,
            outcomes,
            records,
            submitted,
            succeeded,
            failed: submitted - succeeded,
        };

        tracing::info!(
            %batch_id,
            submitted,
            succeeded,
            failed = result.failed,
            status = ?result.status(),
            "Batch complete"
        );
        Ok(result)
    }
}

/// One record per `Success` outcome, in submission order.
pub fn build_records(
    batch_id: BatchId,
    attribution: &Attribution,
    outcomes: &[UploadOutcome],
) -> Vec<MetadataRecord> {
    let now = Utc::now();
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            UploadOutcome::Success {
                source,
                remote_url,
                storage_key,
                asset,
                ..
            } => {
                let capture = &asset.capture;
                Some(MetadataRecord {
                    id: Uuid::new_v4(),
                    batch_id,
                    uploader_name: attribution.uploader_name.clone(),
                    caption: attribution.caption.clone(),
                    photo_url: remote_url.clone(),
                    storage_key: storage_key.clone(),
                    upload_date: capture.captured_at.unwrap_or(now),
                    original_size: source.size_bytes,
                    processed_size: asset.size(),
                    format: asset.format,
                    original_format: source.declared_format.clone(),
                    width: asset.width,
                    height: asset.height,
                    content_hash: source.content_hash.clone(),
                    device_info: (!capture.device.is_unknown()).then(|| capture.device.clone()),
                    location: capture.location,
                })
            }
            UploadOutcome::Failure { .. } => None,
        })
        .collect()
}
