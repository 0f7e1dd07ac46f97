//! Batch ingestion entry point.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{BatchError, Result};
use crate::pipeline::{BatchResultAggregator, ConcurrentUploadScheduler, ObjectStoreUploader};
use crate::progress::{ProgressBroadcaster, Subscription};
use crate::store::{self, MetadataStore, ObjectStore};
use crate::types::{BatchId, BatchResult, IngestBatch};

/// Validates batches, runs them through the scheduler and aggregates the result.
pub struct IngestService {
    config: Config,
    scheduler: ConcurrentUploadScheduler,
    aggregator: BatchResultAggregator,
    broadcaster: ProgressBroadcaster,
}

impl IngestService {
    pub fn new(
        config: Config,
        object_store: Arc<dyn ObjectStore>,
        metadata_store: Arc<dyn MetadataStore>,
    ) -> Self {
        let broadcaster = ProgressBroadcaster::new(&config.progress);
        Self::with_broadcaster(config, object_store, metadata_store, broadcaster)
    }

    /// Build a service that publishes to an existing broadcaster.
    pub fn with_broadcaster(
        config: Config,
        object_store: Arc<dyn ObjectStore>,
        metadata_store: Arc<dyn MetadataStore>,
        broadcaster: ProgressBroadcaster,
    ) -> Self {
        let uploader =
            ObjectStoreUploader::new(object_store, config.storage.key_prefix.clone(), &config.limits);
        let scheduler = ConcurrentUploadScheduler::new(&config, uploader, broadcaster.clone());
        Self {
            config,
            scheduler,
            aggregator: BatchResultAggregator::new(metadata_store),
            broadcaster,
        }
    }

    /// Build a service with the stores named in the configuration.
    pub async fn from_config(config: Config) -> Result<Self> {
        let object_store = store::create_object_store(&config).await?;
        let metadata_store = store::create_metadata_store(&config);
        Ok(Self::new(config, object_store, metadata_store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn broadcaster(&self) -> &ProgressBroadcaster {
        &self.broadcaster
    }

    /// Open a progress subscription for a batch. Open it before calling
    /// [`ingest`](Self::ingest); earlier events are not replayed.
    pub fn subscribe(&self, batch_id: BatchId) -> Subscription {
        self.broadcaster.subscribe(batch_id)
    }

    /// Reject batches that must not be processed at all.
    pub fn validate_batch(&self, batch: &IngestBatch) -> std::result::Result<(), BatchError> {
        if batch.attribution.uploader_name.trim().is_empty() {
            return Err(BatchError::Validation("uploader name is required".to_string()));
        }
        if batch.assets.is_empty() {
            return Err(BatchError::Validation("no files were submitted".to_string()));
        }
        let max_files = self.config.limits.max_files;
        if batch.assets.len() > max_files {
            return Err(BatchError::Validation(format!(
                "{} files submitted, at most {} are allowed per batch",
                batch.assets.len(),
                max_files
            )));
        }
        Ok(())
    }

    /// Process a batch end to end.
    ///
    /// Per-asset failures are reported inside the returned [`BatchResult`];
    /// an `Err` means the batch was rejected up front or its metadata could
    /// not be persisted.
    pub async fn ingest(&self, batch: IngestBatch) -> std::result::Result<BatchResult, BatchError> {
        self.validate_batch(&batch)?;

        let IngestBatch {
            id,
            attribution,
            assets,
        } = batch;
        tracing::info!(
            batch_id = %id,
            files = assets.len(),
            uploader = %attribution.uploader_name,
            group_size = self.scheduler.group_size(),
            "Ingesting batch"
        );

        let outcomes = self.scheduler.run(id, assets).await;
        self.aggregator.aggregate(id, &attribution, outcomes).await
    }
}
