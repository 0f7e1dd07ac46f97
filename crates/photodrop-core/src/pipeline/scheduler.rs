//! Group-bounded scheduling of the per-asset pipeline.
//!
//! A batch is split into groups of `group_size` assets. Groups run one after
//! another; the assets of a group run concurrently, each through
//! validate → analyze → transform → upload. Progress is published from the
//! task driving the batch as each asset finishes, so the completion count a
//! subscriber sees only ever goes up.

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::time::Instant;

use crate::config::Config;
use crate::error::PipelineError;
use crate::progress::ProgressBroadcaster;
use crate::types::{
    AssetState, BatchId, FailureStage, ProgressEvent, RawAsset, SourceInfo, Timings,
    UploadOutcome,
};

use super::analyze::{AnalyzedAsset, FormatAnalyzer};
use super::transform::ImageTransformer;
use super::upload::ObjectStoreUploader;
use super::validate::Validator;

/// Runs assets through the pipeline with bounded concurrency.
pub struct ConcurrentUploadScheduler {
    validator: Validator,
    analyzer: FormatAnalyzer,
    transformer: ImageTransformer,
    uploader: ObjectStoreUploader,
    broadcaster: ProgressBroadcaster,
    group_size: usize,
}

impl ConcurrentUploadScheduler {
    pub fn new(
        config: &Config,
        uploader: ObjectStoreUploader,
        broadcaster: ProgressBroadcaster,
    ) -> Self {
        Self {
            validator: Validator::new(config.processing.clone(), config.limits.clone()),
            analyzer: FormatAnalyzer::new(config.limits.clone(), config.encoding.clone()),
            transformer: ImageTransformer::new(&config.limits),
            uploader,
            broadcaster,
            group_size: config.processing.group_size.max(1),
        }
    }

    /// Override the configured group size.
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size.max(1);
        self
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Process every asset and return one outcome per asset, in submission order.
    ///
    /// Never fails as a whole: errors are confined to the asset that hit them.
    pub async fn run(&self, batch_id: BatchId, assets: Vec<RawAsset>) -> Vec<UploadOutcome> {
        let total = assets.len();
        let mut outcomes: Vec<Option<UploadOutcome>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        let mut pending = assets.into_iter().enumerate();
        let mut group_index = 0;

        loop {
            let group: Vec<(usize, RawAsset)> = pending.by_ref().take(self.group_size).collect();
            if group.is_empty() {
                break;
            }
            tracing::debug!(%batch_id, group = group_index, size = group.len(), "Starting group");

            let mut in_flight: FuturesUnordered<_> = group
                .into_iter()
                .map(|(index, raw)| async move { (index, self.process(raw).await) })
                .collect();

            while let Some((index, outcome)) = in_flight.next().await {
                completed += 1;
                let state = if outcome.is_success() {
                    AssetState::Succeeded
                } else {
                    AssetState::Failed
                };
                let event = ProgressEvent::new(batch_id, outcome.filename(), state, completed, total);
                self.broadcaster.publish(&event);
                outcomes[index] = Some(outcome);
            }

            group_index += 1;
        }

        outcomes.into_iter().flatten().collect()
    }

    async fn process(&self, raw: RawAsset) -> UploadOutcome {
        let started = Instant::now();
        let mut lifecycle = Lifecycle::new(&raw.filename);

        if let Err(e) = self.validator.validate(&raw) {
            return lifecycle.fail(FailureStage::Validation, e);
        }

        lifecycle.advance(AssetState::Analyzing);
        let mime_type = raw.mime_type.clone();
        let declared_format = raw.mime_subtype().to_string();
        let size_bytes = raw.size();
        let AnalyzedAsset {
            metadata,
            target,
            content_hash,
            image,
            ..
        } = match self.analyzer.analyze(raw).await {
            Ok(analyzed) => analyzed,
            Err(e) => return lifecycle.fail(FailureStage::Analyze, e),
        };
        let analyze_ms = started.elapsed().as_millis() as u64;

        lifecycle.advance(AssetState::Transforming);
        let transform_start = Instant::now();
        let transformer = self.transformer.clone();
        let name = lifecycle.filename.clone();
        let detected_format = metadata.detected_format.clone();
        let transformed = tokio::task::spawn_blocking(move || {
            transformer.transform(&image, &target, &metadata, &name)
        })
        .await;
        let processed = match transformed {
            Ok(Ok(processed)) => processed,
            Ok(Err(e)) => return lifecycle.fail(FailureStage::Transform, e),
            Err(e) => {
                let error = PipelineError::Transform {
                    filename: lifecycle.filename.clone(),
                    message: format!("Task join error: {}", e),
                };
                return lifecycle.fail(FailureStage::Transform, error);
            }
        };
        let transform_ms = transform_start.elapsed().as_millis() as u64;

        lifecycle.advance(AssetState::Uploading);
        let upload_start = Instant::now();
        let stored = match self.uploader.upload(&lifecycle.filename, &processed).await {
            Ok(stored) => stored,
            Err(e) => return lifecycle.fail(FailureStage::Upload, e),
        };
        let upload_ms = upload_start.elapsed().as_millis() as u64;

        lifecycle.advance(AssetState::Succeeded);
        tracing::debug!(
            filename = %lifecycle.filename,
            key = %stored.key,
            original_bytes = size_bytes,
            processed_bytes = processed.size(),
            "Uploaded asset"
        );

        UploadOutcome::Success {
            source: SourceInfo {
                filename: lifecycle.filename,
                mime_type,
                size_bytes,
                declared_format,
                detected_format,
                content_hash,
            },
            remote_url: stored.url,
            storage_key: stored.key,
            asset: processed,
            timings: Timings {
                analyze_ms,
                transform_ms,
                upload_ms,
                total_ms: started.elapsed().as_millis() as u64,
            },
        }
    }
}

/// Tracks one asset through its state machine.
struct Lifecycle {
    filename: String,
    state: AssetState,
}

impl Lifecycle {
    fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            state: AssetState::Pending,
        }
    }

    fn advance(&mut self, next: AssetState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(filename = %self.filename, from = ?self.state, to = ?next, "Asset state");
        self.state = next;
    }

    fn fail(mut self, stage: FailureStage, error: PipelineError) -> UploadOutcome {
        self.advance(AssetState::Failed);
        tracing::warn!(
            filename = %self.filename,
            stage = ?stage,
            kind = error.kind(),
            "Asset failed: {error}"
        );
        UploadOutcome::Failure {
            filename: self.filename,
            stage,
            reason: format!("{}: {}", error.kind(), error),
        }
    }
}
