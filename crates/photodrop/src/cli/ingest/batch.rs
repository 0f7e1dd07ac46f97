//! Batch execution: chunking discovered files, live progress and per-batch results.

use indicatif::{ProgressBar, ProgressStyle};
use photodrop_core::{
    Attribution, BatchError, BatchResponse, DiscoveredFile, IngestBatch, IngestService, RawAsset,
};

/// Totals across every batch of one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunTotals {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unreadable: usize,
    pub rejected_batches: usize,
    pub processed_bytes: u64,
}

impl RunTotals {
    /// True when files were found but none made it through.
    pub fn nothing_ingested(&self) -> bool {
        self.succeeded == 0 && (self.failed + self.unreadable) > 0
    }
}

/// Run discovered files through the service in batches of at most `max_files`.
pub async fn run_batches(
    service: &IngestService,
    attribution: &Attribution,
    files: &[DiscoveredFile],
    max_files: usize,
) -> (Vec<BatchResponse>, RunTotals) {
    let progress = create_progress_bar(files.len() as u64);
    let mut responses = Vec::new();
    let mut totals = RunTotals::default();

    for chunk in files.chunks(max_files.max(1)) {
        totals.batches += 1;
        let assets = load_assets(chunk, &mut totals, &progress).await;
        if assets.is_empty() {
            continue;
        }
        let submitted = assets.len();

        let batch = IngestBatch::new(attribution.clone(), assets);
        let batch_id = batch.id;
        let mut subscription = service.subscribe(batch_id);
        let bar = progress.clone();
        let start = bar.position();
        let watcher = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                bar.set_position(start + event.completed as u64);
                bar.set_message(format!("{} ({}%)", event.asset, event.percent_complete));
                if event.is_final() {
                    break;
                }
            }
        });

        let outcome = service.ingest(batch).await;
        watcher.abort();
        progress.set_position(start + submitted as u64);

        match outcome {
            Ok(result) => {
                totals.succeeded += result.succeeded;
                totals.failed += result.failed;
                totals.processed_bytes += result.records.iter().map(|r| r.processed_size).sum::<u64>();
                for failed in result.failed_files() {
                    progress.suspend(|| {
                        tracing::warn!("Failed: {} [{:?}] {}", failed.filename, failed.stage, failed.reason)
                    });
                }
                responses.push(result.to_response());
            }
            Err(BatchError::MetadataWrite {
                message,
                orphaned_keys,
            }) => {
                totals.rejected_batches += 1;
                totals.failed += submitted;
                progress.suspend(|| {
                    tracing::error!(
                        %batch_id,
                        "Metadata write failed: {message}; uploaded objects left in place: {}",
                        orphaned_keys.join(", ")
                    )
                });
            }
            Err(e) => {
                totals.rejected_batches += 1;
                totals.failed += submitted;
                progress.suspend(|| tracing::error!(%batch_id, "Batch rejected: {e}"));
            }
        }
    }

    progress.finish_and_clear();
    (responses, totals)
}

/// Read a chunk of files. Unreadable files are logged and left out of the batch.
async fn load_assets(
    chunk: &[DiscoveredFile],
    totals: &mut RunTotals,
    progress: &ProgressBar,
) -> Vec<RawAsset> {
    let mut assets = Vec::with_capacity(chunk.len());
    for file in chunk {
        match file.load().await {
            Ok(asset) => assets.push(asset),
            Err(e) => {
                totals.unreadable += 1;
                progress.inc(1);
                progress.suspend(|| tracing::error!("Cannot read {:?}: {}", file.path, e));
            }
        }
    }
    assets
}

/// Create a progress bar for batch processing.
fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_message("starting...");
    pb
}
