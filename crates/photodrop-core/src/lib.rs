//! Photodrop Core - batch photo ingestion library.
//!
//! Photodrop takes batches of user-submitted photos, normalizes and
//! compresses them, writes the results to object storage, records metadata
//! for every successful upload and reports per-asset progress while it works.
//!
//! # Architecture
//!
//! ```text
//! IngestBatch → validate → analyze → transform → upload ─┐
//!                  (groups of N, concurrent within)      ├→ progress events
//!                                                        └→ BatchResult + one metadata write
//! ```
//!
//! One asset failing never affects its siblings; only an invalid batch or a
//! failed metadata write is reported as an error.
//!
//! # Usage
//!
//! ```rust,ignore
//! use photodrop_core::{Attribution, Config, IngestBatch, IngestService, RawAsset};
//!
//! #[tokio::main]
//! async fn main() -> photodrop_core::Result<()> {
//!     let service = IngestService::from_config(Config::load()?).await?;
//!
//!     let bytes = std::fs::read("beach.jpg")?;
//!     let batch = IngestBatch::new(
//!         Attribution::new("ada", None),
//!         vec![RawAsset::new("beach.jpg", "image/jpeg", bytes)],
//!     );
//!     let mut progress = service.subscribe(batch.id);
//!
//!     let result = service.ingest(batch).await?;
//!     println!("{:?}", result.status());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{
    BatchError, ConfigError, PhotodropError, PipelineError, PipelineResult, Result, StoreError,
};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{
    BatchResultAggregator, ConcurrentUploadScheduler, DiscoveredFile, FileDiscovery,
    FormatAnalyzer, Hasher, ImageTransformer, ObjectStoreUploader,
};
pub use progress::{ProgressBroadcaster, Subscription};
pub use service::IngestService;
pub use store::{MetadataStore, ObjectStore};
pub use types::{
    Attribution, BatchId, BatchResponse, BatchResult, BatchStatus, IngestBatch, MetadataRecord,
    ProgressEvent, RawAsset, UploadOutcome,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
