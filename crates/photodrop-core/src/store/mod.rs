//! Collaborators the pipeline writes to: object storage for binaries and a
//! metadata store for records.
//!
//! Both are consumed as `Arc<dyn …>` handles shared across concurrent
//! uploads, so implementations must be `Send + Sync`.

mod jsonl;
mod local;
mod memory;
mod s3;

pub use jsonl::JsonlMetadataStore;
pub use local::LocalObjectStore;
pub use memory::{MemoryMetadataStore, MemoryObjectStore};
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::error::{StoreError, StoreResult};
use crate::types::MetadataRecord;

/// Durable binary storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `bytes` under `key` and return the object's public URL.
    async fn put(&self, key: &str, bytes: Bytes, content_type: &str) -> StoreResult<String>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Persistence for metadata records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist every record in one call; either all are written or an error is returned.
    async fn insert_many(&self, records: &[MetadataRecord]) -> StoreResult<()>;
}

/// Build the configured object store backend.
pub async fn create_object_store(config: &Config) -> StoreResult<Arc<dyn ObjectStore>> {
    match config.storage.backend {
        StorageBackend::Local => {
            let store =
                LocalObjectStore::new(config.storage_root(), config.storage.local.base_url.clone())
                    .await?;
            Ok(Arc::new(store))
        }
        StorageBackend::S3 => {
            let s3 = &config.storage.s3;
            if s3.bucket.is_empty() {
                return Err(StoreError::Config("storage.s3.bucket not configured".to_string()));
            }
            let store = S3ObjectStore::new(s3.bucket.clone(), s3.region.clone(), s3.endpoint.clone())?;
            Ok(Arc::new(store))
        }
    }
}

/// Build the configured metadata store.
pub fn create_metadata_store(config: &Config) -> Arc<dyn MetadataStore> {
    Arc::new(JsonlMetadataStore::new(config.metadata_path()))
}
