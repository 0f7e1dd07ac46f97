//! Object store adapter used by the scheduler.

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::store::ObjectStore;
use crate::types::{ProcessedAsset, TargetFormat};

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

/// Names objects and writes them to the configured [`ObjectStore`] under a timeout.
///
/// Cheap to clone; clones share the underlying store handle.
#[derive(Clone)]
pub struct ObjectStoreUploader {
    store: Arc<dyn ObjectStore>,
    key_prefix: Option<String>,
    timeout_ms: u64,
}

impl ObjectStoreUploader {
    pub fn new(store: Arc<dyn ObjectStore>, key_prefix: Option<String>, limits: &LimitsConfig) -> Self {
        let key_prefix = key_prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            store,
            key_prefix,
            timeout_ms: limits.upload_timeout_ms,
        }
    }

    /// Key for a new object: `[<prefix>/]<unix-millis>-<sanitized filename>.<ext>`.
    pub fn object_key(&self, filename: &str, format: TargetFormat) -> String {
        build_key(
            self.key_prefix.as_deref(),
            Utc::now().timestamp_millis(),
            filename,
            format,
        )
    }

    /// Upload a processed asset under a fresh key.
    pub async fn upload(
        &self,
        filename: &str,
        asset: &ProcessedAsset,
    ) -> Result<StoredObject, PipelineError> {
        let key = self.object_key(filename, asset.format);
        let url = self
            .put(filename, &key, asset.bytes.clone(), &asset.content_type)
            .await?;
        Ok(StoredObject { key, url })
    }

    /// Write raw bytes under `key`. Store errors and timeouts both become
    /// [`PipelineError::Upload`] for `filename`.
    pub async fn put(
        &self,
        filename: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, PipelineError> {
        let limit = Duration::from_millis(self.timeout_ms);
        match timeout(limit, self.store.put(key, bytes, content_type)).await {
            Ok(Ok(url)) => Ok(url),
            Ok(Err(e)) => Err(PipelineError::Upload {
                filename: filename.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(PipelineError::Upload {
                filename: filename.to_string(),
                message: format!(
                    "{} store did not answer within {}ms",
                    self.store.backend_name(),
                    self.timeout_ms
                ),
            }),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }
}

fn build_key(prefix: Option<&str>, millis: i64, filename: &str, format: TargetFormat) -> String {
    let name = format!("{}-{}.{}", millis, sanitize_filename(filename), format.as_str());
    match prefix {
        Some(prefix) => format!("{prefix}/{name}"),
        None => name,
    }
}

/// Reduce a client filename to a safe single path segment.
///
/// Directory components are dropped and anything outside `[A-Za-z0-9._-]`
/// becomes `_`. Leading dots are stripped so keys are never hidden files.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "asset".to_string()
    } else {
        cleaned.to_string()
    }
}
