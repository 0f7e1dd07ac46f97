//! Append-only JSON Lines metadata store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::MetadataStore;
use crate::error::StoreResult;
use crate::output::{OutputFormat, OutputWriter};
use crate::types::MetadataRecord;

/// Appends one JSON object per record to a file.
///
/// A batch is serialized up front and written with a single `write_all`,
/// so a failed serialization leaves the file untouched.
pub struct JsonlMetadataStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetadataStore for JsonlMetadataStore {
    async fn insert_many(&self, records: &[MetadataRecord]) -> StoreResult<()> {
        let mut writer = OutputWriter::new(Vec::new(), OutputFormat::JsonLines, false);
        writer.write_all(records)?;
        let buffer = writer.into_inner();

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;

        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            "Appended metadata records"
        );
        Ok(())
    }
}
