//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::{Config, StorageBackend};

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.group_size == 0 {
            return Err(ConfigError::ValidationError(
                "processing.group_size must be > 0".into(),
            ));
        }
        if self.processing.supported_mime_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.supported_mime_types must not be empty".into(),
            ));
        }
        if self.limits.max_files == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_files must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_width == 0 || self.limits.max_height == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_width and limits.max_height must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.upload_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.upload_timeout_ms must be > 0".into(),
            ));
        }
        for (name, quality) in [
            ("encoding.webp_quality", self.encoding.webp_quality),
            ("encoding.jpeg_quality", self.encoding.jpeg_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 1 and 100"
                )));
            }
        }
        if self.progress.mailbox_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "progress.mailbox_capacity must be > 0".into(),
            ));
        }
        if self.storage.backend == StorageBackend::S3 && self.storage.s3.bucket.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.s3.bucket is required when storage.backend = \"s3\"".into(),
            ));
        }
        Ok(())
    }
}
