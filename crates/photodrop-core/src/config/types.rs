//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of assets processed concurrently before the next group starts
    pub group_size: usize,

    /// Accepted mime types; anything else is rejected before decode
    pub supported_mime_types: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            group_size: 3,
            supported_mime_types: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
                "image/heic".to_string(),
                "image/heif".to_string(),
            ],
        }
    }
}

impl ProcessingConfig {
    /// Whether a declared mime type is in the supported set (case-insensitive).
    pub fn supports(&self, mime_type: &str) -> bool {
        self.supported_mime_types
            .iter()
            .any(|m| m.eq_ignore_ascii_case(mime_type))
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of assets in one batch
    pub max_files: usize,

    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum output width in pixels
    pub max_width: u32,

    /// Maximum output height in pixels
    pub max_height: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Per-call object store timeout in milliseconds
    pub upload_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_file_size_mb: 10,
            max_width: 1600,
            max_height: 1600,
            decode_timeout_ms: 5000,
            upload_timeout_ms: 30000,
        }
    }
}

impl LimitsConfig {
    /// Maximum file size in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// PNG deflate effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

/// Output encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Lossy WebP quality (1-100)
    pub webp_quality: u8,

    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// PNG compression effort
    pub png_compression: PngCompression,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            webp_quality: 75,
            jpeg_quality: 75,
            png_compression: PngCompression::Default,
        }
    }
}

/// Progress broadcasting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Events buffered per subscriber before new ones are dropped
    pub mailbox_capacity: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 64,
        }
    }
}

/// Which object store backend to write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

/// Object storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection
    pub backend: StorageBackend,

    /// Optional prefix prepended to every object key (e.g. "photos")
    pub key_prefix: Option<String>,

    /// Local filesystem backend
    pub local: LocalStorageConfig,

    /// S3 backend
    pub s3: S3StorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            key_prefix: None,
            local: LocalStorageConfig::default(),
            s3: S3StorageConfig::default(),
        }
    }
}

/// Local filesystem object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStorageConfig {
    /// Root directory for stored objects
    pub root: PathBuf,

    /// Base URL objects are served from
    pub base_url: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.photodrop/objects"),
            base_url: "http://localhost:8080/media".to_string(),
        }
    }
}

/// S3 object store settings. Credentials come from the standard AWS env vars.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3StorageConfig {
    pub bucket: String,
    pub region: String,

    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...)
    pub endpoint: Option<String>,
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
        }
    }
}

/// Metadata persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// JSONL file that metadata records are appended to
    pub path: PathBuf,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.photodrop/photos.jsonl"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
