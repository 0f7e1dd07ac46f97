//! Error types for the Photodrop ingestion pipeline.
//!
//! Errors are split by blast radius: [`PipelineError`] is scoped to a single
//! asset and only ever surfaces in a batch's failure list, [`BatchError`] is
//! returned to the caller and describes the batch as a whole.

use thiserror::Error;

/// Top-level error type for Photodrop operations.
#[derive(Error, Debug)]
pub enum PhotodropError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Batch-fatal errors
    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    /// Collaborator (object or metadata store) errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Per-asset pipeline errors, organized by stage.
///
/// None of these abort a batch: the scheduler turns each one into a
/// `Failure` outcome for the asset that produced it.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Declared mime type is outside the supported set
    #[error("Unsupported file type for {filename}: {mime_type}")]
    UnsupportedFormat { filename: String, mime_type: String },

    /// File exceeds the configured size limit
    #[error("File {filename} exceeds the {max_mb}MB size limit ({size_bytes} bytes)")]
    FileTooLarge {
        filename: String,
        size_bytes: u64,
        max_mb: u64,
    },

    /// Image decoding failed
    #[error("Decode error for {filename}: {message}")]
    Decode { filename: String, message: String },

    /// Resize, rotate or encode failed
    #[error("Transform error for {filename}: {message}")]
    Transform { filename: String, message: String },

    /// Object store write failed
    #[error("Upload error for {filename}: {message}")]
    Upload { filename: String, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {filename} after {timeout_ms}ms")]
    Timeout {
        filename: String,
        stage: String,
        timeout_ms: u64,
    },
}

impl PipelineError {
    /// Short machine-readable kind, used as the `reason` prefix in batch responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "unsupported-type",
            Self::FileTooLarge { .. } => "size-limit",
            Self::Decode { .. } => "decode",
            Self::Transform { .. } => "transform",
            Self::Upload { .. } => "upload",
            Self::Timeout { .. } => "timeout",
        }
    }
}

/// Batch-level errors surfaced directly to the caller.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Empty or malformed batch; no asset was processed
    #[error("Invalid batch: {0}")]
    Validation(String),

    /// The batched metadata write failed after uploads had already succeeded.
    ///
    /// Uploaded objects are not rolled back; their keys are listed so the
    /// caller can reconcile them.
    #[error("Metadata write failed for {} uploaded object(s): {message}", orphaned_keys.len())]
    MetadataWrite {
        message: String,
        orphaned_keys: Vec<String>,
    },
}

/// Errors reported by object and metadata store collaborators.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Photodrop results.
pub type Result<T> = std::result::Result<T, PhotodropError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Convenience type alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
