//! Core data types for the Photodrop ingestion pipeline.
//!
//! These types follow an asset from submission ([`RawAsset`]) through
//! analysis and transformation to its terminal [`UploadOutcome`], and the
//! batch-level views built from those outcomes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PngCompression;

/// Identifier of one submitted batch. Progress events are scoped by it.
pub type BatchId = Uuid;

// === Input ===

/// A user-submitted file, immutable once received.
#[derive(Debug, Clone)]
pub struct RawAsset {
    /// Original filename as submitted
    pub filename: String,

    /// Declared mime type (e.g. "image/jpeg")
    pub mime_type: String,

    /// File contents
    pub bytes: Bytes,
}

impl RawAsset {
    pub fn new(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Subtype of the declared mime type ("image/heic" -> "heic").
    pub fn mime_subtype(&self) -> &str {
        self.mime_type
            .split_once('/')
            .map(|(_, sub)| sub)
            .unwrap_or(&self.mime_type)
    }

    /// Whether the declared type is HEIC or HEIF.
    pub fn is_heif_family(&self) -> bool {
        matches!(
            self.mime_type.to_ascii_lowercase().as_str(),
            "image/heic" | "image/heif"
        )
    }
}

/// Free-text fields supplied alongside a batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attribution {
    pub uploader_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl Attribution {
    pub fn new(uploader_name: impl Into<String>, caption: Option<String>) -> Self {
        Self {
            uploader_name: uploader_name.into(),
            caption,
        }
    }
}

/// One client-submitted set of assets processed together.
#[derive(Debug, Clone)]
pub struct IngestBatch {
    pub id: BatchId,
    pub attribution: Attribution,
    pub assets: Vec<RawAsset>,
}

impl IngestBatch {
    /// Create a batch with a fresh identifier. Open a progress subscription
    /// for `id` before submitting the batch.
    pub fn new(attribution: Attribution, assets: Vec<RawAsset>) -> Self {
        Self {
            id: Uuid::new_v4(),
            attribution,
            assets,
        }
    }
}

// === Analysis ===

/// Geolocation in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Camera that took the photo. Missing fields read "Unknown".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub make: String,
    pub model: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            make: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
        }
    }
}

impl DeviceInfo {
    /// True when neither make nor model was found.
    pub fn is_unknown(&self) -> bool {
        self.make == UNKNOWN && self.model == UNKNOWN
    }
}

pub(crate) const UNKNOWN: &str = "Unknown";

/// Best-effort EXIF-derived capture data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureInfo {
    /// Image orientation (1-8 per EXIF spec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,

    pub device: DeviceInfo,

    /// When the photo was captured (EXIF local time, stored as UTC)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Decoded properties of an asset.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetMetadata {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub has_alpha: bool,
    /// Format detected from content ("jpeg", "png", ...)
    pub detected_format: String,
    pub capture: CaptureInfo,
}

/// Output encoding chosen for an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Webp,
    Png,
    Jpeg,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    /// Content type written alongside the object.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder parameters for a [`TargetFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeQuality {
    /// Lossy quality 1-100 (webp, jpeg)
    Lossy(u8),
    /// Deflate effort (png)
    Png(PngCompression),
}

/// Encoding decision, computed once per asset and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpec {
    pub format: TargetFormat,
    pub quality: EncodeQuality,
}

// === Output ===

/// Result of transforming an asset, ready to upload.
#[derive(Debug, Clone)]
pub struct ProcessedAsset {
    pub bytes: Bytes,
    pub format: TargetFormat,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub capture: CaptureInfo,
}

impl ProcessedAsset {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Wall-clock time spent per stage, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub analyze_ms: u64,
    pub transform_ms: u64,
    pub upload_ms: u64,
    pub total_ms: u64,
}

/// Facts about the submitted file that outlive the raw buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Subtype of the declared mime type ("jpeg", "heic", ...)
    pub declared_format: String,
    /// Format sniffed from the content ("jpeg", "png", "heif", ...)
    pub detected_format: String,
    /// BLAKE3 hash of the submitted bytes
    pub content_hash: String,
}

/// Per-asset lifecycle.
///
/// `Pending → Analyzing → Transforming → Uploading → Succeeded`, with a
/// transition to `Failed` allowed from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetState {
    Pending,
    Analyzing,
    Transforming,
    Uploading,
    Succeeded,
    Failed,
}

impl AssetState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: AssetState) -> bool {
        use AssetState::*;
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, Failed) => true,
            (Pending, Analyzing)
            | (Analyzing, Transforming)
            | (Transforming, Uploading)
            | (Uploading, Succeeded) => true,
            _ => false,
        }
    }
}

/// Stage at which an asset failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Validation,
    Analyze,
    Transform,
    Upload,
}

/// Terminal result for one submitted asset.
#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Success {
        source: SourceInfo,
        remote_url: String,
        storage_key: String,
        asset: ProcessedAsset,
        timings: Timings,
    },
    Failure {
        filename: String,
        stage: FailureStage,
        reason: String,
    },
}

impl UploadOutcome {
    pub fn filename(&self) -> &str {
        match self {
            Self::Success { source, .. } => &source.filename,
            Self::Failure { filename, .. } => filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A failed file as reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub filename: String,
    pub stage: FailureStage,
    pub reason: String,
}

/// Persisted description of one successfully uploaded photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: Uuid,
    pub batch_id: BatchId,
    pub uploader_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    pub photo_url: String,
    pub storage_key: String,

    /// Capture time when known, otherwise the time of upload
    pub upload_date: DateTime<Utc>,

    pub original_size: u64,
    pub processed_size: u64,
    pub format: TargetFormat,
    pub original_format: String,
    pub width: u32,
    pub height: u32,
    pub content_hash: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<DeviceInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Overall classification of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Failure,
}

/// Ordered per-asset outcomes plus the records that were persisted.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub batch_id: BatchId,
    pub outcomes: Vec<UploadOutcome>,
    pub records: Vec<MetadataRecord>,
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn status(&self) -> BatchStatus {
        if self.failed == 0 {
            BatchStatus::Success
        } else if self.succeeded == 0 {
            BatchStatus::Failure
        } else {
            BatchStatus::PartialSuccess
        }
    }

    /// Failed files in submission order.
    pub fn failed_files(&self) -> Vec<FailedFile> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                UploadOutcome::Failure {
                    filename,
                    stage,
                    reason,
                } => Some(FailedFile {
                    filename: filename.clone(),
                    stage: *stage,
                    reason: reason.clone(),
                }),
                UploadOutcome::Success { .. } => None,
            })
            .collect()
    }

    /// Client-facing summary.
    pub fn to_response(&self) -> BatchResponse {
        BatchResponse {
            batch_id: self.batch_id,
            status: self.status(),
            successful_count: self.succeeded,
            failed_count: self.failed,
            failed_files: self.failed_files(),
            records: self.records.clone(),
        }
    }
}

/// Batch summary handed to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub successful_count: usize,
    pub failed_count: usize,
    pub failed_files: Vec<FailedFile>,
    pub records: Vec<MetadataRecord>,
}

/// Published once per asset when it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub batch_id: BatchId,
    /// Filename of the asset that just finished
    pub asset: String,
    pub state: AssetState,
    pub completed: usize,
    pub total: usize,
    /// `completed * 100 / total`, rounded down so it only reaches 100 at the end
    pub percent_complete: u8,
}

impl ProgressEvent {
    pub fn new(
        batch_id: BatchId,
        asset: impl Into<String>,
        state: AssetState,
        completed: usize,
        total: usize,
    ) -> Self {
        let percent_complete = if total == 0 {
            100
        } else {
            (completed.min(total) * 100 / total) as u8
        };
        Self {
            batch_id,
            asset: asset.into(),
            state,
            completed,
            total,
            percent_complete,
        }
    }

    pub fn is_final(&self) -> bool {
        self.completed >= self.total
    }
}
