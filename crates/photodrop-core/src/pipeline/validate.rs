//! Per-asset validation before any decoding happens.

use crate::config::{LimitsConfig, ProcessingConfig};
use crate::error::PipelineError;
use crate::types::RawAsset;

/// Validates submitted assets before they reach the codec.
#[derive(Debug, Clone)]
pub struct Validator {
    processing: ProcessingConfig,
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(processing: ProcessingConfig, limits: LimitsConfig) -> Self {
        Self { processing, limits }
    }

    /// Perform quick validation before full decode.
    ///
    /// Checks, in order:
    /// - Declared mime type is in the supported set
    /// - File size is within limits
    /// - File has valid image magic bytes
    pub fn validate(&self, asset: &RawAsset) -> Result<(), PipelineError> {
        if !self.processing.supports(&asset.mime_type) {
            return Err(PipelineError::UnsupportedFormat {
                filename: asset.filename.clone(),
                mime_type: asset.mime_type.clone(),
            });
        }

        if asset.size() > self.limits.max_file_size_bytes() {
            return Err(PipelineError::FileTooLarge {
                filename: asset.filename.clone(),
                size_bytes: asset.size(),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        if asset.bytes.len() < 4 {
            return Err(PipelineError::Decode {
                filename: asset.filename.clone(),
                message: "File too small to be a valid image".to_string(),
            });
        }

        if !Self::is_valid_image_header(&asset.bytes) {
            return Err(PipelineError::Decode {
                filename: asset.filename.clone(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        Ok(())
    }

    /// Check if the leading bytes match one of the accepted image formats.
    fn is_valid_image_header(bytes: &[u8]) -> bool {
        let header = &bytes[..bytes.len().min(12)];
        if header.len() < 4 {
            return false;
        }

        // JPEG: FF D8 FF
        if header[..3] == [0xFF, 0xD8, 0xFF] {
            return true;
        }

        // PNG: 89 50 4E 47
        if header[..4] == [0x89, b'P', b'N', b'G'] {
            return true;
        }

        // WebP: RIFF....WEBP
        if &header[..4] == b"RIFF" {
            if header.len() >= 12 {
                return &header[8..12] == b"WEBP";
            }
            // Could be WebP, let the decoder decide
            return true;
        }

        // HEIC/HEIF: ftyp box at offset 4
        header.len() >= 12 && &header[4..8] == b"ftyp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(ProcessingConfig::default(), LimitsConfig::default())
    }

    #[test]
    fn test_magic_bytes_jpeg() {
        let header = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_png() {
        let header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert!(Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_webp() {
        let header = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'E', b'B', b'P'];
        assert!(Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_riff_non_webp_rejected() {
        let header = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'A', b'V', b'E'];
        assert!(!Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_heic() {
        let header = [0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'h', b'e', b'i', b'c'];
        assert!(Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_invalid() {
        let header = [0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(!Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_rejects_unsupported_mime_first() {
        // Oversize and unsupported: the type check wins
        let asset = RawAsset::new("anim.gif", "image/gif", vec![0u8; 11 * 1024 * 1024]);
        let err = validator().validate(&asset).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
        assert_eq!(err.kind(), "unsupported-type");
    }

    #[test]
    fn test_rejects_oversize_file() {
        let asset = RawAsset::new("file2.jpg", "image/jpeg", vec![0u8; 15 * 1024 * 1024]);
        let err = validator().validate(&asset).unwrap_err();
        assert!(matches!(err, PipelineError::FileTooLarge { max_mb: 10, .. }));
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        let asset = RawAsset::new("notes.jpg", "image/jpeg", b"hello world".to_vec());
        let err = validator().validate(&asset).unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_accepts_png_header() {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 32]);
        let asset = RawAsset::new("ok.png", "image/png", bytes);
        assert!(validator().validate(&asset).is_ok());
    }
}
