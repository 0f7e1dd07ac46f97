//! Format analysis: decode an asset, read its capture data, choose the output encoding.

use image::DynamicImage;

use crate::config::{EncodingConfig, LimitsConfig};
use crate::error::PipelineError;
use crate::types::{AssetMetadata, EncodeQuality, RawAsset, TargetFormat, TargetSpec};

use super::decode::ImageDecoder;
use super::hash::Hasher;
use super::metadata::MetadataExtractor;

/// A decoded asset together with its encoding decision.
pub struct AnalyzedAsset {
    pub raw: RawAsset,
    pub metadata: AssetMetadata,
    pub target: TargetSpec,
    /// BLAKE3 hash of the submitted bytes
    pub content_hash: String,
    /// Decoded pixels, handed to the transformer so the asset is decoded once
    pub image: DynamicImage,
}

/// Decides how each asset will be encoded.
#[derive(Debug, Clone)]
pub struct FormatAnalyzer {
    decoder: ImageDecoder,
    encoding: EncodingConfig,
}

impl FormatAnalyzer {
    pub fn new(limits: LimitsConfig, encoding: EncodingConfig) -> Self {
        Self {
            decoder: ImageDecoder::new(limits),
            encoding,
        }
    }

    /// Decode the asset and compute its [`TargetSpec`].
    ///
    /// Decoding, EXIF parsing and hashing share one task on the blocking pool.
    pub async fn analyze(&self, raw: RawAsset) -> Result<AnalyzedAsset, PipelineError> {
        let bytes = raw.bytes.clone();
        let name = raw.filename.clone();
        let (decoded, mut capture, content_hash) = self
            .decoder
            .run_blocking(&raw.filename, move || {
                let decoded = ImageDecoder::decode_sync(&bytes, &name)?;
                let capture = MetadataExtractor::extract(&bytes);
                Ok((decoded, capture, Hasher::content_hash(&bytes)))
            })
            .await?;

        if decoded.format.is_pre_oriented() {
            capture.orientation = None;
        }

        let metadata = AssetMetadata {
            width: decoded.width,
            height: decoded.height,
            channels: decoded.channels,
            has_alpha: decoded.has_alpha,
            detected_format: decoded.format.to_string(),
            capture,
        };
        let target = self.choose_target(&metadata, &raw);

        tracing::debug!(
            filename = %raw.filename,
            width = metadata.width,
            height = metadata.height,
            channels = metadata.channels,
            has_alpha = metadata.has_alpha,
            source = %decoded.format,
            target = %target.format,
            "Analyzed asset"
        );

        Ok(AnalyzedAsset {
            raw,
            metadata,
            target,
            content_hash,
            image: decoded.image,
        })
    }

    /// Choose the output encoding. Deterministic in its inputs:
    ///
    /// 1. transparency needs PNG
    /// 2. HEIC/HEIF becomes WebP for compatibility
    /// 3. 3/4 channel photos become WebP
    /// 4. everything else (grayscale) becomes JPEG
    pub fn choose_target(&self, metadata: &AssetMetadata, raw: &RawAsset) -> TargetSpec {
        let format = choose_format(metadata, raw);
        let quality = match format {
            TargetFormat::Webp => EncodeQuality::Lossy(self.encoding.webp_quality),
            TargetFormat::Jpeg => EncodeQuality::Lossy(self.encoding.jpeg_quality),
            TargetFormat::Png => EncodeQuality::Png(self.encoding.png_compression),
        };
        TargetSpec { format, quality }
    }
}

fn choose_format(metadata: &AssetMetadata, raw: &RawAsset) -> TargetFormat {
    if metadata.has_alpha {
        return TargetFormat::Png;
    }
    if raw.is_heif_family() {
        return TargetFormat::Webp;
    }
    if metadata.channels == 3 || metadata.channels == 4 {
        return TargetFormat::Webp;
    }
    TargetFormat::Jpeg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PngCompression;
    use crate::types::CaptureInfo;
    use image::{ImageFormat, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn metadata(channels: u8, has_alpha: bool) -> AssetMetadata {
        AssetMetadata {
            width: 10,
            height: 10,
            channels,
            has_alpha,
            detected_format: "png".to_string(),
            capture: CaptureInfo::default(),
        }
    }

    fn asset(mime_type: &str) -> RawAsset {
        RawAsset::new("photo", mime_type, Vec::new())
    }

    fn analyzer() -> FormatAnalyzer {
        FormatAnalyzer::new(LimitsConfig::default(), EncodingConfig::default())
    }

    #[test]
    fn test_alpha_always_png() {
        for mime in ["image/jpeg", "image/png", "image/webp", "image/heic", "image/heif"] {
            assert_eq!(choose_format(&metadata(4, true), &asset(mime)), TargetFormat::Png);
            assert_eq!(choose_format(&metadata(2, true), &asset(mime)), TargetFormat::Png);
        }
    }

    #[test]
    fn test_heif_family_becomes_webp() {
        assert_eq!(choose_format(&metadata(1, false), &asset("image/heic")), TargetFormat::Webp);
        assert_eq!(choose_format(&metadata(1, false), &asset("image/HEIF")), TargetFormat::Webp);
    }

    #[test]
    fn test_color_photos_become_webp() {
        assert_eq!(choose_format(&metadata(3, false), &asset("image/jpeg")), TargetFormat::Webp);
        assert_eq!(choose_format(&metadata(4, false), &asset("image/png")), TargetFormat::Webp);
    }

    #[test]
    fn test_grayscale_becomes_jpeg() {
        assert_eq!(choose_format(&metadata(1, false), &asset("image/jpeg")), TargetFormat::Jpeg);
    }

    #[test]
    fn test_quality_follows_format() {
        let analyzer = analyzer();
        let spec = analyzer.choose_target(&metadata(3, false), &asset("image/jpeg"));
        assert_eq!(spec.quality, EncodeQuality::Lossy(75));

        let spec = analyzer.choose_target(&metadata(4, true), &asset("image/png"));
        assert_eq!(spec.quality, EncodeQuality::Png(PngCompression::Default));
    }

    #[tokio::test]
    async fn test_analyze_png_with_alpha() {
        let img = RgbaImage::from_pixel(30, 20, Rgba([10, 20, 30, 40]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        let raw = RawAsset::new("logo.png", "image/png", buffer.into_inner());

        let analyzed = analyzer().analyze(raw).await.unwrap();
        assert_eq!(analyzed.metadata.width, 30);
        assert_eq!(analyzed.metadata.height, 20);
        assert!(analyzed.metadata.has_alpha);
        assert_eq!(analyzed.metadata.detected_format, "png");
        assert_eq!(analyzed.target.format, TargetFormat::Png);
        assert_eq!(analyzed.content_hash, Hasher::content_hash(&analyzed.raw.bytes));
        assert!(analyzed.metadata.capture.device.is_unknown());
    }

    #[tokio::test]
    async fn test_analyze_grayscale_png() {
        let img = image::GrayImage::from_pixel(12, 12, Luma([200]));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        let raw = RawAsset::new("scan.png", "image/png", buffer.into_inner());

        let analyzed = analyzer().analyze(raw).await.unwrap();
        assert_eq!(analyzed.metadata.channels, 1);
        assert_eq!(analyzed.target.format, TargetFormat::Jpeg);
    }

    #[cfg(feature = "heif")]
    fn heic_bytes(width: u32, height: u32) -> Vec<u8> {
        use libheif_rs::{
            Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif,
            RgbChroma,
        };

        let mut image = Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgb)).unwrap();
        image
            .create_plane(Channel::Interleaved, width, height, 8)
            .unwrap();
        let planes = image.planes_mut();
        let mut plane = planes.interleaved.unwrap();
        for y in 0..height as usize {
            for x in 0..width as usize {
                let offset = y * plane.stride + x * 3;
                plane.data[offset..offset + 3].copy_from_slice(&[(x * 4) as u8, (y * 4) as u8, 90]);
            }
        }

        let lib_heif = LibHeif::new();
        let mut context = HeifContext::new().unwrap();
        let mut encoder = lib_heif.encoder_for_format(CompressionFormat::Hevc).unwrap();
        encoder.set_quality(EncoderQuality::Lossy(90)).unwrap();
        context.encode_image(&image, &mut encoder, None).unwrap();
        context.write_to_bytes().unwrap()
    }

    #[cfg(feature = "heif")]
    #[tokio::test]
    async fn test_analyze_heic_becomes_webp() {
        let raw = RawAsset::new("IMG_0001.HEIC", "image/heic", heic_bytes(64, 48));

        let analyzed = analyzer().analyze(raw).await.unwrap();
        assert_eq!(analyzed.metadata.detected_format, "heif");
        assert_eq!((analyzed.metadata.width, analyzed.metadata.height), (64, 48));
        assert!(!analyzed.metadata.has_alpha);
        assert!(analyzed.metadata.capture.orientation.is_none());
        assert_eq!(analyzed.target.format, TargetFormat::Webp);
    }
}
