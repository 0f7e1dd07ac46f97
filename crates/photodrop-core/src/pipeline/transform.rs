//! Image transformation: orientation correction, bounded resize, format encode.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use imagequant::RGBA;
use std::borrow::Cow;

use crate::config::{LimitsConfig, PngCompression};
use crate::error::PipelineError;
use crate::types::{AssetMetadata, EncodeQuality, ProcessedAsset, TargetFormat, TargetSpec};

/// Turns decoded images into upload-ready buffers.
///
/// Never upscales and never mutates its input: every step produces a new
/// image or borrows the previous one unchanged.
#[derive(Debug, Clone)]
pub struct ImageTransformer {
    max_width: u32,
    max_height: u32,
}

impl ImageTransformer {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            max_width: limits.max_width,
            max_height: limits.max_height,
        }
    }

    /// Orient, resize and encode an already-decoded image.
    pub fn transform(
        &self,
        image: &DynamicImage,
        spec: &TargetSpec,
        metadata: &AssetMetadata,
        filename: &str,
    ) -> Result<ProcessedAsset, PipelineError> {
        let oriented = match metadata.capture.orientation {
            Some(orientation) if orientation > 1 => Cow::Owned(apply_orientation(image, orientation)),
            _ => Cow::Borrowed(image),
        };

        let (width, height) = oriented.dimensions();
        let resized = if width > self.max_width || height > self.max_height {
            // `resize` fits inside the box and keeps the aspect ratio
            Cow::Owned(oriented.resize(self.max_width, self.max_height, FilterType::Lanczos3))
        } else {
            oriented
        };

        let bytes = encode(&resized, spec).map_err(|message| PipelineError::Transform {
            filename: filename.to_string(),
            message,
        })?;
        let (out_width, out_height) = resized.dimensions();

        tracing::debug!(
            filename,
            format = %spec.format,
            from = %format!("{width}x{height}"),
            to = %format!("{out_width}x{out_height}"),
            size_bytes = bytes.len(),
            "Transformed asset"
        );

        Ok(ProcessedAsset {
            bytes: bytes.into(),
            format: spec.format,
            content_type: spec.format.content_type().to_string(),
            width: out_width,
            height: out_height,
            capture: metadata.capture.clone(),
        })
    }
}

/// Undo the EXIF orientation so the pixels are stored upright.
pub fn apply_orientation(image: &DynamicImage, orientation: u32) -> DynamicImage {
    tracing::trace!(orientation, "Applying EXIF orientation");
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        // transpose
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        // transverse
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image.clone(),
    }
}

fn encode(image: &DynamicImage, spec: &TargetSpec) -> Result<Vec<u8>, String> {
    match (spec.format, spec.quality) {
        (TargetFormat::Webp, EncodeQuality::Lossy(quality)) => {
            let rgb = image.to_rgb8();
            let (width, height) = rgb.dimensions();
            let encoded = webp::Encoder::from_rgb(&rgb, width, height)
                .encode_simple(false, quality as f32)
                .map_err(|e| format!("WebP encoding failed: {e:?}"))?;
            Ok(encoded.to_vec())
        }
        (TargetFormat::Jpeg, EncodeQuality::Lossy(quality)) => {
            // JPEG has no alpha and no 16-bit support
            let flattened = if image.color().channel_count() <= 2 {
                DynamicImage::ImageLuma8(image.to_luma8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            let mut buffer = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            flattened
                .write_with_encoder(encoder)
                .map_err(|e| e.to_string())?;
            Ok(buffer)
        }
        (TargetFormat::Png, EncodeQuality::Png(compression)) => encode_indexed_png(image, compression),
        (format, quality) => Err(format!(
            "Encoder parameters {quality:?} do not apply to {format}"
        )),
    }
}

/// Quantize to at most 256 colors and write an indexed PNG, keeping alpha
/// in a `tRNS` chunk.
fn encode_indexed_png(image: &DynamicImage, compression: PngCompression) -> Result<Vec<u8>, String> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let pixels: Vec<RGBA> = rgba
        .pixels()
        .map(|p| RGBA::new(p[0], p[1], p[2], p[3]))
        .collect();

    let mut attributes = imagequant::new();
    attributes
        .set_speed(quantize_speed(compression))
        .map_err(|e| e.to_string())?;
    let mut quantizable = attributes
        .new_image(pixels, width as usize, height as usize, 0.0)
        .map_err(|e| e.to_string())?;
    let mut quantized = attributes
        .quantize(&mut quantizable)
        .map_err(|e| format!("Palette quantization failed: {e}"))?;
    quantized.set_dithering_level(1.0).map_err(|e| e.to_string())?;
    let (palette, indices) = quantized
        .remapped(&mut quantizable)
        .map_err(|e| format!("Palette remapping failed: {e}"))?;

    let rgb_palette: Vec<u8> = palette.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
    let alpha: Vec<u8> = palette.iter().map(|c| c.a).collect();

    let mut buffer = Vec::new();
    let mut encoder = png::Encoder::new(&mut buffer, width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_palette(rgb_palette);
    if alpha.iter().any(|&a| a < u8::MAX) {
        encoder.set_trns(alpha);
    }
    encoder.set_compression(png_compression(compression));

    let mut writer = encoder.write_header().map_err(|e| e.to_string())?;
    writer.write_image_data(&indices).map_err(|e| e.to_string())?;
    writer.finish().map_err(|e| e.to_string())?;
    Ok(buffer)
}

fn quantize_speed(compression: PngCompression) -> i32 {
    match compression {
        PngCompression::Fast => 8,
        PngCompression::Default => 5,
        PngCompression::Best => 3,
    }
}

fn png_compression(compression: PngCompression) -> png::Compression {
    match compression {
        PngCompression::Fast => png::Compression::Fast,
        PngCompression::Default => png::Compression::Balanced,
        PngCompression::Best => png::Compression::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CaptureInfo;
    use image::{ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn metadata_for(image: &DynamicImage, orientation: Option<u32>) -> AssetMetadata {
        let (width, height) = image.dimensions();
        AssetMetadata {
            width,
            height,
            channels: image.color().channel_count(),
            has_alpha: image.color().has_alpha(),
            detected_format: "png".to_string(),
            capture: CaptureInfo {
                orientation,
                ..CaptureInfo::default()
            },
        }
    }

    fn transformer() -> ImageTransformer {
        ImageTransformer::new(&LimitsConfig::default())
    }

    fn webp_spec() -> TargetSpec {
        TargetSpec {
            format: TargetFormat::Webp,
            quality: EncodeQuality::Lossy(75),
        }
    }

    fn png_spec() -> TargetSpec {
        TargetSpec {
            format: TargetFormat::Png,
            quality: EncodeQuality::Png(PngCompression::Default),
        }
    }

    #[test]
    fn test_large_alpha_png_is_bounded_and_keeps_aspect() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3000, 2000, Rgba([0, 0, 0, 0])));
        let metadata = metadata_for(&image, None);
        let processed = transformer()
            .transform(&image, &png_spec(), &metadata, "big.png")
            .unwrap();

        assert_eq!(processed.format, TargetFormat::Png);
        assert_eq!(processed.content_type, "image/png");
        assert_eq!(processed.width, 1600);
        assert!(processed.height <= 1600);
        // 3:2 aspect ratio preserved (1600x1067 after rounding)
        let ratio = processed.width as f64 / processed.height as f64;
        assert!((ratio - 1.5).abs() < 0.01);

        let reread = image::load_from_memory(&processed.bytes).unwrap();
        assert_eq!(reread.dimensions(), (processed.width, processed.height));
        assert!(reread.color().has_alpha());
    }

    #[test]
    fn test_small_image_is_not_upscaled() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(640, 480, Rgb([90, 120, 200])));
        let metadata = metadata_for(&image, None);
        let processed = transformer()
            .transform(&image, &webp_spec(), &metadata, "small.jpg")
            .unwrap();
        assert_eq!((processed.width, processed.height), (640, 480));
        assert_eq!(&processed.bytes[0..4], b"RIFF");
        assert_eq!(&processed.bytes[8..12], b"WEBP");
        assert_eq!(processed.content_type, "image/webp");
    }

    #[test]
    fn test_tall_image_bounded_on_height() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(900, 4000));
        let metadata = metadata_for(&image, None);
        let processed = transformer()
            .transform(&image, &webp_spec(), &metadata, "tall.jpg")
            .unwrap();
        assert_eq!(processed.height, 1600);
        assert!(processed.width <= 1600);
        assert!(processed.width < 900);
    }

    #[test]
    fn test_orientation_six_swaps_dimensions() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let metadata = metadata_for(&image, Some(6));
        let processed = transformer()
            .transform(&image, &webp_spec(), &metadata, "portrait.jpg")
            .unwrap();
        assert_eq!((processed.width, processed.height), (20, 40));
    }

    #[test]
    fn test_apply_orientation_variants() {
        // Mark the top-left pixel and follow it through each correction
        let mut buffer = RgbImage::new(3, 2);
        buffer.put_pixel(0, 0, Rgb([255, 0, 0]));
        let image = DynamicImage::ImageRgb8(buffer);
        let red = |img: &DynamicImage| {
            let rgb = img.to_rgb8();
            rgb.enumerate_pixels()
                .find(|(_, _, p)| p.0 == [255, 0, 0])
                .map(|(x, y, _)| (x, y))
                .unwrap()
        };

        assert_eq!(red(&apply_orientation(&image, 1)), (0, 0));
        assert_eq!(red(&apply_orientation(&image, 2)), (2, 0));
        assert_eq!(red(&apply_orientation(&image, 3)), (2, 1));
        assert_eq!(red(&apply_orientation(&image, 4)), (0, 1));
        // transpose keeps the origin
        assert_eq!(red(&apply_orientation(&image, 5)), (0, 0));
        assert_eq!(red(&apply_orientation(&image, 6)), (1, 0));
        // transverse moves it to the far corner
        assert_eq!(red(&apply_orientation(&image, 7)), (1, 2));
        assert_eq!(red(&apply_orientation(&image, 8)), (0, 2));
    }

    #[test]
    fn test_jpeg_from_grayscale() {
        let image = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(50, 50, Luma([128])));
        let metadata = metadata_for(&image, None);
        let spec = TargetSpec {
            format: TargetFormat::Jpeg,
            quality: EncodeQuality::Lossy(75),
        };
        let processed = transformer()
            .transform(&image, &spec, &metadata, "scan.png")
            .unwrap();
        assert_eq!(&processed.bytes[0..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(processed.content_type, "image/jpeg");
    }

    #[test]
    fn test_mismatched_quality_is_transform_error() {
        let image = DynamicImage::new_rgb8(4, 4);
        let metadata = metadata_for(&image, None);
        let spec = TargetSpec {
            format: TargetFormat::Webp,
            quality: EncodeQuality::Png(PngCompression::Fast),
        };
        let err = transformer()
            .transform(&image, &spec, &metadata, "odd.png")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transform { .. }));
    }

    #[test]
    fn test_webp_encoder_failure_is_transform_error() {
        let image = DynamicImage::new_rgb8(0, 0);
        let metadata = metadata_for(&image, None);
        let err = transformer()
            .transform(&image, &webp_spec(), &metadata, "empty.jpg")
            .unwrap_err();
        assert_eq!(err.kind(), "transform");
        assert!(err.to_string().contains("WebP encoding failed"));
    }

    #[test]
    fn test_transform_leaves_input_untouched() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([1, 2, 3])));
        let snapshot = image.clone();
        let metadata = metadata_for(&image, Some(6));
        transformer()
            .transform(&image, &webp_spec(), &metadata, "copy.png")
            .unwrap();
        assert_eq!(image, snapshot);
    }

    #[test]
    fn test_png_output_is_indexed_and_smaller_than_lossless() {
        // Noisy translucent pixels: incompressible as truecolor, one byte each as indexed
        let mut state = 0x2545_f491_u32;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(128, 128, |_, _| {
            let [r, g, b, a] = next().to_le_bytes();
            Rgba([r, g, b, a])
        }));
        let metadata = metadata_for(&image, None);

        let processed = transformer()
            .transform(&image, &png_spec(), &metadata, "noise.png")
            .unwrap();

        // IHDR colour type 3 = indexed
        assert_eq!(&processed.bytes[1..4], b"PNG");
        assert_eq!(processed.bytes[25], 3);

        let mut lossless = Cursor::new(Vec::new());
        image.write_to(&mut lossless, ImageFormat::Png).unwrap();
        assert!(processed.bytes.len() < lossless.into_inner().len());

        let reread = image::load_from_memory(&processed.bytes).unwrap();
        assert_eq!(reread.dimensions(), (128, 128));
        assert!(reread.color().has_alpha());
    }
}
