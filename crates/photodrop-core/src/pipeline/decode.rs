//! Image decoding with content-based format detection and timeout support.
//!
//! Raster formats go through the `image` crate. HEIC/HEIF containers are
//! recognized by their `ftyp` brand and decoded with libheif when the `heif`
//! feature is enabled.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// `ftyp` major brands of HEIF-family still images.
const HEIF_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1", b"heif",
];

/// Image decoder with configurable timeout.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Container format detected from the leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Raster(ImageFormat),
    Heif,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raster(ImageFormat::Jpeg) => "jpeg",
            Self::Raster(ImageFormat::Png) => "png",
            Self::Raster(ImageFormat::WebP) => "webp",
            Self::Raster(ImageFormat::Avif) => "avif",
            Self::Raster(_) => "unknown",
            Self::Heif => "heif",
        }
    }

    /// libheif applies the container's rotation and mirror boxes while
    /// decoding, so the EXIF orientation must not be applied a second time.
    pub fn is_pre_oriented(&self) -> bool {
        matches!(self, Self::Heif)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of decoding an image.
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected container format
    pub format: SourceFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Number of color channels (1-4)
    pub channels: u8,
    /// Whether the pixel layout carries an alpha channel
    pub has_alpha: bool,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Run CPU-bound work for one asset on the blocking pool, bounded by the
    /// decode timeout.
    ///
    /// A blocking task cannot be interrupted. When the timeout fires the
    /// work is still awaited before the timeout error is returned, so no
    /// decoded buffer outlives the asset that produced it.
    pub async fn run_blocking<T, F>(&self, filename: &str, work: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
        T: Send + 'static,
    {
        let timeout_ms = self.limits.decode_timeout_ms;
        let mut handle = tokio::task::spawn_blocking(work);

        match timeout(Duration::from_millis(timeout_ms), &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(PipelineError::Decode {
                filename: filename.to_string(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => {
                tracing::debug!(filename, timeout_ms, "Decode timed out, waiting for worker");
                // The result is discarded; only the release of its buffers matters
                let _ = handle.await;
                Err(PipelineError::Timeout {
                    filename: filename.to_string(),
                    stage: "decode".to_string(),
                    timeout_ms,
                })
            }
        }
    }

    /// Synchronous decode; the format is sniffed from content, never from the name.
    pub fn decode_sync(bytes: &[u8], filename: &str) -> Result<DecodedImage, PipelineError> {
        let (image, format) = if is_heif(bytes) {
            (decode_heif(bytes, filename)?, SourceFormat::Heif)
        } else {
            let (image, format) = decode_raster(bytes, filename)?;
            (image, SourceFormat::Raster(format))
        };

        let (width, height) = image.dimensions();
        let color = image.color();
        Ok(DecodedImage {
            channels: color.channel_count(),
            has_alpha: color.has_alpha(),
            image,
            format,
            width,
            height,
        })
    }
}

/// Whether the buffer is an ISO-BMFF container with a HEIF-family brand.
pub fn is_heif(bytes: &[u8]) -> bool {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return false;
    }
    HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == *brand)
}

fn decode_raster(bytes: &[u8], filename: &str) -> Result<(DynamicImage, ImageFormat), PipelineError> {
    use std::io::Cursor;

    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode {
            filename: filename.to_string(),
            message: format!("Cannot detect image format: {}", e),
        })?;
    let format = reader.format().ok_or_else(|| PipelineError::Decode {
        filename: filename.to_string(),
        message: "Unrecognized image container".to_string(),
    })?;
    let image = reader.decode().map_err(|e| PipelineError::Decode {
        filename: filename.to_string(),
        message: e.to_string(),
    })?;
    Ok((image, format))
}

#[cfg(feature = "heif")]
fn decode_heif(bytes: &[u8], filename: &str) -> Result<DynamicImage, PipelineError> {
    use image::{RgbImage, RgbaImage};
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let decode_error = |message: String| PipelineError::Decode {
        filename: filename.to_string(),
        message,
    };

    let lib_heif = LibHeif::new();
    let context = HeifContext::read_from_bytes(bytes).map_err(|e| decode_error(e.to_string()))?;
    let handle = context
        .primary_image_handle()
        .map_err(|e| decode_error(e.to_string()))?;
    let has_alpha = handle.has_alpha_channel();
    let chroma = if has_alpha {
        RgbChroma::Rgba
    } else {
        RgbChroma::Rgb
    };
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .map_err(|e| decode_error(e.to_string()))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| decode_error("HEIF image has no interleaved plane".to_string()))?;

    // Rows are padded to `stride`; copy them out tightly packed
    let channels = if has_alpha { 4 } else { 3 };
    let row_len = plane.width as usize * channels;
    let mut pixels = Vec::with_capacity(row_len * plane.height as usize);
    for row in plane.data.chunks(plane.stride).take(plane.height as usize) {
        pixels.extend_from_slice(&row[..row_len]);
    }

    let image = if has_alpha {
        RgbaImage::from_raw(plane.width, plane.height, pixels).map(DynamicImage::ImageRgba8)
    } else {
        RgbImage::from_raw(plane.width, plane.height, pixels).map(DynamicImage::ImageRgb8)
    };
    image.ok_or_else(|| decode_error("HEIF pixel buffer has the wrong size".to_string()))
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_bytes: &[u8], filename: &str) -> Result<DynamicImage, PipelineError> {
    Err(PipelineError::Decode {
        filename: filename.to_string(),
        message: "HEIF decoding is not available in this build (enable the `heif` feature)"
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 24];
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(brand);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"mif1heic");
        bytes
    }

    #[test]
    fn test_format_names() {
        assert_eq!(SourceFormat::Raster(ImageFormat::Jpeg).as_str(), "jpeg");
        assert_eq!(SourceFormat::Raster(ImageFormat::Png).to_string(), "png");
        assert_eq!(SourceFormat::Heif.to_string(), "heif");
        assert!(SourceFormat::Heif.is_pre_oriented());
        assert!(!SourceFormat::Raster(ImageFormat::Jpeg).is_pre_oriented());
    }

    #[test]
    fn test_heif_brands_detected() {
        for brand in [b"heic", b"heix", b"mif1", b"heif"] {
            assert!(is_heif(&ftyp(brand)), "{:?}", brand);
        }
        assert!(!is_heif(&ftyp(b"avif")));
        assert!(!is_heif(&ftyp(b"isom")));
        assert!(!is_heif(b"\x89PNG\r\n\x1a\n"));
        assert!(!is_heif(b"ftyp"));
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn test_heif_without_feature_is_decode_error() {
        let err = match ImageDecoder::decode_sync(&ftyp(b"heic"), "IMG_0001.HEIC") {
            Err(e) => e,
            Ok(_) => panic!("HEIF decoded without libheif"),
        };
        assert_eq!(err.kind(), "decode");
        assert!(err.to_string().contains("heif"));
    }

    #[test]
    fn test_decode_reports_channels_and_alpha() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 4, Rgba([1, 2, 3, 128])));
        let decoded = ImageDecoder::decode_sync(&encode(rgba, ImageFormat::Png), "a.png").unwrap();
        assert_eq!((decoded.width, decoded.height), (8, 4));
        assert_eq!(decoded.channels, 4);
        assert!(decoded.has_alpha);

        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([1, 2, 3])));
        let decoded = ImageDecoder::decode_sync(&encode(rgb, ImageFormat::Jpeg), "b.jpg").unwrap();
        assert_eq!(decoded.format, SourceFormat::Raster(ImageFormat::Jpeg));
        assert_eq!(decoded.channels, 3);
        assert!(!decoded.has_alpha);
    }

    #[test]
    fn test_format_detected_by_content() {
        // A PNG submitted under a .jpg name is still a PNG
        let img = DynamicImage::new_rgb8(4, 4);
        let decoded =
            ImageDecoder::decode_sync(&encode(img, ImageFormat::Png), "misnamed.jpg").unwrap();
        assert_eq!(decoded.format, SourceFormat::Raster(ImageFormat::Png));
    }

    #[tokio::test]
    async fn test_decode_garbage_is_decode_error() {
        let decoder = ImageDecoder::new(LimitsConfig::default());
        let result = decoder
            .run_blocking("broken.jpg", || {
                ImageDecoder::decode_sync(b"\xFF\xD8\xFFnot really a jpeg", "broken.jpg")
            })
            .await;
        assert!(matches!(result, Err(PipelineError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_timeout_waits_for_blocking_work() {
        let limits = LimitsConfig {
            decode_timeout_ms: 5,
            ..LimitsConfig::default()
        };
        let decoder = ImageDecoder::new(limits);
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result = decoder
            .run_blocking("slow.jpg", move || {
                std::thread::sleep(Duration::from_millis(150));
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(PipelineError::Timeout { timeout_ms: 5, .. })));
        assert!(finished.load(Ordering::SeqCst));
    }
}
