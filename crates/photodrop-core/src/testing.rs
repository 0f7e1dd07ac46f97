//! Fixtures shared by unit tests.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::Cursor;

use crate::types::RawAsset;

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, format)
        .expect("in-memory encode");
    buffer.into_inner()
}

/// A small opaque JPEG.
pub fn jpeg_asset(filename: &str, width: u32, height: u32) -> RawAsset {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 120, 40])));
    RawAsset::new(filename, "image/jpeg", encode(image, ImageFormat::Jpeg))
}

/// A PNG with a transparent background.
pub fn alpha_png_asset(filename: &str, width: u32, height: u32) -> RawAsset {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])));
    RawAsset::new(filename, "image/png", encode(image, ImageFormat::Png))
}

/// Bytes that claim to be a JPEG but are not.
pub fn garbage_asset(filename: &str) -> RawAsset {
    RawAsset::new(filename, "image/jpeg", b"\xFF\xD8\xFFthis is not a jpeg".to_vec())
}

/// A file over the default 10MB limit.
pub fn oversize_asset(filename: &str) -> RawAsset {
    RawAsset::new(filename, "image/jpeg", vec![0u8; 15 * 1024 * 1024])
}
