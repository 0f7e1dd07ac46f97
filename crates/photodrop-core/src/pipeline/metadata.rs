//! EXIF metadata extraction from in-memory images.

use chrono::{DateTime, NaiveDate, Utc};
use exif::{In, Reader, Tag, Value};
use std::io::Cursor;

use crate::types::{CaptureInfo, DeviceInfo, Location, UNKNOWN};

/// Extracts capture metadata from image buffers.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract capture data from an image buffer.
    ///
    /// Never fails: a buffer without EXIF (or with a broken EXIF block)
    /// yields an "Unknown" device and no date, orientation or location.
    pub fn extract(bytes: &[u8]) -> CaptureInfo {
        let mut cursor = Cursor::new(bytes);
        let exif = match Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::trace!("No EXIF data: {e}");
                return CaptureInfo::default();
            }
        };

        let latitude = Self::get_gps_coord(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef);
        let longitude = Self::get_gps_coord(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef);

        CaptureInfo {
            orientation: Self::get_u32(&exif, Tag::Orientation),
            device: DeviceInfo {
                make: Self::get_string(&exif, Tag::Make).unwrap_or_else(|| UNKNOWN.to_string()),
                model: Self::get_string(&exif, Tag::Model).unwrap_or_else(|| UNKNOWN.to_string()),
            },
            captured_at: Self::get_datetime(&exif),
            location: match (latitude, longitude) {
                (Some(latitude), Some(longitude)) => Some(Location {
                    latitude,
                    longitude,
                }),
                _ => None,
            },
        }
    }

    /// Get a non-empty string field from EXIF data.
    fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
        exif.get_field(tag, In::PRIMARY)
            .map(|f| {
                let s = f.display_value().to_string();
                s.trim_matches('"').trim().to_string()
            })
            .filter(|s| !s.is_empty())
    }

    /// Get a u32 field from EXIF data.
    fn get_u32(exif: &exif::Exif, tag: Tag) -> Option<u32> {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Short(v) => v.first().map(|&x| x as u32),
                Value::Long(v) => v.first().copied(),
                _ => None,
            })
    }

    /// Get the capture datetime, preferring DateTimeOriginal over DateTime.
    fn get_datetime(exif: &exif::Exif) -> Option<DateTime<Utc>> {
        let field = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;
        match &field.value {
            Value::Ascii(parts) => parts.first().and_then(|raw| parse_exif_datetime(raw)),
            _ => None,
        }
    }

    /// Get GPS coordinate, converting from degrees/minutes/seconds to decimal.
    fn get_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
        let coord = exif.get_field(coord_tag, In::PRIMARY)?;
        let reference = exif.get_field(ref_tag, In::PRIMARY)?;

        let degrees = Self::parse_gps_rationals(&coord.value)?;
        let ref_str = reference.display_value().to_string();

        // Southern and western hemispheres are negative
        let sign = if ref_str.contains('S') || ref_str.contains('W') {
            -1.0
        } else {
            1.0
        };

        Some(sign * degrees)
    }

    /// Parse GPS rationals (degrees, minutes, seconds) to decimal degrees.
    fn parse_gps_rationals(value: &Value) -> Option<f64> {
        match value {
            Value::Rational(rationals) if rationals.len() >= 3 => {
                let degrees = rationals[0].to_f64();
                let minutes = rationals[1].to_f64();
                let seconds = rationals[2].to_f64();
                Some(degrees + minutes / 60.0 + seconds / 3600.0)
            }
            _ => None,
        }
    }
}

/// Parse an EXIF "YYYY:MM:DD HH:MM:SS" timestamp. EXIF carries no zone, so it is read as UTC.
fn parse_exif_datetime(raw: &[u8]) -> Option<DateTime<Utc>> {
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?
        .and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32)
        .map(|naive| naive.and_utc())
}
