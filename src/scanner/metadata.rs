//! Per-photo metadata extraction.
//!
//! EXIF supplies capture date, dimensions, camera and GPS data; IPTC supplies
//! keywords and the place names. Anything missing or unreadable is left at
//! its default so a damaged header never fails a directory scan.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{Exif, In, Reader, Tag, Value};

use super::iptc;
use crate::types::{CameraData, GpsData, ImageSize, PhotoMetadata, PositionData};

pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path, fs_meta: &fs::Metadata) -> PhotoMetadata;
}

/// Default extractor backed by `kamadak-exif` and the IPTC reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifMetadataExtractor;

impl MetadataExtractor for ExifMetadataExtractor {
    fn extract(&self, path: &Path, fs_meta: &fs::Metadata) -> PhotoMetadata {
        let mut metadata = PhotoMetadata {
            file_size: fs_meta.len(),
            creation_date: fs_meta
                .modified()
                .ok()
                .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp_millis())
                .unwrap_or(0),
            ..Default::default()
        };

        if let Some(exif) = read_exif(path) {
            apply_exif(&exif, &mut metadata);
        }

        if metadata.size == ImageSize::default() {
            match image::image_dimensions(path) {
                Ok((width, height)) => metadata.size = ImageSize { width, height },
                Err(e) => tracing::trace!("No image header for {}: {}", path.display(), e),
            }
        }

        let iptc = iptc::read_iptc(path);
        metadata.keywords = iptc.keywords;
        metadata.position_data.city = iptc.city;
        metadata.position_data.state = iptc.state;
        metadata.position_data.country = iptc.country;

        metadata
    }
}

fn read_exif(path: &Path) -> Option<Exif> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Some(exif),
        Err(e) => {
            tracing::trace!("No EXIF data for {}: {}", path.display(), e);
            None
        }
    }
}

fn apply_exif(exif: &Exif, metadata: &mut PhotoMetadata) {
    if let Some(date) = field_string(exif, Tag::DateTimeOriginal).and_then(|s| parse_exif_datetime(&s)) {
        metadata.creation_date = date;
    }

    let width = exif.get_field(Tag::PixelXDimension, In::PRIMARY).and_then(|f| f.value.get_uint(0));
    let height = exif.get_field(Tag::PixelYDimension, In::PRIMARY).and_then(|f| f.value.get_uint(0));
    if let (Some(width), Some(height)) = (width, height) {
        metadata.size = ImageSize { width, height };
    }

    metadata.camera_data = CameraData {
        iso: exif
            .get_field(Tag::PhotographicSensitivity, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0)),
        model: field_string(exif, Tag::Model),
        make: field_string(exif, Tag::Make),
        f_stop: field_rational(exif, Tag::FNumber),
        exposure: field_rational(exif, Tag::ExposureTime),
        focal_length: field_rational(exif, Tag::FocalLength),
        lens: field_string(exif, Tag::LensModel),
    };

    let latitude = gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S');
    let longitude = gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W');
    let altitude = field_rational(exif, Tag::GPSAltitude).map(|alt| {
        let below_sea_level = exif
            .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
            == Some(1);
        if below_sea_level {
            -alt
        } else {
            alt
        }
    });
    if latitude.is_some() || longitude.is_some() || altitude.is_some() {
        metadata.position_data = PositionData {
            gps_data: Some(GpsData { latitude, longitude, altitude }),
            ..Default::default()
        };
    }
}

/// EXIF datetime ("2015:07:11 10:29:26") as epoch millis.
fn parse_exif_datetime(s: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn field_string(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    if let Value::Ascii(ref vec) = field.value {
        let bytes = vec.first()?;
        let s = String::from_utf8_lossy(bytes);
        let trimmed = s.trim_end_matches('\0').trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

fn field_rational(exif: &Exif, tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match field.value {
        Value::Rational(ref v) => v.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
        Value::SRational(ref v) => v.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
        _ => None,
    }
}

/// Degrees/minutes/seconds to signed decimal degrees.
fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Rational(ref dms) = field.value else {
        return None;
    };
    if dms.len() < 3 || dms.iter().any(|r| r.denom == 0) {
        return None;
    }
    let value = dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0;
    let negative = field_string(exif, ref_tag)
        .and_then(|r| r.bytes().next())
        .is_some_and(|b| b.to_ascii_uppercase() == negative_ref);
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exif_datetime_parses_to_millis() {
        assert_eq!(parse_exif_datetime("2015:07:11 10:29:26"), Some(1436610566000));
        assert_eq!(parse_exif_datetime("not a date"), None);
    }

    #[test]
    fn non_image_file_falls_back_to_filesystem_data() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        let md = std::fs::metadata(&path).unwrap();

        let meta = ExifMetadataExtractor.extract(&path, &md);
        assert_eq!(meta.file_size, 21);
        assert!(meta.creation_date > 0);
        assert_eq!(meta.size, ImageSize::default());
        assert!(meta.keywords.is_empty());
        assert!(meta.camera_data.is_empty());
    }

    #[test]
    fn dimensions_come_from_image_header() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pixel.png");
        image::RgbImage::new(7, 3).save(&path).unwrap();
        let md = std::fs::metadata(&path).unwrap();

        let meta = ExifMetadataExtractor.extract(&path, &md);
        assert_eq!(meta.size, ImageSize { width: 7, height: 3 });
    }
}
