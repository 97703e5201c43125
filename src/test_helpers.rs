//! Shared test utilities for the photo-tidy test suite.
//!
//! Builds small synthetic images on disk, optionally geotagged, so tests can
//! exercise extraction, compression, and bucketing without shipping fixtures.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! write_jpeg(&tmp.path().join("geo.jpg"), 64, 64, Some(GpsFix::default()));
//! write_jpeg(&tmp.path().join("plain.jpg"), 64, 64, None);
//! write_noise_jpeg(&tmp.path().join("big.jpg"), 256, 256);
//! ```

use crate::imaging::jpeg::insert_exif_segment;
use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageEncoder, RgbImage, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

// =========================================================================
// EXIF blocks
// =========================================================================

/// A GPS position written as degrees/minutes/seconds rationals.
#[derive(Debug, Clone, Copy)]
pub struct GpsFix {
    pub lat: (u32, u32, u32),
    pub lat_ref: &'static str,
    pub lon: (u32, u32, u32),
    pub lon_ref: &'static str,
}

impl Default for GpsFix {
    fn default() -> Self {
        // Copenhagen
        Self {
            lat: (55, 40, 34),
            lat_ref: "N",
            lon: (12, 34, 6),
            lon_ref: "E",
        }
    }
}

fn dms((d, m, s): (u32, u32, u32)) -> Value {
    Value::Rational(vec![
        Rational { num: d, denom: 1 },
        Rational { num: m, denom: 1 },
        Rational { num: s, denom: 1 },
    ])
}

fn ascii(s: &str) -> Value {
    Value::Ascii(vec![s.as_bytes().to_vec()])
}

/// Serialize a TIFF-structured EXIF block. `gps: None` yields a block with
/// only camera fields, so "has EXIF but no location" can be tested.
pub fn exif_block(gps: Option<GpsFix>) -> Vec<u8> {
    let mut fields = vec![
        Field {
            tag: Tag::Make,
            ifd_num: In::PRIMARY,
            value: ascii("TestCam"),
        },
        Field {
            tag: Tag::Model,
            ifd_num: In::PRIMARY,
            value: ascii("TC-1"),
        },
    ];
    if let Some(fix) = gps {
        fields.extend([
            Field {
                tag: Tag::GPSLatitudeRef,
                ifd_num: In::PRIMARY,
                value: ascii(fix.lat_ref),
            },
            Field {
                tag: Tag::GPSLatitude,
                ifd_num: In::PRIMARY,
                value: dms(fix.lat),
            },
            Field {
                tag: Tag::GPSLongitudeRef,
                ifd_num: In::PRIMARY,
                value: ascii(fix.lon_ref),
            },
            Field {
                tag: Tag::GPSLongitude,
                ifd_num: In::PRIMARY,
                value: dms(fix.lon),
            },
        ]);
    }

    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut buf = std::io::Cursor::new(Vec::new());
    writer.write(&mut buf, false).unwrap();
    buf.into_inner()
}

// =========================================================================
// Image files
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

fn encode_jpeg(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}

fn write_with_exif(path: &Path, jpeg: Vec<u8>, exif: Option<Vec<u8>>) {
    let bytes = match exif {
        Some(tiff) => insert_exif_segment(&jpeg, &tiff).unwrap(),
        None => jpeg,
    };
    std::fs::write(path, bytes).unwrap();
}

/// Smooth gradient JPEG; compresses well. Geotagged when `gps` is set.
pub fn write_jpeg(path: &Path, width: u32, height: u32, gps: Option<GpsFix>) {
    let jpeg = encode_jpeg(&gradient(width, height), 90);
    write_with_exif(path, jpeg, gps.map(|fix| exif_block(Some(fix))));
}

/// Gradient JPEG carrying camera EXIF but no GPS fields.
pub fn write_jpeg_without_gps(path: &Path, width: u32, height: u32) {
    let jpeg = encode_jpeg(&gradient(width, height), 90);
    write_with_exif(path, jpeg, Some(exif_block(None)));
}

/// Seeded random noise at quality 100: large on disk and stays large after
/// re-encoding.
pub fn write_noise_jpeg(path: &Path, width: u32, height: u32) {
    let jpeg = encode_jpeg(&noise(width, height), 100);
    write_with_exif(path, jpeg, None);
}

/// Like [`write_noise_jpeg`] but geotagged.
pub fn write_geotagged_noise_jpeg(path: &Path, width: u32, height: u32) {
    let jpeg = encode_jpeg(&noise(width, height), 100);
    write_with_exif(path, jpeg, Some(exif_block(Some(GpsFix::default()))));
}

fn noise(width: u32, height: u32) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(7);
    RgbImage::from_fn(width, height, |_, _| image::Rgb(rng.r#gen::<[u8; 3]>()))
}

/// Uncompressed BMP gradient: large on disk, tiny once JPEG-encoded.
pub fn write_bmp(path: &Path, width: u32, height: u32) {
    gradient(width, height)
        .save_with_format(path, image::ImageFormat::Bmp)
        .unwrap();
}

/// Uncompressed RGB TIFF whose IFD also carries camera and GPS fields, the
/// way scanners and some cameras store EXIF directly in a TIFF.
pub fn write_geotagged_tiff(path: &Path, width: u32, height: u32) {
    let pixels = gradient(width, height).into_raw();
    let strips: [&[u8]; 1] = [&pixels];
    let short = |v: &[u16]| Value::Short(v.to_vec());
    let layout = [
        (Tag::ImageWidth, Value::Long(vec![width])),
        (Tag::ImageLength, Value::Long(vec![height])),
        (Tag::BitsPerSample, short(&[8, 8, 8])),
        (Tag::Compression, short(&[1])),
        (Tag::PhotometricInterpretation, short(&[2])),
        (Tag::SamplesPerPixel, short(&[3])),
        (Tag::RowsPerStrip, Value::Long(vec![height])),
        (Tag::PlanarConfiguration, short(&[1])),
    ]
    .map(|(tag, value)| Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    });
    let fix = GpsFix::default();
    let location = [
        (Tag::Make, ascii("ScanCo")),
        (Tag::GPSLatitudeRef, ascii(fix.lat_ref)),
        (Tag::GPSLatitude, dms(fix.lat)),
    ]
    .map(|(tag, value)| Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    });

    let mut writer = Writer::new();
    for field in layout.iter().chain(location.iter()) {
        writer.push_field(field);
    }
    writer.set_strips(&strips, In::PRIMARY);
    let mut buf = std::io::Cursor::new(Vec::new());
    writer.write(&mut buf, false).unwrap();
    std::fs::write(path, buf.into_inner()).unwrap();
}

/// Solid `[10, 20, 30]` PNG with the given alpha on every pixel.
pub fn write_rgba_png(path: &Path, width: u32, height: u32, alpha: u8) {
    RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, alpha]))
        .save_with_format(path, image::ImageFormat::Png)
        .unwrap();
}
