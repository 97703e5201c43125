//! Per-image metadata extraction.
//!
//! Each discovered image yields one [`ImageRecord`]: its path, its size on
//! disk, and whether the EXIF block carries a GPS latitude.
//!
//! ## Flattening
//!
//! EXIF is grouped into IFDs (primary image, thumbnail, Exif sub-IFD, GPS
//! sub-IFD, interoperability). [`flatten`] collapses that tree into a flat map
//! keyed `"<group>_<TagName>"`:
//!
//! ```text
//! 0th_Make          = "TestCam"
//! Exif_ExposureTime = "1/250"
//! GPS_GPSLatitude   = "55 deg 40 min 34 sec"
//! 1st_Compression   = "JPEG"          (thumbnail IFD)
//! ```
//!
//! Only [`GPS_LATITUDE_KEY`] is consulted downstream.
//!
//! ## Tolerance
//!
//! Missing EXIF, corrupt EXIF, and containers kamadak-exif cannot parse (GIF,
//! BMP) are all normal: the record is still produced, with the GPS field
//! absent. Only an unreadable file (no size) yields no record.

use exif::{Context, Exif, Field, In};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flat key of the GPS latitude tag.
pub const GPS_LATITUDE_KEY: &str = "GPS_GPSLatitude";

/// Flattened EXIF tags, keyed `"<group>_<TagName>"`.
pub type FlatTags = BTreeMap<String, String>;

/// One inspected image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Display value of `GPS_GPSLatitude`, when present and non-empty.
    pub gps_latitude: Option<String>,
}

impl ImageRecord {
    pub fn size_mb(&self) -> f64 {
        crate::imaging::bytes_to_mb(self.size_bytes)
    }

    pub fn has_gps(&self) -> bool {
        self.gps_latitude.is_some()
    }
}

/// Build the record for one image. Returns `None` only when the file itself
/// cannot be stat'ed.
pub fn extract(path: &Path) -> Option<ImageRecord> {
    let size_bytes = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "cannot stat image");
            return None;
        }
    };

    let tags = read_flat_tags(path).unwrap_or_default();

    Some(ImageRecord {
        path: path.to_path_buf(),
        size_bytes,
        gps_latitude: gps_latitude(&tags),
    })
}

/// Read and flatten the EXIF block. `None` when there is none or it is unreadable.
pub fn read_flat_tags(path: &Path) -> Option<FlatTags> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Some(flatten(&exif)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no usable EXIF");
            None
        }
    }
}

/// Collapse all IFDs into one flat map. The first occurrence of a key wins.
pub fn flatten(exif: &Exif) -> FlatTags {
    let mut tags = FlatTags::new();
    for field in exif.fields() {
        let key = format!("{}_{}", group_name(field), field.tag);
        tags.entry(key)
            .or_insert_with(|| field.display_value().to_string());
    }
    tags
}

fn group_name(field: &Field) -> &'static str {
    match field.tag.context() {
        Context::Gps => "GPS",
        Context::Exif => "Exif",
        Context::Interop => "Interop",
        _ if field.ifd_num == In::PRIMARY => "0th",
        _ => "1st",
    }
}

/// The GPS latitude, if the tag exists and holds a non-empty value.
pub fn gps_latitude(tags: &FlatTags) -> Option<String> {
    tags.get(GPS_LATITUDE_KEY)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(String::from)
}
