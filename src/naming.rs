//! Output layout and destination naming.
//!
//! Every processed image lands in exactly one bucket under the output root:
//!
//! ```text
//! <output>/                      geotagged images (main bucket)
//! <output>/missing-locations/    images without a GPS latitude
//! <output>/problem-photos/       partial encodes that hit the timeout
//! ```
//!
//! Files keep their original basename. Libraries are nested (`2023/IMG_0001.JPG`,
//! `2024/IMG_0001.JPG`) while buckets are flat, so a repeated basename within
//! one bucket gets a numeric suffix before the extension:
//!
//! - `IMG_0001.JPG` → `IMG_0001.JPG`
//! - `IMG_0001.JPG` (again) → `IMG_0001-1.JPG`
//! - `IMG_0001.JPG` (third time) → `IMG_0001-2.JPG`

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const MISSING_LOCATIONS_DIR: &str = "missing-locations";
pub const PROBLEM_PHOTOS_DIR: &str = "problem-photos";

/// Destination directory class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Main,
    MissingLocations,
    ProblemPhotos,
}

impl Bucket {
    /// Main when geotagged, missing-locations otherwise.
    pub fn for_gps(has_gps: bool) -> Self {
        if has_gps {
            Bucket::Main
        } else {
            Bucket::MissingLocations
        }
    }

    pub fn dir(self, output_root: &Path) -> PathBuf {
        match self {
            Bucket::Main => output_root.to_path_buf(),
            Bucket::MissingLocations => output_root.join(MISSING_LOCATIONS_DIR),
            Bucket::ProblemPhotos => output_root.join(PROBLEM_PHOTOS_DIR),
        }
    }
}

/// Hands out collision-free destination paths for one run.
#[derive(Debug)]
pub struct DestinationNames {
    output_root: PathBuf,
    taken: HashSet<PathBuf>,
}

impl DestinationNames {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            taken: HashSet::new(),
        }
    }

    /// Reserve a destination in `bucket` for `source`'s basename.
    ///
    /// Names are unique per run, not against files already on disk; the
    /// output directory is expected to start empty.
    pub fn allocate(&mut self, bucket: Bucket, source: &Path) -> PathBuf {
        let dir = bucket.dir(&self.output_root);
        let file_name = source
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("image"));

        let first = dir.join(&file_name);
        if self.taken.insert(first.clone()) {
            return first;
        }

        let stem = Path::new(&file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = Path::new(&file_name)
            .extension()
            .map(|e| e.to_string_lossy().into_owned());

        (1..)
            .map(|n| match &ext {
                Some(ext) => dir.join(format!("{stem}-{n}.{ext}")),
                None => dir.join(format!("{stem}-{n}")),
            })
            .find(|candidate| self.taken.insert(candidate.clone()))
            .unwrap_or(first)
    }

    /// Problem-photos path mirroring an already-allocated destination's name.
    pub fn problem_path(&self, destination: &Path) -> PathBuf {
        let dir = Bucket::ProblemPhotos.dir(&self.output_root);
        match destination.file_name() {
            Some(name) => dir.join(name),
            None => dir.join("image"),
        }
    }
}
