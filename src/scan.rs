//! Image discovery.
//!
//! Walks a directory tree and returns every file with a recognised image
//! suffix, in traversal order:
//!
//! ```text
//! png  jpg  jpeg  gif  bmp  tiff  heic      (case-insensitive)
//! ```
//!
//! Recognition is by suffix only; whether a file can actually be decoded is
//! the codec backend's business (see [`Capabilities`](crate::imaging::Capabilities)).
//!
//! For dry runs, [`sample`] keeps a random subset of fixed size.

use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Input directory not found: {0}")]
    NotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff", "heic"];

/// Whether the file name ends in a recognised image suffix.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Fail unless `root` is an existing directory.
pub fn check_root(root: &Path) -> Result<(), ScanError> {
    if !root.exists() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    Ok(())
}

/// Recursively collect image files under `root`.
///
/// Unreadable subdirectories are logged and skipped; only a missing or
/// non-directory root is an error.
pub fn find_images(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    check_root(root)?;

    let mut images = Vec::new();
    for entry in WalkDir::new(root) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_image(entry.path()) {
                    images.push(entry.into_path());
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping unreadable entry"),
        }
    }

    tracing::debug!(root = %root.display(), count = images.len(), "discovered images");
    Ok(images)
}

/// Keep `min(cap, len)` randomly chosen paths. The length is deterministic,
/// the selection is not.
pub fn sample(paths: Vec<PathBuf>, cap: usize) -> Vec<PathBuf> {
    if cap >= paths.len() {
        return paths;
    }
    let mut rng = rand::thread_rng();
    paths.choose_multiple(&mut rng, cap).cloned().collect()
}
