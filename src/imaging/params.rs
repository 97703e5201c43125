//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`compress`](super::compress) engine (which decides
//! which quality to try next) and the [`backend`](super::backend) (which does
//! the actual pixel work). This separation allows swapping backends (e.g. for
//! testing with a mock) without changing the search loop.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0–100). Clamped on construction.
//! - [`AlphaPolicy`]: How transparency is removed when an image is reduced to RGB.
//! - [`CompressParams`]: One engine run: source, destination, size budget, quality floor/step, timeout.
//! - [`EncodeParams`]: One encoder call: pixels, destination, quality, optional EXIF payload.

use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Quality setting for lossy image encoding (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct Quality(pub u8);

impl Quality {
    /// Quality the search loop starts from.
    pub const START: Quality = Quality(95);
    /// Quality used by the single-shot fallback encode.
    pub const FALLBACK: Quality = Quality(85);

    pub fn new(value: u32) -> Self {
        Self(value.min(100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "q{}", self.0)
    }
}

/// How an image with an alpha channel or a palette is reduced to 3-channel RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaPolicy {
    /// Composite onto an opaque white background (the search loop path).
    FlattenOnWhite,
    /// Plain channel conversion, alpha discarded (the fallback path).
    Discard,
}

/// Parameters for a single compression run.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub target_size_mb: f64,
    pub min_quality: Quality,
    pub quality_step: u8,
    /// Wall-clock budget, checked between encode attempts.
    pub timeout: Duration,
}

/// Parameters for one encoder call.
#[derive(Debug, Clone, Copy)]
pub struct EncodeParams<'a> {
    pub image: &'a RgbImage,
    pub output: &'a Path,
    pub quality: Quality,
    /// Raw TIFF-structured EXIF block to re-attach, without the `Exif\0\0` prefix.
    pub exif: Option<&'a [u8]>,
}
