//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the compression
//! engine needs: report capabilities, read the EXIF payload, load a source as
//! normalised RGB, and encode RGB pixels to the lossy output codec.
//!
//! Backends declare the formats they can decode when they are constructed
//! ([`Capabilities`]) instead of relying on codecs registering themselves as a
//! side effect. The engine consults the capabilities before touching a file.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust with no system
//! libraries.

use super::params::{AlphaPolicy, EncodeParams};
use image::RgbImage;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported format: {0}")]
    Unsupported(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Lower-cased file extensions a backend can decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    decodable: BTreeSet<String>,
}

impl Capabilities {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            decodable: extensions
                .into_iter()
                .map(|e| e.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether the file's extension (case-insensitive) has a decoder.
    pub fn can_decode(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.decodable.contains(&e.to_ascii_lowercase()))
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.decodable.iter().map(String::as_str)
    }
}

/// Trait for image codec backends.
///
/// `Sync` so a single backend can be shared by the inspection pool.
pub trait ImageBackend: Sync {
    /// Formats this backend can decode, fixed at construction.
    fn capabilities(&self) -> &Capabilities;

    /// Read and validate the embedded EXIF block.
    ///
    /// `Ok(None)` when the file carries no EXIF; `Err` when a block exists but
    /// cannot be parsed. Callers treat both as "proceed without EXIF".
    fn read_exif(&self, path: &Path) -> Result<Option<Vec<u8>>, BackendError>;

    /// Decode a file and reduce it to 3-channel RGB.
    fn load_rgb(&self, path: &Path, alpha: AlphaPolicy) -> Result<RgbImage, BackendError>;

    /// Encode pixels to the output codec, overwriting `params.output`.
    fn encode(&self, params: &EncodeParams<'_>) -> Result<(), BackendError>;
}
