//! Image compression in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode + RGB normalisation** | `image` crate decoders |
//! | **EXIF read** | `kamadak-exif` |
//! | **Encode** | `image::codecs::jpeg::JpegEncoder` |
//! | **EXIF re-attach** | APP1 segment via `img-parts` ([`jpeg`]) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for the size budget and quality schedule (unit testable)
//! - **Parameters**: Data structures describing compression and encode calls
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Compress**: The quality search engine built on a backend

pub mod backend;
mod calculations;
pub mod compress;
pub(crate) mod jpeg;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Capabilities, ImageBackend};
pub use calculations::{bytes_to_mb, mb_to_bytes, next_quality, quality_schedule, start_quality};
pub use compress::{CompressError, CompressionOutcome, compress};
pub use params::{AlphaPolicy, CompressParams, EncodeParams, Quality};
pub use rust_backend::RustBackend;
