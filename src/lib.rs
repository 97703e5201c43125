//! # photo-tidy
//!
//! Batch tidy-up for exported photo libraries. Every image is sized against a
//! per-image budget, oversized images are re-encoded until they fit, and the
//! result is sorted by whether the photo knows where it was taken.
//!
//! # Architecture: Inspect, Then Process
//!
//! ```text
//! 1. Inspect   library/  →  LibraryTable   (path → size + GPS presence)
//! 2. Process   table     →  output/        (copy or compress, bucket by GPS)
//! ```
//!
//! Inspection is read-only and runs in parallel. Processing walks the table one
//! image at a time so each image's compression timeout measures its own work.
//!
//! The output tree has three buckets:
//!
//! ```text
//! output/                     geotagged images
//! output/missing-locations/   images without a GPS latitude
//! output/problem-photos/      partial encodes that ran out of time
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Recursive discovery of image files by suffix, random sampling |
//! | [`metadata`] | Per-image record: size on disk and GPS presence from EXIF |
//! | [`library`] | Parallel inspection into an ordered [`library::LibraryTable`] |
//! | [`imaging`] | Codec backend, quality schedule, and the compression engine |
//! | [`naming`] | Output buckets and collision-free destination names |
//! | [`process`] | End-to-end run: copy, compress, reconcile timeouts, report failures |
//! | [`config`] | `photo-tidy.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Copy When Possible
//!
//! An image already within budget is copied byte-for-byte, never re-encoded.
//! Only oversized images pay the generation loss of a lossy round trip.
//!
//! ## Quality Search With a Wall-Clock Budget
//!
//! The engine walks quality down from 95 in fixed steps, stopping at the first
//! encode that fits or at the quality floor. A per-image timeout bounds the
//! search; when it fires the original stays in the library and the last attempt
//! goes to `problem-photos/` for a human to look at.
//!
//! ## Explicit Capabilities
//!
//! The codec backend declares the formats it can decode when it is built.
//! Images in other formats (HEIC) are still inspected and copied when they fit,
//! but are reported as unsupported rather than silently skipped when they don't.
//!
//! ## Failures Are Data
//!
//! No single image can abort a run. Each failure is recorded with its reason in
//! [`process::ProcessReport`] and logged through `tracing`.

pub mod config;
pub mod imaging;
pub mod library;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod process;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
