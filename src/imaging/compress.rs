//! Size-budgeted recompression of a single image.
//!
//! The engine re-encodes a source at decreasing quality until the output fits
//! the byte budget, the quality floor is reached, or the wall-clock budget runs
//! out. Any failure inside that loop drops to a single fixed-quality encode.
//!
//! ```text
//! load (flatten alpha on white) ─┐
//! read EXIF (errors → no EXIF)  ─┤
//!                                ▼
//!            ┌──── encode @ q (EXIF re-attached) ◄───────┐
//!            │              │                            │
//!            │   size ≤ budget or q == floor ──► done    │
//!            │              │                            │
//!            │   elapsed > timeout ──► done, timed out   │
//!            │              │                            │
//!            │              └──── q = max(q - step, floor)
//!            │
//!            └─ any error ──► fallback: load (discard alpha), encode @ 85, no EXIF
//! ```
//!
//! The timeout is checked only between encode attempts; an encode in flight is
//! never interrupted. A timed-out run leaves its last attempt at the output
//! path, which need not fit the budget.

use super::backend::{BackendError, ImageBackend};
use super::calculations::{mb_to_bytes, next_quality, start_quality};
use super::params::{AlphaPolicy, CompressParams, EncodeParams, Quality};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("No decoder available for {0}")]
    Unsupported(PathBuf),
    #[error("Compression failed ({primary}); fallback encode failed ({fallback})")]
    Dropped {
        primary: BackendError,
        fallback: BackendError,
        elapsed: Duration,
    },
}

/// What a compression run produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionOutcome {
    pub elapsed: Duration,
    /// The loop stopped on the wall-clock budget rather than on size or floor.
    pub timed_out: bool,
    /// Quality of the file left at the output path.
    pub final_quality: Quality,
    /// The single-shot fallback wrote the output.
    pub used_fallback: bool,
}

impl CompressionOutcome {
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Compress `params.source` into `params.output`.
pub fn compress(
    backend: &impl ImageBackend,
    params: &CompressParams,
) -> Result<CompressionOutcome, CompressError> {
    let start = Instant::now();

    if !backend.capabilities().can_decode(&params.source) {
        return Err(CompressError::Unsupported(params.source.clone()));
    }

    let primary = match quality_search(backend, params, start) {
        Ok((final_quality, timed_out)) => {
            return Ok(CompressionOutcome {
                elapsed: start.elapsed(),
                timed_out,
                final_quality,
                used_fallback: false,
            });
        }
        Err(e) => e,
    };

    tracing::warn!(
        source = %params.source.display(),
        error = %primary,
        "quality search failed, trying single encode at {}",
        Quality::FALLBACK
    );

    match fallback_encode(backend, params) {
        Ok(()) => Ok(CompressionOutcome {
            elapsed: start.elapsed(),
            timed_out: false,
            final_quality: Quality::FALLBACK,
            used_fallback: true,
        }),
        Err(fallback) => {
            // A half-written attempt must not pose as output
            if let Err(e) = std::fs::remove_file(&params.output) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(output = %params.output.display(), error = %e, "could not remove partial output");
                }
            }
            Err(CompressError::Dropped {
                primary,
                fallback,
                elapsed: start.elapsed(),
            })
        }
    }
}

/// The stepped-quality loop. Returns the last quality written and whether
/// the timeout stopped it.
fn quality_search(
    backend: &impl ImageBackend,
    params: &CompressParams,
    start: Instant,
) -> Result<(Quality, bool), BackendError> {
    let image = backend.load_rgb(&params.source, AlphaPolicy::FlattenOnWhite)?;

    let exif = match backend.read_exif(&params.source) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!(source = %params.source.display(), error = %e, "dropping unreadable EXIF");
            None
        }
    };

    let target_bytes = mb_to_bytes(params.target_size_mb);
    let mut quality = start_quality(params.min_quality);

    loop {
        backend.encode(&EncodeParams {
            image: &image,
            output: &params.output,
            quality,
            exif: exif.as_deref(),
        })?;
        let size = std::fs::metadata(&params.output)?.len();

        if size <= target_bytes {
            return Ok((quality, false));
        }
        let Some(next) = next_quality(quality, params.quality_step, params.min_quality) else {
            return Ok((quality, false));
        };
        if start.elapsed() > params.timeout {
            tracing::debug!(
                source = %params.source.display(),
                %quality,
                size,
                "timeout reached before fitting the budget"
            );
            return Ok((quality, true));
        }
        quality = next;
    }
}

/// Reopen, force RGB, write once at the fallback quality without EXIF.
fn fallback_encode(backend: &impl ImageBackend, params: &CompressParams) -> Result<(), BackendError> {
    let image = backend.load_rgb(&params.source, AlphaPolicy::Discard)?;
    backend.encode(&EncodeParams {
        image: &image,
        output: &params.output,
        quality: Quality::FALLBACK,
        exif: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use tempfile::TempDir;

    /// Megabytes that truncate back to exactly `bytes`.
    fn mb(bytes: u64) -> f64 {
        (bytes as f64 + 0.5) / (1024.0 * 1024.0)
    }

    fn params(tmp: &TempDir, target_bytes: u64) -> CompressParams {
        CompressParams {
            source: tmp.path().join("source.jpg"),
            output: tmp.path().join("out.jpg"),
            target_size_mb: mb(target_bytes),
            min_quality: Quality::new(50),
            quality_step: 5,
            timeout: Duration::from_secs(3600),
        }
    }

    #[test]
    fn fits_on_first_attempt() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_sizes(|q| q.value() as u64 * 100);

        let outcome = compress(&backend, &params(&tmp, 100_000)).unwrap();

        assert_eq!(backend.encoded_qualities(), vec![95]);
        assert_eq!(outcome.final_quality, Quality::new(95));
        assert!(!outcome.timed_out);
        assert!(!outcome.used_fallback);
    }

    #[test]
    fn walks_quality_down_until_it_fits() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_sizes(|q| q.value() as u64 * 100);

        let p = params(&tmp, 7_000);
        let outcome = compress(&backend, &p).unwrap();

        assert_eq!(backend.encoded_qualities(), vec![95, 90, 85, 80, 75, 70]);
        assert_eq!(outcome.final_quality, Quality::new(70));
        assert_eq!(std::fs::metadata(&p.output).unwrap().len(), 7_000);
    }

    #[test]
    fn stops_at_quality_floor() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_sizes(|_| 5_000);

        let outcome = compress(&backend, &params(&tmp, 1_000)).unwrap();

        assert_eq!(
            backend.encoded_qualities(),
            vec![95, 90, 85, 80, 75, 70, 65, 60, 55, 50]
        );
        assert_eq!(outcome.final_quality, Quality::new(50));
        assert!(!outcome.timed_out);
    }

    #[test]
    fn coarse_step_lands_on_floor() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_sizes(|_| 5_000);
        let p = CompressParams {
            quality_step: 30,
            ..params(&tmp, 1_000)
        };

        compress(&backend, &p).unwrap();
        assert_eq!(backend.encoded_qualities(), vec![95, 65, 50]);
    }

    #[test]
    fn timeout_stops_after_first_attempt() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::with_sizes(|_| 5_000);
        backend.encode_delay = Duration::from_millis(5);
        let p = CompressParams {
            timeout: Duration::ZERO,
            ..params(&tmp, 1_000)
        };

        let outcome = compress(&backend, &p).unwrap();

        assert!(outcome.timed_out);
        assert_eq!(backend.encoded_qualities(), vec![95]);
        assert_eq!(outcome.final_quality, Quality::new(95));
        // The partial attempt stays on disk
        assert_eq!(std::fs::metadata(&p.output).unwrap().len(), 5_000);
    }

    #[test]
    fn timeout_ignored_when_first_attempt_fits() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::with_sizes(|_| 10);
        backend.encode_delay = Duration::from_millis(5);
        let p = CompressParams {
            timeout: Duration::ZERO,
            ..params(&tmp, 1_000)
        };

        let outcome = compress(&backend, &p).unwrap();
        assert!(!outcome.timed_out);
    }

    #[test]
    fn exif_is_read_once_and_attached_to_every_attempt() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::with_sizes(|q| q.value() as u64 * 100);
        backend.exif = Some(b"MM\0*".to_vec());

        compress(&backend, &params(&tmp, 8_000)).unwrap();

        let ops = backend.get_operations();
        let reads = ops
            .iter()
            .filter(|op| matches!(op, RecordedOp::ReadExif(_)))
            .count();
        assert_eq!(reads, 1);
        assert!(
            ops.iter()
                .filter(|op| matches!(op, RecordedOp::Encode { .. }))
                .all(|op| matches!(op, RecordedOp::Encode { with_exif: true, .. }))
        );
    }

    #[test]
    fn unreadable_exif_is_tolerated() {
        let tmp = TempDir::new().unwrap();
        let mut backend = MockBackend::with_sizes(|q| q.value() as u64 * 100);
        backend.exif_error = true;

        let outcome = compress(&backend, &params(&tmp, 100_000)).unwrap();

        assert!(!outcome.used_fallback);
        assert!(matches!(
            backend.get_operations().last(),
            Some(RecordedOp::Encode {
                with_exif: false,
                ..
            })
        ));
    }

    #[test]
    fn decode_failure_falls_back_to_single_encode() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_sizes(|_| 5_000);
        *backend.failing_loads.lock().unwrap() = 1;

        let outcome = compress(&backend, &params(&tmp, 1_000)).unwrap();

        assert!(outcome.used_fallback);
        assert!(!outcome.timed_out);
        assert_eq!(outcome.final_quality, Quality::FALLBACK);
        let ops = backend.get_operations();
        assert!(matches!(
            &ops[0],
            RecordedOp::Load {
                alpha: AlphaPolicy::FlattenOnWhite,
                ..
            }
        ));
        assert!(matches!(
            &ops[1],
            RecordedOp::Load {
                alpha: AlphaPolicy::Discard,
                ..
            }
        ));
        assert!(matches!(
            &ops[2],
            RecordedOp::Encode {
                quality: 85,
                with_exif: false,
                ..
            }
        ));
        assert_eq!(ops.len(), 3);
    }

    #[test]
    fn encode_failure_mid_loop_falls_back() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::with_sizes(|_| 5_000);
        *backend.failing_encodes.lock().unwrap() = 1;

        let outcome = compress(&backend, &params(&tmp, 1_000)).unwrap();

        assert!(outcome.used_fallback);
        assert_eq!(backend.encoded_qualities(), vec![95, 85]);
    }

    #[test]
    fn double_failure_drops_image_and_output() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        *backend.failing_loads.lock().unwrap() = 2;
        let p = params(&tmp, 1_000);
        std::fs::write(&p.output, b"stale").unwrap();

        let result = compress(&backend, &p);

        assert!(matches!(result, Err(CompressError::Dropped { .. })));
        assert!(!p.output.exists());
    }

    #[test]
    fn unsupported_format_is_rejected_up_front() {
        let tmp = TempDir::new().unwrap();
        let backend = MockBackend::new();
        let p = CompressParams {
            source: tmp.path().join("IMG_0001.HEIC"),
            ..params(&tmp, 1_000)
        };

        let result = compress(&backend, &p);

        assert!(matches!(result, Err(CompressError::Unsupported(_))));
        assert!(backend.get_operations().is_empty());
    }

    // =========================================================================
    // Real codec
    // =========================================================================

    use crate::imaging::RustBackend;
    use crate::test_helpers::{write_geotagged_noise_jpeg, write_rgba_png};

    #[test]
    fn real_jpeg_meets_budget_or_floor() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("noise.jpg");
        write_geotagged_noise_jpeg(&source, 160, 160);
        let original = std::fs::metadata(&source).unwrap().len();

        let p = CompressParams {
            source: source.clone(),
            output: tmp.path().join("out.jpg"),
            target_size_mb: mb(original / 2),
            min_quality: Quality::new(40),
            quality_step: 10,
            timeout: Duration::from_secs(3600),
        };
        let backend = RustBackend::new();
        let outcome = compress(&backend, &p).unwrap();

        let written = std::fs::metadata(&p.output).unwrap().len();
        assert!(written <= original / 2 || outcome.final_quality == Quality::new(40));
        assert!(!outcome.used_fallback);
        // Location survives recompression
        assert!(crate::metadata::extract(&p.output).unwrap().has_gps());
    }

    #[test]
    fn real_transparent_png_is_flattened_not_dropped() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("clear.png");
        write_rgba_png(&source, 32, 32, 0);

        let p = CompressParams {
            source,
            output: tmp.path().join("clear-out.png"),
            target_size_mb: 1.0,
            min_quality: Quality::new(50),
            quality_step: 5,
            timeout: Duration::from_secs(3600),
        };
        compress(&RustBackend::new(), &p).unwrap();

        // JPEG bytes under the original .png name
        let decoded = image::ImageReader::open(&p.output)
            .unwrap()
            .with_guessed_format()
            .unwrap()
            .decode()
            .unwrap()
            .into_rgb8();
        assert!(decoded.get_pixel(16, 16).0.iter().all(|&c| c >= 250));
    }
}
