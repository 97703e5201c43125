//! End-to-end library processing.
//!
//! Takes an inspected library and produces the bucketed output tree:
//!
//! ```text
//! input/ ──inspect──► LibraryTable ──partition(target)──┬─ compliant ─► copy as-is
//!                                                       └─ oversized ─► compress
//! ```
//!
//! Both paths route by GPS presence: geotagged images land in the output root,
//! the rest in `missing-locations/`.
//!
//! ## Timeout Reconciliation
//!
//! When the compression engine runs out of time, the file at the destination
//! is a partial attempt that may still exceed the budget. It is moved to
//! `problem-photos/<name>` and the untouched original is copied into the
//! destination, so the visible library always holds a viewable file:
//!
//! ```text
//! output/IMG_0042.JPG                  ← original bytes
//! output/problem-photos/IMG_0042.JPG   ← last partial encode
//! ```
//!
//! ## Failures
//!
//! Per-image problems never abort the run. They are collected in
//! [`ProcessReport::failures`] with a [`FailureReason`] and logged at `warn`.
//! Only run-level problems (missing input, unwritable output root) are errors.
//!
//! Compression runs one image at a time, so each image's timeout measures its
//! own encode work only.

use crate::config::Config;
use crate::imaging::{
    CompressError, CompressParams, ImageBackend, Quality, RustBackend, compress,
};
use crate::library::{self, LibraryTable};
use crate::metadata::ImageRecord;
use crate::naming::{Bucket, DestinationNames};
use crate::scan::{self, ScanError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Refusing to clean {output}: it contains the input library {input}")]
    UnsafeClean { output: PathBuf, input: PathBuf },
    #[error("Output directory {0} is the input library")]
    OutputIsInput(PathBuf),
}

/// Run-time knobs for one processing run.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryParams {
    pub target_size_mb: f64,
    pub min_quality: Quality,
    pub quality_step: u8,
    /// Per-image wall-clock budget for the quality search.
    pub timeout: Duration,
    /// Process a random subset of this many images.
    pub sample_size: Option<usize>,
    /// Remove the output directory before writing.
    pub clean_output: bool,
}

impl LibraryParams {
    /// Build run parameters from a validated [`Config`].
    pub fn from_config(config: &Config) -> Self {
        let c = &config.compression;
        Self {
            target_size_mb: c.target_size_mb,
            min_quality: Quality::new(c.min_quality),
            quality_step: c.quality_step.min(u8::MAX as u32) as u8,
            timeout: Duration::try_from_secs_f64(c.timeout_seconds).unwrap_or(Duration::MAX),
            sample_size: config.library.sample_size,
            clean_output: config.library.clean_output,
        }
    }
}

impl Default for LibraryParams {
    fn default() -> Self {
        Self {
            clean_output: false,
            ..Self::from_config(&Config::default())
        }
    }
}

/// Why an image has no (or no complete) output.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("no decoder for this format")]
    UnsupportedFormat,
    #[error("dropped: {0}")]
    Dropped(String),
    #[error("copy failed: {0}")]
    Copy(String),
    #[error("could not move partial encode to problem-photos: {0}")]
    Move(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedImage {
    pub source: PathBuf,
    pub reason: FailureReason,
}

/// Per-destination results of a run.
///
/// All maps are keyed by the final destination path, never the
/// problem-photos path.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ProcessReport {
    /// Images found by inspection (after sampling).
    pub inspected: usize,
    /// Combined size of the inspected sources.
    pub source_size_mb: f64,
    /// Compression seconds; 0 for copied images.
    pub elapsed: BTreeMap<PathBuf, f64>,
    pub timed_out: BTreeMap<PathBuf, bool>,
    /// Quality of the encode at each compressed destination.
    pub final_quality: BTreeMap<PathBuf, u8>,
    pub failures: Vec<FailedImage>,
}

impl ProcessReport {
    /// Number of destinations written.
    pub fn written(&self) -> usize {
        self.elapsed.len()
    }

    pub fn timed_out_count(&self) -> usize {
        self.timed_out.values().filter(|&&t| t).count()
    }

    fn record(&mut self, destination: &Path, elapsed: Duration, timed_out: bool) {
        self.elapsed
            .insert(destination.to_path_buf(), elapsed.as_secs_f64());
        self.timed_out.insert(destination.to_path_buf(), timed_out);
    }

    fn fail(&mut self, source: &Path, reason: FailureReason) {
        tracing::warn!(source = %source.display(), %reason, "image not processed");
        self.failures.push(FailedImage {
            source: source.to_path_buf(),
            reason,
        });
    }
}

/// Progress notifications, one per image plus a run header.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        compliant: usize,
        oversized: usize,
    },
    ImageFinished {
        /// 1-based position in processing order.
        index: usize,
        total: usize,
        source: PathBuf,
        status: ImageStatus,
    },
}

#[derive(Debug, Clone)]
pub enum ImageStatus {
    Copied {
        destination: PathBuf,
    },
    Compressed {
        destination: PathBuf,
        quality: Quality,
        elapsed: Duration,
        used_fallback: bool,
    },
    TimedOut {
        destination: PathBuf,
        problem: PathBuf,
        elapsed: Duration,
    },
    Failed(FailureReason),
}

/// Process `input` into `output` with the pure-Rust codec backend.
pub fn process_library(
    input: &Path,
    output: &Path,
    params: &LibraryParams,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessReport, ProcessError> {
    let backend = RustBackend::new();
    process_with_backend(&backend, input, output, params, events)
}

/// Process using a specific backend (allows testing with mock).
pub fn process_with_backend(
    backend: &impl ImageBackend,
    input: &Path,
    output: &Path,
    params: &LibraryParams,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessReport, ProcessError> {
    let run_start = Instant::now();
    prepare_output(input, output, params.clean_output)?;

    let table = library::inspect(input, params.sample_size)?;
    let report = process_table(backend, &table, output, params, events.as_ref());

    tracing::info!(
        images = table.len(),
        written = report.written(),
        timed_out = report.timed_out_count(),
        failed = report.failures.len(),
        seconds = run_start.elapsed().as_secs_f64(),
        "library processed"
    );
    Ok(report)
}

/// Create the three bucket directories, optionally wiping `output` first.
///
/// Nothing is touched unless `input` is a readable library that is not
/// `output` itself.
fn prepare_output(input: &Path, output: &Path, clean: bool) -> Result<(), ProcessError> {
    scan::check_root(input)?;

    if output.exists() {
        let output_abs = fs::canonicalize(output)?;
        let input_abs = fs::canonicalize(input)?;
        if input_abs == output_abs {
            return Err(ProcessError::OutputIsInput(output.to_path_buf()));
        }
        if clean {
            if input_abs.starts_with(&output_abs) {
                return Err(ProcessError::UnsafeClean {
                    output: output.to_path_buf(),
                    input: input.to_path_buf(),
                });
            }
            tracing::debug!(output = %output.display(), "removing previous output");
            fs::remove_dir_all(output)?;
        }
    }

    for bucket in [Bucket::Main, Bucket::MissingLocations, Bucket::ProblemPhotos] {
        fs::create_dir_all(bucket.dir(output))?;
    }
    Ok(())
}

fn process_table(
    backend: &impl ImageBackend,
    table: &LibraryTable,
    output: &Path,
    params: &LibraryParams,
    events: Option<&Sender<ProcessEvent>>,
) -> ProcessReport {
    let (compliant, oversized) = table.partition(params.target_size_mb);
    let total = compliant.len() + oversized.len();
    emit(
        events,
        ProcessEvent::Started {
            compliant: compliant.len(),
            oversized: oversized.len(),
        },
    );

    let mut names = DestinationNames::new(output);
    let mut report = ProcessReport {
        inspected: table.len(),
        source_size_mb: table.total_size_mb(),
        ..ProcessReport::default()
    };

    let work = compliant
        .into_iter()
        .map(|r| (r, false))
        .chain(oversized.into_iter().map(|r| (r, true)));

    for (i, (record, needs_compression)) in work.enumerate() {
        let destination = names.allocate(Bucket::for_gps(record.has_gps()), &record.path);
        let status = if needs_compression {
            compress_one(backend, record, &destination, &names, params, &mut report)
        } else {
            copy_one(record, &destination, &mut report)
        };
        emit(
            events,
            ProcessEvent::ImageFinished {
                index: i + 1,
                total,
                source: record.path.clone(),
                status,
            },
        );
    }

    report
}

fn copy_one(record: &ImageRecord, destination: &Path, report: &mut ProcessReport) -> ImageStatus {
    match copy_preserving_mtime(&record.path, destination) {
        Ok(()) => {
            report.record(destination, Duration::ZERO, false);
            ImageStatus::Copied {
                destination: destination.to_path_buf(),
            }
        }
        Err(e) => {
            let reason = FailureReason::Copy(e.to_string());
            report.fail(&record.path, reason.clone());
            ImageStatus::Failed(reason)
        }
    }
}

fn compress_one(
    backend: &impl ImageBackend,
    record: &ImageRecord,
    destination: &Path,
    names: &DestinationNames,
    params: &LibraryParams,
    report: &mut ProcessReport,
) -> ImageStatus {
    if let Err(e) = ensure_distinct(&record.path, destination) {
        let reason = FailureReason::Copy(e.to_string());
        report.fail(&record.path, reason.clone());
        return ImageStatus::Failed(reason);
    }

    let compress_params = CompressParams {
        source: record.path.clone(),
        output: destination.to_path_buf(),
        target_size_mb: params.target_size_mb,
        min_quality: params.min_quality,
        quality_step: params.quality_step,
        timeout: params.timeout,
    };

    let outcome = match compress(backend, &compress_params) {
        Ok(outcome) => outcome,
        Err(e) => {
            let reason = match e {
                CompressError::Unsupported(_) => FailureReason::UnsupportedFormat,
                dropped @ CompressError::Dropped { .. } => FailureReason::Dropped(dropped.to_string()),
            };
            report.fail(&record.path, reason.clone());
            return ImageStatus::Failed(reason);
        }
    };

    if !outcome.timed_out {
        report.record(destination, outcome.elapsed, false);
        report
            .final_quality
            .insert(destination.to_path_buf(), outcome.final_quality.value());
        return ImageStatus::Compressed {
            destination: destination.to_path_buf(),
            quality: outcome.final_quality,
            elapsed: outcome.elapsed,
            used_fallback: outcome.used_fallback,
        };
    }

    let problem = names.problem_path(destination);
    if let Err(e) = move_file(destination, &problem) {
        // Leave the destination viewable even though the attempt is lost
        if let Err(copy_err) = copy_preserving_mtime(&record.path, destination) {
            tracing::warn!(destination = %destination.display(), error = %copy_err, "original not restored");
        }
        let reason = FailureReason::Move(e.to_string());
        report.fail(&record.path, reason.clone());
        return ImageStatus::Failed(reason);
    }
    if let Err(e) = copy_preserving_mtime(&record.path, destination) {
        let reason = FailureReason::Copy(e.to_string());
        report.fail(&record.path, reason.clone());
        return ImageStatus::Failed(reason);
    }

    tracing::info!(
        source = %record.path.display(),
        problem = %problem.display(),
        seconds = outcome.elapsed_seconds(),
        "compression timed out, kept original"
    );
    report.record(destination, outcome.elapsed, true);
    ImageStatus::TimedOut {
        destination: destination.to_path_buf(),
        problem,
        elapsed: outcome.elapsed,
    }
}

/// Byte-for-byte copy that also carries over the modification time.
///
/// Refuses to copy a file onto itself. Otherwise only the copy itself can
/// fail; a timestamp that cannot be set (read-only source permissions travel
/// with the copy) is logged and left as is.
pub fn copy_preserving_mtime(source: &Path, destination: &Path) -> io::Result<()> {
    ensure_distinct(source, destination)?;
    fs::copy(source, destination)?;
    let stamp = fs::metadata(source)
        .and_then(|meta| meta.modified())
        .and_then(|modified| {
            fs::OpenOptions::new()
                .write(true)
                .open(destination)?
                .set_modified(modified)
        });
    if let Err(e) = stamp {
        tracing::debug!(destination = %destination.display(), error = %e, "modification time not preserved");
    }
    Ok(())
}

/// Error when `destination` already exists and is the same file as `source`.
fn ensure_distinct(source: &Path, destination: &Path) -> io::Result<()> {
    let (Ok(a), Ok(b)) = (fs::canonicalize(source), fs::canonicalize(destination)) else {
        return Ok(());
    };
    if a == b {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is the source file itself", destination.display()),
        ));
    }
    Ok(())
}

/// Rename, falling back to copy + remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

fn emit(events: Option<&Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // A closed receiver only means nobody is watching
        tx.send(event).ok();
    }
}
