//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Inspect
//!
//! ```text
//! Library: iCloud Photos
//!     Images: 1204
//!     Total size: 3812.44 MB
//!     With location: 1100
//!     Missing location: 104
//!     Over 3.00 MB: 412
//! ```
//!
//! ## Process
//!
//! ```text
//! Processing 1204 images (792 to copy, 412 to compress)
//!     0001/1204 IMG_0001.JPG
//!         Source: iCloud Photos/2023/IMG_0001.JPG
//!         copied → processed-photos/IMG_0001.JPG
//!     0793/1204 IMG_0812.HEIC
//!         Source: iCloud Photos/2023/IMG_0812.HEIC
//!         failed: no decoder for this format
//!     0794/1204 IMG_0813.JPG
//!         Source: iCloud Photos/2024/IMG_0813.JPG
//!         timed out after 31.2s, kept original → processed-photos/IMG_0813.JPG
//!         Partial: processed-photos/problem-photos/IMG_0813.JPG
//!
//! Processed 1203 of 1204 images (1 timed out, 1 failed)
//!     iCloud Photos/2023/IMG_0812.HEIC: no decoder for this format
//! Reduced 1523.10 MB (39.95%, 1.26 MB per image) in total image size.
//! Processing time: 12.40 minutes
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::library::LibraryTable;
use crate::process::{ImageStatus, ProcessEvent, ProcessReport};
use std::path::Path;
use std::time::Duration;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Zero-padded position, as wide as the total.
fn format_position(index: usize, total: usize) -> String {
    let width = total.to_string().len().max(3);
    format!("{index:0width$}/{total:0width$}")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Inspect
// ============================================================================

pub fn format_inspect_summary(table: &LibraryTable, root: &Path, target_size_mb: f64) -> Vec<String> {
    let (_, oversized) = table.partition(target_size_mb);
    let with_gps = table.gps_count();
    vec![
        format!("Library: {}", root.display()),
        format!("{}Images: {}", indent(1), table.len()),
        format!("{}Total size: {:.2} MB", indent(1), table.total_size_mb()),
        format!("{}With location: {}", indent(1), with_gps),
        format!("{}Missing location: {}", indent(1), table.len() - with_gps),
        format!(
            "{}Over {:.2} MB: {}",
            indent(1),
            target_size_mb,
            oversized.len()
        ),
    ]
}

pub fn print_inspect_summary(table: &LibraryTable, root: &Path, target_size_mb: f64) {
    for line in format_inspect_summary(table, root, target_size_mb) {
        println!("{}", line);
    }
}

// ============================================================================
// Process
// ============================================================================

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started {
            compliant,
            oversized,
        } => vec![format!(
            "Processing {} images ({} to copy, {} to compress)",
            compliant + oversized,
            compliant,
            oversized
        )],
        ProcessEvent::ImageFinished {
            index,
            total,
            source,
            status,
        } => {
            let mut lines = vec![
                format!(
                    "{}{} {}",
                    indent(1),
                    format_position(*index, *total),
                    file_name(source)
                ),
                format!("{}Source: {}", indent(2), source.display()),
            ];
            match status {
                ImageStatus::Copied { destination } => {
                    lines.push(format!("{}copied → {}", indent(2), destination.display()));
                }
                ImageStatus::Compressed {
                    destination,
                    quality,
                    elapsed,
                    used_fallback,
                } => {
                    let how = if *used_fallback {
                        "compressed (fallback)"
                    } else {
                        "compressed"
                    };
                    lines.push(format!(
                        "{}{} at {} in {} → {}",
                        indent(2),
                        how,
                        quality,
                        format_seconds(*elapsed),
                        destination.display()
                    ));
                }
                ImageStatus::TimedOut {
                    destination,
                    problem,
                    elapsed,
                } => {
                    lines.push(format!(
                        "{}timed out after {}, kept original → {}",
                        indent(2),
                        format_seconds(*elapsed),
                        destination.display()
                    ));
                    lines.push(format!("{}Partial: {}", indent(2), problem.display()));
                }
                ImageStatus::Failed(reason) => {
                    lines.push(format!("{}failed: {}", indent(2), reason));
                }
            }
            lines
        }
    }
}

fn format_seconds(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

/// Run totals followed by one line per failed image.
pub fn format_process_summary(report: &ProcessReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Processed {} of {} images ({} timed out, {} failed)",
        report.written(),
        report.inspected,
        report.timed_out_count(),
        report.failures.len()
    )];
    for failed in &report.failures {
        lines.push(format!(
            "{}{}: {}",
            indent(1),
            failed.source.display(),
            failed.reason
        ));
    }
    lines
}

pub fn print_process_summary(report: &ProcessReport) {
    for line in format_process_summary(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Size reduction
// ============================================================================

/// Before/after size comparison plus wall-clock time.
///
/// `images` is the number of inspected source images; the per-image figure is
/// the total reduction spread across them.
pub fn format_size_reduction(
    prior_mb: f64,
    posterior_mb: f64,
    images: usize,
    elapsed: Duration,
) -> Vec<String> {
    let reduction = prior_mb - posterior_mb;
    let percentage = if prior_mb > 0.0 {
        reduction / prior_mb * 100.0
    } else {
        0.0
    };
    let per_image = if images > 0 {
        reduction / images as f64
    } else {
        0.0
    };
    vec![
        format!(
            "Reduced {:.2} MB ({:.2}%, {:.2} MB per image) in total image size.",
            reduction, percentage, per_image
        ),
        format!("Processing time: {:.2} minutes", elapsed.as_secs_f64() / 60.0),
    ]
}

pub fn print_size_reduction(prior_mb: f64, posterior_mb: f64, images: usize, elapsed: Duration) {
    for line in format_size_reduction(prior_mb, posterior_mb, images, elapsed) {
        println!("{}", line);
    }
}
