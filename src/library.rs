//! Library inspection: one [`ImageRecord`] per discovered image.
//!
//! [`inspect`] runs discovery, optionally samples, then extracts metadata for
//! every path on the rayon pool. Extraction is read-only, so files are
//! independent; `collect` on the indexed iterator keeps traversal order.
//!
//! The resulting [`LibraryTable`] is built fresh on every call and never
//! mutated afterwards. The processor only reads and partitions it.

use crate::imaging::{bytes_to_mb, mb_to_bytes};
use crate::metadata::{self, ImageRecord};
use crate::scan::{self, ScanError};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Ordered mapping from image path to its record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryTable {
    records: Vec<ImageRecord>,
    /// Runtime index: path → position in `records`. Never serialized.
    #[serde(skip)]
    index: HashMap<PathBuf, usize>,
}

impl LibraryTable {
    /// Build a table, keeping the first record for any repeated path.
    pub fn from_records(records: impl IntoIterator<Item = ImageRecord>) -> Self {
        let mut table = Self::default();
        for record in records {
            if table.index.contains_key(&record.path) {
                continue;
            }
            table.index.insert(record.path.clone(), table.records.len());
            table.records.push(record);
        }
        table
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&ImageRecord> {
        self.index.get(path).map(|&i| &self.records[i])
    }

    /// Records in insertion (traversal) order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size_bytes).sum()
    }

    pub fn total_size_mb(&self) -> f64 {
        bytes_to_mb(self.total_size_bytes())
    }

    pub fn gps_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_gps()).count()
    }

    /// Split into `(compliant, oversized)` against a size budget.
    /// Compliant means `size <= target`.
    pub fn partition(&self, target_size_mb: f64) -> (Vec<&ImageRecord>, Vec<&ImageRecord>) {
        let target_bytes = mb_to_bytes(target_size_mb);
        self.records
            .iter()
            .partition(|r| r.size_bytes <= target_bytes)
    }
}

/// Inspect every image under `root`, optionally capped to a random sample.
pub fn inspect(root: &Path, sample_cap: Option<usize>) -> Result<LibraryTable, ScanError> {
    let mut paths = scan::find_images(root)?;
    if let Some(cap) = sample_cap {
        paths = scan::sample(paths, cap);
    }

    let records: Vec<ImageRecord> = paths
        .par_iter()
        .filter_map(|path| metadata::extract(path))
        .collect();

    tracing::debug!(
        root = %root.display(),
        images = records.len(),
        "inspection complete"
    );
    Ok(LibraryTable::from_records(records))
}
