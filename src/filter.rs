//! Skips work whose output product already exists.
//!
//! Existence is checked once per unit. Nothing stops another run writing to
//! the same save tree in the meantime; runs over overlapping queries must be
//! serialised by the operator.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::work_unit::{OUTPUT_EXTENSION, OutputLayout, WorkUnit};

pub trait ArtifactStore {
    fn exists(&self, path: &Path) -> bool;
}

/// Asks the filesystem directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifacts;

impl ArtifactStore for FsArtifacts {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Snapshot of every output product found below a directory.
#[derive(Debug, Default, Clone)]
pub struct ArtifactIndex {
    products: HashSet<PathBuf>,
}

impl ArtifactIndex {
    pub fn scan<P: AsRef<Path>>(base_dir: P) -> Self {
        let base_dir = base_dir.as_ref();
        let mut products = HashSet::new();
        if !base_dir.exists() {
            return ArtifactIndex { products };
        }

        for entry in WalkDir::new(base_dir).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some(OUTPUT_EXTENSION)
            {
                products.insert(entry.path().to_path_buf());
            }
        }

        log::debug!(
            "Found {} existing products under {}",
            products.len(),
            base_dir.display()
        );
        ArtifactIndex { products }
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl ArtifactStore for ArtifactIndex {
    fn exists(&self, path: &Path) -> bool {
        self.products.contains(path)
    }
}

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub kept: Vec<WorkUnit>,
    pub dropped: usize,
}

/// Drops units whose expected output exists, unless `force_reprocess` is set.
pub fn filter_existing(
    units: Vec<WorkUnit>,
    layout: &OutputLayout,
    store: &dyn ArtifactStore,
    force_reprocess: bool,
) -> FilterOutcome {
    if force_reprocess {
        return FilterOutcome {
            kept: units,
            dropped: 0,
        };
    }

    let total = units.len();
    let kept: Vec<WorkUnit> = units
        .into_iter()
        .filter(|unit| {
            let output = unit.expected_output_path(layout);
            let done = store.exists(&output);
            if done {
                log::debug!("Already processed: {}", output.display());
            }
            !done
        })
        .collect();

    let dropped = total - kept.len();
    if dropped != 0 {
        log::info!(
            "A total of {} units (of {}) were found to be already processed (not re-processing)",
            dropped,
            total
        );
    }
    FilterOutcome { kept, dropped }
}
