//! Scene catalog access
//!
//! The remote catalog is queried elsewhere; this module consumes its results
//! and turns them into validated [`SceneDescriptor`]s.

use std::fmt;
use std::path::PathBuf;

pub mod identifier;
pub mod json;
pub mod query;
pub mod scene;

pub use identifier::SceneIdentifier;
pub use json::JsonCatalog;
pub use query::CatalogQuery;
pub use scene::{CatalogRecord, Coordinate, SceneDescriptor, SceneError};

pub trait SceneCatalog {
    /// Every record matching the query, in catalog order.
    fn records(&self) -> Result<Vec<CatalogRecord>, CatalogError>;
}

impl SceneCatalog for Vec<CatalogRecord> {
    fn records(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        Ok(self.clone())
    }
}

#[derive(Debug)]
pub enum CatalogError {
    Pattern(glob::PatternError),
    NoPages(String),
    Io(PathBuf, std::io::Error),
    Json(PathBuf, serde_json::Error),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Pattern(e) => write!(f, "Invalid catalog pattern: {}", e),
            CatalogError::NoPages(p) => write!(f, "No catalog pages match '{}'", p),
            CatalogError::Io(p, e) => write!(f, "I/O error reading {}: {}", p.display(), e),
            CatalogError::Json(p, e) => {
                write!(f, "Failed to parse catalog page {}: {}", p.display(), e)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Scenes that passed validation, plus the entries that did not.
#[derive(Debug, Default)]
pub struct SceneList {
    pub scenes: Vec<SceneDescriptor>,
    pub rejected: Vec<SceneError>,
    pub duplicates: usize,
}

/// Validates catalog records, keeping catalog order. Records are unique by
/// storage path; a repeated path is dropped.
pub fn load_scenes(records: &[CatalogRecord], source_root: &str) -> SceneList {
    let mut list = SceneList::default();
    for record in records {
        match SceneDescriptor::from_record(record, source_root) {
            Ok(scene) => {
                if list
                    .scenes
                    .iter()
                    .any(|s| s.storage_path == scene.storage_path)
                {
                    log::debug!("Duplicate catalog entry {}", scene.storage_path);
                    list.duplicates += 1;
                    continue;
                }
                list.scenes.push(scene);
            }
            Err(e) => {
                log::warn!("Excluding scene: {}", e);
                list.rejected.push(e);
            }
        }
    }
    list
}
