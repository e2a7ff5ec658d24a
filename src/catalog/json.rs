use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::{CatalogError, CatalogRecord, SceneCatalog};

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: CatalogRecord,
}

/// Catalog search results saved as one JSON file per result page.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    pages: Vec<PathBuf>,
}

impl JsonCatalog {
    /// Collects every page matching `pattern`, in file name order.
    pub fn from_glob(pattern: &str) -> Result<Self, CatalogError> {
        let mut pages = Vec::new();
        for entry in glob::glob(pattern).map_err(CatalogError::Pattern)? {
            let path = entry.map_err(|e| CatalogError::Io(e.path().to_path_buf(), e.into_error()))?;
            if path.is_file() {
                pages.push(path);
            }
        }

        if pages.is_empty() {
            return Err(CatalogError::NoPages(pattern.to_string()));
        }

        pages.sort();
        Ok(JsonCatalog { pages })
    }

    pub fn pages(&self) -> &[PathBuf] {
        &self.pages
    }

    fn read_page(path: &Path) -> Result<Vec<CatalogRecord>, CatalogError> {
        let file = File::open(path).map_err(|e| CatalogError::Io(path.to_path_buf(), e))?;
        let page: Page = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| CatalogError::Json(path.to_path_buf(), e))?;
        Ok(page.features.into_iter().map(|f| f.properties).collect())
    }
}

impl SceneCatalog for JsonCatalog {
    fn records(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let mut records = Vec::new();
        for (index, page) in self.pages.iter().enumerate() {
            let page_records = Self::read_page(page)?;
            log::debug!(
                "Returned {} products in page {} ({})",
                page_records.len(),
                index + 1,
                page.display()
            );
            records.extend(page_records);
        }
        Ok(records)
    }
}
