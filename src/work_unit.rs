use std::path::{Path, PathBuf};

use crate::catalog::SceneDescriptor;

pub const OUTPUT_EXTENSION: &str = "dim";
const COHERENCE_SUFFIX: &str = "_IntCoh";

/// Where scenes are read from and where their products are written.
///
/// Output and input locations mirror the archive layout below `source_root`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    pub source_root: String,
    pub base_save_dir: String,
    pub base_data_dir: Option<String>,
}

impl OutputLayout {
    pub fn new(source_root: &str, base_save_dir: &str) -> Self {
        Self {
            source_root: source_root.to_string(),
            base_save_dir: base_save_dir.to_string(),
            base_data_dir: None,
        }
    }

    /// Moves `storage_path` from under `source_root` to under `new_root`.
    /// Paths outside `source_root` keep only their file name.
    fn rebase(&self, storage_path: &str, new_root: &str) -> PathBuf {
        let root = self.source_root.trim_end_matches('/');
        let relative = storage_path
            .strip_prefix(root)
            .filter(|rest| rest.starts_with('/'))
            .map(|rest| rest.trim_start_matches('/'))
            .or_else(|| Path::new(storage_path).file_name().and_then(|f| f.to_str()))
            .unwrap_or(storage_path);
        Path::new(new_root).join(relative)
    }

    /// Path handed to the processing job for `scene`.
    pub fn input_path(&self, scene: &SceneDescriptor) -> PathBuf {
        match &self.base_data_dir {
            Some(dir) => self.rebase(&scene.storage_path, dir),
            None => PathBuf::from(&scene.storage_path),
        }
    }

    fn save_path(&self, scene: &SceneDescriptor) -> PathBuf {
        self.rebase(&scene.storage_path, &self.base_save_dir)
    }
}

/// One item of processing work.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkUnit {
    Single {
        scene: SceneDescriptor,
    },
    Pair {
        primary: SceneDescriptor,
        secondary: SceneDescriptor,
    },
}

impl WorkUnit {
    /// `S1A_IW_SLC__1SDV_<primary start>_<secondary start>_IntCoh.dim` for pairs,
    /// the scene's own name with a `.dim` extension otherwise.
    pub fn output_name(&self) -> String {
        match self {
            WorkUnit::Single { scene } => {
                let stem = Path::new(&scene.storage_path)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(&scene.storage_path);
                format!("{}.{}", stem, OUTPUT_EXTENSION)
            }
            WorkUnit::Pair { primary, secondary } => format!(
                "{}_{}_{}_{}{}.{}",
                primary.identifier.product_prefix(),
                primary.identifier.product_class,
                primary.identifier.start_token(),
                secondary.identifier.start_token(),
                COHERENCE_SUFFIX,
                OUTPUT_EXTENSION
            ),
        }
    }

    pub fn expected_output_path(&self, layout: &OutputLayout) -> PathBuf {
        let scene = match self {
            WorkUnit::Single { scene } => scene,
            WorkUnit::Pair { primary, .. } => primary,
        };
        layout
            .save_path(scene)
            .with_file_name(self.output_name())
    }

    /// One list-file line: the scene path, or `secondary primary output` for pairs.
    pub fn list_line(&self, layout: &OutputLayout) -> String {
        match self {
            WorkUnit::Single { scene } => layout.input_path(scene).display().to_string(),
            WorkUnit::Pair { primary, secondary } => format!(
                "{} {} {}",
                layout.input_path(secondary).display(),
                layout.input_path(primary).display(),
                self.expected_output_path(layout).display()
            ),
        }
    }

    pub fn scenes(&self) -> Vec<&SceneDescriptor> {
        match self {
            WorkUnit::Single { scene } => vec![scene],
            WorkUnit::Pair { primary, secondary } => vec![primary, secondary],
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::catalog::scene::{Centroid, OrbitNumbers};
    use crate::catalog::{CatalogRecord, SceneDescriptor};

    pub const SOURCE_ROOT: &str = "/g/data/fj7/Copernicus";

    /// Catalog entry for a scene acquired on 2018-01-`day`, absolute orbit `abs_orbit`.
    pub fn record(day: u32, lat: &str, lon: &str, abs_orbit: u32, rel_orbit: u32) -> CatalogRecord {
        CatalogRecord {
            storage_path: Some(format!(
                "{SOURCE_ROOT}/Sentinel-1/C-SAR/SLC/2018/2018-01/35S145E-40S150E/\
                 S1A_IW_SLC__1SDV_201801{day:02}T193217_201801{day:02}T193244_{abs_orbit:06}_02200B_8E03.zip"
            )),
            centroid: Some(Centroid {
                latitude: Some(lat.to_string()),
                longitude: Some(lon.to_string()),
            }),
            orbit: Some(OrbitNumbers {
                absolute: Some(abs_orbit),
                relative: Some(rel_orbit),
            }),
            ..Default::default()
        }
    }

    pub fn scene(day: u32, lat: &str, lon: &str, abs_orbit: u32, rel_orbit: u32) -> SceneDescriptor {
        let record = record(day, lat, lon, abs_orbit, rel_orbit);
        SceneDescriptor::from_record(&record, SOURCE_ROOT).unwrap()
    }
}
