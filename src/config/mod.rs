use chrono::{DateTime, Local, NaiveDate};

use serde::Deserialize;
use serde::Deserializer;
use serde::de::Error;

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::bbox::Bbox;
use crate::catalog::CatalogQuery;
use crate::catalog::query::{OrbitDirection, Polarisation, Product, SARA_SEARCH_URL, SensorMode};
use crate::emit::{NamedParameters, ResourceProfile, SchedulerKind};
use crate::estimator::WorkloadProfile;
use crate::pairing::{DEFAULT_COORD_PRECISION, DEFAULT_MAX_ORBIT_DELTA, PairingRule};
use crate::partition::BatchLimits;
use crate::work_unit::OutputLayout;

pub mod error;
pub use error::ConfigError;

pub mod workflow;
pub use workflow::Workflow;

pub const DEFAULT_PIXEL_RES: &str = "25.0";
pub const DEFAULT_N_CPUS: u32 = 8;
/// Per job. SNAP's -Xmx setting should stay near 75% of this.
pub const DEFAULT_MEM_GB: u32 = 100;
pub const DEFAULT_SOURCE_ROOT: &str = "/g/data/fj7/Copernicus";

/// Everything one submission run needs, validated on load.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    query: CatalogQuery,
    workflow: Workflow,
    layout: OutputLayout,
    resources: ResourceProfile,
    limits: BatchLimits,
    pairing: PairingRule,
    calibration: WorkloadProfile,
    gpt_exec: Option<PathBuf>,
    pixel_res: String,
    dem_source: Option<String>,
    jobs_basename: Option<String>,
    reprocess_existing: bool,
    submit: bool,
}

// Deserializes a CampaignConfig, checking dates, bbox and resource limits and
// filling per-workflow defaults for anything left out.
impl<'de> Deserialize<'de> for CampaignConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ConfigHelper {
            start_date: String,
            end_date: String,
            bbox: BboxHelper,
            workflow: Workflow,
            #[serde(default)]
            product: Product,
            #[serde(default)]
            mode: SensorMode,
            polarisation: Option<Polarisation>,
            orbit_number: Option<u32>,
            orbit_direction: Option<OrbitDirection>,
            source_root: Option<String>,
            base_save_dir: String,
            base_data_dir: Option<String>,
            gpt_exec: Option<PathBuf>,
            pixel_res: Option<String>,
            dem_source: Option<String>,
            #[serde(default)]
            scheduler: SchedulerKind,
            job_script: Option<String>,
            n_cpus: Option<u32>,
            mem_gb: Option<u32>,
            jobfs_gb: Option<u32>,
            queue: Option<String>,
            project: Option<String>,
            #[serde(default)]
            express: bool,
            #[serde(default)]
            extra_resources: Vec<String>,
            max_units_per_job: Option<usize>,
            max_walltime_minutes_per_job: Option<f64>,
            max_jobs: Option<usize>,
            max_orbit_delta: Option<u32>,
            coord_precision: Option<usize>,
            calibration: Option<WorkloadProfile>,
            jobs_basename: Option<String>,
            #[serde(default)]
            reprocess_existing: bool,
            #[serde(default)]
            submit: bool,
        }

        #[derive(Deserialize)]
        struct BboxHelper {
            west: f64,
            east: f64,
            south: f64,
            north: f64,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        let start_date = NaiveDate::parse_from_str(&helper.start_date, "%Y-%m-%d")
            .map_err(|e| D::Error::custom(format!("Invalid start_date format: {}", e)))?;

        let end_date = NaiveDate::parse_from_str(&helper.end_date, "%Y-%m-%d")
            .map_err(|e| D::Error::custom(format!("Invalid end_date format: {}", e)))?;

        if start_date > end_date {
            return Err(D::Error::custom(ConfigError::DateOrder));
        }

        let b = helper.bbox;
        let bbox = Bbox::new(b.west, b.east, b.south, b.north)
            .map_err(|e| D::Error::custom(ConfigError::Bbox(e)))?;

        let workflow = helper.workflow;
        let defaults = workflow.default_limits();
        let limits = BatchLimits {
            max_units_per_batch: helper
                .max_units_per_job
                .unwrap_or(defaults.max_units_per_batch),
            max_walltime_minutes_per_batch: helper
                .max_walltime_minutes_per_job
                .unwrap_or(defaults.max_walltime_minutes_per_batch),
            max_batch_count: helper.max_jobs.unwrap_or(defaults.max_batch_count),
        };
        if limits.max_units_per_batch == 0 {
            return Err(D::Error::custom(ConfigError::Limit("max_units_per_job")));
        }
        if !(limits.max_walltime_minutes_per_batch > 0.0) {
            return Err(D::Error::custom(ConfigError::Limit(
                "max_walltime_minutes_per_job",
            )));
        }
        if limits.max_batch_count == 0 {
            return Err(D::Error::custom(ConfigError::Limit("max_jobs")));
        }

        let n_cpus = helper.n_cpus.unwrap_or(DEFAULT_N_CPUS);
        let mem_gb = helper.mem_gb.unwrap_or(DEFAULT_MEM_GB);
        if mem_gb == 0 {
            return Err(D::Error::custom(ConfigError::Limit("mem_gb")));
        }

        let pairing = PairingRule {
            max_orbit_delta: helper.max_orbit_delta.unwrap_or(DEFAULT_MAX_ORBIT_DELTA),
            coord_precision: helper.coord_precision.unwrap_or(DEFAULT_COORD_PRECISION),
        };
        if pairing.max_orbit_delta == 0 {
            return Err(D::Error::custom(ConfigError::Limit("max_orbit_delta")));
        }
        if pairing.coord_precision == 0 {
            return Err(D::Error::custom(ConfigError::Limit("coord_precision")));
        }

        let mut query = CatalogQuery::new(start_date, end_date, bbox);
        query.product = helper.product;
        query.mode = helper.mode;
        query.polarisation = helper.polarisation;
        query.orbit_number = helper.orbit_number;
        query.orbit_direction = helper.orbit_direction;

        let layout = OutputLayout {
            source_root: helper
                .source_root
                .unwrap_or_else(|| DEFAULT_SOURCE_ROOT.to_string()),
            base_save_dir: with_trailing_slash(helper.base_save_dir),
            base_data_dir: helper.base_data_dir.map(with_trailing_slash),
        };

        let resources = ResourceProfile {
            scheduler: helper.scheduler,
            job_script: helper
                .job_script
                .unwrap_or_else(|| workflow.default_job_script()),
            n_cpus,
            mem_gb,
            jobfs_gb: helper.jobfs_gb,
            queue: helper.queue,
            project: helper.project,
            express: helper.express,
            extra_resources: helper.extra_resources,
        };

        if resources.scheduler == SchedulerKind::Shell && helper.gpt_exec.is_none() {
            return Err(D::Error::custom(ConfigError::ShellWithoutGpt));
        }

        let calibration = helper.calibration.unwrap_or_else(|| workflow.calibration());
        check_cpu_count(n_cpus, &calibration).map_err(D::Error::custom)?;

        Ok(CampaignConfig {
            query,
            workflow,
            layout,
            resources,
            limits,
            pairing,
            calibration,
            gpt_exec: helper.gpt_exec,
            pixel_res: helper
                .pixel_res
                .unwrap_or_else(|| DEFAULT_PIXEL_RES.to_string()),
            dem_source: helper.dem_source,
            jobs_basename: helper.jobs_basename,
            reprocess_existing: helper.reprocess_existing,
            submit: helper.submit,
        })
    }
}

/// The fitted walltime curve drops to zero past the CPU counts it was measured
/// on, which would size every job at the one-minute floor.
fn check_cpu_count(n_cpus: u32, calibration: &WorkloadProfile) -> Result<(), ConfigError> {
    if n_cpus == 0 {
        return Err(ConfigError::Limit("n_cpus"));
    }
    if calibration.minutes_per_unit(n_cpus) <= 0.0 {
        return Err(ConfigError::CpuCount(n_cpus));
    }
    Ok(())
}

fn with_trailing_slash(mut dir: String) -> String {
    if !dir.ends_with('/') {
        dir.push('/');
    }
    dir
}

impl CampaignConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<CampaignConfig, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: CampaignConfig = serde_json::from_reader(reader).map_err(ConfigError::from)?;

        Ok(config)
    }

    pub fn query(&self) -> &CatalogQuery {
        &self.query
    }

    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn resources(&self) -> &ResourceProfile {
        &self.resources
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    pub fn pairing(&self) -> &PairingRule {
        &self.pairing
    }

    pub fn calibration(&self) -> &WorkloadProfile {
        &self.calibration
    }

    pub fn reprocess_existing(&self) -> bool {
        self.reprocess_existing
    }

    pub fn submit(&self) -> bool {
        self.submit
    }

    pub fn set_submit(&mut self, submit: bool) {
        self.submit = submit;
    }

    pub fn set_reprocess_existing(&mut self, reprocess: bool) {
        self.reprocess_existing = reprocess;
    }

    pub fn set_jobs_basename(&mut self, basename: String) {
        self.jobs_basename = Some(basename);
    }

    pub fn set_n_cpus(&mut self, n_cpus: u32) -> Result<(), ConfigError> {
        check_cpu_count(n_cpus, &self.calibration)?;
        self.resources.n_cpus = n_cpus;
        Ok(())
    }

    /// Checks that a configured GPT executable exists and is (or links to) a file named `gpt`.
    pub fn validate_gpt_exec(&self) -> Result<(), ConfigError> {
        let Some(gpt) = &self.gpt_exec else {
            return Ok(());
        };
        let resolved = fs::canonicalize(gpt).map_err(|_| ConfigError::GptExec(gpt.clone()))?;
        let named_gpt = resolved.file_name().and_then(|n| n.to_str()) == Some("gpt");
        if !resolved.is_file() || !named_gpt {
            return Err(ConfigError::GptExec(gpt.clone()));
        }
        Ok(())
    }

    /// The configured base name, or `<workflow>_YYYYMMDD_HHMMSS`. A base name
    /// ending in `/` is a directory: it is created and the default name is put in it.
    pub fn resolve_jobs_basename(&self, now: DateTime<Local>) -> Result<String, ConfigError> {
        let default_name = format!(
            "{}_{}",
            self.workflow.job_prefix(),
            now.format("%Y%m%d_%H%M%S")
        );
        match &self.jobs_basename {
            None => Ok(default_name),
            Some(dir) if dir.ends_with('/') => {
                fs::create_dir_all(dir)?;
                Ok(format!("{}{}", dir, default_name))
            }
            Some(name) => Ok(name.clone()),
        }
    }

    /// Parameters forwarded to every processing job, besides its list-file.
    pub fn job_parameters(&self) -> NamedParameters {
        let mut params = NamedParameters::new();
        params.insert("BASE_SAVE_DIR", self.layout.base_save_dir.clone());
        params.insert("PIX_RES", self.pixel_res.clone());
        if let Some(dem) = &self.dem_source {
            params.insert("DEM_SOURCE", dem.clone());
        }
        if self.resources.scheduler == SchedulerKind::Pbs {
            if let Some(project) = &self.resources.project {
                params.insert("NCI_PROJ", project.clone());
            }
        }
        if let Some(gpt) = &self.gpt_exec {
            params.insert("GPT_EXEC", gpt.display().to_string());
        }
        params
    }

    /// Run parameters listed at the top of the manifest.
    pub fn manifest_parameters(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("Workflow".to_string(), self.workflow.to_string()),
            (
                "Start date".to_string(),
                self.query.start_date.format("%Y-%m-%d").to_string(),
            ),
            (
                "End date".to_string(),
                self.query.end_date.format("%Y-%m-%d").to_string(),
            ),
            ("Bounding box".to_string(), self.query.bbox.to_string()),
            (
                "Catalog query".to_string(),
                self.query.url(SARA_SEARCH_URL),
            ),
            (
                "Base save dir".to_string(),
                self.layout.base_save_dir.clone(),
            ),
        ];
        if let Some(dir) = &self.layout.base_data_dir {
            params.push(("Base data dir".to_string(), dir.clone()));
        }
        if let Some(gpt) = &self.gpt_exec {
            params.push(("GPT exec path".to_string(), gpt.display().to_string()));
        }
        params.push((
            "CPUs per job".to_string(),
            self.resources.n_cpus.to_string(),
        ));
        params.push((
            "Scheduler".to_string(),
            self.resources.scheduler.to_string(),
        ));
        params
    }
}
