//! One submission run, from catalog records to submitted jobs.
//!
//! The run is a single sequential pass: validate scenes, build work units,
//! drop already-processed units, partition, then write list-files and the
//! manifest and hand every job to the submitter. Nothing is written before
//! the batch count has been checked against the ceiling.

use chrono::{DateTime, Local};
use log::{debug, info};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use crate::catalog::{CatalogError, SceneCatalog, load_scenes};
use crate::config::{CampaignConfig, ConfigError};
use crate::emit::{
    EmitError, Emitter, Manifest, ManifestHeader, SubmissionDescriptor, SubmissionStatus,
    Submitter, dispatch,
};
use crate::filter::{ArtifactStore, filter_existing};
use crate::pairing::{find_pairs, single_units};
use crate::partition::{PartitionError, partition, partition_unbounded};
use crate::work_unit::WorkUnit;

#[derive(Debug)]
pub enum PipelineError {
    Config(ConfigError),
    Catalog(CatalogError),
    Partition(PartitionError),
    Emit(EmitError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Config(e) => write!(f, "Configuration error: {}", e),
            PipelineError::Catalog(e) => write!(f, "Catalog error: {}", e),
            PipelineError::Partition(e) => write!(f, "{}", e),
            PipelineError::Emit(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> PipelineError {
        PipelineError::Config(err)
    }
}

impl From<CatalogError> for PipelineError {
    fn from(err: CatalogError) -> PipelineError {
        PipelineError::Catalog(err)
    }
}

impl From<PartitionError> for PipelineError {
    fn from(err: PartitionError) -> PipelineError {
        PipelineError::Partition(err)
    }
}

impl From<EmitError> for PipelineError {
    fn from(err: EmitError) -> PipelineError {
        PipelineError::Emit(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NothingToProcess {
    NoScenes,
    NoPairs,
    AllProcessed,
}

impl fmt::Display for NothingToProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NothingToProcess::NoScenes => write!(f, "No scene to process"),
            NothingToProcess::NoPairs => write!(f, "No scene pair to process"),
            NothingToProcess::AllProcessed => {
                write!(f, "Every work unit has already been processed")
            }
        }
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub records: usize,
    pub scenes: usize,
    pub excluded_scenes: usize,
    pub duplicate_records: usize,
    pub units: usize,
    pub already_processed: usize,
    pub scenes_in_batches: usize,
}

#[derive(Debug)]
pub enum RunOutcome {
    NothingToProcess {
        reason: NothingToProcess,
        summary: RunSummary,
    },
    Emitted {
        summary: RunSummary,
        manifest: PathBuf,
        /// Set when jobs were written to a shell script instead of a scheduler.
        script: Option<PathBuf>,
        descriptors: Vec<SubmissionDescriptor>,
        statuses: Vec<SubmissionStatus>,
    },
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::NothingToProcess { summary, .. } => summary,
            RunOutcome::Emitted { summary, .. } => summary,
        }
    }
}

#[derive(Debug)]
pub struct CampaignRunner {
    config: CampaignConfig,
}

impl CampaignRunner {
    pub fn new(config: CampaignConfig) -> Self {
        CampaignRunner { config }
    }

    pub fn run(
        &self,
        catalog: &dyn SceneCatalog,
        store: &dyn ArtifactStore,
        submitter: &mut dyn Submitter,
        now: DateTime<Local>,
    ) -> Result<RunOutcome, PipelineError> {
        let config = &self.config;
        config.validate_gpt_exec()?;

        let records = catalog.records()?;
        let scene_list = load_scenes(&records, &config.layout().source_root);
        let mut summary = RunSummary {
            records: records.len(),
            scenes: scene_list.scenes.len(),
            excluded_scenes: scene_list.rejected.len(),
            duplicate_records: scene_list.duplicates,
            ..Default::default()
        };
        info!(
            "{} catalog records, {} usable scenes, {} excluded, {} duplicates",
            summary.records, summary.scenes, summary.excluded_scenes, summary.duplicate_records
        );

        if scene_list.scenes.is_empty() {
            return Ok(RunOutcome::NothingToProcess {
                reason: NothingToProcess::NoScenes,
                summary,
            });
        }

        let workflow = config.workflow();
        let units = if workflow.is_paired() {
            find_pairs(&scene_list.scenes, config.pairing())
        } else {
            single_units(&scene_list.scenes)
        };
        summary.units = units.len();
        info!("{} work units for {}", units.len(), workflow);

        if units.is_empty() {
            return Ok(RunOutcome::NothingToProcess {
                reason: NothingToProcess::NoPairs,
                summary,
            });
        }

        let filtered = filter_existing(
            units,
            config.layout(),
            store,
            config.reprocess_existing(),
        );
        summary.already_processed = filtered.dropped;
        if filtered.kept.is_empty() {
            return Ok(RunOutcome::NothingToProcess {
                reason: NothingToProcess::AllProcessed,
                summary,
            });
        }
        summary.scenes_in_batches = distinct_scenes(&filtered.kept);

        let resources = config.resources();
        let calibration = config.calibration();
        debug!(
            "Estimated {:.1} min per unit on {} CPUs (fastest: {} CPUs)",
            calibration.minutes_per_unit(resources.n_cpus),
            resources.n_cpus,
            calibration.fastest_cpu_count(resources.n_cpus.max(16))
        );

        let batches = if resources.scheduler.is_queued() {
            partition(filtered.kept, resources.n_cpus, config.limits(), calibration)?
        } else {
            partition_unbounded(filtered.kept, resources.n_cpus, config.limits(), calibration)
        };
        info!("{} jobs needed", batches.len());

        let jobs_basename = config.resolve_jobs_basename(now)?;
        let emitter = Emitter::new(&jobs_basename, resources, config.layout());
        let parameters = config.job_parameters();
        let descriptors = emitter.emit(&batches, &parameters)?;

        let header = ManifestHeader {
            title: workflow.title().to_string(),
            time: now,
            parameters: config.manifest_parameters(),
            working_dir: std::env::current_dir().unwrap_or_default(),
            excluded_scenes: summary.excluded_scenes,
            duplicate_records: summary.duplicate_records,
            already_processed: summary.already_processed,
        };
        let manifest_path = emitter.manifest_path();
        let manifest = Manifest::create(&manifest_path, &header)
            .map_err(|e| EmitError::Io(manifest_path.clone(), e))?;

        let script = if resources.scheduler.is_queued() {
            None
        } else {
            Some(emitter.write_shell_script(workflow.title(), &descriptors, &parameters)?)
        };

        let statuses = dispatch(&descriptors, &manifest, submitter)?;

        Ok(RunOutcome::Emitted {
            summary,
            manifest: manifest_path,
            script,
            descriptors,
            statuses,
        })
    }
}

fn distinct_scenes(units: &[WorkUnit]) -> usize {
    units
        .iter()
        .flat_map(|u| u.scenes())
        .map(|s| s.storage_path.as_str())
        .collect::<HashSet<_>>()
        .len()
}
