//! Job descriptors, list-files and submission
//!
//! Each batch becomes one list-file naming its work units and one
//! [`SubmissionDescriptor`] holding the resources to request. Descriptors are
//! rendered as `qsub`/`sbatch` invocations, or as stanzas of a shell script
//! when no scheduler is available.

use serde::Deserialize;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub mod manifest;
pub mod scheduler;
pub mod submit;

pub use manifest::{Manifest, ManifestHeader};
pub use scheduler::SchedulerKind;
pub use submit::{CommandSubmitter, DryRun, SubmissionStatus, Submitter};

use crate::partition::Batch;
use crate::work_unit::OutputLayout;

/// Name of the parameter that carries the batch's list-file.
pub const FILE_LIST_PARAM: &str = "ARG_FILE_LIST";

/// Set in generated shell scripts so the job script skips loading the SNAP module.
pub const SHELL_JOB_FLAG: &str = "VDI_JOB";

/// Fixed per-job resources.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceProfile {
    #[serde(default)]
    pub scheduler: SchedulerKind,
    pub job_script: String,
    pub n_cpus: u32,
    pub mem_gb: u32,
    #[serde(default)]
    pub jobfs_gb: Option<u32>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub express: bool,
    /// Appended verbatim to the PBS `-l` list, e.g. `wd` or `other=gdata1`.
    #[serde(default)]
    pub extra_resources: Vec<String>,
}

impl ResourceProfile {
    fn queue(&self) -> Option<String> {
        if self.express {
            Some("express".to_string())
        } else {
            self.queue.clone()
        }
    }
}

/// Ordered `NAME=value` pairs exported to the processing job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedParameters(Vec<(String, String)>);

impl NamedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value in place.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn to_export_list(&self) -> String {
        self.iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionDescriptor {
    pub index: usize,
    pub total: usize,
    pub scheduler: SchedulerKind,
    pub job_script: String,
    pub cpu_count: u32,
    pub memory_gb: u32,
    pub jobfs_gb: Option<u32>,
    pub walltime_minutes: u64,
    pub queue: Option<String>,
    pub project: Option<String>,
    pub extra_resources: Vec<String>,
    pub list_file: PathBuf,
    pub output_log: PathBuf,
    pub error_log: PathBuf,
    pub parameters: NamedParameters,
}

impl SubmissionDescriptor {
    /// Program and arguments that submit this job, `None` without a scheduler.
    pub fn argv(&self) -> Option<Vec<String>> {
        match self.scheduler {
            SchedulerKind::Pbs => Some(scheduler::qsub_args(self)),
            SchedulerKind::Slurm => Some(scheduler::sbatch_args(self)),
            SchedulerKind::Shell => None,
        }
    }

    pub fn command(&self) -> String {
        match self.argv() {
            Some(argv) => argv.join(" "),
            None => scheduler::shell_stanza(self),
        }
    }

    pub fn ordinal_label(&self) -> String {
        format!("Job nr. {:03} of {}:", self.index, self.total)
    }
}

#[derive(Debug)]
pub enum EmitError {
    Io(PathBuf, std::io::Error),
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::Io(path, e) => write!(f, "Failed to write {}: {}", path.display(), e),
        }
    }
}

impl std::error::Error for EmitError {}

/// Rounded to whole minutes, never less than one.
pub fn walltime_request_minutes(estimated: f64) -> u64 {
    let rounded = estimated.round();
    if rounded.is_finite() && rounded >= 1.0 {
        rounded as u64
    } else {
        1
    }
}

pub struct Emitter<'a> {
    jobs_basename: String,
    profile: &'a ResourceProfile,
    layout: &'a OutputLayout,
}

impl<'a> Emitter<'a> {
    pub fn new(jobs_basename: &str, profile: &'a ResourceProfile, layout: &'a OutputLayout) -> Self {
        Self {
            jobs_basename: jobs_basename.to_string(),
            profile,
            layout,
        }
    }

    fn job_path(&self, index: usize, extension: &str) -> PathBuf {
        PathBuf::from(format!("{}_{:03}.{}", self.jobs_basename, index, extension))
    }

    pub fn manifest_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.jobs", self.jobs_basename))
    }

    pub fn script_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.sh", self.jobs_basename))
    }

    /// Writes one list-file per batch and returns the matching descriptors, in batch order.
    pub fn emit(
        &self,
        batches: &[Batch],
        parameters: &NamedParameters,
    ) -> Result<Vec<SubmissionDescriptor>, EmitError> {
        let total = batches.len();
        let mut descriptors = Vec::with_capacity(total);

        for batch in batches {
            let list_file = self.job_path(batch.index, "list");
            self.write_list_file(&list_file, batch)?;

            let mut job_parameters = NamedParameters::new();
            job_parameters.insert(FILE_LIST_PARAM, list_file.display().to_string());
            for (name, value) in parameters.iter() {
                job_parameters.insert(name, value);
            }

            descriptors.push(SubmissionDescriptor {
                index: batch.index,
                total,
                scheduler: self.profile.scheduler,
                job_script: self.profile.job_script.clone(),
                cpu_count: self.profile.n_cpus,
                memory_gb: self.profile.mem_gb,
                jobfs_gb: self.profile.jobfs_gb,
                walltime_minutes: walltime_request_minutes(batch.estimated_walltime_minutes),
                queue: self.profile.queue(),
                project: self.profile.project.clone(),
                extra_resources: self.profile.extra_resources.clone(),
                output_log: self.job_path(batch.index, "out"),
                error_log: self.job_path(batch.index, "err"),
                list_file,
                parameters: job_parameters,
            });
        }

        Ok(descriptors)
    }

    fn write_list_file(&self, path: &Path, batch: &Batch) -> Result<(), EmitError> {
        let io_err = |e| EmitError::Io(path.to_path_buf(), e);
        let mut file = File::create(path).map_err(io_err)?;
        for unit in &batch.units {
            writeln!(file, "{}", unit.list_line(self.layout)).map_err(io_err)?;
        }
        Ok(())
    }

    /// Script running every job in turn, for hosts without a scheduler.
    pub fn write_shell_script(
        &self,
        title: &str,
        descriptors: &[SubmissionDescriptor],
        parameters: &NamedParameters,
    ) -> Result<PathBuf, EmitError> {
        let path = self.script_path();
        let mut script = String::new();
        script.push_str("#!/bin/bash\n\n");
        script.push_str(&format!("## Batch jobs for {}\n\n", title));
        script.push_str(&format!("{}=true\n", SHELL_JOB_FLAG));
        for (name, value) in parameters.iter() {
            script.push_str(&format!("{}={}\n", name, value));
        }
        script.push('\n');
        for d in descriptors {
            script.push_str(&format!("# Job nr. {} of {} ...\n", d.index, d.total));
            script.push_str(&d.command());
            script.push_str("\n\n");
        }

        fs::write(&path, script).map_err(|e| EmitError::Io(path.clone(), e))?;
        Ok(path)
    }
}

/// Hands every descriptor to `submitter` in order, recording each attempt.
/// A failed submission does not stop the remaining ones.
pub fn dispatch(
    descriptors: &[SubmissionDescriptor],
    manifest: &Manifest,
    submitter: &mut dyn Submitter,
) -> Result<Vec<SubmissionStatus>, EmitError> {
    let mut statuses = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        println!("\n{}\n{}", descriptor.ordinal_label(), descriptor.command());

        let status = submitter.submit(descriptor);
        if let SubmissionStatus::Failed(reason) = &status {
            log::warn!("Job {} was not submitted: {}", descriptor.index, reason);
        }
        manifest
            .append_job(descriptor, &status)
            .map_err(|e| EmitError::Io(manifest.path().to_path_buf(), e))?;
        statuses.push(status);
    }
    Ok(statuses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_unit::WorkUnit;
    use crate::work_unit::fixtures::{SOURCE_ROOT, scene};
    use chrono::Local;
    use tempfile::tempdir;

    fn profile(scheduler: SchedulerKind) -> ResourceProfile {
        ResourceProfile {
            scheduler,
            job_script: "intcoh_proc.sh".to_string(),
            n_cpus: 8,
            mem_gb: 100,
            jobfs_gb: None,
            queue: None,
            project: None,
            express: false,
            extra_resources: Vec::new(),
        }
    }

    fn batches() -> Vec<Batch> {
        let pair = |a: u32, b: u32| WorkUnit::Pair {
            primary: scene(a, "-20.5", "130.5", 100 + a, 9),
            secondary: scene(b, "-20.5", "130.5", 100 + b, 9),
        };
        vec![
            Batch {
                index: 1,
                units: vec![pair(1, 13), pair(1, 25)],
                estimated_walltime_minutes: 75.9,
            },
            Batch {
                index: 2,
                units: vec![pair(13, 25)],
                estimated_walltime_minutes: 0.2,
            },
        ]
    }

    fn parameters() -> NamedParameters {
        let mut p = NamedParameters::new();
        p.insert("BASE_SAVE_DIR", "/out/");
        p.insert("PIX_RES", "25.0");
        p
    }

    fn header() -> ManifestHeader {
        ManifestHeader {
            title: "INTERFEROMETRIC COHERENCE processing of SAR scene pairs".to_string(),
            time: Local::now(),
            parameters: vec![("Start date".to_string(), "2018-01-01".to_string())],
            working_dir: PathBuf::from("/home/user"),
            excluded_scenes: 2,
            duplicate_records: 3,
            already_processed: 1,
        }
    }

    struct Flaky {
        calls: usize,
    }

    impl Submitter for Flaky {
        fn submit(&mut self, _d: &SubmissionDescriptor) -> SubmissionStatus {
            self.calls += 1;
            if self.calls == 1 {
                SubmissionStatus::Failed("queue full".to_string())
            } else {
                SubmissionStatus::Submitted(format!("{}.pbs", self.calls))
            }
        }
    }

    #[test]
    fn test_named_parameters_replace_in_place() {
        let mut p = parameters();
        p.insert("PIX_RES", "10.0");
        p.insert("GPT_EXEC", "/apps/gpt");
        assert_eq!(p.get("PIX_RES"), Some("10.0"));
        assert_eq!(
            p.to_export_list(),
            "BASE_SAVE_DIR=/out/,PIX_RES=10.0,GPT_EXEC=/apps/gpt"
        );
    }

    #[test]
    fn test_walltime_rounding() {
        assert_eq!(walltime_request_minutes(75.4), 75);
        assert_eq!(walltime_request_minutes(75.5), 76);
        assert_eq!(walltime_request_minutes(0.2), 1);
        assert_eq!(walltime_request_minutes(0.0), 1);
        assert_eq!(walltime_request_minutes(f64::NAN), 1);
    }

    #[test]
    fn test_emit_writes_list_files_in_order() {
        let dir = tempdir().unwrap();
        let basename = format!("{}/intcoh_proc_test", dir.path().display());
        let profile = profile(SchedulerKind::Slurm);
        let layout = OutputLayout::new(SOURCE_ROOT, "/out");
        let emitter = Emitter::new(&basename, &profile, &layout);

        let batches = batches();
        let descriptors = emitter.emit(&batches, &parameters()).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].index, 1);
        assert_eq!(descriptors[1].total, 2);
        assert_eq!(descriptors[0].walltime_minutes, 76);
        assert_eq!(descriptors[1].walltime_minutes, 1);

        let list = fs::read_to_string(&descriptors[0].list_file).unwrap();
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], batches[0].units[0].list_line(&layout));
        assert!(
            descriptors[0]
                .list_file
                .to_string_lossy()
                .ends_with("intcoh_proc_test_001.list")
        );
        assert_eq!(
            descriptors[1].parameters.get(FILE_LIST_PARAM),
            Some(descriptors[1].list_file.to_str().unwrap())
        );
    }

    #[test]
    fn test_sbatch_command() {
        let dir = tempdir().unwrap();
        let profile = profile(SchedulerKind::Slurm);
        let layout = OutputLayout::new(SOURCE_ROOT, "/out");
        let emitter = Emitter::new(&format!("{}/job", dir.path().display()), &profile, &layout);
        let d = &emitter.emit(&batches(), &parameters()).unwrap()[0];
        let base = dir.path().display();
        assert_eq!(
            d.command(),
            format!(
                "sbatch --time=76 --ntasks-per-node=8 --mem=100GB \
                 --output={base}/job_001.out --error={base}/job_001.err \
                 --export=ARG_FILE_LIST={base}/job_001.list,BASE_SAVE_DIR=/out/,PIX_RES=25.0 \
                 intcoh_proc.sh"
            )
        );
    }

    #[test]
    fn test_qsub_command() {
        let dir = tempdir().unwrap();
        let mut profile = profile(SchedulerKind::Pbs);
        profile.jobfs_gb = Some(10);
        profile.project = Some("qd04".to_string());
        profile.queue = Some("normal".to_string());
        profile.express = true;
        profile.extra_resources = vec!["wd".to_string(), "other=gdata1".to_string()];
        let layout = OutputLayout::new(SOURCE_ROOT, "/out");
        let emitter = Emitter::new(&format!("{}/job", dir.path().display()), &profile, &layout);
        let d = &emitter.emit(&batches(), &parameters()).unwrap()[1];
        let base = dir.path().display();
        assert_eq!(
            d.command(),
            format!(
                "qsub -l walltime=1:00,ncpus=8,mem=100GB,jobfs=10GB,wd,other=gdata1 \
                 -q express -P qd04 -o {base}/job_002.out -e {base}/job_002.err \
                 -v ARG_FILE_LIST={base}/job_002.list,BASE_SAVE_DIR=/out/,PIX_RES=25.0 \
                 intcoh_proc.sh"
            )
        );
        assert_eq!(d.ordinal_label(), "Job nr. 002 of 2:");
    }

    #[test]
    fn test_shell_script() {
        let dir = tempdir().unwrap();
        let profile = profile(SchedulerKind::Shell);
        let layout = OutputLayout::new(SOURCE_ROOT, "/out");
        let emitter = Emitter::new(&format!("{}/job", dir.path().display()), &profile, &layout);
        let descriptors = emitter.emit(&batches(), &parameters()).unwrap();
        assert!(descriptors[0].argv().is_none());

        let path = emitter
            .write_shell_script("test jobs", &descriptors, &parameters())
            .unwrap();
        let script = fs::read_to_string(path).unwrap();
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("\nVDI_JOB=true\nBASE_SAVE_DIR=/out/\n"));
        assert!(script.contains("# Job nr. 2 of 2 ...\n"));
        assert!(script.contains(". intcoh_proc.sh 2>&1 | tee "));
    }

    #[test]
    fn test_dispatch_records_every_attempt() {
        let dir = tempdir().unwrap();
        let profile = profile(SchedulerKind::Pbs);
        let layout = OutputLayout::new(SOURCE_ROOT, "/out");
        let emitter = Emitter::new(&format!("{}/job", dir.path().display()), &profile, &layout);
        let descriptors = emitter.emit(&batches(), &parameters()).unwrap();

        let manifest = Manifest::create(emitter.manifest_path(), &header()).unwrap();
        let mut submitter = Flaky { calls: 0 };
        let statuses = dispatch(&descriptors, &manifest, &mut submitter).unwrap();
        assert_eq!(submitter.calls, 2);
        assert!(matches!(statuses[0], SubmissionStatus::Failed(_)));
        assert_eq!(statuses[1], SubmissionStatus::Submitted("2.pbs".to_string()));

        let text = fs::read_to_string(manifest.path()).unwrap();
        assert!(text.contains("Batch jobs for INTERFEROMETRIC COHERENCE"));
        assert!(text.contains("  Start date: 2018-01-01"));
        assert!(text.contains("Scenes excluded (incomplete catalog entries): 2"));
        assert!(text.contains("Duplicate catalog entries dropped: 3"));
        assert!(text.contains("Units already processed (not re-processing): 1"));
        let first = text.find("Job nr. 001 of 2:").unwrap();
        let second = text.find("Job nr. 002 of 2:").unwrap();
        assert!(first < second);
        assert!(text.contains(&descriptors[0].command()));
        assert!(text.contains("FAILED: queue full"));
        assert!(text.contains("submitted as 2.pbs"));
    }

    #[test]
    fn test_dry_run_submits_nothing() {
        let dir = tempdir().unwrap();
        let profile = profile(SchedulerKind::Slurm);
        let layout = OutputLayout::new(SOURCE_ROOT, "/out");
        let emitter = Emitter::new(&format!("{}/job", dir.path().display()), &profile, &layout);
        let descriptors = emitter.emit(&batches(), &parameters()).unwrap();
        let manifest = Manifest::create(emitter.manifest_path(), &header()).unwrap();

        let statuses = dispatch(&descriptors, &manifest, &mut DryRun).unwrap();
        assert!(statuses.iter().all(|s| *s == SubmissionStatus::NotSubmitted));
        let text = fs::read_to_string(manifest.path()).unwrap();
        assert_eq!(text.matches("-> not submitted").count(), 2);
    }
}
