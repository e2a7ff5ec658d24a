use serde::Deserialize;
use std::fmt;

use super::SubmissionDescriptor;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerKind {
    #[default]
    #[serde(rename(deserialize = "pbs"))]
    Pbs,
    #[serde(rename(deserialize = "slurm"))]
    Slurm,
    /// No scheduler: jobs run one after the other from a generated shell script.
    #[serde(rename(deserialize = "shell"))]
    Shell,
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerKind::Pbs => write!(f, "PBS"),
            SchedulerKind::Slurm => write!(f, "SLURM"),
            SchedulerKind::Shell => write!(f, "shell"),
        }
    }
}

impl SchedulerKind {
    /// Whether jobs go to a batch queue subject to the job ceiling.
    pub fn is_queued(&self) -> bool {
        !matches!(self, SchedulerKind::Shell)
    }
}

pub(super) fn qsub_args(d: &SubmissionDescriptor) -> Vec<String> {
    let mut resources = format!(
        "walltime={}:00,ncpus={},mem={}GB",
        d.walltime_minutes, d.cpu_count, d.memory_gb
    );
    if let Some(jobfs) = d.jobfs_gb {
        resources.push_str(&format!(",jobfs={}GB", jobfs));
    }
    for extra in &d.extra_resources {
        resources.push(',');
        resources.push_str(extra);
    }

    let mut args = vec!["qsub".to_string(), "-l".to_string(), resources];
    if let Some(queue) = &d.queue {
        args.extend(["-q".to_string(), queue.clone()]);
    }
    if let Some(project) = &d.project {
        args.extend(["-P".to_string(), project.clone()]);
    }
    args.extend([
        "-o".to_string(),
        d.output_log.display().to_string(),
        "-e".to_string(),
        d.error_log.display().to_string(),
        "-v".to_string(),
        d.parameters.to_export_list(),
        d.job_script.clone(),
    ]);
    args
}

pub(super) fn sbatch_args(d: &SubmissionDescriptor) -> Vec<String> {
    let mut args = vec![
        "sbatch".to_string(),
        format!("--time={}", d.walltime_minutes),
        format!("--ntasks-per-node={}", d.cpu_count),
        format!("--mem={}GB", d.memory_gb),
    ];
    if let Some(queue) = &d.queue {
        args.push(format!("--partition={}", queue));
    }
    if let Some(project) = &d.project {
        args.push(format!("--account={}", project));
    }
    args.extend([
        format!("--output={}", d.output_log.display()),
        format!("--error={}", d.error_log.display()),
        format!("--export={}", d.parameters.to_export_list()),
        d.job_script.clone(),
    ]);
    args
}

/// One job's stanza in the generated shell script; stderr is kept in the log.
pub(super) fn shell_stanza(d: &SubmissionDescriptor) -> String {
    format!(
        "ARG_FILE_LIST={} . {} 2>&1 | tee {}",
        d.list_file.display(),
        d.job_script,
        d.output_log.display()
    )
}
