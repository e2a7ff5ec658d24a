use std::fmt;
use std::process::Command;

use super::SubmissionDescriptor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Dry run, or a scheduler-less run.
    NotSubmitted,
    /// Accepted; holds what the scheduler printed, usually the job id.
    Submitted(String),
    Failed(String),
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::NotSubmitted => write!(f, "not submitted"),
            SubmissionStatus::Submitted(id) if id.is_empty() => write!(f, "submitted"),
            SubmissionStatus::Submitted(id) => write!(f, "submitted as {}", id),
            SubmissionStatus::Failed(reason) => write!(f, "FAILED: {}", reason),
        }
    }
}

pub trait Submitter {
    fn submit(&mut self, descriptor: &SubmissionDescriptor) -> SubmissionStatus;
}

/// Leaves submission to the operator.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRun;

impl Submitter for DryRun {
    fn submit(&mut self, _descriptor: &SubmissionDescriptor) -> SubmissionStatus {
        SubmissionStatus::NotSubmitted
    }
}

/// Runs the scheduler's submit command and waits for it to return.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandSubmitter;

impl Submitter for CommandSubmitter {
    fn submit(&mut self, descriptor: &SubmissionDescriptor) -> SubmissionStatus {
        let Some(argv) = descriptor.argv() else {
            return SubmissionStatus::NotSubmitted;
        };
        let Some((program, args)) = argv.split_first() else {
            return SubmissionStatus::NotSubmitted;
        };

        match Command::new(program).args(args).output() {
            Ok(output) if output.status.success() => SubmissionStatus::Submitted(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ),
            Ok(output) => SubmissionStatus::Failed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )),
            Err(e) => SubmissionStatus::Failed(format!("could not run {}: {}", program, e)),
        }
    }
}
