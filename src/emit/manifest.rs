use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::SubmissionDescriptor;
use super::submit::SubmissionStatus;

/// Run summary written at the top of the manifest.
#[derive(Debug, Clone)]
pub struct ManifestHeader {
    pub title: String,
    pub time: DateTime<Local>,
    pub parameters: Vec<(String, String)>,
    pub working_dir: PathBuf,
    pub excluded_scenes: usize,
    pub duplicate_records: usize,
    pub already_processed: usize,
}

/// Append-only, human readable record of a run's submissions.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
}

impl Manifest {
    pub fn create<P: AsRef<Path>>(path: P, header: &ManifestHeader) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path)?;

        let title = format!("Batch jobs for {}", header.title);
        writeln!(file)?;
        writeln!(file, "{}", title)?;
        writeln!(file, "{}", "~".repeat(title.chars().count()))?;
        writeln!(file)?;
        writeln!(file, "Time is: {}", header.time.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file)?;
        writeln!(file, "Input parameters are:")?;
        for (name, value) in &header.parameters {
            writeln!(file, "  {}: {}", name, value)?;
        }
        writeln!(file)?;
        writeln!(file, "Current directory is:")?;
        writeln!(file, "  {}", header.working_dir.display())?;
        writeln!(file)?;
        writeln!(
            file,
            "Scenes excluded (incomplete catalog entries): {}",
            header.excluded_scenes
        )?;
        writeln!(
            file,
            "Duplicate catalog entries dropped: {}",
            header.duplicate_records
        )?;
        writeln!(
            file,
            "Units already processed (not re-processing): {}",
            header.already_processed
        )?;
        writeln!(file)?;
        writeln!(file, "Submitted jobs are:")?;

        Ok(Manifest { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_job(
        &self,
        descriptor: &SubmissionDescriptor,
        status: &SubmissionStatus,
    ) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file)?;
        writeln!(file, "{}", descriptor.ordinal_label())?;
        writeln!(file, "{}", descriptor.command())?;
        writeln!(file, "  -> {}", status)?;
        Ok(())
    }
}
