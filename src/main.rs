use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

use ardbatch::catalog::JsonCatalog;
use ardbatch::config::CampaignConfig;
use ardbatch::emit::{CommandSubmitter, DryRun, SubmissionStatus, Submitter};
use ardbatch::filter::{ArtifactIndex, ArtifactStore, FsArtifacts};
use ardbatch::pipeline::{CampaignRunner, RunOutcome};

#[derive(Parser, Debug)]
#[command(name = "ardbatch")]
#[command(about = "Submits Sentinel-1 ARD processing jobs for the scenes of a catalog query.",
          long_about = None)]
struct Cli {
    /// Campaign configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Catalog result pages (JSON), as a glob pattern
    #[arg(long)]
    catalog: String,

    /// Write list-files and the manifest without submitting anything
    #[arg(long, action)]
    dry_run: bool,

    /// Process units even when their output already exists
    #[arg(long, action)]
    reprocess_existing: bool,

    /// Base name of the generated files; a trailing '/' makes it a directory
    #[arg(long)]
    jobs_basename: Option<String>,

    /// CPUs requested per job
    #[arg(long)]
    n_cpus: Option<u32>,

    /// Log debug messages
    #[arg(short, long, action)]
    verbose: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let mut config = CampaignConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if cli.dry_run {
        config.set_submit(false);
    }
    if cli.reprocess_existing {
        config.set_reprocess_existing(true);
    }
    if let Some(basename) = cli.jobs_basename {
        config.set_jobs_basename(basename);
    }
    if let Some(n_cpus) = cli.n_cpus {
        config.set_n_cpus(n_cpus)?;
    }

    let catalog = JsonCatalog::from_glob(&cli.catalog)?;
    info!("Reading {} catalog pages", catalog.pages().len());

    // One directory walk instead of a stat per unit.
    let store: Box<dyn ArtifactStore> = if config.reprocess_existing() {
        Box::new(FsArtifacts)
    } else {
        Box::new(ArtifactIndex::scan(&config.layout().base_save_dir))
    };
    let mut submitter: Box<dyn Submitter> = if config.submit() {
        Box::new(CommandSubmitter)
    } else {
        Box::new(DryRun)
    };

    let runner = CampaignRunner::new(config);
    let outcome = runner
        .run(&catalog, store.as_ref(), submitter.as_mut(), chrono::Local::now())
        .context("submission run failed")?;

    let summary = outcome.summary();
    match &outcome {
        RunOutcome::NothingToProcess { reason, .. } => {
            println!("{}.", reason);
        }
        RunOutcome::Emitted {
            manifest,
            script,
            statuses,
            ..
        } => {
            let submitted = statuses
                .iter()
                .filter(|s| matches!(s, SubmissionStatus::Submitted(_)))
                .count();
            let failed = statuses
                .iter()
                .filter(|s| matches!(s, SubmissionStatus::Failed(_)))
                .count();

            println!(
                "\n{} units covering {} scenes in {} jobs ({} submitted, {} failed).",
                summary.units - summary.already_processed,
                summary.scenes_in_batches,
                statuses.len(),
                submitted,
                failed
            );
            if summary.already_processed > 0 {
                println!(
                    "{} units already processed and skipped.",
                    summary.already_processed
                );
            }
            if let Some(script) = script {
                println!("Run the jobs with: bash {}", script.display());
            }
            println!("Job details logged in {}", manifest.display());

            if failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    if summary.excluded_scenes > 0 {
        println!(
            "{} catalog entries excluded as incomplete.",
            summary.excluded_scenes
        );
    }
    if summary.duplicate_records > 0 {
        println!(
            "{} duplicate catalog entries dropped.",
            summary.duplicate_records
        );
    }

    Ok(ExitCode::SUCCESS)
}
