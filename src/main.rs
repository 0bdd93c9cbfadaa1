// ABOUTME: CLI entry point for the merge binary
// ABOUTME: Parses arguments, sets up the per-job log, and runs the merge driver

use anyhow::{Context, Result};
use clap::Parser;
use sqlite_merge::commands::{self, MergeJob};
use sqlite_merge::config::{self, Settings};
use sqlite_merge::logging::LogConfig;
use sqlite_merge::migration::Sqlite3Cli;
use sqlite_merge::utils;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "merge")]
#[command(about = "Merge an arbitrary number of SQLite files", long_about = None)]
#[command(version)]
struct Cli {
    /// Source SQLite database (repeatable; omit entirely for an empty output)
    #[arg(short = 's', long = "source_sqlite")]
    source_sqlite: Vec<PathBuf>,
    /// Job identifier; names <job_uuid>.db and <job_uuid>.log
    #[arg(short = 'u', long = "job_uuid")]
    job_uuid: String,
    /// Enable debug logging
    #[arg(short = 'd', long)]
    debug: bool,
    /// Directory for the output database and log (default: current directory)
    #[arg(short = 'o', long = "output-dir")]
    output_dir: Option<PathBuf>,
    /// sqlite3 binary to run (default: $MERGE_SQLITE3, then sqlite3 on PATH)
    #[arg(long)]
    sqlite3: Option<String>,
    /// Keep per-source intermediate SQL in <job_uuid>_intermediate/
    #[arg(long)]
    keep_intermediate: bool,
    /// Path to a TOML settings file
    #[arg(short = 'c', long = "config")]
    config_path: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::validate_job_id(&cli.job_uuid)?;

    let settings = match &cli.config_path {
        Some(path) => config::load_settings_from_file(path)?,
        None => Settings::default(),
    };
    let sqlite3 = settings.sqlite3_or(cli.sqlite3);
    let job = MergeJob::new(cli.job_uuid, cli.source_sqlite)
        .with_output_dir(settings.output_dir_or(cli.output_dir))
        .with_keep_intermediate(settings.keep_intermediate_or(cli.keep_intermediate));

    std::fs::create_dir_all(&job.output_dir)
        .with_context(|| format!("Failed to create {}", job.output_dir.display()))?;
    let _log_guard = LogConfig::new(job.log_path(), cli.debug).install()?;

    let result = run(&job, sqlite3).await;
    if let Err(e) = &result {
        tracing::error!("Merge job '{}' failed: {:#}", job.job_id, e);
    }
    result
}

async fn run(job: &MergeJob, sqlite3: String) -> Result<()> {
    if !job.sources.is_empty() {
        utils::check_required_tools(&sqlite3)?;
    }
    let tool = Sqlite3Cli::new(sqlite3);
    commands::merge(job, &tool).await?;
    Ok(())
}
