// ABOUTME: Merge driver combining any number of SQLite sources into one accumulator
// ABOUTME: Dumps each source, rewrites the dump, and replays it against <job_id>.db in order

use crate::error::RewriteResult;
use crate::migration::{table_row_counts, virtual_table_names, SqliteTool, TableRowCount};
use crate::rewrite::{make_idempotent_for, pin_insert_columns, RewriteStats};
use anyhow::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// One merge invocation, identified by its job identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    pub job_id: String,
    /// Source databases, merged in this order
    pub sources: Vec<PathBuf>,
    /// Directory receiving `<job_id>.db` and `<job_id>.log`
    pub output_dir: PathBuf,
    /// Keep per-stage SQL files in `<job_id>_intermediate/` instead of a temp dir
    pub keep_intermediate: bool,
}

impl MergeJob {
    pub fn new(job_id: impl Into<String>, sources: Vec<PathBuf>) -> Self {
        Self {
            job_id: job_id.into(),
            sources,
            output_dir: PathBuf::from("."),
            keep_intermediate: false,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_keep_intermediate(mut self, keep: bool) -> Self {
        self.keep_intermediate = keep;
        self
    }

    /// The accumulator database, `<output_dir>/<job_id>.db`
    pub fn database_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.db", self.job_id))
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.log", self.job_id))
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        self.output_dir.join(format!("{}_intermediate", self.job_id))
    }
}

/// What a finished merge produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub sources_merged: usize,
    pub creates_guarded: usize,
    pub inserts_pinned: usize,
    /// Row counts of the accumulator; empty when no sources were given
    pub tables: Vec<TableRowCount>,
}

/// Holds the per-stage SQL files of the source being merged.
enum Workspace {
    Temp(TempDir),
    Kept(PathBuf),
}

impl Workspace {
    fn create(job: &MergeJob) -> Result<Self> {
        if job.keep_intermediate {
            let dir = job.intermediate_dir();
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            tracing::info!("Keeping intermediate SQL in {}", dir.display());
            Ok(Self::Kept(dir))
        } else {
            // Removed on drop, including when the job fails
            let dir = TempDir::new().context("Failed to create temp directory")?;
            tracing::debug!("Using temp directory: {}", dir.path().display());
            Ok(Self::Temp(dir))
        }
    }

    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Kept(dir) => dir,
        }
    }
}

/// Merge every source of `job` into the accumulator database
///
/// Sources are processed strictly in order:
/// 1. Dump the source to SQL text
/// 2. Make every CREATE statement idempotent (virtual tables the accumulator
///    already has are skipped)
/// 3. Pin each table's declared column list onto its INSERT statements
/// 4. Execute the script against `<job_id>.db`
///
/// With no sources, an empty `<job_id>.db` is created (left as is if it
/// already exists) and the merge succeeds.
///
/// # Errors
///
/// The first failing source aborts the whole job, with no retry:
/// - A source file does not exist
/// - Dumping or executing fails
/// - A dump is malformed (e.g. a `CREATE TABLE` block never closes); nothing
///   from that source is applied to the accumulator
pub async fn merge<T: SqliteTool>(job: &MergeJob, tool: &T) -> Result<MergeSummary> {
    let accumulator = job.database_path();
    tracing::info!(
        "Starting merge job '{}' with {} source(s) into {}",
        job.job_id,
        job.sources.len(),
        accumulator.display()
    );

    if job.sources.is_empty() {
        tracing::info!("No sources given, creating empty {}", accumulator.display());
        touch(&accumulator)?;
        return Ok(MergeSummary::default());
    }

    if accumulator.exists() {
        tracing::warn!(
            "⚠ {} already exists, merged rows will be appended to it",
            accumulator.display()
        );
    }

    let workspace = Workspace::create(job)?;
    let mut summary = MergeSummary::default();

    for (idx, source) in job.sources.iter().enumerate() {
        tracing::info!(
            "Merging source {}/{}: {}",
            idx + 1,
            job.sources.len(),
            source.display()
        );
        let (ddl, insert) = merge_source(source, &accumulator, workspace.path(), tool)
            .await
            .with_context(|| format!("Failed to merge source {}", source.display()))?;

        summary.sources_merged += 1;
        summary.creates_guarded += ddl.rewritten;
        summary.inserts_pinned += insert.rewritten;
        tracing::info!("✓ Source {} merged", source.display());
    }

    match table_row_counts(&accumulator) {
        Ok(tables) => {
            for table in &tables {
                tracing::info!("  {}: {} row(s)", table.name, table.rows);
            }
            summary.tables = tables;
        }
        Err(e) => tracing::warn!("⚠ Could not summarize {}: {:#}", accumulator.display(), e),
    }

    tracing::info!(
        "✅ Merge job '{}' complete ({} source(s))",
        job.job_id,
        summary.sources_merged
    );
    Ok(summary)
}

async fn merge_source<T: SqliteTool>(
    source: &Path,
    accumulator: &Path,
    workspace: &Path,
    tool: &T,
) -> Result<(RewriteStats, RewriteStats)> {
    if !source.is_file() {
        bail!("Source database {} does not exist", source.display());
    }

    let dump_file = workspace.join("source.sql");
    tool.dump(source, &dump_file).await?;

    tracing::debug!("Making CREATE statements idempotent...");
    let existing_virtual_tables = virtual_table_names(accumulator)?;
    let idempotent_file = workspace.join("idempotent.sql");
    let ddl = rewrite_file(&dump_file, &idempotent_file, |input, output| {
        make_idempotent_for(input, output, &existing_virtual_tables)
    })?;

    tracing::debug!("Pinning INSERT column lists...");
    let script_file = workspace.join("merge.sql");
    let insert = rewrite_file(&idempotent_file, &script_file, pin_insert_columns)?;

    tool.execute(accumulator, &script_file).await?;
    Ok((ddl, insert))
}

fn rewrite_file<F>(input: &Path, output: &Path, stage: F) -> Result<RewriteStats>
where
    F: FnOnce(BufReader<File>, BufWriter<File>) -> RewriteResult<RewriteStats>,
{
    let reader = File::open(input)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let writer = File::create(output)
        .map(BufWriter::new)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    stage(reader, writer).with_context(|| format!("Malformed dump {}", input.display()))
}

/// Create `path` if missing; an existing file is left untouched.
fn touch(path: &Path) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(())
}
