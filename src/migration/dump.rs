// ABOUTME: Wrapper for the sqlite3 shell's .dump command
// ABOUTME: Writes the full schema and contents of a source database as SQL text

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Dump schema and data of `database` to `output_path` using `sqlite3 .dump`
pub async fn dump_database(sqlite3: &Path, database: &Path, output_path: &Path) -> Result<()> {
    tracing::info!(
        "Dumping {} to {}",
        database.display(),
        output_path.display()
    );

    let output_file = File::create(output_path)
        .with_context(|| format!("Failed to create dump file {}", output_path.display()))?;

    // `output()` would replace the file redirect with a pipe
    let child = Command::new(sqlite3)
        .arg("-batch")
        .arg(database)
        .arg(".dump")
        .stdin(Stdio::null())
        .stdout(Stdio::from(output_file))
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to execute sqlite3. Is the SQLite command-line shell installed?")?;
    let output = child
        .wait_with_output()
        .await
        .context("Failed to wait for sqlite3 .dump")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "sqlite3 .dump of {} failed ({}): {}",
            database.display(),
            output.status,
            stderr.trim()
        );
    }

    let written = std::fs::metadata(output_path)
        .with_context(|| format!("Failed to stat dump file {}", output_path.display()))?
        .len();
    if written == 0 {
        bail!(
            "sqlite3 .dump of {} produced no output in {}",
            database.display(),
            output_path.display()
        );
    }

    tracing::info!("✓ Dumped {} ({} bytes)", database.display(), written);
    Ok(())
}
