// ABOUTME: Wrapper for the sqlite3 shell to apply a SQL script to a database
// ABOUTME: Loads a rewritten dump into the accumulator, stopping at the first error

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Apply the SQL script at `script_path` to `database` using `sqlite3 -bail`
///
/// The database file is created if it does not exist. `-bail` makes the shell
/// stop at the first failing statement and exit non-zero; the dump's own
/// `BEGIN TRANSACTION`/`COMMIT` pair means nothing from a failed script is kept.
pub async fn execute_script(sqlite3: &Path, database: &Path, script_path: &Path) -> Result<()> {
    tracing::info!(
        "Applying {} to {}",
        script_path.display(),
        database.display()
    );

    let script = File::open(script_path)
        .with_context(|| format!("Failed to open script {}", script_path.display()))?;

    let child = Command::new(sqlite3)
        .arg("-batch")
        .arg("-bail")
        .arg(database)
        .stdin(Stdio::from(script))
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to execute sqlite3. Is the SQLite command-line shell installed?")?;
    let output = child
        .wait_with_output()
        .await
        .context("Failed to wait for sqlite3")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "sqlite3 failed to apply {} to {} ({}): {}",
            script_path.display(),
            database.display(),
            output.status,
            stderr.trim()
        );
    }

    tracing::info!("✓ Applied {}", script_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sqlite3_available() -> bool {
        if which::which("sqlite3").is_ok() {
            return true;
        }
        assert!(
            std::env::var_os("MERGE_SKIP_SQLITE3_TESTS").is_some(),
            "sqlite3 not installed; set MERGE_SKIP_SQLITE3_TESTS=1 to skip"
        );
        false
    }

    #[tokio::test]
    async fn test_execute_script_creates_database() {
        if !sqlite3_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let script = dir.path().join("merge.sql");
        std::fs::write(
            &script,
            "BEGIN TRANSACTION;\nCREATE TABLE IF NOT EXISTS t (id INTEGER, name TEXT);\nINSERT INTO t (id,name) VALUES(1,'a');\nCOMMIT;\n",
        )
        .unwrap();

        let db = dir.path().join("job.db");
        execute_script(Path::new("sqlite3"), &db, &script).await.unwrap();

        let conn = rusqlite::Connection::open(&db).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_execute_script_reports_sql_errors() {
        if !sqlite3_available() {
            return;
        }
        let dir = tempdir().unwrap();
        let script = dir.path().join("merge.sql");
        std::fs::write(&script, "INSERT INTO missing VALUES(1);\n").unwrap();

        let err = execute_script(Path::new("sqlite3"), &dir.path().join("job.db"), &script)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such table"));
    }
}
