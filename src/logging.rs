// ABOUTME: Per-job log file configuration
// ABOUTME: Installs a tracing subscriber scoped to one merge job instead of a process-global logger

use anyhow::{Context, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Where and how verbosely one job logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log file, truncated when the job starts
    pub path: PathBuf,
    /// DEBUG instead of INFO
    pub debug: bool,
}

impl LogConfig {
    pub fn new(path: impl Into<PathBuf>, debug: bool) -> Self {
        Self {
            path: path.into(),
            debug,
        }
    }

    /// `-d` forces DEBUG; otherwise `RUST_LOG` is honoured, defaulting to INFO.
    fn filter(&self) -> EnvFilter {
        if self.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        }
    }

    /// Install the job's subscriber on the current thread.
    ///
    /// Logging stays active until the returned guard is dropped, so two jobs
    /// in one process never write into each other's log file.
    pub fn install(&self) -> Result<DefaultGuard> {
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create log file {}", self.path.display()))?;

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .finish();

        Ok(tracing::subscriber::set_default(subscriber))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_install_writes_timestamped_lines() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new(dir.path().join("job.log"), true);

        {
            let _guard = config.install().unwrap();
            tracing::info!("merging source 1/1");
            tracing::debug!("table t columns (id,name)");
        }
        tracing::info!("after the guard is dropped");

        let contents = std::fs::read_to_string(&config.path).unwrap();
        assert!(contents.contains("INFO"));
        assert!(contents.contains("merging source 1/1"));
        assert!(contents.contains("table t columns (id,name)"));
        assert!(!contents.contains("after the guard is dropped"));
        assert!(!contents.contains('\u{1b}'), "log file must not contain ANSI escapes");
    }

    #[test]
    fn test_jobs_log_to_separate_files() {
        let dir = tempdir().unwrap();
        let first = LogConfig::new(dir.path().join("first.log"), true);
        let second = LogConfig::new(dir.path().join("second.log"), true);

        {
            let _guard = first.install().unwrap();
            tracing::info!("first job");
        }
        {
            let _guard = second.install().unwrap();
            tracing::info!("second job");
        }

        let first_log = std::fs::read_to_string(&first.path).unwrap();
        let second_log = std::fs::read_to_string(&second.path).unwrap();
        assert!(first_log.contains("first job") && !first_log.contains("second job"));
        assert!(second_log.contains("second job") && !second_log.contains("first job"));
    }

    #[test]
    fn test_install_fails_for_missing_directory() {
        let config = LogConfig::new("/nonexistent/dir/job.log", false);
        assert!(config.install().is_err());
    }
}
