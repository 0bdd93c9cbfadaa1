// ABOUTME: External SQLite collaborators used by the merge driver
// ABOUTME: Dumps source databases, executes scripts against the accumulator, and summarizes results

pub mod dump;
pub mod restore;
pub mod summary;

pub use dump::dump_database;
pub use restore::execute_script;
pub use summary::{table_row_counts, virtual_table_names, TableRowCount};

use anyhow::Result;
use std::path::{Path, PathBuf};

/// The two operations the merge needs from SQLite.
///
/// `dump` writes the full SQL text of `database` to `output`; `execute` applies
/// the script at `script` to `database`, creating the file if it is absent.
#[allow(async_fn_in_trait)]
pub trait SqliteTool {
    async fn dump(&self, database: &Path, output: &Path) -> Result<()>;
    async fn execute(&self, database: &Path, script: &Path) -> Result<()>;
}

/// [`SqliteTool`] backed by the `sqlite3` command-line shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sqlite3Cli {
    binary: PathBuf,
}

impl Sqlite3Cli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Default for Sqlite3Cli {
    fn default() -> Self {
        Self::new("sqlite3")
    }
}

impl SqliteTool for Sqlite3Cli {
    async fn dump(&self, database: &Path, output: &Path) -> Result<()> {
        dump_database(&self.binary, database, output).await
    }

    async fn execute(&self, database: &Path, script: &Path) -> Result<()> {
        execute_script(&self.binary, database, script).await
    }
}
