// ABOUTME: Read-only inspection of the accumulator database
// ABOUTME: Lists existing virtual tables before a merge and counts rows per table after it

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;

/// Row count of one table in the accumulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRowCount {
    pub name: String,
    pub rows: i64,
}

/// Count rows in every user table of `database`, ordered by table name
///
/// SQLite internal tables (`sqlite_` prefix) are skipped.
pub fn table_row_counts(database: &Path) -> Result<Vec<TableRowCount>> {
    let conn = Connection::open_with_flags(database, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {}", database.display()))?;

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND substr(name, 1, 7) <> 'sqlite_'
             ORDER BY name",
        )
        .context("Failed to list tables")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to list tables")?;

    let mut counts = Vec::with_capacity(names.len());
    for name in names {
        let query = format!("SELECT COUNT(*) FROM \"{}\"", name.replace('"', "\"\""));
        let rows = conn
            .query_row(&query, [], |row| row.get(0))
            .with_context(|| format!("Failed to count rows in {}", name))?;
        tracing::debug!("{}: {} row(s)", name, rows);
        counts.push(TableRowCount { name, rows });
    }

    Ok(counts)
}

/// Lowercased names of the virtual tables already in `database`
///
/// A database that does not exist yet has none.
pub fn virtual_table_names(database: &Path) -> Result<HashSet<String>> {
    if !database.exists() {
        return Ok(HashSet::new());
    }
    let conn = Connection::open_with_flags(database, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open {}", database.display()))?;

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND sql LIKE 'CREATE VIRTUAL TABLE%'",
        )
        .context("Failed to list virtual tables")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .map(|name| name.map(|name| name.to_ascii_lowercase()))
        .collect::<rusqlite::Result<HashSet<_>>>()
        .context("Failed to list virtual tables")?;
    Ok(names)
}
