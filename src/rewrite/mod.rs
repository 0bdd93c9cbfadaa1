// ABOUTME: SQL dump rewrite pipeline for merging SQLite databases
// ABOUTME: Chains the idempotent-DDL stage and the column-aware INSERT stage

pub mod columns;
pub mod ddl;
pub mod insert;
pub mod lexer;

pub use columns::TableSchema;
pub use ddl::{make_idempotent, make_idempotent_for};
pub use insert::{pin_insert_columns, InsertRewriter};

use crate::error::RewriteResult;

/// Counters reported by a rewrite stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    /// Lines read (and written; stages never add or drop lines)
    pub lines: usize,
    /// Lines the stage changed
    pub rewritten: usize,
    /// `CREATE TABLE` blocks whose column list was recorded
    pub tables: usize,
    /// Lines blanked out because their object already exists in the target
    pub skipped: usize,
}

/// Run both stages over an in-memory dump and return the script to replay.
///
/// ```
/// # use sqlite_merge::rewrite::rewrite_dump;
/// let script = rewrite_dump(
///     "CREATE TABLE t (id INTEGER, name TEXT);\nINSERT INTO t VALUES(1,'a');\n",
/// )
/// .unwrap();
/// assert_eq!(
///     script,
///     "CREATE TABLE IF NOT EXISTS t (id INTEGER, name TEXT);\n\
///      INSERT INTO t (id,name) VALUES(1,'a');\n"
/// );
/// ```
pub fn rewrite_dump(dump: &str) -> RewriteResult<String> {
    let mut idempotent = Vec::with_capacity(dump.len());
    make_idempotent(dump.as_bytes(), &mut idempotent)?;

    let mut script = Vec::with_capacity(idempotent.len());
    pin_insert_columns(idempotent.as_slice(), &mut script)?;

    String::from_utf8(script)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
}
