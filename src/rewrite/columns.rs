// ABOUTME: Column-name extraction for complete CREATE TABLE statements
// ABOUTME: Reads the insertable columns in declaration order, leaving generated columns out

use rusqlite::Connection;
use sqlparser::ast::{ColumnDef, ColumnOption, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use super::lexer::parse_create_header;

/// Ordered column names of one table, as declared by its `CREATE TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name as written in the statement
    pub name: String,
    /// Lookup key: unquoted, lowercased
    pub key: String,
    /// Insertable column names, quoted as SQL identifiers where needed
    pub columns: Vec<String>,
}

impl TableSchema {
    /// Parenthesized, comma-joined column list, e.g. `(id,name)`.
    pub fn column_list(&self) -> String {
        format!("({})", self.columns.join(","))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnListError {
    #[error("missing table name")]
    MissingTableName,

    /// No definition list follows the table name (e.g. `AS SELECT`)
    #[error("no parenthesized column definition list")]
    MissingBody,

    #[error("no insertable columns declared")]
    NoColumns,

    #[error("cannot read column definitions: {0}")]
    Unparsable(String),
}

/// Parse a complete `CREATE TABLE` statement into its name and column list.
///
/// Generated columns (`GENERATED ALWAYS AS (...)` or `AS (...)`) are left out:
/// `sqlite3 .dump` writes no value for them and SQLite rejects inserts into them.
/// Table constraints never contribute columns.
pub fn parse_create_table(statement: &[u8]) -> Result<TableSchema, ColumnListError> {
    let name = parse_create_header(statement)
        .and_then(|header| header.name)
        .ok_or(ColumnListError::MissingTableName)?;
    let text = std::str::from_utf8(statement)
        .map_err(|e| ColumnListError::Unparsable(format!("statement is not valid UTF-8 ({})", e)))?;

    let columns = declared_columns(text)?;
    if columns.is_empty() {
        return Err(ColumnListError::NoColumns);
    }

    Ok(TableSchema {
        name: String::from_utf8_lossy(&statement[name.start..name.end]).into_owned(),
        key: name.key,
        columns,
    })
}

fn declared_columns(text: &str) -> Result<Vec<String>, ColumnListError> {
    let statements = match Parser::parse_sql(&SQLiteDialect {}, text) {
        Ok(statements) => statements,
        // sqlparser rejects some table syntax SQLite accepts ('quoted' names, WITHOUT ROWID)
        Err(parse_error) => {
            return columns_from_sqlite(text)
                .map_err(|_| ColumnListError::Unparsable(parse_error.to_string()));
        }
    };

    match statements.first() {
        Some(Statement::CreateTable(create)) if create.columns.is_empty() && create.query.is_some() => {
            Err(ColumnListError::MissingBody)
        }
        Some(Statement::CreateTable(create)) => Ok(create
            .columns
            .iter()
            .filter(|column| !is_generated(column))
            .map(|column| column.name.to_string())
            .collect()),
        _ => Err(ColumnListError::Unparsable(
            "not a CREATE TABLE statement".to_string(),
        )),
    }
}

fn is_generated(column: &ColumnDef) -> bool {
    column
        .options
        .iter()
        .any(|option| matches!(option.option, ColumnOption::Generated { .. }))
}

/// Let SQLite itself declare the table in a scratch database and report its
/// ordinary (non-hidden, non-generated) columns.
fn columns_from_sqlite(statement: &str) -> rusqlite::Result<Vec<String>> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch(statement)?;

    let table: String = conn.query_row(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND substr(name, 1, 7) <> 'sqlite_'
         LIMIT 1",
        [],
        |row| row.get(0),
    )?;

    let mut stmt =
        conn.prepare("SELECT name FROM pragma_table_xinfo(?1) WHERE hidden = 0 ORDER BY cid")?;
    let columns = stmt
        .query_map([&table], |row| row.get::<_, String>(0))?
        .map(|name| name.map(|name| format!("\"{}\"", name.replace('"', "\"\""))))
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}
