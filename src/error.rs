// ABOUTME: Typed errors raised while rewriting a SQL dump
// ABOUTME: Orchestration code wraps these in anyhow with per-source context

use thiserror::Error;

/// Fatal problems found in the structure of a SQL dump.
///
/// None of these are recoverable: the dump of the offending source is not
/// applied to the accumulator database.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// A `CREATE TABLE` block reached end of input without its closing line.
    #[error("CREATE TABLE {table} starting at line {line} is never closed before the end of the dump")]
    UnterminatedCreateTable { table: String, line: usize },

    /// A new statement began while a `CREATE TABLE` block was still open.
    #[error("line {line}: a new statement starts inside the still-open CREATE TABLE {table} block")]
    NestedStatement { table: String, line: usize },

    /// The column definitions of a `CREATE TABLE` could not be read.
    #[error("CREATE TABLE {table} starting at line {line}: {detail}")]
    InvalidColumnDefinition {
        table: String,
        line: usize,
        detail: String,
    },

    /// An `INSERT INTO` names a table that no earlier `CREATE TABLE` declared.
    #[error("line {line}: INSERT INTO {table} appears before any CREATE TABLE for it")]
    UnknownTable { table: String, line: usize },

    #[error("I/O error while rewriting dump: {0}")]
    Io(#[from] std::io::Error),
}

pub type RewriteResult<T> = Result<T, RewriteError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_input() {
        let err = RewriteError::UnterminatedCreateTable {
            table: "users".to_string(),
            line: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("users"));
        assert!(msg.contains("line 12"));

        let err = RewriteError::UnknownTable {
            table: "orders".to_string(),
            line: 3,
        };
        assert!(err.to_string().contains("INSERT INTO orders"));
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad utf-8");
        let err: RewriteError = io.into();
        assert!(matches!(err, RewriteError::Io(_)));
    }
}
