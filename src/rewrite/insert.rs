// ABOUTME: Column-aware INSERT stage of the dump rewrite pipeline
// ABOUTME: Records each CREATE TABLE column order and pins it onto every INSERT INTO for that table

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{BufRead, Write};

use super::columns::{parse_create_table, TableSchema};
use super::lexer::{parse_create_header, parse_insert_target, NameSpan, ObjectKind, StatementScanner};
use super::RewriteStats;
use crate::error::{RewriteError, RewriteResult};
use crate::utils::sanitize_identifier;

/// Tables SQLite manages itself (`sqlite_sequence`, `sqlite_stat1`, ...).
/// Dumps insert into them without ever declaring them.
const INTERNAL_TABLE_PREFIX: &str = "sqlite_";

/// A `CREATE TABLE` statement whose closing line has not been read yet.
#[derive(Debug)]
struct OpenTable {
    line: usize,
    label: String,
    statement: Vec<u8>,
}

#[derive(Debug)]
enum State {
    Scanning,
    CollectingColumns(OpenTable),
}

/// Streaming column-aware rewriter. Feed dump lines in order, then call
/// [`finish`](InsertRewriter::finish).
///
/// At most one `CREATE TABLE` block is open at a time; a `CREATE` or
/// `INSERT INTO` starting inside an open block is rejected.
#[derive(Debug)]
pub struct InsertRewriter {
    scanner: StatementScanner,
    state: State,
    tables: HashMap<String, TableSchema>,
    stats: RewriteStats,
}

impl Default for InsertRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl InsertRewriter {
    pub fn new() -> Self {
        Self {
            scanner: StatementScanner::new(),
            state: State::Scanning,
            tables: HashMap::new(),
            stats: RewriteStats::default(),
        }
    }

    /// Column list recorded for a table, looked up case-insensitively.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    /// Rewrite one raw line (including its line terminator).
    pub fn rewrite_line<'a>(&mut self, line: &'a [u8]) -> RewriteResult<Cow<'a, [u8]>> {
        self.stats.lines += 1;
        let line_no = self.stats.lines;

        let output = if let State::CollectingColumns(open) = &mut self.state {
            if !self.scanner.in_literal() && starts_statement(line) {
                return Err(RewriteError::NestedStatement {
                    table: open.label.clone(),
                    line: line_no,
                });
            }
            open.statement.extend_from_slice(line);
            Cow::Borrowed(line)
        } else if self.scanner.at_statement_start() {
            self.statement_start(line, line_no)?
        } else {
            Cow::Borrowed(line)
        };

        self.scanner.feed(line);
        if self.scanner.at_statement_start() && matches!(self.state, State::CollectingColumns(_)) {
            self.close_table()?;
        }
        Ok(output)
    }

    /// End of input: fails if a `CREATE TABLE` block is still open.
    pub fn finish(self) -> RewriteResult<RewriteStats> {
        if let State::CollectingColumns(open) = self.state {
            return Err(RewriteError::UnterminatedCreateTable {
                table: open.label,
                line: open.line,
            });
        }
        tracing::debug!(
            "Pinned column lists on {} INSERT statement(s) for {} table(s)",
            self.stats.rewritten,
            self.stats.tables
        );
        Ok(self.stats)
    }

    fn statement_start<'a>(&mut self, line: &'a [u8], line_no: usize) -> RewriteResult<Cow<'a, [u8]>> {
        if let Some(header) = parse_create_header(line) {
            if header.kind == ObjectKind::Table {
                let label = header
                    .name
                    .map(|name| sanitize_identifier(&String::from_utf8_lossy(&line[name.start..name.end])))
                    .unwrap_or_else(|| "<unnamed>".to_string());
                self.state = State::CollectingColumns(OpenTable {
                    line: line_no,
                    label,
                    statement: line.to_vec(),
                });
            }
            return Ok(Cow::Borrowed(line));
        }
        match parse_insert_target(line) {
            Some(target) => self.pin_columns(line, target, line_no),
            None => Ok(Cow::Borrowed(line)),
        }
    }

    fn close_table(&mut self) -> RewriteResult<()> {
        let State::CollectingColumns(open) = std::mem::replace(&mut self.state, State::Scanning)
        else {
            return Ok(());
        };
        let schema = parse_create_table(&open.statement).map_err(|e| {
            RewriteError::InvalidColumnDefinition {
                table: open.label,
                line: open.line,
                detail: e.to_string(),
            }
        })?;
        tracing::debug!("Table {} columns {}", schema.name, schema.column_list());
        self.stats.tables += 1;
        self.tables.insert(schema.key.clone(), schema);
        Ok(())
    }

    fn pin_columns<'a>(
        &mut self,
        line: &'a [u8],
        target: NameSpan,
        line_no: usize,
    ) -> RewriteResult<Cow<'a, [u8]>> {
        let rest = trim_blanks(&line[target.end..]);
        let values = rest
            .get(..6)
            .is_some_and(|keyword| keyword.eq_ignore_ascii_case(b"VALUES"));
        if !values || target.key.starts_with(INTERNAL_TABLE_PREFIX) {
            return Ok(Cow::Borrowed(line));
        }

        let schema = self
            .tables
            .get(&target.key)
            .ok_or_else(|| RewriteError::UnknownTable {
                table: sanitize_identifier(&String::from_utf8_lossy(&line[target.start..target.end])),
                line: line_no,
            })?;
        self.stats.rewritten += 1;

        let column_list = schema.column_list();
        let mut pinned = Vec::with_capacity(line.len() + column_list.len() + 2);
        pinned.extend_from_slice(&line[..target.end]);
        pinned.push(b' ');
        pinned.extend_from_slice(column_list.as_bytes());
        pinned.push(b' ');
        pinned.extend_from_slice(rest);
        Ok(Cow::Owned(pinned))
    }
}

fn trim_blanks(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|&b| b != b' ' && b != b'\t')
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn starts_statement(line: &[u8]) -> bool {
    parse_create_header(line).is_some() || parse_insert_target(line).is_some()
}

/// Rewrite every `INSERT INTO <table> VALUES ...` to carry the table's
/// declared column list, e.g. `INSERT INTO t (id,name) VALUES(1,'a');`.
///
/// INSERTs that already name their columns, `DEFAULT VALUES` and `SELECT`
/// forms, and INSERTs into SQLite internal tables pass through unchanged.
/// Lines are handled as raw bytes and untouched lines are copied verbatim.
///
/// # Errors
///
/// - [`RewriteError::UnterminatedCreateTable`] if input ends inside a `CREATE TABLE` block
/// - [`RewriteError::NestedStatement`] if a statement starts inside an open block
/// - [`RewriteError::InvalidColumnDefinition`] if the column list cannot be read
/// - [`RewriteError::UnknownTable`] if an INSERT precedes its table's `CREATE TABLE`
pub fn pin_insert_columns<R: BufRead, W: Write>(mut input: R, mut output: W) -> RewriteResult<RewriteStats> {
    let mut rewriter = InsertRewriter::new();
    let mut line = Vec::new();
    while input.read_until(b'\n', &mut line)? > 0 {
        output.write_all(&rewriter.rewrite_line(&line)?)?;
        line.clear();
    }
    output.flush()?;
    rewriter.finish()
}
