// ABOUTME: Idempotent-DDL stage of the dump rewrite pipeline
// ABOUTME: Adds IF NOT EXISTS to CREATE statements so replaying a dump never fails on existing objects

use std::collections::HashSet;
use std::io::{BufRead, Write};

use super::lexer::{parse_create_header, parse_insert_target, parse_virtual_table_row, StatementScanner};
use super::RewriteStats;
use crate::error::RewriteResult;

/// Existence guard inserted after the object keyword.
pub const EXISTENCE_GUARD: &str = "IF NOT EXISTS";

/// Guard a single line that begins a `CREATE` statement.
///
/// Returns `None` when the line is not a supported `CREATE` header or is
/// already guarded. The guard goes right after the object keyword; the rest of
/// the line is kept byte for byte.
///
/// ```
/// # use sqlite_merge::rewrite::ddl::guard_create;
/// assert_eq!(
///     guard_create(b"CREATE UNIQUE INDEX idx ON t(name);").as_deref(),
///     Some(&b"CREATE UNIQUE INDEX IF NOT EXISTS idx ON t(name);"[..])
/// );
/// assert_eq!(guard_create(b"CREATE TABLE IF NOT EXISTS t(a);"), None);
/// ```
pub fn guard_create(line: &[u8]) -> Option<Vec<u8>> {
    let header = parse_create_header(line)?;
    if header.guarded {
        return None;
    }
    let (head, tail) = line.split_at(header.keyword_end);
    let mut guarded = Vec::with_capacity(line.len() + EXISTENCE_GUARD.len() + 1);
    guarded.extend_from_slice(head);
    guarded.push(b' ');
    guarded.extend_from_slice(EXISTENCE_GUARD.as_bytes());
    guarded.extend_from_slice(tail);
    Some(guarded)
}

/// Shadow tables of the FTS3/4, FTS5 and R*Tree modules, named `<table>_<suffix>`.
const SHADOW_TABLE_SUFFIXES: [&str; 11] = [
    "content", "segments", "segdir", "docsize", "stat", "data", "idx", "config", "node", "rowid",
    "parent",
];

/// Rewrite a dump so every `CREATE TABLE/INDEX/VIEW/TRIGGER` is idempotent.
///
/// Line count and line order are preserved; only lines that begin a `CREATE`
/// statement may change. Lines inside multi-line literals or trigger bodies are
/// never treated as statement starts.
pub fn make_idempotent<R: BufRead, W: Write>(input: R, output: W) -> RewriteResult<RewriteStats> {
    make_idempotent_for(input, output, &HashSet::new())
}

/// [`make_idempotent`] against a target that may already hold virtual tables.
///
/// `sqlite3 .dump` recreates a virtual table by writing its schema row and then
/// its shadow tables (`<name>_data`, `<name>_content`, ...) with their rows;
/// none of that can be replayed once the table exists. For every key in
/// `existing_virtual_tables` (unquoted, lowercased names) those statements are
/// blanked out, keeping their line breaks, and a warning is logged.
pub fn make_idempotent_for<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    existing_virtual_tables: &HashSet<String>,
) -> RewriteResult<RewriteStats> {
    let mut scanner = StatementScanner::new();
    let mut stats = RewriteStats::default();
    let mut shadow_tables: HashSet<String> = HashSet::new();
    let mut skipping = false;
    let mut line = Vec::new();

    while input.read_until(b'\n', &mut line)? > 0 {
        stats.lines += 1;
        let at_start = scanner.at_statement_start();
        if at_start {
            skipping = match parse_virtual_table_row(&line) {
                Some(table) if existing_virtual_tables.contains(&table) => {
                    tracing::warn!(
                        "⚠ Virtual table {} already exists, its contents from this source are skipped",
                        table
                    );
                    shadow_tables.extend(
                        SHADOW_TABLE_SUFFIXES
                            .iter()
                            .map(|suffix| format!("{}_{}", table, suffix)),
                    );
                    true
                }
                _ => is_shadow_table(&line, &shadow_tables),
            };
        }

        if skipping {
            stats.skipped += 1;
            if line.ends_with(b"\n") {
                output.write_all(b"\n")?;
            }
        } else if let Some(rewritten) = at_start.then(|| guard_create(&line)).flatten() {
            tracing::trace!("line {}: {}", stats.lines, String::from_utf8_lossy(&rewritten).trim_end());
            stats.rewritten += 1;
            output.write_all(&rewritten)?;
        } else {
            output.write_all(&line)?;
        }
        scanner.feed(&line);
        line.clear();
    }

    output.flush()?;
    tracing::debug!(
        "Guarded {} CREATE statement(s) across {} line(s)",
        stats.rewritten,
        stats.lines
    );
    if stats.skipped > 0 {
        tracing::debug!("Skipped {} line(s) of existing virtual tables", stats.skipped);
    }
    Ok(stats)
}

fn is_shadow_table(line: &[u8], shadow_tables: &HashSet<String>) -> bool {
    if shadow_tables.is_empty() {
        return false;
    }
    parse_create_header(line)
        .and_then(|header| header.name)
        .or_else(|| parse_insert_target(line))
        .is_some_and(|name| shadow_tables.contains(&name.key))
}
