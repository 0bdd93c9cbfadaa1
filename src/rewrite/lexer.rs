// ABOUTME: Lexical helpers shared by the dump rewriters
// ABOUTME: Tracks statement boundaries across raw dump lines and matches CREATE/INSERT headers

use regex::bytes::{Captures, Regex};
use std::sync::LazyLock;

/// One part of a possibly schema-qualified name: `"x"`, `` `x` ``, `[x]`, `'x'` or bare.
const NAME_PART: &str = r#"(?:"(?:[^"]|"")*"|`(?:[^`]|``)*`|\[[^\]]*\]|'(?:[^']|'')*'|[^\s(),;.'"`\[]+)"#;

static CREATE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i-u)^\s*CREATE\s+(?:(?:TEMP|TEMPORARY)\s+)?(?:UNIQUE\s+)?(?P<virtual>VIRTUAL\s+)?(?P<kind>TABLE|INDEX|VIEW|TRIGGER)\b(?P<guard>\s+IF\s+NOT\s+EXISTS\b)?(?:\s*(?P<name>(?:{p}\s*\.\s*)?(?P<last>{p})))?",
        p = NAME_PART
    ))
    .expect("valid create header regex")
});

static INSERT_TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i-u)^\s*INSERT\s+INTO\s+(?P<name>(?:{p}\s*\.\s*)?(?P<last>{p}))",
        p = NAME_PART
    ))
    .expect("valid insert target regex")
});

// `sqlite3 .dump` registers virtual tables by writing the schema row directly.
static VIRTUAL_TABLE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i-u)^\s*INSERT\s+INTO\s+(?:main\s*\.\s*)?"?sqlite_(?:schema|master)"?\s*\([^)]*\)\s*VALUES\s*\(\s*'table'\s*,\s*'(?P<name>(?:[^']|'')*)'\s*,\s*'(?:[^']|'')*'\s*,\s*0\s*,\s*'CREATE\s+VIRTUAL\s+TABLE\b"#,
    )
    .expect("valid virtual table registration regex")
});

/// Kind of schema object named by a `CREATE` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    VirtualTable,
    Index,
    View,
    Trigger,
}

/// An object name matched in statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSpan {
    pub start: usize,
    pub end: usize,
    /// Last name part, unquoted and ASCII-lowercased (SQLite names are case-insensitive)
    pub key: String,
}

impl NameSpan {
    fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        let name = caps.name("name")?;
        let last = caps.name("last")?;
        Some(Self {
            start: name.start(),
            end: name.end(),
            key: unquote_key(last.as_bytes()),
        })
    }
}

/// Leading keywords of a `CREATE ...` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateHeader {
    pub kind: ObjectKind,
    /// Byte offset just past the object keyword (`TABLE`, `INDEX`, ...)
    pub keyword_end: usize,
    /// `IF NOT EXISTS` already follows the object keyword
    pub guarded: bool,
    pub name: Option<NameSpan>,
}

/// Parse the header of a line that begins a `CREATE` statement.
///
/// Recognises `TEMP`/`TEMPORARY`, `UNIQUE` and `VIRTUAL` modifiers. Keywords are
/// matched case-insensitively. Returns `None` when the line does not start with
/// `CREATE` followed by a supported object keyword.
pub fn parse_create_header(line: &[u8]) -> Option<CreateHeader> {
    let caps = CREATE_HEADER.captures(line)?;
    let keyword = caps.name("kind")?;
    let kind = match keyword.as_bytes().to_ascii_uppercase().as_slice() {
        b"TABLE" if caps.name("virtual").is_some() => ObjectKind::VirtualTable,
        b"TABLE" => ObjectKind::Table,
        b"INDEX" => ObjectKind::Index,
        b"VIEW" => ObjectKind::View,
        _ => ObjectKind::Trigger,
    };
    Some(CreateHeader {
        kind,
        keyword_end: keyword.end(),
        guarded: caps.name("guard").is_some(),
        name: NameSpan::from_captures(&caps),
    })
}

/// Target table of a line starting with `INSERT INTO <name>`.
pub fn parse_insert_target(line: &[u8]) -> Option<NameSpan> {
    INSERT_TARGET
        .captures(line)
        .and_then(|caps| NameSpan::from_captures(&caps))
}

/// Key of the virtual table registered by a `sqlite3 .dump` schema-row insert.
pub fn parse_virtual_table_row(line: &[u8]) -> Option<String> {
    let caps = VIRTUAL_TABLE_ROW.captures(line)?;
    let name = caps.name("name")?.as_bytes();
    Some(undouble(name, b'\'').to_ascii_lowercase())
}

fn unquote_key(part: &[u8]) -> String {
    let unquoted = match part {
        [open @ (b'"' | b'`' | b'\''), inner @ .., close] if open == close => undouble(inner, *open),
        [b'[', inner @ .., b']'] => String::from_utf8_lossy(inner).into_owned(),
        _ => String::from_utf8_lossy(part).into_owned(),
    };
    unquoted.to_ascii_lowercase()
}

fn undouble(text: &[u8], quote: u8) -> String {
    let mut out = Vec::with_capacity(text.len());
    let mut i = 0;
    while i < text.len() {
        out.push(text[i]);
        i += if text[i] == quote && text.get(i + 1) == Some(&quote) { 2 } else { 1 };
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || !b.is_ascii()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Code,
    /// Inside a literal or quoted identifier; holds the closing byte
    Quoted(u8),
    BlockComment,
}

/// Line-by-line tracker of SQL statement boundaries.
///
/// Feed every line of a dump in order; between lines, [`at_statement_start`]
/// tells whether the next line begins a new statement. A `;` ends a statement
/// only outside literals, comments and parentheses. Inside a `CREATE TRIGGER`
/// body only an `END;` that closes the body (not a `CASE ... END`) ends it.
///
/// Lines are raw bytes: text values in a dump need not be valid UTF-8.
///
/// [`at_statement_start`]: StatementScanner::at_statement_start
#[derive(Debug, Default)]
pub struct StatementScanner {
    mode: Mode,
    depth: usize,
    pending: bool,
    in_trigger: bool,
    case_depth: usize,
    after_end: bool,
}

impl StatementScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the next line fed begins a new statement.
    pub fn at_statement_start(&self) -> bool {
        self.mode == Mode::Code && !self.pending
    }

    /// True while a literal, quoted identifier or block comment spans the line break.
    pub fn in_literal(&self) -> bool {
        self.mode != Mode::Code
    }

    pub fn feed(&mut self, line: &[u8]) {
        if self.at_statement_start() {
            self.depth = 0;
            self.case_depth = 0;
            self.after_end = false;
            self.in_trigger =
                parse_create_header(line).is_some_and(|h| h.kind == ObjectKind::Trigger);
        }

        let mut i = 0;
        while i < line.len() {
            let b = line[i];
            let next = line.get(i + 1).copied();
            match self.mode {
                Mode::Quoted(close) => {
                    if b == close {
                        if close != b']' && next == Some(close) {
                            i += 1;
                        } else {
                            self.mode = Mode::Code;
                        }
                    }
                }
                Mode::BlockComment => {
                    if b == b'*' && next == Some(b'/') {
                        self.mode = Mode::Code;
                        i += 1;
                    }
                }
                Mode::Code => {
                    if is_word_byte(b) {
                        let start = i;
                        while i < line.len() && is_word_byte(line[i]) {
                            i += 1;
                        }
                        self.word(&line[start..i]);
                        continue;
                    }
                    match b {
                        b'-' if next == Some(b'-') => break,
                        b'/' if next == Some(b'*') => {
                            self.mode = Mode::BlockComment;
                            i += 1;
                        }
                        b'\'' | b'"' | b'`' => {
                            self.mode = Mode::Quoted(b);
                            self.mark();
                        }
                        b'[' => {
                            self.mode = Mode::Quoted(b']');
                            self.mark();
                        }
                        b'(' => {
                            self.depth += 1;
                            self.mark();
                        }
                        b')' => {
                            self.depth = self.depth.saturating_sub(1);
                            self.mark();
                        }
                        b';' => self.semicolon(),
                        _ if b.is_ascii_whitespace() => {}
                        _ => self.mark(),
                    }
                }
            }
            i += 1;
        }
    }

    fn word(&mut self, word: &[u8]) {
        self.mark();
        if !self.in_trigger {
            return;
        }
        if word.eq_ignore_ascii_case(b"CASE") {
            self.case_depth += 1;
        } else if word.eq_ignore_ascii_case(b"END") {
            if self.case_depth > 0 {
                self.case_depth -= 1;
            } else {
                self.after_end = true;
            }
        }
    }

    fn mark(&mut self) {
        self.pending = true;
        self.after_end = false;
    }

    fn semicolon(&mut self) {
        if self.depth == 0 && (!self.in_trigger || self.after_end) {
            self.pending = false;
            self.in_trigger = false;
        }
        self.after_end = false;
    }
}
