// ABOUTME: End-to-end merge tests against the real sqlite3 shell
// ABOUTME: sqlite3 must be installed unless MERGE_SKIP_SQLITE3_TESTS is set

use rusqlite::Connection;
use sqlite_merge::commands::{merge, MergeJob};
use sqlite_merge::migration::{Sqlite3Cli, SqliteTool};
use std::path::{Path, PathBuf};
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

fn create_source(dir: &Path, name: &str, sql: &str) -> PathBuf {
    let path = dir.join(name);
    Connection::open(&path).unwrap().execute_batch(sql).unwrap();
    path
}

#[tokio::test]
async fn test_merge_real_databases() {
    if !sqlite3_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let first = create_source(
        dir.path(),
        "first.db",
        "CREATE TABLE t (id INTEGER, name TEXT);
         CREATE INDEX idx_t_name ON t(name);
         INSERT INTO t VALUES (1, 'a');
         CREATE TABLE events (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             kind TEXT NOT NULL DEFAULT 'x',
             payload TEXT CHECK (length(payload) < 100)
         );
         INSERT INTO events (kind, payload) VALUES ('start', 'multi
line  payload');",
    );
    // Later schema revision: columns reordered
    let second = create_source(
        dir.path(),
        "second.db",
        "CREATE TABLE t (name TEXT, id INTEGER);
         CREATE INDEX idx_t_name ON t(name);
         INSERT INTO t VALUES ('b', 2);",
    );

    let job = MergeJob::new("real", vec![first, second]).with_output_dir(dir.path());
    let summary = merge(&job, &Sqlite3Cli::default()).await.unwrap();
    assert_eq!(summary.sources_merged, 2);

    let conn = Connection::open(job.database_path()).unwrap();
    let mut stmt = conn.prepare("SELECT id, name FROM t ORDER BY id").unwrap();
    let rows: Vec<(i64, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(rows, [(1, "a".to_string()), (2, "b".to_string())]);

    let payload: String = conn
        .query_row("SELECT payload FROM events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(payload, "multi\nline  payload");
}

#[tokio::test]
async fn test_merge_same_source_twice() {
    if !sqlite3_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = create_source(
        dir.path(),
        "src.db",
        "CREATE TABLE t (id INTEGER, name TEXT);
         CREATE VIEW names AS SELECT name FROM t;
         INSERT INTO t VALUES (1, 'a');",
    );

    let job = MergeJob::new("twice", vec![source.clone(), source]).with_output_dir(dir.path());
    merge(&job, &Sqlite3Cli::default()).await.unwrap();

    let conn = Connection::open(job.database_path()).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM names", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_real_dump_is_written_to_file() {
    if !sqlite3_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = create_source(
        dir.path(),
        "src.db",
        "CREATE TABLE t (id INTEGER, name TEXT); INSERT INTO t VALUES (1, 'a');",
    );

    let output = dir.path().join("source.sql");
    Sqlite3Cli::default().dump(&source, &output).await.unwrap();

    let dump = std::fs::read_to_string(&output).unwrap();
    assert!(!dump.is_empty());
    assert!(dump.contains("INSERT INTO t VALUES(1,'a');"));
}

#[tokio::test]
async fn test_merge_generated_columns() {
    if !sqlite3_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let sql = "CREATE TABLE g (a INT, b INT GENERATED ALWAYS AS (a * 2), c AS (a + 1) STORED);
               INSERT INTO g (a) VALUES (3);";
    let first = create_source(dir.path(), "g1.db", sql);
    let second = create_source(dir.path(), "g2.db", sql);

    let job = MergeJob::new("generated", vec![first, second]).with_output_dir(dir.path());
    merge(&job, &Sqlite3Cli::default()).await.unwrap();

    let conn = Connection::open(job.database_path()).unwrap();
    let (rows, b, c): (i64, i64, i64) = conn
        .query_row("SELECT COUNT(*), SUM(b), SUM(c) FROM g", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();
    assert_eq!((rows, b, c), (2, 12, 8));
}

#[tokio::test]
async fn test_merge_text_with_invalid_utf8() {
    if !sqlite3_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = create_source(
        dir.path(),
        "bytes.db",
        "CREATE TABLE u (x TEXT); INSERT INTO u VALUES (CAST(X'61FF62' AS TEXT));",
    );

    let job = MergeJob::new("bytes", vec![source]).with_output_dir(dir.path());
    merge(&job, &Sqlite3Cli::default()).await.unwrap();

    let conn = Connection::open(job.database_path()).unwrap();
    let raw: Vec<u8> = conn
        .query_row("SELECT CAST(x AS BLOB) FROM u", [], |row| row.get(0))
        .unwrap();
    assert_eq!(raw, b"a\xffb");
}

#[tokio::test]
async fn test_merge_trigger_with_case_expression() {
    if !sqlite3_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let source = create_source(
        dir.path(),
        "trig.db",
        "CREATE TABLE t (x INTEGER);
         CREATE TABLE log (v);
         CREATE TRIGGER tr AFTER INSERT ON t BEGIN
           UPDATE t SET x = CASE WHEN new.x > 0 THEN 1 ELSE 0 END;
           INSERT INTO log VALUES (new.x);
         END;
         INSERT INTO t VALUES (5);",
    );

    let job = MergeJob::new("trig", vec![source]).with_output_dir(dir.path());
    merge(&job, &Sqlite3Cli::default()).await.unwrap();

    let conn = Connection::open(job.database_path()).unwrap();
    conn.execute("INSERT INTO t VALUES (-1)", []).unwrap();
    let logged: Vec<i64> = conn
        .prepare("SELECT v FROM log ORDER BY rowid")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(logged, [5, -1]);
}

#[tokio::test]
async fn test_merge_sources_sharing_a_virtual_table() {
    if !sqlite3_available() {
        return;
    }
    let dir = tempdir().unwrap();
    let first = create_source(
        dir.path(),
        "v1.db",
        "CREATE VIRTUAL TABLE docs USING fts5(body);
         INSERT INTO docs VALUES ('hello world');
         CREATE TABLE notes (id INTEGER, body TEXT);
         INSERT INTO notes VALUES (1, 'first');",
    );
    let second = create_source(
        dir.path(),
        "v2.db",
        "CREATE VIRTUAL TABLE docs USING fts5(body);
         INSERT INTO docs VALUES ('second doc');
         CREATE TABLE notes (id INTEGER, body TEXT);
         INSERT INTO notes VALUES (2, 'second');",
    );

    let job = MergeJob::new("vtab", vec![first, second]).with_output_dir(dir.path());
    let summary = merge(&job, &Sqlite3Cli::default()).await.unwrap();
    assert_eq!(summary.sources_merged, 2);

    let conn = Connection::open(job.database_path()).unwrap();
    let notes: i64 = conn
        .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
        .unwrap();
    assert_eq!(notes, 2);
    let hits: i64 = conn
        .query_row("SELECT COUNT(*) FROM docs WHERE docs MATCH 'hello'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(hits, 1);
    conn.execute("INSERT INTO docs(docs) VALUES ('integrity-check')", [])
        .unwrap();
}
