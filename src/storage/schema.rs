//! Database schema definitions.
//!
//! `issues` is the primary table. `issues_fts` is an FTS5 table derived from
//! it; it is never maintained incrementally, only dropped and repopulated.

use rusqlite::{Connection, Result};

use crate::model::DOCUMENT_SEPARATOR;

/// Current schema version, recorded in `schema_migrations`.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Primary table, supporting indexes and version tracking.
///
/// `updated_at` is stored as INTEGER (Unix milliseconds) so that
/// `MAX(updated_at)` orders chronologically.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS issues (
    id TEXT PRIMARY KEY,
    number INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    title TEXT,
    body TEXT,
    comments TEXT,
    url TEXT
);

CREATE INDEX IF NOT EXISTS issues_updated_at ON issues (updated_at);
CREATE UNIQUE INDEX IF NOT EXISTS issues_by_number ON issues (number);
";

/// Full-text index over title and the flattened document.
///
/// `id` is carried unindexed so results can be joined back to `issues`.
pub const CREATE_FTS_SQL: &str =
    "CREATE VIRTUAL TABLE IF NOT EXISTS issues_fts USING fts5(title, tokens, id UNINDEXED)";

/// Drops everything a rebuild discards.
pub const DROP_SQL: &str = r"
DROP TABLE IF EXISTS issues_fts;
DROP TABLE IF EXISTS issues;
";

/// Repopulates `issues_fts` from `issues`.
///
/// `?1` is [`DOCUMENT_SEPARATOR`]; the produced `tokens` value equals
/// [`crate::model::IssueRecord::document`].
const POPULATE_FTS_SQL: &str = "INSERT INTO issues_fts (title, tokens, id)
     SELECT coalesce(title, ''),
            coalesce(title, '') || ?1 || coalesce(body, '') || ?1 || coalesce(comments, ''),
            id
     FROM issues";

/// Create the primary table, its indexes and the full-text table if absent.
///
/// When `rebuild` is true, the primary and full-text tables are dropped
/// first. Idempotent otherwise.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn ensure_schema(conn: &Connection, rebuild: bool) -> Result<()> {
    if rebuild {
        conn.execute_batch(DROP_SQL)?;
    } else if schema_is_current(conn)? {
        // Read-only fast path: searches must not queue behind a sync's write lock.
        return Ok(());
    }

    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(CREATE_FTS_SQL, [])?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

/// Drop and recreate `issues_fts`, repopulating it from `issues`.
///
/// Runs on whatever connection or transaction it is given; the sync engine
/// calls it inside the pass transaction.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn regenerate_fts(conn: &Connection) -> Result<usize> {
    conn.execute_batch("DROP TABLE IF EXISTS issues_fts")?;
    conn.execute(CREATE_FTS_SQL, [])?;
    conn.execute(POPULATE_FTS_SQL, [DOCUMENT_SEPARATOR])
}

/// Apply connection pragmas for file-backed databases.
///
/// WAL lets searches read the last committed snapshot while a sync pass
/// holds its write transaction.
///
/// # Errors
///
/// Returns an error if a pragma cannot be set.
pub fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

fn schema_is_current(conn: &Connection) -> Result<bool> {
    for table in ["schema_migrations", "issues", "issues_fts"] {
        if !table_exists(conn, table)? {
            return Ok(false);
        }
    }
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
        [format!("v{CURRENT_SCHEMA_VERSION}")],
        |row| row.get(0),
    )
}

/// Check if a table exists.
pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE name = ?1)",
        [table],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn, false).unwrap();

        assert!(table_exists(&conn, "issues").unwrap());
        assert!(table_exists(&conn, "issues_fts").unwrap());
        assert!(table_exists(&conn, "issues_updated_at").unwrap());
        assert!(table_exists(&conn, "issues_by_number").unwrap());
    }

    #[test]
    fn test_ensure_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn, false).unwrap();
        conn.execute(
            "INSERT INTO issues (id, number, updated_at, title) VALUES ('a', 1, 10, 't')",
            [],
        )
        .unwrap();

        ensure_schema(&conn, false).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_rebuild_drops_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn, false).unwrap();
        conn.execute(
            "INSERT INTO issues (id, number, updated_at, title) VALUES ('a', 1, 10, 't')",
            [],
        )
        .unwrap();
        regenerate_fts(&conn).unwrap();

        ensure_schema(&conn, true).unwrap();

        let issues: i64 = conn
            .query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))
            .unwrap();
        let fts: i64 = conn
            .query_row("SELECT COUNT(*) FROM issues_fts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(issues, 0);
        assert_eq!(fts, 0);
    }

    #[test]
    fn test_unique_number_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn, false).unwrap();
        conn.execute(
            "INSERT INTO issues (id, number, updated_at) VALUES ('a', 1, 10)",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO issues (id, number, updated_at) VALUES ('b', 1, 10)",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_regenerate_fts_builds_document() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn, false).unwrap();
        conn.execute(
            "INSERT INTO issues (id, number, updated_at, title, body, comments)
             VALUES ('a', 1, 10, 'Title', 'Body', 'c1\n\nc2')",
            [],
        )
        .unwrap();

        let rows = regenerate_fts(&conn).unwrap();
        assert_eq!(rows, 1);

        let tokens: String = conn
            .query_row("SELECT tokens FROM issues_fts WHERE id = 'a'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tokens, "Title\n\nBody\n\nc1\n\nc2");
    }
}
