//! SQLite storage implementation.
//!
//! [`IssueStore`] owns the connection. Every write of a sync pass goes
//! through one [`SyncBatch`], a thin wrapper over an IMMEDIATE transaction
//! that is committed only once the whole remote scan succeeded.

use crate::error::Result;
use crate::model::IssueRecord;
use crate::storage::schema::{apply_pragmas, ensure_schema, regenerate_fts};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const ISSUE_COLUMNS: &str = "id, number, updated_at, title, body, comments, url";

/// SQLite-backed store for mirrored issues and their full-text index.
#[derive(Debug)]
pub struct IssueStore {
    conn: Connection,
}

impl IssueStore {
    /// Open a database at the given path, creating it and its schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the
    /// connection cannot be established, or the schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        apply_pragmas(&conn)?;
        ensure_schema(&conn, false)?;

        debug!(path = %path.display(), "Opened issue store");
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        ensure_schema(&conn, false)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Create the schema if absent. With `rebuild`, drop the primary and
    /// full-text tables first.
    ///
    /// The rebuild runs in its own transaction: either both tables are
    /// dropped and recreated, or nothing changes.
    ///
    /// # Errors
    ///
    /// Returns an error if any schema statement fails.
    pub fn ensure_schema(&mut self, rebuild: bool) -> Result<()> {
        if rebuild {
            let tx = self.conn.transaction()?;
            ensure_schema(&tx, true)?;
            tx.commit()?;
            info!("Dropped and recreated issue tables");
        } else {
            ensure_schema(&self.conn, false)?;
        }
        Ok(())
    }

    /// The most recent `updated_at` in the store, or the Unix epoch when empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn current_cutoff(&self) -> Result<DateTime<Utc>> {
        max_updated_at(&self.conn)
    }

    /// Total number of mirrored issues.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(id) FROM issues", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    /// Number of rows in the full-text index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn index_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM issues_fts", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    /// Look up an issue by its remote number.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn issue_by_number(&self, number: i64) -> Result<Option<IssueRecord>> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE number = ?1");
        let issue = self
            .conn
            .query_row(&sql, [number], map_issue_row)
            .optional()?;
        Ok(issue)
    }

    /// All issues ordered by `updated_at` descending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_issues(&self) -> Result<Vec<IssueRecord>> {
        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues ORDER BY updated_at DESC, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_issue_row)?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// SHA-256 over every primary row and every index row, in key order.
    ///
    /// Two stores with the same fingerprint hold the same records and the
    /// same index contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the queries fail.
    pub fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();

        let sql = format!("SELECT {ISSUE_COLUMNS} FROM issues ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            hasher.update(row.get::<_, String>(0)?.as_bytes());
            hasher.update(row.get::<_, i64>(1)?.to_le_bytes());
            hasher.update(row.get::<_, i64>(2)?.to_le_bytes());
            for idx in 3..=6 {
                hash_text(&mut hasher, row.get::<_, Option<String>>(idx)?);
            }
        }

        hasher.update(b"\x00fts\x00");
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, tokens FROM issues_fts ORDER BY id")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for idx in 0..=2 {
                hash_text(&mut hasher, row.get::<_, Option<String>>(idx)?);
            }
        }

        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Begin the write transaction for one sync pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started (e.g. the
    /// database is locked by another writer past the busy timeout).
    pub fn begin_batch(&mut self) -> Result<SyncBatch<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        Ok(SyncBatch { tx })
    }
}

/// The single write transaction of a sync pass.
///
/// Nothing written through a batch is visible to other connections until
/// [`SyncBatch::commit`]. Dropping a batch without committing rolls it back.
pub struct SyncBatch<'a> {
    tx: Transaction<'a>,
}

impl SyncBatch<'_> {
    /// The cutoff as seen inside this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn current_cutoff(&self) -> Result<DateTime<Utc>> {
        max_updated_at(&self.tx)
    }

    /// Drop and recreate the primary and full-text tables inside this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any schema statement fails.
    pub fn reset_schema(&self) -> Result<()> {
        ensure_schema(&self.tx, true)?;
        Ok(())
    }

    /// Insert or replace an issue by primary key `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn upsert(&self, issue: &IssueRecord) -> Result<()> {
        self.tx.execute(
            "INSERT OR REPLACE INTO issues (id, number, updated_at, title, body, comments, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                issue.id,
                issue.number,
                issue.updated_at.timestamp_millis(),
                issue.title,
                issue.body,
                issue.comments,
                issue.url,
            ],
        )?;
        Ok(())
    }

    /// Drop and rebuild the full-text index from the primary table.
    ///
    /// Returns the number of indexed rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be rebuilt.
    pub fn regenerate_index(&self) -> Result<usize> {
        let rows = regenerate_fts(&self.tx)?;
        info!(rows, "Regenerated full-text index");
        Ok(rows)
    }

    /// Commit every write of the pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; nothing is applied in that case.
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

fn max_updated_at(conn: &Connection) -> Result<DateTime<Utc>> {
    let max: Option<i64> =
        conn.query_row("SELECT MAX(updated_at) FROM issues", [], |row| row.get(0))?;
    Ok(max.map(millis_to_datetime).unwrap_or_default())
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn hash_text(hasher: &mut Sha256, value: Option<String>) {
    match value {
        Some(text) => {
            hasher.update([1u8]);
            hasher.update(text.as_bytes());
            hasher.update([0u8]);
        }
        None => hasher.update([0u8]),
    }
}

fn map_issue_row(row: &Row<'_>) -> rusqlite::Result<IssueRecord> {
    Ok(IssueRecord {
        id: row.get(0)?,
        number: row.get(1)?,
        updated_at: millis_to_datetime(row.get(2)?),
        title: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        body: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        comments: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        url: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
    })
}
