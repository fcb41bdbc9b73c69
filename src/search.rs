//! Full-text search over the local mirror.
//!
//! Queries are handed to SQLite FTS5 verbatim, so the native syntax works:
//! words, `"exact phrases"`, `prefix*`, `AND` / `OR` / `NOT`, and column
//! filters such as `title:crash`. Results are ordered by FTS5 `rank` (bm25).

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::IssueStore;
use crate::storage::schema::ensure_schema;

/// Marker inserted before each matched term in an excerpt.
pub const MATCH_START: &str = "<<";
/// Marker inserted after each matched term in an excerpt.
pub const MATCH_END: &str = ">>";
/// Marker for text elided from an excerpt.
pub const ELLIPSIS: &str = "…";
/// Maximum number of tokens in an excerpt.
pub const EXCERPT_TOKENS: i64 = 16;
/// Result limit used by the command line when none is given.
pub const DEFAULT_LIMIT: usize = 100;

const SEARCH_SQL: &str = "
SELECT issues.number, a.title, a.excerpt, a.tokens, issues.url
FROM (
    SELECT id, title, snippet(issues_fts, -1, ?3, ?4, ?5, ?6) AS excerpt, tokens, rank
    FROM issues_fts
    WHERE issues_fts MATCH ?1
    ORDER BY rank
    LIMIT ?2
) a
JOIN issues USING (id)
ORDER BY a.rank";

/// A match returned from [`Searcher::search`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub number: i64,
    pub title: String,
    /// Short snippet around the match, with [`MATCH_START`]/[`MATCH_END`] markers.
    pub excerpt: String,
    /// The full flattened text: title, body and comments.
    pub comments: String,
    pub url: String,
}

/// Read-only query engine over an [`IssueStore`].
pub struct Searcher<'a> {
    store: &'a IssueStore,
}

impl<'a> Searcher<'a> {
    #[must_use]
    pub fn new(store: &'a IssueStore) -> Self {
        Self { store }
    }

    /// Return up to `limit` best matches for an FTS5 query expression.
    ///
    /// Safe to call before any sync: the schema is created if missing and an
    /// empty mirror yields no results. The query reaches FTS5 verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuerySyntax`] if FTS5 rejects the query, or
    /// [`Error::Database`] for any other storage failure.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let conn = self.store.conn();
        ensure_schema(conn, false)?;

        if limit == 0 {
            return Ok(Vec::new());
        }

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(SEARCH_SQL)?;
        let rows = stmt
            .query_map(
                rusqlite::params![query, limit, MATCH_START, MATCH_END, ELLIPSIS, EXCERPT_TOKENS],
                |row| {
                    Ok(SearchResult {
                        number: row.get(0)?,
                        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        excerpt: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        comments: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                        url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    })
                },
            )
            .map_err(|e| map_query_error(query, e))?;

        let results = rows
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| map_query_error(query, e))?;

        debug!(query, results = results.len(), "Search complete");
        Ok(results)
    }
}

/// Separate FTS5 query-language errors from genuine storage failures.
fn map_query_error(query: &str, err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(_, Some(message)) = &err {
        if is_query_error(message) {
            return Error::QuerySyntax {
                query: query.to_string(),
                message: message.clone(),
            };
        }
    }
    Error::Database(err)
}

fn is_query_error(message: &str) -> bool {
    message.starts_with("fts5:")
        || message.contains("syntax error")
        || message.starts_with("no such column")
        || message.contains("unterminated string")
        || message.starts_with("unknown special query")
}
