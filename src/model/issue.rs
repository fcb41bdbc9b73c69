//! Issue models.
//!
//! Comments are denormalized: every comment body of an issue is flattened
//! into a single searchable text column. The separators and the comment cap
//! are named here so the stored format is not implicit in string formatting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator placed between flattened comment bodies.
pub const COMMENT_SEPARATOR: &str = "\n\n";

/// Separator placed between title, body and comments in the indexed document.
pub const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Maximum number of comments fetched per issue (the most recent ones).
///
/// Older comments beyond the cap are not mirrored.
pub const MAX_COMMENTS: u32 = 100;

/// A comment as returned by the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComment {
    pub body: String,
}

/// An issue as returned by the remote source, after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIssue {
    /// Remote-stable opaque identifier.
    pub id: String,
    /// Remote sequential number.
    pub number: i64,
    pub updated_at: DateTime<Utc>,
    pub url: String,
    pub title: String,
    pub body: String,
    /// Most recent comments, oldest first, at most [`MAX_COMMENTS`].
    pub comments: Vec<RawComment>,
}

/// An issue as stored in the local mirror.
///
/// Records are replaced wholesale whenever the remote reports a newer
/// `updated_at`; they are never partially updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: String,
    pub number: i64,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    /// Comment bodies with newlines replaced by spaces, joined by [`COMMENT_SEPARATOR`].
    pub comments: String,
    pub url: String,
}

impl IssueRecord {
    /// Flatten a remote issue into its stored form.
    #[must_use]
    pub fn from_raw(raw: RawIssue) -> Self {
        let comments = flatten_comments(&raw.comments);
        Self {
            id: raw.id,
            number: raw.number,
            updated_at: raw.updated_at,
            title: raw.title,
            body: raw.body,
            comments,
            url: raw.url,
        }
    }

    /// The searchable document: title, body and comments.
    ///
    /// Matches the `tokens` column produced by index regeneration.
    #[must_use]
    pub fn document(&self) -> String {
        [self.title.as_str(), self.body.as_str(), self.comments.as_str()].join(DOCUMENT_SEPARATOR)
    }
}

impl From<RawIssue> for IssueRecord {
    fn from(raw: RawIssue) -> Self {
        Self::from_raw(raw)
    }
}

fn flatten_comments(comments: &[RawComment]) -> String {
    comments
        .iter()
        .map(|c| c.body.replace("\r\n", " ").replace('\n', " "))
        .collect::<Vec<_>>()
        .join(COMMENT_SEPARATOR)
}
