//! Data models for ghg.
//!
//! - [`RawIssue`] / [`RawComment`]: an issue as validated at the remote boundary
//! - [`IssueRecord`]: the flattened row stored in the local mirror

pub mod issue;

pub use issue::{
    COMMENT_SEPARATOR, DOCUMENT_SEPARATOR, IssueRecord, MAX_COMMENTS, RawComment, RawIssue,
};
