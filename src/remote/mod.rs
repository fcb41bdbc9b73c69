//! Remote issue source.
//!
//! The sync engine pages through an [`IssueSource`] newest-first. The only
//! production implementation is [`GitHubSource`], which speaks the GitHub
//! GraphQL API; tests inject in-memory sources.
//!
//! Sources validate at the boundary: every [`RawIssue`] they yield carries all
//! required fields, and anything that does not is a [`FetchError::Malformed`].

pub mod github;

use std::fmt;
use std::future::Future;

use thiserror::Error;

use crate::error::Result;
use crate::model::RawIssue;

pub use github::{DEFAULT_ENDPOINT, GitHubSource};

/// Largest page the GitHub API will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Opaque page boundary token handed out by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page request. A pass starts with `cursor: None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<Cursor>,
    pub page_size: u32,
}

impl PageRequest {
    /// Request for the first page, with `page_size` clamped to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn first(page_size: u32) -> Self {
        Self {
            cursor: None,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Request for the page following `cursor`, keeping the page size.
    #[must_use]
    pub fn after(&self, cursor: Cursor) -> Self {
        Self {
            cursor: Some(cursor),
            page_size: self.page_size,
        }
    }
}

/// One page of issues, ordered by `updated_at` descending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub issues: Vec<RawIssue>,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
    /// Remote total at query time. Only used for progress display.
    pub total_count: u64,
}

/// Failures talking to the remote. All of them abort the sync pass.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("authentication failed (HTTP 401)")]
    Unauthorized,

    #[error("rate limit exceeded")]
    RateLimited { reset_at: Option<String> },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("repository {owner}/{name} not found")]
    RepositoryNotFound { owner: String, name: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// A paginated, newest-first source of issues.
pub trait IssueSource: Send + Sync {
    /// Fetch one page of issues ordered by `updated_at` descending.
    fn fetch_page(&self, request: &PageRequest) -> impl Future<Output = Result<Page>> + Send;
}
