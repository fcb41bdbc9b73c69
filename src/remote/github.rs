//! GitHub GraphQL issue source.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Cursor, FetchError, IssueSource, MAX_PAGE_SIZE, Page, PageRequest};
use crate::config::RepoIdentity;
use crate::error::Result;
use crate::model::{MAX_COMMENTS, RawComment, RawIssue};

/// Public GitHub GraphQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";

const USER_AGENT: &str = concat!("ghg/", env!("CARGO_PKG_VERSION"));

const ISSUES_QUERY: &str = r"query($owner: String!, $name: String!, $first: Int!, $after: String, $comments: Int!) {
  repository(owner: $owner, name: $name) {
    issues(first: $first, after: $after, orderBy: {field: UPDATED_AT, direction: DESC}) {
      totalCount
      pageInfo { endCursor hasNextPage }
      nodes {
        id
        number
        updatedAt
        url
        title
        bodyText
        comments(last: $comments) { nodes { bodyText } }
      }
    }
  }
}";

/// Issues of one GitHub repository, newest first.
pub struct GitHubSource {
    client: reqwest::Client,
    endpoint: String,
    repo: RepoIdentity,
    token: Option<String>,
}

impl GitHubSource {
    /// Create a source for `repo`. Without a token requests are anonymous,
    /// which GitHub's GraphQL API normally rejects with 401.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(repo: RepoIdentity, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Request)?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            repo,
            token,
        })
    }

    /// Point the source at a different GraphQL endpoint (GitHub Enterprise, tests).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn repo(&self) -> &RepoIdentity {
        &self.repo
    }
}

impl IssueSource for GitHubSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
        let first = request.page_size.clamp(1, MAX_PAGE_SIZE);
        let after = request.cursor.as_ref().map(Cursor::as_str);
        debug!(repo = %self.repo, first, after, "Fetching issue page");

        let body = json!({
            "query": ISSUES_QUERY,
            "variables": {
                "owner": self.repo.owner,
                "name": self.repo.name,
                "first": first,
                "after": after,
                "comments": MAX_COMMENTS,
            }
        });

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(FetchError::Request)?;
        let status = response.status();

        if let Some(err) = rate_limit_error(status, response.headers()) {
            return Err(err.into());
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized.into());
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let text = response.text().await.map_err(FetchError::Request)?;
        let payload: GraphQlResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::Malformed(e.to_string()))?;

        let page = payload.into_page(&self.repo)?;
        debug!(
            issues = page.issues.len(),
            has_more = page.has_more,
            total = page.total_count,
            "Fetched issue page"
        );
        Ok(page)
    }
}

/// 429, or 403 with an exhausted quota, is a rate limit rather than a denial.
fn rate_limit_error(status: StatusCode, headers: &HeaderMap) -> Option<FetchError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let exhausted = header("x-ratelimit-remaining") == Some("0");
    if status != StatusCode::TOO_MANY_REQUESTS && !(status == StatusCode::FORBIDDEN && exhausted) {
        return None;
    }

    let reset_at = header("x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|t| t.to_rfc3339());
    Some(FetchError::RateLimited { reset_at })
}

// ── Response shapes ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    total_count: u64,
    page_info: PageInfo,
    nodes: Option<Vec<Option<IssueNode>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    id: Option<String>,
    number: Option<i64>,
    updated_at: Option<DateTime<Utc>>,
    url: Option<String>,
    title: Option<String>,
    body_text: Option<String>,
    comments: Option<CommentConnection>,
}

#[derive(Debug, Deserialize)]
struct CommentConnection {
    nodes: Option<Vec<Option<CommentNode>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    body_text: Option<String>,
}

impl GraphQlResponse {
    fn into_page(self, repo: &RepoIdentity) -> std::result::Result<Page, FetchError> {
        let not_found = || FetchError::RepositoryNotFound {
            owner: repo.owner.clone(),
            name: repo.name.clone(),
        };

        if !self.errors.is_empty() {
            let kind = |k: &str| self.errors.iter().any(|e| e.kind.as_deref() == Some(k));
            if kind("NOT_FOUND") {
                return Err(not_found());
            }
            if kind("RATE_LIMITED") {
                return Err(FetchError::RateLimited { reset_at: None });
            }
            let message = self
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::GraphQl(message));
        }

        let connection = self
            .data
            .and_then(|d| d.repository)
            .ok_or_else(not_found)?
            .issues;

        let issues = connection
            .nodes
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                node.ok_or_else(|| FetchError::Malformed(format!("issue node {i} is null")))
                    .and_then(IssueNode::into_raw)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let next_cursor = connection.page_info.end_cursor.map(Cursor::new);
        if connection.page_info.has_next_page && next_cursor.is_none() {
            return Err(FetchError::Malformed(
                "hasNextPage is true but endCursor is missing".to_string(),
            ));
        }

        Ok(Page {
            issues,
            next_cursor,
            has_more: connection.page_info.has_next_page,
            total_count: connection.total_count,
        })
    }
}

impl IssueNode {
    fn into_raw(self) -> std::result::Result<RawIssue, FetchError> {
        let id = self
            .id
            .ok_or_else(|| FetchError::Malformed("issue without id".to_string()))?;
        let missing = |field: &str| FetchError::Malformed(format!("issue {id} has no {field}"));

        let number = self.number.ok_or_else(|| missing("number"))?;
        let updated_at = self.updated_at.ok_or_else(|| missing("updatedAt"))?;
        let url = self.url.ok_or_else(|| missing("url"))?;

        let comments = self
            .comments
            .and_then(|c| c.nodes)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(|c| RawComment {
                body: c.body_text.unwrap_or_default(),
            })
            .collect();

        Ok(RawIssue {
            id,
            number,
            updated_at,
            url,
            title: self.title.unwrap_or_default(),
            body: self.body_text.unwrap_or_default(),
            comments,
        })
    }
}
