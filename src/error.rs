//! Error types for ghg.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=query, 6=remote, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for `--json` consumers

use thiserror::Error;

use crate::remote::FetchError;

/// Result type alias for ghg operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    IssueNotFound,

    // Query / arguments (exit 4)
    QuerySyntax,
    InvalidArgument,

    // Remote (exit 6)
    FetchError,
    Unauthorized,
    RateLimited,

    // Config (exit 7)
    ConfigError,
    IdentityError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::IssueNotFound => "ISSUE_NOT_FOUND",
            Self::QuerySyntax => "QUERY_SYNTAX",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FetchError => "FETCH_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited => "RATE_LIMITED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IdentityError => "IDENTITY_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::IssueNotFound => 3,
            Self::QuerySyntax | Self::InvalidArgument => 4,
            Self::FetchError | Self::Unauthorized | Self::RateLimited => 6,
            Self::ConfigError | Self::IdentityError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-running the same command (possibly later, or with corrected
    /// input) can succeed.
    ///
    /// A failed sync never leaves partial state behind, so every remote and
    /// database failure is safe to retry from scratch.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::QuerySyntax
                | Self::InvalidArgument
                | Self::FetchError
                | Self::RateLimited
                | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in ghg operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Remote fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid search query '{query}': {message}")]
    QuerySyntax { query: String, message: String },

    #[error("Issue #{number} is not in the local mirror")]
    NotFound { number: i64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot determine repository: {0}")]
    Identity(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Fetch(FetchError::Unauthorized) => ErrorCode::Unauthorized,
            Self::Fetch(FetchError::RateLimited { .. }) => ErrorCode::RateLimited,
            Self::Fetch(_) => ErrorCode::FetchError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::QuerySyntax { .. } => ErrorCode::QuerySyntax,
            Self::NotFound { .. } => ErrorCode::IssueNotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Identity(_) => ErrorCode::IdentityError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Fetch(FetchError::Unauthorized) => Some(
                "Set GHI_TOKEN (or GITHUB_TOKEN) to a GitHub access token and run `ghg sync` again"
                    .to_string(),
            ),
            Self::Fetch(FetchError::RateLimited { reset_at }) => Some(match reset_at {
                Some(reset) => format!("GitHub rate limit exhausted; it resets at {reset}"),
                None => "GitHub rate limit exhausted; wait and run `ghg sync` again".to_string(),
            }),
            Self::Fetch(FetchError::RepositoryNotFound { owner, name }) => Some(format!(
                "Check that {owner}/{name} exists and that your token can read it. \
                 Use `--repo owner/name` to override the detected repository."
            )),
            Self::Fetch(_) => Some(
                "Nothing was written to the local mirror. Run `ghg sync` again later.".to_string(),
            ),

            Self::QuerySyntax { .. } => Some(
                "Queries use SQLite FTS5 syntax: words, \"exact phrases\", prefix*, \
                 AND / OR / NOT, title:word"
                    .to_string(),
            ),

            Self::NotFound { .. } => Some(
                "Run `ghg sync` to refresh the mirror, or `ghg search` to find issue numbers"
                    .to_string(),
            ),

            Self::Identity(_) => Some(
                "Run inside a clone of a GitHub repository, or pass `--repo owner/name`"
                    .to_string(),
            ),

            Self::Database(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
