//! Configuration management.
//!
//! Everything here is resolved before the store is opened: where the mirror
//! lives, which repository it mirrors, the access token and the GraphQL
//! endpoint.
//!
//! # Database location
//!
//! A mirror belongs to one repository. By default it lives inside that
//! repository's git directory (`.git/ghg.db`), so every clone keeps its own
//! mirror and nothing is added to the working tree.

mod identity;

pub use identity::RepoIdentity;

use crate::error::{Error, Result};
use crate::remote::DEFAULT_ENDPOINT;

use std::path::{Path, PathBuf};

/// Database file name inside the git directory.
pub const DB_FILE_NAME: &str = "ghg.db";

/// Overrides the database path.
pub const DB_ENV: &str = "GHG_DB";

/// Overrides the GraphQL endpoint.
pub const ENDPOINT_ENV: &str = "GHG_GRAPHQL_URL";

/// Token variables, in priority order.
pub const TOKEN_ENVS: [&str; 2] = ["GHI_TOKEN", "GITHUB_TOKEN"];

/// Default git remote used to detect the repository.
pub const DEFAULT_REMOTE: &str = "origin";

/// Resolve the database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag)
/// 2. `GHG_DB` environment variable
/// 3. `<git-dir>/ghg.db` of the current checkout
/// 4. `<data-dir>/<owner>-<name>.db` for the given repository
///
/// # Errors
///
/// Returns [`Error::Config`] when none of the above applies.
pub fn resolve_db_path(explicit_path: Option<&Path>, repo: Option<&RepoIdentity>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().ok();
    pick_db_path(
        explicit_path,
        env_nonempty(DB_ENV),
        cwd.as_deref().and_then(git_dir),
        repo,
    )
}

fn pick_db_path(
    explicit_path: Option<&Path>,
    env_path: Option<String>,
    git_dir: Option<PathBuf>,
    repo: Option<&RepoIdentity>,
) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = env_path {
        return Ok(PathBuf::from(path));
    }

    if let Some(dir) = git_dir {
        return Ok(dir.join(DB_FILE_NAME));
    }

    if let (Some(repo), Some(data_dir)) = (repo, global_data_dir()) {
        return Ok(data_dir.join(format!("{}-{}.db", repo.owner, repo.name)));
    }

    Err(Error::Config(
        "cannot determine database location: not in a git checkout; pass --db or set GHG_DB"
            .to_string(),
    ))
}

/// Resolve the repository to mirror.
///
/// An explicit `owner/name` wins; otherwise the URL of `remote` in the
/// current checkout is parsed.
///
/// # Errors
///
/// Returns [`Error::Identity`] if neither source yields a GitHub repository.
pub fn resolve_repo(explicit: Option<&str>, remote: Option<&str>) -> Result<RepoIdentity> {
    if let Some(repo) = explicit {
        return repo.parse();
    }

    let cwd = std::env::current_dir()?;
    RepoIdentity::from_git_remote(&cwd, remote.unwrap_or(DEFAULT_REMOTE))
}

/// Resolve the GitHub access token.
///
/// `GHI_TOKEN` first, then `GITHUB_TOKEN`. `None` means anonymous requests.
#[must_use]
pub fn resolve_token() -> Option<String> {
    TOKEN_ENVS.iter().find_map(|name| env_nonempty(name))
}

/// Resolve the GraphQL endpoint: `GHG_GRAPHQL_URL` or the public API.
#[must_use]
pub fn resolve_endpoint() -> String {
    env_nonempty(ENDPOINT_ENV).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

/// Platform data directory for mirrors outside a git checkout.
#[must_use]
pub fn global_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ghg").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Absolute git directory of the checkout containing `dir`.
fn git_dir(dir: &Path) -> Option<PathBuf> {
    std::process::Command::new("git")
        .args(["rev-parse", "--absolute-git-dir"])
        .current_dir(dir)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| PathBuf::from(String::from_utf8_lossy(&o.stdout).trim().to_string()))
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
