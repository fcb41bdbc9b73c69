//! Repository identity: which GitHub repository a mirror belongs to.

use std::fmt;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};

/// Matches HTTPS, scp-like SSH and `ssh://` GitHub remotes, with or without `.git`.
static REMOTE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"github\.com[/:]([^/]+)/([^/]+?)(?:\.git)?/?$").ok());

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RepoIdentity {
    pub owner: String,
    pub name: String,
}

impl RepoIdentity {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Extract the repository from a GitHub remote URL.
    ///
    /// Returns `None` for non-GitHub remotes.
    #[must_use]
    pub fn parse_remote_url(url: &str) -> Option<Self> {
        let re = REMOTE_RE.as_ref()?;
        let caps = re.captures(url.trim())?;
        let owner = caps.get(1)?.as_str();
        let name = caps.get(2)?.as_str();
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(owner, name))
    }

    /// Read the URL of `remote` in the git checkout at `dir` and parse it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Identity`] if git fails, the remote does not exist,
    /// or its URL does not point at GitHub.
    pub fn from_git_remote(dir: &Path, remote: &str) -> Result<Self> {
        let output = Command::new("git")
            .args(["remote", "get-url", remote])
            .current_dir(dir)
            .output()
            .map_err(|e| Error::Identity(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Identity(format!(
                "unable to read remote '{remote}' in {}: {}",
                dir.display(),
                stderr.trim()
            )));
        }

        let url = String::from_utf8_lossy(&output.stdout);
        let url = url.trim();
        Self::parse_remote_url(url).ok_or_else(|| {
            Error::Identity(format!(
                "remote '{remote}' ({url}) is not a GitHub repository"
            ))
        })
    }
}

impl FromStr for RepoIdentity {
    type Err = Error;

    /// Parse `owner/name`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self::new(owner, name))
            }
            _ => Err(Error::Identity(format!(
                "expected owner/name, got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
