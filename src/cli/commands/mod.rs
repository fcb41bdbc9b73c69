//! Command implementations.

pub mod completions;
pub mod search;
pub mod show;
pub mod status;
pub mod sync;
pub mod version;

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{RepoIdentity, resolve_db_path, resolve_repo};
use crate::error::Result;
use crate::storage::IssueStore;

/// Global flags every mirror command needs.
#[derive(Debug, Clone, Copy)]
pub struct Globals<'a> {
    pub db: Option<&'a Path>,
    pub repo: Option<&'a str>,
    pub remote: &'a str,
    pub json: bool,
    pub quiet: bool,
}

impl<'a> From<&'a Cli> for Globals<'a> {
    fn from(cli: &'a Cli) -> Self {
        Self {
            db: cli.db.as_deref(),
            repo: cli.repo.as_deref(),
            remote: &cli.remote,
            json: cli.json,
            quiet: cli.quiet,
        }
    }
}

impl Globals<'_> {
    /// The repository to mirror. Fails if it cannot be determined.
    ///
    /// # Errors
    ///
    /// Returns an identity error if neither `--repo` nor the git remote yields one.
    pub fn require_repo(&self) -> Result<RepoIdentity> {
        resolve_repo(self.repo, Some(self.remote))
    }

    /// The repository if one can be determined. A malformed `--repo` is still an error.
    ///
    /// # Errors
    ///
    /// Returns an identity error only for an explicit, malformed `--repo`.
    pub fn detect_repo(&self) -> Result<Option<RepoIdentity>> {
        match self.repo {
            Some(_) => self.require_repo().map(Some),
            None => Ok(self.require_repo().ok()),
        }
    }

    /// Where the mirror for `repo` lives, without touching it.
    ///
    /// # Errors
    ///
    /// Returns a config error if no location can be resolved.
    pub fn db_path(&self, repo: Option<&RepoIdentity>) -> Result<PathBuf> {
        resolve_db_path(self.db, repo)
    }

    /// Resolve the database path and open the store.
    ///
    /// # Errors
    ///
    /// Returns an error if no location can be resolved or the store cannot be opened.
    pub fn open_store(&self, repo: Option<&RepoIdentity>) -> Result<(PathBuf, IssueStore)> {
        let path = self.db_path(repo)?;
        let store = IssueStore::open(&path)?;
        Ok((path, store))
    }
}
