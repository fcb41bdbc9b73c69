//! Sync command implementation.

use std::io::IsTerminal;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::warn;

use super::Globals;
use crate::cli::SyncArgs;
use crate::config::{RepoIdentity, resolve_endpoint, resolve_token};
use crate::error::{Error, Result};
use crate::remote::GitHubSource;
use crate::storage::IssueStore;
use crate::sync::{SyncMode, SyncOptions, SyncStats, Syncer};

#[derive(Serialize)]
struct SyncOutput<'a> {
    repository: String,
    database: String,
    #[serde(flatten)]
    stats: &'a SyncStats,
    total: usize,
}

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if the repository or database cannot be resolved, or
/// the pass fails. A failed pass commits nothing.
pub fn execute(args: &SyncArgs, globals: &Globals<'_>) -> Result<()> {
    let repo = globals.require_repo()?;
    let (db_path, mut store) = globals.open_store(Some(&repo))?;

    let options = SyncOptions {
        page_size: args.page_size,
        mode: SyncMode::from_flags(args.rebuild, args.full_scan),
    };
    let stats = run_sync(&mut store, &repo, token_or_warn(), options, globals)?;
    let total = store.count()?;

    if globals.json {
        let output = SyncOutput {
            repository: repo.to_string(),
            database: db_path.display().to_string(),
            stats: &stats,
            total,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if !globals.quiet {
        let changed = if stats.is_empty() {
            "up to date".dimmed().to_string()
        } else {
            format!("{} issues synced", stats.synced).green().to_string()
        };
        println!(
            "{} {changed} ({total} mirrored, {} pages fetched)",
            repo.to_string().bold(),
            stats.pages_fetched
        );
        if stats.order_violations > 0 {
            println!(
                "{} remote returned {} issues out of order; consider `ghg sync --full-scan`",
                "warning:".yellow().bold(),
                stats.order_violations
            );
        }
    }

    Ok(())
}

/// The configured GitHub token, warning once when there is none.
pub(crate) fn token_or_warn() -> Option<String> {
    let token = resolve_token();
    if token.is_none() {
        warn!("No GitHub token in GHI_TOKEN or GITHUB_TOKEN; requests are anonymous");
    }
    token
}

/// Run one pass against GitHub, with a progress bar on interactive stderr.
///
/// Shared by `sync` and the first-run sync of `search`.
pub(crate) fn run_sync(
    store: &mut IssueStore,
    repo: &RepoIdentity,
    token: Option<String>,
    options: SyncOptions,
    globals: &Globals<'_>,
) -> Result<SyncStats> {
    let source = GitHubSource::new(repo.clone(), token)?.with_endpoint(resolve_endpoint());
    let mut syncer = Syncer::new(source, options);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    let interactive = !globals.json && !globals.quiet && std::io::stderr().is_terminal();
    if !interactive {
        return rt.block_on(syncer.run(store, &mut ()));
    }

    let mut bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}/{len}")
    {
        bar.set_style(style.progress_chars("█▓░"));
    }
    bar.set_prefix(format!("Syncing {repo}"));

    let result = rt.block_on(syncer.run(store, &mut bar));
    bar.finish_and_clear();
    result
}
