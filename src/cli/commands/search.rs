//! Search command implementation.

use std::io::IsTerminal;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use super::Globals;
use super::sync::{run_sync, token_or_warn};
use crate::cli::SearchArgs;
use crate::config::RepoIdentity;
use crate::error::Result;
use crate::search::{MATCH_END, MATCH_START, SearchResult, Searcher};
use crate::storage::IssueStore;
use crate::sync::SyncOptions;

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    count: usize,
    results: &'a [SearchResult],
}

/// Execute the search command.
///
/// When stdout is not a terminal (or with `--numbers`) only issue numbers
/// are printed, one per line. An interactive search against an empty
/// mirror syncs it first.
///
/// # Errors
///
/// Returns an error if the query is malformed, the store cannot be read,
/// or the first-run sync fails.
pub fn execute(args: &SearchArgs, globals: &Globals<'_>) -> Result<()> {
    let query = args.query();
    let token = token_or_warn();
    let stdout_tty = std::io::stdout().is_terminal();
    let numbers_only = args.numbers || (!globals.json && !stdout_tty);
    let may_sync = !args.numbers && stdout_tty;

    let mut repo = globals.detect_repo()?;
    let db_path = globals.db_path(repo.as_ref())?;
    if may_sync {
        repo = repo_for_first_sync(globals, repo, &db_path)?;
    }
    let mut store = IssueStore::open(&db_path)?;

    if may_sync && store.count()? == 0 {
        let repo = match repo {
            Some(repo) => repo,
            None => globals.require_repo()?,
        };
        if !globals.quiet && !globals.json {
            eprintln!("Mirror is empty; syncing {repo} first");
        }
        run_sync(&mut store, &repo, token, SyncOptions::default(), globals)?;
    }

    let results = Searcher::new(&store).search(&query, args.limit)?;

    if globals.json {
        let output = SearchOutput {
            query: &query,
            count: results.len(),
            results: &results,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if numbers_only {
        for result in &results {
            println!("{}", result.number);
        }
    } else if results.is_empty() {
        if !globals.quiet {
            println!("{}", format!("No matches for '{query}'").dimmed());
        }
    } else {
        for result in &results {
            print_result(result);
        }
    }

    Ok(())
}

/// A mirror that does not exist yet will be synced, so its repository must
/// resolve before the database file is created.
fn repo_for_first_sync(
    globals: &Globals<'_>,
    repo: Option<RepoIdentity>,
    db_path: &Path,
) -> Result<Option<RepoIdentity>> {
    match repo {
        Some(repo) => Ok(Some(repo)),
        None if !db_path.exists() => globals.require_repo().map(Some),
        None => Ok(None),
    }
}

fn print_result(result: &SearchResult) {
    println!(
        "{} {}",
        format!("#{}", result.number).cyan().bold(),
        result.title.bold()
    );
    let excerpt = highlight(&result.excerpt.replace('\n', " "));
    if !excerpt.trim().is_empty() {
        println!("    {excerpt}");
    }
    println!("    {}", result.url.dimmed());
    println!();
}

/// Replace match markers with bold text.
fn highlight(excerpt: &str) -> String {
    let mut out = String::with_capacity(excerpt.len());
    let mut rest = excerpt;

    while let Some(start) = rest.find(MATCH_START) {
        out.push_str(&rest[..start]);
        let after = &rest[start + MATCH_START.len()..];
        if let Some(end) = after.find(MATCH_END) {
            out.push_str(&after[..end].bold().to_string());
            rest = &after[end + MATCH_END.len()..];
        } else {
            out.push_str(after);
            rest = "";
        }
    }
    out.push_str(rest);
    out
}
