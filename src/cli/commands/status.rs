//! Status command implementation.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use super::Globals;
use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    repository: Option<String>,
    database: String,
    schema_version: i32,
    issues: usize,
    indexed: usize,
    /// Newest `updated_at` in the mirror; `None` when empty.
    cutoff: Option<DateTime<Utc>>,
    fingerprint: String,
}

/// Execute the status command.
///
/// # Errors
///
/// Returns an error if the database cannot be resolved or read.
pub fn execute(globals: &Globals<'_>) -> Result<()> {
    let repo = globals.detect_repo()?;
    let (db_path, store) = globals.open_store(repo.as_ref())?;

    let issues = store.count()?;
    let output = StatusOutput {
        repository: repo.map(|r| r.to_string()),
        database: db_path.display().to_string(),
        schema_version: CURRENT_SCHEMA_VERSION,
        issues,
        indexed: store.index_count()?,
        cutoff: (issues > 0).then(|| store.current_cutoff()).transpose()?,
        fingerprint: store.fingerprint()?,
    };

    if globals.json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "ghg status".bold());
    println!();
    if let Some(repo) = &output.repository {
        println!("Repository:  {repo}");
    }
    println!("Database:    {}", output.database);
    println!("Issues:      {}", output.issues);
    if output.indexed == output.issues {
        println!("Indexed:     {}", output.indexed);
    } else {
        println!(
            "Indexed:     {} {}",
            output.indexed,
            "(out of date, run `ghg sync`)".yellow()
        );
    }
    match output.cutoff {
        Some(cutoff) => println!("Last update: {}", cutoff.to_rfc3339()),
        None => {
            println!("Last update: {}", "never synced".dimmed());
            println!();
            println!("Populate the mirror with: ghg sync");
        }
    }
    let short = output.fingerprint.get(..12).unwrap_or(&output.fingerprint);
    println!("Fingerprint: {short}");

    Ok(())
}
