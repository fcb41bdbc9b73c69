//! Show command implementation.

use colored::Colorize;

use super::Globals;
use crate::error::{Error, Result};

/// Print one mirrored issue: its url, then the flattened title, body and comments.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the number is not in the mirror.
pub fn execute(number: i64, globals: &Globals<'_>) -> Result<()> {
    let repo = globals.detect_repo()?;
    let (_, store) = globals.open_store(repo.as_ref())?;

    let issue = store
        .issue_by_number(number)?
        .ok_or(Error::NotFound { number })?;

    if globals.json {
        println!("{}", serde_json::to_string(&issue)?);
        return Ok(());
    }

    println!(
        "{} {}",
        format!("#{}", issue.number).cyan().bold(),
        issue.title.bold()
    );
    println!("{}", issue.url.dimmed());
    println!(
        "{}",
        format!("updated {}", issue.updated_at.format("%Y-%m-%d %H:%M UTC")).dimmed()
    );
    println!();
    println!("{}", issue.document());

    Ok(())
}
