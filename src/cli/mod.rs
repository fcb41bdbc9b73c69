//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_REMOTE;
use crate::remote::MAX_PAGE_SIZE;
use crate::search::DEFAULT_LIMIT;

pub mod commands;

/// ghg - offline mirror and full-text search for GitHub issues
#[derive(Parser, Debug)]
#[command(name = "ghg", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: .git/ghg.db of the current checkout, or GHG_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Repository to mirror as owner/name (default: detected from the git remote)
    #[arg(long, global = true, env = "GHG_REPO")]
    pub repo: Option<String>,

    /// Git remote used to detect the repository
    #[arg(long, global = true, default_value = DEFAULT_REMOTE)]
    pub remote: String,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch new and updated issues into the local mirror
    Sync(SyncArgs),

    /// Full-text search the mirror (SQLite FTS5 query syntax)
    Search(SearchArgs),

    /// Print one mirrored issue
    Show {
        /// Issue number
        number: i64,
    },

    /// Show mirror statistics
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Drop the mirror and refetch everything
    #[arg(long)]
    pub rebuild: bool,

    /// Refetch and replace every issue without dropping the mirror
    #[arg(long, conflicts_with = "rebuild")]
    pub full_scan: bool,

    /// Issues per request (1-100)
    #[arg(long, default_value_t = MAX_PAGE_SIZE)]
    pub page_size: u32,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Query terms, joined with spaces
    #[arg(required = true, num_args = 1..)]
    pub terms: Vec<String>,

    /// Maximum number of results
    #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    /// Print issue numbers only (default when stdout is not a terminal)
    #[arg(long)]
    pub numbers: bool,
}

impl SearchArgs {
    /// The FTS5 query expression.
    #[must_use]
    pub fn query(&self) -> String {
        self.terms.join(" ")
    }
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
