//! SQLite storage layer for ghg.
//!
//! This module provides the record store:
//! - `issues`: one row per mirrored issue, keyed by the remote id
//! - `issues_fts`: FTS5 index derived from `issues`, regenerated wholesale
//! - WAL mode so searches read a committed snapshot during a sync
//!
//! # Submodules
//!
//! - [`schema`] - Schema definitions and index regeneration
//! - [`sqlite`] - `IssueStore` and the `SyncBatch` transaction

pub mod schema;
pub mod sqlite;

pub use sqlite::{IssueStore, SyncBatch};
