//! ghg - offline mirror and full-text search for GitHub issues
//!
//! This crate provides the core functionality for the `ghg` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Issue records and the flattened document format
//! - [`storage`] - SQLite record store with an FTS5 index
//! - [`remote`] - Paginated issue sources (GitHub GraphQL)
//! - [`sync`] - Incremental, transactional sync engine
//! - [`search`] - Ranked full-text search with highlighted excerpts
//! - [`config`] - Database path, repository identity and token resolution
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod search;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
