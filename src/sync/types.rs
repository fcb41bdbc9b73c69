//! Sync pass configuration, state and statistics.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::remote::MAX_PAGE_SIZE;

/// How a sync pass chooses its cutoff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Fetch only issues updated after the newest stored one.
    #[default]
    Incremental,
    /// Drop everything and refetch from scratch.
    Rebuild,
    /// Refetch and replace every issue without dropping anything.
    ///
    /// Use when the remote may have violated newest-first ordering.
    FullScan,
}

impl SyncMode {
    /// Pick a mode from command-line flags. `rebuild` wins over `full_scan`.
    #[must_use]
    pub const fn from_flags(rebuild: bool, full_scan: bool) -> Self {
        if rebuild {
            Self::Rebuild
        } else if full_scan {
            Self::FullScan
        } else {
            Self::Incremental
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Incremental => "incremental",
            Self::Rebuild => "rebuild",
            Self::FullScan => "full_scan",
        })
    }
}

/// Options for a [`crate::sync::Syncer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Issues per page, clamped to `1..=MAX_PAGE_SIZE`.
    pub page_size: u32,
    pub mode: SyncMode,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            mode: SyncMode::Incremental,
        }
    }
}

/// Lifecycle of one sync pass.
///
/// `Init → Paging → Finalizing → Done`; any error moves to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Init,
    Paging,
    Finalizing,
    Done,
    Failed,
}

impl SyncState {
    /// Whether the pass has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Statistics from a successful sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub mode: SyncMode,
    /// Newest `updated_at` stored before the pass (the epoch for rebuilds and full scans).
    pub cutoff: DateTime<Utc>,
    pub pages_fetched: usize,
    /// Issues inspected, including the one that triggered the early stop.
    pub records_seen: usize,
    /// Issues inserted or replaced.
    pub synced: usize,
    /// Remote total as last reported.
    pub remote_total: u64,
    /// Pagination ended at the cutoff rather than at the last page.
    pub stopped_early: bool,
    pub index_rebuilt: bool,
    /// Issues that arrived newer than their predecessor.
    pub order_violations: usize,
}

impl SyncStats {
    /// Returns true if the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.synced == 0
    }
}
