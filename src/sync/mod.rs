//! Incremental sync from the remote into the local mirror.
//!
//! # Architecture
//!
//! A pass reads the cutoff (the newest `updated_at` already stored), then
//! pages through the remote newest-first inside one write transaction:
//! 1. Issues updated after the cutoff are upserted
//! 2. The first issue at or before the cutoff ends pagination
//! 3. If anything changed, the full-text index is rebuilt, then the
//!    transaction commits
//!
//! Repeated syncs therefore fetch about `new / page_size + 1` pages. A failed
//! pass commits nothing and is simply run again.
//!
//! # Example
//!
//! ```ignore
//! use ghg::sync::{Syncer, SyncOptions};
//!
//! let mut syncer = Syncer::new(source, SyncOptions::default());
//! let stats = runtime.block_on(syncer.run(&mut store, &mut ()))?;
//! println!("{} issues synced", stats.synced);
//! ```

mod engine;
mod progress;
mod types;

pub use engine::Syncer;
pub use progress::{SyncProgress, SyncProgressCallback};
pub use types::{SyncMode, SyncOptions, SyncState, SyncStats};
