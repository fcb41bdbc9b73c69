//! Progress reporting for sync passes.

use indicatif::ProgressBar;

/// A progress event: issues processed so far out of the remote total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub processed: u64,
    pub total: u64,
}

/// Observer for sync progress. The engine emits one event per page.
pub trait SyncProgressCallback: Send {
    fn progress(&mut self, progress: SyncProgress);
}

impl<F: FnMut(SyncProgress) + Send> SyncProgressCallback for F {
    fn progress(&mut self, progress: SyncProgress) {
        self(progress);
    }
}

impl SyncProgressCallback for () {
    fn progress(&mut self, _progress: SyncProgress) {}
}

impl SyncProgressCallback for ProgressBar {
    fn progress(&mut self, progress: SyncProgress) {
        self.update(|state| {
            state.set_len(progress.total);
            state.set_pos(progress.processed);
        });
    }
}
