//! The sync pass.
//!
//! One pass is one write transaction. Pages are fetched newest-first and
//! every issue updated strictly after the cutoff is upserted; the first issue
//! at or before the cutoff ends pagination, because everything after it is
//! older still. If anything changed, the full-text index is regenerated from
//! scratch just before commit. Any error drops the transaction, so the store
//! is exactly as it was before the pass.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::progress::{SyncProgress, SyncProgressCallback};
use super::types::{SyncMode, SyncOptions, SyncState, SyncStats};
use crate::error::Result;
use crate::model::IssueRecord;
use crate::remote::{FetchError, IssueSource, PageRequest};
use crate::storage::IssueStore;

/// Drives an [`IssueSource`] into an [`IssueStore`].
pub struct Syncer<S> {
    source: S,
    options: SyncOptions,
    state: SyncState,
}

impl<S: IssueSource> Syncer<S> {
    #[must_use]
    pub fn new(source: S, options: SyncOptions) -> Self {
        Self {
            source,
            options,
            state: SyncState::Init,
        }
    }

    /// Current state of the last (or running) pass.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run one sync pass.
    ///
    /// # Errors
    ///
    /// Returns the first fetch or storage error. Nothing is committed in
    /// that case and the syncer is left in [`SyncState::Failed`].
    pub async fn run(
        &mut self,
        store: &mut IssueStore,
        progress: &mut dyn SyncProgressCallback,
    ) -> Result<SyncStats> {
        self.state = SyncState::Init;

        match self.pass(store, progress).await {
            Ok(stats) => {
                self.state = SyncState::Done;
                info!(
                    mode = %stats.mode,
                    synced = stats.synced,
                    pages = stats.pages_fetched,
                    stopped_early = stats.stopped_early,
                    "Sync complete"
                );
                Ok(stats)
            }
            Err(err) => {
                let failed_in = self.state;
                self.state = SyncState::Failed;
                warn!(error = %err, state = ?failed_in, "Sync failed; nothing was committed");
                Err(err)
            }
        }
    }

    async fn pass(
        &mut self,
        store: &mut IssueStore,
        progress: &mut dyn SyncProgressCallback,
    ) -> Result<SyncStats> {
        let mode = self.options.mode;

        // Init
        store.ensure_schema(false)?;
        let batch = store.begin_batch()?;
        if mode == SyncMode::Rebuild {
            batch.reset_schema()?;
        }
        let cutoff = match mode {
            SyncMode::Incremental => batch.current_cutoff()?,
            SyncMode::Rebuild | SyncMode::FullScan => DateTime::<Utc>::default(),
        };
        debug!(%mode, %cutoff, "Sync pass started");

        let mut stats = SyncStats {
            mode,
            cutoff,
            ..SyncStats::default()
        };

        // Paging
        self.state = SyncState::Paging;
        let mut request = PageRequest::first(self.options.page_size);
        let mut previous: Option<DateTime<Utc>> = None;
        let mut processed: u64 = 0;

        loop {
            let page = self.source.fetch_page(&request).await?;
            stats.pages_fetched += 1;
            stats.remote_total = page.total_count;
            debug!(
                page = stats.pages_fetched,
                issues = page.issues.len(),
                has_more = page.has_more,
                "Processing page"
            );

            for raw in page.issues {
                stats.records_seen += 1;

                if previous.is_some_and(|prev| raw.updated_at > prev) {
                    stats.order_violations += 1;
                    warn!(
                        number = raw.number,
                        updated_at = %raw.updated_at,
                        "Remote returned issues out of order; run `ghg sync --full-scan` if results look stale"
                    );
                }
                previous = Some(raw.updated_at);

                if raw.updated_at <= cutoff {
                    stats.stopped_early = true;
                    break;
                }

                let record = IssueRecord::from_raw(raw);
                debug!(number = record.number, updated_at = %record.updated_at, "Upserting issue");
                batch.upsert(&record)?;
                stats.synced += 1;
                processed += 1;
            }

            let total = stats.remote_total.max(processed);
            if stats.stopped_early {
                progress.progress(SyncProgress {
                    processed: total,
                    total,
                });
                break;
            }
            progress.progress(SyncProgress { processed, total });

            if !page.has_more {
                break;
            }
            let cursor = page.next_cursor.ok_or_else(|| {
                FetchError::Malformed("more pages reported without a cursor".to_string())
            })?;
            request = request.after(cursor);
        }

        // Finalizing
        self.state = SyncState::Finalizing;
        if stats.synced > 0 {
            batch.regenerate_index()?;
            stats.index_rebuilt = true;
        }
        batch.commit()?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{RawComment, RawIssue};
    use crate::remote::{Cursor, Page};
    use crate::search::Searcher;
    use std::sync::Mutex;

    /// In-memory remote serving `issues` in the given order, `cursor` = offset.
    struct FakeSource {
        issues: Vec<RawIssue>,
        fail_on_page: Option<usize>,
        drop_cursor: bool,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl FakeSource {
        /// Serves issues newest-first, as the real remote does.
        fn newest_first(mut issues: Vec<RawIssue>) -> Self {
            issues.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Self::in_order(issues)
        }

        fn in_order(issues: Vec<RawIssue>) -> Self {
            Self {
                issues,
                fail_on_page: None,
                drop_cursor: false,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, page: usize) -> Self {
            self.fail_on_page = Some(page);
            self
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl IssueSource for FakeSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<Page> {
            let page_number = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len()
            };
            if self.fail_on_page == Some(page_number) {
                return Err(FetchError::Status {
                    status: 502,
                    message: "bad gateway".into(),
                }
                .into());
            }

            let start: usize = request
                .cursor
                .as_ref()
                .map_or(0, |c| c.as_str().parse().unwrap());
            let end = (start + request.page_size as usize).min(self.issues.len());
            let has_more = end < self.issues.len();

            Ok(Page {
                issues: self.issues[start..end].to_vec(),
                next_cursor: (has_more && !self.drop_cursor).then(|| Cursor::new(end.to_string())),
                has_more,
                total_count: self.issues.len() as u64,
            })
        }
    }

    fn at(minute: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + minute * 60, 0).unwrap()
    }

    fn raw(number: i64, minute: i64, title: &str, body: &str) -> RawIssue {
        RawIssue {
            id: format!("I_{number}"),
            number,
            updated_at: at(minute),
            url: format!("https://github.com/acme/widgets/issues/{number}"),
            title: title.to_string(),
            body: body.to_string(),
            comments: vec![RawComment {
                body: format!("comment on {number}\nsecond line"),
            }],
        }
    }

    fn options(page_size: u32, mode: SyncMode) -> SyncOptions {
        SyncOptions { page_size, mode }
    }

    async fn sync(store: &mut IssueStore, source: FakeSource, opts: SyncOptions) -> Result<SyncStats> {
        Syncer::new(source, opts).run(store, &mut ()).await
    }

    fn three_issues() -> Vec<RawIssue> {
        vec![
            raw(1, 1, "Gearbox rattles", "noise at speed"),
            raw(2, 2, "Sprocket misaligned", "teeth skip"),
            raw(3, 3, "Chain snaps", "under load"),
        ]
    }

    #[tokio::test]
    async fn test_backfill_into_empty_store() {
        let mut store = IssueStore::open_memory().unwrap();
        let mut syncer = Syncer::new(
            FakeSource::newest_first(three_issues()),
            options(10, SyncMode::Incremental),
        );

        let stats = syncer.run(&mut store, &mut ()).await.unwrap();

        assert_eq!(syncer.state(), SyncState::Done);
        assert_eq!(stats.synced, 3);
        assert_eq!(stats.pages_fetched, 1);
        assert!(stats.index_rebuilt);
        assert!(!stats.stopped_early);
        assert_eq!(stats.cutoff, DateTime::<Utc>::default());
        assert_eq!(store.count().unwrap(), 3);

        let results = Searcher::new(&store).search("sprocket", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].number, 2);
        assert_eq!(results[0].url, "https://github.com/acme/widgets/issues/2");
    }

    #[tokio::test]
    async fn test_comments_are_flattened() {
        let mut store = IssueStore::open_memory().unwrap();
        sync(
            &mut store,
            FakeSource::newest_first(three_issues()),
            SyncOptions::default(),
        )
        .await
        .unwrap();

        let issue = store.issue_by_number(1).unwrap().unwrap();
        assert_eq!(issue.comments, "comment on 1 second line");
    }

    #[tokio::test]
    async fn test_second_sync_is_idempotent() {
        let mut store = IssueStore::open_memory().unwrap();
        sync(&mut store, FakeSource::newest_first(three_issues()), options(2, SyncMode::Incremental))
            .await
            .unwrap();
        let before = store.fingerprint().unwrap();

        let source = FakeSource::newest_first(three_issues());
        let mut syncer = Syncer::new(source, options(2, SyncMode::Incremental));
        let stats = syncer.run(&mut store, &mut ()).await.unwrap();

        assert_eq!(stats.synced, 0);
        assert_eq!(stats.pages_fetched, 1);
        assert!(stats.stopped_early);
        assert!(!stats.index_rebuilt);
        assert_eq!(stats.cutoff, at(3));
        assert_eq!(store.fingerprint().unwrap(), before);
    }

    #[tokio::test]
    async fn test_incremental_fetches_only_newer() {
        let mut store = IssueStore::open_memory().unwrap();
        sync(
            &mut store,
            FakeSource::newest_first(vec![raw(1, 1, "One", "a"), raw(2, 2, "Two", "b"), raw(3, 3, "Three", "c")]),
            SyncOptions::default(),
        )
        .await
        .unwrap();

        // Remote now: #2 edited, #4 and #5 new, #1 and #3 untouched.
        let remote = vec![
            raw(1, 1, "One", "a"),
            raw(2, 7, "Two", "edited body mentions zeppelin"),
            raw(3, 3, "Three", "c"),
            raw(4, 5, "Four", "d"),
            raw(5, 6, "Five", "e"),
        ];
        let source = FakeSource::newest_first(remote);
        let mut syncer = Syncer::new(source, options(2, SyncMode::Incremental));
        let stats = syncer.run(&mut store, &mut ()).await.unwrap();

        // Pages: [#2, #5], [#4, #3] -> stop at #3.
        assert_eq!(stats.synced, 3);
        assert_eq!(stats.pages_fetched, 2);
        assert!(stats.stopped_early);
        assert_eq!(syncer.source.requests().len(), 2);

        assert_eq!(store.count().unwrap(), 5);
        assert_eq!(store.index_count().unwrap(), 5);
        let two = store.issue_by_number(2).unwrap().unwrap();
        assert_eq!(two.updated_at, at(7));
        assert_eq!(two.body, "edited body mentions zeppelin");

        let results = Searcher::new(&store).search("zeppelin", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].number, 2);
    }

    #[tokio::test]
    async fn test_updated_issue_replaces_old_version() {
        let mut store = IssueStore::open_memory().unwrap();
        sync(&mut store, FakeSource::newest_first(vec![raw(7, 2, "Seven", "old text")]), SyncOptions::default())
            .await
            .unwrap();

        sync(
            &mut store,
            FakeSource::newest_first(vec![raw(7, 4, "Seven", "now with quasar")]),
            SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let results = Searcher::new(&store).search("quasar", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].number, 7);
        assert!(Searcher::new(&store).search("old", 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebuild_matches_fresh_sync() {
        let mut stale = IssueStore::open_memory().unwrap();
        sync(
            &mut stale,
            FakeSource::newest_first(vec![raw(9, 1, "Deleted upstream", "gone"), raw(1, 2, "One", "x")]),
            SyncOptions::default(),
        )
        .await
        .unwrap();

        let remote = || FakeSource::newest_first(three_issues());

        let mut syncer = Syncer::new(remote(), options(2, SyncMode::Rebuild));
        let stats = syncer.run(&mut stale, &mut ()).await.unwrap();
        assert_eq!(stats.cutoff, DateTime::<Utc>::default());
        assert_eq!(stats.synced, 3);

        let mut fresh = IssueStore::open_memory().unwrap();
        sync(&mut fresh, remote(), options(2, SyncMode::Incremental)).await.unwrap();

        assert_eq!(stale.count().unwrap(), 3);
        assert!(stale.issue_by_number(9).unwrap().is_none());
        assert_eq!(stale.fingerprint().unwrap(), fresh.fingerprint().unwrap());
    }

    #[tokio::test]
    async fn test_full_scan_refetches_everything_without_dropping() {
        let mut store = IssueStore::open_memory().unwrap();
        sync(
            &mut store,
            FakeSource::newest_first(vec![raw(9, 1, "Kept locally", "k"), raw(1, 2, "One", "x")]),
            SyncOptions::default(),
        )
        .await
        .unwrap();

        let source = FakeSource::newest_first(three_issues());
        let stats = sync(&mut store, source, options(2, SyncMode::FullScan)).await.unwrap();

        assert_eq!(stats.synced, 3);
        assert_eq!(stats.pages_fetched, 2);
        assert!(!stats.stopped_early);
        assert_eq!(store.count().unwrap(), 4);
        assert!(store.issue_by_number(9).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failure_on_later_page_commits_nothing() {
        let mut store = IssueStore::open_memory().unwrap();
        sync(&mut store, FakeSource::newest_first(vec![raw(1, 1, "One", "x")]), SyncOptions::default())
            .await
            .unwrap();
        let before = store.fingerprint().unwrap();

        let remote = vec![
            raw(1, 1, "One", "x"),
            raw(2, 2, "Two", "y"),
            raw(3, 3, "Three", "z"),
            raw(4, 4, "Four", "w"),
        ];
        let source = FakeSource::newest_first(remote).failing_on(2);
        let mut syncer = Syncer::new(source, options(2, SyncMode::Incremental));
        let err = syncer.run(&mut store, &mut ()).await.unwrap_err();

        assert!(matches!(err, Error::Fetch(FetchError::Status { status: 502, .. })));
        assert_eq!(syncer.state(), SyncState::Failed);
        assert_eq!(store.fingerprint().unwrap(), before);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_rebuild_keeps_previous_mirror() {
        let mut store = IssueStore::open_memory().unwrap();
        sync(&mut store, FakeSource::newest_first(three_issues()), SyncOptions::default())
            .await
            .unwrap();
        let before = store.fingerprint().unwrap();

        let source = FakeSource::newest_first(three_issues()).failing_on(1);
        let err = sync(&mut store, source, options(2, SyncMode::Rebuild)).await;

        assert!(err.is_err());
        assert_eq!(store.fingerprint().unwrap(), before);
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(Searcher::new(&store).search("gearbox", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_cursor_is_malformed() {
        let mut store = IssueStore::open_memory().unwrap();
        let mut source = FakeSource::newest_first(three_issues());
        source.drop_cursor = true;

        let err = sync(&mut store, source, options(2, SyncMode::Incremental)).await.unwrap_err();

        assert!(matches!(err, Error::Fetch(FetchError::Malformed(_))));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_index_reflects_every_record() {
        let mut store = IssueStore::open_memory().unwrap();
        let issues: Vec<RawIssue> = (1..=25)
            .map(|n| raw(n, n, &format!("uniqtoken{n}"), "body"))
            .collect();
        sync(&mut store, FakeSource::newest_first(issues), options(10, SyncMode::Incremental))
            .await
            .unwrap();

        assert_eq!(store.count().unwrap(), 25);
        assert_eq!(store.index_count().unwrap(), 25);
        let searcher = Searcher::new(&store);
        for n in 1..=25 {
            let results = searcher.search(&format!("uniqtoken{n}"), 5).unwrap();
            assert_eq!(results.len(), 1, "issue {n}");
            assert_eq!(results[0].number, n);
        }
    }

    #[tokio::test]
    async fn test_progress_reaches_total_on_early_stop() {
        let mut store = IssueStore::open_memory().unwrap();
        let old: Vec<RawIssue> = (1..=5).map(|n| raw(n, n, "old", "x")).collect();
        sync(&mut store, FakeSource::newest_first(old.clone()), SyncOptions::default())
            .await
            .unwrap();

        let mut remote = old;
        remote.push(raw(6, 10, "new", "y"));
        let mut events = Vec::new();
        let mut syncer = Syncer::new(FakeSource::newest_first(remote), options(3, SyncMode::Incremental));
        let mut callback = |p: SyncProgress| events.push(p);
        syncer.run(&mut store, &mut callback).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0], SyncProgress { processed: 6, total: 6 });
    }

    #[tokio::test]
    async fn test_progress_per_page_on_backfill() {
        let mut store = IssueStore::open_memory().unwrap();
        let issues: Vec<RawIssue> = (1..=5).map(|n| raw(n, n, "t", "b")).collect();
        let mut events = Vec::new();
        let mut syncer = Syncer::new(FakeSource::newest_first(issues), options(2, SyncMode::Incremental));
        let mut callback = |p: SyncProgress| events.push(p);
        syncer.run(&mut store, &mut callback).await.unwrap();

        let processed: Vec<u64> = events.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![2, 4, 5]);
        assert!(events.iter().all(|p| p.total == 5));
    }

    #[tokio::test]
    async fn test_order_violation_is_counted_and_tolerated() {
        let mut store = IssueStore::open_memory().unwrap();
        // #2 arrives after #1 although it is newer.
        let source = FakeSource::in_order(vec![
            raw(3, 3, "Three", "c"),
            raw(1, 1, "One", "a"),
            raw(2, 2, "Two", "b"),
        ]);
        let stats = sync(&mut store, source, options(10, SyncMode::Incremental)).await.unwrap();

        assert_eq!(stats.order_violations, 1);
        assert_eq!(stats.synced, 3);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_page_size_is_clamped() {
        let mut store = IssueStore::open_memory().unwrap();
        let source = FakeSource::newest_first(three_issues());
        let mut syncer = Syncer::new(source, options(500, SyncMode::Incremental));
        syncer.run(&mut store, &mut ()).await.unwrap();

        let requests = syncer.source.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].page_size, 100);
        assert!(requests[0].cursor.is_none());
    }

    #[tokio::test]
    async fn test_empty_remote() {
        let mut store = IssueStore::open_memory().unwrap();
        let stats = sync(&mut store, FakeSource::in_order(Vec::new()), SyncOptions::default())
            .await
            .unwrap();

        assert!(stats.is_empty());
        assert!(!stats.index_rebuilt);
        assert_eq!(store.count().unwrap(), 0);
        assert!(Searcher::new(&store).search("anything", 10).unwrap().is_empty());
    }
}
