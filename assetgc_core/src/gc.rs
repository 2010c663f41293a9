//! Garbage collection of unreferenced assets.

use crate::batch::BatchDeleter;
use crate::config::GcConfig;
use crate::content::Locale;
use crate::eligibility::is_eligible;
use crate::error::Result;
use crate::id::ContentId;
use crate::stop::StopToken;
use crate::store::{BlobStore, ContentStore, LinkIndex, NullProgress, ProgressSink};
use crate::walk::AssetWalker;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cell::Cell;
use std::collections::HashMap;

/// Lifecycle of a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run has started.
    Idle,
    /// A run is in progress.
    Running,
    /// The last run walked the whole tree.
    Completed,
    /// The last run ended early on a stop request.
    Stopped,
}

/// Outcome of one collection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Assets visited, eligible or not.
    pub total: usize,
    /// Assets deleted.
    pub deleted: usize,
    /// Blobs deleted alongside their assets.
    pub blobs_deleted: usize,
    /// Blobs whose delete failed after their asset was removed.
    pub orphaned_blobs: usize,
    /// Batches committed.
    pub flushes: usize,
    /// `Completed` or `Stopped`.
    pub state: RunState,
}

impl RunSummary {
    /// One-line report of the run.
    pub fn message(&self) -> String {
        format!(
            "Removed {} unused blobs in {} total",
            self.deleted, self.total
        )
    }
}

/// Walks a folder tree and deletes assets nothing refers to any more.
///
/// Every asset below the root is checked against the reference index and
/// the retention window. Eligible assets are deleted in batches together
/// with their blobs. A stop request is honoured before the next page fetch;
/// whatever was queued by then is still deleted and the run returns a
/// summary with [`RunState::Stopped`].
pub struct Collector<'a> {
    store: &'a dyn ContentStore,
    links: &'a dyn LinkIndex,
    blobs: &'a dyn BlobStore,
    progress: &'a dyn ProgressSink,
    config: GcConfig,
    stop: StopToken,
    clock: fn() -> DateTime<Utc>,
    state: Cell<RunState>,
}

impl<'a> Collector<'a> {
    /// Create a collector with default settings and no progress output.
    pub fn new(
        store: &'a dyn ContentStore,
        links: &'a dyn LinkIndex,
        blobs: &'a dyn BlobStore,
    ) -> Self {
        Self {
            store,
            links,
            blobs,
            progress: &NullProgress,
            config: GcConfig::default(),
            stop: StopToken::new(),
            clock: Utc::now,
            state: Cell::new(RunState::Idle),
        }
    }

    pub fn with_config(mut self, config: GcConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Use an externally owned stop token.
    pub fn with_stop_token(mut self, stop: StopToken) -> Self {
        self.stop = stop;
        self
    }

    /// Override the time source used for the retention check.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Handle that can stop a run from another thread or a signal handler.
    ///
    /// `Collector` itself is not `Sync`; this token is the cross-thread way
    /// to reach a running collection.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Ask the current run to stop at the next page boundary.
    ///
    /// Usable from the thread that owns the collector, for instance inside a
    /// progress sink. Other threads use [`Collector::stop_token`].
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state.get()
    }

    /// Run one collection over the tree below `root`.
    ///
    /// Clears any earlier stop request before starting. Store, index and
    /// blob-lookup failures abort the run and are returned as-is; assets
    /// already deleted stay deleted.
    pub fn execute(&self, root: &ContentId, locale: &Locale) -> Result<RunSummary> {
        self.config.validate()?;
        self.stop.reset();
        self.state.set(RunState::Running);

        let result = self.run(root, locale);
        self.state.set(match &result {
            Ok(summary) => summary.state,
            Err(_) => RunState::Idle,
        });
        result
    }

    fn run(&self, root: &ContentId, locale: &Locale) -> Result<RunSummary> {
        let now = (self.clock)();
        tracing::info!(
            root = %root,
            locale = %locale,
            retention_days = self.config.retention.num_days(),
            batch_size = self.config.batch_size,
            "Collecting unused assets"
        );

        let mut deleter = BatchDeleter::new(
            self.store,
            self.links,
            self.blobs,
            self.progress,
            self.config.batch_size,
        );
        let mut walker = AssetWalker::new(
            self.store,
            *root,
            locale.clone(),
            self.config.page_size,
            self.stop.clone(),
        );

        // Parent of every queued asset, needed to rewind the open listing.
        let mut queued: HashMap<ContentId, ContentId> = HashMap::new();
        let mut total = 0;
        while let Some(asset) = walker.next() {
            let asset = asset?;
            total += 1;

            if !is_eligible(self.store, &asset, now, self.config.retention)? {
                continue;
            }

            tracing::debug!(id = %asset.id, name = %asset.name, "Asset is unused");
            deleter.add(&asset.id);
            queued.insert(asset.id.without_version(), asset.parent);

            if deleter.maybe_flush()? {
                for id in deleter.take_deleted() {
                    if let Some(parent) = queued.get(&id) {
                        walker.children_removed(parent, 1);
                    }
                }
                queued.clear();
            }
        }

        deleter.flush_remaining()?;

        let stats = deleter.stats();
        let summary = RunSummary {
            total,
            deleted: stats.deleted,
            blobs_deleted: stats.blobs_deleted,
            orphaned_blobs: stats.orphaned_blobs,
            flushes: stats.flushes,
            state: if self.stop.is_stopped() {
                RunState::Stopped
            } else {
                RunState::Completed
            },
        };

        self.progress.report(&summary.message());
        tracing::info!(
            total = summary.total,
            deleted = summary.deleted,
            orphaned_blobs = summary.orphaned_blobs,
            state = ?summary.state,
            "Collection finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentItem, ContentKind};
    use crate::error::Error;
    use crate::memory::MemoryStore;
    use chrono::TimeDelta;
    use std::cell::RefCell;
    use std::collections::HashSet;

    fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - TimeDelta::days(days)
    }

    #[test]
    fn test_collect_empty_store() {
        let store = MemoryStore::new();
        let collector = Collector::new(&store, &store, &store);
        assert_eq!(collector.state(), RunState::Idle);

        let summary = collector
            .execute(&store.root_folder(), &Locale::invariant())
            .unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.deleted, 0);
        assert_eq!(summary.flushes, 0);
        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(collector.state(), RunState::Completed);
    }

    #[test]
    fn test_collect_two_folders_by_age() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        let mut old = Vec::new();
        let mut young = Vec::new();
        for name in ["a", "b"] {
            let folder = store.create_folder(&root, name).unwrap();
            old.push(store.add_asset(&folder, "old.png", days_ago(40)).unwrap());
            young.push(store.add_asset(&folder, "new.png", days_ago(5)).unwrap());
        }

        let lines = RefCell::new(Vec::new());
        let sink = |message: &str| lines.borrow_mut().push(message.to_string());
        let collector = Collector::new(&store, &store, &store).with_progress(&sink);
        let summary = collector.execute(&root, &Locale::invariant()).unwrap();

        assert_eq!(summary.total, 4);
        assert_eq!(summary.deleted, 2);
        assert_eq!(summary.message(), "Removed 2 unused blobs in 4 total");
        assert!(old.iter().all(|id| !store.contains(id) && !store.blob_exists(id)));
        assert!(young.iter().all(|id| store.contains(id) && store.blob_exists(id)));
        assert_eq!(
            lines.borrow().last().map(String::as_str),
            Some("Removed 2 unused blobs in 4 total")
        );
        assert_eq!(lines.borrow().len(), 3);
    }

    #[test]
    fn test_collect_flushes_in_batches() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        let folder = store.create_folder(&root, "uploads").unwrap();
        for i in 0..120 {
            store
                .add_asset(&folder, &format!("{}.jpg", i), days_ago(40))
                .unwrap();
        }

        let collector = Collector::new(&store, &store, &store);
        let summary = collector.execute(&root, &Locale::invariant()).unwrap();

        assert_eq!(summary.flushes, 3);
        assert_eq!(summary.deleted, 120);
        let sizes: Vec<_> = store.resolutions().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
    }

    #[test]
    fn test_each_id_resolved_exactly_once() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        let mut expected = HashSet::new();
        for f in 0..4 {
            let folder = store.create_folder(&root, &format!("f{}", f)).unwrap();
            for i in 0..9 {
                expected.insert(
                    store
                        .add_asset(&folder, &format!("{}.gif", i), days_ago(60))
                        .unwrap(),
                );
            }
        }

        let config = GcConfig::default().with_batch_size(7).with_page_size(4);
        let collector = Collector::new(&store, &store, &store).with_config(config);
        collector.execute(&root, &Locale::invariant()).unwrap();

        let resolved: Vec<ContentId> = store.resolutions().into_iter().flatten().collect();
        let unique: HashSet<_> = resolved.iter().copied().collect();
        assert_eq!(resolved.len(), unique.len());
        assert_eq!(unique, expected);
    }

    #[test]
    fn test_referenced_asset_is_kept() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        let asset = store.add_asset(&root, "hero.jpg", days_ago(40)).unwrap();
        let page = store.create_folder(&root, "landing").unwrap();
        store.add_reference(&page, &asset).unwrap();

        let collector = Collector::new(&store, &store, &store);
        let summary = collector.execute(&root, &Locale::invariant()).unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(summary.deleted, 0);
        assert!(store.contains(&asset));
        assert!(store.resolutions().is_empty());
    }

    #[test]
    fn test_retention_is_configurable() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        let asset = store.add_asset(&root, "a.png", days_ago(5)).unwrap();

        let config = GcConfig::default().with_retention_days(1);
        let collector = Collector::new(&store, &store, &store).with_config(config);
        let summary = collector.execute(&root, &Locale::invariant()).unwrap();

        assert_eq!(summary.deleted, 1);
        assert!(!store.contains(&asset));
    }

    #[test]
    fn test_fixed_clock() {
        fn long_ago() -> DateTime<Utc> {
            DateTime::UNIX_EPOCH
        }

        let store = MemoryStore::new();
        let root = store.root_folder();
        store.add_asset(&root, "a.png", days_ago(400)).unwrap();

        let collector = Collector::new(&store, &store, &store).with_clock(long_ago);
        let summary = collector.execute(&root, &Locale::invariant()).unwrap();
        assert_eq!(summary.deleted, 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let store = MemoryStore::new();
        let config = GcConfig::default().with_batch_size(0);
        let collector = Collector::new(&store, &store, &store).with_config(config);
        assert!(matches!(
            collector.execute(&store.root_folder(), &Locale::invariant()),
            Err(Error::InvalidConfig { .. })
        ));
    }

    /// Wraps a store and raises the stop flag after a number of page fetches.
    struct StopAfterPages<'s> {
        inner: &'s MemoryStore,
        pages: Cell<usize>,
        limit: usize,
        stop: StopToken,
    }

    impl ContentStore for StopAfterPages<'_> {
        fn children(
            &self,
            parent: &ContentId,
            kind: ContentKind,
            locale: &Locale,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<ContentItem>> {
            self.pages.set(self.pages.get() + 1);
            if self.pages.get() == self.limit {
                self.stop.stop();
            }
            self.inner.children(parent, kind, locale, offset, limit)
        }

        fn reference_count(&self, id: &ContentId) -> Result<usize> {
            self.inner.reference_count(id)
        }

        fn delete_permanently(&self, id: &ContentId) -> Result<()> {
            self.inner.delete_permanently(id)
        }
    }

    #[test]
    fn test_stop_mid_walk_flushes_queued() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        let ids: Vec<_> = (0..10)
            .map(|i| {
                store
                    .add_asset(&root, &format!("{}.png", i), days_ago(40))
                    .unwrap()
            })
            .collect();

        let stop = StopToken::new();
        let stopping = StopAfterPages {
            inner: &store,
            pages: Cell::new(0),
            limit: 3,
            stop: stop.clone(),
        };
        let config = GcConfig::default().with_page_size(2).with_batch_size(50);
        let collector = Collector::new(&stopping, &store, &store)
            .with_config(config)
            .with_stop_token(stop);

        let summary = collector.execute(&root, &Locale::invariant()).unwrap();

        // Folder page, then two asset pages before the stop is observed.
        assert_eq!(summary.state, RunState::Stopped);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.deleted, 4);
        assert_eq!(collector.state(), RunState::Stopped);
        assert!(ids[..4].iter().all(|id| !store.contains(id)));
        assert!(ids[4..].iter().all(|id| store.contains(id)));
    }

    #[test]
    fn test_stop_token_reaches_collector_from_another_thread() {
        let store = MemoryStore::new();
        let collector = Collector::new(&store, &store, &store);

        let token = collector.stop_token();
        std::thread::spawn(move || token.stop()).join().unwrap();
        assert!(collector.stop_token().is_stopped());
    }

    #[test]
    fn test_stale_stop_is_cleared() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        store.add_asset(&root, "a.png", days_ago(40)).unwrap();

        let collector = Collector::new(&store, &store, &store);
        collector.stop();
        let summary = collector.execute(&root, &Locale::invariant()).unwrap();

        assert_eq!(summary.state, RunState::Completed);
        assert_eq!(summary.deleted, 1);
    }

    #[test]
    fn test_orphaned_blobs_reported() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        let asset = store.add_asset(&root, "a.png", days_ago(40)).unwrap();
        store.fail_blob_deletes(true);

        let collector = Collector::new(&store, &store, &store);
        let summary = collector.execute(&root, &Locale::invariant()).unwrap();

        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.orphaned_blobs, 1);
        assert!(!store.contains(&asset));
        assert!(store.blob_exists(&asset));
    }

    struct FailingRefs<'s>(&'s MemoryStore);

    impl ContentStore for FailingRefs<'_> {
        fn children(
            &self,
            parent: &ContentId,
            kind: ContentKind,
            locale: &Locale,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<ContentItem>> {
            self.0.children(parent, kind, locale, offset, limit)
        }

        fn reference_count(&self, _id: &ContentId) -> Result<usize> {
            Err(Error::backend("reference index unavailable"))
        }

        fn delete_permanently(&self, id: &ContentId) -> Result<()> {
            self.0.delete_permanently(id)
        }
    }

    #[test]
    fn test_store_failure_propagates() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        let asset = store.add_asset(&root, "a.png", days_ago(40)).unwrap();

        let failing = FailingRefs(&store);
        let collector = Collector::new(&failing, &store, &store);
        let result = collector.execute(&root, &Locale::invariant());

        assert!(matches!(result, Err(Error::Backend { .. })));
        assert_eq!(collector.state(), RunState::Idle);
        assert!(store.contains(&asset));
    }

    #[test]
    fn test_flush_mid_folder_keeps_walking_the_rest() {
        let store = MemoryStore::new();
        let root = store.root_folder();
        for i in 0..120 {
            store
                .add_asset(&root, &format!("{}.png", i), days_ago(40))
                .unwrap();
        }

        let collector = Collector::new(&store, &store, &store);
        let summary = collector.execute(&root, &Locale::invariant()).unwrap();

        assert_eq!(summary.total, 120);
        assert_eq!(summary.deleted, 120);
        assert_eq!(summary.flushes, 3);
        assert_eq!(store.len(), 1);
    }

    use proptest::prelude::*;

    proptest! {
        /// With every asset eligible, a run deletes all of them and resolves
        /// each id in exactly one flush, whatever the paging and batching.
        #[test]
        fn prop_collect_deletes_every_eligible_asset(
            layout in proptest::collection::vec((0usize..8, 0usize..12), 0..12),
            page_size in 1usize..7,
            batch_size in 1usize..9,
        ) {
            let store = MemoryStore::new();
            let root = store.root_folder();
            let mut folders = vec![root];
            let mut created = HashSet::new();

            for (i, (parent, assets)) in layout.into_iter().enumerate() {
                let parent = folders[parent % folders.len()];
                let folder = store.create_folder(&parent, &format!("f{}", i))?;
                folders.push(folder);
                for j in 0..assets {
                    created.insert(store.add_asset(&folder, &format!("a{}", j), days_ago(40))?);
                }
            }

            let config = GcConfig::default()
                .with_page_size(page_size)
                .with_batch_size(batch_size);
            let collector = Collector::new(&store, &store, &store).with_config(config);
            let summary = collector.execute(&root, &Locale::invariant())?;

            prop_assert_eq!(summary.total, created.len());
            prop_assert_eq!(summary.deleted, created.len());

            let resolved: Vec<ContentId> = store.resolutions().into_iter().flatten().collect();
            let unique: HashSet<_> = resolved.iter().copied().collect();
            prop_assert_eq!(resolved.len(), unique.len());
            prop_assert_eq!(unique, created);
        }
    }
}

