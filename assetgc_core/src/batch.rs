//! Batched deletion of unreferenced assets.

use crate::error::Result;
use crate::id::ContentId;
use crate::store::{BlobStore, ContentStore, LinkIndex, ProgressSink};
use std::collections::HashSet;

/// Counters accumulated across flushes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Content items deleted.
    pub deleted: usize,
    /// Blobs deleted alongside their content.
    pub blobs_deleted: usize,
    /// Blobs left behind because their delete failed.
    pub orphaned_blobs: usize,
    /// Flushes that reached the link index.
    pub flushes: usize,
}

/// Collects asset ids and deletes them in batches.
///
/// Ids are stored without their version, so different versions of one asset
/// occupy a single slot. A batch is committed as soon as the pending set
/// reaches a multiple of `batch_size`, and whatever is left is committed by
/// [`BatchDeleter::flush_remaining`].
pub struct BatchDeleter<'a> {
    store: &'a dyn ContentStore,
    links: &'a dyn LinkIndex,
    blobs: &'a dyn BlobStore,
    progress: &'a dyn ProgressSink,
    batch_size: usize,
    pending: HashSet<ContentId>,
    deleted: Vec<ContentId>,
    stats: FlushStats,
}

impl<'a> BatchDeleter<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        links: &'a dyn LinkIndex,
        blobs: &'a dyn BlobStore,
        progress: &'a dyn ProgressSink,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            links,
            blobs,
            progress,
            batch_size: batch_size.max(1),
            pending: HashSet::new(),
            deleted: Vec::new(),
            stats: FlushStats::default(),
        }
    }

    /// Queue an asset. Returns false if it was already queued.
    pub fn add(&mut self, id: &ContentId) -> bool {
        self.pending.insert(id.without_version())
    }

    /// Number of queued ids.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Counters so far.
    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    /// Drain the ids deleted since the last call.
    pub fn take_deleted(&mut self) -> Vec<ContentId> {
        std::mem::take(&mut self.deleted)
    }

    /// Flush if the pending set has reached a multiple of the batch size.
    ///
    /// Returns true if a flush happened.
    pub fn maybe_flush(&mut self) -> Result<bool> {
        let len = self.pending.len();
        if len == 0 || len % self.batch_size != 0 {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Flush whatever is still queued.
    pub fn flush_remaining(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.flush()
    }

    /// Resolve the pending set in one call, delete each linked item and its
    /// blob, then clear the set.
    ///
    /// Content deletes are authoritative and any failure aborts the flush.
    /// Blob deletes are best effort: a failure is logged and the item still
    /// counts as deleted.
    fn flush(&mut self) -> Result<()> {
        tracing::debug!(count = self.pending.len(), "Flushing pending deletions");

        let records = self.links.resolve(&self.pending)?;

        let resolved: HashSet<ContentId> = records
            .iter()
            .map(|record| record.content.without_version())
            .collect();
        for id in self.pending.difference(&resolved) {
            tracing::warn!(id = %id, "No permanent link for asset, skipping");
        }

        for record in &records {
            self.store.delete_permanently(&record.content)?;

            let container = record.container();
            if self.blobs.exists(&container)? {
                match self.blobs.delete(&container) {
                    Ok(()) => self.stats.blobs_deleted += 1,
                    Err(e) => {
                        self.stats.orphaned_blobs += 1;
                        tracing::warn!(
                            id = %record.content,
                            container = %container,
                            error = %e,
                            "Failed to delete blob, leaving it orphaned"
                        );
                    }
                }
            }

            self.stats.deleted += 1;
            self.deleted.push(record.content.without_version());
            self.progress
                .report(&format!("Deleting asset with id {}", record.content));
        }

        self.pending.clear();
        self.stats.flushes += 1;
        Ok(())
    }
}
