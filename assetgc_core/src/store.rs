//! Collaborator interfaces consumed by the collector.
//!
//! The collector never talks to storage directly. It lists and deletes content
//! through a [`ContentStore`], resolves permanent links through a [`LinkIndex`],
//! removes payloads through a [`BlobStore`] and reports what it did to a
//! [`ProgressSink`]. All calls are synchronous; retries and timeouts are the
//! implementation's business.

use crate::content::{ContentItem, ContentKind, LinkRecord, Locale};
use crate::error::Result;
use crate::id::{ContainerKey, ContentId};
use std::collections::HashSet;

/// Hierarchical content repository.
pub trait ContentStore {
    /// List children of `parent` having the given kind.
    ///
    /// Returns at most `limit` items starting at `offset`, in a stable order.
    /// An empty page means the listing is exhausted.
    fn children(
        &self,
        parent: &ContentId,
        kind: ContentKind,
        locale: &Locale,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentItem>>;

    /// Number of items referencing `id`, ignoring versions.
    fn reference_count(&self, id: &ContentId) -> Result<usize>;

    /// Permanently delete an item, bypassing access checks and the recycle bin.
    fn delete_permanently(&self, id: &ContentId) -> Result<()>;
}

/// Maps content identifiers to their permanent links.
pub trait LinkIndex {
    /// Resolve every id in one call. Ids without a link are left out.
    fn resolve(&self, ids: &HashSet<ContentId>) -> Result<Vec<LinkRecord>>;
}

/// Storage for binary payloads.
pub trait BlobStore {
    /// True if a blob exists in the container.
    fn exists(&self, key: &ContainerKey) -> Result<bool>;

    /// Delete the blob held by the container.
    fn delete(&self, key: &ContainerKey) -> Result<()>;
}

/// Receives human-readable status lines while the collector runs.
pub trait ProgressSink {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str),
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _message: &str) {}
}

/// Forwards progress to the `tracing` subscriber at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, message: &str) {
        tracing::info!("{}", message);
    }
}
