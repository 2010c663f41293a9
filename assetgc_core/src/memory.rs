//! In-process backend implementing every collaborator trait.

use crate::content::{ContentItem, ContentKind, LinkRecord, Locale};
use crate::error::{Error, Result};
use crate::id::{ContainerKey, ContentId, LinkId};
use crate::store::{BlobStore, ContentStore, LinkIndex};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Id of the root folder every MemoryStore starts with.
const ROOT_ID: u64 = 1;

#[derive(Debug, Clone)]
struct Record {
    kind: ContentKind,
    parent: ContentId,
    name: String,
    created: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    items: BTreeMap<u64, Record>,
    /// Extra (folder, item) listings for items shared into other folders.
    shared: Vec<(u64, u64)>,
    /// (from, to) reference edges.
    references: Vec<(u64, u64)>,
    blobs: HashSet<LinkId>,
    fail_blob_deletes: bool,
    resolutions: Vec<Vec<ContentId>>,
}

impl State {
    fn insert(
        &mut self,
        parent: &ContentId,
        kind: ContentKind,
        name: &str,
        created: DateTime<Utc>,
    ) -> Result<ContentId> {
        match self.items.get(&parent.id()) {
            Some(record) if record.kind == ContentKind::Folder => {}
            Some(_) => return Err(Error::not_a_folder(parent)),
            None => return Err(Error::not_found(parent)),
        }

        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(
            id,
            Record {
                kind,
                parent: parent.without_version(),
                name: name.to_string(),
                created,
            },
        );
        Ok(ContentId::new(id))
    }

    fn require(&self, id: &ContentId) -> Result<&Record> {
        self.items.get(&id.id()).ok_or_else(|| Error::not_found(id))
    }
}

/// Content store, link index and blob store held in memory.
///
/// Children are listed in creation order. Locales are accepted but ignored.
/// Besides the collaborator traits it records every link resolution and can
/// be told to fail blob deletes, which makes it the fixture of choice for
/// exercising the collector.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store holding only an empty root folder.
    pub fn new() -> Self {
        let mut items = BTreeMap::new();
        items.insert(
            ROOT_ID,
            Record {
                kind: ContentKind::Folder,
                parent: ContentId::new(0),
                name: "root".to_string(),
                created: Utc::now(),
            },
        );

        Self {
            state: Mutex::new(State {
                next_id: ROOT_ID + 1,
                items,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The root folder.
    pub fn root_folder(&self) -> ContentId {
        ContentId::new(ROOT_ID)
    }

    /// Create a folder under `parent`.
    pub fn create_folder(&self, parent: &ContentId, name: &str) -> Result<ContentId> {
        self.state()
            .insert(parent, ContentKind::Folder, name, Utc::now())
    }

    /// Create an asset under `parent` together with its blob.
    pub fn add_asset(
        &self,
        parent: &ContentId,
        name: &str,
        created: DateTime<Utc>,
    ) -> Result<ContentId> {
        let mut state = self.state();
        let id = state.insert(parent, ContentKind::Asset, name, created)?;
        state.blobs.insert(LinkId::derive(&id));
        Ok(id)
    }

    /// Make `item` also show up when listing `folder`, without changing its parent.
    pub fn link_child(&self, folder: &ContentId, item: &ContentId) -> Result<()> {
        let mut state = self.state();
        state.require(folder)?;
        state.require(item)?;
        state.shared.push((folder.id(), item.id()));
        Ok(())
    }

    /// Record that `from` references `to`.
    pub fn add_reference(&self, from: &ContentId, to: &ContentId) -> Result<()> {
        let mut state = self.state();
        state.require(from)?;
        state.require(to)?;
        state.references.push((from.id(), to.id()));
        Ok(())
    }

    /// Drop the blob behind an asset, leaving the content item in place.
    pub fn remove_blob(&self, id: &ContentId) {
        self.state().blobs.remove(&LinkId::derive(id));
    }

    /// Make every subsequent blob delete fail.
    pub fn fail_blob_deletes(&self, fail: bool) {
        self.state().fail_blob_deletes = fail;
    }

    /// True if the item exists.
    pub fn contains(&self, id: &ContentId) -> bool {
        self.state().items.contains_key(&id.id())
    }

    /// True if the blob behind an asset exists.
    pub fn blob_exists(&self, id: &ContentId) -> bool {
        self.state().blobs.contains(&LinkId::derive(id))
    }

    /// Number of items, the root folder included.
    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    /// True if only the root folder is left.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Ids passed to each `resolve` call so far, sorted within each call.
    pub fn resolutions(&self) -> Vec<Vec<ContentId>> {
        self.state().resolutions.clone()
    }
}

impl ContentStore for MemoryStore {
    fn children(
        &self,
        parent: &ContentId,
        kind: ContentKind,
        _locale: &Locale,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        let state = self.state();
        let folder = parent.id();

        let shared: HashSet<u64> = state
            .shared
            .iter()
            .filter(|(f, _)| *f == folder)
            .map(|(_, item)| *item)
            .collect();

        Ok(state
            .items
            .iter()
            .filter(|(id, record)| {
                record.kind == kind && (record.parent.id() == folder || shared.contains(*id))
            })
            .skip(offset)
            .take(limit)
            .map(|(id, record)| ContentItem {
                id: ContentId::new(*id),
                kind: record.kind,
                parent: record.parent,
                name: record.name.clone(),
                created: record.created,
            })
            .collect())
    }

    fn reference_count(&self, id: &ContentId) -> Result<usize> {
        let state = self.state();
        Ok(state
            .references
            .iter()
            .filter(|(_, to)| *to == id.id())
            .count())
    }

    fn delete_permanently(&self, id: &ContentId) -> Result<()> {
        let mut state = self.state();
        let key = id.id();
        if state.items.remove(&key).is_none() {
            return Err(Error::not_found(id));
        }
        state.references.retain(|(from, to)| *from != key && *to != key);
        state.shared.retain(|(folder, item)| *folder != key && *item != key);
        Ok(())
    }
}

impl LinkIndex for MemoryStore {
    fn resolve(&self, ids: &HashSet<ContentId>) -> Result<Vec<LinkRecord>> {
        let mut state = self.state();

        let mut requested: Vec<ContentId> = ids.iter().copied().collect();
        requested.sort();
        state.resolutions.push(requested.clone());

        Ok(requested
            .into_iter()
            .filter(|id| state.items.contains_key(&id.id()))
            .map(|id| LinkRecord::new(id, LinkId::derive(&id)))
            .collect())
    }
}

impl BlobStore for MemoryStore {
    fn exists(&self, key: &ContainerKey) -> Result<bool> {
        Ok(self.state().blobs.contains(key.link()))
    }

    fn delete(&self, key: &ContainerKey) -> Result<()> {
        let mut state = self.state();
        if state.fail_blob_deletes {
            return Err(Error::backend(format!("blob delete refused: {}", key)));
        }
        state.blobs.remove(key.link());
        Ok(())
    }
}
