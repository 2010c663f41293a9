//! Directory-backed content store.

use crate::config::GcConfig;
use crate::content::{ContentItem, ContentKind, LinkRecord, Locale};
use crate::error::{Error, Result};
use crate::id::{ContainerKey, ContentId, LinkId};
use crate::store::{BlobStore, ContentStore, LinkIndex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Id given to the root folder of a new store.
const ROOT_FOLDER_ID: u64 = 1;

/// Name of the root folder of a new store.
const ROOT_FOLDER_NAME: &str = "Global Assets";

/// A stored content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<ContentId>,
    name: String,
    created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    link: Option<LinkId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    references: Vec<ContentId>,
}

/// Contents of `content.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    next_id: u64,
    items: BTreeMap<u64, Record>,
}

impl Manifest {
    fn require(&self, id: &ContentId) -> Result<&Record> {
        self.items.get(&id.id()).ok_or_else(|| Error::not_found(id))
    }

    fn require_folder(&self, id: &ContentId) -> Result<()> {
        match self.require(id)?.kind {
            ContentKind::Folder => Ok(()),
            ContentKind::Asset => Err(Error::not_a_folder(id)),
        }
    }

    fn insert(&mut self, record: Record) -> ContentId {
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, record);
        ContentId::new(id)
    }
}

/// A content store kept in a directory.
///
/// Layout:
/// - `config`: `key=value` settings (`version`, `root_folder`, collector tunables)
/// - `content.json`: every folder and asset with their references
/// - `blobs/{prefix}/{suffix}`: asset payloads keyed by permanent link
///
/// The manifest is held in memory and rewritten atomically after each change,
/// including every single delete: a flush of n assets writes `content.json`
/// n times, each before the matching blob is removed.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    root_folder: ContentId,
    manifest: Mutex<Manifest>,
}

impl LocalStore {
    /// Initialize a new store at the given path.
    ///
    /// Creates the root directory, `blobs/`, the `config` file and a
    /// manifest holding a single root folder.
    pub fn init<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if root.join("config").exists() {
            return Err(Error::invalid_store(&root, "store already initialized"));
        }

        fs::create_dir_all(root.join("blobs"))?;

        let config_content = format!("version=1\nroot_folder={}\n", ROOT_FOLDER_ID);
        fs::write(root.join("config"), config_content)?;

        let mut manifest = Manifest {
            next_id: ROOT_FOLDER_ID,
            items: BTreeMap::new(),
        };
        let root_folder = manifest.insert(Record {
            kind: ContentKind::Folder,
            parent: None,
            name: ROOT_FOLDER_NAME.to_string(),
            created: Utc::now(),
            link: None,
            references: Vec::new(),
        });

        let store = Self {
            root,
            root_folder,
            manifest: Mutex::new(manifest),
        };
        store.write_manifest(&store.manifest())?;
        Ok(store)
    }

    /// Open an existing store at the given path.
    ///
    /// Validates the directory structure and loads the manifest.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_store(&root, "directory does not exist"));
        }

        let config_path = root.join("config");
        if !config_path.exists() {
            return Err(Error::invalid_store(&root, "config file not found"));
        }

        let config_content = fs::read_to_string(&config_path)?;
        let root_folder = Self::parse_config(&root, &config_content)?;

        if !root.join("blobs").exists() {
            return Err(Error::invalid_store(&root, "blobs directory missing"));
        }

        let manifest_path = root.join("content.json");
        if !manifest_path.exists() {
            return Err(Error::invalid_store(&root, "content.json missing"));
        }
        let manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path)?)?;

        if manifest.require_folder(&root_folder).is_err() {
            return Err(Error::invalid_store(
                &root,
                format!("root folder {} missing from manifest", root_folder),
            ));
        }

        Ok(Self {
            root,
            root_folder,
            manifest: Mutex::new(manifest),
        })
    }

    /// Parse the config file to extract the root folder.
    fn parse_config(root: &Path, content: &str) -> Result<ContentId> {
        let mut version = None;
        let mut root_folder = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "root_folder" => root_folder = Some(value.trim()),
                    _ => {}
                }
            }
        }

        if version != Some("1") {
            return Err(Error::invalid_store(
                root,
                format!("unsupported config version: {:?}", version),
            ));
        }

        match root_folder {
            Some(value) => value.parse(),
            None => Ok(ContentId::new(ROOT_FOLDER_ID)),
        }
    }

    fn manifest(&self) -> MutexGuard<'_, Manifest> {
        self.manifest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the manifest atomically using tempfile.
    fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        let mut temp_file = tempfile::NamedTempFile::new_in(&self.root)?;
        serde_json::to_writer_pretty(&mut temp_file, manifest)?;
        temp_file.write_all(b"\n")?;
        temp_file.flush()?;
        temp_file.persist(self.root.join("content.json"))?;
        Ok(())
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The folder new stores put everything under.
    pub fn root_folder(&self) -> ContentId {
        self.root_folder
    }

    /// Collector settings from the `config` file.
    pub fn config(&self) -> Result<GcConfig> {
        let content = fs::read_to_string(self.root.join("config"))?;
        GcConfig::parse(&content)
    }

    /// Get the path of a blob container.
    ///
    /// Returns: `blobs/{prefix}/{suffix}`
    pub fn blob_path(&self, key: &ContainerKey) -> PathBuf {
        self.root.join("blobs").join(key.prefix()).join(key.suffix())
    }

    /// Look up one item.
    pub fn get(&self, id: &ContentId) -> Result<ContentItem> {
        let manifest = self.manifest();
        let record = manifest.require(id)?;
        Ok(ContentItem {
            id: id.without_version(),
            kind: record.kind,
            parent: record.parent.unwrap_or_else(|| ContentId::new(0)),
            name: record.name.clone(),
            created: record.created,
        })
    }

    /// Create a folder under `parent`.
    pub fn create_folder(&self, parent: &ContentId, name: &str) -> Result<ContentId> {
        let mut manifest = self.manifest();
        manifest.require_folder(parent)?;

        let id = manifest.insert(Record {
            kind: ContentKind::Folder,
            parent: Some(parent.without_version()),
            name: name.to_string(),
            created: Utc::now(),
            link: None,
            references: Vec::new(),
        });
        self.write_manifest(&manifest)?;
        Ok(id)
    }

    /// Store an asset under `parent` with its payload read from `reader`.
    pub fn add_asset<R: Read>(
        &self,
        parent: &ContentId,
        name: &str,
        created: DateTime<Utc>,
        mut reader: R,
    ) -> Result<ContentId> {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;

        let mut manifest = self.manifest();
        manifest.require_folder(parent)?;

        let id = manifest.insert(Record {
            kind: ContentKind::Asset,
            parent: Some(parent.without_version()),
            name: name.to_string(),
            created,
            link: None,
            references: Vec::new(),
        });
        let link = LinkId::derive(&id);
        if let Some(record) = manifest.items.get_mut(&id.id()) {
            record.link = Some(link);
        }

        self.write_blob_atomic(&ContainerKey::for_link(&link), &payload)?;
        self.write_manifest(&manifest)?;
        Ok(id)
    }

    /// Record that `from` references `to`.
    pub fn add_reference(&self, from: &ContentId, to: &ContentId) -> Result<()> {
        let mut manifest = self.manifest();
        manifest.require(to)?;

        let record = manifest
            .items
            .get_mut(&from.id())
            .ok_or_else(|| Error::not_found(from))?;
        record.references.push(to.without_version());

        self.write_manifest(&manifest)
    }

    /// Write a blob atomically using tempfile.
    fn write_blob_atomic(&self, key: &ContainerKey, payload: &[u8]) -> Result<()> {
        let blob_path = self.blob_path(key);
        let shard_dir = self.root.join("blobs").join(key.prefix());
        fs::create_dir_all(&shard_dir)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&shard_dir)?;
        temp_file.write_all(payload)?;
        temp_file.flush()?;
        temp_file.persist(&blob_path)?;

        Ok(())
    }
}

impl ContentStore for LocalStore {
    fn children(
        &self,
        parent: &ContentId,
        kind: ContentKind,
        _locale: &Locale,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ContentItem>> {
        let manifest = self.manifest();
        manifest.require_folder(parent)?;

        Ok(manifest
            .items
            .iter()
            .filter(|(_, record)| {
                record.kind == kind
                    && record
                        .parent
                        .is_some_and(|record_parent| record_parent.same_item(parent))
            })
            .skip(offset)
            .take(limit)
            .map(|(id, record)| ContentItem {
                id: ContentId::new(*id),
                kind: record.kind,
                parent: record.parent.unwrap_or_else(|| ContentId::new(0)),
                name: record.name.clone(),
                created: record.created,
            })
            .collect())
    }

    fn reference_count(&self, id: &ContentId) -> Result<usize> {
        let manifest = self.manifest();
        Ok(manifest
            .items
            .values()
            .flat_map(|record| record.references.iter())
            .filter(|target| target.same_item(id))
            .count())
    }

    fn delete_permanently(&self, id: &ContentId) -> Result<()> {
        let mut manifest = self.manifest();
        if manifest.items.remove(&id.id()).is_none() {
            return Err(Error::not_found(id));
        }
        self.write_manifest(&manifest)
    }
}

impl LinkIndex for LocalStore {
    fn resolve(&self, ids: &HashSet<ContentId>) -> Result<Vec<LinkRecord>> {
        let manifest = self.manifest();
        let mut records: Vec<LinkRecord> = ids
            .iter()
            .filter_map(|id| {
                let link = manifest.items.get(&id.id())?.link?;
                Some(LinkRecord::new(id.without_version(), link))
            })
            .collect();
        records.sort_by_key(|record| record.content);
        Ok(records)
    }
}

impl BlobStore for LocalStore {
    fn exists(&self, key: &ContainerKey) -> Result<bool> {
        Ok(self.blob_path(key).is_file())
    }

    fn delete(&self, key: &ContainerKey) -> Result<()> {
        fs::remove_file(self.blob_path(key))?;

        // Remove the shard directory once it is empty
        let shard_dir = self.root.join("blobs").join(key.prefix());
        if let Ok(mut entries) = fs::read_dir(&shard_dir)
            && entries.next().is_none()
        {
            let _ = fs::remove_dir(&shard_dir);
        }

        Ok(())
    }
}
