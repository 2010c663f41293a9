//! Content items as seen by the collector.

use crate::id::{ContainerKey, ContentId, LinkId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Container for folders and assets.
    Folder,
    /// Leaf media item backed by a blob.
    Asset,
}

impl ContentKind {
    /// Returns the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Folder => "folder",
            ContentKind::Asset => "asset",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Culture used when listing children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Locale(String);

impl Locale {
    /// Create a locale from a culture name such as `"en-GB"`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The culture-neutral locale.
    pub fn invariant() -> Self {
        Self::default()
    }

    /// Culture name; empty for the invariant locale.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the culture-neutral locale.
    pub fn is_invariant(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invariant() {
            f.write_str("invariant")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// One entry of a child listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub kind: ContentKind,
    pub parent: ContentId,
    pub name: String,
    pub created: DateTime<Utc>,
}

/// A leaf media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    pub id: ContentId,
    pub parent: ContentId,
    pub name: String,
    pub created: DateTime<Utc>,
}

impl Asset {
    /// Convert a listing entry, returning `None` for anything but an asset.
    pub fn from_item(item: ContentItem) -> Option<Self> {
        match item.kind {
            ContentKind::Asset => Some(Self {
                id: item.id,
                parent: item.parent,
                name: item.name,
                created: item.created,
            }),
            ContentKind::Folder => None,
        }
    }
}

/// A container of folders and assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub id: ContentId,
    pub parent: ContentId,
    pub name: String,
}

impl Folder {
    /// Convert a listing entry, returning `None` for anything but a folder.
    pub fn from_item(item: ContentItem) -> Option<Self> {
        match item.kind {
            ContentKind::Folder => Some(Self {
                id: item.id,
                parent: item.parent,
                name: item.name,
            }),
            ContentKind::Asset => None,
        }
    }
}

/// Permanent link resolved for a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// The content the link points at.
    pub content: ContentId,
    /// Auxiliary key locating the blob container.
    pub link: LinkId,
}

impl LinkRecord {
    /// Create a link record.
    pub fn new(content: ContentId, link: LinkId) -> Self {
        Self { content, link }
    }

    /// Blob container backing the linked content.
    pub fn container(&self) -> ContainerKey {
        ContainerKey::for_link(&self.link)
    }
}
