//! Content, link and blob container identifiers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Link identifier size in bytes.
pub const LINK_ID_SIZE: usize = 16;

/// Blob provider prefix used when deriving container keys.
const CONTAINER_SCHEME: &str = "blob://default/";

/// Handle for one content item, optionally pinned to a version.
///
/// The derived `PartialEq` compares versions too. Code that cares about the
/// logical item (dedup, parent matching) must go through [`ContentId::same_item`]
/// or [`ContentId::without_version`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId {
    id: u64,
    version: Option<u64>,
}

impl ContentId {
    /// Reference to the latest version of an item.
    pub const fn new(id: u64) -> Self {
        Self { id, version: None }
    }

    /// Reference to a specific version of an item.
    pub const fn versioned(id: u64, version: u64) -> Self {
        Self {
            id,
            version: Some(version),
        }
    }

    /// Numeric item id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Version, if pinned.
    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// Drop the version, keeping only the logical item.
    pub fn without_version(&self) -> Self {
        Self::new(self.id)
    }

    /// True if both handles point at the same logical item.
    pub fn same_item(&self, other: &ContentId) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{}_{}", self.id, version),
            None => write!(f, "{}", self.id),
        }
    }
}

impl FromStr for ContentId {
    type Err = Error;

    /// Parse `"<id>"` or `"<id>_<version>"`.
    fn from_str(s: &str) -> Result<Self> {
        let parse = |part: &str| {
            part.parse::<u64>()
                .map_err(|_| Error::invalid_id(format!("Invalid content id: {}", s)))
        };

        match s.split_once('_') {
            Some((id, version)) => Ok(Self::versioned(parse(id)?, parse(version)?)),
            None => Ok(Self::new(parse(s)?)),
        }
    }
}

impl TryFrom<String> for ContentId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.to_string()
    }
}

/// Stable key of a permanent link, used to locate an asset's blob container.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkId([u8; LINK_ID_SIZE]);

impl LinkId {
    /// Create a LinkId from raw bytes.
    pub fn from_bytes(bytes: [u8; LINK_ID_SIZE]) -> Self {
        LinkId(bytes)
    }

    /// Derive the link id for a content item.
    ///
    /// Stable for the lifetime of the item and independent of its version.
    pub fn derive(content: &ContentId) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"assetgc.link\0");
        hasher.update(&content.id().to_le_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; LINK_ID_SIZE];
        bytes.copy_from_slice(&digest.as_bytes()[..LINK_ID_SIZE]);
        LinkId(bytes)
    }

    /// Create a LinkId from a hex string (32 hex characters).
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != LINK_ID_SIZE * 2 {
            return Err(Error::invalid_id(format!(
                "Expected {} hex characters, got {}",
                LINK_ID_SIZE * 2,
                hex_str.len()
            )));
        }

        let bytes =
            hex::decode(hex_str).map_err(|e| Error::invalid_id(format!("Invalid hex: {}", e)))?;

        let mut link = [0u8; LINK_ID_SIZE];
        link.copy_from_slice(&bytes);
        Ok(LinkId(link))
    }

    /// Convert to hex string (32 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; LINK_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkId({})", self.to_hex())
    }
}

impl TryFrom<String> for LinkId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(&value)
    }
}

impl From<LinkId> for String {
    fn from(link: LinkId) -> Self {
        link.to_hex()
    }
}

/// Key of the blob container that backs an asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerKey {
    link: LinkId,
}

impl ContainerKey {
    /// Container key for the given permanent link.
    pub fn for_link(link: &LinkId) -> Self {
        Self { link: *link }
    }

    /// Link the container was derived from.
    pub fn link(&self) -> &LinkId {
        &self.link
    }

    /// First 2 hex characters (for directory sharding).
    pub fn prefix(&self) -> String {
        hex::encode(&self.link.as_bytes()[..1])
    }

    /// Remaining 30 hex characters (for filename).
    pub fn suffix(&self) -> String {
        hex::encode(&self.link.as_bytes()[1..])
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CONTAINER_SCHEME, self.link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_content_id_display() {
        assert_eq!(ContentId::new(42).to_string(), "42");
        assert_eq!(ContentId::versioned(42, 7).to_string(), "42_7");
    }

    #[test]
    fn test_content_id_parse() {
        assert_eq!("42".parse::<ContentId>().unwrap(), ContentId::new(42));
        assert_eq!(
            "42_7".parse::<ContentId>().unwrap(),
            ContentId::versioned(42, 7)
        );
        assert!("".parse::<ContentId>().is_err());
        assert!("abc".parse::<ContentId>().is_err());
        assert!("4_".parse::<ContentId>().is_err());
        assert!("_4".parse::<ContentId>().is_err());
    }

    #[test]
    fn test_same_item_ignores_version() {
        let a = ContentId::versioned(5, 1);
        let b = ContentId::versioned(5, 2);
        let c = ContentId::new(6);

        assert_ne!(a, b);
        assert!(a.same_item(&b));
        assert!(a.same_item(&ContentId::new(5)));
        assert!(!a.same_item(&c));
    }

    #[test]
    fn test_without_version_dedups() {
        let mut set = HashSet::new();
        set.insert(ContentId::versioned(9, 1).without_version());
        set.insert(ContentId::versioned(9, 3).without_version());
        set.insert(ContentId::new(9).without_version());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_content_id_serde() {
        let json = serde_json::to_string(&ContentId::versioned(3, 4)).unwrap();
        assert_eq!(json, "\"3_4\"");
        let back: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ContentId::versioned(3, 4));
    }

    #[test]
    fn test_link_id_derive_is_version_independent() {
        let a = LinkId::derive(&ContentId::versioned(11, 1));
        let b = LinkId::derive(&ContentId::versioned(11, 2));
        let c = LinkId::derive(&ContentId::new(12));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_link_id_hex() {
        let link = LinkId::derive(&ContentId::new(1));
        let hex = link.to_hex();
        assert_eq!(hex.len(), 32);
        assert_eq!(LinkId::from_hex(&hex).unwrap(), link);
        assert!(LinkId::from_hex("abc").is_err());
        assert!(LinkId::from_hex(&"zz".repeat(16)).is_err());
    }

    #[test]
    fn test_container_key() {
        let link = LinkId::from_bytes([0xab; LINK_ID_SIZE]);
        let key = ContainerKey::for_link(&link);
        assert_eq!(key.to_string(), format!("blob://default/{}", "ab".repeat(16)));
        assert_eq!(key.prefix(), "ab");
        assert_eq!(key.suffix().len(), 30);
    }
}
