//! Error types for assetgc_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using assetgc_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the collector and its store backends.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Manifest or output could not be encoded or decoded.
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },

    /// Content or link identifier could not be parsed.
    #[error("Invalid identifier: {reason}")]
    InvalidId { reason: String },

    /// Collector settings are out of range or malformed.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Store is invalid or not initialized.
    #[error("Invalid store at {path}: {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// Content item not found in store.
    #[error("Content not found: {id}")]
    NotFound { id: String },

    /// Item exists but cannot hold children.
    #[error("Not a folder: {id}")]
    NotAFolder { id: String },

    /// A collaborator backend reported a failure.
    #[error("Backend failure: {reason}")]
    Backend { reason: String },
}

impl Error {
    /// Create an InvalidId error.
    pub fn invalid_id(reason: impl Into<String>) -> Self {
        Error::InvalidId {
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an InvalidStore error.
    pub fn invalid_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(id: impl ToString) -> Self {
        Error::NotFound { id: id.to_string() }
    }

    /// Create a NotAFolder error.
    pub fn not_a_folder(id: impl ToString) -> Self {
        Error::NotAFolder { id: id.to_string() }
    }

    /// Create a Backend error.
    pub fn backend(reason: impl Into<String>) -> Self {
        Error::Backend {
            reason: reason.into(),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}
