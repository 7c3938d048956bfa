//! Asset error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by an object store.
///
/// Cloneable so that one failed lookup can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// The store reports that nothing exists at the path.
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Object storage returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Protocol(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::ObjectNotFound(_))
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::Http(e.to_string())
    }
}

/// Errors from the on-disk locator records.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt locator record {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not determine the data directory")]
    NoDataDir,
}

impl RecordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        RecordError::Io {
            path: path.into(),
            source,
        }
    }
}
