//! Remote assets: object storage, locator caching and image display.
//!
//! [`AssetResolver`] maps an asset key to a download URL, consulting the
//! on-disk [`LocatorStore`] before asking the [`ObjectStore`]. Paths the
//! store reports as missing are remembered for the rest of the process.
//! [`AssetImage`] drives an external image component from the result.

mod error;
mod image;
mod memory;
mod records;
mod resolver;
mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{RecordError, StorageError};
pub use image::{AssetImage, AssetPhase, AssetView, ImageLoader, ImageRequest};
pub use memory::MemoryObjectStore;
pub use records::{LocatorRecord, LocatorStore};
pub use resolver::AssetResolver;
pub use rest::RestObjectStore;

/// Metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Full object path inside the bucket.
    pub path: String,
    pub size: u64,
    pub content_type: Option<String>,
    /// Download URL, when the store issues one with the metadata.
    pub download_url: Option<String>,
}

/// Client of a path-addressed object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Resolves the URL the object at `path` can be downloaded from.
    ///
    /// Reports [`StorageError::ObjectNotFound`] when nothing is stored there.
    async fn download_url(&self, path: &str) -> Result<String, StorageError>;

    /// Stores `bytes` at `path` with the given content type.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectMetadata, StorageError>;
}
