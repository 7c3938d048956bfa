//! In-process object store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::error::StorageError;
use super::{ObjectMetadata, ObjectStore};

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Default)]
struct Objects {
    stored: HashMap<String, StoredObject>,
    /// Failures injected per path; take precedence over stored objects.
    failures: HashMap<String, StorageError>,
}

/// [`ObjectStore`] that keeps objects in memory and counts URL lookups.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<Objects>,
    lookups: AtomicUsize,
    latency: Option<Duration>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every lookup, so that concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores an object directly.
    pub fn insert(&self, path: &str, bytes: impl Into<Vec<u8>>, content_type: &str) {
        self.lock().stored.insert(
            path.to_string(),
            StoredObject {
                bytes: bytes.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    /// Bytes and content type of a stored object.
    pub fn get(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.lock()
            .stored
            .get(path)
            .map(|object| (object.bytes.clone(), object.content_type.clone()))
    }

    pub fn remove(&self, path: &str) {
        self.lock().stored.remove(path);
    }

    /// Makes lookups of `path` fail with `error` until cleared with `None`.
    pub fn set_failure(&self, path: &str, error: Option<StorageError>) {
        let mut objects = self.lock();
        match error {
            Some(error) => objects.failures.insert(path.to_string(), error),
            None => objects.failures.remove(path),
        };
    }

    /// Number of `download_url` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn url_for(path: &str) -> String {
        format!("memory://{}", path)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let objects = self.lock();
        if let Some(error) = objects.failures.get(path) {
            return Err(error.clone());
        }
        if objects.stored.contains_key(path) {
            Ok(Self::url_for(path))
        } else {
            Err(StorageError::ObjectNotFound(path.to_string()))
        }
    }

    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectMetadata, StorageError> {
        let size = bytes.len() as u64;
        self.insert(path, bytes, content_type);
        Ok(ObjectMetadata {
            path: path.to_string(),
            size,
            content_type: Some(content_type.to_string()),
            download_url: Some(Self::url_for(path)),
        })
    }
}
