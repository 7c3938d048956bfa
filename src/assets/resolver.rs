//! Asset key to download URL resolution.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, warn};

use super::error::StorageError;
use super::records::LocatorStore;
use super::ObjectStore;

type Lookup = Shared<BoxFuture<'static, Result<String, StorageError>>>;

struct Inner {
    objects: Arc<dyn ObjectStore>,
    records: LocatorStore,
    /// Keys whose object the store reported as missing.
    missing: Mutex<HashSet<String>>,
    /// Running lookups by key, tagged with an id. A lookup whose entry was
    /// evicted or replaced leaves the record and the negative set alone.
    in_flight: Mutex<HashMap<String, (u64, Lookup)>>,
    next_lookup: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Resolves asset keys to download URLs.
///
/// Resolution order: persisted record, then the negative set, then a remote
/// lookup. Concurrent resolutions of one key share a single lookup.
/// Persisted records never expire; a replaced object keeps its old URL
/// until the key is evicted.
#[derive(Clone)]
pub struct AssetResolver {
    inner: Arc<Inner>,
}

impl AssetResolver {
    pub fn new(objects: Arc<dyn ObjectStore>, records: LocatorStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                objects,
                records,
                missing: Mutex::new(HashSet::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_lookup: AtomicU64::new(0),
            }),
        }
    }

    pub fn records(&self) -> &LocatorStore {
        &self.inner.records
    }

    /// Resolves `key`, looking up `path` remotely if needed. Failures are
    /// logged and yield `None`.
    pub async fn resolve(&self, key: &str, path: &str) -> Option<String> {
        match self.try_resolve(key, path).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Failed to resolve asset {}: {}", key, e);
                None
            }
        }
    }

    /// Like [`resolve`](Self::resolve), but reports failures other than a
    /// missing object. `Ok(None)` means the object does not exist.
    pub async fn try_resolve(
        &self,
        key: &str,
        path: &str,
    ) -> Result<Option<String>, StorageError> {
        match self.inner.records.load(key) {
            Ok(Some(record)) => return Ok(Some(record.url)),
            Ok(None) => {}
            Err(e) => warn!("Ignoring locator record for {}: {}", key, e),
        }

        if lock(&self.inner.missing).contains(key) {
            debug!("Asset {} is known to be missing", key);
            return Ok(None);
        }

        match self.lookup(key, path).await {
            Ok(url) => Ok(Some(url)),
            Err(StorageError::ObjectNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Joins the in-flight lookup for `key` or starts one.
    fn lookup(&self, key: &str, path: &str) -> Lookup {
        let mut in_flight = lock(&self.inner.in_flight);
        if let Some((_, lookup)) = in_flight.get(key) {
            debug!("Joining in-flight lookup for {}", key);
            return lookup.clone();
        }

        let id = self.inner.next_lookup.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        let owned_path = path.to_string();
        let lookup = async move {
            let result = inner.objects.download_url(&owned_path).await;

            // Held while recording so that evict/clear cannot interleave.
            let mut in_flight = lock(&inner.in_flight);
            if !matches!(in_flight.get(&owned_key), Some((current, _)) if *current == id) {
                debug!("Lookup for {} was evicted; not recording it", owned_key);
                return result;
            }
            in_flight.remove(&owned_key);
            match &result {
                Ok(url) => {
                    if let Err(e) = inner.records.save(&owned_key, url) {
                        warn!("Failed to persist locator for {}: {}", owned_key, e);
                    }
                }
                Err(StorageError::ObjectNotFound(_)) => {
                    lock(&inner.missing).insert(owned_key.clone());
                }
                Err(_) => {}
            }
            result
        }
        .boxed()
        .shared();

        in_flight.insert(key.to_string(), (id, lookup.clone()));
        lookup
    }

    /// Forgets `key`: its persisted record, its negative entry and the
    /// outcome of any lookup still running for it.
    pub fn evict(&self, key: &str) {
        lock(&self.inner.in_flight).remove(key);
        if let Err(e) = self.inner.records.remove(key) {
            warn!("Failed to remove locator record for {}: {}", key, e);
        }
        lock(&self.inner.missing).remove(key);
    }

    /// Forgets every key.
    pub fn clear(&self) {
        lock(&self.inner.in_flight).clear();
        if let Err(e) = self.inner.records.clear() {
            warn!("Failed to clear locator records: {}", e);
        }
        lock(&self.inner.missing).clear();
    }

    /// Whether `key` is in the negative set.
    pub fn is_known_missing(&self, key: &str) -> bool {
        lock(&self.inner.missing).contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryObjectStore;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup(objects: MemoryObjectStore) -> (AssetResolver, Arc<MemoryObjectStore>, TempDir) {
        let temp = TempDir::new().unwrap();
        let objects = Arc::new(objects);
        let resolver = AssetResolver::new(objects.clone(), LocatorStore::new(temp.path()));
        (resolver, objects, temp)
    }

    #[tokio::test]
    async fn test_second_resolution_uses_record() {
        let (resolver, objects, _temp) = setup(MemoryObjectStore::new());
        objects.insert("avatars/ada.png", b"png".to_vec(), "image/png");

        let first = resolver.resolve("ada", "avatars/ada.png").await;
        let second = resolver.resolve("ada", "avatars/ada.png").await;
        assert_eq!(first.as_deref(), Some("memory://avatars/ada.png"));
        assert_eq!(first, second);
        assert_eq!(objects.lookups(), 1);
        assert!(resolver.records().load("ada").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_record_survives_new_resolver() {
        let temp = TempDir::new().unwrap();
        let objects = Arc::new(MemoryObjectStore::new());
        objects.insert("a.png", b"x".to_vec(), "image/png");

        AssetResolver::new(objects.clone(), LocatorStore::new(temp.path()))
            .resolve("a", "a.png")
            .await;
        let fresh = AssetResolver::new(objects.clone(), LocatorStore::new(temp.path()));
        assert!(fresh.resolve("a", "a.png").await.is_some());
        assert_eq!(objects.lookups(), 1);
    }

    #[tokio::test]
    async fn test_missing_object_is_remembered() {
        let (resolver, objects, _temp) = setup(MemoryObjectStore::new());

        assert_eq!(resolver.resolve("ghost", "ghost.png").await, None);
        assert_eq!(resolver.resolve("ghost", "ghost.png").await, None);
        assert_eq!(objects.lookups(), 1);
        assert!(resolver.is_known_missing("ghost"));
    }

    #[tokio::test]
    async fn test_transient_failure_is_not_cached() {
        let (resolver, objects, _temp) = setup(MemoryObjectStore::new());
        objects.insert("a.png", b"x".to_vec(), "image/png");
        objects.set_failure("a.png", Some(StorageError::Http("timeout".to_string())));

        assert!(resolver.try_resolve("a", "a.png").await.is_err());
        assert!(!resolver.is_known_missing("a"));

        objects.set_failure("a.png", None);
        assert!(resolver.resolve("a", "a.png").await.is_some());
        assert_eq!(objects.lookups(), 2);
    }

    #[tokio::test]
    async fn test_clear_resets_records_and_negative_set() {
        let (resolver, objects, _temp) = setup(MemoryObjectStore::new());
        objects.insert("a.png", b"x".to_vec(), "image/png");
        resolver.resolve("a", "a.png").await;
        resolver.resolve("ghost", "ghost.png").await;
        assert_eq!(objects.lookups(), 2);

        resolver.clear();
        assert!(resolver.records().list().unwrap().is_empty());
        assert!(!resolver.is_known_missing("ghost"));

        // Upload the previously missing object; it is found now.
        objects.insert("ghost.png", b"x".to_vec(), "image/png");
        assert!(resolver.resolve("ghost", "ghost.png").await.is_some());
        assert!(resolver.resolve("a", "a.png").await.is_some());
        assert_eq!(objects.lookups(), 4);
    }

    #[tokio::test]
    async fn test_evict_removes_record_and_negative_entry() {
        let (resolver, objects, _temp) = setup(MemoryObjectStore::new());
        resolver.resolve("ghost", "ghost.png").await;
        objects.insert("a.png", b"x".to_vec(), "image/png");
        resolver.resolve("a", "a.png").await;

        resolver.evict("ghost");
        resolver.evict("a");
        assert!(!resolver.is_known_missing("ghost"));
        assert!(resolver.records().load("a").unwrap().is_none());

        resolver.resolve("a", "a.png").await;
        assert_eq!(objects.lookups(), 3);
    }

    #[tokio::test]
    async fn test_clear_during_lookup_is_not_undone() {
        let (resolver, objects, _temp) =
            setup(MemoryObjectStore::new().with_latency(Duration::from_millis(50)));
        objects.insert("a.png", b"x".to_vec(), "image/png");

        let pending = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve("a", "a.png").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        resolver.clear();

        // The caller still gets its URL, but nothing is recorded.
        assert!(pending.await.unwrap().is_some());
        assert!(resolver.records().load("a").unwrap().is_none());

        resolver.resolve("a", "a.png").await;
        assert_eq!(objects.lookups(), 2);
        assert!(resolver.records().load("a").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_evict_during_lookup_skips_negative_entry() {
        let (resolver, objects, _temp) =
            setup(MemoryObjectStore::new().with_latency(Duration::from_millis(50)));

        let pending = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve("ghost", "ghost.png").await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        resolver.evict("ghost");

        assert_eq!(pending.await.unwrap(), None);
        assert!(!resolver.is_known_missing("ghost"));

        objects.insert("ghost.png", b"x".to_vec(), "image/png");
        assert!(resolver.resolve("ghost", "ghost.png").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_share_one_lookup() {
        let (resolver, objects, _temp) =
            setup(MemoryObjectStore::new().with_latency(Duration::from_millis(50)));
        objects.insert("a.png", b"x".to_vec(), "image/png");

        let (a, b, c) = tokio::join!(
            resolver.resolve("a", "a.png"),
            resolver.resolve("a", "a.png"),
            resolver.resolve("a", "a.png"),
        );
        assert!(a.is_some());
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(objects.lookups(), 1);
    }
}
