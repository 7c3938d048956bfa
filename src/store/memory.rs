//! In-process document store.
//!
//! Holds documents in memory, evaluates queries locally and delivers
//! snapshots to listeners synchronously, from the thread that performed the
//! write. Handlers run after the internal lock is released, so they may call
//! back into the store.
//!
//! Like the vendor SDK, the store keeps a local cache that is filled by
//! server reads, delivered snapshots and local writes. Reads with
//! [`FetchSource::Cache`] only see that cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use serde_json::Value;

use super::diff::diff_results;
use super::error::{StoreError, StoreResult};
use super::path::DocumentRef;
use super::query::Query;
use super::registration::ListenerRegistration;
use super::snapshot::{Document, DocumentSnapshot, Fields, QuerySnapshot};
use super::{DocumentHandler, DocumentStore, FetchSource, QueryHandler};

struct DocumentListener {
    reference: DocumentRef,
    handler: DocumentHandler,
    last: Option<Fields>,
}

struct QueryListener {
    query: Query,
    handler: QueryHandler,
    results: Vec<Document>,
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<DocumentRef, Fields>,
    /// `None` records a document known to be missing.
    cache: HashMap<DocumentRef, Option<Fields>>,
    document_listeners: HashMap<u64, DocumentListener>,
    query_listeners: HashMap<u64, QueryListener>,
    next_listener_id: u64,
}

/// A pending handler call, run once the lock is released.
enum Delivery {
    Document(DocumentHandler, DocumentSnapshot),
    Query(QueryHandler, QuerySnapshot),
}

impl Delivery {
    fn run(self) {
        match self {
            Delivery::Document(handler, snapshot) => handler(Ok(snapshot)),
            Delivery::Query(handler, snapshot) => handler(Ok(snapshot)),
        }
    }
}

impl Inner {
    fn next_id(&mut self) -> u64 {
        self.next_listener_id += 1;
        self.next_listener_id
    }

    fn run_query(&self, query: &Query) -> Vec<Document> {
        let Some(collection) = query.target() else {
            return Vec::new();
        };
        let matching = self
            .documents
            .iter()
            .filter(|(reference, fields)| {
                reference.parent() == *collection && query.matches(fields)
            })
            .map(|(reference, fields)| Document::new(reference.clone(), fields.clone()));
        match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        }
    }

    /// Records a local write and collects the snapshots it produces.
    fn after_write(&mut self, reference: &DocumentRef) -> Vec<Delivery> {
        let current = self.documents.get(reference).cloned();
        self.cache.insert(reference.clone(), current.clone());

        let mut deliveries = Vec::new();

        for listener in self.document_listeners.values_mut() {
            if &listener.reference == reference && listener.last != current {
                listener.last = current.clone();
                deliveries.push(Delivery::Document(
                    Arc::clone(&listener.handler),
                    DocumentSnapshot {
                        reference: reference.clone(),
                        fields: current.clone(),
                        from_cache: false,
                    },
                ));
            }
        }

        let ids: Vec<u64> = self.query_listeners.keys().copied().collect();
        for id in ids {
            let results = match self.query_listeners.get(&id) {
                Some(listener) => self.run_query(&listener.query),
                None => continue,
            };
            if let Some(listener) = self.query_listeners.get_mut(&id) {
                let changes = diff_results(&listener.results, &results);
                listener.results = results;
                if !changes.is_empty() {
                    deliveries.push(Delivery::Query(
                        Arc::clone(&listener.handler),
                        QuerySnapshot::new(changes),
                    ));
                }
            }
        }

        deliveries
    }
}

/// Merges `update` into `target`, recursing into nested maps.
fn merge_fields(target: &mut Fields, update: Fields) {
    for (key, value) in update {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_fields(existing, nested)
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// In-memory [`DocumentStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deliver(deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            delivery.run();
        }
    }

    /// Replaces a document's fields entirely and notifies listeners.
    pub fn set(&self, reference: &DocumentRef, fields: Fields) {
        let deliveries = {
            let mut inner = self.lock();
            inner.documents.insert(reference.clone(), fields);
            inner.after_write(reference)
        };
        Self::deliver(deliveries);
    }

    /// Returns the stored fields of a document, bypassing the cache.
    pub fn document(&self, reference: &DocumentRef) -> Option<Fields> {
        self.lock().documents.get(reference).cloned()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.lock().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().documents.is_empty()
    }

    /// Seeds the local cache without touching stored data, as a persisted
    /// offline cache from an earlier session would.
    pub fn prime_cache(&self, reference: &DocumentRef, fields: Option<Fields>) {
        self.lock().cache.insert(reference.clone(), fields);
    }

    /// Number of registered listeners of either kind.
    pub fn listener_count(&self) -> usize {
        let inner = self.lock();
        inner.document_listeners.len() + inner.query_listeners.len()
    }

    fn registration(&self, id: u64) -> ListenerRegistration {
        let weak: Weak<Mutex<Inner>> = Arc::downgrade(&self.inner);
        ListenerRegistration::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
                inner.document_listeners.remove(&id);
                inner.query_listeners.remove(&id);
            }
        })
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(
        &self,
        reference: &DocumentRef,
        source: FetchSource,
    ) -> StoreResult<DocumentSnapshot> {
        let mut inner = self.lock();
        match source {
            FetchSource::Server => {
                let fields = inner.documents.get(reference).cloned();
                inner.cache.insert(reference.clone(), fields.clone());
                Ok(DocumentSnapshot {
                    reference: reference.clone(),
                    fields,
                    from_cache: false,
                })
            }
            FetchSource::Cache => match inner.cache.get(reference) {
                Some(fields) => Ok(DocumentSnapshot {
                    reference: reference.clone(),
                    fields: fields.clone(),
                    from_cache: true,
                }),
                None => Err(StoreError::CacheMiss(reference.to_string())),
            },
        }
    }

    async fn set_merge(&self, reference: &DocumentRef, fields: Fields) -> StoreResult<()> {
        let deliveries = {
            let mut inner = self.lock();
            let document = inner.documents.entry(reference.clone()).or_default();
            merge_fields(document, fields);
            inner.after_write(reference)
        };
        Self::deliver(deliveries);
        Ok(())
    }

    async fn delete(&self, reference: &DocumentRef) -> StoreResult<()> {
        let deliveries = {
            let mut inner = self.lock();
            if inner.documents.remove(reference).is_none() {
                return Ok(());
            }
            inner.after_write(reference)
        };
        Self::deliver(deliveries);
        Ok(())
    }

    fn listen_document(
        &self,
        reference: &DocumentRef,
        handler: DocumentHandler,
    ) -> ListenerRegistration {
        let (id, snapshot) = {
            let mut inner = self.lock();
            let id = inner.next_id();
            let fields = inner.documents.get(reference).cloned();
            inner.cache.insert(reference.clone(), fields.clone());
            inner.document_listeners.insert(
                id,
                DocumentListener {
                    reference: reference.clone(),
                    handler: Arc::clone(&handler),
                    last: fields.clone(),
                },
            );
            let snapshot = DocumentSnapshot {
                reference: reference.clone(),
                fields,
                from_cache: false,
            };
            (id, snapshot)
        };
        handler(Ok(snapshot));
        self.registration(id)
    }

    fn listen_query(&self, query: &Query, handler: QueryHandler) -> ListenerRegistration {
        let (id, snapshot) = {
            let mut inner = self.lock();
            let id = inner.next_id();
            let results = inner.run_query(query);
            for document in &results {
                inner
                    .cache
                    .insert(document.reference.clone(), Some(document.fields.clone()));
            }
            let snapshot = QuerySnapshot::new(diff_results(&[], &results));
            inner.query_listeners.insert(
                id,
                QueryListener {
                    query: query.clone(),
                    handler: Arc::clone(&handler),
                    results,
                },
            );
            (id, snapshot)
        };
        handler(Ok(snapshot));
        self.registration(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::path::CollectionRef;
    use crate::store::snapshot::ChangeKind;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn doc_ref(path: &str) -> DocumentRef {
        DocumentRef::parse(path).unwrap()
    }

    fn collect_query() -> (QueryHandler, Arc<Mutex<Vec<QuerySnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: QueryHandler = Arc::new(move |result| {
            sink.lock().unwrap().push(result.unwrap());
        });
        (handler, seen)
    }

    #[tokio::test]
    async fn test_get_missing_document() {
        let store = MemoryStore::new();
        let snap = store.get(&doc_ref("users/a"), FetchSource::Server).await.unwrap();
        assert!(!snap.exists());
    }

    #[tokio::test]
    async fn test_set_merge_keeps_other_fields() {
        let store = MemoryStore::new();
        let reference = doc_ref("users/a");
        store
            .set_merge(&reference, fields(json!({"name": "A", "address": {"city": "Oslo", "zip": "1"}})))
            .await
            .unwrap();
        store
            .set_merge(&reference, fields(json!({"age": 3, "address": {"city": "Bergen"}})))
            .await
            .unwrap();

        let stored = store.document(&reference).unwrap();
        assert_eq!(
            Value::Object(stored),
            json!({"name": "A", "age": 3, "address": {"city": "Bergen", "zip": "1"}})
        );
    }

    #[tokio::test]
    async fn test_cache_source_misses_until_read() {
        let store = MemoryStore::new();
        let reference = doc_ref("users/a");
        store.set(&reference, fields(json!({"name": "A"})));
        store.lock().cache.clear();

        let err = store.get(&reference, FetchSource::Cache).await.unwrap_err();
        assert!(err.is_cache_miss());

        store.get(&reference, FetchSource::Server).await.unwrap();
        let cached = store.get(&reference, FetchSource::Cache).await.unwrap();
        assert!(cached.from_cache);
        assert_eq!(cached.fields.unwrap()["name"], json!("A"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryStore::new();
        store.delete(&doc_ref("users/a")).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_query_listener_receives_initial_and_changes() {
        let store = MemoryStore::new();
        store.set(&doc_ref("users/a"), fields(json!({"team": "red"})));
        store.set(&doc_ref("users/b"), fields(json!({"team": "blue"})));
        store.set(&doc_ref("teams/red"), fields(json!({"team": "red"})));

        let users = CollectionRef::parse("users").unwrap();
        let (handler, seen) = collect_query();
        let registration = store.listen_query(&Query::collection(users).where_eq("team", "red"), handler);

        store.set(&doc_ref("users/c"), fields(json!({"team": "red"})));
        store
            .set_merge(&doc_ref("users/a"), fields(json!({"name": "A"})))
            .await
            .unwrap();
        store
            .set_merge(&doc_ref("users/b"), fields(json!({"name": "B"})))
            .await
            .unwrap();
        store.delete(&doc_ref("users/c")).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].changes.len(), 1);
        assert_eq!(seen[0].changes[0].document.reference.id(), "a");
        assert_eq!(seen[1].changes[0].kind, ChangeKind::Added);
        assert_eq!(seen[2].changes[0].kind, ChangeKind::Modified);
        assert_eq!(seen[3].changes[0].kind, ChangeKind::Removed);

        registration.remove();
        assert_eq!(store.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_result_delivers_empty_snapshot() {
        let store = MemoryStore::new();
        let users = CollectionRef::parse("users").unwrap();
        let (handler, seen) = collect_query();
        let _registration = store.listen_query(&Query::collection(users), handler);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_empty());
    }

    #[tokio::test]
    async fn test_query_limit() {
        let store = MemoryStore::new();
        for id in ["a", "b", "c"] {
            store.set(&doc_ref(&format!("users/{}", id)), fields(json!({})));
        }
        let users = CollectionRef::parse("users").unwrap();
        let (handler, seen) = collect_query();
        let _registration = store.listen_query(&Query::collection(users).limit(2), handler);
        assert_eq!(seen.lock().unwrap()[0].changes.len(), 2);
    }

    #[tokio::test]
    async fn test_document_listener_stops_after_remove() {
        let store = MemoryStore::new();
        let reference = doc_ref("users/a");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler: DocumentHandler = Arc::new(move |result| {
            sink.lock().unwrap().push(result.unwrap());
        });

        let registration = store.listen_document(&reference, handler);
        store.set(&reference, fields(json!({"v": 1})));
        store.set(&reference, fields(json!({"v": 1})));
        registration.remove();
        store.set(&reference, fields(json!({"v": 2})));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].exists());
        assert_eq!(seen[1].fields.as_ref().unwrap()["v"], json!(1));
    }

    #[tokio::test]
    async fn test_handler_may_call_back_into_store() {
        let store = MemoryStore::new();
        let reference = doc_ref("users/a");
        let inner_store = store.clone();
        let handler: DocumentHandler = Arc::new(move |_| {
            let _ = inner_store.len();
        });
        let _registration = store.listen_document(&reference, handler);
        store.set(&reference, fields(json!({"v": 1})));
    }
}
