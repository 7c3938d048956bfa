//! One-shot reads and writes of entities.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::entity::{DecodeError, EncodeError, Entity};
use crate::store::{CollectionRef, DocumentRef, DocumentStore, FetchSource, StoreError};

/// Errors that can occur when persisting an entity.
#[derive(Error, Debug)]
pub enum PersistError {
    /// The entity has never been bound to a remote document.
    #[error("Entity {0} has no document reference")]
    MissingReference(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads and writes entities through a [`DocumentStore`].
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn DocumentStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    fn reference<T: Entity>(entity: &T) -> Result<DocumentRef, PersistError> {
        match entity.reference() {
            Some(reference) => Ok(reference.clone()),
            None => {
                let identity = entity.identity();
                warn!("Entity {} has no document reference", identity);
                Err(PersistError::MissingReference(identity.to_string()))
            }
        }
    }

    /// Merges the entity's fields into its document, creating it if needed.
    pub async fn push<T: Entity>(&self, entity: &T) -> Result<(), PersistError> {
        let reference = Self::reference(entity)?;
        let fields = entity.to_fields()?;
        self.store.set_merge(&reference, fields).await?;
        debug!("Pushed {}", reference);
        Ok(())
    }

    /// Reads the entity's document from the server into a fresh value.
    pub async fn pull<T: Entity>(&self, entity: &T) -> Result<T, PersistError> {
        let reference = Self::reference(entity)?;
        let snapshot = self.store.get(&reference, FetchSource::Server).await?;
        Ok(T::from_snapshot(&snapshot)?)
    }

    /// Reads from the local cache, falling back to the server when the cache
    /// has no usable copy.
    pub async fn pull_cached<T: Entity>(&self, entity: &T) -> Result<T, PersistError> {
        let reference = Self::reference(entity)?;
        match self.store.get(&reference, FetchSource::Cache).await {
            Ok(snapshot) => match T::from_snapshot(&snapshot) {
                Ok(value) => return Ok(value),
                Err(e) => debug!("Cached copy of {} unusable: {}", reference, e),
            },
            Err(e) if e.is_cache_miss() => debug!("{} not cached", reference),
            Err(e) => debug!("Cache read of {} failed: {}", reference, e),
        }
        self.pull(entity).await
    }

    pub async fn delete<T: Entity>(&self, entity: &T) -> Result<(), PersistError> {
        let reference = Self::reference(entity)?;
        self.store.delete(&reference).await?;
        debug!("Deleted {}", reference);
        Ok(())
    }

    /// Binds the entity to a new document in `collection` and pushes it.
    pub async fn insert<T: Entity>(
        &self,
        collection: &CollectionRef,
        entity: &mut T,
    ) -> Result<DocumentRef, PersistError> {
        let reference = collection.new_doc();
        entity.meta_mut().bind(reference.clone());
        self.push(entity).await?;
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::Person;
    use crate::entity::DocumentMeta;
    use crate::store::{Fields, MemoryStore};
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, Persistence) {
        let store = Arc::new(MemoryStore::new());
        let persistence = Persistence::new(store.clone());
        (store, persistence)
    }

    fn bound(path: &str, name: &str) -> Person {
        Person {
            meta: DocumentMeta::with_reference(DocumentRef::parse(path).unwrap()),
            name: name.to_string(),
            age: 0,
        }
    }

    #[tokio::test]
    async fn test_push_merges_fields() {
        let (store, persistence) = setup();
        let reference = DocumentRef::parse("people/ada").unwrap();
        store.set(&reference, fields(json!({"name": "Old", "email": "a@b.c"})));

        persistence.push(&bound("people/ada", "Ada")).await.unwrap();

        assert_eq!(
            Value::Object(store.document(&reference).unwrap()),
            json!({"name": "Ada", "age": 0, "email": "a@b.c"})
        );
    }

    #[tokio::test]
    async fn test_missing_reference_is_an_error() {
        let (store, persistence) = setup();
        let person = Person::new("Ada", 36);
        assert!(matches!(
            persistence.push(&person).await,
            Err(PersistError::MissingReference(_))
        ));
        assert!(matches!(
            persistence.delete(&person).await,
            Err(PersistError::MissingReference(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_pull_returns_fresh_value() {
        let (store, persistence) = setup();
        let reference = DocumentRef::parse("people/ada").unwrap();
        store.set(&reference, fields(json!({"name": "Ada", "age": 36})));

        let pulled = persistence.pull(&bound("people/ada", "stale")).await.unwrap();
        assert_eq!(pulled.name, "Ada");
        assert_eq!(pulled.age, 36);
        assert_eq!(pulled.reference(), Some(&reference));
    }

    #[tokio::test]
    async fn test_pull_missing_document_fails_to_decode() {
        let (_, persistence) = setup();
        assert!(matches!(
            persistence.pull(&bound("people/ghost", "x")).await,
            Err(PersistError::Decode(DecodeError::Missing(_)))
        ));
    }

    #[tokio::test]
    async fn test_pull_cached_prefers_cache_and_falls_back() {
        let (store, persistence) = setup();
        let reference = DocumentRef::parse("people/ada").unwrap();
        store.set(&reference, fields(json!({"name": "Server"})));

        // Cached copy wins over the server.
        store.prime_cache(&reference, Some(fields(json!({"name": "Cached"}))));
        let person = bound("people/ada", "");
        assert_eq!(persistence.pull_cached(&person).await.unwrap().name, "Cached");

        // An undecodable cached copy falls back to the server.
        store.prime_cache(&reference, Some(fields(json!({"name": 1}))));
        assert_eq!(persistence.pull_cached(&person).await.unwrap().name, "Server");

        // So does a cached "missing" entry for a document that now exists.
        let other = DocumentRef::parse("people/bob").unwrap();
        store.set(&other, fields(json!({"name": "Bob"})));
        store.prime_cache(&other, None);
        assert_eq!(
            persistence.pull_cached(&bound("people/bob", "")).await.unwrap().name,
            "Bob"
        );
    }

    #[tokio::test]
    async fn test_insert_assigns_reference() {
        let (store, persistence) = setup();
        let people = CollectionRef::parse("people").unwrap();
        let mut person = Person::new("Ada", 36);

        let reference = persistence.insert(&people, &mut person).await.unwrap();
        assert_eq!(person.reference(), Some(&reference));
        assert_eq!(reference.parent(), people);
        assert_eq!(store.document(&reference).unwrap()["name"], json!("Ada"));

        persistence.delete(&person).await.unwrap();
        assert!(store.is_empty());
    }
}
