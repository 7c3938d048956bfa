//! Live in-memory mirrors of remote documents and query results.
//!
//! A [`CollectionMirror`] keeps an ordered list of entities in step with a
//! query; a [`DocumentMirror`] holds the latest decoded value of a single
//! document. Both publish their state through a `tokio::sync::watch`
//! channel and share their start/stop behavior through an internal
//! lifecycle helper.

mod collection;
mod document;
mod error;
mod lifecycle;
mod reconcile;

pub use collection::{CollectionMirror, CollectionState};
pub use document::{DocumentMirror, DocumentState};
pub use error::MirrorError;
pub use reconcile::apply_changes;

/// Start/stop capability shared by mirrors.
pub trait Listener {
    /// Name under which activity is reported.
    fn name(&self) -> &str;

    /// Subscribes to the target. A no-op if already listening or if the
    /// target is the empty sentinel.
    fn start(&self);

    /// Releases the subscription and clears the active flag. Stopping a
    /// stopped listener only logs.
    fn stop(&self);

    fn is_listening(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A store that hands delivery control to the test.

    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::store::{
        DocumentHandler, DocumentRef, DocumentSnapshot, DocumentStore, FetchSource, Fields,
        ListenerRegistration, Query, QueryHandler, QuerySnapshot, StoreError, StoreResult,
    };

    #[derive(Default)]
    pub(crate) struct ScriptedStore {
        query_handlers: Mutex<Vec<QueryHandler>>,
        document_handlers: Mutex<Vec<DocumentHandler>>,
    }

    impl ScriptedStore {
        pub fn query_registrations(&self) -> usize {
            self.query_handlers.lock().unwrap().len()
        }

        pub fn emit_query(&self, result: StoreResult<QuerySnapshot>) {
            let handler = self.query_handlers.lock().unwrap().last().cloned().unwrap();
            handler(result);
        }

        pub fn emit_document(&self, result: StoreResult<DocumentSnapshot>) {
            let handler = self
                .document_handlers
                .lock()
                .unwrap()
                .last()
                .cloned()
                .unwrap();
            handler(result);
        }
    }

    #[async_trait]
    impl DocumentStore for ScriptedStore {
        async fn get(&self, _: &DocumentRef, _: FetchSource) -> StoreResult<DocumentSnapshot> {
            Err(StoreError::Unavailable("scripted".to_string()))
        }

        async fn set_merge(&self, _: &DocumentRef, _: Fields) -> StoreResult<()> {
            Err(StoreError::Unavailable("scripted".to_string()))
        }

        async fn delete(&self, _: &DocumentRef) -> StoreResult<()> {
            Err(StoreError::Unavailable("scripted".to_string()))
        }

        fn listen_document(&self, _: &DocumentRef, handler: DocumentHandler) -> ListenerRegistration {
            self.document_handlers.lock().unwrap().push(Arc::clone(&handler));
            ListenerRegistration::inert()
        }

        fn listen_query(&self, _: &Query, handler: QueryHandler) -> ListenerRegistration {
            self.query_handlers.lock().unwrap().push(Arc::clone(&handler));
            ListenerRegistration::inert()
        }
    }
}
