//! Remote document store port.
//!
//! The [`DocumentStore`] trait is the seam between the mirrors and the
//! vendor database. Two backends ship with the crate:
//!
//! - [`MemoryStore`]: in-process store with synchronous change delivery,
//!   used by tests and local development.
//! - [`RestStore`]: the vendor REST API, with real-time listening emulated
//!   by polling.
//!
//! ## Listening
//!
//! `listen_document` and `listen_query` take a handler that the backend
//! invokes serially, once per snapshot, until the returned
//! [`ListenerRegistration`] is removed. Query handlers receive batches of
//! added/modified/removed changes; the first batch describes the full
//! initial result set and is delivered even when it is empty.

mod diff;
mod error;
mod memory;
mod path;
mod query;
mod registration;
mod rest;
mod snapshot;
mod value;

use std::sync::Arc;

use async_trait::async_trait;

pub use diff::diff_results;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use path::{CollectionRef, DocumentRef, PathError};
pub use query::{Filter, FilterOp, Query};
pub use registration::ListenerRegistration;
pub use rest::RestStore;
pub use snapshot::{ChangeKind, Document, DocumentChange, DocumentSnapshot, Fields, QuerySnapshot};

/// Where a one-shot read should be served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchSource {
    #[default]
    Server,
    Cache,
}

/// Handler for single-document snapshots.
pub type DocumentHandler = Arc<dyn Fn(StoreResult<DocumentSnapshot>) + Send + Sync>;

/// Handler for query change batches.
pub type QueryHandler = Arc<dyn Fn(StoreResult<QuerySnapshot>) + Send + Sync>;

/// Client of a remote document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document.
    ///
    /// A missing document is not an error; the snapshot reports
    /// `exists() == false`. With [`FetchSource::Cache`] an uncached document
    /// yields [`StoreError::CacheMiss`].
    async fn get(&self, reference: &DocumentRef, source: FetchSource)
        -> StoreResult<DocumentSnapshot>;

    /// Creates the document or merges `fields` into it. Fields not named in
    /// `fields` are left untouched.
    async fn set_merge(&self, reference: &DocumentRef, fields: Fields) -> StoreResult<()>;

    /// Deletes the document. Deleting a missing document succeeds.
    async fn delete(&self, reference: &DocumentRef) -> StoreResult<()>;

    /// Subscribes to snapshots of one document.
    fn listen_document(
        &self,
        reference: &DocumentRef,
        handler: DocumentHandler,
    ) -> ListenerRegistration;

    /// Subscribes to change batches of a query's result set.
    fn listen_query(&self, query: &Query, handler: QueryHandler) -> ListenerRegistration;
}
