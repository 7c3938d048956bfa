//! docmirror
//!
//! Keeps observable in-memory mirrors of remote documents and query result
//! sets in sync with a cloud document store, and resolves remotely stored
//! assets to download URLs through a disk-persisted locator cache.

pub mod assets;
pub mod config;
pub mod entity;
pub mod mirror;
pub mod models;
pub mod persist;
pub mod status;
pub mod store;

pub use assets::{
    AssetImage, AssetPhase, AssetResolver, AssetView, ImageLoader, ImageRequest, LocatorRecord,
    LocatorStore, MemoryObjectStore, ObjectMetadata, ObjectStore, RecordError, RestObjectStore,
    StorageError,
};
pub use config::CloudConfig;
pub use entity::{DecodeError, DocumentMeta, EncodeError, Entity, EntityKey};
pub use mirror::{
    CollectionMirror, CollectionState, DocumentMirror, DocumentState, Listener, MirrorError,
};
pub use models::RawDocument;
pub use persist::{PersistError, Persistence};
pub use status::{FileStatus, MemoryStatus, StatusPort};
pub use store::{
    ChangeKind, CollectionRef, Document, DocumentChange, DocumentRef, DocumentSnapshot,
    DocumentStore, FetchSource, Filter, FilterOp, ListenerRegistration, MemoryStore, PathError,
    Query, QuerySnapshot, RestStore, StoreError,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
