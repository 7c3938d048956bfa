//! Entities: typed values mirrored from remote documents.
//!
//! An entity is a plain serde type that also carries a [`DocumentMeta`]
//! (skipped during serialization) recording which remote document it was
//! read from. The serde derive describes the field mapping; decoding a
//! document into an entity is fallible and reports a [`DecodeError`].
//!
//! ```ignore
//! #[derive(Clone, Serialize, Deserialize)]
//! struct Profile {
//!     #[serde(skip)]
//!     meta: DocumentMeta,
//!     name: String,
//! }
//!
//! impl Entity for Profile {
//!     fn meta(&self) -> &DocumentMeta { &self.meta }
//!     fn meta_mut(&mut self) -> &mut DocumentMeta { &mut self.meta }
//! }
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{Document, DocumentRef, DocumentSnapshot, Fields};

/// Identity used to match entities across change batches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&DocumentRef> for EntityKey {
    fn from(reference: &DocumentRef) -> Self {
        Self(reference.path().to_string())
    }
}

/// Remote identity of an entity.
///
/// Entities read from the store carry the reference of their document.
/// Entities created locally have none until they are inserted, and fall
/// back to a random local id.
#[derive(Debug, Clone)]
pub struct DocumentMeta {
    reference: Option<DocumentRef>,
    local_id: Uuid,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            reference: None,
            local_id: Uuid::new_v4(),
        }
    }
}

impl DocumentMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(reference: DocumentRef) -> Self {
        let mut meta = Self::default();
        meta.bind(reference);
        meta
    }

    pub fn reference(&self) -> Option<&DocumentRef> {
        self.reference.as_ref()
    }

    /// Attaches a remote reference. The empty sentinel detaches.
    pub fn bind(&mut self, reference: DocumentRef) {
        self.reference = if reference.is_empty() {
            None
        } else {
            Some(reference)
        };
    }

    pub fn identity(&self) -> EntityKey {
        match &self.reference {
            Some(reference) => EntityKey::from(reference),
            None => EntityKey(format!("local:{}", self.local_id)),
        }
    }
}

impl PartialEq for DocumentMeta {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for DocumentMeta {}

impl Hash for DocumentMeta {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Errors that can occur when turning a document into an entity.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Document does not exist: {0}")]
    Missing(String),

    #[error("Failed to decode document {path}: {source}")]
    Schema {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur when turning an entity into document fields.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to encode entity: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Entity does not serialize to a map (got {0})")]
    NotAnObject(&'static str),
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A typed value stored as a remote document.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn meta(&self) -> &DocumentMeta;

    fn meta_mut(&mut self) -> &mut DocumentMeta;

    fn reference(&self) -> Option<&DocumentRef> {
        self.meta().reference()
    }

    fn identity(&self) -> EntityKey {
        self.meta().identity()
    }

    /// Decodes an existing document and binds the result to it.
    fn from_document(document: &Document) -> Result<Self, DecodeError> {
        let mut entity: Self = serde_json::from_value(Value::Object(document.fields.clone()))
            .map_err(|source| DecodeError::Schema {
                path: document.reference.to_string(),
                source,
            })?;
        entity.meta_mut().bind(document.reference.clone());
        Ok(entity)
    }

    /// Decodes a snapshot. A snapshot of a missing document is an error.
    fn from_snapshot(snapshot: &DocumentSnapshot) -> Result<Self, DecodeError> {
        match &snapshot.fields {
            Some(fields) => Self::from_document(&Document::new(
                snapshot.reference.clone(),
                fields.clone(),
            )),
            None => Err(DecodeError::Missing(snapshot.reference.to_string())),
        }
    }

    fn to_fields(&self) -> Result<Fields, EncodeError> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(EncodeError::NotAnObject(kind_of(&other))),
        }
    }
}
