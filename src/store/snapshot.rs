//! Documents, snapshots and change events delivered by a document store.

use serde_json::{Map, Value};

use super::path::DocumentRef;

/// Field map of a stored document.
pub type Fields = Map<String, Value>;

/// A document that exists remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub reference: DocumentRef,
    pub fields: Fields,
}

impl Document {
    pub fn new(reference: DocumentRef, fields: Fields) -> Self {
        Self { reference, fields }
    }

    /// Looks up a possibly nested field by dotted path (`address.city`).
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup(&self.fields, path)
    }
}

pub(crate) fn lookup<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// The state of a single document at some point in time.
///
/// `fields` is `None` when the document does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub reference: DocumentRef,
    pub fields: Option<Fields>,
    /// Whether the snapshot was served from the local cache.
    pub from_cache: bool,
}

impl DocumentSnapshot {
    pub fn exists(&self) -> bool {
        self.fields.is_some()
    }

    pub fn missing(reference: DocumentRef) -> Self {
        Self {
            reference,
            fields: None,
            from_cache: false,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        let reference = self.reference;
        self.fields.map(|fields| Document { reference, fields })
    }
}

impl From<Document> for DocumentSnapshot {
    fn from(document: Document) -> Self {
        Self {
            reference: document.reference,
            fields: Some(document.fields),
            from_cache: false,
        }
    }
}

/// Kind of change reported for a query result entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One entry of a query change batch.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document: Document,
}

impl DocumentChange {
    pub fn added(document: Document) -> Self {
        Self {
            kind: ChangeKind::Added,
            document,
        }
    }

    pub fn modified(document: Document) -> Self {
        Self {
            kind: ChangeKind::Modified,
            document,
        }
    }

    pub fn removed(document: Document) -> Self {
        Self {
            kind: ChangeKind::Removed,
            document,
        }
    }
}

/// A batch of changes to a query's result set, in delivery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub changes: Vec<DocumentChange>,
}

impl QuerySnapshot {
    pub fn new(changes: Vec<DocumentChange>) -> Self {
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
