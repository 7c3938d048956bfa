//! Document and collection paths.
//!
//! Paths are slash separated. A document path has an even number of
//! segments (`users/alice`, `users/alice/posts/1`), a collection path an
//! odd number (`users`, `users/alice/posts`).

use std::fmt;

use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of generated document ids, matching the vendor SDK.
const AUTO_ID_LEN: usize = 20;

/// Errors that can occur when parsing a path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Path contains an empty segment: '{0}'")]
    EmptySegment(String),

    #[error("Not a document path (expected an even number of segments): '{0}'")]
    NotADocument(String),

    #[error("Not a collection path (expected an odd number of segments): '{0}'")]
    NotACollection(String),
}

fn segments(path: &str) -> Result<Vec<&str>, PathError> {
    let trimmed = path.trim_matches('/');
    let parts: Vec<&str> = trimmed.split('/').collect();
    if trimmed.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    Ok(parts)
}

/// Reference to a single remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentRef {
    path: String,
}

impl DocumentRef {
    /// Parses a document path such as `users/alice`.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let parts = segments(path)?;
        if parts.len() % 2 != 0 {
            return Err(PathError::NotADocument(path.to_string()));
        }
        Ok(Self {
            path: parts.join("/"),
        })
    }

    /// The sentinel target. Mirrors never listen to it.
    pub fn empty() -> Self {
        Self {
            path: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The last path segment.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// The collection containing this document.
    pub fn parent(&self) -> CollectionRef {
        let parent = self
            .path
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .unwrap_or_default();
        CollectionRef {
            path: parent.to_string(),
        }
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

impl TryFrom<String> for DocumentRef {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            return Ok(Self::empty());
        }
        Self::parse(&value)
    }
}

impl From<DocumentRef> for String {
    fn from(reference: DocumentRef) -> Self {
        reference.path
    }
}

/// Reference to a remote collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionRef {
    path: String,
}

impl CollectionRef {
    /// Parses a collection path such as `users` or `users/alice/posts`.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let parts = segments(path)?;
        if parts.len() % 2 != 1 {
            return Err(PathError::NotACollection(path.to_string()));
        }
        Ok(Self {
            path: parts.join("/"),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The collection id (last segment).
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// The document owning this collection, if it is a subcollection.
    pub fn parent(&self) -> Option<DocumentRef> {
        self.path
            .rsplit_once('/')
            .map(|(parent, _)| DocumentRef {
                path: parent.to_string(),
            })
    }

    /// Reference to the document `id` inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentRef, PathError> {
        DocumentRef::parse(&format!("{}/{}", self.path, id))
    }

    /// Reference to a new document with a generated id.
    pub fn new_doc(&self) -> DocumentRef {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(AUTO_ID_LEN)
            .map(char::from)
            .collect();
        DocumentRef {
            path: format!("{}/{}", self.path, id),
        }
    }
}

impl TryFrom<String> for CollectionRef {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CollectionRef> for String {
    fn from(collection: CollectionRef) -> Self {
        collection.path
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
