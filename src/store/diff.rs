//! Change calculation between two query result sets.
//!
//! Backends that cannot push change events themselves (the in-memory store
//! and the polling REST client) keep the previous result set of every
//! listener and turn the next one into added/modified/removed events.

use std::collections::{HashMap, HashSet};

use super::path::DocumentRef;
use super::snapshot::{Document, DocumentChange};

/// Calculates the changes that turn `previous` into `current`.
///
/// Removals come first in `previous` order, followed by additions and
/// modifications in `current` order. Documents whose fields are unchanged
/// produce no event.
pub fn diff_results(previous: &[Document], current: &[Document]) -> Vec<DocumentChange> {
    let prev_map: HashMap<&DocumentRef, &Document> =
        previous.iter().map(|d| (&d.reference, d)).collect();
    let curr_refs: HashSet<&DocumentRef> = current.iter().map(|d| &d.reference).collect();

    let mut changes = Vec::new();

    for doc in previous {
        if !curr_refs.contains(&doc.reference) {
            changes.push(DocumentChange::removed(doc.clone()));
        }
    }

    for doc in current {
        match prev_map.get(&doc.reference) {
            None => changes.push(DocumentChange::added(doc.clone())),
            Some(prev) if prev.fields != doc.fields => {
                changes.push(DocumentChange::modified(doc.clone()))
            }
            Some(_) => {}
        }
    }

    changes
}
