//! Applying change batches to an ordered entity list.

use crate::entity::{Entity, EntityKey};
use crate::store::{ChangeKind, DocumentChange};

use super::error::MirrorError;

/// Applies `changes` to `items` in delivery order.
///
/// Additions append without a duplicate check. Modifications replace the
/// entry with the same identity in place; removals delete it. A change that
/// cannot be applied (unknown identity, undecodable document) is skipped
/// and reported in the returned list.
pub fn apply_changes<T: Entity>(
    items: &mut Vec<T>,
    changes: &[DocumentChange],
) -> Vec<MirrorError> {
    let mut errors: Vec<MirrorError> = Vec::new();

    for change in changes {
        let key = EntityKey::from(&change.document.reference);
        match change.kind {
            ChangeKind::Added => match T::from_document(&change.document) {
                Ok(entity) => items.push(entity),
                Err(e) => errors.push(e.into()),
            },
            ChangeKind::Modified => {
                let Some(index) = position(items, &key) else {
                    errors.push(MirrorError::NotFound(key));
                    continue;
                };
                match T::from_document(&change.document) {
                    Ok(entity) => items[index] = entity,
                    Err(e) => errors.push(e.into()),
                }
            }
            ChangeKind::Removed => match position(items, &key) {
                Some(index) => {
                    items.remove(index);
                }
                None => errors.push(MirrorError::NotFound(key)),
            },
        }
    }

    errors
}

fn position<T: Entity>(items: &[T], key: &EntityKey) -> Option<usize> {
    items.iter().position(|item| &item.identity() == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::Person;
    use crate::store::{Document, DocumentRef};
    use serde_json::{json, Value};

    fn doc(id: &str, value: Value) -> Document {
        Document::new(
            DocumentRef::parse(&format!("people/{}", id)).unwrap(),
            value.as_object().cloned().unwrap(),
        )
    }

    fn person(id: &str, name: &str) -> Document {
        doc(id, json!({ "name": name }))
    }

    fn names(items: &[Person]) -> Vec<&str> {
        items.iter().map(|p| p.name.as_str()).collect()
    }

    /// Applies one event to a plain `(id, name)` list.
    fn model_apply(model: &mut Vec<(String, String)>, kind: ChangeKind, id: &str, name: &str) {
        let index = model.iter().position(|(i, _)| i == id);
        match (kind, index) {
            (ChangeKind::Added, _) => model.push((id.to_string(), name.to_string())),
            (ChangeKind::Modified, Some(i)) => model[i].1 = name.to_string(),
            (ChangeKind::Removed, Some(i)) => {
                model.remove(i);
            }
            (_, None) => {}
        }
    }

    #[test]
    fn test_add_modify_remove_preserves_order() {
        let mut items: Vec<Person> = Vec::new();
        let errors = apply_changes(
            &mut items,
            &[
                DocumentChange::added(person("a", "A")),
                DocumentChange::added(person("b", "B")),
                DocumentChange::added(person("c", "C")),
            ],
        );
        assert!(errors.is_empty());

        apply_changes(&mut items, &[DocumentChange::modified(person("b", "B2"))]);
        assert_eq!(names(&items), vec!["A", "B2", "C"]);

        apply_changes(&mut items, &[DocumentChange::removed(person("a", "A"))]);
        assert_eq!(names(&items), vec!["B2", "C"]);
    }

    #[test]
    fn test_unknown_identity_is_reported_and_batch_continues() {
        let mut items: Vec<Person> = Vec::new();
        let errors = apply_changes(
            &mut items,
            &[
                DocumentChange::modified(person("x", "X")),
                DocumentChange::added(person("a", "A")),
                DocumentChange::removed(person("y", "Y")),
            ],
        );
        assert_eq!(names(&items), vec!["A"]);
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], MirrorError::NotFound(k) if k.as_str() == "people/x"));
        assert!(matches!(&errors[1], MirrorError::NotFound(k) if k.as_str() == "people/y"));
    }

    #[test]
    fn test_decode_failure_skips_entry() {
        let mut items: Vec<Person> = Vec::new();
        apply_changes(&mut items, &[DocumentChange::added(person("a", "A"))]);
        let errors = apply_changes(
            &mut items,
            &[
                DocumentChange::added(doc("b", json!({ "name": 7 }))),
                DocumentChange::modified(doc("a", json!({ "age": "old" }))),
                DocumentChange::added(person("c", "C")),
            ],
        );
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, MirrorError::Decode(_))));
        assert_eq!(names(&items), vec!["A", "C"]);
    }

    #[test]
    fn test_replay_matches_reference_model() {
        use ChangeKind::*;
        let events = [
            (Added, "a", "A"),
            (Added, "b", "B"),
            (Modified, "a", "A1"),
            (Removed, "z", ""),
            (Added, "c", "C"),
            (Removed, "b", ""),
            (Modified, "q", "Q"),
            (Modified, "c", "C1"),
            (Added, "d", "D"),
            (Removed, "a", ""),
            (Modified, "d", "D1"),
        ];

        let mut items: Vec<Person> = Vec::new();
        let mut model: Vec<(String, String)> = Vec::new();
        let mut reported = 0;

        // Deliver in uneven batches to exercise batch boundaries.
        for batch in events.chunks(3) {
            let changes: Vec<DocumentChange> = batch
                .iter()
                .map(|(kind, id, name)| DocumentChange {
                    kind: *kind,
                    document: person(id, name),
                })
                .collect();
            reported += apply_changes(&mut items, &changes).len();
            for (kind, id, name) in batch {
                model_apply(&mut model, *kind, id, name);
            }
        }

        let mirrored: Vec<(String, String)> = items
            .iter()
            .map(|p| (p.reference().unwrap().id().to_string(), p.name.clone()))
            .collect();
        assert_eq!(mirrored, model);
        assert_eq!(reported, 2);
    }
}
