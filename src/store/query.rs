//! Filtered collection queries.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::CollectionRef;
use super::snapshot::{lookup, Fields};

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    ArrayContains,
    In,
}

/// A single field filter. Field paths may be dotted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Equal, value)
    }

    /// Evaluates the filter against a document's fields.
    ///
    /// A missing field never matches, including for `NotEqual`.
    pub fn matches(&self, fields: &Fields) -> bool {
        let Some(actual) = lookup(fields, &self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Equal => actual == &self.value,
            FilterOp::NotEqual => actual != &self.value,
            FilterOp::LessThan => compare(actual, &self.value) == Some(Ordering::Less),
            FilterOp::LessThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::GreaterThan => compare(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::GreaterThanOrEqual => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::ArrayContains => actual
                .as_array()
                .is_some_and(|items| items.contains(&self.value)),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|candidates| candidates.contains(actual)),
        }
    }
}

/// Orders numbers with numbers and strings with strings; anything else is
/// incomparable.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// A filtered view of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    collection: Option<CollectionRef>,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

impl Query {
    /// All documents of a collection.
    pub fn collection(collection: CollectionRef) -> Self {
        Self {
            collection: Some(collection),
            filters: Vec::new(),
            limit: None,
        }
    }

    /// The sentinel query. Mirrors never listen to it.
    pub fn empty() -> Self {
        Self {
            collection: None,
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_none()
    }

    pub fn target(&self) -> Option<&CollectionRef> {
        self.collection.as_ref()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::equal(field, value))
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document's fields satisfy every filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.collection {
            None => write!(f, "<empty>"),
            Some(collection) => {
                write!(f, "{}", collection)?;
                for filter in &self.filters {
                    write!(f, " where {} {:?} {}", filter.field, filter.op, filter.value)?;
                }
                if let Some(limit) = self.limit {
                    write!(f, " limit {}", limit)?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_equal_and_not_equal() {
        let f = fields(json!({"owner": "alice"}));
        assert!(Filter::equal("owner", "alice").matches(&f));
        assert!(!Filter::equal("owner", "bob").matches(&f));
        assert!(Filter::new("owner", FilterOp::NotEqual, "bob").matches(&f));
    }

    #[test]
    fn test_missing_field_never_matches() {
        let f = fields(json!({"owner": "alice"}));
        assert!(!Filter::new("age", FilterOp::NotEqual, 3).matches(&f));
    }

    #[test]
    fn test_numeric_ordering() {
        let f = fields(json!({"age": 30}));
        assert!(Filter::new("age", FilterOp::GreaterThan, 18).matches(&f));
        assert!(Filter::new("age", FilterOp::GreaterThanOrEqual, 30.0).matches(&f));
        assert!(Filter::new("age", FilterOp::LessThanOrEqual, 30).matches(&f));
        assert!(!Filter::new("age", FilterOp::LessThan, 30).matches(&f));
        assert!(!Filter::new("age", FilterOp::LessThan, "40").matches(&f));
    }

    #[test]
    fn test_array_contains_and_in() {
        let f = fields(json!({"tags": ["a", "b"], "status": "open"}));
        assert!(Filter::new("tags", FilterOp::ArrayContains, "b").matches(&f));
        assert!(!Filter::new("tags", FilterOp::ArrayContains, "c").matches(&f));
        assert!(Filter::new("status", FilterOp::In, json!(["open", "draft"])).matches(&f));
        assert!(!Filter::new("status", FilterOp::In, json!(["closed"])).matches(&f));
    }

    #[test]
    fn test_query_requires_all_filters() {
        let users = CollectionRef::parse("users").unwrap();
        let query = Query::collection(users)
            .where_eq("team", "red")
            .filter(Filter::new("age", FilterOp::GreaterThan, 20));
        assert!(query.matches(&fields(json!({"team": "red", "age": 21}))));
        assert!(!query.matches(&fields(json!({"team": "red", "age": 19}))));
        assert!(!query.matches(&fields(json!({"team": "blue", "age": 21}))));
    }

    #[test]
    fn test_empty_query_sentinel() {
        assert!(Query::empty().is_empty());
        assert!(Query::empty().target().is_none());
        let users = CollectionRef::parse("users").unwrap();
        assert!(!Query::collection(users).is_empty());
        assert_eq!(Query::empty().to_string(), "<empty>");
    }
}
