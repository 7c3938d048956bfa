//! Ready-made entity types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{DocumentMeta, Entity};
use crate::store::Fields;

/// An entity without a schema: the document's fields as they are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(skip)]
    pub meta: DocumentMeta,
    #[serde(flatten)]
    pub fields: Fields,
}

impl RawDocument {
    pub fn new(fields: Fields) -> Self {
        Self {
            meta: DocumentMeta::new(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl Entity for RawDocument {
    fn meta(&self) -> &DocumentMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut DocumentMeta {
        &mut self.meta
    }
}

impl fmt::Display for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = self
            .reference()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "(unsaved)".to_string());
        writeln!(f, "{}", path)?;
        let body = serde_json::to_string_pretty(&self.fields).map_err(|_| fmt::Error)?;
        write!(f, "{}", body)
    }
}
