//! Conversion between plain JSON and the vendor REST API's typed values.
//!
//! The REST API wraps every value in a single-key object naming its type:
//! `{"stringValue": "a"}`, `{"integerValue": "3"}` (integers travel as
//! strings), `{"mapValue": {"fields": {...}}}` and so on.

use serde_json::{json, Map, Number, Value};

use super::error::{StoreError, StoreResult};
use super::snapshot::Fields;

pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub(crate) fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

pub(crate) fn decode_value(value: &Value) -> StoreResult<Value> {
    let object = value
        .as_object()
        .ok_or_else(|| StoreError::protocol(format!("typed value is not an object: {}", value)))?;
    let (kind, inner) = object
        .iter()
        .next()
        .ok_or_else(|| StoreError::protocol("typed value is empty"))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or_default())),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| StoreError::protocol(format!("bad integerValue: {}", inner)))
        }
        "doubleValue" => Ok(inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = match inner.get("values").and_then(Value::as_array) {
                Some(values) => values.iter().map(decode_value).collect::<StoreResult<_>>()?,
                None => Vec::new(),
            };
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = match inner.get("fields").and_then(Value::as_object) {
                Some(fields) => decode_fields(fields)?,
                None => Map::new(),
            };
            Ok(Value::Object(fields))
        }
        other => Err(StoreError::protocol(format!("unknown value type: {}", other))),
    }
}

pub(crate) fn decode_fields(fields: &Map<String, Value>) -> StoreResult<Fields> {
    fields
        .iter()
        .map(|(key, value)| Ok((key.clone(), decode_value(value)?)))
        .collect()
}

/// Quotes a field name for use in a field path when it is not a plain
/// identifier.
fn quote_segment(segment: &str) -> String {
    let mut chars = segment.chars();
    let simple = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        segment.to_string()
    } else {
        format!("`{}`", segment.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Converts a dotted path such as `address.city` into a quoted field path.
pub(crate) fn field_path(dotted: &str) -> String {
    dotted
        .split('.')
        .map(quote_segment)
        .collect::<Vec<_>>()
        .join(".")
}

/// Field paths of every leaf in `fields`, so that a masked update merges
/// nested maps instead of replacing them.
pub(crate) fn field_mask(fields: &Fields) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(fields, "", &mut paths);
    paths
}

fn collect_paths(fields: &Fields, prefix: &str, paths: &mut Vec<String>) {
    for (key, value) in fields {
        let path = if prefix.is_empty() {
            quote_segment(key)
        } else {
            format!("{}.{}", prefix, quote_segment(key))
        };
        match value {
            Value::Object(nested) if !nested.is_empty() => collect_paths(nested, &path, paths),
            _ => paths.push(path),
        }
    }
}
