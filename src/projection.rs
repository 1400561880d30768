//! Raw records and their projection onto selected paths.

use serde_json::{Map, Value};

use crate::config::PRIMARY_KEY_FIELD;
use crate::error_handling::ConfigurationError;
use crate::query::FieldPath;

/// One raw backend record: an optional out-of-band primary key and an
/// optional body. A missing body means the key was not found.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    key: Option<Value>,
    body: Option<Map<String, Value>>,
}

impl Record {
    pub fn new(key: Option<Value>, body: Option<Map<String, Value>>) -> Self {
        Self { key, body }
    }

    /// Record with a string key and a JSON object body. Non-object bodies are
    /// treated as absent.
    pub fn keyed(key: impl Into<String>, body: Value) -> Self {
        let body = match body {
            Value::Object(map) => Some(map),
            _ => None,
        };
        Self {
            key: Some(Value::String(key.into())),
            body,
        }
    }

    /// Placeholder for a key the store did not find.
    pub fn missing(key: impl Into<String>) -> Self {
        Self {
            key: Some(Value::String(key.into())),
            body: None,
        }
    }

    pub fn key(&self) -> Option<&Value> {
        self.key.as_ref()
    }

    pub fn body(&self) -> Option<&Map<String, Value>> {
        self.body.as_ref()
    }

    /// True when there is no body or the body has no fields.
    pub fn is_empty(&self) -> bool {
        self.body.as_ref().map_or(true, Map::is_empty)
    }
}

/// Projects `record` onto `select`.
///
/// - no select: the full body, with the key added as `pk` when `embed_key` is set
/// - one select: that field's bare value
/// - several: an object keyed by the select names, in select order
///
/// `pk` always resolves to the record key, never to a body field.
///
/// # Errors
///
/// `PathShapeMismatch` when a nested path walks into a present value that is
/// not a mapping.
pub fn project(
    record: &Record,
    select: &[FieldPath],
    embed_key: bool,
) -> Result<Value, ConfigurationError> {
    if select.is_empty() {
        let mut body = record.body.clone().unwrap_or_default();
        if embed_key {
            body.insert(
                PRIMARY_KEY_FIELD.to_string(),
                record.key.clone().unwrap_or(Value::Null),
            );
        }
        return Ok(Value::Object(body));
    }

    let mut projected = Map::with_capacity(select.len());
    for path in select {
        let value = if path.is_primary_key() {
            record.key.clone().unwrap_or(Value::Null)
        } else {
            match record.body.as_ref() {
                Some(body) => resolve(path, path.segments(), body)?,
                None => Value::Null,
            }
        };
        if select.len() == 1 {
            return Ok(value);
        }
        projected.insert(path.to_string(), value);
    }
    Ok(Value::Object(projected))
}

fn resolve(
    full: &FieldPath,
    segments: &[String],
    map: &Map<String, Value>,
) -> Result<Value, ConfigurationError> {
    let Some((head, tail)) = segments.split_first() else {
        return Ok(Value::Null);
    };
    match (map.get(head), tail.is_empty()) {
        (value, true) => Ok(value.cloned().unwrap_or(Value::Null)),
        (None | Some(Value::Null), false) => Ok(Value::Null),
        (Some(Value::Object(nested)), false) => resolve(full, tail, nested),
        (Some(_), false) => Err(ConfigurationError::PathShapeMismatch(full.to_string())),
    }
}
