//! Model keys
//!
//! A model is identified by one key value per schema that declares key slots.
//! Single-slot keys hold the slot value itself; composite keys hold an object
//! of slot name to value.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::checksum::canonical_json;
use crate::schema::{SchemaUri, DOCUMENT_SCHEMA_URI};

/// Key values of a model, by declaring schema URI
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Keys(BTreeMap<SchemaUri, JsonValue>);

impl Keys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys holding only a Document URI
    pub fn with_document_uri(uri: impl Into<String>) -> Self {
        Self::new().with_key(DOCUMENT_SCHEMA_URI, JsonValue::String(uri.into()))
    }

    pub fn with_key(mut self, schema_uri: impl Into<String>, value: JsonValue) -> Self {
        self.insert(schema_uri, value);
        self
    }

    pub fn insert(&mut self, schema_uri: impl Into<String>, value: JsonValue) {
        self.0.insert(schema_uri.into(), value);
    }

    pub fn get(&self, schema_uri: &str) -> Option<&JsonValue> {
        self.0.get(schema_uri)
    }

    pub fn document_uri(&self) -> Option<&str> {
        self.get(DOCUMENT_SCHEMA_URI).and_then(|v| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SchemaUri, &JsonValue)> {
        self.0.iter()
    }

    /// Do both key sets agree on at least one schema?
    ///
    /// Values are compared in canonical form, so composite keys match
    /// whatever order their fields were written in.
    pub fn matches(&self, other: &Keys) -> bool {
        self.0.iter().any(|(schema, value)| {
            other
                .0
                .get(schema)
                .map_or(false, |o| o == value || canonical_json(o) == canonical_json(value))
        })
    }

    /// Stable text form of one key value, used for file names and indexes.
    /// Composite keys have their fields sorted.
    pub fn key_text(value: &JsonValue) -> String {
        match value {
            JsonValue::String(s) => s.clone(),
            other => canonical_json(other),
        }
    }
}

impl FromIterator<(SchemaUri, JsonValue)> for Keys {
    fn from_iter<I: IntoIterator<Item = (SchemaUri, JsonValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
