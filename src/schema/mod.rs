//! Schema documents
//!
//! A [`Schema`] names a class of models and declares its slots. Schemas
//! inherit from any number of base schemas; the flattened, inheritance-free
//! view of a schema is its [`Prototype`](prototype::Prototype).
//!
//! ```json
//! {
//!   "uri": "http://schema.api.wrml.org/example/Person",
//!   "title": "Person",
//!   "version": 1,
//!   "baseSchemaUris": ["http://schema.api.wrml.org/org/wrml/model/rest/Document"],
//!   "keySlotNames": ["id"],
//!   "slots": [
//!     { "name": "id", "value": { "type": "Long" }, "readOnly": true },
//!     { "name": "name", "value": { "type": "Text", "maxLength": 80 }, "required": true }
//!   ]
//! }
//! ```

pub mod graph;
pub mod json_schema;
pub mod loader;
pub mod prototype;
pub mod value;

pub use graph::InheritanceGraph;
pub use json_schema::{JsonSchemaDraft, JsonSchemaImport, JsonSchemaLoader};
pub use loader::{Registration, SchemaLoader, SearchResult};
pub use prototype::{KeyDeclaration, ProtoSlot, Prototype};
pub use value::{Patterns, Syntax, Value};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use url::Url;

use crate::checksum::Checksum;
use crate::error::{Result, WrmlError};
use crate::version::SchemaVersion;

/// Canonical schema identifier: an absolute URI
pub type SchemaUri = String;

/// Base URI of the schemas shipped with the runtime
pub const CORE_SCHEMA_BASE_URI: &str = "http://schema.api.wrml.org";

/// Schema of every addressable model; declares the `uri` key slot
pub const DOCUMENT_SCHEMA_URI: &str = "http://schema.api.wrml.org/org/wrml/model/rest/Document";

/// Name of the key slot declared by the Document schema
pub const DOCUMENT_URI_SLOT_NAME: &str = "uri";

/// A named, typed field of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub value: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    /// Alternate names that resolve to this slot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Slots that must be present whenever this one is
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl Slot {
    /// Create an optional, writable slot
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            value,
            required: false,
            read_only: false,
            default: None,
            aliases: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// A WRML schema document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub uri: SchemaUri,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub version: SchemaVersion,
    /// Direct bases, in precedence order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base_schema_uris: Vec<SchemaUri>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_slot_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comparable_slot_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_slot_name: Option<String>,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

impl Schema {
    /// Create an empty schema
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: None,
            description: None,
            version: SchemaVersion::default(),
            base_schema_uris: Vec::new(),
            key_slot_names: Vec::new(),
            comparable_slot_names: Vec::new(),
            title_slot_name: None,
            slots: Vec::new(),
        }
    }

    pub fn with_base(mut self, base_uri: impl Into<String>) -> Self {
        self.base_schema_uris.push(base_uri.into());
        self
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn with_keys<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_slot_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Title, falling back to the last URI segment
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .unwrap_or_else(|| self.uri.rsplit('/').next().unwrap_or(&self.uri))
    }

    /// Slot declared directly by this schema
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Slots declared by this schema that hold links
    pub fn declared_link_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| matches!(s.value, Value::Link { .. }))
    }

    /// Fingerprint of the document
    pub fn checksum(&self) -> Checksum {
        serde_json::to_value(self)
            .map(|json| Checksum::from_json(&json))
            .unwrap_or_else(|_| Checksum::from_bytes(self.uri.as_bytes()))
    }

    /// Check the parts of a declaration that do not depend on base schemas
    pub fn validate_declaration(&self) -> Result<()> {
        if self.uri.trim().is_empty() {
            return Err(WrmlError::invalid_schema("<unnamed>", "schema uri is empty"));
        }

        let mut names = HashSet::new();
        for slot in &self.slots {
            if slot.name.is_empty() {
                return Err(WrmlError::invalid_schema(&self.uri, "slot with empty name"));
            }
            for name in std::iter::once(&slot.name).chain(slot.aliases.iter()) {
                if !names.insert(name.as_str()) {
                    return Err(WrmlError::invalid_schema(
                        &self.uri,
                        format!("slot name '{}' is declared more than once", name),
                    ));
                }
            }
        }

        let mut keys = HashSet::new();
        for key in &self.key_slot_names {
            if !keys.insert(key.as_str()) {
                return Err(WrmlError::DuplicateKeySlot {
                    schema: self.uri.clone(),
                    slot: key.clone(),
                });
            }
        }

        if self.base_schema_uris.iter().any(|b| b == &self.uri) {
            return Err(WrmlError::InheritanceCycle {
                members: vec![self.uri.clone(), self.uri.clone()],
            });
        }

        let mut bases = HashSet::new();
        for base in &self.base_schema_uris {
            if !bases.insert(base.as_str()) {
                return Err(WrmlError::invalid_schema(
                    &self.uri,
                    format!("base schema {} is listed more than once", base),
                ));
            }
        }

        Ok(())
    }
}

/// Resolve a schema reference relative to the URI of the referring schema.
///
/// Absolute references are returned unchanged; `#` fragments are stripped.
/// Opaque bases such as `urn:` URIs resolve a bare name to a sibling name.
pub fn resolve_schema_ref(base_uri: &str, reference: &str) -> SchemaUri {
    let reference = reference.split('#').next().unwrap_or(reference);
    if reference.is_empty() {
        return base_uri.to_string();
    }
    if Url::parse(reference).is_ok() {
        return reference.to_string();
    }

    match Url::parse(base_uri) {
        Ok(base) if base.cannot_be_a_base() => {
            let cut = base_uri.rfind([':', '/']).map_or(0, |i| i + 1);
            format!("{}{}", &base_uri[..cut], reference.trim_start_matches('/'))
        }
        Ok(base) => match base.join(reference) {
            Ok(mut joined) => {
                joined.set_fragment(None);
                joined.into()
            }
            Err(_) => join_path(base_uri, reference),
        },
        Err(_) => join_path(base_uri, reference),
    }
}

/// Path-only resolution for bases that are not URLs
fn join_path(base_uri: &str, reference: &str) -> SchemaUri {
    let joined = if reference.starts_with('/') {
        reference.to_string()
    } else {
        let parent = base_uri.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
        format!("{}/{}", parent, reference)
    };

    let mut components: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            other => components.push(other),
        }
    }
    if joined.starts_with('/') {
        format!("/{}", components.join("/"))
    } else {
        components.join("/")
    }
}
