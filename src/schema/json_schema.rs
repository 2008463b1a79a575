//! JSON-Schema Import/Export
//!
//! Converts between WRML [`Schema`]s and JSON-Schema draft-3/draft-4
//! documents.
//!
//! | JSON-Schema                          | WRML                          |
//! |--------------------------------------|-------------------------------|
//! | `extends` (draft-3), `allOf` (draft-4) with `$ref` | base schema URIs |
//! | `required: true` (draft-3), `required: [..]` (draft-4) | `Slot::required` |
//! | `dependencies: {a: [b]}`             | `Slot::dependencies`          |
//! | `$ref`                               | `Model` value                 |
//! | inline `object` with properties      | nested schema `{uri}/{Name}`  |
//! | `x-wrml-*`                           | keys, title slot, aliases, links |

use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::prototype::Prototype;
use super::{resolve_schema_ref, Schema, SchemaUri, Slot, Syntax, Value};
use crate::error::{Result, WrmlError};
use crate::version::SchemaVersion;

const DRAFT3_URI: &str = "http://json-schema.org/draft-03/schema#";
const DRAFT4_URI: &str = "http://json-schema.org/draft-04/schema#";

const X_KEY_SLOT_NAMES: &str = "x-wrml-keySlotNames";
const X_COMPARABLE_SLOT_NAMES: &str = "x-wrml-comparableSlotNames";
const X_TITLE_SLOT_NAME: &str = "x-wrml-titleSlotName";
const X_VERSION: &str = "x-wrml-version";
const X_ALIASES: &str = "x-wrml-aliases";
const X_LINK_RELATION_URI: &str = "x-wrml-linkRelationUri";

/// Supported JSON-Schema drafts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonSchemaDraft {
    Draft3,
    #[default]
    Draft4,
}

impl JsonSchemaDraft {
    pub fn meta_schema_uri(&self) -> &'static str {
        match self {
            JsonSchemaDraft::Draft3 => DRAFT3_URI,
            JsonSchemaDraft::Draft4 => DRAFT4_URI,
        }
    }

    /// Draft named by a document's `$schema`, if recognized
    pub fn detect(json: &JsonValue) -> Option<Self> {
        let meta = json.get("$schema")?.as_str()?;
        if meta.contains("draft-03") {
            Some(JsonSchemaDraft::Draft3)
        } else if meta.contains("draft-04") {
            Some(JsonSchemaDraft::Draft4)
        } else {
            None
        }
    }

    /// Draft from a CLI-style number ("3" or "4")
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            3 => Some(JsonSchemaDraft::Draft3),
            4 => Some(JsonSchemaDraft::Draft4),
            _ => None,
        }
    }
}

/// Result of importing one JSON-Schema document
#[derive(Debug, Clone)]
pub struct JsonSchemaImport {
    /// The schema of the document itself
    pub schema: Schema,
    /// Schemas synthesized for inline object properties
    pub nested: Vec<Schema>,
}

impl JsonSchemaImport {
    /// All schemas, the main one first
    pub fn into_schemas(self) -> Vec<Schema> {
        let mut all = Vec::with_capacity(self.nested.len() + 1);
        all.push(self.schema);
        all.extend(self.nested);
        all
    }
}

/// Bidirectional JSON-Schema converter
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaLoader {
    /// Draft assumed when a document has no recognizable `$schema`
    pub default_draft: JsonSchemaDraft,
}

impl JsonSchemaLoader {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Import ==========

    /// Import a JSON-Schema document. `fallback_uri` names the schema when the
    /// document has no `id`.
    pub fn import(&self, json: &JsonValue, fallback_uri: Option<&str>) -> Result<JsonSchemaImport> {
        let obj = json.as_object().ok_or_else(|| {
            WrmlError::invalid_schema(
                fallback_uri.unwrap_or("<unnamed>"),
                "JSON-Schema document must be an object",
            )
        })?;

        let draft = JsonSchemaDraft::detect(json).unwrap_or(self.default_draft);
        let uri = obj
            .get("id")
            .or_else(|| obj.get("$id"))
            .and_then(|v| v.as_str())
            .map(|id| id.trim_end_matches('#').to_string())
            .or_else(|| fallback_uri.map(String::from))
            .ok_or_else(|| WrmlError::invalid_schema("<unnamed>", "document has no id and no fallback uri"))?;

        debug!(uri = %uri, ?draft, "importing JSON-Schema");

        let mut nested = Vec::new();
        let schema = self.import_object(&uri, obj, draft, &mut nested)?;
        Ok(JsonSchemaImport { schema, nested })
    }

    fn import_object(
        &self,
        uri: &str,
        obj: &Map<String, JsonValue>,
        draft: JsonSchemaDraft,
        nested: &mut Vec<Schema>,
    ) -> Result<Schema> {
        let mut schema = Schema::new(uri);
        schema.title = string_field(obj, "title");
        schema.description = string_field(obj, "description");
        if let Some(version) = obj.get(X_VERSION) {
            schema.version = serde_json::from_value::<SchemaVersion>(version.clone())?;
        }

        // Base schemas and inline compositions
        let mut inline_parts: Vec<&Map<String, JsonValue>> = Vec::new();
        for keyword in ["extends", "allOf"] {
            let entries: Vec<&JsonValue> = match obj.get(keyword) {
                Some(JsonValue::Array(items)) => items.iter().collect(),
                Some(single @ JsonValue::Object(_)) => vec![single],
                Some(JsonValue::String(reference)) if keyword == "extends" => {
                    schema.base_schema_uris.push(resolve_schema_ref(uri, reference));
                    continue;
                }
                _ => continue,
            };
            for entry in entries {
                if let Some(reference) = entry.get("$ref").and_then(|v| v.as_str()) {
                    let base = resolve_schema_ref(uri, reference);
                    if !schema.base_schema_uris.contains(&base) {
                        schema.base_schema_uris.push(base);
                    }
                } else if let Some(part) = entry.as_object() {
                    inline_parts.push(part);
                }
            }
        }

        let mut required: HashSet<String> = HashSet::new();
        let mut properties: Vec<(&String, &JsonValue)> = Vec::new();
        for part in std::iter::once(obj).chain(inline_parts.iter().copied()) {
            if let Some(JsonValue::Array(names)) = part.get("required") {
                required.extend(names.iter().filter_map(|n| n.as_str().map(String::from)));
            }
            if let Some(props) = part.get("properties").and_then(|v| v.as_object()) {
                for (name, prop) in props {
                    if !properties.iter().any(|(n, _)| *n == name) {
                        properties.push((name, prop));
                    }
                }
            }
        }

        for (name, prop) in properties {
            let mut slot = self.import_property(uri, name, prop, draft, nested)?;
            // draft-3 marks required on the property itself
            if prop.get("required").and_then(|v| v.as_bool()).unwrap_or(false) {
                slot.required = true;
            }
            if required.contains(name) {
                slot.required = true;
            }
            schema.slots.push(slot);
        }

        if let Some(deps) = obj.get("dependencies").and_then(|v| v.as_object()) {
            for (name, dep) in deps {
                let names: Vec<String> = match dep {
                    JsonValue::Array(items) => items.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
                    JsonValue::String(single) => vec![single.clone()],
                    _ => {
                        warn!(schema = %uri, slot = %name, "schema dependencies are not supported, skipping");
                        continue;
                    }
                };
                match schema.slots.iter_mut().find(|s| &s.name == name) {
                    Some(slot) => slot.dependencies = names,
                    None => warn!(schema = %uri, slot = %name, "dependency on undeclared property, skipping"),
                }
            }
        }

        // Hyper-schema links
        if let Some(links) = obj.get("links").and_then(|v| v.as_array()) {
            for link in links {
                let Some(rel) = link.get("rel").and_then(|v| v.as_str()) else {
                    continue;
                };
                let declared = schema.slots.iter().any(|s| {
                    matches!(&s.value, Value::Link { link_relation_uri } if link_relation_uri == rel)
                });
                if declared {
                    continue;
                }
                let name = match link.get("title").and_then(|v| v.as_str()) {
                    Some(title) => title.to_string(),
                    None => rel
                        .rsplit(|c| c == '/' || c == '#')
                        .find(|s| !s.is_empty())
                        .unwrap_or(rel)
                        .to_string(),
                };
                if schema.slot(&name).is_some() {
                    warn!(schema = %uri, slot = %name, "link name collides with a property, skipping");
                    continue;
                }
                schema.slots.push(Slot::new(
                    name,
                    Value::Link {
                        link_relation_uri: rel.to_string(),
                    },
                ));
            }
        }

        schema.key_slot_names = string_list(obj, X_KEY_SLOT_NAMES);
        schema.comparable_slot_names = string_list(obj, X_COMPARABLE_SLOT_NAMES);
        schema.title_slot_name = string_field(obj, X_TITLE_SLOT_NAME);

        schema.validate_declaration()?;
        Ok(schema)
    }

    fn import_property(
        &self,
        owner_uri: &str,
        name: &str,
        prop: &JsonValue,
        draft: JsonSchemaDraft,
        nested: &mut Vec<Schema>,
    ) -> Result<Slot> {
        let value = self.import_value(owner_uri, name, prop, draft, nested)?;
        let mut slot = Slot::new(name, value);

        if let Some(obj) = prop.as_object() {
            slot.title = string_field(obj, "title");
            slot.description = string_field(obj, "description");
            slot.default = obj.get("default").cloned();
            slot.read_only = obj
                .get("readOnly")
                .or_else(|| obj.get("readonly"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            slot.aliases = string_list(obj, X_ALIASES);
        }

        Ok(slot)
    }

    fn import_value(
        &self,
        owner_uri: &str,
        name: &str,
        prop: &JsonValue,
        draft: JsonSchemaDraft,
        nested: &mut Vec<Schema>,
    ) -> Result<Value> {
        let obj = prop.as_object().ok_or_else(|| {
            WrmlError::invalid_schema(owner_uri, format!("property '{}' is not a schema object", name))
        })?;

        if let Some(rel) = obj.get(X_LINK_RELATION_URI).and_then(|v| v.as_str()) {
            return Ok(Value::Link {
                link_relation_uri: rel.to_string(),
            });
        }

        if let Some(reference) = obj.get("$ref").and_then(|v| v.as_str()) {
            return Ok(Value::Model {
                schema_uri: Some(resolve_schema_ref(owner_uri, reference)),
            });
        }

        let ty = match obj.get("type") {
            Some(JsonValue::String(t)) => Some(t.as_str()),
            // ["string", "null"] style nullable types
            Some(JsonValue::Array(types)) => types
                .iter()
                .filter_map(|t| t.as_str())
                .find(|t| *t != "null"),
            _ => None,
        };

        if let Some(choices) = string_enum(obj) {
            if matches!(ty, None | Some("string")) {
                return Ok(Value::SingleSelect { choices });
            }
        }

        match ty {
            Some("string") => {
                let format = obj.get("format").and_then(|v| v.as_str());
                match format {
                    Some("date-time") | Some("date") => Ok(Value::Date),
                    _ => Ok(Value::Text {
                        syntax: format.and_then(Syntax::from_format),
                        min_length: usize_field(obj, "minLength"),
                        max_length: usize_field(obj, "maxLength"),
                        pattern: string_field(obj, "pattern"),
                    }),
                }
            }
            Some("integer") => {
                let minimum = obj.get("minimum").and_then(|v| v.as_i64());
                let maximum = obj.get("maximum").and_then(|v| v.as_i64());
                if obj.get("format").and_then(|v| v.as_str()) == Some("int64") {
                    Ok(Value::Long { minimum, maximum })
                } else {
                    Ok(Value::Integer { minimum, maximum })
                }
            }
            Some("number") => Ok(Value::Double {
                minimum: obj.get("minimum").and_then(|v| v.as_f64()),
                maximum: obj.get("maximum").and_then(|v| v.as_f64()),
            }),
            Some("boolean") => Ok(Value::Boolean),
            Some("array") => {
                let unique = obj.get("uniqueItems").and_then(|v| v.as_bool()).unwrap_or(false);
                let items = obj.get("items");
                if let Some(choices) = items.and_then(|i| i.as_object()).and_then(string_enum) {
                    if unique {
                        return Ok(Value::MultiSelect { choices });
                    }
                }
                let element = match items {
                    Some(items @ JsonValue::Object(_)) => {
                        self.import_value(owner_uri, name, items, draft, nested)?
                    }
                    _ => Value::text(),
                };
                Ok(Value::List {
                    element: Box::new(element),
                    min_size: usize_field(obj, "minItems"),
                    max_size: usize_field(obj, "maxItems"),
                    unique,
                })
            }
            Some("object") | None if obj.contains_key("properties") => {
                let nested_uri = nested_schema_uri(owner_uri, name);
                let schema = self.import_object(&nested_uri, obj, draft, nested)?;
                nested.push(schema);
                Ok(Value::Model {
                    schema_uri: Some(nested_uri),
                })
            }
            Some("object") => Ok(Value::Model { schema_uri: None }),
            Some(other) => Err(WrmlError::invalid_schema(
                owner_uri,
                format!("property '{}' has unsupported type '{}'", name, other),
            )),
            None => Err(WrmlError::invalid_schema(
                owner_uri,
                format!("property '{}' has no type", name),
            )),
        }
    }

    // ========== Export ==========

    /// Export a schema as a JSON-Schema document of the given draft
    pub fn export(&self, schema: &Schema, draft: JsonSchemaDraft) -> JsonValue {
        let mut out = Map::new();
        out.insert("$schema".into(), json!(draft.meta_schema_uri()));
        out.insert("id".into(), json!(schema.uri));
        if let Some(title) = &schema.title {
            out.insert("title".into(), json!(title));
        }
        if let Some(description) = &schema.description {
            out.insert("description".into(), json!(description));
        }
        out.insert("type".into(), json!("object"));
        out.insert(X_VERSION.into(), json!(schema.version));

        if !schema.base_schema_uris.is_empty() {
            let refs: Vec<JsonValue> = schema
                .base_schema_uris
                .iter()
                .map(|base| json!({ "$ref": base }))
                .collect();
            match draft {
                JsonSchemaDraft::Draft3 => {
                    out.insert("extends".into(), JsonValue::Array(refs));
                }
                JsonSchemaDraft::Draft4 => {
                    out.insert("allOf".into(), JsonValue::Array(refs));
                }
            }
        }

        let mut properties = Map::new();
        let mut required = Vec::new();
        let mut dependencies = Map::new();
        for slot in &schema.slots {
            let mut prop = value_to_json_schema(&slot.value, false);
            if let Some(title) = &slot.title {
                prop.insert("title".into(), json!(title));
            }
            if let Some(description) = &slot.description {
                prop.insert("description".into(), json!(description));
            }
            if let Some(default) = &slot.default {
                prop.insert("default".into(), default.clone());
            }
            if slot.read_only {
                let keyword = match draft {
                    JsonSchemaDraft::Draft3 => "readonly",
                    JsonSchemaDraft::Draft4 => "readOnly",
                };
                prop.insert(keyword.into(), json!(true));
            }
            if !slot.aliases.is_empty() {
                prop.insert(X_ALIASES.into(), json!(slot.aliases));
            }
            if slot.required {
                match draft {
                    JsonSchemaDraft::Draft3 => {
                        prop.insert("required".into(), json!(true));
                    }
                    JsonSchemaDraft::Draft4 => required.push(json!(slot.name)),
                }
            }
            if !slot.dependencies.is_empty() {
                dependencies.insert(slot.name.clone(), json!(slot.dependencies));
            }
            properties.insert(slot.name.clone(), JsonValue::Object(prop));
        }
        out.insert("properties".into(), JsonValue::Object(properties));
        if !required.is_empty() {
            out.insert("required".into(), JsonValue::Array(required));
        }
        if !dependencies.is_empty() {
            out.insert("dependencies".into(), JsonValue::Object(dependencies));
        }

        let links: Vec<JsonValue> = schema
            .declared_link_slots()
            .filter_map(|slot| match &slot.value {
                Value::Link { link_relation_uri } => Some(json!({
                    "rel": link_relation_uri,
                    "href": "{uri}",
                    "title": slot.name,
                })),
                _ => None,
            })
            .collect();
        if !links.is_empty() {
            out.insert("links".into(), JsonValue::Array(links));
        }

        if !schema.key_slot_names.is_empty() {
            out.insert(X_KEY_SLOT_NAMES.into(), json!(schema.key_slot_names));
        }
        if !schema.comparable_slot_names.is_empty() {
            out.insert(X_COMPARABLE_SLOT_NAMES.into(), json!(schema.comparable_slot_names));
        }
        if let Some(title_slot) = &schema.title_slot_name {
            out.insert(X_TITLE_SLOT_NAME.into(), json!(title_slot));
        }

        JsonValue::Object(out)
    }
}

/// Flattened draft-4 schema of a prototype, for validating model data.
///
/// Nested models are only checked to be objects, formats are left to
/// [`Value::check`], and null slots are expected to be stripped from the
/// instance beforehand.
pub(crate) fn prototype_to_json_schema(prototype: &Prototype) -> JsonValue {
    let mut properties = Map::new();
    let mut dependencies = Map::new();
    for proto in prototype.slots() {
        properties.insert(
            proto.slot.name.clone(),
            JsonValue::Object(value_to_json_schema(&proto.slot.value, true)),
        );
        if !proto.slot.dependencies.is_empty() {
            dependencies.insert(proto.slot.name.clone(), json!(proto.slot.dependencies));
        }
    }

    let required: Vec<&str> = prototype.required_slots().map(|p| p.name()).collect();

    let mut out = Map::new();
    out.insert("$schema".into(), json!(DRAFT4_URI));
    out.insert("type".into(), json!("object"));
    out.insert("properties".into(), JsonValue::Object(properties));
    out.insert("additionalProperties".into(), json!(false));
    if !required.is_empty() {
        out.insert("required".into(), json!(required));
    }
    if !dependencies.is_empty() {
        out.insert("dependencies".into(), JsonValue::Object(dependencies));
    }
    JsonValue::Object(out)
}

fn value_to_json_schema(value: &Value, for_validation: bool) -> Map<String, JsonValue> {
    let mut out = Map::new();
    match value {
        Value::Text {
            syntax,
            min_length,
            max_length,
            pattern,
        } => {
            out.insert("type".into(), json!("string"));
            if let (Some(syntax), false) = (syntax, for_validation) {
                out.insert("format".into(), json!(syntax.format_name()));
            }
            insert_opt(&mut out, "minLength", min_length);
            insert_opt(&mut out, "maxLength", max_length);
            insert_opt(&mut out, "pattern", pattern);
        }
        Value::Integer { minimum, maximum } => {
            out.insert("type".into(), json!("integer"));
            insert_opt(&mut out, "minimum", minimum);
            insert_opt(&mut out, "maximum", maximum);
        }
        Value::Long { minimum, maximum } => {
            out.insert("type".into(), json!("integer"));
            if !for_validation {
                out.insert("format".into(), json!("int64"));
            }
            insert_opt(&mut out, "minimum", minimum);
            insert_opt(&mut out, "maximum", maximum);
        }
        Value::Double { minimum, maximum } => {
            out.insert("type".into(), json!("number"));
            insert_opt(&mut out, "minimum", minimum);
            insert_opt(&mut out, "maximum", maximum);
        }
        Value::Boolean => {
            out.insert("type".into(), json!("boolean"));
        }
        Value::Date => {
            out.insert("type".into(), json!("string"));
            if !for_validation {
                out.insert("format".into(), json!("date-time"));
            }
        }
        Value::Model { schema_uri } => match (schema_uri, for_validation) {
            (Some(uri), false) => {
                out.insert("$ref".into(), json!(uri));
            }
            _ => {
                out.insert("type".into(), json!("object"));
            }
        },
        Value::List {
            element,
            min_size,
            max_size,
            unique,
        } => {
            out.insert("type".into(), json!("array"));
            out.insert(
                "items".into(),
                JsonValue::Object(value_to_json_schema(element, for_validation)),
            );
            insert_opt(&mut out, "minItems", min_size);
            insert_opt(&mut out, "maxItems", max_size);
            if *unique {
                out.insert("uniqueItems".into(), json!(true));
            }
        }
        Value::SingleSelect { choices } => {
            out.insert("type".into(), json!("string"));
            out.insert("enum".into(), json!(choices));
        }
        Value::MultiSelect { choices } => {
            out.insert("type".into(), json!("array"));
            out.insert("items".into(), json!({ "type": "string", "enum": choices }));
            out.insert("uniqueItems".into(), json!(true));
        }
        Value::Link { link_relation_uri } => {
            out.insert(X_LINK_RELATION_URI.into(), json!(link_relation_uri));
        }
    }
    out
}

fn insert_opt<T: serde::Serialize>(out: &mut Map<String, JsonValue>, key: &str, value: &Option<T>) {
    if let Some(v) = value {
        out.insert(key.to_string(), json!(v));
    }
}

fn string_field(obj: &Map<String, JsonValue>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn string_list(obj: &Map<String, JsonValue>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(|v| v.as_array())
        .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn usize_field(obj: &Map<String, JsonValue>, key: &str) -> Option<usize> {
    obj.get(key).and_then(|v| v.as_u64()).map(|n| n as usize)
}

fn string_enum(obj: &Map<String, JsonValue>) -> Option<Vec<String>> {
    let items = obj.get("enum")?.as_array()?;
    items.iter().map(|v| v.as_str().map(String::from)).collect()
}

/// `shipping_address` / `shipping-address` -> `ShippingAddress`
fn to_pascal_case(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// URI of the nested schema generated for an inline object property
pub fn nested_schema_uri(owner_uri: &str, property: &str) -> SchemaUri {
    format!("{}/{}", owner_uri, to_pascal_case(property))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("shipping_address"), "ShippingAddress");
        assert_eq!(to_pascal_case("homePage"), "HomePage");
        assert_eq!(to_pascal_case("x-y"), "XY");
    }

    #[test]
    fn test_draft_detection() {
        assert_eq!(
            JsonSchemaDraft::detect(&json!({"$schema": DRAFT3_URI})),
            Some(JsonSchemaDraft::Draft3)
        );
        assert_eq!(JsonSchemaDraft::detect(&json!({})), None);
    }

    #[test]
    fn test_draft4_import() {
        let doc = json!({
            "$schema": DRAFT4_URI,
            "id": "http://schema.example.com/shop/Order#",
            "title": "Order",
            "allOf": [
                { "$ref": "Entity" },
                { "properties": { "note": { "type": "string" } } }
            ],
            "properties": {
                "total": { "type": "number", "minimum": 0 },
                "placed": { "type": "string", "format": "date-time" },
                "status": { "type": "string", "enum": ["open", "closed"] },
                "tags": { "type": "array", "items": { "type": "string", "enum": ["a", "b"] }, "uniqueItems": true },
                "customer": { "$ref": "Customer" },
                "shipping_address": {
                    "type": "object",
                    "properties": { "street": { "type": "string" } },
                    "required": ["street"]
                }
            },
            "required": ["total", "note"],
            "dependencies": { "placed": ["status"] },
            "x-wrml-keySlotNames": ["placed"]
        });

        let import = JsonSchemaLoader::new().import(&doc, None).unwrap();
        let schema = &import.schema;

        assert_eq!(schema.uri, "http://schema.example.com/shop/Order");
        assert_eq!(schema.base_schema_uris, vec!["http://schema.example.com/shop/Entity"]);
        assert!(schema.slot("total").unwrap().required);
        assert!(schema.slot("note").unwrap().required);
        assert_eq!(schema.slot("placed").unwrap().value, Value::Date);
        assert_eq!(schema.slot("placed").unwrap().dependencies, vec!["status"]);
        assert_eq!(schema.slot("status").unwrap().value.kind(), "SingleSelect");
        assert_eq!(schema.slot("tags").unwrap().value.kind(), "MultiSelect");
        assert_eq!(
            schema.slot("customer").unwrap().value,
            Value::Model { schema_uri: Some("http://schema.example.com/shop/Customer".into()) }
        );
        assert_eq!(schema.key_slot_names, vec!["placed"]);

        assert_eq!(import.nested.len(), 1);
        assert_eq!(import.nested[0].uri, "http://schema.example.com/shop/Order/ShippingAddress");
        assert!(import.nested[0].slot("street").unwrap().required);
    }

    #[test]
    fn test_draft3_import() {
        let doc = json!({
            "$schema": DRAFT3_URI,
            "id": "http://schema.example.com/Person",
            "extends": { "$ref": "http://schema.example.com/Named" },
            "properties": {
                "age": { "type": "integer", "required": true, "readonly": true },
                "born": { "type": "integer", "format": "int64" }
            },
            "dependencies": { "born": "age" }
        });

        let schema = JsonSchemaLoader::new().import(&doc, None).unwrap().schema;
        assert_eq!(schema.base_schema_uris, vec!["http://schema.example.com/Named"]);
        let age = schema.slot("age").unwrap();
        assert!(age.required && age.read_only);
        assert_eq!(age.value.kind(), "Integer");
        assert_eq!(schema.slot("born").unwrap().value.kind(), "Long");
        assert_eq!(schema.slot("born").unwrap().dependencies, vec!["age"]);
    }

    #[test]
    fn test_export_draft4_and_reimport() {
        let schema = Schema::new("http://schema.example.com/Person")
            .with_base("http://schema.example.com/Named")
            .with_slot(Slot::new("id", Value::Long { minimum: Some(1), maximum: None }).read_only())
            .with_slot(Slot::new("email", Value::text_with_syntax(Syntax::Email)).required())
            .with_slot(Slot::new("self", Value::Link { link_relation_uri: "http://relation.example.com/self".into() }))
            .with_keys(["id"]);

        let loader = JsonSchemaLoader::new();
        let exported = loader.export(&schema, JsonSchemaDraft::Draft4);

        assert_eq!(exported["allOf"][0]["$ref"], "http://schema.example.com/Named");
        assert_eq!(exported["required"], json!(["email"]));
        assert_eq!(exported["properties"]["email"]["format"], "email");
        assert_eq!(exported["properties"]["id"]["readOnly"], true);
        assert_eq!(exported["links"][0]["rel"], "http://relation.example.com/self");

        let reimported = loader.import(&exported, None).unwrap().schema;
        assert_eq!(reimported, schema);
    }

    #[test]
    fn test_hyper_schema_links_become_link_slots() {
        let doc = json!({
            "id": "http://schema.example.com/Person",
            "properties": { "name": { "type": "string" } },
            "links": [
                { "rel": "http://relation.example.com/friends", "href": "/people/{id}/friends" },
                { "rel": "http://relation.example.com/employer", "href": "/companies/{c}", "title": "worksFor" }
            ]
        });
        let schema = JsonSchemaLoader::new().import(&doc, None).unwrap().schema;
        assert_eq!(
            schema.slot("friends").unwrap().value,
            Value::Link { link_relation_uri: "http://relation.example.com/friends".into() }
        );
        assert!(schema.slot("worksFor").is_some());
        assert_eq!(schema.declared_link_slots().count(), 2);
    }

    #[test]
    fn test_export_draft3_uses_extends_and_inline_required() {
        let schema = Schema::new("http://schema.example.com/Person")
            .with_base("http://schema.example.com/Named")
            .with_slot(Slot::new("email", Value::text()).required());

        let exported = JsonSchemaLoader::new().export(&schema, JsonSchemaDraft::Draft3);
        assert_eq!(exported["extends"][0]["$ref"], "http://schema.example.com/Named");
        assert_eq!(exported["properties"]["email"]["required"], true);
        assert!(exported.get("required").is_none());
    }
}
