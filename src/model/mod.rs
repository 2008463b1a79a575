//! Dynamic models
//!
//! A [`Model`] is a JSON object bound to a [`Prototype`]. Every slot read and
//! write goes through the prototype, so aliases resolve, values are
//! type-checked, and read-only slots stay fixed once set.

pub mod keys;

pub use keys::Keys;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, WrmlError};
use crate::schema::value::parse_date;
use crate::schema::{ProtoSlot, Prototype, DOCUMENT_URI_SLOT_NAME};

static NULL: JsonValue = JsonValue::Null;

/// A slot value change, as seen by listeners
#[derive(Debug, Clone, PartialEq)]
pub struct SlotChange {
    pub schema_uri: String,
    pub slot_name: String,
    pub old_value: JsonValue,
    pub new_value: JsonValue,
}

/// Observer of model slot changes
pub trait ModelListener: Send + Sync {
    fn slot_changed(&self, change: &SlotChange);
}

/// A runtime instance of a schema
#[derive(Clone)]
pub struct Model {
    prototype: Arc<Prototype>,
    slots: Map<String, JsonValue>,
    listeners: Vec<Arc<dyn ModelListener>>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("schema_uri", &self.prototype.schema_uri())
            .field("slots", &self.slots)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.prototype.schema_uri() == other.prototype.schema_uri() && self.slots == other.slots
    }
}

impl Model {
    /// Empty model with slot defaults applied
    pub fn new(prototype: Arc<Prototype>) -> Self {
        let slots = prototype
            .slots()
            .filter_map(|p| p.slot.default.clone().map(|d| (p.slot.name.clone(), d)))
            .collect();
        Self {
            prototype,
            slots,
            listeners: Vec::new(),
        }
    }

    /// Model from stored JSON. Every slot is type-checked and must be known to
    /// the prototype; read-only slots are accepted. A slot given both by name
    /// and by alias is rejected.
    pub fn from_json(prototype: Arc<Prototype>, json: JsonValue) -> Result<Self> {
        let JsonValue::Object(object) = json else {
            return Err(WrmlError::SlotTypeMismatch {
                schema: prototype.schema_uri().to_string(),
                slot: "<model>".to_string(),
                reason: "model data must be a JSON object".to_string(),
            });
        };

        let mut slots = Map::with_capacity(object.len());
        for (name, value) in object {
            let proto = slot_of(&prototype, &name)?;
            check(&prototype, proto, &value)?;
            if slots.contains_key(proto.name()) {
                return Err(WrmlError::SlotTypeMismatch {
                    schema: prototype.schema_uri().to_string(),
                    slot: proto.name().to_string(),
                    reason: format!("'{}' sets a slot that is already set", name),
                });
            }
            slots.insert(proto.slot.name.clone(), value);
        }

        Ok(Self {
            prototype,
            slots,
            listeners: Vec::new(),
        })
    }

    pub fn prototype(&self) -> &Arc<Prototype> {
        &self.prototype
    }

    pub fn schema_uri(&self) -> &str {
        self.prototype.schema_uri()
    }

    pub fn is_instance_of(&self, schema_uri: &str) -> bool {
        self.prototype.is_assignable_to(schema_uri)
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ModelListener>) {
        self.listeners.push(listener);
    }

    // ========== Slot access ==========

    /// Slot value by name or alias; unset slots read as null
    pub fn get_slot(&self, name: &str) -> Result<&JsonValue> {
        let proto = slot_of(&self.prototype, name)?;
        Ok(self.slots.get(proto.name()).unwrap_or(&NULL))
    }

    /// Set a slot, returning its previous value
    pub fn set_slot(&mut self, name: &str, value: JsonValue) -> Result<JsonValue> {
        let proto = slot_of(&self.prototype, name)?;
        check(&self.prototype, proto, &value)?;

        let canonical = proto.slot.name.clone();
        let current = self.slots.get(&canonical).unwrap_or(&NULL);
        if proto.slot.read_only && !current.is_null() && *current != value {
            return Err(WrmlError::ReadOnlySlot {
                schema: self.prototype.schema_uri().to_string(),
                slot: canonical,
            });
        }

        let old_value = self.slots.insert(canonical.clone(), value.clone()).unwrap_or(JsonValue::Null);
        if old_value != value && !self.listeners.is_empty() {
            let change = SlotChange {
                schema_uri: self.prototype.schema_uri().to_string(),
                slot_name: canonical,
                old_value: old_value.clone(),
                new_value: value,
            };
            for listener in &self.listeners {
                listener.slot_changed(&change);
            }
        }
        Ok(old_value)
    }

    /// Builder form of [`set_slot`](Self::set_slot)
    pub fn with_slot(mut self, name: &str, value: JsonValue) -> Result<Self> {
        self.set_slot(name, value)?;
        Ok(self)
    }

    pub fn get_text(&self, name: &str) -> Result<Option<&str>> {
        self.typed(name, "text", |v| v.as_str())
    }

    pub fn get_i64(&self, name: &str) -> Result<Option<i64>> {
        self.typed(name, "integer", |v| v.as_i64())
    }

    pub fn get_f64(&self, name: &str) -> Result<Option<f64>> {
        self.typed(name, "number", |v| v.as_f64())
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>> {
        self.typed(name, "boolean", |v| v.as_bool())
    }

    pub fn get_date(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        self.typed(name, "date", |v| v.as_str().and_then(parse_date))
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &str,
        convert: impl FnOnce(&'a JsonValue) -> Option<T>,
    ) -> Result<Option<T>> {
        let value = self.get_slot(name)?;
        if value.is_null() {
            return Ok(None);
        }
        convert(value).map(Some).ok_or_else(|| WrmlError::SlotTypeMismatch {
            schema: self.prototype.schema_uri().to_string(),
            slot: name.to_string(),
            reason: format!("expected {}, found {}", expected, value),
        })
    }

    /// Slots that hold a value
    pub fn set_slots(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.slots.iter().filter(|(_, v)| !v.is_null())
    }

    /// Drop every slot not accepted by `keep`
    pub fn retain_slots(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.slots.retain(|name, _| keep(name));
    }

    // ========== Identity ==========

    /// One key per key declaration whose slots all hold values
    pub fn keys(&self) -> Keys {
        let mut keys = Keys::new();
        for declaration in self.prototype.key_declarations() {
            let values: Vec<(&String, &JsonValue)> = declaration
                .slot_names
                .iter()
                .map(|name| (name, self.slots.get(name).unwrap_or(&NULL)))
                .collect();
            if values.iter().any(|(_, v)| v.is_null()) {
                continue;
            }
            let key = if declaration.is_composite() {
                JsonValue::Object(
                    values
                        .into_iter()
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect(),
                )
            } else {
                values[0].1.clone()
            };
            keys.insert(declaration.schema_uri.clone(), key);
        }
        keys
    }

    /// Document URI, for models whose schema inherits from Document
    pub fn uri(&self) -> Option<&str> {
        if !self.prototype.is_document() {
            return None;
        }
        self.slots.get(DOCUMENT_URI_SLOT_NAME).and_then(|v| v.as_str())
    }

    // ========== Validation ==========

    /// Check required slots, slot dependencies and value constraints. With
    /// `strict`, also validate against the prototype's JSON-Schema.
    pub fn validate(&self, strict: bool) -> Result<()> {
        let mut problems = Vec::new();

        for proto in self.prototype.slots() {
            let name = proto.name();
            let value = self.slots.get(name).unwrap_or(&NULL);

            if proto.slot.required && value.is_null() {
                problems.push(format!("required slot '{}' is missing", name));
            }
            if let Err(reason) = proto.check(value) {
                problems.push(format!("slot '{}': {}", name, reason));
            }
            if !value.is_null() {
                for dependency in &proto.slot.dependencies {
                    let satisfied = self
                        .prototype
                        .canonical_slot_name(dependency)
                        .and_then(|d| self.slots.get(d))
                        .map(|v| !v.is_null())
                        .unwrap_or(false);
                    if !satisfied {
                        problems.push(format!("slot '{}' requires '{}'", name, dependency));
                    }
                }
            }
        }

        if strict && problems.is_empty() {
            problems.extend(self.json_schema_problems());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(WrmlError::Validation {
                schema: self.prototype.schema_uri().to_string(),
                problems,
            })
        }
    }

    fn json_schema_problems(&self) -> Vec<String> {
        let schema = self.prototype.to_json_schema();
        let compiled = match jsonschema::JSONSchema::options()
            .with_draft(jsonschema::Draft::Draft4)
            .compile(&schema)
        {
            Ok(compiled) => compiled,
            Err(e) => return vec![format!("prototype JSON-Schema does not compile: {}", e)],
        };

        let instance = JsonValue::Object(
            self.set_slots()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        let result = match compiled.validate(&instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect(),
        };
        result
    }

    /// Set slots as a JSON object
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.set_slots()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

fn slot_of<'a>(prototype: &'a Prototype, name: &str) -> Result<&'a ProtoSlot> {
    prototype.slot(name).ok_or_else(|| WrmlError::UnknownSlot {
        schema: prototype.schema_uri().to_string(),
        slot: name.to_string(),
    })
}

fn check(prototype: &Prototype, proto: &ProtoSlot, value: &JsonValue) -> Result<()> {
    proto
        .check(value)
        .map_err(|reason| WrmlError::SlotTypeMismatch {
            schema: prototype.schema_uri().to_string(),
            slot: proto.slot.name.clone(),
            reason,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, SchemaLoader, Slot, Syntax, Value, DOCUMENT_SCHEMA_URI};
    use serde_json::json;
    use std::sync::Mutex;

    const PERSON: &str = "http://schema.example.com/Person";

    fn person_prototype() -> Arc<Prototype> {
        let loader = SchemaLoader::with_core_schemas().unwrap();
        loader
            .register(
                Schema::new(PERSON)
                    .with_base(DOCUMENT_SCHEMA_URI)
                    .with_slot(Slot::new("id", Value::Long { minimum: Some(1), maximum: None }).read_only())
                    .with_slot(Slot::new("firstName", Value::text()).with_alias("givenName"))
                    .with_slot(Slot::new("lastName", Value::text()).required())
                    .with_slot(Slot::new("email", Value::text_with_syntax(Syntax::Email)))
                    .with_slot(
                        Slot::new("emailVerified", Value::Boolean)
                            .with_default(json!(false)),
                    )
                    .with_slot({
                        let mut slot = Slot::new("verifiedOn", Value::Date);
                        slot.dependencies = vec!["email".into()];
                        slot
                    })
                    .with_keys(["id"]),
            )
            .unwrap();
        loader.get_prototype(PERSON).unwrap()
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<SlotChange>>);

    impl ModelListener for Recorder {
        fn slot_changed(&self, change: &SlotChange) {
            self.0.lock().unwrap().push(change.clone());
        }
    }

    #[test]
    fn test_defaults_applied() {
        let model = Model::new(person_prototype());
        assert_eq!(model.get_bool("emailVerified").unwrap(), Some(false));
        assert_eq!(model.get_text("lastName").unwrap(), None);
    }

    #[test]
    fn test_alias_and_type_checks() {
        let mut model = Model::new(person_prototype());
        model.set_slot("givenName", json!("Ada")).unwrap();
        assert_eq!(model.get_text("firstName").unwrap(), Some("Ada"));

        assert!(matches!(
            model.set_slot("email", json!("not-an-email")),
            Err(WrmlError::SlotTypeMismatch { .. })
        ));
        assert!(matches!(
            model.set_slot("nickname", json!("A")),
            Err(WrmlError::UnknownSlot { .. })
        ));
        assert!(matches!(
            model.get_i64("firstName"),
            Err(WrmlError::SlotTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_read_only_slot() {
        let mut model = Model::new(person_prototype());
        model.set_slot("id", json!(7)).unwrap();
        assert!(matches!(
            model.set_slot("id", json!(8)),
            Err(WrmlError::ReadOnlySlot { .. })
        ));
        assert_eq!(model.get_i64("id").unwrap(), Some(7));
    }

    #[test]
    fn test_listeners_notified() {
        let recorder = Arc::new(Recorder::default());
        let mut model = Model::new(person_prototype());
        model.add_listener(recorder.clone());

        model.set_slot("lastName", json!("Lovelace")).unwrap();
        model.set_slot("lastName", json!("Lovelace")).unwrap();

        let changes = recorder.0.lock().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].slot_name, "lastName");
        assert_eq!(changes[0].old_value, JsonValue::Null);
    }

    #[test]
    fn test_keys_and_uri() {
        let model = Model::from_json(
            person_prototype(),
            json!({ "uri": "http://api.example.com/people/7", "id": 7, "lastName": "Lovelace" }),
        )
        .unwrap();

        let keys = model.keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get(PERSON), Some(&json!(7)));
        assert_eq!(keys.document_uri(), Some("http://api.example.com/people/7"));
        assert_eq!(model.uri(), Some("http://api.example.com/people/7"));
        assert!(model.is_instance_of(DOCUMENT_SCHEMA_URI));
    }

    #[test]
    fn test_from_json_rejects_unknown_slots() {
        let result = Model::from_json(person_prototype(), json!({ "shoeSize": 9 }));
        assert!(matches!(result, Err(WrmlError::UnknownSlot { .. })));
    }

    #[test]
    fn test_from_json_rejects_slot_set_by_name_and_alias() {
        let result = Model::from_json(person_prototype(), json!({ "firstName": "Ada", "givenName": "Augusta" }));
        match result {
            Err(WrmlError::SlotTypeMismatch { slot, reason, .. }) => {
                assert_eq!(slot, "firstName");
                assert!(reason.contains("givenName"), "got {}", reason);
            }
            other => panic!("expected a rejected alias, got {:?}", other.map(|m| m.to_json())),
        }

        let by_alias = Model::from_json(person_prototype(), json!({ "givenName": "Ada" })).unwrap();
        assert_eq!(by_alias.get_text("firstName").unwrap(), Some("Ada"));
    }

    #[test]
    fn test_validate() {
        let mut model = Model::new(person_prototype());
        model.set_slot("verifiedOn", json!("2024-02-29")).unwrap();

        match model.validate(false) {
            Err(WrmlError::Validation { problems, .. }) => {
                assert_eq!(problems.len(), 2, "{:?}", problems);
                assert!(problems.iter().any(|p| p.contains("lastName")));
                assert!(problems.iter().any(|p| p.contains("requires 'email'")));
            }
            other => panic!("Expected validation failure, got {:?}", other),
        }

        model.set_slot("lastName", json!("Lovelace")).unwrap();
        model.set_slot("email", json!("ada@example.com")).unwrap();
        assert!(model.validate(true).is_ok());
        assert_eq!(
            model.get_date("verifiedOn").unwrap().map(|d| d.format("%Y-%m-%d").to_string()),
            Some("2024-02-29".to_string())
        );
    }
}
