//! Prototypes
//!
//! A [`Prototype`] is the flattened view of a schema: every slot, key, link
//! and collection it has once all base schemas are merged in. Models hold an
//! `Arc<Prototype>` and consult nothing else when their slots are read or
//! written.
//!
//! Merge rules:
//! - the C3 linearization of the schema fixes precedence;
//! - the first declaration of a slot along the linearization wins, later
//!   ones are recorded as overridden;
//! - an override must keep the value kind of the slot it hides;
//! - key slot names must resolve to merged slots.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::graph::InheritanceGraph;
use super::{Patterns, Schema, SchemaUri, Slot, Value, DOCUMENT_SCHEMA_URI};
use crate::checksum::Checksum;
use crate::error::{Result, WrmlError};

/// A merged slot and where it came from
#[derive(Debug, Clone, Serialize)]
pub struct ProtoSlot {
    pub slot: Slot,
    /// Schema whose declaration won
    pub declaring_schema_uri: SchemaUri,
    /// Less specific schemas that also declare this slot
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overridden_schema_uris: Vec<SchemaUri>,
    #[serde(skip)]
    patterns: Patterns,
}

impl ProtoSlot {
    pub fn name(&self) -> &str {
        &self.slot.name
    }

    pub fn value(&self) -> &Value {
        &self.slot.value
    }

    /// Check a JSON value against the slot's value descriptor
    pub fn check(&self, json: &serde_json::Value) -> std::result::Result<(), String> {
        self.slot.value.check_with(json, &self.patterns)
    }
}

/// Key slots contributed by one schema of the linearization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDeclaration {
    pub schema_uri: SchemaUri,
    pub slot_names: Vec<String>,
}

impl KeyDeclaration {
    pub fn is_composite(&self) -> bool {
        self.slot_names.len() > 1
    }
}

/// Flattened, inheritance-resolved view of a schema
#[derive(Debug, Clone, Serialize)]
pub struct Prototype {
    schema_uri: SchemaUri,
    title: Option<String>,
    linearization: Vec<SchemaUri>,
    slots: BTreeMap<String, ProtoSlot>,
    /// Slot names, least specific schema first
    slot_order: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    aliases: HashMap<String, String>,
    key_declarations: Vec<KeyDeclaration>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    comparable_slot_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title_slot_name: Option<String>,
    /// Link slot name -> link relation URI
    link_slots: BTreeMap<String, String>,
    /// Collection slot name -> element schema URI
    collection_slots: BTreeMap<String, SchemaUri>,
    checksum: Checksum,
}

impl Prototype {
    /// Build the prototype of `uri` from the loaded schemas
    pub fn build<'a, F>(uri: &str, graph: &InheritanceGraph, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<&'a Schema>,
    {
        let linearization = graph.linearize(uri)?;
        let schemas: Vec<&Schema> = linearization
            .iter()
            .map(|u| lookup(u.as_str()).ok_or_else(|| WrmlError::SchemaNotFound(u.clone())))
            .collect::<Result<_>>()?;

        let mut slots: BTreeMap<String, ProtoSlot> = BTreeMap::new();
        for schema in &schemas {
            for slot in &schema.slots {
                match slots.get_mut(&slot.name) {
                    Some(winner) => {
                        if winner.slot.value.kind() != slot.value.kind() {
                            return Err(WrmlError::InvalidSlotOverride {
                                schema: winner.declaring_schema_uri.clone(),
                                slot: slot.name.clone(),
                                kind: winner.slot.value.kind().to_string(),
                                base_kind: slot.value.kind().to_string(),
                            });
                        }
                        winner.overridden_schema_uris.push(schema.uri.clone());
                    }
                    None => {
                        let patterns = Patterns::compile(&slot.value).map_err(|reason| {
                            WrmlError::invalid_schema(&schema.uri, format!("slot '{}': {}", slot.name, reason))
                        })?;
                        slots.insert(
                            slot.name.clone(),
                            ProtoSlot {
                                slot: slot.clone(),
                                declaring_schema_uri: schema.uri.clone(),
                                overridden_schema_uris: Vec::new(),
                                patterns,
                            },
                        );
                    }
                }
            }
        }

        let mut slot_order = Vec::with_capacity(slots.len());
        let mut seen = HashSet::with_capacity(slots.len());
        for schema in schemas.iter().rev() {
            for slot in &schema.slots {
                if seen.insert(slot.name.as_str()) {
                    slot_order.push(slot.name.clone());
                }
            }
        }

        let mut aliases = HashMap::new();
        for proto in slots.values() {
            for alias in &proto.slot.aliases {
                if slots.contains_key(alias) || aliases.contains_key(alias) {
                    return Err(WrmlError::invalid_schema(
                        &proto.declaring_schema_uri,
                        format!("alias '{}' of slot '{}' collides with another slot", alias, proto.slot.name),
                    ));
                }
                aliases.insert(alias.clone(), proto.slot.name.clone());
            }
        }

        let resolve = |name: &str| -> Option<String> {
            if slots.contains_key(name) {
                Some(name.to_string())
            } else {
                aliases.get(name).cloned()
            }
        };

        let mut key_declarations = Vec::new();
        for schema in &schemas {
            if schema.key_slot_names.is_empty() {
                continue;
            }
            let mut names = Vec::with_capacity(schema.key_slot_names.len());
            for key in &schema.key_slot_names {
                let canonical = resolve(key).ok_or_else(|| WrmlError::UnresolvedKeySlot {
                    schema: schema.uri.clone(),
                    slot: key.clone(),
                })?;
                if names.contains(&canonical) {
                    return Err(WrmlError::DuplicateKeySlot {
                        schema: schema.uri.clone(),
                        slot: key.clone(),
                    });
                }
                names.push(canonical);
            }
            key_declarations.push(KeyDeclaration {
                schema_uri: schema.uri.clone(),
                slot_names: names,
            });
        }

        let mut comparable_slot_names = Vec::new();
        for schema in &schemas {
            for name in &schema.comparable_slot_names {
                let canonical = resolve(name).ok_or_else(|| {
                    WrmlError::invalid_schema(
                        &schema.uri,
                        format!("comparable slot '{}' does not resolve", name),
                    )
                })?;
                if !comparable_slot_names.contains(&canonical) {
                    comparable_slot_names.push(canonical);
                }
            }
        }

        let title_slot_name = match schemas.iter().find_map(|s| {
            s.title_slot_name.as_ref().map(|name| (&s.uri, name))
        }) {
            Some((declaring, name)) => Some(resolve(name).ok_or_else(|| {
                WrmlError::invalid_schema(declaring, format!("title slot '{}' does not resolve", name))
            })?),
            None => None,
        };

        for proto in slots.values() {
            if let Some(default) = &proto.slot.default {
                proto.check(default).map_err(|reason| WrmlError::InvalidSlotDefault {
                    schema: proto.declaring_schema_uri.clone(),
                    slot: proto.slot.name.clone(),
                    reason,
                })?;
            }
        }

        let link_slots = slots
            .values()
            .filter_map(|p| match &p.slot.value {
                Value::Link { link_relation_uri } => Some((p.slot.name.clone(), link_relation_uri.clone())),
                _ => None,
            })
            .collect();

        let collection_slots = slots
            .values()
            .filter_map(|p| {
                p.slot
                    .value
                    .collection_schema_uri()
                    .map(|uri| (p.slot.name.clone(), uri.to_string()))
            })
            .collect();

        let checksums: Vec<Checksum> = schemas.iter().map(|s| s.checksum()).collect();
        let checksum = Checksum::combine(&checksums);

        Ok(Self {
            schema_uri: uri.to_string(),
            title: schemas[0].title.clone(),
            linearization,
            slots,
            slot_order,
            aliases,
            key_declarations,
            comparable_slot_names,
            title_slot_name,
            link_slots,
            collection_slots,
            checksum,
        })
    }

    pub fn schema_uri(&self) -> &str {
        &self.schema_uri
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The schema followed by its ancestors in precedence order
    pub fn linearization(&self) -> &[SchemaUri] {
        &self.linearization
    }

    /// All ancestors in precedence order
    pub fn base_schema_uris(&self) -> &[SchemaUri] {
        &self.linearization[1..]
    }

    /// Is a model of this prototype also an instance of `schema_uri`?
    pub fn is_assignable_to(&self, schema_uri: &str) -> bool {
        self.linearization.iter().any(|u| u == schema_uri)
    }

    /// Canonical slot name for a name or alias
    pub fn canonical_slot_name<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.slots.contains_key(name) {
            Some(name)
        } else {
            self.aliases.get(name).map(String::as_str)
        }
    }

    /// Slot by name or alias
    pub fn slot(&self, name: &str) -> Option<&ProtoSlot> {
        self.canonical_slot_name(name).and_then(|n| self.slots.get(n))
    }

    /// Slot names, least specific schema first
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slot_order.iter().map(String::as_str)
    }

    /// Merged slots in [`slot_names`](Self::slot_names) order
    pub fn slots(&self) -> impl Iterator<Item = &ProtoSlot> {
        self.slot_order.iter().filter_map(|n| self.slots.get(n))
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn required_slots(&self) -> impl Iterator<Item = &ProtoSlot> {
        self.slots().filter(|p| p.slot.required)
    }

    pub fn key_declarations(&self) -> &[KeyDeclaration] {
        &self.key_declarations
    }

    /// Every key slot name, without duplicates
    pub fn key_slot_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.key_declarations.iter().flat_map(|k| k.slot_names.iter()) {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// Does this prototype carry the Document `uri` key?
    pub fn is_document(&self) -> bool {
        self.key_declarations
            .iter()
            .any(|k| k.schema_uri == DOCUMENT_SCHEMA_URI)
    }

    pub fn comparable_slot_names(&self) -> &[String] {
        &self.comparable_slot_names
    }

    pub fn title_slot_name(&self) -> Option<&str> {
        self.title_slot_name.as_deref()
    }

    /// Link slot name -> link relation URI
    pub fn link_slots(&self) -> &BTreeMap<String, String> {
        &self.link_slots
    }

    /// Link relation URI of a link slot
    pub fn link_relation_uri(&self, slot_name: &str) -> Option<&str> {
        let name = self.canonical_slot_name(slot_name)?;
        self.link_slots.get(name).map(String::as_str)
    }

    /// Collection slot name -> element schema URI
    pub fn collection_slots(&self) -> &BTreeMap<String, SchemaUri> {
        &self.collection_slots
    }

    /// Combined checksum of every schema in the linearization
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Flattened draft-4 JSON-Schema used to validate model data
    pub fn to_json_schema(&self) -> serde_json::Value {
        super::json_schema::prototype_to_json_schema(self)
    }
}
