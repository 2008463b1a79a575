//! In-memory model service

use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use super::{satisfies, Dimensions, Service};
use crate::error::{Result, WrmlError};
use crate::model::{Keys, Model};
use crate::schema::{Prototype, SchemaUri};

#[derive(Debug, Clone)]
struct Stored {
    prototype: Arc<Prototype>,
    data: JsonValue,
    keys: Keys,
}

impl Stored {
    fn to_model(&self) -> Result<Model> {
        Model::from_json(self.prototype.clone(), self.data.clone())
    }
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    models: BTreeMap<u64, Stored>,
    /// (declaring schema, key text) -> model id
    index: HashMap<(SchemaUri, String), u64>,
}

impl Store {
    fn find(&self, keys: &Keys) -> Option<u64> {
        keys.iter()
            .find_map(|(schema, value)| self.index.get(&(schema.clone(), Keys::key_text(value))).copied())
    }

    /// Every stored model sharing at least one key
    fn find_all(&self, keys: &Keys) -> BTreeSet<u64> {
        keys.iter()
            .filter_map(|(schema, value)| self.index.get(&(schema.clone(), Keys::key_text(value))).copied())
            .collect()
    }

    fn unindex(&mut self, id: u64) {
        self.index.retain(|_, v| *v != id);
    }
}

/// Thread-safe service holding models in memory, indexed under every key
#[derive(Debug)]
pub struct MemoryService {
    name: String,
    store: RwLock<Store>,
}

impl MemoryService {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store: RwLock::new(Store::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap_or_else(PoisonError::into_inner).models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl Service for MemoryService {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, keys: &Keys, dimensions: &Dimensions) -> Result<Option<Model>> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = store.find(keys).and_then(|id| store.models.get(&id)) else {
            return Ok(None);
        };
        let model = stored.to_model()?;
        Ok(satisfies(&model, dimensions).then_some(model))
    }

    fn save(&self, model: &Model) -> Result<Model> {
        let keys = model.keys();
        if keys.is_empty() {
            return Err(WrmlError::Service(format!(
                "cannot save a {} model without key values",
                model.schema_uri()
            )));
        }

        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = store.find_all(&keys);
        for old in &replaced {
            store.unindex(*old);
            store.models.remove(old);
        }
        let id = match replaced.first() {
            Some(id) => *id,
            None => {
                store.next_id += 1;
                store.next_id
            }
        };

        for (schema, value) in keys.iter() {
            store.index.insert((schema.clone(), Keys::key_text(value)), id);
        }
        let stored = Stored {
            prototype: model.prototype().clone(),
            data: model.to_json(),
            keys,
        };
        let saved = stored.to_model()?;
        store.models.insert(id, stored);
        debug!(service = %self.name, schema = %model.schema_uri(), id, "saved model");
        Ok(saved)
    }

    fn delete(&self, keys: &Keys, dimensions: &Dimensions) -> Result<bool> {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        let Some(id) = store.find(keys) else {
            return Ok(false);
        };
        let matches_schema = store
            .models
            .get(&id)
            .map(|s| dimensions.schema_uri.is_empty() || s.prototype.is_assignable_to(&dimensions.schema_uri))
            .unwrap_or(false);
        if !matches_schema {
            return Ok(false);
        }
        store.models.remove(&id);
        store.unindex(id);
        Ok(true)
    }

    fn list(&self, schema_uri: &str) -> Result<Vec<Model>> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store
            .models
            .values()
            .filter(|s| s.prototype.is_assignable_to(schema_uri))
            .map(Stored::to_model)
            .collect()
    }
}

impl MemoryService {
    /// Keys of every stored model
    pub fn stored_keys(&self) -> Vec<Keys> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store.models.values().map(|s| s.keys.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, SchemaLoader, Slot, Value, DOCUMENT_SCHEMA_URI};
    use serde_json::json;

    const PERSON: &str = "http://schema.example.com/Person";

    fn person(loader: &SchemaLoader, id: i64, uri: &str, name: &str) -> Model {
        Model::new(loader.get_prototype(PERSON).unwrap())
            .with_slot("id", json!(id))
            .unwrap()
            .with_slot("uri", json!(uri))
            .unwrap()
            .with_slot("name", json!(name))
            .unwrap()
    }

    fn loader() -> SchemaLoader {
        let loader = SchemaLoader::with_core_schemas().unwrap();
        loader
            .register(
                Schema::new(PERSON)
                    .with_base(DOCUMENT_SCHEMA_URI)
                    .with_slot(Slot::new("id", Value::Long { minimum: None, maximum: None }))
                    .with_slot(Slot::new("name", Value::text()))
                    .with_keys(["id"]),
            )
            .unwrap();
        loader
    }

    #[test]
    fn test_save_and_get_by_any_key() {
        let loader = loader();
        let service = MemoryService::default();
        service.save(&person(&loader, 1, "http://api.example.com/people/1", "Ada")).unwrap();

        let dims = Dimensions::new(PERSON);
        let by_id = service.get(&Keys::new().with_key(PERSON, json!(1)), &dims).unwrap().unwrap();
        let by_uri = service
            .get(&Keys::with_document_uri("http://api.example.com/people/1"), &dims)
            .unwrap()
            .unwrap();
        assert_eq!(by_id, by_uri);
        assert_eq!(by_id.get_text("name").unwrap(), Some("Ada"));

        let wrong_schema = Dimensions::new("http://schema.example.com/Place");
        assert!(service.get(&Keys::new().with_key(PERSON, json!(1)), &wrong_schema).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_existing() {
        let loader = loader();
        let service = MemoryService::default();
        service.save(&person(&loader, 1, "http://api.example.com/people/1", "Ada")).unwrap();
        service.save(&person(&loader, 1, "http://api.example.com/people/1", "Ada L.")).unwrap();

        assert_eq!(service.len(), 1);
        assert_eq!(service.list(DOCUMENT_SCHEMA_URI).unwrap()[0].get_text("name").unwrap(), Some("Ada L."));
        assert_eq!(service.stored_keys()[0].len(), 2);
    }

    #[test]
    fn test_save_replaces_every_model_sharing_a_key() {
        let loader = loader();
        let service = MemoryService::default();
        service.save(&person(&loader, 1, "http://api.example.com/people/1", "Ada")).unwrap();
        service.save(&person(&loader, 2, "http://api.example.com/people/2", "Grace")).unwrap();

        // id of the first, uri of the second
        service.save(&person(&loader, 1, "http://api.example.com/people/2", "Alan")).unwrap();
        assert_eq!(service.len(), 1);
        assert!(service
            .get(&Keys::with_document_uri("http://api.example.com/people/1"), &Dimensions::new(PERSON))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_composite_key_lookup_ignores_field_order() {
        const SEAT: &str = "http://schema.example.com/Seat";
        let loader = SchemaLoader::new("http://schema.example.com");
        loader
            .register(
                Schema::new(SEAT)
                    .with_slot(Slot::new("row", Value::text()))
                    .with_slot(Slot::new("seat", Value::text()))
                    .with_keys(["row", "seat"]),
            )
            .unwrap();
        let model = Model::new(loader.get_prototype(SEAT).unwrap())
            .with_slot("row", json!("K"))
            .unwrap()
            .with_slot("seat", json!("12"))
            .unwrap();
        let service = MemoryService::default();
        service.save(&model).unwrap();

        let reordered: JsonValue = serde_json::from_str(r#"{"seat": "12", "row": "K"}"#).unwrap();
        let keys = Keys::new().with_key(SEAT, reordered);
        assert!(keys.matches(&model.keys()));
        let found = service.get(&keys, &Dimensions::new(SEAT)).unwrap().unwrap();
        assert_eq!(found.get_text("row").unwrap(), Some("K"));
    }

    #[test]
    fn test_delete() {
        let loader = loader();
        let service = MemoryService::default();
        service.save(&person(&loader, 1, "http://api.example.com/people/1", "Ada")).unwrap();

        let keys = Keys::new().with_key(PERSON, json!(1));
        assert!(service.delete(&keys, &Dimensions::new(PERSON)).unwrap());
        assert!(!service.delete(&keys, &Dimensions::new(PERSON)).unwrap());
        assert!(service.is_empty());
        assert!(service
            .get(&Keys::with_document_uri("http://api.example.com/people/1"), &Dimensions::new(PERSON))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_keyless_model_rejected() {
        let loader = loader();
        let model = Model::new(loader.get_prototype(PERSON).unwrap());
        assert!(matches!(MemoryService::default().save(&model), Err(WrmlError::Service(_))));
    }
}
