//! File-backed model service
//!
//! Each model is one pretty-printed JSON file at
//! `{root}/{schema path}/{key}.json`, where the schema path is the schema URI
//! without its scheme and the key is the value of the most specific key
//! declaration of the model's prototype.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{satisfies, Dimensions, Service};
use crate::error::{Result, WrmlError};
use crate::model::{Keys, Model};
use crate::schema::{Prototype, SchemaLoader};

/// Service storing models as JSON files under a root directory
#[derive(Debug)]
pub struct FileService {
    name: String,
    root: PathBuf,
    loader: Arc<SchemaLoader>,
}

impl FileService {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, loader: Arc<SchemaLoader>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            loader,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding models of exactly this schema
    pub fn schema_dir(&self, schema_uri: &str) -> PathBuf {
        let without_scheme = schema_uri
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(schema_uri);
        without_scheme
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .fold(self.root.clone(), |path, segment| path.join(file_safe(segment)))
    }

    /// File a model with these keys would live in, if the keys carry the
    /// prototype's primary key
    fn model_path(&self, prototype: &Prototype, keys: &Keys) -> Option<PathBuf> {
        let primary = prototype.key_declarations().first()?;
        let value = keys.get(&primary.schema_uri)?;
        let file_name = format!("{}.json", file_safe(&Keys::key_text(value)));
        Some(self.schema_dir(prototype.schema_uri()).join(file_name))
    }

    fn read_model(&self, prototype: Arc<Prototype>, path: &Path) -> Result<Model> {
        let content = fs::read_to_string(path)?;
        let json: serde_json::Value = serde_json::from_str(&content)?;
        Model::from_json(prototype, json)
    }

    fn find(&self, keys: &Keys, dimensions: &Dimensions) -> Result<Option<(PathBuf, Model)>> {
        if let Ok(prototype) = self.loader.get_prototype(&dimensions.schema_uri) {
            if let Some(path) = self.model_path(&prototype, keys) {
                if path.is_file() {
                    let model = self.read_model(prototype, &path)?;
                    return Ok(Some((path, model)));
                }
            }
        }

        for (path, model) in self.scan(&dimensions.schema_uri)? {
            if model.keys().matches(keys) && satisfies(&model, dimensions) {
                return Ok(Some((path, model)));
            }
        }
        Ok(None)
    }

    /// Files of stored models sharing at least one key with `keys`
    fn files_sharing_keys(&self, keys: &Keys) -> Result<BTreeSet<PathBuf>> {
        let mut paths = BTreeSet::new();
        for (schema_uri, _) in keys.iter() {
            for (path, stored) in self.scan(schema_uri)? {
                if stored.keys().matches(keys) {
                    paths.insert(path);
                }
            }
        }
        Ok(paths)
    }

    /// Stored models of every registered schema assignable to `schema_uri`
    fn scan(&self, schema_uri: &str) -> Result<Vec<(PathBuf, Model)>> {
        let mut found = Vec::new();
        for uri in self.loader.schema_uris() {
            let prototype = match self.loader.get_prototype(&uri) {
                Ok(p) if schema_uri.is_empty() || p.is_assignable_to(schema_uri) => p,
                Ok(_) => continue,
                Err(e) => {
                    warn!(schema = %uri, error = %e, "skipping schema without a prototype");
                    continue;
                }
            };

            let dir = self.schema_dir(&uri);
            if !dir.is_dir() {
                continue;
            }
            let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && p.extension().map(|e| e == "json").unwrap_or(false))
                .collect();
            paths.sort();
            for path in paths {
                let model = self.read_model(prototype.clone(), &path)?;
                found.push((path, model));
            }
        }
        Ok(found)
    }
}

impl Service for FileService {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, keys: &Keys, dimensions: &Dimensions) -> Result<Option<Model>> {
        Ok(self.find(keys, dimensions)?.map(|(_, model)| model))
    }

    fn save(&self, model: &Model) -> Result<Model> {
        let keys = model.keys();
        let path = self.model_path(model.prototype(), &keys).ok_or_else(|| {
            WrmlError::Service(format!(
                "cannot save a {} model without its primary key",
                model.schema_uri()
            ))
        })?;

        for stale in self.files_sharing_keys(&keys)? {
            if stale != path {
                fs::remove_file(&stale)?;
                debug!(service = %self.name, path = %stale.display(), "replaced model");
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = model.to_json();
        fs::write(&path, serde_json::to_string_pretty(&json)?)?;
        debug!(service = %self.name, path = %path.display(), "saved model");

        Model::from_json(model.prototype().clone(), json)
    }

    fn delete(&self, keys: &Keys, dimensions: &Dimensions) -> Result<bool> {
        match self.find(keys, dimensions)? {
            Some((path, _)) => {
                fs::remove_file(&path)?;
                debug!(service = %self.name, path = %path.display(), "deleted model");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list(&self, schema_uri: &str) -> Result<Vec<Model>> {
        Ok(self.scan(schema_uri)?.into_iter().map(|(_, model)| model).collect())
    }
}

/// Everything but ASCII alphanumerics, `-`, `_` and `.`
const FILE_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn file_safe(text: &str) -> String {
    utf8_percent_encode(text, FILE_SAFE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Schema, Slot, Value, DOCUMENT_SCHEMA_URI};
    use serde_json::json;
    use tempfile::TempDir;

    const PERSON: &str = "http://schema.example.com/people/Person";
    const EMPLOYEE: &str = "http://schema.example.com/people/Employee";

    fn setup() -> (TempDir, Arc<SchemaLoader>, FileService) {
        let loader = SchemaLoader::with_core_schemas().unwrap();
        loader
            .register(
                Schema::new(PERSON)
                    .with_base(DOCUMENT_SCHEMA_URI)
                    .with_slot(Slot::new("name", Value::text())),
            )
            .unwrap();
        loader
            .register(
                Schema::new(EMPLOYEE)
                    .with_base(PERSON)
                    .with_slot(Slot::new("badge", Value::Integer { minimum: None, maximum: None }))
                    .with_keys(["badge"]),
            )
            .unwrap();
        let loader = Arc::new(loader);
        let dir = TempDir::new().unwrap();
        let service = FileService::new("files", dir.path(), loader.clone());
        (dir, loader, service)
    }

    #[test]
    fn test_file_safe() {
        assert_eq!(file_safe("abc-1.2_x"), "abc-1.2_x");
        assert_eq!(file_safe("http://a/b"), "http%3A%2F%2Fa%2Fb");
        assert_eq!(file_safe("Zoë"), "Zo%C3%AB");
    }

    #[test]
    fn test_save_writes_under_schema_path() {
        let (dir, loader, service) = setup();
        let model = Model::new(loader.get_prototype(EMPLOYEE).unwrap())
            .with_slot("badge", json!(42))
            .unwrap()
            .with_slot("name", json!("Grace"))
            .unwrap();
        service.save(&model).unwrap();

        let expected = dir.path().join("schema.example.com/people/Employee/42.json");
        assert!(expected.is_file());

        let keys = Keys::new().with_key(EMPLOYEE, json!(42));
        let loaded = service.get(&keys, &Dimensions::new(EMPLOYEE)).unwrap().unwrap();
        assert_eq!(loaded.get_text("name").unwrap(), Some("Grace"));
    }

    #[test]
    fn test_save_replaces_model_sharing_document_uri() {
        let (dir, loader, service) = setup();
        let employee = |badge: i64| {
            Model::new(loader.get_prototype(EMPLOYEE).unwrap())
                .with_slot("badge", json!(badge))
                .unwrap()
                .with_slot("uri", json!("http://api.example.com/employees/current"))
                .unwrap()
        };
        service.save(&employee(7)).unwrap();
        service.save(&employee(8)).unwrap();

        let employees = dir.path().join("schema.example.com/people/Employee");
        assert!(!employees.join("7.json").exists());
        assert!(employees.join("8.json").is_file());
        assert_eq!(service.list(EMPLOYEE).unwrap().len(), 1);

        let by_uri = Keys::with_document_uri("http://api.example.com/employees/current");
        let found = service.get(&by_uri, &Dimensions::new(EMPLOYEE)).unwrap().unwrap();
        assert_eq!(found.get_i64("badge").unwrap(), Some(8));
    }

    #[test]
    fn test_get_through_base_schema_and_delete() {
        let (_dir, loader, service) = setup();
        let model = Model::new(loader.get_prototype(EMPLOYEE).unwrap())
            .with_slot("badge", json!(7))
            .unwrap()
            .with_slot("uri", json!("http://api.example.com/employees/7"))
            .unwrap();
        service.save(&model).unwrap();

        let by_uri = Keys::with_document_uri("http://api.example.com/employees/7");
        let found = service.get(&by_uri, &Dimensions::new(PERSON)).unwrap().unwrap();
        assert_eq!(found.schema_uri(), EMPLOYEE);
        assert_eq!(service.list(PERSON).unwrap().len(), 1);

        assert!(service.delete(&by_uri, &Dimensions::new(PERSON)).unwrap());
        assert!(service.list(PERSON).unwrap().is_empty());
    }
}
