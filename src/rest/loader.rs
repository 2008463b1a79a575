//! API Loading
//!
//! Reads Api and LinkRelation documents and keeps one [`ApiNavigator`] per
//! API. A document with a `resourceTemplate` is an Api; a document with a
//! `method` (and no `resourceTemplate`) is a LinkRelation.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::navigator::ApiNavigator;
use super::{Api, LinkRelation};
use crate::error::{Result, WrmlError};

/// Kind of document recognized by [`ApiLoader::load_document`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiDocument {
    Api(String),
    LinkRelation(String),
}

/// Registry of APIs and link relations
#[derive(Debug, Default)]
pub struct ApiLoader {
    relations: HashMap<String, LinkRelation>,
    navigators: HashMap<String, Arc<ApiNavigator>>,
}

impl ApiLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_link_relation(&mut self, relation: LinkRelation) {
        debug!(uri = %relation.uri, method = %relation.method, "registered link relation");
        self.relations.insert(relation.uri.clone(), relation);
    }

    /// Build and register the navigator of an API
    pub fn load_api(&mut self, api: Api) -> Result<Arc<ApiNavigator>> {
        let key = api.base_uri().to_string();
        let navigator = Arc::new(ApiNavigator::new(api, self.relations.values().cloned())?);
        for relation in &navigator.api().link_relations {
            self.relations
                .entry(relation.uri.clone())
                .or_insert_with(|| relation.clone());
        }
        self.navigators.insert(key, navigator.clone());
        Ok(navigator)
    }

    /// Load one JSON document, classifying it by shape
    pub fn load_document(&mut self, json: serde_json::Value) -> Result<ApiDocument> {
        if json.get("resourceTemplate").is_some() {
            let api: Api = serde_json::from_value(json)?;
            let uri = api.uri.clone();
            self.load_api(api)?;
            Ok(ApiDocument::Api(uri))
        } else if json.get("method").is_some() {
            let relation: LinkRelation = serde_json::from_value(json)?;
            let uri = relation.uri.clone();
            self.register_link_relation(relation);
            Ok(ApiDocument::LinkRelation(uri))
        } else {
            let label = json
                .get("uri")
                .and_then(|v| v.as_str())
                .unwrap_or("<unnamed>")
                .to_string();
            Err(WrmlError::invalid_api(
                label,
                "document is neither an Api (resourceTemplate) nor a LinkRelation (method)",
            ))
        }
    }

    /// Load every document under a directory. Link relations are registered
    /// before any API is built, so file order does not matter.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize> {
        let mut apis = Vec::new();
        let mut loaded = 0;

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let content = fs::read_to_string(path)?;
            let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                WrmlError::invalid_api(path.display().to_string(), format!("invalid JSON: {}", e))
            })?;

            if json.get("resourceTemplate").is_some() {
                apis.push(json);
            } else {
                self.load_document(json)?;
                loaded += 1;
            }
        }

        for json in apis {
            self.load_document(json)?;
            loaded += 1;
        }

        info!(dir = %dir.display(), count = loaded, "loaded API directory");
        Ok(loaded)
    }

    /// Navigator of the API with this URI
    pub fn navigator(&self, api_uri: &str) -> Option<Arc<ApiNavigator>> {
        self.navigators.get(api_uri.trim_end_matches('/')).cloned()
    }

    /// Navigator of the API whose base URI is the longest prefix of `uri`
    pub fn navigator_for_uri(&self, uri: &str) -> Option<Arc<ApiNavigator>> {
        self.navigators
            .iter()
            .filter(|(base, _)| {
                uri.strip_prefix(base.as_str())
                    .map(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
                    .unwrap_or(false)
            })
            .max_by_key(|(base, _)| base.len())
            .map(|(_, navigator)| navigator.clone())
    }

    pub fn link_relation(&self, uri: &str) -> Option<&LinkRelation> {
        self.relations.get(uri)
    }

    /// Registered API URIs, sorted
    pub fn api_uris(&self) -> Vec<&str> {
        let mut uris: Vec<&str> = self.navigators.keys().map(String::as_str).collect();
        uris.sort();
        uris
    }

    pub fn link_relations(&self) -> impl Iterator<Item = &LinkRelation> {
        self.relations.values()
    }
}
