//! Model services
//!
//! A [`Service`] stores and retrieves models. The [`ServiceRegistry`] picks
//! the service for a schema by walking its prototype's linearization, so a
//! mapping for a base schema also covers every schema derived from it.

pub mod file;
pub mod memory;

pub use file::FileService;
pub use memory::MemoryService;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, WrmlError};
use crate::model::{Keys, Model};
use crate::schema::{Prototype, SchemaUri};

/// Request-side parameters that shape how a model is fetched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub schema_uri: SchemaUri,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// When non-empty, only these slots are returned
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_slot_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_slot_names: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, String>,
}

impl Dimensions {
    pub fn new(schema_uri: impl Into<String>) -> Self {
        Self {
            schema_uri: schema_uri.into(),
            ..Self::default()
        }
    }

    pub fn builder(schema_uri: impl Into<String>) -> DimensionsBuilder {
        DimensionsBuilder {
            dimensions: Self::new(schema_uri),
        }
    }

    /// Does the slot survive the included/excluded projection?
    pub fn projects(&self, slot_name: &str) -> bool {
        let included = self.included_slot_names.is_empty()
            || self.included_slot_names.iter().any(|n| n == slot_name);
        included && !self.excluded_slot_names.iter().any(|n| n == slot_name)
    }

    pub fn has_projection(&self) -> bool {
        !self.included_slot_names.is_empty() || !self.excluded_slot_names.is_empty()
    }
}

/// Builder for [`Dimensions`]
#[derive(Debug, Clone)]
pub struct DimensionsBuilder {
    dimensions: Dimensions,
}

impl DimensionsBuilder {
    pub fn referrer_uri(mut self, uri: impl Into<String>) -> Self {
        self.dimensions.referrer_uri = Some(uri.into());
        self
    }

    pub fn rel_uri(mut self, uri: impl Into<String>) -> Self {
        self.dimensions.rel_uri = Some(uri.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.dimensions.locale = Some(locale.into());
        self
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.dimensions.media_type = Some(media_type.into());
        self
    }

    pub fn include(mut self, slot_name: impl Into<String>) -> Self {
        self.dimensions.included_slot_names.push(slot_name.into());
        self
    }

    pub fn exclude(mut self, slot_name: impl Into<String>) -> Self {
        self.dimensions.excluded_slot_names.push(slot_name.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.query_params.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> Dimensions {
        self.dimensions
    }
}

/// Backing store for models
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    /// Model matching any of the keys that is an instance of the requested schema
    fn get(&self, keys: &Keys, dimensions: &Dimensions) -> Result<Option<Model>>;

    /// Store a model, replacing any stored model that shares one of its keys
    fn save(&self, model: &Model) -> Result<Model>;

    /// Remove the model matching the keys; `false` if there was none
    fn delete(&self, keys: &Keys, dimensions: &Dimensions) -> Result<bool>;

    /// Every stored model that is an instance of the schema
    fn list(&self, schema_uri: &str) -> Result<Vec<Model>>;
}

/// Named services and the schema mappings that select them
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Service>>,
    mappings: HashMap<SchemaUri, String>,
    default_service: String,
}

impl ServiceRegistry {
    /// Registry whose fallback is `default_service`
    pub fn new(default_service: Arc<dyn Service>) -> Self {
        let default_name = default_service.name().to_string();
        let mut services = HashMap::new();
        services.insert(default_name.clone(), default_service);
        Self {
            services,
            mappings: HashMap::new(),
            default_service: default_name,
        }
    }

    pub fn register(&mut self, service: Arc<dyn Service>) {
        self.services.insert(service.name().to_string(), service);
    }

    /// Route a schema (and its descendants) to a named service
    pub fn map(&mut self, schema_uri: impl Into<String>, service_name: impl Into<String>) {
        self.mappings.insert(schema_uri.into(), service_name.into());
    }

    pub fn service(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services.get(name).cloned()
    }

    pub fn default_service(&self) -> Arc<dyn Service> {
        // the default is inserted by `new` and never removed
        self.services[&self.default_service].clone()
    }

    /// Service for a prototype: the first mapping along its linearization,
    /// then the default
    pub fn service_for(&self, prototype: &Prototype) -> Result<Arc<dyn Service>> {
        let mapped = prototype
            .linearization()
            .iter()
            .find_map(|uri| self.mappings.get(uri).map(|name| (uri, name)));

        match mapped {
            Some((uri, name)) => {
                debug!(schema = %prototype.schema_uri(), via = %uri, service = %name, "mapped service");
                self.service(name).ok_or_else(|| {
                    WrmlError::Service(format!("schema {} is mapped to unknown service '{}'", uri, name))
                })
            }
            None => Ok(self.default_service()),
        }
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.services.keys().collect();
        names.sort();
        f.debug_struct("ServiceRegistry")
            .field("services", &names)
            .field("mappings", &self.mappings)
            .field("default_service", &self.default_service)
            .finish()
    }
}

/// Is the model an instance of the requested schema? An empty request matches
/// everything.
pub(crate) fn satisfies(model: &Model, dimensions: &Dimensions) -> bool {
    dimensions.schema_uri.is_empty() || model.is_instance_of(&dimensions.schema_uri)
}
