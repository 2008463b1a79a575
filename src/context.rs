//! Runtime context
//!
//! [`Context`] owns the schema loader, the API loader and the service
//! registry built from a [`WrmlConfig`], and is the entry point for working
//! with models: create, fetch, save, delete and follow links.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::{ServiceKind, WrmlConfig};
use crate::error::{Result, WrmlError};
use crate::model::{Keys, Model};
use crate::rest::ApiLoader;
use crate::schema::SchemaLoader;
use crate::service::{Dimensions, FileService, MemoryService, ServiceRegistry};

/// Schemas, APIs and services wired together
#[derive(Debug)]
pub struct Context {
    config: WrmlConfig,
    schema_loader: Arc<SchemaLoader>,
    api_loader: ApiLoader,
    services: ServiceRegistry,
}

impl Context {
    /// Build a context, loading every configured schema and API source
    pub fn new(config: WrmlConfig) -> Result<Self> {
        let schema_loader = SchemaLoader::new(config.schemas.base_uri.clone());
        if config.schemas.load_embedded {
            schema_loader.load_embedded()?;
        }
        for root in &config.schemas.roots {
            schema_loader.load_directory(root)?;
        }
        for root in &config.schemas.json_schema_roots {
            schema_loader.load_json_schema_directory(root)?;
        }
        let schema_loader = Arc::new(schema_loader);

        let mut api_loader = ApiLoader::new();
        for root in &config.apis.roots {
            api_loader.load_directory(root)?;
        }

        let memory = Arc::new(MemoryService::new(ServiceKind::Memory.name()));
        let file = Arc::new(FileService::new(
            ServiceKind::File.name(),
            config.service_root(),
            schema_loader.clone(),
        ));
        let mut services = match config.service.default {
            ServiceKind::Memory => ServiceRegistry::new(memory.clone()),
            ServiceKind::File => ServiceRegistry::new(file.clone()),
        };
        services.register(memory);
        services.register(file);
        for mapping in &config.service.mappings {
            services.map(mapping.schema_uri.clone(), mapping.service.name());
        }

        info!(
            schemas = schema_loader.schema_count(),
            apis = api_loader.api_uris().len(),
            default_service = config.service.default.name(),
            "context ready"
        );

        Ok(Self {
            config,
            schema_loader,
            api_loader,
            services,
        })
    }

    pub fn config(&self) -> &WrmlConfig {
        &self.config
    }

    pub fn schema_loader(&self) -> &Arc<SchemaLoader> {
        &self.schema_loader
    }

    pub fn api_loader(&self) -> &ApiLoader {
        &self.api_loader
    }

    pub fn api_loader_mut(&mut self) -> &mut ApiLoader {
        &mut self.api_loader
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut ServiceRegistry {
        &mut self.services
    }

    // ========== Models ==========

    /// Empty model of the schema, with slot defaults applied
    pub fn new_model(&self, schema_uri: &str) -> Result<Model> {
        Ok(Model::new(self.schema_loader.get_prototype(schema_uri)?))
    }

    /// Fetch a model from the service its schema maps to. Slots outside the
    /// dimensions' projection are dropped.
    #[instrument(skip(self, keys), fields(schema = %dimensions.schema_uri))]
    pub fn get_model(&self, keys: &Keys, dimensions: &Dimensions) -> Result<Option<Model>> {
        let prototype = self.schema_loader.get_prototype(&dimensions.schema_uri)?;
        let service = self.services.service_for(&prototype)?;

        let Some(mut model) = service.get(keys, dimensions)? else {
            debug!(service = service.name(), "model not found");
            return Ok(None);
        };
        if dimensions.has_projection() {
            model.retain_slots(|name| dimensions.projects(name));
        }
        Ok(Some(model))
    }

    /// Store a model, validating it first unless validation on save is off
    pub fn save_model(&self, model: &Model) -> Result<Model> {
        if self.config.validation.validate_on_save {
            model.validate(self.config.validation.strict_json_schema)?;
        }
        let service = self.services.service_for(model.prototype())?;
        service.save(model)
    }

    pub fn delete_model(&self, keys: &Keys, dimensions: &Dimensions) -> Result<bool> {
        let prototype = self.schema_loader.get_prototype(&dimensions.schema_uri)?;
        self.services.service_for(&prototype)?.delete(keys, dimensions)
    }

    /// Follow a link slot of a document model to the model at its end point.
    ///
    /// The response schema comes from the link relation, falling back to the
    /// end point resource's default schema. Only safe relations can be
    /// visited.
    #[instrument(skip(self, referrer), fields(referrer = %referrer.schema_uri()))]
    pub fn visit_link(&self, referrer: &Model, link_slot_name: &str) -> Result<Option<Model>> {
        let prototype = referrer.prototype();
        let rel_uri = prototype
            .link_relation_uri(link_slot_name)
            .ok_or_else(|| WrmlError::UnknownSlot {
                schema: prototype.schema_uri().to_string(),
                slot: link_slot_name.to_string(),
            })?;

        let referrer_uri = referrer.uri().ok_or_else(|| {
            WrmlError::NoRoute(format!("{} model has no document uri", referrer.schema_uri()))
        })?;
        let navigator = self
            .api_loader
            .navigator_for_uri(referrer_uri)
            .ok_or_else(|| WrmlError::NoRoute(referrer_uri.to_string()))?;

        let relation = navigator
            .link_relation(rel_uri)
            .ok_or_else(|| WrmlError::UnknownLinkRelation(rel_uri.to_string()))?;
        if !relation.method.is_safe() {
            return Err(WrmlError::MethodNotAllowed {
                method: relation.method.to_string(),
                uri: referrer_uri.to_string(),
            });
        }

        let href = navigator.link_href(referrer, rel_uri)?;
        let response_schema_uri = relation
            .response_schema_uri
            .clone()
            .or_else(|| {
                navigator
                    .resolve(&href)
                    .and_then(|resolved| resolved.resource.default_schema_uri.clone())
            })
            .ok_or_else(|| {
                WrmlError::invalid_api(
                    navigator.base_uri(),
                    format!("link relation {} has no response schema", rel_uri),
                )
            })?;

        debug!(href = %href, rel = %rel_uri, schema = %response_schema_uri, "visiting link");
        let dimensions = Dimensions::builder(response_schema_uri)
            .referrer_uri(referrer_uri)
            .rel_uri(rel_uri)
            .build();
        self.get_model(&Keys::with_document_uri(href), &dimensions)
    }
}
