//! Schema Loading
//!
//! The [`SchemaLoader`] owns every registered schema, the inheritance graph
//! built over them, and the prototype cache. Schemas come from directories of
//! WRML schema documents, from the core schemas compiled into the binary, or
//! from imported JSON-Schema files.

use include_dir::{include_dir, Dir};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::graph::InheritanceGraph;
use super::json_schema::{JsonSchemaDraft, JsonSchemaLoader};
use super::prototype::Prototype;
use super::{Schema, SchemaUri, CORE_SCHEMA_BASE_URI};
use crate::checksum::Checksum;
use crate::error::{Result, WrmlError};

/// Core schemas shipped with the runtime
static CORE_SCHEMAS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

/// What [`SchemaLoader::register`] did with a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First schema with this URI
    Added,
    /// Identical document already registered
    Unchanged,
    /// Replaced an older (or same-version, different) document
    Replaced,
    /// Older than the registered version; dropped
    Ignored,
}

/// Search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub uri: SchemaUri,
    pub title: Option<String>,
    pub score: i64,
}

#[derive(Debug)]
struct Entry {
    schema: Arc<Schema>,
    checksum: Checksum,
}

/// Registry of schemas and cache of their prototypes
#[derive(Debug)]
pub struct SchemaLoader {
    base_uri: String,
    json_schema: JsonSchemaLoader,
    schemas: RwLock<HashMap<SchemaUri, Entry>>,
    /// Bumped by every registration that changes `schemas`
    generation: AtomicU64,
    /// Graph and the generation it was built at
    graph: RwLock<Option<(u64, Arc<InheritanceGraph>)>>,
    prototypes: RwLock<HashMap<SchemaUri, Arc<Prototype>>>,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new(CORE_SCHEMA_BASE_URI)
    }
}

impl SchemaLoader {
    /// Create an empty loader. `base_uri` prefixes the URIs of schema files
    /// that do not declare one.
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            json_schema: JsonSchemaLoader::new(),
            schemas: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            graph: RwLock::new(None),
            prototypes: RwLock::new(HashMap::new()),
        }
    }

    /// Loader with the embedded core schemas already registered
    pub fn with_core_schemas() -> Result<Self> {
        let loader = Self::default();
        loader.load_embedded()?;
        Ok(loader)
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    // ========== Registration ==========

    /// Register a schema document
    pub fn register(&self, schema: Schema) -> Result<Registration> {
        schema.validate_declaration()?;
        let checksum = schema.checksum();
        let uri = schema.uri.clone();

        let outcome = {
            let mut schemas = write(&self.schemas);
            let outcome = match schemas.get(&uri) {
                None => Registration::Added,
                Some(existing) if existing.checksum == checksum => return Ok(Registration::Unchanged),
                Some(existing) if schema.version < existing.schema.version => {
                    warn!(
                        uri = %uri,
                        registered = %existing.schema.version,
                        offered = %schema.version,
                        "ignoring older schema version"
                    );
                    return Ok(Registration::Ignored);
                }
                Some(existing) => {
                    if schema.version == existing.schema.version {
                        warn!(uri = %uri, version = %schema.version, "schema changed without a version bump");
                    } else {
                        info!(uri = %uri, from = %existing.schema.version, to = %schema.version, "schema upgraded");
                    }
                    Registration::Replaced
                }
            };
            schemas.insert(
                uri.clone(),
                Entry {
                    schema: Arc::new(schema),
                    checksum,
                },
            );
            self.generation.fetch_add(1, Ordering::SeqCst);
            outcome
        };

        *write(&self.graph) = None;
        if outcome == Registration::Replaced {
            let mut prototypes = write(&self.prototypes);
            let before = prototypes.len();
            prototypes.retain(|_, proto| !proto.is_assignable_to(&uri));
            debug!(uri = %uri, evicted = before - prototypes.len(), "invalidated prototypes");
        }

        Ok(outcome)
    }

    /// Register several schemas, returning how many were added or replaced
    pub fn register_all(&self, schemas: impl IntoIterator<Item = Schema>) -> Result<usize> {
        let mut changed = 0;
        for schema in schemas {
            if matches!(self.register(schema)?, Registration::Added | Registration::Replaced) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    // ========== Loading ==========

    /// Load every WRML schema document under a directory
    pub fn load_directory(&self, dir: &Path) -> Result<usize> {
        let mut loaded = 0;
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let relative = path.strip_prefix(dir).unwrap_or(path);
            if relative.components().any(|c| c.as_os_str().to_string_lossy().starts_with('.')) {
                debug!(path = %path.display(), "skipping hidden file");
                continue;
            }

            let content = fs::read_to_string(path)?;
            let json: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
                WrmlError::invalid_schema(path.display().to_string(), format!("invalid JSON: {}", e))
            })?;

            if json.get("$schema").is_some() {
                warn!(path = %path.display(), "skipping JSON-Schema document in a WRML schema root");
                continue;
            }

            let schema = self.parse_document(json, relative)?;
            self.register(schema)?;
            loaded += 1;
        }

        info!(dir = %dir.display(), count = loaded, "loaded schema directory");
        Ok(loaded)
    }

    /// Load the core schemas compiled into the binary
    pub fn load_embedded(&self) -> Result<usize> {
        let mut files = Vec::new();
        collect_embedded_files(&CORE_SCHEMAS, &mut files);

        let mut loaded = 0;
        for (path, content) in files {
            let json: serde_json::Value = serde_json::from_str(content)?;
            let schema = self.parse_document(json, path)?;
            self.register(schema)?;
            loaded += 1;
        }

        debug!(count = loaded, "loaded embedded core schemas");
        Ok(loaded)
    }

    /// Import a JSON-Schema file, registering the schema and any nested ones
    pub fn load_json_schema_file(&self, path: &Path) -> Result<Vec<SchemaUri>> {
        let content = fs::read_to_string(path)?;
        let json: serde_json::Value = serde_json::from_str(&content)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.trim_end_matches(".schema"))
            .unwrap_or("Unnamed");
        let fallback = format!("{}/{}", self.base_uri, stem);
        self.import_json_schema(&json, Some(&fallback))
    }

    /// Import every `.json` JSON-Schema file under a directory
    pub fn load_json_schema_directory(&self, dir: &Path) -> Result<Vec<SchemaUri>> {
        let mut uris = Vec::new();
        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false) {
                uris.extend(self.load_json_schema_file(path)?);
            }
        }
        info!(dir = %dir.display(), count = uris.len(), "imported JSON-Schema directory");
        Ok(uris)
    }

    /// Import an in-memory JSON-Schema document
    pub fn import_json_schema(
        &self,
        json: &serde_json::Value,
        fallback_uri: Option<&str>,
    ) -> Result<Vec<SchemaUri>> {
        let import = self.json_schema.import(json, fallback_uri)?;
        let schemas = import.into_schemas();
        let uris = schemas.iter().map(|s| s.uri.clone()).collect();
        self.register_all(schemas)?;
        Ok(uris)
    }

    /// Export a registered schema as JSON-Schema
    pub fn export_json_schema(&self, uri: &str, draft: JsonSchemaDraft) -> Result<serde_json::Value> {
        let schema = self
            .get_schema(uri)
            .ok_or_else(|| WrmlError::SchemaNotFound(uri.to_string()))?;
        Ok(self.json_schema.export(&schema, draft))
    }

    /// Deserialize a schema document, deriving its URI from `relative_path`
    /// when it has none
    fn parse_document(&self, mut json: serde_json::Value, relative_path: &Path) -> Result<Schema> {
        if let Some(obj) = json.as_object_mut() {
            if !obj.contains_key("uri") {
                let uri = self.uri_for_path(relative_path);
                obj.insert("uri".into(), serde_json::Value::String(uri));
            }
        }
        let label = relative_path.display().to_string();
        serde_json::from_value(json).map_err(|e| WrmlError::invalid_schema(label, e.to_string()))
    }

    /// `org/example/Person.json` -> `{base_uri}/org/example/Person`
    pub fn uri_for_path(&self, relative_path: &Path) -> SchemaUri {
        let without_ext = relative_path.with_extension("");
        let segments: Vec<String> = without_ext
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("{}/{}", self.base_uri, segments.join("/"))
    }

    // ========== Queries ==========

    pub fn get_schema(&self, uri: &str) -> Option<Arc<Schema>> {
        read(&self.schemas).get(uri).map(|e| e.schema.clone())
    }

    pub fn contains(&self, uri: &str) -> bool {
        read(&self.schemas).contains_key(uri)
    }

    /// Registered schema URIs, sorted
    pub fn schema_uris(&self) -> Vec<SchemaUri> {
        let mut uris: Vec<SchemaUri> = read(&self.schemas).keys().cloned().collect();
        uris.sort();
        uris
    }

    pub fn schema_count(&self) -> usize {
        read(&self.schemas).len()
    }

    /// Inheritance graph over the registered schemas
    pub fn graph(&self) -> Arc<InheritanceGraph> {
        let schemas = read(&self.schemas);
        self.graph_of(&schemas)
    }

    /// Graph over `schemas`. The caller holds the schemas lock, so the
    /// generation cannot move while the graph is built or cached.
    fn graph_of(&self, schemas: &HashMap<SchemaUri, Entry>) -> Arc<InheritanceGraph> {
        let generation = self.generation.load(Ordering::SeqCst);
        if let Some((built_at, graph)) = read(&self.graph).as_ref() {
            if *built_at == generation {
                return graph.clone();
            }
        }

        let built = Arc::new(InheritanceGraph::from_schemas(schemas.values().map(|e| e.schema.as_ref())));
        debug!(schemas = built.schema_count(), edges = built.edge_count(), "built inheritance graph");
        *write(&self.graph) = Some((generation, built.clone()));
        built
    }

    /// Prototype of a schema, computed once and cached
    pub fn get_prototype(&self, uri: &str) -> Result<Arc<Prototype>> {
        if let Some(proto) = read(&self.prototypes).get(uri) {
            debug!(uri = %uri, "prototype cache hit");
            return Ok(proto.clone());
        }

        let (proto, generation) = {
            let schemas = read(&self.schemas);
            let graph = self.graph_of(&schemas);
            let proto = Prototype::build(uri, &graph, |u| schemas.get(u).map(|e| e.schema.as_ref()))?;
            (Arc::new(proto), self.generation.load(Ordering::SeqCst))
        };
        debug!(uri = %uri, slots = proto.slot_count(), "built prototype");

        // a registration since the build may already have run its eviction
        let mut prototypes = write(&self.prototypes);
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(uri = %uri, "schemas changed during build, prototype not cached");
            return Ok(proto);
        }
        Ok(prototypes.entry(uri.to_string()).or_insert(proto).clone())
    }

    /// Number of cached prototypes
    pub fn cached_prototype_count(&self) -> usize {
        read(&self.prototypes).len()
    }

    /// Fuzzy search over schema titles and URIs
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let schemas = read(&self.schemas);
        let mut results: Vec<SearchResult> = Vec::new();

        for entry in schemas.values() {
            let schema = &entry.schema;
            let by_title = schema
                .title
                .as_deref()
                .and_then(|title| matcher.fuzzy_match(title, query));
            let score = by_title.or_else(|| matcher.fuzzy_match(&schema.uri, query));
            if let Some(score) = score {
                results.push(SearchResult {
                    uri: schema.uri.clone(),
                    title: schema.title.clone(),
                    score,
                });
            }
        }

        results.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.uri.cmp(&b.uri)));
        results.truncate(limit);
        results
    }

    /// Combined checksum of every registered schema
    pub fn bundle_hash(&self) -> Checksum {
        let schemas = read(&self.schemas);
        Checksum::combine(schemas.values().map(|e| &e.checksum))
    }
}

fn collect_embedded_files<'a>(dir: &'a Dir<'static>, files: &mut Vec<(&'a Path, &'a str)>) {
    for file in dir.files() {
        let path = file.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Some(content) = file.contents_utf8() {
                files.push((path, content));
            }
        }
    }

    for subdir in dir.dirs() {
        collect_embedded_files(subdir, files);
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
