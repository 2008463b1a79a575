//! Configuration management for the WRML runtime
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (wrml.toml)
//! - Environment variables (WRML__*)
//!
//! ## Example config file (wrml.toml):
//! ```toml
//! [schemas]
//! base_uri = "http://schema.example.com"
//! roots = ["./schemas"]
//! load_embedded = true
//! json_schema_roots = ["./json-schema"]
//!
//! [apis]
//! roots = ["./apis"]
//!
//! [service]
//! default = "memory"
//! root = "./data"
//!
//! [[service.mappings]]
//! schema_uri = "http://schema.example.com/Person"
//! service = "file"
//!
//! [validation]
//! strict_json_schema = true
//! validate_on_save = true
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::schema::CORE_SCHEMA_BASE_URI;

/// Main configuration for the runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WrmlConfig {
    /// Schema sources
    #[serde(default)]
    pub schemas: SchemasConfig,

    /// API sources
    #[serde(default)]
    pub apis: ApisConfig,

    /// Model services
    #[serde(default)]
    pub service: ServiceConfig,

    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

/// Schema sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemasConfig {
    /// Prefix for URIs of schema files that do not declare one
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// Directories of WRML schema documents
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Register the core schemas compiled into the binary
    #[serde(default = "default_true")]
    pub load_embedded: bool,

    /// Directories of JSON-Schema documents to import
    #[serde(default)]
    pub json_schema_roots: Vec<PathBuf>,
}

/// API sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApisConfig {
    /// Directories of Api and LinkRelation documents
    #[serde(default)]
    pub roots: Vec<PathBuf>,
}

/// Built-in service kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    #[default]
    Memory,
    File,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Memory => "memory",
            ServiceKind::File => "file",
        }
    }
}

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service used for schemas without a mapping
    #[serde(default)]
    pub default: ServiceKind,

    /// Root directory of the file service
    #[serde(default = "default_service_root")]
    pub root: PathBuf,

    /// Schemas routed to a service other than the default
    #[serde(default)]
    pub mappings: Vec<ServiceMapping>,
}

/// Routes a schema, and every schema derived from it, to a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceMapping {
    pub schema_uri: String,
    pub service: ServiceKind,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Also validate against the prototype's JSON-Schema
    #[serde(default = "default_true")]
    pub strict_json_schema: bool,

    /// Validate models before saving them
    #[serde(default = "default_true")]
    pub validate_on_save: bool,
}

// Default value functions
fn default_base_uri() -> String {
    CORE_SCHEMA_BASE_URI.to_string()
}

fn default_true() -> bool {
    true
}

fn default_service_root() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for SchemasConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            roots: Vec::new(),
            load_embedded: true,
            json_schema_roots: Vec::new(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default: ServiceKind::Memory,
            root: default_service_root(),
            mappings: Vec::new(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_json_schema: true,
            validate_on_save: true,
        }
    }
}

impl WrmlConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["wrml.toml", ".wrml.toml", "config/wrml.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = Self::project_dirs() {
            let xdg_config = config_dir.config_dir().join("wrml.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (WRML__SECTION__KEY)
        builder = builder.add_source(
            Environment::with_prefix("WRML")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("org", "wrml", "wrml")
    }

    /// Path of the per-user config file
    pub fn user_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("wrml.toml"))
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
    }

    /// Root of the file service (resolves relative paths)
    pub fn service_root(&self) -> PathBuf {
        if self.service.root.is_absolute() {
            self.service.root.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.service.root)
        }
    }
}
