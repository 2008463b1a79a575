//! Error types for the WRML runtime

use thiserror::Error;

/// Result type for WRML operations
pub type Result<T> = std::result::Result<T, WrmlError>;

/// WRML runtime errors
#[derive(Error, Debug)]
pub enum WrmlError {
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Invalid schema {uri}: {reason}")]
    InvalidSchema { uri: String, reason: String },

    #[error("Inheritance cycle detected through: {}", members.join(" -> "))]
    InheritanceCycle { members: Vec<String> },

    #[error("Cannot linearize base schemas of {0}: inconsistent precedence order")]
    InconsistentHierarchy(String),

    #[error("Slot '{slot}' in {schema} overrides a {base_kind} slot with a {kind} slot")]
    InvalidSlotOverride {
        schema: String,
        slot: String,
        kind: String,
        base_kind: String,
    },

    #[error("Key slot '{slot}' declared by {schema} is listed more than once")]
    DuplicateKeySlot { schema: String, slot: String },

    #[error("Key slot '{slot}' declared by {schema} does not resolve to any slot")]
    UnresolvedKeySlot { schema: String, slot: String },

    #[error("Default value of slot '{slot}' in {schema} is invalid: {reason}")]
    InvalidSlotDefault {
        schema: String,
        slot: String,
        reason: String,
    },

    #[error("Unknown slot '{slot}' for schema {schema}")]
    UnknownSlot { schema: String, slot: String },

    #[error("Slot '{slot}' of {schema} rejected value: {reason}")]
    SlotTypeMismatch {
        schema: String,
        slot: String,
        reason: String,
    },

    #[error("Slot '{slot}' of {schema} is read-only")]
    ReadOnlySlot { schema: String, slot: String },

    #[error("Model of {schema} failed validation: {}", problems.join("; "))]
    Validation { schema: String, problems: Vec<String> },

    #[error("Invalid URI template '{template}': {reason}")]
    InvalidUriTemplate { template: String, reason: String },

    #[error("Missing value for URI template variable '{0}'")]
    MissingTemplateVariable(String),

    #[error("Invalid API {api}: {reason}")]
    InvalidApi { api: String, reason: String },

    #[error("Unknown link relation: {0}")]
    UnknownLinkRelation(String),

    #[error("No API resource matches {0}")]
    NoRoute(String),

    #[error("Method {method} is not allowed on {uri}")]
    MethodNotAllowed { method: String, uri: String },

    #[error("Unknown HTTP method: {0}")]
    UnknownMethod(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}

impl WrmlError {
    pub(crate) fn invalid_schema(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_api(api: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidApi {
            api: api.into(),
            reason: reason.into(),
        }
    }
}
