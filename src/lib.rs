//! WRML Runtime
//!
//! Runtime for the Web Resource Modeling Language: schemas with multiple
//! inheritance, dynamic models bound to inheritance-resolved prototypes, and
//! REST API metadata that routes URIs and computes link hrefs.
//!
//! ## Features
//!
//! - **Prototypes**: C3-linearized view of a schema and all of its bases
//! - **Dynamic Models**: JSON-backed instances with typed, alias-aware slots
//! - **JSON-Schema Interop**: import and export of draft 3 and draft 4 documents
//! - **API Navigation**: resource trees, URI templates, routing and links
//! - **Pluggable Services**: in-memory and file-backed model storage
//!
//! ## Architecture
//!
//! ```text
//! Context
//! ├── SchemaLoader ── Schema ──> InheritanceGraph ──> Prototype
//! ├── ApiLoader ───── Api ─────> ApiNavigator (resources, links)
//! └── ServiceRegistry
//!     ├── MemoryService
//!     └── FileService
//! ```

pub mod checksum;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod rest;
pub mod schema;
pub mod service;
pub mod version;

pub use checksum::Checksum;
pub use config::WrmlConfig;
pub use context::Context;
pub use error::{Result, WrmlError};
pub use model::{Keys, Model, ModelListener, SlotChange};
pub use rest::{Api, ApiLoader, ApiNavigator, LinkRelation, Method, ResourceTemplate, UriTemplate};
pub use schema::{JsonSchemaDraft, Prototype, Schema, SchemaLoader, Slot, Value};
pub use service::{Dimensions, Service, ServiceRegistry};
pub use version::SchemaVersion;
