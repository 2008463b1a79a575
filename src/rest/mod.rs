//! REST API metadata
//!
//! An [`Api`] describes a tree of [`ResourceTemplate`]s (one per URI path
//! segment) and the [`LinkTemplate`]s that connect them. Link semantics come
//! from [`LinkRelation`] documents, which name the HTTP method a link uses
//! and the schemas it exchanges.
//!
//! ```json
//! {
//!   "uri": "http://api.example.com",
//!   "title": "People",
//!   "resourceTemplate": {
//!     "id": "3b8b2f6e-2a55-4a4e-9d55-6c1a9a0e7d11",
//!     "pathSegment": "",
//!     "children": [
//!       { "id": "…", "pathSegment": "people", "children": [
//!         { "id": "…", "pathSegment": "{id}", "defaultSchemaUri": "http://schema.example.com/Person" }
//!       ] }
//!     ]
//!   },
//!   "linkTemplates": [
//!     { "linkRelationUri": "http://relation.api.wrml.org/org/wrml/relation/self", "referrerId": "…", "endPointId": "…" }
//!   ]
//! }
//! ```

pub mod loader;
pub mod navigator;
pub mod uri_template;

pub use loader::ApiLoader;
pub use navigator::{ApiNavigator, ResolvedResource, Resource, Route};
pub use uri_template::UriTemplate;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::WrmlError;
use crate::schema::SchemaUri;
use crate::version::SchemaVersion;

/// HTTP methods a link relation can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
    Options,
}

impl Method {
    pub const ALL: [Method; 6] = [
        Method::Get,
        Method::Head,
        Method::Put,
        Method::Post,
        Method::Delete,
        Method::Options,
    ];

    /// Name on the wire
    pub fn protocol_name(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }

    /// No side effects on the server
    pub fn is_safe(&self) -> bool {
        matches!(self, Method::Get | Method::Head | Method::Options)
    }

    /// Repeating the request has the same effect as sending it once
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.protocol_name())
    }
}

impl FromStr for Method {
    type Err = WrmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.protocol_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WrmlError::UnknownMethod(s.to_string()))
    }
}

impl Serialize for Method {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.protocol_name())
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Semantics of a link: the method it uses and the schemas it exchanges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRelation {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_schema_uri: Option<SchemaUri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema_uri: Option<SchemaUri>,
    /// Relation that walks the same link backwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_uri: Option<String>,
}

impl LinkRelation {
    pub fn new(uri: impl Into<String>, method: Method) -> Self {
        Self {
            uri: uri.into(),
            title: None,
            description: None,
            method,
            request_schema_uri: None,
            response_schema_uri: None,
            inverse_uri: None,
        }
    }

    pub fn with_response_schema(mut self, schema_uri: impl Into<String>) -> Self {
        self.response_schema_uri = Some(schema_uri.into());
        self
    }

    pub fn with_request_schema(mut self, schema_uri: impl Into<String>) -> Self {
        self.request_schema_uri = Some(schema_uri.into());
        self
    }
}

/// One node of an API's URI tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub id: Uuid,
    /// Literal segment or `{variable}`; empty for the root
    #[serde(default)]
    pub path_segment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Schema of the model a GET on this resource returns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema_uri: Option<SchemaUri>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handled_schema_uris: Vec<SchemaUri>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourceTemplate>,
}

impl ResourceTemplate {
    pub fn new(path_segment: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path_segment: path_segment.into(),
            title: None,
            default_schema_uri: None,
            handled_schema_uris: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_default_schema(mut self, schema_uri: impl Into<String>) -> Self {
        self.default_schema_uri = Some(schema_uri.into());
        self
    }

    pub fn with_child(mut self, child: ResourceTemplate) -> Self {
        self.children.push(child);
        self
    }

    /// Is the segment a `{variable}`?
    pub fn is_variable(&self) -> bool {
        self.path_segment.starts_with('{') && self.path_segment.ends_with('}')
    }
}

/// Design-time link from one resource to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTemplate {
    pub link_relation_uri: String,
    pub referrer_id: Uuid,
    pub end_point_id: Uuid,
}

/// A REST API document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Api {
    /// Base URI every resource path is relative to
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub version: SchemaVersion,
    pub resource_template: ResourceTemplate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_templates: Vec<LinkTemplate>,
    /// Relations declared inline with the API
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_relations: Vec<LinkRelation>,
}

impl Api {
    pub fn new(uri: impl Into<String>, resource_template: ResourceTemplate) -> Self {
        Self {
            uri: uri.into(),
            title: None,
            description: None,
            version: SchemaVersion::default(),
            resource_template,
            link_templates: Vec::new(),
            link_relations: Vec::new(),
        }
    }

    pub fn with_link(mut self, link_relation_uri: impl Into<String>, referrer_id: Uuid, end_point_id: Uuid) -> Self {
        self.link_templates.push(LinkTemplate {
            link_relation_uri: link_relation_uri.into(),
            referrer_id,
            end_point_id,
        });
        self
    }

    /// Base URI without a trailing slash
    pub fn base_uri(&self) -> &str {
        self.uri.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_parsing() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!(" Delete ".parse::<Method>().unwrap(), Method::Delete);
        assert!(matches!("PATCH".parse::<Method>(), Err(WrmlError::UnknownMethod(_))));
        assert_eq!(Method::Options.to_string(), "OPTIONS");
    }

    #[test]
    fn test_method_semantics() {
        assert!(Method::Get.is_safe() && Method::Get.is_idempotent());
        assert!(!Method::Put.is_safe() && Method::Put.is_idempotent());
        assert!(!Method::Post.is_safe() && !Method::Post.is_idempotent());
        assert!(!Method::Delete.is_safe() && Method::Delete.is_idempotent());
    }

    #[test]
    fn test_api_document_deserializes() {
        let api: Api = serde_json::from_value(json!({
            "uri": "http://api.example.com/",
            "version": "2.1",
            "resourceTemplate": {
                "id": "00000000-0000-0000-0000-000000000001",
                "children": [
                    { "id": "00000000-0000-0000-0000-000000000002", "pathSegment": "{id}" }
                ]
            },
            "linkRelations": [
                { "uri": "http://relation.example.com/delete", "method": "delete" }
            ]
        }))
        .unwrap();

        assert_eq!(api.base_uri(), "http://api.example.com");
        assert_eq!(api.version.version_string(), "2.1.0");
        assert_eq!(api.resource_template.path_segment, "");
        assert!(api.resource_template.children[0].is_variable());
        assert_eq!(api.link_relations[0].method, Method::Delete);
    }
}
