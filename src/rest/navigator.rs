//! API navigation
//!
//! [`ApiNavigator`] flattens an [`Api`]'s resource template tree into an
//! arena of [`Resource`]s keyed by UUID, then answers routing questions: which
//! resource a URI names, which methods it allows, and where a model's links
//! point.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

use super::uri_template::{percent_decode, UriTemplate};
use super::{Api, LinkRelation, LinkTemplate, Method, ResourceTemplate};
use crate::error::{Result, WrmlError};
use crate::model::{Keys, Model};
use crate::schema::SchemaUri;

/// A node of the flattened resource tree
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: Uuid,
    pub path_segment: String,
    /// Path from the API root, e.g. `/people/{id}`
    pub full_path: String,
    /// Template of the absolute URI
    pub uri_template: UriTemplate,
    pub title: Option<String>,
    pub default_schema_uri: Option<SchemaUri>,
    pub handled_schema_uris: Vec<SchemaUri>,
    pub parent: Option<Uuid>,
    pub children: Vec<Uuid>,
    literal_children: HashMap<String, Uuid>,
    variable_child: Option<(String, Uuid)>,
    outbound: Vec<usize>,
    inbound: Vec<usize>,
}

impl Resource {
    /// Does this resource return or accept the schema?
    pub fn handles(&self, schema_uri: &str) -> bool {
        self.default_schema_uri.as_deref() == Some(schema_uri)
            || self.handled_schema_uris.iter().any(|s| s == schema_uri)
    }
}

/// A URI resolved to a resource
#[derive(Debug, Clone)]
pub struct ResolvedResource<'a> {
    pub resource: &'a Resource,
    /// Values of the URI template variables
    pub params: BTreeMap<String, String>,
}

/// Outcome of routing a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub resource_id: Uuid,
    pub full_path: String,
    pub method: Method,
    pub params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_relation_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_schema_uri: Option<SchemaUri>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema_uri: Option<SchemaUri>,
}

/// Resolves URIs and links against one API
#[derive(Debug, Clone)]
pub struct ApiNavigator {
    api: Api,
    root_id: Uuid,
    /// Resources in depth-first order
    order: Vec<Uuid>,
    resources: HashMap<Uuid, Resource>,
    relations: HashMap<String, LinkRelation>,
}

impl ApiNavigator {
    /// Build the navigator. Relations declared by the API itself take
    /// precedence over `relations`.
    pub fn new(api: Api, relations: impl IntoIterator<Item = LinkRelation>) -> Result<Self> {
        let mut relation_map: HashMap<String, LinkRelation> =
            relations.into_iter().map(|r| (r.uri.clone(), r)).collect();
        for relation in &api.link_relations {
            relation_map.insert(relation.uri.clone(), relation.clone());
        }

        let mut navigator = Self {
            root_id: api.resource_template.id,
            order: Vec::new(),
            resources: HashMap::new(),
            relations: relation_map,
            api,
        };

        let root = navigator.api.resource_template.clone();
        navigator.add_resource(&root, None)?;
        navigator.index_links()?;

        debug!(
            api = %navigator.api.uri,
            resources = navigator.resources.len(),
            links = navigator.api.link_templates.len(),
            "built API navigator"
        );
        Ok(navigator)
    }

    fn add_resource(&mut self, template: &ResourceTemplate, parent: Option<Uuid>) -> Result<()> {
        let api_uri = self.api.uri.clone();
        let segment = template.path_segment.as_str();

        if self.resources.contains_key(&template.id) {
            return Err(WrmlError::invalid_api(&api_uri, format!("duplicate resource id {}", template.id)));
        }
        if segment.contains('/') || (parent.is_some() && segment.is_empty()) {
            return Err(WrmlError::invalid_api(
                &api_uri,
                format!("invalid path segment '{}' on resource {}", segment, template.id),
            ));
        }
        if segment.contains(['{', '}']) && !template.is_variable() {
            return Err(WrmlError::invalid_api(
                &api_uri,
                format!("variable segment '{}' must span the whole segment", segment),
            ));
        }

        let full_path = match parent.and_then(|p| self.resources.get(&p)) {
            None if segment.is_empty() => "/".to_string(),
            None => format!("/{}", segment),
            Some(parent) if parent.full_path == "/" => format!("/{}", segment),
            Some(parent) => format!("{}/{}", parent.full_path, segment),
        };
        let uri_template = UriTemplate::parse(&format!("{}{}", self.api.base_uri(), full_path))
            .map_err(|e| WrmlError::invalid_api(&api_uri, e.to_string()))?;

        if let Some(parent_id) = parent {
            if let Some(parent) = self.resources.get_mut(&parent_id) {
                if template.is_variable() {
                    if let Some((existing, _)) = &parent.variable_child {
                        return Err(WrmlError::invalid_api(
                            &api_uri,
                            format!(
                                "resource {} has more than one variable child ({} and {})",
                                parent.full_path, existing, segment
                            ),
                        ));
                    }
                    let name = segment.trim_start_matches('{').trim_end_matches('}').to_string();
                    parent.variable_child = Some((name, template.id));
                } else if parent.literal_children.insert(segment.to_string(), template.id).is_some() {
                    return Err(WrmlError::invalid_api(
                        &api_uri,
                        format!("resource {} has duplicate child segment '{}'", parent.full_path, segment),
                    ));
                }
                parent.children.push(template.id);
            }
        }

        self.order.push(template.id);
        self.resources.insert(
            template.id,
            Resource {
                id: template.id,
                path_segment: segment.to_string(),
                full_path,
                uri_template,
                title: template.title.clone(),
                default_schema_uri: template.default_schema_uri.clone(),
                handled_schema_uris: template.handled_schema_uris.clone(),
                parent,
                children: Vec::new(),
                literal_children: HashMap::new(),
                variable_child: None,
                outbound: Vec::new(),
                inbound: Vec::new(),
            },
        );

        for child in &template.children {
            self.add_resource(child, Some(template.id))?;
        }
        Ok(())
    }

    fn index_links(&mut self) -> Result<()> {
        for (i, link) in self.api.link_templates.iter().enumerate() {
            if !self.relations.contains_key(&link.link_relation_uri) {
                return Err(WrmlError::UnknownLinkRelation(link.link_relation_uri.clone()));
            }
            for id in [link.referrer_id, link.end_point_id] {
                if !self.resources.contains_key(&id) {
                    return Err(WrmlError::invalid_api(
                        &self.api.uri,
                        format!("link template {} references unknown resource {}", link.link_relation_uri, id),
                    ));
                }
            }
            if let Some(referrer) = self.resources.get_mut(&link.referrer_id) {
                referrer.outbound.push(i);
            }
            if let Some(end_point) = self.resources.get_mut(&link.end_point_id) {
                end_point.inbound.push(i);
            }
        }
        Ok(())
    }

    // ========== Queries ==========

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn base_uri(&self) -> &str {
        self.api.base_uri()
    }

    pub fn root(&self) -> &Resource {
        // the root is inserted first by `new`
        &self.resources[&self.root_id]
    }

    pub fn resource(&self, id: &Uuid) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Every resource in depth-first order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.order.iter().filter_map(|id| self.resources.get(id))
    }

    pub fn link_relation(&self, uri: &str) -> Option<&LinkRelation> {
        self.relations.get(uri)
    }

    pub fn resources_for_schema(&self, schema_uri: &str) -> Vec<&Resource> {
        self.resources().filter(|r| r.handles(schema_uri)).collect()
    }

    /// Link templates leaving the resource
    pub fn links_from(&self, id: &Uuid) -> Vec<&LinkTemplate> {
        self.link_templates(id, |r| &r.outbound)
    }

    /// Link templates arriving at the resource
    pub fn links_to(&self, id: &Uuid) -> Vec<&LinkTemplate> {
        self.link_templates(id, |r| &r.inbound)
    }

    fn link_templates(&self, id: &Uuid, select: impl Fn(&Resource) -> &Vec<usize>) -> Vec<&LinkTemplate> {
        self.resources
            .get(id)
            .map(|r| select(r).iter().map(|&i| &self.api.link_templates[i]).collect())
            .unwrap_or_default()
    }

    /// Methods of the relations that lead to the resource, plus GET when it has
    /// a default schema
    pub fn allowed_methods(&self, id: &Uuid) -> BTreeSet<Method> {
        let mut methods: BTreeSet<Method> = self
            .links_to(id)
            .into_iter()
            .filter_map(|link| self.relations.get(&link.link_relation_uri))
            .map(|relation| relation.method)
            .collect();
        if self.resources.get(id).map(|r| r.default_schema_uri.is_some()).unwrap_or(false) {
            methods.insert(Method::Get);
        }
        methods
    }

    /// Resource named by a URI. The query string, fragment and trailing slash
    /// are ignored; literal segments win over variables.
    pub fn resolve(&self, uri: &str) -> Option<ResolvedResource<'_>> {
        let uri = uri.split(['?', '#']).next().unwrap_or(uri);
        let path = if let Some(rest) = uri.strip_prefix(self.base_uri()) {
            if !rest.is_empty() && !rest.starts_with('/') {
                return None;
            }
            rest
        } else if uri.starts_with('/') {
            uri
        } else {
            return None;
        };

        let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let root = self.root();
        if !root.path_segment.is_empty() {
            if segments.first() != Some(&root.path_segment.as_str()) {
                return None;
            }
            segments.remove(0);
        }

        let mut params = BTreeMap::new();
        let id = self.walk(root.id, &segments, &mut params)?;
        let resource = self.resources.get(&id)?;
        Some(ResolvedResource { resource, params })
    }

    fn walk(&self, id: Uuid, segments: &[&str], params: &mut BTreeMap<String, String>) -> Option<Uuid> {
        let Some((head, tail)) = segments.split_first() else {
            return Some(id);
        };
        let resource = self.resources.get(&id)?;

        if let Some(&child) = resource.literal_children.get(*head) {
            if let Some(found) = self.walk(child, tail, params) {
                return Some(found);
            }
        }

        if let Some((name, child)) = &resource.variable_child {
            params.insert(name.clone(), percent_decode(head));
            if let Some(found) = self.walk(*child, tail, params) {
                return Some(found);
            }
            params.remove(name);
        }

        None
    }

    /// Route a request to a resource and the link relation it exercises
    pub fn route(&self, method: Method, uri: &str) -> Result<Route> {
        let resolved = self.resolve(uri).ok_or_else(|| WrmlError::NoRoute(uri.to_string()))?;
        let resource = resolved.resource;

        if !self.allowed_methods(&resource.id).contains(&method) {
            return Err(WrmlError::MethodNotAllowed {
                method: method.to_string(),
                uri: uri.to_string(),
            });
        }

        let relation = self
            .links_to(&resource.id)
            .into_iter()
            .filter_map(|link| self.relations.get(&link.link_relation_uri))
            .find(|relation| relation.method == method);

        let (link_relation_uri, request_schema_uri, response_schema_uri) = match relation {
            Some(relation) => (
                Some(relation.uri.clone()),
                relation.request_schema_uri.clone(),
                relation
                    .response_schema_uri
                    .clone()
                    .or_else(|| method.is_safe().then(|| resource.default_schema_uri.clone()).flatten()),
            ),
            None => (None, None, resource.default_schema_uri.clone()),
        };

        Ok(Route {
            resource_id: resource.id,
            full_path: resource.full_path.clone(),
            method,
            params: resolved.params,
            link_relation_uri,
            request_schema_uri,
            response_schema_uri,
        })
    }

    /// Absolute URI a model's link with relation `rel_uri` points to.
    ///
    /// The end point's template variables are filled from the referrer's own
    /// URI parameters first, then from referrer slots of the same name.
    pub fn link_href(&self, referrer: &Model, rel_uri: &str) -> Result<String> {
        let referrer_uri = referrer.uri().ok_or_else(|| {
            WrmlError::NoRoute(format!("{} model has no document uri", referrer.schema_uri()))
        })?;
        let resolved = self
            .resolve(referrer_uri)
            .ok_or_else(|| WrmlError::NoRoute(referrer_uri.to_string()))?;

        let link = self
            .links_from(&resolved.resource.id)
            .into_iter()
            .find(|link| link.link_relation_uri == rel_uri)
            .ok_or_else(|| WrmlError::UnknownLinkRelation(rel_uri.to_string()))?;
        let end_point = self
            .resources
            .get(&link.end_point_id)
            .ok_or_else(|| WrmlError::invalid_api(&self.api.uri, "dangling link end point"))?;

        let mut params = resolved.params;
        for name in end_point.uri_template.variable_names() {
            if params.contains_key(name) {
                continue;
            }
            if let Ok(value) = referrer.get_slot(name) {
                if !value.is_null() {
                    params.insert(name.to_string(), Keys::key_text(value));
                }
            }
        }

        end_point.uri_template.evaluate(&params)
    }

    /// Indented outline of the resource tree
    pub fn describe_tree(&self) -> String {
        let mut out = String::new();
        self.describe_resource(self.root_id, 0, &mut out);
        out
    }

    fn describe_resource(&self, id: Uuid, depth: usize, out: &mut String) {
        let Some(resource) = self.resources.get(&id) else {
            return;
        };
        let label = if depth == 0 { resource.full_path.as_str() } else { resource.path_segment.as_str() };
        out.push_str(&"  ".repeat(depth));
        out.push_str(label);
        if let Some(schema) = &resource.default_schema_uri {
            out.push_str(&format!("  [{}]", schema.rsplit('/').next().unwrap_or(schema)));
        }
        let methods: Vec<&str> = self.allowed_methods(&id).iter().map(Method::protocol_name).collect();
        if !methods.is_empty() {
            out.push_str(&format!("  {}", methods.join(", ")));
        }
        out.push('\n');
        for child in &resource.children {
            self.describe_resource(*child, depth + 1, out);
        }
    }
}
