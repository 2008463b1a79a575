//! API Navigation Tests
//!
//! Loads the fixture API with its link relations and routes requests
//! through it.

use std::path::Path;

use uuid::Uuid;
use wrml::rest::loader::ApiDocument;
use wrml::{ApiLoader, Method, WrmlError};

const API: &str = "http://api.example.com";
const PERSON: &str = "http://schema.example.com/example/Person";
const EMPLOYEE: &str = "http://schema.example.com/example/Employee";
const COMPANY: &str = "http://schema.example.com/example/Company";

fn fixtures_path() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").leak()
}

fn loader() -> ApiLoader {
    let mut loader = ApiLoader::new();
    let loaded = loader.load_directory(&fixtures_path().join("apis")).unwrap();
    assert_eq!(loaded, 5);
    loader
}

fn id(n: u32) -> Uuid {
    Uuid::parse_str(&format!("00000000-0000-4000-8000-{:012}", n)).unwrap()
}

#[test]
fn test_relations_loaded_before_api() {
    let loader = loader();
    assert_eq!(loader.api_uris(), vec![API]);
    assert_eq!(loader.link_relation("http://relation.example.com/hire").unwrap().method, Method::Post);
    // inline relations are registered with the API
    assert!(loader.link_relation("http://relation.example.com/delete").is_some());
    assert_eq!(loader.link_relations().count(), 5);
}

#[test]
fn test_resource_tree() {
    let loader = loader();
    let nav = loader.navigator("http://api.example.com/").unwrap();
    assert_eq!(nav.api().title.as_deref(), Some("People API"));
    assert_eq!(nav.api().version.version_string(), "2.0.0");

    let paths: Vec<&str> = nav.resources().map(|r| r.full_path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/",
            "/people",
            "/people/me",
            "/people/{id}",
            "/companies",
            "/companies/{employerId}",
            "/companies/{employerId}/employees",
        ]
    );
    assert_eq!(
        nav.resource(&id(12)).unwrap().uri_template.as_str(),
        "http://api.example.com/people/{id}"
    );

    let tree = nav.describe_tree();
    assert!(tree.contains("  people\n"));
    assert!(tree.contains("{employerId}  [Company]  GET"));
    assert!(tree.contains("employees  GET, POST"));
}

#[test]
fn test_schema_lookup() {
    let loader = loader();
    let nav = loader.navigator(API).unwrap();
    let ids: Vec<Uuid> = nav.resources_for_schema(PERSON).iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![id(11), id(12)]);
    assert_eq!(nav.resources_for_schema(EMPLOYEE).len(), 1);
    assert!(nav.resources_for_schema("http://schema.example.com/example/Vehicle").is_empty());
}

#[test]
fn test_routing() {
    let loader = loader();
    let nav = loader.navigator_for_uri("http://api.example.com/people/42").unwrap();

    let route = nav.route(Method::Get, "http://api.example.com/people/42").unwrap();
    assert_eq!(route.resource_id, id(12));
    assert_eq!(route.params.get("id").map(String::as_str), Some("42"));
    assert_eq!(route.link_relation_uri.as_deref(), Some("http://relation.example.com/self"));
    assert_eq!(route.response_schema_uri.as_deref(), Some(PERSON));

    let route = nav.route(Method::Get, "http://api.example.com/people/me").unwrap();
    assert_eq!(route.resource_id, id(11));
    assert!(route.params.is_empty());
    assert_eq!(route.link_relation_uri, None);

    let route = nav
        .route(Method::Post, "http://api.example.com/companies/acme/employees")
        .unwrap();
    assert_eq!(route.params.get("employerId").map(String::as_str), Some("acme"));
    assert_eq!(route.request_schema_uri.as_deref(), Some(EMPLOYEE));
    assert_eq!(route.response_schema_uri.as_deref(), Some(EMPLOYEE));

    let route = nav
        .route(Method::Get, "http://api.example.com/companies/acme/employees")
        .unwrap();
    assert_eq!(route.response_schema_uri, None);

    let route = nav.route(Method::Get, "/companies/acme").unwrap();
    assert_eq!(route.response_schema_uri.as_deref(), Some(COMPANY));
}

#[test]
fn test_routing_errors() {
    let loader = loader();
    let nav = loader.navigator(API).unwrap();

    assert!(matches!(
        nav.route(Method::Delete, "http://api.example.com/people/42"),
        Err(WrmlError::MethodNotAllowed { .. })
    ));
    assert!(matches!(
        nav.route(Method::Get, "http://api.example.com/places/1"),
        Err(WrmlError::NoRoute(_))
    ));
    assert!(matches!(
        nav.route(Method::Get, "http://api.example.com/people/42/pets"),
        Err(WrmlError::NoRoute(_))
    ));
    assert!(loader.navigator_for_uri("http://elsewhere.example.com/people/42").is_none());
}

#[test]
fn test_links_between_resources() {
    let loader = loader();
    let nav = loader.navigator(API).unwrap();

    let outbound: Vec<&str> = nav
        .links_from(&id(12))
        .iter()
        .map(|l| l.link_relation_uri.as_str())
        .collect();
    assert_eq!(
        outbound,
        vec!["http://relation.example.com/self", "http://relation.example.com/employer"]
    );
    assert_eq!(nav.links_to(&id(22)).len(), 2);

    let employer = nav.link_relation("http://relation.example.com/employer").unwrap();
    assert_eq!(employer.inverse_uri.as_deref(), Some("http://relation.example.com/employees"));
}

#[test]
fn test_unknown_document_rejected() {
    let mut loader = ApiLoader::new();
    let err = loader
        .load_document(serde_json::json!({ "uri": "http://example.com/thing" }))
        .unwrap_err();
    assert!(matches!(err, WrmlError::InvalidApi { .. }));

    let doc = loader
        .load_document(serde_json::json!({ "uri": "http://relation.example.com/x", "method": "OPTIONS" }))
        .unwrap();
    assert_eq!(doc, ApiDocument::LinkRelation("http://relation.example.com/x".into()));
}
