//! JSON-Schema Interop Tests
//!
//! Imports the draft 3 and draft 4 fixtures and exports prototypes back.

use std::path::Path;

use serde_json::json;
use wrml::schema::{JsonSchemaDraft, SchemaLoader, Syntax, Value};

const BASE: &str = "http://schema.example.com";
const ADDRESS: &str = "http://schema.example.com/example/Address";
const GEO: &str = "http://schema.example.com/example/Address/Geo";
const VEHICLE: &str = "http://schema.example.com/example/Vehicle";
const PERSON: &str = "http://schema.example.com/example/Person";

fn fixtures_path() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").leak()
}

fn loader() -> SchemaLoader {
    let loader = SchemaLoader::new(BASE);
    loader.load_embedded().unwrap();
    loader.load_directory(&fixtures_path().join("schemas")).unwrap();
    loader
}

#[test]
fn test_import_draft4_with_nested_object() {
    let loader = loader();
    let uris = loader
        .load_json_schema_file(&fixtures_path().join("json_schema/Address.json"))
        .unwrap();
    assert_eq!(uris, vec![ADDRESS.to_string(), GEO.to_string()]);

    let address = loader.get_schema(ADDRESS).unwrap();
    assert_eq!(address.title.as_deref(), Some("Address"));

    let street = address.slot("street").unwrap();
    assert!(street.required);
    assert!(matches!(street.value, Value::Text { max_length: Some(80), .. }));

    let country = address.slot("country").unwrap();
    assert_eq!(country.default, Some(json!("US")));
    assert!(matches!(&country.value, Value::SingleSelect { choices } if choices.len() == 3));

    let zip = address.slot("zip").unwrap();
    assert_eq!(zip.dependencies, vec!["country".to_string()]);

    let geo = address.slot("geo").unwrap();
    assert_eq!(geo.value, Value::Model { schema_uri: Some(GEO.to_string()) });

    let geo_schema = loader.get_schema(GEO).unwrap();
    assert!(geo_schema.slots.iter().all(|s| s.required));
}

#[test]
fn test_import_draft3_document() {
    let loader = loader();
    loader
        .load_json_schema_file(&fixtures_path().join("json_schema/Vehicle.json"))
        .unwrap();
    let vehicle = loader.get_prototype(VEHICLE).unwrap();

    assert!(vehicle.slot("vin").unwrap().slot.required);
    assert!(matches!(vehicle.slot("wheels").unwrap().value(), Value::Integer { minimum: Some(2), .. }));
    assert!(matches!(vehicle.slot("mileage").unwrap().value(), Value::Long { .. }));
    assert_eq!(vehicle.slot("mileage").unwrap().slot.dependencies, vec!["wheels".to_string()]);
    assert_eq!(vehicle.slot("registeredOn").unwrap().value(), &Value::Date);
    assert_eq!(
        vehicle.slot("owner").unwrap().value(),
        &Value::Model { schema_uri: Some(PERSON.to_string()) }
    );
    assert!(matches!(vehicle.slot("features").unwrap().value(), Value::MultiSelect { .. }));

    // hyper-schema links become link slots named after the relation
    assert_eq!(vehicle.link_relation_uri("self"), Some("http://relation.example.com/self"));
    assert_eq!(vehicle.key_slot_names(), vec!["vin"]);
}

#[test]
fn test_directory_import_skips_nothing() {
    let loader = loader();
    let uris = loader
        .load_json_schema_directory(&fixtures_path().join("json_schema"))
        .unwrap();
    assert_eq!(uris.len(), 3);
    assert!(loader.contains(VEHICLE) && loader.contains(GEO));
}

#[test]
fn test_wrml_roots_skip_json_schema_documents() {
    let loader = SchemaLoader::new(BASE);
    let loaded = loader.load_directory(&fixtures_path().join("json_schema")).unwrap();
    assert_eq!(loaded, 0);
}

#[test]
fn test_export_roundtrip_through_both_drafts() {
    let loader = loader();
    let original = loader.get_schema(PERSON).unwrap();

    for draft in [JsonSchemaDraft::Draft3, JsonSchemaDraft::Draft4] {
        let exported = loader.export_json_schema(PERSON, draft).unwrap();
        assert_eq!(exported["$schema"], json!(draft.meta_schema_uri()));
        assert_eq!(exported["properties"]["email"]["format"], json!("email"));

        let reimported = SchemaLoader::new(BASE);
        let uris = reimported.import_json_schema(&exported, None).unwrap();
        assert_eq!(uris, vec![PERSON.to_string()]);

        let schema = reimported.get_schema(PERSON).unwrap();
        assert_eq!(schema.base_schema_uris, original.base_schema_uris);
        assert_eq!(schema.key_slot_names, original.key_slot_names);
        let names: Vec<&str> = schema.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "birthday", "nickname", "employerId", "employer"]);
        assert_eq!(
            schema.slot("email").unwrap().value,
            Value::Text { syntax: Some(Syntax::Email), min_length: None, max_length: None, pattern: None }
        );
    }
}

#[test]
fn test_prototype_json_schema_validates_instances() {
    let loader = loader();
    let employee = loader.get_prototype("http://schema.example.com/example/Employee").unwrap();
    let schema = employee.to_json_schema();

    let compiled = jsonschema::JSONSchema::options()
        .with_draft(jsonschema::Draft::Draft4)
        .compile(&schema)
        .unwrap();
    assert!(compiled.is_valid(&json!({ "name": "Ada", "badge": 7, "department": "sales" })));
    assert!(!compiled.is_valid(&json!({ "name": "Ada" })));
    assert!(!compiled.is_valid(&json!({ "name": "Ada", "badge": 7, "department": "legal" })));
    assert!(!compiled.is_valid(&json!({ "name": "Ada", "badge": 7, "shoeSize": 44 })));
}

#[test]
fn test_refs_resolve_across_hosts_and_urns() {
    let loader = SchemaLoader::new(BASE);
    let shipment = json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "id": "http://schema.example.com/example/Shipment",
        "type": "object",
        "properties": {
            "carrier": { "$ref": "//carriers.example.com/schema/Carrier" },
            "origin": { "$ref": "../places/Warehouse#" }
        }
    });
    loader.import_json_schema(&shipment, None).unwrap();
    let schema = loader.get_schema("http://schema.example.com/example/Shipment").unwrap();
    assert_eq!(
        schema.slot("carrier").unwrap().value,
        Value::Model { schema_uri: Some("http://carriers.example.com/schema/Carrier".to_string()) }
    );
    assert_eq!(
        schema.slot("origin").unwrap().value,
        Value::Model { schema_uri: Some("http://schema.example.com/places/Warehouse".to_string()) }
    );

    let parcel = json!({
        "id": "urn:example:Parcel",
        "type": "object",
        "properties": { "shipment": { "$ref": "Shipment" } }
    });
    loader.import_json_schema(&parcel, None).unwrap();
    let schema = loader.get_schema("urn:example:Parcel").unwrap();
    assert_eq!(
        schema.slot("shipment").unwrap().value,
        Value::Model { schema_uri: Some("urn:example:Shipment".to_string()) }
    );
}
