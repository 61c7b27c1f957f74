#![recursion_limit = "256"]

mod common;

use common::{FakeJobs, FakeNames, FakePolicy, FakeSemantics, harness, harness_with, sample_document};
use datapact::store::Store;

#[test]
fn test_import_builds_full_tree() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();

    assert_eq!(contract.name, "orders");
    assert_eq!(contract.version, "1.1.0");
    assert_eq!(contract.status, "draft");
    assert_eq!(contract.team_id.as_deref(), Some("team-1"));
    assert_eq!(contract.base_name.as_deref(), Some("orders"));
    assert!(!contract.published);

    let tree = h.store.get_contract_tree(&contract.id).unwrap().unwrap();
    assert_eq!(tree.tags.len(), 2);
    assert_eq!(tree.roles.len(), 1);
    assert_eq!(tree.roles[0].custom_properties.len(), 1);
    assert_eq!(tree.team.len(), 1);
    assert_eq!(tree.servers.len(), 1);
    assert_eq!(tree.servers[0].properties.len(), 3);
    assert_eq!(tree.support.len(), 1);
    assert!(tree.pricing.is_some());
    assert_eq!(tree.sla_properties.len(), 2);
    assert_eq!(tree.custom_properties.len(), 1);
    assert_eq!(tree.definitions.len(), 1);
    assert_eq!(tree.schemas.len(), 1);

    let schema = &tree.schemas[0];
    assert_eq!(schema.object.physical_type.as_deref(), Some("table"));
    assert_eq!(schema.properties.len(), 3);
    assert_eq!(schema.quality.len(), 2);
    assert_eq!(schema.definitions.len(), 1);

    let order_id = schema
        .properties
        .iter()
        .find(|p| p.property.name == "order_id")
        .unwrap();
    assert_eq!(order_id.property.primary_key_position, 1);
    assert!(order_id.property.required);
    assert_eq!(order_id.definitions.len(), 1);

    // The property-scoped quality check is wired to the property row
    let null_check = schema
        .quality
        .iter()
        .find(|q| q.rule.as_deref() == Some("nullCheck"))
        .unwrap();
    assert_eq!(null_check.property_id.as_ref(), Some(&order_id.property.id));
}

#[test]
fn test_import_auto_creates_domain_as_system() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();

    assert!(contract.domain_id.is_some());
    let ensured = h.names.ensured.lock().unwrap().clone();
    assert_eq!(ensured, vec![("sales".to_string(), "system".to_string())]);
}

#[test]
fn test_import_name_fallback_chain() {
    let h = harness();

    let doc = serde_json::from_value(serde_json::json!({"dataProduct": "commerce"})).unwrap();
    let contract = h.engine.import_document(&doc, "ava").unwrap();
    assert_eq!(contract.name, "commerce");

    let doc = serde_json::from_value(serde_json::json!({"id": "custom-id-1"})).unwrap();
    let contract = h.engine.import_document(&doc, "ava").unwrap();
    assert_eq!(contract.name, "custom-id-1");
    assert_eq!(contract.id, "custom-id-1");

    let doc = serde_json::from_value(serde_json::json!({})).unwrap();
    let contract = h.engine.import_document(&doc, "ava").unwrap();
    assert_eq!(contract.name, "unnamed-contract");
}

#[test]
fn test_import_regenerates_taken_id() {
    let h = harness();
    let doc = serde_json::from_value(serde_json::json!({"id": "fixed", "name": "first"})).unwrap();
    let first = h.engine.import_document(&doc, "ava").unwrap();
    assert_eq!(first.id, "fixed");

    let doc = serde_json::from_value(serde_json::json!({"id": "fixed", "name": "second"})).unwrap();
    let second = h.engine.import_document(&doc, "ava").unwrap();
    assert_ne!(second.id, "fixed");
}

#[test]
fn test_import_rejects_bad_version_and_duplicate_key_positions() {
    let h = harness();

    let doc = serde_json::from_value(serde_json::json!({"name": "x", "version": "2.0"})).unwrap();
    assert!(h.engine.import_document(&doc, "ava").is_err());

    let doc = serde_json::from_value(serde_json::json!({
        "name": "x",
        "schema": [{"name": "t", "properties": [
            {"name": "a", "primaryKey": true, "primaryKeyPosition": 1},
            {"name": "b", "primaryKey": true, "primaryKeyPosition": 1}
        ]}]
    }))
    .unwrap();
    let err = h.engine.import_document(&doc, "ava").unwrap_err();
    assert!(err.to_string().contains("primary key position"));
    // Nothing was written
    assert!(h.store.list_contracts().unwrap().is_empty());
}

#[test]
fn test_export_emits_sentinels_and_property_tags() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let doc = h.engine.export_document(&contract.id).unwrap();
    let value = serde_json::to_value(&doc).unwrap();

    let props = value["schema"][0]["properties"].as_array().unwrap();
    let total = props
        .iter()
        .find(|p| p["name"] == "total")
        .unwrap();
    assert_eq!(total["primaryKey"], serde_json::json!(false));
    assert_eq!(total["primaryKeyPosition"], serde_json::json!(-1));
    assert_eq!(total["partitioned"], serde_json::json!(false));
    assert_eq!(total["partitionKeyPosition"], serde_json::json!(-1));
    assert_eq!(total["tags"], serde_json::json!([]));
}

#[test]
fn test_export_resolves_owner_and_domain_names() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let doc = h.engine.export_document(&contract.id).unwrap();

    assert_eq!(doc.owner.as_deref(), Some("data-platform"));
    assert_eq!(doc.domain.as_deref(), Some("sales"));
}

#[test]
fn test_export_reemits_numeric_strings_as_numbers() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let doc = h.engine.export_document(&contract.id).unwrap();

    let price = doc.price.unwrap();
    assert_eq!(price.price_amount, Some(serde_json::json!(9.95)));

    let latency = doc
        .sla_properties
        .unwrap()
        .into_iter()
        .find(|s| s.property.as_deref() == Some("latency"))
        .unwrap();
    assert_eq!(latency.value, Some(serde_json::json!(4)));
}

#[test]
fn test_round_trip_is_stable() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let exported = h.engine.export_document(&contract.id).unwrap();

    let reimported = h.engine.import_document(&exported, "ava").unwrap();
    let reexported = h.engine.export_document(&reimported.id).unwrap();

    let mut first = serde_json::to_value(&exported).unwrap();
    let mut second = serde_json::to_value(&reexported).unwrap();
    // Identifiers and creation stamps are generated per import
    for doc in [&mut first, &mut second] {
        let obj = doc.as_object_mut().unwrap();
        obj.remove("id");
        obj.remove("contractCreatedTs");
    }
    assert_eq!(first, second);
}

#[test]
fn test_semantic_enrichment_failure_does_not_abort_export() {
    let h = harness_with(
        FakeJobs::default(),
        FakeNames {
            teams: std::collections::HashMap::new(),
            ..Default::default()
        },
        FakeSemantics {
            fail: true,
            ..Default::default()
        },
        FakePolicy::default(),
    );
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let doc = h.engine.export_document(&contract.id).unwrap();
    assert_eq!(doc.name.as_deref(), Some("orders"));
}

#[test]
fn test_semantic_enrichment_appends_assignments_at_all_levels() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let tree = h.store.get_contract_tree(&contract.id).unwrap().unwrap();
    let schema = &tree.schemas[0];
    let property = &schema.properties[0].property;

    h.semantics.link(&contract.id, "https://onto.example.com/OrderContract");
    h.semantics.link(&schema.object.id, "https://onto.example.com/Order");
    h.semantics.link(&property.id, "https://onto.example.com/OrderId");

    let doc = h.engine.export_document(&contract.id).unwrap();

    let semantic = |defs: &Option<Vec<datapact::document::DefinitionDocument>>| {
        defs.as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|d| d.definition_type == "semantic-assignment")
            .count()
    };
    assert_eq!(semantic(&doc.authoritative_definitions), 1);
    let schema_doc = &doc.schema.as_ref().unwrap()[0];
    assert_eq!(semantic(&schema_doc.authoritative_definitions), 1);
    let prop_doc = schema_doc
        .properties
        .as_ref()
        .unwrap()
        .iter()
        .find(|p| p.name.as_deref() == Some(property.name.as_str()))
        .unwrap();
    assert_eq!(semantic(&prop_doc.authoritative_definitions), 1);
}

#[test]
fn test_parse_upload_json_yaml_and_text() {
    let h = harness();

    let doc = h
        .engine
        .parse_upload(br#"{"name": "orders", "version": "1.0.0"}"#, "application/json")
        .unwrap();
    assert_eq!(doc.name.as_deref(), Some("orders"));

    let doc = h
        .engine
        .parse_upload(b"name: orders\nversion: 1.0.0\n", "application/yaml")
        .unwrap();
    assert_eq!(doc.name.as_deref(), Some("orders"));

    let doc = h
        .engine
        .parse_upload(b"free-form notes about the dataset", "text/plain")
        .unwrap();
    assert_eq!(
        doc.description.unwrap().purpose.as_deref(),
        Some("free-form notes about the dataset")
    );

    let long = "x".repeat(600);
    let doc = h.engine.parse_upload(long.as_bytes(), "text/plain").unwrap();
    let purpose = doc.description.unwrap().purpose.unwrap();
    assert_eq!(purpose.chars().count(), 503);
    assert!(purpose.ends_with("..."));
}

#[test]
fn test_validate_document_strict_and_lenient() {
    let h = harness();
    let doc = serde_json::from_value(serde_json::json!({
        "version": "not-semver",
        "schema": [{"properties": [
            {"name": "a", "primaryKey": true, "primaryKeyPosition": 2},
            {"name": "b", "primaryKey": true, "primaryKeyPosition": 2}
        ]}]
    }))
    .unwrap();

    let report = h.engine.validate_document(&doc, false).unwrap();
    assert!(!report.is_valid());
    assert!(report.warnings.len() >= 3);

    assert!(h.engine.validate_document(&doc, true).is_err());

    let clean = sample_document();
    let report = h.engine.validate_document(&clean, false).unwrap();
    assert!(report.is_valid(), "{:?}", report.warnings);
}
