#![recursion_limit = "256"]

mod common;

use common::{harness, sample_document};
use datapact::diff::{ChangeType, VersionBump};
use datapact::store::Store;

#[test]
fn test_create_new_version_is_shallow() {
    let h = harness();
    let source = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();

    let clone = h
        .engine
        .create_new_version(&source.id, "1.2.0", "ava")
        .unwrap();
    assert_ne!(clone.id, source.id);
    assert_eq!(clone.version, "1.2.0");
    assert_eq!(clone.status, "draft");
    assert!(!clone.published);
    assert_eq!(clone.parent_contract_id.as_deref(), Some(source.id.as_str()));
    assert_eq!(clone.base_name, source.base_name);

    let tree = h.store.get_contract_tree(&clone.id).unwrap().unwrap();
    assert!(tree.schemas.is_empty());
    assert!(tree.tags.is_empty());
    assert!(tree.pricing.is_none());
}

#[test]
fn test_deep_clone_matches_source_collection_counts() {
    let h = harness();
    let source = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();

    let clone = h
        .engine
        .clone_contract_for_new_version(&source.id, "2.0.0", "ava")
        .unwrap();
    assert_eq!(clone.version, "2.0.0");
    assert_eq!(clone.status, "draft");

    let old = h.store.get_contract_tree(&source.id).unwrap().unwrap();
    let new = h.store.get_contract_tree(&clone.id).unwrap().unwrap();

    assert_eq!(new.tags.len(), old.tags.len());
    assert_eq!(new.roles.len(), old.roles.len());
    assert_eq!(new.team.len(), old.team.len());
    assert_eq!(new.servers.len(), old.servers.len());
    assert_eq!(
        new.servers[0].properties.len(),
        old.servers[0].properties.len()
    );
    assert_eq!(new.support.len(), old.support.len());
    assert_eq!(new.pricing.is_some(), old.pricing.is_some());
    assert_eq!(new.sla_properties.len(), old.sla_properties.len());
    assert_eq!(new.custom_properties.len(), old.custom_properties.len());
    assert_eq!(new.definitions.len(), old.definitions.len());
    assert_eq!(new.schemas.len(), old.schemas.len());

    let old_schema = &old.schemas[0];
    let new_schema = &new.schemas[0];
    assert_eq!(new_schema.properties.len(), old_schema.properties.len());
    assert_eq!(new_schema.quality.len(), old_schema.quality.len());
    assert_eq!(new_schema.definitions.len(), old_schema.definitions.len());
    let old_prop_defs: usize = old_schema.properties.iter().map(|p| p.definitions.len()).sum();
    let new_prop_defs: usize = new_schema.properties.iter().map(|p| p.definitions.len()).sum();
    assert_eq!(new_prop_defs, old_prop_defs);

    // Everything got fresh identities re-parented under the clone
    assert_ne!(new_schema.object.id, old_schema.object.id);
    assert_eq!(new_schema.object.contract_id, clone.id);
    let property_scoped = new_schema
        .quality
        .iter()
        .find(|q| q.property_id.is_some())
        .unwrap();
    let remapped_id = property_scoped.property_id.as_ref().unwrap();
    assert!(
        new_schema
            .properties
            .iter()
            .any(|p| &p.property.id == remapped_id),
        "quality check must point at a property of the clone"
    );
}

#[test]
fn test_deep_clone_rejects_partial_version_before_writing() {
    let h = harness();
    let source = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();

    let err = h
        .engine
        .clone_contract_for_new_version(&source.id, "2.0", "ava")
        .unwrap_err();
    assert!(err.to_string().contains("2.0"));
    assert_eq!(h.store.list_contracts().unwrap().len(), 1);
}

#[test]
fn test_get_contract_versions_by_base_name() {
    let h = harness();
    let v1 = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let v2 = h
        .engine
        .clone_contract_for_new_version(&v1.id, "2.0.0", "ava")
        .unwrap();
    let v3 = h
        .engine
        .create_new_version(&v2.id, "2.1.0", "ava")
        .unwrap();

    let versions = h.engine.get_contract_versions(&v1.id).unwrap();
    assert_eq!(versions.len(), 3);
    // Newest created first
    assert_eq!(versions[0].id, v3.id);
    assert_eq!(versions[2].id, v1.id);
}

#[test]
fn test_get_contract_versions_lineage_fallback() {
    let h = harness();
    let v1 = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let v2 = h
        .engine
        .create_new_version(&v1.id, "1.2.0", "ava")
        .unwrap();

    // Legacy rows carry no family key
    let mut legacy1 = h.store.get_contract(&v1.id).unwrap().unwrap();
    legacy1.base_name = None;
    h.store.update_contract(&legacy1).unwrap();
    let mut legacy2 = h.store.get_contract(&v2.id).unwrap().unwrap();
    legacy2.base_name = None;
    h.store.update_contract(&legacy2).unwrap();

    let from_child = h.engine.get_contract_versions(&v2.id).unwrap();
    assert_eq!(from_child.len(), 2);

    let from_parent = h.engine.get_contract_versions(&v1.id).unwrap();
    assert_eq!(from_parent.len(), 2);
}

#[test]
fn test_compare_versions_recommends_bump() {
    let h = harness();
    let v1 = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let v2 = h
        .engine
        .clone_contract_for_new_version(&v1.id, "2.0.0", "ava")
        .unwrap();

    // Only the version string differs between the two trees
    let analysis = h.engine.compare_versions(&v1.id, &v2.id).unwrap();
    assert_eq!(analysis.recommended_bump, VersionBump::Patch);
    assert!(
        analysis
            .field_changes
            .iter()
            .all(|c| c.change_type == ChangeType::VersionOnly)
    );
}
