//! Pure contract comparison.
//!
//! Compares two interchange documents and classifies every difference into a
//! closed change-type set, then folds the set into a recommended semantic
//! version bump. No side effects, no store access.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::document::{ContractDocument, PropertyDocument, QualityDocument, SchemaDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    SchemaAdded,
    SchemaRemoved,
    FieldAdded,
    FieldRemoved,
    TypeChanged,
    RequiredChanged,
    KeyChanged,
    MetadataChanged,
    QualityAdded,
    QualityRemoved,
    QualityChanged,
    VersionOnly,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::SchemaAdded => "schema_added",
            ChangeType::SchemaRemoved => "schema_removed",
            ChangeType::FieldAdded => "field_added",
            ChangeType::FieldRemoved => "field_removed",
            ChangeType::TypeChanged => "type_changed",
            ChangeType::RequiredChanged => "required_changed",
            ChangeType::KeyChanged => "key_changed",
            ChangeType::MetadataChanged => "metadata_changed",
            ChangeType::QualityAdded => "quality_added",
            ChangeType::QualityRemoved => "quality_removed",
            ChangeType::QualityChanged => "quality_changed",
            ChangeType::VersionOnly => "version_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    Patch,
    Minor,
    Major,
}

impl VersionBump {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeSeverity {
    Breaking,
    Feature,
    Fix,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldChange {
    pub change_type: ChangeType,
    pub schema_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    pub severity: ChangeSeverity,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityChange {
    pub change_type: ChangeType,
    pub schema_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeAnalysis {
    pub recommended_bump: VersionBump,
    pub summary: String,
    pub breaking_changes: Vec<String>,
    pub new_features: Vec<String>,
    pub fixes: Vec<String>,
    pub field_changes: Vec<FieldChange>,
    pub quality_changes: Vec<QualityChange>,
}

impl ChangeAnalysis {
    pub fn change_types(&self) -> Vec<ChangeType> {
        let mut types: Vec<ChangeType> = Vec::new();
        for change in &self.field_changes {
            if !types.contains(&change.change_type) {
                types.push(change.change_type);
            }
        }
        for change in &self.quality_changes {
            if !types.contains(&change.change_type) {
                types.push(change.change_type);
            }
        }
        types
    }
}

/// Compares two contract documents and recommends a version bump.
///
/// Removals and tightenings are breaking (major). Additions and loosenings are
/// features (minor). Descriptive metadata and quality-rule edits are fixes
/// (patch). A version-string change with nothing else touched is `version_only`
/// and patch-level.
pub fn compare_contracts(old: &ContractDocument, new: &ContractDocument) -> ChangeAnalysis {
    let mut field_changes: Vec<FieldChange> = Vec::new();
    let mut quality_changes: Vec<QualityChange> = Vec::new();

    let old_schemas = schema_map(old);
    let new_schemas = schema_map(new);

    for (name, old_schema) in &old_schemas {
        match new_schemas.get(name) {
            Some(new_schema) => {
                compare_schema(name, old_schema, new_schema, &mut field_changes);
                compare_quality(
                    name,
                    old_schema.quality.as_deref().unwrap_or_default(),
                    new_schema.quality.as_deref().unwrap_or_default(),
                    &mut quality_changes,
                );
            }
            None => field_changes.push(FieldChange {
                change_type: ChangeType::SchemaRemoved,
                schema_name: name.clone(),
                field_name: None,
                old_value: Some(Value::String(name.clone())),
                new_value: None,
                severity: ChangeSeverity::Breaking,
            }),
        }
    }
    for name in new_schemas.keys() {
        if !old_schemas.contains_key(name) {
            field_changes.push(FieldChange {
                change_type: ChangeType::SchemaAdded,
                schema_name: name.clone(),
                field_name: None,
                old_value: None,
                new_value: Some(Value::String(name.clone())),
                severity: ChangeSeverity::Feature,
            });
        }
    }

    compare_contract_metadata(old, new, &mut field_changes);

    let version_changed = old.version != new.version;
    if field_changes.is_empty() && quality_changes.is_empty() && version_changed {
        field_changes.push(FieldChange {
            change_type: ChangeType::VersionOnly,
            schema_name: String::new(),
            field_name: Some("version".to_string()),
            old_value: old.version.clone().map(Value::String),
            new_value: new.version.clone().map(Value::String),
            severity: ChangeSeverity::Fix,
        });
    }

    let mut breaking_changes = Vec::new();
    let mut new_features = Vec::new();
    let mut fixes = Vec::new();
    for change in &field_changes {
        let line = describe_field_change(change);
        match change.severity {
            ChangeSeverity::Breaking => breaking_changes.push(line),
            ChangeSeverity::Feature => new_features.push(line),
            ChangeSeverity::Fix => fixes.push(line),
        }
    }
    for change in &quality_changes {
        match change.change_type {
            ChangeType::QualityAdded => new_features.push(change.description.clone()),
            _ => fixes.push(change.description.clone()),
        }
    }

    let recommended_bump = if !breaking_changes.is_empty() {
        VersionBump::Major
    } else if !new_features.is_empty() {
        VersionBump::Minor
    } else {
        VersionBump::Patch
    };

    let summary = if field_changes.is_empty() && quality_changes.is_empty() {
        "No changes detected".to_string()
    } else {
        format!(
            "{} breaking change(s), {} new feature(s), {} fix(es); recommended bump: {}",
            breaking_changes.len(),
            new_features.len(),
            fixes.len(),
            recommended_bump.as_str()
        )
    };

    ChangeAnalysis {
        recommended_bump,
        summary,
        breaking_changes,
        new_features,
        fixes,
        field_changes,
        quality_changes,
    }
}

fn describe_field_change(change: &FieldChange) -> String {
    let target = match (&change.schema_name.is_empty(), &change.field_name) {
        (false, Some(field)) => format!("'{}.{}'", change.schema_name, field),
        (false, None) => format!("schema '{}'", change.schema_name),
        (true, Some(field)) => format!("'{}'", field),
        (true, None) => "contract".to_string(),
    };
    match change.change_type {
        ChangeType::SchemaAdded => format!("Schema '{}' added", change.schema_name),
        ChangeType::SchemaRemoved => format!("Schema '{}' removed", change.schema_name),
        ChangeType::FieldAdded => format!("Field {} added", target),
        ChangeType::FieldRemoved => format!("Field {} removed", target),
        ChangeType::TypeChanged => format!(
            "Type of {} changed from {} to {}",
            target,
            value_label(&change.old_value),
            value_label(&change.new_value)
        ),
        ChangeType::RequiredChanged => format!(
            "Required flag of {} changed from {} to {}",
            target,
            value_label(&change.old_value),
            value_label(&change.new_value)
        ),
        ChangeType::KeyChanged => format!("Key configuration of {} changed", target),
        ChangeType::MetadataChanged => format!("Metadata of {} changed", target),
        ChangeType::QualityAdded => format!("Quality check on {} added", target),
        ChangeType::QualityRemoved => format!("Quality check on {} removed", target),
        ChangeType::QualityChanged => format!("Quality check on {} changed", target),
        ChangeType::VersionOnly => format!(
            "Version changed from {} to {}",
            value_label(&change.old_value),
            value_label(&change.new_value)
        ),
    }
}

fn value_label(value: &Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "none".to_string(),
    }
}

fn schema_map(doc: &ContractDocument) -> BTreeMap<String, &SchemaDocument> {
    doc.schema
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|s| s.name.clone().map(|n| (n, s)))
        .collect()
}

fn property_map(schema: &SchemaDocument) -> BTreeMap<String, &PropertyDocument> {
    schema
        .properties
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|p| p.name.clone().map(|n| (n, p)))
        .collect()
}

fn compare_schema(
    schema_name: &str,
    old: &SchemaDocument,
    new: &SchemaDocument,
    out: &mut Vec<FieldChange>,
) {
    let old_props = property_map(old);
    let new_props = property_map(new);

    for (name, old_prop) in &old_props {
        match new_props.get(name) {
            Some(new_prop) => compare_property(schema_name, name, old_prop, new_prop, out),
            None => out.push(FieldChange {
                change_type: ChangeType::FieldRemoved,
                schema_name: schema_name.to_string(),
                field_name: Some(name.clone()),
                old_value: Some(Value::String(name.clone())),
                new_value: None,
                severity: ChangeSeverity::Breaking,
            }),
        }
    }
    for name in new_props.keys() {
        if !old_props.contains_key(name) {
            out.push(FieldChange {
                change_type: ChangeType::FieldAdded,
                schema_name: schema_name.to_string(),
                field_name: Some(name.clone()),
                old_value: None,
                new_value: Some(Value::String(name.clone())),
                severity: ChangeSeverity::Feature,
            });
        }
    }

    if old.description != new.description
        || old.business_name != new.business_name
        || old.physical_name != new.physical_name
    {
        out.push(FieldChange {
            change_type: ChangeType::MetadataChanged,
            schema_name: schema_name.to_string(),
            field_name: None,
            old_value: old.description.clone().map(Value::String),
            new_value: new.description.clone().map(Value::String),
            severity: ChangeSeverity::Fix,
        });
    }
}

fn compare_property(
    schema_name: &str,
    field_name: &str,
    old: &PropertyDocument,
    new: &PropertyDocument,
    out: &mut Vec<FieldChange>,
) {
    let push = |out: &mut Vec<FieldChange>,
                change_type: ChangeType,
                old_value: Option<Value>,
                new_value: Option<Value>,
                severity: ChangeSeverity| {
        out.push(FieldChange {
            change_type,
            schema_name: schema_name.to_string(),
            field_name: Some(field_name.to_string()),
            old_value,
            new_value,
            severity,
        });
    };

    if old.logical_type != new.logical_type || old.physical_type != new.physical_type {
        push(
            out,
            ChangeType::TypeChanged,
            type_value(old),
            type_value(new),
            ChangeSeverity::Breaking,
        );
    }

    let old_required = old.required.unwrap_or(false);
    let new_required = new.required.unwrap_or(false);
    if old_required != new_required {
        // Tightening breaks existing writers; loosening does not
        let severity = if new_required {
            ChangeSeverity::Breaking
        } else {
            ChangeSeverity::Feature
        };
        push(
            out,
            ChangeType::RequiredChanged,
            Some(Value::Bool(old_required)),
            Some(Value::Bool(new_required)),
            severity,
        );
    }

    if old.primary_key != new.primary_key
        || old.primary_key_position != new.primary_key_position
        || old.partitioned != new.partitioned
        || old.partition_key_position != new.partition_key_position
    {
        push(
            out,
            ChangeType::KeyChanged,
            key_value(old),
            key_value(new),
            ChangeSeverity::Breaking,
        );
    }

    if descriptive_fields(old) != descriptive_fields(new) {
        push(
            out,
            ChangeType::MetadataChanged,
            None,
            None,
            ChangeSeverity::Fix,
        );
    }
}

fn descriptive_fields(p: &PropertyDocument) -> (Option<&str>, Option<&str>, &[String]) {
    (
        p.classification.as_deref(),
        p.transform_description.as_deref(),
        &p.tags,
    )
}

fn type_value(p: &PropertyDocument) -> Option<Value> {
    p.logical_type
        .clone()
        .or_else(|| p.physical_type.clone())
        .map(Value::String)
}

fn key_value(p: &PropertyDocument) -> Option<Value> {
    Some(Value::String(format!(
        "pk={}@{} partition={}@{}",
        p.primary_key, p.primary_key_position, p.partitioned, p.partition_key_position
    )))
}

fn quality_key(q: &QualityDocument) -> String {
    format!(
        "{}|{}|{}",
        q.rule.as_deref().unwrap_or(""),
        q.name.as_deref().unwrap_or(""),
        q.property.as_deref().unwrap_or("")
    )
}

fn compare_quality(
    schema_name: &str,
    old: &[QualityDocument],
    new: &[QualityDocument],
    out: &mut Vec<QualityChange>,
) {
    let old_map: BTreeMap<String, &QualityDocument> =
        old.iter().map(|q| (quality_key(q), q)).collect();
    let new_map: BTreeMap<String, &QualityDocument> =
        new.iter().map(|q| (quality_key(q), q)).collect();

    for (key, old_check) in &old_map {
        match new_map.get(key) {
            Some(new_check) if **new_check != **old_check => out.push(QualityChange {
                change_type: ChangeType::QualityChanged,
                schema_name: schema_name.to_string(),
                rule: old_check.rule.clone(),
                description: format!(
                    "Quality check '{}' on schema '{}' modified",
                    check_label(old_check),
                    schema_name
                ),
            }),
            Some(_) => {}
            None => out.push(QualityChange {
                change_type: ChangeType::QualityRemoved,
                schema_name: schema_name.to_string(),
                rule: old_check.rule.clone(),
                description: format!(
                    "Quality check '{}' on schema '{}' removed",
                    check_label(old_check),
                    schema_name
                ),
            }),
        }
    }
    for (key, new_check) in &new_map {
        if !old_map.contains_key(key) {
            out.push(QualityChange {
                change_type: ChangeType::QualityAdded,
                schema_name: schema_name.to_string(),
                rule: new_check.rule.clone(),
                description: format!(
                    "Quality check '{}' on schema '{}' added",
                    check_label(new_check),
                    schema_name
                ),
            });
        }
    }
}

fn check_label(q: &QualityDocument) -> &str {
    q.name
        .as_deref()
        .or(q.rule.as_deref())
        .unwrap_or("unnamed")
}

fn compare_contract_metadata(
    old: &ContractDocument,
    new: &ContractDocument,
    out: &mut Vec<FieldChange>,
) {
    let fields: [(&str, Option<&String>, Option<&String>); 4] = [
        ("name", old.name.as_ref(), new.name.as_ref()),
        (
            "dataProduct",
            old.data_product.as_ref(),
            new.data_product.as_ref(),
        ),
        ("domain", old.domain.as_ref(), new.domain.as_ref()),
        ("tenant", old.tenant.as_ref(), new.tenant.as_ref()),
    ];
    for (field, old_value, new_value) in fields {
        if old_value != new_value {
            out.push(FieldChange {
                change_type: ChangeType::MetadataChanged,
                schema_name: String::new(),
                field_name: Some(field.to_string()),
                old_value: old_value.cloned().map(Value::String),
                new_value: new_value.cloned().map(Value::String),
                severity: ChangeSeverity::Fix,
            });
        }
    }

    let old_desc = old.description.clone().unwrap_or_default();
    let new_desc = new.description.clone().unwrap_or_default();
    if old_desc != new_desc {
        out.push(FieldChange {
            change_type: ChangeType::MetadataChanged,
            schema_name: String::new(),
            field_name: Some("description".to_string()),
            old_value: serde_json::to_value(&old_desc).ok(),
            new_value: serde_json::to_value(&new_desc).ok(),
            severity: ChangeSeverity::Fix,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> ContractDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_identical_documents_report_no_changes() {
        let d = doc(json!({
            "name": "orders",
            "version": "1.0.0",
            "schema": [{"name": "orders", "properties": [{"name": "id", "logicalType": "string"}]}]
        }));
        let analysis = compare_contracts(&d, &d);
        assert!(analysis.field_changes.is_empty());
        assert!(analysis.quality_changes.is_empty());
        assert_eq!(analysis.recommended_bump, VersionBump::Patch);
        assert_eq!(analysis.summary, "No changes detected");
    }

    #[test]
    fn test_removed_schema_is_breaking() {
        let old = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders"}, {"name": "refunds"}]
        }));
        let new = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders"}]
        }));
        let analysis = compare_contracts(&old, &new);
        assert_eq!(analysis.recommended_bump, VersionBump::Major);
        assert_eq!(analysis.breaking_changes.len(), 1);
        assert_eq!(
            analysis.field_changes[0].change_type,
            ChangeType::SchemaRemoved
        );
    }

    #[test]
    fn test_added_field_is_minor() {
        let old = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders", "properties": [{"name": "id"}]}]
        }));
        let new = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders", "properties": [{"name": "id"}, {"name": "total"}]}]
        }));
        let analysis = compare_contracts(&old, &new);
        assert_eq!(analysis.recommended_bump, VersionBump::Minor);
        assert_eq!(analysis.new_features.len(), 1);
        assert_eq!(
            analysis.field_changes[0].change_type,
            ChangeType::FieldAdded
        );
    }

    #[test]
    fn test_type_change_outranks_addition() {
        let old = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders", "properties": [{"name": "id", "logicalType": "integer"}]}]
        }));
        let new = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders", "properties": [
                {"name": "id", "logicalType": "string"},
                {"name": "total"}
            ]}]
        }));
        let analysis = compare_contracts(&old, &new);
        assert_eq!(analysis.recommended_bump, VersionBump::Major);
        assert!(
            analysis
                .field_changes
                .iter()
                .any(|c| c.change_type == ChangeType::TypeChanged)
        );
    }

    #[test]
    fn test_required_loosened_is_feature_tightened_is_breaking() {
        let required = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders", "properties": [{"name": "id", "required": true}]}]
        }));
        let optional = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders", "properties": [{"name": "id", "required": false}]}]
        }));

        let loosened = compare_contracts(&required, &optional);
        assert_eq!(loosened.recommended_bump, VersionBump::Minor);

        let tightened = compare_contracts(&optional, &required);
        assert_eq!(tightened.recommended_bump, VersionBump::Major);
    }

    #[test]
    fn test_version_only_change() {
        let old = doc(json!({"name": "orders", "version": "1.0.0"}));
        let new = doc(json!({"name": "orders", "version": "1.0.1"}));
        let analysis = compare_contracts(&old, &new);
        assert_eq!(analysis.field_changes.len(), 1);
        assert_eq!(
            analysis.field_changes[0].change_type,
            ChangeType::VersionOnly
        );
        assert_eq!(analysis.recommended_bump, VersionBump::Patch);
    }

    #[test]
    fn test_quality_check_added_and_removed() {
        let old = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders", "quality": [
                {"rule": "nullCheck", "name": "no null ids", "property": "id"}
            ]}]
        }));
        let new = doc(json!({
            "version": "1.0.0",
            "schema": [{"name": "orders", "quality": [
                {"rule": "rowCount", "name": "min rows", "mustBeGt": 0}
            ]}]
        }));
        let analysis = compare_contracts(&old, &new);
        assert_eq!(analysis.quality_changes.len(), 2);
        assert!(
            analysis
                .quality_changes
                .iter()
                .any(|c| c.change_type == ChangeType::QualityAdded)
        );
        assert!(
            analysis
                .quality_changes
                .iter()
                .any(|c| c.change_type == ChangeType::QualityRemoved)
        );
        assert_eq!(analysis.recommended_bump, VersionBump::Minor);
    }
}
