//! The external ODCS-like interchange document.
//!
//! One hierarchical document carries a whole contract on the wire. Nothing
//! enforces a schema at the boundary, so every optional field is `Option` and
//! decoding is tolerant: a missing key is `None`, never an error. Wire names
//! are camelCase; the entity store uses snake_case. The transcoder in
//! [`crate::engine::transcode`] is the single translation point.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::CustomPair;

/// Reserved authoritative-definition type marking a semantic/ontology
/// assignment rather than a generic reference.
pub const SEMANTIC_ASSIGNMENT_TYPE: &str = "semantic-assignment";

/// Fallback contract name when the document carries neither `name`,
/// `dataProduct`, nor `id`.
pub const DEFAULT_CONTRACT_NAME: &str = "unnamed-contract";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_default_element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_created_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<DescriptionDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<SchemaDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<Vec<TeamMemberDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support: Option<Vec<SupportChannelDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<PriceDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_properties: Option<Vec<SlaPropertyDocument>>,
    /// Map form `{prop: value}` and array form `[{property, value}]` are both
    /// accepted on input; export always writes the array form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authoritative_definitions: Option<Vec<DefinitionDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<ServerDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_rules: Option<Vec<QualityDocument>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limitations: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_granularity_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<PropertyDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<Vec<QualityDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authoritative_definitions: Option<Vec<DefinitionDocument>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<Value>,
}

/// `primaryKey`/`primaryKeyPosition` and the partition equivalents are always
/// written on export, even for non-key columns (`false` / `-1`); downstream
/// consumers rely on their presence. `tags` is always an array on export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "no_position")]
    pub primary_key_position: i32,
    #[serde(default)]
    pub partitioned: bool,
    #[serde(default = "no_position")]
    pub partition_key_position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_logic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_source_objects: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_data_element: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_type_options: Option<Value>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authoritative_definitions: Option<Vec<DefinitionDocument>>,
}

fn no_position() -> i32 {
    -1
}

impl Default for PropertyDocument {
    fn default() -> Self {
        Self {
            name: None,
            logical_type: None,
            physical_type: None,
            required: None,
            unique: None,
            primary_key: false,
            primary_key_position: -1,
            partitioned: false,
            partition_key_position: -1,
            classification: None,
            encrypted_name: None,
            transform_logic: None,
            transform_source_objects: None,
            transform_description: None,
            examples: None,
            critical_data_element: None,
            logical_type_options: None,
            tags: Vec::new(),
            authoritative_definitions: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub check_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    /// Property name scoping this check to a single column; absent for
    /// object-level checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_be: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_not_be: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_be_gt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_be_ge: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_be_lt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_be_le: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_be_between_min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_be_between_max: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionDocument {
    pub url: String,
    #[serde(rename = "type")]
    pub definition_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_out: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_by_username: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SupportChannelDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_amount: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlaPropertyDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_ext: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_level_approvers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_level_approvers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<Vec<CustomPairDocument>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomPairDocument {
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Connection parameters beyond the fixed fields land in `extra` via flatten
/// (host, port, catalog, ...), one key/value row each in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, Value>,
}

/// Normalizes a `customProperties` value into pairs. Accepts both the map and
/// array wire forms; anything else yields no pairs.
pub fn custom_pairs(value: &Value) -> Vec<CustomPair> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| CustomPair {
                property: k.clone(),
                value: Some(v.clone()),
            })
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let obj = item.as_object()?;
                let property = obj.get("property")?.as_str()?.to_string();
                Some(CustomPair {
                    property,
                    value: obj.get("value").cloned(),
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}
