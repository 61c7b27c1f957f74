use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root governed entity describing a dataset's shape, quality, ownership, and
/// access terms.
///
/// `status` is stored as plain text: rows written before the current status
/// set existed must round-trip unchanged. Parse through
/// [`crate::types::ContractStatus`] when the value matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sla_default_element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limitations: Option<String>,
    pub published: bool,
    /// Version-family key shared by all versions of the same logical contract.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    /// Non-owning lineage pointer to the contract this one was cloned from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_contract_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaObject {
    pub id: String,
    pub contract_id: String,
    pub name: String,
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
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
}

/// `primary_key_position` / `partition_key_position` use -1 as the "not a key
/// column" sentinel; non-negative positions must be unique within one
/// schema object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaProperty {
    pub id: String,
    pub schema_object_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physical_type: Option<String>,
    pub required: bool,
    pub unique: bool,
    pub partitioned: bool,
    pub primary_key_position: i32,
    pub partition_key_position: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_logic: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub transform_source_objects: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub examples: Vec<Value>,
    pub critical_data_element: bool,
    /// Type-specific constraint bag keyed by the logical type (min/max length,
    /// numeric bounds, format, array item type). Opaque to the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Object,
    Property,
}

impl QualityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLevel::Object => "object",
            QualityLevel::Property => "property",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "object" => Some(QualityLevel::Object),
            "property" => Some(QualityLevel::Property),
            _ => None,
        }
    }
}

/// One quality rule attached to a schema object, optionally scoped to a single
/// property. At most one comparison predicate family may be populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityCheck {
    pub id: String,
    pub schema_object_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_id: Option<String>,
    pub level: QualityLevel,
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
    /// "library" for catalogue rules, "custom" for a hand-written query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    #[serde(flatten)]
    pub predicates: QualityPredicates,
}

/// Closed set of comparison predicates a check may carry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityPredicates {
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

impl QualityPredicates {
    /// Count of populated predicate families (`between` min/max count as one).
    pub fn families(&self) -> usize {
        let between = self.must_be_between_min.is_some() || self.must_be_between_max.is_some();
        [
            self.must_be.is_some(),
            self.must_not_be.is_some(),
            self.must_be_gt.is_some(),
            self.must_be_ge.is_some(),
            self.must_be_lt.is_some(),
            self.must_be_le.is_some(),
            between,
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub contract_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub contract_id: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_level_approvers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub second_level_approvers: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub custom_properties: Vec<CustomPair>,
}

/// Simple property/value pair used by role- and contract-level custom
/// properties. Values keep their wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPair {
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: String,
    pub contract_id: String,
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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub contract_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Connection parameter row for one server (host, port, catalog, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerProperty {
    pub id: String,
    pub server_id: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportChannel {
    pub id: String,
    pub contract_id: String,
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

/// At most one pricing row per contract. `amount` keeps the raw wire text;
/// the transcoder re-emits it as a number when it parses as one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub id: String,
    pub contract_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaProperty {
    pub id: String,
    pub contract_id: String,
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_ext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomProperty {
    pub id: String,
    pub contract_id: String,
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Which entity level an authoritative definition hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionOwner {
    Contract,
    Schema,
    Property,
}

impl DefinitionOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionOwner::Contract => "contract",
            DefinitionOwner::Schema => "schema",
            DefinitionOwner::Property => "property",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "contract" => Some(DefinitionOwner::Contract),
            "schema" => Some(DefinitionOwner::Schema),
            "property" => Some(DefinitionOwner::Property),
            _ => None,
        }
    }
}

/// (url, type) reference pair; one generic relation serves all three owner
/// levels. The `semantic-assignment` type marks an ontology link rather than a
/// generic reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritativeDefinition {
    pub id: String,
    pub owner_kind: DefinitionOwner,
    pub owner_id: String,
    pub url: String,
    pub definition_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RunStatus::Pending),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One invocation of the external profiling job against named schemas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilingRun {
    pub id: String,
    pub contract_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_tag: Option<String>,
    pub schema_names: Vec<String>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionStatus::Pending => "pending",
            SuggestionStatus::Accepted => "accepted",
            SuggestionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SuggestionStatus::Pending),
            "accepted" => Some(SuggestionStatus::Accepted),
            "rejected" => Some(SuggestionStatus::Rejected),
            _ => None,
        }
    }
}

/// Candidate quality check produced by a profiling run, pending human review.
/// Rows are never deleted; review flips the status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedQualityCheck {
    pub id: String,
    pub contract_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub schema_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
    pub level: QualityLevel,
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<String>,
    #[serde(flatten)]
    pub predicates: QualityPredicates,
    pub status: SuggestionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outstanding workflow request awaiting a response action. Keyed by
/// (contract_id, action_type); replaces scanning change-log history for the
/// most recent requester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub contract_id: String,
    pub action_type: String,
    pub requester: String,
    pub requested_at: DateTime<Utc>,
}

/// Contract plus every nested collection, as returned by the deep fetch and
/// consumed by the transactional deep insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractTree {
    pub contract: Contract,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub roles: Vec<Role>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub team: Vec<TeamMember>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub servers: Vec<ServerTree>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub support: Vec<SupportChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub sla_properties: Vec<SlaProperty>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub custom_properties: Vec<CustomProperty>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub definitions: Vec<AuthoritativeDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub schemas: Vec<SchemaTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTree {
    pub server: Server,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub properties: Vec<ServerProperty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaTree {
    pub object: SchemaObject,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub properties: Vec<PropertyTree>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub quality: Vec<QualityCheck>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub definitions: Vec<AuthoritativeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyTree {
    pub property: SchemaProperty,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub definitions: Vec<AuthoritativeDefinition>,
}
