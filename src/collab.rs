//! Collaborator contracts the engine consumes.
//!
//! Notification delivery, audit storage, the platform job runner, name
//! resolution, semantic links, and deployment policy all live outside this
//! crate; the host wires implementations in when constructing
//! [`crate::engine::Engine`]. Tests use the in-memory fakes under
//! `tests/common`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::DefinitionOwner;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_payload: Option<Value>,
    pub can_delete: bool,
}

/// Delivery store for user-facing notifications.
pub trait NotificationSink: Send + Sync {
    fn create(&self, notification: &Notification) -> Result<()>;

    /// Marks the action-required notifications for (action_type, entity_id) as
    /// handled so they stop prompting. Best-effort at every call site.
    fn mark_handled(&self, action_type: &str, entity_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub at: DateTime<Utc>,
}

/// Append-only audit history.
pub trait ChangeLog: Send + Sync {
    fn append(
        &self,
        entity_type: &str,
        entity_id: &str,
        action: &str,
        actor: &str,
        details: Option<&str>,
    ) -> Result<()>;

    /// History for one entity, oldest first.
    fn query(&self, entity_type: &str, entity_id: &str) -> Result<Vec<ChangeLogEntry>>;
}

/// State of one run on the external job system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub lifecycle_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_description: Option<String>,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.lifecycle_state.as_str(),
            "TERMINATED" | "SKIPPED" | "INTERNAL_ERROR"
        )
    }

    pub fn is_success(&self) -> bool {
        self.is_terminal() && self.result_state.as_deref() == Some("SUCCESS")
    }
}

/// External platform job runner (profiling and deployment jobs run there).
pub trait JobRunner: Send + Sync {
    /// Resolves an installed workflow definition by name, if any.
    fn installed_workflow(&self, name: &str) -> Result<Option<String>>;

    /// Submits a job run; returns the external run id.
    fn submit(&self, workflow_id: &str, params: &Value) -> Result<String>;

    fn status(&self, run_id: &str) -> Result<JobState>;

    /// Kicks off a deployment job for a contract; returns the job id.
    fn trigger_deployment(&self, contract_id: &str) -> Result<String>;

    /// Registers a review asset on the platform. Callers treat failure as
    /// non-fatal.
    fn create_review_asset(&self, contract_id: &str, contract_name: &str) -> Result<()>;
}

/// Name lookups against the team/domain registries.
pub trait NameResolver: Send + Sync {
    fn team_id(&self, name: &str) -> Result<Option<String>>;

    fn team_name(&self, id: &str) -> Result<Option<String>>;

    /// Resolves a domain by name, creating it attributed to `actor` when
    /// missing. Returns the domain id.
    fn ensure_domain(&self, name: &str, actor: &str) -> Result<String>;

    fn domain_name(&self, id: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticLink {
    pub iri: String,
}

/// Ontology-term assignments recorded against entities.
pub trait SemanticLinks: Send + Sync {
    fn list_for_entity(&self, entity_id: &str, entity_type: DefinitionOwner)
    -> Result<Vec<SemanticLink>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Deployment-target policy for the requesting actor.
pub trait DeployPolicy: Send + Sync {
    fn validate_target(&self, actor: &str, catalog: &str, schema: &str) -> Result<PolicyDecision>;
}
