#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::{Value, json};
use tempfile::TempDir;

use datapact::collab::{
    ChangeLog, ChangeLogEntry, DeployPolicy, JobRunner, JobState, NameResolver, Notification,
    NotificationSink, PolicyDecision, SemanticLink, SemanticLinks,
};
use datapact::document::ContractDocument;
use datapact::engine::{Collaborators, Engine};
use datapact::error::{Error, Result};
use datapact::store::{SqliteStore, Store};
use datapact::types::DefinitionOwner;

#[derive(Default)]
pub struct FakeNotifications {
    pub created: Mutex<Vec<Notification>>,
    pub handled: Mutex<Vec<(String, String)>>,
    pub fail_mark_handled: std::sync::atomic::AtomicBool,
}

impl NotificationSink for FakeNotifications {
    fn create(&self, notification: &Notification) -> Result<()> {
        self.created.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn mark_handled(&self, action_type: &str, entity_id: &str) -> Result<()> {
        if self.fail_mark_handled.load(std::sync::atomic::Ordering::Relaxed) {
            return Err(Error::external("notification store unreachable"));
        }
        self.handled
            .lock()
            .unwrap()
            .push((action_type.to_string(), entity_id.to_string()));
        Ok(())
    }
}

impl FakeNotifications {
    pub fn count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn for_recipient(&self, recipient: &str) -> Vec<Notification> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
pub struct FakeChangeLog {
    pub entries: Mutex<Vec<ChangeLogEntry>>,
}

impl ChangeLog for FakeChangeLog {
    fn append(
        &self,
        entity_type: &str,
        entity_id: &str,
        action: &str,
        actor: &str,
        details: Option<&str>,
    ) -> Result<()> {
        self.entries.lock().unwrap().push(ChangeLogEntry {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            actor: actor.to_string(),
            details: details.map(String::from),
            at: Utc::now(),
        });
        Ok(())
    }

    fn query(&self, entity_type: &str, entity_id: &str) -> Result<Vec<ChangeLogEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

impl FakeChangeLog {
    pub fn actions(&self, entity_id: &str) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .map(|e| e.action.clone())
            .collect()
    }
}

pub struct FakeJobs {
    pub workflow: Option<String>,
    pub fail_submit: bool,
    pub fail_deployment: bool,
    pub submitted: Mutex<Vec<(String, Value)>>,
    pub statuses: Mutex<HashMap<String, JobState>>,
    pub status_calls: Mutex<Vec<String>>,
    pub deployments: Mutex<Vec<String>>,
    pub review_assets: Mutex<Vec<String>>,
}

impl Default for FakeJobs {
    fn default() -> Self {
        Self {
            workflow: Some("wf-profiling-1".to_string()),
            fail_submit: false,
            fail_deployment: false,
            submitted: Mutex::new(Vec::new()),
            statuses: Mutex::new(HashMap::new()),
            status_calls: Mutex::new(Vec::new()),
            deployments: Mutex::new(Vec::new()),
            review_assets: Mutex::new(Vec::new()),
        }
    }
}

impl JobRunner for FakeJobs {
    fn installed_workflow(&self, _name: &str) -> Result<Option<String>> {
        Ok(self.workflow.clone())
    }

    fn submit(&self, workflow_id: &str, params: &Value) -> Result<String> {
        if self.fail_submit {
            return Err(Error::external("job submission refused"));
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push((workflow_id.to_string(), params.clone()));
        Ok(format!("ext-run-{}", submitted.len()))
    }

    fn status(&self, run_id: &str) -> Result<JobState> {
        self.status_calls.lock().unwrap().push(run_id.to_string());
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(run_id)
            .cloned()
            .unwrap_or(JobState {
                lifecycle_state: "RUNNING".to_string(),
                result_state: None,
                result_description: None,
            }))
    }

    fn trigger_deployment(&self, contract_id: &str) -> Result<String> {
        if self.fail_deployment {
            return Err(Error::external("deployment runner offline"));
        }
        let mut deployments = self.deployments.lock().unwrap();
        deployments.push(contract_id.to_string());
        Ok(format!("deploy-job-{}", deployments.len()))
    }

    fn create_review_asset(&self, contract_id: &str, _contract_name: &str) -> Result<()> {
        self.review_assets
            .lock()
            .unwrap()
            .push(contract_id.to_string());
        Ok(())
    }
}

impl FakeJobs {
    pub fn finish(&self, external_run_id: &str, success: bool) {
        self.statuses.lock().unwrap().insert(
            external_run_id.to_string(),
            JobState {
                lifecycle_state: "TERMINATED".to_string(),
                result_state: Some(if success { "SUCCESS" } else { "FAILED" }.to_string()),
                result_description: (!success).then(|| "profiling query error".to_string()),
            },
        );
    }
}

#[derive(Default)]
pub struct FakeNames {
    pub teams: HashMap<String, String>,
    pub domains: Mutex<HashMap<String, String>>,
    pub ensured: Mutex<Vec<(String, String)>>,
}

impl NameResolver for FakeNames {
    fn team_id(&self, name: &str) -> Result<Option<String>> {
        Ok(self.teams.get(name).cloned())
    }

    fn team_name(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .teams
            .iter()
            .find(|(_, team_id)| team_id.as_str() == id)
            .map(|(name, _)| name.clone()))
    }

    fn ensure_domain(&self, name: &str, actor: &str) -> Result<String> {
        let mut domains = self.domains.lock().unwrap();
        if let Some(id) = domains.get(name) {
            return Ok(id.clone());
        }
        let id = format!("domain-{}", domains.len() + 1);
        domains.insert(name.to_string(), id.clone());
        self.ensured
            .lock()
            .unwrap()
            .push((name.to_string(), actor.to_string()));
        Ok(id)
    }

    fn domain_name(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .domains
            .lock()
            .unwrap()
            .iter()
            .find(|(_, domain_id)| domain_id.as_str() == id)
            .map(|(name, _)| name.clone()))
    }
}

#[derive(Default)]
pub struct FakeSemantics {
    pub links: Mutex<HashMap<String, Vec<String>>>,
    pub fail: bool,
}

impl FakeSemantics {
    pub fn link(&self, entity_id: &str, iri: &str) {
        self.links
            .lock()
            .unwrap()
            .entry(entity_id.to_string())
            .or_default()
            .push(iri.to_string());
    }
}

impl SemanticLinks for FakeSemantics {
    fn list_for_entity(
        &self,
        entity_id: &str,
        _entity_type: DefinitionOwner,
    ) -> Result<Vec<SemanticLink>> {
        if self.fail {
            return Err(Error::external("ontology service down"));
        }
        Ok(self
            .links
            .lock()
            .unwrap()
            .get(entity_id)
            .map(|iris| iris.iter().map(|iri| SemanticLink { iri: iri.clone() }).collect())
            .unwrap_or_default())
    }
}

pub struct FakePolicy {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl Default for FakePolicy {
    fn default() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }
}

impl DeployPolicy for FakePolicy {
    fn validate_target(&self, _actor: &str, _catalog: &str, _schema: &str) -> Result<PolicyDecision> {
        Ok(PolicyDecision {
            allowed: self.allowed,
            reason: self.reason.clone(),
        })
    }
}

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<SqliteStore>,
    pub notifications: Arc<FakeNotifications>,
    pub changelog: Arc<FakeChangeLog>,
    pub jobs: Arc<FakeJobs>,
    pub names: Arc<FakeNames>,
    pub semantics: Arc<FakeSemantics>,
    pub policy: Arc<FakePolicy>,
    _temp: TempDir,
}

// RUST_LOG=debug cargo test -- --nocapture surfaces engine logs
fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn harness() -> Harness {
    harness_with(
        FakeJobs::default(),
        FakeNames {
            teams: HashMap::from([("data-platform".to_string(), "team-1".to_string())]),
            ..Default::default()
        },
        FakeSemantics::default(),
        FakePolicy::default(),
    )
}

pub fn harness_with(
    jobs: FakeJobs,
    names: FakeNames,
    semantics: FakeSemantics,
    policy: FakePolicy,
) -> Harness {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::new(temp.path().join("test.db")).unwrap());
    store.initialize().unwrap();

    let notifications = Arc::new(FakeNotifications::default());
    let changelog = Arc::new(FakeChangeLog::default());
    let jobs = Arc::new(jobs);
    let names = Arc::new(names);
    let semantics = Arc::new(semantics);
    let policy = Arc::new(policy);

    let engine = Engine::new(
        store.clone(),
        Collaborators {
            notifications: notifications.clone(),
            changelog: changelog.clone(),
            jobs: jobs.clone(),
            names: names.clone(),
            semantics: semantics.clone(),
            deploy_policy: policy.clone(),
        },
    );

    Harness {
        engine,
        store,
        notifications,
        changelog,
        jobs,
        names,
        semantics,
        policy,
        _temp: temp,
    }
}

/// A fully populated document exercising every nested collection.
pub fn sample_document() -> ContractDocument {
    serde_json::from_value(json!({
        "kind": "DataContract",
        "apiVersion": "v3.0.0",
        "version": "1.1.0",
        "status": "draft",
        "name": "orders",
        "owner": "data-platform",
        "tenant": "acme",
        "dataProduct": "commerce",
        "domain": "sales",
        "slaDefaultElement": "orders.order_ts",
        "description": {
            "usage": "Analytical order reporting",
            "purpose": "Single source of truth for orders",
            "limitations": "No PII beyond customer id"
        },
        "tags": ["commerce", "tier-1"],
        "roles": [{
            "role": "analyst",
            "access": "read",
            "firstLevelApprovers": "team-lead",
            "customProperties": [{"property": "scope", "value": "emea"}]
        }],
        "team": [{"username": "ava", "role": "owner", "dateIn": "2024-01-01"}],
        "servers": [{
            "server": "prod",
            "type": "warehouse",
            "environment": "production",
            "host": "wh.example.com",
            "port": 443,
            "catalog": "commerce"
        }],
        "support": [{"channel": "#orders", "tool": "slack", "url": "https://chat.example.com/orders"}],
        "price": {"priceAmount": "9.95", "priceCurrency": "USD", "priceUnit": "megabyte"},
        "slaProperties": [
            {"property": "latency", "value": 4, "unit": "d", "element": "orders.order_ts"},
            {"property": "retention", "value": 3, "valueExt": "keep", "unit": "y"}
        ],
        "customProperties": [{"property": "refRulesetId", "value": 17}],
        "authoritativeDefinitions": [
            {"url": "https://wiki.example.com/orders", "type": "businessDefinition"}
        ],
        "schema": [{
            "name": "orders",
            "physicalName": "orders_v1",
            "businessName": "Orders",
            "physicalType": "table",
            "description": "One row per order",
            "dataGranularityDescription": "order grain",
            "tags": ["fact"],
            "properties": [
                {
                    "name": "order_id",
                    "logicalType": "string",
                    "physicalType": "varchar(36)",
                    "required": true,
                    "unique": true,
                    "primaryKey": true,
                    "primaryKeyPosition": 1,
                    "classification": "internal",
                    "examples": ["ord-1"],
                    "authoritativeDefinitions": [
                        {"url": "https://wiki.example.com/order-id", "type": "businessDefinition"}
                    ]
                },
                {
                    "name": "order_ts",
                    "logicalType": "date",
                    "physicalType": "timestamp",
                    "required": true,
                    "partitioned": true,
                    "partitionKeyPosition": 1,
                    "logicalTypeOptions": {"format": "yyyy-MM-dd"}
                },
                {
                    "name": "total",
                    "logicalType": "number",
                    "physicalType": "decimal(12,2)"
                }
            ],
            "quality": [
                {
                    "rule": "nullCheck",
                    "name": "order id present",
                    "dimension": "completeness",
                    "severity": "error",
                    "type": "library",
                    "property": "order_id"
                },
                {
                    "rule": "rowCount",
                    "name": "orders arrive daily",
                    "type": "library",
                    "mustBeGt": 0
                }
            ],
            "authoritativeDefinitions": [
                {"url": "https://catalog.example.com/orders", "type": "businessDefinition"}
            ]
        }]
    }))
    .unwrap()
}
