//! Profiling runs and the suggestion review loop.
//!
//! Profiling executes on the external job runner; the engine only records the
//! run, submits the job, and reconciles status by polling when runs are
//! listed. Suggestions come back through a callback and sit pending until a
//! human accepts or rejects them.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use super::Engine;
use crate::error::{Error, Result};
use crate::store::AcceptOutcome;
use crate::types::{
    ProfilingRun, QualityLevel, QualityPredicates, RunStatus, SuggestedQualityCheck,
    SuggestionStatus,
};

const PROFILING_WORKFLOW: &str = "contract-quality-profiling";

/// Suggestion fields as delivered by the profiling job callback; the engine
/// fills in identity, run linkage, and review state.
#[derive(Debug, Clone)]
pub struct SuggestionDraft {
    pub schema_name: String,
    pub property_name: Option<String>,
    pub level: QualityLevel,
    pub rule: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub dimension: Option<String>,
    pub business_impact: Option<String>,
    pub severity: Option<String>,
    pub check_type: Option<String>,
    pub query: Option<String>,
    pub schedule: Option<String>,
    pub scheduler: Option<String>,
    pub predicates: QualityPredicates,
    pub confidence: Option<f64>,
    pub rationale: Option<String>,
}

impl Engine {
    /// Records a profiling run and submits the external job. Requires at
    /// least one schema name and an installed profiling workflow.
    pub fn start_profiling(
        &self,
        contract_id: &str,
        schema_names: &[String],
        source_tag: Option<&str>,
        actor: &str,
    ) -> Result<ProfilingRun> {
        if schema_names.is_empty() {
            return Err(Error::validation(
                "profiling requires at least one schema name",
            ));
        }
        let contract = self.require_contract(contract_id)?;

        let known: Vec<String> = self
            .store
            .list_schema_objects(contract_id)?
            .into_iter()
            .map(|o| o.name)
            .collect();
        for name in schema_names {
            if !known.contains(name) {
                return Err(Error::validation(format!(
                    "schema '{name}' does not exist on contract '{}'",
                    contract.name
                )));
            }
        }

        let workflow_id = self
            .jobs
            .installed_workflow(PROFILING_WORKFLOW)?
            .ok_or_else(|| {
                Error::validation(format!(
                    "no installed workflow named '{PROFILING_WORKFLOW}'"
                ))
            })?;

        let now = Utc::now();
        let mut run = ProfilingRun {
            id: Uuid::new_v4().to_string(),
            contract_id: contract_id.to_string(),
            source_tag: source_tag.map(String::from),
            schema_names: schema_names.to_vec(),
            status: RunStatus::Pending,
            external_run_id: None,
            triggered_by: Some(actor.to_string()),
            summary: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create_profiling_run(&run)?;

        let connection = self.connection_params(contract_id)?;
        let params = json!({
            "contract_id": contract_id,
            "run_id": run.id,
            "schema_names": schema_names,
            "source_tag": source_tag,
            "connection": connection,
        });
        match self.jobs.submit(&workflow_id, &params) {
            Ok(external_run_id) => {
                run.external_run_id = Some(external_run_id);
                run.status = RunStatus::Running;
                self.store.update_profiling_run(&run)?;
            }
            Err(e) => {
                run.status = RunStatus::Failed;
                run.error_message = Some(e.to_string());
                self.store.update_profiling_run(&run)?;
                return Err(e);
            }
        }

        self.changelog.append(
            "contract",
            contract_id,
            "profiling_started",
            actor,
            Some(&format!("profiling {} schema(s)", schema_names.len())),
        )?;
        Ok(run)
    }

    /// Lists a contract's profiling runs, reconciling still-running ones
    /// against the external job system first. Terminal runs are never polled
    /// again.
    pub fn get_profile_runs(&self, contract_id: &str) -> Result<Vec<ProfilingRun>> {
        let mut runs = self.store.list_profiling_runs(contract_id)?;

        for run in &mut runs {
            if run.status != RunStatus::Running {
                continue;
            }
            let Some(external_run_id) = &run.external_run_id else {
                continue;
            };
            // A poll failure leaves the run as-is for the next listing
            let state = match self.jobs.status(external_run_id) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(run_id = %run.id, "profiling status poll failed: {e}");
                    continue;
                }
            };
            if !state.is_terminal() {
                continue;
            }
            if state.is_success() {
                run.status = RunStatus::Completed;
            } else {
                run.status = RunStatus::Failed;
                run.error_message = state
                    .result_description
                    .clone()
                    .or_else(|| Some(format!("job ended in state {}", state.lifecycle_state)));
            }
            self.store.update_profiling_run(run)?;
        }

        Ok(runs)
    }

    /// Callback target for the profiling job: stores its suggestions as
    /// pending review items.
    pub fn record_suggestions(
        &self,
        run_id: &str,
        drafts: Vec<SuggestionDraft>,
    ) -> Result<Vec<SuggestedQualityCheck>> {
        let run = self
            .store
            .get_profiling_run(run_id)?
            .ok_or_else(|| Error::not_found("profiling run"))?;

        let now = Utc::now();
        let suggestions: Vec<SuggestedQualityCheck> = drafts
            .into_iter()
            .map(|draft| SuggestedQualityCheck {
                id: Uuid::new_v4().to_string(),
                contract_id: run.contract_id.clone(),
                run_id: Some(run.id.clone()),
                schema_name: draft.schema_name,
                property_name: draft.property_name,
                level: draft.level,
                rule: draft.rule,
                name: draft.name,
                description: draft.description,
                dimension: draft.dimension,
                business_impact: draft.business_impact,
                severity: draft.severity,
                check_type: draft.check_type,
                query: draft.query,
                schedule: draft.schedule,
                scheduler: draft.scheduler,
                predicates: draft.predicates,
                status: SuggestionStatus::Pending,
                confidence: draft.confidence,
                rationale: draft.rationale,
                created_at: now,
            })
            .collect();
        self.store.create_suggestions(&suggestions)?;

        self.changelog.append(
            "contract",
            &run.contract_id,
            "suggestions_recorded",
            run.triggered_by.as_deref().unwrap_or(super::SYSTEM_ACTOR),
            Some(&format!(
                "profiling run {run_id} produced {} suggestion(s)",
                suggestions.len()
            )),
        )?;
        Ok(suggestions)
    }

    pub fn list_suggestions(&self, contract_id: &str) -> Result<Vec<SuggestedQualityCheck>> {
        self.store.list_suggestions(contract_id)
    }

    /// Accepts pending suggestions, materializing quality checks for those
    /// whose schema name matches; unmatched ones are skipped and stay
    /// pending. Optionally bumps the contract version in the same
    /// transaction.
    pub fn accept_suggestions(
        &self,
        contract_id: &str,
        ids: &[String],
        new_version: Option<&str>,
        actor: &str,
    ) -> Result<AcceptOutcome> {
        if let Some(version) = new_version {
            super::validate_semver(version)?;
        }
        self.require_contract(contract_id)?;

        let outcome = self.store.accept_suggestions(contract_id, ids, new_version)?;
        if !outcome.skipped_unknown_schema.is_empty() {
            tracing::info!(
                contract_id,
                skipped = outcome.skipped_unknown_schema.len(),
                "suggestions referencing unknown schemas were left pending"
            );
        }

        self.changelog.append(
            "contract",
            contract_id,
            "suggestions_accepted",
            actor,
            Some(&format!(
                "accepted {} suggestion(s): [{}]",
                outcome.accepted.len(),
                outcome.accepted.join(", ")
            )),
        )?;
        Ok(outcome)
    }

    /// Rejects pending suggestions; returns how many rows actually flipped.
    pub fn reject_suggestions(
        &self,
        contract_id: &str,
        ids: &[String],
        actor: &str,
    ) -> Result<usize> {
        self.require_contract(contract_id)?;
        let rejected = self.store.reject_suggestions(contract_id, ids)?;
        self.changelog.append(
            "contract",
            contract_id,
            "suggestions_rejected",
            actor,
            Some(&format!("rejected {rejected} suggestion(s)")),
        )?;
        Ok(rejected)
    }

    /// Connection parameters of the contract's first server, if any, passed
    /// through to the profiling job.
    fn connection_params(&self, contract_id: &str) -> Result<serde_json::Value> {
        let Some(tree) = self.store.get_contract_tree(contract_id)? else {
            return Ok(serde_json::Value::Null);
        };
        let Some(first) = tree.servers.first() else {
            return Ok(serde_json::Value::Null);
        };
        let mut map = serde_json::Map::new();
        if let Some(server_type) = &first.server.server_type {
            map.insert("type".to_string(), json!(server_type));
        }
        for prop in &first.properties {
            map.insert(prop.key.clone(), json!(prop.value));
        }
        Ok(serde_json::Value::Object(map))
    }
}
