//! Approval, publish, and deploy workflow.
//!
//! Every workflow action is a (request, response) pair. A request checks its
//! precondition, mutates status where the table says so, records who asked in
//! the pending-request table, sends a receipt to the requester plus an
//! action-required notification to the responsible group, and appends an audit
//! entry. The response half resolves the requester from the pending request,
//! never by scanning history.

use chrono::Utc;
use serde_json::json;

use super::Engine;
use crate::collab::Notification;
use crate::error::{Error, Result};
use crate::types::{Contract, ContractStatus, PendingRequest, check_transition};

pub(crate) const ACTION_REVIEW: &str = "contract_review";
pub(crate) const ACTION_PUBLISH: &str = "contract_publish";
pub(crate) const ACTION_DEPLOY: &str = "contract_deploy";

const STEWARD_GROUP: &str = "role:data-steward";
const PUBLISHER_GROUP: &str = "role:publisher";
const DEPLOY_APPROVER_GROUP: &str = "role:deployment-approver";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
    /// Asks the requester for more detail; status stays put.
    Clarify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishDecision {
    Approve,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployDecision {
    Approve,
    Deny,
}

impl Engine {
    /// Moves a draft contract to `proposed` and asks the steward group to
    /// review it.
    pub fn request_steward_review(&self, contract_id: &str, requester: &str) -> Result<Contract> {
        let contract = self.require_contract(contract_id)?;
        check_transition(&contract.status, ContractStatus::Proposed)?;

        self.store
            .update_contract_status(contract_id, ContractStatus::Proposed.as_str(), requester)?;
        self.store.upsert_pending_request(&PendingRequest {
            contract_id: contract_id.to_string(),
            action_type: ACTION_REVIEW.to_string(),
            requester: requester.to_string(),
            requested_at: Utc::now(),
        })?;

        self.notifications.create(&Notification {
            recipient: requester.to_string(),
            title: "Review requested".to_string(),
            subtitle: Some(contract.name.clone()),
            description: Some(format!(
                "Your review request for '{}' v{} was sent to the data stewards",
                contract.name, contract.version
            )),
            kind: "receipt".to_string(),
            action_type: None,
            action_payload: None,
            can_delete: true,
        })?;
        self.notifications.create(&Notification {
            recipient: STEWARD_GROUP.to_string(),
            title: "Contract review required".to_string(),
            subtitle: Some(contract.name.clone()),
            description: Some(format!(
                "{requester} requests a steward review of '{}' v{}",
                contract.name, contract.version
            )),
            kind: "action_required".to_string(),
            action_type: Some(ACTION_REVIEW.to_string()),
            action_payload: Some(json!({
                "contract_id": contract_id,
                "contract_name": contract.name,
                "version": contract.version,
                "requester": requester,
            })),
            can_delete: false,
        })?;

        self.changelog.append(
            "contract",
            contract_id,
            "review_requested",
            requester,
            Some(&format!("requested steward review of v{}", contract.version)),
        )?;
        self.best_effort(
            "review asset creation",
            self.jobs.create_review_asset(contract_id, &contract.name),
        );

        self.require_contract(contract_id)
    }

    /// Steward response to a review request.
    pub fn handle_review_response(
        &self,
        contract_id: &str,
        decision: ReviewDecision,
        reviewer: &str,
        comment: Option<&str>,
    ) -> Result<Contract> {
        let contract = self.require_contract(contract_id)?;
        let pending = self
            .store
            .get_pending_request(contract_id, ACTION_REVIEW)?
            .ok_or_else(|| Error::not_found("pending review request"))?;

        let (action, outcome) = match decision {
            ReviewDecision::Approve => {
                check_transition(&contract.status, ContractStatus::Approved)?;
                self.store.update_contract_status(
                    contract_id,
                    ContractStatus::Approved.as_str(),
                    reviewer,
                )?;
                ("review_approved", "approved")
            }
            ReviewDecision::Reject => {
                check_transition(&contract.status, ContractStatus::Rejected)?;
                self.store.update_contract_status(
                    contract_id,
                    ContractStatus::Rejected.as_str(),
                    reviewer,
                )?;
                ("review_rejected", "rejected")
            }
            ReviewDecision::Clarify => ("review_clarification_requested", "needs clarification"),
        };

        self.notifications.create(&Notification {
            recipient: pending.requester.clone(),
            title: format!("Review {outcome}"),
            subtitle: Some(contract.name.clone()),
            description: Some(match comment {
                Some(comment) => format!(
                    "{reviewer} marked '{}' v{} as {outcome}: {comment}",
                    contract.name, contract.version
                ),
                None => format!(
                    "{reviewer} marked '{}' v{} as {outcome}",
                    contract.name, contract.version
                ),
            }),
            kind: "receipt".to_string(),
            action_type: None,
            action_payload: None,
            can_delete: true,
        })?;

        self.changelog
            .append("contract", contract_id, action, reviewer, comment)?;
        self.best_effort(
            "marking review notification handled",
            self.notifications.mark_handled(ACTION_REVIEW, contract_id),
        );
        if decision != ReviewDecision::Clarify {
            self.store.clear_pending_request(contract_id, ACTION_REVIEW)?;
        }

        self.require_contract(contract_id)
    }

    /// Asks the publisher group to publish an approved contract.
    pub fn request_publish(&self, contract_id: &str, requester: &str) -> Result<()> {
        let contract = self.require_contract(contract_id)?;
        if ContractStatus::parse(&contract.status) != Some(ContractStatus::Approved) {
            return Err(Error::validation(format!(
                "cannot request publish while status is '{}'",
                contract.status
            )));
        }
        if contract.published {
            return Err(Error::validation("contract is already published"));
        }

        self.store.upsert_pending_request(&PendingRequest {
            contract_id: contract_id.to_string(),
            action_type: ACTION_PUBLISH.to_string(),
            requester: requester.to_string(),
            requested_at: Utc::now(),
        })?;

        self.notifications.create(&Notification {
            recipient: requester.to_string(),
            title: "Publish requested".to_string(),
            subtitle: Some(contract.name.clone()),
            description: Some(format!(
                "Your publish request for '{}' v{} is awaiting approval",
                contract.name, contract.version
            )),
            kind: "receipt".to_string(),
            action_type: None,
            action_payload: None,
            can_delete: true,
        })?;
        self.notifications.create(&Notification {
            recipient: PUBLISHER_GROUP.to_string(),
            title: "Contract publish approval required".to_string(),
            subtitle: Some(contract.name.clone()),
            description: Some(format!(
                "{requester} requests publication of '{}' v{}",
                contract.name, contract.version
            )),
            kind: "action_required".to_string(),
            action_type: Some(ACTION_PUBLISH.to_string()),
            action_payload: Some(json!({
                "contract_id": contract_id,
                "contract_name": contract.name,
                "version": contract.version,
                "requester": requester,
            })),
            can_delete: false,
        })?;

        self.changelog.append(
            "contract",
            contract_id,
            "publish_requested",
            requester,
            Some(&format!("requested publication of v{}", contract.version)),
        )?;
        Ok(())
    }

    /// Publisher response; approval flips the `published` flag, status stays
    /// `approved`.
    pub fn handle_publish_response(
        &self,
        contract_id: &str,
        decision: PublishDecision,
        approver: &str,
    ) -> Result<Contract> {
        let contract = self.require_contract(contract_id)?;
        let pending = self
            .store
            .get_pending_request(contract_id, ACTION_PUBLISH)?
            .ok_or_else(|| Error::not_found("pending publish request"))?;

        let (action, outcome) = match decision {
            PublishDecision::Approve => {
                if ContractStatus::parse(&contract.status) != Some(ContractStatus::Approved) {
                    return Err(Error::validation(format!(
                        "cannot publish while status is '{}'",
                        contract.status
                    )));
                }
                self.store.set_published(contract_id, true, approver)?;
                ("published", "approved")
            }
            PublishDecision::Deny => ("publish_denied", "denied"),
        };

        self.notifications.create(&Notification {
            recipient: pending.requester.clone(),
            title: format!("Publish {outcome}"),
            subtitle: Some(contract.name.clone()),
            description: Some(format!(
                "{approver} {outcome} publication of '{}' v{}",
                contract.name, contract.version
            )),
            kind: "receipt".to_string(),
            action_type: None,
            action_payload: None,
            can_delete: true,
        })?;

        self.changelog
            .append("contract", contract_id, action, approver, None)?;
        self.best_effort(
            "marking publish notification handled",
            self.notifications.mark_handled(ACTION_PUBLISH, contract_id),
        );
        self.store.clear_pending_request(contract_id, ACTION_PUBLISH)?;

        self.require_contract(contract_id)
    }

    /// Asks for a deployment of the contract to `catalog.schema`. The target
    /// is checked against the requester's deployment policy first; a violation
    /// aborts with no writes and no notifications.
    pub fn request_deploy(
        &self,
        contract_id: &str,
        requester: &str,
        catalog: &str,
        schema: &str,
    ) -> Result<()> {
        let contract = self.require_contract(contract_id)?;

        let decision = self.deploy_policy.validate_target(requester, catalog, schema)?;
        if !decision.allowed {
            return Err(Error::validation(format!(
                "deployment to {catalog}.{schema} denied by policy: {}",
                decision.reason.as_deref().unwrap_or("no reason given")
            )));
        }

        self.store.upsert_pending_request(&PendingRequest {
            contract_id: contract_id.to_string(),
            action_type: ACTION_DEPLOY.to_string(),
            requester: requester.to_string(),
            requested_at: Utc::now(),
        })?;

        self.notifications.create(&Notification {
            recipient: requester.to_string(),
            title: "Deployment requested".to_string(),
            subtitle: Some(contract.name.clone()),
            description: Some(format!(
                "Your request to deploy '{}' to {catalog}.{schema} is awaiting approval",
                contract.name
            )),
            kind: "receipt".to_string(),
            action_type: None,
            action_payload: None,
            can_delete: true,
        })?;
        self.notifications.create(&Notification {
            recipient: DEPLOY_APPROVER_GROUP.to_string(),
            title: "Contract deployment approval required".to_string(),
            subtitle: Some(contract.name.clone()),
            description: Some(format!(
                "{requester} requests deployment of '{}' v{} to {catalog}.{schema}",
                contract.name, contract.version
            )),
            kind: "action_required".to_string(),
            action_type: Some(ACTION_DEPLOY.to_string()),
            action_payload: Some(json!({
                "contract_id": contract_id,
                "contract_name": contract.name,
                "version": contract.version,
                "requester": requester,
                "catalog": catalog,
                "schema": schema,
            })),
            can_delete: false,
        })?;

        self.changelog.append(
            "contract",
            contract_id,
            "deploy_requested",
            requester,
            Some(&format!("requested deployment to {catalog}.{schema}")),
        )?;
        Ok(())
    }

    /// Deployment response. On approval with `execute_deployment`, triggers
    /// the external deployment job and returns its id; a trigger failure
    /// degrades to a notification instead of an error.
    pub fn handle_deploy_response(
        &self,
        contract_id: &str,
        decision: DeployDecision,
        approver: &str,
        execute_deployment: bool,
    ) -> Result<Option<String>> {
        let contract = self.require_contract(contract_id)?;
        let pending = self
            .store
            .get_pending_request(contract_id, ACTION_DEPLOY)?
            .ok_or_else(|| Error::not_found("pending deploy request"))?;

        let mut job_id = None;
        let (action, description) = match decision {
            DeployDecision::Approve if execute_deployment => {
                match self.jobs.trigger_deployment(contract_id) {
                    Ok(id) => {
                        let description = format!(
                            "{approver} approved deployment of '{}'; job {id} started",
                            contract.name
                        );
                        job_id = Some(id);
                        ("deploy_approved", description)
                    }
                    Err(e) => {
                        tracing::warn!("deployment job trigger failed: {e}");
                        (
                            "deploy_approved",
                            format!(
                                "{approver} approved deployment of '{}' but the deployment job \
                                 could not be started: {e}",
                                contract.name
                            ),
                        )
                    }
                }
            }
            DeployDecision::Approve => (
                "deploy_approved",
                format!("{approver} approved deployment of '{}'", contract.name),
            ),
            DeployDecision::Deny => (
                "deploy_denied",
                format!("{approver} denied deployment of '{}'", contract.name),
            ),
        };

        self.notifications.create(&Notification {
            recipient: pending.requester.clone(),
            title: "Deployment decision".to_string(),
            subtitle: Some(contract.name.clone()),
            description: Some(description),
            kind: "receipt".to_string(),
            action_type: None,
            action_payload: None,
            can_delete: true,
        })?;

        self.changelog.append(
            "contract",
            contract_id,
            action,
            approver,
            job_id.as_deref(),
        )?;
        self.best_effort(
            "marking deploy notification handled",
            self.notifications.mark_handled(ACTION_DEPLOY, contract_id),
        );
        self.store.clear_pending_request(contract_id, ACTION_DEPLOY)?;

        Ok(job_id)
    }

    /// Direct status transition without the request/response machinery. Used
    /// for archival and for returning a rejected contract to draft.
    pub fn transition_status(
        &self,
        contract_id: &str,
        to: ContractStatus,
        actor: &str,
    ) -> Result<Contract> {
        let contract = self.require_contract(contract_id)?;
        check_transition(&contract.status, to)?;
        self.store
            .update_contract_status(contract_id, to.as_str(), actor)?;
        self.changelog.append(
            "contract",
            contract_id,
            "status_changed",
            actor,
            Some(&format!("{} -> {}", contract.status, to)),
        )?;
        self.require_contract(contract_id)
    }
}
