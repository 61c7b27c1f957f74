#![recursion_limit = "256"]

mod common;

use common::{FakeJobs, FakeNames, FakePolicy, FakeSemantics, harness, harness_with, sample_document};
use datapact::engine::{DeployDecision, PublishDecision, ReviewDecision};
use datapact::store::Store;
use datapact::types::ContractStatus;

#[test]
fn test_end_to_end_review_approve_publish() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    assert_eq!(contract.version, "1.1.0");
    assert_eq!(contract.status, "draft");

    let contract = h.engine.request_steward_review(&contract.id, "ava").unwrap();
    assert_eq!(contract.status, "proposed");
    // Requester receipt plus steward action-required
    assert_eq!(h.notifications.count(), 2);
    assert_eq!(h.notifications.for_recipient("ava").len(), 1);
    let stewards = h.notifications.for_recipient("role:data-steward");
    assert_eq!(stewards.len(), 1);
    assert_eq!(stewards[0].action_type.as_deref(), Some("contract_review"));
    let payload = stewards[0].action_payload.as_ref().unwrap();
    assert_eq!(payload["contract_id"], serde_json::json!(contract.id));
    assert_eq!(payload["requester"], serde_json::json!("ava"));

    let contract = h
        .engine
        .handle_review_response(&contract.id, ReviewDecision::Approve, "sam", None)
        .unwrap();
    assert_eq!(contract.status, "approved");
    // Third notification goes back to the original requester
    assert_eq!(h.notifications.count(), 3);
    assert_eq!(h.notifications.for_recipient("ava").len(), 2);

    h.engine.request_publish(&contract.id, "ava").unwrap();
    let contract = h
        .engine
        .handle_publish_response(&contract.id, PublishDecision::Approve, "sam")
        .unwrap();
    assert!(contract.published);
    assert_eq!(contract.status, "approved");

    let history = h.engine.get_contract_history(&contract.id).unwrap();
    let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec![
            "created",
            "review_requested",
            "review_approved",
            "publish_requested",
            "published",
        ]
    );
}

#[test]
fn test_review_request_requires_draft() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    h.engine.request_steward_review(&contract.id, "ava").unwrap();

    let err = h
        .engine
        .request_steward_review(&contract.id, "ava")
        .unwrap_err();
    assert!(err.to_string().contains("proposed"));
    // Status was not touched by the failed request
    let contract = h.store.get_contract(&contract.id).unwrap().unwrap();
    assert_eq!(contract.status, "proposed");
}

#[test]
fn test_under_review_status_accepted_for_approval() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    h.engine.request_steward_review(&contract.id, "ava").unwrap();
    // Legacy rows may carry the synonym spelling
    h.store
        .update_contract_status(&contract.id, "under_review", "legacy-migrator")
        .unwrap();

    let contract = h
        .engine
        .handle_review_response(&contract.id, ReviewDecision::Approve, "sam", None)
        .unwrap();
    assert_eq!(contract.status, "approved");
}

#[test]
fn test_reject_returns_to_rejected_then_draft() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    h.engine.request_steward_review(&contract.id, "ava").unwrap();

    let contract = h
        .engine
        .handle_review_response(
            &contract.id,
            ReviewDecision::Reject,
            "sam",
            Some("missing SLAs"),
        )
        .unwrap();
    assert_eq!(contract.status, "rejected");

    let contract = h
        .engine
        .transition_status(&contract.id, ContractStatus::Draft, "ava")
        .unwrap();
    assert_eq!(contract.status, "draft");
}

#[test]
fn test_clarify_keeps_status_and_pending_request() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    h.engine.request_steward_review(&contract.id, "ava").unwrap();

    let contract = h
        .engine
        .handle_review_response(
            &contract.id,
            ReviewDecision::Clarify,
            "sam",
            Some("which tenant?"),
        )
        .unwrap();
    assert_eq!(contract.status, "proposed");

    // The request is still open, so a second response can resolve it
    let contract = h
        .engine
        .handle_review_response(&contract.id, ReviewDecision::Approve, "sam", None)
        .unwrap();
    assert_eq!(contract.status, "approved");
}

#[test]
fn test_response_without_request_is_not_found() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();

    let err = h
        .engine
        .handle_review_response(&contract.id, ReviewDecision::Approve, "sam", None)
        .unwrap_err();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_publish_preconditions() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();

    // Draft contracts cannot request publication
    assert!(h.engine.request_publish(&contract.id, "ava").is_err());

    h.engine.request_steward_review(&contract.id, "ava").unwrap();
    h.engine
        .handle_review_response(&contract.id, ReviewDecision::Approve, "sam", None)
        .unwrap();
    h.engine.request_publish(&contract.id, "ava").unwrap();
    h.engine
        .handle_publish_response(&contract.id, PublishDecision::Approve, "sam")
        .unwrap();

    // Already published
    let err = h.engine.request_publish(&contract.id, "ava").unwrap_err();
    assert!(err.to_string().contains("already published"));
}

#[test]
fn test_publish_denied_leaves_flag_unset() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    h.engine.request_steward_review(&contract.id, "ava").unwrap();
    h.engine
        .handle_review_response(&contract.id, ReviewDecision::Approve, "sam", None)
        .unwrap();
    h.engine.request_publish(&contract.id, "ava").unwrap();

    let contract = h
        .engine
        .handle_publish_response(&contract.id, PublishDecision::Deny, "sam")
        .unwrap();
    assert!(!contract.published);
    assert_eq!(contract.status, "approved");
}

#[test]
fn test_deploy_policy_violation_aborts_with_no_side_effects() {
    let h = harness_with(
        FakeJobs::default(),
        FakeNames::default(),
        FakeSemantics::default(),
        FakePolicy {
            allowed: false,
            reason: Some("catalog is frozen".to_string()),
        },
    );
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    let before = h.notifications.count();

    let err = h
        .engine
        .request_deploy(&contract.id, "ava", "prod", "commerce")
        .unwrap_err();
    assert!(err.to_string().contains("catalog is frozen"));
    assert_eq!(h.notifications.count(), before);
    assert!(
        h.store
            .get_pending_request(&contract.id, "contract_deploy")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_deploy_approval_triggers_job() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    h.engine
        .request_deploy(&contract.id, "ava", "prod", "commerce")
        .unwrap();

    let job_id = h
        .engine
        .handle_deploy_response(&contract.id, DeployDecision::Approve, "sam", true)
        .unwrap();
    assert_eq!(job_id.as_deref(), Some("deploy-job-1"));
    assert_eq!(
        h.jobs.deployments.lock().unwrap().as_slice(),
        &[contract.id.clone()]
    );
}

#[test]
fn test_deploy_job_failure_degrades_to_notification() {
    let h = harness_with(
        FakeJobs {
            fail_deployment: true,
            ..Default::default()
        },
        FakeNames::default(),
        FakeSemantics::default(),
        FakePolicy::default(),
    );
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    h.engine
        .request_deploy(&contract.id, "ava", "prod", "commerce")
        .unwrap();

    let job_id = h
        .engine
        .handle_deploy_response(&contract.id, DeployDecision::Approve, "sam", true)
        .unwrap();
    assert!(job_id.is_none());

    let receipts = h.notifications.for_recipient("ava");
    let last = receipts.last().unwrap();
    assert!(
        last.description
            .as_deref()
            .unwrap()
            .contains("could not be started")
    );
}

#[test]
fn test_mark_handled_failure_is_swallowed() {
    let h = harness();
    let contract = h
        .engine
        .import_document(&sample_document(), "ava")
        .unwrap();
    h.engine.request_steward_review(&contract.id, "ava").unwrap();

    h.notifications
        .fail_mark_handled
        .store(true, std::sync::atomic::Ordering::Relaxed);
    let contract = h
        .engine
        .handle_review_response(&contract.id, ReviewDecision::Approve, "sam", None)
        .unwrap();
    assert_eq!(contract.status, "approved");
}
