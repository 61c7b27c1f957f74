//! Contract governance engine.
//!
//! [`Engine`] owns the store plus the external collaborators and exposes the
//! public operations: document import/export, the approval/publish/deploy
//! workflow, version cloning and comparison, and the quality suggestion loop.
//! Collaborator failures split two ways: structural calls propagate, cosmetic
//! ones go through [`Engine::best_effort`] and only log.

mod lifecycle;
mod profiling;
mod transcode;
mod versioning;

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;

use crate::collab::{
    ChangeLog, DeployPolicy, JobRunner, NameResolver, NotificationSink, SemanticLinks,
};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::Contract;

pub use lifecycle::{DeployDecision, PublishDecision, ReviewDecision};
pub use profiling::SuggestionDraft;
pub use transcode::ValidationReport;

/// Actor recorded on rows the engine creates on its own behalf, such as
/// auto-created domains.
pub const SYSTEM_ACTOR: &str = "system";

/// External collaborator implementations wired in by the host.
#[derive(Clone)]
pub struct Collaborators {
    pub notifications: Arc<dyn NotificationSink>,
    pub changelog: Arc<dyn ChangeLog>,
    pub jobs: Arc<dyn JobRunner>,
    pub names: Arc<dyn NameResolver>,
    pub semantics: Arc<dyn SemanticLinks>,
    pub deploy_policy: Arc<dyn DeployPolicy>,
}

pub struct Engine {
    store: Arc<dyn Store>,
    notifications: Arc<dyn NotificationSink>,
    changelog: Arc<dyn ChangeLog>,
    jobs: Arc<dyn JobRunner>,
    names: Arc<dyn NameResolver>,
    semantics: Arc<dyn SemanticLinks>,
    deploy_policy: Arc<dyn DeployPolicy>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, collaborators: Collaborators) -> Self {
        Self {
            store,
            notifications: collaborators.notifications,
            changelog: collaborators.changelog,
            jobs: collaborators.jobs,
            names: collaborators.names,
            semantics: collaborators.semantics,
            deploy_policy: collaborators.deploy_policy,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn get_contract(&self, id: &str) -> Result<Option<Contract>> {
        self.store.get_contract(id)
    }

    pub fn list_contracts(&self) -> Result<Vec<Contract>> {
        self.store.list_contracts()
    }

    /// Audit trail for one contract, oldest entry first.
    pub fn get_contract_history(
        &self,
        contract_id: &str,
    ) -> Result<Vec<crate::collab::ChangeLogEntry>> {
        self.require_contract(contract_id)?;
        self.changelog.query("contract", contract_id)
    }

    pub fn delete_contract(&self, id: &str, actor: &str) -> Result<bool> {
        let deleted = self.store.delete_contract(id)?;
        if deleted {
            self.changelog
                .append("contract", id, "deleted", actor, None)?;
        }
        Ok(deleted)
    }

    /// Shallow fetch that turns absence into a typed error.
    fn require_contract(&self, id: &str) -> Result<Contract> {
        self.store
            .get_contract(id)?
            .ok_or_else(|| Error::not_found("contract"))
    }

    /// Runs a cosmetic side effect; a failure is logged and swallowed.
    fn best_effort<T>(&self, context: &str, result: Result<T>) {
        if let Err(e) = result {
            tracing::warn!("{context}: {e}");
        }
    }
}

static SEMVER: OnceLock<Regex> = OnceLock::new();

/// Rejects anything that is not a full `MAJOR.MINOR.PATCH` string.
pub(crate) fn validate_semver(version: &str) -> Result<()> {
    let re = SEMVER.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap());
    if re.is_match(version) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "version '{version}' is not a MAJOR.MINOR.PATCH semantic version"
        )))
    }
}

/// Version-family key: the name with any trailing version suffix stripped, so
/// "orders-1.2.0" and "orders-2.0.0" land in the same family.
pub(crate) fn derive_base_name(name: &str) -> String {
    let re = {
        static SUFFIX: OnceLock<Regex> = OnceLock::new();
        SUFFIX.get_or_init(|| Regex::new(r"[-_. ]v?\d+\.\d+\.\d+$").unwrap())
    };
    re.replace(name, "").to_string()
}
