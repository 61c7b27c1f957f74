mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Outcome of a transactional suggestion acceptance.
#[derive(Debug, Clone, Default)]
pub struct AcceptOutcome {
    /// Suggestion ids materialized into quality checks and flipped to accepted.
    pub accepted: Vec<String>,
    /// Pending suggestions whose schema name matched nothing on the contract.
    pub skipped_unknown_schema: Vec<String>,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Contract operations
    fn create_contract(&self, contract: &Contract) -> Result<()>;
    fn get_contract(&self, id: &str) -> Result<Option<Contract>>;
    fn list_contracts(&self) -> Result<Vec<Contract>>;
    fn update_contract(&self, contract: &Contract) -> Result<()>;
    /// Cascades to every nested collection, including authoritative
    /// definitions at all three levels, in one transaction.
    fn delete_contract(&self, id: &str) -> Result<bool>;
    fn contract_id_exists(&self, id: &str) -> Result<bool>;

    fn update_contract_status(&self, id: &str, status: &str, updated_by: &str) -> Result<()>;
    fn set_published(&self, id: &str, published: bool, updated_by: &str) -> Result<()>;

    // Deep fetch / deep insert
    /// Contract plus all nested collections; children are batch-loaded by
    /// parent-id set, one query per collection.
    fn get_contract_tree(&self, id: &str) -> Result<Option<ContractTree>>;
    /// Writes the whole tree in a single transaction.
    fn insert_contract_tree(&self, tree: &ContractTree) -> Result<()>;

    // Version family queries
    fn list_contracts_by_base_name(&self, base_name: &str) -> Result<Vec<Contract>>;
    fn list_contract_children(&self, parent_id: &str) -> Result<Vec<Contract>>;

    // Schema lookups
    fn list_schema_objects(&self, contract_id: &str) -> Result<Vec<SchemaObject>>;

    // Profiling runs
    fn create_profiling_run(&self, run: &ProfilingRun) -> Result<()>;
    fn get_profiling_run(&self, id: &str) -> Result<Option<ProfilingRun>>;
    fn list_profiling_runs(&self, contract_id: &str) -> Result<Vec<ProfilingRun>>;
    fn update_profiling_run(&self, run: &ProfilingRun) -> Result<()>;

    // Suggested quality checks
    fn create_suggestions(&self, suggestions: &[SuggestedQualityCheck]) -> Result<()>;
    fn list_suggestions(&self, contract_id: &str) -> Result<Vec<SuggestedQualityCheck>>;
    /// Materializes quality checks for pending suggestions whose schema name
    /// matches, flips them to accepted, and optionally bumps the contract
    /// version, all in one transaction.
    fn accept_suggestions(
        &self,
        contract_id: &str,
        ids: &[String],
        new_version: Option<&str>,
    ) -> Result<AcceptOutcome>;
    /// Flips matching pending suggestions to rejected; returns the number of
    /// rows actually updated.
    fn reject_suggestions(&self, contract_id: &str, ids: &[String]) -> Result<usize>;

    // Pending workflow requests
    fn upsert_pending_request(&self, request: &PendingRequest) -> Result<()>;
    fn get_pending_request(
        &self,
        contract_id: &str,
        action_type: &str,
    ) -> Result<Option<PendingRequest>>;
    fn clear_pending_request(&self, contract_id: &str, action_type: &str) -> Result<bool>;
}
