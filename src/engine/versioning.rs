//! Version families: shallow and deep cloning, lineage queries, and the
//! comparison wrapper over [`crate::diff`].

use chrono::Utc;
use uuid::Uuid;

use super::{Engine, derive_base_name, validate_semver};
use crate::diff::{ChangeAnalysis, compare_contracts};
use crate::error::{Error, Result};
use crate::types::{Contract, ContractStatus, ContractTree};

impl Engine {
    /// Shallow clone: a fresh draft contract row with the new version and no
    /// nested entities.
    pub fn create_new_version(
        &self,
        contract_id: &str,
        new_version: &str,
        actor: &str,
    ) -> Result<Contract> {
        validate_semver(new_version)?;
        let source = self.require_contract(contract_id)?;

        let now = Utc::now();
        let clone = Contract {
            id: Uuid::new_v4().to_string(),
            version: new_version.to_string(),
            status: ContractStatus::Draft.as_str().to_string(),
            published: false,
            base_name: Some(
                source
                    .base_name
                    .clone()
                    .unwrap_or_else(|| derive_base_name(&source.name)),
            ),
            parent_contract_id: Some(source.id.clone()),
            created_by: Some(actor.to_string()),
            updated_by: None,
            created_at: now,
            updated_at: now,
            ..source
        };
        self.store.create_contract(&clone)?;
        self.changelog.append(
            "contract",
            &clone.id,
            "version_created",
            actor,
            Some(&format!("new version {new_version} of {contract_id}")),
        )?;
        Ok(clone)
    }

    /// Deep clone: every nested collection is duplicated with fresh ids and
    /// re-parented under the new contract. The version string is checked
    /// before anything is read or written.
    pub fn clone_contract_for_new_version(
        &self,
        contract_id: &str,
        new_version: &str,
        actor: &str,
    ) -> Result<Contract> {
        validate_semver(new_version)?;
        let source = self
            .store
            .get_contract_tree(contract_id)?
            .ok_or_else(|| Error::not_found("contract"))?;

        let tree = remap_tree(&source, new_version, actor);
        self.store.insert_contract_tree(&tree)?;
        self.changelog.append(
            "contract",
            &tree.contract.id,
            "version_cloned",
            actor,
            Some(&format!(
                "deep clone of {contract_id} as version {new_version}"
            )),
        )?;
        Ok(tree.contract)
    }

    /// All versions in the contract's family, newest first. Contracts without
    /// a family key fall back to one lineage hop in each direction.
    pub fn get_contract_versions(&self, contract_id: &str) -> Result<Vec<Contract>> {
        let contract = self.require_contract(contract_id)?;

        if let Some(base_name) = &contract.base_name {
            let family = self.store.list_contracts_by_base_name(base_name)?;
            if family.len() > 1 {
                return Ok(family);
            }
        }

        let mut versions = Vec::new();
        if let Some(parent_id) = &contract.parent_contract_id {
            if let Some(parent) = self.store.get_contract(parent_id)? {
                versions.push(parent);
            }
        }
        versions.extend(self.store.list_contract_children(&contract.id)?);
        versions.push(contract);
        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        versions.dedup_by(|a, b| a.id == b.id);
        Ok(versions)
    }

    /// Exports both contracts and compares the documents.
    pub fn compare_versions(&self, old_id: &str, new_id: &str) -> Result<ChangeAnalysis> {
        let old = self.export_document(old_id)?;
        let new = self.export_document(new_id)?;
        Ok(compare_contracts(&old, &new))
    }
}

fn remap_tree(source: &ContractTree, new_version: &str, actor: &str) -> ContractTree {
    let mut tree = source.clone();
    let now = Utc::now();

    let contract_id = Uuid::new_v4().to_string();
    tree.contract.parent_contract_id = Some(tree.contract.id.clone());
    tree.contract.id = contract_id.clone();
    tree.contract.version = new_version.to_string();
    tree.contract.status = ContractStatus::Draft.as_str().to_string();
    tree.contract.published = false;
    tree.contract.base_name = Some(
        source
            .contract
            .base_name
            .clone()
            .unwrap_or_else(|| derive_base_name(&source.contract.name)),
    );
    tree.contract.created_by = Some(actor.to_string());
    tree.contract.updated_by = None;
    tree.contract.created_at = now;
    tree.contract.updated_at = now;

    for tag in &mut tree.tags {
        tag.id = Uuid::new_v4().to_string();
        tag.contract_id = contract_id.clone();
    }
    for role in &mut tree.roles {
        role.id = Uuid::new_v4().to_string();
        role.contract_id = contract_id.clone();
    }
    for member in &mut tree.team {
        member.id = Uuid::new_v4().to_string();
        member.contract_id = contract_id.clone();
    }
    for st in &mut tree.servers {
        st.server.id = Uuid::new_v4().to_string();
        st.server.contract_id = contract_id.clone();
        for prop in &mut st.properties {
            prop.id = Uuid::new_v4().to_string();
            prop.server_id = st.server.id.clone();
        }
    }
    for channel in &mut tree.support {
        channel.id = Uuid::new_v4().to_string();
        channel.contract_id = contract_id.clone();
    }
    if let Some(pricing) = &mut tree.pricing {
        pricing.id = Uuid::new_v4().to_string();
        pricing.contract_id = contract_id.clone();
    }
    for sla in &mut tree.sla_properties {
        sla.id = Uuid::new_v4().to_string();
        sla.contract_id = contract_id.clone();
    }
    for cp in &mut tree.custom_properties {
        cp.id = Uuid::new_v4().to_string();
        cp.contract_id = contract_id.clone();
    }
    for def in &mut tree.definitions {
        def.id = Uuid::new_v4().to_string();
        def.owner_id = contract_id.clone();
    }

    for schema in &mut tree.schemas {
        let object_id = Uuid::new_v4().to_string();
        schema.object.id = object_id.clone();
        schema.object.contract_id = contract_id.clone();
        for def in &mut schema.definitions {
            def.id = Uuid::new_v4().to_string();
            def.owner_id = object_id.clone();
        }
        // Quality checks reference properties by old id, so remap pairwise
        let mut property_ids: Vec<(String, String)> = Vec::new();
        for pt in &mut schema.properties {
            let new_id = Uuid::new_v4().to_string();
            property_ids.push((pt.property.id.clone(), new_id.clone()));
            pt.property.id = new_id.clone();
            pt.property.schema_object_id = object_id.clone();
            for def in &mut pt.definitions {
                def.id = Uuid::new_v4().to_string();
                def.owner_id = new_id.clone();
            }
        }
        for check in &mut schema.quality {
            check.id = Uuid::new_v4().to_string();
            check.schema_object_id = object_id.clone();
            if let Some(old_property_id) = &check.property_id {
                check.property_id = property_ids
                    .iter()
                    .find(|(old, _)| old == old_property_id)
                    .map(|(_, new)| new.clone());
            }
        }
    }

    tree
}
