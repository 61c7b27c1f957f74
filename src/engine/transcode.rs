//! Bidirectional transcoding between the entity store and the interchange
//! document.
//!
//! Decode is tolerant and write-heavy: one document becomes one contract tree
//! inserted in a single transaction. Encode is the inverse and is read-only
//! except for best-effort semantic enrichment, which never aborts an export.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::{Engine, SYSTEM_ACTOR, derive_base_name, validate_semver};
use crate::document::{
    ContractDocument, CustomPairDocument, DEFAULT_CONTRACT_NAME, DefinitionDocument,
    DescriptionDocument, PriceDocument, PropertyDocument, QualityDocument, RoleDocument,
    SEMANTIC_ASSIGNMENT_TYPE, SchemaDocument, ServerDocument, SlaPropertyDocument,
    SupportChannelDocument, TeamMemberDocument, custom_pairs,
};
use crate::error::{Error, Result};
use crate::types::*;

/// Unstructured uploads land in `description.purpose`, cut off past this many
/// characters.
const UPLOAD_TEXT_LIMIT: usize = 500;

/// Warnings collected by non-strict document validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.warnings.is_empty()
    }
}

impl Engine {
    /// Decodes a document into a full contract tree and persists it in one
    /// transaction. Returns the stored contract row.
    pub fn import_document(&self, doc: &ContractDocument, actor: &str) -> Result<Contract> {
        let version = doc.version.clone().unwrap_or_else(|| "1.0.0".to_string());
        validate_semver(&version)?;

        let name = doc
            .name
            .clone()
            .or_else(|| doc.data_product.clone())
            .or_else(|| doc.id.clone())
            .unwrap_or_else(|| DEFAULT_CONTRACT_NAME.to_string());

        // A caller-supplied id is honored only while unused
        let id = match &doc.id {
            Some(id) if !self.store.contract_id_exists(id)? => id.clone(),
            _ => Uuid::new_v4().to_string(),
        };

        let team_id = match &doc.owner {
            Some(owner) => self.names.team_id(owner)?,
            None => None,
        };
        let domain_id = match &doc.domain {
            Some(domain) => Some(self.names.ensure_domain(domain, SYSTEM_ACTOR)?),
            None => None,
        };

        let created_at = doc
            .contract_created_ts
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let description = doc.description.clone().unwrap_or_default();
        let contract = Contract {
            id: id.clone(),
            name: name.clone(),
            version,
            status: doc.status.clone().unwrap_or_else(|| "draft".to_string()),
            kind: doc.kind.clone(),
            api_version: doc.api_version.clone(),
            tenant: doc.tenant.clone(),
            team_id,
            data_product: doc.data_product.clone(),
            domain_id,
            sla_default_element: doc.sla_default_element.clone(),
            usage: description.usage,
            purpose: description.purpose,
            limitations: description.limitations,
            published: false,
            base_name: Some(derive_base_name(&name)),
            parent_contract_id: None,
            created_by: Some(actor.to_string()),
            updated_by: None,
            created_at,
            updated_at: created_at,
        };

        let mut tree = ContractTree {
            contract,
            tags: Vec::new(),
            roles: Vec::new(),
            team: Vec::new(),
            servers: Vec::new(),
            support: Vec::new(),
            pricing: None,
            sla_properties: Vec::new(),
            custom_properties: Vec::new(),
            definitions: Vec::new(),
            schemas: Vec::new(),
        };

        for name in doc.tags.as_deref().unwrap_or_default() {
            tree.tags.push(Tag {
                id: Uuid::new_v4().to_string(),
                contract_id: id.clone(),
                name: name.clone(),
            });
        }

        for role in doc.roles.as_deref().unwrap_or_default() {
            let Some(role_name) = &role.role else {
                continue;
            };
            tree.roles.push(Role {
                id: Uuid::new_v4().to_string(),
                contract_id: id.clone(),
                role: role_name.clone(),
                access: role.access.clone(),
                first_level_approvers: role.first_level_approvers.clone(),
                second_level_approvers: role.second_level_approvers.clone(),
                custom_properties: role
                    .custom_properties
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|p| CustomPair {
                        property: p.property.clone(),
                        value: p.value.clone(),
                    })
                    .collect(),
            });
        }

        for member in doc.team.as_deref().unwrap_or_default() {
            tree.team.push(TeamMember {
                id: Uuid::new_v4().to_string(),
                contract_id: id.clone(),
                username: member.username.clone(),
                role: member.role.clone(),
                date_in: member.date_in.clone(),
                date_out: member.date_out.clone(),
                replaced_by_username: member.replaced_by_username.clone(),
            });
        }

        for server in doc.servers.as_deref().unwrap_or_default() {
            let server_id = Uuid::new_v4().to_string();
            let properties = server
                .extra
                .iter()
                .map(|(key, value)| ServerProperty {
                    id: Uuid::new_v4().to_string(),
                    server_id: server_id.clone(),
                    key: key.clone(),
                    value: value_to_text(value),
                })
                .collect();
            tree.servers.push(ServerTree {
                server: Server {
                    id: server_id,
                    contract_id: id.clone(),
                    server: server.server.clone(),
                    server_type: server.server_type.clone(),
                    environment: server.environment.clone(),
                    description: server.description.clone(),
                },
                properties,
            });
        }

        for channel in doc.support.as_deref().unwrap_or_default() {
            tree.support.push(SupportChannel {
                id: Uuid::new_v4().to_string(),
                contract_id: id.clone(),
                channel: channel.channel.clone(),
                url: channel.url.clone(),
                description: channel.description.clone(),
                tool: channel.tool.clone(),
                scope: channel.scope.clone(),
                invitation_url: channel.invitation_url.clone(),
            });
        }

        if let Some(price) = &doc.price {
            tree.pricing = Some(Pricing {
                id: Uuid::new_v4().to_string(),
                contract_id: id.clone(),
                amount: price.price_amount.as_ref().map(value_to_text),
                currency: price.price_currency.clone(),
                unit: price.price_unit.clone(),
            });
        }

        for sla in doc.sla_properties.as_deref().unwrap_or_default() {
            let Some(property) = &sla.property else {
                continue;
            };
            tree.sla_properties.push(SlaProperty {
                id: Uuid::new_v4().to_string(),
                contract_id: id.clone(),
                property: property.clone(),
                value: sla.value.as_ref().map(value_to_text),
                value_ext: sla.value_ext.as_ref().map(value_to_text),
                unit: sla.unit.clone(),
                element: sla.element.clone(),
                driver: sla.driver.clone(),
            });
        }

        if let Some(value) = &doc.custom_properties {
            for pair in custom_pairs(value) {
                tree.custom_properties.push(CustomProperty {
                    id: Uuid::new_v4().to_string(),
                    contract_id: id.clone(),
                    property: pair.property,
                    value: pair.value,
                });
            }
        }

        for def in doc.authoritative_definitions.as_deref().unwrap_or_default() {
            tree.definitions
                .push(definition(DefinitionOwner::Contract, &id, def));
        }

        for schema_doc in doc.schema.as_deref().unwrap_or_default() {
            tree.schemas.push(self.decode_schema(&id, schema_doc)?);
        }

        if doc
            .quality_rules
            .as_deref()
            .is_some_and(|rules| !rules.is_empty())
        {
            tracing::warn!(
                contract_id = %id,
                "top-level qualityRules are not schema-scoped and were ignored"
            );
        }

        self.store.insert_contract_tree(&tree)?;
        self.changelog.append(
            "contract",
            &id,
            "created",
            actor,
            Some(&format!("imported '{name}'")),
        )?;

        Ok(tree.contract)
    }

    fn decode_schema(&self, contract_id: &str, doc: &SchemaDocument) -> Result<SchemaTree> {
        let object_id = Uuid::new_v4().to_string();
        let object = SchemaObject {
            id: object_id.clone(),
            contract_id: contract_id.to_string(),
            name: doc
                .name
                .clone()
                .ok_or_else(|| Error::validation("schema object without a name"))?,
            physical_name: doc.physical_name.clone(),
            business_name: doc.business_name.clone(),
            physical_type: doc.physical_type.clone(),
            description: doc.description.clone(),
            data_granularity_description: doc.data_granularity_description.clone(),
            tags: doc.tags.clone().unwrap_or_default(),
        };

        let mut pk_positions = HashSet::new();
        let mut partition_positions = HashSet::new();
        let mut properties = Vec::new();
        let mut property_ids: HashMap<String, String> = HashMap::new();

        for prop in doc.properties.as_deref().unwrap_or_default() {
            let Some(prop_name) = &prop.name else {
                continue;
            };
            if prop.primary_key_position >= 0 && !pk_positions.insert(prop.primary_key_position) {
                return Err(Error::validation(format!(
                    "schema '{}' has duplicate primary key position {}",
                    object.name, prop.primary_key_position
                )));
            }
            if prop.partition_key_position >= 0
                && !partition_positions.insert(prop.partition_key_position)
            {
                return Err(Error::validation(format!(
                    "schema '{}' has duplicate partition key position {}",
                    object.name, prop.partition_key_position
                )));
            }

            let property_id = Uuid::new_v4().to_string();
            property_ids.insert(prop_name.clone(), property_id.clone());
            let definitions = prop
                .authoritative_definitions
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|d| definition(DefinitionOwner::Property, &property_id, d))
                .collect();
            properties.push(PropertyTree {
                property: SchemaProperty {
                    id: property_id,
                    schema_object_id: object_id.clone(),
                    name: prop_name.clone(),
                    logical_type: prop.logical_type.clone(),
                    physical_type: prop.physical_type.clone(),
                    required: prop.required.unwrap_or(false),
                    unique: prop.unique.unwrap_or(false),
                    partitioned: prop.partitioned,
                    primary_key_position: if prop.primary_key {
                        prop.primary_key_position
                    } else {
                        -1
                    },
                    partition_key_position: if prop.partitioned {
                        prop.partition_key_position
                    } else {
                        -1
                    },
                    classification: prop.classification.clone(),
                    encrypted_name: prop.encrypted_name.clone(),
                    transform_logic: prop.transform_logic.clone(),
                    transform_source_objects: prop
                        .transform_source_objects
                        .clone()
                        .unwrap_or_default(),
                    transform_description: prop.transform_description.clone(),
                    examples: prop.examples.clone().unwrap_or_default(),
                    critical_data_element: prop.critical_data_element.unwrap_or(false),
                    constraints: prop.logical_type_options.clone(),
                },
                definitions,
            });
        }

        let mut quality = Vec::new();
        for check in doc.quality.as_deref().unwrap_or_default() {
            let property_id = check
                .property
                .as_deref()
                .and_then(|name| property_ids.get(name).cloned());
            if check.property.is_some() && property_id.is_none() {
                tracing::warn!(
                    schema = %object.name,
                    property = ?check.property,
                    "quality check references an unknown property, keeping it object-level"
                );
            }
            let level = if property_id.is_some() {
                QualityLevel::Property
            } else {
                QualityLevel::Object
            };
            quality.push(QualityCheck {
                id: Uuid::new_v4().to_string(),
                schema_object_id: object_id.clone(),
                property_id,
                level,
                rule: check.rule.clone(),
                name: check.name.clone(),
                description: check.description.clone(),
                dimension: check.dimension.clone(),
                business_impact: check.business_impact.clone(),
                severity: check.severity.clone(),
                check_type: check.check_type.clone(),
                query: check.query.clone(),
                schedule: check.schedule.clone(),
                scheduler: check.scheduler.clone(),
                predicates: QualityPredicates {
                    must_be: check.must_be.clone(),
                    must_not_be: check.must_not_be.clone(),
                    must_be_gt: check.must_be_gt.clone(),
                    must_be_ge: check.must_be_ge.clone(),
                    must_be_lt: check.must_be_lt.clone(),
                    must_be_le: check.must_be_le.clone(),
                    must_be_between_min: check.must_be_between_min.clone(),
                    must_be_between_max: check.must_be_between_max.clone(),
                },
            });
        }

        let definitions = doc
            .authoritative_definitions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|d| definition(DefinitionOwner::Schema, &object_id, d))
            .collect();

        Ok(SchemaTree {
            object,
            properties,
            quality,
            definitions,
        })
    }

    /// Encodes a stored contract tree back into the interchange document.
    pub fn export_document(&self, contract_id: &str) -> Result<ContractDocument> {
        let tree = self
            .store
            .get_contract_tree(contract_id)?
            .ok_or_else(|| Error::not_found("contract"))?;
        let c = &tree.contract;

        // Resolution failures drop the field rather than failing the export
        let owner = c
            .team_id
            .as_deref()
            .and_then(|id| self.names.team_name(id).ok().flatten());
        let domain = c
            .domain_id
            .as_deref()
            .and_then(|id| self.names.domain_name(id).ok().flatten());

        let description = DescriptionDocument {
            usage: c.usage.clone(),
            purpose: c.purpose.clone(),
            limitations: c.limitations.clone(),
        };
        let has_description =
            description.usage.is_some() || description.purpose.is_some() || description.limitations.is_some();

        let mut doc = ContractDocument {
            id: Some(c.id.clone()),
            kind: c.kind.clone(),
            api_version: c.api_version.clone(),
            version: Some(c.version.clone()),
            status: Some(c.status.clone()),
            name: Some(c.name.clone()),
            owner,
            tenant: c.tenant.clone(),
            data_product: c.data_product.clone(),
            domain,
            sla_default_element: c.sla_default_element.clone(),
            contract_created_ts: Some(c.created_at.to_rfc3339()),
            description: has_description.then_some(description),
            schema: None,
            team: None,
            support: None,
            price: None,
            sla_properties: None,
            custom_properties: None,
            authoritative_definitions: None,
            tags: None,
            roles: None,
            servers: None,
            quality_rules: None,
        };

        if !tree.tags.is_empty() {
            doc.tags = Some(tree.tags.iter().map(|t| t.name.clone()).collect());
        }

        if !tree.roles.is_empty() {
            doc.roles = Some(
                tree.roles
                    .iter()
                    .map(|role| RoleDocument {
                        role: Some(role.role.clone()),
                        access: role.access.clone(),
                        first_level_approvers: role.first_level_approvers.clone(),
                        second_level_approvers: role.second_level_approvers.clone(),
                        custom_properties: (!role.custom_properties.is_empty()).then(|| {
                            role.custom_properties
                                .iter()
                                .map(|p| CustomPairDocument {
                                    property: p.property.clone(),
                                    value: p.value.clone(),
                                })
                                .collect()
                        }),
                    })
                    .collect(),
            );
        }

        if !tree.team.is_empty() {
            doc.team = Some(
                tree.team
                    .iter()
                    .map(|m| TeamMemberDocument {
                        username: m.username.clone(),
                        role: m.role.clone(),
                        date_in: m.date_in.clone(),
                        date_out: m.date_out.clone(),
                        replaced_by_username: m.replaced_by_username.clone(),
                    })
                    .collect(),
            );
        }

        if !tree.servers.is_empty() {
            doc.servers = Some(
                tree.servers
                    .iter()
                    .map(|st| ServerDocument {
                        server: st.server.server.clone(),
                        server_type: st.server.server_type.clone(),
                        environment: st.server.environment.clone(),
                        description: st.server.description.clone(),
                        extra: st
                            .properties
                            .iter()
                            .map(|p| (p.key.clone(), text_to_value(&p.value)))
                            .collect(),
                    })
                    .collect(),
            );
        }

        if !tree.support.is_empty() {
            doc.support = Some(
                tree.support
                    .iter()
                    .map(|s| SupportChannelDocument {
                        channel: s.channel.clone(),
                        url: s.url.clone(),
                        description: s.description.clone(),
                        tool: s.tool.clone(),
                        scope: s.scope.clone(),
                        invitation_url: s.invitation_url.clone(),
                    })
                    .collect(),
            );
        }

        if let Some(pricing) = &tree.pricing {
            doc.price = Some(PriceDocument {
                price_amount: pricing.amount.as_deref().map(text_to_value),
                price_currency: pricing.currency.clone(),
                price_unit: pricing.unit.clone(),
            });
        }

        if !tree.sla_properties.is_empty() {
            doc.sla_properties = Some(
                tree.sla_properties
                    .iter()
                    .map(|sla| SlaPropertyDocument {
                        property: Some(sla.property.clone()),
                        value: sla.value.as_deref().map(text_to_value),
                        value_ext: sla.value_ext.as_deref().map(text_to_value),
                        unit: sla.unit.clone(),
                        element: sla.element.clone(),
                        driver: sla.driver.clone(),
                    })
                    .collect(),
            );
        }

        if !tree.custom_properties.is_empty() {
            let pairs: Vec<Value> = tree
                .custom_properties
                .iter()
                .map(|cp| {
                    serde_json::json!({
                        "property": cp.property,
                        "value": cp.value,
                    })
                })
                .collect();
            doc.custom_properties = Some(Value::Array(pairs));
        }

        if !tree.definitions.is_empty() {
            doc.authoritative_definitions = Some(
                tree.definitions
                    .iter()
                    .map(definition_document)
                    .collect(),
            );
        }

        if !tree.schemas.is_empty() {
            doc.schema = Some(tree.schemas.iter().map(encode_schema).collect());
        }

        self.best_effort("semantic enrichment", self.enrich_with_semantics(&tree, &mut doc));

        Ok(doc)
    }

    /// Appends one semantic-assignment definition per ontology link, at all
    /// three levels. Any lookup failure aborts only the enrichment.
    fn enrich_with_semantics(&self, tree: &ContractTree, doc: &mut ContractDocument) -> Result<()> {
        let links = self
            .semantics
            .list_for_entity(&tree.contract.id, DefinitionOwner::Contract)?;
        for link in links {
            doc.authoritative_definitions
                .get_or_insert_with(Vec::new)
                .push(semantic_document(&link.iri));
        }

        let Some(schema_docs) = doc.schema.as_mut() else {
            return Ok(());
        };
        for (schema, schema_doc) in tree.schemas.iter().zip(schema_docs.iter_mut()) {
            for link in self
                .semantics
                .list_for_entity(&schema.object.id, DefinitionOwner::Schema)?
            {
                schema_doc
                    .authoritative_definitions
                    .get_or_insert_with(Vec::new)
                    .push(semantic_document(&link.iri));
            }

            let Some(property_docs) = schema_doc.properties.as_mut() else {
                continue;
            };
            for (prop, prop_doc) in schema.properties.iter().zip(property_docs.iter_mut()) {
                for link in self
                    .semantics
                    .list_for_entity(&prop.property.id, DefinitionOwner::Property)?
                {
                    prop_doc
                        .authoritative_definitions
                        .get_or_insert_with(Vec::new)
                        .push(semantic_document(&link.iri));
                }
            }
        }
        Ok(())
    }

    /// Parses uploaded bytes into a document. Structured media types must
    /// deserialize; anything else becomes a minimal document with the text in
    /// `description.purpose`.
    pub fn parse_upload(&self, bytes: &[u8], media_type: &str) -> Result<ContractDocument> {
        if media_type.contains("json") {
            return serde_json::from_slice(bytes)
                .map_err(|e| Error::validation(format!("invalid JSON document: {e}")));
        }
        if media_type.contains("yaml") || media_type.contains("yml") {
            return serde_yaml::from_slice(bytes)
                .map_err(|e| Error::validation(format!("invalid YAML document: {e}")));
        }

        let text = String::from_utf8_lossy(bytes);
        let purpose = if text.chars().count() > UPLOAD_TEXT_LIMIT {
            let truncated: String = text.chars().take(UPLOAD_TEXT_LIMIT).collect();
            format!("{truncated}...")
        } else {
            text.into_owned()
        };
        Ok(ContractDocument {
            description: Some(DescriptionDocument {
                purpose: Some(purpose),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    /// Checks a decoded document. Non-strict collects warnings and never
    /// blocks; strict fails on the first problem.
    pub fn validate_document(
        &self,
        doc: &ContractDocument,
        strict: bool,
    ) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        let mut note = |report: &mut ValidationReport, message: String| -> Result<()> {
            if strict {
                return Err(Error::validation(message));
            }
            report.warnings.push(message);
            Ok(())
        };

        match &doc.version {
            Some(version) => {
                if validate_semver(version).is_err() {
                    note(
                        &mut report,
                        format!("version '{version}' is not MAJOR.MINOR.PATCH"),
                    )?;
                }
            }
            None => note(&mut report, "document has no version".to_string())?,
        }

        if doc.name.is_none() && doc.data_product.is_none() {
            note(
                &mut report,
                "document has neither name nor dataProduct".to_string(),
            )?;
        }

        for (index, schema) in doc.schema.as_deref().unwrap_or_default().iter().enumerate() {
            if schema.name.is_none() {
                note(&mut report, format!("schema[{index}] has no name"))?;
            }

            let mut pk = HashSet::new();
            let mut partition = HashSet::new();
            for prop in schema.properties.as_deref().unwrap_or_default() {
                if prop.primary_key_position >= 0 && !pk.insert(prop.primary_key_position) {
                    note(
                        &mut report,
                        format!(
                            "schema[{index}] has duplicate primary key position {}",
                            prop.primary_key_position
                        ),
                    )?;
                }
                if prop.partition_key_position >= 0
                    && !partition.insert(prop.partition_key_position)
                {
                    note(
                        &mut report,
                        format!(
                            "schema[{index}] has duplicate partition key position {}",
                            prop.partition_key_position
                        ),
                    )?;
                }
            }

            for check in schema.quality.as_deref().unwrap_or_default() {
                if quality_families(check) > 1 {
                    note(
                        &mut report,
                        format!(
                            "schema[{index}] quality check '{}' has more than one predicate family",
                            check.name.as_deref().unwrap_or("unnamed")
                        ),
                    )?;
                }
            }
        }

        Ok(report)
    }
}

fn definition(owner_kind: DefinitionOwner, owner_id: &str, doc: &DefinitionDocument) -> AuthoritativeDefinition {
    AuthoritativeDefinition {
        id: Uuid::new_v4().to_string(),
        owner_kind,
        owner_id: owner_id.to_string(),
        url: doc.url.clone(),
        definition_type: doc.definition_type.clone(),
    }
}

fn definition_document(def: &AuthoritativeDefinition) -> DefinitionDocument {
    DefinitionDocument {
        url: def.url.clone(),
        definition_type: def.definition_type.clone(),
    }
}

fn semantic_document(iri: &str) -> DefinitionDocument {
    DefinitionDocument {
        url: iri.to_string(),
        definition_type: SEMANTIC_ASSIGNMENT_TYPE.to_string(),
    }
}

fn encode_schema(schema: &SchemaTree) -> SchemaDocument {
    let property_names: HashMap<&str, &str> = schema
        .properties
        .iter()
        .map(|pt| (pt.property.id.as_str(), pt.property.name.as_str()))
        .collect();

    SchemaDocument {
        name: Some(schema.object.name.clone()),
        physical_name: schema.object.physical_name.clone(),
        business_name: schema.object.business_name.clone(),
        physical_type: schema.object.physical_type.clone(),
        description: schema.object.description.clone(),
        data_granularity_description: schema.object.data_granularity_description.clone(),
        tags: (!schema.object.tags.is_empty()).then(|| schema.object.tags.clone()),
        properties: (!schema.properties.is_empty())
            .then(|| schema.properties.iter().map(encode_property).collect()),
        quality: (!schema.quality.is_empty()).then(|| {
            schema
                .quality
                .iter()
                .map(|check| encode_quality(check, &property_names))
                .collect()
        }),
        authoritative_definitions: (!schema.definitions.is_empty())
            .then(|| schema.definitions.iter().map(definition_document).collect()),
        custom_properties: None,
    }
}

fn encode_property(pt: &PropertyTree) -> PropertyDocument {
    let p = &pt.property;
    PropertyDocument {
        name: Some(p.name.clone()),
        logical_type: p.logical_type.clone(),
        physical_type: p.physical_type.clone(),
        required: Some(p.required),
        unique: Some(p.unique),
        // Sentinels stay explicit on the wire even for non-key columns
        primary_key: p.primary_key_position >= 0,
        primary_key_position: p.primary_key_position,
        partitioned: p.partitioned,
        partition_key_position: p.partition_key_position,
        classification: p.classification.clone(),
        encrypted_name: p.encrypted_name.clone(),
        transform_logic: p.transform_logic.clone(),
        transform_source_objects: (!p.transform_source_objects.is_empty())
            .then(|| p.transform_source_objects.clone()),
        transform_description: p.transform_description.clone(),
        examples: (!p.examples.is_empty()).then(|| p.examples.clone()),
        critical_data_element: Some(p.critical_data_element),
        logical_type_options: p.constraints.clone(),
        tags: Vec::new(),
        authoritative_definitions: (!pt.definitions.is_empty())
            .then(|| pt.definitions.iter().map(definition_document).collect()),
    }
}

fn encode_quality(check: &QualityCheck, property_names: &HashMap<&str, &str>) -> QualityDocument {
    QualityDocument {
        rule: check.rule.clone(),
        name: check.name.clone(),
        description: check.description.clone(),
        dimension: check.dimension.clone(),
        business_impact: check.business_impact.clone(),
        severity: check.severity.clone(),
        check_type: check.check_type.clone(),
        query: check.query.clone(),
        schedule: check.schedule.clone(),
        scheduler: check.scheduler.clone(),
        property: check
            .property_id
            .as_deref()
            .and_then(|id| property_names.get(id))
            .map(|name| name.to_string()),
        must_be: check.predicates.must_be.clone(),
        must_not_be: check.predicates.must_not_be.clone(),
        must_be_gt: check.predicates.must_be_gt.clone(),
        must_be_ge: check.predicates.must_be_ge.clone(),
        must_be_lt: check.predicates.must_be_lt.clone(),
        must_be_le: check.predicates.must_be_le.clone(),
        must_be_between_min: check.predicates.must_be_between_min.clone(),
        must_be_between_max: check.predicates.must_be_between_max.clone(),
    }
}

fn quality_families(check: &QualityDocument) -> usize {
    let between = check.must_be_between_min.is_some() || check.must_be_between_max.is_some();
    [
        check.must_be.is_some(),
        check.must_not_be.is_some(),
        check.must_be_gt.is_some(),
        check.must_be_ge.is_some(),
        check.must_be_lt.is_some(),
        check.must_be_le.is_some(),
        between,
    ]
    .iter()
    .filter(|b| **b)
    .count()
}

/// Stores wire values as text; numbers keep their literal form.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Re-emits numeric-looking stored text as a number, int before float.
fn text_to_value(text: &str) -> Value {
    if let Ok(n) = text.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = text.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(text.to_string())
}
