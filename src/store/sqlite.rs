use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;
use uuid::Uuid;

use super::schema::SCHEMA;
use super::{AcceptOutcome, Store};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// An in-memory store, used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn json_string_vec(s: Option<String>) -> Vec<String> {
    s.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn json_value_vec(s: Option<String>) -> Vec<Value> {
    s.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn json_value(s: Option<String>) -> Option<Value> {
    s.and_then(|s| serde_json::from_str(&s).ok())
}

fn string_vec_json(v: &[String]) -> Option<String> {
    if v.is_empty() {
        None
    } else {
        serde_json::to_string(v).ok()
    }
}

fn value_vec_json(v: &[Value]) -> Option<String> {
    if v.is_empty() {
        None
    } else {
        serde_json::to_string(v).ok()
    }
}

fn value_json(v: Option<&Value>) -> Option<String> {
    v.and_then(|v| serde_json::to_string(v).ok())
}

fn pairs_json(pairs: &[CustomPair]) -> Option<String> {
    if pairs.is_empty() {
        None
    } else {
        serde_json::to_string(pairs).ok()
    }
}

fn json_pairs(s: Option<String>) -> Vec<CustomPair> {
    s.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

/// Builds "?1, ?2, ..., ?n" for dynamic IN clauses.
fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

const CONTRACT_COLS: &str = "id, name, version, status, kind, api_version, tenant, team_id, \
     data_product, domain_id, sla_default_element, usage, purpose, limitations, published, \
     base_name, parent_contract_id, created_by, updated_by, created_at, updated_at";

fn map_contract(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contract> {
    Ok(Contract {
        id: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        status: row.get(3)?,
        kind: row.get(4)?,
        api_version: row.get(5)?,
        tenant: row.get(6)?,
        team_id: row.get(7)?,
        data_product: row.get(8)?,
        domain_id: row.get(9)?,
        sla_default_element: row.get(10)?,
        usage: row.get(11)?,
        purpose: row.get(12)?,
        limitations: row.get(13)?,
        published: row.get(14)?,
        base_name: row.get(15)?,
        parent_contract_id: row.get(16)?,
        created_by: row.get(17)?,
        updated_by: row.get(18)?,
        created_at: parse_datetime(&row.get::<_, String>(19)?),
        updated_at: parse_datetime(&row.get::<_, String>(20)?),
    })
}

fn insert_contract_row(conn: &Connection, c: &Contract) -> Result<()> {
    conn.execute(
        "INSERT INTO contracts (id, name, version, status, kind, api_version, tenant, team_id, \
         data_product, domain_id, sla_default_element, usage, purpose, limitations, published, \
         base_name, parent_contract_id, created_by, updated_by, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
        params![
            c.id,
            c.name,
            c.version,
            c.status,
            c.kind,
            c.api_version,
            c.tenant,
            c.team_id,
            c.data_product,
            c.domain_id,
            c.sla_default_element,
            c.usage,
            c.purpose,
            c.limitations,
            c.published,
            c.base_name,
            c.parent_contract_id,
            c.created_by,
            c.updated_by,
            format_datetime(&c.created_at),
            format_datetime(&c.updated_at),
        ],
    )?;
    Ok(())
}

fn insert_schema_object_row(conn: &Connection, o: &SchemaObject) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_objects (id, contract_id, name, physical_name, business_name, \
         physical_type, description, data_granularity_description, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            o.id,
            o.contract_id,
            o.name,
            o.physical_name,
            o.business_name,
            o.physical_type,
            o.description,
            o.data_granularity_description,
            string_vec_json(&o.tags),
        ],
    )?;
    Ok(())
}

fn insert_property_row(conn: &Connection, p: &SchemaProperty) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_properties (id, schema_object_id, name, logical_type, physical_type, \
         required, is_unique, partitioned, primary_key_position, partition_key_position, \
         classification, encrypted_name, transform_logic, transform_source_objects, \
         transform_description, examples, critical_data_element, constraints)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            p.id,
            p.schema_object_id,
            p.name,
            p.logical_type,
            p.physical_type,
            p.required,
            p.unique,
            p.partitioned,
            p.primary_key_position,
            p.partition_key_position,
            p.classification,
            p.encrypted_name,
            p.transform_logic,
            string_vec_json(&p.transform_source_objects),
            p.transform_description,
            value_vec_json(&p.examples),
            p.critical_data_element,
            value_json(p.constraints.as_ref()),
        ],
    )?;
    Ok(())
}

fn insert_quality_check_row(conn: &Connection, q: &QualityCheck) -> Result<()> {
    conn.execute(
        "INSERT INTO quality_checks (id, schema_object_id, property_id, level, rule, name, \
         description, dimension, business_impact, severity, check_type, query, schedule, scheduler, \
         must_be, must_not_be, must_be_gt, must_be_ge, must_be_lt, must_be_le, \
         must_be_between_min, must_be_between_max)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
        params![
            q.id,
            q.schema_object_id,
            q.property_id,
            q.level.as_str(),
            q.rule,
            q.name,
            q.description,
            q.dimension,
            q.business_impact,
            q.severity,
            q.check_type,
            q.query,
            q.schedule,
            q.scheduler,
            value_json(q.predicates.must_be.as_ref()),
            value_json(q.predicates.must_not_be.as_ref()),
            value_json(q.predicates.must_be_gt.as_ref()),
            value_json(q.predicates.must_be_ge.as_ref()),
            value_json(q.predicates.must_be_lt.as_ref()),
            value_json(q.predicates.must_be_le.as_ref()),
            value_json(q.predicates.must_be_between_min.as_ref()),
            value_json(q.predicates.must_be_between_max.as_ref()),
        ],
    )?;
    Ok(())
}

fn insert_definition_row(conn: &Connection, d: &AuthoritativeDefinition) -> Result<()> {
    conn.execute(
        "INSERT INTO authoritative_definitions (id, owner_kind, owner_id, url, definition_type)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![d.id, d.owner_kind.as_str(), d.owner_id, d.url, d.definition_type],
    )?;
    Ok(())
}

fn map_schema_object(row: &rusqlite::Row<'_>) -> rusqlite::Result<SchemaObject> {
    Ok(SchemaObject {
        id: row.get(0)?,
        contract_id: row.get(1)?,
        name: row.get(2)?,
        physical_name: row.get(3)?,
        business_name: row.get(4)?,
        physical_type: row.get(5)?,
        description: row.get(6)?,
        data_granularity_description: row.get(7)?,
        tags: json_string_vec(row.get(8)?),
    })
}

fn map_property(row: &rusqlite::Row<'_>) -> rusqlite::Result<SchemaProperty> {
    Ok(SchemaProperty {
        id: row.get(0)?,
        schema_object_id: row.get(1)?,
        name: row.get(2)?,
        logical_type: row.get(3)?,
        physical_type: row.get(4)?,
        required: row.get(5)?,
        unique: row.get(6)?,
        partitioned: row.get(7)?,
        primary_key_position: row.get(8)?,
        partition_key_position: row.get(9)?,
        classification: row.get(10)?,
        encrypted_name: row.get(11)?,
        transform_logic: row.get(12)?,
        transform_source_objects: json_string_vec(row.get(13)?),
        transform_description: row.get(14)?,
        examples: json_value_vec(row.get(15)?),
        critical_data_element: row.get(16)?,
        constraints: json_value(row.get(17)?),
    })
}

fn map_quality_check(row: &rusqlite::Row<'_>) -> rusqlite::Result<QualityCheck> {
    Ok(QualityCheck {
        id: row.get(0)?,
        schema_object_id: row.get(1)?,
        property_id: row.get(2)?,
        level: QualityLevel::parse(&row.get::<_, String>(3)?).unwrap_or(QualityLevel::Object),
        rule: row.get(4)?,
        name: row.get(5)?,
        description: row.get(6)?,
        dimension: row.get(7)?,
        business_impact: row.get(8)?,
        severity: row.get(9)?,
        check_type: row.get(10)?,
        query: row.get(11)?,
        schedule: row.get(12)?,
        scheduler: row.get(13)?,
        predicates: QualityPredicates {
            must_be: json_value(row.get(14)?),
            must_not_be: json_value(row.get(15)?),
            must_be_gt: json_value(row.get(16)?),
            must_be_ge: json_value(row.get(17)?),
            must_be_lt: json_value(row.get(18)?),
            must_be_le: json_value(row.get(19)?),
            must_be_between_min: json_value(row.get(20)?),
            must_be_between_max: json_value(row.get(21)?),
        },
    })
}

fn map_definition(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuthoritativeDefinition> {
    Ok(AuthoritativeDefinition {
        id: row.get(0)?,
        owner_kind: DefinitionOwner::parse(&row.get::<_, String>(1)?)
            .unwrap_or(DefinitionOwner::Contract),
        owner_id: row.get(2)?,
        url: row.get(3)?,
        definition_type: row.get(4)?,
    })
}

fn map_profiling_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProfilingRun> {
    Ok(ProfilingRun {
        id: row.get(0)?,
        contract_id: row.get(1)?,
        source_tag: row.get(2)?,
        schema_names: json_string_vec(row.get(3)?),
        status: RunStatus::parse(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Pending),
        external_run_id: row.get(5)?,
        triggered_by: row.get(6)?,
        summary: row.get(7)?,
        error_message: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

const SUGGESTION_COLS: &str = "id, contract_id, run_id, schema_name, property_name, level, rule, \
     name, description, dimension, business_impact, severity, check_type, query, schedule, \
     scheduler, must_be, must_not_be, must_be_gt, must_be_ge, must_be_lt, must_be_le, \
     must_be_between_min, must_be_between_max, status, confidence, rationale, created_at";

fn map_suggestion(row: &rusqlite::Row<'_>) -> rusqlite::Result<SuggestedQualityCheck> {
    Ok(SuggestedQualityCheck {
        id: row.get(0)?,
        contract_id: row.get(1)?,
        run_id: row.get(2)?,
        schema_name: row.get(3)?,
        property_name: row.get(4)?,
        level: QualityLevel::parse(&row.get::<_, String>(5)?).unwrap_or(QualityLevel::Object),
        rule: row.get(6)?,
        name: row.get(7)?,
        description: row.get(8)?,
        dimension: row.get(9)?,
        business_impact: row.get(10)?,
        severity: row.get(11)?,
        check_type: row.get(12)?,
        query: row.get(13)?,
        schedule: row.get(14)?,
        scheduler: row.get(15)?,
        predicates: QualityPredicates {
            must_be: json_value(row.get(16)?),
            must_not_be: json_value(row.get(17)?),
            must_be_gt: json_value(row.get(18)?),
            must_be_ge: json_value(row.get(19)?),
            must_be_lt: json_value(row.get(20)?),
            must_be_le: json_value(row.get(21)?),
            must_be_between_min: json_value(row.get(22)?),
            must_be_between_max: json_value(row.get(23)?),
        },
        status: SuggestionStatus::parse(&row.get::<_, String>(24)?)
            .unwrap_or(SuggestionStatus::Pending),
        confidence: row.get(25)?,
        rationale: row.get(26)?,
        created_at: parse_datetime(&row.get::<_, String>(27)?),
    })
}

fn insert_tree(conn: &Connection, tree: &ContractTree) -> Result<()> {
    insert_contract_row(conn, &tree.contract)?;

    for tag in &tree.tags {
        conn.execute(
            "INSERT INTO tags (id, contract_id, name) VALUES (?1, ?2, ?3)",
            params![tag.id, tag.contract_id, tag.name],
        )?;
    }

    for role in &tree.roles {
        conn.execute(
            "INSERT INTO roles (id, contract_id, role, access, first_level_approvers, \
             second_level_approvers, custom_properties)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                role.id,
                role.contract_id,
                role.role,
                role.access,
                role.first_level_approvers,
                role.second_level_approvers,
                pairs_json(&role.custom_properties),
            ],
        )?;
    }

    for member in &tree.team {
        conn.execute(
            "INSERT INTO team_members (id, contract_id, username, role, date_in, date_out, \
             replaced_by_username)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                member.id,
                member.contract_id,
                member.username,
                member.role,
                member.date_in,
                member.date_out,
                member.replaced_by_username,
            ],
        )?;
    }

    for st in &tree.servers {
        conn.execute(
            "INSERT INTO servers (id, contract_id, server, server_type, environment, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                st.server.id,
                st.server.contract_id,
                st.server.server,
                st.server.server_type,
                st.server.environment,
                st.server.description,
            ],
        )?;
        for prop in &st.properties {
            conn.execute(
                "INSERT INTO server_properties (id, server_id, key, value) VALUES (?1, ?2, ?3, ?4)",
                params![prop.id, prop.server_id, prop.key, prop.value],
            )?;
        }
    }

    for channel in &tree.support {
        conn.execute(
            "INSERT INTO support_channels (id, contract_id, channel, url, description, tool, \
             scope, invitation_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                channel.id,
                channel.contract_id,
                channel.channel,
                channel.url,
                channel.description,
                channel.tool,
                channel.scope,
                channel.invitation_url,
            ],
        )?;
    }

    if let Some(pricing) = &tree.pricing {
        conn.execute(
            "INSERT INTO pricing (id, contract_id, amount, currency, unit) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pricing.id,
                pricing.contract_id,
                pricing.amount,
                pricing.currency,
                pricing.unit,
            ],
        )?;
    }

    for sla in &tree.sla_properties {
        conn.execute(
            "INSERT INTO sla_properties (id, contract_id, property, value, value_ext, unit, \
             element, driver)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                sla.id,
                sla.contract_id,
                sla.property,
                sla.value,
                sla.value_ext,
                sla.unit,
                sla.element,
                sla.driver,
            ],
        )?;
    }

    for cp in &tree.custom_properties {
        conn.execute(
            "INSERT INTO custom_properties (id, contract_id, property, value) VALUES (?1, ?2, ?3, ?4)",
            params![cp.id, cp.contract_id, cp.property, value_json(cp.value.as_ref())],
        )?;
    }

    for def in &tree.definitions {
        insert_definition_row(conn, def)?;
    }

    for schema in &tree.schemas {
        insert_schema_object_row(conn, &schema.object)?;
        for pt in &schema.properties {
            insert_property_row(conn, &pt.property)?;
            for def in &pt.definitions {
                insert_definition_row(conn, def)?;
            }
        }
        for check in &schema.quality {
            insert_quality_check_row(conn, check)?;
        }
        for def in &schema.definitions {
            insert_definition_row(conn, def)?;
        }
    }

    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Contract operations

    fn create_contract(&self, contract: &Contract) -> Result<()> {
        insert_contract_row(&self.conn(), contract)
    }

    fn get_contract(&self, id: &str) -> Result<Option<Contract>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {CONTRACT_COLS} FROM contracts WHERE id = ?1"),
            params![id],
            map_contract,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_contracts(&self) -> Result<Vec<Contract>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTRACT_COLS} FROM contracts ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map([], map_contract)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_contract(&self, contract: &Contract) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE contracts SET name = ?1, version = ?2, status = ?3, kind = ?4, \
             api_version = ?5, tenant = ?6, team_id = ?7, data_product = ?8, domain_id = ?9, \
             sla_default_element = ?10, usage = ?11, purpose = ?12, limitations = ?13, \
             published = ?14, base_name = ?15, updated_by = ?16, updated_at = ?17 WHERE id = ?18",
            params![
                contract.name,
                contract.version,
                contract.status,
                contract.kind,
                contract.api_version,
                contract.tenant,
                contract.team_id,
                contract.data_product,
                contract.domain_id,
                contract.sla_default_element,
                contract.usage,
                contract.purpose,
                contract.limitations,
                contract.published,
                contract.base_name,
                contract.updated_by,
                format_datetime(&Utc::now()),
                contract.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("contract"));
        }
        Ok(())
    }

    fn delete_contract(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let schema_ids: Vec<String> = {
            let mut stmt = tx.prepare("SELECT id FROM schema_objects WHERE contract_id = ?1")?;
            let rows = stmt.query_map(params![id], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let property_ids: Vec<String> = if schema_ids.is_empty() {
            Vec::new()
        } else {
            let sql = format!(
                "SELECT id FROM schema_properties WHERE schema_object_id IN ({})",
                placeholders(schema_ids.len())
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(schema_ids.iter()), |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        // Definitions have no FK to their owners, so clean up all three levels
        let mut owner_ids = vec![id.to_string()];
        owner_ids.extend(schema_ids);
        owner_ids.extend(property_ids);
        let sql = format!(
            "DELETE FROM authoritative_definitions WHERE owner_id IN ({})",
            placeholders(owner_ids.len())
        );
        tx.execute(&sql, params_from_iter(owner_ids.iter()))?;

        let rows = tx.execute("DELETE FROM contracts WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(rows > 0)
    }

    fn contract_id_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM contracts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn update_contract_status(&self, id: &str, status: &str, updated_by: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE contracts SET status = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?4",
            params![status, updated_by, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::not_found("contract"));
        }
        Ok(())
    }

    fn set_published(&self, id: &str, published: bool, updated_by: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE contracts SET published = ?1, updated_by = ?2, updated_at = ?3 WHERE id = ?4",
            params![published, updated_by, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::not_found("contract"));
        }
        Ok(())
    }

    // Deep fetch / deep insert

    fn get_contract_tree(&self, id: &str) -> Result<Option<ContractTree>> {
        let conn = self.conn();

        let Some(contract) = conn
            .query_row(
                &format!("SELECT {CONTRACT_COLS} FROM contracts WHERE id = ?1"),
                params![id],
                map_contract,
            )
            .optional()?
        else {
            return Ok(None);
        };

        let tags = {
            let mut stmt =
                conn.prepare("SELECT id, contract_id, name FROM tags WHERE contract_id = ?1 ORDER BY name")?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(Tag {
                    id: row.get(0)?,
                    contract_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let roles = {
            let mut stmt = conn.prepare(
                "SELECT id, contract_id, role, access, first_level_approvers, \
                 second_level_approvers, custom_properties FROM roles WHERE contract_id = ?1 ORDER BY role",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(Role {
                    id: row.get(0)?,
                    contract_id: row.get(1)?,
                    role: row.get(2)?,
                    access: row.get(3)?,
                    first_level_approvers: row.get(4)?,
                    second_level_approvers: row.get(5)?,
                    custom_properties: json_pairs(row.get(6)?),
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let team = {
            let mut stmt = conn.prepare(
                "SELECT id, contract_id, username, role, date_in, date_out, replaced_by_username \
                 FROM team_members WHERE contract_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(TeamMember {
                    id: row.get(0)?,
                    contract_id: row.get(1)?,
                    username: row.get(2)?,
                    role: row.get(3)?,
                    date_in: row.get(4)?,
                    date_out: row.get(5)?,
                    replaced_by_username: row.get(6)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let servers: Vec<Server> = {
            let mut stmt = conn.prepare(
                "SELECT id, contract_id, server, server_type, environment, description \
                 FROM servers WHERE contract_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(Server {
                    id: row.get(0)?,
                    contract_id: row.get(1)?,
                    server: row.get(2)?,
                    server_type: row.get(3)?,
                    environment: row.get(4)?,
                    description: row.get(5)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        // Batch-load server properties for the whole server set
        let mut server_props: HashMap<String, Vec<ServerProperty>> = HashMap::new();
        if !servers.is_empty() {
            let ids: Vec<&String> = servers.iter().map(|s| &s.id).collect();
            let sql = format!(
                "SELECT id, server_id, key, value FROM server_properties WHERE server_id IN ({}) ORDER BY key",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
                Ok(ServerProperty {
                    id: row.get(0)?,
                    server_id: row.get(1)?,
                    key: row.get(2)?,
                    value: row.get(3)?,
                })
            })?;
            for prop in rows {
                let prop = prop?;
                server_props
                    .entry(prop.server_id.clone())
                    .or_default()
                    .push(prop);
            }
        }
        let servers = servers
            .into_iter()
            .map(|server| {
                let properties = server_props.remove(&server.id).unwrap_or_default();
                ServerTree { server, properties }
            })
            .collect();

        let support = {
            let mut stmt = conn.prepare(
                "SELECT id, contract_id, channel, url, description, tool, scope, invitation_url \
                 FROM support_channels WHERE contract_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(SupportChannel {
                    id: row.get(0)?,
                    contract_id: row.get(1)?,
                    channel: row.get(2)?,
                    url: row.get(3)?,
                    description: row.get(4)?,
                    tool: row.get(5)?,
                    scope: row.get(6)?,
                    invitation_url: row.get(7)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let pricing = conn
            .query_row(
                "SELECT id, contract_id, amount, currency, unit FROM pricing WHERE contract_id = ?1",
                params![id],
                |row| {
                    Ok(Pricing {
                        id: row.get(0)?,
                        contract_id: row.get(1)?,
                        amount: row.get(2)?,
                        currency: row.get(3)?,
                        unit: row.get(4)?,
                    })
                },
            )
            .optional()?;

        let sla_properties = {
            let mut stmt = conn.prepare(
                "SELECT id, contract_id, property, value, value_ext, unit, element, driver \
                 FROM sla_properties WHERE contract_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(SlaProperty {
                    id: row.get(0)?,
                    contract_id: row.get(1)?,
                    property: row.get(2)?,
                    value: row.get(3)?,
                    value_ext: row.get(4)?,
                    unit: row.get(5)?,
                    element: row.get(6)?,
                    driver: row.get(7)?,
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let custom_properties = {
            let mut stmt = conn.prepare(
                "SELECT id, contract_id, property, value FROM custom_properties WHERE contract_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], |row| {
                Ok(CustomProperty {
                    id: row.get(0)?,
                    contract_id: row.get(1)?,
                    property: row.get(2)?,
                    value: json_value(row.get(3)?),
                })
            })?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let objects: Vec<SchemaObject> = {
            let mut stmt = conn.prepare(
                "SELECT id, contract_id, name, physical_name, business_name, physical_type, \
                 description, data_granularity_description, tags \
                 FROM schema_objects WHERE contract_id = ?1",
            )?;
            let rows = stmt.query_map(params![id], map_schema_object)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut properties_by_object: HashMap<String, Vec<SchemaProperty>> = HashMap::new();
        let mut quality_by_object: HashMap<String, Vec<QualityCheck>> = HashMap::new();
        let mut property_ids: Vec<String> = Vec::new();
        if !objects.is_empty() {
            let ids: Vec<&String> = objects.iter().map(|o| &o.id).collect();

            let sql = format!(
                "SELECT id, schema_object_id, name, logical_type, physical_type, required, \
                 is_unique, partitioned, primary_key_position, partition_key_position, \
                 classification, encrypted_name, transform_logic, transform_source_objects, \
                 transform_description, examples, critical_data_element, constraints \
                 FROM schema_properties WHERE schema_object_id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(ids.iter()), map_property)?;
            for prop in rows {
                let prop = prop?;
                property_ids.push(prop.id.clone());
                properties_by_object
                    .entry(prop.schema_object_id.clone())
                    .or_default()
                    .push(prop);
            }

            let sql = format!(
                "SELECT id, schema_object_id, property_id, level, rule, name, description, \
                 dimension, business_impact, severity, check_type, query, schedule, scheduler, \
                 must_be, must_not_be, must_be_gt, must_be_ge, must_be_lt, must_be_le, \
                 must_be_between_min, must_be_between_max \
                 FROM quality_checks WHERE schema_object_id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(ids.iter()), map_quality_check)?;
            for check in rows {
                let check = check?;
                quality_by_object
                    .entry(check.schema_object_id.clone())
                    .or_default()
                    .push(check);
            }
        }

        // One query covers definitions at all three owner levels
        let mut definitions_by_owner: HashMap<String, Vec<AuthoritativeDefinition>> =
            HashMap::new();
        {
            let mut owner_ids: Vec<String> = vec![id.to_string()];
            owner_ids.extend(objects.iter().map(|o| o.id.clone()));
            owner_ids.extend(property_ids.iter().cloned());
            let sql = format!(
                "SELECT id, owner_kind, owner_id, url, definition_type \
                 FROM authoritative_definitions WHERE owner_id IN ({})",
                placeholders(owner_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(owner_ids.iter()), map_definition)?;
            for def in rows {
                let def = def?;
                definitions_by_owner
                    .entry(def.owner_id.clone())
                    .or_default()
                    .push(def);
            }
        }

        let schemas = objects
            .into_iter()
            .map(|object| {
                let properties = properties_by_object
                    .remove(&object.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|property| {
                        let definitions = definitions_by_owner
                            .remove(&property.id)
                            .unwrap_or_default();
                        PropertyTree {
                            property,
                            definitions,
                        }
                    })
                    .collect();
                let quality = quality_by_object.remove(&object.id).unwrap_or_default();
                let definitions = definitions_by_owner.remove(&object.id).unwrap_or_default();
                SchemaTree {
                    object,
                    properties,
                    quality,
                    definitions,
                }
            })
            .collect();

        let definitions = definitions_by_owner.remove(id).unwrap_or_default();

        Ok(Some(ContractTree {
            contract,
            tags,
            roles,
            team,
            servers,
            support,
            pricing,
            sla_properties,
            custom_properties,
            definitions,
            schemas,
        }))
    }

    fn insert_contract_tree(&self, tree: &ContractTree) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        insert_tree(&tx, tree)?;
        tx.commit()?;
        Ok(())
    }

    // Version family queries

    fn list_contracts_by_base_name(&self, base_name: &str) -> Result<Vec<Contract>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTRACT_COLS} FROM contracts WHERE base_name = ?1 ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map(params![base_name], map_contract)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_contract_children(&self, parent_id: &str) -> Result<Vec<Contract>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONTRACT_COLS} FROM contracts WHERE parent_contract_id = ?1 ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map(params![parent_id], map_contract)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Schema lookups

    fn list_schema_objects(&self, contract_id: &str) -> Result<Vec<SchemaObject>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, contract_id, name, physical_name, business_name, physical_type, \
             description, data_granularity_description, tags \
             FROM schema_objects WHERE contract_id = ?1",
        )?;
        let rows = stmt.query_map(params![contract_id], map_schema_object)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Profiling runs

    fn create_profiling_run(&self, run: &ProfilingRun) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiling_runs (id, contract_id, source_tag, schema_names, status, \
             external_run_id, triggered_by, summary, error_message, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run.id,
                run.contract_id,
                run.source_tag,
                serde_json::to_string(&run.schema_names).unwrap_or_else(|_| "[]".to_string()),
                run.status.as_str(),
                run.external_run_id,
                run.triggered_by,
                run.summary,
                run.error_message,
                format_datetime(&run.created_at),
                format_datetime(&run.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_profiling_run(&self, id: &str) -> Result<Option<ProfilingRun>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, contract_id, source_tag, schema_names, status, external_run_id, \
             triggered_by, summary, error_message, created_at, updated_at \
             FROM profiling_runs WHERE id = ?1",
            params![id],
            map_profiling_run,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_profiling_runs(&self, contract_id: &str) -> Result<Vec<ProfilingRun>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, contract_id, source_tag, schema_names, status, external_run_id, \
             triggered_by, summary, error_message, created_at, updated_at \
             FROM profiling_runs WHERE contract_id = ?1 ORDER BY created_at DESC, id",
        )?;
        let rows = stmt.query_map(params![contract_id], map_profiling_run)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_profiling_run(&self, run: &ProfilingRun) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE profiling_runs SET status = ?1, external_run_id = ?2, summary = ?3, \
             error_message = ?4, updated_at = ?5 WHERE id = ?6",
            params![
                run.status.as_str(),
                run.external_run_id,
                run.summary,
                run.error_message,
                format_datetime(&Utc::now()),
                run.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("profiling run"));
        }
        Ok(())
    }

    // Suggested quality checks

    fn create_suggestions(&self, suggestions: &[SuggestedQualityCheck]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for s in suggestions {
            tx.execute(
                &format!(
                    "INSERT INTO suggested_quality_checks ({SUGGESTION_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                     ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)"
                ),
                params![
                    s.id,
                    s.contract_id,
                    s.run_id,
                    s.schema_name,
                    s.property_name,
                    s.level.as_str(),
                    s.rule,
                    s.name,
                    s.description,
                    s.dimension,
                    s.business_impact,
                    s.severity,
                    s.check_type,
                    s.query,
                    s.schedule,
                    s.scheduler,
                    value_json(s.predicates.must_be.as_ref()),
                    value_json(s.predicates.must_not_be.as_ref()),
                    value_json(s.predicates.must_be_gt.as_ref()),
                    value_json(s.predicates.must_be_ge.as_ref()),
                    value_json(s.predicates.must_be_lt.as_ref()),
                    value_json(s.predicates.must_be_le.as_ref()),
                    value_json(s.predicates.must_be_between_min.as_ref()),
                    value_json(s.predicates.must_be_between_max.as_ref()),
                    s.status.as_str(),
                    s.confidence,
                    s.rationale,
                    format_datetime(&s.created_at),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_suggestions(&self, contract_id: &str) -> Result<Vec<SuggestedQualityCheck>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUGGESTION_COLS} FROM suggested_quality_checks WHERE contract_id = ?1 \
             ORDER BY created_at DESC, id"
        ))?;
        let rows = stmt.query_map(params![contract_id], map_suggestion)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn accept_suggestions(
        &self,
        contract_id: &str,
        ids: &[String],
        new_version: Option<&str>,
    ) -> Result<AcceptOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let schema_ids: HashMap<String, String> = {
            let mut stmt = tx.prepare("SELECT name, id FROM schema_objects WHERE contract_id = ?1")?;
            let rows = stmt.query_map(params![contract_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            rows.collect::<std::result::Result<HashMap<_, _>, _>>()?
        };

        let mut outcome = AcceptOutcome::default();
        let mut seen: HashSet<&String> = HashSet::new();
        let mut ordered: Vec<&String> = Vec::with_capacity(ids.len());
        for id in ids {
            if seen.insert(id) {
                ordered.push(id);
            }
        }

        for suggestion_id in ordered {
            let suggestion = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {SUGGESTION_COLS} FROM suggested_quality_checks \
                     WHERE id = ?1 AND contract_id = ?2 AND status = 'pending'"
                ))?;
                stmt.query_row(params![suggestion_id, contract_id], map_suggestion)
                    .optional()?
            };
            let Some(suggestion) = suggestion else {
                continue;
            };

            let Some(schema_object_id) = schema_ids.get(&suggestion.schema_name) else {
                outcome.skipped_unknown_schema.push(suggestion.id);
                continue;
            };

            let property_id: Option<String> = match &suggestion.property_name {
                Some(property_name) => tx
                    .query_row(
                        "SELECT id FROM schema_properties WHERE schema_object_id = ?1 AND name = ?2",
                        params![schema_object_id, property_name],
                        |row| row.get(0),
                    )
                    .optional()?,
                None => None,
            };

            let check = QualityCheck {
                id: Uuid::new_v4().to_string(),
                schema_object_id: schema_object_id.clone(),
                property_id,
                level: suggestion.level,
                rule: suggestion.rule.clone(),
                name: suggestion.name.clone(),
                description: suggestion.description.clone(),
                dimension: suggestion.dimension.clone(),
                business_impact: suggestion.business_impact.clone(),
                severity: suggestion.severity.clone(),
                check_type: suggestion.check_type.clone(),
                query: suggestion.query.clone(),
                schedule: suggestion.schedule.clone(),
                scheduler: suggestion.scheduler.clone(),
                predicates: suggestion.predicates.clone(),
            };
            insert_quality_check_row(&tx, &check)?;

            tx.execute(
                "UPDATE suggested_quality_checks SET status = 'accepted' WHERE id = ?1",
                params![suggestion.id],
            )?;
            outcome.accepted.push(suggestion.id);
        }

        if let Some(version) = new_version {
            tx.execute(
                "UPDATE contracts SET version = ?1, updated_at = ?2 WHERE id = ?3",
                params![version, format_datetime(&Utc::now()), contract_id],
            )?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn reject_suggestions(&self, contract_id: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn();
        let sql = format!(
            "UPDATE suggested_quality_checks SET status = 'rejected' \
             WHERE contract_id = ?1 AND status = 'pending' AND id IN ({})",
            (2..=ids.len() + 1)
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut values: Vec<&str> = vec![contract_id];
        values.extend(ids.iter().map(String::as_str));
        let rows = conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(rows)
    }

    // Pending workflow requests

    fn upsert_pending_request(&self, request: &PendingRequest) -> Result<()> {
        self.conn().execute(
            "INSERT INTO pending_requests (contract_id, action_type, requester, requested_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (contract_id, action_type) DO UPDATE SET
                requester = excluded.requester,
                requested_at = excluded.requested_at",
            params![
                request.contract_id,
                request.action_type,
                request.requester,
                format_datetime(&request.requested_at),
            ],
        )?;
        Ok(())
    }

    fn get_pending_request(
        &self,
        contract_id: &str,
        action_type: &str,
    ) -> Result<Option<PendingRequest>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT contract_id, action_type, requester, requested_at \
             FROM pending_requests WHERE contract_id = ?1 AND action_type = ?2",
            params![contract_id, action_type],
            |row| {
                Ok(PendingRequest {
                    contract_id: row.get(0)?,
                    action_type: row.get(1)?,
                    requester: row.get(2)?,
                    requested_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn clear_pending_request(&self, contract_id: &str, action_type: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM pending_requests WHERE contract_id = ?1 AND action_type = ?2",
            params![contract_id, action_type],
        )?;
        Ok(rows > 0)
    }
}
