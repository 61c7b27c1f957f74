pub const SCHEMA: &str = r#"
-- Root governed entity
CREATE TABLE IF NOT EXISTS contracts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    kind TEXT,
    api_version TEXT,
    tenant TEXT,
    team_id TEXT,
    data_product TEXT,
    domain_id TEXT,
    sla_default_element TEXT,

    -- Free-text description block
    usage TEXT,
    purpose TEXT,
    limitations TEXT,

    published INTEGER NOT NULL DEFAULT 0,

    -- Version family key; versions sharing it are siblings
    base_name TEXT,
    -- Lineage pointer, non-owning
    parent_contract_id TEXT REFERENCES contracts(id) ON DELETE SET NULL,

    created_by TEXT,
    updated_by TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS schema_objects (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    physical_name TEXT,
    business_name TEXT,
    physical_type TEXT,
    description TEXT,
    data_granularity_description TEXT,
    tags TEXT  -- JSON array
);

CREATE TABLE IF NOT EXISTS schema_properties (
    id TEXT PRIMARY KEY,
    schema_object_id TEXT NOT NULL REFERENCES schema_objects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    logical_type TEXT,
    physical_type TEXT,
    required INTEGER NOT NULL DEFAULT 0,
    is_unique INTEGER NOT NULL DEFAULT 0,
    partitioned INTEGER NOT NULL DEFAULT 0,

    -- -1 means "not a key / partition column"
    primary_key_position INTEGER NOT NULL DEFAULT -1,
    partition_key_position INTEGER NOT NULL DEFAULT -1,

    classification TEXT,
    encrypted_name TEXT,
    transform_logic TEXT,
    transform_source_objects TEXT,  -- JSON array
    transform_description TEXT,
    examples TEXT,                  -- JSON array
    critical_data_element INTEGER NOT NULL DEFAULT 0,
    constraints TEXT                -- JSON blob keyed by logical type
);

CREATE TABLE IF NOT EXISTS quality_checks (
    id TEXT PRIMARY KEY,
    schema_object_id TEXT NOT NULL REFERENCES schema_objects(id) ON DELETE CASCADE,
    property_id TEXT REFERENCES schema_properties(id) ON DELETE CASCADE,
    level TEXT NOT NULL DEFAULT 'object',  -- 'object' | 'property'
    rule TEXT,
    name TEXT,
    description TEXT,
    dimension TEXT,
    business_impact TEXT,
    severity TEXT,
    check_type TEXT,  -- 'library' | 'custom'
    query TEXT,
    schedule TEXT,
    scheduler TEXT,

    -- Comparison predicates, JSON-encoded scalars; at most one family set
    must_be TEXT,
    must_not_be TEXT,
    must_be_gt TEXT,
    must_be_ge TEXT,
    must_be_lt TEXT,
    must_be_le TEXT,
    must_be_between_min TEXT,
    must_be_between_max TEXT
);

CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS roles (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    role TEXT NOT NULL,
    access TEXT,
    first_level_approvers TEXT,
    second_level_approvers TEXT,
    custom_properties TEXT  -- JSON array of {property, value}
);

CREATE TABLE IF NOT EXISTS team_members (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    username TEXT,
    role TEXT,
    date_in TEXT,
    date_out TEXT,
    replaced_by_username TEXT
);

CREATE TABLE IF NOT EXISTS servers (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    server TEXT,
    server_type TEXT,
    environment TEXT,
    description TEXT
);

-- Connection parameters, one row per key
CREATE TABLE IF NOT EXISTS server_properties (
    id TEXT PRIMARY KEY,
    server_id TEXT NOT NULL REFERENCES servers(id) ON DELETE CASCADE,
    key TEXT NOT NULL,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS support_channels (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    channel TEXT,
    url TEXT,
    description TEXT,
    tool TEXT,
    scope TEXT,
    invitation_url TEXT
);

-- At most one row per contract
CREATE TABLE IF NOT EXISTS pricing (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL UNIQUE REFERENCES contracts(id) ON DELETE CASCADE,
    amount TEXT,
    currency TEXT,
    unit TEXT
);

CREATE TABLE IF NOT EXISTS sla_properties (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    property TEXT NOT NULL,
    value TEXT,
    value_ext TEXT,
    unit TEXT,
    element TEXT,
    driver TEXT
);

CREATE TABLE IF NOT EXISTS custom_properties (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    property TEXT NOT NULL,
    value TEXT  -- JSON-encoded scalar
);

-- One generic relation for all three owner levels; owner_id has no FK, so
-- contract deletion cleans these up manually inside the same transaction
CREATE TABLE IF NOT EXISTS authoritative_definitions (
    id TEXT PRIMARY KEY,
    owner_kind TEXT NOT NULL CHECK (owner_kind IN ('contract', 'schema', 'property')),
    owner_id TEXT NOT NULL,
    url TEXT NOT NULL,
    definition_type TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiling_runs (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    source_tag TEXT,
    schema_names TEXT NOT NULL,  -- JSON array
    status TEXT NOT NULL DEFAULT 'pending',
    external_run_id TEXT,
    triggered_by TEXT,
    summary TEXT,
    error_message TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Suggestions are never deleted; review flips status
CREATE TABLE IF NOT EXISTS suggested_quality_checks (
    id TEXT PRIMARY KEY,
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    run_id TEXT REFERENCES profiling_runs(id) ON DELETE SET NULL,
    schema_name TEXT NOT NULL,
    property_name TEXT,
    level TEXT NOT NULL DEFAULT 'object',
    rule TEXT,
    name TEXT,
    description TEXT,
    dimension TEXT,
    business_impact TEXT,
    severity TEXT,
    check_type TEXT,
    query TEXT,
    schedule TEXT,
    scheduler TEXT,
    must_be TEXT,
    must_not_be TEXT,
    must_be_gt TEXT,
    must_be_ge TEXT,
    must_be_lt TEXT,
    must_be_le TEXT,
    must_be_between_min TEXT,
    must_be_between_max TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    confidence REAL,
    rationale TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Outstanding workflow requests awaiting a response action
CREATE TABLE IF NOT EXISTS pending_requests (
    contract_id TEXT NOT NULL REFERENCES contracts(id) ON DELETE CASCADE,
    action_type TEXT NOT NULL,
    requester TEXT NOT NULL,
    requested_at TEXT DEFAULT (datetime('now')),
    PRIMARY KEY (contract_id, action_type)
);

CREATE INDEX IF NOT EXISTS idx_contracts_base_name ON contracts(base_name);
CREATE INDEX IF NOT EXISTS idx_contracts_parent ON contracts(parent_contract_id);
CREATE INDEX IF NOT EXISTS idx_schema_objects_contract ON schema_objects(contract_id);
CREATE INDEX IF NOT EXISTS idx_schema_properties_object ON schema_properties(schema_object_id);
CREATE INDEX IF NOT EXISTS idx_quality_checks_object ON quality_checks(schema_object_id);
CREATE INDEX IF NOT EXISTS idx_tags_contract ON tags(contract_id);
CREATE INDEX IF NOT EXISTS idx_roles_contract ON roles(contract_id);
CREATE INDEX IF NOT EXISTS idx_team_members_contract ON team_members(contract_id);
CREATE INDEX IF NOT EXISTS idx_servers_contract ON servers(contract_id);
CREATE INDEX IF NOT EXISTS idx_server_properties_server ON server_properties(server_id);
CREATE INDEX IF NOT EXISTS idx_support_channels_contract ON support_channels(contract_id);
CREATE INDEX IF NOT EXISTS idx_sla_properties_contract ON sla_properties(contract_id);
CREATE INDEX IF NOT EXISTS idx_custom_properties_contract ON custom_properties(contract_id);
CREATE INDEX IF NOT EXISTS idx_authoritative_definitions_owner ON authoritative_definitions(owner_id);
CREATE INDEX IF NOT EXISTS idx_profiling_runs_contract ON profiling_runs(contract_id);
CREATE INDEX IF NOT EXISTS idx_suggestions_contract ON suggested_quality_checks(contract_id);
CREATE INDEX IF NOT EXISTS idx_suggestions_run ON suggested_quality_checks(run_id);
"#;
