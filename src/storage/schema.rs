//! Database schema definitions.
//!
//! The mirror is four entities (sync configs, work items, comments, run
//! history) plus the audit event log.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the epicsync database.
///
/// Note: Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Sync Configs
-- ====================

CREATE TABLE IF NOT EXISTS sync_configs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    epic_id INTEGER NOT NULL CHECK (epic_id > 0),
    organization TEXT NOT NULL,
    project TEXT NOT NULL,
    last_synced INTEGER,
    created_at INTEGER NOT NULL,
    completed_runs INTEGER NOT NULL DEFAULT 0
);

-- ====================
-- Mirrored Work Items
-- ====================

CREATE TABLE IF NOT EXISTS work_items (
    sync_config_id INTEGER NOT NULL REFERENCES sync_configs(id) ON DELETE CASCADE,
    id INTEGER NOT NULL,
    rev INTEGER NOT NULL CHECK (rev >= 0),
    title TEXT NOT NULL,
    work_item_type TEXT NOT NULL,
    state TEXT NOT NULL,
    assigned_to TEXT,
    description TEXT,
    priority INTEGER,
    tags TEXT,
    area_path TEXT,
    iteration_path TEXT,
    parent_id INTEGER,
    watermark INTEGER,
    created_date INTEGER,
    changed_date INTEGER,
    created_by TEXT,
    changed_by TEXT,
    synced_at INTEGER,
    last_activity_date INTEGER,
    deleted_at INTEGER,
    PRIMARY KEY (sync_config_id, id)
);

CREATE INDEX IF NOT EXISTS idx_work_items_parent ON work_items(sync_config_id, parent_id);
CREATE INDEX IF NOT EXISTS idx_work_items_state ON work_items(sync_config_id, state);
CREATE INDEX IF NOT EXISTS idx_work_items_type ON work_items(sync_config_id, work_item_type);
CREATE INDEX IF NOT EXISTS idx_work_items_assignee ON work_items(sync_config_id, assigned_to);
CREATE INDEX IF NOT EXISTS idx_work_items_iteration ON work_items(sync_config_id, iteration_path);
CREATE INDEX IF NOT EXISTS idx_work_items_deleted ON work_items(sync_config_id, deleted_at);

-- ====================
-- Comments
-- ====================

CREATE TABLE IF NOT EXISTS work_item_comments (
    sync_config_id INTEGER NOT NULL,
    work_item_id INTEGER NOT NULL,
    id INTEGER NOT NULL,
    text TEXT NOT NULL,
    created_by TEXT,
    created_date INTEGER,
    modified_by TEXT,
    modified_date INTEGER,
    version INTEGER NOT NULL,
    synced_at INTEGER,
    PRIMARY KEY (sync_config_id, work_item_id, id),
    FOREIGN KEY (sync_config_id, work_item_id)
        REFERENCES work_items(sync_config_id, id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_comments_item_date
    ON work_item_comments(sync_config_id, work_item_id, created_date);

-- ====================
-- Sync Run History
-- ====================

CREATE TABLE IF NOT EXISTS sync_runs (
    run_id TEXT PRIMARY KEY,
    sync_config_id INTEGER NOT NULL REFERENCES sync_configs(id) ON DELETE CASCADE,
    status TEXT NOT NULL CHECK (status IN ('completed', 'failed')),
    items_added INTEGER NOT NULL DEFAULT 0,
    items_updated INTEGER NOT NULL DEFAULT 0,
    items_deleted INTEGER NOT NULL DEFAULT 0,
    comments_synced INTEGER NOT NULL DEFAULT 0,
    duration_ms INTEGER NOT NULL,
    error TEXT,
    started_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_config ON sync_runs(sync_config_id, started_at DESC);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
";

/// Apply the schema to a connection.
///
/// Sets pragmas, creates tables, then runs pending migrations.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-64000")?; // 64MB cache
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    // Run migrations for existing databases
    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in ["sync_configs", "work_items", "work_item_comments", "sync_runs", "events"] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let fk_enabled: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk_enabled, 1);
    }

    #[test]
    fn test_negative_rev_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO sync_configs (name, epic_id, organization, project, created_at)
             VALUES ('c', 1, 'o', 'p', 0)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO work_items (sync_config_id, id, rev, title, work_item_type, state)
             VALUES (1, 10, -1, 't', 'Bug', 'New')",
            [],
        );
        assert!(result.is_err());
    }
}
