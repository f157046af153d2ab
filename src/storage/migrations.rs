//! Database migrations embedded at compile time.
//!
//! Migrations are sourced from `/migrations/` at the repo root and
//! embedded into the binary using `include_str!`. This ensures the
//! binary is self-contained with no runtime file dependencies.

use rusqlite::{Connection, Result};
use tracing::{info, warn};

/// A single migration with version identifier and SQL content.
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order, embedded at compile time.
///
/// Version names match the SQL filenames (without .sql extension).
/// The `schema_migrations` table tracks which have been applied.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_work_item_activity",
        sql: include_str!("../../migrations/001_work_item_activity.sql"),
    },
    Migration {
        version: "002_sync_config_run_counter",
        sql: include_str!("../../migrations/002_sync_config_run_counter.sql"),
    },
    Migration {
        version: "003_work_item_tombstones",
        sql: include_str!("../../migrations/003_work_item_tombstones.sql"),
    },
];

/// Run all pending migrations on the database.
///
/// Migrations are applied in order. Already-applied migrations (tracked in
/// the `schema_migrations` table) are skipped. This is idempotent and safe
/// to call on every database open.
///
/// # Errors
///
/// Returns an error if a migration fails to apply. ALTER TABLE errors for
/// duplicate columns are logged and the migration is marked complete, since
/// the base DDL already carries the newest columns.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: std::collections::HashSet<String> = conn
        .prepare("SELECT version FROM schema_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for migration in MIGRATIONS {
        if applied.contains(migration.version) {
            continue;
        }

        info!(version = migration.version, "Applying migration");

        if let Err(e) = conn.execute_batch(migration.sql) {
            if e.to_string().contains("duplicate column name") {
                warn!(
                    version = migration.version,
                    "Migration partially applied (columns exist), marking complete"
                );
            } else {
                return Err(e);
            }
        }

        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp_millis()],
        )?;

        info!(version = migration.version, "Migration complete");
    }

    Ok(())
}
