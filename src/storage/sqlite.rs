//! SQLite storage implementation.
//!
//! This module provides the mirror store for epicsync using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.

use crate::error::{Error, Result};
use crate::model::{
    DeletionPolicy, NewSyncConfig, StateCounts, SyncConfig, SyncResult, SyncStatus, WorkItem,
    WorkItemComment, WorkItemFilter, WorkItemMetadata,
};
use crate::storage::events::{insert_event, Event, EventType};
use crate::storage::schema::apply_schema;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, tracking side effects.
///
/// This struct is passed to mutation closures to record audit events that
/// are written in the same transaction as the mutation itself.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (`sync`, `api`, `cli`, ...).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }
}

/// The write set of one reconciliation run.
///
/// Applied by [`SqliteStorage::apply_mirror_diff`] as a single transaction.
#[derive(Debug, Clone, Default)]
pub struct MirrorDiff {
    /// Items absent from the mirror (or tombstoned there).
    pub added: Vec<WorkItem>,
    /// Items whose remote rev differs from the mirrored rev.
    pub updated: Vec<WorkItem>,
    /// Mirrored ids absent from the fresh remote set.
    pub removed: Vec<i64>,
}

impl MirrorDiff {
    /// True when nothing would be written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// What the mirror currently holds for one id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MirrorEntry {
    pub rev: i64,
    pub parent_id: Option<i64>,
    pub tombstoned: bool,
}

const WORK_ITEM_COLUMNS: &str = "id, sync_config_id, rev, title, work_item_type, state, assigned_to, \
     description, priority, tags, area_path, iteration_path, parent_id, watermark, created_date, \
     changed_date, created_by, changed_by, synced_at, last_activity_date, deleted_at";

const COMMENT_COLUMNS: &str = "id, work_item_id, sync_config_id, text, created_by, created_date, \
     modified_by, modified_date, version, synced_at";

const SYNC_CONFIG_COLUMNS: &str =
    "id, name, epic_id, organization, project, last_synced, created_at";

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database (and its parent directory) and applies the
    /// schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on
    /// error, leaving the database exactly as it was before the call.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        // Dropping `tx` on the error path rolls back
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        debug!(op = %ctx.op_name, actor = %ctx.actor, events = ctx.events.len(), "Mutation committed");

        Ok(result)
    }

    // ======================
    // Sync Config Operations
    // ======================

    /// Create a sync config.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for missing fields, or a database error.
    pub fn create_sync_config(&mut self, new: &NewSyncConfig, actor: &str) -> Result<SyncConfig> {
        new.validate()?;
        let now = Utc::now().timestamp_millis();

        let id = self.mutate("create_sync_config", actor, |tx, ctx| {
            tx.execute(
                "INSERT INTO sync_configs (name, epic_id, organization, project, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    new.name.trim(),
                    new.epic_id,
                    new.organization.trim(),
                    new.project.trim(),
                    now
                ],
            )?;
            let id = tx.last_insert_rowid();
            ctx.record_change(
                "sync_config",
                &id.to_string(),
                EventType::ConfigCreated,
                None,
                Some(format!("epic {}", new.epic_id)),
            );
            Ok(id)
        })?;

        self.get_sync_config(id)?
            .ok_or(Error::SyncConfigNotFound { id })
    }

    /// Get a sync config by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_sync_config(&self, id: i64) -> Result<Option<SyncConfig>> {
        let sql = format!("SELECT {SYNC_CONFIG_COLUMNS} FROM sync_configs WHERE id = ?1");
        let config = self
            .conn
            .query_row(&sql, [id], map_sync_config_row)
            .optional()?;
        Ok(config)
    }

    /// Get a sync config by ID, failing when absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::SyncConfigNotFound` if no such config exists.
    pub fn require_sync_config(&self, id: i64) -> Result<SyncConfig> {
        self.get_sync_config(id)?
            .ok_or(Error::SyncConfigNotFound { id })
    }

    /// List all sync configs, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_sync_configs(&self) -> Result<Vec<SyncConfig>> {
        let sql = format!("SELECT {SYNC_CONFIG_COLUMNS} FROM sync_configs ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_sync_config_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Delete a sync config together with its mirror and run history.
    ///
    /// Returns `false` if the config did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_sync_config(&mut self, id: i64, actor: &str) -> Result<bool> {
        self.mutate("delete_sync_config", actor, |tx, ctx| {
            // Cascades to work_items, work_item_comments and sync_runs
            let deleted = tx.execute("DELETE FROM sync_configs WHERE id = ?1", [id])?;
            if deleted > 0 {
                ctx.record_event("sync_config", &id.to_string(), EventType::ConfigDeleted);
            }
            Ok(deleted > 0)
        })
    }

    /// Number of committed runs for a config.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn completed_run_count(&self, sync_config_id: i64) -> Result<u64> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT completed_runs FROM sync_configs WHERE id = ?1",
                [sync_config_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.and_then(|c| u64::try_from(c).ok()).unwrap_or(0))
    }

    // ====================
    // Mirror Write Path
    // ====================

    /// Current id -> (rev, parent, tombstone) map for one config.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn mirrored_revs(&self, sync_config_id: i64) -> Result<HashMap<i64, MirrorEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, rev, parent_id, deleted_at IS NOT NULL
             FROM work_items WHERE sync_config_id = ?1",
        )?;
        let rows = stmt.query_map([sync_config_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                MirrorEntry {
                    rev: row.get(1)?,
                    parent_id: row.get(2)?,
                    tombstoned: row.get(3)?,
                },
            ))
        })?;
        rows.collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(Error::from)
    }

    /// Apply one run's diff atomically.
    ///
    /// Inserts `added` (reviving tombstones), replaces `updated` in full,
    /// removes `removed` according to `policy`, sets every written row's
    /// watermark to its rev, and stamps the config's `last_synced`. Either
    /// all of it commits or none of it does.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; the mirror is left untouched.
    pub fn apply_mirror_diff(
        &mut self,
        sync_config_id: i64,
        diff: &MirrorDiff,
        policy: DeletionPolicy,
        synced_at: DateTime<Utc>,
        actor: &str,
    ) -> Result<()> {
        let now = synced_at.timestamp_millis();

        self.mutate("apply_mirror_diff", actor, |tx, ctx| {
            for item in &diff.added {
                upsert_work_item(tx, sync_config_id, item, now)?;
                refresh_last_activity(tx, sync_config_id, item.id)?;
                ctx.record_change(
                    "work_item",
                    &item_key(sync_config_id, item.id),
                    EventType::ItemAdded,
                    None,
                    Some(item.rev.to_string()),
                );
            }

            for item in &diff.updated {
                upsert_work_item(tx, sync_config_id, item, now)?;
                refresh_last_activity(tx, sync_config_id, item.id)?;
                ctx.record_change(
                    "work_item",
                    &item_key(sync_config_id, item.id),
                    EventType::ItemUpdated,
                    None,
                    Some(item.rev.to_string()),
                );
            }

            for &id in &diff.removed {
                let affected = match policy {
                    DeletionPolicy::Hard => tx.execute(
                        "DELETE FROM work_items WHERE sync_config_id = ?1 AND id = ?2",
                        rusqlite::params![sync_config_id, id],
                    )?,
                    DeletionPolicy::Tombstone => tx.execute(
                        "UPDATE work_items SET deleted_at = ?3
                         WHERE sync_config_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                        rusqlite::params![sync_config_id, id, now],
                    )?,
                };
                if affected > 0 {
                    ctx.record_change(
                        "work_item",
                        &item_key(sync_config_id, id),
                        EventType::ItemRemoved,
                        None,
                        Some(policy.as_str().to_string()),
                    );
                }
            }

            let touched = tx.execute(
                "UPDATE sync_configs SET last_synced = ?2, completed_runs = completed_runs + 1
                 WHERE id = ?1",
                rusqlite::params![sync_config_id, now],
            )?;
            if touched == 0 {
                return Err(Error::SyncConfigNotFound { id: sync_config_id });
            }

            Ok(())
        })
    }

    /// Stored version of each comment on an item, keyed by comment id.
    ///
    /// Versions count per comment, so incremental sync compares each fetched
    /// comment against its own entry here.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn comment_versions(&self, sync_config_id: i64, work_item_id: i64) -> Result<HashMap<i64, i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, version FROM work_item_comments
             WHERE sync_config_id = ?1 AND work_item_id = ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![sync_config_id, work_item_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<HashMap<_, _>>>()?)
    }

    /// Upsert comments for one item, keeping the higher version per comment id.
    ///
    /// Returns how many comments were newly written or version-bumped.
    /// Also recomputes the item's `last_activity_date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is not mirrored or a write fails.
    pub fn upsert_comments(
        &mut self,
        sync_config_id: i64,
        work_item_id: i64,
        comments: &[WorkItemComment],
        actor: &str,
    ) -> Result<u64> {
        let now = Utc::now().timestamp_millis();

        self.mutate("upsert_comments", actor, |tx, _ctx| {
            let mut written = 0u64;
            for c in comments {
                let changed = tx.execute(
                    "INSERT INTO work_item_comments
                        (sync_config_id, work_item_id, id, text, created_by, created_date,
                         modified_by, modified_date, version, synced_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT(sync_config_id, work_item_id, id) DO UPDATE SET
                        text = excluded.text,
                        created_by = excluded.created_by,
                        created_date = excluded.created_date,
                        modified_by = excluded.modified_by,
                        modified_date = excluded.modified_date,
                        version = excluded.version,
                        synced_at = excluded.synced_at
                     WHERE excluded.version > work_item_comments.version",
                    rusqlite::params![
                        sync_config_id,
                        work_item_id,
                        c.id,
                        c.text,
                        c.created_by,
                        to_millis(c.created_date),
                        c.modified_by,
                        to_millis(c.modified_date),
                        c.version,
                        now,
                    ],
                )?;
                written += changed as u64;
            }
            if written > 0 {
                refresh_last_activity(tx, sync_config_id, work_item_id)?;
            }
            Ok(written)
        })
    }

    // ====================
    // Run History
    // ====================

    /// Persist a finished run and its audit event.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_sync_run(&mut self, result: &SyncResult, actor: &str) -> Result<()> {
        self.mutate("record_sync_run", actor, |tx, ctx| {
            tx.execute(
                "INSERT INTO sync_runs
                    (run_id, sync_config_id, status, items_added, items_updated, items_deleted,
                     comments_synced, duration_ms, error, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    result.run_id,
                    result.sync_config_id,
                    result.status.as_str(),
                    to_sql_count(result.items_added),
                    to_sql_count(result.items_updated),
                    to_sql_count(result.items_deleted),
                    to_sql_count(result.comments_synced),
                    to_sql_count(result.duration_ms),
                    result.error,
                    result.started_at.timestamp_millis(),
                ],
            )?;
            let kind = match result.status {
                SyncStatus::Completed => EventType::SyncCompleted,
                SyncStatus::Failed => EventType::SyncFailed,
            };
            ctx.record_change(
                "sync_config",
                &result.sync_config_id.to_string(),
                kind,
                None,
                Some(result.run_id.clone()),
            );
            Ok(())
        })
    }

    /// Recent runs for a config, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_sync_runs(&self, sync_config_id: i64, limit: u32) -> Result<Vec<SyncResult>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, sync_config_id, status, items_added, items_updated, items_deleted,
                    comments_synced, duration_ms, error, started_at
             FROM sync_runs WHERE sync_config_id = ?1
             ORDER BY started_at DESC, rowid DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![sync_config_id, limit], map_sync_run_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // ====================
    // Mirror Read Path
    // ====================

    /// Search live (non-tombstoned) items with a validated filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn search_work_items(&self, filter: &WorkItemFilter) -> Result<Vec<WorkItem>> {
        let mut conditions: Vec<String> = vec![
            "sync_config_id = ?1".to_string(),
            "deleted_at IS NULL".to_string(),
        ];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(filter.sync_config_id)];

        for (column, value) in [
            ("work_item_type", &filter.work_item_type),
            ("state", &filter.state),
            ("assigned_to", &filter.assigned_to),
            ("iteration_path", &filter.iteration_path),
        ] {
            if let Some(v) = value {
                params.push(Box::new(v.clone()));
                conditions.push(format!("{column} = ?{}", params.len()));
            }
        }

        if filter.assigned_to.is_none() && filter.unassigned {
            conditions.push("assigned_to IS NULL".to_string());
        }

        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            params.push(Box::new(format!("%{}%", escape_like(q))));
            let like_idx = params.len();
            if let Ok(id) = q.parse::<i64>() {
                params.push(Box::new(id));
                conditions.push(format!(
                    "(title LIKE ?{like_idx} ESCAPE '\\' OR id = ?{})",
                    params.len()
                ));
            } else {
                conditions.push(format!("title LIKE ?{like_idx} ESCAPE '\\'"));
            }
        }

        for term in filter.terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            params.push(Box::new(format!("%{}%", escape_like(term))));
            conditions.push(format!("title LIKE ?{} ESCAPE '\\'", params.len()));
        }

        if !filter.not_states.is_empty() {
            let mut slots = Vec::with_capacity(filter.not_states.len());
            for state in &filter.not_states {
                params.push(Box::new(state.clone()));
                slots.push(format!("?{}", params.len()));
            }
            conditions.push(format!("COALESCE(state, '') NOT IN ({})", slots.join(", ")));
        }

        if let Some(from) = filter.changed_from {
            params.push(Box::new(from.timestamp_millis()));
            conditions.push(format!("changed_date >= ?{}", params.len()));
        }
        if let Some(to) = filter.changed_to {
            params.push(Box::new(to.timestamp_millis()));
            conditions.push(format!("changed_date < ?{}", params.len()));
        }
        if let Some(since) = filter.inactive_since {
            params.push(Box::new(since.timestamp_millis()));
            conditions.push(format!(
                "COALESCE(last_activity_date, changed_date, 0) < ?{}",
                params.len()
            ));
        }

        params.push(Box::new(filter.limit));
        let limit_idx = params.len();
        params.push(Box::new(filter.offset));
        let offset_idx = params.len();

        // Sort column comes from the SortColumn allow-list, never from input
        let sql = format!(
            "SELECT {WORK_ITEM_COLUMNS} FROM work_items
             WHERE {}
             ORDER BY {} {}, id ASC
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
            conditions.join(" AND "),
            filter.sort_by.column(),
            filter.sort_dir.as_sql(),
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), map_work_item_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Get one live item.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_work_item(&self, sync_config_id: i64, id: i64) -> Result<Option<WorkItem>> {
        let sql = format!(
            "SELECT {WORK_ITEM_COLUMNS} FROM work_items
             WHERE sync_config_id = ?1 AND id = ?2 AND deleted_at IS NULL"
        );
        let item = self
            .conn
            .query_row(&sql, rusqlite::params![sync_config_id, id], map_work_item_row)
            .optional()?;
        Ok(item)
    }

    /// Direct live children of an item, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_children(&self, sync_config_id: i64, parent_id: i64) -> Result<Vec<WorkItem>> {
        let sql = format!(
            "SELECT {WORK_ITEM_COLUMNS} FROM work_items
             WHERE sync_config_id = ?1 AND parent_id = ?2 AND deleted_at IS NULL
             ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params![sync_config_id, parent_id], map_work_item_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Comments on an item, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_comments(&self, sync_config_id: i64, work_item_id: i64) -> Result<Vec<WorkItemComment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM work_item_comments
             WHERE sync_config_id = ?1 AND work_item_id = ?2
             ORDER BY created_date ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![sync_config_id, work_item_id],
            map_comment_row,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Live item count per raw state.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn state_counts(&self, sync_config_id: i64) -> Result<StateCounts> {
        let mut stmt = self.conn.prepare(
            "SELECT state, COUNT(*) FROM work_items
             WHERE sync_config_id = ?1 AND deleted_at IS NULL
             GROUP BY state",
        )?;
        let rows = stmt.query_map([sync_config_id], |row| {
            let count: i64 = row.get(1)?;
            Ok((row.get::<_, String>(0)?, u64::try_from(count).unwrap_or(0)))
        })?;
        let rows = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(StateCounts::from_rows(rows))
    }

    /// Distinct non-null type, state, assignee and iteration values.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn metadata(&self, sync_config_id: i64) -> Result<WorkItemMetadata> {
        Ok(WorkItemMetadata {
            types: self.distinct_values(sync_config_id, "work_item_type")?,
            states: self.distinct_values(sync_config_id, "state")?,
            assignees: self.distinct_values(sync_config_id, "assigned_to")?,
            iterations: self.distinct_values(sync_config_id, "iteration_path")?,
        })
    }

    fn distinct_values(&self, sync_config_id: i64, column: &'static str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {column} FROM work_items
             WHERE sync_config_id = ?1 AND deleted_at IS NULL AND {column} IS NOT NULL
             ORDER BY {column} ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([sync_config_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Ids of all live items in a config, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn live_item_ids(&self, sync_config_id: i64) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM work_items
             WHERE sync_config_id = ?1 AND deleted_at IS NULL
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([sync_config_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

// ==================
// Write Helpers
// ==================

fn upsert_work_item(tx: &Transaction, sync_config_id: i64, item: &WorkItem, now: i64) -> Result<()> {
    tx.execute(
        "INSERT INTO work_items
            (sync_config_id, id, rev, title, work_item_type, state, assigned_to, description,
             priority, tags, area_path, iteration_path, parent_id, watermark, created_date,
             changed_date, created_by, changed_by, synced_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?3, ?14, ?15, ?16, ?17, ?18, NULL)
         ON CONFLICT(sync_config_id, id) DO UPDATE SET
            rev = excluded.rev,
            title = excluded.title,
            work_item_type = excluded.work_item_type,
            state = excluded.state,
            assigned_to = excluded.assigned_to,
            description = excluded.description,
            priority = excluded.priority,
            tags = excluded.tags,
            area_path = excluded.area_path,
            iteration_path = excluded.iteration_path,
            parent_id = excluded.parent_id,
            watermark = excluded.watermark,
            created_date = excluded.created_date,
            changed_date = excluded.changed_date,
            created_by = excluded.created_by,
            changed_by = excluded.changed_by,
            synced_at = excluded.synced_at,
            deleted_at = NULL",
        rusqlite::params![
            sync_config_id,
            item.id,
            item.rev,
            item.title,
            item.work_item_type,
            item.state,
            item.assigned_to,
            item.description,
            item.priority,
            item.tags,
            item.area_path,
            item.iteration_path,
            item.parent_id,
            to_millis(item.created_date),
            to_millis(item.changed_date),
            item.created_by,
            item.changed_by,
            now,
        ],
    )?;
    Ok(())
}

/// `last_activity_date` = later of `changed_date` and the newest comment.
fn refresh_last_activity(tx: &Transaction, sync_config_id: i64, work_item_id: i64) -> Result<()> {
    tx.execute(
        "UPDATE work_items SET last_activity_date = NULLIF(MAX(
            COALESCE(changed_date, 0),
            COALESCE((SELECT MAX(COALESCE(c.modified_date, c.created_date))
                      FROM work_item_comments c
                      WHERE c.sync_config_id = ?1 AND c.work_item_id = ?2), 0)
         ), 0)
         WHERE sync_config_id = ?1 AND id = ?2",
        rusqlite::params![sync_config_id, work_item_id],
    )?;
    Ok(())
}

fn item_key(sync_config_id: i64, id: i64) -> String {
    format!("{sync_config_id}:{id}")
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn to_millis(dt: Option<DateTime<Utc>>) -> Option<i64> {
    dt.map(|d| d.timestamp_millis())
}

fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
    ms.and_then(DateTime::from_timestamp_millis)
}

// ==================
// Row Mappers
// ==================

fn map_work_item_row(row: &rusqlite::Row) -> rusqlite::Result<WorkItem> {
    Ok(WorkItem {
        id: row.get(0)?,
        sync_config_id: row.get(1)?,
        rev: row.get(2)?,
        title: row.get(3)?,
        work_item_type: row.get(4)?,
        state: row.get(5)?,
        assigned_to: row.get(6)?,
        description: row.get(7)?,
        priority: row.get(8)?,
        tags: row.get(9)?,
        area_path: row.get(10)?,
        iteration_path: row.get(11)?,
        parent_id: row.get(12)?,
        watermark: row.get(13)?,
        created_date: from_millis(row.get(14)?),
        changed_date: from_millis(row.get(15)?),
        created_by: row.get(16)?,
        changed_by: row.get(17)?,
        synced_at: from_millis(row.get(18)?),
        last_activity_date: from_millis(row.get(19)?),
        deleted_at: from_millis(row.get(20)?),
    })
}

fn map_comment_row(row: &rusqlite::Row) -> rusqlite::Result<WorkItemComment> {
    Ok(WorkItemComment {
        id: row.get(0)?,
        work_item_id: row.get(1)?,
        sync_config_id: row.get(2)?,
        text: row.get(3)?,
        created_by: row.get(4)?,
        created_date: from_millis(row.get(5)?),
        modified_by: row.get(6)?,
        modified_date: from_millis(row.get(7)?),
        version: row.get(8)?,
        synced_at: from_millis(row.get(9)?),
    })
}

fn map_sync_config_row(row: &rusqlite::Row) -> rusqlite::Result<SyncConfig> {
    Ok(SyncConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        epic_id: row.get(2)?,
        organization: row.get(3)?,
        project: row.get(4)?,
        last_synced: from_millis(row.get(5)?),
        created_at: from_millis(Some(row.get(6)?)).unwrap_or_default(),
    })
}

fn map_sync_run_row(row: &rusqlite::Row) -> rusqlite::Result<SyncResult> {
    let count = |idx: usize| -> rusqlite::Result<u64> {
        let v: i64 = row.get(idx)?;
        Ok(u64::try_from(v).unwrap_or(0))
    };
    let status: String = row.get(2)?;
    let added = count(3)?;
    let updated = count(4)?;
    let duration_ms = count(7)?;
    Ok(SyncResult {
        run_id: row.get(0)?,
        sync_config_id: row.get(1)?,
        status: SyncStatus::from_str(&status),
        items_synced: added + updated,
        items_added: added,
        items_updated: updated,
        items_deleted: count(5)?,
        comments_synced: count(6)?,
        duration: crate::model::format_duration(duration_ms),
        duration_ms,
        error: row.get(8)?,
        started_at: from_millis(Some(row.get(9)?)).unwrap_or_default(),
    })
}
