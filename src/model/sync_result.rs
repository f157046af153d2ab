//! Outcome of one reconciliation run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Completed,
    Failed,
}

impl SyncStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from string.
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "completed" => Self::Completed,
            _ => Self::Failed,
        }
    }
}

/// Immutable summary of a sync run, retained as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub sync_config_id: i64,
    pub status: SyncStatus,
    /// `items_added + items_updated`.
    pub items_synced: u64,
    pub items_added: u64,
    pub items_updated: u64,
    pub items_deleted: u64,
    pub comments_synced: u64,
    /// Human-readable duration, e.g. `"1.2s"`.
    pub duration: String,
    pub duration_ms: u64,
    /// Failure reason; `None` when completed.
    pub error: Option<String>,
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

impl SyncResult {
    /// Result for a committed run.
    #[must_use]
    pub fn completed(
        sync_config_id: i64,
        run_id: String,
        started_at: DateTime<Utc>,
        counts: SyncCounts,
        duration_ms: u64,
    ) -> Self {
        Self {
            sync_config_id,
            status: SyncStatus::Completed,
            items_synced: counts.added + counts.updated,
            items_added: counts.added,
            items_updated: counts.updated,
            items_deleted: counts.deleted,
            comments_synced: counts.comments,
            duration: format_duration(duration_ms),
            duration_ms,
            error: None,
            run_id,
            started_at,
        }
    }

    /// Result for a run that ended before commit. All counts are zero since
    /// nothing was applied.
    #[must_use]
    pub fn failed(
        sync_config_id: i64,
        run_id: String,
        started_at: DateTime<Utc>,
        reason: String,
        duration_ms: u64,
    ) -> Self {
        Self {
            sync_config_id,
            status: SyncStatus::Failed,
            items_synced: 0,
            items_added: 0,
            items_updated: 0,
            items_deleted: 0,
            comments_synced: 0,
            duration: format_duration(duration_ms),
            duration_ms,
            error: Some(reason),
            run_id,
            started_at,
        }
    }
}

/// Mutation tallies accumulated during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
    pub comments: u64,
}

/// Format milliseconds with one decimal of seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_duration(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}
