//! Mirrored work items and their comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A work item mirrored from the remote tracker.
///
/// `id` is remote-assigned and unique per sync config. `rev` never decreases
/// for a given `(sync_config_id, id)`; `watermark` records the rev at which
/// the row was last written by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub id: i64,
    pub sync_config_id: i64,
    pub rev: i64,
    pub title: String,
    pub work_item_type: String,
    pub state: String,
    pub assigned_to: Option<String>,
    /// Rich text (HTML) as returned by the tracker.
    pub description: Option<String>,
    pub priority: Option<i64>,
    /// Semicolon-delimited tag list.
    pub tags: Option<String>,
    pub area_path: Option<String>,
    pub iteration_path: Option<String>,
    /// Parent within the same sync config; `None` for the root.
    pub parent_id: Option<i64>,
    pub watermark: Option<i64>,
    pub created_date: Option<DateTime<Utc>>,
    pub changed_date: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub changed_by: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
    /// Later of `changed_date` and the newest comment timestamp.
    pub last_activity_date: Option<DateTime<Utc>>,
    /// Set only under the tombstone deletion policy; tombstoned rows are
    /// never returned by queries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl WorkItem {
    /// Split `tags` into trimmed, non-empty tag names.
    #[must_use]
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .as_deref()
            .map(|t| t.split(';').map(str::trim).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// A comment on a mirrored work item.
///
/// Only the highest `version` seen for a comment id is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemComment {
    pub id: i64,
    pub work_item_id: i64,
    pub sync_config_id: i64,
    pub text: String,
    pub created_by: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub modified_date: Option<DateTime<Utc>>,
    pub version: i64,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Distinct values observed in the mirror, used to populate filter choices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemMetadata {
    pub types: Vec<String>,
    pub states: Vec<String>,
    pub assignees: Vec<String>,
    pub iterations: Vec<String>,
}

/// Item count per raw state string, plus the overall `total`.
///
/// Serializes as a flat object: `{"Active": 3, "New": 1, "total": 4}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    #[serde(flatten)]
    pub by_state: BTreeMap<String, u64>,
    pub total: u64,
}

impl StateCounts {
    /// Build counts from `(state, count)` rows; `total` is their sum.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = (String, u64)>) -> Self {
        let by_state: BTreeMap<String, u64> = rows.into_iter().collect();
        let total = by_state.values().sum();
        Self { by_state, total }
    }
}
