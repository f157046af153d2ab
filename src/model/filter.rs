//! Structured work item filter and its sort allow-list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sort parameter values accepted by `sortBy`, in display order.
pub const SORT_COLUMNS: &[&str] = &[
    "id",
    "title",
    "type",
    "state",
    "assignedTo",
    "priority",
    "changed",
    "created",
    "iterationPath",
    "lastActivity",
];

/// Default page size when `limit` is absent.
pub const DEFAULT_LIMIT: u32 = 100;

/// Upper bound on a single page.
pub const MAX_LIMIT: u32 = 1000;

/// Columns a work item search can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortColumn {
    Id,
    Title,
    Type,
    State,
    AssignedTo,
    Priority,
    #[default]
    Changed,
    Created,
    IterationPath,
    LastActivity,
}

impl SortColumn {
    /// Parse a `sortBy` parameter value. Unknown names yield `None`.
    #[must_use]
    pub fn from_param(s: &str) -> Option<Self> {
        match s {
            "id" => Some(Self::Id),
            "title" => Some(Self::Title),
            "type" | "workItemType" => Some(Self::Type),
            "state" => Some(Self::State),
            "assignedTo" => Some(Self::AssignedTo),
            "priority" => Some(Self::Priority),
            "changed" | "changedDate" => Some(Self::Changed),
            "created" | "createdDate" => Some(Self::Created),
            "iterationPath" => Some(Self::IterationPath),
            "lastActivity" | "lastActivityDate" => Some(Self::LastActivity),
            _ => None,
        }
    }

    /// Database column this sort maps to.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::Type => "work_item_type",
            Self::State => "state",
            Self::AssignedTo => "assigned_to",
            Self::Priority => "priority",
            Self::Changed => "changed_date",
            Self::Created => "created_date",
            Self::IterationPath => "iteration_path",
            Self::LastActivity => "last_activity_date",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    /// Parse a `sortDir` parameter value (case-insensitive).
    #[must_use]
    pub fn from_param(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A validated search over one sync config's mirror.
///
/// Field filters are exact matches on stored values. Results are ordered by
/// `sort_by`/`sort_dir` with `id ASC` as the tie-break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemFilter {
    pub sync_config_id: i64,
    pub work_item_type: Option<String>,
    pub state: Option<String>,
    pub assigned_to: Option<String>,
    /// Match items with no assignee; ignored when `assigned_to` is set.
    pub unassigned: bool,
    pub iteration_path: Option<String>,
    /// Case-insensitive title substring, or exact id when numeric.
    pub q: Option<String>,
    /// Words that must each appear somewhere in the title.
    pub terms: Vec<String>,
    /// States to exclude.
    pub not_states: Vec<String>,
    /// Changed at or after this instant.
    pub changed_from: Option<DateTime<Utc>>,
    /// Changed before this instant.
    pub changed_to: Option<DateTime<Utc>>,
    /// No change or comment since this instant.
    pub inactive_since: Option<DateTime<Utc>>,
    pub sort_by: SortColumn,
    pub sort_dir: SortDir,
    pub limit: u32,
    pub offset: u32,
}

impl WorkItemFilter {
    /// Unfiltered search with default sort and paging.
    #[must_use]
    pub fn for_config(sync_config_id: i64) -> Self {
        Self {
            sync_config_id,
            work_item_type: None,
            state: None,
            assigned_to: None,
            unassigned: false,
            iteration_path: None,
            q: None,
            terms: Vec::new(),
            not_states: Vec::new(),
            changed_from: None,
            changed_to: None,
            inactive_since: None,
            sort_by: SortColumn::default(),
            sort_dir: SortDir::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    /// Human-readable summary of the applied field filters, e.g.
    /// `type=Bug, assignedTo=Alice`.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(t) = &self.work_item_type {
            parts.push(format!("type={t}"));
        }
        if let Some(s) = &self.state {
            parts.push(format!("state={s}"));
        }
        if let Some(a) = &self.assigned_to {
            parts.push(format!("assignedTo={a}"));
        } else if self.unassigned {
            parts.push("assignedTo=(none)".to_string());
        }
        if let Some(i) = &self.iteration_path {
            parts.push(format!("iterationPath={i}"));
        }
        if !self.not_states.is_empty() {
            parts.push(format!("state!={}", self.not_states.join("|")));
        }
        if let Some(from) = self.changed_from {
            parts.push(format!("changed>={}", from.format("%Y-%m-%d")));
        }
        if let Some(to) = self.changed_to {
            parts.push(format!("changed<{}", to.format("%Y-%m-%d")));
        }
        if let Some(since) = self.inactive_since {
            parts.push(format!("inactiveSince={}", since.format("%Y-%m-%d")));
        }
        if let Some(q) = &self.q {
            parts.push(format!("q={q}"));
        }
        if !self.terms.is_empty() {
            parts.push(format!("title~{}", self.terms.join("+")));
        }
        parts.join(", ")
    }

    /// True when no field or text filter is set.
    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.work_item_type.is_none()
            && self.state.is_none()
            && self.assigned_to.is_none()
            && !self.unassigned
            && self.iteration_path.is_none()
            && self.q.is_none()
            && self.terms.is_empty()
            && self.not_states.is_empty()
            && self.changed_from.is_none()
            && self.changed_to.is_none()
            && self.inactive_since.is_none()
    }
}
