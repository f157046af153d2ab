//! Query Service: read-only access to the mirror.
//!
//! Raw request parameters are validated into a [`WorkItemFilter`] by
//! [`parse_filter`]; unknown keys, sort fields and malformed numbers are
//! rejected rather than ignored. Reads never take the sync run registry, so
//! they observe either the pre- or post-commit mirror.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{
    SortColumn, SortDir, StateCounts, SyncConfig, WorkItem, WorkItemComment, WorkItemFilter,
    WorkItemMetadata, MAX_LIMIT,
};
use crate::storage::{self, SharedStorage};

/// Query parameter names accepted by [`parse_filter`].
pub const FILTER_PARAMS: &[&str] = &[
    "type",
    "state",
    "assignedTo",
    "iterationPath",
    "q",
    "sortBy",
    "sortDir",
    "limit",
    "offset",
    "syncConfigId",
];

/// Validate raw parameters into a filter.
///
/// Blank values count as absent. `resolve_config` receives the
/// `syncConfigId` parameter (if any) and returns the config to search; it is
/// only called once every other parameter has validated.
///
/// # Errors
///
/// Returns `Error::Validation` for unknown keys, unknown sort fields or
/// directions, and out-of-range numbers. Errors from `resolve_config` are
/// propagated.
pub fn parse_filter<F>(params: &HashMap<String, String>, resolve_config: F) -> Result<WorkItemFilter>
where
    F: FnOnce(Option<i64>) -> Result<i64>,
{
    let mut unknown: Vec<&str> = params
        .keys()
        .map(String::as_str)
        .filter(|k| !FILTER_PARAMS.contains(k))
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        return Err(Error::Validation(format!(
            "unknown filter parameter(s): {}",
            unknown.join(", ")
        )));
    }

    let get = |key: &str| {
        params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let sort_by = match get("sortBy") {
        Some(raw) => SortColumn::from_param(&raw)
            .ok_or_else(|| Error::Validation(format!("unknown sort field '{raw}'")))?,
        None => SortColumn::default(),
    };
    let sort_dir = match get("sortDir") {
        Some(raw) => SortDir::from_param(&raw).ok_or_else(|| {
            Error::Validation(format!("sortDir must be 'asc' or 'desc', got '{raw}'"))
        })?,
        None => SortDir::default(),
    };

    let limit = match get("limit") {
        Some(raw) => {
            let limit = parse_number::<u32>("limit", &raw)?;
            if limit == 0 || limit > MAX_LIMIT {
                return Err(Error::Validation(format!(
                    "limit must be between 1 and {MAX_LIMIT}, got {limit}"
                )));
            }
            limit
        }
        None => crate::model::DEFAULT_LIMIT,
    };
    let offset = get("offset")
        .map(|raw| parse_number::<u32>("offset", &raw))
        .transpose()?
        .unwrap_or(0);

    let requested = get("syncConfigId")
        .map(|raw| parse_number::<i64>("syncConfigId", &raw))
        .transpose()?;
    let sync_config_id = resolve_config(requested)?;

    Ok(WorkItemFilter {
        sync_config_id,
        work_item_type: get("type"),
        state: get("state"),
        assigned_to: get("assignedTo"),
        unassigned: false,
        iteration_path: get("iterationPath"),
        q: get("q"),
        terms: Vec::new(),
        not_states: Vec::new(),
        changed_from: None,
        changed_to: None,
        inactive_since: None,
        sort_by,
        sort_dir,
        limit,
        offset,
    })
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| Error::Validation(format!("{key} must be a non-negative integer, got '{raw}'")))
}

/// Read-only operations over the mirror.
#[derive(Debug, Clone)]
pub struct QueryService {
    storage: SharedStorage,
}

impl QueryService {
    #[must_use]
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Search with a validated filter.
    ///
    /// # Errors
    ///
    /// Returns `Error::SyncConfigNotFound` for an unknown config, or a
    /// database error.
    pub fn search(&self, filter: &WorkItemFilter) -> Result<Vec<WorkItem>> {
        let store = storage::lock(&self.storage);
        store.require_sync_config(filter.sync_config_id)?;
        store.search_work_items(filter)
    }

    /// The sync config a query runs against.
    ///
    /// # Errors
    ///
    /// Returns `Error::SyncConfigNotFound` if it does not exist.
    pub fn config(&self, sync_config_id: i64) -> Result<SyncConfig> {
        storage::lock(&self.storage).require_sync_config(sync_config_id)
    }

    /// Item count per state plus `total`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn state_counts(&self, sync_config_id: i64) -> Result<StateCounts> {
        storage::lock(&self.storage).state_counts(sync_config_id)
    }

    /// Distinct types, states, assignees and iterations.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn metadata(&self, sync_config_id: i64) -> Result<WorkItemMetadata> {
        storage::lock(&self.storage).metadata(sync_config_id)
    }

    /// One live item.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkItemNotFound` if absent or tombstoned.
    pub fn get(&self, sync_config_id: i64, id: i64) -> Result<WorkItem> {
        storage::lock(&self.storage)
            .get_work_item(sync_config_id, id)?
            .ok_or(Error::WorkItemNotFound { id })
    }

    /// Direct children of `parent_id`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkItemNotFound` if the parent is not mirrored.
    pub fn children(&self, sync_config_id: i64, parent_id: i64) -> Result<Vec<WorkItem>> {
        let store = storage::lock(&self.storage);
        if store.get_work_item(sync_config_id, parent_id)?.is_none() {
            return Err(Error::WorkItemNotFound { id: parent_id });
        }
        store.get_children(sync_config_id, parent_id)
    }

    /// Comments on an item, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkItemNotFound` if the item is not mirrored.
    pub fn comments(&self, sync_config_id: i64, item_id: i64) -> Result<Vec<WorkItemComment>> {
        let store = storage::lock(&self.storage);
        if store.get_work_item(sync_config_id, item_id)?.is_none() {
            return Err(Error::WorkItemNotFound { id: item_id });
        }
        store.get_comments(sync_config_id, item_id)
    }

    /// Lowest-numbered sync config, used when a request names none.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn default_config_id(&self) -> Result<Option<i64>> {
        Ok(storage::lock(&self.storage)
            .list_sync_configs()?
            .iter()
            .map(|c| c.id)
            .min())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeletionPolicy, NewSyncConfig};
    use crate::storage::{MirrorDiff, SqliteStorage};
    use chrono::Utc;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn item(id: i64, ty: &str, state: &str, assignee: Option<&str>, parent: Option<i64>) -> WorkItem {
        crate::remote::ItemPayload {
            id,
            rev: 1,
            title: format!("Item {id}"),
            work_item_type: ty.into(),
            state: state.into(),
            assigned_to: assignee.map(str::to_string),
            parent_id: parent,
            ..Default::default()
        }
        .into_work_item(1, Utc::now())
    }

    fn service() -> (QueryService, i64) {
        let mut store = SqliteStorage::open_memory().unwrap();
        let config = store
            .create_sync_config(
                &NewSyncConfig {
                    name: "Release".into(),
                    epic_id: 1,
                    organization: "contoso".into(),
                    project: "Alpha".into(),
                },
                "test",
            )
            .unwrap();
        let diff = MirrorDiff {
            added: vec![
                item(1, "Epic", "Active", None, None),
                item(2, "Bug", "Active", Some("Alice"), Some(1)),
                item(3, "Bug", "New", Some("Bob"), Some(1)),
                item(4, "Task", "Active", Some("Alice"), Some(2)),
                item(5, "Bug", "Closed", Some("Alice"), Some(1)),
            ],
            ..MirrorDiff::default()
        };
        store
            .apply_mirror_diff(config.id, &diff, DeletionPolicy::Hard, Utc::now(), "test")
            .unwrap();
        (QueryService::new(storage::shared(store)), config.id)
    }

    #[test]
    fn test_parse_filter_accepts_known_params() {
        let f = parse_filter(
            &params(&[
                ("type", "Bug"),
                ("assignedTo", "Alice"),
                ("state", " "),
                ("sortBy", "title"),
                ("sortDir", "asc"),
                ("limit", "10"),
                ("offset", "5"),
                ("syncConfigId", "3"),
            ]),
            |requested| Ok(requested.unwrap_or(1)),
        )
        .unwrap();
        assert_eq!(f.sync_config_id, 3);
        assert_eq!(f.work_item_type.as_deref(), Some("Bug"));
        assert_eq!(f.state, None);
        assert_eq!(f.sort_by, SortColumn::Title);
        assert_eq!(f.sort_dir, SortDir::Asc);
        assert_eq!((f.limit, f.offset), (10, 5));
    }

    #[test]
    fn test_parse_filter_rejects_bad_input() {
        let reject = |pairs: &[(&str, &str)]| {
            parse_filter(&params(pairs), |_| Ok(1)).unwrap_err()
        };
        assert!(matches!(reject(&[("color", "red")]), Error::Validation(_)));
        assert!(matches!(reject(&[("sortBy", "description")]), Error::Validation(_)));
        assert!(matches!(reject(&[("sortDir", "sideways")]), Error::Validation(_)));
        assert!(matches!(reject(&[("limit", "0")]), Error::Validation(_)));
        assert!(matches!(reject(&[("limit", "-3")]), Error::Validation(_)));
        assert!(matches!(reject(&[("offset", "x")]), Error::Validation(_)));
        assert!(matches!(reject(&[("syncConfigId", "abc")]), Error::Validation(_)));
    }

    #[test]
    fn test_search_matches_both_fields_exactly() {
        let (svc, id) = service();
        let mut f = WorkItemFilter::for_config(id);
        f.work_item_type = Some("Bug".into());
        f.assigned_to = Some("Alice".into());
        let items = svc.search(&f).unwrap();
        let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(items
            .iter()
            .all(|i| i.work_item_type == "Bug" && i.assigned_to.as_deref() == Some("Alice")));

        assert!(matches!(
            svc.search(&WorkItemFilter::for_config(99)),
            Err(Error::SyncConfigNotFound { id: 99 })
        ));
    }

    #[test]
    fn test_counts_sum_to_total() {
        let (svc, id) = service();
        let counts = svc.state_counts(id).unwrap();
        assert_eq!(counts.total, 5);
        assert_eq!(counts.by_state.values().sum::<u64>(), counts.total);
        assert_eq!(counts.by_state["Active"], 3);
    }

    #[test]
    fn test_lookups() {
        let (svc, id) = service();
        assert_eq!(svc.get(id, 2).unwrap().title, "Item 2");
        assert!(matches!(svc.get(id, 42), Err(Error::WorkItemNotFound { id: 42 })));

        let children: Vec<i64> = svc.children(id, 1).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(children, vec![2, 3, 5]);
        assert!(svc.children(id, 4).unwrap().is_empty());
        assert!(svc.comments(id, 42).is_err());
        assert!(svc.comments(id, 2).unwrap().is_empty());

        let meta = svc.metadata(id).unwrap();
        assert!(meta.assignees.contains(&"Alice".to_string()));
        assert_eq!(svc.default_config_id().unwrap(), Some(id));
    }
}
