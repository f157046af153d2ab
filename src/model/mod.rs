//! Data models for epicsync.
//!
//! This module contains all domain models:
//! - WorkItem / WorkItemComment (the mirror)
//! - SyncConfig (what is mirrored)
//! - SyncResult (run history)
//! - WorkItemFilter (structured queries)
//! - SmartSearchResult (free-text queries)

pub mod filter;
pub mod search;
pub mod sync_config;
pub mod sync_result;
pub mod work_item;

pub use filter::{SortColumn, SortDir, WorkItemFilter, DEFAULT_LIMIT, MAX_LIMIT, SORT_COLUMNS};
pub use search::{ResponseType, SmartSearchResult};
pub use sync_config::{DeletionPolicy, NewSyncConfig, SyncConfig};
pub use sync_result::{format_duration, SyncCounts, SyncResult, SyncStatus};
pub use work_item::{StateCounts, WorkItem, WorkItemComment, WorkItemMetadata};
