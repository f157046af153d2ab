//! Remote Source Adapter.
//!
//! Wraps the tracker's batched read API behind [`RemoteSource`]. The engine
//! only ever sees [`ItemPayload`] and [`CommentPayload`]; wire formats stay
//! inside the concrete adapters.
//!
//! # Submodules
//!
//! - [`azure`] - Azure DevOps REST client
//! - [`retry`] - Exponential backoff for transient failures
//! - [`types`] - Azure DevOps wire DTOs and their mapping

pub mod azure;
pub mod retry;
pub mod types;

pub use azure::AzureDevOpsClient;
pub use retry::{with_retry, RetryPolicy};

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{SyncConfig, WorkItem, WorkItemComment};

/// Organization and project a sync config reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScope {
    pub organization: String,
    pub project: String,
}

impl From<&SyncConfig> for RemoteScope {
    fn from(config: &SyncConfig) -> Self {
        Self {
            organization: config.organization.clone(),
            project: config.project.clone(),
        }
    }
}

/// One work item as reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemPayload {
    pub id: i64,
    pub rev: i64,
    pub title: String,
    pub work_item_type: String,
    pub state: String,
    pub assigned_to: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i64>,
    pub tags: Option<String>,
    pub area_path: Option<String>,
    pub iteration_path: Option<String>,
    pub parent_id: Option<i64>,
    pub created_date: Option<DateTime<Utc>>,
    pub changed_date: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub changed_by: Option<String>,
}

impl ItemPayload {
    /// Project onto a mirror row. Watermark is set to the payload rev.
    #[must_use]
    pub fn into_work_item(self, sync_config_id: i64, synced_at: DateTime<Utc>) -> WorkItem {
        WorkItem {
            id: self.id,
            sync_config_id,
            rev: self.rev,
            title: self.title,
            work_item_type: self.work_item_type,
            state: self.state,
            assigned_to: self.assigned_to,
            description: self.description,
            priority: self.priority,
            tags: self.tags,
            area_path: self.area_path,
            iteration_path: self.iteration_path,
            parent_id: self.parent_id,
            watermark: Some(self.rev),
            created_date: self.created_date,
            changed_date: self.changed_date,
            created_by: self.created_by,
            changed_by: self.changed_by,
            synced_at: Some(synced_at),
            last_activity_date: self.changed_date,
            deleted_at: None,
        }
    }
}

/// One comment as reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommentPayload {
    pub id: i64,
    pub work_item_id: i64,
    pub text: String,
    pub created_by: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub modified_date: Option<DateTime<Utc>>,
    pub version: i64,
}

impl CommentPayload {
    #[must_use]
    pub fn into_comment(self, sync_config_id: i64, synced_at: DateTime<Utc>) -> WorkItemComment {
        WorkItemComment {
            id: self.id,
            work_item_id: self.work_item_id,
            sync_config_id,
            text: self.text,
            created_by: self.created_by,
            created_date: self.created_date,
            modified_by: self.modified_by,
            modified_date: self.modified_date,
            version: self.version,
            synced_at: Some(synced_at),
        }
    }
}

/// Read access to a remote tracker.
///
/// Implementations retry transient failures internally and only surface
/// `Error::TransientRemote` once their attempt ceiling is reached.
/// Authentication failures and a missing root are returned immediately.
pub trait RemoteSource: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Every id reachable from `root_id` via parent/child links, root included.
    fn fetch_descendant_ids(
        &self,
        scope: &RemoteScope,
        root_id: i64,
    ) -> impl Future<Output = Result<Vec<i64>>> + Send;

    /// Full payloads for `ids`. Ids the tracker no longer knows are omitted.
    fn fetch_item_payloads(
        &self,
        scope: &RemoteScope,
        ids: &[i64],
    ) -> impl Future<Output = Result<Vec<ItemPayload>>> + Send;

    /// Comments on `item_id` with `version > since_version`.
    fn fetch_comments(
        &self,
        scope: &RemoteScope,
        item_id: i64,
        since_version: i64,
    ) -> impl Future<Output = Result<Vec<CommentPayload>>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`RemoteSource`] for boxing.
pub trait RemoteSourceBoxed: Send + Sync {
    fn name(&self) -> &'static str;
    fn fetch_descendant_ids_boxed(&self, scope: RemoteScope, root_id: i64)
        -> BoxFuture<'_, Result<Vec<i64>>>;
    fn fetch_item_payloads_boxed(
        &self,
        scope: RemoteScope,
        ids: Vec<i64>,
    ) -> BoxFuture<'_, Result<Vec<ItemPayload>>>;
    fn fetch_comments_boxed(
        &self,
        scope: RemoteScope,
        item_id: i64,
        since_version: i64,
    ) -> BoxFuture<'_, Result<Vec<CommentPayload>>>;
}

/// Boxed remote source for dynamic dispatch.
///
/// `RemoteSource` returns `impl Future`, so runtime selection (Azure in
/// production, in-process fakes in tests) goes through this wrapper.
pub struct BoxedSource {
    inner: Box<dyn RemoteSourceBoxed>,
}

impl BoxedSource {
    pub fn new<S: RemoteSource + 'static>(source: S) -> Self {
        Self {
            inner: Box::new(BoxedSourceWrapper(source)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// See [`RemoteSource::fetch_descendant_ids`].
    ///
    /// # Errors
    ///
    /// Propagates the adapter's error.
    pub async fn fetch_descendant_ids(&self, scope: &RemoteScope, root_id: i64) -> Result<Vec<i64>> {
        self.inner
            .fetch_descendant_ids_boxed(scope.clone(), root_id)
            .await
    }

    /// See [`RemoteSource::fetch_item_payloads`].
    ///
    /// # Errors
    ///
    /// Propagates the adapter's error.
    pub async fn fetch_item_payloads(
        &self,
        scope: &RemoteScope,
        ids: &[i64],
    ) -> Result<Vec<ItemPayload>> {
        self.inner
            .fetch_item_payloads_boxed(scope.clone(), ids.to_vec())
            .await
    }

    /// See [`RemoteSource::fetch_comments`].
    ///
    /// # Errors
    ///
    /// Propagates the adapter's error.
    pub async fn fetch_comments(
        &self,
        scope: &RemoteScope,
        item_id: i64,
        since_version: i64,
    ) -> Result<Vec<CommentPayload>> {
        self.inner
            .fetch_comments_boxed(scope.clone(), item_id, since_version)
            .await
    }
}

struct BoxedSourceWrapper<S: RemoteSource + 'static>(S);

impl<S: RemoteSource + 'static> RemoteSourceBoxed for BoxedSourceWrapper<S> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn fetch_descendant_ids_boxed(
        &self,
        scope: RemoteScope,
        root_id: i64,
    ) -> BoxFuture<'_, Result<Vec<i64>>> {
        Box::pin(async move { self.0.fetch_descendant_ids(&scope, root_id).await })
    }

    fn fetch_item_payloads_boxed(
        &self,
        scope: RemoteScope,
        ids: Vec<i64>,
    ) -> BoxFuture<'_, Result<Vec<ItemPayload>>> {
        Box::pin(async move { self.0.fetch_item_payloads(&scope, &ids).await })
    }

    fn fetch_comments_boxed(
        &self,
        scope: RemoteScope,
        item_id: i64,
        since_version: i64,
    ) -> BoxFuture<'_, Result<Vec<CommentPayload>>> {
        Box::pin(async move {
            self.0
                .fetch_comments(&scope, item_id, since_version)
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource;

    impl RemoteSource for StaticSource {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch_descendant_ids(&self, _scope: &RemoteScope, root_id: i64) -> Result<Vec<i64>> {
            Ok(vec![root_id, root_id + 1])
        }

        async fn fetch_item_payloads(
            &self,
            _scope: &RemoteScope,
            ids: &[i64],
        ) -> Result<Vec<ItemPayload>> {
            Ok(ids
                .iter()
                .map(|&id| ItemPayload {
                    id,
                    rev: 1,
                    title: format!("Item {id}"),
                    ..ItemPayload::default()
                })
                .collect())
        }

        async fn fetch_comments(
            &self,
            _scope: &RemoteScope,
            item_id: i64,
            since_version: i64,
        ) -> Result<Vec<CommentPayload>> {
            Ok(vec![CommentPayload {
                id: 1,
                work_item_id: item_id,
                version: since_version + 1,
                ..CommentPayload::default()
            }])
        }
    }

    fn scope() -> RemoteScope {
        RemoteScope {
            organization: "contoso".into(),
            project: "Alpha".into(),
        }
    }

    #[tokio::test]
    async fn test_boxed_source_delegates() {
        let source = BoxedSource::new(StaticSource);
        assert_eq!(source.name(), "static");
        assert_eq!(source.fetch_descendant_ids(&scope(), 10).await.unwrap(), vec![10, 11]);

        let payloads = source.fetch_item_payloads(&scope(), &[3, 4]).await.unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[1].title, "Item 4");

        let comments = source.fetch_comments(&scope(), 3, 4).await.unwrap();
        assert_eq!(comments[0].version, 5);
    }

    #[test]
    fn test_payload_projection_sets_watermark() {
        let now = Utc::now();
        let item = ItemPayload {
            id: 7,
            rev: 12,
            title: "Login".into(),
            ..ItemPayload::default()
        }
        .into_work_item(3, now);
        assert_eq!(item.sync_config_id, 3);
        assert_eq!(item.watermark, Some(12));
        assert_eq!(item.synced_at, Some(now));
        assert!(item.deleted_at.is_none());
    }
}
