//! Comment sync sub-engine.
//!
//! Runs after the item diff has committed. Each item is fetched and written
//! independently; a failure for one item is logged and skipped, leaving its
//! comments stale until the next run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{SyncConfig, WorkItemComment};
use crate::remote::{BoxedSource, RemoteScope};
use crate::storage::{self, SharedStorage};

/// Inputs for one comment pass.
pub struct CommentSync<'a> {
    pub storage: &'a SharedStorage,
    pub source: &'a Arc<BoxedSource>,
    pub config: &'a SyncConfig,
    pub max_concurrency: usize,
    pub cancel: &'a CancellationToken,
}

impl CommentSync<'_> {
    /// Sync comments for `item_ids`. With `full`, every fetched comment is
    /// offered to the store; otherwise only comments that are new or whose
    /// version is above their own stored version.
    ///
    /// Returns how many comments were newly written or version-bumped.
    pub async fn run(&self, item_ids: &[i64], full: bool, actor: &str) -> u64 {
        if item_ids.is_empty() {
            return 0;
        }

        let config_id = self.config.id;
        let scope = RemoteScope::from(self.config);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency.max(1)));
        let mut join_set: JoinSet<(i64, Result<Vec<WorkItemComment>>)> = JoinSet::new();

        for &item_id in item_ids {
            let known = if full {
                HashMap::new()
            } else {
                match storage::lock(self.storage).comment_versions(config_id, item_id) {
                    Ok(versions) => versions,
                    Err(e) => {
                        warn!(config_id, item_id, error = %e, "Skipping comments, stored versions unreadable");
                        continue;
                    }
                }
            };

            let source = Arc::clone(self.source);
            let scope = scope.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();

            join_set.spawn(async move {
                let fetched = async {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|_| Error::Other("comment fetch semaphore closed".into()))?;
                    tokio::select! {
                        () = cancel.cancelled() => Err(Error::Cancelled),
                        r = source.fetch_comments(&scope, item_id, 0) => r,
                    }
                }
                .await;
                let synced_at = Utc::now();
                let comments = fetched.map(|payloads| {
                    payloads
                        .into_iter()
                        .filter(|p| known.get(&p.id).is_none_or(|&stored| p.version > stored))
                        .map(|p| p.into_comment(config_id, synced_at))
                        .collect()
                });
                (item_id, comments)
            });
        }

        let mut written = 0u64;
        while let Some(joined) = join_set.join_next().await {
            let (item_id, comments) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(config_id, error = %e, "Comment fetch task failed");
                    continue;
                }
            };

            match comments {
                Ok(comments) if comments.is_empty() => {}
                Ok(comments) => {
                    match storage::lock(self.storage).upsert_comments(config_id, item_id, &comments, actor) {
                        Ok(n) => written += n,
                        Err(e) => warn!(config_id, item_id, error = %e, "Failed to store comments"),
                    }
                }
                Err(Error::Cancelled) => {
                    debug!(config_id, item_id, "Comment sync cancelled");
                }
                Err(e) => warn!(config_id, item_id, error = %e, "Failed to fetch comments, skipping"),
            }
        }

        written
    }
}
