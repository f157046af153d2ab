//! Reconciliation engine.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::comments::CommentSync;
use super::diff::classify;
use super::registry::{RunGuard, RunRegistry, SyncPhase};
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::model::{SyncConfig, SyncCounts, SyncResult};
use crate::remote::{BoxedSource, ItemPayload, RemoteScope};
use crate::storage::{self, SharedStorage};

const ACTOR: &str = "sync";
const EVENT_CAPACITY: usize = 64;

/// Published after every committed run.
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    Changed {
        sync_config_id: i64,
        result: SyncResult,
    },
}

/// Remote items a run saw but did not write.
#[derive(Debug, Clone, Copy)]
struct Skipped {
    unchanged: usize,
    regressed: usize,
}

/// Drives sync runs for any number of configs.
///
/// Runs for different configs may overlap; a second run for the same config
/// is rejected with `Error::SyncConflict`.
pub struct SyncEngine {
    storage: SharedStorage,
    source: Arc<BoxedSource>,
    settings: SyncSettings,
    registry: RunRegistry,
    events: broadcast::Sender<MirrorEvent>,
    shutdown: CancellationToken,
}

impl SyncEngine {
    #[must_use]
    pub fn new(storage: SharedStorage, source: BoxedSource, settings: SyncSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            source: Arc::new(source),
            settings,
            registry: RunRegistry::new(),
            events,
            shutdown: CancellationToken::new(),
        }
    }

    /// Use an externally owned token; cancelling it stops every run.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }

    #[must_use]
    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Name of the remote adapter, for diagnostics.
    #[must_use]
    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Subscribe to mirror-changed notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEvent> {
        self.events.subscribe()
    }

    /// Run one reconciliation for `sync_config_id`.
    ///
    /// On success the diff is committed, `last_synced` moves, comments are
    /// synced for touched items, and the completed result is recorded. On
    /// failure before commit the mirror is untouched and a failed result is
    /// recorded before the error is returned.
    ///
    /// # Errors
    ///
    /// - `Error::SyncConflict` if a run for this config is in flight
    /// - `Error::SyncConfigNotFound` if the config does not exist
    /// - any remote or storage error that aborted the run
    pub async fn execute(&self, sync_config_id: i64) -> Result<SyncResult> {
        let guard = self.registry.try_acquire(sync_config_id)?;
        let config = storage::lock(&self.storage).require_sync_config(sync_config_id)?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let timer = Instant::now();
        info!(config_id = config.id, epic_id = config.epic_id, run_id = %run_id, "Sync started");

        let outcome = self.reconcile(&config, &guard).await;
        let elapsed_ms = u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok((counts, skipped)) => {
                guard.advance(SyncPhase::Completed);
                let result = SyncResult::completed(config.id, run_id, started_at, counts, elapsed_ms);
                self.record(&result);
                info!(
                    config_id = config.id,
                    added = counts.added,
                    updated = counts.updated,
                    deleted = counts.deleted,
                    comments = counts.comments,
                    unchanged = skipped.unchanged,
                    regressed = skipped.regressed,
                    duration = %result.duration,
                    "Sync completed"
                );
                // No subscribers is fine.
                let _ = self.events.send(MirrorEvent::Changed {
                    sync_config_id: config.id,
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(e) => {
                guard.advance(SyncPhase::Failed);
                let result =
                    SyncResult::failed(config.id, run_id, started_at, e.to_string(), elapsed_ms);
                self.record(&result);
                warn!(config_id = config.id, error = %e, "Sync failed, mirror left unchanged");
                Err(e)
            }
        }
    }

    fn record(&self, result: &SyncResult) {
        if let Err(e) = storage::lock(&self.storage).record_sync_run(result, ACTOR) {
            warn!(config_id = result.sync_config_id, error = %e, "Failed to record sync run");
        }
    }

    fn checkpoint(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    async fn reconcile(&self, config: &SyncConfig, guard: &RunGuard) -> Result<(SyncCounts, Skipped)> {
        let scope = RemoteScope::from(config);

        // Fetching
        self.checkpoint()?;
        let ids = tokio::select! {
            () = self.shutdown.cancelled() => return Err(Error::Cancelled),
            ids = self.source.fetch_descendant_ids(&scope, config.epic_id) => ids?,
        };
        let payloads = self.fetch_payloads(&scope, &ids).await?;

        // Diffing
        guard.advance(SyncPhase::Diffing);
        let mirrored = storage::lock(&self.storage).mirrored_revs(config.id)?;
        let synced_at = Utc::now();
        let classification = classify(config.id, config.epic_id, payloads, &mirrored, synced_at);
        let skipped = Skipped {
            unchanged: classification.unchanged,
            regressed: classification.regressed.len(),
        };
        let diff = classification.diff;

        // Applying
        guard.advance(SyncPhase::Applying);
        self.checkpoint()?;
        storage::lock(&self.storage).apply_mirror_diff(
            config.id,
            &diff,
            self.settings.deletion_policy,
            synced_at,
            ACTOR,
        )?;

        let mut counts = SyncCounts {
            added: diff.added.len() as u64,
            updated: diff.updated.len() as u64,
            deleted: diff.removed.len() as u64,
            comments: 0,
        };

        // Committed; comment failures no longer fail the run.
        let (targets, full) = self.comment_targets(config.id, &diff);
        counts.comments = CommentSync {
            storage: &self.storage,
            source: &self.source,
            config,
            max_concurrency: self.settings.max_concurrency,
            cancel: &self.shutdown,
        }
        .run(&targets, full, ACTOR)
        .await;

        Ok((counts, skipped))
    }

    /// Items whose comments need syncing, and whether this is a full refresh.
    fn comment_targets(&self, sync_config_id: i64, diff: &storage::MirrorDiff) -> (Vec<i64>, bool) {
        let interval = self.settings.comment_refresh_interval;
        if interval > 0 {
            let store = storage::lock(&self.storage);
            let due = store
                .completed_run_count(sync_config_id)
                .is_ok_and(|n| n > 0 && n % interval == 0);
            if due {
                match store.live_item_ids(sync_config_id) {
                    Ok(ids) => {
                        info!(config_id = sync_config_id, items = ids.len(), "Full comment refresh");
                        return (ids, true);
                    }
                    Err(e) => warn!(config_id = sync_config_id, error = %e, "Full comment refresh skipped"),
                }
            }
        }

        let ids = diff
            .added
            .iter()
            .chain(&diff.updated)
            .map(|item| item.id)
            .collect();
        (ids, false)
    }

    /// Fetch payloads in batches, at most `max_concurrency` in flight.
    async fn fetch_payloads(&self, scope: &RemoteScope, ids: &[i64]) -> Result<Vec<ItemPayload>> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut join_set: JoinSet<Result<Vec<ItemPayload>>> = JoinSet::new();

        for chunk in ids.chunks(self.settings.batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let source = Arc::clone(&self.source);
            let scope = scope.clone();
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.shutdown.clone();

            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| Error::Other("payload fetch semaphore closed".into()))?;
                tokio::select! {
                    () = cancel.cancelled() => Err(Error::Cancelled),
                    r = source.fetch_item_payloads(&scope, &chunk) => r,
                }
            });
        }

        let mut payloads = Vec::with_capacity(ids.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(batch)) => payloads.extend(batch),
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(Error::Other(format!("payload fetch task failed: {e}"))),
            }
        }
        Ok(payloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeletionPolicy, NewSyncConfig, SyncStatus, WorkItemFilter};
    use crate::remote::{CommentPayload, RemoteSource, RetryPolicy};
    use crate::storage::SqliteStorage;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-process tracker whose tree can be edited between runs.
    #[derive(Clone, Default)]
    struct FakeTracker {
        items: Arc<Mutex<BTreeMap<i64, ItemPayload>>>,
        comments: Arc<Mutex<HashMap<i64, Vec<CommentPayload>>>>,
        failing_comments: Arc<Mutex<HashSet<i64>>>,
        fail_payloads: Arc<Mutex<Option<Error>>>,
        delay: Option<Duration>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        comment_calls: Arc<AtomicUsize>,
    }

    impl FakeTracker {
        fn put(&self, id: i64, rev: i64, parent: Option<i64>, ty: &str, assignee: Option<&str>) {
            self.items.lock().unwrap().insert(
                id,
                ItemPayload {
                    id,
                    rev,
                    parent_id: parent,
                    title: format!("Item {id}"),
                    work_item_type: ty.into(),
                    state: "Active".into(),
                    assigned_to: assignee.map(str::to_string),
                    ..ItemPayload::default()
                },
            );
        }

        fn bump(&self, id: i64) {
            if let Some(item) = self.items.lock().unwrap().get_mut(&id) {
                item.rev += 1;
            }
        }

        fn remove(&self, id: i64) {
            self.items.lock().unwrap().remove(&id);
        }

        fn comment(&self, item_id: i64, id: i64, version: i64, text: &str) {
            let mut all = self.comments.lock().unwrap();
            let list = all.entry(item_id).or_default();
            list.retain(|c| c.id != id);
            list.push(CommentPayload {
                id,
                work_item_id: item_id,
                text: text.into(),
                version,
                ..CommentPayload::default()
            });
        }

        fn descendants(&self, root: i64) -> Vec<i64> {
            let items = self.items.lock().unwrap();
            if !items.contains_key(&root) {
                return Vec::new();
            }
            let mut out = vec![root];
            let mut i = 0;
            while i < out.len() {
                let parent = out[i];
                out.extend(items.values().filter(|p| p.parent_id == Some(parent)).map(|p| p.id));
                i += 1;
            }
            out
        }
    }

    impl RemoteSource for FakeTracker {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_descendant_ids(&self, _scope: &RemoteScope, root_id: i64) -> Result<Vec<i64>> {
            Ok(self.descendants(root_id))
        }

        async fn fetch_item_payloads(&self, _scope: &RemoteScope, ids: &[i64]) -> Result<Vec<ItemPayload>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(e) = self.fail_payloads.lock().unwrap().take() {
                return Err(e);
            }
            let items = self.items.lock().unwrap();
            Ok(ids.iter().filter_map(|id| items.get(id).cloned()).collect())
        }

        async fn fetch_comments(
            &self,
            _scope: &RemoteScope,
            item_id: i64,
            since_version: i64,
        ) -> Result<Vec<CommentPayload>> {
            self.comment_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_comments.lock().unwrap().contains(&item_id) {
                return Err(Error::TransientRemote {
                    message: "comments unavailable".into(),
                    retry_after: None,
                });
            }
            Ok(self
                .comments
                .lock()
                .unwrap()
                .get(&item_id)
                .map(|list| list.iter().filter(|c| c.version > since_version).cloned().collect())
                .unwrap_or_default())
        }
    }

    fn settings() -> SyncSettings {
        SyncSettings {
            batch_size: 2,
            max_concurrency: 2,
            retry: RetryPolicy::none(),
            deletion_policy: DeletionPolicy::Hard,
            comment_refresh_interval: 0,
        }
    }

    fn setup(tracker: &FakeTracker, settings: SyncSettings) -> (SyncEngine, i64) {
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
        let engine = SyncEngine::new(storage::shared(store), BoxedSource::new(tracker.clone()), settings);
        (engine, config.id)
    }

    /// Epic 1 -> features 2, 3 -> bug 4 under 2.
    fn seeded() -> FakeTracker {
        let t = FakeTracker::default();
        t.put(1, 1, None, "Epic", None);
        t.put(2, 1, Some(1), "Feature", Some("Alice"));
        t.put(3, 1, Some(1), "Feature", None);
        t.put(4, 1, Some(2), "Bug", Some("Alice"));
        t
    }

    fn mirrored(engine: &SyncEngine, config_id: i64) -> HashMap<i64, i64> {
        storage::lock(engine.storage())
            .mirrored_revs(config_id)
            .unwrap()
            .into_iter()
            .map(|(id, e)| (id, e.rev))
            .collect()
    }

    #[tokio::test]
    async fn test_first_run_then_idempotent_second_run() {
        let tracker = seeded();
        let (engine, id) = setup(&tracker, settings());

        let first = engine.execute(id).await.unwrap();
        assert_eq!(first.status, SyncStatus::Completed);
        assert_eq!((first.items_added, first.items_updated, first.items_deleted), (4, 0, 0));
        assert_eq!(first.items_synced, 4);

        let second = engine.execute(id).await.unwrap();
        assert_eq!((second.items_added, second.items_updated, second.items_deleted), (0, 0, 0));

        let store = storage::lock(engine.storage());
        assert!(store.get_sync_config(id).unwrap().unwrap().last_synced.is_some());
        assert_eq!(store.list_sync_runs(id, 10).unwrap().len(), 2);
        let child = store.get_work_item(id, 4).unwrap().unwrap();
        assert_eq!(child.parent_id, Some(2));
    }

    #[tokio::test]
    async fn test_updates_match_remote_rev_and_watermark_is_monotonic() {
        let tracker = seeded();
        let (engine, id) = setup(&tracker, settings());
        engine.execute(id).await.unwrap();
        let before = mirrored(&engine, id);

        tracker.bump(2);
        tracker.bump(4);
        let result = engine.execute(id).await.unwrap();
        assert_eq!(result.items_updated, 2);

        let after = mirrored(&engine, id);
        let remote = tracker.items.lock().unwrap().clone();
        for (item_id, rev) in &after {
            assert_eq!(*rev, remote[item_id].rev);
            assert!(*rev >= before[item_id]);
        }
        let store = storage::lock(engine.storage());
        let item = store.get_work_item(id, 4).unwrap().unwrap();
        assert_eq!(item.watermark, Some(2));
    }

    #[tokio::test]
    async fn test_removed_and_reparented_out_items_are_deleted() {
        let tracker = seeded();
        let (engine, id) = setup(&tracker, settings());
        engine.execute(id).await.unwrap();

        tracker.remove(3);
        // Moved under an item outside the epic.
        tracker.put(4, 2, Some(500), "Bug", Some("Alice"));

        let result = engine.execute(id).await.unwrap();
        assert_eq!(result.items_deleted, 2);
        assert_eq!(result.items_updated, 0);

        let store = storage::lock(engine.storage());
        assert!(store.get_work_item(id, 3).unwrap().is_none());
        assert!(store.get_work_item(id, 4).unwrap().is_none());
        assert_eq!(store.live_item_ids(id).unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_missing_root_empties_mirror() {
        let tracker = seeded();
        let (engine, id) = setup(&tracker, settings());
        engine.execute(id).await.unwrap();

        tracker.items.lock().unwrap().clear();
        let result = engine.execute(id).await.unwrap();
        assert_eq!(result.items_deleted, 4);
        assert!(mirrored(&engine, id).is_empty());
    }

    #[tokio::test]
    async fn test_tombstone_policy_hides_and_revives() {
        let tracker = seeded();
        let mut s = settings();
        s.deletion_policy = DeletionPolicy::Tombstone;
        let (engine, id) = setup(&tracker, s);
        engine.execute(id).await.unwrap();

        tracker.remove(3);
        assert_eq!(engine.execute(id).await.unwrap().items_deleted, 1);
        {
            let store = storage::lock(engine.storage());
            let visible = store.search_work_items(&WorkItemFilter::for_config(id)).unwrap();
            assert!(visible.iter().all(|i| i.id != 3));
        }

        tracker.put(3, 2, Some(1), "Feature", None);
        assert_eq!(engine.execute(id).await.unwrap().items_added, 1);
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_mirror_unchanged() {
        let tracker = seeded();
        let (engine, id) = setup(&tracker, settings());
        engine.execute(id).await.unwrap();
        let before = mirrored(&engine, id);
        let last_synced = storage::lock(engine.storage())
            .get_sync_config(id)
            .unwrap()
            .unwrap()
            .last_synced;

        tracker.bump(2);
        tracker.remove(3);
        // Negative revs violate the store's CHECK constraint mid-write.
        tracker.put(9, -1, Some(1), "Task", None);

        let err = engine.execute(id).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(mirrored(&engine, id), before);

        let store = storage::lock(engine.storage());
        assert_eq!(store.get_sync_config(id).unwrap().unwrap().last_synced, last_synced);
        let runs = store.list_sync_runs(id, 1).unwrap();
        assert_eq!(runs[0].status, SyncStatus::Failed);
        assert!(runs[0].error.is_some());
    }

    #[tokio::test]
    async fn test_transient_fetch_failure_fails_run() {
        let tracker = seeded();
        let (engine, id) = setup(&tracker, settings());
        *tracker.fail_payloads.lock().unwrap() = Some(Error::TransientRemote {
            message: "503".into(),
            retry_after: None,
        });
        let err = engine.execute(id).await.unwrap_err();
        assert!(err.is_transient());
        assert!(mirrored(&engine, id).is_empty());
        assert!(!engine.registry().is_running(id));
    }

    #[tokio::test]
    async fn test_concurrent_execute_conflicts() {
        let mut tracker = seeded();
        tracker.delay = Some(Duration::from_millis(30));
        let (engine, id) = setup(&tracker, settings());

        let (a, b) = tokio::join!(engine.execute(id), engine.execute(id));
        let outcomes = [a, b];
        let completed = outcomes.iter().filter(|r| r.is_ok()).count();
        let conflicts = outcomes
            .iter()
            .filter(|r| matches!(r, Err(Error::SyncConflict { .. })))
            .count();
        assert_eq!((completed, conflicts), (1, 1));
    }

    #[tokio::test]
    async fn test_batch_fetch_concurrency_is_bounded() {
        let mut tracker = FakeTracker::default();
        tracker.delay = Some(Duration::from_millis(10));
        tracker.put(1, 1, None, "Epic", None);
        for id in 2..=12 {
            tracker.put(id, 1, Some(1), "Task", None);
        }
        let (engine, id) = setup(&tracker, settings());
        let result = engine.execute(id).await.unwrap();
        assert_eq!(result.items_added, 12);
        let peak = tracker.max_in_flight.load(Ordering::SeqCst);
        assert!(peak >= 1 && peak <= 2, "peak in-flight batches: {peak}");
    }

    #[tokio::test]
    async fn test_cancelled_run_discards_diff() {
        let mut tracker = seeded();
        tracker.delay = Some(Duration::from_millis(200));
        let (engine, id) = setup(&tracker, settings());
        let token = engine.cancellation_token();

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        };
        let (outcome, ()) = tokio::join!(engine.execute(id), cancel);
        assert!(matches!(outcome, Err(Error::Cancelled)));
        assert!(mirrored(&engine, id).is_empty());
    }

    #[tokio::test]
    async fn test_comments_sync_incrementally_and_skip_failures() {
        let tracker = seeded();
        tracker.comment(2, 100, 1, "first");
        tracker.comment(4, 200, 1, "on the bug");
        tracker.failing_comments.lock().unwrap().insert(3);
        let (engine, id) = setup(&tracker, settings());

        let first = engine.execute(id).await.unwrap();
        assert_eq!(first.status, SyncStatus::Completed);
        assert_eq!(first.comments_synced, 2);

        // Edit one comment and touch its item.
        tracker.comment(2, 100, 2, "first, edited");
        tracker.bump(2);
        let second = engine.execute(id).await.unwrap();
        assert_eq!(second.comments_synced, 1);

        // Unchanged items are not refetched.
        let calls_before = tracker.comment_calls.load(Ordering::SeqCst);
        engine.execute(id).await.unwrap();
        assert_eq!(tracker.comment_calls.load(Ordering::SeqCst), calls_before);

        let store = storage::lock(engine.storage());
        let comments = store.get_comments(id, 2).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "first, edited");
        assert_eq!(comments[0].version, 2);
    }

    #[tokio::test]
    async fn test_new_comment_after_edit_is_mirrored() {
        let tracker = seeded();
        tracker.comment(2, 100, 1, "first");
        let (engine, id) = setup(&tracker, settings());
        engine.execute(id).await.unwrap();

        tracker.comment(2, 100, 3, "first, edited twice");
        tracker.bump(2);
        assert_eq!(engine.execute(id).await.unwrap().comments_synced, 1);

        // A fresh comment starts at version 1, below the edited one.
        tracker.comment(2, 101, 1, "second");
        tracker.bump(2);
        let third = engine.execute(id).await.unwrap();
        assert_eq!(third.comments_synced, 1);

        let store = storage::lock(engine.storage());
        let mut ids: Vec<i64> = store.get_comments(id, 2).unwrap().iter().map(|c| c.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![100, 101]);
    }

    #[tokio::test]
    async fn test_periodic_full_comment_refresh() {
        let tracker = seeded();
        let mut s = settings();
        s.comment_refresh_interval = 2;
        let (engine, id) = setup(&tracker, s);
        engine.execute(id).await.unwrap();

        let calls_before = tracker.comment_calls.load(Ordering::SeqCst);
        let second = engine.execute(id).await.unwrap();
        assert_eq!(second.items_updated, 0);
        // Second completed run refreshes all four items.
        assert_eq!(tracker.comment_calls.load(Ordering::SeqCst) - calls_before, 4);
    }

    #[tokio::test]
    async fn test_subscribers_are_notified() {
        let tracker = seeded();
        let (engine, id) = setup(&tracker, settings());
        let mut rx = engine.subscribe();
        engine.execute(id).await.unwrap();
        let MirrorEvent::Changed {
            sync_config_id,
            result,
        } = rx.recv().await.unwrap();
        assert_eq!(sync_config_id, id);
        assert_eq!(result.items_added, 4);
    }

    #[tokio::test]
    async fn test_unknown_config() {
        let tracker = seeded();
        let (engine, _) = setup(&tracker, settings());
        let err = engine.execute(404).await.unwrap_err();
        assert!(matches!(err, Error::SyncConfigNotFound { id: 404 }));
        assert!(!engine.registry().is_running(404));
    }
}
