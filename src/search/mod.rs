//! Smart Search Interpreter.
//!
//! A free-text query is parsed once ([`intent::parse`]) and routed by
//! [`Intent::of`]:
//!
//! - `Filter`: recognized keywords become a [`WorkItemFilter`], each leftover
//!   word must appear in the title, and the Query Service answers with a list
//! - `Question`: up to [`evidence::CANDIDATE_LIMIT`] candidates are ranked
//!   and the top [`evidence::EVIDENCE_SIZE`] are sent to the narrative
//!   generator, bounded by a timeout
//!
//! A timed-out narrative fails the request with `Error::NarrativeTimeout`;
//! it never degrades to a list.

pub mod evidence;
pub mod intent;

pub use intent::{parse, Intent, ParsedQuery};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{SmartSearchResult, WorkItemFilter};
use crate::narrative::BoxedNarrator;
use crate::query::QueryService;
use evidence::{Selection, CANDIDATE_LIMIT};

/// Longest accepted query.
const MAX_QUERY_CHARS: usize = 500;

/// Routes free-text queries to a list or a narrative answer.
pub struct SmartSearch {
    query: QueryService,
    narrator: Arc<BoxedNarrator>,
    timeout: Duration,
}

impl SmartSearch {
    #[must_use]
    pub fn new(query: QueryService, narrator: BoxedNarrator, timeout: Duration) -> Self {
        Self {
            query,
            narrator: Arc::new(narrator),
            timeout,
        }
    }

    /// Interpret `text` against one sync config's mirror.
    ///
    /// # Errors
    ///
    /// - `Error::Validation` for an empty or oversized query
    /// - `Error::SyncConfigNotFound` for an unknown config
    /// - `Error::NarrativeTimeout` if the generator does not answer in time
    /// - `Error::Narrative` if the generator fails
    pub async fn search(&self, text: &str, sync_config_id: i64) -> Result<SmartSearchResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        if text.chars().count() > MAX_QUERY_CHARS {
            return Err(Error::Validation(format!(
                "query must be at most {MAX_QUERY_CHARS} characters"
            )));
        }

        self.query.config(sync_config_id)?;
        let parsed = parse(text);
        let metadata = self.query.metadata(sync_config_id)?;
        let filter = parsed.to_filter(sync_config_id, &metadata, Utc::now());
        let intent = Intent::of(&parsed);
        debug!(config_id = sync_config_id, ?intent, filter = %filter.describe(), "Classified query");

        match intent {
            Intent::Filter => self.list(filter, &parsed),
            Intent::Question => self.narrate(text, filter, &parsed).await,
        }
    }

    fn list(&self, mut filter: WorkItemFilter, parsed: &ParsedQuery) -> Result<SmartSearchResult> {
        filter.terms.clone_from(&parsed.residual);
        let items = self.query.search(&filter)?;
        let explanation = if filter.is_unfiltered() {
            "No filters recognized; showing the most recently changed items".to_string()
        } else {
            filter.describe()
        };
        Ok(SmartSearchResult::list(items, explanation))
    }

    async fn narrate(
        &self,
        question: &str,
        mut filter: WorkItemFilter,
        parsed: &ParsedQuery,
    ) -> Result<SmartSearchResult> {
        if self.query.state_counts(filter.sync_config_id)?.total == 0 {
            return Ok(SmartSearchResult::narrative(
                Vec::new(),
                "There are no synced work items yet, so there is nothing to summarize. \
                 Run a sync for this configuration first."
                    .to_string(),
                "The mirror is empty".to_string(),
            ));
        }

        filter.limit = CANDIDATE_LIMIT;
        let scoped = !filter.is_unfiltered();
        let mut candidates = self.query.search(&filter)?;
        let mut widened = false;
        if candidates.is_empty() && scoped {
            let mut all = WorkItemFilter::for_config(filter.sync_config_id);
            all.limit = CANDIDATE_LIMIT;
            candidates = self.query.search(&all)?;
            widened = true;
        }
        let candidate_count = candidates.len();

        let (evidence, selection) = evidence::select(candidates, &parsed.residual);

        let narrative = tokio::time::timeout(
            self.timeout,
            self.narrator.generate(question, &evidence),
        )
        .await
        .map_err(|_| Error::NarrativeTimeout(self.timeout))??;

        let mut explanation = match selection {
            Selection::KeywordOverlap => format!(
                "Answered from {} of {candidate_count} candidate items ranked by overlap with: {}",
                evidence.len(),
                parsed.residual.join(", ")
            ),
            Selection::MostRecent => format!(
                "Answered from the {} most recently changed of {candidate_count} candidate items",
                evidence.len()
            ),
        };
        if scoped && !widened {
            explanation.push_str(&format!(" (filtered by {})", filter.describe()));
        } else if widened {
            explanation.push_str(&format!(
                " (no items matched {}; searched the whole mirror)",
                filter.describe()
            ));
        }

        info!(
            config_id = filter.sync_config_id,
            evidence = evidence.len(),
            narrator = self.narrator.name(),
            "Narrative answer generated"
        );
        Ok(SmartSearchResult::narrative(evidence, narrative, explanation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeletionPolicy, NewSyncConfig, ResponseType, WorkItem};
    use crate::narrative::NarrativeGenerator;
    use crate::remote::ItemPayload;
    use crate::storage::{self, MirrorDiff, SqliteStorage};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedNarrator {
        calls: Arc<AtomicUsize>,
        delay: Option<Duration>,
    }

    impl NarrativeGenerator for CannedNarrator {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn generate(&self, _question: &str, evidence: &[WorkItem]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(format!("**{}** items considered; see #{}", evidence.len(), evidence[0].id))
        }
    }

    fn item(id: i64, title: &str, ty: &str, assignee: Option<&str>) -> WorkItem {
        ItemPayload {
            id,
            rev: 1,
            title: title.into(),
            work_item_type: ty.into(),
            state: "Active".into(),
            assigned_to: assignee.map(str::to_string),
            parent_id: (id != 1).then_some(1),
            ..ItemPayload::default()
        }
        .into_work_item(1, Utc::now())
    }

    fn interpreter(seed: bool, delay: Option<Duration>) -> (SmartSearch, Arc<AtomicUsize>, i64) {
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
        if seed {
            let diff = MirrorDiff {
                added: vec![
                    item(1, "Q3 release", "Epic", None),
                    item(2, "Login fails on Safari", "Bug", Some("Alice")),
                    item(3, "Release blocked by signing cert", "Bug", Some("Bob")),
                    item(4, "Checkout crash", "Bug", Some("Alice")),
                    item(5, "Write release notes", "Task", Some("Alice")),
                ],
                ..MirrorDiff::default()
            };
            store
                .apply_mirror_diff(config.id, &diff, DeletionPolicy::Hard, Utc::now(), "test")
                .unwrap();
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let narrator = BoxedNarrator::new(CannedNarrator {
            calls: calls.clone(),
            delay,
        });
        let search = SmartSearch::new(
            QueryService::new(storage::shared(store)),
            narrator,
            Duration::from_millis(50),
        );
        (search, calls, config.id)
    }

    #[tokio::test]
    async fn test_filter_query_returns_matching_list() {
        let (search, calls, id) = interpreter(true, None);
        let result = search.search("bugs assigned to Alice", id).await.unwrap();
        assert_eq!(result.response_type, ResponseType::List);
        assert!(result.narrative.is_none());
        assert_eq!(result.items.len(), 2);
        assert!(result
            .items
            .iter()
            .all(|i| i.work_item_type == "Bug" && i.assigned_to.as_deref() == Some("Alice")));
        assert_eq!(result.explanation, "type=Bug, assignedTo=Alice");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_topic_word_without_question_stays_a_list() {
        let (search, calls, id) = interpreter(true, None);
        let result = search.search("bugs with status active", id).await.unwrap();
        assert_eq!(result.response_type, ResponseType::List);
        assert_eq!(result.items.len(), 3);
        assert_eq!(result.explanation, "type=Bug, state=Active");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_leftover_words_match_independently() {
        let (search, _, id) = interpreter(true, None);
        let result = search.search("safari login bugs", id).await.unwrap();
        assert_eq!(result.response_type, ResponseType::List);
        assert_eq!(result.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2]);

        let result = search.search("stale bugs not closed", id).await.unwrap();
        assert_eq!(result.response_type, ResponseType::List);
        assert_eq!(result.items.len(), 3);
        assert!(result.explanation.contains("state!=Closed"));
        assert!(result.explanation.contains("inactiveSince="));
    }

    #[tokio::test]
    async fn test_question_returns_narrative_with_bounded_evidence() {
        let (search, calls, id) = interpreter(true, None);
        let result = search.search("what's blocking the release?", id).await.unwrap();
        assert_eq!(result.response_type, ResponseType::Narrative);
        assert!(!result.narrative.as_deref().unwrap_or_default().is_empty());
        assert!(!result.items.is_empty());
        assert!(result.items.len() <= evidence::EVIDENCE_SIZE);
        assert!(result.items.iter().all(|i| i.title.to_lowercase().contains("release")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_narrative_timeout_is_an_error() {
        let (search, _, id) = interpreter(true, Some(Duration::from_secs(5)));
        let err = search
            .search("summarize the release risks", id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NarrativeTimeout(_)));
    }

    #[tokio::test]
    async fn test_empty_mirror_skips_generator() {
        let (search, calls, id) = interpreter(false, None);
        let result = search.search("what's blocking the release?", id).await.unwrap();
        assert_eq!(result.response_type, ResponseType::Narrative);
        assert!(result.items.is_empty());
        assert!(result.narrative.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejects_empty_query_and_unknown_config() {
        let (search, _, _) = interpreter(true, None);
        assert!(matches!(search.search("   ", 1).await, Err(Error::Validation(_))));
        assert!(matches!(
            search.search("what's blocking the release?", 99).await,
            Err(Error::SyncConfigNotFound { id: 99 })
        ));
    }
}
