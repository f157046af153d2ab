//! Evidence selection for narrative answers.

use std::cmp::Reverse;

use crate::model::WorkItem;

/// Candidates pulled from the mirror before ranking.
pub const CANDIDATE_LIMIT: u32 = 500;

/// Items handed to the narrative generator.
pub const EVIDENCE_SIZE: usize = 15;

/// How the evidence set was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Items overlapping the query terms, best first.
    KeywordOverlap,
    /// No overlap; most recently changed items.
    MostRecent,
}

/// Rank `candidates` by overlap with `terms` and keep at most
/// [`EVIDENCE_SIZE`]. Title hits weigh double; ties go to the most recently
/// changed item, then the lower id.
#[must_use]
pub fn select(mut candidates: Vec<WorkItem>, terms: &[String]) -> (Vec<WorkItem>, Selection) {
    let stems: Vec<String> = terms.iter().map(|t| stem(t)).collect();

    let mut scored: Vec<(usize, WorkItem)> = candidates
        .drain(..)
        .map(|item| (score(&item, &stems), item))
        .collect();

    let selection = if scored.iter().any(|(s, _)| *s > 0) {
        scored.retain(|(s, _)| *s > 0);
        Selection::KeywordOverlap
    } else {
        Selection::MostRecent
    };

    scored.sort_by_key(|(s, item)| (Reverse(*s), Reverse(item.changed_date), item.id));
    let evidence = scored
        .into_iter()
        .take(EVIDENCE_SIZE)
        .map(|(_, item)| item)
        .collect();
    (evidence, selection)
}

fn score(item: &WorkItem, stems: &[String]) -> usize {
    let title = item.title.to_lowercase();
    let meta = format!(
        "{} {} {}",
        item.tags.as_deref().unwrap_or_default(),
        item.state,
        item.work_item_type
    )
    .to_lowercase();

    stems
        .iter()
        .map(|s| {
            if title.contains(s.as_str()) {
                2
            } else if meta.contains(s.as_str()) {
                1
            } else {
                0
            }
        })
        .sum()
}

/// Strip a common English suffix so `blockers` and `blocking` both match
/// `block`.
fn stem(term: &str) -> String {
    let term = term.to_lowercase();
    for suffix in ["ing", "ers", "er", "ed", "es", "s"] {
        if let Some(root) = term.strip_suffix(suffix) {
            if root.chars().count() >= 3 {
                return root.to_string();
            }
        }
    }
    term
}
