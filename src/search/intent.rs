//! Free-text parsing and intent classification.
//!
//! [`parse`] pulls type, state, assignee, iteration and time keywords out of
//! a query and keeps whatever content words are left. [`Intent::of`] then
//! makes the one list-or-narrative decision.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

use crate::model::{SortColumn, SortDir, WorkItemFilter, WorkItemMetadata};

/// How a free-text query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    /// Structured filter, answered with a list.
    #[default]
    Filter,
    /// Synthesis across items, answered with a narrative.
    Question,
}

impl Intent {
    /// Question intent needs a question signal (interrogative word, `?`,
    /// or synthesis verb) and something to synthesize: a synthesis verb,
    /// a topic noun asked about, or content words the filter parse did not
    /// consume. Anything else is `Filter`.
    #[must_use]
    pub fn of(parsed: &ParsedQuery) -> Self {
        let signal = parsed.interrogative || parsed.synthesis;
        let substance = parsed.synthesis
            || (parsed.interrogative && parsed.topic)
            || !parsed.residual.is_empty();
        if signal && substance {
            Self::Question
        } else {
            Self::Filter
        }
    }
}

/// A changed-date window named in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recency {
    Today,
    Yesterday,
    ThisWeek,
    LastDays(u32),
}

/// Inactivity threshold for "stale" without a number.
pub const DEFAULT_STALE_DAYS: u32 = 30;

/// Keywords recognized in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub work_item_type: Option<String>,
    pub state: Option<String>,
    pub assigned_to: Option<String>,
    pub unassigned: bool,
    /// Iteration name as typed, e.g. `Sprint 3`.
    pub iteration: Option<String>,
    /// Canonical states to exclude (`not closed`, `open`).
    pub not_states: Vec<String>,
    pub recency: Option<Recency>,
    /// Days without a change or comment.
    pub stale_days: Option<u32>,
    /// Content words not consumed by the keyword parse, lowercased.
    pub residual: Vec<String>,
    pub interrogative: bool,
    pub synthesis: bool,
    /// A topic noun such as `status` or `risks`; only a question signal
    /// when asked about.
    pub topic: bool,
}

const TYPES: &[(&[&str], &str)] = &[
    (&["bug", "bugs", "defect", "defects"], "Bug"),
    (&["task", "tasks"], "Task"),
    (&["story", "stories"], "User Story"),
    (&["feature", "features"], "Feature"),
    (&["epic", "epics"], "Epic"),
];

const STATES: &[(&str, &str)] = &[
    ("new", "New"),
    ("active", "Active"),
    ("resolved", "Resolved"),
    ("closed", "Closed"),
    ("done", "Done"),
    ("removed", "Removed"),
];

const INTERROGATIVES: &[&str] = &[
    "what", "what's", "whats", "why", "how", "who", "who's", "when", "where", "which", "is",
    "are", "does", "do", "can", "should", "will",
];

const SYNTHESIS: &[&str] = &[
    "summarize", "summarise", "summary", "explain", "compare", "comparison", "overview",
    "describe", "why",
];

const TOPICS: &[&str] = &[
    "risk", "risks", "blocking", "blocker", "blockers", "status", "progress", "highlights",
    "happened", "happening", "changed", "updated", "modified",
];

/// States an `open` item is not in.
const CLOSED_STATES: &[&str] = &["Closed", "Done", "Removed"];

/// Verbs in `not <verb> in N days`.
const ACTIVITY_VERBS: &[&str] = &["updated", "touched", "changed", "handled", "modified", "moved"];

const STOPWORDS: &[&str] = &[
    "a", "about", "all", "an", "and", "any", "are", "by", "can", "do", "does", "find", "for",
    "from", "get", "give", "has", "have", "i", "in", "is", "it", "items", "list", "me", "my",
    "of", "on", "or", "please", "show", "that", "the", "there", "these", "this", "those", "to",
    "what", "what's", "whats", "which", "who", "with", "work", "workitems", "how", "when",
    "where", "why", "should", "will", "us", "we", "our", "currently", "right", "now", "not",
];

/// Words that end an `assigned to <name>` phrase.
const NAME_TERMINATORS: &[&str] = &[
    "in", "with", "and", "that", "which", "for", "on", "from", "sprint", "iteration", "state",
    "where", "who", "is", "are", "today", "yesterday", "this", "last", "past", "not", "stale",
    "open",
];

/// Parse a free-text query.
#[must_use]
pub fn parse(query: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery {
        interrogative: query.contains('?'),
        ..ParsedQuery::default()
    };

    let words: Vec<&str> = query
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\\' || c == '-' || c == '.'))
        .map(|w| w.trim_matches(|c: char| c == '\'' || c == '.' || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();
    let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();

    if lower
        .first()
        .is_some_and(|w| INTERROGATIVES.contains(&w.as_str()))
    {
        parsed.interrogative = true;
    }

    let mut i = 0;
    while i < lower.len() {
        let word = lower[i].as_str();
        let next = lower.get(i + 1).map(String::as_str);

        if SYNTHESIS.contains(&word) {
            parsed.synthesis = true;
        }
        if TOPICS.contains(&word) {
            parsed.topic = true;
        }

        // assigned to <name...>
        if word == "assigned" && next == Some("to") {
            let start = i + 2;
            let mut end = start;
            while end < lower.len() && !NAME_TERMINATORS.contains(&lower[end].as_str()) {
                end += 1;
            }
            match &lower[start..end] {
                [] => {}
                [only] if matches!(only.as_str(), "nobody" | "noone" | "none") => {
                    parsed.unassigned = true;
                }
                _ => parsed.assigned_to = Some(words[start..end].join(" ")),
            }
            i = end.max(start);
            continue;
        }
        if word == "not" {
            if let Some(consumed) = parse_negation(&lower[i + 1..], &mut parsed) {
                i += 1 + consumed;
                continue;
            }
        }
        if word == "stale" || word == "inactive" {
            parsed.stale_days.get_or_insert(DEFAULT_STALE_DAYS);
            i += 1;
            continue;
        }
        if word == "open" {
            for state in CLOSED_STATES {
                push_unique(&mut parsed.not_states, state);
            }
            i += 1;
            continue;
        }
        if let Some((recency, consumed)) = parse_recency(&lower[i..]) {
            parsed.recency.get_or_insert(recency);
            i += consumed;
            continue;
        }

        if word == "unassigned" || (word == "not" && next == Some("assigned")) {
            parsed.unassigned = true;
            i += if word == "not" { 2 } else { 1 };
            continue;
        }

        // sprint|iteration <n>
        if matches!(word, "sprint" | "iteration") {
            if let Some(n) = next.filter(|n| n.chars().all(|c| c.is_ascii_digit())) {
                let label = if word == "sprint" { "Sprint" } else { "Iteration" };
                parsed.iteration = Some(format!("{label} {n}"));
                i += 2;
                continue;
            }
        }

        if word == "user" && matches!(next, Some("story" | "stories")) {
            parsed.work_item_type.get_or_insert_with(|| "User Story".to_string());
            i += 2;
            continue;
        }
        if let Some((_, canonical)) = TYPES.iter().find(|(forms, _)| forms.contains(&word)) {
            parsed.work_item_type.get_or_insert_with(|| (*canonical).to_string());
            i += 1;
            continue;
        }
        if word == "in" && next == Some("progress") {
            parsed.state.get_or_insert_with(|| "In Progress".to_string());
            i += 2;
            continue;
        }
        if let Some((_, canonical)) = STATES.iter().find(|(form, _)| *form == word) {
            parsed.state.get_or_insert_with(|| (*canonical).to_string());
            i += 1;
            continue;
        }

        if word.chars().count() > 1
            && !STOPWORDS.contains(&word)
            && !SYNTHESIS.contains(&word)
            && !TOPICS.contains(&word)
            && !INTERROGATIVES.contains(&word)
        {
            parsed.residual.push(word.to_string());
        }
        i += 1;
    }

    parsed
}

/// `today`, `yesterday`, `this week`, `last|past week`, `last|past N days`.
/// Returns the window and how many words it spans.
fn parse_recency(words: &[String]) -> Option<(Recency, usize)> {
    let word = |k: usize| words.get(k).map(String::as_str);
    match (word(0)?, word(1), word(2)) {
        ("today", ..) => Some((Recency::Today, 1)),
        ("yesterday", ..) => Some((Recency::Yesterday, 1)),
        ("this", Some("week"), _) => Some((Recency::ThisWeek, 2)),
        ("last" | "past", Some("week"), _) => Some((Recency::LastDays(7), 2)),
        ("last" | "past", Some(n), Some("day" | "days")) => {
            n.parse::<u32>().ok().filter(|&n| n > 0).map(|n| (Recency::LastDays(n), 3))
        }
        _ => None,
    }
}

/// What follows a `not`: a state to exclude, or an inactivity phrase such as
/// `updated in 14 days` or `handled for a long time`. Returns the number of
/// words consumed after `not`.
fn parse_negation(rest: &[String], parsed: &mut ParsedQuery) -> Option<usize> {
    let first = rest.first()?.as_str();
    if let Some((_, canonical)) = STATES.iter().find(|(form, _)| *form == first) {
        push_unique(&mut parsed.not_states, canonical);
        return Some(1);
    }
    if !ACTIVITY_VERBS.contains(&first) {
        return None;
    }

    let mut consumed = 1;
    if rest
        .get(consumed)
        .is_some_and(|w| matches!(w.as_str(), "in" | "for" | "since" | "within"))
    {
        consumed += 1;
    }
    let tail: Vec<&str> = rest[consumed..].iter().take(3).map(String::as_str).collect();
    let days = match tail.as_slice() {
        [n, "day" | "days", ..] => n.parse().ok().map(|n: u32| (n, 2)),
        [n, "week" | "weeks", ..] => n.parse().ok().map(|n: u32| (n.saturating_mul(7), 2)),
        ["a", "week", ..] => Some((7, 2)),
        ["a", "month", ..] => Some((30, 2)),
        ["a", "long", "time"] => Some((DEFAULT_STALE_DAYS, 3)),
        ["long", "time", ..] => Some((DEFAULT_STALE_DAYS, 2)),
        _ => None,
    };
    let (days, extra) = days.unwrap_or((DEFAULT_STALE_DAYS, 0));
    parsed.stale_days = Some(days.max(1));
    Some(consumed + extra)
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

impl ParsedQuery {
    /// Build a filter, mapping recognized values onto what the mirror
    /// actually stores so exact-match filters hit. Time windows are
    /// relative to `now` and use UTC day boundaries.
    #[must_use]
    pub fn to_filter(
        &self,
        sync_config_id: i64,
        metadata: &WorkItemMetadata,
        now: DateTime<Utc>,
    ) -> WorkItemFilter {
        let mut filter = WorkItemFilter::for_config(sync_config_id);
        filter.work_item_type = self
            .work_item_type
            .as_deref()
            .map(|t| resolve_exact(t, &metadata.types));
        filter.state = self
            .state
            .as_deref()
            .map(|s| resolve_exact(s, &metadata.states));
        filter.assigned_to = self
            .assigned_to
            .as_deref()
            .map(|a| resolve_assignee(a, &metadata.assignees));
        filter.unassigned = self.unassigned && filter.assigned_to.is_none();
        filter.iteration_path = self
            .iteration
            .as_deref()
            .map(|it| resolve_iteration(it, &metadata.iterations));
        filter.not_states = self
            .not_states
            .iter()
            .map(|s| resolve_exact(s, &metadata.states))
            .collect();

        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        match self.recency {
            Some(Recency::Today) => filter.changed_from = Some(midnight),
            Some(Recency::Yesterday) => {
                filter.changed_from = Some(midnight - Duration::days(1));
                filter.changed_to = Some(midnight);
            }
            Some(Recency::ThisWeek) => {
                let since_monday = i64::from(now.weekday().num_days_from_monday());
                filter.changed_from = Some(midnight - Duration::days(since_monday));
            }
            Some(Recency::LastDays(n)) => filter.changed_from = Some(now - Duration::days(i64::from(n))),
            None => {}
        }
        if let Some(days) = self.stale_days {
            filter.inactive_since = Some(now - Duration::days(i64::from(days)));
            filter.sort_by = SortColumn::LastActivity;
            filter.sort_dir = SortDir::Asc;
        }
        filter
    }
}

fn resolve_exact(value: &str, known: &[String]) -> String {
    known
        .iter()
        .find(|k| k.eq_ignore_ascii_case(value))
        .cloned()
        .unwrap_or_else(|| value.to_string())
}

/// Exact (case-insensitive) name, else the single assignee whose name
/// contains every typed word.
fn resolve_assignee(value: &str, known: &[String]) -> String {
    if let Some(exact) = known.iter().find(|k| k.eq_ignore_ascii_case(value)) {
        return exact.clone();
    }
    let wanted: Vec<String> = value.split_whitespace().map(str::to_lowercase).collect();
    let matches: Vec<&String> = known
        .iter()
        .filter(|k| {
            let words: Vec<String> = k.split_whitespace().map(str::to_lowercase).collect();
            wanted.iter().all(|w| words.contains(w))
        })
        .collect();
    match matches.as_slice() {
        [single] => (*single).clone(),
        _ => value.to_string(),
    }
}

/// Iteration paths are hierarchical (`Project\Release 1\Sprint 3`); match
/// on the last segment.
fn resolve_iteration(value: &str, known: &[String]) -> String {
    let number = value.rsplit(' ').next().unwrap_or(value);
    known
        .iter()
        .find(|path| {
            let leaf = path.rsplit('\\').next().unwrap_or(path);
            leaf.eq_ignore_ascii_case(value) || leaf.eq_ignore_ascii_case(number)
        })
        .cloned()
        .unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_queries() {
        let p = parse("bugs assigned to Alice");
        assert_eq!(p.work_item_type.as_deref(), Some("Bug"));
        assert_eq!(p.assigned_to.as_deref(), Some("Alice"));
        assert!(p.residual.is_empty());
        assert_eq!(Intent::of(&p), Intent::Filter);

        let p = parse("which bugs are assigned to Alice Smith?");
        assert_eq!(p.assigned_to.as_deref(), Some("Alice Smith"));
        assert_eq!(Intent::of(&p), Intent::Filter);

        let p = parse("active user stories in sprint 3");
        assert_eq!(p.state.as_deref(), Some("Active"));
        assert_eq!(p.work_item_type.as_deref(), Some("User Story"));
        assert_eq!(p.iteration.as_deref(), Some("Sprint 3"));
        assert_eq!(Intent::of(&p), Intent::Filter);

        let p = parse("unassigned tasks about login");
        assert!(p.unassigned);
        assert_eq!(p.residual, vec!["login"]);
        assert_eq!(Intent::of(&p), Intent::Filter);
    }

    #[test]
    fn test_question_queries() {
        let p = parse("what's blocking the release?");
        assert!(p.interrogative);
        assert_eq!(p.residual, vec!["release"]);
        assert_eq!(Intent::of(&p), Intent::Question);

        assert_eq!(Intent::of(&parse("summarize the open bugs")), Intent::Question);
        assert_eq!(Intent::of(&parse("why is the login work late")), Intent::Question);
        assert_eq!(Intent::of(&parse("what happened today?")), Intent::Question);
        assert_eq!(Intent::of(&parse("what is the status of sprint 3?")), Intent::Question);
        assert_eq!(Intent::of(&parse("explain bugs")), Intent::Question);
    }

    #[test]
    fn test_time_and_negation_phrases() {
        let p = parse("what happened today?");
        assert_eq!(p.recency, Some(Recency::Today));
        assert!(p.residual.is_empty());

        assert_eq!(parse("bugs changed this week").recency, Some(Recency::ThisWeek));
        assert_eq!(parse("tasks from the last 10 days").recency, Some(Recency::LastDays(10)));
        assert_eq!(parse("past week").recency, Some(Recency::LastDays(7)));
        assert_eq!(parse("last sprint").recency, None);

        let p = parse("stories not updated in 14 days");
        assert_eq!(p.work_item_type.as_deref(), Some("User Story"));
        assert_eq!(p.stale_days, Some(14));
        assert!(p.residual.is_empty());

        let p = parse("bugs not handled for a long time");
        assert_eq!(p.stale_days, Some(DEFAULT_STALE_DAYS));
        assert!(p.residual.is_empty());

        let p = parse("stale tasks not closed");
        assert_eq!(p.stale_days, Some(DEFAULT_STALE_DAYS));
        assert_eq!(p.not_states, vec!["Closed"]);
        assert!(p.state.is_none());

        let p = parse("open bugs assigned to Alice today");
        assert_eq!(p.not_states, vec!["Closed", "Done", "Removed"]);
        assert_eq!(p.assigned_to.as_deref(), Some("Alice"));
        assert_eq!(p.recency, Some(Recency::Today));

        assert!(parse("tasks not assigned").unassigned);
    }

    #[test]
    fn test_time_windows_become_date_bounds() {
        // Wednesday
        let now = DateTime::parse_from_rfc3339("2026-10-21T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let at = |s: &str| Some(DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc));
        let metadata = WorkItemMetadata {
            states: vec!["closed".into()],
            ..WorkItemMetadata::default()
        };

        let f = parse("bugs today").to_filter(1, &metadata, now);
        assert_eq!(f.changed_from, at("2026-10-21T00:00:00Z"));
        assert!(f.changed_to.is_none());

        let f = parse("yesterday").to_filter(1, &metadata, now);
        assert_eq!(f.changed_from, at("2026-10-20T00:00:00Z"));
        assert_eq!(f.changed_to, at("2026-10-21T00:00:00Z"));

        let f = parse("this week").to_filter(1, &metadata, now);
        assert_eq!(f.changed_from, at("2026-10-19T00:00:00Z"));

        let f = parse("last 3 days").to_filter(1, &metadata, now);
        assert_eq!(f.changed_from, at("2026-10-18T15:30:00Z"));

        let f = parse("tasks not closed not updated in 10 days").to_filter(1, &metadata, now);
        assert_eq!(f.not_states, vec!["closed"]);
        assert_eq!(f.inactive_since, at("2026-10-11T15:30:00Z"));
        assert_eq!(f.sort_by, SortColumn::LastActivity);
        assert_eq!(f.sort_dir, SortDir::Asc);
    }

    #[test]
    fn test_ambiguous_defaults_to_filter() {
        assert_eq!(Intent::of(&parse("")), Intent::Filter);
        assert_eq!(Intent::of(&parse("login")), Intent::Filter);
        assert_eq!(Intent::of(&parse("bugs?")), Intent::Filter);
        assert_eq!(Intent::of(&parse("bugs with status active")), Intent::Filter);
        assert_eq!(Intent::of(&parse("blockers in sprint 3")), Intent::Filter);
        assert_eq!(Intent::of(&parse("tasks changed this week")), Intent::Filter);
        assert_eq!(Intent::default(), Intent::Filter);
    }

    #[test]
    fn test_to_filter_resolves_stored_values() {
        let metadata = WorkItemMetadata {
            types: vec!["Bug".into(), "User Story".into()],
            states: vec!["Active".into()],
            assignees: vec!["Alice Smith".into(), "Bob Jones".into()],
            iterations: vec!["Alpha\\Release 1\\Sprint 3".into()],
        };
        let f = parse("active bugs assigned to alice in sprint 3").to_filter(7, &metadata, Utc::now());
        assert_eq!(f.sync_config_id, 7);
        assert_eq!(f.work_item_type.as_deref(), Some("Bug"));
        assert_eq!(f.state.as_deref(), Some("Active"));
        assert_eq!(f.assigned_to.as_deref(), Some("Alice Smith"));
        assert_eq!(f.iteration_path.as_deref(), Some("Alpha\\Release 1\\Sprint 3"));
        assert_eq!(
            f.describe(),
            "type=Bug, state=Active, assignedTo=Alice Smith, iterationPath=Alpha\\Release 1\\Sprint 3"
        );

        let f = parse("tasks assigned to carol").to_filter(7, &metadata, Utc::now());
        assert_eq!(f.assigned_to.as_deref(), Some("carol"));
    }
}
