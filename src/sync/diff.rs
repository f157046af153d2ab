//! Diff classification for one reconciliation run.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::remote::ItemPayload;
use crate::storage::{MirrorDiff, MirrorEntry};

/// The classified write set plus what was deliberately skipped.
#[derive(Debug, Default)]
pub struct Classification {
    pub diff: MirrorDiff,
    /// Present on both sides with nothing to write.
    pub unchanged: usize,
    /// Remote rev lower than the mirrored rev; left untouched.
    pub regressed: Vec<i64>,
}

/// Classify fresh payloads against the mirror.
///
/// - `added`: absent from the mirror, or tombstoned there
/// - `updated`: rev differs, or the normalised parent moved
/// - `removed`: live in the mirror but absent from `fresh`
///
/// Parents are normalised first (see [`normalize_parents`]), so the written
/// set is always a tree rooted at `root_id`.
#[must_use]
pub fn classify(
    sync_config_id: i64,
    root_id: i64,
    fresh: Vec<ItemPayload>,
    mirrored: &HashMap<i64, MirrorEntry>,
    synced_at: DateTime<Utc>,
) -> Classification {
    // Highest rev wins if the tracker ever repeats an id across batches.
    let mut by_id: BTreeMap<i64, ItemPayload> = BTreeMap::new();
    for payload in fresh {
        match by_id.get(&payload.id) {
            Some(existing) if existing.rev >= payload.rev => {}
            _ => {
                by_id.insert(payload.id, payload);
            }
        }
    }

    normalize_parents(root_id, &mut by_id);

    let mut out = Classification::default();
    for (id, payload) in &by_id {
        match mirrored.get(id) {
            None => out.diff.added.push(payload.clone().into_work_item(sync_config_id, synced_at)),
            Some(entry) if entry.tombstoned => {
                out.diff
                    .added
                    .push(payload.clone().into_work_item(sync_config_id, synced_at));
            }
            Some(entry) if payload.rev < entry.rev => {
                warn!(
                    item_id = id,
                    remote_rev = payload.rev,
                    mirrored_rev = entry.rev,
                    "Remote rev went backwards, keeping mirrored row"
                );
                out.regressed.push(*id);
            }
            Some(entry) if payload.rev != entry.rev || payload.parent_id != entry.parent_id => {
                out.diff
                    .updated
                    .push(payload.clone().into_work_item(sync_config_id, synced_at));
            }
            Some(_) => out.unchanged += 1,
        }
    }

    let mut removed: Vec<i64> = mirrored
        .iter()
        .filter(|(id, entry)| !entry.tombstoned && !by_id.contains_key(id))
        .map(|(id, _)| *id)
        .collect();
    removed.sort_unstable();
    out.diff.removed = removed;

    out
}

/// Enforce the tree shape on the fresh set.
///
/// The root has no parent. Any other parent pointer must name an item in the
/// set; dangling pointers are cleared. Walking each parent chain in id order,
/// the edge that closes a cycle is dropped.
pub fn normalize_parents(root_id: i64, items: &mut BTreeMap<i64, ItemPayload>) {
    if let Some(root) = items.get_mut(&root_id) {
        root.parent_id = None;
    }

    let ids: Vec<i64> = items.keys().copied().collect();
    for id in &ids {
        let dangling = items
            .get(id)
            .and_then(|item| item.parent_id)
            .is_some_and(|parent| !items.contains_key(&parent));
        if dangling {
            if let Some(item) = items.get_mut(id) {
                item.parent_id = None;
            }
        }
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Open,
        Done,
    }
    let mut marks: HashMap<i64, Mark> = HashMap::new();

    for &start in &ids {
        let mut path = Vec::new();
        let mut current = start;
        while !marks.contains_key(&current) {
            marks.insert(current, Mark::Open);
            path.push(current);

            let Some(parent) = items.get(&current).and_then(|i| i.parent_id) else {
                break;
            };
            if marks.get(&parent) == Some(&Mark::Open) {
                warn!(item_id = current, parent_id = parent, "Dropping parent link that closes a cycle");
                if let Some(item) = items.get_mut(&current) {
                    item.parent_id = None;
                }
                break;
            }
            current = parent;
        }
        for id in path {
            marks.insert(id, Mark::Done);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(id: i64, rev: i64, parent: Option<i64>) -> ItemPayload {
        ItemPayload {
            id,
            rev,
            parent_id: parent,
            title: format!("Item {id}"),
            work_item_type: "Task".into(),
            state: "New".into(),
            ..ItemPayload::default()
        }
    }

    fn entry(rev: i64, parent: Option<i64>) -> MirrorEntry {
        MirrorEntry {
            rev,
            parent_id: parent,
            tombstoned: false,
        }
    }

    fn ids(items: &[crate::model::WorkItem]) -> Vec<i64> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_classifies_added_updated_removed_unchanged() {
        let mirrored = HashMap::from([
            (1, entry(3, None)),
            (2, entry(5, Some(1))),
            (3, entry(1, Some(1))),
            (4, entry(2, Some(1))),
        ]);
        let fresh = vec![
            payload(1, 3, None),
            payload(2, 6, Some(1)),
            payload(3, 1, Some(1)),
            payload(5, 1, Some(2)),
        ];

        let c = classify(9, 1, fresh, &mirrored, Utc::now());
        assert_eq!(ids(&c.diff.added), vec![5]);
        assert_eq!(ids(&c.diff.updated), vec![2]);
        assert_eq!(c.diff.removed, vec![4]);
        assert_eq!(c.unchanged, 2);
        assert!(c.diff.added.iter().all(|i| i.sync_config_id == 9));
        assert_eq!(c.diff.updated[0].watermark, Some(6));
    }

    #[test]
    fn test_rev_regression_is_skipped() {
        let mirrored = HashMap::from([(1, entry(1, None)), (2, entry(8, Some(1)))]);
        let fresh = vec![payload(1, 1, None), payload(2, 4, Some(1))];
        let c = classify(1, 1, fresh, &mirrored, Utc::now());
        assert!(c.diff.is_empty());
        assert_eq!(c.regressed, vec![2]);
    }

    #[test]
    fn test_tombstoned_item_reappearing_is_added() {
        let mirrored = HashMap::from([
            (1, entry(1, None)),
            (
                2,
                MirrorEntry {
                    rev: 2,
                    parent_id: Some(1),
                    tombstoned: true,
                },
            ),
        ]);
        let c = classify(1, 1, vec![payload(1, 1, None), payload(2, 2, Some(1))], &mirrored, Utc::now());
        assert_eq!(ids(&c.diff.added), vec![2]);
        assert!(c.diff.removed.is_empty());
    }

    #[test]
    fn test_empty_fresh_set_removes_everything() {
        let mirrored = HashMap::from([(1, entry(1, None)), (2, entry(1, Some(1)))]);
        let c = classify(1, 1, Vec::new(), &mirrored, Utc::now());
        assert_eq!(c.diff.removed, vec![1, 2]);
        assert!(c.diff.added.is_empty());
    }

    #[test]
    fn test_duplicate_ids_keep_highest_rev() {
        let c = classify(
            1,
            1,
            vec![payload(1, 1, None), payload(1, 4, None), payload(1, 2, None)],
            &HashMap::new(),
            Utc::now(),
        );
        assert_eq!(c.diff.added.len(), 1);
        assert_eq!(c.diff.added[0].rev, 4);
    }

    #[test]
    fn test_normalize_drops_dangling_and_cyclic_parents() {
        let mut items: BTreeMap<i64, ItemPayload> = [
            payload(1, 1, Some(99)),
            payload(2, 1, Some(1)),
            payload(3, 1, Some(4)),
            payload(4, 1, Some(3)),
            payload(5, 1, Some(42)),
        ]
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

        normalize_parents(1, &mut items);

        assert_eq!(items[&1].parent_id, None);
        assert_eq!(items[&2].parent_id, Some(1));
        assert_eq!(items[&5].parent_id, None);
        // Exactly one edge of the 3 <-> 4 cycle survives.
        let kept = [items[&3].parent_id, items[&4].parent_id]
            .iter()
            .filter(|p| p.is_some())
            .count();
        assert_eq!(kept, 1);
    }

    #[test]
    fn test_parent_change_without_rev_bump_is_updated() {
        // Item 3's parent 2 left the tree, so its normalised parent changes.
        let mirrored = HashMap::from([
            (1, entry(1, None)),
            (2, entry(1, Some(1))),
            (3, entry(1, Some(2))),
        ]);
        let c = classify(1, 1, vec![payload(1, 1, None), payload(3, 1, Some(2))], &mirrored, Utc::now());
        assert_eq!(c.diff.removed, vec![2]);
        assert_eq!(ids(&c.diff.updated), vec![3]);
        assert_eq!(c.diff.updated[0].parent_id, None);
    }
}
