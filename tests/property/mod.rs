//! Property-based testing for arbor
//!
//! Uses proptest to check the snapshot, merge-planning and merge-base
//! invariants across randomly generated inputs.

use ::arbor::merge::{plan_merge, MergeAction};
use ::arbor::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tempfile::TempDir;

/// Small name and hash alphabets so that the three sides of a merge share
/// files and contents often
fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    prop::collection::btree_map("[a-f]\\.txt", "h[0-3]", 0..8).prop_map(Snapshot::from)
}

fn index_strategy() -> impl Strategy<Value = Index> {
    (
        prop::collection::btree_map("[a-h]\\.txt", "h[0-3]", 0..6),
        prop::collection::btree_set("[a-h]\\.txt", 0..6),
    )
        .prop_map(|(additions, removals)| {
            // A name is never both staged and pending removal
            let removals = removals.into_iter().filter(|r| !additions.contains_key(r)).collect();
            Index::from_parts(additions, removals)
        })
}

/// Random DAG: node `i` points at one or two earlier nodes, so every node
/// reaches `n0`
fn dag_strategy() -> impl Strategy<Value = (ParentTable, usize)> {
    prop::collection::vec((any::<u16>(), prop::option::of(any::<u16>())), 1..40).prop_map(|edges| {
        let mut table = ParentTable::new();
        table.insert("n0", vec![]);
        for (i, (first, second)) in edges.iter().enumerate() {
            let node = i + 1;
            let mut parents = vec![format!("n{}", *first as usize % node)];
            if let Some(second) = second {
                let p2 = format!("n{}", *second as usize % node);
                if p2 != parents[0] {
                    parents.push(p2);
                }
            }
            table.insert(format!("n{}", node), parents);
        }
        (table, edges.len() + 1)
    })
}

/// Apply the non-conflicting actions of a plan to the current side
fn apply_to(current: &Snapshot, plan: &[merge::FileMerge]) -> Snapshot {
    let mut entries: BTreeMap<String, String> =
        current.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    for entry in plan {
        match &entry.action {
            MergeAction::TakeOther { hash } => {
                entries.insert(entry.filename.clone(), hash.clone());
            }
            MergeAction::Remove => {
                entries.remove(&entry.filename);
            }
            MergeAction::Conflict { .. } => {}
        }
    }
    Snapshot::from(entries)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Combining with an empty index changes nothing
    #[test]
    fn combine_with_empty_index_is_identity(base in snapshot_strategy()) {
        prop_assert_eq!(base.combine(&Index::new()), base);
    }

    /// Additions overlay, removals drop, everything else is untouched
    #[test]
    fn combine_overlays_index(base in snapshot_strategy(), index in index_strategy()) {
        let combined = base.combine(&index);

        for (name, hash) in index.additions() {
            prop_assert_eq!(combined.get(name), Some(hash));
        }
        for name in index.removals() {
            prop_assert!(!combined.contains(name));
        }
        for (name, hash) in base.iter() {
            if !index.is_staged(name) {
                prop_assert_eq!(combined.get(name), Some(hash));
            }
        }
    }

    /// Same inputs, same plan; filenames sorted and unique
    #[test]
    fn merge_plan_is_deterministic(
        split in snapshot_strategy(),
        current in snapshot_strategy(),
        other in snapshot_strategy(),
    ) {
        let first = plan_merge(Some(&split), &current, &other);
        let second = plan_merge(Some(&split), &current, &other);
        prop_assert_eq!(&first, &second);

        let names: Vec<&str> = first.iter().map(|f| f.filename.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(names, sorted);
    }

    /// Merging a snapshot with itself needs no action
    #[test]
    fn merge_of_identical_sides_is_empty(split in snapshot_strategy(), side in snapshot_strategy()) {
        prop_assert!(plan_merge(Some(&split), &side, &side).is_empty());
    }

    /// With the current side untouched since the split, the plan never
    /// conflicts and reproduces the other side
    #[test]
    fn merge_onto_unchanged_current_takes_other(split in snapshot_strategy(), other in snapshot_strategy()) {
        let plan = plan_merge(Some(&split), &split, &other);
        let clean = plan.iter().all(|f| !matches!(f.action, MergeAction::Conflict { .. }));
        prop_assert!(clean);
        prop_assert_eq!(apply_to(&split, &plan), other);
    }

    /// With the other side untouched since the split, nothing happens
    #[test]
    fn merge_of_unchanged_other_is_noop(split in snapshot_strategy(), current in snapshot_strategy()) {
        prop_assert!(plan_merge(Some(&split), &current, &split).is_empty());
    }

    /// The merge base is a common ancestor with minimal total distance
    #[test]
    fn merge_base_is_closest_common_ancestor(
        (table, nodes) in dag_strategy(),
        a in any::<u16>(),
        b in any::<u16>(),
    ) {
        let a = format!("n{}", a as usize % nodes);
        let b = format!("n{}", b as usize % nodes);

        let base = merge_base(&table, &a, &b).unwrap();
        let from_a = ancestors(&table, &a).unwrap();
        let from_b = ancestors(&table, &b).unwrap();
        prop_assert!(from_a.contains_key(&base));
        prop_assert!(from_b.contains_key(&base));

        let best = from_a[&base] + from_b[&base];
        for (hash, dist_a) in from_a.iter() {
            if let Some(dist_b) = from_b.get(hash) {
                prop_assert!(dist_a + dist_b >= best);
            }
        }

        prop_assert_eq!(merge_base(&table, &a, &a).unwrap(), a);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Staging the same content twice leaves the same index and one blob
    #[test]
    fn staging_is_idempotent(
        content in prop::collection::vec(any::<u8>(), 0..4096),
        committed_content in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::init(
            temp_dir.path().to_path_buf(),
            test_config(&temp_dir),
            CompressionEngine::new(CompressionStrategy::Fast),
        )
        .unwrap();

        let committed_hash = store.put_blob(&committed_content).unwrap();
        let committed: Snapshot = [("f.txt".to_string(), committed_hash)].into_iter().collect();

        let mut index = Index::new();
        index.stage_addition(&store, &committed, "f.txt", &content).unwrap();
        let once = index.clone();
        index.stage_addition(&store, &committed, "f.txt", &content).unwrap();
        prop_assert_eq!(&index, &once);

        let expected: BTreeSet<String> = [hash_data(&content), hash_data(&committed_content)].into_iter().collect();
        let stored: BTreeSet<String> = store.list(ObjectKind::Blob).unwrap().into_iter().collect();
        if content == committed_content {
            prop_assert!(index.is_empty());
        }
        prop_assert!(stored.is_subset(&expected));
        prop_assert!(stored.len() <= 2);
    }

    /// Identical bytes are stored once under one key
    #[test]
    fn content_addressing_stores_once(content in prop::collection::vec(any::<u8>(), 0..2048), repeats in 1..5usize) {
        let temp_dir = TempDir::new().unwrap();
        let store = ObjectStore::init(
            temp_dir.path().to_path_buf(),
            test_config(&temp_dir),
            CompressionEngine::new(CompressionStrategy::Fast),
        )
        .unwrap();

        let hashes: BTreeSet<String> = (0..repeats).map(|_| store.put_blob(&content).unwrap()).collect();
        prop_assert_eq!(hashes.len(), 1);
        prop_assert_eq!(store.list(ObjectKind::Blob).unwrap().len(), 1);
        prop_assert_eq!(store.get_blob(hashes.iter().next().unwrap()).unwrap(), content);
    }
}

fn test_config(temp_dir: &TempDir) -> RepositoryConfig {
    RepositoryConfig {
        root_path: temp_dir.path().to_path_buf(),
        storage_path: temp_dir.path().to_path_buf(),
        compression_strategy: CompressionStrategy::Fast.name().to_string(),
        default_branch: DEFAULT_BRANCH.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}
