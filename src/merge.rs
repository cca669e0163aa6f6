//! Three-way merge
//!
//! A merge reconciles the current snapshot (C) and another snapshot (O)
//! against their split point (S). Every filename in the union of the three
//! is classified on its own, in sorted order:
//!
//! | S | C | O | condition | action |
//! |---|---|---|-----------|--------|
//! | ✓ | ✓ | ✓ | S = C, S ≠ O | take O |
//! | ✓ | ✓ | ✓ | S ≠ C, S = O | keep C |
//! | ✓ | ✓ | ✓ | C = O | keep C |
//! | ✓ | ✓ | ✓ | all differ | conflict |
//! | ✗ | ✗ | ✓ | | take O |
//! | ✗ | ✓ | ✓ | C ≠ O | conflict |
//! | ✓ | ✓ | ✗ | S = C | remove |
//! | ✓ | ✓ | ✗ | S ≠ C | conflict (empty other side) |
//! | ✓ | ✗ | ✗ | | keep |
//! | ✓ | ✗ | ✓ | S = O | keep removal |
//! | ✓ | ✗ | ✓ | S ≠ O | conflict (empty current side) |
//!
//! [`plan_merge`] performs the classification without touching anything, so
//! the outcome can be inspected and tested on its own. [`apply_plan`] then
//! writes working files, stores conflict blobs and stages the result in the
//! index. A conflict is a normal outcome, reported through
//! [`MergeResult::had_conflict`].

use crate::error::Result;
use crate::graph;
use crate::index::Index;
use crate::snapshot::Snapshot;
use crate::storage::ObjectStore;
use crate::utils::short_hash;
use crate::worktree::WorkingDirectory;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// What the merge does with one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    /// Check out the other side's blob and stage it
    TakeOther {
        /// Blob hash from the other snapshot
        hash: String,
    },
    /// Stage the file for removal and delete the working copy
    Remove,
    /// Write conflict markers, store the result and stage it
    Conflict {
        /// Blob hash on the current side, None if absent
        current: Option<String>,
        /// Blob hash on the other side, None if absent
        other: Option<String>,
    },
}

/// A planned action for one filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMerge {
    /// File the action applies to
    pub filename: String,
    /// What happens to it
    pub action: MergeAction,
}

/// Outcome of applying a merge plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    /// Whether any file received conflict markers
    pub had_conflict: bool,
    /// Files that received conflict markers, sorted
    pub conflicts: Vec<String>,
    /// Files checked out from the other side, sorted
    pub updated: Vec<String>,
    /// Files removed, sorted
    pub removed: Vec<String>,
}

/// Classify every file of the three snapshots
///
/// `split` is None when the merge base has no snapshot (the root commit).
/// Files needing no change are omitted; the result is sorted by filename.
pub fn plan_merge(split: Option<&Snapshot>, current: &Snapshot, other: &Snapshot) -> Vec<FileMerge> {
    let empty = Snapshot::new();
    let split = split.unwrap_or(&empty);

    let names: BTreeSet<&str> = split
        .filenames()
        .chain(current.filenames())
        .chain(other.filenames())
        .collect();

    names
        .into_iter()
        .filter_map(|name| {
            classify(split.get(name), current.get(name), other.get(name)).map(|action| FileMerge {
                filename: name.to_string(),
                action,
            })
        })
        .collect()
}

fn classify(s: Option<&str>, c: Option<&str>, o: Option<&str>) -> Option<MergeAction> {
    let conflict = || MergeAction::Conflict {
        current: c.map(str::to_string),
        other: o.map(str::to_string),
    };

    match (s, c, o) {
        // Present on both sides
        (_, Some(c), Some(o)) if c == o => None,
        (Some(s), Some(c), Some(o)) if s == c => Some(MergeAction::TakeOther { hash: o.to_string() }),
        (Some(s), Some(_), Some(o)) if s == o => None,
        (_, Some(_), Some(_)) => Some(conflict()),

        // Only on the other side
        (None, None, Some(o)) => Some(MergeAction::TakeOther { hash: o.to_string() }),
        (Some(s), None, Some(o)) if s == o => None,
        (Some(_), None, Some(_)) => Some(conflict()),

        // Only on the current side
        (Some(s), Some(c), None) if s == c => Some(MergeAction::Remove),
        (Some(_), Some(_), None) => Some(conflict()),
        (None, Some(_), None) => None,

        // Gone from both sides
        (_, None, None) => None,
    }
}

/// Conflict marker block for the two sides
///
/// An absent side contributes an empty string.
pub fn conflict_content(current: &[u8], other: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(current.len() + other.len() + 32);
    out.extend_from_slice(b"<<<<<<< HEAD\n");
    out.extend_from_slice(current);
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(other);
    out.extend_from_slice(b">>>>>>>\n");
    out
}

/// Apply a plan to the working directory and index
///
/// Objects are written before the index changes; the index is only mutated
/// in memory, the caller persists it.
pub fn apply_plan<W: WorkingDirectory + ?Sized>(
    store: &ObjectStore,
    worktree: &W,
    index: &mut Index,
    plan: &[FileMerge],
) -> Result<MergeResult> {
    let mut result = MergeResult::default();

    for entry in plan {
        let name = entry.filename.as_str();
        match &entry.action {
            MergeAction::TakeOther { hash } => {
                let content = store.get_blob(hash)?;
                worktree.write(name, &content)?;
                index.stage_blob(name, hash.clone());
                result.updated.push(name.to_string());
            }
            MergeAction::Remove => {
                index.mark_removed(name);
                worktree.delete(name)?;
                result.removed.push(name.to_string());
            }
            MergeAction::Conflict { current, other } => {
                let current = load_side(store, current.as_deref())?;
                let other = load_side(store, other.as_deref())?;
                let content = conflict_content(&current, &other);
                let hash = store.put_blob(&content)?;
                worktree.write(name, &content)?;
                index.stage_blob(name, hash);
                warn!("Merge conflict in {}", name);
                result.conflicts.push(name.to_string());
            }
        }
    }

    result.had_conflict = !result.conflicts.is_empty();
    Ok(result)
}

fn load_side(store: &ObjectStore, hash: Option<&str>) -> Result<Vec<u8>> {
    match hash {
        Some(hash) => store.get_blob(hash),
        None => Ok(Vec::new()),
    }
}

/// Three-way merge of explicit snapshots
pub fn merge_snapshots<W: WorkingDirectory + ?Sized>(
    store: &ObjectStore,
    worktree: &W,
    index: &mut Index,
    split: Option<&Snapshot>,
    current: &Snapshot,
    other: &Snapshot,
) -> Result<MergeResult> {
    let plan = plan_merge(split, current, other);
    debug!("Merge plan has {} actions", plan.len());
    apply_plan(store, worktree, index, &plan)
}

/// Three-way merge of the commits `head` and `other`
///
/// Computes the merge base, loads the three snapshots and applies the
/// result to `worktree` and `index`. Creating the merge commit is left to
/// the caller.
pub fn merge_commits<W: WorkingDirectory + ?Sized>(
    store: &ObjectStore,
    worktree: &W,
    index: &mut Index,
    head: &str,
    other: &str,
) -> Result<MergeResult> {
    let split_hash = graph::merge_base(store, head, other)?;
    let split = store.snapshot_of(&store.get_commit(&split_hash)?)?;
    let current = store.snapshot_of(&store.get_commit(head)?)?;
    let theirs = store.snapshot_of(&store.get_commit(other)?)?;

    let result = merge_snapshots(store, worktree, index, Some(&split), &current, &theirs)?;
    info!(
        "Merged {} into {} at split {}: {} updated, {} removed, {} conflicts",
        short_hash(other),
        short_hash(head),
        short_hash(&split_hash),
        result.updated.len(),
        result.removed.len(),
        result.conflicts.len()
    );
    Ok(result)
}
