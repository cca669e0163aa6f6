//! Commit graph queries
//!
//! The history is a DAG: every commit has zero (root), one, or two (merge)
//! parents. The algorithms here only need to ask "what are the parents of
//! this commit?", which is captured by the [`CommitSource`] trait. The
//! object store implements it for real repositories; [`ParentTable`] is an
//! in-memory graph used by tests and benchmarks.
//!
//! ## Merge base
//!
//! [`merge_base`] runs one breadth-first traversal from each tip, recording
//! the minimum edge distance to every ancestor (over both parent edges). The
//! split point is the common ancestor minimising `dist_a + dist_b`, then the
//! smaller `dist_a`, then the lexicographically smaller hash. Cost is
//! O(V + E) per traversal no matter how many paths the merges create.

use crate::collections::{DistanceMap, HashMap, HashMapExt};
use crate::commit::Commit;
use crate::error::{ArborError, Result};
use crate::storage::ObjectStore;
use crate::utils::short_hash;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Anything that can answer parent lookups for commit hashes
pub trait CommitSource {
    /// Parents of `hash`, first parent first
    fn parents_of(&self, hash: &str) -> Result<Vec<String>>;
}

impl CommitSource for ObjectStore {
    fn parents_of(&self, hash: &str) -> Result<Vec<String>> {
        let commit = self.get_commit(hash)?;
        Ok(commit.parents().into_iter().map(str::to_string).collect())
    }
}

/// In-memory commit graph keyed by hash
#[derive(Debug, Clone, Default)]
pub struct ParentTable {
    parents: HashMap<String, Vec<String>>,
}

impl ParentTable {
    /// Empty graph
    pub fn new() -> Self {
        Self {
            parents: HashMap::new(),
        }
    }

    /// Add a node with its parents
    pub fn insert(&mut self, hash: impl Into<String>, parents: Vec<String>) {
        self.parents.insert(hash.into(), parents);
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

impl CommitSource for ParentTable {
    fn parents_of(&self, hash: &str) -> Result<Vec<String>> {
        self.parents
            .get(hash)
            .cloned()
            .ok_or_else(|| ArborError::not_found(crate::types::ObjectKind::Commit, hash))
    }
}

/// Every commit reachable from `start` with its minimum edge distance
///
/// `start` itself is included at distance 0. Both parent edges are followed.
pub fn ancestors<S: CommitSource + ?Sized>(source: &S, start: &str) -> Result<DistanceMap> {
    let mut distances = DistanceMap::new();
    let mut queue = VecDeque::new();

    distances.insert(start.to_string(), 0);
    queue.push_back(start.to_string());

    // BFS visits nodes in non-decreasing distance, so the first visit is the
    // minimum
    while let Some(hash) = queue.pop_front() {
        let distance = distances[&hash];
        for parent in source.parents_of(&hash)? {
            if !distances.contains_key(&parent) {
                trace!("{} at distance {}", short_hash(&parent), distance + 1);
                distances.insert(parent.clone(), distance + 1);
                queue.push_back(parent);
            }
        }
    }

    Ok(distances)
}

/// Best common ancestor of `head` and `other`
///
/// # Errors
///
/// [`ArborError::NoCommonAncestor`] if the two histories are disjoint.
pub fn merge_base<S: CommitSource + ?Sized>(source: &S, head: &str, other: &str) -> Result<String> {
    let from_head = ancestors(source, head)?;
    let from_other = ancestors(source, other)?;

    let best = from_head
        .iter()
        .filter_map(|(hash, &dist_a)| from_other.get(hash).map(|&dist_b| (dist_a + dist_b, dist_a, hash)))
        .min()
        .map(|(_, _, hash)| hash.clone())
        .ok_or_else(|| ArborError::NoCommonAncestor(head.to_string(), other.to_string()))?;

    debug!(
        "Merge base of {} and {} is {}",
        short_hash(head),
        short_hash(other),
        short_hash(&best)
    );
    Ok(best)
}

/// Whether `ancestor` is reachable from `descendant` (a commit is its own
/// ancestor)
pub fn is_ancestor<S: CommitSource + ?Sized>(source: &S, ancestor: &str, descendant: &str) -> Result<bool> {
    if ancestor == descendant {
        return Ok(true);
    }
    Ok(ancestors(source, descendant)?.contains_key(ancestor))
}

/// Commits along the first-parent chain from `start` back to the root
pub fn first_parent_history(store: &ObjectStore, start: &str) -> Result<Vec<(String, Commit)>> {
    let mut history = Vec::new();
    let mut next = Some(start.to_string());

    while let Some(hash) = next {
        let commit = store.get_commit(&hash)?;
        next = commit.parent.clone();
        history.push((hash, commit));
    }

    Ok(history)
}
