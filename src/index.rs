//! Staging area
//!
//! The [`Index`] overlays the active commit's snapshot with pending changes:
//! `additions` (filename to blob hash) and `removals` (filenames to drop).
//! [`crate::snapshot::combine`] folds it into the next snapshot. A repository
//! has exactly one index, persisted as JSON and cleared after every commit.
//!
//! ## Staging rules
//!
//! - Adding a file whose content matches the committed version, while the
//!   file is not otherwise staged, changes nothing.
//! - Adding a file otherwise stores the blob, records it in `additions` and
//!   cancels any pending removal of the same name.
//! - Removing a file requires it to be tracked by the commit or staged for
//!   addition. A committed file is marked for removal; a staged addition is
//!   dropped.

use crate::error::{ArborError, Result};
use crate::snapshot::Snapshot;
use crate::storage::ObjectStore;
use crate::utils::{atomic_write, hash_data, short_hash};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Effect of a successful [`Index::stage_removal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removal {
    /// The file is tracked by the active commit and is now staged for
    /// removal; the caller deletes the working copy
    pub tracked_by_commit: bool,
    /// A pending addition of the file was dropped
    pub unstaged_addition: bool,
}

/// Pending additions and removals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    additions: BTreeMap<String, String>,
    removals: BTreeSet<String>,
}

impl Index {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Index with the given staged state
    pub fn from_parts(additions: BTreeMap<String, String>, removals: BTreeSet<String>) -> Self {
        Self { additions, removals }
    }

    /// Load the index stored at `path`; a missing file is an empty index
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist the index to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write(path, serde_json::to_string_pretty(self)?.as_bytes())
    }

    /// Stage `content` as the new version of `filename`
    ///
    /// `committed` is the active commit's snapshot. Returns `false` when
    /// nothing changed.
    pub fn stage_addition(
        &mut self,
        store: &ObjectStore,
        committed: &Snapshot,
        filename: &str,
        content: &[u8],
    ) -> Result<bool> {
        let hash = hash_data(content);
        let otherwise_staged = self.additions.contains_key(filename) || self.removals.contains(filename);

        if committed.get(filename) == Some(hash.as_str()) && !otherwise_staged {
            debug!("{} unchanged from commit, not staged", filename);
            return Ok(false);
        }

        let stored = store.put_blob(content)?;
        self.stage_blob(filename, stored);
        Ok(true)
    }

    /// Record an already stored blob as the staged version of `filename`
    pub fn stage_blob(&mut self, filename: &str, hash: String) {
        debug!("Staged {} as {}", filename, short_hash(&hash));
        self.removals.remove(filename);
        self.additions.insert(filename.to_string(), hash);
    }

    /// Stage `filename` for removal
    ///
    /// # Errors
    ///
    /// [`ArborError::NotTracked`] if the file is neither in `committed` nor
    /// staged for addition.
    pub fn stage_removal(&mut self, committed: &Snapshot, filename: &str) -> Result<Removal> {
        let tracked_by_commit = committed.contains(filename);
        let unstaged_addition = self.additions.remove(filename).is_some();

        if !tracked_by_commit && !unstaged_addition {
            return Err(ArborError::NotTracked(filename.to_string()));
        }
        if tracked_by_commit {
            self.removals.insert(filename.to_string());
        }

        debug!(
            "Staged removal of {} (committed: {}, was staged: {})",
            filename, tracked_by_commit, unstaged_addition
        );
        Ok(Removal {
            tracked_by_commit,
            unstaged_addition,
        })
    }

    /// Mark a committed file for removal without any checks
    pub fn mark_removed(&mut self, filename: &str) {
        self.additions.remove(filename);
        self.removals.insert(filename.to_string());
    }

    /// Drop every staged change
    pub fn clear(&mut self) {
        self.additions.clear();
        self.removals.clear();
    }

    /// Whether nothing is staged
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.removals.is_empty()
    }

    /// Whether `filename` has any staged change
    pub fn is_staged(&self, filename: &str) -> bool {
        self.additions.contains_key(filename) || self.removals.contains(filename)
    }

    /// Staged blob hash for `filename`
    pub fn staged_addition(&self, filename: &str) -> Option<&str> {
        self.additions.get(filename).map(String::as_str)
    }

    /// Staged additions in filename order
    pub fn additions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.additions.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Staged removals in filename order
    pub fn removals(&self) -> impl Iterator<Item = &str> {
        self.removals.iter().map(String::as_str)
    }

    /// Filenames staged for addition
    pub fn staged_additions(&self) -> Vec<String> {
        self.additions.keys().cloned().collect()
    }

    /// Filenames staged for removal
    pub fn staged_removals(&self) -> Vec<String> {
        self.removals.iter().cloned().collect()
    }
}
