//! Commit objects
//!
//! A [`Commit`] is an immutable node of the history DAG. It records a message,
//! a UTC timestamp, the hash of its snapshot and up to two parent hashes.
//! Its identity is the digest of its canonical JSON encoding, so changing
//! any field produces a different commit.
//!
//! Every repository starts from the same root commit: message
//! `initial commit`, the Unix epoch as timestamp, no snapshot and no parent.
//!
//! ## Examples
//!
//! ```rust
//! use arbor::commit::Commit;
//!
//! let root = Commit::initial();
//! assert!(root.is_root());
//! assert_eq!(root.hash().unwrap(), Commit::initial().hash().unwrap());
//! ```

use crate::error::Result;
use crate::storage::ObjectStore;
use crate::utils::{hash_data, short_hash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Message of the root commit
pub const INITIAL_COMMIT_MESSAGE: &str = "initial commit";

/// Node of the commit graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Commit message
    pub message: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Snapshot hash (None only for the root commit)
    pub snapshot: Option<String>,
    /// First parent (None only for the root commit)
    pub parent: Option<String>,
    /// Second parent, set on merge commits
    pub second_parent: Option<String>,
}

impl Commit {
    /// The root commit every repository starts from
    pub fn initial() -> Self {
        Self {
            message: INITIAL_COMMIT_MESSAGE.to_string(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            snapshot: None,
            parent: None,
            second_parent: None,
        }
    }

    /// Ordinary commit on top of `parent`
    pub fn new(message: impl Into<String>, parent: String, snapshot: String) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            snapshot: Some(snapshot),
            parent: Some(parent),
            second_parent: None,
        }
    }

    /// Merge commit with `parent` as the current tip and `second_parent` as
    /// the merged-in tip
    pub fn merge(message: impl Into<String>, parent: String, second_parent: String, snapshot: String) -> Self {
        Self {
            second_parent: Some(second_parent),
            ..Self::new(message, parent, snapshot)
        }
    }

    /// Parent hashes, first parent first
    pub fn parents(&self) -> Vec<&str> {
        self.parent
            .iter()
            .chain(self.second_parent.iter())
            .map(String::as_str)
            .collect()
    }

    /// Whether this commit has two parents
    pub fn is_merge(&self) -> bool {
        self.second_parent.is_some()
    }

    /// Whether this is the root commit
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Canonical encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a canonical encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Digest of the canonical encoding
    pub fn hash(&self) -> Result<String> {
        Ok(hash_data(&self.to_bytes()?))
    }

    /// Log entry in the classic format
    ///
    /// ```text
    /// ===
    /// commit <hash>
    /// Merge: <parent[..7]> <second_parent[..7]>
    /// Date: Thu Jan 1 00:00:00 1970 +0000
    /// <message>
    /// ```
    pub fn display_format(&self, hash: &str) -> String {
        let mut out = format!("===\ncommit {}\n", hash);
        if let (Some(p1), Some(p2)) = (&self.parent, &self.second_parent) {
            out.push_str(&format!("Merge: {} {}\n", &p1[..7.min(p1.len())], &p2[..7.min(p2.len())]));
        }
        out.push_str(&format!(
            "Date: {}\n{}\n",
            self.timestamp.format("%a %b %-d %H:%M:%S %Y %z"),
            self.message
        ));
        out
    }
}

/// Build and store a commit; never moves a branch pointer
pub fn create(
    store: &ObjectStore,
    message: &str,
    parent: String,
    snapshot: String,
    second_parent: Option<String>,
) -> Result<String> {
    let commit = match second_parent {
        Some(p2) => Commit::merge(message, parent, p2, snapshot),
        None => Commit::new(message, parent, snapshot),
    };
    let hash = store.put_commit(&commit)?;
    debug!(
        "Created commit {} (snapshot {}, merge: {})",
        short_hash(&hash),
        commit.snapshot.as_deref().map(short_hash).unwrap_or("-"),
        commit.is_merge()
    );
    Ok(hash)
}
