//! Core data types shared across the arbor library
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Object namespaces**: [`ObjectKind`] partitions the content-addressable store
//! - **Configuration**: [`RepositoryConfig`] and the persisted [`StorageMetadata`]
//! - **Operation results**: [`StatusReport`], [`MergeOutcome`], [`StorageStats`]
//!
//! ## Examples
//!
//! ```rust
//! use arbor::types::ObjectKind;
//!
//! assert_eq!(ObjectKind::Snapshot.dir_name(), "snapshot");
//! assert_eq!(ObjectKind::ALL.len(), 3);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Current on-disk format version
pub const FORMAT_VERSION: u32 = 1;

/// Name of the branch created by `init`
pub const DEFAULT_BRANCH: &str = "master";

/// Name of the storage directory inside the tracked root
pub const DEFAULT_STORAGE_DIR: &str = ".arbor";

/// The three immutable object kinds held by the object store
///
/// Each kind lives in its own namespace, so identical bytes stored as a
/// blob and as a snapshot never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Raw content of one file version
    Blob,
    /// Filename to blob-hash mapping
    Snapshot,
    /// Commit graph node
    Commit,
}

impl ObjectKind {
    /// Every kind, in storage-layout order
    pub const ALL: [ObjectKind; 3] = [ObjectKind::Blob, ObjectKind::Snapshot, ObjectKind::Commit];

    /// Directory name of this namespace under `objects/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Snapshot => "snapshot",
            ObjectKind::Commit => "commit",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Configuration for a repository instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Directory whose files are tracked
    pub root_path: PathBuf,
    /// Storage location
    pub storage_path: PathBuf,
    /// Compression strategy name (`none` or `fast`)
    pub compression_strategy: String,
    /// Branch created at initialization
    pub default_branch: String,
    /// Crate version that created this config
    pub version: String,
}

/// Metadata persisted next to the object store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageMetadata {
    /// Version of storage format
    pub format_version: u32,
    /// Crate version that created the storage
    pub arbor_version: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last accessed timestamp
    pub last_accessed: DateTime<Utc>,
    /// Configuration
    pub config: RepositoryConfig,
}

/// Object counts per namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Number of stored blobs
    pub blobs: usize,
    /// Number of stored snapshots
    pub snapshots: usize,
    /// Number of stored commits
    pub commits: usize,
    /// Bytes on disk across all namespaces
    pub total_size: u64,
}

impl StorageStats {
    /// Total number of stored objects
    pub fn object_count(&self) -> usize {
        self.blobs + self.snapshots + self.commits
    }
}

/// Snapshot of the repository state used by `status`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Active branch
    pub current_branch: String,
    /// All branch names, sorted
    pub branches: Vec<String>,
    /// Files staged for addition, sorted
    pub staged: Vec<String>,
    /// Files staged for removal, sorted
    pub removed: Vec<String>,
    /// Tracked files whose working content differs from the staged or
    /// committed version, sorted
    pub modified: Vec<String>,
    /// Tracked files missing from the working directory without a staged
    /// removal, sorted
    pub deleted: Vec<String>,
    /// Working files that are neither committed nor staged, sorted
    pub untracked: Vec<String>,
}

impl StatusReport {
    /// Whether the working directory matches the active commit exactly
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.untracked.is_empty()
    }
}

/// Result of merging another branch into the active one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergeOutcome {
    /// The other tip is already an ancestor of the current tip
    AlreadyMerged,
    /// The current tip was an ancestor of the other tip and now points at it
    FastForwarded {
        /// New tip of the active branch
        commit: String,
    },
    /// A two-parent merge commit was created
    Merged {
        /// Hash of the merge commit
        commit: String,
        /// Whether any file received conflict markers
        had_conflict: bool,
    },
}

impl MergeOutcome {
    /// Whether the merge left conflict markers in the working directory
    pub fn had_conflict(&self) -> bool {
        matches!(self, MergeOutcome::Merged { had_conflict: true, .. })
    }
}
