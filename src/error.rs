//! Error types for the arbor library
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! is [`ArborError`]. Errors are recoverable at the command boundary: the
//! caller reports them and decides what to do next. The one exception is
//! corruption of stored objects (see [`ArborError::is_corruption`]), which
//! signals a damaged repository and must not be papered over.
//!
//! Merge conflicts are deliberately *not* represented here. A conflicted merge
//! is a normal outcome reported through [`crate::merge::MergeResult`].

use crate::types::ObjectKind;
use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the arbor library
pub type Result<T> = std::result::Result<T, ArborError>;

/// Main error type for all arbor operations
#[derive(Debug, Error)]
pub enum ArborError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization/deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors during bincode serialization/deserialization
    #[error("Bincode error: {0}")]
    Bincode(String),

    /// Object not found in the content-addressable store
    #[error("{kind} object not found: {hash}")]
    NotFound {
        /// Namespace that was searched
        kind: ObjectKind,
        /// Requested digest
        hash: String,
    },

    /// Removal of a file that is neither committed nor staged
    #[error("File is not tracked: {0}")]
    NotTracked(String),

    /// Merge-base computation on two commits that share no ancestor
    #[error("No common ancestor between {0} and {1}")]
    NoCommonAncestor(String, String),

    /// Branch or commit id that does not name anything
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Stored bytes no longer hash to their key
    #[error("Hash mismatch - expected: {expected}, actual: {actual}")]
    HashMismatch {
        /// Digest the object is stored under
        expected: String,
        /// Digest of the bytes actually read
        actual: String,
    },

    /// Stored object could not be decoded
    #[error("Corrupt object {hash}: {reason}")]
    CorruptObject {
        /// Digest of the damaged object
        hash: String,
        /// Decoder message
        reason: String,
    },

    /// Decompression of a stored payload failed
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Storage is not initialized
    #[error("Storage not initialized at path: {0:?}")]
    StorageNotInitialized(PathBuf),

    /// Storage already exists
    #[error("Storage already exists at path: {0:?}")]
    StorageAlreadyExists(PathBuf),

    /// Named branch does not exist
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// Branch name is already taken
    #[error("Branch already exists: {0}")]
    BranchAlreadyExists(String),

    /// Attempt to delete the active branch
    #[error("Cannot remove the current branch: {0}")]
    CannotRemoveCurrentBranch(String),

    /// Checkout of the branch that is already active
    #[error("Already on branch: {0}")]
    AlreadyOnBranch(String),

    /// Commit requested with an empty index
    #[error("No changes added to the commit")]
    NothingToCommit,

    /// Commit requested with a blank message
    #[error("Commit message is empty")]
    EmptyCommitMessage,

    /// Merge requested while changes are staged
    #[error("You have uncommitted changes")]
    UncommittedChanges,

    /// Merge of the active branch into itself
    #[error("Cannot merge a branch with itself: {0}")]
    MergeWithSelf(String),

    /// Untracked working file would be overwritten or deleted
    #[error("Untracked file in the way: {0}")]
    UntrackedFileInTheWay(String),

    /// File is not part of the requested commit
    #[error("File {file} does not exist in commit {commit}")]
    FileNotInCommit {
        /// Requested filename
        file: String,
        /// Commit that was searched
        commit: String,
    },

    /// File is missing from the working directory
    #[error("File does not exist: {0}")]
    FileNotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<bincode::error::DecodeError> for ArborError {
    fn from(err: bincode::error::DecodeError) -> Self {
        ArborError::Bincode(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for ArborError {
    fn from(err: bincode::error::EncodeError) -> Self {
        ArborError::Bincode(err.to_string())
    }
}

impl ArborError {
    /// Create a not-found error for the given namespace
    pub fn not_found(kind: ObjectKind, hash: impl Into<String>) -> Self {
        ArborError::NotFound {
            kind,
            hash: hash.into(),
        }
    }

    /// Create an internal error with a custom message
    pub fn internal(msg: impl Into<String>) -> Self {
        ArborError::Internal(msg.into())
    }

    /// Check if this error indicates a damaged repository
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ArborError::HashMismatch { .. }
                | ArborError::CorruptObject { .. }
                | ArborError::Decompression(_)
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ArborError::NotTracked(_) => "No reason to remove the file.".to_string(),
            ArborError::InvalidReference(_) => "No commit with that id exists.".to_string(),
            ArborError::BranchNotFound(_) => "A branch with that name does not exist.".to_string(),
            ArborError::BranchAlreadyExists(_) => {
                "A branch with that name already exists.".to_string()
            }
            ArborError::CannotRemoveCurrentBranch(_) => {
                "Cannot remove the current branch.".to_string()
            }
            ArborError::AlreadyOnBranch(_) => "No need to checkout the current branch.".to_string(),
            ArborError::NothingToCommit => "No changes added to the commit.".to_string(),
            ArborError::EmptyCommitMessage => "Please enter a commit message.".to_string(),
            ArborError::MergeWithSelf(_) => "Cannot merge a branch with itself.".to_string(),
            ArborError::UntrackedFileInTheWay(_) => {
                "There is an untracked file in the way; delete it, or add and commit it first."
                    .to_string()
            }
            ArborError::FileNotInCommit { .. } => "File does not exist in that commit.".to_string(),
            ArborError::StorageNotInitialized(_) => {
                "Not in an initialized arbor directory.".to_string()
            }
            ArborError::StorageAlreadyExists(_) => {
                "An arbor version-control system already exists in the current directory."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}
