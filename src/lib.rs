//! # Arbor - local version control
//!
//! A small version-control engine for a single flat directory of files:
//! content-addressed snapshots, named branches, and three-way merge with
//! conflict markers.
//!
//! ## Overview
//!
//! Arbor keeps the full history of a directory on disk and lets you:
//! - Stage additions and removals, then commit them as immutable snapshots
//! - Create, switch and delete branches
//! - Restore single files or the whole tree from any commit
//! - Merge branches, detecting the split point in the commit graph
//! - Verify that every stored object still matches its hash
//!
//! ## Architecture
//!
//! - **Content-Addressable Storage**: blobs, snapshots and commits are stored
//!   under the SHA-256 digest of their bytes, in separate namespaces, so
//!   identical content is stored once
//! - **Snapshots**: a commit points at a filename to blob-hash mapping; a new
//!   snapshot is the parent's snapshot combined with the staging index
//! - **Commit Graph**: commits carry one or two parents; breadth-first search
//!   over that graph finds the merge base of two branches
//! - **Compression**: object payloads are framed and optionally LZ4
//!   compressed; digests always cover the uncompressed bytes
//! - **Atomic Pointers**: branch and HEAD updates replace a file atomically,
//!   which makes moving a branch the commit point of every operation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arbor::{MergeOutcome, Repository};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = PathBuf::from("./project");
//! let mut repo = Repository::init(root.clone(), root.join(".arbor"))?;
//!
//! std::fs::write(root.join("notes.txt"), "first draft\n")?;
//! repo.add("notes.txt")?;
//! repo.commit("add notes")?;
//!
//! repo.create_branch("edits")?;
//! repo.checkout_branch("edits")?;
//! std::fs::write(root.join("notes.txt"), "second draft\n")?;
//! repo.add("notes.txt")?;
//! repo.commit("revise notes")?;
//!
//! repo.checkout_branch("master")?;
//! match repo.merge("edits")? {
//!     MergeOutcome::FastForwarded { commit } => println!("now at {}", commit),
//!     other => println!("{:?}", other),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Custom Configuration
//!
//! ```rust,no_run
//! use arbor::{CompressionStrategy, RepositoryBuilder};
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = RepositoryBuilder::new()
//!     .compression_strategy(CompressionStrategy::None)
//!     .default_branch("main")
//!     .build(PathBuf::from("./project"))?;
//! println!("on {}", repo.current_branch()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return `Result<T, ArborError>`. Every failure a user can
//! trigger has its own variant, and [`ArborError::user_message`] renders the
//! one-line message the command-line tool prints.
//!
//! ## Module Organization
//!
//! - [`storage`]: content-addressable object store
//! - [`snapshot`] and [`index`]: committed file sets and staged changes
//! - [`commit`]: commit objects and their display form
//! - [`graph`]: ancestor search and merge base
//! - [`merge`]: three-way merge planning and application
//! - [`refs`]: branch pointers and HEAD
//! - [`worktree`]: the tracked working directory
//! - [`repository`]: the user-level command facade
//! - [`verification`]: integrity checking
//! - [`compression`], [`types`], [`error`]: supporting types

// Public API modules
pub mod commit;
pub mod compression;
pub mod error;
pub mod graph;
pub mod index;
pub mod merge;
pub mod refs;
pub mod repository;
pub mod snapshot;
pub mod storage;
pub mod types;
pub mod verification;
pub mod worktree;

// Internal modules (not part of public API)
mod collections;
mod utils;

// Re-export main types for convenience
pub use collections::DistanceMap;
pub use commit::Commit;
pub use compression::{CompressionEngine, CompressionStrategy};
pub use error::{ArborError, Result};
pub use graph::{ancestors, merge_base, CommitSource, ParentTable};
pub use index::Index;
pub use merge::{MergeAction, MergeResult};
pub use repository::{Repository, RepositoryBuilder};
pub use snapshot::Snapshot;
pub use storage::ObjectStore;
pub use types::*;
pub use utils::{hash_data, short_hash};
pub use verification::{RepositoryVerifier, VerificationReport};
pub use worktree::{FsWorkingDirectory, WorkingDirectory};
