//! Repository facade
//!
//! [`Repository`] ties the object store, pointer table, staging index and
//! working directory together into the user-level commands: add, rm,
//! commit, branch, checkout, reset, log, status and merge.
//!
//! ## Ordering
//!
//! Every mutating command writes objects first, moves a pointer last, and
//! only then clears the index. An interrupted command therefore never
//! leaves a branch pointing at an incomplete commit.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use arbor::Repository;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let root = PathBuf::from("./project");
//! let mut repo = Repository::init(root.clone(), root.join(".arbor"))?;
//!
//! std::fs::write(root.join("notes.txt"), "first draft\n")?;
//! repo.add("notes.txt")?;
//! let hash = repo.commit("add notes")?;
//!
//! repo.create_branch("feature")?;
//! repo.checkout_branch("feature")?;
//! # let _ = hash;
//! # Ok(())
//! # }
//! ```

use crate::commit::{self, Commit};
use crate::compression::{CompressionEngine, CompressionStrategy};
use crate::error::{ArborError, Result};
use crate::graph;
use crate::index::Index;
use crate::merge::{self, MergeResult};
use crate::refs::{validate_branch_name, RefStore};
use crate::snapshot::Snapshot;
use crate::storage::ObjectStore;
use crate::types::{MergeOutcome, ObjectKind, RepositoryConfig, StatusReport, DEFAULT_BRANCH, DEFAULT_STORAGE_DIR};
use crate::utils::{hash_data, short_hash};
use crate::verification::{RepositoryVerifier, VerificationReport};
use crate::worktree::{FsWorkingDirectory, WorkingDirectory};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Name of the persisted staging index
pub const INDEX_FILE: &str = "index.json";

/// A version-controlled directory
pub struct Repository {
    /// Directory whose files are tracked
    root_path: PathBuf,
    /// Content-addressable objects
    store: Arc<ObjectStore>,
    /// Branch pointers and HEAD
    refs: RefStore,
    /// Tracked file tree
    worktree: FsWorkingDirectory,
    /// Staged changes, persisted after every mutation
    index: Index,
    /// Location of the persisted index
    index_path: PathBuf,
    /// Configuration
    config: RepositoryConfig,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root_path", &self.root_path)
            .field("store", &self.store)
            .field("config", &self.config)
            .field("staged", &!self.index.is_empty())
            .finish()
    }
}

impl Repository {
    /// Initialize a repository tracking `root_path`, storing data in
    /// `storage_path`
    ///
    /// Creates the root commit and points the default branch at it.
    ///
    /// # Errors
    ///
    /// - [`ArborError::StorageAlreadyExists`] if a repository already exists
    ///   at `storage_path`
    /// - [`ArborError::Internal`] if `root_path` does not exist
    #[instrument(skip(storage_path))]
    pub fn init(root_path: PathBuf, storage_path: PathBuf) -> Result<Self> {
        RepositoryBuilder::new().init_at(root_path, storage_path)
    }

    /// Open an existing repository
    ///
    /// # Errors
    ///
    /// [`ArborError::StorageNotInitialized`] if there is no repository at
    /// `storage_path`.
    #[instrument(skip(storage_path))]
    pub fn open(root_path: PathBuf, storage_path: PathBuf) -> Result<Self> {
        let store = ObjectStore::open(storage_path.clone(), CompressionEngine::new(CompressionStrategy::default()))?;
        let config = store.metadata().read().config.clone();
        let strategy: CompressionStrategy = config.compression_strategy.parse()?;
        store.set_compression(CompressionEngine::new(strategy));

        let index_path = storage_path.join(INDEX_FILE);
        let index = Index::load(&index_path)?;

        debug!("Opened repository at {:?}", root_path);

        Ok(Self {
            worktree: FsWorkingDirectory::new(root_path.clone()),
            refs: RefStore::new(storage_path),
            store: Arc::new(store),
            root_path,
            index,
            index_path,
            config,
        })
    }

    /// Stage the working copy of `filename`
    ///
    /// Returns `false` when the file matches the active commit and was not
    /// otherwise staged.
    #[instrument(skip(self))]
    pub fn add(&mut self, filename: &str) -> Result<bool> {
        let content = self.worktree.read(filename)?;
        let head = self.head_snapshot()?;

        let changed = self.index.stage_addition(&self.store, &head, filename, &content)?;
        if changed {
            self.save_index()?;
        }
        Ok(changed)
    }

    /// Stage `filename` for removal, deleting the working copy if the file
    /// is tracked by the active commit
    #[instrument(skip(self))]
    pub fn rm(&mut self, filename: &str) -> Result<()> {
        let head = self.head_snapshot()?;
        let removal = self.index.stage_removal(&head, filename)?;
        self.save_index()?;

        if removal.tracked_by_commit {
            self.worktree.delete(filename)?;
        }
        Ok(())
    }

    /// Commit the staged changes on the active branch
    ///
    /// # Errors
    ///
    /// - [`ArborError::EmptyCommitMessage`] for a blank message
    /// - [`ArborError::NothingToCommit`] if nothing is staged
    #[instrument(skip(self))]
    pub fn commit(&mut self, message: &str) -> Result<String> {
        if message.trim().is_empty() {
            return Err(ArborError::EmptyCommitMessage);
        }
        if self.index.is_empty() {
            return Err(ArborError::NothingToCommit);
        }
        self.commit_index(message, None)
    }

    /// Merge commits are created even when the index is empty
    fn commit_index(&mut self, message: &str, second_parent: Option<String>) -> Result<String> {
        let head = self.refs.head_commit()?;
        let base = self.store.snapshot_of(&self.store.get_commit(&head)?)?;
        let snapshot = base.combine(&self.index);
        let snapshot_hash = self.store.put_snapshot(&snapshot)?;

        let hash = commit::create(&self.store, message, head, snapshot_hash, second_parent)?;
        self.refs.advance_head(&hash)?;

        self.index.clear();
        self.save_index()?;

        info!("Committed {} ({} files)", short_hash(&hash), snapshot.len());
        Ok(hash)
    }

    /// Create a branch at the active commit
    #[instrument(skip(self))]
    pub fn create_branch(&self, name: &str) -> Result<()> {
        validate_branch_name(name)?;
        if self.refs.branch_exists(name) {
            return Err(ArborError::BranchAlreadyExists(name.to_string()));
        }

        let head = self.refs.head_commit()?;
        self.refs.write_branch(name, &head)?;
        info!("Created branch {} at {}", name, short_hash(&head));
        Ok(())
    }

    /// Delete a branch pointer; its commits stay in the store
    #[instrument(skip(self))]
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        if !self.refs.branch_exists(name) {
            return Err(ArborError::BranchNotFound(name.to_string()));
        }
        if self.refs.active_branch()? == name {
            return Err(ArborError::CannotRemoveCurrentBranch(name.to_string()));
        }

        self.refs.delete_branch(name)?;
        info!("Deleted branch {}", name);
        Ok(())
    }

    /// Switch to another branch
    ///
    /// Writes every file of the branch's snapshot, deletes files tracked
    /// only by the current commit, clears the index and moves HEAD.
    #[instrument(skip(self))]
    pub fn checkout_branch(&mut self, name: &str) -> Result<()> {
        if !self.refs.branch_exists(name) {
            return Err(ArborError::BranchNotFound(name.to_string()));
        }
        self.ensure_no_untracked_files()?;
        if self.refs.active_branch()? == name {
            return Err(ArborError::AlreadyOnBranch(name.to_string()));
        }

        let target = self.refs.read_branch(name)?;
        self.replace_working_tree(&target)?;
        self.refs.set_active_branch(name)?;

        info!("Switched to branch {} at {}", name, short_hash(&target));
        Ok(())
    }

    /// Restore one file from a commit (the active commit if `commit` is
    /// None) without staging it
    #[instrument(skip(self))]
    pub fn checkout_file(&self, commit: Option<&str>, filename: &str) -> Result<()> {
        let hash = match commit {
            Some(prefix) => self.store.resolve_commit(prefix)?,
            None => self.refs.head_commit()?,
        };
        let snapshot = self.store.snapshot_of(&self.store.get_commit(&hash)?)?;
        let blob = snapshot.get(filename).ok_or_else(|| ArborError::FileNotInCommit {
            file: filename.to_string(),
            commit: hash.clone(),
        })?;

        let content = self.store.get_blob(blob)?;
        self.worktree.write(filename, &content)?;
        debug!("Restored {} from {}", filename, short_hash(&hash));
        Ok(())
    }

    /// Move the active branch to an arbitrary commit and check it out
    #[instrument(skip(self))]
    pub fn reset(&mut self, commit: &str) -> Result<String> {
        self.ensure_no_untracked_files()?;
        let target = self.store.resolve_commit(commit)?;

        self.replace_working_tree(&target)?;
        self.refs.advance_head(&target)?;

        info!("Reset {} to {}", self.refs.active_branch()?, short_hash(&target));
        Ok(target)
    }

    /// Merge another branch into the active one
    ///
    /// # Errors
    ///
    /// - [`ArborError::UncommittedChanges`] if anything is staged
    /// - [`ArborError::BranchNotFound`] if `branch` does not exist
    /// - [`ArborError::MergeWithSelf`] if `branch` is the active branch
    /// - [`ArborError::UntrackedFileInTheWay`] if the working directory has
    ///   untracked files
    #[instrument(skip(self))]
    pub fn merge(&mut self, branch: &str) -> Result<MergeOutcome> {
        if !self.index.is_empty() {
            return Err(ArborError::UncommittedChanges);
        }
        if !self.refs.branch_exists(branch) {
            return Err(ArborError::BranchNotFound(branch.to_string()));
        }
        let current_branch = self.refs.active_branch()?;
        if current_branch == branch {
            return Err(ArborError::MergeWithSelf(branch.to_string()));
        }
        self.ensure_no_untracked_files()?;

        let head = self.refs.head_commit()?;
        let other = self.refs.read_branch(branch)?;
        let split = graph::merge_base(self.store.as_ref(), &head, &other)?;

        if split == other {
            info!("{} is already merged into {}", branch, current_branch);
            return Ok(MergeOutcome::AlreadyMerged);
        }

        if split == head {
            self.replace_working_tree(&other)?;
            self.refs.advance_head(&other)?;
            info!("Fast-forwarded {} to {}", current_branch, short_hash(&other));
            return Ok(MergeOutcome::FastForwarded { commit: other });
        }

        // Staged on a copy so a failed merge leaves the index empty
        let mut staged = self.index.clone();
        let result: MergeResult =
            merge::merge_commits(self.store.as_ref(), &self.worktree, &mut staged, &head, &other)?;
        self.index = staged;
        self.save_index()?;

        if result.had_conflict {
            warn!("Encountered a merge conflict in {} file(s)", result.conflicts.len());
        }

        let message = format!("Merged {} into {}.", branch, current_branch);
        let commit = self.commit_index(&message, Some(other))?;

        Ok(MergeOutcome::Merged {
            commit,
            had_conflict: result.had_conflict,
        })
    }

    /// Commits along the first-parent chain of the active branch, newest
    /// first
    pub fn log(&self) -> Result<Vec<(String, Commit)>> {
        graph::first_parent_history(&self.store, &self.refs.head_commit()?)
    }

    /// Every stored commit, newest first
    pub fn global_log(&self) -> Result<Vec<(String, Commit)>> {
        let mut commits = self
            .store
            .list(ObjectKind::Commit)?
            .into_iter()
            .map(|hash| {
                let commit = self.store.get_commit(&hash)?;
                Ok((hash, commit))
            })
            .collect::<Result<Vec<_>>>()?;

        commits.sort_by(|(ha, a), (hb, b)| b.timestamp.cmp(&a.timestamp).then_with(|| ha.cmp(hb)));
        Ok(commits)
    }

    /// Hashes of every commit whose message is exactly `message`, sorted
    pub fn find(&self, message: &str) -> Result<Vec<String>> {
        Ok(self
            .global_log()?
            .into_iter()
            .filter(|(_, commit)| commit.message == message)
            .map(|(hash, _)| hash)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    /// Branches, staged changes and working-directory state
    pub fn status(&self) -> Result<StatusReport> {
        let head = self.head_snapshot()?;
        let working: BTreeSet<String> = self.worktree.list_files()?.into_iter().collect();

        let mut modified = Vec::new();
        let mut deleted = Vec::new();
        let tracked: BTreeSet<&str> = head
            .filenames()
            .chain(self.index.additions().map(|(name, _)| name))
            .filter(|name| !self.index.removals().any(|r| r == *name))
            .collect();

        for name in tracked {
            let expected = self.index.staged_addition(name).or_else(|| head.get(name));
            if !working.contains(name) {
                deleted.push(name.to_string());
            } else if expected != Some(hash_data(&self.worktree.read(name)?).as_str()) {
                modified.push(name.to_string());
            }
        }

        Ok(StatusReport {
            current_branch: self.refs.active_branch()?,
            branches: self.refs.list_branches()?,
            staged: self.index.staged_additions(),
            removed: self.index.staged_removals(),
            modified,
            deleted,
            untracked: self.untracked_files()?,
        })
    }

    /// Working files that are neither committed nor staged
    pub fn untracked_files(&self) -> Result<Vec<String>> {
        let head = self.head_snapshot()?;
        Ok(self
            .worktree
            .list_files()?
            .into_iter()
            .filter(|name| !head.contains(name) && !self.index.is_staged(name))
            .collect())
    }

    /// Check stored objects and the commit graph for damage
    pub fn verify(&self) -> Result<VerificationReport> {
        RepositoryVerifier::new(&self.store, &self.refs).verify()
    }

    /// Name of the active branch
    pub fn current_branch(&self) -> Result<String> {
        self.refs.active_branch()
    }

    /// All branch names, sorted
    pub fn branches(&self) -> Result<Vec<String>> {
        self.refs.list_branches()
    }

    /// Tip of the active branch
    pub fn head(&self) -> Result<String> {
        self.refs.head_commit()
    }

    /// Snapshot of the active commit
    pub fn head_snapshot(&self) -> Result<Snapshot> {
        let head = self.refs.head_commit()?;
        self.store.snapshot_of(&self.store.get_commit(&head)?)
    }

    /// Expand an abbreviated commit id
    pub fn resolve_commit(&self, prefix: &str) -> Result<String> {
        self.store.resolve_commit(prefix)
    }

    /// Staged changes
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Object store
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Tracked directory
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Configuration
    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    fn save_index(&self) -> Result<()> {
        self.index.save(&self.index_path)
    }

    fn ensure_no_untracked_files(&self) -> Result<()> {
        match self.untracked_files()?.into_iter().next() {
            Some(name) => Err(ArborError::UntrackedFileInTheWay(name)),
            None => Ok(()),
        }
    }

    /// Make the working directory match `target`'s snapshot and clear the
    /// index
    fn replace_working_tree(&mut self, target: &str) -> Result<()> {
        let current = self.head_snapshot()?;
        let wanted = self.store.snapshot_of(&self.store.get_commit(target)?)?;

        for (name, blob) in wanted.iter() {
            let content = self.store.get_blob(blob)?;
            self.worktree.write(name, &content)?;
        }
        for name in current.filenames().filter(|name| !wanted.contains(name)) {
            self.worktree.delete(name)?;
        }

        self.index.clear();
        self.save_index()?;
        debug!("Working tree now matches {}", short_hash(target));
        Ok(())
    }
}

/// Builder for creating or opening a repository with custom settings
///
/// # Default Values
///
/// - `compression_strategy`: `CompressionStrategy::Fast`
/// - `default_branch`: `master`
/// - `storage_dir_name`: `.arbor`
#[derive(Debug, Clone)]
pub struct RepositoryBuilder {
    compression_strategy: CompressionStrategy,
    default_branch: String,
    storage_dir_name: String,
}

impl RepositoryBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            compression_strategy: CompressionStrategy::default(),
            default_branch: DEFAULT_BRANCH.to_string(),
            storage_dir_name: DEFAULT_STORAGE_DIR.to_string(),
        }
    }

    /// Set compression strategy for new objects
    pub fn compression_strategy(mut self, strategy: CompressionStrategy) -> Self {
        self.compression_strategy = strategy;
        self
    }

    /// Set the name of the branch created at initialization
    pub fn default_branch(mut self, name: impl Into<String>) -> Self {
        self.default_branch = name.into();
        self
    }

    /// Set the name of the storage directory inside the tracked root
    pub fn storage_dir_name(mut self, name: impl Into<String>) -> Self {
        self.storage_dir_name = name.into();
        self
    }

    /// Storage location for a repository rooted at `root_path`
    pub fn storage_path_for(&self, root_path: &Path) -> PathBuf {
        root_path.join(&self.storage_dir_name)
    }

    /// Initialize a new repository at `root_path`
    pub fn init(self, root_path: PathBuf) -> Result<Repository> {
        let storage_path = self.storage_path_for(&root_path);
        self.init_at(root_path, storage_path)
    }

    /// Open the repository at `root_path`, initializing it first if needed
    pub fn build(self, root_path: PathBuf) -> Result<Repository> {
        let storage_path = self.storage_path_for(&root_path);
        if storage_path.join(crate::storage::CONFIG_FILE).exists() {
            Repository::open(root_path, storage_path)
        } else {
            self.init_at(root_path, storage_path)
        }
    }

    /// Initialize a new repository with an explicit storage location
    pub fn init_at(self, root_path: PathBuf, storage_path: PathBuf) -> Result<Repository> {
        if !root_path.is_dir() {
            return Err(ArborError::internal(format!("Root path {:?} does not exist", root_path)));
        }
        validate_branch_name(&self.default_branch).map_err(|_| {
            ArborError::InvalidConfiguration(format!("invalid default branch '{}'", self.default_branch))
        })?;
        if self.storage_dir_name.is_empty() {
            return Err(ArborError::InvalidConfiguration("empty storage directory name".to_string()));
        }

        let config = RepositoryConfig {
            root_path: root_path.clone(),
            storage_path: storage_path.clone(),
            compression_strategy: self.compression_strategy.name().to_string(),
            default_branch: self.default_branch.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        };

        let store = ObjectStore::init(
            storage_path.clone(),
            config.clone(),
            CompressionEngine::new(self.compression_strategy),
        )?;
        let root_commit = store.put_commit(&Commit::initial())?;

        let refs = RefStore::new(storage_path.clone());
        refs.write_branch(&self.default_branch, &root_commit)?;
        refs.set_active_branch(&self.default_branch)?;

        let index_path = storage_path.join(INDEX_FILE);
        let index = Index::new();
        index.save(&index_path)?;

        info!(
            "Initialized repository at {:?} on {} ({})",
            root_path,
            self.default_branch,
            short_hash(&root_commit)
        );

        Ok(Repository {
            worktree: FsWorkingDirectory::new(root_path.clone()),
            store: Arc::new(store),
            refs,
            root_path,
            index,
            index_path,
            config,
        })
    }
}

impl Default for RepositoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
