//! Branch pointers and HEAD
//!
//! Branches are files under `refs/heads/` holding a commit hash; `HEAD` holds
//! the name of the active branch. Every update is an atomic file replace,
//! which makes moving a branch the single commit point of an operation.

use crate::error::{ArborError, Result};
use crate::utils::{atomic_write, short_hash};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Pointer table rooted at a storage directory
#[derive(Debug, Clone)]
pub struct RefStore {
    root: PathBuf,
}

impl RefStore {
    /// Pointer table under `storage_root`
    pub fn new(storage_root: PathBuf) -> Self {
        Self { root: storage_root }
    }

    fn heads_dir(&self) -> PathBuf {
        self.root.join("refs").join("heads")
    }

    fn branch_path(&self, name: &str) -> Result<PathBuf> {
        validate_branch_name(name)?;
        Ok(self.heads_dir().join(name))
    }

    fn head_path(&self) -> PathBuf {
        self.root.join("HEAD")
    }

    /// Commit hash a branch points at
    pub fn read_branch(&self, name: &str) -> Result<String> {
        let path = self.branch_path(name)?;
        match fs::read_to_string(&path) {
            Ok(hash) => Ok(hash.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ArborError::BranchNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Point `name` at `hash`, creating the branch if needed
    pub fn write_branch(&self, name: &str, hash: &str) -> Result<()> {
        atomic_write(&self.branch_path(name)?, hash.as_bytes())?;
        debug!("Branch {} -> {}", name, short_hash(hash));
        Ok(())
    }

    /// Delete a branch pointer
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.branch_path(name)?) {
            Ok(()) => {
                debug!("Deleted branch {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ArborError::BranchNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a branch exists
    pub fn branch_exists(&self, name: &str) -> bool {
        self.branch_path(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// All branch names, sorted
    pub fn list_branches(&self) -> Result<Vec<String>> {
        let dir = self.heads_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type()?.is_file() && validate_branch_name(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Name of the active branch
    pub fn active_branch(&self) -> Result<String> {
        match fs::read_to_string(self.head_path()) {
            Ok(name) => Ok(name.trim().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArborError::StorageNotInitialized(self.root.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Make `name` the active branch
    pub fn set_active_branch(&self, name: &str) -> Result<()> {
        validate_branch_name(name)?;
        atomic_write(&self.head_path(), name.as_bytes())?;
        debug!("HEAD -> {}", name);
        Ok(())
    }

    /// Tip of the active branch
    pub fn head_commit(&self) -> Result<String> {
        self.read_branch(&self.active_branch()?)
    }

    /// Move the active branch to `hash`
    pub fn advance_head(&self, hash: &str) -> Result<()> {
        self.write_branch(&self.active_branch()?, hash)
    }

    /// Storage root
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Reject names that cannot be stored as a single pointer file
pub fn validate_branch_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.chars().any(|c| c.is_whitespace() || c.is_control());
    if valid {
        Ok(())
    } else {
        Err(ArborError::InvalidReference(name.to_string()))
    }
}
