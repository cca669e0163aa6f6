//! Working directory access
//!
//! The engine touches the user's files only through [`WorkingDirectory`].
//! [`FsWorkingDirectory`] implements it over the plain files directly under
//! the repository root; subdirectories (including the storage directory) are
//! not tracked.

use crate::error::{ArborError, Result};
use crate::utils::atomic_write;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;
use walkdir::WalkDir;

/// Narrow accessor for the tracked file tree
pub trait WorkingDirectory {
    /// Names of all tracked-eligible files, sorted
    fn list_files(&self) -> Result<Vec<String>>;

    /// Content of `name`
    ///
    /// # Errors
    ///
    /// [`ArborError::FileNotFound`] if the file does not exist.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Create or replace `name`
    fn write(&self, name: &str, content: &[u8]) -> Result<()>;

    /// Delete `name`; deleting a missing file is not an error
    fn delete(&self, name: &str) -> Result<()>;

    /// Whether `name` exists
    fn exists(&self, name: &str) -> bool;
}

/// Flat file tree rooted at a directory
#[derive(Debug, Clone)]
pub struct FsWorkingDirectory {
    root: PathBuf,
}

impl FsWorkingDirectory {
    /// Working directory rooted at `root`
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        // Only plain names directly under the root are addressable
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains('/')
            && !name.contains('\\');
        if !valid {
            return Err(ArborError::InvalidReference(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

impl WorkingDirectory for FsWorkingDirectory {
    fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| ArborError::internal(format!("walking {:?}: {}", self.root, e)))?;
            if entry.file_type().is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        match fs::read(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ArborError::FileNotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, content: &[u8]) -> Result<()> {
        trace!("Writing working file {} ({} bytes)", name, content.len());
        atomic_write(&self.path_of(name)?, content)
    }

    fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_of(name)?) {
            Ok(()) => {
                trace!("Deleted working file {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).map(|p| p.is_file()).unwrap_or(false)
    }
}
