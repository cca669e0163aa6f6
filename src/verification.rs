//! Repository integrity checking
//!
//! Verification re-reads every stored object and checks the references
//! between them:
//!
//! 1. **Object level**: each blob, snapshot and commit still hashes to its
//!    key and decodes cleanly (checked in parallel with rayon)
//! 2. **Reference level**: commits point at existing snapshots and parents,
//!    snapshots point at existing blobs
//! 3. **Pointer level**: HEAD names an existing branch, every branch names
//!    an existing commit, and the history has exactly one root
//!
//! ## Usage
//!
//! ```rust,no_run
//! use arbor::Repository;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Repository::open(PathBuf::from("."), PathBuf::from(".arbor"))?;
//! let report = repo.verify()?;
//! if !report.is_valid() {
//!     println!("{}", report.summary());
//! }
//! # Ok(())
//! # }
//! ```

use crate::collections::HashSet;
use crate::commit::Commit;
use crate::error::Result;
use crate::refs::RefStore;
use crate::snapshot::Snapshot;
use crate::storage::ObjectStore;
use crate::types::ObjectKind;
use crate::utils::short_hash;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info};

/// A stored object that failed to load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectIssue {
    /// Namespace of the object
    pub kind: ObjectKind,
    /// Key the object is stored under
    pub hash: String,
    /// What went wrong
    pub reason: String,
}

/// Outcome of a full repository check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Number of objects re-hashed
    pub objects_checked: usize,
    /// Objects that failed to load or decode
    pub corrupt_objects: Vec<ObjectIssue>,
    /// References to objects that do not exist
    pub dangling_references: Vec<String>,
    /// Problems with HEAD, branches or the root commit
    pub pointer_errors: Vec<String>,
    /// Number of commits without a parent
    pub root_commits: usize,
    /// Time taken in milliseconds
    pub verification_time_ms: u64,
}

impl VerificationReport {
    /// Whether no problem was found
    pub fn is_valid(&self) -> bool {
        self.corrupt_objects.is_empty() && self.dangling_references.is_empty() && self.pointer_errors.is_empty()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        if self.is_valid() {
            format!(
                "Repository is valid ({} objects verified in {}ms)",
                self.objects_checked, self.verification_time_ms
            )
        } else {
            format!(
                "Repository has issues: {} corrupt objects, {} dangling references, {} pointer errors ({} objects checked)",
                self.corrupt_objects.len(),
                self.dangling_references.len(),
                self.pointer_errors.len(),
                self.objects_checked
            )
        }
    }
}

/// Checks a repository's objects and pointers
pub struct RepositoryVerifier<'a> {
    store: &'a ObjectStore,
    refs: &'a RefStore,
}

impl<'a> RepositoryVerifier<'a> {
    /// Verifier over a store and its pointer table
    pub fn new(store: &'a ObjectStore, refs: &'a RefStore) -> Self {
        Self { store, refs }
    }

    /// Run every check
    ///
    /// Damage is reported in the returned report; an `Err` means the check
    /// itself could not run (for example an unreadable objects directory).
    pub fn verify(&self) -> Result<VerificationReport> {
        let start = Instant::now();
        let mut report = VerificationReport::default();

        let blobs = self.store.list(ObjectKind::Blob)?;
        let snapshot_hashes = self.store.list(ObjectKind::Snapshot)?;
        let commit_hashes = self.store.list(ObjectKind::Commit)?;
        report.objects_checked = blobs.len() + snapshot_hashes.len() + commit_hashes.len();

        debug!(
            "Verifying {} blobs, {} snapshots, {} commits",
            blobs.len(),
            snapshot_hashes.len(),
            commit_hashes.len()
        );

        let blob_issues: Vec<ObjectIssue> = blobs
            .par_iter()
            .filter_map(|hash| {
                self.store
                    .get_blob(hash)
                    .err()
                    .map(|e| issue(ObjectKind::Blob, hash, e.to_string()))
            })
            .collect();
        report.corrupt_objects.extend(blob_issues);

        let snapshots = load_all(&snapshot_hashes, ObjectKind::Snapshot, |h| self.store.get_snapshot(h), &mut report);
        let commits = load_all(&commit_hashes, ObjectKind::Commit, |h| self.store.get_commit(h), &mut report);

        // Existence is judged from the listing, not the store's cache, so
        // objects deleted behind the store's back are caught
        let on_disk = OnDisk {
            blobs: blobs.iter().map(String::as_str).collect(),
            snapshots: snapshot_hashes.iter().map(String::as_str).collect(),
            commits: commit_hashes.iter().map(String::as_str).collect(),
        };

        check_commit_references(&commits, &on_disk, &mut report);
        check_snapshot_references(&snapshots, &on_disk, &mut report);
        self.check_pointers(&on_disk, &mut report)?;

        report.root_commits = commits.iter().filter(|(_, c)| c.is_root()).count();
        if report.root_commits != 1 {
            report
                .pointer_errors
                .push(format!("expected exactly one root commit, found {}", report.root_commits));
        }

        report.verification_time_ms = start.elapsed().as_millis() as u64;
        if report.is_valid() {
            info!("{}", report.summary());
        } else {
            error!("{}", report.summary());
        }
        Ok(report)
    }

    fn check_pointers(&self, on_disk: &OnDisk<'_>, report: &mut VerificationReport) -> Result<()> {
        match self.refs.active_branch() {
            Ok(active) if !self.refs.branch_exists(&active) => {
                report
                    .pointer_errors
                    .push(format!("HEAD names missing branch {}", active));
            }
            Ok(_) => {}
            Err(e) => report.pointer_errors.push(format!("HEAD unreadable: {}", e)),
        }

        for branch in self.refs.list_branches()? {
            let target = self.refs.read_branch(&branch)?;
            if !on_disk.commits.contains(target.as_str()) {
                report.pointer_errors.push(format!(
                    "branch {} points at missing commit {}",
                    branch,
                    short_hash(&target)
                ));
            }
        }
        Ok(())
    }
}

struct OnDisk<'a> {
    blobs: HashSet<&'a str>,
    snapshots: HashSet<&'a str>,
    commits: HashSet<&'a str>,
}

fn check_commit_references(commits: &[(String, Commit)], on_disk: &OnDisk<'_>, report: &mut VerificationReport) {
    for (hash, commit) in commits {
        if let Some(snapshot) = &commit.snapshot {
            if !on_disk.snapshots.contains(snapshot.as_str()) {
                report.dangling_references.push(format!(
                    "commit {} references missing snapshot {}",
                    short_hash(hash),
                    short_hash(snapshot)
                ));
            }
        }
        for parent in commit.parents() {
            if !on_disk.commits.contains(parent) {
                report.dangling_references.push(format!(
                    "commit {} references missing parent {}",
                    short_hash(hash),
                    short_hash(parent)
                ));
            }
        }
    }
}

fn check_snapshot_references(snapshots: &[(String, Snapshot)], on_disk: &OnDisk<'_>, report: &mut VerificationReport) {
    for (hash, snapshot) in snapshots {
        for (name, blob) in snapshot.iter() {
            if !on_disk.blobs.contains(blob) {
                report.dangling_references.push(format!(
                    "snapshot {} references missing blob {} for {}",
                    short_hash(hash),
                    short_hash(blob),
                    name
                ));
            }
        }
    }
}

fn issue(kind: ObjectKind, hash: &str, reason: String) -> ObjectIssue {
    ObjectIssue {
        kind,
        hash: hash.to_string(),
        reason,
    }
}

/// Decode every object of one kind in parallel, recording failures
fn load_all<T, F>(hashes: &[String], kind: ObjectKind, load: F, report: &mut VerificationReport) -> Vec<(String, T)>
where
    T: Send,
    F: Fn(&str) -> Result<T> + Sync,
{
    let results: Vec<(String, Result<T>)> = hashes.par_iter().map(|h| (h.clone(), load(h))).collect();

    let mut loaded = Vec::with_capacity(results.len());
    for (hash, result) in results {
        match result {
            Ok(value) => loaded.push((hash, value)),
            Err(e) => report.corrupt_objects.push(issue(kind, &hash, e.to_string())),
        }
    }
    loaded
}
