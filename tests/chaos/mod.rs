//! Chaos testing for arbor
//!
//! Damages the storage directory behind the repository's back (flipped
//! bytes, deleted objects, broken pointers, garbage index) and checks that
//! every kind of damage surfaces as an error or a verification finding,
//! never as silently wrong data.

use ::arbor::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;
use walkdir::WalkDir;

/// Repository with some history plus a seeded damage generator
pub struct ChaosRepo {
    pub temp_dir: TempDir,
    pub repo: Repository,
    pub chaos_engine: ChaosEngine,
}

impl ChaosRepo {
    pub fn new(commits: usize) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        let mut repo = RepositoryBuilder::new().init(root.clone()).unwrap();
        let mut chaos_engine = ChaosEngine::new(42);

        for i in 0..commits {
            for j in 0..3 {
                let name = format!("file_{}.bin", j);
                fs::write(root.join(&name), chaos_engine.random_bytes(100..900)).unwrap();
                repo.add(&name).unwrap();
            }
            repo.commit(&format!("commit {}", i)).unwrap();
        }

        Self {
            temp_dir,
            repo,
            chaos_engine,
        }
    }

    pub fn storage(&self) -> PathBuf {
        self.temp_dir.path().join(DEFAULT_STORAGE_DIR)
    }

    pub fn objects(&self, kind: ObjectKind) -> PathBuf {
        self.storage().join("objects").join(kind.dir_name())
    }

    pub fn reopen(&self) -> Result<Repository> {
        Repository::open(self.temp_dir.path().to_path_buf(), self.storage())
    }
}

/// Seeded source of damage
pub struct ChaosEngine {
    rng: StdRng,
}

impl ChaosEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn random_bytes(&mut self, len: std::ops::Range<usize>) -> Vec<u8> {
        let len = self.rng.random_range(len);
        (0..len).map(|_| self.rng.random()).collect()
    }

    /// Flip one byte in each of `count` distinct files under `dir`
    pub fn corrupt_random_files(&mut self, dir: &Path, count: usize) -> Vec<PathBuf> {
        let mut files = files_under(dir);
        let mut corrupted = Vec::new();

        while corrupted.len() < count && !files.is_empty() {
            let path = files.swap_remove(self.rng.random_range(0..files.len()));
            let mut content = fs::read(&path).unwrap();
            if content.is_empty() {
                continue;
            }
            let at = self.rng.random_range(0..content.len());
            content[at] ^= 0xff;
            fs::write(&path, content).unwrap();
            corrupted.push(path);
        }

        corrupted
    }

    /// Delete `count` distinct files under `dir`
    pub fn delete_random_files(&mut self, dir: &Path, count: usize) -> Vec<PathBuf> {
        let mut files = files_under(dir);
        let mut deleted = Vec::new();

        while deleted.len() < count && !files.is_empty() {
            let path = files.swap_remove(self.rng.random_range(0..files.len()));
            fs::remove_file(&path).unwrap();
            deleted.push(path);
        }

        deleted
    }
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

#[test]
fn test_flipped_blob_bytes_detected() {
    let mut chaos = ChaosRepo::new(5);
    let blob_dir = chaos.objects(ObjectKind::Blob);
    let corrupted = chaos.chaos_engine.corrupt_random_files(&blob_dir, 4);
    assert_eq!(corrupted.len(), 4);

    let report = chaos.repo.verify().unwrap();
    info!("{}", report.summary());
    assert!(!report.is_valid());
    assert_eq!(report.corrupt_objects.len(), 4);
    assert!(report.corrupt_objects.iter().all(|i| i.kind == ObjectKind::Blob));
}

#[test]
fn test_corruption_propagates_through_reads() {
    let chaos = ChaosRepo::new(1);
    let blob = chaos.repo.head_snapshot().unwrap().get("file_0.bin").unwrap().to_string();
    let path = chaos.repo.store().object_path(ObjectKind::Blob, &blob);

    let mut content = fs::read(&path).unwrap();
    let last = content.len() - 1;
    content[last] ^= 0x01;
    fs::write(&path, content).unwrap();

    let err = chaos.repo.checkout_file(None, "file_0.bin").unwrap_err();
    assert!(err.is_corruption(), "unexpected error: {}", err);
    assert!(matches!(err, ArborError::HashMismatch { .. }));
}

#[test]
fn test_unknown_frame_header() {
    let chaos = ChaosRepo::new(1);
    let blob = chaos.repo.head_snapshot().unwrap().get("file_1.bin").unwrap().to_string();
    fs::write(chaos.repo.store().object_path(ObjectKind::Blob, &blob), b"XXXXpayload").unwrap();

    let err = chaos.repo.store().get_blob(&blob).unwrap_err();
    assert!(matches!(err, ArborError::Decompression(_)));
    assert!(err.is_corruption());
}

#[test]
fn test_undecodable_snapshot() {
    let chaos = ChaosRepo::new(1);
    let store = chaos.repo.store();

    // Bytes that hash correctly but are not a snapshot encoding
    let hash = store.put(ObjectKind::Snapshot, &[0xff; 3]).unwrap();
    assert!(matches!(store.get_snapshot(&hash), Err(ArborError::CorruptObject { .. })));

    let report = chaos.repo.verify().unwrap();
    assert_eq!(report.corrupt_objects.len(), 1);
    assert_eq!(report.corrupt_objects[0].kind, ObjectKind::Snapshot);
}

#[test]
fn test_deleted_objects_are_dangling() {
    let mut chaos = ChaosRepo::new(3);
    let blob_dir = chaos.objects(ObjectKind::Blob);
    let deleted = chaos.chaos_engine.delete_random_files(&blob_dir, 2);
    assert_eq!(deleted.len(), 2);

    let report = chaos.reopen().unwrap().verify().unwrap();
    assert!(report.corrupt_objects.is_empty());
    assert!(report.dangling_references.len() >= 2);
}

#[test]
fn test_missing_tip_commit() {
    let chaos = ChaosRepo::new(2);
    let head = chaos.repo.head().unwrap();
    fs::remove_file(chaos.repo.store().object_path(ObjectKind::Commit, &head)).unwrap();

    let repo = chaos.reopen().unwrap();
    assert!(matches!(repo.log(), Err(ArborError::NotFound { kind: ObjectKind::Commit, .. })));

    let report = repo.verify().unwrap();
    assert!(report.pointer_errors.iter().any(|e| e.contains("missing commit")));
}

#[test]
fn test_missing_active_branch_pointer() {
    let chaos = ChaosRepo::new(1);
    fs::remove_file(chaos.storage().join("refs").join("heads").join(DEFAULT_BRANCH)).unwrap();

    assert!(matches!(chaos.repo.head(), Err(ArborError::BranchNotFound(_))));
    let report = chaos.repo.verify().unwrap();
    assert!(report.pointer_errors.iter().any(|e| e.contains("HEAD names missing branch")));
}

#[test]
fn test_garbage_branch_pointer_reported() {
    let chaos = ChaosRepo::new(1);
    chaos.repo.create_branch("dev").unwrap();
    fs::write(chaos.storage().join("refs").join("heads").join("dev"), "aéééé").unwrap();

    let report = chaos.repo.verify().unwrap();
    assert!(!report.is_valid());
    assert!(report
        .pointer_errors
        .iter()
        .any(|e| e.contains("branch dev points at missing commit")));
}

#[test]
fn test_garbage_index_refuses_to_open() {
    let chaos = ChaosRepo::new(1);
    fs::write(chaos.storage().join(repository::INDEX_FILE), b"{not json").unwrap();

    assert!(matches!(chaos.reopen(), Err(ArborError::Json(_))));
}

#[test]
fn test_interrupted_write_leftovers_ignored() {
    let chaos = ChaosRepo::new(1);
    let blob_dir = chaos.objects(ObjectKind::Blob);
    let shard = fs::read_dir(&blob_dir).unwrap().next().unwrap().unwrap().path();
    fs::write(shard.join(".tmpXYZ123"), b"half written").unwrap();

    let report = chaos.repo.verify().unwrap();
    assert!(report.is_valid(), "{}", report.summary());
}
