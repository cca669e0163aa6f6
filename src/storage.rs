//! Content-addressable object store
//!
//! Blobs, snapshots and commits are immutable objects keyed by the SHA-256
//! digest of their canonical bytes. Each kind has its own namespace, and
//! objects are sharded on the first two hex characters of the digest:
//!
//! ```text
//! storage_root/
//! ├── config.json            # StorageMetadata (format + RepositoryConfig)
//! └── objects/
//!     ├── blob/<xx>/<rest>
//!     ├── snapshot/<xx>/<rest>
//!     └── commit/<xx>/<rest>
//! ```
//!
//! ## Guarantees
//!
//! - `put` is idempotent: storing the same bytes twice leaves one copy and
//!   returns the same digest.
//! - Writes are atomic (temp file + rename), so a crash never leaves a
//!   partial object under a valid key.
//! - `get` re-hashes what it reads. A mismatch is reported as
//!   [`ArborError::HashMismatch`] and never silently repaired.
//! - There is no update or delete.
//!
//! Payloads are framed by the [`CompressionEngine`]; the digest is always
//! taken over the uncompressed bytes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use arbor::storage::ObjectStore;
//! use arbor::types::ObjectKind;
//!
//! let hash = store.put(ObjectKind::Blob, b"hello\n")?;
//! assert_eq!(store.get(ObjectKind::Blob, &hash)?, b"hello\n");
//! ```

use crate::collections::GxBuildHasher;
use crate::commit::Commit;
use crate::compression::{CompressionEngine, CompressionStats};
use crate::error::{ArborError, Result};
use crate::snapshot::Snapshot;
use crate::types::{ObjectKind, RepositoryConfig, StorageMetadata, StorageStats, FORMAT_VERSION};
use crate::utils::{atomic_write, hash_data, is_full_hash, short_hash};
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

/// Name of the metadata file at the storage root
pub const CONFIG_FILE: &str = "config.json";

/// Content-addressable storage for the three object kinds
///
/// All methods take `&self`; the presence cache, compression engine and
/// metadata are behind `DashMap`/`parking_lot` locks so a store can be shared
/// across threads (the verifier re-hashes objects in parallel).
pub struct ObjectStore {
    /// Storage root (the `.arbor` directory)
    root: PathBuf,
    /// Frames payloads on write, unframes on read
    compression: Arc<Mutex<CompressionEngine>>,
    /// Objects known to exist on disk
    known: Arc<DashMap<(ObjectKind, String), (), GxBuildHasher>>,
    /// Persisted metadata and configuration
    metadata: Arc<RwLock<StorageMetadata>>,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("root", &self.root)
            .field("known_objects", &self.known.len())
            .finish()
    }
}

impl ObjectStore {
    /// Initialize a new object store at `root`
    ///
    /// # Errors
    ///
    /// - [`ArborError::StorageAlreadyExists`] if `root` already holds a store
    /// - [`ArborError::Io`] if the directory layout cannot be created
    pub fn init(root: PathBuf, config: RepositoryConfig, compression: CompressionEngine) -> Result<Self> {
        if root.join(CONFIG_FILE).exists() {
            return Err(ArborError::StorageAlreadyExists(root));
        }

        for kind in ObjectKind::ALL {
            fs::create_dir_all(root.join("objects").join(kind.dir_name()))?;
        }

        let now = Utc::now();
        let metadata = StorageMetadata {
            format_version: FORMAT_VERSION,
            arbor_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: now,
            last_accessed: now,
            config,
        };
        atomic_write(
            &root.join(CONFIG_FILE),
            serde_json::to_string_pretty(&metadata)?.as_bytes(),
        )?;

        info!("Initialized object store at {:?}", root);

        Ok(Self::from_parts(root, metadata, compression))
    }

    /// Open an existing object store
    ///
    /// # Errors
    ///
    /// - [`ArborError::StorageNotInitialized`] if there is no store at `root`
    /// - [`ArborError::InvalidConfiguration`] if the format version is newer
    ///   than this build understands
    pub fn open(root: PathBuf, compression: CompressionEngine) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(ArborError::StorageNotInitialized(root));
        }

        let mut metadata: StorageMetadata = serde_json::from_str(&fs::read_to_string(&config_path)?)?;
        if metadata.format_version > FORMAT_VERSION {
            return Err(ArborError::InvalidConfiguration(format!(
                "storage format {} is newer than supported format {}",
                metadata.format_version, FORMAT_VERSION
            )));
        }
        metadata.last_accessed = Utc::now();

        debug!("Opened object store at {:?}", root);

        Ok(Self::from_parts(root, metadata, compression))
    }

    /// Open the store at `root`, initializing it first if needed
    pub fn init_or_open(root: PathBuf, config: RepositoryConfig, compression: CompressionEngine) -> Result<Self> {
        if root.join(CONFIG_FILE).exists() {
            Self::open(root, compression)
        } else {
            Self::init(root, config, compression)
        }
    }

    fn from_parts(root: PathBuf, metadata: StorageMetadata, compression: CompressionEngine) -> Self {
        Self {
            root,
            compression: Arc::new(Mutex::new(compression)),
            known: Arc::new(DashMap::with_capacity_and_hasher(1024, GxBuildHasher::default())),
            metadata: Arc::new(RwLock::new(metadata)),
        }
    }

    /// Store `bytes` under their digest and return the digest
    ///
    /// Storing bytes that are already present is a no-op.
    pub fn put(&self, kind: ObjectKind, bytes: &[u8]) -> Result<String> {
        let hash = hash_data(bytes);

        if self.contains(kind, &hash) {
            trace!("{} {} already stored", kind, short_hash(&hash));
            return Ok(hash);
        }

        let framed = self.compression.lock().compress(bytes);
        atomic_write(&self.object_path(kind, &hash), &framed)?;
        self.known.insert((kind, hash.clone()), ());

        debug!("Stored {} {} ({} bytes)", kind, short_hash(&hash), bytes.len());
        Ok(hash)
    }

    /// Load the bytes stored under `hash`
    ///
    /// # Errors
    ///
    /// - [`ArborError::NotFound`] if no such object exists
    /// - [`ArborError::HashMismatch`] if the stored bytes no longer hash to
    ///   `hash`
    /// - [`ArborError::Decompression`] if the payload frame is damaged
    pub fn get(&self, kind: ObjectKind, hash: &str) -> Result<Vec<u8>> {
        if !is_full_hash(hash) {
            return Err(ArborError::not_found(kind, hash));
        }
        let path = self.object_path(kind, hash);
        let framed = match fs::read(&path) {
            Ok(framed) => framed,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArborError::not_found(kind, hash));
            }
            Err(e) => return Err(e.into()),
        };

        let bytes = self.compression.lock().decompress(&framed)?;
        let actual = hash_data(&bytes);
        if actual != hash {
            return Err(ArborError::HashMismatch {
                expected: hash.to_string(),
                actual,
            });
        }

        self.known.insert((kind, hash.to_string()), ());
        trace!("Loaded {} {} ({} bytes)", kind, short_hash(hash), bytes.len());
        Ok(bytes)
    }

    /// Whether an object with this digest exists
    pub fn contains(&self, kind: ObjectKind, hash: &str) -> bool {
        if !is_full_hash(hash) {
            return false;
        }
        if self.known.contains_key(&(kind, hash.to_string())) {
            return true;
        }
        self.object_path(kind, hash).is_file()
    }

    /// All digests stored in one namespace, sorted
    pub fn list(&self, kind: ObjectKind) -> Result<Vec<String>> {
        let kind_dir = self.root.join("objects").join(kind.dir_name());
        if !kind_dir.exists() {
            return Ok(Vec::new());
        }

        let mut hashes = Vec::new();
        for entry in WalkDir::new(&kind_dir).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| ArborError::internal(format!("walking {:?}: {}", kind_dir, e)))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let shard = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let hash = format!("{}{}", shard, entry.file_name().to_string_lossy());
            // Skip stray temp files left by an interrupted write
            if is_full_hash(&hash) {
                hashes.push(hash);
            }
        }

        hashes.sort();
        Ok(hashes)
    }

    /// Store file content
    pub fn put_blob(&self, content: &[u8]) -> Result<String> {
        self.put(ObjectKind::Blob, content)
    }

    /// Load file content
    pub fn get_blob(&self, hash: &str) -> Result<Vec<u8>> {
        self.get(ObjectKind::Blob, hash)
    }

    /// Store a snapshot in its canonical bincode encoding
    pub fn put_snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        self.put(ObjectKind::Snapshot, &snapshot.to_bytes()?)
    }

    /// Load a snapshot
    pub fn get_snapshot(&self, hash: &str) -> Result<Snapshot> {
        let bytes = self.get(ObjectKind::Snapshot, hash)?;
        Snapshot::from_bytes(&bytes).map_err(|e| ArborError::CorruptObject {
            hash: hash.to_string(),
            reason: e.to_string(),
        })
    }

    /// Store a commit in its canonical JSON encoding
    pub fn put_commit(&self, commit: &Commit) -> Result<String> {
        self.put(ObjectKind::Commit, &commit.to_bytes()?)
    }

    /// Load a commit
    pub fn get_commit(&self, hash: &str) -> Result<Commit> {
        let bytes = self.get(ObjectKind::Commit, hash)?;
        Commit::from_bytes(&bytes).map_err(|e| ArborError::CorruptObject {
            hash: hash.to_string(),
            reason: e.to_string(),
        })
    }

    /// Snapshot referenced by a commit, empty for the root commit
    pub fn snapshot_of(&self, commit: &Commit) -> Result<Snapshot> {
        match &commit.snapshot {
            Some(hash) => self.get_snapshot(hash),
            None => Ok(Snapshot::default()),
        }
    }

    /// Expand an abbreviated commit id to the full digest
    ///
    /// # Errors
    ///
    /// [`ArborError::InvalidReference`] if no commit, or more than one
    /// commit, starts with `prefix`.
    pub fn resolve_commit(&self, prefix: &str) -> Result<String> {
        if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ArborError::InvalidReference(prefix.to_string()));
        }
        let prefix = prefix.to_ascii_lowercase();

        if is_full_hash(&prefix) {
            return if self.contains(ObjectKind::Commit, &prefix) {
                Ok(prefix)
            } else {
                Err(ArborError::InvalidReference(prefix))
            };
        }

        let mut matches = self
            .list(ObjectKind::Commit)?
            .into_iter()
            .filter(|hash| hash.starts_with(&prefix));

        match (matches.next(), matches.next()) {
            (Some(hash), None) => Ok(hash),
            _ => Err(ArborError::InvalidReference(prefix)),
        }
    }

    /// Object counts and on-disk size
    pub fn stats(&self) -> Result<StorageStats> {
        let mut stats = StorageStats::default();
        for kind in ObjectKind::ALL {
            let hashes = self.list(kind)?;
            for hash in &hashes {
                stats.total_size += fs::metadata(self.object_path(kind, hash))?.len();
            }
            match kind {
                ObjectKind::Blob => stats.blobs = hashes.len(),
                ObjectKind::Snapshot => stats.snapshots = hashes.len(),
                ObjectKind::Commit => stats.commits = hashes.len(),
            }
        }
        Ok(stats)
    }

    /// Replace the compression engine used for new writes
    ///
    /// Reads are unaffected: every payload carries its own frame header.
    pub fn set_compression(&self, compression: CompressionEngine) {
        *self.compression.lock() = compression;
    }

    /// Compression statistics for this session
    pub fn compression_stats(&self) -> CompressionStats {
        self.compression.lock().stats().clone()
    }

    /// Update and persist storage metadata
    pub fn update_metadata<F>(&self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut StorageMetadata),
    {
        let mut metadata = self.metadata.write();
        updater(&mut metadata);
        metadata.last_accessed = Utc::now();
        atomic_write(
            &self.root.join(CONFIG_FILE),
            serde_json::to_string_pretty(&*metadata)?.as_bytes(),
        )
    }

    /// Storage root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage metadata
    pub fn metadata(&self) -> &RwLock<StorageMetadata> {
        &self.metadata
    }

    /// On-disk location of an object
    pub fn object_path(&self, kind: ObjectKind, hash: &str) -> PathBuf {
        let split = 2.min(hash.len());
        let (prefix, suffix) = hash.split_at(split);
        self.root
            .join("objects")
            .join(kind.dir_name())
            .join(prefix)
            .join(suffix)
    }
}
