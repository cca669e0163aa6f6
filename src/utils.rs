//! Utility functions shared by the storage and pointer layers
//!
//! - SHA-256 digests, hex-encoded
//! - Atomic file replacement (write to a sibling temp file, then rename)
//! - Short display form of a digest

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Compute the hex-encoded SHA-256 digest of `data`
///
/// # Example
///
/// ```rust,ignore
/// let hash = hash_data(b"hello");
/// assert_eq!(hash.len(), 64);
/// ```
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Whether `s` has the shape of a full digest
pub fn is_full_hash(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// First 8 characters of a digest, for logs and display
///
/// Also applied to unchecked pointer contents, so it cuts on a character
/// boundary.
pub fn short_hash(hash: &str) -> &str {
    hash.char_indices().nth(8).map_or(hash, |(i, _)| &hash[..i])
}

/// Atomically replace the file at `path` with `content`
///
/// The content is written to a temporary file in the same directory and
/// renamed over the target, so readers see either the old or the new file
/// and never a partial write. The parent directory is created if needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
