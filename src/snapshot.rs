//! Immutable tree state: filename to blob hash
//!
//! A [`Snapshot`] is backed by a `BTreeMap`, so iteration is sorted and the
//! bincode encoding is canonical: two snapshots with the same entries always
//! produce the same bytes and therefore the same digest.

use crate::error::Result;
use crate::index::Index;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sorted mapping from filename to blob hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: BTreeMap<String, String>,
}

impl Snapshot {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Blob hash recorded for `filename`
    pub fn get(&self, filename: &str) -> Option<&str> {
        self.entries.get(filename).map(String::as_str)
    }

    /// Whether `filename` is tracked
    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    /// Entries in filename order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Tracked filenames in order
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of tracked files
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no file is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply staged changes on top of this snapshot
    pub fn combine(&self, index: &Index) -> Snapshot {
        combine(self, index)
    }

    /// Canonical encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serde::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Decode a canonical encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (snapshot, _): (Snapshot, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(snapshot)
    }
}

impl From<BTreeMap<String, String>> for Snapshot {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

impl FromIterator<(String, String)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// New snapshot: `base`, minus every staged removal, overlaid with every
/// staged addition
pub fn combine(base: &Snapshot, index: &Index) -> Snapshot {
    let mut entries = base.entries.clone();
    for name in index.removals() {
        entries.remove(name);
    }
    for (name, hash) in index.additions() {
        entries.insert(name.to_string(), hash.to_string());
    }
    Snapshot { entries }
}
