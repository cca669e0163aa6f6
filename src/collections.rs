//! Hash collection aliases for the in-memory graph and cache structures.
//!
//! With the `gxhash` feature (default) the maps use gxhash's hasher; without
//! it they fall back to the std hasher so the crate builds on CPUs lacking
//! AES-NI/SSE2. Code in this crate always goes through these aliases and the
//! `HashMapExt` constructors, never through std directly.

#[cfg(feature = "gxhash")]
pub use gxhash::{GxBuildHasher, HashMapExt};

#[cfg(feature = "gxhash")]
pub type HashMap<K, V> = gxhash::HashMap<K, V>;

#[cfg(feature = "gxhash")]
pub type HashSet<T> = gxhash::HashSet<T>;

#[cfg(not(feature = "gxhash"))]
pub type HashMap<K, V> = std::collections::HashMap<K, V>;

#[cfg(not(feature = "gxhash"))]
pub type HashSet<T> = std::collections::HashSet<T>;

#[cfg(not(feature = "gxhash"))]
pub type GxBuildHasher = std::hash::RandomState;

/// Constructors for [`HashMap`] matching the gxhash extension trait
#[cfg(not(feature = "gxhash"))]
pub trait HashMapExt {
    /// Empty map
    fn new() -> Self;
    /// Empty map with room for `capacity` entries
    fn with_capacity(capacity: usize) -> Self;
}

#[cfg(not(feature = "gxhash"))]
impl<K, V> HashMapExt for std::collections::HashMap<K, V> {
    fn new() -> Self {
        std::collections::HashMap::new()
    }

    fn with_capacity(capacity: usize) -> Self {
        std::collections::HashMap::with_capacity(capacity)
    }
}

/// Commit hash to minimum edge distance from a traversal start
pub type DistanceMap = HashMap<String, usize>;
