//! This module provides a deterministic `HashMap` variant. The hashing data
//! structures in the standard library are randomly seeded per process, so iterating one
//! would make two runs with the same random seed diverge. Use `HashMap::default()` to create a
//! new map; the `HashMapExt` trait is not needed.
//!
//! The `hash_str` free function is used to derive per-stream seeds in `crate::random`.

pub use rustc_hash::FxHashMap as HashMap;
use xxhash_rust::xxh3::xxh3_64;

/// A convenience method to compute a stable hash of a `&str`. Unlike the hashers behind
/// `HashMap`, the result is fixed across platforms and releases.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}
