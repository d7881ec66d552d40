//! Content hashing helpers for cache keys.

use std::hash::{Hash, Hasher};

/// Fx hash of any hashable key. Stable for the lifetime of the process,
/// which is all an in-memory cache key needs.
pub fn fx_hash_key<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = rustc_hash::FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Folds `value` into `seed`.
#[inline]
#[must_use]
pub fn hash_combine(value: u64, seed: u64) -> u64 {
    seed ^ (value
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2))
}

/// Hash of shader patch source text. Uses xxh3 so the value is stable
/// across runs and platforms and can be shown in debugging records.
#[inline]
#[must_use]
pub fn source_hash(source: &str) -> u64 {
    xxhash_rust::xxh3::xxh3_64(source.as_bytes())
}
