//! Hash and callback plumbing for the cache layer.
//!
//! The engine does not own a hash function; callers inject one at
//! construction time. [`fx_hash_key`] is the default, built on
//! `rustc_hash::FxHasher` and folded down to the 32-bit value the bucket
//! table consumes. Any deterministic `Fn(&K) -> u32` works; cryptographic
//! quality is not required.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Injected key-hash function, `key -> u32`.
pub type HashFn<K> = Box<dyn Fn(&K) -> u32 + Send + Sync>;

/// Optional eviction callback, `(key, value) -> keep-evicting`.
///
/// Invoked synchronously under the cache's write lock while an entry is
/// being evicted. Returning `false` vetoes the eviction of that entry.
/// The callback must not re-enter the cache; doing so deadlocks.
pub type EvictCallback<K, V> = Box<dyn Fn(&K, &V) -> bool + Send + Sync>;

/// Default 32-bit key hash based on `FxHasher`.
///
/// Folds the high half of the 64-bit digest into the low half so both
/// halves contribute to the bucket index.
///
/// # Example
///
/// ```
/// use priolru::hash::fx_hash_key;
///
/// let a = fx_hash_key(&"chunk-0001");
/// let b = fx_hash_key(&"chunk-0001");
/// assert_eq!(a, b);
/// ```
#[inline]
pub fn fx_hash_key<K: Hash + ?Sized>(key: &K) -> u32 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    let digest = hasher.finish();
    (digest ^ (digest >> 32)) as u32
}
