//! Error types for the priolru library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: the single error type shared by the arena list and the
//!   cache layer. Each variant is a distinct failure kind so callers can
//!   match on what went wrong instead of parsing messages.
//!
//! ## Example Usage
//!
//! ```
//! use priolru::error::CacheError;
//! use priolru::policy::priority_lru::PriorityLruCore;
//!
//! // Fallible constructor for user-configurable parameters
//! let cache: Result<PriorityLruCore<String, i32>, CacheError> =
//!     PriorityLruCore::new(100, 2);
//! assert!(cache.is_ok());
//!
//! // Zero capacity is caught without panicking
//! let bad = PriorityLruCore::<String, i32>::new(0, 2);
//! assert_eq!(bad.unwrap_err(), CacheError::CapacityTooSmall);
//! ```

use std::fmt;

/// Error returned by arena-list and cache operations.
///
/// Operations that return an error do not mutate the underlying
/// structures; a failed call leaves the recency list and the hash index
/// exactly as they were.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheError {
    /// Construction was attempted with a capacity of zero.
    CapacityTooSmall,
    /// The arena has no free slot left.
    PoolExhausted,
    /// An index is out of range or addresses a free slot.
    InvalidIndex,
    /// A handle's cached neighbour fields disagree with the arena's
    /// current state (the slot was removed or relinked since the handle
    /// was taken).
    StaleHandle,
    /// The list was modified between the steps of a multi-step relocation.
    ListChanged,
    /// The targeted slot is a priority marker, not a user entry.
    NotUserNode,
    /// A bucket lookup landed on an entry whose key does not match.
    KeyConflict,
}

impl CacheError {
    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &'static str {
        match self {
            CacheError::CapacityTooSmall => "capacity must be greater than zero",
            CacheError::PoolExhausted => "memory pool exhausted",
            CacheError::InvalidIndex => "invalid index or free slot",
            CacheError::StaleHandle => "stale entry handle",
            CacheError::ListChanged => "list changed during operation",
            CacheError::NotUserNode => "not a user node",
            CacheError::KeyConflict => "key conflict in bucket chain",
        }
    }
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for CacheError {}
