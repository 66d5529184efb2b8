pub use crate::ds::arena_list::{ArenaList, Entry, EntryRef, INVALID};
pub use crate::error::CacheError;
pub use crate::hash::{fx_hash_key, EvictCallback, HashFn};
pub use crate::metrics::snapshot::MetricsSnapshot;
pub use crate::policy::priority_lru::{PriorityLru, PriorityLruCore, MAX_ENTRY_PRIORITY};
