pub mod priority_lru;

pub use priority_lru::{PriorityLru, PriorityLruCore, MAX_ENTRY_PRIORITY};
