pub mod arena_list;

pub use arena_list::{ArenaList, Entry, EntryRef, INVALID};
