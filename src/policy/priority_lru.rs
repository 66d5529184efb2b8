//! Priority-aware LRU cache over a fixed arena.
//!
//! Combines three structures that share one slot pool:
//!
//! - the recency list of [`ArenaList`], ordering every live slot from most
//!   to least recently touched,
//! - priority markers planted inside that list, partitioning it into
//!   bands (one per priority level, higher bands closer to the head),
//! - a hash bucket table whose per-bucket conflict chains thread through
//!   the same slots via their conflict indices.
//!
//! ## Architecture
//!
//! ```text
//!   recency list (front = most recent), max_priority = 2:
//!
//!   head                                                          tail
//!    │                                                             │
//!    ▼                                                             ▼
//!   [M3] ─ [e:p2] ─ [M2] ─ [e:p1] ─ [e:p1] ─ [M1] ─ [e:p0] ─ [M0]
//!    │        │       │                        │       │       │
//!  marker   band 2  marker      band 1       marker  band 0  marker
//!
//!   pos[p] holds the arena index of marker Mp. Entries of priority p sit
//!   between M(p+1) and Mp, most recent right after M(p+1).
//!
//!   buckets: Vec<u32>                 conflict chain (circular)
//!   ┌───────┬─────────┐
//!   │ hash%cap │ head │ ──► [e] ◄──► [e] ◄──► [e] ──► (wraps to head)
//!   └───────┴─────────┘
//! ```
//!
//! ## Operations
//!
//! | Method          | Lock (wrapper) | Effect                                  |
//! |-----------------|----------------|-----------------------------------------|
//! | `add`           | Write          | Insert or refresh at front of its band   |
//! | `add_to_back`   | Write          | Insert or refresh at back of its band    |
//! | `get`           | Write          | Lookup + promote within its band         |
//! | `has`           | Read           | Probe only, no relink, no hit/miss count |
//! | `remove`        | Write          | Unlink by key                            |
//! | `remove_oldest` | Write          | Evict the victim the scan would pick     |
//! | `oldest`        | Read           | Peek at that victim                      |
//! | `iterate`       | Read           | Keys/values/priorities, front to back    |
//! | `clear`         | Write          | Drop everything, callback per entry      |
//! | `len` / `capacity` / `metrics` | Read | Gauges and counters             |
//!
//! Eviction walks the markers from priority 0 upward and takes the first
//! non-marker slot sitting just behind one, so low bands are exhausted
//! before any higher entry is touched. Within a band the scan lands on
//! the least recently touched entry.
//!
//! ## Example Usage
//!
//! ```
//! use priolru::policy::priority_lru::PriorityLruCore;
//!
//! let mut cache: PriorityLruCore<&str, &str> = PriorityLruCore::new(2, 1).unwrap();
//! cache.add("meta", "hot", 1).unwrap();
//! cache.add("chunk-1", "cold", 0).unwrap();
//!
//! // A full cache evicts from the lowest band first.
//! cache.add("chunk-2", "cold", 0).unwrap();
//! assert_eq!(cache.get(&"meta").unwrap(), Some(&"hot"));
//! assert_eq!(cache.get(&"chunk-1").unwrap(), None);
//! assert_eq!(cache.get(&"chunk-2").unwrap(), Some(&"cold"));
//! ```
//!
//! ## Thread Safety
//!
//! - [`PriorityLruCore`]: **not** thread-safe, single-threaded core.
//! - [`PriorityLru`]: thread-safe wrapper, one `parking_lot::RwLock` per
//!   cache. `get` takes the write lock because a hit relinks the entry.
//!   The eviction callback runs under the write lock; it must not
//!   re-enter the cache.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ds::arena_list::{ArenaList, EntryRef, INVALID};
use crate::error::CacheError;
use crate::hash::{fx_hash_key, EvictCallback, HashFn};
use crate::metrics::metrics_impl::PriorityLruMetrics;
use crate::metrics::snapshot::MetricsSnapshot;

/// Highest accepted priority level; larger requests are clamped here.
pub const MAX_ENTRY_PRIORITY: u8 = 100;

/// Head value of an empty hash bucket. Same bit pattern as
/// [`INVALID`], different role.
const EMPTY_BUCKET: u32 = u32::MAX;

/// Single-threaded priority LRU core: arena list + priority markers +
/// hash bucket table + counters.
///
/// All state transitions are index surgery on the shared slot pool; no
/// per-entry allocation happens after construction. The arena holds
/// `capacity + max_priority + 2` slots, the extra ones permanently
/// occupied by the priority markers.
pub struct PriorityLruCore<K, V> {
    list: ArenaList<K, V>,
    buckets: Vec<u32>,
    cap: u32,
    /// Arena index of the marker for each priority, `0 ..= max_priority + 1`.
    pos: Vec<u32>,
    max_priority: u8,
    hash_fn: HashFn<K>,
    on_evict: Option<EvictCallback<K, V>>,
    metrics: PriorityLruMetrics,
}

impl<K: Eq, V> PriorityLruCore<K, V> {
    /// Creates a cache with the default Fx-based key hash and no eviction
    /// callback.
    ///
    /// `capacity` is the number of user entries the cache holds;
    /// `max_priority` is clamped to [`MAX_ENTRY_PRIORITY`].
    ///
    /// # Example
    ///
    /// ```
    /// use priolru::policy::priority_lru::PriorityLruCore;
    ///
    /// let cache: PriorityLruCore<&str, i32> = PriorityLruCore::new(100, 2).unwrap();
    /// assert_eq!(cache.capacity(), 100);
    /// assert_eq!(cache.len(), 0);
    /// ```
    pub fn new(capacity: usize, max_priority: u8) -> Result<Self, CacheError>
    where
        K: Hash + 'static,
    {
        Self::with_hasher(capacity, max_priority, fx_hash_key::<K>)
    }

    /// Creates a cache with an injected key-hash function.
    pub fn with_hasher<F>(capacity: usize, max_priority: u8, hash_fn: F) -> Result<Self, CacheError>
    where
        F: Fn(&K) -> u32 + Send + Sync + 'static,
    {
        Self::with_parts(capacity, max_priority, Box::new(hash_fn), None)
    }

    /// Full constructor: injected hash function plus optional eviction
    /// callback.
    ///
    /// The callback is invoked synchronously while an entry is evicted,
    /// under the wrapper's write lock; returning `false` vetoes that
    /// eviction. It must not re-enter the cache.
    pub fn with_parts(
        capacity: usize,
        max_priority: u8,
        hash_fn: HashFn<K>,
        on_evict: Option<EvictCallback<K, V>>,
    ) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::CapacityTooSmall);
        }
        let max_priority = max_priority.min(MAX_ENTRY_PRIORITY);
        let mut list = ArenaList::new(capacity + max_priority as usize + 2);
        let mut pos = Vec::with_capacity(max_priority as usize + 2);
        // Markers pushed front in ascending priority, so higher markers
        // end up closer to the head: M(max+1), ..., M1, M0 front to back.
        for p in 0..=max_priority + 1 {
            let marker = list.push_marker_front(p)?;
            pos.push(marker.idx());
        }
        Ok(PriorityLruCore {
            list,
            buckets: vec![EMPTY_BUCKET; capacity],
            cap: capacity as u32,
            pos,
            max_priority,
            hash_fn,
            on_evict,
            metrics: PriorityLruMetrics::new(),
        })
    }

    /// Number of user entries currently cached (markers excluded).
    pub fn len(&self) -> usize {
        (self.list.len() - self.max_priority as u32 - 2) as usize
    }

    /// `true` when no user entry is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of user entries (marker reservation excluded).
    pub fn capacity(&self) -> usize {
        self.cap as usize
    }

    /// The configured priority ceiling (after clamping).
    pub fn max_priority(&self) -> u8 {
        self.max_priority
    }

    /// Snapshot of the operation counters plus current gauges.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.len(), self.capacity())
    }

    #[inline]
    fn hash_to_bucket(&self, key: &K) -> (u32, u32) {
        let hash_id = (self.hash_fn)(key);
        (hash_id, hash_id % self.cap)
    }

    fn marker_ref(&self, priority: u8) -> Result<EntryRef, CacheError> {
        let idx = self
            .pos
            .get(priority as usize)
            .copied()
            .ok_or(CacheError::InvalidIndex)?;
        self.list.entry_ref(idx)
    }

    #[inline]
    fn bucket_is_empty(&self, bucket: u32) -> bool {
        self.buckets[bucket as usize] == EMPTY_BUCKET
    }

    /// Scans a bucket's conflict chain for an exact key match.
    ///
    /// The whole chain is compared; a hash collision with another key is
    /// never mistaken for a hit.
    fn find_in_bucket(&self, bucket: u32, key: &K) -> Result<Option<EntryRef>, CacheError> {
        if bucket >= self.cap {
            return Err(CacheError::InvalidIndex);
        }
        let start = self.buckets[bucket as usize];
        if start == EMPTY_BUCKET {
            return Ok(None);
        }
        let mut idx = start;
        while idx != EMPTY_BUCKET {
            let entry = match self.list.entry(idx) {
                Ok(entry) => entry,
                Err(err) => {
                    self.metrics.record_error();
                    return Err(err);
                }
            };
            if entry.key() == Some(key) {
                return self.list.entry_ref(idx).map(Some);
            }
            idx = entry.conflict_next;
            if idx == start {
                break;
            }
        }
        Ok(None)
    }

    /// Splices a slot onto its bucket's conflict chain as the new chain
    /// tail. A chain extension past the first member counts one conflict.
    fn bucket_push(&mut self, bucket: u32, new_idx: u32) -> Result<(), CacheError> {
        if bucket >= self.cap {
            return Err(CacheError::InvalidIndex);
        }
        if let Err(err) = self.list.entry(new_idx) {
            self.metrics.record_error();
            return Err(err);
        }
        let start = self.buckets[bucket as usize];
        if start == EMPTY_BUCKET {
            self.buckets[bucket as usize] = new_idx;
            let slot = self.list.entry_mut(new_idx)?;
            slot.conflict_prev = new_idx;
            slot.conflict_next = new_idx;
            return Ok(());
        }
        if start == new_idx {
            return Ok(());
        }
        let tail_idx = match self.list.entry(start) {
            Ok(head) => head.conflict_prev,
            Err(err) => {
                self.metrics.record_error();
                return Err(err);
            }
        };
        if let Err(err) = self.list.entry(tail_idx) {
            self.metrics.record_error();
            return Err(err);
        }
        self.list.entry_mut(tail_idx)?.conflict_next = new_idx;
        {
            let slot = self.list.entry_mut(new_idx)?;
            slot.conflict_prev = tail_idx;
            slot.conflict_next = start;
        }
        self.list.entry_mut(start)?.conflict_prev = new_idx;
        self.metrics.record_conflict();
        Ok(())
    }

    /// Unlinks a slot from its bucket's conflict chain. Four cases: sole
    /// member, chain head, chain tail, interior.
    fn bucket_remove(&mut self, bucket: u32, del_idx: u32) -> Result<(), CacheError> {
        if bucket >= self.cap {
            return Err(CacheError::InvalidIndex);
        }
        if let Err(err) = self.list.entry(del_idx) {
            self.metrics.record_error();
            return Err(err);
        }
        let start = self.buckets[bucket as usize];
        if start == EMPTY_BUCKET {
            return Ok(());
        }
        let tail_idx = match self.list.entry(start) {
            Ok(head) => head.conflict_prev,
            Err(err) => {
                self.metrics.record_error();
                return Err(err);
            }
        };
        if del_idx == start && del_idx == tail_idx {
            self.buckets[bucket as usize] = EMPTY_BUCKET;
        } else if del_idx == start {
            let next_idx = self.list.entry(del_idx)?.conflict_next;
            if let Err(err) = self.list.entry(next_idx) {
                self.metrics.record_error();
                return Err(err);
            }
            self.buckets[bucket as usize] = next_idx;
            self.list.entry_mut(next_idx)?.conflict_prev = tail_idx;
            self.list.entry_mut(tail_idx)?.conflict_next = next_idx;
        } else if del_idx == tail_idx {
            let prev_idx = self.list.entry(del_idx)?.conflict_prev;
            if let Err(err) = self.list.entry(prev_idx) {
                self.metrics.record_error();
                return Err(err);
            }
            self.list.entry_mut(prev_idx)?.conflict_next = start;
            self.list.entry_mut(start)?.conflict_prev = prev_idx;
        } else {
            let (prev_idx, next_idx) = {
                let del = self.list.entry(del_idx)?;
                (del.conflict_prev, del.conflict_next)
            };
            if let Err(err) = self.list.entry(prev_idx).and(self.list.entry(next_idx)) {
                self.metrics.record_error();
                return Err(err);
            }
            self.list.entry_mut(prev_idx)?.conflict_next = next_idx;
            self.list.entry_mut(next_idx)?.conflict_prev = prev_idx;
        }
        let del = self.list.entry_mut(del_idx)?;
        del.conflict_prev = INVALID;
        del.conflict_next = INVALID;
        Ok(())
    }

    /// Inserts `key -> value`, or refreshes an existing entry in place,
    /// leaving it at the most-recent end of its priority band.
    ///
    /// At capacity, one victim is evicted first (lowest band, oldest
    /// entry). `priority` above the configured maximum is clamped.
    ///
    /// # Example
    ///
    /// ```
    /// use priolru::policy::priority_lru::PriorityLruCore;
    ///
    /// let mut cache: PriorityLruCore<&str, i32> = PriorityLruCore::new(4, 1).unwrap();
    /// cache.add("a", 1, 0).unwrap();
    /// cache.add("a", 2, 1).unwrap(); // refresh: new value, new band
    /// assert_eq!(cache.len(), 1);
    /// assert_eq!(cache.get(&"a").unwrap(), Some(&2));
    /// ```
    pub fn add(&mut self, key: K, value: V, priority: u8) -> Result<(), CacheError> {
        let priority = priority.min(self.max_priority);
        let (hash_id, bucket) = self.hash_to_bucket(&key);
        let found = self.find_in_bucket(bucket, &key)?;
        // The band's upper marker: inserting right after it is the
        // most-recent position of band `priority`.
        let mark = self.marker_ref(priority + 1)?;
        if let Some(entry) = found {
            if let Err(err) = self.list.move_after(entry, mark) {
                self.metrics.record_error();
                return Err(err);
            }
            if let Err(err) = self
                .list
                .update_entry(entry.idx(), key, hash_id, value, priority)
            {
                self.metrics.record_error();
                return Err(err);
            }
            self.metrics.record_insert();
            return Ok(());
        }
        if self.list.len() >= self.list.cap() {
            self.evict_one();
        }
        let new = match self.list.insert_after(key, value, mark) {
            Ok(new) => new,
            Err(err) => {
                self.metrics.record_error();
                return Err(err);
            }
        };
        self.list.entry_mut(new.idx())?.hash_id = hash_id;
        if let Err(err) = self.bucket_push(bucket, new.idx()) {
            // Back out the list insert so the structures stay consistent.
            let _ = self.list.remove(new);
            return Err(err);
        }
        self.metrics.record_insert();
        Ok(())
    }

    /// Like [`add`](Self::add), but the entry lands at the least-recent
    /// end of its band, making it that band's next eviction candidate.
    pub fn add_to_back(&mut self, key: K, value: V, priority: u8) -> Result<(), CacheError> {
        let priority = priority.min(self.max_priority);
        let (hash_id, bucket) = self.hash_to_bucket(&key);
        let found = self.find_in_bucket(bucket, &key)?;
        // The band's lower marker: inserting right before it is the
        // least-recent position of band `priority`.
        let mark = self.marker_ref(priority)?;
        if let Some(entry) = found {
            if let Err(err) = self.list.move_before(entry, mark) {
                self.metrics.record_error();
                return Err(err);
            }
            if let Err(err) = self
                .list
                .update_entry(entry.idx(), key, hash_id, value, priority)
            {
                self.metrics.record_error();
                return Err(err);
            }
            self.metrics.record_insert();
            return Ok(());
        }
        if self.list.len() >= self.list.cap() {
            self.evict_one();
        }
        let new = match self.list.insert_before(key, value, mark) {
            Ok(new) => new,
            Err(err) => {
                self.metrics.record_error();
                return Err(err);
            }
        };
        self.list.entry_mut(new.idx())?.hash_id = hash_id;
        if let Err(err) = self.bucket_push(bucket, new.idx()) {
            let _ = self.list.remove(new);
            return Err(err);
        }
        self.metrics.record_insert();
        Ok(())
    }

    /// Looks up a key, promoting a hit to the most-recent position of its
    /// band.
    ///
    /// A miss through a non-empty bucket chain additionally counts one
    /// conflict (the chain held only colliding keys).
    pub fn get(&mut self, key: &K) -> Result<Option<&V>, CacheError> {
        let (_, bucket) = self.hash_to_bucket(key);
        let found = self.find_in_bucket(bucket, key)?;
        let entry = match found {
            Some(entry) => entry,
            None => {
                self.metrics.record_miss();
                if !self.bucket_is_empty(bucket) {
                    self.metrics.record_conflict();
                }
                return Ok(None);
            }
        };
        let priority = self.list.entry(entry.idx())?.priority();
        let mark = match self.marker_ref(priority + 1) {
            Ok(mark) => mark,
            Err(err) => {
                self.metrics.record_error();
                return Err(err);
            }
        };
        self.metrics.record_hit();
        if let Err(err) = self.list.move_after(entry, mark) {
            self.metrics.record_error();
            return Err(err);
        }
        Ok(self.list.entry(entry.idx())?.value())
    }

    /// Read-only probe.
    ///
    /// Returns the value without relinking and without touching the
    /// hit/miss counters; the only metric it feeds is the conflict
    /// counter, when the scanned chain held only colliding keys.
    pub fn has(&self, key: &K) -> Result<Option<&V>, CacheError> {
        let (_, bucket) = self.hash_to_bucket(key);
        match self.find_in_bucket(bucket, key)? {
            Some(entry) => Ok(self.list.entry(entry.idx())?.value()),
            None => {
                if !self.bucket_is_empty(bucket) {
                    self.metrics.record_conflict();
                }
                Ok(None)
            }
        }
    }

    /// Removes a key, returning its value. `Ok(None)` when absent.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>, CacheError> {
        let (_, bucket) = self.hash_to_bucket(key);
        let found = match self.find_in_bucket(bucket, key)? {
            Some(entry) => entry,
            None => return Ok(None),
        };
        {
            let entry = self.list.entry(found.idx())?;
            if entry.is_marker() {
                self.metrics.record_error();
                return Err(CacheError::NotUserNode);
            }
            if entry.key() != Some(key) {
                self.metrics.record_conflict();
                return Err(CacheError::KeyConflict);
            }
        }
        match self.remove_entry(found, false) {
            Ok(Some(value)) => {
                self.metrics.record_removal();
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.metrics.record_error();
                Err(err)
            }
        }
    }

    /// Removes the entry the eviction scan would pick, consulting the
    /// eviction callback. Returns `true` when an entry was removed.
    pub fn remove_oldest(&mut self) -> bool {
        let Some(victim) = self.oldest_ref() else {
            return false;
        };
        match self.remove_entry(victim, true) {
            Ok(Some(_)) => {
                self.metrics.record_removal();
                true
            }
            _ => false,
        }
    }

    /// Peeks at the current eviction candidate without removing it.
    pub fn oldest(&self) -> Option<(&K, &V, u8)> {
        let victim = self.oldest_ref()?;
        let entry = self.list.entry(victim.idx()).ok()?;
        match (entry.key(), entry.value()) {
            (Some(key), Some(value)) => Some((key, value, entry.priority())),
            _ => None,
        }
    }

    /// Walks the markers from the lowest band upward; the slot just
    /// behind a marker is that band's oldest entry.
    fn oldest_ref(&self) -> Option<EntryRef> {
        for p in 0..=self.max_priority {
            let Ok(marker) = self.list.entry(self.pos[p as usize]) else {
                return None;
            };
            let Ok(candidate) = self.list.entry(marker.prev()) else {
                return None;
            };
            if !candidate.is_marker() {
                return self.list.entry_ref(candidate.idx()).ok();
            }
        }
        None
    }

    /// Evicts one victim for capacity pressure. Counts an eviction only
    /// when an entry actually left the cache (a callback veto keeps it).
    fn evict_one(&mut self) -> bool {
        let Some(victim) = self.oldest_ref() else {
            return false;
        };
        match self.remove_entry(victim, true) {
            Ok(Some(_)) => {
                self.metrics.record_eviction();
                true
            }
            _ => false,
        }
    }

    /// Unlinks an entry from its bucket chain and the recency list.
    ///
    /// With `evict` set, the eviction callback is consulted first and may
    /// veto (`Ok(None)`, nothing touched). The bucket is derived from the
    /// stored hash id, so the key is never rehashed on this path.
    fn remove_entry(&mut self, e: EntryRef, evict: bool) -> Result<Option<V>, CacheError> {
        let bucket;
        {
            let entry = match self.list.entry(e.idx()) {
                Ok(entry) => entry,
                Err(err) => {
                    self.metrics.record_error();
                    return Err(err);
                }
            };
            if entry.is_marker() {
                return Err(CacheError::NotUserNode);
            }
            bucket = entry.hash_id() % self.cap;
            if evict {
                if let Some(callback) = &self.on_evict {
                    if let (Some(key), Some(value)) = (entry.key(), entry.value()) {
                        if !callback(key, value) {
                            return Ok(None);
                        }
                    }
                }
            }
        }
        self.bucket_remove(bucket, e.idx())?;
        match self.list.remove(e) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.metrics.record_error();
                Err(err)
            }
        }
    }

    /// Keys, values, and priorities of every user entry, front to back.
    pub fn iterate(&self) -> (Vec<K>, Vec<V>, Vec<u8>)
    where
        K: Clone,
        V: Clone,
    {
        self.list.iterate()
    }

    /// Drops every user entry, invoking the eviction callback for each
    /// (its return value is ignored here; `clear` always completes).
    /// The cache stays usable: markers and buckets are rebuilt, counters
    /// keep their values.
    pub fn clear(&mut self) {
        if let Some(callback) = &self.on_evict {
            for (key, value, _) in self.list.iter() {
                let _ = callback(key, value);
            }
        }
        self.list.clear();
        self.pos.clear();
        for p in 0..=self.max_priority + 1 {
            // Cannot fail: the pool was just refilled.
            if let Ok(marker) = self.list.push_marker_front(p) {
                self.pos.push(marker.idx());
            }
        }
        for bucket in &mut self.buckets {
            *bucket = EMPTY_BUCKET;
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.list.debug_validate_invariants();

        // The outermost markers pin the list ends.
        let front = self.list.front().expect("markers always present");
        let back = self.list.back().expect("markers always present");
        assert_eq!(front.idx(), self.pos[self.max_priority as usize + 1]);
        assert_eq!(back.idx(), self.pos[0]);

        // Forward walk: markers appear in descending priority, and every
        // user entry carries the priority of the band it sits in.
        let mut expected_marker = self.max_priority as i32 + 1;
        let mut band: Option<u8> = None;
        let mut users = 0usize;
        let mut idx = front.idx();
        loop {
            let entry = self.list.entry(idx).expect("walk hit a dead slot");
            if entry.is_marker() {
                assert_eq!(entry.priority() as i32, expected_marker, "marker out of order");
                band = entry.priority().checked_sub(1);
                expected_marker -= 1;
            } else {
                assert_eq!(Some(entry.priority()), band, "entry outside its band");
                users += 1;
            }
            idx = entry.next();
            if idx == front.idx() {
                break;
            }
        }
        assert_eq!(expected_marker, -1, "missing markers");
        assert_eq!(users, self.len());
        assert_eq!(self.len() + self.max_priority as usize + 2, self.list.len() as usize);

        // Every bucket chain is a consistent cycle of live user slots in
        // the right bucket, and the chains reach exactly the user entries.
        let mut chained = 0usize;
        for (b, &start) in self.buckets.iter().enumerate() {
            if start == EMPTY_BUCKET {
                continue;
            }
            let mut idx = start;
            loop {
                let entry = self.list.entry(idx).expect("chain member dead");
                assert!(!entry.is_marker(), "marker in a bucket chain");
                assert_eq!(entry.hash_id() % self.cap, b as u32, "entry in wrong bucket");
                let next = entry.conflict_next;
                let next_entry = self.list.entry(next).expect("chain neighbour dead");
                assert_eq!(next_entry.conflict_prev, idx, "broken conflict back-link");
                chained += 1;
                assert!(chained <= self.len(), "conflict chain cycle broken");
                idx = next;
                if idx == start {
                    break;
                }
            }
        }
        assert_eq!(chained, self.len());
    }
}

impl<K, V> fmt::Debug for PriorityLruCore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityLruCore")
            .field("len", &self.list.len())
            .field("capacity", &self.cap)
            .field("max_priority", &self.max_priority)
            .finish_non_exhaustive()
    }
}

/// Thread-safe, cloneable priority LRU cache.
///
/// Clones share the same cache. One reader-writer lock guards the whole
/// instance; see the module docs for which operations take which side.
///
/// Values come back as owned clones, so `V: Clone` is required on the
/// reading methods. Callers that want shared ownership instead of deep
/// clones use `V = Arc<T>`.
///
/// # Example
///
/// ```
/// use priolru::policy::priority_lru::PriorityLru;
///
/// let cache: PriorityLru<String, Vec<u8>> = PriorityLru::new(64, 2).unwrap();
/// cache.add("chunk".to_string(), vec![1, 2, 3], 0).unwrap();
/// assert_eq!(cache.get(&"chunk".to_string()).unwrap(), Some(vec![1, 2, 3]));
/// assert_eq!(cache.len(), 1);
/// ```
pub struct PriorityLru<K, V> {
    inner: Arc<RwLock<PriorityLruCore<K, V>>>,
}

impl<K, V> Clone for PriorityLru<K, V> {
    fn clone(&self) -> Self {
        PriorityLru {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Eq, V> PriorityLru<K, V> {
    /// Creates a concurrent cache with the default key hash and no
    /// eviction callback.
    pub fn new(capacity: usize, max_priority: u8) -> Result<Self, CacheError>
    where
        K: Hash + 'static,
    {
        Ok(Self::from_core(PriorityLruCore::new(capacity, max_priority)?))
    }

    /// Creates a concurrent cache with an injected key-hash function.
    pub fn with_hasher<F>(capacity: usize, max_priority: u8, hash_fn: F) -> Result<Self, CacheError>
    where
        F: Fn(&K) -> u32 + Send + Sync + 'static,
    {
        Ok(Self::from_core(PriorityLruCore::with_hasher(
            capacity,
            max_priority,
            hash_fn,
        )?))
    }

    /// Full constructor; see [`PriorityLruCore::with_parts`].
    ///
    /// The eviction callback runs while the write lock is held. It must
    /// not call back into this cache; doing so deadlocks.
    pub fn with_parts(
        capacity: usize,
        max_priority: u8,
        hash_fn: HashFn<K>,
        on_evict: Option<EvictCallback<K, V>>,
    ) -> Result<Self, CacheError> {
        Ok(Self::from_core(PriorityLruCore::with_parts(
            capacity,
            max_priority,
            hash_fn,
            on_evict,
        )?))
    }

    fn from_core(core: PriorityLruCore<K, V>) -> Self {
        PriorityLru {
            inner: Arc::new(RwLock::new(core)),
        }
    }

    /// Inserts or refreshes an entry; see [`PriorityLruCore::add`].
    pub fn add(&self, key: K, value: V, priority: u8) -> Result<(), CacheError> {
        self.inner.write().add(key, value, priority)
    }

    /// Inserts or refreshes at the back of the band; see
    /// [`PriorityLruCore::add_to_back`].
    pub fn add_to_back(&self, key: K, value: V, priority: u8) -> Result<(), CacheError> {
        self.inner.write().add_to_back(key, value, priority)
    }

    /// Looks up a key, promoting a hit within its band.
    ///
    /// Takes the write lock: a hit relinks the entry.
    pub fn get(&self, key: &K) -> Result<Option<V>, CacheError>
    where
        V: Clone,
    {
        let mut core = self.inner.write();
        core.get(key).map(|value| value.cloned())
    }

    /// Read-only probe; no relink, no hit/miss accounting.
    pub fn has(&self, key: &K) -> Result<Option<V>, CacheError>
    where
        V: Clone,
    {
        let core = self.inner.read();
        core.has(key).map(|value| value.cloned())
    }

    /// Removes a key, returning its value.
    pub fn remove(&self, key: &K) -> Result<Option<V>, CacheError> {
        self.inner.write().remove(key)
    }

    /// Removes the current eviction candidate; `true` when something was
    /// removed.
    pub fn remove_oldest(&self) -> bool {
        self.inner.write().remove_oldest()
    }

    /// Peeks at the current eviction candidate.
    pub fn oldest(&self) -> Option<(K, V, u8)>
    where
        K: Clone,
        V: Clone,
    {
        let core = self.inner.read();
        core.oldest()
            .map(|(key, value, priority)| (key.clone(), value.clone(), priority))
    }

    /// Number of cached user entries.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// `true` when the cache holds no user entries.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Maximum number of user entries.
    pub fn capacity(&self) -> usize {
        self.inner.read().capacity()
    }

    /// Counter snapshot plus gauges.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.read().metrics()
    }

    /// Keys, values, and priorities front to back.
    pub fn iterate(&self) -> (Vec<K>, Vec<V>, Vec<u8>)
    where
        K: Clone,
        V: Clone,
    {
        self.inner.read().iterate()
    }

    /// Drops every entry, invoking the eviction callback for each.
    pub fn clear(&self) {
        self.inner.write().clear()
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.inner.read().debug_validate_invariants()
    }
}

impl<K, V> fmt::Debug for PriorityLru<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.read();
        f.debug_struct("PriorityLru")
            .field("len", &core.list.len())
            .field("capacity", &core.cap)
            .finish_non_exhaustive()
    }
}
