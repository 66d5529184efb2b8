//! Fixed-capacity circular doubly linked list backed by an index arena.
//!
//! All entries live in one preallocated slot array and are wired together
//! by `u32` indices, so the list performs no per-entry heap allocation
//! after construction and handles stay stable while a slot is live.
//!
//! ## Architecture
//!
//! ```text
//!   data: Vec<Entry<K, V>>                       free: Vec<u32> (stack)
//!   ┌─────┬──────────────────────────────────┐
//!   │ idx │ Entry { prev, next, key, value } │    free = [4, 1]
//!   ├─────┼──────────────────────────────────┤            ▲
//!   │  0  │ { prev: 3, next: 2, .. }         │            │ pop on alloc,
//!   │  1  │ { prev: !, next: !, .. } (free)  │            │ push on remove
//!   │  2  │ { prev: 0, next: 3, .. }         │
//!   │  3  │ { prev: 2, next: 0, .. }         │    ! = INVALID (u32::MAX),
//!   │  4  │ { prev: !, next: !, .. } (free)  │        also "no neighbour"
//!   └─────┴──────────────────────────────────┘
//!
//!   head ──► [0] ◄──► [2] ◄──► [3] ◄── tail
//!             ▲                 │
//!             └─────────────────┘   the list is circular: tail.next == head
//! ```
//!
//! ## Operations
//! - `push_front` / `push_back` / `push_marker_front`: O(1) allocation + splice
//! - `insert_before` / `insert_after`: O(1) splice relative to a mark slot
//! - `move_to_front` / `move_to_back` / `move_before` / `move_after`: O(1)
//! - `remove`: O(1) unlink + slot recycling
//! - `iter` / `iterate` / `find`: O(n) forward walk
//!
//! Handle-taking operations validate the [`EntryRef`] against the arena's
//! stored adjacency before mutating, so a handle that outlived its slot is
//! rejected instead of corrupting the cycle. Each slot additionally carries
//! a pair of conflict-chain indices that this module never touches; they
//! belong to the hash-index layer built on top.
//!
//! `debug_validate_invariants()` is available in debug/test builds.

use crate::error::CacheError;

/// Marks a free slot, a missing neighbour, and the empty-list head/tail.
pub const INVALID: u32 = u32::MAX;

/// One arena slot.
///
/// A slot is free (on the free stack), a live user entry, or a live
/// priority marker. Markers carry no payload and are skipped by
/// iteration. The conflict-chain fields are reserved for the cache
/// layer's hash index and are never modified by list operations.
#[derive(Debug)]
pub struct Entry<K, V> {
    pub(crate) marker: bool,
    pub(crate) priority: u8,
    pub(crate) prev: u32,
    pub(crate) next: u32,
    pub(crate) idx: u32,
    pub(crate) hash_id: u32,
    pub(crate) conflict_prev: u32,
    pub(crate) conflict_next: u32,
    pub(crate) payload: Option<(K, V)>,
}

impl<K, V> Entry<K, V> {
    fn empty() -> Self {
        Entry {
            marker: false,
            priority: 0,
            prev: INVALID,
            next: INVALID,
            idx: INVALID,
            hash_id: 0,
            conflict_prev: INVALID,
            conflict_next: INVALID,
            payload: None,
        }
    }

    /// Returns this slot's own arena index.
    #[inline]
    pub fn idx(&self) -> u32 {
        self.idx
    }

    /// Index of the neighbour toward the front of the list.
    #[inline]
    pub fn prev(&self) -> u32 {
        self.prev
    }

    /// Index of the neighbour toward the back of the list.
    #[inline]
    pub fn next(&self) -> u32 {
        self.next
    }

    /// The slot's priority band.
    #[inline]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// `true` for priority markers, `false` for user entries.
    #[inline]
    pub fn is_marker(&self) -> bool {
        self.marker
    }

    /// Full 32-bit hash of the key, as recorded by the cache layer.
    #[inline]
    pub fn hash_id(&self) -> u32 {
        self.hash_id
    }

    /// The entry's key; `None` for markers.
    #[inline]
    pub fn key(&self) -> Option<&K> {
        self.payload.as_ref().map(|(k, _)| k)
    }

    /// The entry's value; `None` for markers.
    #[inline]
    pub fn value(&self) -> Option<&V> {
        self.payload.as_ref().map(|(_, v)| v)
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.prev != INVALID && self.next != INVALID
    }
}

/// Copyable handle to a live slot, snapshotting its adjacency.
///
/// Handles are cheap and index-based; they are validated against the
/// arena's current state whenever they are used to mutate the list, so a
/// handle taken before an unrelated removal or relocation of its slot is
/// detected rather than trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    idx: u32,
    prev: u32,
    next: u32,
}

impl EntryRef {
    /// The referenced slot's arena index.
    #[inline]
    pub fn idx(&self) -> u32 {
        self.idx
    }

    /// The front-side neighbour index at the time the handle was taken.
    #[inline]
    pub fn prev(&self) -> u32 {
        self.prev
    }

    /// The back-side neighbour index at the time the handle was taken.
    #[inline]
    pub fn next(&self) -> u32 {
        self.next
    }
}

/// Circular doubly linked list over a fixed pool of slots.
///
/// `head` is the most recently touched end, `tail` the least. Both are
/// `INVALID` iff the list is empty; otherwise `tail.next == head` and
/// `head.prev == tail`.
#[derive(Debug)]
pub struct ArenaList<K, V> {
    data: Vec<Entry<K, V>>,
    free: Vec<u32>,
    head: u32,
    tail: u32,
    size: u32,
    cap: u32,
}

impl<K, V> ArenaList<K, V> {
    /// Creates a list with room for exactly `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity < INVALID as usize);
        let cap = capacity as u32;
        let mut data = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            data.push(Entry::empty());
        }
        ArenaList {
            data,
            free: (0..cap).collect(),
            head: INVALID,
            tail: INVALID,
            size: 0,
            cap,
        }
    }

    /// Number of live slots (user entries and markers).
    #[inline]
    pub fn len(&self) -> u32 {
        self.size
    }

    /// `true` if no slot is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Total slot capacity.
    #[inline]
    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// The front (most recently touched) entry, if any.
    pub fn front(&self) -> Option<&Entry<K, V>> {
        if self.size == 0 || self.head == INVALID {
            return None;
        }
        Some(&self.data[self.head as usize])
    }

    /// The back (least recently touched) entry, if any.
    pub fn back(&self) -> Option<&Entry<K, V>> {
        if self.size == 0 || self.tail == INVALID {
            return None;
        }
        Some(&self.data[self.tail as usize])
    }

    /// Returns the live entry at `idx`.
    pub fn entry(&self, idx: u32) -> Result<&Entry<K, V>, CacheError> {
        if idx >= self.cap {
            return Err(CacheError::InvalidIndex);
        }
        let slot = &self.data[idx as usize];
        if !slot.is_live() {
            return Err(CacheError::InvalidIndex);
        }
        Ok(slot)
    }

    /// Mutable access to the live entry at `idx`.
    ///
    /// Crate-internal: the cache layer uses this for conflict-chain
    /// surgery and hash-id stamping; list adjacency stays private.
    pub(crate) fn entry_mut(&mut self, idx: u32) -> Result<&mut Entry<K, V>, CacheError> {
        if idx >= self.cap {
            return Err(CacheError::InvalidIndex);
        }
        let slot = &mut self.data[idx as usize];
        if !slot.is_live() {
            return Err(CacheError::InvalidIndex);
        }
        Ok(slot)
    }

    /// Takes a validated handle to the live slot at `idx`.
    pub fn entry_ref(&self, idx: u32) -> Result<EntryRef, CacheError> {
        let slot = self.entry(idx)?;
        Ok(EntryRef {
            idx: slot.idx,
            prev: slot.prev,
            next: slot.next,
        })
    }

    fn alloc(&mut self) -> Option<u32> {
        let idx = self.free.pop()?;
        let slot = &mut self.data[idx as usize];
        slot.prev = INVALID;
        slot.next = INVALID;
        slot.conflict_prev = INVALID;
        slot.conflict_next = INVALID;
        Some(idx)
    }

    fn release(&mut self, idx: u32) {
        self.free.push(idx);
    }

    fn fill_slot(&mut self, idx: u32, key: K, value: V, priority: u8) {
        let slot = &mut self.data[idx as usize];
        slot.marker = false;
        slot.priority = priority;
        slot.idx = idx;
        slot.hash_id = 0;
        slot.payload = Some((key, value));
    }

    fn link_front(&mut self, idx: u32) {
        if self.head != INVALID && self.tail != INVALID {
            self.data[self.head as usize].prev = idx;
            self.data[self.tail as usize].next = idx;
            self.data[idx as usize].next = self.head;
            self.data[idx as usize].prev = self.tail;
            self.head = idx;
        } else {
            self.data[idx as usize].next = idx;
            self.data[idx as usize].prev = idx;
            self.head = idx;
            self.tail = idx;
        }
        self.size += 1;
    }

    fn link_back(&mut self, idx: u32) {
        if self.head != INVALID && self.tail != INVALID {
            self.data[self.tail as usize].next = idx;
            self.data[self.head as usize].prev = idx;
            self.data[idx as usize].prev = self.tail;
            self.data[idx as usize].next = self.head;
            self.tail = idx;
        } else {
            self.data[idx as usize].next = idx;
            self.data[idx as usize].prev = idx;
            self.head = idx;
            self.tail = idx;
        }
        self.size += 1;
    }

    /// Allocates a slot for `(key, value)` and splices it in as the new head.
    pub fn push_front(&mut self, key: K, value: V, priority: u8) -> Result<EntryRef, CacheError> {
        let idx = self.alloc().ok_or(CacheError::PoolExhausted)?;
        self.fill_slot(idx, key, value, priority);
        self.link_front(idx);
        self.entry_ref(idx)
    }

    /// Allocates a slot for `(key, value)` and splices it in as the new tail.
    pub fn push_back(&mut self, key: K, value: V, priority: u8) -> Result<EntryRef, CacheError> {
        let idx = self.alloc().ok_or(CacheError::PoolExhausted)?;
        self.fill_slot(idx, key, value, priority);
        self.link_back(idx);
        self.entry_ref(idx)
    }

    /// Allocates a payload-free priority marker and splices it in as the
    /// new head. Markers are skipped by iteration and rejected by
    /// [`remove`](Self::remove).
    pub fn push_marker_front(&mut self, priority: u8) -> Result<EntryRef, CacheError> {
        let idx = self.alloc().ok_or(CacheError::PoolExhausted)?;
        {
            let slot = &mut self.data[idx as usize];
            slot.marker = true;
            slot.priority = priority;
            slot.idx = idx;
            slot.hash_id = 0;
            slot.payload = None;
        }
        self.link_front(idx);
        self.entry_ref(idx)
    }

    /// Validates a mark argument for liveness only.
    ///
    /// A mark's neighbour snapshot may legitimately be stale (the caller
    /// may have removed an entry next to a marker it fetched earlier), so
    /// only range and occupancy are checked.
    fn check_mark(&self, mark: EntryRef) -> Result<(), CacheError> {
        if mark.idx >= self.cap {
            return Err(CacheError::InvalidIndex);
        }
        if !self.data[mark.idx as usize].is_live() {
            return Err(CacheError::InvalidIndex);
        }
        Ok(())
    }

    /// Validates a handle for an operation that relocates or frees its
    /// slot: the handle must be well-formed, the slot live, and the
    /// snapshot in agreement with the arena. Returns the stored
    /// `(prev, next)` pair.
    fn check_handle(&self, e: EntryRef, mismatch: CacheError) -> Result<(u32, u32), CacheError> {
        if e.prev == INVALID || e.next == INVALID {
            return Err(CacheError::StaleHandle);
        }
        if e.idx >= self.cap {
            return Err(CacheError::InvalidIndex);
        }
        let slot = &self.data[e.idx as usize];
        if !slot.is_live() {
            return Err(CacheError::InvalidIndex);
        }
        if e.prev != slot.prev || e.next != slot.next {
            return Err(mismatch);
        }
        Ok((slot.prev, slot.next))
    }

    /// Splices a new entry immediately before `mark`, inheriting the
    /// mark's priority. Becomes the new head when the mark was the head.
    pub fn insert_before(&mut self, key: K, value: V, mark: EntryRef) -> Result<EntryRef, CacheError> {
        self.check_mark(mark)?;
        let idx = self.alloc().ok_or(CacheError::PoolExhausted)?;
        let mark_idx = mark.idx;
        let (m_prev, m_priority) = {
            let m = &self.data[mark_idx as usize];
            (m.prev, m.priority)
        };
        self.fill_slot(idx, key, value, m_priority);
        self.data[idx as usize].next = mark_idx;
        self.data[idx as usize].prev = m_prev;
        self.data[m_prev as usize].next = idx;
        self.data[mark_idx as usize].prev = idx;
        if self.head == mark_idx {
            self.head = idx;
        }
        self.size += 1;
        self.entry_ref(idx)
    }

    /// Splices a new entry immediately after `mark`, with priority one
    /// below the mark's (priority propagates down from the band's upper
    /// marker). Becomes the new tail when the mark was the tail.
    pub fn insert_after(&mut self, key: K, value: V, mark: EntryRef) -> Result<EntryRef, CacheError> {
        self.check_mark(mark)?;
        let idx = self.alloc().ok_or(CacheError::PoolExhausted)?;
        let mark_idx = mark.idx;
        let (m_next, m_priority) = {
            let m = &self.data[mark_idx as usize];
            (m.next, m.priority)
        };
        self.fill_slot(idx, key, value, m_priority.wrapping_sub(1));
        self.data[idx as usize].prev = mark_idx;
        self.data[idx as usize].next = m_next;
        self.data[m_next as usize].prev = idx;
        self.data[mark_idx as usize].next = idx;
        if self.tail == mark_idx {
            self.tail = idx;
        }
        self.size += 1;
        self.entry_ref(idx)
    }

    /// Unlinks the referenced user entry, recycles its slot, and returns
    /// the value.
    ///
    /// Fails with [`CacheError::StaleHandle`] when the handle's snapshot
    /// disagrees with the arena, with [`CacheError::InvalidIndex`] when
    /// the slot is free or out of range, and with
    /// [`CacheError::NotUserNode`] for markers. Nothing is mutated on
    /// any error path.
    pub fn remove(&mut self, e: EntryRef) -> Result<V, CacheError> {
        let (s_prev, s_next) = self.check_handle(e, CacheError::StaleHandle)?;
        let idx = e.idx;
        if self.data[idx as usize].marker {
            return Err(CacheError::NotUserNode);
        }
        self.data[s_prev as usize].next = s_next;
        self.data[s_next as usize].prev = s_prev;
        if self.head == idx {
            self.head = s_next;
        }
        if self.tail == idx {
            self.tail = s_prev;
        }
        let payload = {
            let slot = &mut self.data[idx as usize];
            slot.prev = INVALID;
            slot.next = INVALID;
            slot.conflict_prev = INVALID;
            slot.conflict_next = INVALID;
            slot.marker = false;
            slot.priority = 0;
            slot.hash_id = 0;
            slot.payload.take()
        };
        self.release(idx);
        self.size -= 1;
        if self.size == 0 {
            self.head = INVALID;
            self.tail = INVALID;
        }
        match payload {
            Some((_, value)) => Ok(value),
            // A live non-marker slot always carries a payload; this arm
            // is unreachable but kept total.
            None => Err(CacheError::InvalidIndex),
        }
    }

    /// Relocates the referenced entry to the head. No-op when it already
    /// is the head; when it is the tail, only the end pointers rotate.
    pub fn move_to_front(&mut self, e: EntryRef) -> Result<(), CacheError> {
        let (s_prev, s_next) = self.check_handle(e, CacheError::ListChanged)?;
        let idx = e.idx;
        if idx == self.head {
            return Ok(());
        }
        if idx == self.tail {
            self.head = idx;
            self.tail = s_prev;
        } else {
            self.data[s_prev as usize].next = s_next;
            self.data[s_next as usize].prev = s_prev;
            self.data[self.tail as usize].next = idx;
            self.data[self.head as usize].prev = idx;
            let (head, tail) = (self.head, self.tail);
            let slot = &mut self.data[idx as usize];
            slot.next = head;
            slot.prev = tail;
            self.head = idx;
        }
        Ok(())
    }

    /// Relocates the referenced entry to the tail. Mirror of
    /// [`move_to_front`](Self::move_to_front).
    pub fn move_to_back(&mut self, e: EntryRef) -> Result<(), CacheError> {
        let (s_prev, s_next) = self.check_handle(e, CacheError::ListChanged)?;
        let idx = e.idx;
        if idx == self.tail {
            return Ok(());
        }
        if idx == self.head {
            self.head = s_next;
            self.tail = idx;
        } else {
            self.data[s_prev as usize].next = s_next;
            self.data[s_next as usize].prev = s_prev;
            self.data[self.tail as usize].next = idx;
            self.data[self.head as usize].prev = idx;
            let (head, tail) = (self.head, self.tail);
            let slot = &mut self.data[idx as usize];
            slot.next = head;
            slot.prev = tail;
            self.tail = idx;
        }
        Ok(())
    }

    /// Relocates `e` to sit immediately after `mark`.
    ///
    /// No-op when `e == mark` or `e` already follows `mark`, except for
    /// the full-rotation case (`e` is head, `mark` is tail) which must
    /// execute to rotate the list ends.
    pub fn move_after(&mut self, e: EntryRef, mark: EntryRef) -> Result<(), CacheError> {
        let (e_prev, e_next) = self.check_handle(e, CacheError::ListChanged)?;
        self.check_mark(mark)?;
        let idx = e.idx;
        let m_idx = mark.idx;
        if idx == m_idx {
            return Ok(());
        }
        if e_prev == m_idx && !(idx == self.head && m_idx == self.tail) {
            return Ok(());
        }
        if idx == self.head && m_idx == self.tail {
            self.head = e_next;
            self.tail = idx;
            return Ok(());
        }
        let m_next = self.data[m_idx as usize].next;
        if idx == self.tail {
            self.tail = e_prev;
        } else if m_idx == self.tail {
            self.tail = idx;
        }
        if idx == self.head {
            self.head = e_next;
        }
        self.data[idx as usize].prev = m_idx;
        self.data[idx as usize].next = m_next;
        self.data[e_next as usize].prev = e_prev;
        self.data[e_prev as usize].next = e_next;
        self.data[m_next as usize].prev = idx;
        self.data[m_idx as usize].next = idx;
        Ok(())
    }

    /// Relocates `e` to sit immediately before `mark`.
    ///
    /// No-op when `e == mark` or `e` already precedes `mark`, except for
    /// the full-rotation case (`e` is tail, `mark` is head).
    pub fn move_before(&mut self, e: EntryRef, mark: EntryRef) -> Result<(), CacheError> {
        let (e_prev, e_next) = self.check_handle(e, CacheError::ListChanged)?;
        self.check_mark(mark)?;
        let idx = e.idx;
        let m_idx = mark.idx;
        if idx == m_idx {
            return Ok(());
        }
        if e_next == m_idx && !(idx == self.tail && m_idx == self.head) {
            return Ok(());
        }
        if idx == self.tail && m_idx == self.head {
            self.head = idx;
            self.tail = e_prev;
            return Ok(());
        }
        let m_prev = self.data[m_idx as usize].prev;
        if idx == self.tail {
            self.tail = e_prev;
        }
        if idx == self.head {
            self.head = e_next;
        } else if m_idx == self.head {
            self.head = idx;
        }
        self.data[idx as usize].prev = m_prev;
        self.data[idx as usize].next = m_idx;
        self.data[e_prev as usize].next = e_next;
        self.data[e_next as usize].prev = e_prev;
        self.data[m_prev as usize].next = idx;
        self.data[m_idx as usize].prev = idx;
        Ok(())
    }

    /// Overwrites key, hash id, value, and priority of a live user entry
    /// without relinking it.
    pub fn update_entry(
        &mut self,
        idx: u32,
        key: K,
        hash_id: u32,
        value: V,
        priority: u8,
    ) -> Result<(), CacheError> {
        let slot = self.entry_mut(idx)?;
        if slot.marker {
            return Err(CacheError::NotUserNode);
        }
        slot.priority = priority;
        slot.hash_id = hash_id;
        slot.payload = Some((key, value));
        Ok(())
    }

    /// Forward iterator over user entries (markers are skipped), yielding
    /// `(key, value, priority)` from most to least recently touched.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            current: self.head,
            done: self.head == INVALID,
        }
    }

    /// Clone-out variant of [`iter`](Self::iter): three parallel vectors
    /// of keys, values, and priorities.
    pub fn iterate(&self) -> (Vec<K>, Vec<V>, Vec<u8>)
    where
        K: Clone,
        V: Clone,
    {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        let mut priorities = Vec::new();
        for (k, v, p) in self.iter() {
            keys.push(k.clone());
            values.push(v.clone());
            priorities.push(p);
        }
        (keys, values, priorities)
    }

    /// Linear scan for the first user entry with the given key. Not on
    /// the cache's hot path; the hash index is.
    pub fn find(&self, key: &K) -> Option<&Entry<K, V>>
    where
        K: PartialEq,
    {
        let mut current = self.head;
        while current != INVALID {
            let slot = &self.data[current as usize];
            if slot.key() == Some(key) {
                return Some(slot);
            }
            current = slot.next;
            if current == self.head {
                break;
            }
        }
        None
    }

    /// Drops every entry and resets the list to an empty, reusable state.
    pub fn clear(&mut self) {
        for slot in &mut self.data {
            *slot = Entry::empty();
        }
        self.free.clear();
        self.free.extend(0..self.cap);
        self.head = INVALID;
        self.tail = INVALID;
        self.size = 0;
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if self.size == 0 {
            assert_eq!(self.head, INVALID);
            assert_eq!(self.tail, INVALID);
            assert_eq!(self.free.len(), self.cap as usize);
            return;
        }

        let mut seen = std::collections::HashSet::new();
        let mut count = 0u32;
        let mut current = self.head;
        loop {
            assert!(seen.insert(current), "cycle revisits slot {current}");
            let slot = &self.data[current as usize];
            assert!(slot.is_live());
            assert_eq!(slot.idx, current);
            let next = slot.next;
            assert_eq!(
                self.data[next as usize].prev, current,
                "broken back-link at slot {current}"
            );
            count += 1;
            assert!(count <= self.size, "cycle longer than size");
            current = next;
            if current == self.head {
                break;
            }
        }
        assert_eq!(count, self.size);
        assert_eq!(self.data[self.head as usize].prev, self.tail);
        assert_eq!(self.data[self.tail as usize].next, self.head);
        assert_eq!(self.free.len() + self.size as usize, self.cap as usize);
        for &idx in &self.free {
            assert!(!self.data[idx as usize].is_live());
        }
    }
}

/// Forward iterator over user entries; see [`ArenaList::iter`].
pub struct Iter<'a, K, V> {
    list: &'a ArenaList<K, V>,
    current: u32,
    done: bool,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V, u8);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.current == INVALID {
                return None;
            }
            let idx = self.current;
            let slot = &self.list.data[idx as usize];
            let next = slot.next;
            self.current = next;
            if next == self.list.head || next == INVALID {
                self.done = true;
            }
            if !slot.marker {
                if let Some((k, v)) = &slot.payload {
                    return Some((k, v, slot.priority));
                }
            }
        }
    }
}
