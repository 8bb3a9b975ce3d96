//! Recency List Module
//!
//! Arena-backed circular doubly linked list tracking recency order.
//!
//! Nodes live in a `Vec` of slots and link to each other by index. Slot 0 is
//! a sentinel that marks both ends of the ring, so the list is never
//! "empty" structurally and link updates need no head/tail special cases.
//!
//! ```text
//!   slot 0 (sentinel)
//!     next ─► [front / MRU] ◄──► ... ◄──► [back / LRU] ◄─ prev
//! ```
//!
//! All operations are O(1) except iteration. The list does no locking;
//! callers serialize access.

use std::time::Instant;

use crate::cache::Entry;

/// Index of the sentinel slot.
const SENTINEL: usize = 0;

// == Node Handle ==
/// Stable handle to a node in an [`LruList`].
///
/// A handle stays valid until its node is removed; the slot may then be
/// reused for a later insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
struct Slot<K, V> {
    prev: usize,
    next: usize,
    /// None for the sentinel and for free slots
    entry: Option<Entry<K, V>>,
}

impl<K, V> Slot<K, V> {
    fn vacant() -> Self {
        Self {
            prev: SENTINEL,
            next: SENTINEL,
            entry: None,
        }
    }
}

// == LRU List ==
/// Doubly linked recency list. Front = most recently used, back = least
/// recently used.
#[derive(Debug)]
pub struct LruList<K, V> {
    slots: Vec<Slot<K, V>>,
    /// Slots released by `remove`, reused by `push_front`
    free: Vec<usize>,
    len: usize,
}

impl<K, V> LruList<K, V> {
    // == Constructor ==
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.saturating_add(1));
        slots.push(Slot::vacant());
        Self {
            slots,
            free: Vec::new(),
            len: 0,
        }
    }

    // == Length ==
    /// Returns the number of nodes, excluding the sentinel.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // == Ends ==
    /// Returns the most recently used node.
    pub fn front(&self) -> Option<NodeId> {
        (self.len > 0).then(|| NodeId(self.slots[SENTINEL].next))
    }

    /// Returns the least recently used node.
    pub fn back(&self) -> Option<NodeId> {
        (self.len > 0).then(|| NodeId(self.slots[SENTINEL].prev))
    }

    // == Access ==
    /// Returns the entry for a live node.
    pub fn get(&self, id: NodeId) -> Option<&Entry<K, V>> {
        self.slots.get(id.0).and_then(|slot| slot.entry.as_ref())
    }

    /// Returns a mutable reference to the entry for a live node.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Entry<K, V>> {
        self.slots.get_mut(id.0).and_then(|slot| slot.entry.as_mut())
    }

    // == Push Front ==
    /// Inserts a new node at the front and returns its handle.
    pub fn push_front(&mut self, key: K, value: V, expires_at: Option<Instant>) -> NodeId {
        let entry = Entry::new(key, value, expires_at);
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    entry: Some(entry),
                    ..Slot::vacant()
                });
                self.slots.len() - 1
            }
        };
        self.link_after(index, SENTINEL);
        self.len += 1;
        NodeId(index)
    }

    // == Move To Front ==
    /// Moves a live node to the front. No-op if it is already there.
    pub fn move_to_front(&mut self, id: NodeId) {
        if !self.is_live(id) || self.slots[SENTINEL].next == id.0 {
            return;
        }
        self.unlink(id.0);
        self.link_after(id.0, SENTINEL);
    }

    // == Remove ==
    /// Unlinks a live node and returns its entry.
    pub fn remove(&mut self, id: NodeId) -> Option<Entry<K, V>> {
        if !self.is_live(id) {
            return None;
        }
        self.unlink(id.0);
        let entry = self.slots[id.0].entry.take();
        self.free.push(id.0);
        self.len -= 1;
        entry
    }

    // == Clear ==
    /// Drops every node and releases the arena.
    pub fn clear(&mut self) {
        self.slots.truncate(1);
        self.slots[SENTINEL] = Slot::vacant();
        self.free.clear();
        self.len = 0;
    }

    /// Removes every node, returning the entries from oldest to newest.
    pub fn drain(&mut self) -> Vec<Entry<K, V>> {
        let mut entries = Vec::with_capacity(self.len);
        let mut cursor = self.slots[SENTINEL].prev;
        while cursor != SENTINEL {
            let prev = self.slots[cursor].prev;
            if let Some(entry) = self.slots[cursor].entry.take() {
                entries.push(entry);
            }
            cursor = prev;
        }
        self.clear();
        entries
    }

    // == Iteration ==
    /// Iterates entries from oldest (back) to newest (front).
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            list: self,
            cursor: self.slots[SENTINEL].prev,
            remaining: self.len,
        }
    }

    fn is_live(&self, id: NodeId) -> bool {
        id.0 != SENTINEL
            && self
                .slots
                .get(id.0)
                .is_some_and(|slot| slot.entry.is_some())
    }

    /// Links `index` directly after `at`.
    fn link_after(&mut self, index: usize, at: usize) {
        let next = self.slots[at].next;
        self.slots[index].prev = at;
        self.slots[index].next = next;
        self.slots[at].next = index;
        self.slots[next].prev = index;
    }

    fn unlink(&mut self, index: usize) {
        let (prev, next) = (self.slots[index].prev, self.slots[index].next);
        self.slots[prev].next = next;
        self.slots[next].prev = prev;
        self.slots[index].prev = SENTINEL;
        self.slots[index].next = SENTINEL;
    }

    #[cfg(test)]
    pub(crate) fn debug_validate_invariants(&self) {
        let mut count = 0usize;
        let mut prev = SENTINEL;
        let mut cursor = self.slots[SENTINEL].next;
        while cursor != SENTINEL {
            let slot = &self.slots[cursor];
            assert!(slot.entry.is_some(), "linked slot {cursor} is vacant");
            assert_eq!(slot.prev, prev, "broken back link at slot {cursor}");
            prev = cursor;
            cursor = slot.next;
            count += 1;
            assert!(count <= self.len, "cycle detected");
        }
        assert_eq!(self.slots[SENTINEL].prev, prev);
        assert_eq!(count, self.len);
        assert_eq!(self.slots.len() - 1, self.len + self.free.len());
    }
}

impl<K, V> Default for LruList<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// == Iterator ==
/// Iterator over entries from oldest to newest.
pub struct Iter<'a, K, V> {
    list: &'a LruList<K, V>,
    cursor: usize,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = &'a Entry<K, V>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == SENTINEL {
            return None;
        }
        let slot = &self.list.slots[self.cursor];
        self.cursor = slot.prev;
        self.remaining = self.remaining.saturating_sub(1);
        slot.entry.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
