//! Basic LRU Module
//!
//! Fixed-size LRU cache without internal synchronization.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use tracing::trace;

use crate::cache::{EvictCallback, LruList, NodeId};
use crate::error::{CacheError, Result};

// == Basic LRU ==
/// Fixed-size LRU cache.
///
/// Every mutation takes `&mut self`; wrap it in [`ThreadSafeLru`] to share it
/// between threads. The eviction callback runs synchronously inside the call
/// that caused the eviction.
///
/// [`ThreadSafeLru`]: crate::cache::ThreadSafeLru
pub struct BasicLru<K, V> {
    /// Maximum number of entries
    size: usize,
    /// Recency order, front = most recent
    list: LruList<K, V>,
    /// Key to list node
    index: HashMap<K, NodeId>,
    on_evict: Option<EvictCallback<K, V>>,
}

impl<K, V> BasicLru<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates a cache holding at most `size` entries.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidSize`] if `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        Self::build(size, None)
    }

    /// Creates a cache that calls `on_evict` for every entry leaving it.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidSize`] if `size` is zero.
    pub fn with_on_evict<F>(size: usize, on_evict: F) -> Result<Self>
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self::build(size, Some(Box::new(on_evict)))
    }

    pub(crate) fn build(size: usize, on_evict: Option<EvictCallback<K, V>>) -> Result<Self> {
        if size == 0 {
            return Err(CacheError::InvalidSize(size));
        }
        Ok(Self {
            size,
            // Grown on demand, `size` is only an upper bound
            list: LruList::new(),
            index: HashMap::new(),
            on_evict,
        })
    }

    // == Add ==
    /// Adds or updates an entry and marks it most recently used.
    ///
    /// Returns true if adding the entry evicted the oldest one.
    pub fn add(&mut self, key: K, value: V) -> bool {
        if let Some(&id) = self.index.get(&key) {
            self.list.move_to_front(id);
            if let Some(entry) = self.list.get_mut(id) {
                entry.value = value;
            }
            return false;
        }

        let id = self.list.push_front(key.clone(), value, None);
        self.index.insert(key, id);

        let evict = self.list.len() > self.size;
        if evict {
            self.remove_oldest_entry();
        }
        evict
    }

    // == Get ==
    /// Returns the value for `key` and marks it most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.index.get(key)?;
        self.list.move_to_front(id);
        self.list.get(id).map(|entry| &entry.value)
    }

    // == Peek ==
    /// Returns the value for `key` without touching recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.index.get(key)?;
        self.list.get(id).map(|entry| &entry.value)
    }

    // == Contains ==
    /// Checks for `key` without touching recency order.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    // == Remove ==
    /// Removes `key`, returning whether it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(&id) = self.index.get(key) else {
            return false;
        };
        self.remove_entry(id).is_some()
    }

    // == Oldest ==
    /// Removes and returns the least recently used entry.
    pub fn remove_oldest(&mut self) -> Option<(K, V)> {
        self.remove_oldest_entry()
    }

    /// Returns the least recently used entry.
    pub fn get_oldest(&self) -> Option<(&K, &V)> {
        let entry = self.list.get(self.list.back()?)?;
        Some((&entry.key, &entry.value))
    }

    // == Snapshots ==
    /// Returns the keys from oldest to newest.
    pub fn keys(&self) -> Vec<K> {
        self.list.iter().map(|entry| entry.key.clone()).collect()
    }

    /// Returns the values from oldest to newest.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.list.iter().map(|entry| entry.value.clone()).collect()
    }

    // == Length ==
    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Returns the capacity of the cache.
    pub fn cap(&self) -> usize {
        self.size
    }

    // == Purge ==
    /// Removes every entry, calling the eviction callback for each.
    pub fn purge(&mut self) {
        let entries = self.list.drain();
        self.index.clear();
        trace!(purged = entries.len(), "purged lru cache");
        if let Some(on_evict) = &self.on_evict {
            for entry in &entries {
                on_evict(&entry.key, &entry.value);
            }
        }
    }

    // == Resize ==
    /// Changes the capacity, evicting the oldest entries that no longer fit.
    ///
    /// Returns the number of evicted entries. A size of zero evicts
    /// everything and makes every later `add` evict the entry it inserted.
    pub fn resize(&mut self, size: usize) -> usize {
        let diff = self.list.len().saturating_sub(size);
        for _ in 0..diff {
            self.remove_oldest_entry();
        }
        self.size = size;
        if diff > 0 {
            trace!(size, evicted = diff, "resized lru cache");
        }
        diff
    }

    fn remove_oldest_entry(&mut self) -> Option<(K, V)> {
        let id = self.list.back()?;
        self.remove_entry(id)
    }

    fn remove_entry(&mut self, id: NodeId) -> Option<(K, V)> {
        let entry = self.list.remove(id)?;
        self.index.remove(&entry.key);
        if let Some(on_evict) = &self.on_evict {
            on_evict(&entry.key, &entry.value);
        }
        Some(entry.into_pair())
    }

    #[cfg(test)]
    pub(crate) fn debug_validate_invariants(&self) {
        self.list.debug_validate_invariants();
        assert_eq!(self.index.len(), self.list.len());
        for entry in self.list.iter() {
            let id = self.index.get(&entry.key).expect("key missing from index");
            assert!(self.list.get(*id).is_some());
        }
        assert!(self.list.len() <= self.size);
    }
}

impl<K, V> fmt::Debug for BasicLru<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicLru")
            .field("size", &self.size)
            .field("len", &self.list.len())
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Evicted = Arc<Mutex<Vec<(u32, u32)>>>;

    fn recording_cache(size: usize) -> (BasicLru<u32, u32>, Evicted) {
        let evicted: Evicted = Arc::default();
        let sink = Arc::clone(&evicted);
        let cache = BasicLru::with_on_evict(size, move |k: &u32, v: &u32| {
            sink.lock().unwrap().push((*k, *v));
        })
        .unwrap();
        (cache, evicted)
    }

    #[test]
    fn test_basic_new_rejects_zero_size() {
        let result = BasicLru::<u32, u32>::new(0);
        assert_eq!(result.unwrap_err(), CacheError::InvalidSize(0));
    }

    #[test]
    fn test_basic_huge_capacity_allocates_lazily() {
        let mut cache = BasicLru::new(usize::MAX).unwrap();
        assert!(!cache.add(1u64, 1u64));
        assert_eq!(cache.get(&1), Some(&1));
        assert_eq!(cache.cap(), usize::MAX);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_basic_add_and_get() {
        let mut cache = BasicLru::new(2).unwrap();

        assert!(!cache.add("key1", "value1"));

        assert_eq!(cache.get("key1"), Some(&"value1"));
        assert!(cache.contains("key1"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cap(), 2);
    }

    #[test]
    fn test_basic_get_nonexistent() {
        let mut cache: BasicLru<&str, u32> = BasicLru::new(2).unwrap();
        assert_eq!(cache.get("missing"), None);
        assert_eq!(cache.peek("missing"), None);
        assert!(!cache.contains("missing"));
    }

    #[test]
    fn test_basic_string_keys_borrowed_lookup() {
        let mut cache = BasicLru::new(2).unwrap();
        cache.add("key".to_string(), 1);
        assert_eq!(cache.get("key"), Some(&1));
        assert!(cache.remove("key"));
    }

    #[test]
    fn test_basic_eviction_order() {
        let (mut cache, evicted) = recording_cache(128);

        for i in 0..256 {
            let was_evicted = cache.add(i, i);
            assert_eq!(was_evicted, i >= 128);
        }

        assert_eq!(cache.len(), 128);
        assert_eq!(cache.keys(), (128..256).collect::<Vec<_>>());
        assert_eq!(cache.values(), (128..256).collect::<Vec<_>>());
        let evicted = evicted.lock().unwrap();
        assert_eq!(evicted.len(), 128);
        assert!(evicted.iter().zip(0..).all(|(&(k, v), i)| k == i && v == i));
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_basic_add_existing_updates_and_refreshes() {
        let (mut cache, evicted) = recording_cache(2);
        cache.add(1, 1);
        cache.add(2, 2);

        assert!(!cache.add(1, 10));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys(), vec![2, 1]);

        // 2 is now oldest
        assert!(cache.add(3, 3));
        assert_eq!(cache.keys(), vec![1, 3]);
        assert_eq!(cache.peek(&1), Some(&10));
        assert_eq!(*evicted.lock().unwrap(), vec![(2, 2)]);
    }

    #[test]
    fn test_basic_get_refreshes_recency() {
        let mut cache = BasicLru::new(3).unwrap();
        cache.add(1, 1);
        cache.add(2, 2);
        cache.add(3, 3);

        cache.get(&1);
        cache.add(4, 4);

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
    }

    #[test]
    fn test_basic_peek_and_contains_keep_order() {
        let mut cache = BasicLru::new(2).unwrap();
        cache.add(1, 1);
        cache.add(2, 2);

        assert_eq!(cache.peek(&1), Some(&1));
        assert!(cache.contains(&1));
        cache.add(3, 3);

        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
    }

    #[test]
    fn test_basic_remove() {
        let (mut cache, evicted) = recording_cache(4);
        cache.add(1, 1);
        cache.add(2, 2);

        assert!(cache.remove(&1));
        assert!(!cache.remove(&1));
        assert_eq!(cache.len(), 1);
        assert_eq!(*evicted.lock().unwrap(), vec![(1, 1)]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_basic_oldest() {
        let (mut cache, evicted) = recording_cache(4);
        assert!(cache.get_oldest().is_none());
        assert!(cache.remove_oldest().is_none());

        cache.add(1, 10);
        cache.add(2, 20);

        assert_eq!(cache.get_oldest(), Some((&1, &10)));
        assert_eq!(cache.remove_oldest(), Some((1, 10)));
        assert_eq!(cache.get_oldest(), Some((&2, &20)));
        assert_eq!(*evicted.lock().unwrap(), vec![(1, 10)]);
    }

    #[test]
    fn test_basic_purge() {
        let (mut cache, evicted) = recording_cache(4);
        cache.add(1, 1);
        cache.add(2, 2);
        cache.add(3, 3);

        cache.purge();
        assert!(cache.is_empty());
        assert_eq!(evicted.lock().unwrap().len(), 3);

        cache.purge();
        assert_eq!(evicted.lock().unwrap().len(), 3);
        assert!(cache.keys().is_empty());
        cache.debug_validate_invariants();

        cache.add(4, 4);
        assert_eq!(cache.keys(), vec![4]);
    }

    #[test]
    fn test_basic_resize() {
        let (mut cache, evicted) = recording_cache(4);
        for i in 0..4 {
            cache.add(i, i);
        }

        assert_eq!(cache.resize(8), 0);
        assert_eq!(cache.cap(), 8);
        assert_eq!(cache.len(), 4);

        assert_eq!(cache.resize(1), 3);
        assert_eq!(cache.keys(), vec![3]);
        assert_eq!(*evicted.lock().unwrap(), vec![(0, 0), (1, 1), (2, 2)]);
        cache.debug_validate_invariants();
    }

    #[test]
    fn test_basic_resize_to_zero() {
        let mut cache = BasicLru::new(2).unwrap();
        cache.add(1, 1);
        cache.add(2, 2);

        assert_eq!(cache.resize(0), 2);
        assert!(cache.is_empty());

        assert!(cache.add(3, 3));
        assert!(cache.is_empty());
    }
}
