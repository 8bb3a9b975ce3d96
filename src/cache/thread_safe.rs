//! Thread-Safe LRU Module
//!
//! Wraps [`BasicLru`] in a read/write lock and defers eviction callbacks
//! until the lock has been released.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::cache::{BasicLru, EvictCallback};
use crate::error::Result;

// == Public Constants ==
/// Initial capacity of the buffer collecting evictions during a locked call
pub const DEFAULT_EVICTED_BUFFER_SIZE: usize = 16;

type EvictedBuffer<K, V> = Arc<Mutex<Vec<(K, V)>>>;

// == Thread-Safe LRU ==
/// Fixed-size LRU cache safe to share between threads.
///
/// Lookups that leave recency order alone (`contains`, `peek`, `keys`, ...)
/// take the shared lock; everything else takes the exclusive lock.
///
/// The eviction callback never runs while the lock is held: evictions are
/// collected during the call and delivered, in eviction order, once the lock
/// is released. A callback may therefore call back into the same cache.
pub struct ThreadSafeLru<K, V> {
    lru: RwLock<BasicLru<K, V>>,
    /// Evictions recorded by the wrapped cache, drained after each write.
    /// Only touched under the exclusive `lru` lock, so this mutex is never
    /// contended; it exists because the recording callback must be `Fn`.
    evicted: EvictedBuffer<K, V>,
    on_evict: Option<EvictCallback<K, V>>,
    /// Mirrors the wrapped cache's capacity so `cap` needs no lock
    size: AtomicUsize,
}

impl<K, V> ThreadSafeLru<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache holding at most `size` entries.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidSize`] if `size` is zero.
    ///
    /// [`CacheError::InvalidSize`]: crate::error::CacheError::InvalidSize
    pub fn new(size: usize) -> Result<Self> {
        Self::build(size, None)
    }

    /// Creates a cache that calls `on_evict` for every entry leaving it,
    /// outside of the cache lock.
    ///
    /// # Errors
    /// Returns [`CacheError::InvalidSize`] if `size` is zero.
    ///
    /// [`CacheError::InvalidSize`]: crate::error::CacheError::InvalidSize
    pub fn with_on_evict<F>(size: usize, on_evict: F) -> Result<Self>
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self::build(size, Some(Box::new(on_evict)))
    }

    fn build(size: usize, on_evict: Option<EvictCallback<K, V>>) -> Result<Self> {
        let evicted: EvictedBuffer<K, V> = Arc::default();

        // Only record evictions when someone is listening
        let record: Option<EvictCallback<K, V>> = on_evict.as_ref().map(|_| {
            let buffer = Arc::clone(&evicted);
            buffer.lock().reserve(DEFAULT_EVICTED_BUFFER_SIZE);
            Box::new(move |key: &K, value: &V| {
                buffer.lock().push((key.clone(), value.clone()));
            }) as EvictCallback<K, V>
        });

        let lru = BasicLru::build(size, record)?;
        Ok(Self {
            lru: RwLock::new(lru),
            evicted,
            on_evict,
            size: AtomicUsize::new(size),
        })
    }

    // == Add ==
    /// Adds or updates an entry. Returns true if an eviction occurred.
    pub fn add(&self, key: K, value: V) -> bool {
        self.write(|lru| lru.add(key, value))
    }

    // == Get ==
    /// Returns a copy of the value for `key` and marks it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lru.write().get(key).cloned()
    }

    // == Contains ==
    /// Checks for `key` without touching recency order.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lru.read().contains(key)
    }

    // == Peek ==
    /// Returns a copy of the value for `key` without touching recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lru.read().peek(key).cloned()
    }

    // == Contains Or Add ==
    /// Adds the entry only if `key` is absent, under a single lock.
    ///
    /// Returns `(found, evicted)`. Recency order is untouched when found.
    pub fn contains_or_add(&self, key: K, value: V) -> (bool, bool) {
        self.write(|lru| {
            if lru.contains(&key) {
                (true, false)
            } else {
                (false, lru.add(key, value))
            }
        })
    }

    // == Peek Or Add ==
    /// Adds the entry only if `key` is absent, under a single lock.
    ///
    /// Recency order is untouched when the key is found.
    ///
    /// # Arguments
    /// * `key` - Key to look up, stored only when absent
    /// * `value` - Value stored when the key is absent
    ///
    /// # Returns
    /// - `(Some(existing), false)` if the key was present
    /// - `(None, evicted)` if the entry was added, `evicted` telling whether
    ///   the oldest entry made room for it
    pub fn peek_or_add(&self, key: K, value: V) -> (Option<V>, bool) {
        self.write(|lru| match lru.peek(&key) {
            Some(previous) => (Some(previous.clone()), false),
            None => (None, lru.add(key, value)),
        })
    }

    // == Remove ==
    /// Removes `key`, returning whether it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.write(|lru| lru.remove(key))
    }

    // == Oldest ==
    /// Removes and returns the least recently used entry.
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        self.write(|lru| lru.remove_oldest())
    }

    /// Returns a copy of the least recently used entry.
    pub fn get_oldest(&self) -> Option<(K, V)> {
        self.lru
            .read()
            .get_oldest()
            .map(|(key, value)| (key.clone(), value.clone()))
    }

    // == Snapshots ==
    /// Returns the keys from oldest to newest.
    pub fn keys(&self) -> Vec<K> {
        self.lru.read().keys()
    }

    /// Returns the values from oldest to newest.
    pub fn values(&self) -> Vec<V> {
        self.lru.read().values()
    }

    // == Length ==
    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.lru.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.read().is_empty()
    }

    /// Returns the capacity of the cache.
    pub fn cap(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    // == Purge ==
    /// Removes every entry, calling the eviction callback for each.
    pub fn purge(&self) {
        self.write(|lru| lru.purge())
    }

    // == Resize ==
    /// Changes the capacity, returning the number of evicted entries.
    pub fn resize(&self, size: usize) -> usize {
        self.write(|lru| {
            let evicted = lru.resize(size);
            self.size.store(size, Ordering::Release);
            evicted
        })
    }

    /// Runs `op` under the exclusive lock, then delivers any evictions it
    /// caused once the lock is released.
    fn write<R>(&self, op: impl FnOnce(&mut BasicLru<K, V>) -> R) -> R {
        let (result, evicted) = {
            let mut lru = self.lru.write();
            let result = op(&mut lru);
            (result, self.take_evicted())
        };
        self.dispatch(evicted);
        result
    }

    /// Must be called with the exclusive lock held.
    fn take_evicted(&self) -> Vec<(K, V)> {
        if self.on_evict.is_none() {
            return Vec::new();
        }
        let mut buffer = self.evicted.lock();
        if buffer.is_empty() {
            return Vec::new();
        }
        mem::replace(&mut *buffer, Vec::with_capacity(DEFAULT_EVICTED_BUFFER_SIZE))
    }

    fn dispatch(&self, evicted: Vec<(K, V)>) {
        if let Some(on_evict) = &self.on_evict {
            for (key, value) in &evicted {
                on_evict(key, value);
            }
        }
    }
}

impl<K, V> fmt::Debug for ThreadSafeLru<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadSafeLru")
            .field("lru", &*self.lru.read())
            .field("on_evict", &self.on_evict.is_some())
            .finish()
    }
}
