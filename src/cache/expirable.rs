//! Expirable LRU Module
//!
//! LRU cache whose entries expire a fixed TTL after their last `add`.
//!
//! Expiry is enforced two ways:
//! - lazily: lookups treat an expired entry as absent but leave it in place;
//! - actively: entries are grouped into [`NUM_BUCKETS`] buckets and a
//!   background sweep (see `tasks::sweep`) clears one bucket per
//!   `ttl / NUM_BUCKETS`, once the newest entry in it has expired.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use crate::cache::{EvictCallback, LruList, NodeId};
use crate::tasks::{spawn_sweep_task, SweepHandle};

// == Public Constants ==
/// TTL used when expiration is disabled
pub const NO_EXPIRATION_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

/// Number of expiration buckets swept round-robin. Must fit in a `u8`.
pub const NUM_BUCKETS: usize = 100;

// == Bucket ==
/// Entries that joined while the sweep cursor pointed at this bucket.
#[derive(Debug)]
struct Bucket<K> {
    entries: HashMap<K, NodeId>,
    /// Latest expiry of any entry added here
    newest_entry: Option<Instant>,
}

impl<K> Default for Bucket<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            newest_entry: None,
        }
    }
}

// == Expirable State ==
/// Everything guarded by the cache lock. Methods assume the lock is held.
pub(crate) struct ExpirableState<K, V> {
    /// Maximum number of entries, 0 = unbounded
    size: usize,
    list: LruList<K, V>,
    index: HashMap<K, NodeId>,
    on_evict: Option<EvictCallback<K, V>>,
    buckets: Vec<Bucket<K>>,
    /// Bucket the sweep processes next; new entries join it
    next_bucket: u8,
}

impl<K, V> ExpirableState<K, V>
where
    K: Hash + Eq + Clone,
{
    pub(crate) fn new(size: usize, on_evict: Option<EvictCallback<K, V>>) -> Self {
        Self {
            size,
            list: LruList::new(),
            index: HashMap::new(),
            on_evict,
            buckets: (0..NUM_BUCKETS).map(|_| Bucket::default()).collect(),
            next_bucket: 0,
        }
    }

    fn add(&mut self, key: K, value: V, expires_at: Option<Instant>) -> bool {
        if let Some(&id) = self.index.get(&key) {
            self.list.move_to_front(id);
            // The expiry moves, so the entry changes bucket
            self.remove_from_bucket(id);
            if let Some(entry) = self.list.get_mut(id) {
                entry.value = value;
                entry.expires_at = expires_at;
            }
            self.add_to_bucket(id);
            return false;
        }

        let id = self.list.push_front(key.clone(), value, expires_at);
        self.index.insert(key, id);
        self.add_to_bucket(id);

        let evict = self.size > 0 && self.list.len() > self.size;
        if evict {
            self.remove_oldest_entry();
        }
        evict
    }

    /// Returns the live, unexpired node for `key`.
    fn find<Q>(&self, key: &Q, now: Instant) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = *self.index.get(key)?;
        let entry = self.list.get(id)?;
        (!entry.is_expired_at(now)).then_some(id)
    }

    fn purge(&mut self) {
        let entries = self.list.drain();
        self.index.clear();
        for bucket in &mut self.buckets {
            bucket.entries.clear();
        }
        if let Some(on_evict) = &self.on_evict {
            for entry in &entries {
                on_evict(&entry.key, &entry.value);
            }
        }
    }

    fn resize(&mut self, size: usize) -> usize {
        if size == 0 {
            self.size = 0;
            return 0;
        }
        let diff = self.list.len().saturating_sub(size);
        for _ in 0..diff {
            self.remove_oldest_entry();
        }
        self.size = size;
        diff
    }

    fn remove_oldest_entry(&mut self) -> Option<(K, V)> {
        let id = self.list.back()?;
        self.remove_entry(id)
    }

    fn remove_entry(&mut self, id: NodeId) -> Option<(K, V)> {
        let entry = self.list.remove(id)?;
        self.index.remove(&entry.key);
        self.buckets[usize::from(entry.bucket)]
            .entries
            .remove(&entry.key);
        if let Some(on_evict) = &self.on_evict {
            on_evict(&entry.key, &entry.value);
        }
        Some(entry.into_pair())
    }

    /// Puts the entry in the bucket under the sweep cursor.
    fn add_to_bucket(&mut self, id: NodeId) {
        let index = usize::from(self.next_bucket) % NUM_BUCKETS;
        let Some(entry) = self.list.get_mut(id) else {
            return;
        };
        entry.bucket = self.next_bucket % NUM_BUCKETS as u8;
        let bucket = &mut self.buckets[index];
        bucket.entries.insert(entry.key.clone(), id);
        if bucket.newest_entry < entry.expires_at {
            bucket.newest_entry = entry.expires_at;
        }
    }

    fn remove_from_bucket(&mut self, id: NodeId) {
        if let Some(entry) = self.list.get(id) {
            self.buckets[usize::from(entry.bucket)]
                .entries
                .remove(&entry.key);
        }
    }

    // == Sweep Support ==
    /// Returns the bucket due for sweeping and the newest expiry in it.
    pub(crate) fn sweep_deadline(&self) -> (usize, Option<Instant>) {
        let index = usize::from(self.next_bucket);
        (index, self.buckets[index].newest_entry)
    }

    /// Removes every entry still in bucket `index` and advances the cursor.
    ///
    /// Returns the number of removed entries.
    pub(crate) fn sweep_bucket(&mut self, index: usize) -> usize {
        let ids: Vec<NodeId> = self.buckets[index]
            .entries
            .drain()
            .map(|(_, id)| id)
            .collect();
        let removed = ids
            .into_iter()
            .filter_map(|id| self.remove_entry(id))
            .count();
        self.next_bucket = ((usize::from(self.next_bucket) + 1) % NUM_BUCKETS) as u8;
        removed
    }
}

// == Expirable LRU ==
/// Thread-safe LRU cache with per-entry expiration.
///
/// A `size` of 0 makes the cache unbounded. A zero `ttl` disables expiration
/// and the background sweep.
///
/// The eviction callback runs while the cache lock is held: it must not call
/// back into the same cache.
///
/// When a TTL is set, the sweep runs on a dedicated thread with its own tokio
/// runtime, independent of the caller's runtime. It stops when [`stop_sweeper`] is
/// called or the cache is dropped.
///
/// [`stop_sweeper`]: ExpirableLru::stop_sweeper
pub struct ExpirableLru<K, V> {
    state: Arc<Mutex<ExpirableState<K, V>>>,
    ttl: Duration,
    sweeper: Option<SweepHandle>,
}

impl<K, V> ExpirableLru<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates a cache holding at most `size` entries (0 = unbounded) that
    /// expire `ttl` after being added (zero = never).
    pub fn new(size: usize, ttl: Duration) -> Self {
        Self::build(size, None, ttl)
    }

    /// Like [`new`](Self::new), calling `on_evict` for every entry leaving
    /// the cache, including expired ones.
    ///
    /// # Arguments
    /// * `size` - Maximum number of entries, 0 for unbounded
    /// * `on_evict` - Called under the cache lock for each evicted, removed,
    ///   purged or swept entry; must not call back into this cache
    /// * `ttl` - Lifetime of an entry after its last `add`, zero for none
    pub fn with_on_evict<F>(size: usize, on_evict: F, ttl: Duration) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self::build(size, Some(Box::new(on_evict)), ttl)
    }

    fn build(size: usize, on_evict: Option<EvictCallback<K, V>>, ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { NO_EXPIRATION_TTL } else { ttl };
        let state = Arc::new(Mutex::new(ExpirableState::new(size, on_evict)));
        let sweeper =
            (ttl != NO_EXPIRATION_TTL).then(|| spawn_sweep_task(Arc::clone(&state), ttl));
        Self {
            state,
            ttl,
            sweeper,
        }
    }

    // == Add ==
    /// Adds or updates an entry, resetting its TTL.
    ///
    /// Returns true if adding the entry evicted the oldest one.
    pub fn add(&self, key: K, value: V) -> bool {
        let expires_at = Instant::now().checked_add(self.ttl);
        self.state.lock().add(key, value, expires_at)
    }

    // == Get ==
    /// Returns a copy of the value for `key` and marks it most recently used.
    ///
    /// Expired entries are reported missing but left for the sweep.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();
        let id = state.find(key, Instant::now())?;
        state.list.move_to_front(id);
        state.list.get(id).map(|entry| entry.value.clone())
    }

    // == Peek ==
    /// Returns a copy of the value for `key` without touching recency order.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let state = self.state.lock();
        let id = state.find(key, Instant::now())?;
        state.list.get(id).map(|entry| entry.value.clone())
    }

    // == Contains ==
    /// Checks for `key` without touching recency order.
    ///
    /// Expired entries that have not been swept yet still count.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.state.lock().index.contains_key(key)
    }

    // == Remove ==
    /// Removes `key`, returning whether it was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut state = self.state.lock();
        let Some(&id) = state.index.get(key) else {
            return false;
        };
        state.remove_entry(id).is_some()
    }

    // == Oldest ==
    /// Removes and returns the least recently used entry.
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        self.state.lock().remove_oldest_entry()
    }

    /// Returns a copy of the least recently used entry.
    pub fn get_oldest(&self) -> Option<(K, V)> {
        let state = self.state.lock();
        let entry = state.list.get(state.list.back()?)?;
        Some((entry.key.clone(), entry.value.clone()))
    }

    // == Snapshots ==
    /// Returns the unexpired keys from oldest to newest.
    pub fn keys(&self) -> Vec<K> {
        let state = self.state.lock();
        let now = Instant::now();
        state
            .list
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Returns the unexpired values from oldest to newest.
    pub fn values(&self) -> Vec<V> {
        let state = self.state.lock();
        let now = Instant::now();
        state
            .list
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
            .collect()
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet
    /// swept.
    pub fn len(&self) -> usize {
        self.state.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().list.is_empty()
    }

    /// Returns the capacity of the cache, 0 = unbounded.
    pub fn cap(&self) -> usize {
        self.state.lock().size
    }

    /// Returns the effective TTL ([`NO_EXPIRATION_TTL`] when disabled).
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // == Purge ==
    /// Removes every entry, calling the eviction callback for each.
    pub fn purge(&self) {
        let mut state = self.state.lock();
        trace!(purged = state.list.len(), "purged expirable cache");
        state.purge();
    }

    // == Resize ==
    /// Changes the capacity, returning the number of evicted entries.
    ///
    /// A size of 0 makes the cache unbounded.
    pub fn resize(&self, size: usize) -> usize {
        self.state.lock().resize(size)
    }

    // == Sweeper ==
    /// Stops the background sweep. Expired entries are then only hidden
    /// from lookups, never removed.
    pub fn stop_sweeper(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }

    /// Returns true while the background sweep is running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.as_ref().is_some_and(SweepHandle::is_running)
    }

    #[cfg(test)]
    fn debug_validate_invariants(&self) {
        let state = self.state.lock();
        state.list.debug_validate_invariants();
        assert_eq!(state.index.len(), state.list.len());
        let bucketed: usize = state.buckets.iter().map(|b| b.entries.len()).sum();
        assert_eq!(bucketed, state.list.len());
        for entry in state.list.iter() {
            let bucket = &state.buckets[usize::from(entry.bucket)];
            assert!(bucket.entries.contains_key(&entry.key));
            assert!(bucket.newest_entry >= entry.expires_at);
        }
        if state.size > 0 {
            assert!(state.list.len() <= state.size);
        }
    }
}

impl<K, V> fmt::Debug for ExpirableLru<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ExpirableLru")
            .field("size", &state.size)
            .field("len", &state.list.len())
            .field("ttl", &self.ttl)
            .field("next_bucket", &state.next_bucket)
            .finish()
    }
}
