//! Cache Module
//!
//! Provides in-memory LRU caches: a plain capacity-bounded cache, an
//! expirable variant with TTL support, and a thread-safe façade.
//!
//! # Eviction callbacks
//! Callbacks run with one of two contracts:
//! - [`BasicLru`] and [`ExpirableLru`] invoke the callback inside the
//!   mutating call. For `ExpirableLru` that means inside its lock, so the
//!   callback must not call back into the same cache.
//! - [`ThreadSafeLru`] buffers evictions and invokes the callback after its
//!   lock is released, so the callback may call back into the same cache.

mod basic;
mod entry;
mod expirable;
mod list;
mod thread_safe;


// Re-export public types
pub use basic::BasicLru;
pub use entry::Entry;
pub use expirable::{ExpirableLru, NO_EXPIRATION_TTL, NUM_BUCKETS};
pub use list::{Iter, LruList, NodeId};
pub use thread_safe::{ThreadSafeLru, DEFAULT_EVICTED_BUFFER_SIZE};

pub(crate) use expirable::ExpirableState;

// == Eviction Callback ==
/// Invoked once per evicted, removed or purged entry.
pub type EvictCallback<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;
