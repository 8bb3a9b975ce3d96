//! Mini LRU - Bounded in-process key/value caches
//!
//! Provides exact LRU eviction, an expirable variant with TTL support, and a
//! thread-safe façade that delivers eviction callbacks outside its lock.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{BasicLru, EvictCallback, ExpirableLru, ThreadSafeLru};
pub use config::Config;
pub use error::{CacheError, Result};
