//! Cache Entry Module
//!
//! Defines the payload stored in each recency-list node.

use std::time::Instant;

// == Cache Entry ==
/// A single cached key/value pair with its expiration metadata.
#[derive(Debug, Clone)]
pub struct Entry<K, V> {
    /// The cache key
    pub key: K,
    /// The stored value
    pub value: V,
    /// Expiration instant, None = never expires
    pub expires_at: Option<Instant>,
    /// Expiration bucket holding this entry (expirable caches only)
    pub(crate) bucket: u8,
}

impl<K, V> Entry<K, V> {
    // == Constructor ==
    /// Creates a new entry that is not yet assigned to a bucket.
    pub fn new(key: K, value: V, expires_at: Option<Instant>) -> Self {
        Self {
            key,
            value,
            expires_at,
            bucket: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches its
    /// expiration instant. Entries without an expiration never expire.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Consumes the entry, returning the key/value pair.
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}
