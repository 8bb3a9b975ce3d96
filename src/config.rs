//! Configuration Module
//!
//! Loads the demo binary's settings from environment variables.

use std::env;
use std::time::Duration;

/// Demo configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the thread-safe cache
    pub max_entries: usize,
    /// TTL of the expirable cache
    pub ttl: Duration,
    /// Number of keys written to the thread-safe cache
    pub demo_keys: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LRU_MAX_ENTRIES` - Thread-safe cache capacity (default: 4)
    /// - `LRU_TTL_MS` - Expirable cache TTL in milliseconds (default: 10)
    /// - `LRU_DEMO_KEYS` - Keys written to the thread-safe cache (default: 8)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: parse_var("LRU_MAX_ENTRIES").unwrap_or(defaults.max_entries),
            ttl: parse_var("LRU_TTL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.ttl),
            demo_keys: parse_var("LRU_DEMO_KEYS").unwrap_or(defaults.demo_keys),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 4,
            ttl: Duration::from_millis(10),
            demo_keys: 8,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
