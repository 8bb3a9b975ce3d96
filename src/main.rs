//! Mini LRU demo
//!
//! Exercises the thread-safe and expirable caches from the command line.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::ensure;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_lru::{Config, ExpirableLru, ThreadSafeLru};

/// Demo entry point.
///
/// 1. Fills a thread-safe cache past its capacity, logging every eviction
/// 2. Shows an expirable entry disappearing once its TTL has passed
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_lru=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_entries={}, ttl={:?}, demo_keys={}",
        config.max_entries, config.ttl, config.demo_keys
    );

    let evictions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evictions);
    let cache = ThreadSafeLru::with_on_evict(config.max_entries, move |key: &usize, _: &()| {
        counter.fetch_add(1, Ordering::Relaxed);
        info!("Evicted key {}", key);
    })?;

    for i in 0..config.demo_keys {
        cache.add(i, ());
    }

    let expected = config.max_entries.min(config.demo_keys);
    ensure!(cache.len() == expected, "bad len: {}", cache.len());
    info!(
        "Thread-safe cache holds {} keys after {} evictions",
        cache.len(),
        evictions.load(Ordering::Relaxed)
    );

    let expiring = ExpirableLru::new(5, config.ttl);

    expiring.add("key_1".to_string(), "value_1".to_string());
    if let Some(value) = expiring.get("key_1") {
        info!("Value before expiration is found: {:?}", value);
    }

    // Wait for the entry to expire
    tokio::time::sleep(config.ttl + Duration::from_millis(2)).await;

    let value = expiring.get("key_1");
    info!(
        "Value after expiration is found: {}, value: {:?}",
        value.is_some(),
        value
    );

    expiring.add("key_2".to_string(), "value_2".to_string());
    info!("Expirable cache len: {}", expiring.len());

    Ok(())
}
