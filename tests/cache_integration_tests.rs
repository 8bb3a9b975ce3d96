//! Integration Tests for the cache variants
//!
//! Exercises the public API from outside the crate, including concurrent
//! access and callback re-entrancy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use mini_lru::{BasicLru, CacheError, ExpirableLru, ThreadSafeLru};

// == Helper Functions ==

/// Deterministic per-thread operation stream.
fn next_step(seed: &mut u64) -> u64 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *seed >> 33
}

// == Construction ==

#[test]
fn test_constructors_validate_size() {
    assert_eq!(
        BasicLru::<u32, u32>::new(0).unwrap_err(),
        CacheError::InvalidSize(0)
    );
    assert!(ThreadSafeLru::<u32, u32>::new(0).is_err());

    // The expirable cache treats zero as unbounded instead
    let cache: ExpirableLru<u32, u32> = ExpirableLru::new(0, Duration::ZERO);
    assert_eq!(cache.cap(), 0);
}

// == Round Trip ==

#[test]
fn test_round_trip_all_variants() {
    let mut basic = BasicLru::new(8).unwrap();
    basic.add("k", "v");
    assert_eq!(basic.get("k"), Some(&"v"));
    assert!(basic.contains("k"));

    let shared = ThreadSafeLru::new(8).unwrap();
    shared.add("k".to_string(), "v".to_string());
    assert_eq!(shared.get("k"), Some("v".to_string()));
    assert!(shared.contains("k"));

    let expiring = ExpirableLru::new(8, Duration::from_secs(60));
    expiring.add("k".to_string(), "v".to_string());
    assert_eq!(expiring.get("k"), Some("v".to_string()));
    assert!(expiring.contains("k"));
}

// == Concurrency ==

#[test]
fn test_concurrent_access_matches_reference_model() {
    const THREADS: u64 = 8;
    const OPS: usize = 2_000;
    const KEYS_PER_THREAD: u64 = 64;

    // Large enough that nothing is evicted, so each thread's model is exact
    let cache = Arc::new(ThreadSafeLru::new((THREADS * KEYS_PER_THREAD) as usize).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut model = HashMap::new();
                let mut seed = t + 1;
                for _ in 0..OPS {
                    let key = t * KEYS_PER_THREAD + next_step(&mut seed) % KEYS_PER_THREAD;
                    match next_step(&mut seed) % 3 {
                        0 => {
                            let value = next_step(&mut seed);
                            cache.add(key, value);
                            model.insert(key, value);
                        }
                        1 => assert_eq!(cache.get(&key), model.get(&key).copied()),
                        _ => assert_eq!(cache.remove(&key), model.remove(&key).is_some()),
                    }
                }
                model
            })
        })
        .collect();

    let mut expected = HashMap::new();
    for handle in handles {
        expected.extend(handle.join().unwrap());
    }

    assert_eq!(cache.len(), expected.len());
    let mut keys = cache.keys();
    keys.sort_unstable();
    let mut expected_keys: Vec<_> = expected.keys().copied().collect();
    expected_keys.sort_unstable();
    assert_eq!(keys, expected_keys);
    for (key, value) in &expected {
        assert_eq!(cache.peek(key), Some(*value));
    }
}

#[test]
fn test_concurrent_adds_respect_capacity() {
    let evictions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&evictions);
    let cache = Arc::new(
        ThreadSafeLru::with_on_evict(32, move |_: &u64, _: &u64| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap(),
    );

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500 {
                    cache.add(t * 1_000 + i, i);
                    assert!(cache.len() <= 32);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 32);
    assert_eq!(evictions.load(Ordering::SeqCst), 4 * 500 - 32);
}

#[test]
fn test_contains_or_add_races_insert_once() {
    let cache = Arc::new(ThreadSafeLru::new(16).unwrap());
    let inserted = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let cache = Arc::clone(&cache);
            let inserted = Arc::clone(&inserted);
            thread::spawn(move || {
                let (found, _) = cache.contains_or_add("shared", t);
                if !found {
                    inserted.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(inserted.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
}

// == Re-entrancy ==

#[test]
fn test_eviction_callback_may_reenter_cache() {
    let slot: Arc<OnceLock<Weak<ThreadSafeLru<u32, u32>>>> = Arc::default();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let callback_slot = Arc::clone(&slot);
    let callback_seen = Arc::clone(&seen);
    let cache = Arc::new(
        ThreadSafeLru::with_on_evict(4, move |key: &u32, value: &u32| {
            callback_seen.lock().unwrap().push(*key);
            let Some(cache) = callback_slot.get().and_then(Weak::upgrade) else {
                return;
            };
            // Exercise both lock modes from inside the callback
            let _ = cache.peek(key);
            let _ = cache.keys();
            if *key < 1_000 {
                cache.add(key + 1_000, *value);
            }
        })
        .unwrap(),
    );
    slot.set(Arc::downgrade(&cache)).unwrap();

    for i in 0..10 {
        cache.add(i, i);
    }
    cache.resize(2);
    cache.purge();

    // Purged keys below 1000 were re-added by the callback
    assert!(cache.len() <= 2);
    assert!(cache.keys().iter().all(|key| *key >= 1_000));
    assert!(seen.lock().unwrap().len() >= 10);
}

// == Expiration ==

#[tokio::test]
async fn test_expired_entry_is_logically_absent_before_sweep() {
    let cache = ExpirableLru::new(10, Duration::from_millis(40));
    cache.stop_sweeper();

    cache.add("key_1".to_string(), "value_1".to_string());
    assert_eq!(cache.get("key_1"), Some("value_1".to_string()));

    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(cache.get("key_1"), None);
    assert!(cache.keys().is_empty());
    // Physical removal is left to the sweep, which is stopped here
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_expired_entries_are_swept() {
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    let cache = ExpirableLru::with_on_evict(
        10,
        move |k: &String, _: &String| sink.lock().unwrap().push(k.clone()),
        Duration::from_millis(40),
    );

    cache.add("key_1".to_string(), "value_1".to_string());
    cache.add("key_2".to_string(), "value_2".to_string());

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(cache.len(), 0);
    let mut evicted = evicted.lock().unwrap().clone();
    evicted.sort();
    assert_eq!(evicted, vec!["key_1".to_string(), "key_2".to_string()]);
}
