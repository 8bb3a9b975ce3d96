//! Expiration Sweep Task
//!
//! Background task that physically removes expired entries from an
//! `ExpirableLru`, one bucket at a time.

use std::hash::Hash;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, trace};

use crate::cache::{ExpirableState, NUM_BUCKETS};

/// Shortest pause between two bucket sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

// == Sweep Handle ==
/// Stop signal for a running sweep task.
///
/// Dropping the handle stops the task as well.
#[derive(Debug)]
pub(crate) struct SweepHandle {
    stop: watch::Sender<bool>,
}

impl SweepHandle {
    /// Asks the task to exit. It does so at its next wake-up at the latest.
    pub(crate) fn stop(&self) {
        // Err only means the task is already gone
        let _ = self.stop.send(true);
    }

    /// Returns true until the task has exited.
    pub(crate) fn is_running(&self) -> bool {
        !self.stop.is_closed()
    }
}

/// Spawns the sweep task for a cache with the given `ttl`.
///
/// The task runs on a dedicated `lru-sweep` thread driving its own
/// single-threaded tokio runtime, so it lives as long as the cache whatever
/// runtime (if any) the cache was created on.
///
/// # Arguments
/// * `state` - Shared cache state, locked only to read a deadline or sweep
/// * `ttl` - Cache TTL; one bucket is processed every `ttl / NUM_BUCKETS`
///
/// # Returns
/// A SweepHandle that stops the task when told to or when dropped.
pub(crate) fn spawn_sweep_task<K, V>(
    state: Arc<Mutex<ExpirableState<K, V>>>,
    ttl: Duration,
) -> SweepHandle
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Send + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);
    let interval = (ttl / NUM_BUCKETS as u32).max(MIN_SWEEP_INTERVAL);
    let sweep = run_sweep(state, interval, stop_rx);

    let spawned = thread::Builder::new()
        .name("lru-sweep".to_string())
        .spawn(move || {
            match runtime::Builder::new_current_thread().enable_time().build() {
                Ok(runtime) => runtime.block_on(sweep),
                Err(err) => error!("Failed to build sweep runtime: {}", err),
            }
        });
    if let Err(err) = spawned {
        error!("Failed to spawn sweep thread: {}", err);
    }

    SweepHandle { stop: stop_tx }
}

/// Sweep loop: every `interval`, wait for the newest entry of the bucket
/// under the cursor to expire, then clear that bucket.
async fn run_sweep<K, V>(
    state: Arc<Mutex<ExpirableState<K, V>>>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) where
    K: Hash + Eq + Clone,
{
    info!(
        "Starting expiration sweep with interval of {:?}",
        interval
    );

    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => break,
            _ = ticker.tick() => {}
        }

        let (bucket, newest) = {
            let guard = state.lock();
            guard.sweep_deadline()
        };

        // Wait for the newest entry to expire without holding the lock
        if let Some(deadline) = newest.filter(|deadline| *deadline > Instant::now()) {
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = time::sleep_until(time::Instant::from_std(deadline)) => {}
            }
        }

        let removed = {
            let mut guard = state.lock();
            guard.sweep_bucket(bucket)
        };

        if removed > 0 {
            debug!("Expiration sweep: removed {} entries from bucket {}", removed, bucket);
        } else {
            trace!("Expiration sweep: bucket {} empty", bucket);
        }
    }

    info!("Expiration sweep stopped");
}
