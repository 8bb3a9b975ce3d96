//! Background Tasks Module
//!
//! Contains background tasks that run alongside a cache.
//!
//! # Tasks
//! - Expiration sweep: clears one expiration bucket of an `ExpirableLru`
//!   every `ttl / NUM_BUCKETS`

mod sweep;

pub(crate) use sweep::{spawn_sweep_task, SweepHandle};
