//! Per-fingerprint single-flight
//!
//! Serializes miss handlers so at most one compute runs per cache key:
//! concurrent requesters for the same fingerprint block on the first one's
//! completion instead of launching duplicate embedding or expansion calls.
//! The caller acquires the key's lock, re-checks the cache, and only then
//! computes.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Soft bound on retained lock entries; idle entries are swept past this.
const SWEEP_THRESHOLD: usize = 4096;

/// A table of per-key async locks.
#[derive(Default)]
pub struct KeyedLocks {
    inner: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use. The guard is
    /// owned, so it can be held across awaits in the miss handler.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        if self.inner.len() > SWEEP_THRESHOLD {
            // Drop entries nobody is holding; holders keep theirs alive
            self.inner.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        let lock = self
            .inner
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
