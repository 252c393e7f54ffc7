//! Sharded in-memory LRU tier
//!
//! A fixed 16-way sharded `LruCache` behind `parking_lot` mutexes. Shard
//! selection hashes the key, so unrelated fingerprints contend on different
//! locks. Used for the query-embedding and translation tiers.

use lru::LruCache;
use parking_lot::Mutex;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

const SHARD_COUNT: usize = 16;

/// Thread-safe sharded LRU keyed by string fingerprints.
pub struct ShardedLru<V> {
    shards: Vec<Mutex<LruCache<String, V>>>,
}

impl<V: Clone> ShardedLru<V> {
    /// Create a cache with the given total capacity, split evenly across
    /// shards (each shard holds at least one entry).
    pub fn new(capacity: usize) -> Self {
        let per_shard = (capacity / SHARD_COUNT).max(1);
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(LruCache::new(NonZeroUsize::new(per_shard).unwrap())))
            .collect();
        Self { shards }
    }

    fn shard(&self, key: &str) -> &Mutex<LruCache<String, V>> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.shard(key).lock().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: V) {
        self.shard(key).lock().put(key.to_string(), value);
    }

    /// Remove every entry whose key starts with `prefix`. Returns the
    /// number of evicted entries.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut evicted = 0;
        for shard in &self.shards {
            let mut guard = shard.lock();
            let keys: Vec<String> = guard
                .iter()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone())
                .collect();
            for key in keys {
                guard.pop(&key);
                evicted += 1;
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
