//! Local map-backed stores.
//!
//! ## Architecture
//! - Entries live in `FxHashMap<K, Arc<V>>` behind `parking_lot` locks.
//! - `ConcurrentMapStore` guards one map with a single `RwLock`.
//! - `ShardedMapStore` splits the keyspace across per-shard locks using a
//!   seeded [`ShardSelector`], so writes to one shard never block reads of
//!   another.
//!
//! ## When to Use
//! - `ConcurrentMapStore`: small regions, tests, low contention.
//! - `ShardedMapStore`: the default for entity/collection regions, where the
//!   non-blocking-reader guarantee matters under write load.
//!
//! Neither store has native transactions; requesting the transactional
//! access kind on a [`LocalBackend`] fails at factory-build time. See
//! [`TxMapStore`](crate::store::TxMapStore) for the transactional variant.

use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::key::CacheKey;
use crate::query::{QueryKey, QueryResultEntry};
use crate::region::Slot;
use crate::store::shard::ShardSelector;
use crate::store::traits::{KvStore, StoreBackend, StoreCounters, StoreSnapshot};

// ---------------------------------------------------------------------------
// ConcurrentMapStore
// ---------------------------------------------------------------------------

/// Thread-safe map store with a single global `RwLock`.
#[derive(Debug, Default)]
pub struct ConcurrentMapStore<K, V> {
    map: RwLock<FxHashMap<K, Arc<V>>>,
    counters: StoreCounters,
}

impl<K, V> ConcurrentMapStore<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            map: RwLock::new(FxHashMap::default()),
            counters: StoreCounters::default(),
        }
    }
}

impl<K, V> KvStore<K, V> for ConcurrentMapStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Send + Sync,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.map.read().get(key).cloned();
        self.counters.record_lookup(found.is_some());
        found
    }

    fn put(&self, key: K, value: Arc<V>) {
        self.map.write().insert(key, value);
        self.counters.inc_put();
    }

    fn put_if_absent(&self, key: K, value: Arc<V>) -> bool {
        let mut map = self.map.write();
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, value);
        self.counters.inc_put();
        true
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        let removed = self.map.write().remove(key);
        if removed.is_some() {
            self.counters.inc_remove();
        }
        removed
    }

    fn clear(&self) {
        self.map.write().clear();
    }

    fn len(&self) -> usize {
        self.map.read().len()
    }

    fn snapshot(&self) -> StoreSnapshot {
        self.counters.snapshot()
    }
}

// ---------------------------------------------------------------------------
// ShardedMapStore
// ---------------------------------------------------------------------------

/// Thread-safe map store with per-shard locks.
#[derive(Debug)]
pub struct ShardedMapStore<K, V> {
    shards: Box<[RwLock<FxHashMap<K, Arc<V>>>]>,
    selector: ShardSelector,
    counters: StoreCounters,
}

impl<K, V> ShardedMapStore<K, V>
where
    K: Eq + Hash,
{
    /// Creates a store with `shards` independent shards (clamped to at least 1).
    pub fn new(shards: usize, seed: u64) -> Self {
        let selector = ShardSelector::new(shards, seed);
        let shards = (0..selector.shard_count())
            .map(|_| RwLock::new(FxHashMap::default()))
            .collect();
        Self {
            shards,
            selector,
            counters: StoreCounters::default(),
        }
    }

    fn shard(&self, key: &K) -> &RwLock<FxHashMap<K, Arc<V>>> {
        &self.shards[self.selector.shard_for_key(key)]
    }
}

impl<K, V> KvStore<K, V> for ShardedMapStore<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Send + Sync,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.shard(key).read().get(key).cloned();
        self.counters.record_lookup(found.is_some());
        found
    }

    fn put(&self, key: K, value: Arc<V>) {
        self.shard(&key).write().insert(key, value);
        self.counters.inc_put();
    }

    fn put_if_absent(&self, key: K, value: Arc<V>) -> bool {
        let mut shard = self.shard(&key).write();
        if shard.contains_key(&key) {
            return false;
        }
        shard.insert(key, value);
        self.counters.inc_put();
        true
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        let removed = self.shard(key).write().remove(key);
        if removed.is_some() {
            self.counters.inc_remove();
        }
        removed
    }

    fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    fn snapshot(&self) -> StoreSnapshot {
        self.counters.snapshot()
    }
}

// ---------------------------------------------------------------------------
// LocalBackend
// ---------------------------------------------------------------------------

/// Backend producing sharded local map stores.
///
/// The stock in-process backend: one [`ShardedMapStore`] per region, no
/// native transactions, no external lifecycle. Region names seed shard
/// selection so distinct regions hash independently.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    shards: usize,
}

impl LocalBackend {
    /// Creates a backend whose stores use `shards` shards each.
    pub fn new(shards: usize) -> Self {
        Self {
            shards: shards.max(1),
        }
    }

    fn seed_for(region_name: &str) -> u64 {
        region_name
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
                (acc ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
            })
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new(16)
    }
}

impl StoreBackend for LocalBackend {
    fn entry_store(&self, region_name: &str) -> Arc<dyn KvStore<CacheKey, Slot>> {
        Arc::new(ShardedMapStore::new(self.shards, Self::seed_for(region_name)))
    }

    fn timestamp_store(&self, region_name: &str) -> Arc<dyn KvStore<Arc<str>, u64>> {
        Arc::new(ShardedMapStore::new(self.shards, Self::seed_for(region_name)))
    }

    fn query_store(&self, region_name: &str) -> Arc<dyn KvStore<QueryKey, QueryResultEntry>> {
        Arc::new(ShardedMapStore::new(self.shards, Self::seed_for(region_name)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
