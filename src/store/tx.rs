//! Map store with native transaction support.
//!
//! ## Architecture
//! - Committed state lives in an inner [`ShardedMapStore`]; `get` only ever
//!   sees committed state.
//! - Each open transaction owns a write buffer (an ordered op log). Buffers
//!   are keyed by token; tokens are bound to the opening thread, playing the
//!   role an ambient transaction manager would play in a larger store.
//! - `after_completion(true)` replays the buffer into the inner store in
//!   enqueue order; `after_completion(false)` drops it unapplied, so a
//!   rolled-back transaction leaves no trace in the cache.
//!
//! The transactional access strategy is a thin translation layer over this
//! capability; all isolation comes from the buffer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::key::CacheKey;
use crate::region::Slot;
use crate::store::map::ShardedMapStore;
use crate::store::traits::{KvStore, StoreBackend, StoreSnapshot, TransactionalStore, TxToken};

enum TxOp<K, V> {
    Put(K, Arc<V>),
    Remove(K),
}

/// Sharded map store with a per-transaction write buffer.
pub struct TxMapStore<K, V> {
    inner: ShardedMapStore<K, V>,
    buffers: Mutex<FxHashMap<u64, Vec<TxOp<K, V>>>>,
    bindings: Mutex<FxHashMap<ThreadId, u64>>,
    next_token: AtomicU64,
}

impl<K, V> TxMapStore<K, V>
where
    K: Eq + std::hash::Hash,
{
    /// Creates a store with `shards` shards of committed state.
    pub fn new(shards: usize, seed: u64) -> Self {
        Self {
            inner: ShardedMapStore::new(shards, seed),
            buffers: Mutex::new(FxHashMap::default()),
            bindings: Mutex::new(FxHashMap::default()),
            next_token: AtomicU64::new(1),
        }
    }

    /// Number of transactions currently open.
    pub fn open_transactions(&self) -> usize {
        self.buffers.lock().len()
    }
}

impl<K, V> KvStore<K, V> for TxMapStore<K, V>
where
    K: Eq + std::hash::Hash + Send + Sync,
    V: Send + Sync,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.get(key)
    }

    fn put(&self, key: K, value: Arc<V>) {
        self.inner.put(key, value);
    }

    fn put_if_absent(&self, key: K, value: Arc<V>) -> bool {
        self.inner.put_if_absent(key, value)
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.inner.remove(key)
    }

    fn clear(&self) {
        self.inner.clear();
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn snapshot(&self) -> StoreSnapshot {
        self.inner.snapshot()
    }
}

impl<K, V> TransactionalStore<K, V> for TxMapStore<K, V>
where
    K: Eq + std::hash::Hash + Send + Sync,
    V: Send + Sync,
{
    fn begin(&self) -> TxToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.buffers.lock().insert(token, Vec::new());
        self.bindings.lock().insert(thread::current().id(), token);
        TxToken(token)
    }

    fn current(&self) -> Option<TxToken> {
        self.bindings
            .lock()
            .get(&thread::current().id())
            .copied()
            .map(TxToken)
    }

    fn put_tx(&self, key: K, value: Arc<V>) {
        match self.current() {
            Some(TxToken(token)) => {
                if let Some(buffer) = self.buffers.lock().get_mut(&token) {
                    buffer.push(TxOp::Put(key, value));
                }
            },
            None => self.inner.put(key, value),
        }
    }

    fn remove_tx(&self, key: K) {
        match self.current() {
            Some(TxToken(token)) => {
                if let Some(buffer) = self.buffers.lock().get_mut(&token) {
                    buffer.push(TxOp::Remove(key));
                }
            },
            None => {
                self.inner.remove(&key);
            },
        }
    }

    fn before_completion(&self) {
        // Validation point only; the buffer stays pending until the outcome
        // is known.
    }

    fn after_completion(&self, successful: bool) {
        let token = match self.bindings.lock().remove(&thread::current().id()) {
            Some(token) => token,
            None => return,
        };
        let buffer = match self.buffers.lock().remove(&token) {
            Some(buffer) => buffer,
            None => return,
        };
        if !successful {
            return;
        }
        for op in buffer {
            match op {
                TxOp::Put(key, value) => self.inner.put(key, value),
                TxOp::Remove(key) => {
                    self.inner.remove(&key);
                },
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TxLocalBackend
// ---------------------------------------------------------------------------

/// Backend producing transaction-capable local stores.
///
/// Identical to [`LocalBackend`](crate::store::LocalBackend) for timestamp
/// and query stores; entity/collection stores are [`TxMapStore`]s and the
/// transactional capability is advertised.
#[derive(Debug, Clone)]
pub struct TxLocalBackend {
    shards: usize,
}

impl TxLocalBackend {
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

impl Default for TxLocalBackend {
    fn default() -> Self {
        Self::new(16)
    }
}

impl StoreBackend for TxLocalBackend {
    fn entry_store(&self, region_name: &str) -> Arc<dyn KvStore<CacheKey, Slot>> {
        Arc::new(TxMapStore::new(self.shards, Self::seed_for(region_name)))
    }

    fn timestamp_store(&self, region_name: &str) -> Arc<dyn KvStore<Arc<str>, u64>> {
        Arc::new(ShardedMapStore::new(self.shards, Self::seed_for(region_name)))
    }

    fn query_store(
        &self,
        region_name: &str,
    ) -> Arc<dyn KvStore<crate::query::QueryKey, crate::query::QueryResultEntry>> {
        Arc::new(ShardedMapStore::new(self.shards, Self::seed_for(region_name)))
    }

    fn transactional_entry_store(
        &self,
        region_name: &str,
    ) -> Option<(
        Arc<dyn KvStore<CacheKey, Slot>>,
        Arc<dyn TransactionalStore<CacheKey, Slot>>,
    )> {
        let store = Arc::new(TxMapStore::new(self.shards, Self::seed_for(region_name)));
        Some((store.clone(), store))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
