//! Backing-store capability traits.
//!
//! A store focuses on keyed ownership and lookup; regions layer the
//! coherence protocol on top. Two capabilities exist: the universal
//! [`KvStore`] and the optional [`TransactionalStore`], which only stores
//! with native transaction support provide. [`StoreBackend`] is the factory
//! seam: one backend handle per [`RegionFactory`](crate::factory::RegionFactory),
//! building one store per region.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::StoreError;
use crate::key::CacheKey;
use crate::query::{QueryKey, QueryResultEntry};
use crate::region::Slot;

/// Snapshot of store-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub removes: u64,
}

/// Atomic counters shared by the store implementations in this crate.
#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    removes: AtomicU64,
}

impl StoreCounters {
    pub(crate) fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn inc_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }
}

/// Core keyed-store operations every backing store supports.
///
/// Values are handed out as `Arc<V>` snapshots so readers never observe a
/// torn value and never hold a lock across a read. Implementations must be
/// safe for concurrent use; a `get` must never block on a write to a
/// different key.
///
/// Caching is best-effort: a store that can actually fail (remote,
/// replicated) must degrade read failures to `None` and swallow write
/// failures rather than surface them; a cache problem must never abort the
/// caller's database transaction.
pub trait KvStore<K, V>: Send + Sync {
    /// Fetch a value by key.
    fn get(&self, key: &K) -> Option<Arc<V>>;

    /// Insert or replace a value.
    fn put(&self, key: K, value: Arc<V>);

    /// Insert only when the key is absent. Returns `true` if installed.
    fn put_if_absent(&self, key: K, value: Arc<V>) -> bool;

    /// Remove a value by key.
    fn remove(&self, key: &K) -> Option<Arc<V>>;

    /// Remove all entries.
    fn clear(&self);

    /// Current number of entries.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot the store's counters.
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot::default()
    }
}

/// Opaque handle for one native store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxToken(pub(crate) u64);

/// Native-transaction capability.
///
/// Writes enqueued through this interface stay invisible to [`KvStore::get`]
/// until `after_completion(true)` applies them; `after_completion(false)`
/// discards them without a trace. The store owns the association between the
/// calling context and its open transaction; callers other than the
/// transaction driver never see a token.
pub trait TransactionalStore<K, V>: Send + Sync {
    /// Opens a transaction bound to the calling thread.
    fn begin(&self) -> TxToken;

    /// The calling thread's open transaction, if any.
    fn current(&self) -> Option<TxToken>;

    /// Enqueue a put under the calling thread's transaction. Writes through
    /// immediately when no transaction is open.
    fn put_tx(&self, key: K, value: Arc<V>);

    /// Enqueue a remove under the calling thread's transaction. Applies
    /// immediately when no transaction is open.
    fn remove_tx(&self, key: K);

    /// Synchronization point before the outcome is known. A validation hook;
    /// the buffered writes are still pending.
    fn before_completion(&self);

    /// Completes the calling thread's transaction: apply the buffer when
    /// `successful`, discard it otherwise. Unbinds the thread either way.
    fn after_completion(&self, successful: bool);
}

/// Builds the stores behind one factory's regions.
///
/// Exactly one backend handle is bound per factory instance; `start` and
/// `stop` bracket its lifetime. A backend that cannot provide native
/// transactions simply leaves [`transactional_entry_store`](Self::transactional_entry_store)
/// at its `None` default, which makes the transactional access kind a
/// configuration-time error.
pub trait StoreBackend: Send + Sync {
    /// Bring up whatever the backend needs (connections, replication).
    fn start(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Tear the backend down. Stores built from it must not be used after.
    fn stop(&self) {}

    /// Build the slot store for an entity or collection region.
    fn entry_store(&self, region_name: &str) -> Arc<dyn KvStore<CacheKey, Slot>>;

    /// Build the store for the shared timestamps region.
    fn timestamp_store(&self, region_name: &str) -> Arc<dyn KvStore<Arc<str>, u64>>;

    /// Build the store for a query-result region.
    fn query_store(&self, region_name: &str) -> Arc<dyn KvStore<QueryKey, QueryResultEntry>>;

    /// Build a slot store with native transaction support, or `None` when
    /// the backend has no such capability.
    #[allow(clippy::type_complexity)]
    fn transactional_entry_store(
        &self,
        _region_name: &str,
    ) -> Option<(
        Arc<dyn KvStore<CacheKey, Slot>>,
        Arc<dyn TransactionalStore<CacheKey, Slot>>,
    )> {
        None
    }
}
