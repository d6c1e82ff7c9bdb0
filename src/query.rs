//! Query-result region.
//!
//! Caches the row snapshots produced by a query, keyed by statement and
//! parameter values. Every cached result remembers when it was created; on
//! lookup the referenced spaces are checked against the shared
//! [`TimestampsRegion`](crate::timestamps::TimestampsRegion), and a result
//! older than any space's last update is dropped and reported as a miss.
//! Query results carry no versions and no locks: staleness is decided
//! entirely by timestamp ordering.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::key::FieldValue;
use crate::store::traits::{KvStore, StoreSnapshot};
use crate::timestamp::Timestamper;
use crate::timestamps::TimestampsRegion;

/// Cache key for one query execution: statement plus bound parameters.
///
/// Equality and hashing are structural; parameter values participate via
/// [`FieldValue`]'s bitwise float semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    statement: Arc<str>,
    params: Vec<FieldValue>,
}

impl QueryKey {
    /// Creates a key for `statement` with the given bound parameters.
    pub fn new(statement: impl Into<Arc<str>>, params: Vec<FieldValue>) -> Self {
        Self {
            statement: statement.into(),
            params,
        }
    }

    /// The query statement text.
    pub fn statement(&self) -> &str {
        &self.statement
    }
}

/// One cached query result: creation stamp plus row snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResultEntry {
    created_at: u64,
    rows: Vec<Vec<FieldValue>>,
}

impl QueryResultEntry {
    /// Stamp at which the result was cached.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// The cached row snapshots.
    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }
}

/// Region holding query results, validated against the timestamps region.
pub struct QueryResultsRegion {
    name: String,
    store: Arc<dyn KvStore<QueryKey, QueryResultEntry>>,
    timestamps: Arc<TimestampsRegion>,
    timestamper: Arc<Timestamper>,
    destroyed: AtomicBool,
}

impl QueryResultsRegion {
    pub(crate) fn new(
        name: impl Into<String>,
        store: Arc<dyn KvStore<QueryKey, QueryResultEntry>>,
        timestamps: Arc<TimestampsRegion>,
        timestamper: Arc<Timestamper>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            timestamps,
            timestamper,
            destroyed: AtomicBool::new(false),
        }
    }

    /// The region's qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Caches `rows` for `key`, stamped now.
    pub fn put(&self, key: QueryKey, rows: Vec<Vec<FieldValue>>) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        let entry = QueryResultEntry {
            created_at: self.timestamper.next(),
            rows,
        };
        self.store.put(key, Arc::new(entry));
    }

    /// Fetches the cached result for `key` if it is still current for every
    /// space in `spaces`. A stale result is dropped on the way out.
    pub fn get(&self, key: &QueryKey, spaces: &[Arc<str>]) -> Option<Arc<QueryResultEntry>> {
        if self.destroyed.load(Ordering::Acquire) {
            return None;
        }
        let entry = self.store.get(key)?;
        if self.timestamps.up_to_date(spaces, entry.created_at) {
            Some(entry)
        } else {
            self.store.remove(key);
            None
        }
    }

    /// Drops every cached result.
    pub fn evict_all(&self) {
        self.store.clear();
    }

    /// Snapshot of the backing store's counters.
    pub fn store_metrics(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub(crate) fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.store.clear();
    }
}
