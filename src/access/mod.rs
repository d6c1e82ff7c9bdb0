//! Concurrency-control access strategies.
//!
//! ## Architecture
//!
//! The four concurrency kinds are a closed set of behavioral variants
//! selected by configuration, not a class hierarchy: [`EntityAccess`] and
//! [`CollectionAccess`] dispatch over a private enum with exactly four
//! variants, fixed at factory-build time.
//!
//! ```text
//!   persistence engine (external)
//!        │ get / put_from_load / lock / unlock / insert / update / remove
//!        ▼
//!   ┌───────────────────────────────────────────────────────────┐
//!   │ EntityAccess / CollectionAccess                           │
//!   │                                                           │
//!   │   AccessInner::ReadOnly        write-once, no locks       │
//!   │   AccessInner::ReadWrite       soft locks + version gate  │
//!   │   AccessInner::Nonstrict       evict-on-write, no locks   │
//!   │   AccessInner::Transactional   store-native transactions  │
//!   └──────────────┬────────────────────────────────────────────┘
//!                  ▼
//!            Region ──► KvStore
//! ```
//!
//! ## Choosing a kind
//!
//! | Kind | Writes | Staleness | Locking cost |
//! |------|--------|-----------|--------------|
//! | `read-only` | forbidden after insert | never | none |
//! | `read-write` | write-through on commit | never (version-gated) | soft lock per write |
//! | `nonstrict-read-write` | evict, reload on next read | short window | none |
//! | `transactional` | buffered in the store's transaction | never | store-native |
//!
//! Collections have no in-place update: their access surface drops
//! `insert`/`update` and invalidates through `remove` instead.

mod nonstrict;
mod read_only;
mod read_write;
mod transactional;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{CacheError, ConfigError};
use crate::key::{CacheEntry, CacheKey};
use crate::region::{Region, SoftLock};
use crate::store::traits::TxToken;
use crate::version::{Version, VersionComparator};

pub(crate) use transactional::TransactionalPolicy;

// ---------------------------------------------------------------------------
// AccessKind
// ---------------------------------------------------------------------------

/// The configured concurrency-control policy for one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    ReadOnly,
    ReadWrite,
    NonstrictReadWrite,
    Transactional,
}

impl AccessKind {
    /// The configuration-surface name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessKind::ReadOnly => "read-only",
            AccessKind::ReadWrite => "read-write",
            AccessKind::NonstrictReadWrite => "nonstrict-read-write",
            AccessKind::Transactional => "transactional",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read-only" => Ok(AccessKind::ReadOnly),
            "read-write" => Ok(AccessKind::ReadWrite),
            "nonstrict-read-write" => Ok(AccessKind::NonstrictReadWrite),
            "transactional" => Ok(AccessKind::Transactional),
            other => Err(ConfigError::new(format!(
                "unknown concurrency kind `{other}` (expected read-only, read-write, \
                 nonstrict-read-write or transactional)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub(crate) enum AccessInner {
    ReadOnly,
    ReadWrite,
    Nonstrict,
    Transactional(TransactionalPolicy),
}

impl AccessInner {
    fn kind(&self) -> AccessKind {
        match self {
            AccessInner::ReadOnly => AccessKind::ReadOnly,
            AccessInner::ReadWrite => AccessKind::ReadWrite,
            AccessInner::Nonstrict => AccessKind::NonstrictReadWrite,
            AccessInner::Transactional(_) => AccessKind::Transactional,
        }
    }
}

// ---------------------------------------------------------------------------
// EntityAccess
// ---------------------------------------------------------------------------

/// Access strategy over one entity region.
///
/// The persistence engine calls into this around every load and every flush
/// of entity state. All methods are safe for concurrent use; none blocks on
/// another transaction's lock.
pub struct EntityAccess {
    region: Arc<Region>,
    comparator: Arc<dyn VersionComparator>,
    inner: AccessInner,
}

impl std::fmt::Debug for EntityAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityAccess")
            .field("region", &self.region.name())
            .field("kind", &self.inner.kind())
            .finish()
    }
}

impl EntityAccess {
    pub(crate) fn new(
        region: Arc<Region>,
        comparator: Arc<dyn VersionComparator>,
        inner: AccessInner,
    ) -> Self {
        Self {
            region,
            comparator,
            inner,
        }
    }

    /// The configured concurrency kind.
    pub fn kind(&self) -> AccessKind {
        self.inner.kind()
    }

    /// The underlying region.
    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }

    /// Fetches the cached entry visible to a transaction that began at
    /// `txn_ts`. A miss means "go to the authoritative store"; it is never
    /// an error.
    pub fn get(&self, key: &CacheKey, txn_ts: u64) -> Option<Arc<CacheEntry>> {
        match &self.inner {
            AccessInner::ReadOnly => read_only::get(&self.region, key),
            AccessInner::ReadWrite => read_write::get(&self.region, key, txn_ts),
            AccessInner::Nonstrict => nonstrict::get(&self.region, key),
            AccessInner::Transactional(_) => transactional::get(&self.region, key),
        }
    }

    /// Populates the cache after a read of the authoritative store.
    ///
    /// `txn_ts` is the loading transaction's start stamp; `minimal_put`
    /// skips the install when an entry is already cached.
    pub fn put_from_load(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        txn_ts: u64,
        minimal_put: bool,
    ) -> bool {
        let cmp = self.comparator.as_ref();
        match &self.inner {
            AccessInner::ReadOnly => {
                read_only::put_from_load(&self.region, cmp, key, entry, txn_ts, minimal_put)
            },
            AccessInner::ReadWrite => {
                read_write::put_from_load(&self.region, cmp, key, entry, txn_ts, minimal_put)
            },
            AccessInner::Nonstrict => {
                nonstrict::put_from_load(&self.region, cmp, key, entry, txn_ts, minimal_put)
            },
            AccessInner::Transactional(_) => {
                transactional::put_from_load(&self.region, cmp, key, entry, txn_ts, minimal_put)
            },
        }
    }

    /// Soft-locks `key` ahead of a database write.
    ///
    /// Returns `Ok(None)` for kinds that do not lock. Read-only regions
    /// reject the call: locking announces a mutation.
    pub fn lock_item(
        &self,
        key: &CacheKey,
        current_version: Option<Version>,
    ) -> Result<Option<SoftLock>, CacheError> {
        match &self.inner {
            AccessInner::ReadOnly => read_only::lock_item(key),
            AccessInner::ReadWrite => read_write::lock_item(&self.region, key, current_version),
            AccessInner::Nonstrict => Ok(None),
            AccessInner::Transactional(_) => Ok(None),
        }
    }

    /// Releases a soft lock without a successful write: the rollback and
    /// cancellation path.
    pub fn unlock_item(&self, key: &CacheKey, lock: Option<SoftLock>) {
        let cmp = self.comparator.as_ref();
        match &self.inner {
            AccessInner::ReadOnly => {},
            AccessInner::ReadWrite => read_write::unlock_item(&self.region, cmp, key, lock),
            AccessInner::Nonstrict => nonstrict::unlock_item(&self.region, key),
            AccessInner::Transactional(_) => {},
        }
    }

    /// Called before the database insert. Nothing is cached yet; kinds that
    /// cache inserts do so in [`after_insert`](Self::after_insert).
    pub fn insert(&self, key: &CacheKey, entry: CacheEntry) -> bool {
        match &self.inner {
            AccessInner::Transactional(policy) => policy.insert(&self.region, key, entry),
            _ => false,
        }
    }

    /// Called after the inserting transaction committed. Installs the entry
    /// when the slot is vacant.
    pub fn after_insert(&self, key: &CacheKey, entry: CacheEntry) -> bool {
        match &self.inner {
            AccessInner::ReadOnly => read_only::after_insert(&self.region, key, entry),
            AccessInner::ReadWrite => read_write::after_insert(&self.region, key, entry),
            AccessInner::Nonstrict => false,
            AccessInner::Transactional(_) => false,
        }
    }

    /// Called before the database update.
    ///
    /// Read-only regions fail fast: immutable-by-contract data was mutated.
    /// Nonstrict regions evict immediately so no stale value is observable
    /// while the write is in flight.
    pub fn update(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        _current_version: Option<&Version>,
        _previous_version: Option<&Version>,
    ) -> Result<bool, CacheError> {
        let cmp = self.comparator.as_ref();
        match &self.inner {
            AccessInner::ReadOnly => read_only::update(key),
            AccessInner::ReadWrite => Ok(false),
            AccessInner::Nonstrict => nonstrict::update(&self.region, key),
            AccessInner::Transactional(policy) => policy.update(&self.region, cmp, key, entry),
        }
    }

    /// Called after the updating transaction committed.
    ///
    /// Under read-write this is where the version gate runs: a write whose
    /// stamp is not newer than what the lock displaced reports
    /// [`CacheError::StaleWrite`] and leaves the cache at the prior value.
    pub fn after_update(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        lock: Option<SoftLock>,
    ) -> Result<bool, CacheError> {
        let cmp = self.comparator.as_ref();
        match &self.inner {
            AccessInner::ReadOnly => read_only::update(key),
            AccessInner::ReadWrite => {
                read_write::after_update(&self.region, cmp, key, entry, lock)
            },
            AccessInner::Nonstrict => nonstrict::after_update(&self.region, key),
            AccessInner::Transactional(_) => Ok(false),
        }
    }

    /// Invalidates `key` after a database delete.
    pub fn remove(&self, key: &CacheKey) {
        match &self.inner {
            AccessInner::Transactional(policy) => policy.remove(key),
            _ => self.region.evict(key),
        }
    }

    /// Invalidates the whole region.
    pub fn remove_all(&self) {
        self.region.evict_all();
    }

    /// Forcibly drops `key` from the cache. Idempotent, never an error.
    pub fn evict(&self, key: &CacheKey) {
        self.region.evict(key);
    }

    /// Forcibly drops every entry in the region.
    pub fn evict_all(&self) {
        self.region.evict_all();
    }

    /// Opens a store-native transaction for the calling thread.
    /// `None` unless the kind is transactional.
    pub fn begin_transaction(&self) -> Option<TxToken> {
        match &self.inner {
            AccessInner::Transactional(policy) => Some(policy.begin()),
            _ => None,
        }
    }

    /// Transaction-boundary notification: the outcome is not yet known.
    pub fn before_completion(&self) {
        if let AccessInner::Transactional(policy) = &self.inner {
            policy.before_completion();
        }
    }

    /// Transaction-boundary notification: commit (`true`) or rollback.
    pub fn after_completion(&self, successful: bool) {
        if let AccessInner::Transactional(policy) = &self.inner {
            policy.after_completion(successful);
        }
    }
}

// ---------------------------------------------------------------------------
// CollectionAccess
// ---------------------------------------------------------------------------

/// Access strategy over one collection region.
///
/// Collections have no in-place update path: a mutated collection is removed
/// from the cache and reloaded on the next read. The surface is otherwise
/// the entity surface.
pub struct CollectionAccess {
    region: Arc<Region>,
    comparator: Arc<dyn VersionComparator>,
    inner: AccessInner,
}

impl CollectionAccess {
    pub(crate) fn new(
        region: Arc<Region>,
        comparator: Arc<dyn VersionComparator>,
        inner: AccessInner,
    ) -> Self {
        Self {
            region,
            comparator,
            inner,
        }
    }

    /// The configured concurrency kind.
    pub fn kind(&self) -> AccessKind {
        self.inner.kind()
    }

    /// The underlying region.
    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }

    /// Fetches the cached element snapshot visible at `txn_ts`.
    pub fn get(&self, key: &CacheKey, txn_ts: u64) -> Option<Arc<CacheEntry>> {
        match &self.inner {
            AccessInner::ReadOnly => read_only::get(&self.region, key),
            AccessInner::ReadWrite => read_write::get(&self.region, key, txn_ts),
            AccessInner::Nonstrict => nonstrict::get(&self.region, key),
            AccessInner::Transactional(_) => transactional::get(&self.region, key),
        }
    }

    /// Populates the cache after a collection load.
    pub fn put_from_load(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        txn_ts: u64,
        minimal_put: bool,
    ) -> bool {
        let cmp = self.comparator.as_ref();
        match &self.inner {
            AccessInner::ReadOnly => {
                read_only::put_from_load(&self.region, cmp, key, entry, txn_ts, minimal_put)
            },
            AccessInner::ReadWrite => {
                read_write::put_from_load(&self.region, cmp, key, entry, txn_ts, minimal_put)
            },
            AccessInner::Nonstrict => {
                nonstrict::put_from_load(&self.region, cmp, key, entry, txn_ts, minimal_put)
            },
            AccessInner::Transactional(_) => {
                transactional::put_from_load(&self.region, cmp, key, entry, txn_ts, minimal_put)
            },
        }
    }

    /// Soft-locks `key` ahead of an invalidating write.
    pub fn lock_item(
        &self,
        key: &CacheKey,
        current_version: Option<Version>,
    ) -> Result<Option<SoftLock>, CacheError> {
        match &self.inner {
            AccessInner::ReadOnly => read_only::lock_item(key),
            AccessInner::ReadWrite => read_write::lock_item(&self.region, key, current_version),
            AccessInner::Nonstrict => Ok(None),
            AccessInner::Transactional(_) => Ok(None),
        }
    }

    /// Releases a soft lock without a successful write.
    pub fn unlock_item(&self, key: &CacheKey, lock: Option<SoftLock>) {
        let cmp = self.comparator.as_ref();
        match &self.inner {
            AccessInner::ReadOnly => {},
            AccessInner::ReadWrite => read_write::unlock_item(&self.region, cmp, key, lock),
            AccessInner::Nonstrict => nonstrict::unlock_item(&self.region, key),
            AccessInner::Transactional(_) => {},
        }
    }

    /// Invalidates `key` after the owning entity's collection changed.
    pub fn remove(&self, key: &CacheKey) {
        match &self.inner {
            AccessInner::Transactional(policy) => policy.remove(key),
            _ => self.region.evict(key),
        }
    }

    /// Invalidates the whole region.
    pub fn remove_all(&self) {
        self.region.evict_all();
    }

    /// Forcibly drops `key` from the cache. Idempotent.
    pub fn evict(&self, key: &CacheKey) {
        self.region.evict(key);
    }

    /// Forcibly drops every entry in the region.
    pub fn evict_all(&self) {
        self.region.evict_all();
    }

    /// Transaction-boundary notification: the outcome is not yet known.
    pub fn before_completion(&self) {
        if let AccessInner::Transactional(policy) = &self.inner {
            policy.before_completion();
        }
    }

    /// Transaction-boundary notification: commit (`true`) or rollback.
    pub fn after_completion(&self, successful: bool) {
        if let AccessInner::Transactional(policy) = &self.inner {
            policy.after_completion(successful);
        }
    }
}
