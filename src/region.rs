//! # Cache Region
//!
//! A [`Region`] is one named partition of the second-level cache: a mapping
//! from [`CacheKey`] to a slot that is either a cached item snapshot or a
//! soft-lock record. All access strategies drive the same region surface;
//! the strategy decides *when* to call, the region guarantees *how* each
//! call composes with concurrent ones.
//!
//! ## Slot State Machine
//!
//! ```text
//!                 put_from_load / install_new
//!    ┌─────────┐ ──────────────────────────────► ┌─────────┐
//!    │ ABSENT  │                                 │  ITEM   │
//!    └─────────┘ ◄────────────────────────────── └─────────┘
//!        ▲  ▲            evict / unlock(fail)        │
//!        │  │                                        │ lock
//!        │  │ unlock(fail, last holder)              ▼
//!        │  │                                 ┌──────────────┐
//!        │  └──────────────────────────────── │  LOCKED(n)   │ ◄─┐
//!        │                                    │  + prior item│ ──┘ lock
//!        │      unlock(success, last holder,  └──────────────┘  (n+1,
//!        │      version accepted)                    │       concurrent)
//!        │                                           ▼
//!        │                                    ┌─────────┐
//!        └─────────────────────────────────── │  ITEM'  │  (new version)
//!             stale version → prior restored  └─────────┘
//! ```
//!
//! ## Key Guarantees
//!
//! | Guarantee | Mechanism |
//! |---|---|
//! | Readers never block on writers | `get` takes no stripe lock; slots are `Arc` snapshots |
//! | `lock`/`unlock`/`put_from_load` atomic per key | seeded lock striping ([`ShardSelector`]) |
//! | Eviction beats in-flight loads | per-key + region-wide invalidation stamps |
//! | Rollback never leaves a torn entry | `unlock(fail)` evicts, never reinstalls |
//! | Soft locks never serialize threads | multiplicity counter, no blocking acquire |
//!
//! The invalidation stamps implement the strict policy documented in
//! `DESIGN.md`: a released lock stops suppressing repopulation the moment the
//! last holder releases; staleness of in-flight loads is caught by comparing
//! the loading transaction's start stamp against the key's last invalidation
//! stamp instead of by a timed grace window on the lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::error::StaleWriteError;
use crate::key::{CacheEntry, CacheKey};
use crate::store::shard::ShardSelector;
use crate::store::traits::KvStore;
use crate::timestamp::{Timestamper, ONE_MS};
use crate::version::{Version, VersionComparator};

/// How long an invalidation stamp is retained before pruning, in timestamp
/// units. Loads outstanding longer than this are assumed dead.
const INVALIDATION_RETENTION: u64 = 60_000 * ONE_MS;

/// Prune the invalidation map when it grows past this many entries.
const INVALIDATION_PRUNE_LEN: usize = 1024;

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// A cached item snapshot.
#[derive(Debug, Clone)]
pub struct ItemSnapshot {
    /// The cached entry.
    pub entry: Arc<CacheEntry>,
    /// Stamp at which the entry was installed.
    pub cached_at: u64,
}

/// Region-internal soft-lock record.
///
/// One record serves every overlapping writer of the key; `multiplicity`
/// counts them and `lock_id` ties the record to the [`SoftLock`] handles
/// handed out for it. The record remembers the version of the item it
/// displaced so the unlock path can reject stale writes.
#[derive(Debug, Clone)]
pub struct LockRecord {
    lock_id: u64,
    multiplicity: u32,
    concurrent: bool,
    since: u64,
    displaced_version: Option<Version>,
}

impl LockRecord {
    /// Number of writers currently holding this logical lock.
    pub fn multiplicity(&self) -> u32 {
        self.multiplicity
    }

    /// Whether more than one writer ever held the lock concurrently.
    pub fn was_concurrent(&self) -> bool {
        self.concurrent
    }

    /// Stamp at which the lock was first taken.
    pub fn since(&self) -> u64 {
        self.since
    }
}

/// One slot of a region: a cached item or a soft-locked key.
///
/// Locked slots keep the displaced item alongside the lock record; strict
/// strategies treat the key as a miss while locked, and a stale-write
/// rejection restores the displaced item untouched.
#[derive(Debug, Clone)]
pub enum Slot {
    Item(ItemSnapshot),
    Locked {
        rec: LockRecord,
        prior: Option<ItemSnapshot>,
    },
}

impl Slot {
    #[cfg(test)]
    pub(crate) fn item_for_test() -> Self {
        Slot::Item(ItemSnapshot {
            entry: Arc::new(CacheEntry::entity("Test", Vec::new(), None)),
            cached_at: 0,
        })
    }
}

/// Advisory lease handle returned by [`Region::lock`].
///
/// Owned by the region, referenced by the access strategy; callers pass it
/// back verbatim to the unlock path and never inspect it.
#[derive(Debug, Clone)]
pub struct SoftLock {
    key: CacheKey,
    lock_id: u64,
    since: u64,
}

impl SoftLock {
    /// The locked key.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Unique identifier of the lock acquisition this handle belongs to.
    pub fn lock_id(&self) -> u64 {
        self.lock_id
    }

    /// Stamp at which the lock was first taken.
    pub fn since(&self) -> u64 {
        self.since
    }
}

// ---------------------------------------------------------------------------
// Operation modes and outcomes
// ---------------------------------------------------------------------------

/// Overwrite rule applied by [`Region::put_from_load`] when an item is
/// already cached for the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Keep the existing item (write-once regions).
    IfAbsent,
    /// Replace only when the incoming version is newer per the comparator;
    /// unversioned entries never replace.
    IfNewer,
    /// Last load wins (nonstrict regions).
    Overwrite,
}

/// What the writer's database write came to.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The write committed; install this entry if the version gate passes.
    Success(CacheEntry),
    /// The write failed or rolled back.
    Failure,
}

/// How [`Region::unlock`] resolved the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockDisposition {
    /// The new entry was installed.
    Installed,
    /// The key was evicted (failure, concurrency, or lost lock).
    Evicted,
    /// Other writers still hold the lock; resolution deferred to them.
    Deferred,
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// Snapshot of a region's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub put_refusals: u64,
    pub locks: u64,
    pub evictions: u64,
    pub stale_writes: u64,
}

#[derive(Debug, Default)]
struct RegionCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    put_refusals: AtomicU64,
    locks: AtomicU64,
    evictions: AtomicU64,
    stale_writes: AtomicU64,
}

impl RegionCounters {
    fn snapshot(&self) -> RegionSnapshot {
        RegionSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            put_refusals: self.put_refusals.load(Ordering::Relaxed),
            locks: self.locks.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            stale_writes: self.stale_writes.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// A named, keyed partition of the second-level cache.
///
/// Wraps a pluggable [`KvStore`] and layers the slot state machine on top.
/// Mutating operations for one key serialize on a lock stripe; `get` is
/// lock-free at this layer and sees whatever `Arc` snapshot the store holds.
pub struct Region {
    name: String,
    store: Arc<dyn KvStore<CacheKey, Slot>>,
    stripes: Box<[Mutex<()>]>,
    selector: ShardSelector,
    invalidations: RwLock<FxHashMap<CacheKey, u64>>,
    region_invalidated_at: AtomicU64,
    next_lock_id: AtomicU64,
    timestamper: Arc<Timestamper>,
    counters: RegionCounters,
    destroyed: AtomicBool,
}

impl Region {
    /// Creates a region over the given store with `stripes` lock stripes.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn KvStore<CacheKey, Slot>>,
        timestamper: Arc<Timestamper>,
        stripes: usize,
    ) -> Self {
        let name = name.into();
        let selector = ShardSelector::new(stripes.max(1), 0x5eed ^ name.len() as u64);
        let stripes = (0..selector.shard_count()).map(|_| Mutex::new(())).collect();
        Self {
            name,
            store,
            stripes,
            selector,
            invalidations: RwLock::new(FxHashMap::default()),
            region_invalidated_at: AtomicU64::new(0),
            next_lock_id: AtomicU64::new(1),
            timestamper,
            counters: RegionCounters::default(),
            destroyed: AtomicBool::new(false),
        }
    }

    /// The region's qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The shared timestamp source.
    pub fn timestamper(&self) -> &Arc<Timestamper> {
        &self.timestamper
    }

    /// Snapshot of the region's counters.
    pub fn metrics(&self) -> RegionSnapshot {
        self.counters.snapshot()
    }

    /// Whether the region has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn stripe(&self, key: &CacheKey) -> &Mutex<()> {
        &self.stripes[self.selector.shard_for_key(key)]
    }

    /// Raw slot lookup. Never blocks, never errors.
    pub fn slot(&self, key: &CacheKey) -> Option<Arc<Slot>> {
        if self.is_destroyed() {
            return None;
        }
        self.store.get(key)
    }

    /// Fetches the cached entry for `key`, treating locked keys as misses.
    ///
    /// When `min_ts` is given (strict read-write reads), an item installed at
    /// or after that stamp is also a miss: the reading transaction predates
    /// the cached value and must reload from the authoritative store.
    pub fn get_entry(&self, key: &CacheKey, min_ts: Option<u64>) -> Option<Arc<CacheEntry>> {
        let hit = match self.slot(key).as_deref() {
            Some(Slot::Item(item)) => match min_ts {
                Some(ts) if item.cached_at >= ts => None,
                _ => Some(item.entry.clone()),
            },
            _ => None,
        };
        if hit.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Repopulates the cache from a fresh read of the authoritative store.
    ///
    /// Returns `true` when the entry was installed. The put is refused when:
    /// the region is destroyed; the key was invalidated at or after `txn_ts`
    /// (the loading transaction read data that a later remove made stale);
    /// the key is soft-locked; an item is already present and either
    /// `minimal_put` is set or `mode` forbids the overwrite.
    pub fn put_from_load(
        &self,
        key: &CacheKey,
        entry: CacheEntry,
        txn_ts: u64,
        minimal_put: bool,
        mode: PutMode,
        comparator: &dyn VersionComparator,
    ) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let _guard = self.stripe(key).lock();
        if self.invalidated_since(key, txn_ts) {
            self.counters.put_refusals.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let accepted = match self.store.get(key).as_deref() {
            None => true,
            Some(Slot::Locked { .. }) => false,
            Some(Slot::Item(current)) => {
                if minimal_put {
                    false
                } else {
                    match mode {
                        PutMode::IfAbsent => false,
                        PutMode::Overwrite => true,
                        PutMode::IfNewer => match (entry.version(), current.entry.version()) {
                            (Some(candidate), Some(cached)) => {
                                comparator.is_newer(candidate, cached)
                            },
                            _ => false,
                        },
                    }
                }
            },
        };
        if accepted {
            self.install(key, entry);
            self.counters.puts.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.put_refusals.fetch_add(1, Ordering::Relaxed);
        }
        accepted
    }

    /// Installs a just-created entry if the key is vacant.
    ///
    /// Used on the after-insert path: the writing transaction created the
    /// row, so the invalidation window does not apply, but a concurrent slot
    /// of any kind wins.
    pub fn install_new(&self, key: &CacheKey, entry: CacheEntry) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let _guard = self.stripe(key).lock();
        if self.store.get(key).is_some() {
            return false;
        }
        self.install(key, entry);
        self.counters.puts.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn install(&self, key: &CacheKey, entry: CacheEntry) {
        self.store.put(
            key.clone(),
            Arc::new(Slot::Item(ItemSnapshot {
                entry: Arc::new(entry),
                cached_at: self.timestamper.next(),
            })),
        );
    }

    /// Soft-locks `key` for a write.
    ///
    /// Never blocks. A fresh acquisition displaces the cached item into the
    /// lock slot and remembers its version (or `displaced_version_hint` for
    /// a vacant key); overlapping acquisitions increment multiplicity on the
    /// existing record and share its lock id.
    pub fn lock(&self, key: &CacheKey, displaced_version_hint: Option<Version>) -> SoftLock {
        let since = self.timestamper.next();
        if self.is_destroyed() {
            // Inert handle; every later operation on it is a no-op.
            return SoftLock {
                key: key.clone(),
                lock_id: 0,
                since,
            };
        }
        let _guard = self.stripe(key).lock();
        self.counters.locks.fetch_add(1, Ordering::Relaxed);
        let (rec, prior) = match self.store.get(key).as_deref() {
            Some(Slot::Locked { rec, prior }) => {
                let mut rec = rec.clone();
                rec.multiplicity += 1;
                rec.concurrent = true;
                (rec, prior.clone())
            },
            Some(Slot::Item(item)) => (
                LockRecord {
                    lock_id: self.next_lock_id.fetch_add(1, Ordering::Relaxed),
                    multiplicity: 1,
                    concurrent: false,
                    since,
                    displaced_version: item.entry.version().cloned(),
                },
                Some(item.clone()),
            ),
            None => (
                LockRecord {
                    lock_id: self.next_lock_id.fetch_add(1, Ordering::Relaxed),
                    multiplicity: 1,
                    concurrent: false,
                    since,
                    displaced_version: displaced_version_hint,
                },
                None,
            ),
        };
        let lock_id = rec.lock_id;
        self.store
            .put(key.clone(), Arc::new(Slot::Locked { rec, prior }));
        SoftLock {
            key: key.clone(),
            lock_id,
            since,
        }
    }

    /// Releases one holder of `key`'s soft lock and resolves the slot.
    ///
    /// The last holder resolves the slot according to `outcome`:
    /// - `Failure` → evict, never reinstall.
    /// - `Success` after concurrent holding → evict; overlapping writers
    ///   cannot be ordered reliably, so the next read reloads.
    /// - `Success`, sole holder → install the new entry unless both it and
    ///   the displaced item carry versions and the comparator says the new
    ///   one is not newer; a stale write restores the displaced item and
    ///   reports [`StaleWriteError`].
    ///
    /// Releasing while other holders remain leaves the slot to them. A lock
    /// that no longer matches the slot (expired or displaced) evicts the key
    /// defensively.
    pub fn unlock(
        &self,
        key: &CacheKey,
        lock: &SoftLock,
        outcome: WriteOutcome,
        comparator: &dyn VersionComparator,
    ) -> Result<UnlockDisposition, StaleWriteError> {
        if self.is_destroyed() {
            return Ok(UnlockDisposition::Evicted);
        }
        let _guard = self.stripe(key).lock();
        let slot = self.store.get(key);
        let (rec, prior) = match slot.as_deref() {
            Some(Slot::Locked { rec, prior }) if rec.lock_id == lock.lock_id => {
                (rec.clone(), prior.clone())
            },
            _ => {
                // Not our lock anymore; leave nothing questionable behind.
                self.evict_locked(key);
                return Ok(UnlockDisposition::Evicted);
            },
        };

        if rec.multiplicity > 1 {
            let mut rec = rec;
            rec.multiplicity -= 1;
            self.store
                .put(key.clone(), Arc::new(Slot::Locked { rec, prior }));
            return Ok(UnlockDisposition::Deferred);
        }

        match outcome {
            WriteOutcome::Failure => {
                self.evict_locked(key);
                Ok(UnlockDisposition::Evicted)
            },
            WriteOutcome::Success(_) if rec.concurrent => {
                self.evict_locked(key);
                Ok(UnlockDisposition::Evicted)
            },
            WriteOutcome::Success(entry) => {
                let stale = match (entry.version(), rec.displaced_version.as_ref()) {
                    (Some(candidate), Some(displaced)) => {
                        !comparator.is_newer(candidate, displaced)
                    },
                    _ => false,
                };
                if stale {
                    self.counters.stale_writes.fetch_add(1, Ordering::Relaxed);
                    match prior {
                        Some(item) => {
                            self.store.put(key.clone(), Arc::new(Slot::Item(item)));
                        },
                        None => self.evict_locked(key),
                    }
                    Err(StaleWriteError::new(key.clone()))
                } else {
                    self.install(key, entry);
                    self.counters.puts.fetch_add(1, Ordering::Relaxed);
                    Ok(UnlockDisposition::Installed)
                }
            },
        }
    }

    /// Removes `key` and stamps it invalidated. Idempotent.
    pub fn evict(&self, key: &CacheKey) {
        if self.is_destroyed() {
            return;
        }
        let _guard = self.stripe(key).lock();
        self.evict_locked(key);
    }

    fn evict_locked(&self, key: &CacheKey) {
        if self.store.remove(key).is_some() {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.stamp_invalidation(key);
    }

    /// Removes every entry and stamps the whole region invalidated.
    pub fn evict_all(&self) {
        if self.is_destroyed() {
            return;
        }
        // Sweep every stripe so no in-flight unlock can reinstall an entry
        // behind the clear. Stripes are taken in index order; per-key
        // operations hold at most one, so no cycle is possible.
        let _guards: Vec<_> = self.stripes.iter().map(|stripe| stripe.lock()).collect();
        let stamp = self.timestamper.next();
        self.region_invalidated_at.fetch_max(stamp, Ordering::AcqRel);
        self.store.clear();
        self.invalidations.write().clear();
        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Destroys the region. Every later read is a miss and every later write
    /// a no-op; destruction is irreversible.
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        let _guards: Vec<_> = self.stripes.iter().map(|stripe| stripe.lock()).collect();
        self.store.clear();
        self.invalidations.write().clear();
    }

    fn invalidated_since(&self, key: &CacheKey, txn_ts: u64) -> bool {
        if self.region_invalidated_at.load(Ordering::Acquire) >= txn_ts {
            return true;
        }
        self.invalidations
            .read()
            .get(key)
            .is_some_and(|stamp| *stamp >= txn_ts)
    }

    fn stamp_invalidation(&self, key: &CacheKey) {
        let stamp = self.timestamper.next();
        let mut map = self.invalidations.write();
        map.insert(key.clone(), stamp);
        if map.len() > INVALIDATION_PRUNE_LEN {
            let horizon = stamp.saturating_sub(INVALIDATION_RETENTION);
            map.retain(|_, recorded| *recorded > horizon);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{FieldValue, IdValue};
    use crate::store::map::ConcurrentMapStore;
    use crate::version::StandardVersionComparator;

    const CMP: StandardVersionComparator = StandardVersionComparator;

    fn region() -> Region {
        Region::new(
            "test.entities",
            Arc::new(ConcurrentMapStore::new()),
            Arc::new(Timestamper::new()),
            8,
        )
    }

    fn key(id: i64) -> CacheKey {
        CacheKey::new("Order", IdValue::I64(id))
    }

    fn entry(version: u64) -> CacheEntry {
        CacheEntry::entity(
            "Order",
            vec![FieldValue::I64(version as i64)],
            Some(Version::U64(version)),
        )
    }

    fn unversioned() -> CacheEntry {
        CacheEntry::entity("Order", vec![FieldValue::Null], None)
    }

    // -- put_from_load ----------------------------------------------------

    #[test]
    fn load_populates_vacant_key() {
        let region = region();
        let ts = region.timestamper().next();
        assert!(region.put_from_load(&key(1), entry(1), ts, false, PutMode::IfNewer, &CMP));
        assert!(region.get_entry(&key(1), None).is_some());
    }

    #[test]
    fn minimal_put_skips_present_entry() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), ts, false, PutMode::Overwrite, &CMP);
        assert!(!region.put_from_load(&key(1), entry(2), ts, true, PutMode::Overwrite, &CMP));
    }

    #[test]
    fn if_newer_mode_requires_newer_version() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(2), ts, false, PutMode::IfNewer, &CMP);

        assert!(!region.put_from_load(&key(1), entry(1), ts, false, PutMode::IfNewer, &CMP));
        assert!(!region.put_from_load(&key(1), unversioned(), ts, false, PutMode::IfNewer, &CMP));
        assert!(region.put_from_load(&key(1), entry(3), ts, false, PutMode::IfNewer, &CMP));

        let cached = region.get_entry(&key(1), None).unwrap();
        assert_eq!(cached.version(), Some(&Version::U64(3)));
    }

    #[test]
    fn if_absent_mode_never_replaces() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), ts, false, PutMode::IfAbsent, &CMP);
        assert!(!region.put_from_load(&key(1), entry(9), ts, false, PutMode::IfAbsent, &CMP));
    }

    #[test]
    fn load_refused_while_locked() {
        let region = region();
        let _lock = region.lock(&key(1), None);
        let ts = region.timestamper().next();
        assert!(!region.put_from_load(&key(1), entry(1), ts, false, PutMode::Overwrite, &CMP));
    }

    #[test]
    fn eviction_beats_load_that_started_earlier() {
        let region = region();
        let loader_ts = region.timestamper().next();
        region.evict(&key(1));
        // The loader read the database before the remove landed; its data is
        // suspect and must not be cached.
        assert!(!region.put_from_load(
            &key(1),
            entry(1),
            loader_ts,
            false,
            PutMode::Overwrite,
            &CMP
        ));

        let fresh_ts = region.timestamper().next();
        assert!(region.put_from_load(&key(1), entry(1), fresh_ts, false, PutMode::Overwrite, &CMP));
    }

    #[test]
    fn region_wide_invalidation_beats_earlier_loads() {
        let region = region();
        let loader_ts = region.timestamper().next();
        region.evict_all();
        assert!(!region.put_from_load(
            &key(7),
            entry(1),
            loader_ts,
            false,
            PutMode::Overwrite,
            &CMP
        ));
    }

    // -- get --------------------------------------------------------------

    #[test]
    fn strict_get_misses_entries_cached_after_txn_start() {
        let region = region();
        let txn_ts = region.timestamper().next();
        let load_ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), load_ts, false, PutMode::Overwrite, &CMP);

        assert!(region.get_entry(&key(1), Some(txn_ts)).is_none());
        let later_txn = region.timestamper().next();
        assert!(region.get_entry(&key(1), Some(later_txn)).is_some());
    }

    #[test]
    fn locked_key_reads_as_miss() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), ts, false, PutMode::Overwrite, &CMP);
        let _lock = region.lock(&key(1), None);
        assert!(region.get_entry(&key(1), None).is_none());
    }

    // -- lock / unlock ----------------------------------------------------

    #[test]
    fn unlock_success_installs_new_entry() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), ts, false, PutMode::Overwrite, &CMP);

        let lock = region.lock(&key(1), None);
        let disposition = region
            .unlock(&key(1), &lock, WriteOutcome::Success(entry(2)), &CMP)
            .unwrap();
        assert_eq!(disposition, UnlockDisposition::Installed);

        let cached = region.get_entry(&key(1), None).unwrap();
        assert_eq!(cached.version(), Some(&Version::U64(2)));
    }

    #[test]
    fn unlock_failure_evicts() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), ts, false, PutMode::Overwrite, &CMP);

        let lock = region.lock(&key(1), None);
        let disposition = region
            .unlock(&key(1), &lock, WriteOutcome::Failure, &CMP)
            .unwrap();
        assert_eq!(disposition, UnlockDisposition::Evicted);
        assert!(region.get_entry(&key(1), None).is_none());
    }

    #[test]
    fn stale_write_restores_displaced_item() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(5), ts, false, PutMode::Overwrite, &CMP);

        let lock = region.lock(&key(1), None);
        let err = region
            .unlock(&key(1), &lock, WriteOutcome::Success(entry(4)), &CMP)
            .unwrap_err();
        assert_eq!(err.key(), &key(1));

        let cached = region.get_entry(&key(1), None).unwrap();
        assert_eq!(cached.version(), Some(&Version::U64(5)));
        assert_eq!(region.metrics().stale_writes, 1);
    }

    #[test]
    fn concurrent_holders_defer_then_evict() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), ts, false, PutMode::Overwrite, &CMP);

        let first = region.lock(&key(1), None);
        let second = region.lock(&key(1), None);
        assert_eq!(first.lock_id(), second.lock_id());

        let disposition = region
            .unlock(&key(1), &first, WriteOutcome::Success(entry(2)), &CMP)
            .unwrap();
        assert_eq!(disposition, UnlockDisposition::Deferred);
        // First writer's entry was discarded; key still reads as locked.
        assert!(region.get_entry(&key(1), None).is_none());

        let disposition = region
            .unlock(&key(1), &second, WriteOutcome::Success(entry(3)), &CMP)
            .unwrap();
        assert_eq!(
            disposition,
            UnlockDisposition::Evicted,
            "concurrent writes cannot be ordered; the key must reload"
        );
        assert!(region.get_entry(&key(1), None).is_none());
    }

    #[test]
    fn foreign_lock_handle_evicts_defensively() {
        let region = region();
        let lock = region.lock(&key(1), None);
        let _ = region.unlock(&key(1), &lock, WriteOutcome::Failure, &CMP);

        // The handle now points at nothing; releasing it again just evicts.
        let disposition = region
            .unlock(&key(1), &lock, WriteOutcome::Success(entry(2)), &CMP)
            .unwrap();
        assert_eq!(disposition, UnlockDisposition::Evicted);
    }

    #[test]
    fn unversioned_write_accepted_on_sole_lock() {
        let region = region();
        let lock = region.lock(&key(1), None);
        let disposition = region
            .unlock(&key(1), &lock, WriteOutcome::Success(unversioned()), &CMP)
            .unwrap();
        assert_eq!(disposition, UnlockDisposition::Installed);
    }

    // -- evict / destroy --------------------------------------------------

    #[test]
    fn evict_is_idempotent() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), ts, false, PutMode::Overwrite, &CMP);

        region.evict(&key(1));
        region.evict(&key(1));
        assert!(region.get_entry(&key(1), None).is_none());
        assert_eq!(region.metrics().evictions, 1);
    }

    #[test]
    fn destroyed_region_goes_dark() {
        let region = region();
        let ts = region.timestamper().next();
        region.put_from_load(&key(1), entry(1), ts, false, PutMode::Overwrite, &CMP);

        region.destroy();
        assert!(region.is_destroyed());
        assert!(region.get_entry(&key(1), None).is_none());

        let ts = region.timestamper().next();
        assert!(!region.put_from_load(&key(2), entry(1), ts, false, PutMode::Overwrite, &CMP));
        assert!(!region.install_new(&key(2), entry(1)));
    }

    #[test]
    fn install_new_only_fills_vacant_slots() {
        let region = region();
        assert!(region.install_new(&key(1), entry(1)));
        assert!(!region.install_new(&key(1), entry(2)));

        let _lock = region.lock(&key(2), None);
        assert!(!region.install_new(&key(2), entry(1)));
    }
}
