//! Read-write strategy: optimistic, version-aware write-through.
//!
//! ## Write Protocol
//!
//! ```text
//!   writer                          cache                      database
//!     │  lock_item(k, version)        │                           │
//!     │ ─────────────────────────────►│ ITEM → LOCKED(1)          │
//!     │                               │ (prior kept, readers miss)│
//!     │  UPDATE row ... WHERE version ───────────────────────────►│
//!     │                               │                           │
//!     │  commit ──────────────────────────────────────────────────►
//!     │  after_update(k, entry, lock) │                           │
//!     │ ─────────────────────────────►│ version gate:             │
//!     │                               │  newer   → ITEM' installed│
//!     │                               │  stale   → prior restored,│
//!     │                               │            StaleWrite     │
//!     │                               │  racing  → evicted        │
//!     │                               │                           │
//!     │  (on failure: unlock_item)    │                           │
//!     │ ─────────────────────────────►│ LOCKED → evicted          │
//! ```
//!
//! Reads treat a locked key as a miss, so no transaction ever observes an
//! in-flight write, and a load racing a lock holder loses at the region's
//! put gate. All ordering across writers of one key is decided by version
//! stamps; the lock itself never blocks anyone.

use std::sync::Arc;

use crate::error::CacheError;
use crate::key::{CacheEntry, CacheKey};
use crate::region::{PutMode, Region, SoftLock, WriteOutcome};
use crate::version::{Version, VersionComparator};

pub(crate) fn get(region: &Region, key: &CacheKey, txn_ts: u64) -> Option<Arc<CacheEntry>> {
    region.get_entry(key, Some(txn_ts))
}

pub(crate) fn put_from_load(
    region: &Region,
    comparator: &dyn VersionComparator,
    key: &CacheKey,
    entry: CacheEntry,
    txn_ts: u64,
    minimal_put: bool,
) -> bool {
    region.put_from_load(key, entry, txn_ts, minimal_put, PutMode::IfNewer, comparator)
}

pub(crate) fn lock_item(
    region: &Region,
    key: &CacheKey,
    current_version: Option<Version>,
) -> Result<Option<SoftLock>, CacheError> {
    Ok(Some(region.lock(key, current_version)))
}

pub(crate) fn unlock_item(
    region: &Region,
    comparator: &dyn VersionComparator,
    key: &CacheKey,
    lock: Option<SoftLock>,
) {
    match lock {
        Some(lock) => {
            // Rollback path: never reinstall, outcome handled by the region.
            let _ = region.unlock(key, &lock, WriteOutcome::Failure, comparator);
        },
        // A missing handle means the caller lost track of its lock; the only
        // safe resolution is to drop the key.
        None => region.evict(key),
    }
}

pub(crate) fn after_insert(region: &Region, key: &CacheKey, entry: CacheEntry) -> bool {
    region.install_new(key, entry)
}

pub(crate) fn after_update(
    region: &Region,
    comparator: &dyn VersionComparator,
    key: &CacheKey,
    entry: CacheEntry,
    lock: Option<SoftLock>,
) -> Result<bool, CacheError> {
    let lock = match lock {
        Some(lock) => lock,
        None => {
            region.evict(key);
            return Ok(false);
        },
    };
    match region.unlock(key, &lock, WriteOutcome::Success(entry), comparator) {
        Ok(disposition) => Ok(disposition == crate::region::UnlockDisposition::Installed),
        Err(stale) => Err(stale.into()),
    }
}
