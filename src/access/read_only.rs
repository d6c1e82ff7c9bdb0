//! Read-only strategy: write-once data, no locking.
//!
//! Entries are written exactly once, by the transaction that inserted the
//! row, so a cached value can never be stale relative to the store and no
//! concurrent-writer machinery is needed. Any attempt to update (or to
//! soft-lock, which announces an update) is a usage error and fails fast.

use std::sync::Arc;

use crate::error::{CacheError, UnsupportedMutationError};
use crate::key::{CacheEntry, CacheKey};
use crate::region::{PutMode, Region, SoftLock};
use crate::version::VersionComparator;

pub(crate) fn get(region: &Region, key: &CacheKey) -> Option<Arc<CacheEntry>> {
    region.get_entry(key, None)
}

pub(crate) fn put_from_load(
    region: &Region,
    comparator: &dyn VersionComparator,
    key: &CacheKey,
    entry: CacheEntry,
    txn_ts: u64,
    minimal_put: bool,
) -> bool {
    // Write-once: a present entry is by contract identical to the incoming
    // one, so there is never a reason to replace it.
    region.put_from_load(key, entry, txn_ts, minimal_put, PutMode::IfAbsent, comparator)
}

pub(crate) fn after_insert(region: &Region, key: &CacheKey, entry: CacheEntry) -> bool {
    region.install_new(key, entry)
}

pub(crate) fn lock_item(key: &CacheKey) -> Result<Option<SoftLock>, CacheError> {
    Err(UnsupportedMutationError::new(key.clone(), "lock").into())
}

pub(crate) fn update(key: &CacheKey) -> Result<bool, CacheError> {
    Err(UnsupportedMutationError::new(key.clone(), "update").into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{FieldValue, IdValue};
    use crate::store::map::ConcurrentMapStore;
    use crate::timestamp::Timestamper;
    use crate::version::StandardVersionComparator;

    fn region() -> Region {
        Region::new(
            "ro.entities",
            Arc::new(ConcurrentMapStore::new()),
            Arc::new(Timestamper::new()),
            4,
        )
    }

    fn key() -> CacheKey {
        CacheKey::new("Country", IdValue::I64(1))
    }

    fn entry(marker: i64) -> CacheEntry {
        CacheEntry::entity("Country", vec![FieldValue::I64(marker)], None)
    }

    #[test]
    fn first_insert_wins_forever() {
        let region = region();
        assert!(after_insert(&region, &key(), entry(1)));
        assert!(!after_insert(&region, &key(), entry(2)));

        let cached = get(&region, &key()).unwrap();
        assert_eq!(&*cached, &entry(1));
    }

    #[test]
    fn update_fails_fast() {
        let err = update(&key()).unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedMutation(_)));
    }

    #[test]
    fn lock_fails_fast() {
        let err = lock_item(&key()).unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedMutation(_)));
    }

    #[test]
    fn load_does_not_replace_present_entry() {
        let region = region();
        let ts = region.timestamper().next();
        assert!(put_from_load(
            &region,
            &StandardVersionComparator,
            &key(),
            entry(1),
            ts,
            false
        ));
        assert!(!put_from_load(
            &region,
            &StandardVersionComparator,
            &key(),
            entry(2),
            ts,
            false
        ));
        assert_eq!(&*get(&region, &key()).unwrap(), &entry(1));
    }
}
