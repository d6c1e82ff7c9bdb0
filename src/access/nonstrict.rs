//! Nonstrict read-write strategy: evict on write, zero locking.
//!
//! The same shape as read-write with the locking removed: an update evicts
//! the key immediately and the next read reloads from the authoritative
//! store. That trades a short staleness window (between the database commit
//! and the eviction landing) for zero per-write overhead. Loads always
//! install, last load wins, except that a remove always beats a load that
//! started before it, by invalidation-stamp ordering at the region.

use std::sync::Arc;

use crate::error::CacheError;
use crate::key::{CacheEntry, CacheKey};
use crate::region::{PutMode, Region};
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
    region.put_from_load(key, entry, txn_ts, minimal_put, PutMode::Overwrite, comparator)
}

pub(crate) fn update(region: &Region, key: &CacheKey) -> Result<bool, CacheError> {
    region.evict(key);
    Ok(false)
}

pub(crate) fn after_update(region: &Region, key: &CacheKey) -> Result<bool, CacheError> {
    // Evict again after commit: closes the window where a load that raced
    // the first eviction reinstalled the pre-update value.
    region.evict(key);
    Ok(false)
}

pub(crate) fn unlock_item(region: &Region, key: &CacheKey) {
    region.evict(key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{FieldValue, IdValue};
    use crate::store::map::ConcurrentMapStore;
    use crate::timestamp::Timestamper;
    use crate::version::StandardVersionComparator;

    const CMP: StandardVersionComparator = StandardVersionComparator;

    fn region() -> Region {
        Region::new(
            "nrw.entities",
            Arc::new(ConcurrentMapStore::new()),
            Arc::new(Timestamper::new()),
            4,
        )
    }

    fn key() -> CacheKey {
        CacheKey::new("Order", IdValue::I64(1))
    }

    fn entry(marker: i64) -> CacheEntry {
        CacheEntry::entity("Order", vec![FieldValue::I64(marker)], None)
    }

    #[test]
    fn update_makes_key_an_immediate_miss() {
        let region = region();
        let ts = region.timestamper().next();
        put_from_load(&region, &CMP, &key(), entry(1), ts, false);
        assert!(get(&region, &key()).is_some());

        update(&region, &key()).unwrap();
        assert!(get(&region, &key()).is_none());
    }

    #[test]
    fn last_load_wins_without_versions() {
        let region = region();
        let ts = region.timestamper().next();
        put_from_load(&region, &CMP, &key(), entry(1), ts, false);
        put_from_load(&region, &CMP, &key(), entry(2), ts, false);
        assert_eq!(&*get(&region, &key()).unwrap(), &entry(2));
    }

    #[test]
    fn remove_beats_load_started_before_it() {
        let region = region();
        let loader_ts = region.timestamper().next();
        update(&region, &key()).unwrap();

        assert!(!put_from_load(&region, &CMP, &key(), entry(1), loader_ts, false));
        assert!(get(&region, &key()).is_none());
    }

    #[test]
    fn load_after_eviction_repopulates() {
        let region = region();
        update(&region, &key()).unwrap();

        let fresh_ts = region.timestamper().next();
        assert!(put_from_load(&region, &CMP, &key(), entry(1), fresh_ts, false));
        assert!(get(&region, &key()).is_some());
    }
}
