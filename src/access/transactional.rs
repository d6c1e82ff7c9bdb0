//! Transactional strategy: write visibility delegated to the backing store.
//!
//! Only available when the backing store has native transactions (a
//! configuration-time check in the factory, never a runtime fallback). The
//! strategy's job narrows to translating `insert`/`update`/`remove` into
//! store transactional operations and forwarding the before/after-completion
//! notifications that the transaction driver delivers at commit or rollback.
//! No soft locks: the store's transaction buffer keeps uncommitted writes
//! invisible, and a rollback discards them without the cache ever seeing
//! them.

use std::sync::Arc;

use crate::error::CacheError;
use crate::key::{CacheEntry, CacheKey};
use crate::region::{ItemSnapshot, PutMode, Region, Slot};
use crate::store::traits::{TransactionalStore, TxToken};
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
    // Loads bypass the transaction buffer: they install committed state read
    // from the authoritative store, which is safe to share immediately.
    region.put_from_load(key, entry, txn_ts, minimal_put, PutMode::IfNewer, comparator)
}

/// Write-path delegate bound to one transaction-capable store.
pub(crate) struct TransactionalPolicy {
    tx: Arc<dyn TransactionalStore<CacheKey, Slot>>,
}

impl TransactionalPolicy {
    pub(crate) fn new(tx: Arc<dyn TransactionalStore<CacheKey, Slot>>) -> Self {
        Self { tx }
    }

    pub(crate) fn begin(&self) -> TxToken {
        self.tx.begin()
    }

    pub(crate) fn insert(&self, region: &Region, key: &CacheKey, entry: CacheEntry) -> bool {
        self.enqueue_put(region, key, entry);
        true
    }

    pub(crate) fn update(
        &self,
        region: &Region,
        comparator: &dyn VersionComparator,
        key: &CacheKey,
        entry: CacheEntry,
    ) -> Result<bool, CacheError> {
        // Version gate against the committed state: the write buffer must
        // never carry an entry that would regress the cached version.
        if let Some(current) = region.get_entry(key, None) {
            if let (Some(candidate), Some(cached)) = (entry.version(), current.version()) {
                if !comparator.is_newer(candidate, cached) {
                    return Err(crate::error::StaleWriteError::new(key.clone()).into());
                }
            }
        }
        self.enqueue_put(region, key, entry);
        Ok(true)
    }

    pub(crate) fn remove(&self, key: &CacheKey) {
        self.tx.remove_tx(key.clone());
    }

    pub(crate) fn before_completion(&self) {
        self.tx.before_completion();
    }

    pub(crate) fn after_completion(&self, successful: bool) {
        self.tx.after_completion(successful);
    }

    fn enqueue_put(&self, region: &Region, key: &CacheKey, entry: CacheEntry) {
        self.tx.put_tx(
            key.clone(),
            Arc::new(Slot::Item(ItemSnapshot {
                entry: Arc::new(entry),
                cached_at: region.timestamper().next(),
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{FieldValue, IdValue};
    use crate::store::traits::StoreBackend;
    use crate::store::tx::TxLocalBackend;
    use crate::timestamp::Timestamper;
    use crate::version::{StandardVersionComparator, Version};

    const CMP: StandardVersionComparator = StandardVersionComparator;

    fn setup() -> (Region, TransactionalPolicy) {
        let backend = TxLocalBackend::new(4);
        let (store, tx) = backend.transactional_entry_store("tx.entities").unwrap();
        let region = Region::new("tx.entities", store, Arc::new(Timestamper::new()), 4);
        (region, TransactionalPolicy::new(tx))
    }

    fn key() -> CacheKey {
        CacheKey::new("Order", IdValue::I64(1))
    }

    fn entry(version: u64) -> CacheEntry {
        CacheEntry::entity(
            "Order",
            vec![FieldValue::I64(version as i64)],
            Some(Version::U64(version)),
        )
    }

    #[test]
    fn insert_visible_only_after_commit() {
        let (region, policy) = setup();
        policy.begin();
        policy.insert(&region, &key(), entry(1));

        assert!(get(&region, &key()).is_none());

        policy.before_completion();
        policy.after_completion(true);
        assert!(get(&region, &key()).is_some());
    }

    #[test]
    fn rollback_leaves_no_trace() {
        let (region, policy) = setup();
        let ts = region.timestamper().next();
        put_from_load(&region, &CMP, &key(), entry(1), ts, false);

        policy.begin();
        policy.update(&region, &CMP, &key(), entry(2)).unwrap();
        policy.remove(&key());
        policy.after_completion(false);

        let cached = get(&region, &key()).unwrap();
        assert_eq!(cached.version(), Some(&Version::U64(1)));
    }

    #[test]
    fn stale_update_rejected_before_buffering() {
        let (region, policy) = setup();
        let ts = region.timestamper().next();
        put_from_load(&region, &CMP, &key(), entry(5), ts, false);

        policy.begin();
        let err = policy.update(&region, &CMP, &key(), entry(4)).unwrap_err();
        assert!(matches!(err, CacheError::StaleWrite(_)));
        policy.after_completion(true);

        let cached = get(&region, &key()).unwrap();
        assert_eq!(cached.version(), Some(&Version::U64(5)));
    }

    #[test]
    fn committed_remove_applies() {
        let (region, policy) = setup();
        let ts = region.timestamper().next();
        put_from_load(&region, &CMP, &key(), entry(1), ts, false);

        policy.begin();
        policy.remove(&key());
        policy.after_completion(true);

        assert!(get(&region, &key()).is_none());
    }
}
