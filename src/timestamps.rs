//! Shared timestamps region.
//!
//! Records when each table-like "space" last changed, so query-result
//! entries can be checked for staleness. Writers call
//! [`pre_invalidate`](TimestampsRegion::pre_invalidate) before flushing a
//! change to a set of spaces, stamping them with a point in the future so
//! in-flight query results are refused for the whole flush window, and
//! [`invalidate`](TimestampsRegion::invalidate) once the outcome is known,
//! replacing the future stamp with a fresh one. Readers ask
//! [`up_to_date`](TimestampsRegion::up_to_date) whether a result created at
//! some stamp is still current for every space it touched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::store::traits::KvStore;
use crate::timestamp::{Timestamper, ONE_MS};

/// How far into the future a pre-invalidation stamp lands, in timestamp
/// units. Bounds the time a flush may take between pre-invalidation and
/// invalidation.
const PRE_INVALIDATION_GRACE: u64 = 60_000 * ONE_MS;

/// Region tracking the last-update stamp of every space.
pub struct TimestampsRegion {
    name: String,
    store: Arc<dyn KvStore<Arc<str>, u64>>,
    timestamper: Arc<Timestamper>,
    destroyed: AtomicBool,
}

impl TimestampsRegion {
    pub(crate) fn new(
        name: impl Into<String>,
        store: Arc<dyn KvStore<Arc<str>, u64>>,
        timestamper: Arc<Timestamper>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            timestamper,
            destroyed: AtomicBool::new(false),
        }
    }

    /// The region's qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stamps `spaces` as changing, ahead of the flush.
    ///
    /// The stamp lies in the future, so every query result validated during
    /// the flush window reads as stale. Returns the stamp written.
    pub fn pre_invalidate(&self, spaces: &[Arc<str>]) -> u64 {
        let stamp = self.timestamper.next() + PRE_INVALIDATION_GRACE;
        self.put_all(spaces, stamp);
        stamp
    }

    /// Stamps `spaces` as changed, after the flush completed.
    ///
    /// Replaces the pre-invalidation stamp with a present one; results
    /// created after this call validate again. Returns the stamp written.
    pub fn invalidate(&self, spaces: &[Arc<str>]) -> u64 {
        let stamp = self.timestamper.next();
        self.put_all(spaces, stamp);
        stamp
    }

    /// Whether a result created at `result_ts` is still current for every
    /// space in `spaces`.
    ///
    /// A space with no recorded stamp has never changed since the region
    /// came up and counts as current. A destroyed region validates nothing.
    pub fn up_to_date(&self, spaces: &[Arc<str>], result_ts: u64) -> bool {
        if self.destroyed.load(Ordering::Acquire) {
            return false;
        }
        spaces.iter().all(|space| match self.store.get(space) {
            Some(stamp) => *stamp < result_ts,
            None => true,
        })
    }

    /// The last-update stamp recorded for `space`, if any.
    pub fn last_update(&self, space: &Arc<str>) -> Option<u64> {
        self.store.get(space).map(|stamp| *stamp)
    }

    /// Drops every recorded stamp.
    pub fn evict_all(&self) {
        self.store.clear();
    }

    pub(crate) fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
        self.store.clear();
    }

    fn put_all(&self, spaces: &[Arc<str>], stamp: u64) {
        if self.destroyed.load(Ordering::Acquire) {
            return;
        }
        for space in spaces {
            self.store.put(space.clone(), Arc::new(stamp));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::map::ConcurrentMapStore;

    fn region() -> TimestampsRegion {
        TimestampsRegion::new(
            "test.timestamps",
            Arc::new(ConcurrentMapStore::new()),
            Arc::new(Timestamper::new()),
        )
    }

    fn spaces(names: &[&str]) -> Vec<Arc<str>> {
        names.iter().map(|n| Arc::from(*n)).collect()
    }

    #[test]
    fn untouched_spaces_are_current() {
        let region = region();
        let result_ts = 1;
        assert!(region.up_to_date(&spaces(&["orders"]), result_ts));
    }

    #[test]
    fn invalidation_stales_older_results() {
        let region = region();
        let result_ts = region.timestamper.next();
        region.invalidate(&spaces(&["orders"]));

        assert!(!region.up_to_date(&spaces(&["orders"]), result_ts));
        let fresh_ts = region.timestamper.next();
        assert!(region.up_to_date(&spaces(&["orders"]), fresh_ts));
    }

    #[test]
    fn pre_invalidation_stales_the_flush_window() {
        let region = region();
        region.pre_invalidate(&spaces(&["orders"]));

        // Even a result created "now" is refused until invalidate() lands.
        let during_flush = region.timestamper.next();
        assert!(!region.up_to_date(&spaces(&["orders"]), during_flush));

        region.invalidate(&spaces(&["orders"]));
        let after_flush = region.timestamper.next();
        assert!(region.up_to_date(&spaces(&["orders"]), after_flush));
    }

    #[test]
    fn one_stale_space_stales_the_result() {
        let region = region();
        let all = spaces(&["orders", "order_lines"]);
        let result_ts = region.timestamper.next();
        region.invalidate(&spaces(&["order_lines"]));

        assert!(!region.up_to_date(&all, result_ts));
    }
}
