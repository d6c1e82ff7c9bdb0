//! Region factory: lifecycle and wiring.
//!
//! One [`RegionFactory`] owns one backing-store handle and everything built
//! from it. `start` and `stop` bracket the factory's lifetime; every region
//! it built becomes unusable after `stop`. The factory is an explicitly
//! constructed, explicitly owned value. Pass it to whatever needs it; there
//! is no ambient global state anywhere in the crate.
//!
//! ```
//! use std::sync::Arc;
//! use regionkit::access::AccessKind;
//! use regionkit::factory::RegionFactory;
//! use regionkit::store::LocalBackend;
//!
//! let factory = RegionFactory::new(Arc::new(LocalBackend::default()));
//! factory.start().unwrap();
//!
//! let orders = factory
//!     .entity_access("orders", AccessKind::ReadWrite)
//!     .unwrap();
//! assert_eq!(orders.region().name(), "orders");
//!
//! factory.stop();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::access::{AccessInner, AccessKind, CollectionAccess, EntityAccess, TransactionalPolicy};
use crate::error::{CacheError, ConfigError};
use crate::query::QueryResultsRegion;
use crate::region::Region;
use crate::store::traits::StoreBackend;
use crate::timestamp::Timestamper;
use crate::timestamps::TimestampsRegion;
use crate::version::{StandardVersionComparator, VersionComparator};

/// Lock stripes per region. Bounds contention between writers of distinct
/// keys; readers never touch a stripe.
const REGION_STRIPES: usize = 64;

/// Name of the shared timestamps region, before prefixing.
const TIMESTAMPS_REGION_NAME: &str = "timestamps";

/// Builds regions and access strategies over one backing store.
pub struct RegionFactory {
    backend: Arc<dyn StoreBackend>,
    prefix: Option<String>,
    timestamper: Arc<Timestamper>,
    timestamps: Mutex<Option<Arc<TimestampsRegion>>>,
    regions: Mutex<Vec<Arc<Region>>>,
    query_regions: Mutex<Vec<Arc<QueryResultsRegion>>>,
    started: AtomicBool,
}

impl RegionFactory {
    /// Creates a factory over `backend` with no region-name prefix.
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self::with_prefix(backend, None)
    }

    /// Creates a factory whose region names are prefixed with `prefix.`.
    pub fn with_prefix(backend: Arc<dyn StoreBackend>, prefix: Option<&str>) -> Self {
        Self {
            backend,
            prefix: prefix.map(str::to_owned),
            timestamper: Arc::new(Timestamper::new()),
            timestamps: Mutex::new(None),
            regions: Mutex::new(Vec::new()),
            query_regions: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Starts the factory: brings the backend up and creates the shared
    /// timestamps region. Building regions before `start` is a
    /// configuration error.
    pub fn start(&self) -> Result<(), CacheError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ConfigError::new("region factory already started").into());
        }
        if let Err(err) = self.backend.start() {
            self.started.store(false, Ordering::Release);
            return Err(CacheError::Store(err));
        }
        let name = self.qualified(TIMESTAMPS_REGION_NAME);
        let store = self.backend.timestamp_store(&name);
        *self.timestamps.lock() = Some(Arc::new(TimestampsRegion::new(
            name,
            store,
            self.timestamper.clone(),
        )));
        Ok(())
    }

    /// Stops the factory: destroys every region it built and tears the
    /// backend down. Idempotent.
    pub fn stop(&self) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        for region in self.regions.lock().drain(..) {
            region.destroy();
        }
        for region in self.query_regions.lock().drain(..) {
            region.destroy();
        }
        if let Some(timestamps) = self.timestamps.lock().take() {
            timestamps.destroy();
        }
        self.backend.stop();
    }

    /// Whether the factory is between `start` and `stop`.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// The factory-wide timestamp source. Transaction start stamps passed to
    /// access-strategy calls must be drawn from here.
    pub fn timestamper(&self) -> &Arc<Timestamper> {
        &self.timestamper
    }

    /// The shared timestamps region.
    pub fn timestamps(&self) -> Result<Arc<TimestampsRegion>, CacheError> {
        self.ensure_started()?;
        Ok(self
            .timestamps
            .lock()
            .clone()
            .expect("timestamps region exists while started"))
    }

    /// Builds the access strategy for an entity region, with the stock
    /// version comparator.
    pub fn entity_access(
        &self,
        region_name: &str,
        kind: AccessKind,
    ) -> Result<EntityAccess, CacheError> {
        self.entity_access_with_comparator(region_name, kind, Arc::new(StandardVersionComparator))
    }

    /// Builds the access strategy for an entity region with the comparator
    /// the mapping layer supplies for that entity type.
    pub fn entity_access_with_comparator(
        &self,
        region_name: &str,
        kind: AccessKind,
        comparator: Arc<dyn VersionComparator>,
    ) -> Result<EntityAccess, CacheError> {
        let (region, inner) = self.build_region(region_name, kind)?;
        Ok(EntityAccess::new(region, comparator, inner))
    }

    /// Builds the access strategy for a collection region, with the stock
    /// version comparator.
    pub fn collection_access(
        &self,
        region_name: &str,
        kind: AccessKind,
    ) -> Result<CollectionAccess, CacheError> {
        self.collection_access_with_comparator(
            region_name,
            kind,
            Arc::new(StandardVersionComparator),
        )
    }

    /// Builds the access strategy for a collection region with the
    /// comparator the mapping layer supplies for that collection role.
    pub fn collection_access_with_comparator(
        &self,
        region_name: &str,
        kind: AccessKind,
        comparator: Arc<dyn VersionComparator>,
    ) -> Result<CollectionAccess, CacheError> {
        let (region, inner) = self.build_region(region_name, kind)?;
        Ok(CollectionAccess::new(region, comparator, inner))
    }

    /// Builds a query-result region validated against the shared timestamps
    /// region.
    pub fn query_results(&self, region_name: &str) -> Result<Arc<QueryResultsRegion>, CacheError> {
        let timestamps = self.timestamps()?;
        let name = self.qualified(region_name);
        let store = self.backend.query_store(&name);
        let region = Arc::new(QueryResultsRegion::new(
            name,
            store,
            timestamps,
            self.timestamper.clone(),
        ));
        self.query_regions.lock().push(region.clone());
        Ok(region)
    }

    fn build_region(
        &self,
        region_name: &str,
        kind: AccessKind,
    ) -> Result<(Arc<Region>, AccessInner), CacheError> {
        self.ensure_started()?;
        let name = self.qualified(region_name);
        let (store, inner) = match kind {
            AccessKind::ReadOnly => (self.backend.entry_store(&name), AccessInner::ReadOnly),
            AccessKind::ReadWrite => (self.backend.entry_store(&name), AccessInner::ReadWrite),
            AccessKind::NonstrictReadWrite => {
                (self.backend.entry_store(&name), AccessInner::Nonstrict)
            },
            AccessKind::Transactional => {
                let (store, tx) =
                    self.backend
                        .transactional_entry_store(&name)
                        .ok_or_else(|| {
                            ConfigError::new(format!(
                                "backing store for region `{name}` has no native transactions; \
                                 the transactional concurrency kind is unavailable"
                            ))
                        })?;
                (store, AccessInner::Transactional(TransactionalPolicy::new(tx)))
            },
        };
        let region = Arc::new(Region::new(
            name,
            store,
            self.timestamper.clone(),
            REGION_STRIPES,
        ));
        self.regions.lock().push(region.clone());
        Ok((region, inner))
    }

    fn ensure_started(&self) -> Result<(), ConfigError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(ConfigError::new("region factory not started"))
        }
    }

    fn qualified(&self, region_name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}.{region_name}"),
            None => region_name.to_owned(),
        }
    }
}

impl Drop for RegionFactory {
    fn drop(&mut self) {
        self.stop();
    }
}
