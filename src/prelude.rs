pub use crate::access::{AccessKind, CollectionAccess, EntityAccess};
pub use crate::error::{
    CacheError, ConfigError, StaleWriteError, StoreError, UnsupportedMutationError,
};
pub use crate::factory::RegionFactory;
pub use crate::key::{CacheEntry, CacheKey, FieldValue, IdValue};
pub use crate::query::{QueryKey, QueryResultEntry, QueryResultsRegion};
pub use crate::region::{Region, RegionSnapshot, SoftLock};
pub use crate::store::{
    ConcurrentMapStore, KvStore, LocalBackend, ShardedMapStore, StoreBackend, TxLocalBackend,
};
pub use crate::timestamp::Timestamper;
pub use crate::timestamps::TimestampsRegion;
pub use crate::version::{StandardVersionComparator, Version, VersionComparator};
