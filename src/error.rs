//! Error types for the regionkit library.
//!
//! ## Key Components
//!
//! - [`ConfigError`]: Returned when region or factory configuration is invalid
//!   (e.g. an access kind the backing store cannot support).
//! - [`StaleWriteError`]: Returned when an optimistic cache write loses a
//!   version race with a concurrent transaction.
//! - [`UnsupportedMutationError`]: Returned when a read-only region is asked
//!   to perform an update.
//! - [`StoreError`]: Returned when the backing store itself fails. Reads
//!   degrade to cache-miss instead of surfacing this; it is only visible from
//!   lifecycle calls.
//! - [`CacheError`]: Umbrella enum carried by fallible access-strategy calls.
//!
//! ## Propagation policy
//!
//! Failures that do not indicate a genuine data race are swallowed at the
//! region boundary and converted to cache-miss behavior. Races
//! ([`StaleWriteError`]) and configuration mistakes ([`ConfigError`])
//! propagate to the caller.
//!
//! ## Example Usage
//!
//! ```
//! use regionkit::error::CacheError;
//! use regionkit::access::AccessKind;
//!
//! // Unknown concurrency kinds are caught at parse time, not at runtime.
//! let err: CacheError = "write-behind".parse::<AccessKind>().unwrap_err().into();
//! assert!(err.to_string().contains("write-behind"));
//! ```

use std::fmt;

use crate::key::CacheKey;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when region or factory configuration is invalid.
///
/// Produced at construction time by [`RegionFactory`](crate::factory::RegionFactory)
/// builders and by [`AccessKind`](crate::access::AccessKind) parsing. Carries a
/// human-readable description of which parameter failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// StaleWriteError
// ---------------------------------------------------------------------------

/// Error returned when a cache write's version stamp is not newer than the
/// version already known for the key.
///
/// Equivalent to an optimistic-lock failure: two transactions raced on the
/// same row, and this one lost. The cache keeps the prior committed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleWriteError {
    key: CacheKey,
}

impl StaleWriteError {
    pub(crate) fn new(key: CacheKey) -> Self {
        Self { key }
    }

    /// The key whose write was rejected.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl fmt::Display for StaleWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stale write rejected for {}", self.key)
    }
}

impl std::error::Error for StaleWriteError {}

// ---------------------------------------------------------------------------
// UnsupportedMutationError
// ---------------------------------------------------------------------------

/// Error returned when a mutation is attempted against a read-only region.
///
/// Always fatal to the calling operation: immutable-by-contract data was
/// mutated, which is a usage error, never silently ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedMutationError {
    key: CacheKey,
    operation: &'static str,
}

impl UnsupportedMutationError {
    pub(crate) fn new(key: CacheKey, operation: &'static str) -> Self {
        Self { key, operation }
    }

    /// The key the mutation targeted.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// The rejected operation name.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl fmt::Display for UnsupportedMutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported mutation `{}` on read-only region entry {}",
            self.operation, self.key
        )
    }
}

impl std::error::Error for UnsupportedMutationError {}

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Error returned when the backing store is unreachable or failed.
///
/// Caching is best-effort: region reads convert this to a miss rather than
/// aborting the caller's database transaction. Only lifecycle calls
/// ([`RegionFactory::start`](crate::factory::RegionFactory::start)) surface it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError(String);

impl StoreError {
    /// Creates a new `StoreError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StoreError {}

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Umbrella error for fallible access-strategy operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// An optimistic write lost a version race.
    StaleWrite(StaleWriteError),
    /// A read-only region was asked to mutate an entry.
    UnsupportedMutation(UnsupportedMutationError),
    /// Invalid region or factory configuration.
    Config(ConfigError),
    /// The backing store failed during a lifecycle call.
    Store(StoreError),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::StaleWrite(e) => fmt::Display::fmt(e, f),
            CacheError::UnsupportedMutation(e) => fmt::Display::fmt(e, f),
            CacheError::Config(e) => fmt::Display::fmt(e, f),
            CacheError::Store(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::StaleWrite(e) => Some(e),
            CacheError::UnsupportedMutation(e) => Some(e),
            CacheError::Config(e) => Some(e),
            CacheError::Store(e) => Some(e),
        }
    }
}

impl From<StaleWriteError> for CacheError {
    fn from(e: StaleWriteError) -> Self {
        CacheError::StaleWrite(e)
    }
}

impl From<UnsupportedMutationError> for CacheError {
    fn from(e: UnsupportedMutationError) -> Self {
        CacheError::UnsupportedMutation(e)
    }
}

impl From<ConfigError> for CacheError {
    fn from(e: ConfigError) -> Self {
        CacheError::Config(e)
    }
}

impl From<StoreError> for CacheError {
    fn from(e: StoreError) -> Self {
        CacheError::Store(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
