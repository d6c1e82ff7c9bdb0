//! Cache keys and cached entry snapshots.
//!
//! ## Key Components
//!
//! - [`CacheKey`]: immutable composite of logical space, identifier value and
//!   optional tenant discriminator. Structural equality and hashing.
//! - [`IdValue`]: closed scalar enum for natural/surrogate identifiers.
//! - [`FieldValue`]: closed scalar enum for disassembled state values.
//! - [`CacheEntry`]: immutable snapshot of an entity's disassembled state or
//!   a collection's element list, plus an optional version stamp.
//!
//! Entries are snapshots, never live objects: they are assembled by the
//! external mapping layer from a fresh database read (or a flushed write) and
//! treated as opaque payloads by the cache. Nothing in this module is ever
//! mutated after construction.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::version::Version;

// ---------------------------------------------------------------------------
// IdValue
// ---------------------------------------------------------------------------

/// Identifier value inside a [`CacheKey`].
///
/// A closed set of scalar kinds plus composite identifiers. Floating-point
/// identifiers are deliberately unsupported: keys need total equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdValue {
    I64(i64),
    U64(u64),
    Str(Arc<str>),
    /// Composite identifier, ordered.
    Composite(Vec<IdValue>),
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdValue::I64(v) => write!(f, "{v}"),
            IdValue::U64(v) => write!(f, "{v}"),
            IdValue::Str(v) => f.write_str(v),
            IdValue::Composite(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            },
        }
    }
}

// ---------------------------------------------------------------------------
// CacheKey
// ---------------------------------------------------------------------------

/// Composite cache key: logical space + identifier + optional tenant.
///
/// The logical space is the entity type name or collection role the key
/// belongs to; two spaces never share entries even when identifier values
/// collide. Keys are immutable after construction.
///
/// # Example
///
/// ```
/// use regionkit::key::{CacheKey, IdValue};
///
/// let a = CacheKey::new("com.example.Order", IdValue::I64(7));
/// let b = CacheKey::new("com.example.Order", IdValue::I64(7));
/// let c = CacheKey::new("com.example.Invoice", IdValue::I64(7));
///
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    space: Arc<str>,
    id: IdValue,
    tenant: Option<Arc<str>>,
}

impl CacheKey {
    /// Creates a key for the given logical space and identifier.
    pub fn new(space: impl Into<Arc<str>>, id: IdValue) -> Self {
        Self {
            space: space.into(),
            id,
            tenant: None,
        }
    }

    /// Creates a tenant-discriminated key.
    ///
    /// Keys with different tenants never compare equal, even for the same
    /// space and identifier.
    ///
    /// ```
    /// use regionkit::key::{CacheKey, IdValue};
    ///
    /// let a = CacheKey::for_tenant("Order", IdValue::I64(1), "acme");
    /// let b = CacheKey::for_tenant("Order", IdValue::I64(1), "globex");
    /// assert_ne!(a, b);
    /// ```
    pub fn for_tenant(space: impl Into<Arc<str>>, id: IdValue, tenant: impl Into<Arc<str>>) -> Self {
        Self {
            space: space.into(),
            id,
            tenant: Some(tenant.into()),
        }
    }

    /// The logical space (entity type or collection role).
    pub fn space(&self) -> &str {
        &self.space
    }

    /// The identifier value.
    pub fn id(&self) -> &IdValue {
        &self.id
    }

    /// The tenant discriminator, if any.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.space, self.id)?;
        if let Some(tenant) = &self.tenant {
            write!(f, "@{tenant}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// A single disassembled state value.
///
/// The closed scalar set the external mapping layer disassembles entity and
/// collection state into. `F64` compares and hashes by bit pattern so values
/// can participate in query keys; `NaN == NaN` holds under that rule.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::I64(a), FieldValue::I64(b)) => a == b,
            (FieldValue::F64(a), FieldValue::F64(b)) => a.to_bits() == b.to_bits(),
            (FieldValue::Str(a), FieldValue::Str(b)) => a == b,
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            FieldValue::Null => {},
            FieldValue::Bool(v) => v.hash(state),
            FieldValue::I64(v) => v.hash(state),
            FieldValue::F64(v) => v.to_bits().hash(state),
            FieldValue::Str(v) => v.hash(state),
            FieldValue::Bytes(v) => v.hash(state),
        }
    }
}

// ---------------------------------------------------------------------------
// CacheEntry
// ---------------------------------------------------------------------------

/// Immutable snapshot of persisted object state.
///
/// Entity entries carry a flat list of field values plus a subclass
/// discriminator; collection entries carry an element snapshot plus the
/// owning identifier. Either kind may carry a version stamp; its absence
/// means "unversioned, treat as potentially stale" and shifts staleness
/// decisions to timestamps and locks.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Entity {
        /// Concrete subclass discriminator for polymorphic hierarchies.
        subclass: Arc<str>,
        /// Disassembled field values, in mapping order.
        state: Vec<FieldValue>,
        version: Option<Version>,
    },
    Collection {
        /// Identifier of the owning entity.
        owner: IdValue,
        /// Element snapshot, in collection order where one exists.
        elements: Vec<FieldValue>,
        version: Option<Version>,
    },
}

impl CacheEntry {
    /// Creates an entity-state snapshot.
    pub fn entity(
        subclass: impl Into<Arc<str>>,
        state: Vec<FieldValue>,
        version: Option<Version>,
    ) -> Self {
        CacheEntry::Entity {
            subclass: subclass.into(),
            state,
            version,
        }
    }

    /// Creates a collection-state snapshot.
    pub fn collection(owner: IdValue, elements: Vec<FieldValue>, version: Option<Version>) -> Self {
        CacheEntry::Collection {
            owner,
            elements,
            version,
        }
    }

    /// The entry's version stamp, if any.
    pub fn version(&self) -> Option<&Version> {
        match self {
            CacheEntry::Entity { version, .. } => version.as_ref(),
            CacheEntry::Collection { version, .. } => version.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn keys_compare_structurally() {
        let a = CacheKey::new("Order", IdValue::I64(1));
        let b = CacheKey::new("Order", IdValue::I64(1));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn keys_differ_by_space_id_and_tenant() {
        let base = CacheKey::new("Order", IdValue::I64(1));
        assert_ne!(base, CacheKey::new("Invoice", IdValue::I64(1)));
        assert_ne!(base, CacheKey::new("Order", IdValue::I64(2)));
        assert_ne!(base, CacheKey::for_tenant("Order", IdValue::I64(1), "acme"));
    }

    #[test]
    fn composite_ids_display_in_order() {
        let id = IdValue::Composite(vec![IdValue::Str("a".into()), IdValue::I64(2)]);
        let key = CacheKey::new("Pair", id);
        assert_eq!(key.to_string(), "Pair#(a,2)");
    }

    #[test]
    fn tenant_shows_in_display() {
        let key = CacheKey::for_tenant("Order", IdValue::I64(1), "acme");
        assert_eq!(key.to_string(), "Order#1@acme");
    }

    #[test]
    fn f64_fields_compare_by_bits() {
        assert_eq!(FieldValue::F64(f64::NAN), FieldValue::F64(f64::NAN));
        assert_ne!(FieldValue::F64(0.0), FieldValue::F64(-0.0));
        assert_eq!(
            hash_of(&FieldValue::F64(1.5)),
            hash_of(&FieldValue::F64(1.5))
        );
    }

    #[test]
    fn entry_exposes_version() {
        let entry = CacheEntry::entity("Order", vec![FieldValue::I64(1)], Some(Version::U64(3)));
        assert_eq!(entry.version(), Some(&Version::U64(3)));

        let unversioned = CacheEntry::collection(IdValue::I64(1), vec![], None);
        assert_eq!(unversioned.version(), None);
    }
}
