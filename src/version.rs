//! Version stamps and the comparator seam.
//!
//! A [`Version`] is an opaque, comparable marker of how recent a cached
//! entry's source-of-truth state is. Comparison semantics are supplied per
//! entity/collection type by the external mapping layer through
//! [`VersionComparator`]; the access-strategy layer only calls the
//! comparator, it never defines comparison rules of its own.

use std::fmt;

/// Opaque version stamp attached to a cache entry.
///
/// A closed set of stamp kinds: monotonically increasing counters (signed or
/// unsigned) and timestamp stamps. What "newer" means for a given type is the
/// business of the [`VersionComparator`] configured for that type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    U64(u64),
    I64(i64),
    /// Timestamp stamp in [`Timestamper`](crate::timestamp::Timestamper) units.
    Ts(u64),
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::U64(v) => write!(f, "v{v}"),
            Version::I64(v) => write!(f, "v{v}"),
            Version::Ts(v) => write!(f, "ts{v}"),
        }
    }
}

/// Answers "is `candidate` newer than `current`" for one entity/collection type.
///
/// Implementations must be total and side-effect free; the cache calls them
/// under per-key critical sections.
pub trait VersionComparator: Send + Sync {
    fn is_newer(&self, candidate: &Version, current: &Version) -> bool;
}

/// Numeric same-kind comparison, the stock comparator.
///
/// Stamps of different kinds never satisfy `is_newer`: a mixed comparison
/// means the mapping layer changed versioning mid-flight, and the safe
/// answer is to keep what is cached.
///
/// # Example
///
/// ```
/// use regionkit::version::{StandardVersionComparator, Version, VersionComparator};
///
/// let cmp = StandardVersionComparator;
/// assert!(cmp.is_newer(&Version::U64(2), &Version::U64(1)));
/// assert!(!cmp.is_newer(&Version::U64(1), &Version::U64(1)));
/// assert!(!cmp.is_newer(&Version::U64(9), &Version::I64(1)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardVersionComparator;

impl VersionComparator for StandardVersionComparator {
    fn is_newer(&self, candidate: &Version, current: &Version) -> bool {
        match (candidate, current) {
            (Version::U64(a), Version::U64(b)) => a > b,
            (Version::I64(a), Version::I64(b)) => a > b,
            (Version::Ts(a), Version::Ts(b)) => a > b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_is_strict() {
        let cmp = StandardVersionComparator;
        assert!(cmp.is_newer(&Version::I64(5), &Version::I64(4)));
        assert!(!cmp.is_newer(&Version::I64(4), &Version::I64(4)));
        assert!(!cmp.is_newer(&Version::I64(3), &Version::I64(4)));
    }

    #[test]
    fn mixed_kinds_are_never_newer() {
        let cmp = StandardVersionComparator;
        assert!(!cmp.is_newer(&Version::Ts(100), &Version::U64(1)));
        assert!(!cmp.is_newer(&Version::U64(100), &Version::Ts(1)));
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Version::U64(3).to_string(), "v3");
        assert_eq!(Version::Ts(7).to_string(), "ts7");
    }
}
