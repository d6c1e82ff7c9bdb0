//! Process-wide monotonic timestamp source.
//!
//! Transactions, cached items and invalidation records are all ordered by
//! stamps drawn from one [`Timestamper`]. Stamps are wall-clock milliseconds
//! shifted left by [`COUNTER_BITS`], with the low bits acting as a
//! sub-millisecond counter, so up to 4096 distinct stamps fit in one
//! millisecond and the sequence is strictly increasing across threads even
//! when the clock stalls or steps backwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Low bits reserved for the sub-millisecond counter.
pub const COUNTER_BITS: u32 = 12;

/// One millisecond expressed in timestamp units.
pub const ONE_MS: u64 = 1 << COUNTER_BITS;

/// Strictly increasing timestamp source.
///
/// # Example
///
/// ```
/// use regionkit::timestamp::Timestamper;
///
/// let ts = Timestamper::new();
/// let a = ts.next();
/// let b = ts.next();
/// assert!(b > a);
/// ```
#[derive(Debug)]
pub struct Timestamper {
    last: AtomicU64,
}

impl Timestamper {
    /// Creates a timestamper seeded from the system clock.
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(wall_millis() << COUNTER_BITS),
        }
    }

    /// Returns the next stamp, strictly greater than every stamp returned
    /// before it from this instance.
    pub fn next(&self) -> u64 {
        let mut last = self.last.load(Ordering::Acquire);
        loop {
            let now = wall_millis() << COUNTER_BITS;
            let candidate = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return candidate,
                Err(observed) => last = observed,
            }
        }
    }
}

impl Default for Timestamper {
    fn default() -> Self {
        Self::new()
    }
}

fn wall_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
