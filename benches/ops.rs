//! Micro-operation benchmarks for the access strategies.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency (nanoseconds) for cache reads, loads and
//! the full lock/update round trip across the concurrency kinds under
//! identical conditions.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use regionkit::access::AccessKind;
use regionkit::factory::RegionFactory;
use regionkit::key::{CacheEntry, CacheKey, FieldValue, IdValue};
use regionkit::store::LocalBackend;
use regionkit::version::Version;

const KEYS: u64 = 16_384;
const OPS: u64 = 100_000;

fn started_factory() -> RegionFactory {
    let factory = RegionFactory::new(Arc::new(LocalBackend::default()));
    factory.start().unwrap();
    factory
}

fn key(id: u64) -> CacheKey {
    CacheKey::new("bench.Entity", IdValue::U64(id))
}

fn entry(version: u64) -> CacheEntry {
    CacheEntry::entity(
        "bench.Entity",
        vec![FieldValue::I64(version as i64)],
        Some(Version::U64(version)),
    )
}

// ============================================================================
// Get Hit Latency (ns/op)
// ============================================================================

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit_ns");
    group.throughput(Throughput::Elements(OPS));

    for kind in [
        AccessKind::ReadOnly,
        AccessKind::ReadWrite,
        AccessKind::NonstrictReadWrite,
    ] {
        group.bench_function(kind.as_str(), |b| {
            b.iter_custom(|iters| {
                let factory = started_factory();
                let access = factory.entity_access("entities", kind).unwrap();
                for id in 0..KEYS {
                    if kind == AccessKind::ReadOnly {
                        access.after_insert(&key(id), entry(1));
                    } else {
                        let ts = factory.timestamper().next();
                        access.put_from_load(&key(id), entry(1), ts, false);
                    }
                }
                let txn = factory.timestamper().next();
                let start = Instant::now();
                for _ in 0..iters {
                    for i in 0..OPS {
                        let id = i % KEYS;
                        black_box(access.get(&key(id), txn));
                    }
                }
                start.elapsed()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Put-From-Load Latency (ns/op)
// ============================================================================

fn bench_put_from_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_from_load_ns");
    group.throughput(Throughput::Elements(KEYS));

    for kind in [AccessKind::ReadWrite, AccessKind::NonstrictReadWrite] {
        group.bench_function(kind.as_str(), |b| {
            b.iter_custom(|iters| {
                let mut total = std::time::Duration::ZERO;
                for _ in 0..iters {
                    let factory = started_factory();
                    let access = factory.entity_access("entities", kind).unwrap();
                    let ts = factory.timestamper().next();
                    let start = Instant::now();
                    for id in 0..KEYS {
                        black_box(access.put_from_load(&key(id), entry(1), ts, false));
                    }
                    total += start.elapsed();
                }
                total
            })
        });
    }

    group.finish();
}

// ============================================================================
// Update Round-Trip Latency (ns/op)
// ============================================================================

fn bench_update_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_round_trip_ns");
    group.throughput(Throughput::Elements(OPS / 10));

    group.bench_function("read-write", |b| {
        b.iter_custom(|iters| {
            let factory = started_factory();
            let access = factory
                .entity_access("entities", AccessKind::ReadWrite)
                .unwrap();
            let ts = factory.timestamper().next();
            for id in 0..KEYS {
                access.put_from_load(&key(id), entry(1), ts, false);
            }
            let mut version = 1u64;
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS / 10 {
                    version += 1;
                    let id = i % KEYS;
                    let lock = access.lock_item(&key(id), None).unwrap().unwrap();
                    black_box(
                        access
                            .after_update(&key(id), entry(version), Some(lock))
                            .unwrap(),
                    );
                }
            }
            start.elapsed()
        })
    });

    group.bench_function("nonstrict-read-write", |b| {
        b.iter_custom(|iters| {
            let factory = started_factory();
            let access = factory
                .entity_access("entities", AccessKind::NonstrictReadWrite)
                .unwrap();
            let start = Instant::now();
            for _ in 0..iters {
                for i in 0..OPS / 10 {
                    let id = i % KEYS;
                    black_box(access.update(&key(id), entry(2), None, None).unwrap());
                }
            }
            start.elapsed()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_get_hit,
    bench_put_from_load,
    bench_update_round_trip
);
criterion_main!(benches);
