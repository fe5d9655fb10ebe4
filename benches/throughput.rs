//! Throughput Benchmark for ChronoKV
//!
//! This benchmark measures the performance of the store under various
//! workloads, including the two reclamation passes.

use bytes::Bytes;
use chronokv::storage::{Store, Ttl, TtlPolicy};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

fn populated(n: u64, ttl: Ttl) -> Store<Bytes, Bytes> {
    let store = Store::new();
    for i in 0..n {
        store.insert(
            Bytes::from(format!("key:{}", i)),
            Bytes::from(format!("value:{}", i)),
            ttl,
        );
    }
    store
}

/// Benchmark insert and update operations
fn bench_write(c: &mut Criterion) {
    let store = Store::new();

    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Elements(1));

    group.bench_function("insert", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            store.insert(key, Bytes::from("small_value"), Ttl::Never);
            i += 1;
        });
    });

    group.bench_function("insert_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("ttl:{}", i));
            store.insert(key, Bytes::from("small_value"), Ttl::After(Duration::from_secs(60)));
            i += 1;
        });
    });

    let hot = populated(10_000, Ttl::Never);
    group.bench_function("update", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 10_000));
            hot.update(&key, Bytes::from("updated"), TtlPolicy::KeepExisting);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark point and range reads
fn bench_read(c: &mut Criterion) {
    let store = populated(100_000, Ttl::Never);

    let mut group = c.benchmark_group("read");

    group.throughput(Throughput::Elements(1));
    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i % 100_000));
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("missing:{}", i));
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_by_order_10", |b| {
        b.iter(|| black_box(store.get_by_order(10, false)));
    });

    let start = SystemTime::UNIX_EPOCH;
    group.bench_function("get_by_time_range_all", |b| {
        b.iter(|| black_box(store.get_by_time_range(start, SystemTime::now(), true)));
    });

    group.finish();
}

/// Benchmark the reclamation passes on a store full of expired records
fn bench_reclaim(c: &mut Criterion) {
    let mut group = c.benchmark_group("reclaim");
    group.throughput(Throughput::Elements(10_000));

    group.bench_function("trim_expired", |b| {
        b.iter_batched(
            || populated(10_000, Ttl::At(SystemTime::UNIX_EPOCH)),
            |store| black_box(store.trim_expired()),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("full_sweep", |b| {
        b.iter_batched(
            || {
                let store = populated(10_000, Ttl::Never);
                for i in (0..10_000).step_by(2) {
                    store.erase_by_key(&Bytes::from(format!("key:{}", i)));
                }
                store
            },
            |store| black_box(store.full_sweep()),
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

/// Benchmark concurrent access from several threads
fn bench_concurrent(c: &mut Criterion) {
    let store = Arc::new(populated(10_000, Ttl::Never));

    let mut group = c.benchmark_group("concurrent");
    group.throughput(Throughput::Elements(4 * 1_000));

    group.bench_function("mixed_4_threads", |b| {
        b.iter(|| {
            std::thread::scope(|s| {
                for t in 0..4u64 {
                    let store = &store;
                    s.spawn(move || {
                        for i in 0..1_000u64 {
                            let key = Bytes::from(format!("key:{}", (t * 1_000 + i) % 10_000));
                            if i % 4 == 0 {
                                store.update(&key, Bytes::from("v"), TtlPolicy::KeepExisting);
                            } else {
                                black_box(store.get(&key));
                            }
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_reclaim, bench_concurrent);
criterion_main!(benches);
