//! Dispatch planner benchmark
//!
//! Measures planning cost for inferred and explicit dispatches.
//!
//! Run with: cargo bench --bench plan_benchmark

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kernelkit_backend::{plan_dispatch, DeviceLimits};

fn bench_plan(c: &mut Criterion) {
    let limits = DeviceLimits::new(1024, 32, 65535).unwrap();
    let mut group = c.benchmark_group("plan_dispatch");
    group.throughput(Throughput::Elements(1));

    for buffers in [1usize, 4, 32] {
        let sizes: Vec<u64> = (0..buffers as u64).map(|i| 4096 * (i + 1)).collect();
        group.bench_with_input(BenchmarkId::new("inferred", buffers), &sizes, |b, sizes| {
            b.iter(|| plan_dispatch(black_box(&limits), None, black_box(sizes), None))
        });
    }

    let extents: &[u32] = &[2560, 1920];
    group.bench_function("explicit 2560x1920", |b| {
        b.iter(|| plan_dispatch(black_box(&limits), Some(black_box(extents)), &[], None))
    });

    group.finish();
}

criterion_group!(benches, bench_plan);
criterion_main!(benches);
