//! Raw backend throughput, measured through the `Allocator` contract.
//!
//! These bypass the harness entirely: no sampler, no per-op timer, just the
//! backend calls criterion can see. Useful for checking that the dynamic
//! dispatch in front of each backend stays in the noise.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::ptr::NonNull;
use std::sync::Arc;

use allocbench::Allocator;
use allocbench::backend;
use allocbench::workloads;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn alloc_release(allocator: &dyn Allocator, size: usize) {
    let ptr = allocator.allocate(size).expect("allocate");
    unsafe { allocator.release(black_box(ptr)) };
}

/// Allocate N blocks, then free them all (LIFO order).
fn alloc_n_then_release(allocator: &dyn Allocator, size: usize, n: usize) {
    let mut ptrs: Vec<NonNull<u8>> = Vec::with_capacity(n);
    for _ in 0..n {
        ptrs.push(allocator.allocate(size).expect("allocate"));
    }
    for ptr in ptrs.into_iter().rev() {
        unsafe { allocator.release(ptr) };
    }
}

/// Allocate a batch, free half, repeat.
fn churn(allocator: &dyn Allocator, size: usize, rounds: usize) {
    let mut live: Vec<NonNull<u8>> = Vec::new();
    for _ in 0..rounds {
        for _ in 0..10 {
            live.push(allocator.allocate(size).expect("allocate"));
        }
        let drain = live.len() / 2;
        for ptr in live.drain(live.len() - drain..) {
            unsafe { allocator.release(ptr) };
        }
    }
    for ptr in live {
        unsafe { allocator.release(ptr) };
    }
}

fn grow(allocator: &dyn Allocator, final_size: usize) {
    let mut size = 16;
    let mut ptr = allocator.allocate(size).expect("allocate");
    while size < final_size {
        size *= 2;
        ptr = unsafe { allocator.reallocate(ptr, size) }.expect("reallocate");
    }
    unsafe { allocator.release(ptr) };
}

fn backends() -> Vec<Arc<dyn Allocator>> {
    backend::builtin()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_single_alloc_release(c: &mut Criterion) {
    let sizes: &[usize] = &[8, 64, 256, 1024, 4096, 65536];
    let mut group = c.benchmark_group("single_alloc_release");
    group.throughput(Throughput::Elements(1));

    for backend in backends() {
        for &size in sizes {
            group.bench_with_input(BenchmarkId::new(backend.name(), size), &size, |b, &size| {
                b.iter(|| alloc_release(backend.as_ref(), black_box(size)))
            });
        }
    }
    group.finish();
}

fn bench_batch_alloc_release(c: &mut Criterion) {
    let n = 1000;
    let sizes: &[usize] = &[16, 64, 256, 1024];
    let mut group = c.benchmark_group("batch_1000");
    group.throughput(Throughput::Elements(n as u64));

    for backend in backends() {
        for &size in sizes {
            group.bench_with_input(BenchmarkId::new(backend.name(), size), &size, |b, &size| {
                b.iter(|| alloc_n_then_release(backend.as_ref(), size, black_box(n)))
            });
        }
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    let rounds = 1000;
    let mut group = c.benchmark_group("churn");
    group.throughput(Throughput::Elements(rounds as u64 * 10));

    for backend in backends() {
        group.bench_function(backend.name(), |b| {
            b.iter(|| churn(backend.as_ref(), 64, black_box(rounds)))
        });
    }
    group.finish();
}

fn bench_realloc_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("realloc_growth_1mb");
    for backend in backends() {
        group.bench_function(backend.name(), |b| {
            b.iter(|| grow(backend.as_ref(), black_box(1 << 20)))
        });
    }
    group.finish();
}

/// One full generator run per iteration, to keep an eye on harness overhead.
fn bench_workloads(c: &mut Criterion) {
    let cfg = allocbench::RunConfig::default().with_iterations(10_000);
    let mut group = c.benchmark_group("workload_10k");
    group.sample_size(20);

    for bench in workloads::builtin()
        .into_iter()
        .filter(|b| matches!(b.name.as_str(), "sequential_alloc" | "random_alloc" | "larson"))
    {
        for backend in backends() {
            group.bench_function(BenchmarkId::new(&bench.name, backend.name()), |b| {
                b.iter(|| {
                    let mut result = allocbench::BenchResult::new();
                    (bench.run)(backend.as_ref(), &mut result, &cfg).expect("workload");
                    black_box(result.operations_count)
                })
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_single_alloc_release,
    bench_batch_alloc_release,
    bench_churn,
    bench_realloc_growth,
    bench_workloads,
);
criterion_main!(benches);
