//! Single-threaded micro workloads over raw allocate/release calls.

use crate::backend::{AllocOp, Allocator};
use crate::config::RunConfig;
use crate::error::{BenchError, bookkeeping};
use crate::registry::Benchmark;
use crate::result::{BenchResult, METRIC_NA};
use crate::rng::{XorShift32, random_size, random_slot};
use crate::stats::{LatencySamples, mean_ns, per_second};
use crate::timed;
use crate::timer::Timer;

use super::{LiveBlocks, draw_sizes};

/// Alignments cycled through by the aligned workload.
pub const ALIGNMENTS: [usize; 8] = [16, 32, 64, 128, 256, 512, 1024, 4096];

/// Aligned requests are assumed costlier, so the run is a tenth as long
/// (but never shorter than this, unless asked for zero iterations).
pub const MIN_ALIGNED_ITERATIONS: usize = 100;

pub fn benchmarks() -> Vec<Benchmark> {
    vec![
        Benchmark::new(
            "sequential_alloc",
            "Sequential allocation and deallocation",
            sequential,
        ),
        Benchmark::new("random_alloc", "Random size allocations", random_churn),
        Benchmark::new("realloc", "Reallocation stress test", realloc),
        Benchmark::new("aligned_alloc", "Aligned allocation benchmark", aligned),
        Benchmark::new(
            "alloc_free_immediate",
            "Allocate and immediately free",
            immediate,
        ),
    ]
}

/// Allocate `n` random-sized blocks timing each, then free them all as one
/// timed sweep.
pub fn sequential(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let mut rng = XorShift32::new(cfg.seed);
    let sizes = draw_sizes(&mut rng, n, cfg.min_size, cfg.max_size)?;
    let mut live = LiveBlocks::new(alloc, n)?;
    let mut samples = LatencySamples::with_capacity(n)?;
    let mut timer = Timer::new();
    let mut requested = 0u64;
    let mut consumed = 0u64;

    for (slot, &size) in sizes.iter().enumerate() {
        let (ptr, ns) = timed!(timer, alloc.allocate(size));
        let ptr = ptr.ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::Allocate, size))?;
        samples.record(ns);
        live.put(slot, ptr);
        requested += size as u64;
        consumed += unsafe { alloc.consumed_size(ptr, size) } as u64;
    }

    let alloc_ns = samples.total_ns();
    timer.start();
    for slot in 0..n {
        if let Some(ptr) = live.take(slot) {
            unsafe { alloc.release(ptr) };
        }
    }
    let free_ns = timer.stop();

    let ops = n as u64;
    result.operations_count = 2 * ops;
    result.thread_count = 1;
    result.alloc_ops_per_sec = per_second(ops, alloc_ns);
    result.free_ops_per_sec = per_second(ops, free_ns);
    result.total_ops_per_sec = per_second(2 * ops, alloc_ns + free_ns);
    result.apply_latency(&samples.summarize());
    result.total_requested_bytes = requested;
    result.total_allocated_bytes = consumed;
    Ok(())
}

/// Steady-state churn over `n / 4` slots: pick a slot, free whatever lives
/// there, allocate a new block into it.
pub fn random_churn(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let slots = (n / 4).max(1);
    let mut rng = XorShift32::new(cfg.seed);

    let mut decisions: Vec<(usize, usize)> = bookkeeping(n)?;
    decisions.extend((0..n).map(|_| {
        let slot = random_slot(&mut rng, slots);
        (slot, random_size(&mut rng, cfg.min_size, cfg.max_size))
    }));

    let mut live = LiveBlocks::new(alloc, slots)?;
    let mut samples = LatencySamples::with_capacity(n)?;
    let mut timer = Timer::new();
    let (mut frees, mut free_ns) = (0u64, 0u64);
    let mut requested = 0u64;
    let mut consumed = 0u64;

    for &(slot, size) in &decisions {
        if let Some(old) = live.take(slot) {
            let ((), ns) = timed!(timer, unsafe { alloc.release(old) });
            frees += 1;
            free_ns += ns;
        }
        let (ptr, ns) = timed!(timer, alloc.allocate(size));
        let ptr = ptr.ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::Allocate, size))?;
        samples.record(ns);
        live.put(slot, ptr);
        requested += size as u64;
        consumed += unsafe { alloc.consumed_size(ptr, size) } as u64;
    }
    live.release_all();

    let allocs = samples.len() as u64;
    let alloc_ns = samples.total_ns();
    result.operations_count = allocs + frees;
    result.thread_count = 1;
    result.alloc_ops_per_sec = per_second(allocs, alloc_ns);
    result.free_ops_per_sec = per_second(frees, free_ns);
    result.total_ops_per_sec = per_second(allocs + frees, alloc_ns + free_ns);
    result.apply_latency(&samples.summarize());
    result.total_requested_bytes = requested;
    result.total_allocated_bytes = consumed;
    Ok(())
}

/// Grow and shrink one block through `n` reallocations.
///
/// Requested bytes count growth only; a shrink contributes nothing. The
/// latency fields describe the reallocations.
pub fn realloc(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let mut rng = XorShift32::new(cfg.seed);
    let sizes = draw_sizes(&mut rng, n, cfg.min_size, cfg.max_size)?;
    let mut samples = LatencySamples::with_capacity(n)?;
    let mut timer = Timer::new();

    let mut live = LiveBlocks::new(alloc, 1)?;
    let first = alloc
        .allocate(cfg.min_size)
        .ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::Allocate, cfg.min_size))?;
    live.put(0, first);

    let mut current_size = cfg.min_size;
    let mut current_consumed = unsafe { alloc.consumed_size(first, current_size) };
    let mut requested = current_size as u64;
    let mut consumed = current_consumed as u64;

    for &size in &sizes {
        let Some(ptr) = live.take(0) else { break };
        let (moved, ns) = timed!(timer, unsafe { alloc.reallocate(ptr, size) });
        let Some(moved) = moved else {
            // The original block is still ours; let the guard free it.
            live.put(0, ptr);
            return Err(BenchError::allocation_failed(alloc, AllocOp::Reallocate, size));
        };
        live.put(0, moved);
        samples.record(ns);

        requested += size.saturating_sub(current_size) as u64;
        let now_consumed = unsafe { alloc.consumed_size(moved, size) };
        consumed += now_consumed.saturating_sub(current_consumed) as u64;
        current_size = size;
        current_consumed = now_consumed;
    }
    live.release_all();

    let reallocs = samples.len() as u64;
    result.operations_count = n as u64 + 2;
    result.thread_count = 1;
    result.realloc_ops_per_sec = per_second(reallocs, samples.total_ns());
    result.total_ops_per_sec = result.realloc_ops_per_sec;
    result.apply_latency(&samples.summarize());
    result.total_requested_bytes = requested;
    result.total_allocated_bytes = consumed;
    result.supply_fragmentation(METRIC_NA);
    Ok(())
}

/// Number of aligned requests for a configured iteration count.
pub fn aligned_iterations(iterations: usize) -> usize {
    if iterations == 0 {
        0
    } else {
        (iterations / 10).max(MIN_ALIGNED_ITERATIONS)
    }
}

/// Random-sized blocks at alignments drawn from [`ALIGNMENTS`], all kept
/// live, then released through `aligned_release`.
pub fn aligned(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = aligned_iterations(cfg.iterations);
    let mut rng = XorShift32::new(cfg.seed);

    let mut requests: Vec<(usize, usize)> = bookkeeping(n)?;
    requests.extend((0..n).map(|_| {
        let size = random_size(&mut rng, cfg.min_size, cfg.max_size);
        (ALIGNMENTS[random_slot(&mut rng, ALIGNMENTS.len())], size)
    }));

    let mut live = LiveBlocks::aligned(alloc, n)?;
    let mut samples = LatencySamples::with_capacity(n)?;
    let mut timer = Timer::new();
    let mut requested = 0u64;
    let mut consumed = 0u64;

    for (slot, &(align, size)) in requests.iter().enumerate() {
        let (ptr, ns) = timed!(timer, alloc.aligned_allocate(align, size));
        let ptr = ptr
            .ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::AlignedAllocate, size))?;
        samples.record(ns);
        live.put(slot, ptr);
        requested += size as u64;
        consumed += unsafe { alloc.consumed_size(ptr, size) } as u64;
    }

    let alloc_ns = samples.total_ns();
    timer.start();
    for slot in 0..n {
        if let Some(ptr) = live.take(slot) {
            unsafe { alloc.aligned_release(ptr) };
        }
    }
    let free_ns = timer.stop();

    let ops = n as u64;
    result.operations_count = 2 * ops;
    result.thread_count = 1;
    result.alloc_ops_per_sec = per_second(ops, alloc_ns);
    result.free_ops_per_sec = per_second(ops, free_ns);
    result.total_ops_per_sec = per_second(2 * ops, alloc_ns + free_ns);
    result.apply_latency(&samples.summarize());
    result.total_requested_bytes = requested;
    result.total_allocated_bytes = consumed;
    result.supply_fragmentation(METRIC_NA);
    Ok(())
}

/// Allocate and free each block straight away; no working set.
///
/// Only the mean allocate latency is reported; no per-allocation
/// distribution is kept. Free time feeds the free and total rates.
pub fn immediate(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let mut rng = XorShift32::new(cfg.seed);
    let sizes = draw_sizes(&mut rng, n, cfg.min_size, cfg.max_size)?;
    let mut timer = Timer::new();
    let (mut alloc_ns, mut free_ns) = (0u64, 0u64);
    let mut requested = 0u64;
    let mut consumed = 0u64;

    for &size in &sizes {
        let (ptr, ns) = timed!(timer, alloc.allocate(size));
        let ptr = ptr.ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::Allocate, size))?;
        alloc_ns += ns;
        requested += size as u64;
        consumed += unsafe { alloc.consumed_size(ptr, size) } as u64;
        let ((), ns) = timed!(timer, unsafe { alloc.release(ptr) });
        free_ns += ns;
    }

    let ops = n as u64;
    result.operations_count = 2 * ops;
    result.thread_count = 1;
    result.alloc_ops_per_sec = per_second(ops, alloc_ns);
    result.free_ops_per_sec = per_second(ops, free_ns);
    result.total_ops_per_sec = per_second(2 * ops, alloc_ns + free_ns);
    result.avg_alloc_time_ns = mean_ns(alloc_ns, ops);
    result.total_requested_bytes = requested;
    result.total_allocated_bytes = consumed;
    result.supply_fragmentation(METRIC_NA);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::ptr::NonNull;

    use super::*;
    use crate::backend::{SystemAllocator, TrackingAllocator};
    use crate::result::is_na;

    fn small() -> RunConfig {
        RunConfig::default().with_iterations(2000).with_size_range(8, 512)
    }

    #[test]
    fn test_sequential_counts() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut r = BenchResult::new();
        sequential(&t, &mut r, &small()).unwrap();
        assert_eq!(r.operations_count, 4000);
        let snap = t.snapshot();
        assert_eq!((snap.allocs, snap.frees, snap.live_blocks), (2000, 2000, 0));
        assert_eq!(r.total_requested_bytes, snap.requested_bytes);
        assert!(r.total_allocated_bytes >= r.total_requested_bytes);
        assert!(r.min_alloc_time_ns <= r.p50_alloc_time_ns);
        assert!(r.p99_alloc_time_ns <= r.max_alloc_time_ns);
    }

    #[test]
    fn test_random_churn_frees_everything() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut r = BenchResult::new();
        random_churn(&t, &mut r, &small()).unwrap();
        let snap = t.snapshot();
        assert_eq!(snap.allocs, 2000);
        assert_eq!(snap.live_blocks, 0);
        // 500 slots: at most 500 allocations found their slot empty.
        assert!(snap.frees >= 2000);
        let timed_frees = r.operations_count - snap.allocs;
        assert!(timed_frees >= 2000 - 500);
        // Untimed frees are the blocks left standing at the end.
        assert!(snap.frees - timed_frees <= 500);
    }

    #[test]
    fn test_churn_with_tiny_iteration_count() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut r = BenchResult::new();
        random_churn(&t, &mut r, &small().with_iterations(3)).unwrap();
        assert_eq!(t.snapshot().allocs, 3);
        assert_eq!(t.snapshot().live_blocks, 0);
    }

    #[test]
    fn test_realloc_growth_only_accounting() {
        let t = TrackingAllocator::new(SystemAllocator).recording_sizes();
        let cfg = small().with_iterations(500);
        let mut r = BenchResult::new();
        realloc(&t, &mut r, &cfg).unwrap();

        let log = t.recorded_sizes();
        assert_eq!(log.len(), 501);
        let mut expected = log[0] as u64;
        for pair in log.windows(2) {
            expected += pair[1].saturating_sub(pair[0]) as u64;
        }
        assert_eq!(r.total_requested_bytes, expected);
        assert_eq!(r.operations_count, 502);
        assert!(is_na(r.alloc_ops_per_sec));
        assert!(!is_na(r.realloc_ops_per_sec));
        assert!(r.fragmentation_supplied());
        assert_eq!(t.snapshot().live_blocks, 0);
    }

    #[test]
    fn test_aligned_scaling() {
        assert_eq!(aligned_iterations(0), 0);
        assert_eq!(aligned_iterations(50), 100);
        assert_eq!(aligned_iterations(1_000_000), 100_000);
    }

    #[test]
    fn test_aligned_pointers_are_aligned() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut r = BenchResult::new();
        aligned(&t, &mut r, &small().with_iterations(5000)).unwrap();
        assert_eq!(r.operations_count, 1000);
        assert_eq!(t.snapshot().allocs, 500);
        assert_eq!(t.snapshot().live_blocks, 0);
        assert!(is_na(r.fragmentation_ratio));
    }

    #[test]
    fn test_immediate_has_no_distribution() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut r = BenchResult::new();
        immediate(&t, &mut r, &small()).unwrap();
        assert_eq!(r.operations_count, 4000);
        assert!(is_na(r.p99_alloc_time_ns));
        assert!(r.avg_alloc_time_ns >= 0.0);
        // Never more than one block live at a time.
        assert!(t.snapshot().peak_live_bytes <= 512);
    }

    /// System allocator with a release that takes at least 200us.
    struct SlowRelease;

    impl Allocator for SlowRelease {
        fn name(&self) -> &str {
            "slow-release"
        }
        fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
            SystemAllocator.allocate(size)
        }
        fn zeroed_allocate(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
            SystemAllocator.zeroed_allocate(count, size)
        }
        unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
            unsafe { SystemAllocator.reallocate(ptr, size) }
        }
        unsafe fn release(&self, ptr: NonNull<u8>) {
            std::thread::sleep(std::time::Duration::from_micros(200));
            unsafe { SystemAllocator.release(ptr) }
        }
        fn aligned_allocate(&self, alignment: usize, size: usize) -> Option<NonNull<u8>> {
            SystemAllocator.aligned_allocate(alignment, size)
        }
        unsafe fn aligned_release(&self, ptr: NonNull<u8>) {
            unsafe { SystemAllocator.aligned_release(ptr) }
        }
    }

    #[test]
    fn test_immediate_mean_excludes_release() {
        let mut r = BenchResult::new();
        immediate(&SlowRelease, &mut r, &small().with_iterations(20)).unwrap();
        assert!(r.avg_alloc_time_ns >= 0.0);
        assert!(r.avg_alloc_time_ns < 100_000.0, "{}", r.avg_alloc_time_ns);
        // The free rate still sees the slow release.
        assert!(r.free_ops_per_sec <= 5_000.0, "{}", r.free_ops_per_sec);
    }

    #[test]
    fn test_inverted_range_is_invalid_config() {
        let cfg = RunConfig::default().with_size_range(100, 10);
        for run in [sequential, random_churn, realloc, aligned, immediate] {
            let t = TrackingAllocator::new(SystemAllocator);
            let mut r = BenchResult::new();
            let err = run(&t, &mut r, &cfg).unwrap_err();
            assert!(matches!(err, BenchError::InvalidConfig(_)), "{err}");
            assert_eq!(t.snapshot().allocs, 0);
        }
    }

    #[test]
    fn test_zero_iterations_all_sentinel() {
        for run in [sequential, random_churn, realloc, aligned, immediate] {
            let t = TrackingAllocator::new(SystemAllocator);
            let mut r = BenchResult::new();
            run(&t, &mut r, &small().with_iterations(0)).unwrap();
            assert!(is_na(r.total_ops_per_sec));
            assert!(is_na(r.p50_alloc_time_ns));
            assert_eq!(t.snapshot().live_blocks, 0);
        }
    }
}
