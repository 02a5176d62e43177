//! Workloads that leave holes in the heap on purpose.

use rand::Rng;

use crate::backend::{AllocOp, Allocator};
use crate::config::RunConfig;
use crate::error::{BenchError, bookkeeping};
use crate::registry::Benchmark;
use crate::result::{BenchResult, METRIC_NA};
use crate::rng::{XorShift32, random_size, random_slot};
use crate::stats::{LatencySamples, mean_ns, per_second};
use crate::timed;
use crate::timer::Timer;

use super::LiveBlocks;

/// Size classes cycled by the mixed-size churn pattern.
pub const PATTERN_SIZES: [usize; 9] = [16, 32, 64, 128, 256, 512, 1024, 2048, 4096];
pub const PATTERN_ROUNDS: usize = 4;

pub const WORST_CASE_MAX_BLOCKS: usize = 10_000;
pub const WORST_CASE_SMALL: usize = 16;
pub const WORST_CASE_LARGE: usize = 1024;

pub const LARSON_SLOTS: usize = 1000;

pub fn benchmarks() -> Vec<Benchmark> {
    vec![
        Benchmark::new(
            "fragmentation_pattern",
            "Fragmentation pattern test",
            fragmentation_pattern,
        ),
        Benchmark::new(
            "worst_case_frag",
            "Worst case fragmentation test",
            worst_case,
        ),
        Benchmark::new("larson", "Larson benchmark (allocation density)", larson),
    ]
}

/// `1 + (peak - requested / 4) / peak`.
///
/// A rough heuristic rather than a true fragmentation measure: it drops
/// below 1.0 whenever a quarter of the lifetime request volume exceeds the
/// live peak, and can go negative. Zero peak has no ratio.
pub fn pattern_ratio(peak_live: u64, requested: u64) -> f64 {
    if peak_live == 0 {
        return METRIC_NA;
    }
    let peak = peak_live as f64;
    1.0 + (peak - (requested / 4) as f64) / peak
}

/// Mixed-size churn over `iterations / 4` slots for four rounds.
///
/// Each visit to an occupied slot frees it with probability 1/3; an empty
/// slot is then refilled from [`PATTERN_SIZES`]. The fragmentation ratio
/// comes from [`pattern_ratio`] over the peak of concurrently live bytes.
pub fn fragmentation_pattern(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let slots = cfg.iterations / 4;
    let mut rng = XorShift32::new(cfg.seed);
    let mut live = LiveBlocks::new(alloc, slots)?;
    let mut sizes: Vec<usize> = bookkeeping(slots)?;
    sizes.resize(slots, 0);
    let mut timer = Timer::new();

    let (mut allocs, mut frees, mut busy_ns) = (0u64, 0u64, 0u64);
    let mut alloc_ns = 0u64;
    let mut requested = 0u64;
    let mut consumed = 0u64;
    let (mut live_bytes, mut peak_live) = (0u64, 0u64);

    for _ in 0..PATTERN_ROUNDS {
        for slot in 0..slots {
            if live.is_occupied(slot) && rng.gen_ratio(1, 3) {
                if let Some(ptr) = live.take(slot) {
                    let ((), ns) = timed!(timer, unsafe { alloc.release(ptr) });
                    busy_ns += ns;
                    frees += 1;
                    live_bytes -= sizes[slot] as u64;
                }
            }
            if !live.is_occupied(slot) {
                let size = PATTERN_SIZES[random_slot(&mut rng, PATTERN_SIZES.len())];
                let (ptr, ns) = timed!(timer, alloc.allocate(size));
                let ptr = ptr
                    .ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::Allocate, size))?;
                busy_ns += ns;
                alloc_ns += ns;
                allocs += 1;
                live.put(slot, ptr);
                sizes[slot] = size;
                requested += size as u64;
                consumed += unsafe { alloc.consumed_size(ptr, size) } as u64;
                live_bytes += size as u64;
                peak_live = peak_live.max(live_bytes);
            }
        }
    }
    live.release_all();

    let ops = allocs + frees;
    result.operations_count = ops;
    result.thread_count = 1;
    result.total_ops_per_sec = per_second(ops, busy_ns);
    result.avg_alloc_time_ns = mean_ns(alloc_ns, allocs);
    result.total_requested_bytes = requested;
    result.total_allocated_bytes = consumed;
    result.supply_fragmentation(pattern_ratio(peak_live, requested));
    Ok(())
}

/// Number of blocks the worst-case layout uses: even, at most
/// [`WORST_CASE_MAX_BLOCKS`].
pub fn worst_case_blocks(iterations: usize) -> usize {
    iterations.min(WORST_CASE_MAX_BLOCKS) & !1
}

/// Alternate small and large blocks, free every small one, then ask for
/// large blocks that cannot fit in the small holes.
pub fn worst_case(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = worst_case_blocks(cfg.iterations);
    let mut live = LiveBlocks::new(alloc, n)?;
    let mut samples = LatencySamples::with_capacity(n + n / 2)?;
    let mut timer = Timer::new();
    let mut requested = 0u64;
    let mut consumed = 0u64;

    for slot in 0..n {
        let size = if slot % 2 == 0 { WORST_CASE_SMALL } else { WORST_CASE_LARGE };
        consumed += place(alloc, &mut timer, &mut live, &mut samples, slot, size)?;
        requested += size as u64;
    }

    let (mut frees, mut free_ns) = (0u64, 0u64);
    for slot in (0..n).step_by(2) {
        if let Some(ptr) = live.take(slot) {
            let ((), ns) = timed!(timer, unsafe { alloc.release(ptr) });
            frees += 1;
            free_ns += ns;
        }
    }

    for slot in (0..n).step_by(2) {
        consumed += place(alloc, &mut timer, &mut live, &mut samples, slot, WORST_CASE_LARGE)?;
        requested += WORST_CASE_LARGE as u64;
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

/// One timed allocation into `slot`; returns the bytes it consumed.
fn place(
    alloc: &dyn Allocator,
    timer: &mut Timer,
    live: &mut LiveBlocks<'_>,
    samples: &mut LatencySamples,
    slot: usize,
    size: usize,
) -> Result<u64, BenchError> {
    let (ptr, ns) = timed!(timer, alloc.allocate(size));
    let ptr = ptr.ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::Allocate, size))?;
    samples.record(ns);
    live.put(slot, ptr);
    Ok(unsafe { alloc.consumed_size(ptr, size) } as u64)
}

/// Larson-style slot reuse over a fixed table of [`LARSON_SLOTS`] pointers.
pub fn larson(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let mut rng = XorShift32::new(cfg.seed);
    let mut live = LiveBlocks::new(alloc, LARSON_SLOTS)?;
    let mut timer = Timer::new();
    let (mut allocs, mut alloc_ns) = (0u64, 0u64);
    let (mut frees, mut free_ns) = (0u64, 0u64);
    let mut requested = 0u64;
    let mut consumed = 0u64;

    for _ in 0..n {
        let slot = random_slot(&mut rng, LARSON_SLOTS);
        if let Some(old) = live.take(slot) {
            let ((), ns) = timed!(timer, unsafe { alloc.release(old) });
            frees += 1;
            free_ns += ns;
        }
        let size = random_size(&mut rng, cfg.min_size, cfg.max_size);
        let (ptr, ns) = timed!(timer, alloc.allocate(size));
        let ptr = ptr.ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::Allocate, size))?;
        allocs += 1;
        alloc_ns += ns;
        live.put(slot, ptr);
        requested += size as u64;
        consumed += unsafe { alloc.consumed_size(ptr, size) } as u64;
    }
    live.release_all();

    let ops = allocs + frees;
    result.operations_count = ops;
    result.thread_count = 1;
    result.alloc_ops_per_sec = per_second(allocs, alloc_ns);
    result.free_ops_per_sec = per_second(frees, free_ns);
    result.total_ops_per_sec = per_second(ops, alloc_ns + free_ns);
    result.avg_alloc_time_ns = mean_ns(alloc_ns, allocs);
    result.total_requested_bytes = requested;
    result.total_allocated_bytes = consumed;
    result.supply_fragmentation(METRIC_NA);
    Ok(())
}
