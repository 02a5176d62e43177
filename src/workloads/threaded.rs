//! Fan-out workload: N workers hammering the shared allocator.
//!
//! Each worker owns its decision stream, its block table and its timer;
//! nothing mutable is shared between workers except the allocator under
//! test. Headline rates use the wall-clock time around the whole fan-out
//! and join, not the sum of per-thread busy time.

use std::thread;

use tracing::debug;

use crate::backend::{AllocOp, Allocator};
use crate::config::RunConfig;
use crate::error::BenchError;
use crate::registry::Benchmark;
use crate::result::{BenchResult, METRIC_NA};
use crate::rng::XorShift32;
use crate::stats::{ThreadTally, mean_ns, per_second};
use crate::timed;
use crate::timer::Timer;

use super::{LiveBlocks, draw_sizes};

/// Alloc-then-free rounds per worker.
pub const ROUNDS: usize = 10;

/// Seed stride between workers.
pub const SEED_STRIDE: u32 = 12345;

/// Thread counts registered as named benchmarks.
pub const VARIANTS: [usize; 5] = [1, 2, 4, 8, 16];

macro_rules! threaded_variant {
    ($($name:ident => $threads:expr),* $(,)?) => {
        $(
            fn $name(
                alloc: &dyn Allocator,
                result: &mut BenchResult,
                cfg: &RunConfig,
            ) -> Result<(), BenchError> {
                run_threaded(alloc, result, &cfg.with_threads($threads))
            }
        )*

        pub fn benchmarks() -> Vec<Benchmark> {
            vec![$(
                Benchmark::new(
                    stringify!($name),
                    if $threads == 1 {
                        "Threaded allocation test (1 thread)".to_string()
                    } else {
                        format!("Threaded allocation test ({} threads)", $threads)
                    },
                    $name,
                )
                .with_config(RunConfig::default().with_threads($threads)),
            )*]
        }
    };
}

threaded_variant! {
    threaded_alloc_1 => VARIANTS[0],
    threaded_alloc_2 => VARIANTS[1],
    threaded_alloc_4 => VARIANTS[2],
    threaded_alloc_8 => VARIANTS[3],
    threaded_alloc_16 => VARIANTS[4],
}

/// What one worker is told to do.
#[derive(Clone, Copy, Debug)]
struct Job {
    index: usize,
    seed: u32,
    batch: usize,
    min_size: usize,
    max_size: usize,
}

/// Split `cfg.iterations` evenly over `cfg.effective_threads()` workers and
/// run them to completion.
///
/// The first worker error is returned after every worker has been joined. A
/// panicking worker is reported as [`BenchError::WorkerPanicked`].
pub fn run_threaded(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let threads = cfg.effective_threads();
    let per_thread = cfg.iterations / threads;
    let batch = per_thread / ROUNDS;
    debug!(threads, per_thread, batch, "fanning out");

    let mut wall = Timer::new();
    wall.start();
    let joined = thread::scope(|scope| {
        let mut handles = Vec::with_capacity(threads);
        for index in 0..threads {
            let job = Job {
                index,
                seed: cfg.seed.wrapping_add((index as u32).wrapping_mul(SEED_STRIDE)),
                batch,
                min_size: cfg.min_size,
                max_size: cfg.max_size,
            };
            let handle = thread::Builder::new()
                .name(format!("allocbench-worker-{index}"))
                .spawn_scoped(scope, move || worker(alloc, job))?;
            handles.push(handle);
        }
        let joined: Vec<_> = handles
            .into_iter()
            .enumerate()
            .map(|(index, h)| h.join().map_err(|_| BenchError::WorkerPanicked { index }))
            .collect();
        Ok::<_, BenchError>(joined)
    });
    let wall_ns = wall.stop();

    let mut tallies = Vec::with_capacity(threads);
    for outcome in joined? {
        tallies.push(outcome??);
    }
    let total: ThreadTally = tallies.iter().sum();

    let ops = total.operations();
    result.operations_count = ops;
    result.thread_count = threads;
    result.alloc_ops_per_sec = per_second(total.allocs, wall_ns);
    result.free_ops_per_sec = per_second(total.frees, wall_ns);
    result.total_ops_per_sec = per_second(ops, wall_ns);
    result.avg_alloc_time_ns = mean_ns(total.alloc_ns, total.allocs);
    result.total_requested_bytes = total.requested_bytes;
    result.total_allocated_bytes = total.consumed_bytes;
    result.supply_fragmentation(METRIC_NA);
    Ok(())
}

fn worker(alloc: &dyn Allocator, job: Job) -> Result<ThreadTally, BenchError> {
    let mut rng = XorShift32::new(job.seed);
    let sizes = draw_sizes(&mut rng, job.batch * ROUNDS, job.min_size, job.max_size)?;
    let mut live = LiveBlocks::new(alloc, job.batch)?;
    let mut timer = Timer::new();
    let mut tally = ThreadTally::default();

    for round in sizes.chunks(job.batch.max(1)).take(ROUNDS) {
        for (slot, &size) in round.iter().enumerate() {
            let (ptr, ns) = timed!(timer, alloc.allocate(size));
            let ptr = ptr.ok_or_else(|| BenchError::allocation_failed(alloc, AllocOp::Allocate, size))?;
            tally.allocs += 1;
            tally.alloc_ns += ns;
            live.put(slot, ptr);
            tally.requested_bytes += size as u64;
            tally.consumed_bytes += unsafe { alloc.consumed_size(ptr, size) } as u64;
        }
        for slot in 0..round.len() {
            if let Some(ptr) = live.take(slot) {
                let ((), ns) = timed!(timer, unsafe { alloc.release(ptr) });
                tally.frees += 1;
                tally.free_ns += ns;
            }
        }
    }
    debug!(worker = job.index, ops = tally.operations(), "worker done");
    Ok(tally)
}
