//! Container-driven workloads.
//!
//! The allocator is reached indirectly: each timed region is one container
//! operation, so node and buffer management inside the container is
//! attributed to the allocator under test. Requested bytes are the
//! container's own footprint (element, node or entry size), and the
//! allocated figure mirrors it because the containers never see usable
//! sizes.

use rand::RngCore;

use crate::backend::Allocator;
use crate::config::RunConfig;
use crate::containers::{AllocBox, BinaryTree, HashTable, LinkedList, Stack, Vector};
use crate::error::{BenchError, bookkeeping};
use crate::registry::Benchmark;
use crate::result::{BenchResult, METRIC_NA};
use crate::rng::XorShift32;
use crate::stats::{LatencySamples, per_second};
use crate::timed;
use crate::timer::Timer;

pub fn benchmarks() -> Vec<Benchmark> {
    vec![
        Benchmark::new("vector_ops", "Vector push/pop operations", vector_ops),
        Benchmark::new(
            "linked_list_ops",
            "Linked list insert/delete operations",
            linked_list_ops,
        ),
        Benchmark::new(
            "binary_tree_ops",
            "Binary tree insert/delete operations",
            binary_tree_ops,
        ),
        Benchmark::new(
            "hash_table_ops",
            "Hash table insert/lookup operations",
            hash_table_ops,
        ),
        Benchmark::new("stack_ops", "Stack push/pop operations", stack_ops),
    ]
}

/// `n` values drawn from the seed before anything is timed.
fn draw_values(seed: u32, n: usize) -> Result<Vec<i32>, BenchError> {
    let mut rng = XorShift32::new(seed);
    let mut values = bookkeeping(n)?;
    values.extend((0..n).map(|_| rng.next_u32() as i32));
    Ok(values)
}

/// Timings of a fill phase followed by a drain phase.
struct Phases {
    fill: LatencySamples,
    drain_ops: u64,
    drain_ns: u64,
    requested: u64,
}

impl Phases {
    fn new(n: usize) -> Result<Self, BenchError> {
        Ok(Self {
            fill: LatencySamples::with_capacity(n)?,
            drain_ops: 0,
            drain_ns: 0,
            requested: 0,
        })
    }

    fn drained(&mut self, ns: u64) {
        self.drain_ops += 1;
        self.drain_ns += ns;
    }

    /// `drain_frees` says whether the drain phase actually releases memory;
    /// lookups do not, so they get no free rate.
    fn finish(self, result: &mut BenchResult, drain_frees: bool) {
        let fill_ops = self.fill.len() as u64;
        let fill_ns = self.fill.total_ns();
        result.operations_count = fill_ops + self.drain_ops;
        result.thread_count = 1;
        result.alloc_ops_per_sec = per_second(fill_ops, fill_ns);
        result.free_ops_per_sec = if drain_frees {
            per_second(self.drain_ops, self.drain_ns)
        } else {
            METRIC_NA
        };
        result.total_ops_per_sec = per_second(fill_ops + self.drain_ops, fill_ns + self.drain_ns);
        result.apply_latency(&self.fill.summarize());
        result.total_requested_bytes = self.requested;
        result.total_allocated_bytes = self.requested;
        result.supply_fragmentation(METRIC_NA);
    }
}

/// Push `n` values onto a growable array, then pop them all.
pub fn vector_ops(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let values = draw_values(cfg.seed, n)?;
    let mut phases = Phases::new(n)?;
    let mut timer = Timer::new();
    let mut vec = Vector::new(alloc)?;

    for &v in &values {
        let (pushed, ns) = timed!(timer, vec.push(v));
        pushed?;
        phases.fill.record(ns);
        phases.requested += size_of::<i32>() as u64;
    }
    for _ in 0..n {
        let (_, ns) = timed!(timer, vec.pop());
        phases.drained(ns);
    }

    phases.finish(result, true);
    Ok(())
}

/// Append `n` heap-allocated values to a doubly linked list, then pop them
/// back off the tail. Payload boxes are allocated and dropped untimed.
pub fn linked_list_ops(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let values = draw_values(cfg.seed, n)?;
    let mut phases = Phases::new(n)?;
    let mut timer = Timer::new();
    let mut list = LinkedList::new(alloc);

    for &v in &values {
        let payload = AllocBox::try_new(v, alloc)?;
        let (pushed, ns) = timed!(timer, list.push_back(payload));
        pushed?;
        phases.fill.record(ns);
        phases.requested += (size_of::<i32>() + LinkedList::<AllocBox<'_, i32>>::node_size()) as u64;
    }
    for _ in 0..n {
        let (payload, ns) = timed!(timer, list.pop_back());
        phases.drained(ns);
        drop(payload);
    }

    phases.finish(result, true);
    Ok(())
}

/// Insert `n` random keys into an unbalanced search tree, then remove them
/// in insertion order. Duplicate keys replace in place and allocate nothing.
pub fn binary_tree_ops(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let keys = draw_values(cfg.seed, n)?;
    let mut phases = Phases::new(n)?;
    let mut timer = Timer::new();
    let mut tree = BinaryTree::new(alloc);
    let node_size = BinaryTree::<i32, usize>::node_size() as u64;

    for (i, &k) in keys.iter().enumerate() {
        let (inserted, ns) = timed!(timer, tree.insert(k, i));
        if inserted? {
            phases.requested += node_size;
        }
        phases.fill.record(ns);
    }
    for k in &keys {
        let (_, ns) = timed!(timer, tree.remove(k));
        phases.drained(ns);
    }

    phases.finish(result, true);
    Ok(())
}

/// Insert `n` random keys into a chained hash table, then look each one up
/// again. The lookup phase releases nothing.
pub fn hash_table_ops(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let keys = draw_values(cfg.seed, n)?;
    let mut phases = Phases::new(n)?;
    let mut timer = Timer::new();
    let mut table = HashTable::new(alloc)?;
    let entry_size = HashTable::<i32, usize>::entry_size() as u64;

    for (i, &k) in keys.iter().enumerate() {
        let (replaced, ns) = timed!(timer, table.insert(k, i));
        if replaced?.is_none() {
            phases.requested += entry_size;
        }
        phases.fill.record(ns);
    }
    for k in &keys {
        let (found, ns) = timed!(timer, table.get(k).is_some());
        debug_assert!(found);
        phases.drained(ns);
    }

    phases.finish(result, false);
    Ok(())
}

/// Push `n` heap-allocated values onto a linked stack, then pop them all.
pub fn stack_ops(
    alloc: &dyn Allocator,
    result: &mut BenchResult,
    cfg: &RunConfig,
) -> Result<(), BenchError> {
    cfg.validate()?;
    let n = cfg.iterations;
    let values = draw_values(cfg.seed, n)?;
    let mut phases = Phases::new(n)?;
    let mut timer = Timer::new();
    let mut stack = Stack::new(alloc);

    for &v in &values {
        let payload = AllocBox::try_new(v, alloc)?;
        let (pushed, ns) = timed!(timer, stack.push(payload));
        pushed?;
        phases.fill.record(ns);
        phases.requested += (size_of::<i32>() + Stack::<AllocBox<'_, i32>>::node_size()) as u64;
    }
    for _ in 0..n {
        let (payload, ns) = timed!(timer, stack.pop());
        phases.drained(ns);
        drop(payload);
    }

    phases.finish(result, true);
    Ok(())
}
