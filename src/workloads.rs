//! Workload generators.
//!
//! Each generator is a [`WorkloadFn`](crate::registry::WorkloadFn): it drives
//! one allocation pattern against an allocator, fills in the result record
//! and returns `Ok` or the reason it failed. The families are:
//!
//! * [`micro`]: sequential, random churn, realloc, aligned, immediate free
//! * [`structures`]: vector, linked list, tree, hash table and stack traffic
//! * [`fragmentation`]: mixed-size churn, worst-case interleaving, Larson
//! * [`threaded`]: N workers running private alloc/free batches
//!
//! Rules every generator follows:
//!
//! * The config is validated first. An inverted size range comes back as
//!   [`BenchError::InvalidConfig`] before any decision is drawn.
//! * Decisions come from [`XorShift32`](crate::rng::XorShift32) seeded from
//!   the config and are drawn outside timed regions. Where a workload needs
//!   a decision buffer it is filled before the first timed call.
//! * Bookkeeping lives on the global Rust heap and never goes through the
//!   allocator under test. It is reserved up front with `try_reserve_exact`,
//!   so none of it is allocated inside a timed region. For the `system`
//!   backend that heap is the same libc heap, and its footprint shows up in
//!   the RSS readings.
//! * Only the allocator call sits inside a `timed!` region.
//! * A failed request aborts the run. Blocks still held are released by the
//!   [`LiveBlocks`] guard on the way out, so nothing leaks.

use std::ptr::NonNull;

use crate::backend::Allocator;
use crate::error::{BenchError, bookkeeping};
use crate::registry::{Benchmark, BenchmarkRegistry};
use crate::rng::{XorShift32, random_size};

pub mod fragmentation;
pub mod micro;
pub mod structures;
pub mod threaded;

/// Live blocks owned by a running workload, released on drop.
pub(crate) struct LiveBlocks<'a> {
    alloc: &'a dyn Allocator,
    slots: Vec<Option<NonNull<u8>>>,
    aligned: bool,
}

impl<'a> LiveBlocks<'a> {
    pub(crate) fn new(alloc: &'a dyn Allocator, len: usize) -> Result<Self, BenchError> {
        Self::build(alloc, len, false)
    }

    /// Slots holding blocks from `aligned_allocate`.
    pub(crate) fn aligned(alloc: &'a dyn Allocator, len: usize) -> Result<Self, BenchError> {
        Self::build(alloc, len, true)
    }

    fn build(alloc: &'a dyn Allocator, len: usize, aligned: bool) -> Result<Self, BenchError> {
        let mut slots = bookkeeping(len)?;
        slots.resize(len, None);
        Ok(Self {
            alloc,
            slots,
            aligned,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn is_occupied(&self, slot: usize) -> bool {
        self.slots[slot].is_some()
    }

    #[inline]
    pub(crate) fn put(&mut self, slot: usize, ptr: NonNull<u8>) {
        debug_assert!(self.slots[slot].is_none(), "slot {slot} already occupied");
        self.slots[slot] = Some(ptr);
    }

    #[inline]
    pub(crate) fn take(&mut self, slot: usize) -> Option<NonNull<u8>> {
        self.slots[slot].take()
    }

    /// Release every remaining block, untimed.
    pub(crate) fn release_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(ptr) = slot.take() {
                unsafe {
                    if self.aligned {
                        self.alloc.aligned_release(ptr);
                    } else {
                        self.alloc.release(ptr);
                    }
                }
            }
        }
    }
}

impl Drop for LiveBlocks<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// The first `n` request sizes for `rng`, drawn before any timing.
pub(crate) fn draw_sizes(
    rng: &mut XorShift32,
    n: usize,
    min_size: usize,
    max_size: usize,
) -> Result<Vec<usize>, BenchError> {
    let mut sizes = bookkeeping(n)?;
    sizes.extend((0..n).map(|_| random_size(rng, min_size, max_size)));
    Ok(sizes)
}

/// Every built-in workload, in reporting order.
pub fn builtin() -> Vec<Benchmark> {
    let mut all = micro::benchmarks();
    all.extend(structures::benchmarks());
    all.extend(fragmentation::benchmarks());
    all.extend(threaded::benchmarks());
    all
}

pub fn register_builtin(registry: &mut BenchmarkRegistry) {
    for bench in builtin() {
        registry.register(bench);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SystemAllocator, TrackingAllocator};

    #[test]
    fn test_guard_releases_on_early_exit() {
        let t = TrackingAllocator::new(SystemAllocator);
        {
            let mut live = LiveBlocks::new(&t, 8).unwrap();
            for slot in 0..5 {
                live.put(slot, t.allocate(32).unwrap());
            }
            let p = live.take(2).unwrap();
            unsafe { t.release(p) };
            assert!(!live.is_occupied(2));
        }
        let snap = t.snapshot();
        assert_eq!(snap.allocs, 5);
        assert_eq!(snap.frees, 5);
        assert_eq!(snap.live_blocks, 0);
    }

    #[test]
    fn test_aligned_guard_uses_aligned_release() {
        let t = TrackingAllocator::new(SystemAllocator);
        let mut live = LiveBlocks::aligned(&t, 1).unwrap();
        live.put(0, t.aligned_allocate(256, 100).unwrap());
        drop(live);
        assert_eq!(t.snapshot().live_blocks, 0);
    }

    #[test]
    fn test_draw_sizes_is_deterministic() {
        let a = draw_sizes(&mut XorShift32::new(7), 100, 8, 64).unwrap();
        let b = draw_sizes(&mut XorShift32::new(7), 100, 8, 64).unwrap();
        assert_eq!(a, b);
        assert!(a.iter().all(|s| (8..=64).contains(s)));
    }

    #[test]
    fn test_builtin_names_are_unique() {
        let names: Vec<_> = builtin().into_iter().map(|b| b.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
        assert!(names.iter().any(|n| n == "sequential_alloc"));
        assert!(names.iter().any(|n| n == "threaded_alloc_16"));
    }
}
