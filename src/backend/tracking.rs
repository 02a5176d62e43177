//! Counting decorator around any backend.
//!
//! Counters use `Relaxed` ordering. They are observational only; individual
//! loads in a [`TrackingSnapshot`] are atomic but not mutually consistent
//! while other threads are allocating.
//!
//! The live-block table and the size log sit behind `parking_lot` mutexes, so
//! wrapping a backend in a tracker changes its timing. Use it to check what a
//! workload does, not how fast an allocator is.

use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::Allocator;

#[derive(Default)]
struct Counters {
    /// Successful allocate / zeroed_allocate / aligned_allocate calls.
    allocs: AtomicU64,
    /// release / aligned_release calls.
    frees: AtomicU64,
    /// Successful reallocate calls.
    reallocs: AtomicU64,
    /// Failed requests of any kind.
    failures: AtomicU64,
    /// Sum of sizes passed to successful allocating calls, reallocs included.
    requested_bytes: AtomicU64,
    live_bytes: AtomicU64,
    peak_live_bytes: AtomicU64,
}

/// A point-in-time copy of the tracker's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackingSnapshot {
    pub allocs: u64,
    pub frees: u64,
    pub reallocs: u64,
    pub failures: u64,
    pub requested_bytes: u64,
    pub live_bytes: u64,
    pub peak_live_bytes: u64,
    /// Blocks handed out and not yet released.
    pub live_blocks: usize,
}

pub struct TrackingAllocator<A> {
    name: String,
    inner: A,
    counters: Counters,
    live: Mutex<HashMap<usize, usize>>,
    sizes: Option<Mutex<Vec<usize>>>,
}

impl<A: Allocator> TrackingAllocator<A> {
    pub fn new(inner: A) -> Self {
        let name = inner.name().to_string();
        Self::named(name, inner)
    }

    /// Register the wrapped backend under a different name.
    pub fn named(name: impl Into<String>, inner: A) -> Self {
        Self {
            name: name.into(),
            inner,
            counters: Counters::default(),
            live: Mutex::new(HashMap::new()),
            sizes: None,
        }
    }

    /// Also log every requested size, in call order.
    pub fn recording_sizes(mut self) -> Self {
        self.sizes = Some(Mutex::new(Vec::new()));
        self
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        let c = &self.counters;
        TrackingSnapshot {
            allocs: c.allocs.load(Ordering::Relaxed),
            frees: c.frees.load(Ordering::Relaxed),
            reallocs: c.reallocs.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            requested_bytes: c.requested_bytes.load(Ordering::Relaxed),
            live_bytes: c.live_bytes.load(Ordering::Relaxed),
            peak_live_bytes: c.peak_live_bytes.load(Ordering::Relaxed),
            live_blocks: self.live.lock().len(),
        }
    }

    /// Requested sizes so far; empty unless built with `recording_sizes`.
    pub fn recorded_sizes(&self) -> Vec<usize> {
        self.sizes
            .as_ref()
            .map(|sizes| sizes.lock().clone())
            .unwrap_or_default()
    }

    fn log_size(&self, size: usize) {
        if let Some(sizes) = &self.sizes {
            sizes.lock().push(size);
        }
    }

    fn track(&self, result: Option<NonNull<u8>>, size: usize) -> Option<NonNull<u8>> {
        self.log_size(size);
        let c = &self.counters;
        match result {
            Some(ptr) => {
                c.allocs.fetch_add(1, Ordering::Relaxed);
                c.requested_bytes.fetch_add(size as u64, Ordering::Relaxed);
                self.live.lock().insert(ptr.as_ptr() as usize, size);
                self.grow_live(size as u64);
            }
            None => {
                c.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    fn grow_live(&self, by: u64) {
        let c = &self.counters;
        let live = c.live_bytes.fetch_add(by, Ordering::Relaxed) + by;
        c.peak_live_bytes.fetch_max(live, Ordering::Relaxed);
    }

    fn untrack(&self, ptr: NonNull<u8>) {
        self.counters.frees.fetch_add(1, Ordering::Relaxed);
        if let Some(size) = self.live.lock().remove(&(ptr.as_ptr() as usize)) {
            self.counters
                .live_bytes
                .fetch_sub(size as u64, Ordering::Relaxed);
        }
    }
}

impl<A: Allocator> Allocator for TrackingAllocator<A> {
    fn name(&self) -> &str {
        &self.name
    }

    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        self.track(self.inner.allocate(size), size)
    }

    fn zeroed_allocate(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        let total = count.saturating_mul(size);
        self.track(self.inner.zeroed_allocate(count, size), total)
    }

    unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
        self.log_size(size);
        let c = &self.counters;
        let Some(new) = (unsafe { self.inner.reallocate(ptr, size) }) else {
            c.failures.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        c.reallocs.fetch_add(1, Ordering::Relaxed);
        c.requested_bytes.fetch_add(size as u64, Ordering::Relaxed);
        let old = {
            let mut live = self.live.lock();
            let old = live.remove(&(ptr.as_ptr() as usize)).unwrap_or(0);
            live.insert(new.as_ptr() as usize, size);
            old
        };
        if size >= old {
            self.grow_live((size - old) as u64);
        } else {
            c.live_bytes.fetch_sub((old - size) as u64, Ordering::Relaxed);
        }
        Some(new)
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        self.untrack(ptr);
        unsafe { self.inner.release(ptr) }
    }

    fn aligned_allocate(&self, alignment: usize, size: usize) -> Option<NonNull<u8>> {
        self.track(self.inner.aligned_allocate(alignment, size), size)
    }

    unsafe fn aligned_release(&self, ptr: NonNull<u8>) {
        self.untrack(ptr);
        unsafe { self.inner.aligned_release(ptr) }
    }

    fn init(&self) -> Result<(), String> {
        self.inner.init()
    }

    fn cleanup(&self) {
        self.inner.cleanup()
    }

    unsafe fn consumed_size(&self, ptr: NonNull<u8>, requested: usize) -> usize {
        unsafe { self.inner.consumed_size(ptr, requested) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SystemAllocator;

    #[test]
    fn test_counts_and_live_bytes() {
        let t = TrackingAllocator::new(SystemAllocator);
        let a = t.allocate(100).unwrap();
        let b = t.allocate(50).unwrap();
        unsafe { t.release(a) };
        let snap = t.snapshot();
        assert_eq!(snap.allocs, 2);
        assert_eq!(snap.frees, 1);
        assert_eq!(snap.requested_bytes, 150);
        assert_eq!(snap.live_bytes, 50);
        assert_eq!(snap.peak_live_bytes, 150);
        assert_eq!(snap.live_blocks, 1);
        unsafe { t.release(b) };
        assert_eq!(t.snapshot().live_blocks, 0);
    }

    #[test]
    fn test_realloc_moves_live_entry() {
        let t = TrackingAllocator::new(SystemAllocator);
        let p = t.allocate(64).unwrap();
        let p = unsafe { t.reallocate(p, 256) }.unwrap();
        let snap = t.snapshot();
        assert_eq!(snap.reallocs, 1);
        assert_eq!(snap.live_bytes, 256);
        assert_eq!(snap.live_blocks, 1);
        let p = unsafe { t.reallocate(p, 32) }.unwrap();
        assert_eq!(t.snapshot().live_bytes, 32);
        assert_eq!(t.snapshot().peak_live_bytes, 256);
        unsafe { t.release(p) };
        assert_eq!(t.snapshot().live_bytes, 0);
    }

    #[test]
    fn test_records_sizes_in_order() {
        let t = TrackingAllocator::named("stub", SystemAllocator).recording_sizes();
        assert_eq!(t.name(), "stub");
        let ptrs: Vec<_> = [8usize, 4096, 17]
            .iter()
            .map(|&s| t.allocate(s).unwrap())
            .collect();
        assert_eq!(t.recorded_sizes(), vec![8, 4096, 17]);
        for p in ptrs {
            unsafe { t.release(p) };
        }
        assert_eq!(t.snapshot().live_blocks, 0);
    }

    #[test]
    fn test_aligned_path_is_tracked() {
        let t = TrackingAllocator::new(SystemAllocator);
        let p = t.aligned_allocate(64, 10).unwrap();
        assert_eq!(t.snapshot().live_blocks, 1);
        unsafe { t.aligned_release(p) };
        assert_eq!(t.snapshot().live_blocks, 0);
    }
}
