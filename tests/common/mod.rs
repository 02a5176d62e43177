//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use allocbench::backend::{Allocator, SystemAllocator};
use allocbench::sampler::{MemorySample, MemorySampler};
use allocbench::{AllocatorRegistry, BenchmarkRegistry, Harness, workloads};

/// Serves the first `budget` allocating calls from the system heap, then
/// reports every further request as failed. Requests above `max_size` fail
/// regardless of budget.
pub struct FailingAllocator {
    name: String,
    budget: AtomicUsize,
    max_size: usize,
    init_error: Option<String>,
    cleanups: AtomicUsize,
}

impl FailingAllocator {
    pub fn after(name: &str, budget: usize) -> Self {
        Self {
            name: name.to_string(),
            budget: AtomicUsize::new(budget),
            max_size: usize::MAX,
            init_error: None,
            cleanups: AtomicUsize::new(0),
        }
    }

    /// Fails every request larger than `max_size`.
    pub fn above(name: &str, max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::after(name, usize::MAX)
        }
    }

    /// Never gets past `init`.
    pub fn broken_init(name: &str, reason: &str) -> Self {
        Self {
            init_error: Some(reason.to_string()),
            ..Self::after(name, usize::MAX)
        }
    }

    pub fn cleanups(&self) -> usize {
        self.cleanups.load(Ordering::Relaxed)
    }

    fn spend(&self, size: usize) -> bool {
        size <= self.max_size
            && self
                .budget
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |b| b.checked_sub(1))
                .is_ok()
    }
}

impl Allocator for FailingAllocator {
    fn name(&self) -> &str {
        &self.name
    }

    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if self.spend(size) { SystemAllocator.allocate(size) } else { None }
    }

    fn zeroed_allocate(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        if self.spend(count.saturating_mul(size)) {
            SystemAllocator.zeroed_allocate(count, size)
        } else {
            None
        }
    }

    unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
        if self.spend(size) {
            unsafe { SystemAllocator.reallocate(ptr, size) }
        } else {
            None
        }
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        unsafe { SystemAllocator.release(ptr) }
    }

    fn aligned_allocate(&self, alignment: usize, size: usize) -> Option<NonNull<u8>> {
        if self.spend(size) {
            SystemAllocator.aligned_allocate(alignment, size)
        } else {
            None
        }
    }

    unsafe fn aligned_release(&self, ptr: NonNull<u8>) {
        unsafe { SystemAllocator.aligned_release(ptr) }
    }

    fn init(&self) -> Result<(), String> {
        match &self.init_error {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    fn cleanup(&self) {
        self.cleanups.fetch_add(1, Ordering::Relaxed);
    }
}

/// Reports a fixed reading so results do not depend on the test process.
pub struct FixedSampler(pub MemorySample);

impl MemorySampler for FixedSampler {
    fn reset(&mut self) {}

    fn sample(&mut self) -> MemorySample {
        self.0
    }
}

/// A harness over the given backends and every built-in workload.
pub fn harness(backends: Vec<Arc<dyn Allocator>>) -> Harness {
    let mut allocators = AllocatorRegistry::new();
    for backend in backends {
        allocators.register(backend);
    }
    let mut benchmarks = BenchmarkRegistry::new();
    workloads::register_builtin(&mut benchmarks);
    Harness::new(allocators, benchmarks).with_sampler(FixedSampler(MemorySample {
        peak_kb: 128,
        current_kb: 64,
    }))
}
