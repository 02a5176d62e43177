//! The allocator capability contract and its backends.
//!
//! Every backend implements [`Allocator`]. The harness and the generators only
//! ever see `&dyn Allocator`, so a backend is free to forward to libc, to a
//! third-party allocator, or to another `Allocator` (see [`tracking`]).
//!
//! Which third-party backends exist is a build-time choice: `mimalloc` and
//! `jemalloc` are cargo features. [`builtin`] returns whatever was compiled in.

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::size_class;

pub mod system;
pub mod tracking;

#[cfg(feature = "mimalloc")]
pub mod mimalloc;

#[cfg(feature = "jemalloc")]
pub mod jemalloc;

pub use system::SystemAllocator;
pub use tracking::{TrackingAllocator, TrackingSnapshot};

/// Alignment every plain allocation is guaranteed to have.
pub const MIN_ALIGN: usize = 2 * core::mem::size_of::<usize>();

/// Which contract operation a failure came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocOp {
    Allocate,
    ZeroedAllocate,
    Reallocate,
    AlignedAllocate,
}

impl fmt::Display for AllocOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AllocOp::Allocate => "allocate",
            AllocOp::ZeroedAllocate => "zeroed_allocate",
            AllocOp::Reallocate => "reallocate",
            AllocOp::AlignedAllocate => "aligned_allocate",
        })
    }
}

/// A pluggable allocation strategy.
///
/// Implementations must be safe to call from several threads at once; the
/// threaded workloads share one instance across all workers.
///
/// `None` from any allocating method means the request could not be served.
/// Blocks from [`aligned_allocate`](Allocator::aligned_allocate) must be
/// returned through [`aligned_release`](Allocator::aligned_release); all
/// others through [`release`](Allocator::release).
pub trait Allocator: Send + Sync {
    fn name(&self) -> &str;

    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// `count * size` zero-filled bytes. Overflow is a failed request.
    fn zeroed_allocate(&self, count: usize, size: usize) -> Option<NonNull<u8>>;

    /// Resize a block. On `None` the original block is untouched and still
    /// owned by the caller.
    ///
    /// # Safety
    /// `ptr` must be a live block from `allocate`, `zeroed_allocate` or
    /// `reallocate` of this allocator.
    unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must be a live block from `allocate`, `zeroed_allocate` or
    /// `reallocate` of this allocator, and is dead afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>);

    /// `alignment` must be a power of two no smaller than `size_of::<usize>()`.
    fn aligned_allocate(&self, alignment: usize, size: usize) -> Option<NonNull<u8>>;

    /// # Safety
    /// `ptr` must be a live block from `aligned_allocate` of this allocator.
    unsafe fn aligned_release(&self, ptr: NonNull<u8>);

    /// Called once before the first run that uses this allocator.
    fn init(&self) -> Result<(), String> {
        Ok(())
    }

    /// Called once after the last run that uses this allocator.
    fn cleanup(&self) {}

    /// Bytes actually reserved for a live block of `requested` bytes.
    ///
    /// Backends that can ask the underlying allocator should; the default is
    /// the [`size_class`] estimate.
    ///
    /// # Safety
    /// `ptr` must be a live block of this allocator.
    unsafe fn consumed_size(&self, ptr: NonNull<u8>, requested: usize) -> usize {
        let _ = ptr;
        size_class::estimated_size(requested)
    }
}

/// Every backend compiled into this build, system first.
pub fn builtin() -> Vec<Arc<dyn Allocator>> {
    #[allow(unused_mut)]
    let mut backends: Vec<Arc<dyn Allocator>> = vec![Arc::new(SystemAllocator)];
    #[cfg(feature = "mimalloc")]
    backends.push(Arc::new(mimalloc::MiMalloc));
    #[cfg(feature = "jemalloc")]
    backends.push(Arc::new(jemalloc::Jemalloc));
    backends
}
