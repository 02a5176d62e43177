//! Ordinary containers whose storage comes from an injected [`Allocator`].
//!
//! These exist to turn container operations into allocator traffic for the
//! data-structure workloads. Every node, buffer and bucket array is obtained
//! from the allocator under test, and allocation failure surfaces as
//! [`BenchError::AllocationFailed`] instead of an abort.
//!
//! Types whose alignment exceeds [`MIN_ALIGN`] go through the aligned
//! allocate/release pair; everything else through plain allocate/release.

use std::mem::{self, ManuallyDrop};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::backend::{AllocOp, Allocator, MIN_ALIGN};
use crate::error::BenchError;

mod hash;
mod list;
mod raw;
mod stack;
mod tree;
mod vector;

pub use hash::HashTable;
pub use list::LinkedList;
pub use raw::RawBuf;
pub use stack::Stack;
pub use tree::BinaryTree;
pub use vector::Vector;

#[inline]
pub(crate) fn needs_aligned_path<T>() -> bool {
    mem::align_of::<T>() > MIN_ALIGN
}

/// Raw storage for `bytes` bytes suitably aligned for `T`.
pub(crate) fn allocate_for<T>(alloc: &dyn Allocator, bytes: usize) -> Result<NonNull<T>, BenchError> {
    let (ptr, op) = if needs_aligned_path::<T>() {
        let align = mem::align_of::<T>().max(mem::size_of::<usize>());
        (alloc.aligned_allocate(align, bytes), AllocOp::AlignedAllocate)
    } else {
        (alloc.allocate(bytes), AllocOp::Allocate)
    };
    ptr.map(NonNull::cast)
        .ok_or_else(|| BenchError::allocation_failed(alloc, op, bytes))
}

/// # Safety
/// `ptr` must come from [`allocate_for::<T>`] on the same allocator.
pub(crate) unsafe fn release_for<T>(alloc: &dyn Allocator, ptr: NonNull<T>) {
    if needs_aligned_path::<T>() {
        unsafe { alloc.aligned_release(ptr.cast()) }
    } else {
        unsafe { alloc.release(ptr.cast()) }
    }
}

/// A single owned `T` living in memory from an [`Allocator`].
pub struct AllocBox<'a, T> {
    ptr: NonNull<T>,
    alloc: &'a dyn Allocator,
}

impl<'a, T> AllocBox<'a, T> {
    pub fn try_new(value: T, alloc: &'a dyn Allocator) -> Result<Self, BenchError> {
        let ptr = allocate_for::<T>(alloc, mem::size_of::<T>())?;
        unsafe { ptr.as_ptr().write(value) };
        Ok(Self { ptr, alloc })
    }

    /// Move the value out and give the memory back.
    pub fn into_inner(this: Self) -> T {
        let this = ManuallyDrop::new(this);
        unsafe {
            let value = this.ptr.as_ptr().read();
            release_for(this.alloc, this.ptr);
            value
        }
    }

    /// Give up ownership without releasing. Rebuild with [`from_raw`](Self::from_raw).
    pub fn into_raw(this: Self) -> NonNull<T> {
        ManuallyDrop::new(this).ptr
    }

    /// # Safety
    /// `ptr` must come from [`into_raw`](Self::into_raw) of a box on the same
    /// allocator and must not be owned by anything else.
    pub unsafe fn from_raw(ptr: NonNull<T>, alloc: &'a dyn Allocator) -> Self {
        Self { ptr, alloc }
    }

    /// Stable address of the boxed value.
    pub fn as_ptr(this: &Self) -> NonNull<T> {
        this.ptr
    }
}

impl<T> Deref for AllocBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for AllocBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for AllocBox<'_, T> {
    fn drop(&mut self) {
        unsafe {
            self.ptr.as_ptr().drop_in_place();
            release_for(self.alloc, self.ptr);
        }
    }
}
