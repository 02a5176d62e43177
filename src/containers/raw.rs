//! Growable, uninitialised storage for `capacity` values of `T`.
//!
//! `RawBuf` tracks only memory, never which slots hold live values; the
//! owning container does that.

use std::mem;
use std::ptr::{self, NonNull};

use super::{allocate_for, needs_aligned_path, release_for};
use crate::backend::{AllocOp, Allocator};
use crate::error::BenchError;

pub struct RawBuf<'a, T> {
    ptr: NonNull<T>,
    cap: usize,
    alloc: &'a dyn Allocator,
}

fn byte_len<T>(alloc: &dyn Allocator, op: AllocOp, cap: usize) -> Result<usize, BenchError> {
    cap.checked_mul(mem::size_of::<T>())
        .ok_or_else(|| BenchError::allocation_failed(alloc, op, usize::MAX))
}

impl<'a, T> RawBuf<'a, T> {
    pub fn with_capacity(alloc: &'a dyn Allocator, cap: usize) -> Result<Self, BenchError> {
        let bytes = byte_len::<T>(alloc, AllocOp::Allocate, cap)?;
        let ptr = allocate_for::<T>(alloc, bytes)?;
        Ok(Self { ptr, cap, alloc })
    }

    /// Storage whose bytes are all zero, through `zeroed_allocate`.
    ///
    /// Only meaningful for types where all-zero is a valid value, such as
    /// `Option<NonNull<_>>`.
    pub fn zeroed(alloc: &'a dyn Allocator, cap: usize) -> Result<Self, BenchError> {
        if needs_aligned_path::<T>() {
            let buf = Self::with_capacity(alloc, cap)?;
            unsafe { ptr::write_bytes(buf.ptr.as_ptr(), 0, cap) };
            return Ok(buf);
        }
        let ptr = alloc
            .zeroed_allocate(cap, mem::size_of::<T>())
            .ok_or_else(|| {
                BenchError::allocation_failed(
                    alloc,
                    AllocOp::ZeroedAllocate,
                    cap.saturating_mul(mem::size_of::<T>()),
                )
            })?;
        Ok(Self { ptr: ptr.cast(), cap, alloc })
    }

    /// Resize to `new_cap` slots, keeping the first `min(cap, new_cap)`.
    ///
    /// Goes through `reallocate` unless `T` needs the aligned path, in which
    /// case the contents are copied into a fresh aligned block.
    pub fn resize(&mut self, new_cap: usize) -> Result<(), BenchError> {
        let bytes = byte_len::<T>(self.alloc, AllocOp::Reallocate, new_cap)?;
        if needs_aligned_path::<T>() {
            let fresh = allocate_for::<T>(self.alloc, bytes)?;
            unsafe {
                ptr::copy_nonoverlapping(self.ptr.as_ptr(), fresh.as_ptr(), self.cap.min(new_cap));
                release_for(self.alloc, self.ptr);
            }
            self.ptr = fresh;
        } else {
            let moved = unsafe { self.alloc.reallocate(self.ptr.cast(), bytes) }
                .ok_or_else(|| BenchError::allocation_failed(self.alloc, AllocOp::Reallocate, bytes))?;
            self.ptr = moved.cast();
        }
        self.cap = new_cap;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub fn allocator(&self) -> &'a dyn Allocator {
        self.alloc
    }
}

impl<T> Drop for RawBuf<'_, T> {
    fn drop(&mut self) {
        unsafe { release_for(self.alloc, self.ptr) }
    }
}
