use std::ptr;

use super::RawBuf;
use crate::backend::Allocator;
use crate::error::BenchError;

/// Initial slot count when none is given.
pub const DEFAULT_CAPACITY: usize = 16;

/// Contiguous growable array. Capacity doubles through `reallocate`.
pub struct Vector<'a, T> {
    buf: RawBuf<'a, T>,
    len: usize,
}

impl<'a, T> Vector<'a, T> {
    pub fn new(alloc: &'a dyn Allocator) -> Result<Self, BenchError> {
        Self::with_capacity(alloc, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(alloc: &'a dyn Allocator, cap: usize) -> Result<Self, BenchError> {
        Ok(Self {
            buf: RawBuf::with_capacity(alloc, cap.max(1))?,
            len: 0,
        })
    }

    pub fn push(&mut self, value: T) -> Result<(), BenchError> {
        if self.len == self.buf.capacity() {
            self.buf.resize(self.buf.capacity() * 2)?;
        }
        unsafe { self.buf.as_ptr().add(self.len).write(value) };
        self.len += 1;
        Ok(())
    }

    /// Never shrinks the storage.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(unsafe { self.buf.as_ptr().add(self.len).read() })
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.buf.as_ptr(), self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn clear(&mut self) {
        let live = ptr::slice_from_raw_parts_mut(self.buf.as_ptr(), self.len);
        self.len = 0;
        unsafe { ptr::drop_in_place(live) };
    }
}

impl<T> Drop for Vector<'_, T> {
    fn drop(&mut self) {
        self.clear();
    }
}
