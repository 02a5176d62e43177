//! jemalloc through `tikv-jemalloc-sys` (feature `jemalloc`).
//!
//! The sys crate links jemalloc with its symbols prefixed, so this backend
//! coexists with the system allocator in one process.

use core::ffi::c_void;
use std::ptr::NonNull;

use tikv_jemalloc_sys as ffi;

use super::Allocator;

#[derive(Clone, Copy, Debug, Default)]
pub struct Jemalloc;

impl Allocator for Jemalloc {
    fn name(&self) -> &str {
        "jemalloc"
    }

    #[inline]
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { ffi::malloc(size.max(1)) } as *mut u8)
    }

    #[inline]
    fn zeroed_allocate(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        count.checked_mul(size)?;
        NonNull::new(unsafe { ffi::calloc(count.max(1), size.max(1)) } as *mut u8)
    }

    #[inline]
    unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { ffi::realloc(ptr.as_ptr() as *mut c_void, size.max(1)) } as *mut u8)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>) {
        unsafe { ffi::free(ptr.as_ptr() as *mut c_void) }
    }

    #[inline]
    fn aligned_allocate(&self, alignment: usize, size: usize) -> Option<NonNull<u8>> {
        let mut out: *mut c_void = core::ptr::null_mut();
        let rc = unsafe { ffi::posix_memalign(&mut out, alignment, size.max(1)) };
        if rc != 0 {
            return None;
        }
        NonNull::new(out as *mut u8)
    }

    #[inline]
    unsafe fn aligned_release(&self, ptr: NonNull<u8>) {
        unsafe { ffi::free(ptr.as_ptr() as *mut c_void) }
    }

    unsafe fn consumed_size(&self, ptr: NonNull<u8>, _requested: usize) -> usize {
        unsafe { ffi::malloc_usable_size(ptr.as_ptr() as *const c_void) }
    }
}
