//! mimalloc through `libmimalloc-sys` (feature `mimalloc`).

use core::ffi::c_void;
use std::ptr::NonNull;

use libmimalloc_sys as ffi;

use super::Allocator;

#[derive(Clone, Copy, Debug, Default)]
pub struct MiMalloc;

impl Allocator for MiMalloc {
    fn name(&self) -> &str {
        "mimalloc"
    }

    #[inline]
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { ffi::mi_malloc(size) } as *mut u8)
    }

    #[inline]
    fn zeroed_allocate(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        let total = count.checked_mul(size)?;
        NonNull::new(unsafe { ffi::mi_zalloc(total) } as *mut u8)
    }

    #[inline]
    unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { ffi::mi_realloc(ptr.as_ptr() as *mut c_void, size) } as *mut u8)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>) {
        unsafe { ffi::mi_free(ptr.as_ptr() as *mut c_void) }
    }

    #[inline]
    fn aligned_allocate(&self, alignment: usize, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { ffi::mi_malloc_aligned(size, alignment) } as *mut u8)
    }

    #[inline]
    unsafe fn aligned_release(&self, ptr: NonNull<u8>) {
        unsafe { ffi::mi_free(ptr.as_ptr() as *mut c_void) }
    }

    unsafe fn consumed_size(&self, ptr: NonNull<u8>, _requested: usize) -> usize {
        unsafe { ffi::mi_usable_size(ptr.as_ptr() as *const c_void) }
    }
}
