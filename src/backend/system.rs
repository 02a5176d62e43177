//! The platform C allocator through `libc`.

use core::ffi::c_void;
use std::ptr::NonNull;

use super::Allocator;

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn name(&self) -> &str {
        "system"
    }

    #[inline]
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // malloc(0) may legitimately return null; always ask for a real block.
        NonNull::new(unsafe { libc::malloc(size.max(1)) } as *mut u8)
    }

    #[inline]
    fn zeroed_allocate(&self, count: usize, size: usize) -> Option<NonNull<u8>> {
        count.checked_mul(size)?;
        NonNull::new(unsafe { libc::calloc(count.max(1), size.max(1)) } as *mut u8)
    }

    #[inline]
    unsafe fn reallocate(&self, ptr: NonNull<u8>, size: usize) -> Option<NonNull<u8>> {
        NonNull::new(unsafe { libc::realloc(ptr.as_ptr() as *mut c_void, size.max(1)) } as *mut u8)
    }

    #[inline]
    unsafe fn release(&self, ptr: NonNull<u8>) {
        unsafe { libc::free(ptr.as_ptr() as *mut c_void) }
    }

    #[inline]
    fn aligned_allocate(&self, alignment: usize, size: usize) -> Option<NonNull<u8>> {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                NonNull::new(unsafe { libc::aligned_malloc(size.max(1), alignment) } as *mut u8)
            } else {
                let mut out: *mut c_void = core::ptr::null_mut();
                let rc = unsafe { libc::posix_memalign(&mut out, alignment, size.max(1)) };
                if rc != 0 {
                    return None;
                }
                NonNull::new(out as *mut u8)
            }
        }
    }

    #[inline]
    unsafe fn aligned_release(&self, ptr: NonNull<u8>) {
        cfg_if::cfg_if! {
            if #[cfg(windows)] {
                unsafe { libc::aligned_free(ptr.as_ptr() as *mut c_void) }
            } else {
                unsafe { libc::free(ptr.as_ptr() as *mut c_void) }
            }
        }
    }

    unsafe fn consumed_size(&self, ptr: NonNull<u8>, requested: usize) -> usize {
        cfg_if::cfg_if! {
            if #[cfg(any(target_os = "linux", target_os = "android"))] {
                let _ = requested;
                unsafe { libc::malloc_usable_size(ptr.as_ptr() as *mut c_void) }
            } else if #[cfg(target_vendor = "apple")] {
                let _ = requested;
                unsafe { libc::malloc_size(ptr.as_ptr() as *const c_void) }
            } else {
                let _ = ptr;
                crate::size_class::estimated_size(requested)
            }
        }
    }
}
