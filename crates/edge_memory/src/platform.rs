//! # Platform Aligned Allocation
//!
//! Thin wrapper over the host's aligned allocation primitive:
//! `posix_memalign`/`free` on Unix, `_aligned_malloc`/`_aligned_free` on
//! Windows. Both release a block from its address alone, which lets the
//! system allocator skip the header entirely when tracking is disabled.

// SAFETY: This module is the only place that talks to the C allocator.
#![allow(unsafe_code)]

use std::ptr::NonNull;

/// Smallest alignment the primitive accepts.
pub const MIN_PLATFORM_ALIGNMENT: usize = std::mem::size_of::<*mut libc::c_void>();

/// Allocates `size` bytes aligned to `alignment`.
///
/// `alignment` must be a power of two; values below
/// [`MIN_PLATFORM_ALIGNMENT`] are raised to it. Returns `None` if the platform
/// refuses the request.
#[must_use]
pub fn aligned_alloc(size: usize, alignment: usize) -> Option<NonNull<u8>> {
    let alignment = alignment.max(MIN_PLATFORM_ALIGNMENT);
    debug_assert!(alignment.is_power_of_two());
    // Some platforms return null for zero-byte requests.
    let size = size.max(1);

    #[cfg(unix)]
    {
        let mut out: *mut libc::c_void = std::ptr::null_mut();
        // SAFETY: `out` is a valid location and `alignment` is a power of two
        // that is a multiple of the pointer size.
        let rc = unsafe { libc::posix_memalign(&mut out, alignment, size) };
        if rc != 0 {
            return None;
        }
        NonNull::new(out.cast::<u8>())
    }

    #[cfg(windows)]
    {
        // SAFETY: `alignment` is a power of two.
        let out = unsafe { libc::aligned_malloc(size, alignment) };
        NonNull::new(out.cast::<u8>())
    }
}

/// Returns a block to the platform.
///
/// # Safety
///
/// `ptr` must have been returned by [`aligned_alloc`] and not released since.
pub unsafe fn aligned_free(ptr: NonNull<u8>) {
    #[cfg(unix)]
    libc::free(ptr.as_ptr().cast::<libc::c_void>());

    #[cfg(windows)]
    libc::aligned_free(ptr.as_ptr().cast::<libc::c_void>());
}
