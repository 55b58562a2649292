//! # Backing Buffers
//!
//! One contiguous region drawn from a system allocator when a linear or pool
//! allocator is built, and handed back exactly once when it is dropped.

// SAFETY: `Buffer` frees its region in `Drop`, which goes through the unsafe
// `Allocator::free`.
#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::allocator::Allocator;
use crate::error::{MemoryError, MemoryResult};
use crate::global::SharedSystemAllocator;
use crate::tag::MemoryTag;

/// Owned region of a system allocator.
pub struct Buffer {
    /// Start of the region.
    ptr: NonNull<u8>,
    /// Size in bytes.
    len: usize,
    /// Where the region came from and goes back to.
    source: SharedSystemAllocator,
}

// SAFETY: The region is exclusively owned by this value and the source is
// behind a mutex.
unsafe impl Send for Buffer {}

impl Buffer {
    /// Draws `len` bytes aligned to `alignment` from `source`.
    ///
    /// # Errors
    ///
    /// - [`MemoryError::ZeroCapacity`] if `len` is zero
    /// - [`MemoryError::InvalidAlignment`] if `alignment` is not a power of two
    /// - [`MemoryError::BufferAllocationFailed`] if `source` cannot supply it
    ///
    /// A failed acquisition is returned, never reported, so it cannot halt
    /// the process through the source's diagnostic handler.
    #[track_caller]
    pub fn allocate(
        source: &SharedSystemAllocator,
        len: usize,
        alignment: usize,
        tag: MemoryTag,
    ) -> MemoryResult<Self> {
        if len == 0 {
            return Err(MemoryError::ZeroCapacity);
        }
        if !alignment.is_power_of_two() {
            return Err(MemoryError::InvalidAlignment(alignment));
        }

        let ptr = source
            .lock()
            .try_allocate(len, tag, alignment)
            .ok_or(MemoryError::BufferAllocationFailed { size: len })?;

        Ok(Self {
            ptr,
            len,
            source: SharedSystemAllocator::clone(source),
        })
    }

    /// Start of the region.
    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Start address of the region.
    #[inline]
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Size in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Offset of `address` from the start, if it lies inside the region.
    #[inline]
    #[must_use]
    pub fn offset_of(&self, address: usize) -> Option<usize> {
        let offset = address.checked_sub(self.address())?;
        (offset < self.len).then_some(offset)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `source` in `allocate` and is freed only here.
        unsafe { self.source.lock().free(Some(self.ptr)) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemAllocator;
    use crate::MemoryConfig;
    use edge_assert::CapturingHandler;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn source() -> SharedSystemAllocator {
        let handler = Arc::new(CapturingHandler::new());
        Arc::new(Mutex::new(SystemAllocator::with_config(
            &MemoryConfig::development(),
            handler,
        )))
    }

    #[test]
    fn test_buffer_returned_on_drop() {
        let source = source();
        {
            let buffer = Buffer::allocate(&source, 256, 64, MemoryTag::Temp).unwrap();
            assert_eq!(buffer.address() % 64, 0);
            assert_eq!(source.lock().tag_stats(MemoryTag::Temp).current_usage, 256);
            assert_eq!(buffer.offset_of(buffer.address() + 255), Some(255));
            assert_eq!(buffer.offset_of(buffer.address() + 256), None);
            assert_eq!(buffer.offset_of(buffer.address().wrapping_sub(1)), None);
        }
        let stats = source.lock().stats();
        assert!(stats.is_balanced());
        assert_eq!(stats.total_freed, 256);
    }

    #[test]
    fn test_exhaustion_is_an_error_not_a_report() {
        let handler = Arc::new(CapturingHandler::new());
        let source: SharedSystemAllocator = Arc::new(Mutex::new(SystemAllocator::with_config(
            &MemoryConfig::development(),
            handler.clone(),
        )));

        let result = Buffer::allocate(&source, 1 << 62, 16, MemoryTag::NoTag);
        assert!(matches!(result, Err(MemoryError::BufferAllocationFailed { size }) if size == 1 << 62));
        assert_eq!(handler.count(), 0);
        assert_eq!(source.lock().stats(), crate::MemoryStats::new());
    }

    #[test]
    fn test_invalid_requests() {
        let source = source();
        assert!(matches!(
            Buffer::allocate(&source, 0, 16, MemoryTag::NoTag),
            Err(MemoryError::ZeroCapacity)
        ));
        assert!(matches!(
            Buffer::allocate(&source, 16, 12, MemoryTag::NoTag),
            Err(MemoryError::InvalidAlignment(12))
        ));
    }
}
