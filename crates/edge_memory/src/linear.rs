//! # Linear Allocator
//!
//! A bump allocator for temporary allocations that are freed all at once.

// SAFETY: Only the `Allocator::free` signature is unsafe here; pointer math
// uses wrapping arithmetic on the owned buffer.
#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::Arc;

use edge_assert::{edge_assert_warn, edge_verify, global_handler, AssertHandler};

use crate::align::{align_ptr, is_power_of_two, CACHE_LINE_SIZE};
use crate::allocator::Allocator;
use crate::buffer::Buffer;
use crate::error::MemoryResult;
use crate::global::{self, SharedSystemAllocator};
use crate::stats::MemoryStats;
use crate::tag::MemoryTag;

/// A bump-pointer allocator over one fixed buffer.
///
/// Allocations are fast (just bump an offset). Individual frees do nothing;
/// memory comes back only when the allocator is reset or dropped.
///
/// # Thread Safety
///
/// This allocator is NOT thread-safe. Use one per thread.
///
/// # Example
///
/// ```rust,ignore
/// let mut frame = LinearAllocator::new(1024 * 1024)?; // 1MB
///
/// // Fast allocations
/// let verts = frame.allocate(4096, 16);
///
/// // Reset at end of frame to reclaim everything
/// frame.reset();
/// ```
pub struct LinearAllocator {
    /// The backing storage.
    buffer: Buffer,
    /// Current allocation offset.
    offset: usize,
    /// Counters.
    stats: MemoryStats,
    /// Receives every invariant violation.
    handler: Arc<dyn AssertHandler>,
}

impl LinearAllocator {
    /// Creates an allocator of `capacity` bytes backed by the process-wide
    /// system allocator.
    ///
    /// # Errors
    ///
    /// Fails if `capacity` is zero or the buffer cannot be allocated.
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        Self::with_source(capacity, &global::system_allocator(), global_handler())
    }

    /// Creates an allocator of `capacity` bytes drawn from `source`.
    ///
    /// # Errors
    ///
    /// Fails if `capacity` is zero or the buffer cannot be allocated.
    pub fn with_source(
        capacity: usize,
        source: &SharedSystemAllocator,
        handler: Arc<dyn AssertHandler>,
    ) -> MemoryResult<Self> {
        let buffer = Buffer::allocate(source, capacity, CACHE_LINE_SIZE, MemoryTag::NoTag)?;
        tracing::debug!("Linear allocator created with {capacity} bytes");

        Ok(Self {
            buffer,
            offset: 0,
            stats: MemoryStats::new(),
            handler,
        })
    }

    /// Returns the total capacity in bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the current offset, including alignment padding.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.offset
    }

    /// Returns the remaining free space in bytes.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.capacity() - self.offset
    }

    /// Returns whether `ptr` lies inside the buffer.
    #[inline]
    #[must_use]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.buffer.offset_of(ptr.as_ptr() as usize).is_some()
    }
}

impl Allocator for LinearAllocator {
    /// The tag is accepted for interface uniformity; linear allocators keep
    /// no per-tag breakdown.
    fn allocate_tagged(
        &mut self,
        size: usize,
        _tag: MemoryTag,
        alignment: usize,
    ) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        if !edge_verify!(
            self.handler,
            is_power_of_two(alignment),
            "alignment {alignment} is not a power of two"
        ) {
            return None;
        }

        let base = self.buffer.as_ptr();
        let aligned = align_ptr(base.wrapping_add(self.offset), alignment);
        let aligned_offset = aligned as usize - base as usize;
        let end = aligned_offset
            .checked_add(size)
            .filter(|&end| end <= self.capacity());

        if !edge_verify!(
            self.handler,
            end.is_some(),
            "linear allocator out of memory: {size} bytes at offset {aligned_offset}, capacity {}",
            self.capacity()
        ) {
            return None;
        }

        self.offset = end?;
        self.stats.record_allocation(size);
        NonNull::new(aligned)
    }

    /// No-op: linear allocators only reclaim in bulk.
    unsafe fn free(&mut self, _ptr: Option<NonNull<u8>>) {}

    fn stats(&self) -> MemoryStats {
        self.stats
    }

    /// Rewinds to the start of the buffer, invalidating every previous
    /// allocation.
    ///
    /// This is a **zero-cost** operation: no memory is freed or reallocated.
    /// Callers must guarantee no outstanding references; live blocks are
    /// reported at `Warning` but the reset goes ahead.
    fn reset(&mut self) {
        let live = self.stats.live_allocations();
        edge_assert_warn!(
            self.handler,
            live == 0,
            "linear reset invalidates {live} live allocations"
        );

        self.offset = 0;
        self.stats.release_all();
        tracing::debug!("Linear allocator reset");
    }
}
