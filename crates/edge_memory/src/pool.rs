//! # Pool Allocator
//!
//! Fixed-size slot allocator for objects that are frequently allocated and
//! freed.
//!
//! Free slots form a singly-linked list threaded through the slots
//! themselves: the first word of a free slot holds the address of the next
//! free slot, or null at the end of the list.
//!
//! ```text
//! buffer: [slot 0][slot 1][slot 2][slot 3]
//! head -> slot 0 -> slot 1 -> slot 2 -> slot 3 -> null   (after construction)
//! ```

// SAFETY: This module threads the free list through the slots of its own
// buffer. All reads and writes of free-list words happen in `build_free_list`,
// `pop_free` and `push_free`.
#![allow(unsafe_code)]

use std::ptr::{self, NonNull};
use std::sync::Arc;

use edge_assert::{edge_assert, edge_assert_warn, edge_verify, global_handler, AssertHandler};

use crate::align::{checked_align_up, is_power_of_two};
use crate::allocator::Allocator;
use crate::buffer::Buffer;
use crate::error::{MemoryError, MemoryResult};
use crate::global::{self, SharedSystemAllocator};
use crate::stats::MemoryStats;
use crate::tag::MemoryTag;

/// Smallest slot: every free slot must hold a next pointer.
const MIN_SLOT_SIZE: usize = std::mem::size_of::<*mut u8>();

/// Smallest slot alignment: free-list words are read and written aligned.
const MIN_SLOT_ALIGNMENT: usize = std::mem::align_of::<*mut u8>();

/// One bit per slot: 1 = handed out, 0 = on the free list.
///
/// At 64 slots per u64, a pool of 1M slots needs ~122KB of bookkeeping.
struct SlotBits {
    bits: Vec<u64>,
}

impl SlotBits {
    fn new(slots: usize) -> Self {
        Self {
            bits: vec![0; slots.div_ceil(64)],
        }
    }

    #[inline]
    fn is_set(&self, index: usize) -> bool {
        self.bits[index / 64] & (1u64 << (index % 64)) != 0
    }

    #[inline]
    fn set(&mut self, index: usize) {
        self.bits[index / 64] |= 1u64 << (index % 64);
    }

    #[inline]
    fn clear(&mut self, index: usize) {
        self.bits[index / 64] &= !(1u64 << (index % 64));
    }

    fn clear_all(&mut self) {
        self.bits.fill(0);
    }

    fn count(&self) -> usize {
        self.bits.iter().map(|word| word.count_ones() as usize).sum()
    }
}

/// A pool allocator for fixed-size slots.
///
/// Slots can be allocated and freed individually in O(1), but every slot has
/// the same size. This is perfect for things like particles, network packets,
/// or temporary game objects.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. Use one pool per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = PoolAllocator::new(32, 10_000, 16)?;
///
/// // Allocate - O(1), no heap allocation
/// let particle = pool.allocate(32, 16);
///
/// // Free - O(1), no heap deallocation
/// unsafe { pool.free(particle) };
/// ```
pub struct PoolAllocator {
    /// The backing storage.
    buffer: Buffer,
    /// First free slot.
    free_head: Option<NonNull<u8>>,
    /// Largest request a slot satisfies.
    element_size: usize,
    /// Number of slots.
    element_count: usize,
    /// Distance between slots.
    aligned_element_size: usize,
    /// Alignment of every slot.
    alignment: usize,
    /// Which slots are handed out.
    live: SlotBits,
    /// Counters, charged per slot.
    stats: MemoryStats,
    /// Receives every invariant violation.
    handler: Arc<dyn AssertHandler>,
}

// SAFETY: `free_head` points into `buffer`, which this pool owns exclusively.
unsafe impl Send for PoolAllocator {}

impl PoolAllocator {
    /// Creates a pool of `element_count` slots of `element_size` bytes,
    /// backed by the process-wide system allocator.
    ///
    /// All memory is pre-allocated upfront.
    ///
    /// # Errors
    ///
    /// Fails on a zero size or count, a non-power-of-two alignment, or if the
    /// buffer cannot be allocated.
    pub fn new(element_size: usize, element_count: usize, alignment: usize) -> MemoryResult<Self> {
        Self::with_source(
            element_size,
            element_count,
            alignment,
            &global::system_allocator(),
            global_handler(),
        )
    }

    /// Creates a pool whose buffer is drawn from `source`.
    ///
    /// # Errors
    ///
    /// Fails on a zero size or count, a non-power-of-two alignment, or if the
    /// buffer cannot be allocated.
    pub fn with_source(
        element_size: usize,
        element_count: usize,
        alignment: usize,
        source: &SharedSystemAllocator,
        handler: Arc<dyn AssertHandler>,
    ) -> MemoryResult<Self> {
        if element_size == 0 || element_count == 0 {
            return Err(MemoryError::ZeroCapacity);
        }
        if !is_power_of_two(alignment) {
            return Err(MemoryError::InvalidAlignment(alignment));
        }

        let alignment = alignment.max(MIN_SLOT_ALIGNMENT);
        let aligned_element_size = checked_align_up(element_size.max(MIN_SLOT_SIZE), alignment)
            .ok_or(MemoryError::BufferAllocationFailed { size: usize::MAX })?;
        let total = aligned_element_size
            .checked_mul(element_count)
            .ok_or(MemoryError::BufferAllocationFailed { size: usize::MAX })?;
        let buffer = Buffer::allocate(source, total, alignment, MemoryTag::NoTag)?;

        let mut pool = Self {
            buffer,
            free_head: None,
            element_size,
            element_count,
            aligned_element_size,
            alignment,
            live: SlotBits::new(element_count),
            stats: MemoryStats::new(),
            handler,
        };
        pool.build_free_list();

        tracing::debug!(
            "Pool allocator created: {element_count} slots of {element_size} bytes (stride {aligned_element_size})"
        );
        Ok(pool)
    }

    /// Returns the number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.element_count
    }

    /// Returns the requested slot size.
    #[inline]
    #[must_use]
    pub const fn element_size(&self) -> usize {
        self.element_size
    }

    /// Returns the distance between slots.
    #[inline]
    #[must_use]
    pub const fn aligned_element_size(&self) -> usize {
        self.aligned_element_size
    }

    /// Returns the alignment of every slot.
    #[inline]
    #[must_use]
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    /// Returns the number of free slots.
    #[inline]
    #[must_use]
    pub const fn available(&self) -> usize {
        self.element_count - self.stats.live_allocations()
    }

    /// Returns whether `ptr` lies inside the pool's buffer.
    #[inline]
    #[must_use]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        self.buffer.offset_of(ptr.as_ptr() as usize).is_some()
    }

    /// Chains every slot into the free list in address order.
    fn build_free_list(&mut self) {
        let base = self.buffer.as_ptr();
        let stride = self.aligned_element_size;

        for index in 0..self.element_count {
            let next = if index + 1 < self.element_count {
                base.wrapping_add((index + 1) * stride)
            } else {
                ptr::null_mut()
            };
            // SAFETY: slot `index` lies inside the buffer and is aligned for
            // a pointer because `stride` and the buffer start are multiples
            // of `MIN_SLOT_ALIGNMENT`.
            unsafe { ptr::write(base.add(index * stride).cast::<*mut u8>(), next) };
        }

        self.free_head = NonNull::new(base);
    }

    /// Pops the head of the free list.
    fn pop_free(&mut self) -> Option<NonNull<u8>> {
        let slot = self.free_head?;
        // SAFETY: `slot` is on the free list, so its first word is a
        // free-list link written by this pool.
        let next = unsafe { ptr::read(slot.as_ptr().cast::<*mut u8>()) };
        self.free_head = NonNull::new(next);
        Some(slot)
    }

    /// Pushes `slot` onto the head of the free list.
    ///
    /// # Safety
    ///
    /// `slot` must be a slot boundary inside the buffer that is not on the
    /// free list.
    unsafe fn push_free(&mut self, slot: NonNull<u8>) {
        let next = self.free_head.map_or(ptr::null_mut(), NonNull::as_ptr);
        ptr::write(slot.as_ptr().cast::<*mut u8>(), next);
        self.free_head = Some(slot);
    }

    /// Slot index of `ptr`, or `None` (reported) if it is not a slot of this
    /// pool.
    fn slot_index(&self, ptr: NonNull<u8>) -> Option<usize> {
        let offset = self.buffer.offset_of(ptr.as_ptr() as usize);
        if !edge_verify!(
            self.handler,
            offset.is_some(),
            "free of {ptr:p} outside pool range [{:#x}, {:#x})",
            self.buffer.address(),
            self.buffer.address() + self.buffer.len()
        ) {
            return None;
        }

        let offset = offset?;
        if !edge_verify!(
            self.handler,
            offset % self.aligned_element_size == 0,
            "free of {ptr:p} is not on a slot boundary (offset {offset}, stride {})",
            self.aligned_element_size
        ) {
            return None;
        }

        Some(offset / self.aligned_element_size)
    }
}

impl Allocator for PoolAllocator {
    /// Hands out one whole slot. The tag is accepted for interface
    /// uniformity; pools keep no per-tag breakdown.
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
        if !edge_verify!(
            self.handler,
            size <= self.element_size,
            "request of {size} bytes exceeds pool slot size {}",
            self.element_size
        ) {
            return None;
        }
        if !edge_verify!(
            self.handler,
            alignment <= self.alignment,
            "alignment {alignment} exceeds pool slot alignment {}",
            self.alignment
        ) {
            return None;
        }
        if !edge_verify!(
            self.handler,
            self.free_head.is_some(),
            "pool out of memory: all {} slots in use",
            self.element_count
        ) {
            return None;
        }

        let slot = self.pop_free()?;
        let index = (slot.as_ptr() as usize - self.buffer.address()) / self.aligned_element_size;
        self.live.set(index);
        self.stats.record_allocation(self.element_size);
        Some(slot)
    }

    unsafe fn free(&mut self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else {
            return;
        };
        let Some(index) = self.slot_index(ptr) else {
            return;
        };
        if !edge_verify!(
            self.handler,
            self.live.is_set(index),
            "double free of pool slot {index} ({ptr:p})"
        ) {
            return;
        }

        self.live.clear(index);
        self.push_free(ptr);
        self.stats.record_free(self.element_size);
    }

    fn stats(&self) -> MemoryStats {
        self.stats
    }

    /// Puts every slot back on the free list, whether or not it was live.
    ///
    /// Callers must guarantee no outstanding references; live slots are
    /// reported at `Warning` but the reset goes ahead.
    fn reset(&mut self) {
        let live = self.stats.live_allocations();
        edge_assert!(
            self.handler,
            live == self.live.count(),
            "pool bookkeeping mismatch: {live} counted live, {} slots marked",
            self.live.count()
        );
        edge_assert_warn!(
            self.handler,
            live == 0,
            "pool reset invalidates {live} live allocations"
        );

        self.build_free_list();
        self.live.clear_all();
        self.stats.release_all();
        tracing::debug!("Pool allocator reset");
    }
}
