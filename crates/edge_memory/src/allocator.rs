//! # Allocator Capability
//!
//! The contract every strategy implements. Callers hold `&mut dyn Allocator`
//! (or a generic `A: Allocator`) and never name a concrete strategy.
//!
//! ## Contract
//!
//! - `allocate*` with `size == 0` returns `None` without reporting anything.
//! - `alignment` must be a power of two. Violations are reported and the
//!   call returns `None` without touching any state.
//! - A returned pointer is aligned to `alignment` and valid for `size` bytes
//!   until it is freed or the allocator is reset.
//! - Freeing `None` is a no-op.
//! - No operation panics: failures go to the allocator's diagnostic handler.

// SAFETY: `free` is an unsafe trait method; implementations live in their
// own modules.
#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::align::DEFAULT_ALIGNMENT;
use crate::stats::MemoryStats;
use crate::tag::MemoryTag;

/// Common interface of the system, linear and pool allocators.
pub trait Allocator {
    /// Allocates `size` bytes charged to `tag`.
    ///
    /// Strategies that record source locations attribute the block to the
    /// caller of this method.
    #[track_caller]
    fn allocate_tagged(
        &mut self,
        size: usize,
        tag: MemoryTag,
        alignment: usize,
    ) -> Option<NonNull<u8>>;

    /// Allocates `size` untagged bytes.
    #[track_caller]
    fn allocate(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        self.allocate_tagged(size, MemoryTag::NoTag, alignment)
    }

    /// Allocates `size` untagged bytes at [`DEFAULT_ALIGNMENT`].
    #[track_caller]
    fn allocate_default(&mut self, size: usize) -> Option<NonNull<u8>> {
        self.allocate_tagged(size, MemoryTag::NoTag, DEFAULT_ALIGNMENT)
    }

    /// Returns a block to the allocator. `None` is ignored.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this allocator instance and not freed
    /// since. Strategies that can detect a violation report it and reject
    /// the free, but detection is best-effort.
    unsafe fn free(&mut self, ptr: Option<NonNull<u8>>);

    /// Returns a snapshot of the allocator's counters.
    fn stats(&self) -> MemoryStats;

    /// Returns the allocator to its initial usable state.
    ///
    /// Every pointer handed out before the reset becomes invalid.
    fn reset(&mut self);
}
