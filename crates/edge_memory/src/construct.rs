//! # Typed Construction
//!
//! Places a value in memory obtained from any [`Allocator`] and tears it
//! down again. The allocator only ever sees raw bytes.

// SAFETY: This module writes values into freshly allocated blocks and drops
// them in place.
#![allow(unsafe_code)]

use std::mem::{align_of, size_of};
use std::ptr::{self, NonNull};

use crate::allocator::Allocator;
use crate::tag::MemoryTag;

/// Allocates room for `value` from `allocator`, charged to `tag`, and moves
/// the value in.
///
/// Zero-sized types never touch the allocator. Returns `None` (dropping
/// `value`) if the allocation fails.
#[track_caller]
pub fn new_in<T, A: Allocator + ?Sized>(
    allocator: &mut A,
    tag: MemoryTag,
    value: T,
) -> Option<NonNull<T>> {
    if size_of::<T>() == 0 {
        std::mem::forget(value);
        return Some(NonNull::dangling());
    }

    let ptr = allocator
        .allocate_tagged(size_of::<T>(), tag, align_of::<T>())?
        .cast::<T>();
    // SAFETY: the block is valid for `size_of::<T>()` bytes and aligned for `T`.
    unsafe { ptr::write(ptr.as_ptr(), value) };
    Some(ptr)
}

/// Drops the value at `ptr` and returns its memory to `allocator`.
///
/// `None` is ignored.
///
/// # Safety
///
/// `ptr` must have come from [`new_in`] with this allocator and must not be
/// used afterwards.
pub unsafe fn delete_in<T, A: Allocator + ?Sized>(allocator: &mut A, ptr: Option<NonNull<T>>) {
    let Some(ptr) = ptr else {
        return;
    };

    ptr::drop_in_place(ptr.as_ptr());
    if size_of::<T>() != 0 {
        allocator.free(Some(ptr.cast::<u8>()));
    }
}
