//! # Allocation Headers
//!
//! Every tracked block starts with padding followed by an [`AllocationHeader`]
//! that sits immediately before the user region:
//!
//! ```text
//! block start (aligned)
//! +----------------------+
//! |   padding (maybe 0)  |
//! +----------------------+
//! |   AllocationHeader   |  <- user - HEADER_SIZE
//! +----------------------+
//! |   user region        |  <- returned pointer, aligned
//! +----------------------+
//! ```
//!
//! `header_span(alignment)` bytes separate the block start from the user
//! region, so the header is always found by subtracting [`HEADER_SIZE`] and
//! the block start by subtracting the span recorded through its alignment.
//!
//! Live headers are chained into a doubly-linked [`HeaderList`]. The links
//! live inside the headers, so tracking costs no extra allocation and
//! unlinking is O(1) given the header.

// SAFETY: This module is the unsafe boundary for header placement and the
// intrusive list. Callers above it only see typed operations.
#![allow(unsafe_code)]

use std::panic::Location;
use std::ptr::{self, NonNull};

use crate::align::align_up;
use crate::tag::MemoryTag;

/// Written into every live header.
pub const GUARD_LIVE: u64 = 0xED6E_A110_CA7E_D001;

/// Written into a header just before its block is released.
///
/// Seeing it again on free means a double free, but only while the platform
/// has not reused the block, so detection is best-effort.
pub const GUARD_FREED: u64 = 0xED6E_DEAD_F4EE_D001;

/// Bytes between a header's start and the user region.
pub const HEADER_SIZE: usize = std::mem::size_of::<AllocationHeader>();

/// Alignment every tracked block is raised to, so headers are always aligned.
pub const HEADER_ALIGNMENT: usize = std::mem::align_of::<AllocationHeader>();

/// Bytes from block start to user region for a block aligned to `alignment`.
#[inline]
#[must_use]
pub const fn header_span(alignment: usize) -> usize {
    align_up(HEADER_SIZE, alignment)
}

/// Metadata stored in front of a tracked allocation.
///
/// The links come first: they are the words a platform allocator reuses for
/// its own free lists once the block is released. The guard comes last, so it
/// sits right against the user region and also catches buffer underruns.
#[repr(C)]
pub struct AllocationHeader {
    /// Previous live header.
    prev: *mut AllocationHeader,
    /// Next live header.
    next: *mut AllocationHeader,
    /// Requested size in bytes.
    pub size: usize,
    /// Effective alignment of the block.
    pub alignment: usize,
    /// Call site that requested the block.
    pub location: Option<&'static Location<'static>>,
    /// Id of the allocator that handed the block out.
    pub owner: u64,
    /// Charged subsystem.
    pub tag: MemoryTag,
    /// Sentinel checked on free.
    pub guard: u64,
}

impl AllocationHeader {
    /// Writes a fresh, unlinked header in front of `user`.
    ///
    /// # Safety
    ///
    /// `user - HEADER_SIZE .. user` must be writable memory owned by the
    /// caller and aligned for `AllocationHeader`.
    pub unsafe fn write_before(
        user: NonNull<u8>,
        size: usize,
        alignment: usize,
        tag: MemoryTag,
        location: Option<&'static Location<'static>>,
        owner: u64,
    ) -> NonNull<Self> {
        let header = Self::from_user(user);
        ptr::write(
            header.as_ptr(),
            Self {
                prev: ptr::null_mut(),
                next: ptr::null_mut(),
                size,
                alignment,
                location,
                owner,
                tag,
                guard: GUARD_LIVE,
            },
        );
        header
    }

    /// Returns the header that precedes `user`.
    ///
    /// # Safety
    ///
    /// The result is only meaningful if `user` came from
    /// [`AllocationHeader::user_of`]. Reading through it is undefined
    /// otherwise; the guard check is a best-effort defense, not a proof.
    #[inline]
    pub unsafe fn from_user(user: NonNull<u8>) -> NonNull<Self> {
        NonNull::new_unchecked(user.as_ptr().sub(HEADER_SIZE).cast::<Self>())
    }

    /// Returns the user region that follows `header`.
    ///
    /// # Safety
    ///
    /// `header` must have been written with [`AllocationHeader::write_before`].
    #[inline]
    pub unsafe fn user_of(header: NonNull<Self>) -> NonNull<u8> {
        NonNull::new_unchecked(header.as_ptr().cast::<u8>().add(HEADER_SIZE))
    }

    /// Returns the start of the platform block that holds `header`.
    ///
    /// # Safety
    ///
    /// `header` must be a live header with an intact `alignment` field.
    #[inline]
    pub unsafe fn block_of(header: NonNull<Self>) -> NonNull<u8> {
        let user = Self::user_of(header);
        let span = header_span((*header.as_ptr()).alignment);
        NonNull::new_unchecked(user.as_ptr().sub(span))
    }
}

/// Doubly-linked list of live headers. Insertion at the tail, O(1) removal.
pub struct HeaderList {
    head: *mut AllocationHeader,
    tail: *mut AllocationHeader,
    len: usize,
}

impl HeaderList {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
            len: 0,
        }
    }

    /// Number of linked headers.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the list is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Links `header` at the tail.
    ///
    /// # Safety
    ///
    /// `header` must be valid, unlinked, and stay valid until removed.
    pub unsafe fn push_back(&mut self, header: NonNull<AllocationHeader>) {
        let node = header.as_ptr();
        (*node).prev = self.tail;
        (*node).next = ptr::null_mut();

        if self.tail.is_null() {
            self.head = node;
        } else {
            (*self.tail).next = node;
        }

        self.tail = node;
        self.len += 1;
    }

    /// Unlinks `header`.
    ///
    /// # Safety
    ///
    /// `header` must currently be linked into this list.
    pub unsafe fn remove(&mut self, header: NonNull<AllocationHeader>) {
        let node = header.as_ptr();
        let prev = (*node).prev;
        let next = (*node).next;

        if prev.is_null() {
            self.head = next;
        } else {
            (*prev).next = next;
        }

        if next.is_null() {
            self.tail = prev;
        } else {
            (*next).prev = prev;
        }

        (*node).prev = ptr::null_mut();
        (*node).next = ptr::null_mut();
        self.len -= 1;
    }

    /// Walks the list from head to tail.
    ///
    /// # Safety
    ///
    /// Every linked header must stay valid and unmodified while the iterator
    /// is alive.
    pub unsafe fn iter(&self) -> HeaderIter<'_> {
        HeaderIter {
            current: self.head,
            _list: self,
        }
    }
}

impl Default for HeaderList {
    fn default() -> Self {
        Self::new()
    }
}

/// Head-to-tail walk over a [`HeaderList`].
pub struct HeaderIter<'a> {
    current: *mut AllocationHeader,
    _list: &'a HeaderList,
}

impl<'a> Iterator for HeaderIter<'a> {
    type Item = &'a AllocationHeader;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }
        // SAFETY: upheld by the caller of `HeaderList::iter`.
        let header = unsafe { &*self.current };
        self.current = header.next;
        Some(header)
    }
}
