//! # Tracking System Allocator
//!
//! General-purpose allocator over the platform's aligned allocation
//! primitive.
//!
//! With tracking enabled every block carries an [`AllocationHeader`] linked
//! into an intrusive list, which gives per-tag statistics, guard checks on
//! free and a full leak enumeration. With tracking disabled, blocks go
//! straight to the platform and only allocation/free counts are kept.
//!
//! Tracking can only be toggled while nothing is outstanding, since a block
//! must be freed in the same mode it was allocated in.

// SAFETY: Header placement and list maintenance go through `header`; this
// module only calls into it with blocks it allocated itself.
#![allow(unsafe_code)]

mod header;
mod report;

pub use header::{HEADER_ALIGNMENT, HEADER_SIZE};
pub use report::{LeakRecord, LeakReport};

use std::fmt;
use std::panic::Location;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use edge_assert::{edge_assert_fatal, edge_assert_warn, edge_verify, global_handler, AssertHandler};

use crate::align::is_power_of_two;
use crate::allocator::Allocator;
use crate::config::MemoryConfig;
use crate::platform;
use crate::stats::MemoryStats;
use crate::tag::MemoryTag;

use header::{header_span, AllocationHeader, HeaderList, GUARD_FREED, GUARD_LIVE};

/// Source of allocator ids. Zero is never handed out.
static NEXT_ALLOCATOR_ID: AtomicU64 = AtomicU64::new(1);

/// General-purpose allocator with optional leak tracking.
///
/// # Thread Safety
///
/// Not internally synchronized. Share it behind a mutex
/// (see [`SharedSystemAllocator`](crate::SharedSystemAllocator)).
pub struct SystemAllocator {
    /// Totals across all tags.
    stats: MemoryStats,
    /// Per-tag breakdown, tracked mode only.
    tag_stats: [MemoryStats; MemoryTag::COUNT],
    /// Whether blocks carry headers.
    tracking_enabled: bool,
    /// Whether headers record the call site.
    record_source_locations: bool,
    /// Live tracked blocks, oldest first.
    allocations: HeaderList,
    /// Receives every invariant violation.
    handler: Arc<dyn AssertHandler>,
    /// Stamped into every header; frees of blocks stamped by another
    /// instance are rejected.
    id: u64,
}

// SAFETY: The raw pointers in `allocations` point into blocks this allocator
// owns exclusively; nothing else reaches them through the allocator, so
// moving it to another thread moves sole ownership with it.
unsafe impl Send for SystemAllocator {}

impl SystemAllocator {
    /// Creates an allocator with the default config and the process-wide
    /// diagnostic handler.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(&MemoryConfig::default(), global_handler())
    }

    /// Creates an allocator with the default config reporting to `handler`.
    #[must_use]
    pub fn with_handler(handler: Arc<dyn AssertHandler>) -> Self {
        Self::with_config(&MemoryConfig::default(), handler)
    }

    /// Creates an allocator from `config` reporting to `handler`.
    #[must_use]
    pub fn with_config(config: &MemoryConfig, handler: Arc<dyn AssertHandler>) -> Self {
        tracing::debug!(
            "System allocator created (tracking: {}, source locations: {})",
            config.tracking_enabled,
            config.record_source_locations
        );

        Self {
            stats: MemoryStats::new(),
            tag_stats: [MemoryStats::new(); MemoryTag::COUNT],
            tracking_enabled: config.tracking_enabled,
            record_source_locations: config.record_source_locations,
            allocations: HeaderList::new(),
            handler,
            id: NEXT_ALLOCATOR_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Diagnostic handler this allocator reports to.
    #[inline]
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn AssertHandler> {
        &self.handler
    }

    /// Statistics for allocations charged to `tag`.
    #[inline]
    #[must_use]
    pub fn tag_stats(&self, tag: MemoryTag) -> MemoryStats {
        self.tag_stats[tag.index()]
    }

    /// Returns whether blocks carry headers.
    #[inline]
    #[must_use]
    pub const fn is_tracking_enabled(&self) -> bool {
        self.tracking_enabled
    }

    /// Returns whether headers record the requesting call site.
    #[inline]
    #[must_use]
    pub const fn record_source_locations(&self) -> bool {
        self.record_source_locations
    }

    /// Turns tracking on or off.
    ///
    /// Refused (reported, returns `false`) while allocations are live.
    pub fn set_tracking_enabled(&mut self, enabled: bool) -> bool {
        if enabled == self.tracking_enabled {
            return true;
        }

        let live = self.stats.live_allocations();
        if !edge_verify!(
            self.handler,
            live == 0 && self.allocations.is_empty(),
            "cannot toggle tracking with {live} live allocations"
        ) {
            return false;
        }

        self.tracking_enabled = enabled;
        tracing::debug!("System allocator tracking {}", if enabled { "enabled" } else { "disabled" });
        true
    }

    /// Number of allocations not yet freed.
    #[inline]
    #[must_use]
    pub const fn live_allocations(&self) -> usize {
        self.stats.live_allocations()
    }

    /// Builds a report of every live allocation without emitting it.
    #[must_use]
    pub fn leak_report(&self) -> LeakReport {
        // SAFETY: linked headers belong to live blocks we own, and `&self`
        // prevents frees while the walk runs.
        let leaks = unsafe { self.allocations.iter() }
            .map(|header| LeakRecord {
                // SAFETY: `header` is linked, so it was written by `write_before`.
                address: unsafe { AllocationHeader::user_of(NonNull::from(header)) }.as_ptr() as usize,
                size: header.size,
                tag: header.tag,
                location: header.location,
            })
            .collect();

        LeakReport {
            leaks,
            live_count: self.stats.live_allocations(),
            total_bytes: self.stats.current_usage,
        }
    }

    /// Logs every live allocation and reports the totals at `Warning`.
    ///
    /// Does nothing, and returns an empty report, if every allocation has
    /// been freed.
    pub fn report_leaks(&self) -> LeakReport {
        if self.stats.is_balanced() {
            return LeakReport::default();
        }

        let report = self.leak_report();
        for leak in &report.leaks {
            tracing::warn!("Memory leak: {leak}");
        }
        edge_assert_warn!(
            self.handler,
            self.stats.is_balanced(),
            "{} allocations ({} bytes) still live",
            report.live_count,
            report.total_bytes
        );

        report
    }

    /// Allocates with an explicit call site.
    ///
    /// [`Allocator::allocate_tagged`] forwards here with the caller's
    /// location when source recording is enabled.
    pub fn allocate_at(
        &mut self,
        size: usize,
        tag: MemoryTag,
        alignment: usize,
        location: Option<&'static Location<'static>>,
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

        let block = self.acquire(size, tag, alignment, location);
        edge_assert_fatal!(
            self.handler,
            block.is_some(),
            "platform failed to allocate {size} bytes (alignment {alignment})"
        );
        block
    }

    /// Allocates without reporting platform failure.
    ///
    /// Used for backing buffers, whose constructors surface the failure as a
    /// [`MemoryError`](crate::MemoryError) instead. Zero sizes and invalid
    /// alignments yield `None` silently; callers validate them first.
    #[track_caller]
    pub(crate) fn try_allocate(
        &mut self,
        size: usize,
        tag: MemoryTag,
        alignment: usize,
    ) -> Option<NonNull<u8>> {
        if size == 0 || !is_power_of_two(alignment) {
            return None;
        }
        let location = if self.record_source_locations {
            Some(Location::caller())
        } else {
            None
        };
        self.acquire(size, tag, alignment, location)
    }

    fn acquire(
        &mut self,
        size: usize,
        tag: MemoryTag,
        alignment: usize,
        location: Option<&'static Location<'static>>,
    ) -> Option<NonNull<u8>> {
        if self.tracking_enabled {
            self.allocate_tracked(size, tag, alignment, location)
        } else {
            self.allocate_untracked(size, alignment)
        }
    }

    fn allocate_tracked(
        &mut self,
        size: usize,
        tag: MemoryTag,
        alignment: usize,
        location: Option<&'static Location<'static>>,
    ) -> Option<NonNull<u8>> {
        let alignment = alignment.max(HEADER_ALIGNMENT);
        let span = header_span(alignment);

        let block = size
            .checked_add(span)
            .and_then(|total| platform::aligned_alloc(total, alignment))?;

        // SAFETY: the block holds `span + size` bytes aligned to `alignment`.
        // `span >= HEADER_SIZE`, so the header fits right before `user`, and
        // `user` is aligned for the header because both `span` and
        // `HEADER_SIZE` are multiples of `HEADER_ALIGNMENT`.
        let user = unsafe {
            let user = NonNull::new_unchecked(block.as_ptr().add(span));
            let header = AllocationHeader::write_before(user, size, alignment, tag, location, self.id);
            self.allocations.push_back(header);
            user
        };

        self.stats.record_allocation(size);
        self.tag_stats[tag.index()].record_allocation(size);
        Some(user)
    }

    fn allocate_untracked(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        let block = platform::aligned_alloc(size, alignment)?;
        self.stats.allocation_count += 1;
        Some(block)
    }

    /// # Safety
    ///
    /// See [`Allocator::free`].
    ///
    /// Nothing is unlinked or counted unless the header carries a live guard
    /// and this allocator's id. Double-free detection reads the header of a
    /// released block and is best-effort: once the platform reuses the block
    /// the guard is gone, and the free is reported as corruption instead.
    unsafe fn free_tracked(&mut self, ptr: NonNull<u8>) {
        let header = AllocationHeader::from_user(ptr);
        let (guard, owner) = {
            let header = header.as_ref();
            (header.guard, header.owner)
        };

        if !edge_verify!(
            self.handler,
            guard != GUARD_FREED,
            "double free of {ptr:p} (best-effort detection)"
        ) {
            return;
        }
        if !edge_verify!(
            self.handler,
            guard == GUARD_LIVE,
            "corrupted allocation header at {ptr:p} (guard {guard:#018x}); block leaked"
        ) {
            return;
        }
        if !edge_verify!(
            self.handler,
            owner == self.id,
            "free of {ptr:p} owned by allocator #{owner}, not #{}; block leaked",
            self.id
        ) {
            return;
        }

        let (size, tag) = {
            let header = header.as_ref();
            (header.size, header.tag)
        };
        self.allocations.remove(header);
        self.stats.record_free(size);
        self.tag_stats[tag.index()].record_free(size);

        let block = AllocationHeader::block_of(header);
        (*header.as_ptr()).guard = GUARD_FREED;
        platform::aligned_free(block);
    }
}

impl Default for SystemAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemAllocator")
            .field("stats", &self.stats)
            .field("tracking_enabled", &self.tracking_enabled)
            .field("record_source_locations", &self.record_source_locations)
            .field("id", &self.id)
            .field("live_headers", &self.allocations.len())
            .finish_non_exhaustive()
    }
}

impl Allocator for SystemAllocator {
    #[track_caller]
    fn allocate_tagged(
        &mut self,
        size: usize,
        tag: MemoryTag,
        alignment: usize,
    ) -> Option<NonNull<u8>> {
        let location = if self.record_source_locations {
            Some(Location::caller())
        } else {
            None
        };
        self.allocate_at(size, tag, alignment, location)
    }

    unsafe fn free(&mut self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else {
            return;
        };

        if self.tracking_enabled {
            self.free_tracked(ptr);
            return;
        }

        if !edge_verify!(
            self.handler,
            !self.stats.is_balanced(),
            "free of {ptr:p} without a matching allocation"
        ) {
            return;
        }
        platform::aligned_free(ptr);
        self.stats.free_count += 1;
    }

    fn stats(&self) -> MemoryStats {
        self.stats
    }

    /// Clears all statistics. Refused while allocations are live.
    fn reset(&mut self) {
        let live = self.stats.live_allocations();
        if !edge_verify!(
            self.handler,
            live == 0,
            "reset refused: {live} allocations still live"
        ) {
            return;
        }

        self.stats = MemoryStats::new();
        self.tag_stats = [MemoryStats::new(); MemoryTag::COUNT];
        tracing::debug!("System allocator reset");
    }
}

impl Drop for SystemAllocator {
    /// Reports leaks. Leaked blocks stay allocated: callers may still hold
    /// them.
    fn drop(&mut self) {
        if !self.stats.is_balanced() {
            self.report_leaks();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_assert::{AssertLevel, CapturingHandler};

    fn tracked() -> (SystemAllocator, Arc<CapturingHandler>) {
        let handler = Arc::new(CapturingHandler::new());
        let allocator = SystemAllocator::with_config(&MemoryConfig::development(), handler.clone());
        (allocator, handler)
    }

    fn consistent(stats: &MemoryStats) -> bool {
        stats.current_usage == stats.total_allocated - stats.total_freed
    }

    #[test]
    fn test_allocate_and_free() {
        let (mut allocator, handler) = tracked();

        let ptr = allocator.allocate(100, 16).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 16, 0);
        // SAFETY: writes stay within the 100 requested bytes.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0xAB, 100) };

        let stats = allocator.stats();
        assert_eq!(stats.current_usage, 100);
        assert_eq!(stats.allocation_count, 1);

        unsafe { allocator.free(Some(ptr)) };
        let stats = allocator.stats();
        assert_eq!(stats.current_usage, 0);
        assert_eq!(stats.free_count, 1);
        assert!(consistent(&stats));
        assert_eq!(handler.count(), 0);
    }

    #[test]
    fn test_zero_size_is_empty_not_error() {
        let (mut allocator, handler) = tracked();
        assert!(allocator.allocate(0, 16).is_none());
        assert_eq!(allocator.stats(), MemoryStats::new());
        assert_eq!(handler.count(), 0);

        unsafe { allocator.free(None) };
        assert_eq!(allocator.stats().free_count, 0);
    }

    #[test]
    fn test_bad_alignment_rejected() {
        let (mut allocator, handler) = tracked();
        assert!(allocator.allocate(32, 24).is_none());
        assert_eq!(allocator.stats(), MemoryStats::new());
        assert_eq!(handler.count_at(AssertLevel::Error), 1);
        assert!(handler.contains("not a power of two"));
    }

    #[test]
    fn test_large_alignments() {
        let (mut allocator, _handler) = tracked();
        for shift in 0..13 {
            let alignment = 1usize << shift;
            let ptr = allocator.allocate(7, alignment).unwrap();
            assert_eq!(ptr.as_ptr() as usize % alignment, 0);
            unsafe { allocator.free(Some(ptr)) };
        }
        assert!(allocator.stats().is_balanced());
    }

    #[test]
    fn test_tag_stats() {
        let (mut allocator, _handler) = tracked();

        let a = allocator.allocate_tagged(10, MemoryTag::Animation, 16);
        let b = allocator.allocate_tagged(20, MemoryTag::Animation, 16);
        let c = allocator.allocate_tagged(30, MemoryTag::Animation, 16);
        let other = allocator.allocate_tagged(99, MemoryTag::Net, 16);
        unsafe { allocator.free(b) };

        let anim = allocator.tag_stats(MemoryTag::Animation);
        assert_eq!(anim.allocation_count, 3);
        assert_eq!(anim.free_count, 1);
        assert_eq!(anim.current_usage, 40);
        assert_eq!(allocator.tag_stats(MemoryTag::Net).current_usage, 99);
        assert_eq!(allocator.stats().current_usage, 139);

        unsafe {
            allocator.free(a);
            allocator.free(c);
            allocator.free(other);
        }
    }

    #[test]
    fn test_leak_report_lists_live_blocks_in_order() {
        let (mut allocator, handler) = tracked();

        let blocks: Vec<_> = (1..=5)
            .map(|i| allocator.allocate_tagged(i * 8, MemoryTag::Gameplay, 16))
            .collect();
        unsafe {
            allocator.free(blocks[1]);
            allocator.free(blocks[3]);
        }

        let report = allocator.report_leaks();
        assert_eq!(report.live_count, 3);
        assert_eq!(report.leaks.len(), 3);
        let sizes: Vec<usize> = report.leaks.iter().map(|l| l.size).collect();
        assert_eq!(sizes, vec![8, 24, 40]);
        assert_eq!(report.total_bytes, 72);
        assert_eq!(report.leaks[0].address, blocks[0].unwrap().as_ptr() as usize);
        assert_eq!(handler.count_at(AssertLevel::Warning), 1);

        unsafe {
            allocator.free(blocks[0]);
            allocator.free(blocks[2]);
            allocator.free(blocks[4]);
        }
        assert!(allocator.report_leaks().is_empty());
        assert_eq!(handler.count_at(AssertLevel::Warning), 1);
    }

    #[test]
    fn test_source_location_recorded() {
        let (mut allocator, _handler) = tracked();
        let ptr = allocator.allocate_at(16, MemoryTag::Debug, 16, Some(Location::caller()));

        let report = allocator.leak_report();
        let location = report.leaks[0].location.unwrap();
        assert!(location.file().ends_with("mod.rs"));

        unsafe { allocator.free(ptr) };
    }

    #[test]
    fn test_corrupted_guard_rejects_free() {
        let (mut allocator, handler) = tracked();
        let ptr = allocator.allocate(64, 16).unwrap();

        // SAFETY: the header sits right before `ptr` inside our block.
        let guard = unsafe {
            let header = AllocationHeader::from_user(ptr).as_ptr();
            let original = (*header).guard;
            (*header).guard = 0xDEAD_BEEF;
            original
        };

        unsafe { allocator.free(Some(ptr)) };
        assert!(handler.contains("corrupted allocation header"));
        assert_eq!(allocator.stats().current_usage, 64);
        assert_eq!(allocator.leak_report().leaks.len(), 1);

        // Repair and release for real.
        unsafe {
            (*AllocationHeader::from_user(ptr).as_ptr()).guard = guard;
            allocator.free(Some(ptr));
        }
        assert!(allocator.stats().is_balanced());
    }

    #[test]
    fn test_reset_refused_while_live() {
        let (mut allocator, handler) = tracked();
        let ptr = allocator.allocate(32, 16);

        allocator.reset();
        assert!(handler.contains("reset refused"));
        assert_eq!(allocator.stats().allocation_count, 1);

        unsafe { allocator.free(ptr) };
        allocator.reset();
        assert_eq!(allocator.stats(), MemoryStats::new());
    }

    #[test]
    fn test_untracked_mode() {
        let handler = Arc::new(CapturingHandler::new());
        let mut allocator = SystemAllocator::with_config(&MemoryConfig::release(), handler.clone());
        assert!(!allocator.is_tracking_enabled());

        let ptr = allocator.allocate_tagged(48, MemoryTag::AudioGlobal, 64).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 64, 0);
        assert_eq!(allocator.stats().allocation_count, 1);
        assert_eq!(allocator.stats().current_usage, 0);
        assert!(allocator.leak_report().leaks.is_empty());

        assert!(!allocator.set_tracking_enabled(true));
        assert!(handler.contains("cannot toggle tracking"));

        unsafe { allocator.free(Some(ptr)) };
        assert!(allocator.stats().is_balanced());
        assert!(allocator.set_tracking_enabled(true));
        assert!(allocator.is_tracking_enabled());
    }

    #[test]
    fn test_free_into_other_instance_rejected() {
        let (mut owner, owner_handler) = tracked();
        let (mut other, other_handler) = tracked();

        let ptr = owner.allocate_tagged(64, MemoryTag::Actors, 16);
        let kept = other.allocate(32, 16);
        unsafe { other.free(ptr) };

        assert_eq!(other_handler.count_at(AssertLevel::Error), 1);
        assert!(other_handler.contains("owned by allocator"));
        assert_eq!(other.stats().free_count, 0);
        assert_eq!(other.leak_report().leaks.len(), 1);
        assert_eq!(owner.leak_report().leaks.len(), 1);
        assert_eq!(owner_handler.count(), 0);

        unsafe {
            owner.free(ptr);
            other.free(kept);
        }
        assert!(owner.stats().is_balanced());
        assert!(other.stats().is_balanced());
        assert_eq!(other_handler.count(), 1);
    }

    #[test]
    fn test_double_free_rejected() {
        let (mut allocator, handler) = tracked();
        let ptr = allocator.allocate_tagged(96, MemoryTag::Script, 16);

        unsafe {
            allocator.free(ptr);
            allocator.free(ptr);
        }

        // Nothing on this thread allocates in between, so the block has not
        // been reused; whether the guard survived the platform free decides
        // which of the two messages is reported.
        assert_eq!(handler.count_at(AssertLevel::Error), 1);
        assert!(handler.contains("double free") || handler.contains("corrupted allocation header"));
        let stats = allocator.stats();
        assert_eq!(stats.free_count, 1);
        assert_eq!(stats.total_freed, 96);
        assert!(stats.is_balanced());
        assert!(allocator.leak_report().leaks.is_empty());
    }

    #[test]
    fn test_silent_acquisition_reports_nothing() {
        let (mut allocator, handler) = tracked();
        assert!(allocator.try_allocate(usize::MAX - 8, MemoryTag::Temp, 16).is_none());
        assert!(allocator.try_allocate(0, MemoryTag::Temp, 16).is_none());
        assert!(allocator.try_allocate(16, MemoryTag::Temp, 3).is_none());
        assert_eq!(handler.count(), 0);
        assert_eq!(allocator.stats(), MemoryStats::new());

        assert!(allocator.allocate(usize::MAX - 8, 16).is_none());
        assert_eq!(handler.count_at(AssertLevel::Fatal), 1);
    }
}
