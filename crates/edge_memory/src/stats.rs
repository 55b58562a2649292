//! # Allocation Statistics
//!
//! Plain counters owned by each allocator. Callers only ever see copies.

/// Aggregate allocation counters.
///
/// `current_usage == total_allocated - total_freed` holds after every update,
/// and `peak_usage` never decreases until the owner resets the counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Bytes handed out since construction or the last reset.
    pub total_allocated: usize,
    /// Bytes returned since construction or the last reset.
    pub total_freed: usize,
    /// Bytes currently live.
    pub current_usage: usize,
    /// Highest value `current_usage` has reached.
    pub peak_usage: usize,
    /// Number of successful allocations.
    pub allocation_count: usize,
    /// Number of successful frees.
    pub free_count: usize,
}

impl MemoryStats {
    /// Creates zeroed statistics.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total_allocated: 0,
            total_freed: 0,
            current_usage: 0,
            peak_usage: 0,
            allocation_count: 0,
            free_count: 0,
        }
    }

    /// Records an allocation of `size` bytes.
    #[inline]
    pub fn record_allocation(&mut self, size: usize) {
        self.total_allocated += size;
        self.current_usage += size;
        self.peak_usage = self.peak_usage.max(self.current_usage);
        self.allocation_count += 1;
    }

    /// Records a free of `size` bytes.
    #[inline]
    pub fn record_free(&mut self, size: usize) {
        self.total_freed += size;
        self.current_usage -= size;
        self.free_count += 1;
    }

    /// Treats every live allocation as freed in one step.
    ///
    /// Used by bulk-reclaiming allocators: totals and peak are kept, so the
    /// history survives the reset.
    pub fn release_all(&mut self) {
        self.total_freed += self.current_usage;
        self.current_usage = 0;
        self.free_count = self.allocation_count;
    }

    /// Number of allocations that have not been freed.
    #[inline]
    #[must_use]
    pub const fn live_allocations(&self) -> usize {
        self.allocation_count - self.free_count
    }

    /// Returns whether nothing is outstanding.
    #[inline]
    #[must_use]
    pub const fn is_balanced(&self) -> bool {
        self.allocation_count == self.free_count
    }
}
