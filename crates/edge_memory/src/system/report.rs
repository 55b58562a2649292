//! Leak report types.

use std::fmt;
use std::panic::Location;

use crate::tag::MemoryTag;

/// One allocation that was still live when the report was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeakRecord {
    /// Address handed to the caller.
    pub address: usize,
    /// Requested size in bytes.
    pub size: usize,
    /// Charged subsystem.
    pub tag: MemoryTag,
    /// Call site, if source locations were recorded.
    pub location: Option<&'static Location<'static>>,
}

impl fmt::Display for LeakRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes at {:#x} [{}]", self.size, self.address, self.tag)?;
        match self.location {
            Some(location) => write!(f, " allocated at {}:{}", location.file(), location.line()),
            None => f.write_str(" (unknown location)"),
        }
    }
}

/// Every live allocation of a system allocator, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LeakReport {
    /// Individual blocks. Empty when tracking is disabled.
    pub leaks: Vec<LeakRecord>,
    /// Allocations not yet freed, tracked or not.
    pub live_count: usize,
    /// Bytes not yet freed.
    pub total_bytes: usize,
}

impl LeakReport {
    /// Returns whether nothing leaked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// Sum of leaked bytes charged to `tag`.
    #[must_use]
    pub fn bytes_for(&self, tag: MemoryTag) -> usize {
        self.leaks.iter().filter(|leak| leak.tag == tag).map(|leak| leak.size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_display() {
        let record = LeakRecord {
            address: 0x1000,
            size: 64,
            tag: MemoryTag::Physics,
            location: None,
        };
        assert_eq!(record.to_string(), "64 bytes at 0x1000 [Physics] (unknown location)");

        let located = LeakRecord {
            location: Some(Location::caller()),
            ..record
        };
        assert!(located.to_string().contains("report.rs"));
    }

    #[test]
    fn test_bytes_for_tag() {
        let leak = |size, tag| LeakRecord {
            address: 0,
            size,
            tag,
            location: None,
        };
        let report = LeakReport {
            leaks: vec![leak(10, MemoryTag::Ai), leak(20, MemoryTag::Gui), leak(5, MemoryTag::Ai)],
            live_count: 3,
            total_bytes: 35,
        };
        assert_eq!(report.bytes_for(MemoryTag::Ai), 15);
        assert!(!report.is_empty());
        assert!(LeakReport::default().is_empty());
    }
}
