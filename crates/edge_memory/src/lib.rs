//! # Edge Memory
//!
//! Allocation strategies with tracking, designed for:
//! - Per-subsystem memory accounting through tags
//! - Leak reports that name the allocating call site
//! - Frame-scoped and fixed-size allocations with no per-call heap traffic
//!
//! ## Strategies
//!
//! | Strategy             | Allocate | Free           | Reset                  |
//! |----------------------|----------|----------------|------------------------|
//! | [`SystemAllocator`]  | platform | platform       | stats only, when empty |
//! | [`LinearAllocator`]  | bump     | no-op          | rewinds the buffer     |
//! | [`PoolAllocator`]    | pop slot | push slot      | rebuilds the free list |
//!
//! All three implement [`Allocator`], so callers can hold
//! `&mut dyn Allocator` and never name a strategy.
//!
//! ## Architecture Rules
//!
//! 1. **No panics in allocator operations** - Invalid requests are reported
//!    through [`edge_assert`] and yield `None`
//! 2. **Linear and pool buffers are pre-allocated** - Drawn once from a
//!    system allocator and returned on drop
//! 3. **Statistics are copies** - Callers never observe counters mid-update
//!
//! ## Example
//!
//! ```rust,ignore
//! use edge_memory::{Allocator, LinearAllocator, MemoryTag};
//!
//! let mut frame = LinearAllocator::new(64 * 1024)?;
//! let scratch = frame.allocate_tagged(256, MemoryTag::Temp, 16);
//! // ... end of frame
//! frame.reset();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod align;
pub mod allocator;
mod buffer;
pub mod config;
pub mod construct;
pub mod error;
pub mod global;
pub mod linear;
pub mod platform;
pub mod pool;
pub mod stats;
pub mod system;
pub mod tag;

pub use align::{CACHE_LINE_SIZE, DEFAULT_ALIGNMENT, SIMD_ALIGNMENT};
pub use allocator::Allocator;
pub use config::MemoryConfig;
pub use construct::{delete_in, new_in};
pub use error::{MemoryError, MemoryResult};
pub use global::SharedSystemAllocator;
pub use linear::LinearAllocator;
pub use pool::PoolAllocator;
pub use stats::MemoryStats;
pub use system::{LeakRecord, LeakReport, SystemAllocator};
pub use tag::MemoryTag;
