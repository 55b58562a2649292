//! # Memory Error Types
//!
//! Errors raised while constructing allocators or loading configuration.
//!
//! Allocation and free never produce these: they report through the
//! diagnostic handler and return an empty result instead.

use thiserror::Error;

/// Errors that can occur while setting up the memory system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// A buffer-backed allocator was asked for zero bytes or zero slots.
    #[error("allocator capacity must be greater than zero")]
    ZeroCapacity,

    /// Alignment was not a power of two.
    #[error("alignment {0} is not a power of two")]
    InvalidAlignment(usize),

    /// The backing allocator could not provide the buffer.
    #[error("failed to allocate backing buffer of {size} bytes")]
    BufferAllocationFailed {
        /// Requested buffer size in bytes.
        size: usize,
    },

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for memory system setup.
pub type MemoryResult<T> = Result<T, MemoryError>;
