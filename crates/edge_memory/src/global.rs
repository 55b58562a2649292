//! # Process-Wide Default Allocator
//!
//! One shared [`SystemAllocator`] for code that does not carry an allocator
//! around. It is created lazily on first use, or explicitly with
//! [`initialize`] / [`initialize_with`] / [`install`], and torn down with
//! [`shutdown`].
//!
//! Blocks outlive the instance that handed them out. Freeing one through a
//! replacement instance is reported and rejected, since the replacement did
//! not allocate it.
//!
//! Every free function here locks the instance for the duration of one
//! operation only.

// SAFETY: `free`, `free_aligned` and `delete_object` forward unsafe
// contracts to the shared instance.
#![allow(unsafe_code)]

use std::panic::Location;
use std::ptr::NonNull;
use std::sync::Arc;

use edge_assert::global_handler;
use parking_lot::Mutex;

use crate::align::DEFAULT_ALIGNMENT;
use crate::allocator::Allocator;
use crate::config::MemoryConfig;
use crate::construct;
use crate::stats::MemoryStats;
use crate::system::{LeakReport, SystemAllocator};
use crate::tag::MemoryTag;

/// A system allocator shared between owners.
///
/// Linear and pool allocators hold one of these so their buffers go back to
/// the instance they came from.
pub type SharedSystemAllocator = Arc<Mutex<SystemAllocator>>;

static DEFAULT_ALLOCATOR: Mutex<Option<SharedSystemAllocator>> = Mutex::new(None);

/// Creates the default instance from the default config if none exists.
pub fn initialize() {
    let mut slot = DEFAULT_ALLOCATOR.lock();
    if slot.is_none() {
        *slot = Some(Arc::new(Mutex::new(SystemAllocator::with_config(
            &MemoryConfig::default(),
            global_handler(),
        ))));
        tracing::info!("Default system allocator initialized");
    }
}

/// Replaces the default instance with one built from `config`.
///
/// The previous instance, if any, is dropped once its last owner lets go,
/// and reports its leaks then.
pub fn initialize_with(config: &MemoryConfig) {
    install(SystemAllocator::with_config(config, config.assert_handler()));
    tracing::info!("Default system allocator initialized with {config:?}");
}

/// Replaces the default instance with `allocator`.
///
/// The previous instance, if any, is dropped once its last owner lets go,
/// and reports its leaks then.
pub fn install(allocator: SystemAllocator) {
    let previous = DEFAULT_ALLOCATOR
        .lock()
        .replace(Arc::new(Mutex::new(allocator)));
    drop(previous);
}

/// Detaches the default instance.
///
/// It is dropped (reporting leaks) once linear and pool allocators built on
/// it are gone. The next use creates a fresh instance.
pub fn shutdown() {
    let previous = DEFAULT_ALLOCATOR.lock().take();
    if previous.is_some() {
        tracing::info!("Default system allocator shut down");
    }
    drop(previous);
}

/// Returns the default instance, creating it on first use.
#[must_use]
pub fn system_allocator() -> SharedSystemAllocator {
    let mut slot = DEFAULT_ALLOCATOR.lock();
    Arc::clone(slot.get_or_insert_with(|| {
        Arc::new(Mutex::new(SystemAllocator::with_config(
            &MemoryConfig::default(),
            global_handler(),
        )))
    }))
}

/// Call site to record for a forwarded allocation.
fn location_for(
    allocator: &SystemAllocator,
    caller: &'static Location<'static>,
) -> Option<&'static Location<'static>> {
    if allocator.record_source_locations() {
        Some(caller)
    } else {
        None
    }
}

/// Allocates `size` untagged bytes at [`DEFAULT_ALIGNMENT`] from the default
/// instance.
#[track_caller]
#[must_use]
pub fn allocate(size: usize) -> Option<NonNull<u8>> {
    allocate_tagged(size, MemoryTag::NoTag, DEFAULT_ALIGNMENT)
}

/// Allocates `size` untagged bytes aligned to `alignment` from the default
/// instance.
#[track_caller]
#[must_use]
pub fn allocate_aligned(size: usize, alignment: usize) -> Option<NonNull<u8>> {
    allocate_tagged(size, MemoryTag::NoTag, alignment)
}

/// Allocates `size` bytes charged to `tag` from the default instance.
#[track_caller]
#[must_use]
pub fn allocate_tagged(size: usize, tag: MemoryTag, alignment: usize) -> Option<NonNull<u8>> {
    let caller = Location::caller();
    let shared = system_allocator();
    let mut allocator = shared.lock();
    let location = location_for(&allocator, caller);
    allocator.allocate_at(size, tag, alignment, location)
}

/// Returns a block to the default instance.
///
/// # Safety
///
/// `ptr` must have come from this module's allocation functions and not been
/// freed since.
pub unsafe fn free(ptr: Option<NonNull<u8>>) {
    system_allocator().lock().free(ptr);
}

/// Returns a block allocated with [`allocate_aligned`].
///
/// # Safety
///
/// Same contract as [`free`].
pub unsafe fn free_aligned(ptr: Option<NonNull<u8>>) {
    free(ptr);
}

/// Moves `value` into memory from the default instance, charged to
/// [`MemoryTag::Default`].
#[track_caller]
#[must_use]
pub fn new_object<T>(value: T) -> Option<NonNull<T>> {
    let shared = system_allocator();
    let mut allocator = shared.lock();
    construct::new_in(&mut *allocator, MemoryTag::Default, value)
}

/// Drops and frees a value created by [`new_object`].
///
/// # Safety
///
/// `ptr` must have come from [`new_object`] and must not be used afterwards.
pub unsafe fn delete_object<T>(ptr: Option<NonNull<T>>) {
    let shared = system_allocator();
    let mut allocator = shared.lock();
    construct::delete_in(&mut *allocator, ptr);
}

/// Turns tracking on the default instance on or off.
///
/// Returns `false` if the change was refused because allocations are live.
pub fn enable_tracking(enabled: bool) -> bool {
    system_allocator().lock().set_tracking_enabled(enabled)
}

/// Logs and returns every live allocation of the default instance.
pub fn report_leaks() -> LeakReport {
    system_allocator().lock().report_leaks()
}

/// Counters of the default instance.
#[must_use]
pub fn stats() -> MemoryStats {
    system_allocator().lock().stats()
}

/// Per-tag counters of the default instance.
#[must_use]
pub fn tag_stats(tag: MemoryTag) -> MemoryStats {
    system_allocator().lock().tag_stats(tag)
}
