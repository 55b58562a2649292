//! Alignment constants and helpers.

/// Alignment used when the caller does not ask for one. Matches the largest
/// scalar alignment on every supported target.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Alignment for SSE/NEON vectors.
pub const SIMD_ALIGNMENT: usize = 16;

/// Cache line size assumed for padding hot data.
pub const CACHE_LINE_SIZE: usize = 64;

/// Returns whether `alignment` is a non-zero power of two.
#[inline]
#[must_use]
pub const fn is_power_of_two(alignment: usize) -> bool {
    alignment.is_power_of_two()
}

/// Rounds `size` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
#[must_use]
pub const fn align_up(size: usize, alignment: usize) -> usize {
    (size + alignment - 1) & !(alignment - 1)
}

/// [`align_up`] that returns `None` instead of overflowing.
///
/// `alignment` must be a power of two.
#[inline]
#[must_use]
pub const fn checked_align_up(size: usize, alignment: usize) -> Option<usize> {
    match size.checked_add(alignment - 1) {
        Some(padded) => Some(padded & !(alignment - 1)),
        None => None,
    }
}

/// Rounds `ptr` up to the next address that is a multiple of `alignment`.
///
/// `alignment` must be a power of two. The result keeps the provenance of
/// `ptr`, so it is only dereferenceable if it still lies in the same
/// allocation.
#[inline]
#[must_use]
pub fn align_ptr(ptr: *mut u8, alignment: usize) -> *mut u8 {
    let address = ptr as usize;
    ptr.wrapping_add(align_up(address, alignment) - address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 8), 24);
        assert_eq!(align_up(60, 4), 60);
    }

    #[test]
    fn test_checked_align_up() {
        assert_eq!(checked_align_up(17, 8), Some(24));
        assert_eq!(checked_align_up(usize::MAX - 7, 8), Some(usize::MAX - 7));
        assert_eq!(checked_align_up(usize::MAX - 6, 8), None);
        assert_eq!(checked_align_up(usize::MAX, 16), None);
    }

    #[test]
    fn test_align_ptr() {
        let mut buffer = [0u8; 128];
        let base = buffer.as_mut_ptr();
        for offset in 0..64 {
            let aligned = align_ptr(base.wrapping_add(offset), CACHE_LINE_SIZE);
            assert_eq!(aligned as usize % CACHE_LINE_SIZE, 0);
            assert!(aligned as usize >= base as usize + offset);
        }
    }

    #[test]
    fn test_power_of_two() {
        assert!(is_power_of_two(DEFAULT_ALIGNMENT));
        assert!(is_power_of_two(1));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(24));
    }
}
