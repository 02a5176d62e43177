//! Estimated footprint of a request under a typical size-class allocator.
//!
//! Used by [`Allocator::consumed_size`](crate::backend::Allocator::consumed_size)
//! when a backend cannot report the usable size of a live block. Requests up
//! to [`MAX_SMALL_SIZE`] round up to the next class; anything larger rounds up
//! to whole pages.

/// Page granularity for large requests.
pub const PAGE_SIZE: usize = 4096;

/// Largest request served from a size class.
pub const MAX_SMALL_SIZE: usize = 4096;

pub const NUM_SIZE_CLASSES: usize = 22;

/// Class sizes in bytes, strictly increasing. 16-byte steps to 128, then
/// four classes per doubling up to 512, then two per doubling.
pub static SIZE_CLASSES: [usize; NUM_SIZE_CLASSES] = [
    16, 32, 48, 64, 80, 96, 112, 128, // 16-byte steps
    160, 192, 224, 256, // 32-byte steps
    320, 384, 448, 512, // 64-byte steps
    768, 1024, 1536, 2048, 3072, 4096,
];

/// Index of the smallest class that fits `size`, or `None` for large requests.
#[inline]
pub fn size_to_class(size: usize) -> Option<usize> {
    if size > MAX_SMALL_SIZE {
        return None;
    }
    if size <= 128 {
        // Zero-byte requests still occupy the smallest class.
        return Some(size.max(1).div_ceil(16) - 1);
    }
    Some(SIZE_CLASSES.partition_point(|&class| class < size))
}

#[inline]
pub fn class_to_size(cls: usize) -> usize {
    SIZE_CLASSES[cls]
}

/// Bytes an allocator would plausibly reserve for a `size`-byte request.
#[inline]
pub fn estimated_size(size: usize) -> usize {
    match size_to_class(size) {
        Some(cls) => class_to_size(cls),
        None => size.div_ceil(PAGE_SIZE).saturating_mul(PAGE_SIZE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_and_tiny() {
        assert_eq!(estimated_size(0), 16);
        assert_eq!(estimated_size(1), 16);
        assert_eq!(estimated_size(16), 16);
    }

    #[test]
    fn test_exact_classes() {
        for &class in SIZE_CLASSES.iter() {
            assert_eq!(estimated_size(class), class);
        }
    }

    #[test]
    fn test_rounds_up() {
        assert_eq!(estimated_size(17), 32);
        assert_eq!(estimated_size(129), 160);
        assert_eq!(estimated_size(513), 768);
        assert_eq!(estimated_size(1025), 1536);
        assert_eq!(estimated_size(3073), 4096);
    }

    #[test]
    fn test_large_rounds_to_pages() {
        assert_eq!(size_to_class(4097), None);
        assert_eq!(estimated_size(4097), 8192);
        assert_eq!(estimated_size(8192), 8192);
        assert_eq!(estimated_size(100_000), 25 * PAGE_SIZE);
    }

    #[test]
    fn test_never_below_request() {
        for size in 0..=3 * PAGE_SIZE {
            assert!(estimated_size(size) >= size, "size {size}");
        }
    }

    #[test]
    fn test_classes_monotonically_increasing() {
        for i in 1..NUM_SIZE_CLASSES {
            assert!(
                SIZE_CLASSES[i] > SIZE_CLASSES[i - 1],
                "class {} size {} not greater than class {} size {}",
                i,
                SIZE_CLASSES[i],
                i - 1,
                SIZE_CLASSES[i - 1]
            );
        }
    }

    #[test]
    fn test_round_trip_all_classes() {
        for cls in 0..NUM_SIZE_CLASSES {
            assert_eq!(size_to_class(class_to_size(cls)), Some(cls));
        }
    }
}
