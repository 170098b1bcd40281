//! Policies deciding how capacity follows size.
//!
//! Every owning container consults its strategy on each `resize`, and only
//! reallocates when the returned capacity differs from the current one.
//! Reallocation invalidates every pointer previously handed out, so the
//! policy directly determines how often that happens.

use crate::layout::checked_chunk_ceil;

/// Chooses a new capacity for a requested size.
pub trait AllocationStrategy {
    /// The capacity to hold `size` elements, given the current `capacity`.
    ///
    /// The result must be a multiple of `chunk`, at least `size`, and zero
    /// when `size` is zero. Returns `None` when no such capacity fits in a
    /// `usize`.
    fn update_capacity(size: usize, capacity: usize, chunk: usize) -> Option<usize>;
}

/// Grows eagerly and shrinks with hysteresis.
///
/// Capacity grows to the chunk ceiling as soon as the size exceeds it. It
/// shrinks back to the chunk ceiling only once the size has fallen to half
/// the capacity or less and the capacity spans at least two chunks, so that
/// oscillating around a boundary does not reallocate each time. A size of
/// zero always releases all storage.
#[derive(Copy, Clone, Debug, Default)]
pub struct ChunkIncremental;

impl AllocationStrategy for ChunkIncremental {
    #[inline]
    fn update_capacity(size: usize, capacity: usize, chunk: usize) -> Option<usize> {
        let chunk = crate::layout::chunk_size(chunk);
        let shrink = size <= capacity / 2 && capacity / 2 >= chunk;
        let new_capacity = if size == 0 { 0 }
        else if size > capacity || shrink { checked_chunk_ceil(size, chunk)? }
        else { capacity };
        debug_assert!(new_capacity >= size);
        debug_assert!(new_capacity % chunk == 0);
        Some(new_capacity)
    }
}

/// Always holds exactly the chunk ceiling of the size.
#[derive(Copy, Clone, Debug, Default)]
pub struct ExactFit;

impl AllocationStrategy for ExactFit {
    #[inline]
    fn update_capacity(size: usize, _capacity: usize, chunk: usize) -> Option<usize> {
        checked_chunk_ceil(size, chunk)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn step(size: usize, capacity: usize) -> usize {
        ChunkIncremental::update_capacity(size, capacity, 8).unwrap()
    }

    #[test]
    fn hysteresis() {
        let mut capacity = 0;
        capacity = step(1, capacity);
        assert_eq!(capacity, 8);
        capacity = step(8, capacity);
        assert_eq!(capacity, 8);
        capacity = step(9, capacity);
        assert_eq!(capacity, 16);
        // Nine down to eight is still more than half of sixteen.
        capacity = step(9, capacity);
        assert_eq!(capacity, 16);
        // Eight is half of sixteen, and sixteen spans two chunks.
        capacity = step(8, capacity);
        assert_eq!(capacity, 8);
        // A single chunk is never shrunk.
        capacity = step(1, capacity);
        assert_eq!(capacity, 8);
        capacity = step(0, capacity);
        assert_eq!(capacity, 0);
    }

    #[test]
    fn shrinks_to_chunk_ceiling() {
        assert_eq!(step(600, 1024), 1024);
        assert_eq!(step(512, 1024), 512);
        assert_eq!(step(300, 1024), 304);
        assert_eq!(step(1, 16), 8);
    }

    #[test]
    fn exact_fit() {
        assert_eq!(ExactFit::update_capacity(9, 1024, 8), Some(16));
        assert_eq!(ExactFit::update_capacity(0, 1024, 8), Some(0));
    }

    #[test]
    fn unrepresentable_capacity_is_refused() {
        assert_eq!(ChunkIncremental::update_capacity(usize::MAX, 0, 7), None);
        assert_eq!(ChunkIncremental::update_capacity(usize::MAX, 35, 7), None);
        assert_eq!(ExactFit::update_capacity(usize::MAX, 0, 7), None);
        assert_eq!(ChunkIncremental::update_capacity(usize::MAX, 0, 1), Some(usize::MAX));
    }

    proptest! {
        #[test]
        fn capacity_is_chunked_and_sufficient(
            sizes in proptest::collection::vec(0usize..5000, 1..50),
            chunk in 0usize..33,
        ) {
            let mut capacity = 0;
            for size in sizes {
                let next = ChunkIncremental::update_capacity(size, capacity, chunk).unwrap();
                let chunk = chunk.max(1);
                prop_assert_eq!(next % chunk, 0);
                prop_assert!(next >= size);
                if size == 0 { prop_assert_eq!(next, 0); }
                if size > 0 && size <= capacity && !(size <= capacity / 2 && capacity >= 2 * chunk) {
                    prop_assert_eq!(next, capacity);
                }
                capacity = next;
            }
        }
    }
}
