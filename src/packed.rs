//! All fields packed back to back in a single allocation.
//!
//! Field `i` starts at the sum of the aligned region sizes of the fields
//! before it, so offsets depend on the capacity and are recomputed from it
//! on every lookup.

use core::fmt;
use core::marker::PhantomData;

use smallvec::SmallVec;

use crate::common::{FieldContainer, HeapSize};
use crate::config::SimdConfig;
use crate::error::LayoutError;
use crate::field::FieldList;
use crate::layout::{Alignment, field_offset_or_panic, packed_size, placement_alignment};
use crate::memory::{RawBlock, block_ptr, block_ptr_mut};
use crate::strategy::{AllocationStrategy, ChunkIncremental};

/// One aligned allocation holding every field's array in turn.
pub struct PackedFieldArrays<L: FieldList, S: AllocationStrategy = ChunkIncremental> {
    block: Option<RawBlock>,
    size: usize,
    capacity: usize,
    config: SimdConfig,
    marker: PhantomData<(fn() -> L, S)>,
}

impl<L: FieldList> PackedFieldArrays<L> {
    /// Empty packed arrays for `fields`, laid out for the detected SIMD support.
    pub fn new(fields: L) -> Self {
        Self::with_config(SimdConfig::default(), fields)
    }
    /// Empty packed arrays for `fields` with an explicit alignment and chunk size.
    pub fn with_config(config: SimdConfig, _fields: L) -> Self {
        Self::with_strategy(config)
    }
}

impl<L: FieldList, S: AllocationStrategy> PackedFieldArrays<L, S> {
    /// Empty packed arrays using the allocation strategy `S`.
    ///
    /// Panics if `L` lists a field more than once.
    pub fn with_strategy(config: SimdConfig) -> Self {
        L::assert_unique();
        Self { block: None, size: 0, capacity: 0, config, marker: PhantomData }
    }

    /// Sets the number of valid elements, reallocating if the strategy asks.
    ///
    /// Elements below both the old and the new size keep their values.
    /// Panics if the storage size overflows.
    pub fn resize(&mut self, size: usize) {
        if let Err(err) = self.try_resize(size) {
            panic!("{}", err);
        }
    }

    /// As `resize`, reporting an overflowing storage size as an error.
    pub fn try_resize(&mut self, size: usize) -> Result<(), LayoutError> {
        let capacity = S::update_capacity(size, self.capacity, self.config.chunk_size())
            .ok_or(LayoutError::CapacityOverflow { capacity: size })?;
        if capacity != self.capacity {
            self.reallocate(capacity)?;
        }
        self.size = size;
        Ok(())
    }

    /// The alignment and chunk size in use.
    pub fn config(&self) -> SimdConfig { self.config }

    /// The packed block, padding included.
    pub fn data(&self) -> &[u8] {
        self.block.as_ref().map_or(&[][..], RawBlock::as_bytes)
    }
    /// Size in bytes of the packed block.
    pub fn data_size(&self) -> usize {
        self.block.as_ref().map_or(0, RawBlock::len)
    }

    #[inline(always)]
    fn placement(&self) -> Alignment {
        placement_alignment(L::LAYOUTS, self.config.align())
    }

    #[inline(always)]
    fn offset(&self, index: usize) -> usize {
        field_offset_or_panic(L::LAYOUTS, index, self.capacity, self.placement())
    }

    fn reallocate(&mut self, capacity: usize) -> Result<(), LayoutError> {
        let align = self.placement();
        let bytes = packed_size(L::LAYOUTS, capacity, align).ok_or(LayoutError::CapacityOverflow { capacity })?;
        let mut block = RawBlock::zeroed(bytes, align)?;
        if let (Some(new), Some(old)) = (block.as_mut(), self.block.as_ref()) {
            let keep = self.size.min(capacity);
            for (index, layout) in L::LAYOUTS.iter().enumerate() {
                let from = self.offset(index);
                let to = field_offset_or_panic(L::LAYOUTS, index, capacity, align);
                // SAFETY: both regions hold at least `keep` elements, in distinct allocations.
                unsafe {
                    core::ptr::copy_nonoverlapping(old.as_ptr().add(from), new.as_mut_ptr().add(to), keep * layout.size);
                }
            }
        }
        tracing::trace!(fields = L::COUNT, old_capacity = self.capacity, new_capacity = capacity, bytes, "reallocating packed field arrays");
        self.block = block;
        self.capacity = capacity;
        Ok(())
    }
}

// SAFETY: regions are placed by `field_offset` at the placement alignment,
// each spans `capacity` elements, and regions of distinct fields are disjoint.
unsafe impl<L: FieldList, S: AllocationStrategy> FieldContainer for PackedFieldArrays<L, S> {
    type Fields = L;
    #[inline(always)] fn size(&self) -> usize { self.size }
    #[inline(always)] fn capacity(&self) -> usize { self.capacity }
    #[inline(always)] fn alignment(&self) -> usize { self.config.alignment() }
    #[inline(always)] fn chunk_size(&self) -> usize { self.config.chunk_size() }
    #[inline(always)]
    fn field_ptr(&self, index: usize) -> *const u8 {
        let base = block_ptr(&self.block);
        if base.is_null() { base }
        // SAFETY: the offset lies within the block.
        else { unsafe { base.add(self.offset(index)) } }
    }
    #[inline(always)]
    fn field_ptr_mut(&mut self, index: usize) -> *mut u8 {
        let offset = self.offset(index);
        let base = block_ptr_mut(&mut self.block);
        if base.is_null() { base }
        // SAFETY: the offset lies within the block.
        else { unsafe { base.add(offset) } }
    }
    fn field_ptrs_mut(&mut self) -> SmallVec<[*mut u8; 8]> {
        let offsets = (0 .. L::COUNT).map(|index| self.offset(index)).collect::<SmallVec<[usize; 8]>>();
        let base = block_ptr_mut(&mut self.block);
        if base.is_null() { return offsets.iter().map(|_| base).collect(); }
        // SAFETY: every offset lies within the block.
        offsets.into_iter().map(|offset| unsafe { base.add(offset) }).collect()
    }
}

impl<L: FieldList, S: AllocationStrategy> HeapSize for PackedFieldArrays<L, S> {
    fn heap_size(&self) -> (usize, usize) {
        let active = L::LAYOUTS.iter().map(|l| l.size * self.size).sum();
        (active, self.data_size())
    }
}

impl<L: FieldList> Default for PackedFieldArrays<L> {
    fn default() -> Self {
        Self::with_strategy(SimdConfig::default())
    }
}

impl<L: FieldList, S: AllocationStrategy> fmt::Debug for PackedFieldArrays<L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedFieldArrays")
            .field("fields", &L::names())
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .field("alignment", &self.config.alignment())
            .field("chunk_size", &self.config.chunk_size())
            .field("data_size", &self.data_size())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::test_fields::*;

    type Particles = (Atype, Rx, Mid, Ry, Rz);

    #[test]
    fn resizing_invariants() {
        for (align, chunk) in [(1, 1), (4, 3), (16, 2), (32, 4), (64, 8), (128, 16)] {
            let config = SimdConfig::new(align, chunk).unwrap();
            let mut arrays = PackedFieldArrays::with_config(config, (Atype, Rx, Mid, Ry, Rz));
            check_resizing(&mut arrays, |a, n| a.resize(n), 300, 17);
        }
    }

    #[test]
    fn field_order_is_local() {
        let config = SimdConfig::new(16, 4).unwrap();
        let mut arrays = PackedFieldArrays::with_config(config, (Ry, Atype, Rz, Mid, Rx));
        check_resizing(&mut arrays, |a, n| a.resize(n), 120, 3);
    }

    #[test]
    fn particles_release_storage() {
        let config = SimdConfig::new(64, 8).unwrap();
        let mut arrays = PackedFieldArrays::with_config(config, (Atype, Rx, Mid, Ry, Rz));
        arrays.resize(1063);
        assert_eq!(arrays.capacity(), 1064);
        for (i, x) in arrays.slice_mut(Rx).iter_mut().enumerate() {
            *x = i as f64;
        }
        assert_eq!(arrays.slice(Rx)[1062], 1062.0);
        assert_eq!(arrays.get(Rx) as usize - arrays.get(Atype) as usize, 1088);
        assert_eq!(arrays.data_size(), 1088 + 8512 + 4288 + 8512 + 8512);

        arrays.resize(0);
        assert!(arrays.get(Atype).is_null());
        assert!(arrays.get(Rx).is_null());
        assert!(arrays.get(Mid).is_null());
        assert!(arrays.get(Ry).is_null());
        assert!(arrays.get(Rz).is_null());
        assert_eq!(arrays.data_size(), 0);
        assert!(arrays.data().is_empty());
    }

    #[test]
    fn growth_moves_every_field() {
        let config = SimdConfig::new(64, 8).unwrap();
        let mut arrays = PackedFieldArrays::with_config(config, (Mid, Rx));
        arrays.resize(8);
        arrays.slice_mut(Mid).copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        arrays.slice_mut(Rx).fill(0.5);
        let offset = arrays.get(Rx) as usize - arrays.get(Mid) as usize;
        arrays.resize(100);
        // Offsets grow with the capacity, so the second field moved within the block.
        assert!(arrays.get(Rx) as usize - arrays.get(Mid) as usize > offset);
        assert_eq!(&arrays.slice(Mid)[.. 8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(arrays.slice(Rx)[.. 8].iter().all(|&x| x == 0.5));
    }

    #[test]
    fn packed_block_is_the_only_allocation() {
        let config = SimdConfig::new(32, 4).unwrap();
        let mut arrays = PackedFieldArrays::with_config(config, (Tmp2, Tmp1));
        arrays.resize(5);
        arrays.slice_mut(Tmp2).copy_from_slice(&[1, 2, 3, 4, 5]);
        assert_eq!(arrays.capacity(), 8);
        assert_eq!(arrays.data_size(), 32 + 32);
        assert_eq!(&arrays.data()[.. 5], &[1, 2, 3, 4, 5]);
        assert_eq!(arrays.heap_size(), (5 * 3, 64));
        assert!(format!("{:?}", arrays).contains("\"tmp2\""));
    }

    #[test]
    fn chunk_ceiling_past_usize_max_is_an_error() {
        let config = SimdConfig::new(8, 7).unwrap();
        let mut arrays = PackedFieldArrays::with_config(config, (Mid, Rx));
        arrays.resize(2);
        arrays.slice_mut(Mid).copy_from_slice(&[5, 6]);
        assert!(arrays.try_resize(usize::MAX).is_err());
        assert!(arrays.try_resize(usize::MAX - 3).is_err());
        assert_eq!((arrays.size(), arrays.capacity()), (2, 7));
        assert_eq!(arrays.slice(Mid), &[5, 6]);
        assert_eq!(arrays.chunk_slice(Rx).len(), 7);
    }

    proptest! {
        #[test]
        fn regions_are_disjoint_and_aligned(
            align_log in 0u32..8,
            chunk in 1usize..20,
            size in 1usize..2000,
        ) {
            let config = SimdConfig::new(1 << align_log, chunk).unwrap();
            let mut arrays = PackedFieldArrays::<Particles>::with_strategy(config);
            arrays.resize(size);
            let base = arrays.data().as_ptr() as usize;
            let end = base + arrays.data_size();
            let mut regions = (0 .. <Particles as FieldList>::COUNT)
                .map(|i| {
                    let start = arrays.field_ptr(i) as usize;
                    (start, start + arrays.capacity() * <Particles as FieldList>::LAYOUTS[i].size)
                })
                .collect::<Vec<_>>();
            regions.sort();
            for (start, stop) in regions.iter() {
                prop_assert!(base <= *start && *stop <= end);
                prop_assert_eq!(start % config.alignment(), 0);
            }
            for pair in regions.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].0);
            }
        }
    }
}
