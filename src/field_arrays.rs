//! Separately allocated field arrays.
//!
//! Each field owns an aligned heap block of `capacity` elements. All blocks
//! are reallocated together whenever the allocation strategy changes the
//! capacity, which invalidates every pointer obtained before the `resize`.

use core::fmt;
use core::marker::PhantomData;

use smallvec::SmallVec;

use crate::common::{FieldContainer, HeapSize};
use crate::config::SimdConfig;
use crate::error::LayoutError;
use crate::field::FieldList;
use crate::layout::placement_alignment;
use crate::memory::{RawBlock, block_ptr, block_ptr_mut};
use crate::strategy::{AllocationStrategy, ChunkIncremental};

/// One independently allocated, aligned array per field.
pub struct FieldArrays<L: FieldList, S: AllocationStrategy = ChunkIncremental> {
    blocks: SmallVec<[Option<RawBlock>; 8]>,
    size: usize,
    capacity: usize,
    config: SimdConfig,
    marker: PhantomData<(fn() -> L, S)>,
}

impl<L: FieldList> FieldArrays<L> {
    /// Empty arrays for `fields`, laid out for the detected SIMD support.
    pub fn new(fields: L) -> Self {
        Self::with_config(SimdConfig::default(), fields)
    }
    /// Empty arrays for `fields` with an explicit alignment and chunk size.
    pub fn with_config(config: SimdConfig, _fields: L) -> Self {
        Self::with_strategy(config)
    }
}

impl<L: FieldList, S: AllocationStrategy> FieldArrays<L, S> {
    /// Empty arrays using the allocation strategy `S`.
    ///
    /// Panics if `L` lists a field more than once.
    pub fn with_strategy(config: SimdConfig) -> Self {
        L::assert_unique();
        Self {
            blocks: (0 .. L::COUNT).map(|_| None).collect(),
            size: 0,
            capacity: 0,
            config,
            marker: PhantomData,
        }
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
    ///
    /// On error the arrays are left unchanged.
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

    fn reallocate(&mut self, capacity: usize) -> Result<(), LayoutError> {
        let keep = self.size.min(capacity);
        let mut blocks = SmallVec::<[Option<RawBlock>; 8]>::with_capacity(L::COUNT);
        for (layout, old) in L::LAYOUTS.iter().zip(self.blocks.iter()) {
            let bytes = capacity.checked_mul(layout.size).ok_or(LayoutError::CapacityOverflow { capacity })?;
            let align = placement_alignment(core::slice::from_ref(layout), self.config.align());
            let mut block = RawBlock::zeroed(bytes, align)?;
            if let (Some(new), Some(old)) = (block.as_mut(), old.as_ref()) {
                // SAFETY: both blocks hold at least `keep` elements and are distinct allocations.
                unsafe { core::ptr::copy_nonoverlapping(old.as_ptr(), new.as_mut_ptr(), keep * layout.size) }
            }
            blocks.push(block);
        }
        tracing::trace!(fields = L::COUNT, old_capacity = self.capacity, new_capacity = capacity, "reallocating field arrays");
        self.blocks = blocks;
        self.capacity = capacity;
        Ok(())
    }
}

// SAFETY: each block holds `capacity` zeroed-then-written elements of its
// field at `placement_alignment`, and blocks are distinct allocations.
unsafe impl<L: FieldList, S: AllocationStrategy> FieldContainer for FieldArrays<L, S> {
    type Fields = L;
    #[inline(always)] fn size(&self) -> usize { self.size }
    #[inline(always)] fn capacity(&self) -> usize { self.capacity }
    #[inline(always)] fn alignment(&self) -> usize { self.config.alignment() }
    #[inline(always)] fn chunk_size(&self) -> usize { self.config.chunk_size() }
    #[inline(always)] fn field_ptr(&self, index: usize) -> *const u8 { block_ptr(&self.blocks[index]) }
    #[inline(always)] fn field_ptr_mut(&mut self, index: usize) -> *mut u8 { block_ptr_mut(&mut self.blocks[index]) }
}

impl<L: FieldList, S: AllocationStrategy> HeapSize for FieldArrays<L, S> {
    fn heap_size(&self) -> (usize, usize) {
        let active = L::LAYOUTS.iter().map(|l| l.size * self.size).sum();
        let allocated = self.blocks.iter().flatten().map(RawBlock::len).sum();
        (active, allocated)
    }
}

impl<L: FieldList> Default for FieldArrays<L> {
    fn default() -> Self {
        Self::with_strategy(SimdConfig::default())
    }
}

impl<L: FieldList, S: AllocationStrategy> fmt::Debug for FieldArrays<L, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArrays")
            .field("fields", &L::names())
            .field("size", &self.size)
            .field("capacity", &self.capacity)
            .field("alignment", &self.config.alignment())
            .field("chunk_size", &self.config.chunk_size())
            .finish()
    }
}
