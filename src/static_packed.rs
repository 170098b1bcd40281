//! Packed field arrays of fixed capacity, stored inline.
//!
//! The layout is the one `PackedFieldArrays` uses, computed at compile time
//! for the capacity `CAP`. Storage is an array of `BLOCKS` 64-byte blocks
//! held in the container itself, so no heap memory is touched. Spelling out
//! `BLOCKS` by hand is tedious; the [`static_packed_field_arrays!`] macro
//! computes it, along with the chunk-rounded capacity.
//!
//! ```
//! use fieldarrays::{Field, FieldContainer, static_packed_field_arrays};
//!
//! #[derive(Clone, Copy, Field)] #[field(value = f32)] struct Mass;
//! #[derive(Clone, Copy, Field)] #[field(value = u8)] struct Kind;
//!
//! type Buffer = static_packed_field_arrays!((Mass, Kind), align = 32, chunk = 8, count = 20);
//! let mut buffer = Buffer::default();
//! assert_eq!(buffer.capacity(), 24);
//! buffer.slice_mut(Mass)[23] = 1.5;
//! assert_eq!(buffer.slice(Mass)[23], 1.5);
//! ```
//!
//! Invalid parameters are rejected when the type is instantiated.
//!
//! ```compile_fail
//! use fieldarrays::{Field, StaticPackedFieldArrays};
//! #[derive(Clone, Copy, Field)] #[field(value = f64)] struct X;
//! // A capacity of 10 is not a multiple of the chunk size 8.
//! let arrays = StaticPackedFieldArrays::<(X,), 64, 8, 10, 2>::new((X,));
//! ```

use core::fmt;
use core::marker::PhantomData;

use smallvec::SmallVec;

use crate::common::{FieldContainer, HeapSize};
use crate::field::FieldList;
use crate::layout::{Alignment, field_offset, packed_size, placement_alignment};

/// Bytes in one storage block, and the largest supported alignment.
pub const BLOCK_BYTES: usize = 64;

/// A unit of inline storage.
#[repr(C, align(64))]
#[derive(Copy, Clone)]
pub struct Block([u8; BLOCK_BYTES]);

// SAFETY: a block is plain bytes with no padding.
unsafe impl bytemuck::Zeroable for Block { }
unsafe impl bytemuck::Pod for Block { }

/// Number of blocks needed to hold `L` packed at `capacity` elements.
///
/// Panics, at compile time when used in a type, if `align` is not a power of
/// two or the layout overflows.
pub const fn blocks_for<L: FieldList>(align: usize, capacity: usize) -> usize {
    let align = match Alignment::new(align) {
        Ok(align) => align,
        Err(_) => panic!("alignment must be a power of two"),
    };
    match packed_size(L::LAYOUTS, capacity, placement_alignment(L::LAYOUTS, align)) {
        Some(bytes) => bytes.div_ceil(BLOCK_BYTES),
        None => panic!("static capacity overflows"),
    }
}

/// The type of inline packed arrays for a list of fields.
///
/// Rounds `count` up to a multiple of `chunk` and sizes the storage to fit.
/// A `chunk` below one is treated as one.
#[macro_export]
macro_rules! static_packed_field_arrays {
    (($($field:ty),+ $(,)?), align = $align:expr, chunk = $chunk:expr, count = $count:expr $(,)?) => {
        $crate::StaticPackedFieldArrays<
            ($($field,)+),
            { $align },
            { $crate::layout::chunk_size($chunk) },
            { $crate::layout::chunk_ceil($count, $chunk) },
            { $crate::static_packed::blocks_for::<($($field,)+)>($align, $crate::layout::chunk_ceil($count, $chunk)) },
        >
    };
}

/// Packed arrays of `CAP` elements per field, aligned to `ALIGN` bytes and
/// chunked by `CHUNK`, held inline in `BLOCKS` blocks.
#[derive(Copy, Clone)]
pub struct StaticPackedFieldArrays<L: FieldList, const ALIGN: usize, const CHUNK: usize, const CAP: usize, const BLOCKS: usize> {
    blocks: [Block; BLOCKS],
    marker: PhantomData<fn() -> L>,
}

impl<L: FieldList, const ALIGN: usize, const CHUNK: usize, const CAP: usize, const BLOCKS: usize> StaticPackedFieldArrays<L, ALIGN, CHUNK, CAP, BLOCKS> {

    /// Alignment of every field's region, validating the parameters.
    const PLACEMENT: Alignment = {
        let placement = match Alignment::new(ALIGN) {
            Ok(align) => placement_alignment(L::LAYOUTS, align),
            Err(_) => panic!("alignment must be a power of two"),
        };
        assert!(ALIGN <= BLOCK_BYTES, "alignment exceeds the block alignment");
        assert!(placement.bytes() <= BLOCK_BYTES, "field alignment exceeds the block alignment");
        assert!(CHUNK >= 1, "chunk size must be at least one");
        assert!(CAP % CHUNK == 0, "capacity must be a multiple of the chunk size");
        match packed_size(L::LAYOUTS, CAP, placement) {
            Some(bytes) => assert!(bytes <= BLOCKS * BLOCK_BYTES, "storage is too small for the packed layout"),
            None => panic!("static capacity overflows"),
        }
        placement
    };

    /// Exact size in bytes of the packed layout.
    pub const BYTES: usize = match packed_size(L::LAYOUTS, CAP, Self::PLACEMENT) {
        Some(bytes) => bytes,
        None => panic!("static capacity overflows"),
    };

    /// Zeroed arrays for `fields`.
    pub fn new(_fields: L) -> Self {
        Self::default()
    }

    /// The packed bytes, padding included.
    pub fn data(&self) -> &[u8] {
        &bytemuck::cast_slice::<Block, u8>(&self.blocks[..])[.. Self::BYTES]
    }
    /// Size in bytes of the packed layout.
    pub const fn data_size(&self) -> usize { Self::BYTES }

    #[inline(always)]
    fn offset(index: usize) -> usize {
        match field_offset(L::LAYOUTS, index, CAP, Self::PLACEMENT) {
            Some(offset) => offset,
            // `PLACEMENT` already bounds every offset.
            None => unreachable!(),
        }
    }
}

// SAFETY: `PLACEMENT` asserts the packed layout fits the 64-byte aligned
// storage, and the placement alignment is at most 64.
unsafe impl<L: FieldList, const ALIGN: usize, const CHUNK: usize, const CAP: usize, const BLOCKS: usize> FieldContainer for StaticPackedFieldArrays<L, ALIGN, CHUNK, CAP, BLOCKS> {
    type Fields = L;
    #[inline(always)] fn size(&self) -> usize { CAP }
    #[inline(always)] fn capacity(&self) -> usize { CAP }
    #[inline(always)] fn alignment(&self) -> usize { ALIGN }
    #[inline(always)] fn chunk_size(&self) -> usize { CHUNK }
    #[inline(always)]
    fn field_ptr(&self, index: usize) -> *const u8 {
        // SAFETY: offsets lie within the storage.
        unsafe { self.blocks.as_ptr().cast::<u8>().add(Self::offset(index)) }
    }
    #[inline(always)]
    fn field_ptr_mut(&mut self, index: usize) -> *mut u8 {
        // SAFETY: as above.
        unsafe { self.blocks.as_mut_ptr().cast::<u8>().add(Self::offset(index)) }
    }
    fn field_ptrs_mut(&mut self) -> SmallVec<[*mut u8; 8]> {
        let base = self.blocks.as_mut_ptr().cast::<u8>();
        // SAFETY: as above.
        (0 .. L::COUNT).map(|index| unsafe { base.add(Self::offset(index)) }).collect()
    }
}

impl<L: FieldList, const ALIGN: usize, const CHUNK: usize, const CAP: usize, const BLOCKS: usize> HeapSize for StaticPackedFieldArrays<L, ALIGN, CHUNK, CAP, BLOCKS> { }

impl<L: FieldList, const ALIGN: usize, const CHUNK: usize, const CAP: usize, const BLOCKS: usize> Default for StaticPackedFieldArrays<L, ALIGN, CHUNK, CAP, BLOCKS> {
    fn default() -> Self {
        let _placement = Self::PLACEMENT;
        L::assert_unique();
        Self { blocks: bytemuck::Zeroable::zeroed(), marker: PhantomData }
    }
}

impl<L: FieldList, const ALIGN: usize, const CHUNK: usize, const CAP: usize, const BLOCKS: usize> fmt::Debug for StaticPackedFieldArrays<L, ALIGN, CHUNK, CAP, BLOCKS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPackedFieldArrays")
            .field("fields", &L::names())
            .field("capacity", &CAP)
            .field("alignment", &ALIGN)
            .field("chunk_size", &CHUNK)
            .field("data_size", &Self::BYTES)
            .finish()
    }
}
