//! Alignment masks, chunk rounding, and the packed layout of a field list.
//!
//! The offset routines here are the only place that decides where a field
//! lives inside a packed block. Heap-packed containers, their reallocation
//! path, and the inline static containers all call into them.

use crate::error::LayoutError;
use crate::field::FieldLayout;

/// A power-of-two byte alignment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Alignment {
    bytes: usize,
}

impl Alignment {
    /// Validates `bytes` as an alignment.
    pub const fn new(bytes: usize) -> Result<Self, LayoutError> {
        if bytes.is_power_of_two() { Ok(Self { bytes }) }
        else { Err(LayoutError::AlignmentNotPowerOfTwo { alignment: bytes }) }
    }
    /// The alignment in bytes.
    #[inline(always)] pub const fn bytes(self) -> usize { self.bytes }
    /// Base two logarithm of the alignment.
    #[inline(always)] pub const fn log2(self) -> u32 { self.bytes.trailing_zeros() }
    /// Mask of the bits below the alignment.
    #[inline(always)] pub const fn low_mask(self) -> usize { self.bytes - 1 }
    /// Mask of the bits at or above the alignment.
    #[inline(always)] pub const fn high_mask(self) -> usize { !self.low_mask() }
    /// Rounds `n` up to the next multiple of the alignment.
    ///
    /// Returns `None` on overflow.
    #[inline(always)]
    pub const fn align_up(self, n: usize) -> Option<usize> {
        match n.checked_add(self.low_mask()) {
            Some(n) => Some(n & self.high_mask()),
            None => None,
        }
    }
    /// Whether `addr` is a multiple of the alignment.
    #[inline(always)] pub const fn is_aligned(self, addr: usize) -> bool { addr & self.low_mask() == 0 }
    /// The larger of two alignments.
    #[inline(always)] pub const fn max(self, other: Self) -> Self { if self.bytes >= other.bytes { self } else { other } }
}

/// Clamps a requested chunk size to at least one element.
#[inline(always)]
pub const fn chunk_size(chunk: usize) -> usize {
    if chunk < 1 { 1 } else { chunk }
}

/// Rounds `n` up to a multiple of `chunk`, treating `chunk < 1` as `1`.
///
/// Returns `None` if the rounded value does not fit in a `usize`.
#[inline(always)]
pub const fn checked_chunk_ceil(n: usize, chunk: usize) -> Option<usize> {
    n.checked_next_multiple_of(chunk_size(chunk))
}

/// As [`checked_chunk_ceil`], panicking on overflow.
#[inline(always)]
pub const fn chunk_ceil(n: usize, chunk: usize) -> usize {
    match checked_chunk_ceil(n, chunk) {
        Some(ceil) => ceil,
        None => panic!("capacity overflow: chunk ceiling exceeds usize::MAX"),
    }
}

/// The alignment actually used to place packed fields.
///
/// This is the requested alignment, raised where needed to the natural
/// alignment of the field values so that every region is well aligned.
pub const fn placement_alignment(fields: &[FieldLayout], requested: Alignment) -> Alignment {
    let mut align = requested;
    let mut i = 0;
    while i < fields.len() {
        // Natural alignments of Rust types are always powers of two.
        let natural = Alignment { bytes: fields[i].align };
        align = align.max(natural);
        i += 1;
    }
    align
}

/// Bytes occupied by a field's region of `capacity` elements, including
/// padding up to the next aligned boundary.
pub const fn region_bytes(field: &FieldLayout, capacity: usize, align: Alignment) -> Option<usize> {
    match capacity.checked_mul(field.size) {
        Some(bytes) => align.align_up(bytes),
        None => None,
    }
}

/// Byte offset of field `index` within a packed block sized for `capacity`.
///
/// Equals the sum of the aligned region sizes of all preceding fields.
pub const fn field_offset(fields: &[FieldLayout], index: usize, capacity: usize, align: Alignment) -> Option<usize> {
    let mut offset = 0usize;
    let mut i = 0;
    while i < index {
        offset = match region_bytes(&fields[i], capacity, align) {
            Some(bytes) => match offset.checked_add(bytes) {
                Some(offset) => offset,
                None => return None,
            },
            None => return None,
        };
        i += 1;
    }
    Some(offset)
}

/// Total size of a packed block holding every field at `capacity`.
pub const fn packed_size(fields: &[FieldLayout], capacity: usize, align: Alignment) -> Option<usize> {
    field_offset(fields, fields.len(), capacity, align)
}

/// Like [`field_offset`], panicking with a capacity overflow.
pub(crate) fn field_offset_or_panic(fields: &[FieldLayout], index: usize, capacity: usize, align: Alignment) -> usize {
    match field_offset(fields, index, capacity, align) {
        Some(offset) => offset,
        None => panic!("{}", LayoutError::CapacityOverflow { capacity }),
    }
}
