//! Views assembling field columns that live elsewhere.
//!
//! A [`FieldPointers`] owns nothing. Each field points into memory borrowed
//! for `'a`, typically chunk slices of owning containers, and the view then
//! behaves like any other container for traversals and copies. Its capacity
//! is the chunk ceiling of its size, so every column it is given must span
//! at least that many elements.

use core::fmt;
use core::marker::PhantomData;

use smallvec::SmallVec;

use crate::common::{FieldContainer, HeapSize};
use crate::config::SimdConfig;
use crate::field::{Contains, Field, FieldList, Selection};
use crate::error::LayoutError;
use crate::layout::{checked_chunk_ceil, chunk_ceil};

/// Borrowed columns for the fields `L`.
pub struct FieldPointers<'a, L: FieldList> {
    ptrs: SmallVec<[*mut u8; 8]>,
    size: usize,
    alignment: usize,
    chunk_size: usize,
    marker: PhantomData<(fn() -> L, &'a mut [u8])>,
}

impl<'a, L: FieldList> FieldPointers<'a, L> {
    /// A view of `size` elements with no columns set yet.
    ///
    /// Accessing a field before setting it panics, unless `size` is zero.
    /// Panics if `fields` repeats a field, or if the chunk ceiling of `size`
    /// does not fit in a `usize`.
    pub fn new(size: usize, config: SimdConfig, _fields: L) -> Self {
        assert!(checked_chunk_ceil(size, config.chunk_size()).is_some(), "{}", LayoutError::CapacityOverflow { capacity: size });
        L::assert_unique();
        Self {
            ptrs: (0 .. L::COUNT).map(|_| core::ptr::null_mut()).collect(),
            size,
            alignment: config.alignment(),
            chunk_size: config.chunk_size(),
            marker: PhantomData,
        }
    }

    /// A view of the fields `fields` of `container`, with its size, alignment and chunk size.
    ///
    /// Panics if a field is listed more than once.
    pub fn borrow<C, I>(container: &'a mut C, _fields: L) -> Self
    where C: FieldContainer, L: Selection<C::Fields, I>
    {
        <L as Selection<C::Fields, I>>::assert_distinct();
        let all = container.field_ptrs_mut();
        Self {
            ptrs: <L as Selection<C::Fields, I>>::INDICES.iter().map(|&index| all[index]).collect(),
            size: container.size(),
            alignment: container.alignment(),
            chunk_size: container.chunk_size(),
            marker: PhantomData,
        }
    }

    /// Points `field` at `column`.
    ///
    /// Panics if `column` is shorter than the chunk ceiling of the size, or
    /// does not start at an aligned address.
    pub fn set_slice<F: Field, I>(&mut self, field: F, column: &'a mut [F::Value]) where L: Contains<F, I> {
        let needed = self.capacity();
        assert!(column.len() >= needed, "column for `{}` holds {} elements but the view needs {}", F::NAME, column.len(), needed);
        // SAFETY: the column is valid for `needed` elements and borrowed for `'a`.
        unsafe { self.set_ptr(field, column.as_mut_ptr()) }
    }

    /// Points `field` at raw memory.
    ///
    /// Panics if `ptr` is not aligned to the view's alignment.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `capacity()` elements for
    /// `'a`, not overlap the other columns, and not be accessed through any
    /// other path while the view is in use.
    pub unsafe fn set_ptr<F: Field, I>(&mut self, _field: F, ptr: *mut F::Value) where L: Contains<F, I> {
        let addr = ptr as usize;
        assert!(addr % self.alignment == 0, "column for `{}` at {:#x} is not aligned to {} bytes", F::NAME, addr, self.alignment);
        assert!(addr % core::mem::align_of::<F::Value>() == 0, "column for `{}` is misaligned for its value type", F::NAME);
        self.ptrs[<L as Contains<F, I>>::INDEX] = ptr.cast();
    }

    /// Whether every field has been pointed somewhere.
    pub fn is_complete(&self) -> bool {
        self.ptrs.iter().all(|ptr| !ptr.is_null())
    }
}

// SAFETY: `set_slice` and `set_ptr` require `capacity()` aligned elements
// for `'a`, and `borrow` takes pointers from a container borrowed for `'a`.
// Unset pointers are null, which the provided accessors reject.
unsafe impl<'a, L: FieldList> FieldContainer for FieldPointers<'a, L> {
    type Fields = L;
    #[inline(always)] fn size(&self) -> usize { self.size }
    #[inline(always)] fn capacity(&self) -> usize { chunk_ceil(self.size, self.chunk_size) }
    #[inline(always)] fn alignment(&self) -> usize { self.alignment }
    #[inline(always)] fn chunk_size(&self) -> usize { self.chunk_size }
    #[inline(always)] fn field_ptr(&self, index: usize) -> *const u8 { self.ptrs[index] }
    #[inline(always)] fn field_ptr_mut(&mut self, index: usize) -> *mut u8 { self.ptrs[index] }
}

impl<'a, L: FieldList> HeapSize for FieldPointers<'a, L> { }

impl<'a, L: FieldList> fmt::Debug for FieldPointers<'a, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldPointers")
            .field("fields", &L::names())
            .field("size", &self.size)
            .field("alignment", &self.alignment)
            .field("chunk_size", &self.chunk_size)
            .field("ptrs", &self.ptrs)
            .finish()
    }
}
