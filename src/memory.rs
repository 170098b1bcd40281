//! Aligned, zero-initialized heap blocks.
//!
//! Blocks are the only allocations the owning containers make. A block is
//! zeroed on allocation so that every byte, including the padding between
//! `size` and the chunk ceiling, holds a valid value of any `Pod` field.

use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use core::ptr::NonNull;

use crate::error::LayoutError;
use crate::layout::Alignment;

/// An owned heap allocation of `layout.size()` bytes at `layout.align()`.
pub struct RawBlock {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RawBlock {
    /// Allocates `bytes` zeroed bytes aligned to at least `align`.
    ///
    /// The alignment is raised to the size of a pointer if smaller. Returns
    /// `Ok(None)` when `bytes` is zero, as no storage is needed. Allocation
    /// failure aborts through the global allocation error handler.
    pub fn zeroed(bytes: usize, align: Alignment) -> Result<Option<Self>, LayoutError> {
        if bytes == 0 {
            return Ok(None);
        }
        let align = align.bytes().max(core::mem::size_of::<usize>());
        let layout = Layout::from_size_align(bytes, align).map_err(|_| LayoutError::AllocationTooLarge { bytes })?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => Ok(Some(Self { ptr, layout })),
            None => handle_alloc_error(layout),
        }
    }

    /// Start of the block.
    #[inline(always)] pub fn as_ptr(&self) -> *const u8 { self.ptr.as_ptr() }
    /// Start of the block, for writing.
    #[inline(always)] pub fn as_mut_ptr(&mut self) -> *mut u8 { self.ptr.as_ptr() }
    /// Size of the block in bytes.
    #[inline(always)] pub fn len(&self) -> usize { self.layout.size() }
    /// Alignment of the block in bytes.
    #[inline(always)] pub fn align(&self) -> usize { self.layout.align() }

    /// The block's contents.
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the block owns `len` initialized bytes.
        unsafe { core::slice::from_raw_parts(self.as_ptr(), self.len()) }
    }
}

// SAFETY: a block is uniquely owned memory, like `Box<[u8]>`.
unsafe impl Send for RawBlock { }
unsafe impl Sync for RawBlock { }

impl Drop for RawBlock {
    fn drop(&mut self) {
        // SAFETY: `ptr` was returned by `alloc_zeroed` with this `layout`.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

/// Start pointer of an optional block, null when absent.
#[inline(always)]
pub(crate) fn block_ptr(block: &Option<RawBlock>) -> *const u8 {
    block.as_ref().map_or(core::ptr::null(), RawBlock::as_ptr)
}

/// Mutable start pointer of an optional block, null when absent.
#[inline(always)]
pub(crate) fn block_ptr_mut(block: &mut Option<RawBlock>) -> *mut u8 {
    block.as_mut().map_or(core::ptr::null_mut(), RawBlock::as_mut_ptr)
}
