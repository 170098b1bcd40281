//! Field-wise copies between containers.
//!
//! The two containers may hold different field lists in different orders;
//! only the selected fields need to appear in both.

use crate::common::FieldContainer;
use crate::field::Selection;

/// Copies elements `start .. start + count` of each field in `fields` from
/// `src` to `dst`.
///
/// Fields of `dst` that are not selected are left untouched. Regions that
/// overlap in memory, which only views over shared raw memory can produce,
/// are copied as if through a temporary buffer.
///
/// Panics if the range exceeds the size of either container. In debug
/// builds, also panics if a column does not start at its container's
/// alignment.
///
/// ```
/// use fieldarrays::{Field, FieldArrays, FieldContainer, PackedFieldArrays};
/// use fieldarrays::copy::copy;
///
/// #[derive(Clone, Copy, Field)] #[field(value = f64)] struct X;
/// #[derive(Clone, Copy, Field)] #[field(value = u32)] struct Id;
///
/// let mut src = FieldArrays::new((X, Id));
/// let mut dst = PackedFieldArrays::new((Id, X));
/// src.resize(4);
/// dst.resize(4);
/// src.slice_mut(Id).copy_from_slice(&[7, 8, 9, 10]);
/// copy(&mut dst, &src, 1, 2, (Id,));
/// assert_eq!(dst.slice(Id), &[0, 8, 9, 0]);
/// ```
pub fn copy<D, S, F, ID, IS>(dst: &mut D, src: &S, start: usize, count: usize, _fields: F)
where
    D: FieldContainer,
    S: FieldContainer,
    F: Selection<D::Fields, ID> + Selection<S::Fields, IS>,
{
    assert!(start <= src.size() && count <= src.size() - start, "copy of {}..{}+{} exceeds source size {}", start, start, count, src.size());
    assert!(start <= dst.size() && count <= dst.size() - start, "copy of {}..{}+{} exceeds destination size {}", start, start, count, dst.size());
    if count == 0 {
        return;
    }

    let to_indices = <F as Selection<D::Fields, ID>>::INDICES;
    let from_indices = <F as Selection<S::Fields, IS>>::INDICES;
    let layouts = <F as Selection<D::Fields, ID>>::LAYOUTS;
    for ((&to, &from), layout) in to_indices.iter().zip(from_indices.iter()).zip(layouts.iter()) {
        let offset = start * layout.size;
        let bytes = count * layout.size;
        let (source, target) = (src.field_ptr(from), dst.field_ptr_mut(to));
        assert!(!source.is_null() && !target.is_null(), "field pointer is not set");
        debug_assert!(source as usize % src.alignment() == 0, "source column at {:p} is not aligned to {} bytes", source, src.alignment());
        debug_assert!(target as usize % dst.alignment() == 0, "target column at {:p} is not aligned to {} bytes", target, dst.alignment());
        // SAFETY: both fields hold at least `start + count` elements, as their
        // sizes were checked.
        unsafe {
            let source = source.add(offset);
            let target = target.add(offset);
            let (s, t) = (source as usize, target as usize);
            if s < t + bytes && t < s + bytes {
                core::ptr::copy(source, target, bytes);
            }
            else {
                core::ptr::copy_nonoverlapping(source, target, bytes);
            }
        }
    }
}
