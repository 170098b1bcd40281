//! Field tokens, field lists, and compile-time lookup of a field's position.
//!
//! A field is a zero-sized token type naming one column of per-element data.
//! Containers are parameterized by a tuple of field tokens, the *field list*,
//! and every lookup by token resolves to a position in that tuple while type
//! checking. Asking a container for a field it does not list fails to compile.
//!
//! ```
//! use fieldarrays::{Field, FieldArrays, FieldContainer};
//!
//! /// Particle position X.
//! #[derive(Clone, Copy, Field)]
//! #[field(value = f64, name = "rx")]
//! struct Rx;
//!
//! #[derive(Clone, Copy, Field)]
//! #[field(value = i32, description = "Particle molecule id")]
//! struct Mid;
//!
//! let mut arrays = FieldArrays::new((Rx, Mid));
//! arrays.resize(10);
//! arrays.slice_mut(Mid)[3] = 7;
//! assert_eq!(arrays.slice(Mid)[3], 7);
//! assert_eq!(Rx::DESCRIPTION, "Particle position X.");
//! ```

use core::any::TypeId;

use smallvec::SmallVec;

/// A named, typed column of per-element data.
///
/// Implementations are usually produced by `#[derive(Field)]`.
pub trait Field : Copy + 'static {
    /// The element type stored for this field.
    type Value: bytemuck::Pod;
    /// Short name of the field.
    const NAME: &'static str;
    /// Human-readable description of the field.
    const DESCRIPTION: &'static str;
}

/// Size, alignment and naming information for one field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    /// Short name of the field.
    pub name: &'static str,
    /// Human-readable description of the field.
    pub description: &'static str,
    /// Size in bytes of one element.
    pub size: usize,
    /// Natural alignment in bytes of one element.
    pub align: usize,
}

impl FieldLayout {
    /// The layout of `F`'s value type.
    pub const fn of<F: Field>() -> Self {
        let size = core::mem::size_of::<F::Value>();
        assert!(size > 0, "zero-sized field values are not supported");
        Self {
            name: F::NAME,
            description: F::DESCRIPTION,
            size,
            align: core::mem::align_of::<F::Value>(),
        }
    }
}

/// Type-level position marker used to resolve a field within a list.
pub struct At<const N: usize>;

/// An ordered list of fields, implemented for tuples of field tokens.
///
/// A list names each field at most once. The tuple type of a list that
/// repeats a field still exists, but every lookup of the repeated field is
/// ambiguous and fails to compile, and the containers refuse to be built
/// over it.
///
/// ```compile_fail
/// # use fieldarrays::{Field, FieldArrays, FieldContainer};
/// # #[derive(Clone, Copy, Field)] #[field(value = f64)] struct Rx;
/// let arrays = FieldArrays::new((Rx, Rx));
/// let _ = arrays.slice(Rx);
/// ```
pub trait FieldList : Copy + 'static {
    /// The number of fields.
    const COUNT: usize;
    /// Layouts of the fields, in declaration order.
    const LAYOUTS: &'static [FieldLayout];

    /// Type identities of the fields, in declaration order.
    fn type_ids() -> SmallVec<[TypeId; 8]>;

    /// Panics if a field appears more than once.
    fn assert_unique() {
        let ids = Self::type_ids();
        for i in 0 .. ids.len() {
            for j in (i+1) .. ids.len() {
                assert!(ids[i] != ids[j], "field `{}` is listed more than once", Self::LAYOUTS[i].name);
            }
        }
    }

    /// The largest natural alignment among the fields' value types.
    fn max_align() -> usize {
        Self::LAYOUTS.iter().map(|l| l.align).max().unwrap_or(1)
    }
    /// Names of the fields, in declaration order.
    fn names() -> SmallVec<[&'static str; 8]> {
        Self::LAYOUTS.iter().map(|l| l.name).collect()
    }
}

/// Evidence that `F` appears in the list at position `I`.
///
/// The position parameter is inferred; it only exists so that impls for
/// different positions do not overlap. Listing one field twice makes the
/// lookup ambiguous and is rejected by the type checker.
pub trait Contains<F: Field, I> : FieldList {
    /// Zero-based position of `F` in the list.
    const INDEX: usize;
}

/// A tuple of fields drawn from the list `L`, in any order.
///
/// Selections name the columns a traversal or copy works on, and build the
/// tuples of typed slices handed to callers.
pub trait Selection<L: FieldList, I> : Copy {
    /// Positions within `L` of the selected fields, in selection order.
    const INDICES: &'static [usize];
    /// Layouts of the selected fields, in selection order.
    const LAYOUTS: &'static [FieldLayout];

    /// A tuple of shared slices, one per selected field.
    type Refs<'a>;
    /// A tuple of mutable slices, one per selected field.
    type Muts<'a>;

    /// Builds shared slices of length `len` from per-position base pointers.
    ///
    /// # Safety
    ///
    /// Each `ptr(i)` for a selected position must be valid for reads of `len`
    /// elements of that field's value type, aligned, for the lifetime `'a`.
    unsafe fn refs<'a>(ptr: impl Fn(usize) -> *const u8, len: usize) -> Self::Refs<'a>;

    /// Builds mutable slices of length `len` from per-position base pointers.
    ///
    /// # Safety
    ///
    /// As for `refs`, for writes, and the selected regions must not overlap
    /// one another or any other live reference during `'a`.
    unsafe fn muts<'a>(ptr: impl Fn(usize) -> *mut u8, len: usize) -> Self::Muts<'a>;

    /// Panics unless every selected field is distinct.
    fn assert_distinct() {
        let indices = Self::INDICES;
        for i in 0 .. indices.len() {
            for j in (i+1) .. indices.len() {
                assert!(indices[i] != indices[j], "field `{}` selected more than once", Self::LAYOUTS[i].name);
            }
        }
    }
}

/// The position of `field` within the list `L`.
///
/// ```
/// # use fieldarrays::{Field, position};
/// # #[derive(Clone, Copy, Field)] #[field(value = f64)] struct Rx;
/// # #[derive(Clone, Copy, Field)] #[field(value = f64)] struct Ry;
/// assert_eq!(position::<(Rx, Ry), _, _>(Ry), 1);
/// ```
#[inline(always)]
pub fn position<L, F, I>(_field: F) -> usize where F: Field, L: Contains<F, I> {
    L::INDEX
}

/// The positions within `L` of the fields in `selection`.
#[inline(always)]
pub fn positions<L, S, I>(_selection: S) -> &'static [usize] where L: FieldList, S: Selection<L, I> {
    S::INDICES
}

/// Materializes a slice from a field base pointer, tolerating empty storage.
///
/// # Safety
///
/// If `len > 0`, `ptr` must be non-null, aligned for `T`, and valid for reads
/// of `len` elements for `'a`.
#[inline(always)]
pub(crate) unsafe fn raw_slice<'a, T>(ptr: *const u8, len: usize) -> &'a [T] {
    if len == 0 { &[] }
    else {
        assert!(!ptr.is_null(), "field pointer is not set");
        core::slice::from_raw_parts(ptr.cast::<T>(), len)
    }
}

/// Mutable counterpart of `raw_slice`.
///
/// # Safety
///
/// As for `raw_slice`, for writes, and the region must not be aliased for `'a`.
#[inline(always)]
pub(crate) unsafe fn raw_slice_mut<'a, T>(ptr: *mut u8, len: usize) -> &'a mut [T] {
    if len == 0 { &mut [] }
    else {
        assert!(!ptr.is_null(), "field pointer is not set");
        core::slice::from_raw_parts_mut(ptr.cast::<T>(), len)
    }
}
