//! Struct-of-arrays storage for numeric kernels.
//!
//! Each container holds one column per *field*, a zero-sized token naming a
//! typed column, so that kernels operate on contiguous, aligned arrays of a
//! single type rather than on arrays of structs. The field set is a tuple of
//! tokens fixed by the container's type, and looking up a field resolves to
//! its position at compile time.
//!
//! Every container honors the same contract, expressed by [`FieldContainer`]:
//! capacity is a multiple of the chunk size, every field starts at an address
//! aligned to the container's alignment, and elements up to the chunk ceiling
//! of the size are valid memory. Kernels may therefore process whole chunks
//! without a remainder loop.
//!
//! There are four kinds of container.
//!
//! * [`FieldArrays`] allocates each field separately.
//! * [`PackedFieldArrays`] places all fields back to back in one allocation.
//! * [`StaticPackedFieldArrays`] is a packed layout of fixed capacity held inline.
//! * [`FieldPointers`] borrows columns from elsewhere and owns nothing.
//!
//! The [`compute`] and [`copy`](mod@copy) modules traverse and copy columns
//! of any of these.
//!
//! ```
//! use fieldarrays::{Field, FieldContainer, PackedFieldArrays, SimdConfig};
//! use fieldarrays::compute::apply_simd_fields;
//!
//! #[derive(Clone, Copy, Field)] #[field(value = f64)] struct X;
//! #[derive(Clone, Copy, Field)] #[field(value = f64)] struct Y;
//! #[derive(Clone, Copy, Field)] #[field(value = f64)] struct Norm;
//!
//! let config = SimdConfig::new(64, 8).unwrap();
//! let mut arrays = PackedFieldArrays::with_config(config, (X, Y, Norm));
//! arrays.resize(100);
//! arrays.slice_mut(X).fill(3.0);
//! arrays.slice_mut(Y).fill(4.0);
//! apply_simd_fields(&mut arrays, (Norm, X, Y), |(n, x, y)| *n = (*x * *x + *y * *y).sqrt());
//! assert!(arrays.slice(Norm).iter().all(|&n| n == 5.0));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
extern crate self as fieldarrays;

pub mod compute;
pub mod config;
pub mod copy;
pub mod error;
pub mod field;
pub mod field_arrays;
pub mod layout;
pub mod memory;
pub mod packed;
pub mod pointers;
pub mod static_packed;
pub mod strategy;
mod tuple;

pub use fieldarrays_derive::Field;

pub use common::{FieldContainer, HeapSize};
pub use config::{SimdArch, SimdConfig};
pub use error::LayoutError;
pub use field::{At, Contains, Field, FieldLayout, FieldList, Selection, position, positions};
pub use field_arrays::FieldArrays;
pub use packed::PackedFieldArrays;
pub use pointers::FieldPointers;
pub use static_packed::StaticPackedFieldArrays;
pub use strategy::{AllocationStrategy, ChunkIncremental, ExactFit};

/// Traits shared by every container.
pub mod common {

    use smallvec::SmallVec;

    use crate::field::{Contains, Field, FieldList, Selection, raw_slice, raw_slice_mut};

    /// A struct-of-arrays container of the fields `Self::Fields`.
    ///
    /// The provided methods build typed pointers and slices from the raw
    /// per-field base pointers an implementation reports.
    ///
    /// # Safety
    ///
    /// Implementations must guarantee that `capacity()` is a multiple of
    /// `chunk_size()` and at least `size()`, and that for every position `i`
    /// with a non-null base pointer, the pointer is aligned for field `i`'s
    /// value type and valid for reads (and, from `field_ptr_mut`, writes) of
    /// `capacity()` initialized elements, with distinct positions never
    /// overlapping. The pointers must stay valid until the container is next
    /// mutated through `&mut self`.
    pub unsafe trait FieldContainer {
        /// The fields held, in declaration order.
        type Fields: FieldList;

        /// Number of valid elements.
        fn size(&self) -> usize;
        /// Number of elements for which storage is valid.
        fn capacity(&self) -> usize;
        /// Alignment in bytes guaranteed for each field's base address.
        fn alignment(&self) -> usize;
        /// Element granularity of the capacity.
        fn chunk_size(&self) -> usize;
        /// The size rounded up to the chunk size; storage is valid up to here.
        #[inline(always)] fn chunk_ceil(&self) -> usize { crate::layout::chunk_ceil(self.size(), self.chunk_size()) }

        /// Base pointer of the field at position `index`, or null if unallocated.
        fn field_ptr(&self, index: usize) -> *const u8;
        /// Mutable base pointer of the field at position `index`, or null if unallocated.
        fn field_ptr_mut(&mut self, index: usize) -> *mut u8;
        /// Mutable base pointers of all fields, derived together.
        fn field_ptrs_mut(&mut self) -> SmallVec<[*mut u8; 8]> {
            (0 .. Self::Fields::COUNT).map(|index| self.field_ptr_mut(index)).collect()
        }

        /// Pointer to element zero of `field`; null when unallocated.
        #[inline(always)]
        fn get<F: Field, I>(&self, _field: F) -> *const F::Value where Self::Fields: Contains<F, I> {
            self.field_ptr(<Self::Fields as Contains<F, I>>::INDEX).cast()
        }
        /// Mutable pointer to element zero of `field`; null when unallocated.
        #[inline(always)]
        fn get_mut<F: Field, I>(&mut self, _field: F) -> *mut F::Value where Self::Fields: Contains<F, I> {
            self.field_ptr_mut(<Self::Fields as Contains<F, I>>::INDEX).cast()
        }

        /// The valid elements of `field`.
        #[inline(always)]
        fn slice<F: Field, I>(&self, field: F) -> &[F::Value] where Self::Fields: Contains<F, I> {
            // SAFETY: the trait contract covers `capacity() >= size()` elements.
            unsafe { raw_slice(self.get(field).cast(), self.size()) }
        }
        /// The valid elements of `field`, mutably.
        #[inline(always)]
        fn slice_mut<F: Field, I>(&mut self, field: F) -> &mut [F::Value] where Self::Fields: Contains<F, I> {
            let len = self.size();
            // SAFETY: as above, and `&mut self` excludes other references.
            unsafe { raw_slice_mut(self.get_mut(field).cast(), len) }
        }
        /// The elements of `field` up to the chunk ceiling.
        ///
        /// Values past `size()` are unspecified but valid.
        #[inline(always)]
        fn chunk_slice<F: Field, I>(&self, field: F) -> &[F::Value] where Self::Fields: Contains<F, I> {
            // SAFETY: capacity is a chunk multiple at least `size()`.
            unsafe { raw_slice(self.get(field).cast(), self.chunk_ceil()) }
        }
        /// The elements of `field` up to the chunk ceiling, mutably.
        #[inline(always)]
        fn chunk_slice_mut<F: Field, I>(&mut self, field: F) -> &mut [F::Value] where Self::Fields: Contains<F, I> {
            let len = self.chunk_ceil();
            // SAFETY: as for `chunk_slice`.
            unsafe { raw_slice_mut(self.get_mut(field).cast(), len) }
        }

        /// Shared slices of the valid elements of several fields.
        #[inline(always)]
        fn columns<S: Selection<Self::Fields, I>, I>(&self, _fields: S) -> S::Refs<'_> {
            // SAFETY: shared slices may overlap freely.
            unsafe { S::refs(|index| self.field_ptr(index), self.size()) }
        }
        /// Mutable slices of the valid elements of several distinct fields.
        ///
        /// Panics if a field is selected more than once.
        #[inline(always)]
        fn columns_mut<S: Selection<Self::Fields, I>, I>(&mut self, fields: S) -> S::Muts<'_> {
            let len = self.size();
            columns_mut_len(self, fields, len)
        }
        /// Mutable slices of several distinct fields, up to the chunk ceiling.
        ///
        /// Panics if a field is selected more than once.
        #[inline(always)]
        fn chunk_columns_mut<S: Selection<Self::Fields, I>, I>(&mut self, fields: S) -> S::Muts<'_> {
            let len = self.chunk_ceil();
            columns_mut_len(self, fields, len)
        }
        /// Names of the fields, in declaration order.
        fn field_names(&self) -> SmallVec<[&'static str; 8]> {
            Self::Fields::names()
        }
    }

    /// Mutable slices of `len` elements for distinct selected fields.
    #[inline(always)]
    fn columns_mut_len<C, S, I>(container: &mut C, _fields: S, len: usize) -> S::Muts<'_>
    where C: FieldContainer + ?Sized, S: Selection<C::Fields, I>
    {
        debug_assert!(len <= container.capacity().max(container.chunk_ceil()));
        S::assert_distinct();
        let ptrs = container.field_ptrs_mut();
        // SAFETY: distinct positions do not overlap, and `container` is borrowed for `'_`.
        unsafe { S::muts(|index| ptrs[index], len) }
    }

    pub trait HeapSize {
        /// Active (len) and allocated (cap) heap sizes in bytes.
        /// This should not include the size of `self` itself.
        fn heap_size(&self) -> (usize, usize) { (0, 0) }
    }
}

/// Fields and checks shared by the unit tests.
#[cfg(test)]
pub(crate) mod test_fields {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use crate::{Contains, Field, FieldContainer};

    fn value(index: usize, field: usize) -> usize { index * 5 + field }

    fn fill<C, I0, I1, I2, I3, I4>(container: &mut C, len: usize)
    where C: FieldContainer, C::Fields: Contains<Atype, I0> + Contains<Rx, I1> + Contains<Mid, I2> + Contains<Ry, I3> + Contains<Rz, I4>
    {
        let (a, x, m, y, z) = container.columns_mut((Atype, Rx, Mid, Ry, Rz));
        for i in 0 .. len {
            a[i] = value(i, 0) as u8;
            x[i] = value(i, 1) as f64;
            m[i] = value(i, 2) as i32;
            y[i] = value(i, 3) as f64;
            z[i] = value(i, 4) as f64;
        }
    }

    fn verify<C, I0, I1, I2, I3, I4>(container: &C, len: usize)
    where C: FieldContainer, C::Fields: Contains<Atype, I0> + Contains<Rx, I1> + Contains<Mid, I2> + Contains<Ry, I3> + Contains<Rz, I4>
    {
        let (a, x, m, y, z) = container.columns((Atype, Rx, Mid, Ry, Rz));
        for i in 0 .. len {
            assert_eq!(a[i], value(i, 0) as u8);
            assert_eq!(x[i], value(i, 1) as f64);
            assert_eq!(m[i], value(i, 2) as i32);
            assert_eq!(y[i], value(i, 3) as f64);
            assert_eq!(z[i], value(i, 4) as f64);
        }
    }

    /// Grows `container` one element at a time, checking alignment, chunked
    /// capacity, chunk tail access and data preservation across random
    /// resizes, and finally that an empty container holds no storage.
    pub fn check_resizing<C, I0, I1, I2, I3, I4>(container: &mut C, resize: impl Fn(&mut C, usize), n: usize, seed: u64)
    where C: FieldContainer, C::Fields: Contains<Atype, I0> + Contains<Rx, I1> + Contains<Mid, I2> + Contains<Ry, I3> + Contains<Rz, I4>
    {
        let mut rng = StdRng::seed_from_u64(seed);
        for len in 1 ..= n {
            resize(container, len);
            assert_eq!(container.size(), len);
            assert_eq!(container.capacity() % container.chunk_size(), 0);
            assert!(container.capacity() >= container.chunk_ceil());

            let align = container.alignment();
            let addrs = [
                container.get(Atype) as usize,
                container.get(Rx) as usize,
                container.get(Mid) as usize,
                container.get(Ry) as usize,
                container.get(Rz) as usize,
            ];
            assert!(addrs.iter().all(|addr| addr % align == 0), "misaligned field at size {}", len);

            fill(container, len);
            // Storage between the size and the chunk ceiling is usable.
            {
                let (a, x, m, y, z) = container.chunk_columns_mut((Atype, Rx, Mid, Ry, Rz));
                for i in len .. a.len() {
                    a[i] = a[i].wrapping_add(1);
                    x[i] += 1.0;
                    m[i] = m[i].wrapping_sub(1);
                    y[i] = -y[i];
                    z[i] = x[i] * 2.0;
                }
            }
            verify(container, len);

            let next = rng.gen_range(0 ..= 2 * len);
            resize(container, next);
            verify(container, next.min(len));
        }

        resize(container, 0);
        assert_eq!(container.capacity(), 0);
        assert!(container.get(Atype).is_null());
        assert!(container.get(Rx).is_null());
        assert!(container.get(Mid).is_null());
        assert!(container.get(Ry).is_null());
        assert!(container.get(Rz).is_null());
    }

    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = f64, name = "rx", description = "Particle position X")]
    pub struct Rx;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = f64, name = "ry", description = "Particle position Y")]
    pub struct Ry;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = f64, name = "rz", description = "Particle position Z")]
    pub struct Rz;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = u8, name = "atype", description = "Particle atom type")]
    pub struct Atype;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = f64, name = "e", description = "Particle energy")]
    pub struct E;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = i32, name = "mid", description = "Particle molecule id")]
    pub struct Mid;
    /// Distance to the origin.
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = f64)]
    pub struct Dist;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = i16, name = "tmp1", description = "Particle temporary 1")]
    pub struct Tmp1;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = i8, name = "tmp2", description = "Particle temporary 2")]
    pub struct Tmp2;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = f32, name = "rx_f", description = "Particle position X (single precision)")]
    pub struct RxF;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = f32, name = "ry_f", description = "Particle position Y (single precision)")]
    pub struct RyF;
    #[derive(Clone, Copy, Debug, Field)]
    #[field(value = f32, name = "rz_f", description = "Particle position Z (single precision)")]
    pub struct RzF;
}
