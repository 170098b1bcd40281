//! Element-wise traversals over columns.
//!
//! A traversal visits a range of indices and hands the closure one element
//! from each column, as a tuple in the order the columns were given. Columns
//! are slices (shared or mutable) or tuples of them, so the same routines
//! drive containers, views and plain memory alike.
//!
//! ```
//! use fieldarrays::compute::apply;
//!
//! let mut sum = vec![0.0f64; 4];
//! let a = [1.0, 2.0, 3.0, 4.0];
//! let b = [10.0, 20.0, 30.0, 40.0];
//! apply(|(s, a, b): (&mut f64, &f64, &f64)| *s = a + b, 0, 4, (&mut sum[..], &a[..], &b[..]));
//! assert_eq!(sum, [11.0, 22.0, 33.0, 44.0]);
//! ```
//!
//! The `apply_simd` forms additionally require every column to start at an
//! aligned address and step through the range a chunk at a time, which lets
//! the compiler unroll by the chunk size. Overlap and alignment checks run
//! in debug builds only; range checks always run.

use smallvec::SmallVec;

use crate::common::FieldContainer;
use crate::field::Selection;
use crate::layout::chunk_size;

/// The memory a column covers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Span {
    /// Start address.
    pub addr: usize,
    /// Length in bytes.
    pub bytes: usize,
    /// Whether the column is written through.
    pub mutable: bool,
}

impl Span {
    fn end(&self) -> usize { self.addr + self.bytes }
}

/// Something that yields one item per index, like a slice or a tuple of slices.
pub trait Columns {
    /// What the closure receives for each index.
    type Item;
    /// Number of indices available.
    fn extent(&self) -> usize;
    /// Appends the memory spans of the underlying columns.
    fn spans(&self, spans: &mut SmallVec<[Span; 8]>);
    /// The item at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be below `extent()`, and no index may be requested twice
    /// while a previously returned item is still alive.
    unsafe fn item(&mut self, index: usize) -> Self::Item;
}

impl<'s, T> Columns for &'s [T] {
    type Item = &'s T;
    #[inline(always)] fn extent(&self) -> usize { self.len() }
    fn spans(&self, spans: &mut SmallVec<[Span; 8]>) {
        spans.push(Span { addr: self.as_ptr() as usize, bytes: core::mem::size_of_val(*self), mutable: false });
    }
    #[inline(always)]
    unsafe fn item(&mut self, index: usize) -> &'s T {
        let slice: &'s [T] = *self;
        slice.get_unchecked(index)
    }
}

impl<'s, T> Columns for &'s mut [T] {
    type Item = &'s mut T;
    #[inline(always)] fn extent(&self) -> usize { self.len() }
    fn spans(&self, spans: &mut SmallVec<[Span; 8]>) {
        spans.push(Span { addr: self.as_ptr() as usize, bytes: core::mem::size_of_val(&**self), mutable: true });
    }
    #[inline(always)]
    unsafe fn item(&mut self, index: usize) -> &'s mut T {
        &mut *self.as_mut_ptr().add(index)
    }
}

/// Panics unless `first .. first + count` lies within the columns.
#[inline(always)]
fn check_range<C: Columns>(columns: &C, first: usize, count: usize) {
    let extent = columns.extent();
    assert!(first <= extent && count <= extent - first, "range {}..{}+{} exceeds column length {}", first, first, count, extent);
}

/// Asserts that no written column overlaps another column.
fn debug_check_overlap(spans: &mut SmallVec<[Span; 8]>) {
    spans.retain(|s| s.bytes > 0);
    spans.sort_unstable_by_key(|s| s.addr);
    for pair in spans.windows(2) {
        if pair[0].mutable || pair[1].mutable {
            debug_assert!(pair[0].end() <= pair[1].addr, "columns overlap: {:?} and {:?}", pair[0], pair[1]);
        }
    }
}

/// Calls `f` with the items at each index in `first .. first + count`.
///
/// Panics if the range exceeds the shortest column.
#[inline]
pub fn apply<C, F>(mut f: F, first: usize, count: usize, mut columns: C)
where C: Columns, F: FnMut(C::Item)
{
    check_range(&columns, first, count);
    if cfg!(debug_assertions) {
        let mut spans = SmallVec::new();
        columns.spans(&mut spans);
        debug_check_overlap(&mut spans);
    }
    for index in first .. first + count {
        // SAFETY: the range was checked and each index is visited once.
        f(unsafe { columns.item(index) });
    }
}

/// As `apply`, for columns aligned to `alignment` bytes, visiting indices a
/// chunk of `chunk` at a time.
///
/// Panics if the range exceeds the shortest column. In debug builds, also
/// panics if a non-empty column starts at a misaligned address.
#[inline]
pub fn apply_simd<C, F>(mut f: F, first: usize, count: usize, alignment: usize, chunk: usize, mut columns: C)
where C: Columns, F: FnMut(C::Item)
{
    check_range(&columns, first, count);
    if cfg!(debug_assertions) {
        debug_assert!(alignment.is_power_of_two(), "alignment {} is not a power of two", alignment);
        let mut spans = SmallVec::new();
        columns.spans(&mut spans);
        for span in spans.iter().filter(|s| s.bytes > 0) {
            debug_assert!(span.addr % alignment == 0, "column at {:#x} is not aligned to {} bytes", span.addr, alignment);
        }
        debug_check_overlap(&mut spans);
    }
    let chunk = chunk_size(chunk);
    let end = first + count;
    let mut index = first;
    while end - index >= chunk {
        for lane in index .. index + chunk {
            // SAFETY: the range was checked and each index is visited once.
            f(unsafe { columns.item(lane) });
        }
        index += chunk;
    }
    for lane in index .. end {
        // SAFETY: as above.
        f(unsafe { columns.item(lane) });
    }
}

/// Applies `f` to elements `first .. first + count` of the selected fields.
///
/// Panics if the range exceeds the container's size or a field is selected twice.
pub fn apply_fields<'a, C, S, I, F>(container: &'a mut C, fields: S, first: usize, count: usize, f: F)
where
    C: FieldContainer,
    S: Selection<C::Fields, I>,
    S::Muts<'a>: Columns,
    F: FnMut(<S::Muts<'a> as Columns>::Item),
{
    apply(f, first, count, container.columns_mut(fields))
}

/// Applies `f` to every element of the selected fields up to the chunk
/// ceiling of the container's size.
///
/// Elements between the size and the chunk ceiling are visited too. Their
/// values are unspecified, and writes to them are harmless.
pub fn apply_simd_fields<'a, C, S, I, F>(container: &'a mut C, fields: S, f: F)
where
    C: FieldContainer,
    S: Selection<C::Fields, I>,
    S::Muts<'a>: Columns,
    F: FnMut(<S::Muts<'a> as Columns>::Item),
{
    let count = container.chunk_ceil();
    apply_simd_fields_range(container, fields, 0, count, f)
}

/// Applies `f` to elements `first .. first + count` of the selected fields,
/// a chunk at a time.
///
/// The range may reach past the size up to its chunk ceiling, which never
/// exceeds the capacity. Panics beyond that, or if a field is selected twice.
pub fn apply_simd_fields_range<'a, C, S, I, F>(container: &'a mut C, fields: S, first: usize, count: usize, f: F)
where
    C: FieldContainer,
    S: Selection<C::Fields, I>,
    S::Muts<'a>: Columns,
    F: FnMut(<S::Muts<'a> as Columns>::Item),
{
    let alignment = container.alignment();
    let chunk = container.chunk_size();
    apply_simd(f, first, count, alignment, chunk, container.chunk_columns_mut(fields))
}

#[cfg(test)]
mod test {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::config::SimdConfig;
    use crate::test_fields::*;
    use crate::{FieldArrays, PackedFieldArrays};

    #[test]
    fn apply_visits_the_range() {
        let mut out = [0usize; 8];
        let input = [1usize, 2, 3, 4, 5, 6, 7, 8];
        apply(|(o, i): (&mut usize, &usize)| *o = *i * 10, 2, 4, (&mut out[..], &input[..]));
        assert_eq!(out, [0, 0, 30, 40, 50, 60, 0, 0]);
    }

    #[test]
    fn extent_is_the_shortest_column() {
        let long = [0u8; 16];
        let short = [0u32; 3];
        assert_eq!((&long[..], &short[..]).extent(), 3);
    }

    #[test]
    #[should_panic(expected = "exceeds column length")]
    fn out_of_range_is_rejected() {
        let data = [0.0f64; 4];
        apply(|_: &f64| { }, 2, 3, &data[..]);
    }

    #[test]
    fn shared_columns_may_alias() {
        let data = [1.0f64, 2.0, 3.0];
        let mut sum = 0.0;
        apply(|(a, b): (&f64, &f64)| sum += a * b, 0, 3, (&data[..], &data[..]));
        assert_eq!(sum, 14.0);
    }

    #[test]
    fn simd_visits_every_index_once() {
        let mut hits = [0u32; 21];
        let counter = [0u32; 21];
        for chunk in [1, 2, 4, 8, 32] {
            apply_simd(|(h, _): (&mut u32, &u32)| *h += 1, 1, 19, 4, chunk, (&mut hits[..], &counter[..]));
        }
        assert_eq!(hits[0], 0);
        assert!(hits[1 .. 20].iter().all(|&h| h == 5));
        assert_eq!(hits[20], 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not aligned")]
    fn misaligned_columns_are_caught() {
        let config = SimdConfig::new(64, 8).unwrap();
        let mut arrays = FieldArrays::with_config(config, (Rx,));
        arrays.resize(16);
        let column = &mut arrays.slice_mut(Rx)[1 ..];
        apply_simd(|x: &mut f64| *x = 1.0, 0, 8, 64, 8, column);
    }

    #[test]
    fn fields_are_reached_by_token() {
        let config = SimdConfig::new(32, 4).unwrap();
        let mut arrays = PackedFieldArrays::with_config(config, (Mid, Tmp1, Tmp2));
        arrays.resize(10);
        apply_fields(&mut arrays, (Tmp2, Mid), 0, 10, |(t, m)| { *t = 3; *m = 4; });
        apply_fields(&mut arrays, (Tmp1, Mid, Tmp2), 5, 5, |(s, m, t)| *s = (*m as i16) * (*t as i16));
        assert_eq!(arrays.slice(Tmp1), &[0, 0, 0, 0, 0, 12, 12, 12, 12, 12]);
    }

    #[test]
    fn simd_fields_cover_the_chunk_ceiling() {
        let config = SimdConfig::new(64, 8).unwrap();
        let mut arrays = FieldArrays::with_config(config, (E,));
        arrays.resize(13);
        let mut visited = 0;
        apply_simd_fields(&mut arrays, (E,), |(e,)| { *e = 2.0; visited += 1; });
        assert_eq!(visited, 16);
        assert!(arrays.chunk_slice(E).iter().all(|&e| e == 2.0));
    }

    #[test]
    fn simd_fields_visit_an_unaligned_subrange() {
        let config = SimdConfig::new(32, 4).unwrap();
        let mut arrays = PackedFieldArrays::with_config(config, (Mid, E));
        arrays.resize(18);
        let mut visited = 0;
        apply_simd_fields_range(&mut arrays, (E, Mid), 3, 10, |(e, m)| { *e = 1.0; *m = 7; visited += 1; });
        assert_eq!(visited, 10);
        let e = arrays.slice(E);
        assert!(e[.. 3].iter().all(|&e| e == 0.0));
        assert!(e[3 .. 13].iter().all(|&e| e == 1.0));
        assert!(e[13 ..].iter().all(|&e| e == 0.0));
        assert_eq!(arrays.slice(Mid).iter().filter(|&&m| m == 7).count(), 10);
    }

    #[test]
    fn simd_fields_range_reaches_the_chunk_ceiling() {
        let config = SimdConfig::new(16, 4).unwrap();
        let mut arrays = FieldArrays::with_config(config, (Rx,));
        arrays.resize(10);
        apply_simd_fields_range(&mut arrays, (Rx,), 9, 3, |(x,)| *x = 4.0);
        assert_eq!(arrays.chunk_slice(Rx)[9 ..], [4.0, 4.0, 4.0]);
    }

    #[test]
    #[should_panic(expected = "exceeds column length")]
    fn simd_fields_range_stops_at_the_chunk_ceiling() {
        let config = SimdConfig::new(16, 4).unwrap();
        let mut arrays = FieldArrays::with_config(config, (Rx,));
        arrays.resize(10);
        apply_simd_fields_range(&mut arrays, (Rx,), 9, 4, |(x,)| *x = 4.0);
    }

    #[test]
    fn distance_to_origin() {
        let config = SimdConfig::default();
        let mut arrays = FieldArrays::with_config(config, (Rx, Ry, Rz, Dist));
        arrays.resize(10_000);
        let mut rng = StdRng::seed_from_u64(0x5eed);
        {
            let (x, y, z) = arrays.columns_mut((Rx, Ry, Rz));
            for i in 0 .. x.len() {
                x[i] = rng.gen_range(-100.0 .. 100.0);
                y[i] = rng.gen_range(-100.0 .. 100.0);
                z[i] = rng.gen_range(-100.0 .. 100.0);
            }
        }

        apply_simd_fields(&mut arrays, (Dist, Rx, Ry, Rz), |(d, x, y, z)| {
            *d = (*x * *x + *y * *y + *z * *z).sqrt();
        });

        let (x, y, z, d) = arrays.columns((Rx, Ry, Rz, Dist));
        for _ in 0 .. 500 {
            let i = rng.gen_range(0 .. 10_000);
            let expected = (x[i] * x[i] + y[i] * y[i] + z[i] * z[i]).sqrt();
            assert!((d[i] - expected).abs() <= 1e-12, "dist[{}] = {} but expected {}", i, d[i], expected);
        }
    }
}
