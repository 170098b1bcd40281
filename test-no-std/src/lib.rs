#![no_std]

use fieldarrays::{Field, FieldArrays, FieldContainer, SimdConfig};
use fieldarrays::compute::apply_simd_fields;

#[derive(Clone, Copy, Field)]
#[field(value = f32, name = "x")]
pub struct X;

#[derive(Clone, Copy, Field)]
#[field(value = f32, name = "y")]
pub struct Y;

/// Doubles `input` into a fresh pair of columns and sums the result.
pub fn doubled_sum(input: &[f32]) -> f32 {
    let mut arrays = FieldArrays::with_config(SimdConfig::default(), (X, Y));
    arrays.resize(input.len());
    arrays.slice_mut(X).copy_from_slice(input);
    apply_simd_fields(&mut arrays, (Y, X), |(y, x)| *y = 2.0 * *x);
    arrays.slice(Y).iter().sum()
}
