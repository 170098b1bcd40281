#![allow(non_snake_case)]

use core::any::TypeId;

use smallvec::SmallVec;

use crate::compute::{Columns, Span};
use crate::field::{At, Contains, Field, FieldLayout, FieldList, Selection, raw_slice, raw_slice_mut};

// Implementations for tuple types.
// These are all macro based, because the implementations are very similar.
// The macro requires two names per position, one for the field and one for
// the inferred position marker, along with the position itself.
macro_rules! tuple_impl {
    ( $($name:ident,$name2:ident,$idx:tt)+) => (

        impl<$($name: Field),*> FieldList for ($($name,)*) {
            const COUNT: usize = [$($idx,)*].len();
            const LAYOUTS: &'static [FieldLayout] = &[$(FieldLayout::of::<$name>(),)*];
            fn type_ids() -> SmallVec<[TypeId; 8]> {
                [$(TypeId::of::<$name>(),)*].into_iter().collect()
            }
        }

        contains_impl!([$($name)*] ; $($name $idx)*);

        impl<List: FieldList, $($name: Field, $name2,)*> Selection<List, ($($name2,)*)> for ($($name,)*)
        where $(List: Contains<$name, $name2>,)*
        {
            const INDICES: &'static [usize] = &[$(<List as Contains<$name, $name2>>::INDEX,)*];
            const LAYOUTS: &'static [FieldLayout] = &[$(FieldLayout::of::<$name>(),)*];
            type Refs<'a> = ($(&'a [$name::Value],)*);
            type Muts<'a> = ($(&'a mut [$name::Value],)*);
            #[inline(always)]
            unsafe fn refs<'a>(ptr: impl Fn(usize) -> *const u8, len: usize) -> Self::Refs<'a> {
                ($(raw_slice::<$name::Value>(ptr(<List as Contains<$name, $name2>>::INDEX), len),)*)
            }
            #[inline(always)]
            unsafe fn muts<'a>(ptr: impl Fn(usize) -> *mut u8, len: usize) -> Self::Muts<'a> {
                ($(raw_slice_mut::<$name::Value>(ptr(<List as Contains<$name, $name2>>::INDEX), len),)*)
            }
        }

        impl<$($name: Columns),*> Columns for ($($name,)*) {
            type Item = ($($name::Item,)*);
            #[inline(always)]
            fn extent(&self) -> usize {
                let ($($name,)*) = self;
                let mut extent = usize::MAX;
                $( extent = extent.min($name.extent()); )*
                extent
            }
            #[inline(always)]
            fn spans(&self, spans: &mut SmallVec<[Span; 8]>) {
                let ($($name,)*) = self;
                $( $name.spans(spans); )*
            }
            #[inline(always)]
            unsafe fn item(&mut self, index: usize) -> Self::Item {
                let ($($name,)*) = self;
                ($($name.item(index),)*)
            }
        }
    )
}

// Peels one position at a time, so that the full parameter list can be
// repeated inside each generated impl.
macro_rules! contains_impl {
    ( [$($all:ident)+] ; ) => ();
    ( [$($all:ident)+] ; $name:ident $idx:tt $($rest:tt)* ) => (
        impl<$($all: Field),*> Contains<$name, At<$idx>> for ($($all,)*) {
            const INDEX: usize = $idx;
        }
        contains_impl!([$($all)*] ; $($rest)*);
    )
}

tuple_impl!(A,AA,0);
tuple_impl!(A,AA,0 B,BB,1);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3 E,EE,4);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3 E,EE,4 F,FF,5);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3 E,EE,4 F,FF,5 G,GG,6);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3 E,EE,4 F,FF,5 G,GG,6 H,HH,7);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3 E,EE,4 F,FF,5 G,GG,6 H,HH,7 I,II,8);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3 E,EE,4 F,FF,5 G,GG,6 H,HH,7 I,II,8 J,JJ,9);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3 E,EE,4 F,FF,5 G,GG,6 H,HH,7 I,II,8 J,JJ,9 K,KK,10);
tuple_impl!(A,AA,0 B,BB,1 C,CC,2 D,DD,3 E,EE,4 F,FF,5 G,GG,6 H,HH,7 I,II,8 J,JJ,9 K,KK,10 L,LL,11);
