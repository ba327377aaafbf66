//! Heterogeneous fixed records with a deterministic packed layout.
//!
//! An argument list is a Rust tuple of [`Value`]s, encoded contiguously with
//! no padding: the byte offset of field `i` is the sum of the sizes of the
//! fields before it, and the total footprint is the sum of all field sizes.
//! [`ArgList`] provides whole-tuple streaming, [`Field`] exposes the
//! per-field offsets as compile-time constants, and [`Record`] is a typed
//! view over a byte span holding one encoded tuple.
//!
//! Tuples of up to eight elements are supported, plus the empty list `()`.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::marker::PhantomData;

use crate::action::Handler;
use crate::codec::Value;
use crate::format::Format;
use crate::io::{ByteSink, ByteSource, Getter, Putter};
use crate::storage::Unaligned;

/// A fixed, heterogeneous sequence of values encoded contiguously.
pub trait ArgList: Copy {
    /// Total footprint in bytes: the sum of every element's footprint
    const SIZE: usize;

    /// Consume exactly [`Self::SIZE`] bytes and decode every element in
    /// positional order.
    fn decode(format: Format, get: &mut dyn Getter) -> Self;

    /// Emit every element in positional order, exactly [`Self::SIZE`] bytes.
    fn encode(&self, format: Format, put: &mut dyn Putter);
}

/// Compile-time layout of field `I` of an [`ArgList`].
pub trait Field<const I: usize>: ArgList {
    /// The field's type
    type Out: Value;

    /// Byte offset of the field: the sum of the sizes of the fields before it
    const OFFSET: usize;
}

impl ArgList for () {
    const SIZE: usize = 0;

    fn decode(_format: Format, _get: &mut dyn Getter) -> Self {}

    fn encode(&self, _format: Format, _put: &mut dyn Putter) {}
}

macro_rules! arg_tuple {
    ($t_group:tt; $($idx:tt => $out:ident [$($prev:ident),*]),+ $(,)?) => {
        arg_tuple_impl!($t_group);
        $(
            arg_tuple_field!($t_group; $idx => $out [$($prev),*]);
        )+
    };
}

macro_rules! arg_tuple_impl {
    (($($t:ident),+)) => {
        impl<$($t: Value),+> ArgList for ($($t,)+) {
            const SIZE: usize = 0 $(+ <$t as Value>::SIZE)+;

            fn decode(format: Format, get: &mut dyn Getter) -> Self {
                ($(<$t as Value>::decode(format, get),)+)
            }

            #[allow(non_snake_case)]
            fn encode(&self, format: Format, put: &mut dyn Putter) {
                let ($($t,)+) = self;
                $($t.encode(format, put);)+
            }
        }
    };
}

macro_rules! arg_tuple_field {
    (($($t:ident),+); $idx:tt => $out:ident [$($prev:ident),*]) => {
        impl<$($t: Value),+> Field<$idx> for ($($t,)+) {
            type Out = $out;
            const OFFSET: usize = 0 $(+ <$prev as Value>::SIZE)*;
        }
    };
}

arg_tuple!((T0); 0 => T0 []);
arg_tuple!((T0, T1); 0 => T0 [], 1 => T1 [T0]);
arg_tuple!((T0, T1, T2); 0 => T0 [], 1 => T1 [T0], 2 => T2 [T0, T1]);
arg_tuple!((T0, T1, T2, T3);
    0 => T0 [], 1 => T1 [T0], 2 => T2 [T0, T1], 3 => T3 [T0, T1, T2]);
arg_tuple!((T0, T1, T2, T3, T4);
    0 => T0 [], 1 => T1 [T0], 2 => T2 [T0, T1], 3 => T3 [T0, T1, T2],
    4 => T4 [T0, T1, T2, T3]);
arg_tuple!((T0, T1, T2, T3, T4, T5);
    0 => T0 [], 1 => T1 [T0], 2 => T2 [T0, T1], 3 => T3 [T0, T1, T2],
    4 => T4 [T0, T1, T2, T3], 5 => T5 [T0, T1, T2, T3, T4]);
arg_tuple!((T0, T1, T2, T3, T4, T5, T6);
    0 => T0 [], 1 => T1 [T0], 2 => T2 [T0, T1], 3 => T3 [T0, T1, T2],
    4 => T4 [T0, T1, T2, T3], 5 => T5 [T0, T1, T2, T3, T4],
    6 => T6 [T0, T1, T2, T3, T4, T5]);
arg_tuple!((T0, T1, T2, T3, T4, T5, T6, T7);
    0 => T0 [], 1 => T1 [T0], 2 => T2 [T0, T1], 3 => T3 [T0, T1, T2],
    4 => T4 [T0, T1, T2, T3], 5 => T5 [T0, T1, T2, T3, T4],
    6 => T6 [T0, T1, T2, T3, T4, T5], 7 => T7 [T0, T1, T2, T3, T4, T5, T6]);

/// Typed view over a byte span holding one encoded tuple.
///
/// This is the argument-staging shape of the crate: an action that has
/// accumulated a request's argument bytes wraps them in a `Record` and
/// applies its handler with [`Record::invoke`].  The span is either
/// default-initialized or written as a whole through [`Record::store`] /
/// per field through [`Record::set`]; there is no partially-decoded state
/// to observe.
pub struct Record<'a, A> {
    span: Unaligned<&'a mut [u8]>,
    _args: PhantomData<A>,
}

impl<'a, A: ArgList> Record<'a, A> {
    /// Create a view over `bytes`, which must hold at least `A::SIZE` bytes.
    pub fn new(bytes: &'a mut [u8], format: Format) -> Self {
        debug_assert!(bytes.len() >= A::SIZE);
        Self {
            span: Unaligned::new(bytes, format),
            _args: PhantomData,
        }
    }

    /// Decode field `I`.
    pub fn get<const I: usize>(&self) -> <A as Field<I>>::Out
    where
        A: Field<I>,
    {
        self.span.read_at(<A as Field<I>>::OFFSET)
    }

    /// Encode `value` into field `I`.
    pub fn set<const I: usize>(&mut self, value: <A as Field<I>>::Out)
    where
        A: Field<I>,
    {
        self.span.write_at(value, <A as Field<I>>::OFFSET)
    }

    /// Decode the whole tuple.
    pub fn load(&self) -> A {
        A::decode(self.span.format(), &mut ByteSource::new(self.bytes()))
    }

    /// Encode the whole tuple.
    pub fn store(&mut self, args: A) {
        let format = self.span.format();
        let mut sink = ByteSink::new(&mut self.span.as_bytes_mut()[..A::SIZE]);
        args.encode(format, &mut sink);
    }

    /// The encoded bytes, in wire order.
    pub fn bytes(&self) -> &[u8] {
        &self.span.as_bytes()[..A::SIZE]
    }

    /// Decode the tuple and apply `handler` to it positionally, returning
    /// whatever the handler returns.
    ///
    /// This is how actions apply the wrapped callable to freshly decoded
    /// arguments.
    pub fn invoke<R, F: Handler<A, R>>(&self, handler: &mut F) -> R {
        handler.run(self.load())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Triple = (u8, u16, u32);

    #[test]
    fn offsets_accumulate_sizes() {
        assert_eq!(<Triple as ArgList>::SIZE, 7);
        assert_eq!(<Triple as Field<0>>::OFFSET, 0);
        assert_eq!(<Triple as Field<1>>::OFFSET, 1);
        assert_eq!(<Triple as Field<2>>::OFFSET, 3);
        assert_eq!(<() as ArgList>::SIZE, 0);
    }

    #[test]
    fn encode_lays_fields_positionally() {
        let mut buf = [0u8; 7];
        let mut record = Record::<Triple>::new(&mut buf, Format::LITTLE);
        record.store((0xAA, 0x0102, 0x03040506));
        assert_eq!(record.bytes(), &[0xAA, 0x02, 0x01, 0x06, 0x05, 0x04, 0x03]);
        assert_eq!(record.load(), (0xAA, 0x0102, 0x03040506));
    }

    #[test]
    fn get_set_address_single_fields() {
        let mut buf = [0u8; 7];
        let mut record = Record::<Triple>::new(&mut buf, Format::LITTLE);
        record.store((1, 2, 3));
        record.set::<1>(0xBEEF);
        assert_eq!(record.get::<0>(), 1);
        assert_eq!(record.get::<1>(), 0xBEEF);
        assert_eq!(record.get::<2>(), 3);
    }

    #[test]
    fn arrays_nest_inside_tuples() {
        let mut buf = [0u8; 6];
        let mut record = Record::<([u16; 2], u16)>::new(&mut buf, Format::BIG);
        record.store(([0x0102, 0x0304], 0x0506));
        assert_eq!(record.bytes(), &[1, 2, 3, 4, 5, 6]);
        assert_eq!(<([u16; 2], u16) as Field<1>>::OFFSET, 4);
    }

    #[test]
    fn invoke_expands_positionally() {
        let mut buf = [0u8; 4];
        let mut record = Record::<(u16, u16)>::new(&mut buf, Format::LITTLE);
        record.store((2, 3));
        let sum = record.invoke(&mut |a: u16, b: u16| a + b);
        assert_eq!(sum, 5);
    }
}
