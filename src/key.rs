//! Keyrings and keys: the shared declaration of an action table.
//!
//! A [`Keyring`] is a compile-time list of function signatures plus a wire
//! [`Format`].  Signatures are spelled as plain `fn` types, so a keyring for
//! an adder and an echo function is
//! `Keyring<(fn(u16, u16) -> u16, fn(u8) -> u8)>`.  Indices are the positions
//! in the list, dense and permanent; the index field's wire width is the
//! smallest unsigned integer that can hold them all.
//!
//! The caller side of the table is a [`Key`]: it serializes one invocation
//! (index, then arguments) and deserializes the response.  The receiver side
//! is built from the same keyring by [`crate::dispatch::Dispatcher`], which
//! is what keeps the two peers' views of the table consistent.
//!
//! For tables of many identical signatures - or more signatures than the
//! tuple arities supported - declare the list as [`Uniform`].

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::marker::PhantomData;

use crate::codec::{index_width, write_index, Value};
use crate::format::Format;
use crate::io::{Getter, Putter};
use crate::tuple::ArgList;

/// One function signature of a keyring, spelled as a `fn` type.
pub trait Sig {
    /// Argument tuple
    type Args: ArgList + 'static;

    /// Return type
    type Reply: Value + 'static;

    /// Serialized footprint of the arguments
    const INPUT_SIZE: usize = <Self::Args as ArgList>::SIZE;

    /// Serialized footprint of the return value
    const OUTPUT_SIZE: usize = <Self::Reply as Value>::SIZE;
}

impl<R: Value + 'static> Sig for fn() -> R {
    type Args = ();
    type Reply = R;
}

macro_rules! fn_sig {
    ($(($($t:ident),+)),+ $(,)?) => {$(
        impl<$($t: Value + 'static,)+ R: Value + 'static> Sig for fn($($t),+) -> R {
            type Args = ($($t,)+);
            type Reply = R;
        }
    )+};
}

fn_sig!(
    (T0),
    (T0, T1),
    (T0, T1, T2),
    (T0, T1, T2, T3),
    (T0, T1, T2, T3, T4),
    (T0, T1, T2, T3, T4, T5),
    (T0, T1, T2, T3, T4, T5, T6),
    (T0, T1, T2, T3, T4, T5, T6, T7),
);

/// An ordered list of signatures: a tuple of [`Sig`]s or [`Uniform`].
pub trait SigList {
    /// Number of signatures
    const LEN: usize;

    /// Largest argument footprint across the list
    const MAX_INPUT: usize;

    /// Largest return footprint across the list
    const MAX_OUTPUT: usize;
}

/// Signature lookup by position, resolved at compile time.
pub trait SigAt<const I: usize>: SigList {
    type Out: Sig;
}

const fn max_of(values: &[usize]) -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < values.len() {
        if values[i] > max {
            max = values[i];
        }
        i += 1;
    }
    max
}

pub(crate) const fn max2(a: usize, b: usize) -> usize {
    if a > b {
        a
    } else {
        b
    }
}

macro_rules! sig_list {
    ($k_group:tt; $($idx:tt => $out:ident),+ $(,)?) => {
        sig_list_impl!($k_group);
        $(
            sig_list_at!($k_group; $idx => $out);
        )+
    };
}

macro_rules! sig_list_impl {
    (($($k:ident),+)) => {
        impl<$($k: Sig),+> SigList for ($($k,)+) {
            const LEN: usize = [$(<$k as Sig>::INPUT_SIZE),+].len();
            const MAX_INPUT: usize = max_of(&[$(<$k as Sig>::INPUT_SIZE),+]);
            const MAX_OUTPUT: usize = max_of(&[$(<$k as Sig>::OUTPUT_SIZE),+]);
        }
    };
}

macro_rules! sig_list_at {
    (($($k:ident),+); $idx:tt => $out:ident) => {
        impl<$($k: Sig),+> SigAt<$idx> for ($($k,)+) {
            type Out = $out;
        }
    };
}

sig_list!((K0); 0 => K0);
sig_list!((K0, K1); 0 => K0, 1 => K1);
sig_list!((K0, K1, K2); 0 => K0, 1 => K1, 2 => K2);
sig_list!((K0, K1, K2, K3); 0 => K0, 1 => K1, 2 => K2, 3 => K3);
sig_list!((K0, K1, K2, K3, K4); 0 => K0, 1 => K1, 2 => K2, 3 => K3, 4 => K4);
sig_list!((K0, K1, K2, K3, K4, K5);
    0 => K0, 1 => K1, 2 => K2, 3 => K3, 4 => K4, 5 => K5);
sig_list!((K0, K1, K2, K3, K4, K5, K6);
    0 => K0, 1 => K1, 2 => K2, 3 => K3, 4 => K4, 5 => K5, 6 => K6);
sig_list!((K0, K1, K2, K3, K4, K5, K6, K7);
    0 => K0, 1 => K1, 2 => K2, 3 => K3, 4 => K4, 5 => K5, 6 => K6, 7 => K7);

/// `COUNT` actions sharing one signature `K`.
///
/// This is the register-table shape, and also how lists larger than the
/// supported tuple arity are declared:
/// `Keyring<Uniform<fn(u16) -> u16, 300>>` is a 300-entry table with a
/// two-byte index.
pub struct Uniform<K, const COUNT: usize>(PhantomData<K>);

impl<K: Sig, const COUNT: usize> SigList for Uniform<K, COUNT> {
    const LEN: usize = COUNT;
    const MAX_INPUT: usize = K::INPUT_SIZE;
    const MAX_OUTPUT: usize = K::OUTPUT_SIZE;
}

impl<K: Sig, const COUNT: usize, const I: usize> SigAt<I> for Uniform<K, COUNT> {
    type Out = K;
}

/// Compile-time declaration of an action table: a signature list plus the
/// wire format every derived key and action uses.
pub struct Keyring<L> {
    format: Format,
    _sigs: PhantomData<L>,
}

impl<L> Clone for Keyring<L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for Keyring<L> {}

impl<L: SigList> Keyring<L> {
    /// Number of declared actions
    pub const LEN: usize = L::LEN;

    /// Wire width of the index field in bytes
    pub const INDEX_WIDTH: usize = index_width(L::LEN);

    /// Smallest input buffer that fits any request of this keyring
    pub const NEEDED_INPUT: usize = L::MAX_INPUT + Self::INDEX_WIDTH;

    /// Smallest output buffer that fits any response of this keyring
    pub const NEEDED_OUTPUT: usize = L::MAX_OUTPUT;

    /// Smallest buffer usable as shared input and output
    pub const NEEDED_SINGLE: usize = max2(Self::NEEDED_INPUT, Self::NEEDED_OUTPUT);

    pub const fn new(format: Format) -> Self {
        Self {
            format,
            _sigs: PhantomData,
        }
    }

    pub const fn format(&self) -> Format {
        self.format
    }

    /// The key for action `I`.
    ///
    /// The key's argument and return types are looked up in the signature
    /// list, so a caller cannot serialize a request the receiver's action
    /// will not understand.
    pub fn key<const I: usize>(
        &self,
    ) -> Key<<<L as SigAt<I>>::Out as Sig>::Args, <<L as SigAt<I>>::Out as Sig>::Reply>
    where
        L: SigAt<I>,
    {
        const {
            assert!(I < L::LEN, "key index out of keyring range");
        }
        Key {
            index: I,
            width: Self::INDEX_WIDTH,
            format: self.format,
            _sig: PhantomData,
        }
    }
}

/// Caller-side handle for one action: serializes an invocation and
/// deserializes the response.
#[derive(Clone, Copy)]
pub struct Key<A, R> {
    index: usize,
    width: usize,
    format: Format,
    _sig: PhantomData<fn(A) -> R>,
}

impl<A: ArgList, R: Value> Key<A, R> {
    /// Index of the action in its keyring
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Total request footprint: index bytes plus argument bytes
    pub const fn payload_len(&self) -> usize {
        self.width + A::SIZE
    }

    /// Footprint of the response this key expects
    pub const fn reply_len(&self) -> usize {
        R::SIZE
    }

    /// Serialize a request: the index first, then each argument in positional
    /// order.  Emits exactly [`Self::payload_len`] bytes.
    pub fn write_request(&self, args: A, put: &mut impl Putter) {
        write_index(self.index, self.width, self.format.byte_order, &mut *put);
        args.encode(self.format, &mut *put);
    }

    /// Deserialize the response to a request made with this key.  Consumes
    /// exactly [`Self::reply_len`] bytes.
    pub fn read_reply(&self, get: &mut impl Getter) -> R {
        R::decode(self.format, &mut *get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ByteSink, ByteSource};

    type Ring = Keyring<(fn(u16, u16) -> u16, fn(u8) -> u8, fn() -> u32)>;

    #[test]
    fn sizing_constants_cover_every_action() {
        assert_eq!(Ring::LEN, 3);
        assert_eq!(Ring::INDEX_WIDTH, 1);
        assert_eq!(Ring::NEEDED_INPUT, 5); // index + two u16s
        assert_eq!(Ring::NEEDED_OUTPUT, 4); // the u32 reply
        assert_eq!(Ring::NEEDED_SINGLE, 5);
    }

    #[test]
    fn request_is_index_then_arguments() {
        let ring = Ring::new(Format::LITTLE);
        let key = ring.key::<0>();
        assert_eq!(key.index(), 0);
        assert_eq!(key.payload_len(), 5);

        let mut wire = [0u8; 5];
        let mut sink = ByteSink::new(&mut wire);
        key.write_request((2, 3), &mut sink);
        assert_eq!(wire, [0x00, 0x02, 0x00, 0x03, 0x00]);
    }

    #[test]
    fn reply_decodes_with_ring_format() {
        let ring = Ring::new(Format::BIG);
        let key = ring.key::<2>();
        let reply = key.read_reply(&mut ByteSource::new(&[0x01, 0x02, 0x03, 0x04]));
        assert_eq!(reply, 0x0102_0304u32);
    }

    #[test]
    fn wide_tables_use_wider_indices() {
        type Wide = Keyring<Uniform<fn(u16) -> u16, 300>>;
        assert_eq!(Wide::LEN, 300);
        assert_eq!(Wide::INDEX_WIDTH, 2);
        assert_eq!(Wide::NEEDED_INPUT, 4);

        let ring = Wide::new(Format::LITTLE);
        let key = ring.key::<299>();
        let mut wire = [0u8; 4];
        let mut sink = ByteSink::new(&mut wire);
        key.write_request((0xAABB,), &mut sink);
        assert_eq!(wire, [0x2B, 0x01, 0xBB, 0xAA]);
    }
}
