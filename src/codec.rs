//! Fixed-width serialization of integers and arrays.
//!
//! Everything that crosses the wire is a [`Value`]: fixed-width unsigned and
//! signed integers, and fixed-size arrays thereof (recursively).  A value's
//! footprint in bytes is known statically ([`Value::SIZE`]); encoding emits
//! exactly that many bytes and decoding consumes exactly that many, so the
//! wire needs no length information.
//!
//! The encoding is governed by a [`Format`]: byte order decides octet order,
//! signed mode decides how a signed value maps to the unsigned bit pattern
//! that byte order then shuffles.  `read(write(x)) == x` for every
//! representable `x`; under [`SignedMode::OnesComplement`] the most negative
//! two's-complement value of each width is outside the representable range.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::format::{ByteOrder, Format, SignedMode};
use crate::io::{Getter, Putter};

/// A type with a fixed wire footprint that can be streamed byte by byte.
pub trait Value: Copy {
    /// Wire footprint in bytes
    const SIZE: usize;

    /// Emit exactly [`Self::SIZE`] bytes.
    fn encode(&self, format: Format, put: &mut dyn Putter);

    /// Consume exactly [`Self::SIZE`] bytes.
    fn decode(format: Format, get: &mut dyn Getter) -> Self;
}

/// Emit the low `len` bytes of `pattern` in the requested order.
fn emit(pattern: u64, len: usize, order: ByteOrder, put: &mut dyn Putter) {
    match order {
        ByteOrder::Little => {
            for i in 0..len {
                put.put((pattern >> (8 * i)) as u8);
            }
        }
        ByteOrder::Big => {
            for i in (0..len).rev() {
                put.put((pattern >> (8 * i)) as u8);
            }
        }
    }
}

/// Assemble `len` bytes into an unsigned pattern in the requested order.
fn fetch(len: usize, order: ByteOrder, get: &mut dyn Getter) -> u64 {
    let mut pattern = 0u64;
    match order {
        ByteOrder::Little => {
            for i in 0..len {
                pattern |= u64::from(get.get()) << (8 * i);
            }
        }
        ByteOrder::Big => {
            for i in (0..len).rev() {
                pattern |= u64::from(get.get()) << (8 * i);
            }
        }
    }
    pattern
}

macro_rules! unsigned_value {
    ($($t:ty),+) => {$(
        impl Value for $t {
            const SIZE: usize = core::mem::size_of::<$t>();

            fn encode(&self, format: Format, put: &mut dyn Putter) {
                emit(u64::from(*self), Self::SIZE, format.byte_order, put);
            }

            fn decode(format: Format, get: &mut dyn Getter) -> Self {
                fetch(Self::SIZE, format.byte_order, get) as $t
            }
        }
    )+};
}

unsigned_value!(u8, u16, u32, u64);

macro_rules! signed_value {
    ($($t:ty => $u:ty),+) => {$(
        impl Value for $t {
            const SIZE: usize = core::mem::size_of::<$t>();

            fn encode(&self, format: Format, put: &mut dyn Putter) {
                let pattern: $u = match format.signed_mode {
                    SignedMode::TwosComplement => *self as $u,
                    SignedMode::OnesComplement => {
                        if *self < 0 {
                            !self.unsigned_abs()
                        } else {
                            *self as $u
                        }
                    }
                };
                emit(pattern as u64, Self::SIZE, format.byte_order, put);
            }

            fn decode(format: Format, get: &mut dyn Getter) -> Self {
                let pattern = fetch(Self::SIZE, format.byte_order, get) as $u;
                match format.signed_mode {
                    SignedMode::TwosComplement => pattern as $t,
                    SignedMode::OnesComplement => {
                        let sign = 1 << (<$u>::BITS - 1);
                        if pattern & sign != 0 {
                            // Negative: invert back to the magnitude.
                            -((!pattern) as $t)
                        } else {
                            pattern as $t
                        }
                    }
                }
            }
        }
    )+};
}

signed_value!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);

impl<T: Value, const N: usize> Value for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn encode(&self, format: Format, put: &mut dyn Putter) {
        for element in self {
            element.encode(format, put);
        }
    }

    fn decode(format: Format, get: &mut dyn Getter) -> Self {
        core::array::from_fn(|_| T::decode(format, get))
    }
}

/// Unit is the footprint-free value of actions that return nothing.
impl Value for () {
    const SIZE: usize = 0;

    fn encode(&self, _format: Format, _put: &mut dyn Putter) {}

    fn decode(_format: Format, _get: &mut dyn Getter) -> Self {}
}

/// Width in bytes of the index field for a table of `len` actions: the
/// smallest unsigned integer able to hold every index.
pub const fn index_width(len: usize) -> usize {
    let len = len as u64;
    if len <= 1 << 8 {
        1
    } else if len <= 1 << 16 {
        2
    } else if len <= 1 << 32 {
        4
    } else {
        8
    }
}

/// Emit an action index as `width` bytes in the requested order.
pub fn write_index(index: usize, width: usize, order: ByteOrder, put: &mut dyn Putter) {
    emit(index as u64, width, order, put);
}

/// Consume `width` bytes and assemble them into an action index.
pub fn read_index(width: usize, order: ByteOrder, get: &mut dyn Getter) -> usize {
    fetch(width, order, get) as usize
}
