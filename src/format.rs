//! Wire format selection: byte order and signed-integer representation.
//!
//! Every keyring fixes a [`Format`] at construction and every key, action and
//! dispatcher derived from it serializes with that format.  Peers must agree
//! on the format out of band; nothing on the wire describes it.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

/// Order in which the octets of a multi-byte integer appear on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Most significant octet first
    Big,
    /// Least significant octet first
    Little,
}

impl ByteOrder {
    /// Byte order of the executing platform
    #[cfg(target_endian = "little")]
    pub const NATIVE: ByteOrder = ByteOrder::Little;
    /// Byte order of the executing platform
    #[cfg(target_endian = "big")]
    pub const NATIVE: ByteOrder = ByteOrder::Big;
}

/// Mapping between a signed integer's value and the unsigned bit pattern
/// serialized on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedMode {
    /// Negative values are the bitwise inverse of their magnitude.
    ///
    /// The most negative two's-complement value of each width has no
    /// representation in this mode.
    OnesComplement,
    /// The usual modular interpretation
    TwosComplement,
}

impl SignedMode {
    /// Representation used by the executing platform for signed arithmetic.
    ///
    /// Rust guarantees two's complement on every supported target.
    pub const NATIVE: SignedMode = SignedMode::TwosComplement;
}

/// Complete wire format: byte order plus signed representation.
///
/// The common configurations are provided as constants; arbitrary
/// combinations go through [`Format::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    pub byte_order: ByteOrder,
    pub signed_mode: SignedMode,
}

impl Format {
    /// Little-endian, two's complement
    pub const LITTLE: Format = Format::new(ByteOrder::Little, SignedMode::TwosComplement);

    /// Big-endian, two's complement
    pub const BIG: Format = Format::new(ByteOrder::Big, SignedMode::TwosComplement);

    /// Whatever the executing platform uses natively
    pub const NATIVE: Format = Format::new(ByteOrder::NATIVE, SignedMode::NATIVE);

    /// Combine a byte order and a signed representation
    pub const fn new(byte_order: ByteOrder, signed_mode: SignedMode) -> Self {
        Self {
            byte_order,
            signed_mode,
        }
    }
}
