//! Remote Procedure Call runtime for byte-streamed links between embedded peers.
//!
//! This crate lets two devices call each other's functions over any medium that
//! can move one byte at a time - UART, SPI, I2C, or a pair of in-memory buffers.
//! The caller serializes an invocation of a predeclared function ("key"), the
//! receiver accumulates the request byte by byte, runs the matching function
//! ("action") with the deserialized arguments, and serializes the return value
//! back over the same stream.
//!
//! `no_std`.  Requires `alloc` only for heap-owning action slots, typically
//! used when handlers capture state.
//!
//! ## Architecture
//!
//! A shared [`key::Keyring`] declares the table of callable functions: an
//! ordered list of signatures plus the wire [`format::Format`] (byte order and
//! signed-integer representation).  Both sides derive everything else from it:
//!
//! - The caller obtains a [`key::Key`] per function, which serializes the
//!   request (index, then arguments) and deserializes the response.
//! - The receiver builds a [`dispatch::Dispatcher`] by binding one handler per
//!   signature.  Handler/signature mismatches are compile errors.
//! - For half-duplex transports fed one byte at a time, a
//!   [`dispatch::BufferedDispatcher`] wraps the dispatcher in a state machine
//!   that accumulates the request in a caller-supplied buffer, resolves it,
//!   and releases response bytes on demand.
//!
//! Requests and responses are bare byte sequences with no framing, length
//! prefix or checksum; every field has a fixed width known from the keyring,
//! so both ends always agree on how many bytes to move.
//!
//! ## Modules
//!
//! - [`format`] - Byte order and signed-integer representation selection
//! - [`codec`] - Fixed-width scalar and array serialization ([`codec::Value`])
//! - [`io`] - One-byte getter/putter capabilities and in-memory adapters
//! - [`storage`] - Packed byte spans with offset-indexed typed access
//! - [`tuple`] - Heterogeneous fixed records with compile-time layout
//! - [`key`] - Keyrings, keys and buffer-sizing constants
//! - [`action`] - Type-erased handler slots (heap-owning and static)
//! - [`dispatch`] - Plain and buffered dispatchers
//!
//! ## Getting started
//!
//! Declare the keyring once, in a crate both peers depend on:
//!
//! ```rust
//! use keyline_rpc::format::Format;
//! use keyline_rpc::key::Keyring;
//!
//! type Ring = Keyring<(fn(u16, u16) -> u16, fn(u8) -> u8)>;
//! let ring = Ring::new(Format::LITTLE);
//! ```
//!
//! **Caller side**: obtain a key and serialize a request into any
//! [`io::Putter`] (here an in-memory sink):
//!
//! ```rust
//! # use keyline_rpc::format::Format;
//! # use keyline_rpc::key::Keyring;
//! # use keyline_rpc::io::ByteSink;
//! # type Ring = Keyring<(fn(u16, u16) -> u16, fn(u8) -> u8)>;
//! # let ring = Ring::new(Format::LITTLE);
//! let mut wire = [0u8; Ring::NEEDED_INPUT];
//! let mut sink = ByteSink::new(&mut wire);
//! ring.key::<0>().write_request((2, 3), &mut sink);
//! ```
//!
//! **Receiver side**: bind handlers, feed bytes, drain the response:
//!
//! ```rust
//! # use keyline_rpc::format::Format;
//! # use keyline_rpc::key::Keyring;
//! # use keyline_rpc::action::StaticAction;
//! # use keyline_rpc::dispatch::{BufferedDispatcher, Dispatcher, SingleBuffer};
//! # type Ring = Keyring<(fn(u16, u16) -> u16, fn(u8) -> u8)>;
//! # let ring = Ring::new(Format::LITTLE);
//! fn add(a: u16, b: u16) -> u16 { a + b }
//! fn id(x: u8) -> u8 { x }
//!
//! let dispatcher: Dispatcher<_, StaticAction, 2> = Dispatcher::new(&ring, (add, id));
//! let mut buf = [0u8; Ring::NEEDED_SINGLE];
//! let mut server = BufferedDispatcher::new(dispatcher, SingleBuffer::new(&mut buf));
//!
//! for byte in [0x00, 0x02, 0x00, 0x03, 0x00] {
//!     server.put(byte);
//! }
//! assert!(server.is_loaded());
//! assert_eq!([server.get(), server.get()], [0x05, 0x00]);
//! ```
//!
//! The buffered dispatcher never allocates; with [`action::StaticAction`]
//! slots the whole request/response path is heap-free, suitable for
//! freestanding targets.
//!
//! ## Features
//!
//! Default features:
//! - `alloc` - Enable [`action::BoxedAction`], the heap-owning slot flavor
//!   which accepts closures with captured state.
//!
//! Compile with `--no-default-features` for fully static targets.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

pub mod action;
pub mod codec;
pub mod dispatch;
pub mod format;
pub mod io;
pub mod key;
pub mod storage;
pub mod tuple;

/// RPC errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Relay refused: response bytes were already drained from the output
    /// buffer
    PartiallyDrained,
    /// Relay refused: the target key's buffer argument does not match the
    /// staged response length
    SizeMismatch,
}

/// Type to represent the result of an RPC operation
pub type Result<T> = core::result::Result<T, Error>;
