//! Host-side action slots: type-erased wrappers around callable handlers.
//!
//! An action binds a callable to a wire [`Format`].  Its single runtime
//! operation, [`Action::invoke`], decodes the callable's arguments from a
//! byte stream (exactly `input_size` fetches), applies the callable, and
//! encodes the return value back (exactly `output_size` emissions, zero for
//! unit).  Two flavors share this contract:
//!
//! - [`BoxedAction`] (feature `alloc`) erases any callable behind heap
//!   storage allocated once at bind time, so closures may capture mutable
//!   state.  Incoming argument bytes are staged in a bind-time buffer and
//!   the handler is applied through [`Record::invoke`].  Dispatch itself
//!   never allocates.
//! - [`StaticAction`] is a bare trampoline function pointer plus the two
//!   sizes.  The callable must be zero-sized - a plain `fn` item or a
//!   capture-less closure - which is enforced at compile time.  Nothing is
//!   allocated, ever; this is the flavor for freestanding targets.  With no
//!   heap to stage bytes in, the trampoline decodes the argument values
//!   straight off the stream.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use core::mem;
use core::ptr::NonNull;

#[cfg(feature = "alloc")]
use alloc::boxed::Box;
#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use core::marker::PhantomData;

use crate::codec::Value;
use crate::format::Format;
use crate::io::ByteStream;
use crate::tuple::ArgList;
#[cfg(feature = "alloc")]
use crate::tuple::Record;

/// A callable taking the decoded argument tuple `A` and returning `R`.
///
/// Implemented for every `FnMut` callable of arity up to eight; the tuple is
/// expanded positionally into the call.
pub trait Handler<A, R> {
    fn run(&mut self, args: A) -> R;
}

impl<F: FnMut() -> R, R> Handler<(), R> for F {
    fn run(&mut self, _args: ()) -> R {
        (*self)()
    }
}

macro_rules! fn_handler {
    ($(($($t:ident),+)),+ $(,)?) => {$(
        impl<F: FnMut($($t),+) -> R, $($t,)+ R> Handler<($($t,)+), R> for F {
            #[allow(non_snake_case)]
            fn run(&mut self, args: ($($t,)+)) -> R {
                let ($($t,)+) = args;
                (*self)($($t),+)
            }
        }
    )+};
}

fn_handler!(
    (T0),
    (T0, T1),
    (T0, T1, T2),
    (T0, T1, T2, T3),
    (T0, T1, T2, T3, T4),
    (T0, T1, T2, T3, T4, T5),
    (T0, T1, T2, T3, T4, T5, T6),
    (T0, T1, T2, T3, T4, T5, T6, T7),
);

/// The action capability: bind a handler, invoke it against a byte stream,
/// report the fixed request and response footprints.
pub trait Action: Sized {
    /// Wrap `handler`, recording the argument and return footprints derived
    /// from its signature.
    fn bind<A, R, F>(handler: F, format: Format) -> Self
    where
        A: ArgList + 'static,
        R: Value + 'static,
        F: Handler<A, R> + 'static;

    /// Decode arguments from `stream`, call the handler, encode the return
    /// value back into `stream`.
    fn invoke(&mut self, stream: &mut dyn ByteStream);

    /// Bytes of serialized arguments this action consumes
    fn input_size(&self) -> usize;

    /// Bytes of serialized return value this action produces
    fn output_size(&self) -> usize;
}

/// Zero-storage action slot: a statically instantiated trampoline.
///
/// ```rust
/// use keyline_rpc::action::{Action, StaticAction};
/// use keyline_rpc::format::Format;
///
/// fn add(a: u16, b: u16) -> u16 { a + b }
/// let slot = StaticAction::bind(add, Format::LITTLE);
/// assert_eq!((slot.input_size(), slot.output_size()), (4, 2));
/// ```
#[derive(Clone, Copy)]
pub struct StaticAction {
    trampoline: fn(Format, &mut dyn ByteStream),
    format: Format,
    input_size: usize,
    output_size: usize,
}

fn trampoline<A, R, F>(format: Format, stream: &mut dyn ByteStream)
where
    A: ArgList,
    R: Value,
    F: Handler<A, R>,
{
    // SAFETY: bind() proves F is zero-sized, and a dangling well-aligned
    // pointer is valid for zero-sized access.
    let handler: &mut F = unsafe { NonNull::dangling().as_mut() };
    // No staging buffer without alloc; the argument values are decoded
    // straight off the stream.  Every argument byte is fetched before the
    // first reply byte is emitted, which is what allows input and output to
    // share one buffer.
    let args = A::decode(format, &mut *stream);
    let reply = handler.run(args);
    reply.encode(format, &mut *stream);
}

impl Action for StaticAction {
    fn bind<A, R, F>(handler: F, format: Format) -> Self
    where
        A: ArgList + 'static,
        R: Value + 'static,
        F: Handler<A, R> + 'static,
    {
        const {
            assert!(
                mem::size_of::<F>() == 0,
                "StaticAction requires a zero-sized callable (plain fn item or \
                 capture-less closure); use BoxedAction for handlers with state"
            )
        };
        mem::forget(handler);
        Self {
            trampoline: trampoline::<A, R, F>,
            format,
            input_size: A::SIZE,
            output_size: R::SIZE,
        }
    }

    fn invoke(&mut self, stream: &mut dyn ByteStream) {
        (self.trampoline)(self.format, stream)
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }
}

#[cfg(feature = "alloc")]
trait ErasedHandler {
    fn call(&mut self, format: Format, stream: &mut dyn ByteStream);
    fn input_size(&self) -> usize;
    fn output_size(&self) -> usize;
}

#[cfg(feature = "alloc")]
struct HandlerCell<A, R, F> {
    handler: F,
    /// Argument staging buffer, `A::SIZE` bytes, allocated once at bind
    scratch: Box<[u8]>,
    _sig: PhantomData<fn(A) -> R>,
}

#[cfg(feature = "alloc")]
impl<A, R, F> ErasedHandler for HandlerCell<A, R, F>
where
    A: ArgList,
    R: Value,
    F: Handler<A, R>,
{
    fn call(&mut self, format: Format, stream: &mut dyn ByteStream) {
        // Stage every argument byte, then apply the handler through the
        // record.  The staging is what allows input and output to share one
        // buffer: nothing is emitted until all argument bytes are in.
        for byte in self.scratch.iter_mut() {
            *byte = stream.get();
        }
        let record = Record::<A>::new(&mut self.scratch, format);
        let reply = record.invoke(&mut self.handler);
        reply.encode(format, &mut *stream);
    }

    fn input_size(&self) -> usize {
        A::SIZE
    }

    fn output_size(&self) -> usize {
        R::SIZE
    }
}

/// Heap-owning action slot: wraps any callable, including ones with mutable
/// captured state.
///
/// Allocates only here, at bind time (the erased cell and its argument
/// staging buffer); invoking never allocates.
#[cfg(feature = "alloc")]
pub struct BoxedAction {
    cell: Box<dyn ErasedHandler>,
    format: Format,
}

#[cfg(feature = "alloc")]
impl Action for BoxedAction {
    fn bind<A, R, F>(handler: F, format: Format) -> Self
    where
        A: ArgList + 'static,
        R: Value + 'static,
        F: Handler<A, R> + 'static,
    {
        Self {
            cell: Box::new(HandlerCell::<A, R, F> {
                handler,
                scratch: vec![0u8; A::SIZE].into_boxed_slice(),
                _sig: PhantomData,
            }),
            format,
        }
    }

    fn invoke(&mut self, stream: &mut dyn ByteStream) {
        self.cell.call(self.format, stream)
    }

    fn input_size(&self) -> usize {
        self.cell.input_size()
    }

    fn output_size(&self) -> usize {
        self.cell.output_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ByteSink, ByteSource, Duplex};

    fn add(a: u16, b: u16) -> u16 {
        a + b
    }

    fn invoke_over<S: Action>(action: &mut S, input: &[u8], output: &mut [u8]) -> usize {
        let mut src = ByteSource::new(input);
        let mut dst = ByteSink::new(output);
        let mut stream = Duplex::new(&mut src, &mut dst);
        action.invoke(&mut stream);
        dst.written()
    }

    #[test]
    fn static_action_round_trip() {
        let mut slot = StaticAction::bind(add, Format::LITTLE);
        assert_eq!(slot.input_size(), 4);
        assert_eq!(slot.output_size(), 2);

        let mut out = [0u8; 2];
        let written = invoke_over(&mut slot, &[0x02, 0x00, 0x03, 0x00], &mut out);
        assert_eq!(written, 2);
        assert_eq!(out, [0x05, 0x00]);
    }

    #[test]
    fn unit_reply_emits_nothing() {
        fn noop() {}
        let mut slot = StaticAction::bind(noop, Format::LITTLE);
        assert_eq!(slot.input_size(), 0);
        assert_eq!(slot.output_size(), 0);

        let mut out = [0u8; 1];
        assert_eq!(invoke_over(&mut slot, &[], &mut out), 0);
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn boxed_action_keeps_state() {
        let mut calls = 0u8;
        let mut slot = BoxedAction::bind(
            move |x: u8| {
                calls += 1;
                x.wrapping_add(calls)
            },
            Format::LITTLE,
        );

        let mut out = [0u8; 1];
        invoke_over(&mut slot, &[10], &mut out);
        assert_eq!(out[0], 11);
        invoke_over(&mut slot, &[10], &mut out);
        assert_eq!(out[0], 12);
    }
}
