//! Receiver-side dispatch: route one incoming request to the matching action.
//!
//! A [`Dispatcher`] is the runtime form of a keyring: one bound action per
//! declared signature, in declaration order.  It decodes the leading index
//! from a byte stream and forwards the stream to the matching action, which
//! decodes arguments, calls the handler and encodes the reply.
//!
//! See [`buffered`] for the incremental variant that accumulates requests
//! byte by byte against caller-supplied buffers.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

pub mod buffered;

pub use buffered::{
    BufferedDispatcher, DoubleBuffer, DoubleBuffered, PacketStatus, SingleBuffer, SingleBuffered,
    Storage,
};

use core::marker::PhantomData;
use core::ops::{Index, IndexMut};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::action::{Action, Handler};
use crate::codec::{index_width, read_index};
use crate::format::Format;
use crate::io::{ByteSink, ByteSource, Duplex, Getter, Putter};
use crate::key::{Keyring, Sig, SigAt, SigList, Uniform};

/// Conversion of a handler collection into an action table, checked against
/// the signature list `L`.
///
/// Implemented for tuples of handlers (one per keyring signature, in order)
/// and for handler arrays matching a [`Uniform`] list.  A handler whose
/// signature differs from its slot's declaration fails to satisfy the bound,
/// so mismatches are compile errors.
pub trait Bind<L, S, const N: usize> {
    fn bind(self, format: Format) -> [S; N];
}

macro_rules! bind_tuple {
    ($n:literal; ($($k:ident),+); ($($h:ident),+); ($($idx:tt),+)) => {
        impl<$($k,)+ $($h,)+ S> Bind<($($k,)+), S, $n> for ($($h,)+)
        where
            S: Action,
            $($k: Sig,)+
            $($h: Handler<<$k as Sig>::Args, <$k as Sig>::Reply> + 'static,)+
        {
            fn bind(self, format: Format) -> [S; $n] {
                [$(S::bind::<<$k as Sig>::Args, <$k as Sig>::Reply, $h>(self.$idx, format)),+]
            }
        }
    };
}

bind_tuple!(1; (K0); (H0); (0));
bind_tuple!(2; (K0, K1); (H0, H1); (0, 1));
bind_tuple!(3; (K0, K1, K2); (H0, H1, H2); (0, 1, 2));
bind_tuple!(4; (K0, K1, K2, K3); (H0, H1, H2, H3); (0, 1, 2, 3));
bind_tuple!(5; (K0, K1, K2, K3, K4); (H0, H1, H2, H3, H4); (0, 1, 2, 3, 4));
bind_tuple!(6; (K0, K1, K2, K3, K4, K5); (H0, H1, H2, H3, H4, H5); (0, 1, 2, 3, 4, 5));
bind_tuple!(7; (K0, K1, K2, K3, K4, K5, K6); (H0, H1, H2, H3, H4, H5, H6);
    (0, 1, 2, 3, 4, 5, 6));
bind_tuple!(8; (K0, K1, K2, K3, K4, K5, K6, K7); (H0, H1, H2, H3, H4, H5, H6, H7);
    (0, 1, 2, 3, 4, 5, 6, 7));

impl<K, F, S, const C: usize> Bind<Uniform<K, C>, S, C> for [F; C]
where
    K: Sig,
    S: Action,
    F: Handler<K::Args, K::Reply> + 'static,
{
    fn bind(self, format: Format) -> [S; C] {
        self.map(|handler| S::bind::<K::Args, K::Reply, F>(handler, format))
    }
}

/// Action table routing incoming requests, one action per keyring signature.
///
/// `S` selects the slot flavor: [`crate::action::StaticAction`] for heap-free
/// tables of plain functions, [`crate::action::BoxedAction`] for arbitrary
/// callables.
pub struct Dispatcher<L, S, const N: usize> {
    actions: [S; N],
    format: Format,
    _sigs: PhantomData<L>,
}

impl<L: SigList, S: Action, const N: usize> Dispatcher<L, S, N> {
    /// Wire width of the index field in bytes
    pub const INDEX_WIDTH: usize = index_width(N);

    /// Build the table by binding one handler per signature of `ring`.
    pub fn new<H: Bind<L, S, N>>(ring: &Keyring<L>, handlers: H) -> Self {
        Self {
            actions: handlers.bind(ring.format()),
            format: ring.format(),
            _sigs: PhantomData,
        }
    }

    /// Number of actions in the table
    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    pub const fn format(&self) -> Format {
        self.format
    }

    /// Consume exactly [`Self::INDEX_WIDTH`] bytes and decode them as an
    /// action index.
    pub fn read_index(&self, get: &mut impl Getter) -> usize {
        read_index(Self::INDEX_WIDTH, self.format.byte_order, &mut *get)
    }

    /// Decode the leading index, then invoke the matching action with `get`
    /// and `put`.
    ///
    /// Returns the index that was read even when it is out of range, in
    /// which case nothing is invoked and no byte moves - the caller decides
    /// what an unknown index means.
    pub fn dispatch(&mut self, get: &mut impl Getter, put: &mut impl Putter) -> usize {
        let index = self.read_index(&mut *get);
        if index < N {
            self.actions[index].invoke(&mut Duplex::new(get, put));
        } else {
            debug!(
                "ignoring request for out-of-range action {} (table holds {})",
                index, N
            );
        }
        index
    }

    /// Decode the leading index and return the matching action, or `None`
    /// for an out-of-range index.
    pub fn action(&mut self, get: &mut impl Getter) -> Option<&mut S> {
        let index = self.read_index(&mut *get);
        self.actions.get_mut(index)
    }

    /// Rebind slot `I` to a new handler.
    ///
    /// The handler is checked against signature `I` of the keyring, so a
    /// replacement can never change a slot's wire contract.
    pub fn replace<const I: usize, F>(&mut self, handler: F)
    where
        L: SigAt<I>,
        F: Handler<<<L as SigAt<I>>::Out as Sig>::Args, <<L as SigAt<I>>::Out as Sig>::Reply>
            + 'static,
    {
        const {
            assert!(I < N, "replace index out of dispatcher range");
        }
        self.actions[I] = S::bind::<
            <<L as SigAt<I>>::Out as Sig>::Args,
            <<L as SigAt<I>>::Out as Sig>::Reply,
            F,
        >(handler, self.format);
    }

    /// Process one request held in `input`, writing the response to `output`.
    ///
    /// Returns the decoded index and the number of response bytes written.
    pub fn dispatch_buffers(&mut self, input: &[u8], output: &mut [u8]) -> (usize, usize) {
        let mut src = ByteSource::new(input);
        let mut dst = ByteSink::new(output);
        let index = self.dispatch(&mut src, &mut dst);
        (index, dst.written())
    }
}

impl<L, S, const N: usize> Index<usize> for Dispatcher<L, S, N> {
    type Output = S;

    fn index(&self, index: usize) -> &S {
        &self.actions[index]
    }
}

impl<L, S, const N: usize> IndexMut<usize> for Dispatcher<L, S, N> {
    fn index_mut(&mut self, index: usize) -> &mut S {
        &mut self.actions[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::StaticAction;
    use crate::format::{ByteOrder, SignedMode};

    fn add(a: u16, b: u16) -> u16 {
        a + b
    }

    fn negate(x: i16) -> i16 {
        -x
    }

    type Ring = Keyring<(fn(u16, u16) -> u16, fn(i16) -> i16)>;

    fn dispatcher(format: Format) -> Dispatcher<(fn(u16, u16) -> u16, fn(i16) -> i16), StaticAction, 2> {
        Dispatcher::new(&Ring::new(format), (add, negate))
    }

    #[test]
    fn routes_to_the_indexed_action() {
        let mut table = dispatcher(Format::LITTLE);
        let mut output = [0u8; 2];
        let (index, written) = table.dispatch_buffers(&[0x00, 0x02, 0x00, 0x03, 0x00], &mut output);
        assert_eq!((index, written), (0, 2));
        assert_eq!(output, [0x05, 0x00]);
    }

    #[test]
    fn format_flows_from_the_keyring() {
        let mut table = dispatcher(Format::new(ByteOrder::Big, SignedMode::TwosComplement));
        let mut output = [0u8; 2];
        let (_, written) = table.dispatch_buffers(&[0x00, 0x00, 0x02, 0x00, 0x03], &mut output);
        assert_eq!(written, 2);
        assert_eq!(output, [0x00, 0x05]);
    }

    #[test]
    fn out_of_range_is_reported_not_invoked() {
        let mut table = dispatcher(Format::LITTLE);
        let mut output = [0u8; 2];
        let (index, written) = table.dispatch_buffers(&[0x07], &mut output);
        assert_eq!((index, written), (7, 0));
    }

    #[test]
    fn action_lookup_exposes_sizes() {
        let mut table = dispatcher(Format::LITTLE);
        let mut src = ByteSource::new(&[0x01]);
        let action = table.action(&mut src).expect("index 1 exists");
        assert_eq!(action.input_size(), 2);
        assert_eq!(action.output_size(), 2);

        let mut src = ByteSource::new(&[0x02]);
        assert!(table.action(&mut src).is_none());
    }

    #[test]
    fn replace_rebinds_a_slot() {
        fn double(x: i16) -> i16 {
            x * 2
        }

        let mut table = dispatcher(Format::LITTLE);
        table.replace::<1, _>(double);
        let mut output = [0u8; 2];
        table.dispatch_buffers(&[0x01, 0x05, 0x00], &mut output);
        assert_eq!(output, [0x0A, 0x00]);
    }

    #[test]
    fn uniform_tables_bind_from_arrays() {
        fn id(x: u8) -> u8 {
            x
        }

        type Wide = Keyring<Uniform<fn(u8) -> u8, 300>>;
        let ring = Wide::new(Format::LITTLE);
        let mut table: Dispatcher<_, StaticAction, 300> =
            Dispatcher::new(&ring, [id; 300]);

        let mut output = [0u8; 1];
        // Two-byte index: action 5, argument 0x2A.
        let (index, written) = table.dispatch_buffers(&[0x05, 0x00, 0x2A], &mut output);
        assert_eq!((index, written), (5, 1));
        assert_eq!(output, [0x2A]);
    }
}
