//! Buffered dispatcher: incremental request accumulation over caller buffers.
//!
//! A plain [`Dispatcher`] must be handed a complete request in one call.  On
//! a half-duplex link fed one byte at a time that is rarely possible, so
//! [`BufferedDispatcher`] wraps one in a small state machine:
//!
//! 1. The input buffer is empty, waiting for the index bytes of a request.
//! 2. Once the index is in, the matching action's argument footprint decides
//!    how many more bytes to accumulate.
//! 3. Once the arguments are in, the action runs immediately and its reply is
//!    staged in the output buffer.  The input buffer resets, so a new request
//!    may load while the reply drains.
//!
//! Buffers are caller-supplied spans sized with the keyring's
//! `NEEDED_INPUT` / `NEEDED_OUTPUT` / `NEEDED_SINGLE` constants.  With
//! [`SingleBuffer`] one span serves both directions; the caller must then
//! finish draining a reply (`is_loaded() == false`) before feeding the next
//! request, or the staged bytes are garbled.  [`DoubleBuffer`] has no such
//! restriction.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::action::Action;
use crate::codec::{index_width, read_index, Value};
use crate::dispatch::Dispatcher;
use crate::io::{ByteSink, ByteSource, ByteStream, Duplex, Getter, Putter};
use crate::key::{Key, SigList};
use crate::{Error, Result};

/// Per-byte outcome of feeding a buffered dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    /// The request is not yet complete
    Loading,
    /// The index was out of range; the partial request was discarded
    Dropped,
    /// The request completed and its action ran; the reply is staged
    Resolved,
}

/// Backing-buffer strategy for a [`BufferedDispatcher`].
///
/// Supplies the input span requests accumulate in, the output span replies
/// stage in, and the combined stream an action runs against once a request
/// is complete.
pub trait Storage {
    /// Span requests accumulate in
    fn input(&mut self) -> &mut [u8];

    /// Span staged replies are drained from
    fn output(&self) -> &[u8];

    /// Run `action` with arguments starting at `args_at` in the input span
    /// and the reply going to the start of the output span.  Returns the
    /// number of reply bytes written.
    fn resolve(&mut self, args_at: usize, action: &mut dyn FnMut(&mut dyn ByteStream)) -> usize;
}

/// One span shared between input and output.
///
/// Smallest possible footprint; legal as long as a staged reply is fully
/// drained before the next request is fed.
pub struct SingleBuffer<'a> {
    span: &'a mut [u8],
}

impl<'a> SingleBuffer<'a> {
    pub fn new(span: &'a mut [u8]) -> Self {
        Self { span }
    }
}

/// Stream over one shared span: arguments are fetched from behind the index
/// while the reply lands at the start.  Safe because an action fetches every
/// argument byte before it emits its first reply byte.
struct SpanIo<'a> {
    span: &'a mut [u8],
    read: usize,
    write: usize,
}

impl Getter for SpanIo<'_> {
    fn get(&mut self) -> u8 {
        let byte = self.span[self.read];
        self.read += 1;
        byte
    }
}

impl Putter for SpanIo<'_> {
    fn put(&mut self, byte: u8) {
        self.span[self.write] = byte;
        self.write += 1;
    }
}

impl Storage for SingleBuffer<'_> {
    fn input(&mut self) -> &mut [u8] {
        &mut *self.span
    }

    fn output(&self) -> &[u8] {
        &*self.span
    }

    fn resolve(&mut self, args_at: usize, action: &mut dyn FnMut(&mut dyn ByteStream)) -> usize {
        let mut stream = SpanIo {
            span: &mut *self.span,
            read: args_at,
            write: 0,
        };
        action(&mut stream);
        stream.write
    }
}

/// Separate input and output spans; reading a new request and draining the
/// previous reply may overlap freely.
pub struct DoubleBuffer<'a> {
    input: &'a mut [u8],
    output: &'a mut [u8],
}

impl<'a> DoubleBuffer<'a> {
    pub fn new(input: &'a mut [u8], output: &'a mut [u8]) -> Self {
        Self { input, output }
    }
}

impl Storage for DoubleBuffer<'_> {
    fn input(&mut self) -> &mut [u8] {
        &mut *self.input
    }

    fn output(&self) -> &[u8] {
        &*self.output
    }

    fn resolve(&mut self, args_at: usize, action: &mut dyn FnMut(&mut dyn ByteStream)) -> usize {
        let mut src = ByteSource::new(&self.input[args_at..]);
        let mut dst = ByteSink::new(&mut *self.output);
        action(&mut Duplex::new(&mut src, &mut dst));
        dst.written()
    }
}

/// Dispatcher wrapped in a byte-at-a-time state machine with staging buffers.
///
/// Feed request bytes with [`put`](Self::put); once a byte completes a
/// request the action runs synchronously and the reply is staged.  Drain it
/// with [`get`](Self::get) / [`write_to`](Self::write_to) at whatever pace
/// the transport allows.  A partially loaded request survives across calls
/// indefinitely; there are no timeouts at this layer.
pub struct BufferedDispatcher<L, S, const N: usize, B> {
    dispatcher: Dispatcher<L, S, N>,
    storage: B,
    index_loaded: bool,
    load_count: usize,
    ibuf_next: usize,
    obuf_next: usize,
    obuf_bottom: usize,
}

/// Buffered dispatcher over one shared span
pub type SingleBuffered<'a, L, S, const N: usize> = BufferedDispatcher<L, S, N, SingleBuffer<'a>>;

/// Buffered dispatcher over separate input and output spans
pub type DoubleBuffered<'a, L, S, const N: usize> = BufferedDispatcher<L, S, N, DoubleBuffer<'a>>;

impl<L: SigList, S: Action, const N: usize, B: Storage> BufferedDispatcher<L, S, N, B> {
    const INDEX_WIDTH: usize = index_width(N);

    /// Wrap `dispatcher` with `storage`.
    ///
    /// Debug builds assert that the spans are large enough for every request
    /// and reply the dispatcher's action table can produce.
    pub fn new(dispatcher: Dispatcher<L, S, N>, storage: B) -> Self {
        let mut this = Self {
            dispatcher,
            storage,
            index_loaded: false,
            load_count: Self::INDEX_WIDTH,
            ibuf_next: 0,
            obuf_next: 0,
            obuf_bottom: 0,
        };
        this.debug_check_spans();
        this
    }

    fn debug_check_spans(&mut self) {
        #[cfg(debug_assertions)]
        {
            let mut max_input = 0;
            let mut max_output = 0;
            for index in 0..N {
                let action = &self.dispatcher[index];
                if action.input_size() > max_input {
                    max_input = action.input_size();
                }
                if action.output_size() > max_output {
                    max_output = action.output_size();
                }
            }
            debug_assert!(
                self.storage.input().len() >= Self::INDEX_WIDTH + max_input,
                "input span too small for the largest declared request"
            );
            debug_assert!(
                self.storage.output().len() >= max_output,
                "output span too small for the largest declared reply"
            );
        }
    }

    /// Feed one request byte.
    ///
    /// Returns [`PacketStatus::Resolved`] when this byte completed a request
    /// (the action has already run and its reply is staged),
    /// [`PacketStatus::Dropped`] when it completed an index with no matching
    /// action, and [`PacketStatus::Loading`] otherwise.
    pub fn put(&mut self, byte: u8) -> PacketStatus {
        let slot = self.ibuf_next;
        self.storage.input()[slot] = byte;
        self.ibuf_next += 1;
        self.load_count -= 1;
        if self.load_count > 0 {
            return PacketStatus::Loading;
        }

        if self.index_loaded {
            let index = self.peek_index();
            self.run(index);
            return PacketStatus::Resolved;
        }

        let index = self.peek_index();
        if index >= N {
            debug!(
                "dropping packet for out-of-range action {} (table holds {})",
                index, N
            );
            self.reset_input();
            return PacketStatus::Dropped;
        }

        let needed = self.dispatcher[index].input_size();
        if needed == 0 {
            self.run(index);
            return PacketStatus::Resolved;
        }

        self.index_loaded = true;
        self.load_count = needed;
        PacketStatus::Loading
    }

    /// Whether the output buffer still holds reply bytes to drain
    pub fn is_loaded(&self) -> bool {
        self.obuf_next != self.obuf_bottom
    }

    /// Drain one staged reply byte, or 0 if nothing is staged.
    ///
    /// Use [`is_loaded`](Self::is_loaded) to tell the two apart.
    pub fn get(&mut self) -> u8 {
        if self.is_loaded() {
            let byte = self.storage.output()[self.obuf_next];
            self.obuf_next += 1;
            byte
        } else {
            0
        }
    }

    /// Feed bytes from `get` until a request resolves or drops.
    ///
    /// Blocks for as long as the getter blocks; no yielding happens here.
    pub fn read_from(&mut self, get: &mut impl Getter) -> PacketStatus {
        loop {
            match self.put(get.get()) {
                PacketStatus::Loading => continue,
                status => return status,
            }
        }
    }

    /// Drain every staged reply byte into `put`.
    pub fn write_to(&mut self, put: &mut impl Putter) {
        while self.is_loaded() {
            put.put(self.get());
        }
    }

    /// [`read_from`](Self::read_from), then - only if the request resolved -
    /// [`write_to`](Self::write_to).
    pub fn process(&mut self, get: &mut impl Getter, put: &mut impl Putter) -> PacketStatus {
        let status = self.read_from(get);
        if status == PacketStatus::Resolved {
            self.write_to(put);
        }
        status
    }

    /// Forward the staged reply to another dispatcher as a request for `key`.
    ///
    /// The target action must take a single byte-buffer argument whose size
    /// exactly matches the staged reply.  Succeeds only while the reply is
    /// full and untouched; on success the reply is drained and the new
    /// request (index, then the reply bytes as the buffer argument) has been
    /// written to `put`.
    pub fn reply<const M: usize, R2: Value>(
        &mut self,
        put: &mut impl Putter,
        key: &Key<([u8; M],), R2>,
    ) -> Result<()> {
        if self.obuf_next != 0 {
            debug!("relay refused: reply partially drained");
            return Err(Error::PartiallyDrained);
        }
        if self.obuf_bottom != M {
            debug!(
                "relay refused: staged {} bytes but target takes {}",
                self.obuf_bottom, M
            );
            return Err(Error::SizeMismatch);
        }

        let mut payload = [0u8; M];
        payload.copy_from_slice(&self.storage.output()[..M]);
        self.obuf_next = self.obuf_bottom;
        key.write_request((payload,), put);
        Ok(())
    }

    /// Rebind slot `I`, as [`Dispatcher::replace`].
    pub fn replace<const I: usize, F>(&mut self, handler: F)
    where
        L: crate::key::SigAt<I>,
        F: crate::action::Handler<
                <<L as crate::key::SigAt<I>>::Out as crate::key::Sig>::Args,
                <<L as crate::key::SigAt<I>>::Out as crate::key::Sig>::Reply,
            > + 'static,
    {
        self.dispatcher.replace::<I, F>(handler);
    }

    pub fn dispatcher(&self) -> &Dispatcher<L, S, N> {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher<L, S, N> {
        &mut self.dispatcher
    }

    /// Decode the index staged at the front of the input span.
    fn peek_index(&mut self) -> usize {
        let order = self.dispatcher.format().byte_order;
        let header = &self.storage.input()[..Self::INDEX_WIDTH];
        read_index(Self::INDEX_WIDTH, order, &mut ByteSource::new(header))
    }

    /// Run the action for a fully loaded request and stage its reply.
    fn run(&mut self, index: usize) {
        let Self {
            dispatcher,
            storage,
            ..
        } = self;
        let action = &mut dispatcher[index];
        let written = storage.resolve(Self::INDEX_WIDTH, &mut |stream| action.invoke(stream));
        trace!("resolved action {} ({} reply bytes)", index, written);
        self.obuf_next = 0;
        self.obuf_bottom = written;
        self.reset_input();
    }

    fn reset_input(&mut self) {
        self.index_loaded = false;
        self.load_count = Self::INDEX_WIDTH;
        self.ibuf_next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::StaticAction;
    use crate::format::Format;
    use crate::key::{Keyring, Uniform};
    use PacketStatus::{Dropped, Loading, Resolved};

    fn add(a: u16, b: u16) -> u16 {
        a + b
    }

    fn id(x: u8) -> u8 {
        x
    }

    type Sigs = (fn(u16, u16) -> u16, fn(u8) -> u8, fn());
    type Ring = Keyring<Sigs>;

    fn server(buf: &mut [u8]) -> SingleBuffered<'_, Sigs, StaticAction, 3> {
        fn noop() {}
        let ring = Ring::new(Format::LITTLE);
        BufferedDispatcher::new(
            Dispatcher::new(&ring, (add, id, noop)),
            SingleBuffer::new(buf),
        )
    }

    #[test]
    fn statuses_track_the_request_phases() {
        let mut buf = [0u8; Ring::NEEDED_SINGLE];
        let mut server = server(&mut buf);

        let statuses = [0x00u8, 0x02, 0x00, 0x03, 0x00].map(|byte| server.put(byte));
        assert_eq!(statuses, [Loading, Loading, Loading, Loading, Resolved]);

        assert!(server.is_loaded());
        assert_eq!([server.get(), server.get()], [0x05, 0x00]);
        assert!(!server.is_loaded());
        assert_eq!(server.get(), 0);
    }

    #[test]
    fn zero_argument_requests_resolve_on_the_index_byte() {
        let mut buf = [0u8; Ring::NEEDED_SINGLE];
        let mut server = server(&mut buf);

        assert_eq!(server.put(0x02), Resolved);
        assert!(!server.is_loaded());

        // The machine is back in the idle phase and accepts a new request.
        assert_eq!(server.put(0x01), Loading);
        assert_eq!(server.put(0x2A), Resolved);
        assert_eq!(server.get(), 0x2A);
    }

    #[test]
    fn unknown_index_drops_without_touching_the_reply() {
        let mut buf = [0u8; Ring::NEEDED_SINGLE];
        let mut server = server(&mut buf);

        // Stage a reply, drain it partially.
        server.put(0x01);
        server.put(0x55);
        assert_eq!(server.get(), 0x55);
        let drained_state = (server.obuf_next, server.obuf_bottom);

        assert_eq!(server.put(0x09), Dropped);
        assert_eq!((server.obuf_next, server.obuf_bottom), drained_state);
        assert_eq!((server.index_loaded, server.ibuf_next), (false, 0));
        assert_eq!(server.load_count, 1);
    }

    #[test]
    fn wide_table_dropped_index_scenario() {
        type Wide = Keyring<Uniform<fn(u16) -> u16, 300>>;
        fn echo(x: u16) -> u16 {
            x
        }

        let ring = Wide::new(Format::LITTLE);
        let mut input = [0u8; Wide::NEEDED_INPUT];
        let mut output = [0u8; Wide::NEEDED_OUTPUT];
        let mut server = BufferedDispatcher::new(
            Dispatcher::<_, StaticAction, 300>::new(&ring, [echo; 300]),
            DoubleBuffer::new(&mut input, &mut output),
        );

        // Index 300 is one past the table.
        assert_eq!(server.put(0x2C), Loading);
        assert_eq!(server.put(0x01), Dropped);
        assert!(!server.is_loaded());

        // Index 299 works.
        let mut reply = [0u8; 2];
        let mut sink = ByteSink::new(&mut reply);
        let status = server.process(&mut ByteSource::new(&[0x2B, 0x01, 0x34, 0x12]), &mut sink);
        assert_eq!(status, Resolved);
        assert_eq!(reply, [0x34, 0x12]);
    }

    #[test]
    fn single_buffer_serves_sequential_requests() {
        let mut buf = [0u8; Ring::NEEDED_SINGLE];
        let mut server = server(&mut buf);

        for (request, reply) in [([0x01, 0x2A], 0x2A), ([0x01, 0x17], 0x17)] {
            assert_eq!(server.read_from(&mut ByteSource::new(&request)), Resolved);
            assert_eq!(server.get(), reply);
            assert!(!server.is_loaded());
        }
    }

    #[test]
    fn relay_forwards_an_untouched_reply() {
        type Remote = Keyring<(fn([u8; 2]) -> u32,)>;
        let remote = Remote::new(Format::LITTLE);

        let mut buf = [0u8; Ring::NEEDED_SINGLE];
        let mut server = server(&mut buf);
        server.read_from(&mut ByteSource::new(&[0x00, 0x02, 0x00, 0x03, 0x00]));

        let mut wire = [0u8; 3];
        let mut sink = ByteSink::new(&mut wire);
        server.reply(&mut sink, &remote.key::<0>()).expect("relay");
        assert_eq!(wire, [0x00, 0x05, 0x00]);
        assert!(!server.is_loaded());
    }

    #[test]
    fn relay_preconditions_are_checked() {
        type Tight = Keyring<(fn([u8; 2]) -> u32,)>;
        type Wrong = Keyring<(fn([u8; 4]) -> u32,)>;

        let mut buf = [0u8; Ring::NEEDED_SINGLE];
        let mut server = server(&mut buf);
        server.read_from(&mut ByteSource::new(&[0x00, 0x02, 0x00, 0x03, 0x00]));

        let mut wire = [0u8; 8];
        // Size must match the staged two bytes exactly.
        let mut sink = ByteSink::new(&mut wire);
        assert_eq!(
            server.reply(&mut sink, &Wrong::new(Format::LITTLE).key::<0>()),
            Err(Error::SizeMismatch)
        );
        assert!(server.is_loaded());

        // A partially drained reply cannot be relayed.
        server.get();
        let mut sink = ByteSink::new(&mut wire);
        assert_eq!(
            server.reply(&mut sink, &Tight::new(Format::LITTLE).key::<0>()),
            Err(Error::PartiallyDrained)
        );
    }
}
