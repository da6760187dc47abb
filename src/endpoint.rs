// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The framing engine: fragments outbound payloads into tagged frames,
// reassembles inbound frames per channel, and arbitrates which caller drains
// the transport at each moment.
//
// Locking layout: one mutex per direction (`send`, `recv`), a condition
// variable bound to `recv` for cross-channel reader handoff, and a small
// `pending` mutex guarding handler-slot transitions. `closed` and
// `has_pending` are atomics so the hot paths can check them without a lock.
// Lock order where nested: recv → pending.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};

use crate::buffer::{BufferPool, PooledBuffer};
use crate::channel::{Channel, ChannelMode};
use crate::error::CloseReason;
use crate::frame::{FrameHeader, NUM_CHANNELS};
use crate::transport::Transport;

/// Default cap on the payload bytes of a single outbound frame.
pub const DEFAULT_BLOCK_SIZE: usize = 0x7FFF_FFFF;

/// Size of the scratch buffer used to discard unclaimed traffic.
const DRAIN_SIZE: usize = 16 * 1024;

/// Per-channel handler state.
///
/// `pending` and `reading`/`writing` transitions happen under the pending
/// mutex; `eom` flips from the receive path as frames arrive. A channel
/// starts between messages (`eom = true`) with no handlers attached.
struct HandlerSlot {
    pending: AtomicBool,
    reading: AtomicBool,
    writing: AtomicBool,
    eom: AtomicBool,
}

impl HandlerSlot {
    fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            reading: AtomicBool::new(false),
            writing: AtomicBool::new(false),
            eom: AtomicBool::new(true),
        }
    }
}

/// Receive-position cursor: whether the engine is consuming header or
/// payload bytes of the current inbound frame, and how far along it is.
struct RecvCursor {
    header: FrameHeader,
    length: u32,
    position: u32,
    in_header: bool,
}

impl RecvCursor {
    fn new() -> Self {
        Self {
            header: FrameHeader::new(),
            length: FrameHeader::LEN as u32,
            position: 0,
            in_header: true,
        }
    }

    fn begin_header(&mut self) {
        *self = Self::new();
    }

    fn begin_payload(&mut self) {
        self.length = self.header.payload_size();
        self.position = 0;
        self.in_header = false;
    }
}

struct RecvState {
    cursor: RecvCursor,
    drain: Vec<u8>,
}

struct SendState {
    header: FrameHeader,
}

/// Cursor state for the raw header-then-payload accessor (see `raw.rs`).
pub(crate) struct RawCursor {
    pub(crate) header: FrameHeader,
    pub(crate) remaining: usize,
}

/// Destination of a framing-engine read: a caller-provided slice, or a
/// pool-allocated buffer created on first contact with payload bytes.
pub(crate) enum ReadDest<'a> {
    Into(&'a mut [u8]),
    Pooled {
        out: &'a mut Option<PooledBuffer>,
        max: usize,
    },
}

type LostCallback = Box<dyn FnOnce(CloseReason) + Send>;

/// A connected framing endpoint over some byte transport.
///
/// Endpoints are shared: channel handles hold a reference back to their
/// endpoint and release their slot on drop. Reads and writes progress in
/// parallel; within one direction, operations serialize.
pub struct Endpoint {
    /// Back-reference for handing out owning handles from `&self`.
    self_ref: Weak<Endpoint>,
    pub(crate) transport: Box<dyn Transport>,
    pool: BufferPool,
    block_size: usize,
    slots: [HandlerSlot; NUM_CHANNELS],
    pending: Mutex<()>,
    has_pending: AtomicBool,
    closed: AtomicBool,
    send: Mutex<SendState>,
    recv: Mutex<RecvState>,
    recv_cond: Condvar,
    pub(crate) raw: Mutex<RawCursor>,
    lost: Mutex<Vec<LostCallback>>,
}

impl Endpoint {
    /// Wrap a transport in a framing endpoint with the default block size.
    pub fn new<T: Transport + 'static>(transport: T) -> Arc<Self> {
        Self::with_block_size(transport, DEFAULT_BLOCK_SIZE)
    }

    /// Wrap a transport with an explicit outbound fragment cap. Long writes
    /// are chopped into `block_size`-byte frames (header included) so that a
    /// slow transport still makes forward progress frame by frame.
    pub fn with_block_size<T: Transport + 'static>(transport: T, block_size: usize) -> Arc<Self> {
        assert!(
            block_size > FrameHeader::LEN,
            "block size must leave room for a payload"
        );
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            transport: Box::new(transport),
            pool: BufferPool::new(),
            block_size,
            slots: std::array::from_fn(|_| HandlerSlot::new()),
            pending: Mutex::new(()),
            has_pending: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            send: Mutex::new(SendState {
                header: FrameHeader::new(),
            }),
            recv: Mutex::new(RecvState {
                cursor: RecvCursor::new(),
                drain: vec![0; DRAIN_SIZE],
            }),
            recv_cond: Condvar::new(),
            raw: Mutex::new(RawCursor {
                header: FrameHeader::new(),
                remaining: 0,
            }),
            lost: Mutex::new(Vec::new()),
        })
    }

    /// Whether the endpoint has transitioned to the closed state.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Register a callback for the moment the connection is lost. Fires at
    /// most once, with the first close reason observed; callbacks registered
    /// after the endpoint closed are never invoked.
    pub fn on_connection_lost<F>(&self, callback: F)
    where
        F: FnOnce(CloseReason) + Send + 'static,
    {
        self.lost.lock().unwrap().push(Box::new(callback));
    }

    /// Abandon any blocking operations and tear down the transport.
    /// The first call returns `true`; subsequent calls return `false`.
    pub fn abort(&self, reason: CloseReason) -> bool {
        let first = self.transport.abort(reason);
        self.close(reason);
        first
    }

    /// Mark the endpoint closed and wake everyone who may not know yet.
    /// Only the first close fires the connection-lost callbacks.
    pub(crate) fn close(&self, reason: CloseReason) {
        let was_closed = self.closed.swap(true, Ordering::AcqRel);
        if !was_closed {
            log::debug!("endpoint closed: {reason:?}");
            let callbacks = std::mem::take(&mut *self.lost.lock().unwrap());
            for callback in callbacks {
                callback(reason);
            }
        }
        self.recv_cond.notify_all();
    }

    // -----------------------------------------------------------------------
    // Channel acquisition
    // -----------------------------------------------------------------------

    /// Acquire a scoped lease on `(channel, mode)`.
    ///
    /// Returns `None` when the channel is out of range or the requested mode
    /// conflicts with a live handle; refusal is the expected "channel busy"
    /// signal, not an error. Read access starts out pending and attaches
    /// once the channel sits between messages.
    pub fn acquire_channel(&self, channel: u8, mode: ChannelMode) -> Option<Channel> {
        if channel as usize >= NUM_CHANNELS {
            return None;
        }
        let endpoint = self.self_ref.upgrade()?;
        let _guard = self.pending.lock().unwrap();
        let slot = &self.slots[channel as usize];
        match mode {
            ChannelMode::ReadOnly => {
                if slot.pending.load(Ordering::Relaxed) || slot.reading.load(Ordering::Relaxed) {
                    return None;
                }
                self.has_pending.store(true, Ordering::Release);
                slot.pending.store(true, Ordering::Relaxed);
            }
            ChannelMode::WriteOnly => {
                if slot.writing.load(Ordering::Relaxed) {
                    return None;
                }
                slot.writing.store(true, Ordering::Relaxed);
            }
            ChannelMode::ReadWrite => {
                if slot.pending.load(Ordering::Relaxed)
                    || slot.reading.load(Ordering::Relaxed)
                    || slot.writing.load(Ordering::Relaxed)
                {
                    return None;
                }
                self.has_pending.store(true, Ordering::Release);
                slot.pending.store(true, Ordering::Relaxed);
                slot.writing.store(true, Ordering::Relaxed);
            }
        }
        Some(Channel::new(endpoint, channel, mode))
    }

    /// Reverse exactly the flags `mode` set. `pending` is cleared even if
    /// the promotion to `reading` never happened.
    pub(crate) fn release_channel(&self, channel: u8, mode: ChannelMode) {
        if channel as usize >= NUM_CHANNELS {
            return;
        }
        let _guard = self.pending.lock().unwrap();
        let slot = &self.slots[channel as usize];
        match mode {
            ChannelMode::ReadOnly => {
                slot.reading.store(false, Ordering::Release);
                slot.pending.store(false, Ordering::Relaxed);
            }
            ChannelMode::WriteOnly => {
                slot.writing.store(false, Ordering::Relaxed);
            }
            ChannelMode::ReadWrite => {
                slot.writing.store(false, Ordering::Relaxed);
                slot.reading.store(false, Ordering::Release);
                slot.pending.store(false, Ordering::Relaxed);
            }
        }
        let still_pending = self
            .slots
            .iter()
            .any(|slot| slot.pending.load(Ordering::Relaxed));
        self.has_pending.store(still_pending, Ordering::Release);
    }

    /// Promote pending readers whose channel sits between messages.
    fn install_pending_readers(&self) {
        let _guard = self.pending.lock().unwrap();
        let mut still_pending = false;
        for slot in &self.slots {
            if slot.pending.load(Ordering::Relaxed) {
                if slot.eom.load(Ordering::Acquire) {
                    slot.reading.store(true, Ordering::Release);
                    slot.pending.store(false, Ordering::Relaxed);
                    slot.eom.store(false, Ordering::Release);
                } else {
                    still_pending = true;
                }
            }
        }
        self.has_pending.store(still_pending, Ordering::Release);
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Write `data` on `channel`, fragmenting at the block size. The final
    /// fragment carries the EOM flag iff `is_complete`. An empty buffer with
    /// `is_complete` degenerates to the bare terminator frame.
    pub(crate) fn write_channel(&self, channel: u8, data: &[u8], is_complete: bool) -> bool {
        if data.is_empty() {
            return if is_complete {
                self.write_terminator(channel)
            } else {
                true
            };
        }
        let mut send = self.send.lock().unwrap();
        let mut offset = 0usize;
        while offset < data.len() {
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            let n_remaining = data.len() - offset;
            let available = n_remaining.min(self.block_size - FrameHeader::LEN);
            send.header
                .set_end_of_message(is_complete && available == n_remaining);
            send.header.set_channel(channel);
            send.header.set_payload_size(available as u32);
            let ok = self.transport.write_raw(send.header.as_bytes())
                && self.transport.write_raw(&data[offset..offset + available]);
            if !ok {
                self.close(CloseReason::WriteFailure);
                return false;
            }
            offset += available;
        }
        true
    }

    /// Emit the zero-payload EOM frame that terminates the current message.
    pub(crate) fn write_terminator(&self, channel: u8) -> bool {
        let mut send = self.send.lock().unwrap();
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        send.header.set_end_of_message(true);
        send.header.set_channel(channel);
        send.header.set_payload_size(0);
        if !self.transport.write_raw(send.header.as_bytes()) {
            self.close(CloseReason::WriteFailure);
            return false;
        }
        true
    }

    /// Write each non-empty buffer as one fragment run, EOM on the last,
    /// then emit the terminator frame.
    pub(crate) fn write_message_buffers_on<B: AsRef<[u8]>>(
        &self,
        channel: u8,
        buffers: &[B],
    ) -> bool {
        if buffers.is_empty() {
            return false;
        }
        let last = buffers.len() - 1;
        for (i, buffer) in buffers.iter().enumerate() {
            let data = buffer.as_ref();
            if data.is_empty() {
                continue;
            }
            if !self.write_channel(channel, data, i == last) {
                return false;
            }
        }
        self.write_terminator(channel)
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Drive the inbound state machine until `channel` reaches end of
    /// message or the destination is full. Frames for other channels are
    /// handed to their reader (condvar handoff) or discarded when nobody
    /// claims them. Returns the bytes delivered, or −1 once the endpoint is
    /// closed.
    pub(crate) fn read_channel(&self, channel: u8, mut dest: ReadDest<'_>) -> isize {
        if self.closed.load(Ordering::Acquire) {
            return -1;
        }
        if self.has_pending.load(Ordering::Acquire) {
            self.install_pending_readers();
        }

        let slot = &self.slots[channel as usize];
        let mut size = match &dest {
            ReadDest::Into(buf) => buf.len(),
            ReadDest::Pooled { max, .. } => *max,
        };
        let mut n_remaining = size;
        let mut filled = 0usize;

        while !slot.eom.load(Ordering::Acquire) && n_remaining > 0 {
            let mut st = self.recv.lock().unwrap();

            if st.cursor.in_header {
                while (st.cursor.position as usize) < FrameHeader::LEN {
                    let pos = st.cursor.position as usize;
                    let n = self
                        .transport
                        .read_raw(&mut st.cursor.header.as_mut_bytes()[pos..]);
                    if n <= 0 {
                        self.close(CloseReason::ReadFailure);
                        return -1;
                    }
                    st.cursor.position += n as u32;
                }
                if !st.cursor.header.validate() {
                    log::warn!("received invalid frame header: {:?}", st.cursor.header);
                    self.close(CloseReason::StreamIntegrityViolation);
                    return -1;
                }
                // Skip any extension bytes between the fixed header and the
                // declared header length.
                let mut ext = st.cursor.header.header_len() as usize - FrameHeader::LEN;
                while ext > 0 {
                    let want = ext.min(st.drain.len());
                    let n = self.transport.read_raw(&mut st.drain[..want]);
                    if n <= 0 {
                        self.close(CloseReason::ReadFailure);
                        return -1;
                    }
                    ext -= n as usize;
                }
                if self.has_pending.load(Ordering::Acquire) {
                    self.install_pending_readers();
                }
                let mc = st.cursor.header.channel();
                let has_handler = self.slots[mc as usize].reading.load(Ordering::Acquire);
                if st.cursor.header.is_end_of_message() {
                    self.slots[mc as usize].eom.store(true, Ordering::Release);
                } else if !has_handler {
                    // A fresh in-flight message is starting on an unclaimed
                    // channel.
                    self.slots[mc as usize].eom.store(false, Ordering::Release);
                }
                st.cursor.begin_payload();
                if has_handler && mc != channel {
                    // Not our frame, and its reader can drain it.
                    self.recv_cond.notify_all();
                    continue;
                }
            } else {
                let mc = st.cursor.header.channel();
                if self.slots[mc as usize].reading.load(Ordering::Acquire) {
                    st = self
                        .recv_cond
                        .wait_while(st, |s| {
                            if s.cursor.in_header {
                                // The frame was fully consumed; the header
                                // phase is up for grabs.
                                return false;
                            }
                            let mc = s.cursor.header.channel();
                            !((mc == channel
                                && self.slots[mc as usize].reading.load(Ordering::Acquire))
                                || self.closed.load(Ordering::Acquire))
                        })
                        .unwrap();
                    if self.closed.load(Ordering::Acquire) {
                        self.recv_cond.notify_all();
                        return -1;
                    }
                    if st.cursor.in_header {
                        // Take over at the header phase.
                        continue;
                    }
                }
            }

            // Payload phase.
            let mc = st.cursor.header.channel();
            if mc == channel && self.slots[mc as usize].reading.load(Ordering::Acquire) {
                let frame_rem = (st.cursor.length - st.cursor.position) as usize;
                let mut available = frame_rem.min(n_remaining);
                if let ReadDest::Pooled { out, .. } = &mut dest {
                    if out.is_none() && available > 0 {
                        let pooled = match self.pool.get(available) {
                            Ok(pooled) => pooled,
                            Err(err) => panic!("message buffer allocation failed: {err}"),
                        };
                        **out = Some(pooled);
                        size = available;
                        n_remaining = available;
                        filled = 0;
                    }
                }
                while available > 0 {
                    let n = {
                        let window = match &mut dest {
                            ReadDest::Into(buf) => &mut buf[filled..filled + available],
                            ReadDest::Pooled { out, .. } => {
                                let pooled =
                                    out.as_mut().expect("pool buffer installed above");
                                &mut pooled.data_mut()[filled..filled + available]
                            }
                        };
                        self.transport.read_raw(window)
                    };
                    if n <= 0 {
                        self.close(CloseReason::ReadFailure);
                        return -1;
                    }
                    filled += n as usize;
                    st.cursor.position += n as u32;
                    available -= n as usize;
                    n_remaining -= n as usize;
                }
            } else {
                // Nobody claims this channel; discard the payload.
                let mut remaining = (st.cursor.length - st.cursor.position) as usize;
                while remaining > 0 {
                    let want = remaining.min(st.drain.len());
                    let n = self.transport.read_raw(&mut st.drain[..want]);
                    if n <= 0 {
                        self.close(CloseReason::ReadFailure);
                        return -1;
                    }
                    remaining -= n as usize;
                    st.cursor.position += n as u32;
                }
            }

            if st.cursor.position == st.cursor.length {
                st.cursor.begin_header();
                // Frame boundary: wake parked readers so one of them takes
                // over the header phase even if this thread stops reading.
                self.recv_cond.notify_all();
            }
            drop(st);
            if self.has_pending.load(Ordering::Acquire) {
                self.install_pending_readers();
            }
        }
        (size - n_remaining) as isize
    }

    /// Collect one whole message as a list of pool buffers, one per frame.
    /// If the endpoint closes before the message completes, the partial
    /// message is dropped and the list comes back empty.
    pub(crate) fn read_message_buffers_on(&self, channel: u8) -> Vec<PooledBuffer> {
        let slot = &self.slots[channel as usize];
        let mut buffers = Vec::new();
        loop {
            let mut shared: Option<PooledBuffer> = None;
            let n = self.read_channel(
                channel,
                ReadDest::Pooled {
                    out: &mut shared,
                    max: self.block_size,
                },
            );
            if n < 0 {
                break;
            }
            if let Some(buffer) = shared {
                debug_assert_eq!(buffer.len(), n as usize);
                buffers.push(buffer);
            }
            if slot.eom.load(Ordering::Acquire) {
                break;
            }
        }
        if self.closed.load(Ordering::Acquire) && !slot.eom.load(Ordering::Acquire) {
            return Vec::new();
        }
        slot.eom.store(false, Ordering::Release);
        buffers
    }

    /// Read and discard up to `count` bytes on `channel`, stopping at end of
    /// message. Returns the number of bytes skipped.
    pub(crate) fn skip_channel(&self, channel: u8, count: usize) -> usize {
        let slot = &self.slots[channel as usize];
        let mut scratch = vec![0u8; count.min(DRAIN_SIZE)];
        let mut n_remaining = count;
        while !self.closed.load(Ordering::Acquire)
            && !slot.eom.load(Ordering::Acquire)
            && n_remaining > 0
        {
            let want = n_remaining.min(scratch.len());
            let n = self.read_channel(channel, ReadDest::Into(&mut scratch[..want]));
            if n <= 0 {
                break;
            }
            n_remaining -= n as usize;
        }
        count - n_remaining
    }

    /// Re-arm the reader for the next message after the current one has been
    /// fully processed.
    pub(crate) fn read_message_complete_on(&self, channel: u8) {
        self.slots[channel as usize]
            .eom
            .store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("closed", &self.is_closed())
            .field("block_size", &self.block_size)
            .finish()
    }
}
