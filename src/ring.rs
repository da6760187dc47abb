// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A bounded, blocking, auto-resizing byte ring implementing the transport
// contract. Used where sender and receiver share a process: tests, loopback
// pipelines, staging buffers.
//
// One byte of capacity stays reserved so a full ring never looks empty; the
// writer's wait predicate is strictly greater-than for the same reason.
// When a pending read and a pending write are both unsatisfiable, the writer
// doubles the capacity (to at least the sum of the two requests) instead of
// deadlocking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use crate::error::CloseReason;
use crate::transport::Transport;

struct RingState {
    data: Vec<u8>,
    read_idx: usize,
    write_idx: usize,
    last_read: usize,
    last_write: usize,
    eof_delivered: bool,
}

impl RingState {
    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn readable(&self) -> usize {
        if self.write_idx >= self.read_idx {
            self.write_idx - self.read_idx
        } else {
            self.capacity() - (self.read_idx - self.write_idx)
        }
    }

    fn read_unchecked(&mut self, buf: &mut [u8]) {
        let size = buf.len();
        let end = self.read_idx + size;
        if end > self.capacity() {
            let first = self.capacity() - self.read_idx;
            buf[..first].copy_from_slice(&self.data[self.read_idx..]);
            buf[first..].copy_from_slice(&self.data[..size - first]);
            self.read_idx = size - first;
        } else {
            buf.copy_from_slice(&self.data[self.read_idx..end]);
            self.read_idx = if end == self.capacity() { 0 } else { end };
        }
    }

    fn write_unchecked(&mut self, buf: &[u8]) {
        let size = buf.len();
        let end = self.write_idx + size;
        if end > self.capacity() {
            let first = self.capacity() - self.write_idx;
            self.data[self.write_idx..].copy_from_slice(&buf[..first]);
            let wrapped = size - first;
            self.data[..wrapped].copy_from_slice(&buf[first..]);
            self.write_idx = wrapped;
        } else {
            self.data[self.write_idx..end].copy_from_slice(buf);
            self.write_idx = if end == self.capacity() { 0 } else { end };
        }
    }

    fn resize(&mut self, new_capacity: usize) {
        log::debug!(
            "ring resize {} -> {new_capacity} bytes",
            self.capacity()
        );
        let occupied = self.readable();
        let mut grown = vec![0u8; new_capacity];
        self.read_unchecked(&mut grown[..occupied]);
        self.data = grown;
        self.read_idx = 0;
        self.write_idx = occupied;
    }
}

/// An in-process ring-buffer transport.
///
/// `read_raw` blocks until the requested byte count is available;
/// `write_raw` blocks until the bytes fit. After [`abort`](Transport::abort),
/// the first read observes a clean EOF (`0`), subsequent reads fail (`-1`),
/// and writes return `false`.
pub struct RingTransport {
    state: Mutex<RingState>,
    cond: Condvar,
    closed: AtomicBool,
}

impl RingTransport {
    /// A ring of `capacity` bytes (one of which stays reserved).
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                data: vec![0; capacity],
                read_idx: 0,
                write_idx: 0,
                last_read: 0,
                last_write: 0,
                eof_delivered: false,
            }),
            cond: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Current capacity, including the reserved byte.
    pub fn capacity(&self) -> usize {
        self.state.lock().unwrap().capacity()
    }

    /// Bytes currently buffered.
    pub fn readable(&self) -> usize {
        self.state.lock().unwrap().readable()
    }

    /// Discard everything buffered.
    pub fn clear(&self) {
        let mut st = self.state.lock().unwrap();
        st.read_idx = 0;
        st.write_idx = 0;
    }

    /// Whether the ring has been aborted.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Transport for RingTransport {
    fn read_raw(&self, buf: &mut [u8]) -> isize {
        let size = buf.len();
        {
            let mut st = self.state.lock().unwrap();
            st.last_read = size;
            loop {
                if self.closed.load(Ordering::Acquire) {
                    if st.eof_delivered {
                        return -1;
                    }
                    st.eof_delivered = true;
                    return 0;
                }
                let readable = st.readable();
                let writable = st.capacity() - readable;
                if st.last_read > readable && st.last_write > writable {
                    // Neither request fits; the writer must resize first.
                    self.cond.notify_one();
                }
                if readable >= st.last_read {
                    break;
                }
                st = self.cond.wait(st).unwrap();
            }
            st.read_unchecked(buf);
            st.last_read = 0;
        }
        self.cond.notify_one();
        size as isize
    }

    fn write_raw(&self, buf: &[u8]) -> bool {
        {
            let mut st = self.state.lock().unwrap();
            st.last_write = buf.len();
            loop {
                if self.closed.load(Ordering::Acquire) {
                    return false;
                }
                let readable = st.readable();
                let mut writable = st.capacity() - readable;
                if st.last_read > readable && st.last_write > writable {
                    let wanted = st.last_read + st.last_write;
                    let doubled = st.capacity() * 2;
                    st.resize(wanted.max(doubled));
                    writable = st.capacity() - st.write_idx;
                }
                // Strictly greater, so write_idx == read_idx always means
                // empty.
                if writable > st.last_write {
                    break;
                }
                st = self.cond.wait(st).unwrap();
            }
            st.write_unchecked(buf);
            st.last_write = 0;
        }
        self.cond.notify_one();
        true
    }

    fn abort(&self, reason: CloseReason) -> bool {
        let first = !self.closed.swap(true, Ordering::AcqRel);
        if first {
            log::debug!("ring transport aborted: {reason:?}");
        }
        self.cond.notify_all();
        first
    }
}

impl std::fmt::Debug for RingTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock().unwrap();
        f.debug_struct("RingTransport")
            .field("capacity", &st.capacity())
            .field("readable", &st.readable())
            .field("closed", &self.is_closed())
            .finish()
    }
}
