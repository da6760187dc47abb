// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The contract between the framing engine and the byte transport underneath
// it. Concrete transports: RingTransport (in-process), FileTransport,
// SocketTransport (unix).

use crate::error::CloseReason;

/// A blocking, bidirectional byte transport.
///
/// The framing engine drives a transport through exactly these three
/// operations. Implementations use interior mutability; every method takes
/// `&self` so one transport can serve a reading and a writing thread at
/// once.
pub trait Transport: Send + Sync {
    /// Read up to `buf.len()` bytes, blocking until at least one byte is
    /// available. Returns the number of bytes read, `0` for a clean EOF,
    /// or a negative value on failure.
    fn read_raw(&self, buf: &mut [u8]) -> isize;

    /// Write all of `buf`, blocking as needed. Returns `false` on failure.
    fn write_raw(&self, buf: &[u8]) -> bool;

    /// Tear the transport down, waking any blocked reads and writes.
    /// The first call returns `true`; subsequent calls return `false`.
    fn abort(&self, reason: CloseReason) -> bool;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn read_raw(&self, buf: &mut [u8]) -> isize {
        (**self).read_raw(buf)
    }

    fn write_raw(&self, buf: &[u8]) -> bool {
        (**self).write_raw(buf)
    }

    fn abort(&self, reason: CloseReason) -> bool {
        (**self).abort(reason)
    }
}
