// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// A scoped lease on one (channel, mode) pair of an endpoint.
//
// Methods on one handle are not thread-safe with respect to each other, but
// handles on distinct channels may be driven from distinct threads; the
// endpoint serializes each direction internally.

use std::io;
use std::sync::Arc;

use crate::buffer::PooledBuffer;
use crate::endpoint::{Endpoint, ReadDest};

/// Access mode requested when acquiring a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

/// A live lease on one channel of an endpoint.
///
/// Created only by [`Endpoint::acquire_channel`]; the slot is released when
/// the handle drops. At most one reading and one writing handle exist per
/// channel at any time.
pub struct Channel {
    endpoint: Arc<Endpoint>,
    channel: u8,
    mode: ChannelMode,
}

impl Channel {
    pub(crate) fn new(endpoint: Arc<Endpoint>, channel: u8, mode: ChannelMode) -> Self {
        Self {
            endpoint,
            channel,
            mode,
        }
    }

    /// The channel id this handle is leased on.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The mode this handle was acquired with.
    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// The endpoint this handle belongs to.
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    /// True once the underlying endpoint has closed.
    pub fn is_eof(&self) -> bool {
        self.endpoint.is_closed()
    }

    /// Read up to `buf.len()` bytes of the current message, blocking until
    /// bytes for this channel arrive. Stops early at end of message.
    /// Returns the byte count, or −1 once the endpoint is closed.
    pub fn read(&self, buf: &mut [u8]) -> isize {
        self.endpoint.read_channel(self.channel, ReadDest::Into(buf))
    }

    /// Write `buf` as one or more fragments of the message in progress.
    /// Returns `false` once the endpoint is closed or the transport fails.
    pub fn write(&self, buf: &[u8]) -> bool {
        self.endpoint.write_channel(self.channel, buf, false)
    }

    /// Read one entire message as a list of pool buffers, one per frame.
    /// Returns an empty list if the endpoint closes mid-message.
    pub fn read_message_buffers(&self) -> Vec<PooledBuffer> {
        self.endpoint.read_message_buffers_on(self.channel)
    }

    /// Write a whole message from a list of buffers and terminate it.
    pub fn write_message_buffers<B: AsRef<[u8]>>(&self, buffers: &[B]) -> bool {
        self.endpoint.write_message_buffers_on(self.channel, buffers)
    }

    /// Read and discard up to `count` bytes, stopping at end of message.
    pub fn skip(&self, count: usize) -> usize {
        self.endpoint.skip_channel(self.channel, count)
    }

    /// Arm the reader for the next message once the current one has been
    /// fully processed.
    pub fn read_message_complete(&self) {
        self.endpoint.read_message_complete_on(self.channel);
    }

    /// Emit the terminator frame that ends the message in progress.
    pub fn write_message_complete(&self) -> bool {
        self.endpoint.write_terminator(self.channel)
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.endpoint.release_channel(self.channel, self.mode);
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("channel", &self.channel)
            .field("mode", &self.mode)
            .finish()
    }
}

// The original models channels as plain input/output byte streams; the
// std::io traits are the Rust seam for the same callers.

impl io::Read for Channel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match Channel::read(self, buf) {
            n if n >= 0 => Ok(n as usize),
            _ => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "endpoint closed",
            )),
        }
    }
}

impl io::Write for Channel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if Channel::write(self, buf) {
            Ok(buf.len())
        } else {
            Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "endpoint closed",
            ))
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
