// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Optional typed-message layer: protobuf-encoded messages over a channel
// handle (feature = codec-prost). Channel 0 is the conventional home for
// protobuf traffic; any channel works.

use prost::Message;

use crate::channel::Channel;
use crate::error::{CloseReason, Error};

/// Sends protobuf messages over a channel handle.
///
/// Each message is encoded, written as one fragment run, and terminated, so
/// the receiving side sees exactly one framed message per `send`.
pub struct TypedSender<M> {
    channel: Channel,
    _marker: std::marker::PhantomData<M>,
}

impl<M: Message> TypedSender<M> {
    /// Wrap a channel handle acquired for writing.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            _marker: std::marker::PhantomData,
        }
    }

    /// Encode and send one message. Returns `false` once the endpoint is
    /// closed.
    pub fn send(&self, message: &M) -> bool {
        let encoded = message.encode_to_vec();
        self.channel.write_message_buffers(&[encoded])
    }

    /// Access the underlying channel handle.
    pub fn raw(&self) -> &Channel {
        &self.channel
    }
}

/// Receives protobuf messages from a channel handle.
pub struct TypedReceiver<M> {
    channel: Channel,
    _marker: std::marker::PhantomData<M>,
}

impl<M: Message + Default> TypedReceiver<M> {
    /// Wrap a channel handle acquired for reading.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            _marker: std::marker::PhantomData,
        }
    }

    /// Receive and decode one message.
    ///
    /// The sender's terminator frame arrives as an empty trailing message;
    /// it is consumed here so every call maps to one `send` on the far side.
    pub fn recv(&self) -> Result<M, Error> {
        loop {
            let buffers = self.channel.read_message_buffers();
            if buffers.is_empty() {
                if self.channel.is_eof() {
                    return Err(Error::Closed(CloseReason::ConnectionLost));
                }
                // The bare terminator that follows a buffer-list write.
                continue;
            }
            let mut encoded = Vec::with_capacity(buffers.iter().map(|b| b.len()).sum());
            for buffer in &buffers {
                encoded.extend_from_slice(buffer.data());
            }
            return M::decode(encoded.as_slice()).map_err(Error::from);
        }
    }

    /// Access the underlying channel handle.
    pub fn raw(&self) -> &Channel {
        &self.channel
    }
}
