// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Multiplexed channel framing over byte-oriented IPC transports.
//
// Up to four independent logical channels share one bidirectional byte
// stream (UNIX socket, file, in-process ring). Application messages are
// chopped into tagged fragments, reassembled per channel on the far side,
// and handed to whichever channel handle claims them; traffic for channels
// nobody claims is drained and discarded.

mod frame;
pub use frame::{FrameHeader, CHANNEL_BITS, CHANNEL_MASK, NUM_CHANNELS};

mod error;
pub use error::{CloseReason, Error};

mod buffer;
pub use buffer::{Buffer, BufferPool, PooledBuffer, POOL_BYPASS_MAX};

mod transport;
pub use transport::Transport;

mod endpoint;
pub use endpoint::{Endpoint, DEFAULT_BLOCK_SIZE};

mod channel;
pub use channel::{Channel, ChannelMode};

mod raw;

mod ring;
pub use ring::RingTransport;

mod file;
pub use file::FileTransport;

#[cfg(unix)]
mod net_unix;
#[cfg(unix)]
pub use net_unix::SocketTransport;

#[cfg(feature = "codec-prost")]
pub mod typed;
