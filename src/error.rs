// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Close reasons and the crate-level error type.

use thiserror::Error;

/// Why an endpoint transitioned to the closed state.
///
/// The first reason observed wins: `on_connection_lost` subscribers see it
/// exactly once, and later close attempts are silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Unknown / cannot determine.
    Unspecified,
    /// The remote end went away.
    ConnectionLost,
    /// The user requested a graceful close.
    UserClosed,
    /// The user requested the connection be aborted.
    UserAborted,
    /// The byte stream violated framing integrity (bad magic, short header).
    StreamIntegrityViolation,
    /// An unrecoverable write failure occurred.
    WriteFailure,
    /// An unrecoverable read failure occurred.
    ReadFailure,
    /// A shared reference could not be revived; the system is tearing down.
    WeakPointerLock,
}

/// Errors surfaced by the raw accessor and the buffer pool.
///
/// The channel-handle operations keep their numeric contracts (`-1` for a
/// failed read, `false` for a failed write); this type covers the paths where
/// the caller needs to know *what* went wrong, not just that it did.
#[derive(Debug, Error)]
pub enum Error {
    /// The frame header's magic bytes did not match.
    #[error("frame header magic mismatch")]
    MagicMismatch,

    /// The frame header declares a total length shorter than the fixed part.
    #[error("frame header length {0} is shorter than the fixed header")]
    HeaderTooShort(u8),

    /// `read_message_header` was called while payload bytes remain.
    #[error("{0} payload bytes of the current message remain unread")]
    PayloadPending(usize),

    /// The endpoint is closed.
    #[error("endpoint closed ({0:?})")]
    Closed(CloseReason),

    /// A buffer allocation of the given size failed.
    #[error("buffer allocation of {0} bytes failed")]
    OutOfMemory(usize),

    /// A typed message failed to decode.
    #[cfg(feature = "codec-prost")]
    #[error("message decode failed")]
    Decode(#[from] prost::DecodeError),
}
