// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The raw header-then-payload accessor, for callers that parse their own
// messages instead of going through channel handles. One header at a time:
// asking for the next header while payload bytes remain is a usage error.

use crate::endpoint::Endpoint;
use crate::error::{CloseReason, Error};
use crate::frame::FrameHeader;

impl Endpoint {
    /// Read the next frame header in the stream.
    ///
    /// Validates the magic bytes (the endpoint fails closed with
    /// `StreamIntegrityViolation` on a mismatch), skips any extension bytes,
    /// and records the payload length for [`read_payload`](Self::read_payload).
    pub fn read_message_header(&self) -> Result<FrameHeader, Error> {
        let mut raw = self.raw.lock().unwrap();
        if raw.remaining > 0 {
            return Err(Error::PayloadPending(raw.remaining));
        }

        let mut header = FrameHeader::new();
        let mut position = 0usize;
        while position < FrameHeader::LEN {
            let n = self.transport.read_raw(&mut header.as_mut_bytes()[position..]);
            if n <= 0 {
                self.close(CloseReason::ReadFailure);
                return Err(Error::Closed(CloseReason::ReadFailure));
            }
            position += n as usize;
        }

        if !header.validate() {
            self.close(CloseReason::StreamIntegrityViolation);
            let bytes = header.as_bytes();
            if bytes[0] != FrameHeader::MAGIC1 || bytes[1] != FrameHeader::MAGIC2 {
                return Err(Error::MagicMismatch);
            }
            return Err(Error::HeaderTooShort(header.header_len()));
        }

        // Skip extension bytes between the fixed header and the declared
        // header length.
        let mut ext = header.header_len() as usize - FrameHeader::LEN;
        let mut scratch = [0u8; 256];
        while ext > 0 {
            let want = ext.min(scratch.len());
            let n = self.transport.read_raw(&mut scratch[..want]);
            if n <= 0 {
                self.close(CloseReason::ReadFailure);
                return Err(Error::Closed(CloseReason::ReadFailure));
            }
            ext -= n as usize;
        }

        raw.header = header;
        raw.remaining = header.payload_size() as usize;
        Ok(header)
    }

    /// Read up to `buf.len()` payload bytes of the most recently read
    /// header, never past the payload's end. Returns 0 once the payload is
    /// exhausted; a transport failure passes through as a non-positive
    /// value.
    pub fn read_payload(&self, buf: &mut [u8]) -> isize {
        let mut raw = self.raw.lock().unwrap();
        let want = buf.len().min(raw.remaining);
        if want == 0 {
            return 0;
        }
        let n = self.transport.read_raw(&mut buf[..want]);
        if n > 0 {
            raw.remaining -= n as usize;
        }
        n
    }

    /// The header most recently returned by
    /// [`read_message_header`](Self::read_message_header).
    pub fn last_message_header(&self) -> FrameHeader {
        self.raw.lock().unwrap().header
    }

    /// Payload bytes of the current message not yet consumed through
    /// [`read_payload`](Self::read_payload).
    pub fn payload_remaining(&self) -> usize {
        self.raw.lock().unwrap().remaining
    }
}
