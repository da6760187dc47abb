// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// File transport tests: raw byte round-trips, the two-channel frame stream
// read back through the raw accessor, and EOF semantics.

use muxipc::{ChannelMode, Endpoint, FileTransport, Transport};

#[test]
fn raw_write_to_read_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw_round_trip");
    let message = b"0123456789abcdef";

    {
        let file = FileTransport::open(&path, false, true).unwrap();
        assert!(file.write_raw(message));
    }

    let file = FileTransport::open(&path, true, false).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(file.read_raw(&mut buf), 16);
    assert_eq!(&buf, message);
}

#[test]
fn file_endpoint_two_channels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two_channels");
    let message1 = b"0123456789abcdef";
    let message2 = b"fedcba9876543210";

    // Record two messages, one per channel.
    {
        let ep = Endpoint::new(FileTransport::open(&path, false, true).unwrap());
        let channel0 = ep.acquire_channel(0, ChannelMode::WriteOnly).unwrap();
        let channel1 = ep.acquire_channel(1, ChannelMode::WriteOnly).unwrap();

        assert!(channel0.write(message1));
        assert!(channel0.write_message_complete());
        assert!(channel1.write(message2));
        assert!(channel1.write_message_complete());
    }

    // Play the stream back through the raw accessor.
    let ep = Endpoint::new(FileTransport::open(&path, true, false).unwrap());
    let mut buf = [0u8; 16];

    let hdr = ep.read_message_header().unwrap();
    assert_eq!(hdr.channel(), 0);
    assert!(!hdr.is_end_of_message());
    assert_eq!(hdr.payload_size(), message1.len() as u32);
    assert_eq!(ep.read_payload(&mut buf), 16);
    assert_eq!(&buf, message1);

    let hdr = ep.read_message_header().unwrap();
    assert_eq!(hdr.channel(), 0);
    assert!(hdr.is_end_of_message());
    assert_eq!(hdr.payload_size(), 0);

    let hdr = ep.read_message_header().unwrap();
    assert_eq!(hdr.channel(), 1);
    assert_eq!(hdr.payload_size(), message2.len() as u32);
    assert_eq!(ep.read_payload(&mut buf), 16);
    assert_eq!(&buf, message2);

    let hdr = ep.read_message_header().unwrap();
    assert_eq!(hdr.channel(), 1);
    assert!(hdr.is_end_of_message());
}

#[test]
fn header_while_payload_pending_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pending_payload");

    {
        let ep = Endpoint::new(FileTransport::open(&path, false, true).unwrap());
        let channel = ep.acquire_channel(0, ChannelMode::WriteOnly).unwrap();
        assert!(channel.write(b"some payload"));
    }

    let ep = Endpoint::new(FileTransport::open(&path, true, false).unwrap());
    let hdr = ep.read_message_header().unwrap();
    assert_eq!(hdr.payload_size(), 12);
    assert_eq!(ep.payload_remaining(), 12);

    let err = ep.read_message_header().unwrap_err();
    assert!(matches!(err, muxipc::Error::PayloadPending(12)));

    // Draining the payload clears the guard.
    let mut buf = [0u8; 12];
    assert_eq!(ep.read_payload(&mut buf), 12);
    assert_eq!(ep.payload_remaining(), 0);
    assert_eq!(ep.last_message_header().payload_size(), 12);
}

#[test]
fn read_payload_never_crosses_the_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bounded_payload");

    {
        let ep = Endpoint::new(FileTransport::open(&path, false, true).unwrap());
        let channel = ep.acquire_channel(2, ChannelMode::WriteOnly).unwrap();
        assert!(channel.write(b"abcd"));
        assert!(channel.write(b"efgh"));
    }

    let ep = Endpoint::new(FileTransport::open(&path, true, false).unwrap());
    let hdr = ep.read_message_header().unwrap();
    assert_eq!(hdr.payload_size(), 4);

    // Asking for more than the payload holds stops at the frame edge.
    let mut buf = [0u8; 64];
    assert_eq!(ep.read_payload(&mut buf), 4);
    assert_eq!(&buf[..4], b"abcd");
    assert_eq!(ep.read_payload(&mut buf), 0);

    let hdr = ep.read_message_header().unwrap();
    assert_eq!(hdr.payload_size(), 4);
    assert_eq!(ep.read_payload(&mut buf), 4);
    assert_eq!(&buf[..4], b"efgh");
}

#[test]
fn bad_magic_surfaces_and_closes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_magic");

    {
        let file = FileTransport::open(&path, false, true).unwrap();
        assert!(file.write_raw(&[0xFF, 0xFF, 0x00, 0x08, 0, 0, 0, 4]));
    }

    let ep = Endpoint::new(FileTransport::open(&path, true, false).unwrap());
    let err = ep.read_message_header().unwrap_err();
    assert!(matches!(err, muxipc::Error::MagicMismatch));
    assert!(ep.is_closed());
}

#[test]
fn eof_is_clean_once_then_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eof");

    {
        let file = FileTransport::open(&path, false, true).unwrap();
        assert!(file.write_raw(b"tail"));
    }

    let file = FileTransport::open(&path, true, false).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(file.read_raw(&mut buf), 4);
    assert_eq!(file.read_raw(&mut buf), 0);
    assert_eq!(file.read_raw(&mut buf), -1);
}
