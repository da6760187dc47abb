// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Channel acquisition rules and multi-channel demultiplexing over a
// loopback ring endpoint.

use std::sync::Arc;
use std::thread;

use muxipc::{ChannelMode, Endpoint, FrameHeader, RingTransport, Transport};

fn loopback() -> (Arc<Endpoint>, Arc<RingTransport>) {
    let ring = Arc::new(RingTransport::new(64 * 1024));
    (Endpoint::new(Arc::clone(&ring)), ring)
}

#[test]
fn multiple_channel_instances() {
    let (ep, _ring) = loopback();

    // A read/write lease can only be checked out once.
    {
        let channel1 = ep.acquire_channel(0, ChannelMode::ReadWrite);
        assert!(channel1.is_some());
        let channel2 = ep.acquire_channel(0, ChannelMode::ReadWrite);
        assert!(channel2.is_none());
    }

    // Read and write leases on the same channel coexist.
    {
        let channel1 = ep.acquire_channel(1, ChannelMode::ReadOnly);
        assert!(channel1.is_some());
        let channel2 = ep.acquire_channel(1, ChannelMode::WriteOnly);
        assert!(channel2.is_some());
    }

    // Read/write conflicts with an existing read lease.
    {
        let channel1 = ep.acquire_channel(2, ChannelMode::ReadOnly);
        assert!(channel1.is_some());
        let channel2 = ep.acquire_channel(2, ChannelMode::ReadWrite);
        assert!(channel2.is_none());
    }

    // Dropping the lease frees the slot for re-acquisition.
    {
        let channel = ep.acquire_channel(3, ChannelMode::ReadWrite);
        assert!(channel.is_some());
        drop(channel);
        let channel = ep.acquire_channel(3, ChannelMode::ReadWrite);
        assert!(channel.is_some());
    }
}

#[test]
fn out_of_range_channel_is_refused() {
    let (ep, _ring) = loopback();
    assert!(ep.acquire_channel(4, ChannelMode::ReadOnly).is_none());
    assert!(ep.acquire_channel(255, ChannelMode::WriteOnly).is_none());
}

#[test]
fn double_write_lease_is_refused_until_release() {
    let (ep, _ring) = loopback();
    let writer = ep.acquire_channel(0, ChannelMode::WriteOnly).unwrap();
    assert!(ep.acquire_channel(0, ChannelMode::WriteOnly).is_none());
    drop(writer);
    assert!(ep.acquire_channel(0, ChannelMode::WriteOnly).is_some());
}

// Two channels, one writer thread, two reader threads. Each reader must see
// its own byte stream in write order while cooperatively advancing frames
// destined for the other.
#[test]
fn interleaved_channels_keep_fifo_order() {
    let (ep, _ring) = loopback();
    let messages = 50usize;

    // Leases must exist before traffic flows; frames that arrive for an
    // unclaimed channel are dropped by design.
    let mut readers = Vec::new();
    for channel in 0..2u8 {
        let handle = ep.acquire_channel(channel, ChannelMode::ReadOnly).unwrap();
        readers.push(thread::spawn(move || {
            for i in 0..messages {
                let buffers = handle.read_message_buffers();
                assert!(!buffers.is_empty(), "channel {channel} message {i} lost");
                let mut assembled = Vec::new();
                for buffer in &buffers {
                    assembled.extend_from_slice(buffer.data());
                }
                let expected = format!("chan{channel}-msg{i:04}");
                assert_eq!(assembled, expected.as_bytes(), "channel {channel}");
            }
        }));
    }

    let w0 = ep.acquire_channel(0, ChannelMode::WriteOnly).unwrap();
    let w1 = ep.acquire_channel(1, ChannelMode::WriteOnly).unwrap();
    let writer = thread::spawn(move || {
        for i in 0..messages {
            let m0 = format!("chan0-msg{i:04}");
            let m1 = format!("chan1-msg{i:04}");
            assert!(w0.write(m0.as_bytes()));
            assert!(w1.write(m1.as_bytes()));
            assert!(w0.write_message_complete());
            assert!(w1.write_message_complete());
        }
    });

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

// Frames for a channel with no registered reader are silently discarded.
#[test]
fn unclaimed_channel_traffic_is_drained() {
    let (ep, _ring) = loopback();

    let writer_unclaimed = ep.acquire_channel(2, ChannelMode::WriteOnly).unwrap();
    let writer = ep.acquire_channel(0, ChannelMode::WriteOnly).unwrap();

    assert!(writer_unclaimed.write(b"nobody is listening"));
    assert!(writer_unclaimed.write_message_complete());
    assert!(writer.write(b"for channel zero"));
    assert!(writer.write_message_complete());

    let reader = ep.acquire_channel(0, ChannelMode::ReadOnly).unwrap();
    let buffers = reader.read_message_buffers();
    assert_eq!(buffers.len(), 1);
    assert_eq!(buffers[0].data(), b"for channel zero");
}

#[test]
fn skip_discards_within_a_message() {
    let (ep, _ring) = loopback();

    let writer = ep.acquire_channel(0, ChannelMode::WriteOnly).unwrap();
    assert!(writer.write(b"0123456789"));
    assert!(writer.write_message_complete());

    let reader = ep.acquire_channel(0, ChannelMode::ReadOnly).unwrap();
    assert_eq!(reader.skip(4), 4);

    let mut tail = [0u8; 6];
    assert_eq!(reader.read(&mut tail), 6);
    assert_eq!(&tail, b"456789");
    reader.read_message_complete();
}

// A header may declare extra length beyond the fixed 8 bytes; readers skip
// the extension bytes without surfacing them.
#[test]
fn extension_header_bytes_are_skipped() {
    let (ep, ring) = loopback();

    let mut hdr = FrameHeader::new();
    hdr.set_channel(0);
    hdr.set_header_len(12);
    hdr.set_payload_size(3);
    assert!(ring.write_raw(hdr.as_bytes()));
    assert!(ring.write_raw(&[0xAA, 0xBB, 0xCC, 0xDD])); // extension bytes
    assert!(ring.write_raw(b"hey"));

    let mut terminator = FrameHeader::new();
    terminator.set_channel(0);
    terminator.set_end_of_message(true);
    assert!(ring.write_raw(terminator.as_bytes()));

    let reader = ep.acquire_channel(0, ChannelMode::ReadOnly).unwrap();
    let buffers = reader.read_message_buffers();
    assert_eq!(buffers.len(), 1);
    assert_eq!(buffers[0].data(), b"hey");
}

// Corrupt magic closes the endpoint with a stream-integrity failure.
#[test]
fn bad_magic_fails_closed() {
    let (ep, ring) = loopback();

    assert!(ring.write_raw(&[0x00, 0x00, 0x00, 0x08, 0, 0, 0, 0]));

    let reader = ep.acquire_channel(0, ChannelMode::ReadOnly).unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(reader.read(&mut buf), -1);
    assert!(ep.is_closed());
}
