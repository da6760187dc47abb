// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Typed protobuf messaging over a loopback endpoint.
// Run with: cargo test --features codec-prost

#![cfg(feature = "codec-prost")]

use std::thread;

use muxipc::typed::{TypedReceiver, TypedSender};
use muxipc::{ChannelMode, Endpoint, RingTransport};
use prost::Message;

#[derive(Clone, PartialEq, Message)]
struct Ping {
    #[prost(uint32, tag = "1")]
    seq: u32,
    #[prost(string, tag = "2")]
    note: String,
}

#[test]
fn typed_round_trip() {
    let ep = Endpoint::new(RingTransport::new(4096));
    let messages = 100u32;

    let receiver = TypedReceiver::<Ping>::new(
        ep.acquire_channel(0, ChannelMode::ReadOnly).unwrap(),
    );
    let sender = TypedSender::<Ping>::new(
        ep.acquire_channel(0, ChannelMode::WriteOnly).unwrap(),
    );

    let consumer = thread::spawn(move || {
        for seq in 1..=messages {
            let ping = receiver.recv().unwrap();
            assert_eq!(ping.seq, seq);
            assert_eq!(ping.note, format!("ping #{seq}"));
        }
    });

    for seq in 1..=messages {
        let ping = Ping {
            seq,
            note: format!("ping #{seq}"),
        };
        assert!(sender.send(&ping));
    }

    consumer.join().unwrap();
}

#[test]
fn typed_recv_reports_closure() {
    let ep = Endpoint::new(RingTransport::new(1024));
    let receiver = TypedReceiver::<Ping>::new(
        ep.acquire_channel(1, ChannelMode::ReadOnly).unwrap(),
    );

    ep.abort(muxipc::CloseReason::UserClosed);
    assert!(receiver.recv().is_err());
}
