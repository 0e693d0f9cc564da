//! Shared helpers for integration tests.
//!
//! This file has no `#[test]` functions; Cargo compiles it as a no-op binary.
//! Import it from other test files via `mod common;`.

#![allow(unused)]

use std::net::SocketAddr;
use std::time::Instant;

use scute::{Config, Datagram, Endpoint, Event};

/// Handshake message types (RFC 5246 / 6347).
pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const HELLO_VERIFY_REQUEST: u8 = 3;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_KEY_EXCHANGE: u8 = 12;
pub const CERTIFICATE_REQUEST: u8 = 13;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const CERTIFICATE_VERIFY: u8 = 15;
pub const CLIENT_KEY_EXCHANGE: u8 = 16;
pub const FINISHED: u8 = 20;

pub const CONTENT_CCS: u8 = 20;
pub const CONTENT_ALERT: u8 = 21;
pub const CONTENT_HANDSHAKE: u8 = 22;
pub const CONTENT_APP_DATA: u8 = 23;

pub fn client_addr() -> SocketAddr {
    "10.0.0.1:5684".parse().unwrap()
}

pub fn server_addr() -> SocketAddr {
    "10.0.0.2:5684".parse().unwrap()
}

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Parsed DTLS record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecHdr {
    pub ctype: u8,
    pub epoch: u16,
    pub seq: u64,
    pub len: usize,
}

/// Parse record headers from a datagram.
pub fn parse_records(datagram: &[u8]) -> Vec<RecHdr> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let seq = u64::from_be_bytes([
            0,
            0,
            datagram[i + 5],
            datagram[i + 6],
            datagram[i + 7],
            datagram[i + 8],
            datagram[i + 9],
            datagram[i + 10],
        ]);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        out.push(RecHdr {
            ctype,
            epoch,
            seq,
            len,
        });
        i += 13 + len;
    }
    out
}

/// Handshake message types visible in plaintext (epoch 0) records.
pub fn parse_handshake_types(datagram: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i + 13 <= datagram.len() {
        let ctype = datagram[i];
        let epoch = u16::from_be_bytes([datagram[i + 3], datagram[i + 4]]);
        let len = u16::from_be_bytes([datagram[i + 11], datagram[i + 12]]) as usize;
        let fragment = &datagram[i + 13..i + 13 + len];
        if ctype == CONTENT_HANDSHAKE && epoch == 0 {
            // Walk the handshake messages inside the record.
            let mut j = 0usize;
            while j + 12 <= fragment.len() {
                out.push(fragment[j]);
                let frag_len = u32::from_be_bytes([
                    0,
                    fragment[j + 9],
                    fragment[j + 10],
                    fragment[j + 11],
                ]) as usize;
                j += 12 + frag_len;
            }
        }
        i += 13 + len;
    }
    out
}

pub fn handshake_types(datagrams: &[Datagram]) -> Vec<u8> {
    datagrams
        .iter()
        .flat_map(|d| parse_handshake_types(&d.payload))
        .collect()
}

pub fn content_types(datagrams: &[Datagram]) -> Vec<u8> {
    datagrams
        .iter()
        .flat_map(|d| parse_records(&d.payload))
        .map(|r| r.ctype)
        .collect()
}

pub fn drain_transmit(endpoint: &mut Endpoint) -> Vec<Datagram> {
    let mut out = Vec::new();
    while let Some(datagram) = endpoint.poll_transmit() {
        out.push(datagram);
    }
    out
}

pub fn drain_events(endpoint: &mut Endpoint) -> Vec<Event> {
    let mut out = Vec::new();
    while let Some(event) = endpoint.poll_event() {
        out.push(event);
    }
    out
}

/// Shuttle datagrams between the two endpoints until both go quiet.
pub fn run(client: &mut Endpoint, server: &mut Endpoint, now: Instant) {
    loop {
        let mut progressed = false;

        while let Some(datagram) = client.poll_transmit() {
            assert_eq!(datagram.destination, server_addr());
            server
                .handle_datagram(client_addr(), &datagram.payload, now)
                .expect("server datagram");
            progressed = true;
        }
        while let Some(datagram) = server.poll_transmit() {
            assert_eq!(datagram.destination, client_addr());
            client
                .handle_datagram(server_addr(), &datagram.payload, now)
                .expect("client datagram");
            progressed = true;
        }

        if !progressed {
            return;
        }
    }
}

/// Run a handshake to completion and assert both sides report Connected.
pub fn connect_pair(client: &mut Endpoint, server: &mut Endpoint, now: Instant) {
    client.connect(server_addr(), now).expect("connect");
    run(client, server, now);

    assert!(client.is_established(server_addr()), "client established");
    assert!(server.is_established(client_addr()), "server established");
    assert!(matches!(
        drain_events(client).as_slice(),
        [Event::Connected { .. }]
    ));
    assert!(matches!(
        drain_events(server).as_slice(),
        [Event::Connected { .. }]
    ));
}

pub fn ecdhe_client_config(seed: u64) -> Config {
    Config::builder()
        .rng_seed(seed)
        .local_key(scute::LocalKey::generate())
        .build()
}

pub fn ecdhe_server_config(seed: u64) -> Config {
    Config::builder()
        .rng_seed(seed)
        .local_key(scute::LocalKey::generate())
        .build()
}
