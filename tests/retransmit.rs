//! Flight retransmission: lost datagrams are resent byte for byte, the
//! timeout backs off, and a silent peer eventually gives up the handshake.

mod common;

use std::time::{Duration, Instant};

use common::*;
use scute::{Config, Endpoint, Event};

#[test]
fn lost_flight_is_resent_byte_identical() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(ecdhe_client_config(1));
    client.connect(server_addr(), now).expect("connect");

    // The first flight goes nowhere.
    let f1 = drain_transmit(&mut client);
    assert!(!f1.is_empty());

    let timeout = client.poll_timeout().expect("flight timer armed");
    assert!(timeout > now);

    // Nothing resent before the deadline.
    client.handle_timeout(now);
    assert!(drain_transmit(&mut client).is_empty());

    client.handle_timeout(timeout + Duration::from_millis(1));
    let f1_again = drain_transmit(&mut client);
    assert_eq!(f1, f1_again, "retransmission must be byte-identical");
}

#[test]
fn retransmission_interval_doubles() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(ecdhe_client_config(2));
    client.connect(server_addr(), now).expect("connect");
    drain_transmit(&mut client);

    let first = client.poll_timeout().expect("first deadline");
    client.handle_timeout(first + Duration::from_millis(1));
    drain_transmit(&mut client);

    let second = client.poll_timeout().expect("second deadline");
    let initial_wait = first - now;
    let backoff_wait = second - first;
    assert!(
        backoff_wait > initial_wait,
        "expected backoff, got {:?} then {:?}",
        initial_wait,
        backoff_wait
    );
}

#[test]
fn silent_peer_times_out_the_handshake() {
    init_log();
    let mut now = Instant::now();

    let mut client = Endpoint::new(
        Config::builder()
            .rng_seed(3)
            .local_key(scute::LocalKey::generate())
            .retransmit_start(Duration::from_millis(100))
            .retransmit_retries(2)
            .build(),
    );
    client.connect(server_addr(), now).expect("connect");
    drain_transmit(&mut client);

    let mut resends = 0;
    while let Some(deadline) = client.poll_timeout() {
        now = deadline + Duration::from_millis(1);
        client.handle_timeout(now);
        if !drain_transmit(&mut client).is_empty() {
            resends += 1;
        }
        assert!(resends <= 10, "retries must be bounded");
    }

    assert_eq!(resends, 2);
    assert!(matches!(
        drain_events(&mut client).as_slice(),
        [Event::HandshakeTimeout { .. }]
    ));
    assert!(!client.is_established(server_addr()));
    assert!(client.poll_timeout().is_none());
}

/// A duplicate Finished from the peer means our last flight was lost.
/// The server answers it by resending the final flight even though that
/// flight carries no timer.
#[test]
fn duplicate_finished_triggers_final_flight_resend() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(ecdhe_client_config(4));
    let mut server = Endpoint::new(ecdhe_server_config(5));

    client.connect(server_addr(), now).expect("connect");

    // Run the handshake but capture the client's final flight so we can
    // replay it.
    let mut client_final = Vec::new();
    loop {
        let from_client = drain_transmit(&mut client);
        for d in &from_client {
            server
                .handle_datagram(client_addr(), &d.payload, now)
                .expect("server datagram");
        }
        if server.is_established(client_addr()) && client_final.is_empty() {
            client_final = from_client.clone();
        }
        let from_server = drain_transmit(&mut server);
        for d in &from_server {
            client
                .handle_datagram(server_addr(), &d.payload, now)
                .expect("client datagram");
        }
        if from_client.is_empty() && from_server.is_empty() {
            break;
        }
    }
    assert!(client.is_established(server_addr()));
    assert!(!client_final.is_empty(), "captured the client final flight");
    drain_events(&mut client);
    drain_events(&mut server);

    // Replay the client's CCS + Finished as if the server's answer was
    // lost.
    for d in &client_final {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("server replay");
    }
    let resent = drain_transmit(&mut server);
    assert!(
        !resent.is_empty(),
        "server must resend its final flight on duplicate Finished"
    );
    assert!(content_types(&resent).contains(&CONTENT_CCS));
}
