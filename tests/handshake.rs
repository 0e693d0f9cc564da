//! Full handshakes: cookie exchange, ECDHE, PSK, client certificates,
//! application data and close_notify.

mod common;

use std::time::Instant;

use common::*;
use scute::message::CipherSuite;
use scute::{Config, Endpoint, Event, SinglePsk, TablePskStore};

#[test]
fn ecdhe_handshake_with_cookie_retry() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(ecdhe_client_config(1));
    let mut server = Endpoint::new(ecdhe_server_config(2));

    // FLIGHT 1: ClientHello without cookie.
    client.connect(server_addr(), now).expect("connect");
    let f1 = drain_transmit(&mut client);
    assert_eq!(handshake_types(&f1), [CLIENT_HELLO]);

    for d in &f1 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("server recv f1");
    }

    // FLIGHT 2: HelloVerifyRequest, with no server state behind it.
    let f2 = drain_transmit(&mut server);
    assert_eq!(handshake_types(&f2), [HELLO_VERIFY_REQUEST]);
    assert!(
        server.poll_timeout().is_none(),
        "cookie exchange must not create server state"
    );

    for d in &f2 {
        client
            .handle_datagram(server_addr(), &d.payload, now)
            .expect("client recv f2");
    }

    // FLIGHT 3: ClientHello again, now carrying the cookie.
    let f3 = drain_transmit(&mut client);
    assert_eq!(handshake_types(&f3), [CLIENT_HELLO]);

    for d in &f3 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("server recv f3");
    }

    // FLIGHT 4: the server hello flight, never another cookie challenge.
    let f4 = drain_transmit(&mut server);
    let f4_types = handshake_types(&f4);
    assert!(!f4_types.contains(&HELLO_VERIFY_REQUEST), "{:?}", f4_types);
    assert_eq!(
        f4_types,
        [SERVER_HELLO, CERTIFICATE, SERVER_KEY_EXCHANGE, SERVER_HELLO_DONE]
    );

    for d in &f4 {
        client
            .handle_datagram(server_addr(), &d.payload, now)
            .expect("client recv f4");
    }

    // The rest of the handshake.
    run(&mut client, &mut server, now);

    assert!(client.is_established(server_addr()));
    assert!(server.is_established(client_addr()));
    assert!(matches!(
        drain_events(&mut client).as_slice(),
        [Event::Connected { .. }]
    ));
    assert!(matches!(
        drain_events(&mut server).as_slice(),
        [Event::Connected { .. }]
    ));
}

#[test]
fn application_data_both_directions() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(ecdhe_client_config(3));
    let mut server = Endpoint::new(ecdhe_server_config(4));
    connect_pair(&mut client, &mut server, now);

    client.send(server_addr(), b"ping").expect("client send");
    let out = drain_transmit(&mut client);
    assert_eq!(content_types(&out), [CONTENT_APP_DATA]);
    let records = parse_records(&out[0].payload);
    assert_eq!(records[0].epoch, 1, "application data is protected");

    for d in &out {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("server recv");
    }
    match drain_events(&mut server).as_slice() {
        [Event::ApplicationData { data, .. }] => assert_eq!(data, b"ping"),
        other => panic!("unexpected events: {:?}", other),
    }

    server.send(client_addr(), b"pong").expect("server send");
    run(&mut client, &mut server, now);
    match drain_events(&mut client).as_slice() {
        [Event::ApplicationData { data, .. }] => assert_eq!(data, b"pong"),
        other => panic!("unexpected events: {:?}", other),
    }
}

#[test]
fn data_sent_before_connected_is_flushed_after() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(ecdhe_client_config(5));
    let mut server = Endpoint::new(ecdhe_server_config(6));

    client.connect(server_addr(), now).expect("connect");
    client.send(server_addr(), b"early").expect("buffered send");
    run(&mut client, &mut server, now);

    let events = drain_events(&mut server);
    assert!(matches!(events[0], Event::Connected { .. }));
    match &events[1] {
        Event::ApplicationData { data, .. } => assert_eq!(data, b"early"),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn psk_handshake() {
    init_log();
    let now = Instant::now();

    let client_config = Config::builder()
        .rng_seed(7)
        .cipher_suites(&[CipherSuite::PSK_AES128_CCM_8])
        .psk_store(SinglePsk::new(b"device-1", &[0x42; 16]).unwrap())
        .build();

    let mut table = TablePskStore::new();
    table.insert(b"device-1", &[0x42; 16]);
    let server_config = Config::builder()
        .rng_seed(8)
        .cipher_suites(&[CipherSuite::PSK_AES128_CCM_8])
        .psk_store(table)
        .build();

    let mut client = Endpoint::new(client_config);
    let mut server = Endpoint::new(server_config);

    client.connect(server_addr(), now).expect("connect");

    // Watch the server flight: a PSK handshake has no certificate and no
    // server key exchange (we send no identity hint).
    let f1 = drain_transmit(&mut client);
    for d in &f1 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("server recv");
    }
    let f2 = drain_transmit(&mut server);
    for d in &f2 {
        client
            .handle_datagram(server_addr(), &d.payload, now)
            .expect("client recv");
    }
    let f3 = drain_transmit(&mut client);
    for d in &f3 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("server recv");
    }
    let f4 = drain_transmit(&mut server);
    assert_eq!(handshake_types(&f4), [SERVER_HELLO, SERVER_HELLO_DONE]);

    // Re-run from the top to completion.
    let mut client = Endpoint::new(
        Config::builder()
            .rng_seed(9)
            .cipher_suites(&[CipherSuite::PSK_AES128_CCM_8])
            .psk_store(SinglePsk::new(b"device-1", &[0x42; 16]).unwrap())
            .build(),
    );
    let mut table = TablePskStore::new();
    table.insert(b"device-1", &[0x42; 16]);
    let mut server = Endpoint::new(
        Config::builder()
            .rng_seed(10)
            .cipher_suites(&[CipherSuite::PSK_AES128_CCM_8])
            .psk_store(table)
            .build(),
    );
    connect_pair(&mut client, &mut server, now);

    client.send(server_addr(), b"psk data").expect("send");
    run(&mut client, &mut server, now);
    match drain_events(&mut server).as_slice() {
        [Event::ApplicationData { data, .. }] => assert_eq!(data, b"psk data"),
        other => panic!("unexpected events: {:?}", other),
    }
}

#[test]
fn unknown_psk_identity_fails_handshake() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(
        Config::builder()
            .rng_seed(11)
            .cipher_suites(&[CipherSuite::PSK_AES128_CCM_8])
            .psk_store(SinglePsk::new(b"stranger", &[0x42; 16]).unwrap())
            .build(),
    );
    let mut server = Endpoint::new(
        Config::builder()
            .rng_seed(12)
            .cipher_suites(&[CipherSuite::PSK_AES128_CCM_8])
            .psk_store(TablePskStore::new())
            .build(),
    );

    client.connect(server_addr(), now).expect("connect");

    // Shuttle by hand, because the server is expected to error out.
    let mut failed = false;
    for _ in 0..10 {
        let from_client = drain_transmit(&mut client);
        for d in &from_client {
            if server
                .handle_datagram(client_addr(), &d.payload, now)
                .is_err()
            {
                failed = true;
            }
        }
        let from_server = drain_transmit(&mut server);
        for d in &from_server {
            let _ = client.handle_datagram(server_addr(), &d.payload, now);
        }
        if from_client.is_empty() && from_server.is_empty() {
            break;
        }
    }

    assert!(failed, "server should reject the unknown identity");
    assert!(matches!(
        drain_events(&mut server).as_slice(),
        [Event::HandshakeFailed { .. }]
    ));
    assert!(!server.is_established(client_addr()));
}

#[test]
fn server_can_require_client_certificate() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(ecdhe_client_config(13));
    let mut server = Endpoint::new(
        Config::builder()
            .rng_seed(14)
            .local_key(scute::LocalKey::generate())
            .require_client_certificate(true)
            .build(),
    );

    client.connect(server_addr(), now).expect("connect");

    // Cookie round.
    let f1 = drain_transmit(&mut client);
    for d in &f1 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("f1");
    }
    let f2 = drain_transmit(&mut server);
    for d in &f2 {
        client
            .handle_datagram(server_addr(), &d.payload, now)
            .expect("f2");
    }
    let f3 = drain_transmit(&mut client);
    for d in &f3 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("f3");
    }

    let f4 = drain_transmit(&mut server);
    assert!(
        handshake_types(&f4).contains(&CERTIFICATE_REQUEST),
        "server flight carries CertificateRequest"
    );
    for d in &f4 {
        client
            .handle_datagram(server_addr(), &d.payload, now)
            .expect("f4");
    }

    let f5 = drain_transmit(&mut client);
    let f5_types = handshake_types(&f5);
    assert!(f5_types.contains(&CERTIFICATE), "{:?}", f5_types);
    assert!(f5_types.contains(&CERTIFICATE_VERIFY), "{:?}", f5_types);
    for d in &f5 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("f5");
    }

    run(&mut client, &mut server, now);
    assert!(client.is_established(server_addr()));
    assert!(server.is_established(client_addr()));
}

#[test]
fn close_notify_reaches_the_peer() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(ecdhe_client_config(15));
    let mut server = Endpoint::new(ecdhe_server_config(16));
    connect_pair(&mut client, &mut server, now);

    client.close(server_addr());
    let out = drain_transmit(&mut client);
    assert_eq!(content_types(&out), [CONTENT_ALERT]);

    for d in &out {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("server recv close");
    }
    assert!(matches!(
        drain_events(&mut server).as_slice(),
        [Event::ConnectionClosed { .. }]
    ));
    assert!(!server.is_established(client_addr()));
}

/// With no suite overlap the server falls back to the NULL cipher and
/// the handshake still completes, unprotected.
#[test]
fn no_common_cipher_suite_falls_back_to_null() {
    init_log();
    let now = Instant::now();

    let mut client = Endpoint::new(
        Config::builder()
            .rng_seed(17)
            .cipher_suites(&[CipherSuite::PSK_AES128_CCM_8])
            .psk_store(SinglePsk::new(b"x", &[1; 16]).unwrap())
            .build(),
    );
    let mut server = Endpoint::new(
        Config::builder()
            .rng_seed(18)
            .cipher_suites(&[CipherSuite::ECDHE_ECDSA_AES128_CCM_8])
            .local_key(scute::LocalKey::generate())
            .build(),
    );

    client.connect(server_addr(), now).expect("connect");

    let f1 = drain_transmit(&mut client);
    for d in &f1 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("f1");
    }
    let f2 = drain_transmit(&mut server);
    for d in &f2 {
        client
            .handle_datagram(server_addr(), &d.payload, now)
            .expect("f2");
    }
    let f3 = drain_transmit(&mut client);
    for d in &f3 {
        server
            .handle_datagram(client_addr(), &d.payload, now)
            .expect("f3");
    }

    // NULL negotiates without certificates or a key exchange message.
    let f4 = drain_transmit(&mut server);
    assert_eq!(handshake_types(&f4), [SERVER_HELLO, SERVER_HELLO_DONE]);
    for d in &f4 {
        client
            .handle_datagram(server_addr(), &d.payload, now)
            .expect("f4");
    }

    run(&mut client, &mut server, now);
    assert!(client.is_established(server_addr()));
    assert!(server.is_established(client_addr()));
    drain_events(&mut client);
    drain_events(&mut server);

    client.send(server_addr(), b"plain").expect("send");
    run(&mut client, &mut server, now);
    match drain_events(&mut server).as_slice() {
        [Event::ApplicationData { data, .. }] => assert_eq!(data, b"plain"),
        other => panic!("unexpected events: {:?}", other),
    }
}
