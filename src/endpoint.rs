//! The sans-IO endpoint: one instance serves any number of peers over a
//! single unconnected socket the caller owns.
//!
//! The caller loop is:
//! 1. feed received datagrams with [`Endpoint::handle_datagram`],
//! 2. call [`Endpoint::handle_timeout`] at [`Endpoint::poll_timeout`],
//! 3. send everything [`Endpoint::poll_transmit`] returns,
//! 4. act on [`Endpoint::poll_event`].

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::Config;
use crate::crypto::CookieGenerator;
use crate::error::Error;
use crate::handshake::{Handshaker, Output};
use crate::message::{
    Body, ContentType, DTLSRecord, Handshake, HelloVerifyRequest, MessageType, ParseContext,
};
use crate::rng::SeededRng;
use crate::session::Session;

/// An outgoing datagram and where to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub destination: SocketAddr,
    pub payload: Vec<u8>,
}

/// Things that happened, drained via [`Endpoint::poll_event`].
#[derive(Debug)]
pub enum Event {
    /// A handshake with this peer completed.
    Connected { addr: SocketAddr },
    /// Decrypted application data from an established peer.
    ApplicationData { addr: SocketAddr, data: Vec<u8> },
    /// The peer sent close_notify.
    ConnectionClosed { addr: SocketAddr },
    /// Flight retransmission was exhausted without an answer.
    HandshakeTimeout { addr: SocketAddr },
    /// The handshake was aborted. A matching fatal alert went out.
    HandshakeFailed { addr: SocketAddr, error: Error },
}

pub struct Endpoint {
    config: Config,
    rng: SeededRng,
    cookie: CookieGenerator,
    connections: HashMap<SocketAddr, Handshaker>,
    /// Client-side resumption cache, keyed by the peer we dialled.
    sessions_by_peer: HashMap<SocketAddr, Session>,
    /// Server-side resumption cache, keyed by session id.
    sessions_by_id: HashMap<Vec<u8>, Session>,
    transmit: VecDeque<Datagram>,
    events: VecDeque<Event>,
}

impl Endpoint {
    pub fn new(config: Config) -> Endpoint {
        let mut rng = SeededRng::new(config.rng_seed);
        let cookie = CookieGenerator::new(&mut rng);
        Endpoint {
            config,
            rng,
            cookie,
            connections: HashMap::new(),
            sessions_by_peer: HashMap::new(),
            sessions_by_id: HashMap::new(),
            transmit: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    /// Start (or restart) a client handshake towards `addr`. Resumes the
    /// cached session for that peer when one exists.
    pub fn connect(&mut self, addr: SocketAddr, now: Instant) -> Result<(), Error> {
        if self
            .connections
            .get(&addr)
            .is_some_and(|c| c.is_established())
        {
            debug!("Already connected to {}", addr);
            return Ok(());
        }

        let rng = self.child_rng();
        let resume = self.sessions_by_peer.get(&addr);
        let handshaker = Handshaker::new_client(self.config.clone(), rng, now, resume)?;
        self.install(addr, handshaker);
        Ok(())
    }

    /// Queue application data for `addr`. Data sent before the handshake
    /// completes is buffered and flushed once keys are up.
    pub fn send(&mut self, addr: SocketAddr, data: &[u8]) -> Result<(), Error> {
        let Some(connection) = self.connections.get_mut(&addr) else {
            return Err(Error::NotConnected);
        };
        connection.send_application_data(data)?;
        Self::drain(&mut self.transmit, addr, connection);
        Ok(())
    }

    /// Send close_notify to `addr` and drop the connection state. The
    /// cached session survives for later resumption.
    pub fn close(&mut self, addr: SocketAddr) {
        if let Some(mut connection) = self.connections.remove(&addr) {
            if connection.close().is_err() {
                debug!("Could not send close_notify to {}", addr);
            }
            Self::drain(&mut self.transmit, addr, &mut connection);
        }
    }

    pub fn is_established(&self, addr: SocketAddr) -> bool {
        self.connections
            .get(&addr)
            .is_some_and(|c| c.is_established())
    }

    /// Feed one received datagram.
    pub fn handle_datagram(
        &mut self,
        addr: SocketAddr,
        data: &[u8],
        now: Instant,
    ) -> Result<(), Error> {
        if !self.connections.contains_key(&addr) {
            match self.accept(addr, data, now) {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(error) => {
                    warn!("Rejecting handshake from {}: {}", addr, error);
                    self.send_plain_alert(addr, &error);
                    self.events.push_back(Event::HandshakeFailed {
                        addr,
                        error: error.clone(),
                    });
                    return Err(error);
                }
            }
        }

        let Some(connection) = self.connections.get_mut(&addr) else {
            return Ok(());
        };

        match connection.handle_datagram(data, now) {
            Ok(outputs) => {
                Self::drain(&mut self.transmit, addr, connection);
                for output in outputs {
                    self.handle_output(addr, output);
                }
                Ok(())
            }
            Err(error) => {
                warn!("Handshake with {} failed: {}", addr, error);
                connection.send_fatal_alert(&error);
                Self::drain(&mut self.transmit, addr, connection);
                self.connections.remove(&addr);
                self.events.push_back(Event::HandshakeFailed {
                    addr,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Drive retransmission timers.
    pub fn handle_timeout(&mut self, now: Instant) {
        let mut timed_out = Vec::new();

        for (addr, connection) in &mut self.connections {
            if connection.handle_timeout(now) {
                timed_out.push(*addr);
            } else {
                Self::drain(&mut self.transmit, *addr, connection);
            }
        }

        for addr in timed_out {
            self.connections.remove(&addr);
            self.events.push_back(Event::HandshakeTimeout { addr });
        }
    }

    /// The earliest instant at which [`Endpoint::handle_timeout`] has
    /// work to do.
    pub fn poll_timeout(&self) -> Option<Instant> {
        self.connections
            .values()
            .filter_map(|c| c.poll_timeout())
            .min()
    }

    pub fn poll_transmit(&mut self) -> Option<Datagram> {
        self.transmit.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// A datagram from an unknown peer: run the stateless cookie
    /// exchange. Returns whether a connection now exists for the peer.
    fn accept(&mut self, addr: SocketAddr, data: &[u8], now: Instant) -> Result<bool, Error> {
        let Ok((_, records)) = DTLSRecord::parse_datagram(data) else {
            debug!("Undecodable datagram from unknown peer {}", addr);
            return Ok(false);
        };

        let Some(record) = records
            .into_iter()
            .find(|r| r.content_type == ContentType::Handshake && r.epoch == 0)
        else {
            trace!("No plaintext handshake record from unknown peer {}", addr);
            return Ok(false);
        };

        let ctx = ParseContext::default();
        let Ok((_, handshake)) = Handshake::parse(&record.fragment, &ctx) else {
            debug!("Undecodable handshake from unknown peer {}", addr);
            return Ok(false);
        };

        if handshake.header.msg_type != MessageType::ClientHello {
            trace!(
                "Ignoring {:?} from unknown peer {}",
                handshake.header.msg_type,
                addr
            );
            return Ok(false);
        }
        let Body::ClientHello(hello) = &handshake.body else {
            return Ok(false);
        };

        if !self.cookie.verify(addr, hello)? {
            // No state is created for this peer; the cookie proves
            // address reachability on the retry.
            let cookie = self.cookie.generate(addr, hello)?;
            debug!("Sending cookie challenge to {}", addr);
            self.send_hello_verify(addr, record.sequence_number, cookie)?;
            return Ok(false);
        }

        let rng = self.child_rng();
        let resume = self.sessions_by_id.get(hello.session_id.as_ref());
        let handshaker =
            Handshaker::new_server(self.config.clone(), rng, now, handshake.clone(), resume)?;
        self.install(addr, handshaker);
        Ok(true)
    }

    /// A fatal alert for a peer we never created state for.
    fn send_plain_alert(&mut self, addr: SocketAddr, error: &Error) {
        let alert = crate::message::Alert::fatal(error.alert_description());
        let mut fragment = Vec::new();
        alert.serialize(&mut fragment);

        let record = DTLSRecord {
            content_type: ContentType::Alert,
            version: crate::message::ProtocolVersion::DTLS1_2,
            epoch: 0,
            sequence_number: 0,
            fragment,
        };
        let mut payload = Vec::with_capacity(record.wire_length());
        record.serialize(&mut payload);
        self.transmit.push_back(Datagram {
            destination: addr,
            payload,
        });
    }

    fn send_hello_verify(
        &mut self,
        addr: SocketAddr,
        sequence_number: u64,
        cookie: crate::message::Cookie,
    ) -> Result<(), Error> {
        let hvr = HelloVerifyRequest::new(cookie);
        let handshake = Handshake::new(0, Body::HelloVerifyRequest(hvr));

        let mut fragment = Vec::with_capacity(handshake.wire_length());
        handshake.serialize(&mut fragment);

        // Stateless: mirror the record sequence number of the hello we
        // are answering.
        let record = DTLSRecord {
            content_type: ContentType::Handshake,
            version: crate::message::ProtocolVersion::DTLS1_2,
            epoch: 0,
            sequence_number,
            fragment,
        };
        let mut payload = Vec::with_capacity(record.wire_length());
        record.serialize(&mut payload);
        self.transmit.push_back(Datagram {
            destination: addr,
            payload,
        });
        Ok(())
    }

    fn handle_output(&mut self, addr: SocketAddr, output: Output) {
        match output {
            Output::Connected(session) => {
                debug!("Connection to {} established", addr);
                if session.is_resumable() {
                    self.sessions_by_id
                        .insert(session.id().to_vec(), session.clone());
                }
                self.sessions_by_peer.insert(addr, session);
                self.events.push_back(Event::Connected { addr });
            }
            Output::ApplicationData(data) => {
                self.events.push_back(Event::ApplicationData { addr, data });
            }
            Output::PeerClosed => {
                self.connections.remove(&addr);
                self.events.push_back(Event::ConnectionClosed { addr });
            }
        }
    }

    fn install(&mut self, addr: SocketAddr, mut handshaker: Handshaker) {
        Self::drain(&mut self.transmit, addr, &mut handshaker);
        self.connections.insert(addr, handshaker);
    }

    /// A seeded endpoint hands out deterministic per-connection rngs.
    fn child_rng(&mut self) -> SeededRng {
        let seed = self.config.rng_seed.map(|_| self.rng.random());
        SeededRng::new(seed)
    }

    fn drain(transmit: &mut VecDeque<Datagram>, addr: SocketAddr, connection: &mut Handshaker) {
        while let Some(payload) = connection.poll_datagram() {
            transmit.push_back(Datagram {
                destination: addr,
                payload,
            });
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("connections", &self.connections.len())
            .field("cached_sessions", &self.sessions_by_id.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> SocketAddr {
        format!("127.0.0.{}:5684", last).parse().unwrap()
    }

    #[test]
    fn unknown_peer_garbage_is_ignored() {
        let mut endpoint = Endpoint::new(Config::builder().rng_seed(1).build());
        endpoint
            .handle_datagram(addr(1), &[0xFF; 32], Instant::now())
            .unwrap();
        assert!(endpoint.poll_transmit().is_none());
        assert!(endpoint.poll_event().is_none());
    }

    #[test]
    fn client_hello_without_cookie_gets_hello_verify() {
        let now = Instant::now();
        let mut client = Endpoint::new(Config::builder().rng_seed(1).build());
        let mut server = Endpoint::new(Config::builder().rng_seed(2).build());

        let server_addr = addr(1);
        let client_addr = addr(2);
        client.connect(server_addr, now).unwrap();

        let hello = client.poll_transmit().unwrap();
        assert_eq!(hello.destination, server_addr);

        server
            .handle_datagram(client_addr, &hello.payload, now)
            .unwrap();
        let verify = server.poll_transmit().unwrap();
        assert_eq!(verify.destination, client_addr);

        // No per-peer state yet on the server.
        assert!(!server.is_established(client_addr));
        let (_, records) = DTLSRecord::parse_datagram(&verify.payload).unwrap();
        assert_eq!(records[0].epoch, 0);
        let (_, handshake) =
            Handshake::parse(&records[0].fragment, &ParseContext::default()).unwrap();
        assert_eq!(handshake.header.msg_type, MessageType::HelloVerifyRequest);
    }
}
