//! The handshake state machine shared between roles.
//!
//! [`Core`] owns everything both roles need: the record layer, the
//! running transcript, handshake sequence bookkeeping, admission of
//! out-of-order messages and flight retransmission. The role modules
//! only decide what each admitted message means and what to send next.

mod client;
mod server;

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use p256::ecdsa::VerifyingKey;

use crate::config::Config;
use crate::crypto::{transcript_hash, EcdheKeyExchange, MasterSecret};
use crate::error::Error;
use crate::flight::{Flight, FlightTimeout};
use crate::message::{
    Alert, Body, ChangeCipherSpec, CipherSuite, ContentType, DTLSRecord, Handshake, MessageType,
    ParseContext, SessionId,
};
use crate::reassembly::FragmentBuffer;
use crate::record_layer::{RecordLayer, Role};
use crate::rng::SeededRng;
use crate::session::Session;

use client::ClientState;
use server::ServerState;

/// How many future-epoch records and future-sequence messages a session
/// holds on to while waiting for the gap to fill.
const MAX_QUEUED: usize = 16;

/// Largest handshake message accepted for reassembly. The 24-bit wire
/// length field would otherwise let one fragment demand a 16 MB buffer.
const MAX_MESSAGE_LEN: usize = 0x1_0000;

/// Coarse progress of a handshake, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandshakeState {
    Start,
    /// Client: initial ClientHello sent. Server side never observes this
    /// state since the cookie exchange is stateless.
    CookieExchange,
    /// Hellos are in flight, parameters being negotiated.
    Negotiating,
    /// Key exchange flights sent, keys derived.
    KeyExchange,
    /// ChangeCipherSpec seen or sent, waiting for Finished.
    Finishing,
    Complete,
    Failed,
}

/// What processing one datagram produced for the caller.
#[derive(Debug)]
pub(crate) enum Output {
    Connected(Session),
    ApplicationData(Vec<u8>),
    PeerClosed,
}

pub(crate) struct Core {
    pub config: Config,
    pub rng: SeededRng,
    pub record_layer: RecordLayer,
    pub state: HandshakeState,

    /// Concatenation of the unfragmented handshake messages that count
    /// towards Finished, in order.
    transcript: Vec<u8>,
    next_send_seq: u16,
    next_receive_seq: u16,

    /// Fragments of future-sequence messages of the current read epoch,
    /// in arrival order per message.
    queued_messages: BTreeMap<u16, Vec<Handshake>>,
    /// Still-protected records from a future read epoch.
    queued_records: Vec<DTLSRecord>,
    /// A ChangeCipherSpec that overtook the flight establishing the keys.
    ccs_queued: bool,
    reassembly: Option<FragmentBuffer>,

    transmit: VecDeque<Vec<u8>>,
    flight: Option<Flight>,
    pending_app_data: Vec<Vec<u8>>,

    pub client_random: Option<[u8; 32]>,
    pub server_random: Option<[u8; 32]>,
    pub cipher_suite: Option<CipherSuite>,
    pub session_id: SessionId,
    pub master: Option<MasterSecret>,
    /// Resuming an earlier session (abbreviated handshake).
    pub resuming: bool,

    pub ecdhe: Option<EcdheKeyExchange>,
    pub peer_verifying_key: Option<VerifyingKey>,
    /// Raw public key certificates negotiated via RFC 7250 extensions.
    pub raw_public_key: bool,
}

impl Core {
    fn new(config: Config, rng: SeededRng) -> Core {
        Core {
            config,
            rng,
            record_layer: RecordLayer::new(),
            state: HandshakeState::Start,
            transcript: Vec::new(),
            next_send_seq: 0,
            next_receive_seq: 0,
            queued_messages: BTreeMap::new(),
            queued_records: Vec::new(),
            ccs_queued: false,
            reassembly: None,
            transmit: VecDeque::new(),
            flight: None,
            pending_app_data: Vec::new(),
            client_random: None,
            server_random: None,
            cipher_suite: None,
            session_id: SessionId::empty(),
            master: None,
            resuming: false,
            ecdhe: None,
            peer_verifying_key: None,
            raw_public_key: false,
        }
    }

    pub fn parse_ctx(&self) -> ParseContext {
        ParseContext::new(self.cipher_suite, self.raw_public_key)
    }

    /// Append one unfragmented message to the Finished transcript.
    pub fn add_transcript(&mut self, handshake: &Handshake) {
        debug_assert!(handshake.header.is_complete());
        handshake.serialize(&mut self.transcript);
    }

    /// Splice a message in front of the transcript. Used by a client
    /// whose server skipped the cookie round: the initial ClientHello
    /// then counts, and it precedes the ServerHello already recorded.
    pub fn add_transcript_front(&mut self, handshake: &Handshake) {
        let mut front = Vec::with_capacity(handshake.wire_length());
        handshake.serialize(&mut front);
        front.extend_from_slice(&self.transcript);
        self.transcript = front;
    }

    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }

    pub fn transcript_hash(&self) -> [u8; 32] {
        transcript_hash(&self.transcript)
    }

    /// Wrap a body in a handshake header, consuming the next outgoing
    /// message sequence number.
    pub fn make_handshake(&mut self, body: Body) -> Handshake {
        let handshake = Handshake::new(self.next_send_seq, body);
        self.next_send_seq += 1;
        handshake
    }

    /// The master secret is derived exactly once per handshake.
    pub fn set_master(&mut self, master: MasterSecret) {
        debug_assert!(self.master.is_none());
        self.master = Some(master);
    }

    pub fn require_master(&self) -> Result<&MasterSecret, Error> {
        self.master
            .as_ref()
            .ok_or_else(|| Error::Crypto("master secret not derived".into()))
    }

    fn randoms(&self) -> Result<([u8; 32], [u8; 32]), Error> {
        let cr = self
            .client_random
            .ok_or_else(|| Error::Crypto("missing client random".into()))?;
        let sr = self
            .server_random
            .ok_or_else(|| Error::Crypto("missing server random".into()))?;
        Ok((cr, sr))
    }

    /// Derive the key block and stage the next-epoch ciphers.
    pub fn install_keys(&mut self, role: Role) -> Result<(), Error> {
        let (cr, sr) = self.randoms()?;
        let suite = self
            .cipher_suite
            .ok_or(Error::NoCommonCipherSuite)?;
        let master = self.require_master()?.clone();
        self.record_layer
            .install_pending(&master, &cr, &sr, suite, role)
    }

    /// `PRF(master, label, H(transcript))[0..12]`.
    pub fn verify_data(&self, label: &[u8]) -> Result<[u8; 12], Error> {
        let hash = self.transcript_hash();
        self.require_master()?.verify_data(label, &hash)
    }

    /// Fragment a handshake message and wrap each fragment in a record
    /// at the current write epoch.
    pub fn push_handshake(
        &mut self,
        records: &mut Vec<DTLSRecord>,
        handshake: &Handshake,
    ) -> Result<(), Error> {
        for fragment in handshake.fragment(self.config.max_fragment_len()) {
            records.push(self.record_layer.wrap_handshake(&fragment)?);
        }
        Ok(())
    }

    pub fn push_ccs(&mut self, records: &mut Vec<DTLSRecord>) -> Result<(), Error> {
        let mut payload = Vec::with_capacity(1);
        ChangeCipherSpec.serialize(&mut payload);
        records.push(
            self.record_layer
                .protect(ContentType::ChangeCipherSpec, &payload)?,
        );
        Ok(())
    }

    /// Pack records into MTU-sized datagrams, back to back.
    fn pack_datagrams(&self, records: &[DTLSRecord]) -> Vec<Vec<u8>> {
        let mut datagrams = Vec::new();
        let mut current = Vec::new();

        for record in records {
            if !current.is_empty() && current.len() + record.wire_length() > self.config.mtu {
                datagrams.push(std::mem::take(&mut current));
            }
            record.serialize(&mut current);
        }
        if !current.is_empty() {
            datagrams.push(current);
        }
        datagrams
    }

    /// Serialize a flight, queue it for transmission and arm (or not)
    /// its retransmission timer.
    pub fn send_flight(
        &mut self,
        records: Vec<DTLSRecord>,
        now: Instant,
        with_timer: bool,
    ) {
        let datagrams = self.pack_datagrams(&records);
        for d in &datagrams {
            self.transmit.push_back(d.clone());
        }

        let flight = if with_timer {
            Flight::new(
                datagrams,
                now,
                self.config.retransmit_start,
                self.config.retransmit_retries,
                &mut self.rng,
            )
        } else {
            Flight::without_timer(datagrams)
        };
        self.flight = Some(flight);
    }

    /// Resend the current flight's datagrams byte for byte.
    fn resend_flight(&mut self) {
        if let Some(flight) = &self.flight {
            debug!("Resending flight of {} datagrams", flight.datagrams().len());
            for d in flight.datagrams() {
                self.transmit.push_back(d.clone());
            }
        }
    }

    fn stop_flight_timer(&mut self) {
        if let Some(flight) = &mut self.flight {
            flight.stop_timer();
        }
    }

    fn send_alert(&mut self, alert: Alert) -> Result<(), Error> {
        let mut payload = Vec::with_capacity(2);
        alert.serialize(&mut payload);
        let record = self.record_layer.protect(ContentType::Alert, &payload)?;
        let mut datagram = Vec::with_capacity(record.wire_length());
        record.serialize(&mut datagram);
        self.transmit.push_back(datagram);
        Ok(())
    }

    fn flush_app_data(&mut self) -> Result<(), Error> {
        for data in std::mem::take(&mut self.pending_app_data) {
            let record = self
                .record_layer
                .protect(ContentType::ApplicationData, &data)?;
            let mut datagram = Vec::with_capacity(record.wire_length());
            record.serialize(&mut datagram);
            self.transmit.push_back(datagram);
        }
        Ok(())
    }
}

enum RoleState {
    Client(ClientState),
    Server(ServerState),
}

/// One peer's handshake, and after completion the running session.
pub(crate) struct Handshaker {
    core: Core,
    role: RoleState,
}

impl Handshaker {
    /// Start a client handshake. The initial ClientHello flight is queued
    /// immediately.
    pub fn new_client(
        config: Config,
        rng: SeededRng,
        now: Instant,
        resume: Option<&Session>,
    ) -> Result<Handshaker, Error> {
        let mut core = Core::new(config, rng);
        let state = ClientState::start(&mut core, now, resume)?;
        Ok(Handshaker {
            core,
            role: RoleState::Client(state),
        })
    }

    /// Start a server handshake from a cookie-verified ClientHello.
    ///
    /// The stateless cookie round already consumed the server's message
    /// sequence 0 (the HelloVerifyRequest), so sending resumes at 1.
    /// `resume` carries the cached session matching the hello's session
    /// id, if any.
    pub fn new_server(
        config: Config,
        rng: SeededRng,
        now: Instant,
        hello: Handshake,
        resume: Option<&Session>,
    ) -> Result<Handshaker, Error> {
        let mut core = Core::new(config, rng);
        core.next_send_seq = 1;
        core.next_receive_seq = 1;
        core.add_transcript(&hello);

        let Body::ClientHello(client_hello) = hello.body else {
            return Err(Error::UnexpectedMessage(hello.header.msg_type));
        };

        let state = ServerState::start(&mut core, now, &client_hello, resume)?;
        Ok(Handshaker {
            core,
            role: RoleState::Server(state),
        })
    }

    pub fn state(&self) -> HandshakeState {
        self.core.state
    }

    pub fn is_established(&self) -> bool {
        self.core.state == HandshakeState::Complete
    }

    pub fn poll_datagram(&mut self) -> Option<Vec<u8>> {
        self.core.transmit.pop_front()
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        self.core.flight.as_ref().and_then(|f| f.poll_timeout())
    }

    /// Drive retransmission. Returns `true` when retries are exhausted
    /// and the handshake is abandoned.
    pub fn handle_timeout(&mut self, now: Instant) -> bool {
        let Some(flight) = &mut self.core.flight else {
            return false;
        };

        match flight.handle_timeout(now, &mut self.core.rng) {
            FlightTimeout::Pending => false,
            FlightTimeout::Retransmit => {
                self.core.resend_flight();
                false
            }
            FlightTimeout::GiveUp => {
                warn!("Flight retransmission exhausted, abandoning handshake");
                self.core.state = HandshakeState::Failed;
                true
            }
        }
    }

    /// Queue application data. Before the handshake completes the data
    /// is buffered and flushed with the first protected epoch.
    pub fn send_application_data(&mut self, data: &[u8]) -> Result<(), Error> {
        self.core.pending_app_data.push(data.to_vec());
        if self.is_established() {
            self.core.flush_app_data()?;
        }
        Ok(())
    }

    /// Send close_notify. The session is unusable afterwards.
    pub fn close(&mut self) -> Result<(), Error> {
        self.core.send_alert(Alert::close_notify())?;
        self.core.state = HandshakeState::Failed;
        Ok(())
    }

    /// Send the fatal alert matching `error`, as a courtesy to the peer.
    pub fn send_fatal_alert(&mut self, error: &Error) {
        let alert = Alert::fatal(error.alert_description());
        if self.core.send_alert(alert).is_err() {
            debug!("Could not send fatal alert for {:?}", error);
        }
        self.core.state = HandshakeState::Failed;
    }

    /// Feed one datagram from the peer.
    pub fn handle_datagram(
        &mut self,
        data: &[u8],
        now: Instant,
    ) -> Result<Vec<Output>, Error> {
        let mut outputs = Vec::new();

        let records = match DTLSRecord::parse_datagram(data) {
            Ok((_, records)) => records,
            Err(e) => {
                // Garbage on the wire is not fatal to the session.
                debug!("Dropping undecodable datagram: {}", e);
                return Ok(outputs);
            }
        };

        for record in records {
            self.admit_record(record, now, &mut outputs)?;
        }
        self.pump(now, &mut outputs)?;

        Ok(outputs)
    }

    /// Epoch admission: past epochs are dropped, future epochs queued
    /// still protected, the current epoch is processed.
    fn admit_record(
        &mut self,
        record: DTLSRecord,
        now: Instant,
        outputs: &mut Vec<Output>,
    ) -> Result<(), Error> {
        let read_epoch = self.core.record_layer.read_epoch();

        if record.epoch < read_epoch {
            trace!(
                "Dropping record from past epoch {} (read epoch {})",
                record.epoch,
                read_epoch
            );
            return Ok(());
        }

        if record.epoch > read_epoch {
            if self.core.queued_records.len() >= MAX_QUEUED {
                debug!("Future-epoch queue full, dropping record");
                return Ok(());
            }
            trace!("Queueing record for future epoch {}", record.epoch);
            self.core.queued_records.push(record);
            return Ok(());
        }

        self.process_record(record, now, outputs)
    }

    fn process_record(
        &mut self,
        record: DTLSRecord,
        now: Instant,
        outputs: &mut Vec<Output>,
    ) -> Result<(), Error> {
        let plaintext = match self.core.record_layer.unprotect(&record) {
            Ok(p) => p,
            Err(Error::DecryptFailed) => {
                // RFC 6347 4.1.2.1: silently discard records that fail
                // to decrypt.
                debug!(
                    "Discarding record that failed decryption (epoch {}, seq {})",
                    record.epoch, record.sequence_number
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match record.content_type {
            ContentType::Alert => self.process_alert(&plaintext, outputs),
            ContentType::ChangeCipherSpec => self.process_ccs(&plaintext),
            ContentType::Handshake => self.process_handshake_fragmentwise(&plaintext, now, outputs),
            ContentType::ApplicationData => {
                if self.is_established() {
                    outputs.push(Output::ApplicationData(plaintext));
                } else {
                    debug!("Dropping application data before handshake completion");
                }
                Ok(())
            }
            ContentType::Unknown(v) => {
                debug!("Dropping record with unknown content type {}", v);
                Ok(())
            }
        }
    }

    fn process_alert(&mut self, plaintext: &[u8], outputs: &mut Vec<Output>) -> Result<(), Error> {
        let (_, alert) = Alert::parse(plaintext).map_err(Error::from)?;

        if alert.description == crate::message::AlertDescription::CloseNotify {
            debug!("Peer sent close_notify");
            self.core.state = HandshakeState::Failed;
            outputs.push(Output::PeerClosed);
            return Ok(());
        }

        if alert.is_fatal() {
            self.core.state = HandshakeState::Failed;
            return Err(Error::PeerAlert(alert.description));
        }

        debug!("Ignoring warning alert: {:?}", alert.description);
        Ok(())
    }

    fn process_ccs(&mut self, plaintext: &[u8]) -> Result<(), Error> {
        let (_, _ccs) = ChangeCipherSpec::parse(plaintext).map_err(Error::from)?;
        if !self.core.record_layer.has_pending_read() {
            // The record overtook the flight that establishes the keys.
            debug!("Holding ChangeCipherSpec until the read keys exist");
            self.core.ccs_queued = true;
            return Ok(());
        }
        self.promote_read()
    }

    fn promote_read(&mut self) -> Result<(), Error> {
        debug!("Peer changed cipher spec");
        self.core.record_layer.promote_read()?;
        if self.core.state < HandshakeState::Finishing {
            self.core.state = HandshakeState::Finishing;
        }
        Ok(())
    }

    /// One handshake record may carry several messages or fragments.
    fn process_handshake_fragmentwise(
        &mut self,
        plaintext: &[u8],
        now: Instant,
        outputs: &mut Vec<Output>,
    ) -> Result<(), Error> {
        let mut rest = plaintext;
        while !rest.is_empty() {
            // Header only. Bodies are decoded in sequence order, when the
            // context they depend on (the negotiated suite) is known.
            let (r, handshake) = Handshake::parse_raw(rest).map_err(Error::from)?;
            rest = r;
            self.admit_handshake(handshake, now, outputs)?;
        }
        Ok(())
    }

    /// Sequence admission: duplicates are dropped (but may trigger a
    /// flight resend), future messages are queued, the expected message
    /// is reassembled and processed.
    fn admit_handshake(
        &mut self,
        handshake: Handshake,
        now: Instant,
        outputs: &mut Vec<Output>,
    ) -> Result<(), Error> {
        let seq = handshake.header.message_seq;
        let expected = self.core.next_receive_seq;

        if seq < expected {
            trace!("Duplicate handshake message seq {} (expecting {})", seq, expected);
            // A replayed final message means our last flight was lost.
            if self.is_established() && handshake.header.msg_type == MessageType::Finished {
                self.core.resend_flight();
            }
            return Ok(());
        }

        if seq > expected {
            let queued = &mut self.core.queued_messages;
            if !queued.contains_key(&seq) && queued.len() >= MAX_QUEUED {
                debug!("Future-message queue full, dropping seq {}", seq);
                return Ok(());
            }
            // Each entry keeps every fragment seen for its message.
            let fragments = queued.entry(seq).or_default();
            if fragments.len() >= MAX_QUEUED {
                debug!("Fragment queue for seq {} full, dropping", seq);
                return Ok(());
            }
            trace!("Queueing handshake message seq {} (expecting {})", seq, expected);
            fragments.push(handshake);
            return Ok(());
        }

        let Some(complete) = self.reassemble(handshake)? else {
            return Ok(());
        };

        self.core.next_receive_seq += 1;
        self.dispatch(complete, now, outputs)
    }

    /// Feed a fragment into the buffer, returning the whole message,
    /// body decoded, once every byte has arrived.
    fn reassemble(&mut self, handshake: Handshake) -> Result<Option<Handshake>, Error> {
        let assembled = if handshake.header.is_complete() {
            self.core.reassembly = None;
            handshake
        } else {
            let Body::Fragment(data) = &handshake.body else {
                return Err(Error::Parse("partial fragment with decoded body".into()));
            };

            if handshake.header.length as usize > MAX_MESSAGE_LEN {
                debug!(
                    "Dropping fragment of oversized message ({} bytes)",
                    handshake.header.length
                );
                return Ok(None);
            }

            let buffer = self
                .core
                .reassembly
                .get_or_insert_with(|| FragmentBuffer::new(&handshake.header));
            if buffer.message_seq() != handshake.header.message_seq {
                *buffer = FragmentBuffer::new(&handshake.header);
            }
            buffer.add(&handshake.header, data);

            if !buffer.is_complete() {
                return Ok(None);
            }

            let whole = buffer.assemble();
            self.core.reassembly = None;
            whole
        };

        // Decode the body with the current context.
        let mut wire = Vec::with_capacity(assembled.wire_length());
        assembled.serialize(&mut wire);
        let ctx = self.core.parse_ctx();
        let (_, parsed) = Handshake::parse(&wire, &ctx).map_err(Error::from)?;
        Ok(Some(parsed))
    }

    fn dispatch(
        &mut self,
        handshake: Handshake,
        now: Instant,
        outputs: &mut Vec<Output>,
    ) -> Result<(), Error> {
        debug!(
            "Processing {:?} (seq {})",
            handshake.header.msg_type, handshake.header.message_seq
        );

        // HelloVerifyRequest never counts towards Finished. Finished and
        // CertificateVerify cover the transcript up to but excluding
        // themselves, so the role handler appends them after checking.
        let appended_by_role = matches!(
            handshake.header.msg_type,
            MessageType::HelloRequest
                | MessageType::HelloVerifyRequest
                | MessageType::Finished
                | MessageType::CertificateVerify
        );
        if !appended_by_role {
            self.core.add_transcript(&handshake);
        }

        let result = match &mut self.role {
            RoleState::Client(state) => state.process(&mut self.core, handshake, now),
            RoleState::Server(state) => state.process(&mut self.core, handshake, now),
        };

        match result {
            Ok(Some(output)) => {
                if let Output::Connected(_) = &output {
                    self.core.flush_app_data()?;
                }
                outputs.push(output);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                self.core.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    /// Drain whatever queued messages and records became processable.
    fn pump(&mut self, now: Instant, outputs: &mut Vec<Output>) -> Result<(), Error> {
        loop {
            if self.core.ccs_queued && self.core.record_layer.has_pending_read() {
                self.core.ccs_queued = false;
                self.promote_read()?;
                continue;
            }

            let expected = self.core.next_receive_seq;
            if let Some(fragments) = self.core.queued_messages.remove(&expected) {
                for handshake in fragments {
                    self.admit_handshake(handshake, now, outputs)?;
                }
                continue;
            }

            let epoch = self.core.record_layer.read_epoch();
            if let Some(pos) = self
                .core
                .queued_records
                .iter()
                .position(|r| r.epoch == epoch)
            {
                let record = self.core.queued_records.remove(pos);
                self.process_record(record, now, outputs)?;
                continue;
            }

            // Anything left from even earlier epochs is dead.
            self.core.queued_records.retain(|r| r.epoch >= epoch);
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Cookie, HelloVerifyRequest};

    fn client(seed: u64) -> Handshaker {
        let config = Config::builder().rng_seed(seed).build();
        Handshaker::new_client(config, SeededRng::new(Some(seed)), Instant::now(), None).unwrap()
    }

    fn message(seq: u16) -> Handshake {
        Handshake::new(seq, Body::HelloRequest)
    }

    #[test]
    fn future_messages_are_queued_in_order() {
        let mut hs = client(1);
        let mut outputs = Vec::new();
        let now = Instant::now();

        hs.admit_handshake(message(5), now, &mut outputs).unwrap();
        hs.admit_handshake(message(3), now, &mut outputs).unwrap();

        assert_eq!(hs.core.next_receive_seq, 0);
        let queued: Vec<u16> = hs.core.queued_messages.keys().copied().collect();
        assert_eq!(queued, [3, 5]);
        assert!(outputs.is_empty());
    }

    #[test]
    fn stale_messages_are_dropped() {
        let mut hs = client(2);
        hs.core.next_receive_seq = 4;
        let mut outputs = Vec::new();

        hs.admit_handshake(message(2), Instant::now(), &mut outputs)
            .unwrap();

        assert_eq!(hs.core.next_receive_seq, 4);
        assert!(hs.core.queued_messages.is_empty());
    }

    #[test]
    fn future_message_queue_is_bounded() {
        let mut hs = client(3);
        let mut outputs = Vec::new();
        let now = Instant::now();

        for seq in 10..10 + MAX_QUEUED as u16 {
            hs.admit_handshake(message(seq), now, &mut outputs).unwrap();
        }
        hs.admit_handshake(message(100), now, &mut outputs).unwrap();

        assert_eq!(hs.core.queued_messages.len(), MAX_QUEUED);
        assert!(!hs.core.queued_messages.contains_key(&100));
    }

    #[test]
    fn pump_drains_a_queued_expected_message() {
        let mut hs = client(4);
        while hs.poll_datagram().is_some() {}

        let cookie = Cookie::try_new(&[7; 20]).unwrap();
        let hvr = Handshake::new(0, Body::HelloVerifyRequest(HelloVerifyRequest::new(cookie)));
        hs.core.queued_messages.insert(0, vec![hvr]);

        let mut outputs = Vec::new();
        hs.pump(Instant::now(), &mut outputs).unwrap();

        // The HelloVerifyRequest was dispatched and the retry hello sent.
        assert_eq!(hs.core.next_receive_seq, 1);
        assert!(hs.poll_datagram().is_some());
    }

    #[test]
    fn fragments_of_a_future_message_are_all_retained() {
        let mut hs = client(6);
        let mut outputs = Vec::new();
        let now = Instant::now();

        let cookie = Cookie::try_new(&[9; 20]).unwrap();
        let hvr = Handshake::new(3, Body::HelloVerifyRequest(HelloVerifyRequest::new(cookie)));
        let fragments = hvr.fragment(8);
        assert!(fragments.len() >= 2);

        for f in &fragments {
            hs.admit_handshake(f.clone(), now, &mut outputs).unwrap();
        }
        assert_eq!(hs.core.queued_messages[&3].len(), fragments.len());

        // Close the gap and let the queued fragments reassemble.
        hs.core.next_receive_seq = 3;
        while hs.poll_datagram().is_some() {}
        hs.pump(now, &mut outputs).unwrap();

        assert_eq!(hs.core.next_receive_seq, 4);
        assert!(hs.poll_datagram().is_some());
    }

    #[test]
    fn early_change_cipher_spec_is_held_until_keys_exist() {
        let mut hs = client(7);

        let mut payload = Vec::new();
        ChangeCipherSpec.serialize(&mut payload);
        hs.process_ccs(&payload).unwrap();

        assert!(hs.core.ccs_queued);
        assert_eq!(hs.core.record_layer.read_epoch(), 0);
    }

    #[test]
    fn oversized_fragmented_message_is_dropped() {
        let mut hs = client(8);
        let mut outputs = Vec::new();

        let handshake = Handshake {
            header: crate::message::Header {
                msg_type: MessageType::Certificate,
                length: 0xFF_FFFF,
                message_seq: 0,
                fragment_offset: 0,
                fragment_length: 8,
            },
            body: Body::Fragment(vec![0; 8]),
        };
        hs.admit_handshake(handshake, Instant::now(), &mut outputs)
            .unwrap();

        assert!(hs.core.reassembly.is_none());
        assert_eq!(hs.core.next_receive_seq, 0);
    }

    #[test]
    fn verify_data_detects_a_transcript_flip() {
        let mut core = Core::new(Config::builder().build(), SeededRng::new(Some(5)));
        let master = MasterSecret::derive(b"premaster", &[1; 32], &[2; 32]).unwrap();
        core.set_master(master);
        core.transcript.extend_from_slice(b"negotiated handshake bytes");

        let good = core.verify_data(b"client finished").unwrap();
        core.transcript[0] ^= 0x01;
        let bad = core.verify_data(b"client finished").unwrap();
        assert_ne!(good, bad);
    }
}

impl std::fmt::Debug for Handshaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match self.role {
            RoleState::Client(_) => "client",
            RoleState::Server(_) => "server",
        };
        f.debug_struct("Handshaker")
            .field("role", &role)
            .field("state", &self.core.state)
            .finish()
    }
}
