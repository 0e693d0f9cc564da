//! Server side of the handshake.
//!
//! The stateless cookie exchange happens in the endpoint before a
//! [`ServerState`] exists, so the first message seen here is always a
//! cookie-verified ClientHello.

use std::time::Instant;

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::Signature;

use super::client::accept_peer_certificate;
use super::{Core, HandshakeState, Output};
use crate::crypto::{psk_premaster, sign_key_exchange, EcdheKeyExchange, MasterSecret};
use crate::error::Error;
use crate::message::{
    find_extension, Body, Certificate, CertificateRequest, CertificateType, CertificateVerify,
    CipherSuite, ClientHello, ClientKeyExchange, DTLSRecord, DigitallySigned, EcdheServerParams,
    Extension, ExtensionType, Finished, Handshake, MessageType, NamedCurve, Random, ServerHello,
    ServerKeyExchange, SessionId, SignatureAndHashAlgorithm,
};
use crate::record_layer::Role;
use crate::session::Session;

pub(super) enum ServerState {
    /// Full handshake: our flight through ServerHelloDone is out,
    /// collecting the client's answer.
    AwaitClientFlight {
        requested_certificate: bool,
        received_certificate: bool,
        verified_certificate: bool,
    },
    /// Abbreviated handshake: our Finished is out, waiting for the
    /// client's.
    AwaitResumeFinished,
    Done,
}

impl ServerState {
    /// React to a cookie-verified ClientHello with the full or
    /// abbreviated server flight.
    pub fn start(
        core: &mut Core,
        now: Instant,
        hello: &ClientHello,
        resume: Option<&Session>,
    ) -> Result<ServerState, Error> {
        core.client_random = Some(hello.random.bytes());

        let common = hello.common_cipher_suites(&core.config.cipher_suites);
        let suite = match common.first() {
            Some(&suite) => suite,
            None => {
                // Last resort when nothing overlaps: the unprotected suite.
                debug!("No common cipher suite, falling back to NULL");
                CipherSuite::NULL
            }
        };

        core.raw_public_key = core.config.raw_public_key && offers_raw_public_key(hello);
        debug!(
            "Selected {:?}, raw public key: {}",
            suite, core.raw_public_key
        );

        if let Some(session) = resume.filter(|s| {
            core.config.resumption
                && s.is_resumable()
                && s.id() == &hello.session_id
                && common.contains(&s.cipher_suite())
        }) {
            return Self::start_abbreviated(core, now, session);
        }

        Self::start_full(core, now, suite)
    }

    /// The server speaks first when resuming: ServerHello, then straight
    /// to ChangeCipherSpec and Finished under the cached master secret.
    fn start_abbreviated(
        core: &mut Core,
        now: Instant,
        session: &Session,
    ) -> Result<ServerState, Error> {
        debug!("Resuming session {:?}", session.id());

        let suite = session.cipher_suite();
        let random = Random::new(&mut core.rng);
        core.server_random = Some(random.bytes());
        core.cipher_suite = Some(suite);
        core.session_id = *session.id();
        core.resuming = true;

        let mut sh = ServerHello::new(random, *session.id(), suite);
        add_hello_extensions(core, &mut sh);

        let mut records: Vec<DTLSRecord> = Vec::new();
        let handshake = core.make_handshake(Body::ServerHello(sh));
        core.add_transcript(&handshake);
        core.push_handshake(&mut records, &handshake)?;

        core.set_master(session.master().clone());
        core.install_keys(Role::Server)?;

        core.push_ccs(&mut records)?;
        core.record_layer.promote_write()?;

        let finished = Finished {
            verify_data: core.verify_data(b"server finished")?,
        };
        let handshake = core.make_handshake(Body::Finished(finished));
        core.add_transcript(&handshake);
        core.push_handshake(&mut records, &handshake)?;

        core.send_flight(records, now, true);
        core.state = HandshakeState::Finishing;
        Ok(ServerState::AwaitResumeFinished)
    }

    fn start_full(core: &mut Core, now: Instant, suite: CipherSuite) -> Result<ServerState, Error> {
        let random = Random::new(&mut core.rng);
        core.server_random = Some(random.bytes());
        core.cipher_suite = Some(suite);
        core.session_id = if core.config.resumption {
            SessionId::random(32, &mut core.rng)
        } else {
            SessionId::empty()
        };

        let mut sh = ServerHello::new(random, core.session_id, suite);
        add_hello_extensions(core, &mut sh);

        let mut records: Vec<DTLSRecord> = Vec::new();
        let handshake = core.make_handshake(Body::ServerHello(sh));
        core.add_transcript(&handshake);
        core.push_handshake(&mut records, &handshake)?;

        let requested_certificate = if suite.requires_server_certificate() {
            let key = core.config.local_key.clone().ok_or(Error::MissingLocalKey)?;

            let certificate = Certificate::RawPublicKey(key.public_key_der()?);
            let handshake = core.make_handshake(Body::Certificate(certificate));
            core.add_transcript(&handshake);
            core.push_handshake(&mut records, &handshake)?;

            // Fresh ephemeral key, signed with the long-term one.
            let ecdhe = EcdheKeyExchange::new();
            let mut params = EcdheServerParams {
                curve: NamedCurve::Secp256r1,
                public: ecdhe.public_key().to_vec(),
                signature: DigitallySigned {
                    algorithm: SignatureAndHashAlgorithm::ECDSA_SHA256,
                    signature: Vec::new(),
                },
            };
            let (cr, sr) = core.randoms()?;
            params.signature.signature =
                sign_key_exchange(key.signing_key(), &cr, &sr, &params.params_bytes());
            core.ecdhe = Some(ecdhe);

            let handshake = core.make_handshake(Body::ServerKeyExchange(
                ServerKeyExchange::Ecdhe(params),
            ));
            core.add_transcript(&handshake);
            core.push_handshake(&mut records, &handshake)?;

            if core.config.require_client_certificate {
                let request = CertificateRequest::new();
                let handshake = core.make_handshake(Body::CertificateRequest(request));
                core.add_transcript(&handshake);
                core.push_handshake(&mut records, &handshake)?;
                true
            } else {
                false
            }
        } else {
            false
        };

        let handshake = core.make_handshake(Body::ServerHelloDone);
        core.add_transcript(&handshake);
        core.push_handshake(&mut records, &handshake)?;

        core.send_flight(records, now, true);
        core.state = HandshakeState::Negotiating;

        Ok(ServerState::AwaitClientFlight {
            requested_certificate,
            received_certificate: false,
            verified_certificate: false,
        })
    }

    pub fn process(
        &mut self,
        core: &mut Core,
        handshake: Handshake,
        now: Instant,
    ) -> Result<Option<Output>, Error> {
        let next = match (std::mem::replace(self, ServerState::Done), handshake.body) {
            (
                ServerState::AwaitClientFlight {
                    requested_certificate,
                    received_certificate: false,
                    verified_certificate,
                },
                Body::Certificate(cert),
            ) => {
                if !requested_certificate {
                    return Err(Error::UnexpectedMessage(MessageType::Certificate));
                }
                accept_peer_certificate(core, &cert)?;
                ServerState::AwaitClientFlight {
                    requested_certificate,
                    received_certificate: true,
                    verified_certificate,
                }
            }

            (
                ServerState::AwaitClientFlight {
                    requested_certificate,
                    received_certificate,
                    verified_certificate,
                },
                Body::ClientKeyExchange(cke),
            ) => {
                if requested_certificate && !received_certificate {
                    return Err(Error::UnexpectedMessage(MessageType::ClientKeyExchange));
                }
                let premaster = premaster(core, &cke)?;
                let (cr, sr) = core.randoms()?;
                core.set_master(MasterSecret::derive(&premaster, &cr, &sr)?);
                core.install_keys(Role::Server)?;
                core.state = HandshakeState::KeyExchange;

                ServerState::AwaitClientFlight {
                    requested_certificate,
                    received_certificate,
                    verified_certificate,
                }
            }

            (
                ServerState::AwaitClientFlight {
                    requested_certificate,
                    received_certificate: true,
                    verified_certificate: false,
                },
                Body::CertificateVerify(cv),
            ) => {
                verify_client_signature(core, &cv)?;

                // Only now does the message join the transcript.
                let handshake = Handshake::new(
                    handshake.header.message_seq,
                    Body::CertificateVerify(cv),
                );
                core.add_transcript(&handshake);

                ServerState::AwaitClientFlight {
                    requested_certificate,
                    received_certificate: true,
                    verified_certificate: true,
                }
            }

            (
                ServerState::AwaitClientFlight {
                    requested_certificate,
                    received_certificate,
                    verified_certificate,
                },
                Body::Finished(fin),
            ) => {
                if requested_certificate && !(received_certificate && verified_certificate) {
                    return Err(Error::UnexpectedMessage(MessageType::Finished));
                }

                let expected = core.verify_data(b"client finished")?;
                if fin.verify_data != expected {
                    return Err(Error::VerifyDataMismatch);
                }
                let received =
                    Handshake::new(handshake.header.message_seq, Body::Finished(fin));
                core.add_transcript(&received);

                self.send_final_flight(core, now)?;
                return Ok(Some(self.connected(core)?));
            }

            (ServerState::AwaitResumeFinished, Body::Finished(fin)) => {
                let expected = core.verify_data(b"client finished")?;
                if fin.verify_data != expected {
                    return Err(Error::VerifyDataMismatch);
                }
                let received =
                    Handshake::new(handshake.header.message_seq, Body::Finished(fin));
                core.add_transcript(&received);

                // Nothing left to send; our flight already closed the
                // handshake on our side.
                core.stop_flight_timer();
                return Ok(Some(self.connected(core)?));
            }

            (state, Body::HelloRequest) => {
                debug!("Ignoring HelloRequest");
                state
            }

            (_, _) => {
                return Err(Error::UnexpectedMessage(handshake.header.msg_type));
            }
        };

        *self = next;
        Ok(None)
    }

    /// ChangeCipherSpec plus our Finished. This is the last flight of a
    /// full handshake: no timer, resent when the client repeats its
    /// Finished.
    fn send_final_flight(&mut self, core: &mut Core, now: Instant) -> Result<(), Error> {
        let mut records: Vec<DTLSRecord> = Vec::new();
        core.push_ccs(&mut records)?;
        core.record_layer.promote_write()?;

        let finished = Finished {
            verify_data: core.verify_data(b"server finished")?,
        };
        let handshake = core.make_handshake(Body::Finished(finished));
        core.add_transcript(&handshake);
        core.push_handshake(&mut records, &handshake)?;

        core.send_flight(records, now, false);
        Ok(())
    }

    fn connected(&mut self, core: &mut Core) -> Result<Output, Error> {
        *self = ServerState::Done;
        core.state = HandshakeState::Complete;
        debug!("Server handshake complete");

        let suite = core.cipher_suite.ok_or(Error::NoCommonCipherSuite)?;
        let session = Session::new(core.session_id, suite, core.require_master()?.clone());
        Ok(Output::Connected(session))
    }
}

fn offers_raw_public_key(hello: &ClientHello) -> bool {
    find_extension(&hello.extensions, ExtensionType::ServerCertificateType)
        .and_then(|e| e.as_certificate_types())
        .is_some_and(|types| types.contains(&CertificateType::RawPublicKey))
}

fn add_hello_extensions(core: &Core, sh: &mut ServerHello) {
    if core.raw_public_key {
        sh.extensions.push(Extension::certificate_type_selected(
            ExtensionType::ServerCertificateType,
            CertificateType::RawPublicKey,
        ));
        if core.config.require_client_certificate {
            sh.extensions.push(Extension::certificate_type_selected(
                ExtensionType::ClientCertificateType,
                CertificateType::RawPublicKey,
            ));
        }
    }
}

fn premaster(core: &mut Core, cke: &ClientKeyExchange) -> Result<Vec<u8>, Error> {
    match cke {
        ClientKeyExchange::Ecdhe { public } => {
            let ecdhe = core
                .ecdhe
                .as_ref()
                .ok_or_else(|| Error::Crypto("no ephemeral key".into()))?;
            ecdhe.diffie_hellman(public)
        }
        ClientKeyExchange::Psk { identity } => {
            let store = core
                .config
                .psk_store
                .clone()
                .ok_or(Error::MissingPsk)?;
            let key = store.key(identity).ok_or(Error::UnknownPskIdentity)?;
            Ok(psk_premaster(&key))
        }
        ClientKeyExchange::Null => Ok(Vec::new()),
    }
}

/// CertificateVerify: an ECDSA signature over the transcript so far,
/// made with the key the client just presented.
fn verify_client_signature(core: &Core, cv: &CertificateVerify) -> Result<(), Error> {
    let key = core
        .peer_verifying_key
        .as_ref()
        .ok_or(Error::UntrustedPeer)?;
    let signature = Signature::from_der(&cv.signature).map_err(|_| Error::BadSignature)?;
    key.verify(core.transcript(), &signature)
        .map_err(|_| Error::BadSignature)
}
