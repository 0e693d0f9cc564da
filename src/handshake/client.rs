//! Client side of the handshake.

use std::time::Instant;

use p256::ecdsa::signature::Signer;
use p256::ecdsa::Signature;

use super::{Core, HandshakeState, Output};
use crate::crypto::{
    psk_premaster, verify_key_exchange, verifying_key_from_spki, EcdheKeyExchange, MasterSecret,
};
use crate::error::Error;
use crate::message::{
    find_extension, Body, Certificate, CertificateVerify, CipherSuite, ClientHello,
    ClientKeyExchange, DTLSRecord, Extension, ExtensionType, Finished, Handshake,
    KeyExchangeAlgorithm, MessageType, Random, ServerHello, ServerKeyExchange, SessionId,
    SignatureAndHashAlgorithm,
};
use crate::record_layer::Role;
use crate::session::Session;

pub(super) enum ClientState {
    /// Initial ClientHello sent, waiting for HelloVerifyRequest (or a
    /// direct ServerHello from a server that skips the cookie round).
    AwaitHelloResponse {
        initial_hello: Handshake,
        resume: Option<Session>,
    },
    /// Cookie-bearing hello sent.
    AwaitServerHello { resume: Option<Session> },
    /// Full handshake: collecting the server's flight up to its
    /// ServerHelloDone.
    AwaitServerFlight {
        server_key_exchange: Option<ServerKeyExchange>,
        certificate_requested: bool,
        sent_certificate: bool,
    },
    /// Full handshake: client flight sent, waiting for the server's
    /// ChangeCipherSpec and Finished.
    AwaitServerFinished,
    /// Abbreviated handshake: server answers with its Finished first.
    AwaitResumeFinished,
    Done,
}

impl ClientState {
    /// Build and queue the first flight.
    pub fn start(
        core: &mut Core,
        now: Instant,
        resume: Option<&Session>,
    ) -> Result<ClientState, Error> {
        let random = Random::new(&mut core.rng);
        core.client_random = Some(random.bytes());

        let session_id = resume
            .filter(|s| core.config.resumption && s.is_resumable())
            .map(|s| *s.id())
            .unwrap_or_else(SessionId::empty);

        let mut hello = ClientHello::new(
            random,
            session_id,
            core.config.cipher_suites.iter().copied().collect(),
        );
        add_hello_extensions(core, &mut hello);

        let handshake = core.make_handshake(Body::ClientHello(hello));
        // The initial hello only joins the transcript if the server
        // answers it directly, without a cookie round.

        let mut records = Vec::new();
        core.push_handshake(&mut records, &handshake)?;
        core.send_flight(records, now, true);
        core.state = HandshakeState::CookieExchange;

        Ok(ClientState::AwaitHelloResponse {
            initial_hello: handshake,
            resume: resume.cloned(),
        })
    }

    pub fn process(
        &mut self,
        core: &mut Core,
        handshake: Handshake,
        now: Instant,
    ) -> Result<Option<Output>, Error> {
        let next = match (std::mem::replace(self, ClientState::Done), handshake.body) {
            (
                ClientState::AwaitHelloResponse {
                    initial_hello,
                    resume,
                },
                Body::HelloVerifyRequest(hvr),
            ) => {
                debug!("Got cookie of {} bytes, retrying hello", hvr.cookie.len());

                // The retry reuses message sequence 0; only the cookie
                // differs from the initial hello.
                let Body::ClientHello(mut hello) = initial_hello.body else {
                    return Err(Error::UnexpectedMessage(MessageType::HelloVerifyRequest));
                };
                hello.cookie = hvr.cookie;
                let retry = Handshake::new(0, Body::ClientHello(hello));
                core.add_transcript(&retry);

                let mut records = Vec::new();
                core.push_handshake(&mut records, &retry)?;
                core.send_flight(records, now, true);
                core.state = HandshakeState::Negotiating;

                ClientState::AwaitServerHello { resume }
            }

            (
                ClientState::AwaitHelloResponse {
                    initial_hello,
                    resume,
                },
                Body::ServerHello(sh),
            ) => {
                // No cookie round: the initial hello counts after all,
                // ahead of the ServerHello already recorded.
                core.add_transcript_front(&initial_hello);
                self.accept_server_hello(core, sh, resume)?
            }

            (ClientState::AwaitServerHello { resume }, Body::ServerHello(sh)) => {
                self.accept_server_hello(core, sh, resume)?
            }

            (
                ClientState::AwaitServerFlight {
                    server_key_exchange,
                    certificate_requested,
                    sent_certificate,
                },
                Body::Certificate(cert),
            ) => {
                accept_peer_certificate(core, &cert)?;
                ClientState::AwaitServerFlight {
                    server_key_exchange,
                    certificate_requested,
                    sent_certificate,
                }
            }

            (
                ClientState::AwaitServerFlight {
                    certificate_requested,
                    sent_certificate,
                    ..
                },
                Body::ServerKeyExchange(ske),
            ) => {
                if let ServerKeyExchange::Ecdhe(params) = &ske {
                    let key = core
                        .peer_verifying_key
                        .as_ref()
                        .ok_or(Error::UntrustedPeer)?;
                    let (cr, sr) = core.randoms()?;
                    verify_key_exchange(key, &cr, &sr, &params.params_bytes(), &params.signature.signature)?;
                }
                ClientState::AwaitServerFlight {
                    server_key_exchange: Some(ske),
                    certificate_requested,
                    sent_certificate,
                }
            }

            (
                ClientState::AwaitServerFlight {
                    server_key_exchange,
                    sent_certificate,
                    ..
                },
                Body::CertificateRequest(_),
            ) => ClientState::AwaitServerFlight {
                server_key_exchange,
                certificate_requested: true,
                sent_certificate,
            },

            (
                ClientState::AwaitServerFlight {
                    server_key_exchange,
                    certificate_requested,
                    ..
                },
                Body::ServerHelloDone,
            ) => {
                self.send_client_flight(core, server_key_exchange, certificate_requested, now)?
            }

            (ClientState::AwaitServerFinished, Body::Finished(fin)) => {
                self.accept_server_finished(core, &fin, handshake.header.message_seq, false)?;
                return Ok(Some(self.connected(core)?));
            }

            (ClientState::AwaitResumeFinished, Body::Finished(fin)) => {
                self.accept_server_finished(core, &fin, handshake.header.message_seq, true)?;
                self.send_resume_finish(core, now)?;
                return Ok(Some(self.connected(core)?));
            }

            (state, Body::HelloRequest) => {
                // Renegotiation is not supported.
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

    fn accept_server_hello(
        &mut self,
        core: &mut Core,
        sh: ServerHello,
        resume: Option<Session>,
    ) -> Result<ClientState, Error> {
        // NULL is the server's last resort when nothing we offered
        // overlaps with what it supports.
        if !core.config.cipher_suites.contains(&sh.cipher_suite)
            && sh.cipher_suite != CipherSuite::NULL
        {
            return Err(Error::NoCommonCipherSuite);
        }

        core.server_random = Some(sh.random.bytes());
        core.cipher_suite = Some(sh.cipher_suite);
        core.session_id = sh.session_id;
        core.raw_public_key = core.config.raw_public_key
            && find_extension(&sh.extensions, ExtensionType::ServerCertificateType)
                .and_then(|e| e.as_selected_certificate_type())
                == Some(crate::message::CertificateType::RawPublicKey);

        debug!(
            "Negotiated {:?}, raw public key: {}",
            sh.cipher_suite, core.raw_public_key
        );

        // The server resumes by echoing the session id we offered.
        if let Some(session) = resume {
            if session.id() == &sh.session_id && session.cipher_suite() == sh.cipher_suite {
                debug!("Server accepted session resumption");
                core.resuming = true;
                core.set_master(session.master().clone());
                core.install_keys(Role::Client)?;
                core.state = HandshakeState::KeyExchange;
                return Ok(ClientState::AwaitResumeFinished);
            }
        }

        core.state = HandshakeState::Negotiating;
        Ok(ClientState::AwaitServerFlight {
            server_key_exchange: None,
            certificate_requested: false,
            sent_certificate: false,
        })
    }

    /// ServerHelloDone arrived: answer with the whole client flight,
    /// switch the write epoch and finish.
    fn send_client_flight(
        &mut self,
        core: &mut Core,
        server_key_exchange: Option<ServerKeyExchange>,
        certificate_requested: bool,
        now: Instant,
    ) -> Result<ClientState, Error> {
        let suite = core.cipher_suite.ok_or(Error::NoCommonCipherSuite)?;
        let mut records: Vec<DTLSRecord> = Vec::new();

        let sent_certificate = certificate_requested;
        if certificate_requested {
            let key = core.config.local_key.clone().ok_or(Error::MissingLocalKey)?;
            let certificate = Certificate::RawPublicKey(key.public_key_der()?);
            let handshake = core.make_handshake(Body::Certificate(certificate));
            core.add_transcript(&handshake);
            core.push_handshake(&mut records, &handshake)?;
        }

        let (cke, premaster) = self.key_exchange(core, suite, &server_key_exchange)?;
        let handshake = core.make_handshake(Body::ClientKeyExchange(cke));
        core.add_transcript(&handshake);
        core.push_handshake(&mut records, &handshake)?;

        if sent_certificate {
            // The signature covers everything up to this message.
            let key = core.config.local_key.clone().ok_or(Error::MissingLocalKey)?;
            let signature: Signature = key.signing_key().sign(core.transcript());
            let verify = CertificateVerify {
                algorithm: SignatureAndHashAlgorithm::ECDSA_SHA256,
                signature: signature.to_der().as_bytes().to_vec(),
            };
            let handshake = core.make_handshake(Body::CertificateVerify(verify));
            core.add_transcript(&handshake);
            core.push_handshake(&mut records, &handshake)?;
        }

        let (cr, sr) = core.randoms()?;
        core.set_master(MasterSecret::derive(&premaster, &cr, &sr)?);
        core.install_keys(Role::Client)?;

        core.push_ccs(&mut records)?;
        core.record_layer.promote_write()?;

        let finished = Finished {
            verify_data: core.verify_data(b"client finished")?,
        };
        let handshake = core.make_handshake(Body::Finished(finished));
        core.add_transcript(&handshake);
        core.push_handshake(&mut records, &handshake)?;

        core.send_flight(records, now, true);
        core.state = HandshakeState::Finishing;

        Ok(ClientState::AwaitServerFinished)
    }

    fn key_exchange(
        &mut self,
        core: &mut Core,
        suite: CipherSuite,
        server_key_exchange: &Option<ServerKeyExchange>,
    ) -> Result<(ClientKeyExchange, Vec<u8>), Error> {
        match suite.key_exchange_algorithm() {
            KeyExchangeAlgorithm::EcdheEcdsa => {
                let Some(ServerKeyExchange::Ecdhe(params)) = server_key_exchange else {
                    return Err(Error::UnexpectedMessage(MessageType::ClientKeyExchange));
                };
                let ecdhe = EcdheKeyExchange::new();
                let premaster = ecdhe.diffie_hellman(&params.public)?;
                let public = ecdhe.public_key().to_vec();
                core.ecdhe = Some(ecdhe);
                Ok((ClientKeyExchange::Ecdhe { public }, premaster))
            }
            KeyExchangeAlgorithm::Psk => {
                let store = core.config.psk_store.clone().ok_or(Error::MissingPsk)?;
                let identity = store.identity().ok_or(Error::MissingPsk)?;
                let key = store.key(&identity).ok_or(Error::MissingPsk)?;
                Ok((ClientKeyExchange::Psk { identity }, psk_premaster(&key)))
            }
            KeyExchangeAlgorithm::Null => Ok((ClientKeyExchange::Null, Vec::new())),
            KeyExchangeAlgorithm::Unknown => Err(Error::NoCommonCipherSuite),
        }
    }

    fn accept_server_finished(
        &mut self,
        core: &mut Core,
        fin: &Finished,
        message_seq: u16,
        abbreviated: bool,
    ) -> Result<(), Error> {
        let expected = core.verify_data(b"server finished")?;
        if fin.verify_data != expected {
            return Err(Error::VerifyDataMismatch);
        }

        let handshake = Handshake::new(message_seq, Body::Finished(*fin));
        core.add_transcript(&handshake);

        if !abbreviated {
            // Our flight got through; only duplicate-triggered resends
            // remain.
            core.stop_flight_timer();
        }
        Ok(())
    }

    /// Abbreviated handshake: answer the server's Finished with our own.
    fn send_resume_finish(&mut self, core: &mut Core, now: Instant) -> Result<(), Error> {
        let mut records: Vec<DTLSRecord> = Vec::new();
        core.push_ccs(&mut records)?;
        core.record_layer.promote_write()?;

        let finished = Finished {
            verify_data: core.verify_data(b"client finished")?,
        };
        let handshake = core.make_handshake(Body::Finished(finished));
        core.add_transcript(&handshake);
        core.push_handshake(&mut records, &handshake)?;

        // The last flight of the handshake: never on a timer, resent
        // only when the server repeats its Finished.
        core.send_flight(records, now, false);
        Ok(())
    }

    fn connected(&mut self, core: &mut Core) -> Result<Output, Error> {
        *self = ClientState::Done;
        core.state = HandshakeState::Complete;
        debug!("Client handshake complete");

        let suite = core.cipher_suite.ok_or(Error::NoCommonCipherSuite)?;
        let session = Session::new(core.session_id, suite, core.require_master()?.clone());
        Ok(Output::Connected(session))
    }
}

fn add_hello_extensions(core: &Core, hello: &mut ClientHello) {
    let offers_ecdhe = hello
        .cipher_suites
        .iter()
        .any(|s| s.key_exchange_algorithm() == KeyExchangeAlgorithm::EcdheEcdsa);

    if offers_ecdhe {
        hello.extensions.push(Extension::supported_groups());
        hello.extensions.push(Extension::ec_point_formats());
    }
    if offers_ecdhe && core.config.raw_public_key {
        use crate::message::CertificateType;
        hello.extensions.push(Extension::certificate_type_list(
            ExtensionType::ClientCertificateType,
            &[CertificateType::RawPublicKey],
        ));
        hello.extensions.push(Extension::certificate_type_list(
            ExtensionType::ServerCertificateType,
            &[CertificateType::RawPublicKey],
        ));
    }
}

/// Check the presented credential against the trust store and pull out
/// the verifying key. Only raw public keys carry a key we can use.
pub(super) fn accept_peer_certificate(core: &mut Core, cert: &Certificate) -> Result<(), Error> {
    if !core.config.trust_store.is_trusted(cert) {
        return Err(Error::UntrustedPeer);
    }

    match cert {
        Certificate::RawPublicKey(spki) => {
            core.peer_verifying_key = Some(verifying_key_from_spki(spki)?);
            Ok(())
        }
        Certificate::X509Chain(_) => {
            // Chain processing is out of scope; signature checks need a
            // raw public key.
            debug!("Peer presented an X.509 chain, cannot extract key");
            Err(Error::UntrustedPeer)
        }
    }
}
