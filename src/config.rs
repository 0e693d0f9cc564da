use std::sync::Arc;
use std::time::Duration;

use tinyvec::ArrayVec;

use crate::crypto::{LocalKey, PskStore, TrustAnyKey, TrustStore};
use crate::message::CipherSuite;

/// Endpoint configuration. Built once with [`ConfigBuilder`] and shared
/// by every session the endpoint runs.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) mtu: usize,
    pub(crate) retransmit_start: Duration,
    pub(crate) retransmit_retries: usize,
    pub(crate) cipher_suites: ArrayVec<[CipherSuite; 8]>,
    pub(crate) raw_public_key: bool,
    pub(crate) require_client_certificate: bool,
    pub(crate) resumption: bool,
    pub(crate) local_key: Option<Arc<LocalKey>>,
    pub(crate) psk_store: Option<Arc<dyn PskStore>>,
    pub(crate) trust_store: Arc<dyn TrustStore>,
    pub(crate) rng_seed: Option<u64>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Handshake body bytes that fit one record in one datagram,
    /// leaving room for the record and handshake headers and the worst
    /// case AEAD expansion.
    pub(crate) fn max_fragment_len(&self) -> usize {
        use crate::crypto::{CCM_TAG_LEN, EXPLICIT_NONCE_LEN};
        use crate::message::{HANDSHAKE_HEADER_LEN, RECORD_HEADER_LEN};

        self.mtu - RECORD_HEADER_LEN - HANDSHAKE_HEADER_LEN - EXPLICIT_NONCE_LEN - CCM_TAG_LEN
    }
}

impl Default for Config {
    fn default() -> Self {
        ConfigBuilder::default().build()
    }
}

/// Builder for [`Config`].
#[derive(Debug)]
pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        ConfigBuilder {
            config: Config {
                mtu: 1400,
                retransmit_start: Duration::from_secs(1),
                retransmit_retries: 5,
                cipher_suites: CipherSuite::all(),
                raw_public_key: true,
                require_client_certificate: false,
                resumption: true,
                local_key: None,
                psk_store: None,
                trust_store: Arc::new(TrustAnyKey),
                rng_seed: None,
            },
        }
    }
}

impl ConfigBuilder {
    /// Largest datagram the path is assumed to carry. Handshake messages
    /// are fragmented to fit.
    pub fn mtu(mut self, mtu: usize) -> Self {
        assert!(mtu >= 256, "MTU too small for a DTLS record");
        self.config.mtu = mtu;
        self
    }

    /// Initial retransmission timeout. Doubles on every retry.
    pub fn retransmit_start(mut self, rto: Duration) -> Self {
        self.config.retransmit_start = rto;
        self
    }

    /// How many times a flight is resent before the handshake gives up.
    pub fn retransmit_retries(mut self, retries: usize) -> Self {
        self.config.retransmit_retries = retries;
        self
    }

    /// Replace the offered/accepted cipher suites, preference first.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.config.cipher_suites = suites.iter().copied().collect();
        self
    }

    /// Offer RFC 7250 raw public keys instead of X.509 chains.
    pub fn raw_public_key(mut self, enabled: bool) -> Self {
        self.config.raw_public_key = enabled;
        self
    }

    /// Server only: demand a client certificate and verify it.
    pub fn require_client_certificate(mut self, required: bool) -> Self {
        self.config.require_client_certificate = required;
        self
    }

    /// Allow abbreviated handshakes against cached sessions.
    pub fn resumption(mut self, enabled: bool) -> Self {
        self.config.resumption = enabled;
        self
    }

    /// The long-term ECDSA key for ECDHE_ECDSA suites.
    pub fn local_key(mut self, key: LocalKey) -> Self {
        self.config.local_key = Some(Arc::new(key));
        self
    }

    pub fn psk_store(mut self, store: impl PskStore + 'static) -> Self {
        self.config.psk_store = Some(Arc::new(store));
        self
    }

    pub fn trust_store(mut self, store: impl TrustStore + 'static) -> Self {
        self.config.trust_store = Arc::new(store);
        self
    }

    /// Seed for deterministic randoms, session ids and backoff jitter.
    /// Tests only. Key generation does not use this.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.mtu, 1400);
        assert_eq!(config.retransmit_retries, 5);
        assert!(config.raw_public_key);
        assert!(config.local_key.is_none());
        assert_eq!(config.cipher_suites.len(), 2);
    }

    #[test]
    fn fragment_len_leaves_header_room() {
        let config = Config::builder().mtu(300).build();
        assert!(config.max_fragment_len() < 300 - 13 - 12);
    }

    #[test]
    #[should_panic]
    fn tiny_mtu_panics() {
        Config::builder().mtu(10);
    }
}
