use std::collections::HashMap;
use std::fmt;

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::Error;
use crate::message::{Certificate, InvalidLength, PskIdentity};

/// The endpoint's long-term ECDSA P-256 key, presented as a raw public
/// key (RFC 7250) during ECDHE_ECDSA handshakes.
#[derive(Clone)]
pub struct LocalKey {
    signing: SigningKey,
}

impl LocalKey {
    pub fn generate() -> LocalKey {
        LocalKey {
            signing: SigningKey::random(&mut OsRng),
        }
    }

    /// From a 32 byte P-256 scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<LocalKey, Error> {
        let signing =
            SigningKey::from_slice(bytes).map_err(|_| Error::Crypto("bad signing key".into()))?;
        Ok(LocalKey { signing })
    }

    /// DER SubjectPublicKeyInfo of the public half, the exact bytes that
    /// go in our Certificate message.
    pub fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        let der = self
            .signing
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| Error::Crypto(e.to_string()))?;
        Ok(der.as_bytes().to_vec())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing
    }
}

impl fmt::Debug for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalKey(..)")
    }
}

/// Parse the peer's DER SubjectPublicKeyInfo into a verifying key.
pub(crate) fn verifying_key_from_spki(der: &[u8]) -> Result<VerifyingKey, Error> {
    VerifyingKey::from_public_key_der(der).map_err(|_| Error::UntrustedPeer)
}

/// Decides which peer credentials are acceptable.
///
/// The handshake verifies signatures itself; the trust store only rules
/// on whether the presented credential belongs to a peer we want to talk
/// to.
pub trait TrustStore: fmt::Debug + Send + Sync {
    fn is_trusted(&self, certificate: &Certificate) -> bool;
}

/// Accepts every syntactically valid credential. Fine for tests and for
/// deployments that pin identity at a higher layer.
#[derive(Debug, Clone, Copy)]
pub struct TrustAnyKey;

impl TrustStore for TrustAnyKey {
    fn is_trusted(&self, _certificate: &Certificate) -> bool {
        true
    }
}

/// Source of pre-shared keys for the PSK cipher suite.
pub trait PskStore: fmt::Debug + Send + Sync {
    /// The identity a client presents in its ClientKeyExchange.
    fn identity(&self) -> Option<PskIdentity>;

    /// Look up the key for an identity a peer presented.
    fn key(&self, identity: &[u8]) -> Option<Zeroizing<Vec<u8>>>;
}

/// A single identity/key pair, the common case for a client.
#[derive(Debug, Clone)]
pub struct SinglePsk {
    identity: PskIdentity,
    key: Zeroizing<Vec<u8>>,
}

impl SinglePsk {
    pub fn new(identity: &[u8], key: &[u8]) -> Result<SinglePsk, InvalidLength> {
        Ok(SinglePsk {
            identity: PskIdentity::try_new(identity)?,
            key: Zeroizing::new(key.to_vec()),
        })
    }
}

impl PskStore for SinglePsk {
    fn identity(&self) -> Option<PskIdentity> {
        Some(self.identity)
    }

    fn key(&self, identity: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        (&*self.identity == identity).then(|| self.key.clone())
    }
}

/// Many identities, the common case for a server.
#[derive(Debug, Default)]
pub struct TablePskStore {
    table: HashMap<Vec<u8>, Zeroizing<Vec<u8>>>,
}

impl TablePskStore {
    pub fn new() -> TablePskStore {
        TablePskStore::default()
    }

    pub fn insert(&mut self, identity: &[u8], key: &[u8]) {
        self.table
            .insert(identity.to_vec(), Zeroizing::new(key.to_vec()));
    }
}

impl PskStore for TablePskStore {
    fn identity(&self) -> Option<PskIdentity> {
        // A table store is for the responding side. It has no identity
        // of its own to present.
        None
    }

    fn key(&self, identity: &[u8]) -> Option<Zeroizing<Vec<u8>>> {
        self.table.get(identity).cloned()
    }
}
