use p256::ecdh::EphemeralSecret;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;

use crate::error::Error;

/// One ephemeral P-256 key pair, used for a single handshake.
pub struct EcdheKeyExchange {
    secret: EphemeralSecret,
    public: Vec<u8>,
}

impl EcdheKeyExchange {
    pub fn new() -> EcdheKeyExchange {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = secret
            .public_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        EcdheKeyExchange { secret, public }
    }

    /// Uncompressed SEC1 encoding of our public point, as sent on the wire.
    pub fn public_key(&self) -> &[u8] {
        &self.public
    }

    /// The premaster secret: the x coordinate of the shared point.
    pub fn diffie_hellman(&self, peer_public: &[u8]) -> Result<Vec<u8>, Error> {
        let peer = PublicKey::from_sec1_bytes(peer_public)
            .map_err(|_| Error::Crypto("bad peer ECDH point".into()))?;
        let shared = self.secret.diffie_hellman(&peer);
        Ok(shared.raw_secret_bytes().to_vec())
    }
}

impl std::fmt::Debug for EcdheKeyExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EcdheKeyExchange(..)")
    }
}

/// ECDSA/SHA-256 over `client_random + server_random + params`, DER
/// encoded (RFC 5246 7.4.3, ecdsa per RFC 4492).
pub fn sign_key_exchange(
    key: &SigningKey,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    params: &[u8],
) -> Vec<u8> {
    let mut signed = Vec::with_capacity(64 + params.len());
    signed.extend_from_slice(client_random);
    signed.extend_from_slice(server_random);
    signed.extend_from_slice(params);

    let signature: Signature = key.sign(&signed);
    signature.to_der().as_bytes().to_vec()
}

pub fn verify_key_exchange(
    key: &VerifyingKey,
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    params: &[u8],
    signature: &[u8],
) -> Result<(), Error> {
    let signature = Signature::from_der(signature).map_err(|_| Error::BadSignature)?;

    let mut signed = Vec::with_capacity(64 + params.len());
    signed.extend_from_slice(client_random);
    signed.extend_from_slice(server_random);
    signed.extend_from_slice(params);

    key.verify(&signed, &signature).map_err(|_| Error::BadSignature)
}
