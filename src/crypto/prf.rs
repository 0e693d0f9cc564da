use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::Error;

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 32], Error> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| Error::Crypto(e.to_string()))?;
    for p in parts {
        mac.update(p);
    }
    Ok(mac.finalize().into_bytes().into())
}

/// The TLS 1.2 PRF (RFC 5246 5) with SHA-256 as the single hash.
///
/// `P_SHA256(secret, label + seed)` iterated until `out_len` bytes are
/// produced.
pub fn prf(secret: &[u8], label: &[u8], seed: &[u8], out_len: usize) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(out_len);

    // A(0) = label + seed, A(i) = HMAC(secret, A(i-1))
    let mut a = hmac_sha256(secret, &[label, seed])?;

    while out.len() < out_len {
        let block = hmac_sha256(secret, &[&a, label, seed])?;
        let take = (out_len - out.len()).min(block.len());
        out.extend_from_slice(&block[..take]);
        a = hmac_sha256(secret, &[&a])?;
    }

    Ok(out)
}

/// SHA-256 over the concatenated handshake transcript.
pub fn transcript_hash(transcript: &[u8]) -> [u8; 32] {
    Sha256::digest(transcript).into()
}
