use zeroize::{Zeroize, ZeroizeOnDrop};

use super::prf::prf;
use crate::error::Error;
use crate::message::CipherSuite;

pub const MASTER_SECRET_LEN: usize = 48;

/// The 48 byte master secret. Zeroed when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterSecret([u8; MASTER_SECRET_LEN]);

impl MasterSecret {
    /// `PRF(premaster, "master secret", client_random + server_random)`.
    pub fn derive(
        premaster: &[u8],
        client_random: &[u8; 32],
        server_random: &[u8; 32],
    ) -> Result<MasterSecret, Error> {
        let mut seed = [0u8; 64];
        seed[..32].copy_from_slice(client_random);
        seed[32..].copy_from_slice(server_random);

        let out = prf(premaster, b"master secret", &seed, MASTER_SECRET_LEN)?;
        let mut secret = [0u8; MASTER_SECRET_LEN];
        secret.copy_from_slice(&out);
        Ok(MasterSecret(secret))
    }

    /// `PRF(master, label, transcript_hash)[0..12]` for Finished.
    pub fn verify_data(&self, label: &[u8], transcript_hash: &[u8; 32]) -> Result<[u8; 12], Error> {
        let out = prf(&self.0, label, transcript_hash, 12)?;
        let mut verify = [0u8; 12];
        verify.copy_from_slice(&out);
        Ok(verify)
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_SECRET_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        write!(f, "MasterSecret(..)")
    }
}

/// The PSK premaster: `uint16(N) + N zeroes + uint16(N) + psk`
/// (RFC 4279 2).
pub fn psk_premaster(psk: &[u8]) -> Vec<u8> {
    let n = psk.len();
    let mut out = Vec::with_capacity(4 + 2 * n);
    out.extend_from_slice(&(n as u16).to_be_bytes());
    out.extend(std::iter::repeat(0).take(n));
    out.extend_from_slice(&(n as u16).to_be_bytes());
    out.extend_from_slice(psk);
    out
}

/// Write keys sliced out of the expanded key block, one direction each.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyBlock {
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

impl KeyBlock {
    /// `PRF(master, "key expansion", server_random + client_random)` sliced
    /// per RFC 5246 6.3. The MAC keys are zero length for AEAD suites.
    pub fn derive(
        master: &MasterSecret,
        client_random: &[u8; 32],
        server_random: &[u8; 32],
        suite: CipherSuite,
    ) -> Result<KeyBlock, Error> {
        // Note the reversed random order compared to the master secret.
        let mut seed = [0u8; 64];
        seed[..32].copy_from_slice(server_random);
        seed[32..].copy_from_slice(client_random);

        let mac_len = suite.mac_key_length();
        let key_len = suite.enc_key_length();
        let iv_len = suite.fixed_iv_length();
        let total = 2 * mac_len + 2 * key_len + 2 * iv_len;

        let mut block = prf(master.as_bytes(), b"key expansion", &seed, total)?;

        let mut offset = 2 * mac_len;
        let client_write_key = block[offset..offset + key_len].to_vec();
        offset += key_len;
        let server_write_key = block[offset..offset + key_len].to_vec();
        offset += key_len;
        let client_write_iv = block[offset..offset + iv_len].to_vec();
        offset += iv_len;
        let server_write_iv = block[offset..offset + iv_len].to_vec();

        block.zeroize();

        Ok(KeyBlock {
            client_write_key,
            server_write_key,
            client_write_iv,
            server_write_iv,
        })
    }
}

impl std::fmt::Debug for KeyBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyBlock(..)")
    }
}
