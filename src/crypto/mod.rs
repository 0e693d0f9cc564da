//! Key schedule, AEAD record protection, ECDHE/ECDSA primitives, the
//! stateless cookie and the pluggable credential stores.

mod aead;
mod cookie;
mod key_exchange;
mod keying;
mod prf;
mod provider;

pub(crate) use aead::{AeadCipher, CCM_TAG_LEN, EXPLICIT_NONCE_LEN};
pub(crate) use cookie::CookieGenerator;
pub(crate) use key_exchange::{sign_key_exchange, verify_key_exchange, EcdheKeyExchange};
pub(crate) use keying::{psk_premaster, KeyBlock, MasterSecret};
pub(crate) use prf::transcript_hash;

pub(crate) use provider::verifying_key_from_spki;
pub use provider::{LocalKey, PskStore, SinglePsk, TablePskStore, TrustAnyKey, TrustStore};
