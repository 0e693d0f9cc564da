//! Typed representations of DTLS 1.2 wire messages.
//!
//! Every type pairs a nom `parse` with a `serialize(&mut Vec<u8>)` and the
//! two must reproduce each other byte for byte.

mod alert;
mod certificate;
mod change_cipher_spec;
mod client_hello;
mod extension;
mod finished;
mod handshake;
mod hello_verify;
mod id;
mod key_exchange;
mod random;
mod record;
mod server_hello;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use certificate::{Certificate, CertificateRequest, CertificateVerify};
pub use change_cipher_spec::ChangeCipherSpec;
pub use client_hello::ClientHello;
pub(crate) use extension::find as find_extension;
pub use extension::{Extension, ExtensionType};
pub use finished::Finished;
pub use handshake::{Body, Handshake, Header, MessageType, HANDSHAKE_HEADER_LEN};
pub use hello_verify::HelloVerifyRequest;
pub use id::{Cookie, InvalidLength, PskIdentity, SessionId};
pub use key_exchange::{
    ClientKeyExchange, CurveType, DigitallySigned, EcdheServerParams, NamedCurve,
    ServerKeyExchange,
};
pub use random::Random;
pub use record::{ContentType, DTLSRecord, RECORD_HEADER_LEN};
pub(crate) use record::MAX_SEQUENCE_NUMBER;
pub use server_hello::ServerHello;

use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

/// Context needed to decode cipher-suite-polymorphic message bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext {
    /// Negotiated cipher suite, once the ServerHello has been seen.
    pub cipher_suite: Option<CipherSuite>,
    /// Whether raw-public-key certificates were negotiated.
    pub raw_public_key: bool,
}

impl ParseContext {
    pub fn new(cipher_suite: Option<CipherSuite>, raw_public_key: bool) -> Self {
        ParseContext {
            cipher_suite,
            raw_public_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    DTLS1_0,
    DTLS1_2,
    Unknown(u16),
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ProtocolVersion {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xFEFF => ProtocolVersion::DTLS1_0,
            0xFEFD => ProtocolVersion::DTLS1_2,
            _ => ProtocolVersion::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ProtocolVersion::DTLS1_0 => 0xFEFF,
            ProtocolVersion::DTLS1_2 => 0xFEFD,
            ProtocolVersion::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ProtocolVersion> {
        let (input, value) = be_u16(input)?;
        Ok((input, ProtocolVersion::from_u16(value)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.as_u16().to_be_bytes());
    }
}

/// DTLS 1.2 cipher suites understood by this crate.
///
/// `NULL` (TLS_NULL_WITH_NULL_NULL) is the last-resort suite when nothing
/// else is mutually supported; it provides no protection and exists for
/// testing and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    /// TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8 (0xC0AE).
    ECDHE_ECDSA_AES128_CCM_8,
    /// TLS_PSK_WITH_AES_128_CCM_8 (0xC0A8).
    PSK_AES128_CCM_8,
    /// TLS_NULL_WITH_NULL_NULL (0x0000).
    NULL,
    Unknown(u16),
}

impl Default for CipherSuite {
    fn default() -> Self {
        Self::Unknown(0xFFFF)
    }
}

impl CipherSuite {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0xC0AE => CipherSuite::ECDHE_ECDSA_AES128_CCM_8,
            0xC0A8 => CipherSuite::PSK_AES128_CCM_8,
            0x0000 => CipherSuite::NULL,
            _ => CipherSuite::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CipherSuite::ECDHE_ECDSA_AES128_CCM_8 => 0xC0AE,
            CipherSuite::PSK_AES128_CCM_8 => 0xC0A8,
            CipherSuite::NULL => 0x0000,
            CipherSuite::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CipherSuite> {
        let (input, value) = be_u16(input)?;
        Ok((input, CipherSuite::from_u16(value)))
    }

    pub fn key_exchange_algorithm(&self) -> KeyExchangeAlgorithm {
        match self {
            CipherSuite::ECDHE_ECDSA_AES128_CCM_8 => KeyExchangeAlgorithm::EcdheEcdsa,
            CipherSuite::PSK_AES128_CCM_8 => KeyExchangeAlgorithm::Psk,
            CipherSuite::NULL => KeyExchangeAlgorithm::Null,
            CipherSuite::Unknown(_) => KeyExchangeAlgorithm::Unknown,
        }
    }

    pub fn cipher_type(&self) -> CipherType {
        match self {
            CipherSuite::ECDHE_ECDSA_AES128_CCM_8 | CipherSuite::PSK_AES128_CCM_8 => {
                CipherType::Aead
            }
            CipherSuite::NULL | CipherSuite::Unknown(_) => CipherType::Null,
        }
    }

    /// MAC key length in the key block. Zero for AEAD suites.
    pub fn mac_key_length(&self) -> usize {
        0
    }

    pub fn enc_key_length(&self) -> usize {
        match self.cipher_type() {
            CipherType::Aead => 16,
            CipherType::Null => 0,
        }
    }

    pub fn fixed_iv_length(&self) -> usize {
        match self.cipher_type() {
            CipherType::Aead => 4,
            CipherType::Null => 0,
        }
    }

    pub fn verify_data_length(&self) -> usize {
        12
    }

    /// Whether this suite requires the server to present a certificate.
    pub fn requires_server_certificate(&self) -> bool {
        matches!(self, CipherSuite::ECDHE_ECDSA_AES128_CCM_8)
    }

    /// All suites this implementation can negotiate, in preference order.
    pub(crate) fn all() -> ArrayVec<[CipherSuite; 8]> {
        let mut suites = ArrayVec::new();
        suites.push(CipherSuite::ECDHE_ECDSA_AES128_CCM_8);
        suites.push(CipherSuite::PSK_AES128_CCM_8);
        suites
    }
}

/// How the record fragment is protected once a suite is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherType {
    /// No protection. The fragment passes through unchanged.
    Null,
    /// AEAD (AES-128-CCM with an 8 byte tag).
    Aead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    EcdheEcdsa,
    Psk,
    Null,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Null,
    Unknown(u8),
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Unknown(0xFF)
    }
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => CompressionMethod::Null,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CompressionMethod::Null => 0x00,
            CompressionMethod::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CompressionMethod> {
        let (input, value) = be_u8(input)?;
        Ok((input, CompressionMethod::from_u8(value)))
    }
}

/// Certificate payload kinds (RFC 7250 certificate type values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateType {
    X509,
    RawPublicKey,
    Unknown(u8),
}

impl Default for CertificateType {
    fn default() -> Self {
        Self::Unknown(0xFF)
    }
}

impl CertificateType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => CertificateType::X509,
            2 => CertificateType::RawPublicKey,
            _ => CertificateType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CertificateType::X509 => 0,
            CertificateType::RawPublicKey => 2,
            CertificateType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateType> {
        let (input, value) = be_u8(input)?;
        Ok((input, CertificateType::from_u8(value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum HashAlgorithm {
    None,
    SHA256,
    Unknown(u8),
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl HashAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => HashAlgorithm::None,
            4 => HashAlgorithm::SHA256,
            _ => HashAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            HashAlgorithm::None => 0,
            HashAlgorithm::SHA256 => 4,
            HashAlgorithm::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HashAlgorithm> {
        let (input, value) = be_u8(input)?;
        Ok((input, HashAlgorithm::from_u8(value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum SignatureAlgorithm {
    Anonymous,
    ECDSA,
    Unknown(u8),
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl SignatureAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SignatureAlgorithm::Anonymous,
            3 => SignatureAlgorithm::ECDSA,
            _ => SignatureAlgorithm::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureAlgorithm::Anonymous => 0,
            SignatureAlgorithm::ECDSA => 3,
            SignatureAlgorithm::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAlgorithm> {
        let (input, value) = be_u8(input)?;
        Ok((input, SignatureAlgorithm::from_u8(value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

impl SignatureAndHashAlgorithm {
    pub const ECDSA_SHA256: SignatureAndHashAlgorithm = SignatureAndHashAlgorithm {
        hash: HashAlgorithm::SHA256,
        signature: SignatureAlgorithm::ECDSA,
    };

    pub fn parse(input: &[u8]) -> IResult<&[u8], SignatureAndHashAlgorithm> {
        let (input, hash) = HashAlgorithm::parse(input)?;
        let (input, signature) = SignatureAlgorithm::parse(input)?;
        Ok((input, SignatureAndHashAlgorithm { hash, signature }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.hash.as_u8());
        output.push(self.signature.as_u8());
    }
}
