use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::{Err, IResult};

use super::{CertificateType, ParseContext, SignatureAndHashAlgorithm};
use crate::util::serialize_u24;

/// The credential a peer presents in its Certificate message.
///
/// Which variant is on the wire depends on the certificate type
/// negotiated via the RFC 7250 extensions, so parsing needs the
/// [`ParseContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    /// A chain of DER-encoded X.509 certificates, leaf first.
    X509Chain(Vec<Vec<u8>>),
    /// A single DER-encoded SubjectPublicKeyInfo.
    RawPublicKey(Vec<u8>),
}

impl Certificate {
    pub fn parse<'a>(input: &'a [u8], ctx: &ParseContext) -> IResult<&'a [u8], Certificate> {
        if ctx.raw_public_key {
            let (input, spki) = length_data(be_u24)(input)?;
            return Ok((input, Certificate::RawPublicKey(spki.to_vec())));
        }

        let (input, total_len) = be_u24(input)?;
        let (input, mut list) = take(total_len as usize)(input)?;

        let mut chain = Vec::new();
        while !list.is_empty() {
            let (rest, der) = length_data(be_u24)(list)?;
            chain.push(der.to_vec());
            list = rest;
        }

        Ok((input, Certificate::X509Chain(chain)))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            Certificate::X509Chain(chain) => {
                let total: usize = chain.iter().map(|c| 3 + c.len()).sum();
                serialize_u24(total, output);
                for der in chain {
                    serialize_u24(der.len(), output);
                    output.extend_from_slice(der);
                }
            }
            Certificate::RawPublicKey(spki) => {
                serialize_u24(spki.len(), output);
                output.extend_from_slice(spki);
            }
        }
    }

    /// The DER bytes to identify and verify the peer by. For X.509 this
    /// is the leaf certificate.
    pub fn leaf(&self) -> Option<&[u8]> {
        match self {
            Certificate::X509Chain(chain) => chain.first().map(|c| c.as_slice()),
            Certificate::RawPublicKey(spki) => Some(spki),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<CertificateType>,
    pub supported_signature_algorithms: Vec<SignatureAndHashAlgorithm>,
    pub certificate_authorities: Vec<Vec<u8>>,
}

impl CertificateRequest {
    pub fn new() -> Self {
        CertificateRequest {
            certificate_types: vec![CertificateType::X509, CertificateType::RawPublicKey],
            supported_signature_algorithms: vec![SignatureAndHashAlgorithm::ECDSA_SHA256],
            certificate_authorities: Vec::new(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateRequest> {
        let (input, types_len) = be_u8(input)?;
        let (input, mut types_data) = take(types_len as usize)(input)?;
        let mut certificate_types = Vec::new();
        while !types_data.is_empty() {
            let (rest, t) = CertificateType::parse(types_data)?;
            certificate_types.push(t);
            types_data = rest;
        }

        let (input, algs_len) = be_u16(input)?;
        if algs_len % 2 != 0 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (input, mut algs_data) = take(algs_len as usize)(input)?;
        let mut supported_signature_algorithms = Vec::new();
        while !algs_data.is_empty() {
            let (rest, a) = SignatureAndHashAlgorithm::parse(algs_data)?;
            supported_signature_algorithms.push(a);
            algs_data = rest;
        }

        let (input, cas_len) = be_u16(input)?;
        let (input, mut cas_data) = take(cas_len as usize)(input)?;
        let mut certificate_authorities = Vec::new();
        while !cas_data.is_empty() {
            let (rest, dn) = length_data(be_u16)(cas_data)?;
            certificate_authorities.push(dn.to_vec());
            cas_data = rest;
        }

        Ok((
            input,
            CertificateRequest {
                certificate_types,
                supported_signature_algorithms,
                certificate_authorities,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.certificate_types.len() as u8);
        for t in &self.certificate_types {
            output.push(t.as_u8());
        }

        output.extend_from_slice(&(self.supported_signature_algorithms.len() as u16 * 2).to_be_bytes());
        for a in &self.supported_signature_algorithms {
            a.serialize(output);
        }

        let cas_len: usize = self.certificate_authorities.iter().map(|d| 2 + d.len()).sum();
        output.extend_from_slice(&(cas_len as u16).to_be_bytes());
        for dn in &self.certificate_authorities {
            output.extend_from_slice(&(dn.len() as u16).to_be_bytes());
            output.extend_from_slice(dn);
        }
    }
}

impl Default for CertificateRequest {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub algorithm: SignatureAndHashAlgorithm,
    pub signature: Vec<u8>,
}

impl CertificateVerify {
    pub fn parse(input: &[u8]) -> IResult<&[u8], CertificateVerify> {
        let (input, algorithm) = SignatureAndHashAlgorithm::parse(input)?;
        let (input, signature) = length_data(be_u16)(input)?;

        Ok((
            input,
            CertificateVerify {
                algorithm,
                signature: signature.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.algorithm.serialize(output);
        output.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        output.extend_from_slice(&self.signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x509_chain_roundtrip() {
        let cert = Certificate::X509Chain(vec![vec![0x30, 0x82, 0x01], vec![0x30, 0x82, 0x02, 0x00]]);
        let ctx = ParseContext::default();

        let mut serialized = Vec::new();
        cert.serialize(&mut serialized);
        assert_eq!(&serialized[..3], &[0x00, 0x00, 0x0D]);

        let (rest, parsed) = Certificate::parse(&serialized, &ctx).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, cert);
        assert_eq!(parsed.leaf(), Some(&[0x30, 0x82, 0x01][..]));
    }

    #[test]
    fn raw_public_key_roundtrip() {
        let cert = Certificate::RawPublicKey(vec![0x30, 0x59, 0x01, 0x02]);
        let ctx = ParseContext {
            raw_public_key: true,
            ..Default::default()
        };

        let mut serialized = Vec::new();
        cert.serialize(&mut serialized);
        assert_eq!(&serialized[..3], &[0x00, 0x00, 0x04]);

        let (rest, parsed) = Certificate::parse(&serialized, &ctx).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, cert);
    }

    #[test]
    fn certificate_request_roundtrip() {
        let req = CertificateRequest::new();

        let mut serialized = Vec::new();
        req.serialize(&mut serialized);

        let (rest, parsed) = CertificateRequest::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, req);
    }

    #[test]
    fn certificate_verify_roundtrip() {
        let verify = CertificateVerify {
            algorithm: SignatureAndHashAlgorithm::ECDSA_SHA256,
            signature: vec![0x30, 0x45, 0x02, 0x20],
        };

        let mut serialized = Vec::new();
        verify.serialize(&mut serialized);

        let (rest, parsed) = CertificateVerify::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, verify);
    }
}
