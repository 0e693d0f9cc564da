use nom::bytes::complete::take;
use nom::error::{Error, ErrorKind};
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};
use tinyvec::ArrayVec;

use super::{CipherSuite, CompressionMethod, ProtocolVersion};
use super::{Cookie, Extension, Random, SessionId};
use crate::util::exact_list;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cookie: Cookie,
    pub cipher_suites: ArrayVec<[CipherSuite; 32]>,
    pub compression_methods: ArrayVec<[CompressionMethod; 4]>,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn new(
        random: Random,
        session_id: SessionId,
        cipher_suites: ArrayVec<[CipherSuite; 32]>,
    ) -> Self {
        let mut compression_methods = ArrayVec::new();
        compression_methods.push(CompressionMethod::Null);

        ClientHello {
            client_version: ProtocolVersion::DTLS1_2,
            random,
            session_id,
            cookie: Cookie::empty(),
            cipher_suites,
            compression_methods,
            extensions: Vec::new(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ClientHello> {
        let (input, client_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        let (input, cipher_suites_len) = be_u16(input)?;
        let (input, input_cipher) = take(cipher_suites_len as usize)(input)?;
        if cipher_suites_len % 2 != 0 {
            return Err(Err::Failure(Error::new(input, ErrorKind::LengthValue)));
        }
        let (_, cipher_suites) = exact_list(CipherSuite::parse)(input_cipher)?;

        let (input, compression_methods_len) = be_u8(input)?;
        let (input, input_compression) = take(compression_methods_len as usize)(input)?;
        let (_, compression_methods) = exact_list(CompressionMethod::parse)(input_compression)?;

        let (input, extensions) = Extension::parse_block(input)?;

        Ok((
            input,
            ClientHello {
                client_version,
                random,
                session_id,
                cookie,
                cipher_suites,
                compression_methods,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.client_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        self.cookie.serialize(output);

        output.extend_from_slice(&(self.cipher_suites.len() as u16 * 2).to_be_bytes());
        for suite in &self.cipher_suites {
            output.extend_from_slice(&suite.as_u16().to_be_bytes());
        }

        output.push(self.compression_methods.len() as u8);
        for method in &self.compression_methods {
            output.push(method.as_u8());
        }

        Extension::serialize_block(&self.extensions, output);
    }

    /// The suites the client offered that we also implement, client order.
    pub fn common_cipher_suites(&self, ours: &[CipherSuite]) -> ArrayVec<[CipherSuite; 32]> {
        self.cipher_suites
            .iter()
            .filter(|s| ours.contains(s))
            .copied()
            .collect()
    }
}
