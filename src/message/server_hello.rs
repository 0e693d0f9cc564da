use nom::IResult;

use super::{CipherSuite, CompressionMethod, ProtocolVersion};
use super::{Extension, Random, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: CompressionMethod,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn new(random: Random, session_id: SessionId, cipher_suite: CipherSuite) -> Self {
        ServerHello {
            server_version: ProtocolVersion::DTLS1_2,
            random,
            session_id,
            cipher_suite,
            compression_method: CompressionMethod::Null,
            extensions: Vec::new(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerHello> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, random) = Random::parse(input)?;
        let (input, session_id) = SessionId::parse(input)?;
        let (input, cipher_suite) = CipherSuite::parse(input)?;
        let (input, compression_method) = CompressionMethod::parse(input)?;
        let (input, extensions) = Extension::parse_block(input)?;

        Ok((
            input,
            ServerHello {
                server_version,
                random,
                session_id,
                cipher_suite,
                compression_method,
                extensions,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.random.serialize(output);
        self.session_id.serialize(output);
        output.extend_from_slice(&self.cipher_suite.as_u16().to_be_bytes());
        output.push(self.compression_method.as_u8());
        Extension::serialize_block(&self.extensions, output);
    }
}

#[cfg(test)]
mod tests {
    use super::super::{CertificateType, ExtensionType};
    use super::*;

    #[test]
    fn roundtrip() {
        let mut rng = crate::SeededRng::new(Some(2));
        let random = Random::new(&mut rng);
        let session_id = SessionId::random(16, &mut rng);

        let mut hello = ServerHello::new(
            random,
            session_id,
            CipherSuite::ECDHE_ECDSA_AES128_CCM_8,
        );
        hello.extensions.push(Extension::certificate_type_selected(
            ExtensionType::ServerCertificateType,
            CertificateType::RawPublicKey,
        ));

        let mut serialized = Vec::new();
        hello.serialize(&mut serialized);

        let (rest, parsed) = ServerHello::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, hello);
    }

    #[test]
    fn no_extensions_block_when_empty() {
        let mut rng = crate::SeededRng::new(Some(3));
        let hello = ServerHello::new(
            Random::new(&mut rng),
            SessionId::empty(),
            CipherSuite::PSK_AES128_CCM_8,
        );

        let mut serialized = Vec::new();
        hello.serialize(&mut serialized);
        // version + random + empty session id + suite + compression
        assert_eq!(serialized.len(), 2 + 32 + 1 + 2 + 1);

        let (rest, parsed) = ServerHello::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, hello);
    }
}
