use nom::IResult;

use super::{Cookie, ProtocolVersion};

/// Carries the stateless cookie the server demands before it commits
/// any per-peer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Cookie,
}

impl HelloVerifyRequest {
    pub fn new(cookie: Cookie) -> Self {
        HelloVerifyRequest {
            // RFC 6347 4.2.1 fixes the HelloVerifyRequest version to 1.0
            // regardless of the version being negotiated.
            server_version: ProtocolVersion::DTLS1_0,
            cookie,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], HelloVerifyRequest> {
        let (input, server_version) = ProtocolVersion::parse(input)?;
        let (input, cookie) = Cookie::parse(input)?;

        Ok((
            input,
            HelloVerifyRequest {
                server_version,
                cookie,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.server_version.serialize(output);
        self.cookie.serialize(output);
    }
}
