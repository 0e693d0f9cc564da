use nom::error::{Error, ErrorKind};
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::{Err, IResult};

use super::{KeyExchangeAlgorithm, ParseContext, PskIdentity, SignatureAndHashAlgorithm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveType {
    NamedCurve,
    Unknown(u8),
}

impl CurveType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            3 => CurveType::NamedCurve,
            _ => CurveType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            CurveType::NamedCurve => 3,
            CurveType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], CurveType> {
        let (input, value) = be_u8(input)?;
        Ok((input, CurveType::from_u8(value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCurve {
    Secp256r1,
    Unknown(u16),
}

impl NamedCurve {
    pub fn from_u16(value: u16) -> Self {
        match value {
            23 => NamedCurve::Secp256r1,
            _ => NamedCurve::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            NamedCurve::Secp256r1 => 23,
            NamedCurve::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], NamedCurve> {
        let (input, value) = be_u16(input)?;
        Ok((input, NamedCurve::from_u16(value)))
    }
}

/// Signature over the key exchange parameters (RFC 5246 4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitallySigned {
    pub algorithm: SignatureAndHashAlgorithm,
    pub signature: Vec<u8>,
}

impl DigitallySigned {
    pub fn parse(input: &[u8]) -> IResult<&[u8], DigitallySigned> {
        let (input, algorithm) = SignatureAndHashAlgorithm::parse(input)?;
        let (input, signature) = length_data(be_u16)(input)?;

        Ok((
            input,
            DigitallySigned {
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdheServerParams {
    pub curve: NamedCurve,
    /// Uncompressed SEC1 point.
    pub public: Vec<u8>,
    pub signature: DigitallySigned,
}

impl EcdheServerParams {
    /// The `ServerECDHParams` bytes that are covered by the signature,
    /// i.e. everything up to but excluding `signature`.
    pub fn params_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.public.len());
        out.push(CurveType::NamedCurve.as_u8());
        out.extend_from_slice(&self.curve.as_u16().to_be_bytes());
        out.push(self.public.len() as u8);
        out.extend_from_slice(&self.public);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKeyExchange {
    Ecdhe(EcdheServerParams),
    Psk { identity_hint: PskIdentity },
}

impl ServerKeyExchange {
    pub fn parse<'a>(input: &'a [u8], ctx: &ParseContext) -> IResult<&'a [u8], ServerKeyExchange> {
        let algorithm = ctx
            .cipher_suite
            .map(|s| s.key_exchange_algorithm())
            .unwrap_or(KeyExchangeAlgorithm::Unknown);

        match algorithm {
            KeyExchangeAlgorithm::EcdheEcdsa => {
                let (input, curve_type) = CurveType::parse(input)?;
                if curve_type != CurveType::NamedCurve {
                    return Err(Err::Failure(Error::new(input, ErrorKind::Tag)));
                }
                let (input, curve) = NamedCurve::parse(input)?;
                let (input, public) = length_data(be_u8)(input)?;
                let (input, signature) = DigitallySigned::parse(input)?;

                Ok((
                    input,
                    ServerKeyExchange::Ecdhe(EcdheServerParams {
                        curve,
                        public: public.to_vec(),
                        signature,
                    }),
                ))
            }
            KeyExchangeAlgorithm::Psk => {
                let (input, identity_hint) = PskIdentity::parse(input)?;
                Ok((input, ServerKeyExchange::Psk { identity_hint }))
            }
            _ => Err(Err::Failure(Error::new(input, ErrorKind::Switch))),
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            ServerKeyExchange::Ecdhe(params) => {
                output.extend_from_slice(&params.params_bytes());
                params.signature.serialize(output);
            }
            ServerKeyExchange::Psk { identity_hint } => {
                identity_hint.serialize(output);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyExchange {
    Ecdhe {
        /// Uncompressed SEC1 point.
        public: Vec<u8>,
    },
    Psk {
        identity: PskIdentity,
    },
    /// TLS_NULL_WITH_NULL_NULL carries an empty exchange.
    Null,
}

impl ClientKeyExchange {
    pub fn parse<'a>(input: &'a [u8], ctx: &ParseContext) -> IResult<&'a [u8], ClientKeyExchange> {
        let algorithm = ctx
            .cipher_suite
            .map(|s| s.key_exchange_algorithm())
            .unwrap_or(KeyExchangeAlgorithm::Unknown);

        match algorithm {
            KeyExchangeAlgorithm::EcdheEcdsa => {
                let (input, public) = length_data(be_u8)(input)?;
                Ok((
                    input,
                    ClientKeyExchange::Ecdhe {
                        public: public.to_vec(),
                    },
                ))
            }
            KeyExchangeAlgorithm::Psk => {
                let (input, identity) = PskIdentity::parse(input)?;
                Ok((input, ClientKeyExchange::Psk { identity }))
            }
            KeyExchangeAlgorithm::Null => Ok((input, ClientKeyExchange::Null)),
            KeyExchangeAlgorithm::Unknown => {
                Err(Err::Failure(Error::new(input, ErrorKind::Switch)))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            ClientKeyExchange::Ecdhe { public } => {
                output.push(public.len() as u8);
                output.extend_from_slice(public);
            }
            ClientKeyExchange::Psk { identity } => {
                identity.serialize(output);
            }
            ClientKeyExchange::Null => {}
        }
    }
}
