use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u24, be_u8};
use nom::IResult;

use super::{
    Certificate, CertificateRequest, CertificateVerify, ClientHello, ClientKeyExchange, Finished,
    HelloVerifyRequest, ParseContext, ServerHello, ServerKeyExchange,
};
use crate::util::serialize_u24;

pub const HANDSHAKE_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    HelloRequest,
    ClientHello,
    ServerHello,
    HelloVerifyRequest,
    Certificate,
    ServerKeyExchange,
    CertificateRequest,
    ServerHelloDone,
    CertificateVerify,
    ClientKeyExchange,
    Finished,
    Unknown(u8),
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Unknown(0xFF)
    }
}

impl MessageType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            3 => MessageType::HelloVerifyRequest,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            _ => MessageType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::HelloVerifyRequest => 3,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], MessageType> {
        let (input, value) = be_u8(input)?;
        Ok((input, MessageType::from_u8(value)))
    }
}

/// The 12 byte DTLS handshake header (RFC 6347 4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: MessageType,
    /// Length of the complete message body, across all fragments.
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl Header {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, msg_type) = MessageType::parse(input)?;
        let (input, length) = be_u24(input)?;
        let (input, message_seq) = be_u16(input)?;
        let (input, fragment_offset) = be_u24(input)?;
        let (input, fragment_length) = be_u24(input)?;

        Ok((
            input,
            Header {
                msg_type,
                length,
                message_seq,
                fragment_offset,
                fragment_length,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.msg_type.as_u8());
        serialize_u24(self.length as usize, output);
        output.extend_from_slice(&self.message_seq.to_be_bytes());
        serialize_u24(self.fragment_offset as usize, output);
        serialize_u24(self.fragment_length as usize, output);
    }

    /// Whether this fragment alone carries the whole message.
    pub fn is_complete(&self) -> bool {
        self.fragment_offset == 0 && self.fragment_length == self.length
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    HelloRequest,
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    HelloVerifyRequest(HelloVerifyRequest),
    Certificate(Certificate),
    ServerKeyExchange(ServerKeyExchange),
    CertificateRequest(CertificateRequest),
    ServerHelloDone,
    CertificateVerify(CertificateVerify),
    ClientKeyExchange(ClientKeyExchange),
    Finished(Finished),
    /// A partial fragment awaiting reassembly. Never serialized via
    /// [`Handshake::new`], only produced by parsing and fragmenting.
    Fragment(Vec<u8>),
}

impl Body {
    pub fn message_type(&self) -> Option<MessageType> {
        Some(match self {
            Body::HelloRequest => MessageType::HelloRequest,
            Body::ClientHello(_) => MessageType::ClientHello,
            Body::ServerHello(_) => MessageType::ServerHello,
            Body::HelloVerifyRequest(_) => MessageType::HelloVerifyRequest,
            Body::Certificate(_) => MessageType::Certificate,
            Body::ServerKeyExchange(_) => MessageType::ServerKeyExchange,
            Body::CertificateRequest(_) => MessageType::CertificateRequest,
            Body::ServerHelloDone => MessageType::ServerHelloDone,
            Body::CertificateVerify(_) => MessageType::CertificateVerify,
            Body::ClientKeyExchange(_) => MessageType::ClientKeyExchange,
            Body::Finished(_) => MessageType::Finished,
            Body::Fragment(_) => return None,
        })
    }

    pub fn parse<'a>(
        input: &'a [u8],
        msg_type: MessageType,
        ctx: &ParseContext,
    ) -> IResult<&'a [u8], Body> {
        match msg_type {
            MessageType::HelloRequest => Ok((input, Body::HelloRequest)),
            MessageType::ClientHello => {
                let (input, m) = ClientHello::parse(input)?;
                Ok((input, Body::ClientHello(m)))
            }
            MessageType::ServerHello => {
                let (input, m) = ServerHello::parse(input)?;
                Ok((input, Body::ServerHello(m)))
            }
            MessageType::HelloVerifyRequest => {
                let (input, m) = HelloVerifyRequest::parse(input)?;
                Ok((input, Body::HelloVerifyRequest(m)))
            }
            MessageType::Certificate => {
                let (input, m) = Certificate::parse(input, ctx)?;
                Ok((input, Body::Certificate(m)))
            }
            MessageType::ServerKeyExchange => {
                let (input, m) = ServerKeyExchange::parse(input, ctx)?;
                Ok((input, Body::ServerKeyExchange(m)))
            }
            MessageType::CertificateRequest => {
                let (input, m) = CertificateRequest::parse(input)?;
                Ok((input, Body::CertificateRequest(m)))
            }
            MessageType::ServerHelloDone => Ok((input, Body::ServerHelloDone)),
            MessageType::CertificateVerify => {
                let (input, m) = CertificateVerify::parse(input)?;
                Ok((input, Body::CertificateVerify(m)))
            }
            MessageType::ClientKeyExchange => {
                let (input, m) = ClientKeyExchange::parse(input, ctx)?;
                Ok((input, Body::ClientKeyExchange(m)))
            }
            MessageType::Finished => {
                let (input, m) = Finished::parse(input)?;
                Ok((input, Body::Finished(m)))
            }
            MessageType::Unknown(_) => {
                let (input, data) = take(input.len())(input)?;
                Ok((input, Body::Fragment(data.to_vec())))
            }
        }
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        match self {
            Body::HelloRequest | Body::ServerHelloDone => {}
            Body::ClientHello(m) => m.serialize(output),
            Body::ServerHello(m) => m.serialize(output),
            Body::HelloVerifyRequest(m) => m.serialize(output),
            Body::Certificate(m) => m.serialize(output),
            Body::ServerKeyExchange(m) => m.serialize(output),
            Body::CertificateRequest(m) => m.serialize(output),
            Body::CertificateVerify(m) => m.serialize(output),
            Body::ClientKeyExchange(m) => m.serialize(output),
            Body::Finished(m) => m.serialize(output),
            Body::Fragment(data) => output.extend_from_slice(data),
        }
    }
}

/// A handshake message (or fragment of one) as it sits in a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub header: Header,
    pub body: Body,
}

impl Handshake {
    /// Wrap a complete body in a header with correct lengths.
    pub fn new(message_seq: u16, body: Body) -> Handshake {
        // Fragment bodies come with their own headers via `fragment()`.
        let msg_type = body
            .message_type()
            .unwrap_or(MessageType::Unknown(0xFF));

        let mut serialized = Vec::new();
        body.serialize(&mut serialized);
        let length = serialized.len() as u32;

        Handshake {
            header: Header {
                msg_type,
                length,
                message_seq,
                fragment_offset: 0,
                fragment_length: length,
            },
            body,
        }
    }

    pub fn parse<'a>(input: &'a [u8], ctx: &ParseContext) -> IResult<&'a [u8], Handshake> {
        let (input, header) = Header::parse(input)?;
        let (input, fragment) = take(header.fragment_length as usize)(input)?;

        let body = if header.is_complete() {
            let (_, body) = Body::parse(fragment, header.msg_type, ctx)?;
            body
        } else {
            Body::Fragment(fragment.to_vec())
        };

        Ok((input, Handshake { header, body }))
    }

    /// Parse the header and keep the body bytes undecoded.
    ///
    /// Messages can arrive before the context needed to decode them (a
    /// reordered ServerKeyExchange overtaking the ServerHello). The body
    /// is decoded later, once the message is next in sequence.
    pub fn parse_raw(input: &[u8]) -> IResult<&[u8], Handshake> {
        let (input, header) = Header::parse(input)?;
        let (input, fragment) = take(header.fragment_length as usize)(input)?;

        Ok((
            input,
            Handshake {
                header,
                body: Body::Fragment(fragment.to_vec()),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        self.header.serialize(output);
        self.body.serialize(output);
    }

    pub fn wire_length(&self) -> usize {
        HANDSHAKE_HEADER_LEN + self.header.fragment_length as usize
    }

    /// Split into fragments no larger than `max_fragment_len` body bytes.
    ///
    /// All fragments keep this message's `message_seq`; only the offsets
    /// differ. A message that already fits is returned whole.
    pub fn fragment(&self, max_fragment_len: usize) -> Vec<Handshake> {
        assert!(max_fragment_len > 0);

        if self.header.fragment_length as usize <= max_fragment_len {
            return vec![self.clone()];
        }

        let mut body = Vec::new();
        self.body.serialize(&mut body);

        body.chunks(max_fragment_len)
            .enumerate()
            .map(|(i, chunk)| Handshake {
                header: Header {
                    msg_type: self.header.msg_type,
                    length: self.header.length,
                    message_seq: self.header.message_seq,
                    fragment_offset: (i * max_fragment_len) as u32,
                    fragment_length: chunk.len() as u32,
                },
                body: Body::Fragment(chunk.to_vec()),
            })
            .collect()
    }
}
