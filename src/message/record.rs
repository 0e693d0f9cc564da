use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::ProtocolVersion;
use crate::util::be_u48;

/// Fixed record header length: type(1) + version(2) + epoch(2) + seq(6) + length(2).
pub const RECORD_HEADER_LEN: usize = 13;

/// Largest sequence number representable in the 48-bit wire field.
pub(crate) const MAX_SEQUENCE_NUMBER: u64 = (1 << 48) - 1;

/// One DTLS record as carried in a datagram.
///
/// The fragment holds whatever the wire held: ciphertext for protected
/// records, plaintext otherwise. Decryption happens later, once the
/// matching-epoch read state is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DTLSRecord {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    pub epoch: u16,
    pub sequence_number: u64,
    pub fragment: Vec<u8>,
}

impl DTLSRecord {
    pub fn parse(input: &[u8]) -> IResult<&[u8], DTLSRecord> {
        let (input, content_type) = ContentType::parse(input)?;
        let (input, version) = ProtocolVersion::parse(input)?;
        let (input, epoch) = be_u16(input)?;
        let (input, sequence_number) = be_u48(input)?;
        let (input, length) = be_u16(input)?;
        let (input, fragment) = take(length as usize)(input)?;

        Ok((
            input,
            DTLSRecord {
                content_type,
                version,
                epoch,
                sequence_number,
                fragment: fragment.to_vec(),
            },
        ))
    }

    /// Parse every record in one datagram.
    pub fn parse_datagram(input: &[u8]) -> IResult<&[u8], Vec<DTLSRecord>> {
        let mut records = Vec::new();
        let mut rest = input;
        while !rest.is_empty() {
            let (r, record) = DTLSRecord::parse(rest)?;
            records.push(record);
            rest = r;
        }
        Ok((rest, records))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        debug_assert!(self.sequence_number <= MAX_SEQUENCE_NUMBER);
        debug_assert!(self.fragment.len() <= u16::MAX as usize);

        output.push(self.content_type.as_u8());
        self.version.serialize(output);
        output.extend_from_slice(&self.epoch.to_be_bytes());
        output.extend_from_slice(&self.sequence_number.to_be_bytes()[2..]);
        output.extend_from_slice(&(self.fragment.len() as u16).to_be_bytes());
        output.extend_from_slice(&self.fragment);
    }

    /// The wire size of this record including the header.
    pub fn wire_length(&self) -> usize {
        RECORD_HEADER_LEN + self.fragment.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    ChangeCipherSpec,
    Alert,
    Handshake,
    ApplicationData,
    Unknown(u8),
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Unknown(0)
    }
}

impl ContentType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            20 => ContentType::ChangeCipherSpec,
            21 => ContentType::Alert,
            22 => ContentType::Handshake,
            23 => ContentType::ApplicationData,
            _ => ContentType::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            ContentType::ChangeCipherSpec => 20,
            ContentType::Alert => 21,
            ContentType::Handshake => 22,
            ContentType::ApplicationData => 23,
            ContentType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ContentType> {
        let (input, byte) = be_u8(input)?;
        Ok((input, Self::from_u8(byte)))
    }
}
