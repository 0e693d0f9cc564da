use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use super::{CertificateType, NamedCurve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionType {
    /// supported_groups / elliptic_curves (10).
    SupportedGroups,
    /// ec_point_formats (11).
    EcPointFormats,
    /// client_certificate_type (19), RFC 7250.
    ClientCertificateType,
    /// server_certificate_type (20), RFC 7250.
    ServerCertificateType,
    Unknown(u16),
}

impl ExtensionType {
    pub fn from_u16(value: u16) -> Self {
        match value {
            10 => ExtensionType::SupportedGroups,
            11 => ExtensionType::EcPointFormats,
            19 => ExtensionType::ClientCertificateType,
            20 => ExtensionType::ServerCertificateType,
            _ => ExtensionType::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            ExtensionType::SupportedGroups => 10,
            ExtensionType::EcPointFormats => 11,
            ExtensionType::ClientCertificateType => 19,
            ExtensionType::ServerCertificateType => 20,
            ExtensionType::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ExtensionType> {
        let (input, value) = be_u16(input)?;
        Ok((input, ExtensionType::from_u16(value)))
    }
}

/// A hello extension: type + opaque data.
///
/// The payload stays opaque at this level; typed accessors below decode
/// the few extensions this implementation understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub extension_type: ExtensionType,
    pub extension_data: Vec<u8>,
}

impl Extension {
    pub fn new(extension_type: ExtensionType, extension_data: Vec<u8>) -> Self {
        Extension {
            extension_type,
            extension_data,
        }
    }

    /// supported_groups offering just the curves we implement.
    pub fn supported_groups() -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&NamedCurve::Secp256r1.as_u16().to_be_bytes());
        Extension::new(ExtensionType::SupportedGroups, data)
    }

    /// ec_point_formats with uncompressed (0) only.
    pub fn ec_point_formats() -> Self {
        Extension::new(ExtensionType::EcPointFormats, vec![0x01, 0x00])
    }

    /// Client-side certificate type list (RFC 7250 client hello form).
    pub fn certificate_type_list(extension_type: ExtensionType, types: &[CertificateType]) -> Self {
        let mut data = Vec::new();
        data.push(types.len() as u8);
        for t in types {
            data.push(t.as_u8());
        }
        Extension::new(extension_type, data)
    }

    /// Server-side certificate type selection (single byte form).
    pub fn certificate_type_selected(extension_type: ExtensionType, t: CertificateType) -> Self {
        Extension::new(extension_type, vec![t.as_u8()])
    }

    /// Decode this extension as a certificate type list.
    pub fn as_certificate_types(&self) -> Option<Vec<CertificateType>> {
        let (_, len) = be_u8::<_, nom::error::Error<&[u8]>>(&self.extension_data[..]).ok()?;
        let rest = self.extension_data.get(1..1 + len as usize)?;
        Some(rest.iter().map(|b| CertificateType::from_u8(*b)).collect())
    }

    /// Decode this extension as a single selected certificate type.
    pub fn as_selected_certificate_type(&self) -> Option<CertificateType> {
        match self.extension_data.as_slice() {
            [b] => Some(CertificateType::from_u8(*b)),
            _ => None,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Extension> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, len) = be_u16(input)?;
        let (input, data) = take(len as usize)(input)?;
        Ok((
            input,
            Extension {
                extension_type,
                extension_data: data.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.extension_type.as_u16().to_be_bytes());
        output.extend_from_slice(&(self.extension_data.len() as u16).to_be_bytes());
        output.extend_from_slice(&self.extension_data);
    }

    /// Parse the optional extensions block at the tail of a hello body.
    pub fn parse_block(input: &[u8]) -> IResult<&[u8], Vec<Extension>> {
        let mut extensions = Vec::new();

        if input.is_empty() {
            return Ok((input, extensions));
        }

        let (input, block_len) = be_u16(input)?;
        let (input, mut block) = take(block_len as usize)(input)?;

        while !block.is_empty() {
            let (rest, extension) = Extension::parse(block)?;
            extensions.push(extension);
            block = rest;
        }

        Ok((input, extensions))
    }

    /// Serialize an extensions block, omitted entirely when empty.
    pub fn serialize_block(extensions: &[Extension], output: &mut Vec<u8>) {
        if extensions.is_empty() {
            return;
        }

        let block_len: usize = extensions
            .iter()
            .map(|e| 4 + e.extension_data.len())
            .sum();
        output.extend_from_slice(&(block_len as u16).to_be_bytes());

        for ext in extensions {
            ext.serialize(output);
        }
    }
}

/// Find an extension by type.
pub(crate) fn find<'a>(
    extensions: &'a [Extension],
    extension_type: ExtensionType,
) -> Option<&'a Extension> {
    extensions
        .iter()
        .find(|e| e.extension_type == extension_type)
}
