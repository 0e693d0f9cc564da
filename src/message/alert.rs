use nom::number::complete::be_u8;
use nom::IResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Fatal,
    Unknown(u8),
}

impl AlertLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AlertLevel::Warning,
            2 => AlertLevel::Fatal,
            _ => AlertLevel::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertLevel::Warning => 1,
            AlertLevel::Fatal => 2,
            AlertLevel::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], AlertLevel> {
        let (input, value) = be_u8(input)?;
        Ok((input, AlertLevel::from_u8(value)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDescription {
    CloseNotify,
    UnexpectedMessage,
    BadRecordMac,
    RecordOverflow,
    HandshakeFailure,
    BadCertificate,
    UnsupportedCertificate,
    CertificateUnknown,
    IllegalParameter,
    DecodeError,
    DecryptError,
    InternalError,
    UnsupportedExtension,
    UnknownPskIdentity,
    Unknown(u8),
}

impl AlertDescription {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => AlertDescription::CloseNotify,
            10 => AlertDescription::UnexpectedMessage,
            20 => AlertDescription::BadRecordMac,
            22 => AlertDescription::RecordOverflow,
            40 => AlertDescription::HandshakeFailure,
            42 => AlertDescription::BadCertificate,
            43 => AlertDescription::UnsupportedCertificate,
            46 => AlertDescription::CertificateUnknown,
            47 => AlertDescription::IllegalParameter,
            50 => AlertDescription::DecodeError,
            51 => AlertDescription::DecryptError,
            80 => AlertDescription::InternalError,
            110 => AlertDescription::UnsupportedExtension,
            115 => AlertDescription::UnknownPskIdentity,
            _ => AlertDescription::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            AlertDescription::CloseNotify => 0,
            AlertDescription::UnexpectedMessage => 10,
            AlertDescription::BadRecordMac => 20,
            AlertDescription::RecordOverflow => 22,
            AlertDescription::HandshakeFailure => 40,
            AlertDescription::BadCertificate => 42,
            AlertDescription::UnsupportedCertificate => 43,
            AlertDescription::CertificateUnknown => 46,
            AlertDescription::IllegalParameter => 47,
            AlertDescription::DecodeError => 50,
            AlertDescription::DecryptError => 51,
            AlertDescription::InternalError => 80,
            AlertDescription::UnsupportedExtension => 110,
            AlertDescription::UnknownPskIdentity => 115,
            AlertDescription::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], AlertDescription> {
        let (input, value) = be_u8(input)?;
        Ok((input, AlertDescription::from_u8(value)))
    }
}

/// Alert record payload: level + description, two bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl Alert {
    pub fn fatal(description: AlertDescription) -> Self {
        Alert {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn close_notify() -> Self {
        Alert {
            level: AlertLevel::Warning,
            description: AlertDescription::CloseNotify,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.level == AlertLevel::Fatal
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Alert> {
        let (input, level) = AlertLevel::parse(input)?;
        let (input, description) = AlertDescription::parse(input)?;
        Ok((input, Alert { level, description }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.level.as_u8());
        output.push(self.description.as_u8());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let alert = Alert::fatal(AlertDescription::HandshakeFailure);

        let mut serialized = Vec::new();
        alert.serialize(&mut serialized);
        assert_eq!(serialized, &[0x02, 0x28]);

        let (rest, parsed) = Alert::parse(&serialized).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, alert);
    }

    #[test]
    fn unsupported_extension_value() {
        // AlertDescription 110 per RFC 5246
        assert_eq!(AlertDescription::UnsupportedExtension.as_u8(), 110);
        assert_eq!(
            AlertDescription::from_u8(110),
            AlertDescription::UnsupportedExtension
        );
    }

    #[test]
    fn unknown_level_is_preserved() {
        let (_, parsed) = Alert::parse(&[0x05, 0x00]).unwrap();
        assert_eq!(parsed.level, AlertLevel::Unknown(5));
        assert!(!parsed.is_fatal());
    }
}
