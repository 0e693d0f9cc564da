use thiserror::Error;

use crate::message::{AlertDescription, ContentType, MessageType};

/// Errors produced by the DTLS core.
///
/// Variants that abort a handshake map onto a fatal alert via
/// [`Error::alert_description`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Incomplete input, more data needed")]
    ParseIncomplete,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Record sequence number exceeds 48 bits")]
    SequenceExhausted,

    #[error("Unexpected message in state: {0:?}")]
    UnexpectedMessage(MessageType),

    #[error("Unexpected record content type: {0:?}")]
    UnexpectedContentType(ContentType),

    #[error("Record decryption failed")]
    DecryptFailed,

    #[error("Finished verify_data mismatch")]
    VerifyDataMismatch,

    #[error("Signature verification failed")]
    BadSignature,

    #[error("Peer public key rejected by trust store")]
    UntrustedPeer,

    #[error("Unknown PSK identity")]
    UnknownPskIdentity,

    #[error("No mutually supported cipher suite")]
    NoCommonCipherSuite,

    #[error("Crypto operation failed: {0}")]
    Crypto(String),

    #[error("Received fatal alert: {0:?}")]
    PeerAlert(AlertDescription),

    #[error("Missing local key material for the negotiated cipher suite")]
    MissingLocalKey,

    #[error("Missing pre-shared key for the negotiated cipher suite")]
    MissingPsk,

    #[error("No connection for this peer")]
    NotConnected,
}

impl Error {
    /// The alert to send to the peer when this error aborts a handshake.
    pub fn alert_description(&self) -> AlertDescription {
        match self {
            Error::ParseIncomplete | Error::Parse(_) => AlertDescription::DecodeError,
            Error::SequenceExhausted => AlertDescription::InternalError,
            Error::UnexpectedMessage(_) | Error::UnexpectedContentType(_) => {
                AlertDescription::UnexpectedMessage
            }
            Error::DecryptFailed => AlertDescription::BadRecordMac,
            Error::VerifyDataMismatch => AlertDescription::HandshakeFailure,
            Error::BadSignature => AlertDescription::DecryptError,
            Error::UntrustedPeer => AlertDescription::BadCertificate,
            Error::UnknownPskIdentity => AlertDescription::UnknownPskIdentity,
            Error::NoCommonCipherSuite => AlertDescription::HandshakeFailure,
            Error::Crypto(_) => AlertDescription::InternalError,
            Error::PeerAlert(_) => AlertDescription::CloseNotify,
            Error::MissingLocalKey | Error::MissingPsk => AlertDescription::HandshakeFailure,
            Error::NotConnected => AlertDescription::InternalError,
        }
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Error::ParseIncomplete,
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                Error::Parse(format!("{:?}", e.code))
            }
        }
    }
}
