use crate::msgs::enums::{AlertDescription, ContentType, HandshakeType};

use std::error::Error;
use std::fmt;

/// The crate reports protocol errors using this type.  Every variant
/// the core raises itself maps onto the TLS alert description sent to
/// the peer before the connection is abandoned.
#[derive(Debug, Clone, PartialEq)]
pub enum TlsError {
    /// We received a TLS message that isn't valid right now.
    /// `expect_types` lists the content types acceptable right now.
    InappropriateMessage {
        expect_types: Vec<ContentType>,
        got_type: ContentType,
    },

    /// We received a handshake message that isn't valid right now.
    InappropriateHandshakeMessage {
        expect_types: Vec<HandshakeType>,
        got_type: HandshakeType,
    },

    /// A record arrived after the peer switched ciphers which cannot
    /// possibly be a ciphertext of the negotiated suite.
    UnexpectedPlaintext,

    /// The peer sent a syntactically incorrect message.
    CorruptMessage,

    /// The peer sent a message with invalid contents.
    CorruptMessagePayload(ContentType),

    /// A field held a value the protocol does not allow here.
    IllegalParameter(&'static str),

    /// A record exceeded 2^14 + 2048 bytes.
    PeerSentOversizedRecord,

    /// Record deprotection failed.  This is invariably fatal.
    DecryptError,

    /// No cipher suite was acceptable to both peers.
    NoSuitableCipherSuite,

    /// The peer talks the protocol, but not a variant we can use.
    PeerIncompatibleError(String),

    /// The peer used a protocol version we do not accept, or changed
    /// record versions mid-connection.
    UnsupportedVersion,

    /// The peer's certificate message was unusable.
    InvalidCertificate(&'static str),

    /// A handshake signature or verify-data check failed.
    InvalidHandshakeProof,

    /// We received a fatal alert, meaning the peer is unhappy.
    AlertReceived(AlertDescription),

    /// A catch-all for unlikely local failures.
    General(String),
}

impl TlsError {
    /// The alert we send to the peer when failing with this error,
    /// or None when no alert is appropriate (the peer already gave
    /// up on us).
    pub fn to_alert(&self) -> Option<AlertDescription> {
        match *self {
            TlsError::InappropriateMessage { .. }
            | TlsError::InappropriateHandshakeMessage { .. }
            | TlsError::UnexpectedPlaintext => Some(AlertDescription::UnexpectedMessage),
            TlsError::CorruptMessage | TlsError::CorruptMessagePayload(_) => {
                Some(AlertDescription::DecodeError)
            }
            TlsError::IllegalParameter(_) => Some(AlertDescription::IllegalParameter),
            TlsError::PeerSentOversizedRecord => Some(AlertDescription::RecordOverflow),
            TlsError::DecryptError => Some(AlertDescription::BadRecordMac),
            TlsError::NoSuitableCipherSuite | TlsError::PeerIncompatibleError(_) => {
                Some(AlertDescription::HandshakeFailure)
            }
            TlsError::UnsupportedVersion => Some(AlertDescription::ProtocolVersion),
            TlsError::InvalidCertificate(_) => Some(AlertDescription::BadCertificate),
            TlsError::InvalidHandshakeProof => Some(AlertDescription::DecryptError),
            TlsError::AlertReceived(_) => None,
            TlsError::General(_) => Some(AlertDescription::InternalError),
        }
    }
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TlsError::InappropriateMessage {
                ref expect_types,
                ref got_type,
            } => write!(
                f,
                "received unexpected message: got {:?} when expecting {:?}",
                got_type, expect_types
            ),
            TlsError::InappropriateHandshakeMessage {
                ref expect_types,
                ref got_type,
            } => write!(
                f,
                "received unexpected handshake message: got {:?} when expecting {:?}",
                got_type, expect_types
            ),
            TlsError::UnexpectedPlaintext => write!(f, "plaintext record after cipher change"),
            TlsError::CorruptMessage => write!(f, "received corrupt message"),
            TlsError::CorruptMessagePayload(typ) => {
                write!(f, "received corrupt message of type {:?}", typ)
            }
            TlsError::IllegalParameter(what) => write!(f, "illegal parameter: {}", what),
            TlsError::PeerSentOversizedRecord => write!(f, "peer sent oversized record"),
            TlsError::DecryptError => write!(f, "cannot decrypt peer's message"),
            TlsError::NoSuitableCipherSuite => write!(f, "no mutually acceptable cipher suite"),
            TlsError::PeerIncompatibleError(ref why) => write!(f, "peer incompatible: {}", why),
            TlsError::UnsupportedVersion => write!(f, "unsupported protocol version"),
            TlsError::InvalidCertificate(why) => write!(f, "invalid peer certificate: {}", why),
            TlsError::InvalidHandshakeProof => write!(f, "handshake verification failed"),
            TlsError::AlertReceived(alert) => write!(f, "received fatal alert: {:?}", alert),
            TlsError::General(ref why) => write!(f, "unexpected error: {}", why),
        }
    }
}

impl Error for TlsError {}

#[cfg(test)]
mod tests {
    use super::TlsError;
    use crate::msgs::enums::AlertDescription;

    #[test]
    fn alerts_match_taxonomy() {
        assert_eq!(
            TlsError::DecryptError.to_alert(),
            Some(AlertDescription::BadRecordMac)
        );
        assert_eq!(
            TlsError::PeerSentOversizedRecord.to_alert(),
            Some(AlertDescription::RecordOverflow)
        );
        assert_eq!(
            TlsError::UnsupportedVersion.to_alert(),
            Some(AlertDescription::ProtocolVersion)
        );
        assert_eq!(
            TlsError::NoSuitableCipherSuite.to_alert(),
            Some(AlertDescription::HandshakeFailure)
        );
        assert_eq!(
            TlsError::AlertReceived(AlertDescription::CloseNotify).to_alert(),
            None
        );
    }
}
