use crate::error::TlsError;
use crate::msgs::enums::{ContentType, HandshakeType};
use crate::msgs::message::{Message, MessagePayload};

/// The acceptance grammar for one handshake state: which content
/// types, and which handshake types within them, may arrive now.
pub struct Expectation {
    pub content_types: &'static [ContentType],
    pub handshake_types: &'static [HandshakeType],
}

impl Expectation {
    pub fn check_message(&self, m: &Message) -> Result<(), TlsError> {
        if !self.content_types.contains(&m.typ) {
            return Err(TlsError::InappropriateMessage {
                expect_types: self.content_types.to_vec(),
                got_type: m.typ,
            });
        }

        if let MessagePayload::Handshake { ref parsed, .. } = m.payload {
            if !self.handshake_types.is_empty() && !self.handshake_types.contains(&parsed.typ) {
                return Err(TlsError::InappropriateHandshakeMessage {
                    expect_types: self.handshake_types.to_vec(),
                    got_type: parsed.typ,
                });
            }
        }

        Ok(())
    }
}

/// What a per-state handler made of its frame.  `Skip` means the
/// frame belongs to a later state because an optional message did
/// not appear: the driving loop advances and re-dispatches the same
/// frame there.
pub enum HandleOutcome<S> {
    Accepted(S),
    Skip(S),
}

#[cfg(test)]
mod tests {
    use super::Expectation;
    use crate::error::TlsError;
    use crate::msgs::enums::{ContentType, HandshakeType, ProtocolVersion};
    use crate::msgs::handshake::{HandshakeMessagePayload, HandshakePayload};
    use crate::msgs::message::{Message, MessagePayload};

    fn hello_request() -> Message {
        Message {
            typ: ContentType::Handshake,
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::handshake(HandshakeMessagePayload {
                typ: HandshakeType::HelloRequest,
                payload: HandshakePayload::HelloRequest,
            }),
        }
    }

    #[test]
    fn wrong_content_type_is_inappropriate() {
        let expect = Expectation {
            content_types: &[ContentType::ApplicationData],
            handshake_types: &[],
        };

        match expect.check_message(&hello_request()) {
            Err(TlsError::InappropriateMessage { got_type, .. }) => {
                assert_eq!(got_type, ContentType::Handshake)
            }
            _ => panic!("expected InappropriateMessage"),
        }
    }

    #[test]
    fn wrong_handshake_type_is_inappropriate() {
        let expect = Expectation {
            content_types: &[ContentType::Handshake],
            handshake_types: &[HandshakeType::Finished],
        };

        match expect.check_message(&hello_request()) {
            Err(TlsError::InappropriateHandshakeMessage { got_type, .. }) => {
                assert_eq!(got_type, HandshakeType::HelloRequest)
            }
            _ => panic!("expected InappropriateHandshakeMessage"),
        }
    }
}
