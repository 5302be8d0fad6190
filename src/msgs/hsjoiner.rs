use std::collections::VecDeque;

use crate::msgs::codec;
use crate::msgs::enums::{ContentType, ProtocolVersion};
use crate::msgs::handshake::HandshakeMessagePayload;
use crate::msgs::message::{Message, MessagePayload};

const HEADER_SIZE: usize = 1 + 3;

/// This reconstructs handshake messages from record fragments:
/// messages may span records, and records may hold several messages.
/// Messages output from this layer contain precisely one handshake
/// payload, along with the exact bytes it was reassembled from.
pub struct HandshakeJoiner {
    /// Completed handshake frames for output.
    pub frames: VecDeque<Message>,

    /// The handshake-layer bytes we are accumulating.
    buf: Vec<u8>,
}

impl HandshakeJoiner {
    pub fn new() -> HandshakeJoiner {
        HandshakeJoiner {
            frames: VecDeque::new(),
            buf: Vec::new(),
        }
    }

    /// Do we want to process this message?
    pub fn want_message(&self, msg: &Message) -> bool {
        msg.is_content_type(ContentType::Handshake)
    }

    /// Do we have any buffered data?
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Take the message, joining and splitting as needed.  Returns
    /// None if the stream is corrupt beyond recovery, otherwise a
    /// count of how many complete messages were queued.
    pub fn take_message(&mut self, mut msg: Message) -> Option<usize> {
        // The payload must be opaque: anything else means somebody
        // already decoded it, losing the raw bytes.
        let payload = msg.take_opaque_payload().unwrap();
        self.buf.extend_from_slice(&payload.0);

        let mut count = 0;
        while self.buf_contains_message() {
            if !self.deframe_one(msg.version) {
                return None;
            }

            count += 1;
        }

        Some(count)
    }

    /// Does our `buf` contain a full handshake message?  It does if
    /// it is big enough to contain a header whose length falls
    /// within `buf`.
    fn buf_contains_message(&self) -> bool {
        self.buf.len() >= HEADER_SIZE
            && self.buf.len()
                >= (codec::decode_u24(&self.buf[1..4]).unwrap() as usize) + HEADER_SIZE
    }

    /// Take one handshake message off the front of `buf`, and put it
    /// onto the back of `frames`, keeping hold of the raw bytes.
    ///
    /// Returns false if the message is unparseable.
    fn deframe_one(&mut self, version: ProtocolVersion) -> bool {
        let used = {
            let mut rd = codec::Reader::init(&self.buf);
            let parsed = match HandshakeMessagePayload::read_version(&mut rd, version) {
                Some(p) => p,
                None => return false,
            };

            let used = rd.used();
            self.frames.push_back(Message {
                typ: ContentType::Handshake,
                version,
                payload: MessagePayload::Handshake {
                    parsed,
                    encoded: crate::msgs::base::Payload(self.buf[..used].to_vec()),
                },
            });
            used
        };
        self.buf.drain(..used);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::HandshakeJoiner;
    use crate::msgs::base::Payload;
    use crate::msgs::enums::{ContentType, HandshakeType, ProtocolVersion};
    use crate::msgs::message::{Message, MessagePayload};

    fn opaque_handshake(bytes: &[u8]) -> Message {
        Message {
            typ: ContentType::Handshake,
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::opaque(bytes.to_vec()),
        }
    }

    fn pop_type_and_raw(hj: &mut HandshakeJoiner) -> (HandshakeType, Vec<u8>) {
        let got = hj.frames.pop_front().unwrap();
        match got.payload {
            MessagePayload::Handshake { parsed, encoded } => (parsed.typ, encoded.0),
            _ => panic!("non-handshake frame"),
        }
    }

    #[test]
    fn want() {
        let hj = HandshakeJoiner::new();
        assert!(hj.is_empty());

        assert!(hj.want_message(&opaque_handshake(b"hello world")));
        assert!(!hj.want_message(&Message {
            typ: ContentType::Alert,
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::opaque(b"ponytown".to_vec()),
        }));
    }

    #[test]
    fn split() {
        // Two HelloRequests within one record.
        let mut hj = HandshakeJoiner::new();
        let msg = opaque_handshake(b"\x00\x00\x00\x00\x00\x00\x00\x00");

        assert_eq!(hj.take_message(msg), Some(2));
        assert!(hj.is_empty());

        for _ in 0..2 {
            let (typ, raw) = pop_type_and_raw(&mut hj);
            assert_eq!(typ, HandshakeType::HelloRequest);
            assert_eq!(raw, b"\x00\x00\x00\x00".to_vec());
        }
    }

    #[test]
    fn broken() {
        // Obvious crap payloads are errors, not panics.
        let mut hj = HandshakeJoiner::new();
        let msg = opaque_handshake(b"\x01\x00\x00\x02\xff\xff");
        assert_eq!(hj.take_message(msg), None);
    }

    #[test]
    fn join() {
        // One Finished split over three records.
        let mut hj = HandshakeJoiner::new();

        assert_eq!(
            hj.take_message(opaque_handshake(b"\x14\x00\x00\x0c\x00\x01\x02\x03")),
            Some(0)
        );
        assert!(!hj.is_empty());

        assert_eq!(
            hj.take_message(opaque_handshake(b"\x04\x05\x06\x07\x08\x09\x0a")),
            Some(0)
        );

        assert_eq!(hj.take_message(opaque_handshake(b"\x0b")), Some(1));
        assert!(hj.is_empty());

        let (typ, raw) = pop_type_and_raw(&mut hj);
        assert_eq!(typ, HandshakeType::Finished);
        assert_eq!(
            raw,
            b"\x14\x00\x00\x0c\x00\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b".to_vec()
        );

        // and the body survived too
        let mut hj = HandshakeJoiner::new();
        hj.take_message(opaque_handshake(
            b"\x14\x00\x00\x0c\x00\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b",
        ));
        let got = hj.frames.pop_front().unwrap();
        if let MessagePayload::Handshake { parsed, .. } = got.payload {
            match parsed.payload {
                crate::msgs::handshake::HandshakePayload::Finished(Payload(body)) => {
                    assert_eq!(body, b"\x00\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b".to_vec());
                }
                _ => panic!("wrong payload"),
            }
        } else {
            panic!("wrong frame");
        }
    }
}
