use crate::msgs::message::{Message, MessagePayload};
use std::collections::VecDeque;

/// TLS plaintext fragments may not exceed 2^14 bytes.
pub const MAX_FRAGMENT_LEN: usize = 16384;
pub const PACKET_OVERHEAD: usize = 1 + 2 + 2;

pub struct MessageFragmenter {
    max_frag: usize,
}

impl MessageFragmenter {
    pub fn new(max_fragment_len: usize) -> MessageFragmenter {
        assert!(max_fragment_len <= MAX_FRAGMENT_LEN);
        MessageFragmenter {
            max_frag: max_fragment_len,
        }
    }

    /// Take `msg` and re-fragment it into new messages whose bodies
    /// are no more than max_frag.  The new messages are appended to
    /// the `out` deque.
    pub fn fragment(&self, msg: &Message, out: &mut VecDeque<Message>) {
        let mut payload = Vec::new();
        msg.payload.encode(&mut payload);

        for chunk in payload.chunks(self.max_frag) {
            out.push_back(Message {
                typ: msg.typ,
                version: msg.version,
                payload: MessagePayload::opaque(chunk.to_vec()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MessageFragmenter, PACKET_OVERHEAD};
    use crate::msgs::codec::Codec;
    use crate::msgs::enums::{ContentType, ProtocolVersion};
    use crate::msgs::message::{Message, MessagePayload};
    use std::collections::VecDeque;

    fn msg_eq(
        mm: Option<Message>,
        total_len: usize,
        typ: ContentType,
        version: ProtocolVersion,
        bytes: &[u8],
    ) {
        let m = mm.unwrap();

        assert_eq!(m.typ, typ);
        assert_eq!(m.version, version);
        assert_eq!(m.get_opaque_payload().unwrap().0.clone(), bytes.to_vec());

        let mut buf = Vec::new();
        m.encode(&mut buf);
        assert_eq!(total_len, buf.len());
    }

    #[test]
    fn smoke() {
        let m = Message {
            typ: ContentType::ApplicationData,
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::opaque(b"\x01\x02\x03\x04\x05\x06\x07\x08".to_vec()),
        };

        let frag = MessageFragmenter::new(3);
        let mut q = VecDeque::new();
        frag.fragment(&m, &mut q);
        msg_eq(q.pop_front(), PACKET_OVERHEAD + 3, m.typ, m.version, b"\x01\x02\x03");
        msg_eq(q.pop_front(), PACKET_OVERHEAD + 3, m.typ, m.version, b"\x04\x05\x06");
        msg_eq(q.pop_front(), PACKET_OVERHEAD + 2, m.typ, m.version, b"\x07\x08");
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn short_message_is_untouched() {
        let m = Message {
            typ: ContentType::Handshake,
            version: ProtocolVersion::TLSv1_0,
            payload: MessagePayload::opaque(b"hello".to_vec()),
        };

        let frag = MessageFragmenter::new(super::MAX_FRAGMENT_LEN);
        let mut q = VecDeque::new();
        frag.fragment(&m, &mut q);
        msg_eq(q.pop_front(), PACKET_OVERHEAD + 5, m.typ, m.version, b"hello");
        assert_eq!(q.len(), 0);
    }
}
