use crate::msgs::alert::AlertMessagePayload;
use crate::msgs::base::Payload;
use crate::msgs::ccs::ChangeCipherSpecPayload;
use crate::msgs::codec::{encode_u16, read_u16, Codec, Reader};
use crate::msgs::enums::{AlertDescription, AlertLevel, ContentType, HandshakeType};
use crate::msgs::enums::ProtocolVersion;
use crate::msgs::handshake::HandshakeMessagePayload;

use std::mem;

#[derive(Debug, Clone)]
pub enum MessagePayload {
    Alert(AlertMessagePayload),
    /// A reassembled handshake message: the typed decode alongside the
    /// exact bytes it was decoded from, so the transcript can record
    /// what was actually on the wire.
    Handshake {
        parsed: HandshakeMessagePayload,
        encoded: Payload,
    },
    ChangeCipherSpec(ChangeCipherSpecPayload),
    Opaque(Payload),
}

impl MessagePayload {
    pub fn encode(&self, bytes: &mut Vec<u8>) {
        match *self {
            MessagePayload::Alert(ref x) => x.encode(bytes),
            MessagePayload::Handshake { ref encoded, .. } => encoded.encode(bytes),
            MessagePayload::ChangeCipherSpec(ref x) => x.encode(bytes),
            MessagePayload::Opaque(ref x) => x.encode(bytes),
        }
    }

    pub fn handshake(parsed: HandshakeMessagePayload) -> MessagePayload {
        let encoded = Payload(parsed.get_encoding());
        MessagePayload::Handshake { parsed, encoded }
    }

    pub fn decode_given_type(
        &self,
        typ: ContentType,
        version: ProtocolVersion,
    ) -> Option<MessagePayload> {
        if let MessagePayload::Opaque(ref payload) = *self {
            let mut r = Reader::init(&payload.0);
            let parsed = match typ {
                ContentType::Alert => {
                    MessagePayload::Alert(try_ret!(AlertMessagePayload::read(&mut r)))
                }
                ContentType::Handshake => {
                    let parsed = try_ret!(HandshakeMessagePayload::read_version(&mut r, version));
                    MessagePayload::Handshake {
                        parsed,
                        encoded: payload.clone(),
                    }
                }
                ContentType::ChangeCipherSpec => {
                    MessagePayload::ChangeCipherSpec(try_ret!(ChangeCipherSpecPayload::read(&mut r)))
                }
                _ => return None,
            };

            if r.any_left() {
                None
            } else {
                Some(parsed)
            }
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        match *self {
            MessagePayload::Alert(ref x) => x.len(),
            MessagePayload::Handshake { ref encoded, .. } => encoded.len(),
            MessagePayload::ChangeCipherSpec(ref x) => x.len(),
            MessagePayload::Opaque(ref x) => x.len(),
        }
    }

    pub fn opaque(data: Vec<u8>) -> MessagePayload {
        MessagePayload::Opaque(Payload::new(data))
    }
}

/// A TLS frame, named TLSPlaintext in the standard.
#[derive(Debug, Clone)]
pub struct Message {
    pub typ: ContentType,
    pub version: ProtocolVersion,
    pub payload: MessagePayload,
}

/// Maximum record payload we will accept: expansion allows the
/// ciphertext to exceed the 2^14 plaintext limit.
pub const MAX_WIRE_PAYLOAD: usize = 16384 + 2048;

impl Codec for Message {
    fn read(r: &mut Reader) -> Option<Message> {
        let typ = try_ret!(ContentType::read(r));
        let version = try_ret!(ProtocolVersion::read(r));
        let len = try_ret!(read_u16(r));

        let mut sub = try_ret!(r.sub(len as usize));
        let payload = try_ret!(Payload::read(&mut sub));

        Some(Message {
            typ,
            version,
            payload: MessagePayload::Opaque(payload),
        })
    }

    fn encode(&self, bytes: &mut Vec<u8>) {
        self.typ.encode(bytes);
        self.version.encode(bytes);
        encode_u16(self.payload.len() as u16, bytes);
        self.payload.encode(bytes);
    }
}

pub enum HeaderFault {
    /// An unrecognised content type.
    UnknownType(ContentType),
    /// A version field outside the 0x03XX family.
    BadVersion,
    /// A length beyond 2^14 + 2048.
    Oversized,
}

impl Message {
    /// Check a 5-byte record header and return the body length it
    /// promises, or the way in which it is unacceptable.
    pub fn check_header(bytes: &[u8]) -> Option<Result<usize, HeaderFault>> {
        let mut rd = Reader::init(bytes);

        let typ = try_ret!(ContentType::read(&mut rd));
        let version = try_ret!(ProtocolVersion::read(&mut rd));
        let len = try_ret!(read_u16(&mut rd)) as usize;

        if let ContentType::Unknown(_) = typ {
            return Some(Err(HeaderFault::UnknownType(typ)));
        }

        if !version.is_tls_family() {
            return Some(Err(HeaderFault::BadVersion));
        }

        if len > MAX_WIRE_PAYLOAD {
            return Some(Err(HeaderFault::Oversized));
        }

        Some(Ok(len))
    }

    pub fn is_content_type(&self, typ: ContentType) -> bool {
        self.typ == typ
    }

    pub fn is_handshake_type(&self, hstyp: HandshakeType) -> bool {
        if let MessagePayload::Handshake { ref parsed, .. } = self.payload {
            parsed.typ == hstyp
        } else {
            false
        }
    }

    pub fn decode_payload(&mut self, version: ProtocolVersion) -> bool {
        // ApplicationData is never decoded further.
        if self.typ == ContentType::ApplicationData {
            return true;
        }

        if let Some(x) = self.payload.decode_given_type(self.typ, version) {
            self.payload = x;
            true
        } else {
            false
        }
    }

    pub fn take_opaque_payload(&mut self) -> Option<Payload> {
        if let MessagePayload::Opaque(ref mut op) = self.payload {
            Some(mem::replace(op, Payload::empty()))
        } else {
            None
        }
    }

    pub fn get_opaque_payload(&self) -> Option<&Payload> {
        if let MessagePayload::Opaque(ref op) = self.payload {
            Some(op)
        } else {
            None
        }
    }

    pub fn into_opaque(self) -> Message {
        if let MessagePayload::Opaque(_) = self.payload {
            return self;
        }

        let mut buf = Vec::new();
        self.payload.encode(&mut buf);

        Message {
            typ: self.typ,
            version: self.version,
            payload: MessagePayload::opaque(buf),
        }
    }

    pub fn build_alert(version: ProtocolVersion, level: AlertLevel, desc: AlertDescription) -> Message {
        Message {
            typ: ContentType::Alert,
            version,
            payload: MessagePayload::Alert(AlertMessagePayload {
                level,
                description: desc,
            }),
        }
    }
}

/// A borrowed version of `Message`: a record whose body has already
/// been serialized, about to pass through record protection.
pub struct BorrowMessage<'a> {
    pub typ: ContentType,
    pub version: ProtocolVersion,
    pub payload: &'a [u8],
}
