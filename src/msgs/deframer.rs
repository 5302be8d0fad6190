use std::collections::VecDeque;
use std::io;

use crate::error::TlsError;
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::ContentType;
use crate::msgs::message::{HeaderFault, Message};

const HEADER_SIZE: usize = 1 + 2 + 2;

/// This deframes TLS records from an arbitrarily-chopped byte stream:
/// bytes buffer until a whole record is present, then it appears on
/// `frames`.
pub struct MessageDeframer {
    /// Completed records for the caller to process.
    pub frames: VecDeque<Message>,

    /// Set once the stream is hopeless: the header of the next record
    /// was unacceptable.  Sticky.
    pub desynced: Option<TlsError>,

    /// A fixed-size read staging buffer.
    chunk: Box<[u8; 4096]>,

    /// Accumulates bytes until they make at least one record.
    buf: Vec<u8>,
}

impl MessageDeframer {
    pub fn new() -> MessageDeframer {
        MessageDeframer {
            frames: VecDeque::new(),
            desynced: None,
            chunk: Box::new([0u8; 4096]),
            buf: Vec::new(),
        }
    }

    /// Read some bytes from `rd`, and add them to our internal
    /// buffer, deframing as many records as now fit.
    pub fn read(&mut self, rd: &mut dyn io::Read) -> io::Result<usize> {
        let len = rd.read(&mut self.chunk[..])?;
        self.buf.extend_from_slice(&self.chunk[..len]);

        while self.desynced.is_none() && self.buf_contains_message() {
            self.deframe_one();
        }

        Ok(len)
    }

    pub fn has_pending(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Does our `buf` contain a full record?  A broken header also
    /// counts: deframe_one will turn it into `desynced`.
    fn buf_contains_message(&mut self) -> bool {
        if self.buf.len() < HEADER_SIZE {
            return false;
        }

        match Message::check_header(&self.buf) {
            Some(Ok(len)) => self.buf.len() >= len + HEADER_SIZE,
            Some(Err(fault)) => {
                self.desynced = Some(header_fault_error(fault));
                false
            }
            None => false,
        }
    }

    fn deframe_one(&mut self) {
        let used = {
            let mut rd = Reader::init(&self.buf);
            let m = Message::read(&mut rd).unwrap();
            self.frames.push_back(m);
            rd.used()
        };
        self.buf.drain(..used);
    }
}

fn header_fault_error(fault: HeaderFault) -> TlsError {
    match fault {
        HeaderFault::UnknownType(got) => TlsError::InappropriateMessage {
            expect_types: vec![
                ContentType::ChangeCipherSpec,
                ContentType::Alert,
                ContentType::Handshake,
                ContentType::ApplicationData,
            ],
            got_type: got,
        },
        HeaderFault::BadVersion => TlsError::CorruptMessage,
        HeaderFault::Oversized => TlsError::PeerSentOversizedRecord,
    }
}

#[cfg(test)]
mod tests {
    use super::MessageDeframer;
    use crate::error::TlsError;
    use crate::msgs::enums::ContentType;
    use std::io;

    const HELLO_REQUEST: &[u8] = b"\x16\x03\x01\x00\x04\x00\x00\x00\x00";
    const FATAL_ALERT: &[u8] = b"\x15\x03\x03\x00\x02\x02\x6e";

    fn input_bytes(d: &mut MessageDeframer, bytes: &[u8]) -> io::Result<usize> {
        let mut rd = io::Cursor::new(bytes);
        d.read(&mut rd)
    }

    #[test]
    fn incremental_single_byte_arrival() {
        let mut d = MessageDeframer::new();

        for (i, b) in HELLO_REQUEST.iter().enumerate() {
            assert_eq!(input_bytes(&mut d, &[*b]).unwrap(), 1);

            if i < HELLO_REQUEST.len() - 1 {
                assert!(d.frames.is_empty());
            }
        }

        assert_eq!(d.frames.len(), 1);
        assert_eq!(d.frames.pop_front().unwrap().typ, ContentType::Handshake);
    }

    #[test]
    fn coalesced_arrival() {
        let mut d = MessageDeframer::new();
        let mut joined = HELLO_REQUEST.to_vec();
        joined.extend_from_slice(FATAL_ALERT);

        assert_eq!(input_bytes(&mut d, &joined).unwrap(), joined.len());
        assert_eq!(d.frames.len(), 2);
        assert_eq!(d.frames.pop_front().unwrap().typ, ContentType::Handshake);
        assert_eq!(d.frames.pop_front().unwrap().typ, ContentType::Alert);
    }

    #[test]
    fn unknown_content_type_desyncs() {
        let mut d = MessageDeframer::new();
        input_bytes(&mut d, b"\x63\x03\x01\x00\x01\x00").unwrap();

        match d.desynced {
            Some(TlsError::InappropriateMessage { got_type, .. }) => {
                assert_eq!(got_type, ContentType::Unknown(0x63));
            }
            ref other => panic!("wrong desync: {:?}", other),
        }
    }

    #[test]
    fn oversized_record_desyncs() {
        let mut d = MessageDeframer::new();
        // length 0x4801 = 16384 + 2048 + 1
        input_bytes(&mut d, b"\x17\x03\x03\x48\x01").unwrap();

        assert!(matches!(d.desynced, Some(TlsError::PeerSentOversizedRecord)));
    }
}
