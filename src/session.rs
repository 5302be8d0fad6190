use crate::cipher::{self, MessageDecrypter, MessageEncrypter};
use crate::error::TlsError;
use crate::hash_hs::HandshakeHash;
use crate::key;
use crate::msgs::deframer::MessageDeframer;
use crate::msgs::enums::{AlertDescription, AlertLevel, ContentType, HandshakeType};
use crate::msgs::enums::ProtocolVersion;
use crate::msgs::fragmenter::{MessageFragmenter, MAX_FRAGMENT_LEN};
use crate::msgs::hsjoiner::HandshakeJoiner;
use crate::msgs::codec::Codec;
use crate::msgs::message::{BorrowMessage, Message, MessagePayload};
use crate::prf;
use crate::suites::SupportedCipherSuite;

use log::{debug, warn};
use zeroize::Zeroize;

use std::collections::VecDeque;
use std::io;

/// A generic TLS endpoint: both `ClientSession` and `ServerSession`
/// implement this.
pub trait Session: io::Read + io::Write {
    /// Read TLS bytes taken from the peer into the session.
    fn read_tls(&mut self, rd: &mut dyn io::Read) -> io::Result<usize>;

    /// Write pending TLS bytes destined for the peer into `wr`.
    fn write_tls(&mut self, wr: &mut dyn io::Write) -> io::Result<usize>;

    /// Process TLS records buffered by `read_tls`: drives the
    /// handshake and decrypts application data.
    fn process_new_packets(&mut self) -> Result<(), TlsError>;

    fn wants_read(&self) -> bool;
    fn wants_write(&self) -> bool;
    fn is_handshaking(&self) -> bool;

    /// Queue a close_notify alert for the peer.
    fn send_close_notify(&mut self);

    /// The certificate chain the peer presented, if any yet.
    fn get_peer_certificates(&self) -> Option<Vec<key::Certificate>>;

    /// Pull the next queued event, if any.
    fn poll_event(&mut self) -> Option<TlsEvent>;
}

/// Things that happened inside the session that the owner may care
/// about, drained through `Session::poll_event`.
#[derive(Debug)]
pub enum TlsEvent {
    /// The peer presented this certificate chain.
    PeerCertificates(Vec<key::Certificate>),

    /// The handshake moved between states; for observability.
    StateChange {
        from: &'static str,
        to: &'static str,
    },

    /// The handshake completed; application data may now flow.
    Secure,
}

/// One direction of the record layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Side {
    Read,
    Write,
}

#[derive(Clone)]
pub struct SessionRandoms {
    pub we_are_client: bool,
    pub client_random: [u8; 32],
    pub server_random: [u8; 32],
}

impl SessionRandoms {
    pub fn for_server() -> SessionRandoms {
        SessionRandoms {
            we_are_client: false,
            client_random: [0u8; 32],
            server_random: [0u8; 32],
        }
    }

    pub fn for_client() -> SessionRandoms {
        let mut ret = SessionRandoms::for_server();
        ret.we_are_client = true;
        ret
    }
}

fn join_randoms(first: &[u8], second: &[u8]) -> [u8; 64] {
    let mut randoms = [0u8; 64];
    randoms[..32].copy_from_slice(first);
    randoms[32..].copy_from_slice(second);
    randoms
}

/// The master secret and everything derived from it, for one epoch.
pub struct SessionSecrets {
    pub randoms: SessionRandoms,
    pub suite: &'static SupportedCipherSuite,
    pub version: ProtocolVersion,
    master_secret: [u8; 48],
}

impl SessionSecrets {
    /// Compute the master secret from a premaster and both randoms.
    pub fn new(
        randoms: &SessionRandoms,
        suite: &'static SupportedCipherSuite,
        version: ProtocolVersion,
        premaster: &[u8],
    ) -> SessionSecrets {
        let mut ret = SessionSecrets {
            randoms: randoms.clone(),
            suite,
            version,
            master_secret: [0u8; 48],
        };

        let seed = join_randoms(&ret.randoms.client_random, &ret.randoms.server_random);
        prf::prf(
            &mut ret.master_secret,
            version,
            suite.hash,
            premaster,
            b"master secret",
            &seed,
        );

        ret
    }

    /// Expand the key block.  Note the seed swaps the random order
    /// relative to the master secret computation.
    pub fn make_key_block(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.suite.key_block_len()];

        let seed = join_randoms(&self.randoms.server_random, &self.randoms.client_random);
        prf::prf(
            &mut out,
            self.version,
            self.suite.hash,
            &self.master_secret,
            b"key expansion",
            &seed,
        );

        out
    }

    pub fn make_verify_data(&self, handshake_digest: &[u8], label: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; self.suite.verify_data_len()];

        prf::prf(
            &mut out,
            self.version,
            self.suite.hash,
            &self.master_secret,
            label,
            handshake_digest,
        );

        out
    }

    pub fn client_verify_data(&self, handshake_digest: &[u8]) -> Vec<u8> {
        self.make_verify_data(handshake_digest, b"client finished")
    }

    pub fn server_verify_data(&self, handshake_digest: &[u8]) -> Vec<u8> {
        self.make_verify_data(handshake_digest, b"server finished")
    }

    pub fn get_master_secret(&self) -> Vec<u8> {
        self.master_secret.to_vec()
    }
}

impl Drop for SessionSecrets {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

/// Plumbing common to client and server sessions: record layer state,
/// reassembly, buffering, and the read/write/pending cipher triangle.
pub struct SessionCommon {
    pub is_client: bool,
    pub negotiated_version: Option<ProtocolVersion>,
    pub suite: Option<&'static SupportedCipherSuite>,
    pub randoms: SessionRandoms,

    pub message_deframer: MessageDeframer,
    pub handshake_joiner: HandshakeJoiner,
    pub message_fragmenter: MessageFragmenter,

    /// Raw handshake bytes exchanged this epoch, hello_request
    /// excluded, in order.
    pub transcript: HandshakeHash,

    message_encrypter: Box<dyn MessageEncrypter>,
    message_decrypter: Box<dyn MessageDecrypter>,
    write_seq: u64,
    read_seq: u64,
    pub we_encrypting: bool,
    pub peer_encrypting: bool,

    /// Ciphers built at the first switch, waiting for their side to
    /// flip.
    pending_encrypter: Option<Box<dyn MessageEncrypter>>,
    pending_decrypter: Option<Box<dyn MessageDecrypter>>,

    /// Set by the key exchange, consumed by the first switch.
    premaster: Option<Vec<u8>>,

    /// Secrets of the epoch being established; set exactly once, at
    /// the first switch.
    pub secrets: Option<SessionSecrets>,

    /// The peer's expected Finished body, snapshotted when the read
    /// side switches.
    pub read_verify_expect: Option<Vec<u8>>,

    /// Handshake complete on both sides.
    pub traffic: bool,
    pub peer_eof: bool,

    sendable_plaintext: Vec<u8>,
    received_plaintext: Vec<u8>,
    sendable_tls: Vec<u8>,

    events: VecDeque<TlsEvent>,
}

impl SessionCommon {
    pub fn new(is_client: bool) -> SessionCommon {
        SessionCommon {
            is_client,
            negotiated_version: None,
            suite: None,
            randoms: if is_client {
                SessionRandoms::for_client()
            } else {
                SessionRandoms::for_server()
            },
            message_deframer: MessageDeframer::new(),
            handshake_joiner: HandshakeJoiner::new(),
            message_fragmenter: MessageFragmenter::new(MAX_FRAGMENT_LEN),
            transcript: HandshakeHash::new(),
            message_encrypter: <dyn MessageEncrypter>::invalid(),
            message_decrypter: <dyn MessageDecrypter>::invalid(),
            write_seq: 0,
            read_seq: 0,
            we_encrypting: false,
            peer_encrypting: false,
            pending_encrypter: None,
            pending_decrypter: None,
            premaster: None,
            secrets: None,
            read_verify_expect: None,
            traffic: false,
            peer_eof: false,
            sendable_plaintext: Vec::new(),
            received_plaintext: Vec::new(),
            sendable_tls: Vec::new(),
            events: VecDeque::new(),
        }
    }

    /// The version stamped into outgoing record headers.
    pub fn record_version(&self) -> ProtocolVersion {
        self.negotiated_version.unwrap_or(ProtocolVersion::TLSv1_0)
    }

    /// Once a version is negotiated, every record must carry it.
    pub fn check_record_version(&self, m: &Message) -> Result<(), TlsError> {
        match self.negotiated_version {
            Some(v) if m.version != v => Err(TlsError::UnsupportedVersion),
            _ => Ok(()),
        }
    }

    /// Stage the premaster secret for the first cipher switch.
    pub fn set_premaster(&mut self, premaster: Vec<u8>) {
        self.premaster = Some(premaster);
    }

    /// Both directions now run under the new keys.
    pub fn both_switched(&self) -> bool {
        self.we_encrypting && self.peer_encrypting
    }

    /// Flip one direction of the record layer onto the pending epoch.
    ///
    /// The first call computes the master secret (exactly once) and
    /// builds both directions' ciphers; each call then activates its
    /// side with a zeroed sequence counter.  Switching the read side
    /// also snapshots the verify data we expect in the peer's
    /// Finished, since that is the last point the transcript matches
    /// what the peer will have hashed.
    pub fn switch_to_pending(&mut self, side: Side) -> Result<(), TlsError> {
        if self.secrets.is_none() {
            let premaster = self
                .premaster
                .take()
                .ok_or_else(|| TlsError::General("no premaster staged".to_string()))?;
            let suite = self
                .suite
                .ok_or_else(|| TlsError::General("no suite negotiated".to_string()))?;
            let version = self
                .negotiated_version
                .ok_or_else(|| TlsError::General("no version negotiated".to_string()))?;

            let secrets = SessionSecrets::new(&self.randoms, suite, version, &premaster);
            let (dec, enc) = cipher::new_record_cipher_pair(suite, &secrets);
            self.pending_decrypter = Some(dec);
            self.pending_encrypter = Some(enc);
            self.secrets = Some(secrets);
        }

        match side {
            Side::Write => {
                self.message_encrypter = self
                    .pending_encrypter
                    .take()
                    .ok_or_else(|| TlsError::General("write side already switched".to_string()))?;
                self.write_seq = 0;
                self.we_encrypting = true;
            }
            Side::Read => {
                self.message_decrypter = self
                    .pending_decrypter
                    .take()
                    .ok_or_else(|| TlsError::General("read side already switched".to_string()))?;
                self.read_seq = 0;
                self.peer_encrypting = true;

                let secrets = self.secrets.as_ref().unwrap();
                let digest = self
                    .transcript
                    .transcript_digest(secrets.version, secrets.suite.hash);
                self.read_verify_expect = Some(if self.is_client {
                    secrets.server_verify_data(&digest)
                } else {
                    secrets.client_verify_data(&digest)
                });
            }
        }

        Ok(())
    }

    /// Both Finished messages have verified: retire this epoch's
    /// transcript and leave a fresh recording state for any
    /// successor.
    pub fn finish_handshake(&mut self) {
        debug_assert!(self.both_switched());
        self.transcript.clear();
        self.pending_encrypter = None;
        self.pending_decrypter = None;
        self.read_verify_expect = None;
    }

    pub fn decrypt_incoming(&mut self, msg: Message) -> Result<Message, TlsError> {
        let seq = self.read_seq;
        let dm = self.message_decrypter.decrypt(msg, seq)?;
        self.read_seq += 1;
        Ok(dm)
    }

    fn encrypt_outgoing(&mut self, plain: BorrowMessage) -> Result<Message, TlsError> {
        let seq = self.write_seq;
        let em = self.message_encrypter.encrypt(plain, seq)?;
        self.write_seq += 1;
        Ok(em)
    }

    /// Send a constructed message to the peer, fragmenting and
    /// encrypting as the write side requires.  Handshake messages
    /// (other than hello_request) enter the transcript here, with the
    /// exact bytes that go to the wire.
    pub fn send_msg(&mut self, m: Message) -> Result<(), TlsError> {
        if let MessagePayload::Handshake {
            ref parsed,
            ref encoded,
        } = m.payload
        {
            if parsed.typ != HandshakeType::HelloRequest {
                self.transcript.update_raw(&encoded.0);
            }
        }

        if !self.we_encrypting {
            let mut to_send = VecDeque::new();
            self.message_fragmenter.fragment(&m, &mut to_send);
            for m in to_send {
                self.queue_tls_message(m);
            }
        } else {
            let mut payload = Vec::new();
            m.payload.encode(&mut payload);

            for chunk in payload.chunks(MAX_FRAGMENT_LEN) {
                let em = self.encrypt_outgoing(BorrowMessage {
                    typ: m.typ,
                    version: m.version,
                    payload: chunk,
                })?;
                self.queue_tls_message(em);
            }
        }

        Ok(())
    }

    fn queue_tls_message(&mut self, m: Message) {
        m.encode(&mut self.sendable_tls);
    }

    /// Send plaintext application data, or buffer it if the
    /// handshake has not finished yet.
    pub fn send_plain(&mut self, data: &[u8]) -> Result<(), TlsError> {
        if !self.traffic {
            self.sendable_plaintext.extend_from_slice(data);
            return Ok(());
        }

        self.send_appdata(data)
    }

    fn send_appdata(&mut self, data: &[u8]) -> Result<(), TlsError> {
        for chunk in data.chunks(MAX_FRAGMENT_LEN) {
            let m = Message {
                typ: ContentType::ApplicationData,
                version: self.record_version(),
                payload: MessagePayload::opaque(chunk.to_vec()),
            };
            self.send_msg(m)?;
        }
        Ok(())
    }

    /// The handshake is complete on both sides; release any buffered
    /// application data.
    pub fn start_traffic(&mut self) -> Result<(), TlsError> {
        self.traffic = true;
        self.push_event(TlsEvent::Secure);

        let buffered = std::mem::take(&mut self.sendable_plaintext);
        if !buffered.is_empty() {
            self.send_appdata(&buffered)?;
        }
        Ok(())
    }

    pub fn take_received_plaintext(&mut self, bytes: &[u8]) {
        self.received_plaintext.extend_from_slice(bytes);
    }

    pub fn has_readable_plaintext(&self) -> bool {
        !self.received_plaintext.is_empty()
    }

    pub fn send_warning_alert(&mut self, desc: AlertDescription) {
        warn!("sending warning alert {:?}", desc);
        let m = Message::build_alert(self.record_version(), AlertLevel::Warning, desc);
        let _ = self.send_msg(m);
    }

    pub fn send_fatal_alert(&mut self, desc: AlertDescription) {
        warn!("sending fatal alert {:?}", desc);
        let m = Message::build_alert(self.record_version(), AlertLevel::Fatal, desc);
        let _ = self.send_msg(m);
    }

    /// Handle a decoded alert record.  Warnings other than
    /// close_notify are tolerated; close_notify closes cleanly.
    pub fn process_alert(&mut self, msg: Message) -> Result<(), TlsError> {
        if let MessagePayload::Alert(ref alert) = msg.payload {
            if alert.description == AlertDescription::CloseNotify {
                debug!("peer sent close_notify");
                self.peer_eof = true;
                return Ok(());
            }

            if alert.level == AlertLevel::Warning {
                warn!("peer sent warning alert {:?}, ignoring", alert.description);
                return Ok(());
            }

            Err(TlsError::AlertReceived(alert.description))
        } else {
            Err(TlsError::CorruptMessagePayload(ContentType::Alert))
        }
    }

    pub fn push_event(&mut self, ev: TlsEvent) {
        self.events.push_back(ev);
    }

    pub fn pop_event(&mut self) -> Option<TlsEvent> {
        self.events.pop_front()
    }

    pub fn read_tls(&mut self, rd: &mut dyn io::Read) -> io::Result<usize> {
        self.message_deframer.read(rd)
    }

    pub fn write_tls(&mut self, wr: &mut dyn io::Write) -> io::Result<usize> {
        if self.sendable_tls.is_empty() {
            return Ok(0);
        }

        let len = wr.write(&self.sendable_tls)?;
        self.sendable_tls.drain(..len);
        Ok(len)
    }

    pub fn wants_write(&self) -> bool {
        !self.sendable_tls.is_empty()
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = std::cmp::min(buf.len(), self.received_plaintext.len());
        buf[..len].copy_from_slice(&self.received_plaintext[..len]);
        self.received_plaintext.drain(..len);
        Ok(len)
    }
}
