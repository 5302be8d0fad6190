use crate::client_hs;
use crate::error::TlsError;
use crate::handshake::HandleOutcome;
use crate::key;
use crate::msgs::enums::{AlertDescription, ContentType, HandshakeType, ProtocolVersion};
use crate::msgs::handshake::{CertificatePayload, ServerECDHParams};
use crate::msgs::message::{Message, MessagePayload};
use crate::session::{Session, SessionCommon, TlsEvent};
use crate::suites::{SupportedCipherSuite, ALL_CIPHERSUITES};

use rsa::RsaPublicKey;

use std::io;
use std::sync::Arc;

/// Common configuration for all connections made by a client.
///
/// Making one is cheap here, but treat it as once-per-process anyway:
/// it is shared by `Arc`.
pub struct ClientConfig {
    /// List of cipher suites we offer, in preference order.
    pub ciphersuites: Vec<&'static SupportedCipherSuite>,

    /// The lowest protocol version we accept.
    pub min_version: ProtocolVersion,

    /// The highest protocol version we offer.
    pub max_version: ProtocolVersion,
}

impl ClientConfig {
    pub fn new() -> ClientConfig {
        ClientConfig {
            ciphersuites: ALL_CIPHERSUITES.to_vec(),
            min_version: ProtocolVersion::TLSv1_0,
            max_version: ProtocolVersion::TLSv1_2,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig::new()
    }
}

pub struct ClientHandshakeData {
    pub server_cert_chain: CertificatePayload,
    pub server_public_key: Option<RsaPublicKey>,
    pub server_ecdh_params: Option<ServerECDHParams>,

    /// The version we put in our ClientHello; the RSA premaster
    /// must repeat it.
    pub offered_version: ProtocolVersion,

    pub certreq_received: bool,
}

impl ClientHandshakeData {
    fn new(offered_version: ProtocolVersion) -> ClientHandshakeData {
        ClientHandshakeData {
            server_cert_chain: Vec::new(),
            server_public_key: None,
            server_ecdh_params: None,
            offered_version,
            certreq_received: false,
        }
    }
}

/// The client's wait states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnState {
    ExpectServerHello,
    ExpectCertificate,
    ExpectServerKx,
    ExpectCertificateRequest,
    ExpectServerHelloDone,
    ExpectCCS,
    ExpectFinished,
    Traffic,
}

impl ConnState {
    pub fn name(&self) -> &'static str {
        match *self {
            ConnState::ExpectServerHello => "hello",
            ConnState::ExpectCertificate => "certificate",
            ConnState::ExpectServerKx => "ecdheKeyExchange",
            ConnState::ExpectCertificateRequest => "certReq",
            ConnState::ExpectServerHelloDone => "helloDone",
            ConnState::ExpectCCS | ConnState::ExpectFinished => "finished",
            ConnState::Traffic => "none",
        }
    }
}

pub struct ClientSessionImpl {
    pub config: Arc<ClientConfig>,
    pub handshake_data: ClientHandshakeData,
    pub common: SessionCommon,
    pub state: ConnState,
    pub fatal_error: Option<TlsError>,
}

impl ClientSessionImpl {
    pub fn new(config: &Arc<ClientConfig>) -> ClientSessionImpl {
        let mut sess = ClientSessionImpl {
            config: config.clone(),
            handshake_data: ClientHandshakeData::new(config.max_version),
            common: SessionCommon::new(true),
            state: ConnState::ExpectServerHello,
            fatal_error: None,
        };

        client_hs::emit_client_hello(&mut sess);
        sess
    }

    pub fn wants_read(&self) -> bool {
        // We want to read more data all the time, except when we
        // have unprocessed plaintext.  This provides back-pressure
        // to the TCP buffers.
        !self.common.has_readable_plaintext()
    }

    pub fn is_handshaking(&self) -> bool {
        self.state != ConnState::Traffic
    }

    pub fn find_cipher_suite(
        &self,
        suite: crate::msgs::enums::CipherSuite,
    ) -> Option<&'static SupportedCipherSuite> {
        crate::suites::find_in_list(suite, &self.config.ciphersuites)
    }

    fn process_msg(&mut self, mut msg: Message) -> Result<(), TlsError> {
        self.common.check_record_version(&msg)?;

        // Decrypt if the read side has switched.
        if self.common.peer_encrypting {
            msg = self.common.decrypt_incoming(msg)?;
        }

        // Handshake messages need reassembly before parsing.
        if self.common.handshake_joiner.want_message(&msg) {
            self.common
                .handshake_joiner
                .take_message(msg)
                .ok_or(TlsError::CorruptMessagePayload(ContentType::Handshake))?;
            return self.process_new_handshake_messages();
        }

        if !msg.decode_payload(self.common.record_version()) {
            return Err(TlsError::CorruptMessagePayload(msg.typ));
        }

        if msg.is_content_type(ContentType::Alert) {
            return self.common.process_alert(msg);
        }

        self.process_main_protocol(msg)
    }

    fn process_new_handshake_messages(&mut self) -> Result<(), TlsError> {
        while let Some(msg) = self.common.handshake_joiner.frames.pop_front() {
            self.process_main_protocol(msg)?;
        }

        Ok(())
    }

    fn queue_unexpected_alert(&mut self) {
        self.common
            .send_fatal_alert(AlertDescription::UnexpectedMessage);
    }

    pub fn process_main_protocol(&mut self, msg: Message) -> Result<(), TlsError> {
        // Incoming handshake messages enter the transcript in their
        // received form, hello_request excepted.
        if let MessagePayload::Handshake {
            ref parsed,
            ref encoded,
        } = msg.payload
        {
            if parsed.typ != HandshakeType::HelloRequest {
                self.common.transcript.update_raw(&encoded.0);
            }
        }

        loop {
            let handler = self.get_handler();
            handler.expect.check_message(&msg).map_err(|err| {
                self.queue_unexpected_alert();
                err
            })?;

            let from = self.state;
            match (handler.handle)(self, &msg)? {
                HandleOutcome::Accepted(next) => {
                    self.transition(from, next);
                    break;
                }
                HandleOutcome::Skip(next) => {
                    // the frame belongs to a later state; advance and
                    // re-dispatch it there
                    self.transition(from, next);
                }
            }
        }

        if self.state == ConnState::Traffic && !self.common.traffic {
            self.common.start_traffic()?;
        }

        Ok(())
    }

    fn transition(&mut self, from: ConnState, to: ConnState) {
        self.state = to;
        if from.name() != to.name() {
            self.common.push_event(TlsEvent::StateChange {
                from: from.name(),
                to: to.name(),
            });
        }
    }

    fn get_handler(&self) -> &'static client_hs::Handler {
        match self.state {
            ConnState::ExpectServerHello => &client_hs::EXPECT_SERVER_HELLO,
            ConnState::ExpectCertificate => &client_hs::EXPECT_CERTIFICATE,
            ConnState::ExpectServerKx => &client_hs::EXPECT_SERVER_KX,
            ConnState::ExpectCertificateRequest => &client_hs::EXPECT_CERTIFICATE_REQUEST,
            ConnState::ExpectServerHelloDone => &client_hs::EXPECT_SERVER_HELLO_DONE,
            ConnState::ExpectCCS => &client_hs::EXPECT_CCS,
            ConnState::ExpectFinished => &client_hs::EXPECT_FINISHED,
            ConnState::Traffic => &client_hs::TRAFFIC,
        }
    }

    pub fn process_new_packets(&mut self) -> Result<(), TlsError> {
        if let Some(ref err) = self.fatal_error {
            return Err(err.clone());
        }

        if let Some(err) = self.common.message_deframer.desynced.clone() {
            return self.fail(err);
        }

        while let Some(msg) = self.common.message_deframer.frames.pop_front() {
            if let Err(err) = self.process_msg(msg) {
                return self.fail(err);
            }
        }

        Ok(())
    }

    /// Emit a fatal alert for `err` if one applies, remember it, and
    /// produce no further frames.
    fn fail(&mut self, err: TlsError) -> Result<(), TlsError> {
        if let Some(desc) = err.to_alert() {
            self.common.send_fatal_alert(desc);
        }
        self.fatal_error = Some(err.clone());
        Err(err)
    }

    pub fn send_close_notify(&mut self) {
        self.common.send_warning_alert(AlertDescription::CloseNotify)
    }

    pub fn get_peer_certificates(&self) -> Option<Vec<key::Certificate>> {
        if self.handshake_data.server_cert_chain.is_empty() {
            return None;
        }

        Some(self.handshake_data.server_cert_chain.clone())
    }
}

/// This represents a single TLS client session.
///
/// Write plaintext for the peer with the `io::Write` impl; read
/// plaintext the peer sent with `io::Read`.  TLS bytes move through
/// `read_tls`/`write_tls`.
pub struct ClientSession {
    // We use the pimpl idiom to hide unimportant details.
    imp: ClientSessionImpl,
}

impl ClientSession {
    /// Make a new ClientSession.  This queues the ClientHello
    /// immediately: the handshake starts on the first `write_tls`.
    pub fn new(config: &Arc<ClientConfig>) -> ClientSession {
        ClientSession {
            imp: ClientSessionImpl::new(config),
        }
    }

    /// The established master secret; for tests.
    #[doc(hidden)]
    pub fn get_master_secret(&self) -> Option<Vec<u8>> {
        self.imp
            .common
            .secrets
            .as_ref()
            .map(|s| s.get_master_secret())
    }
}

impl Session for ClientSession {
    fn read_tls(&mut self, rd: &mut dyn io::Read) -> io::Result<usize> {
        self.imp.common.read_tls(rd)
    }

    fn write_tls(&mut self, wr: &mut dyn io::Write) -> io::Result<usize> {
        self.imp.common.write_tls(wr)
    }

    fn process_new_packets(&mut self) -> Result<(), TlsError> {
        self.imp.process_new_packets()
    }

    fn wants_read(&self) -> bool {
        self.imp.wants_read()
    }

    fn wants_write(&self) -> bool {
        self.imp.common.wants_write()
    }

    fn is_handshaking(&self) -> bool {
        self.imp.is_handshaking()
    }

    fn send_close_notify(&mut self) {
        self.imp.send_close_notify()
    }

    fn get_peer_certificates(&self) -> Option<Vec<key::Certificate>> {
        self.imp.get_peer_certificates()
    }

    fn poll_event(&mut self) -> Option<TlsEvent> {
        self.imp.common.pop_event()
    }
}

impl io::Read for ClientSession {
    /// Obtain plaintext data received from the peer over this TLS
    /// connection.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.imp.common.read(buf)
    }
}

impl io::Write for ClientSession {
    /// Send the plaintext `buf` to the peer, encrypting and
    /// authenticating it.  This buffers plaintext written before the
    /// handshake completes, and sends it as soon as it can.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.imp
            .common
            .send_plain(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
