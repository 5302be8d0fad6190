use crate::error::TlsError;
use crate::handshake::HandleOutcome;
use crate::key;
use crate::msgs::enums::{AlertDescription, ContentType, HandshakeType, ProtocolVersion};
use crate::msgs::message::{Message, MessagePayload};
use crate::server_hs;
use crate::session::{Session, SessionCommon, TlsEvent};
use crate::sign::RsaSigner;
use crate::suites::{SupportedCipherSuite, ALL_CIPHERSUITES};

use p256::ecdh::EphemeralSecret;

use std::io;
use std::sync::Arc;

/// Common configuration for a set of server sessions.
///
/// Making one of these can be expensive, and should be once per
/// process rather than once per connection.
pub struct ServerConfig {
    /// List of cipher suites, in preference order.  The server picks
    /// the first of these the client also offers.
    pub ciphersuites: Vec<&'static SupportedCipherSuite>,

    /// The lowest protocol version we accept.
    pub min_version: ProtocolVersion,

    /// The highest protocol version we speak.
    pub max_version: ProtocolVersion,

    /// Our certificate chain, leaf first.
    pub cert_chain: Vec<key::Certificate>,

    /// The key matching the leaf certificate.
    pub signer: Option<Arc<RsaSigner>>,
}

impl ServerConfig {
    /// Make a `ServerConfig` with a default set of ciphersuites, all
    /// versions, and no keys or certificates.
    pub fn new() -> ServerConfig {
        ServerConfig {
            ciphersuites: ALL_CIPHERSUITES.to_vec(),
            min_version: ProtocolVersion::TLSv1_0,
            max_version: ProtocolVersion::TLSv1_2,
            cert_chain: Vec::new(),
            signer: None,
        }
    }

    /// Sets a single certificate chain and matching private key,
    /// used for all subsequent connections.
    ///
    /// `cert_chain` holds DER-encoded certificates, leaf first;
    /// `key_der` a DER-encoded RSA private key in PKCS#1 or PKCS#8.
    pub fn set_single_cert(&mut self, cert_chain: Vec<key::Certificate>, key_der: key::PrivateKey) {
        let signer = RsaSigner::new(&key_der).expect("invalid RSA private key");
        self.cert_chain = cert_chain;
        self.signer = Some(Arc::new(signer));
    }
}

impl Default for ServerConfig {
    fn default() -> ServerConfig {
        ServerConfig::new()
    }
}

pub struct ServerHandshakeData {
    /// The version field of the ClientHello body: the RSA premaster
    /// must repeat it.
    pub client_hello_version: ProtocolVersion,

    /// Our ephemeral key, alive between ServerKeyExchange and
    /// ClientKeyExchange.
    pub ecdh_secret: Option<EphemeralSecret>,

    /// An error noticed during RSA key exchange but deliberately not
    /// surfaced until Finished verification (RFC 5246 D.4).
    pub deferred_error: Option<TlsError>,
}

impl ServerHandshakeData {
    fn new() -> ServerHandshakeData {
        ServerHandshakeData {
            client_hello_version: ProtocolVersion::TLSv1_0,
            ecdh_secret: None,
            deferred_error: None,
        }
    }
}

/// The server's wait states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnState {
    ExpectClientHello,
    ExpectClientKxRsa,
    ExpectClientKxEcdhe,
    ExpectCertificateVerify,
    ExpectCCS,
    ExpectFinished,
    Traffic,
}

impl ConnState {
    pub fn name(&self) -> &'static str {
        match *self {
            ConnState::ExpectClientHello => "hello",
            ConnState::ExpectClientKxRsa => "keyExchange",
            ConnState::ExpectClientKxEcdhe => "ecdheKeyExchange",
            ConnState::ExpectCertificateVerify => "certVerify",
            ConnState::ExpectCCS | ConnState::ExpectFinished => "finished",
            ConnState::Traffic => "none",
        }
    }
}

pub struct ServerSessionImpl {
    pub config: Arc<ServerConfig>,
    pub handshake_data: ServerHandshakeData,
    pub common: SessionCommon,
    pub state: ConnState,
    pub fatal_error: Option<TlsError>,
}

impl ServerSessionImpl {
    pub fn new(server_config: &Arc<ServerConfig>) -> ServerSessionImpl {
        // The server's start is a no-op: it speaks second.
        ServerSessionImpl {
            config: server_config.clone(),
            handshake_data: ServerHandshakeData::new(),
            common: SessionCommon::new(false),
            state: ConnState::ExpectClientHello,
            fatal_error: None,
        }
    }

    pub fn wants_read(&self) -> bool {
        !self.common.has_readable_plaintext()
    }

    pub fn is_handshaking(&self) -> bool {
        self.state != ConnState::Traffic
    }

    fn process_msg(&mut self, mut msg: Message) -> Result<(), TlsError> {
        self.common.check_record_version(&msg)?;

        if self.common.peer_encrypting {
            msg = match self.common.decrypt_incoming(msg) {
                Ok(m) => m,
                // A Finished that fails deprotection under keys made
                // from a substituted premaster surfaces the held-back
                // key exchange complaint (RFC 5246 D.4).
                Err(err) => {
                    return Err(self
                        .handshake_data
                        .deferred_error
                        .take()
                        .unwrap_or(err));
                }
            };
        }

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
        // A second ClientHello means renegotiation, which we decline.
        if self.state == ConnState::Traffic && msg.is_handshake_type(HandshakeType::ClientHello) {
            self.common
                .send_warning_alert(AlertDescription::NoRenegotiation);
            return Ok(());
        }

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

    fn get_handler(&self) -> &'static server_hs::Handler {
        match self.state {
            ConnState::ExpectClientHello => &server_hs::EXPECT_CLIENT_HELLO,
            ConnState::ExpectClientKxRsa => &server_hs::EXPECT_CLIENT_KX_RSA,
            ConnState::ExpectClientKxEcdhe => &server_hs::EXPECT_CLIENT_KX_ECDHE,
            ConnState::ExpectCertificateVerify => &server_hs::EXPECT_CERTIFICATE_VERIFY,
            ConnState::ExpectCCS => &server_hs::EXPECT_CCS,
            ConnState::ExpectFinished => &server_hs::EXPECT_FINISHED,
            ConnState::Traffic => &server_hs::TRAFFIC,
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
}

/// This represents a single TLS server session.
pub struct ServerSession {
    // We use the pimpl idiom to hide unimportant details.
    imp: ServerSessionImpl,
}

impl ServerSession {
    /// Make a new ServerSession.  `config` controls how we behave in
    /// the TLS protocol.
    pub fn new(config: &Arc<ServerConfig>) -> ServerSession {
        ServerSession {
            imp: ServerSessionImpl::new(config),
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

impl Session for ServerSession {
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
        // client certificates are not implemented
        None
    }

    fn poll_event(&mut self) -> Option<TlsEvent> {
        self.imp.common.pop_event()
    }
}

impl io::Read for ServerSession {
    /// Obtain plaintext data received from the peer over this TLS
    /// connection.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.imp.common.read(buf)
    }
}

impl io::Write for ServerSession {
    /// Send the plaintext `buf` to the peer, encrypting and
    /// authenticating it.  Buffered until the handshake completes.
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
