use crate::client::{ClientSessionImpl, ConnState};
use crate::error::TlsError;
use crate::handshake::{Expectation, HandleOutcome};
use crate::msgs::base::{Payload, PayloadU16, PayloadU8};
use crate::msgs::codec::Codec;
use crate::msgs::ccs::ChangeCipherSpecPayload;
use crate::msgs::enums::{AlertDescription, Compression, ContentType, HandshakeType, NamedCurve};
use crate::msgs::enums::{HashAlgorithm, ProtocolVersion, SignatureAlgorithm};
use crate::msgs::handshake::{ClientExtension, ClientHelloPayload, HandshakeMessagePayload};
use crate::msgs::handshake::{ECPointFormatList, EllipticCurveList, HandshakePayload};
use crate::msgs::handshake::{Random, SessionID, SignatureAndHashAlgorithm};
use crate::msgs::handshake::{SupportedCurves, SupportedPointFormats};
use crate::msgs::message::{Message, MessagePayload};
use crate::session::{Side, TlsEvent};
use crate::verify;

use log::{debug, info, warn};
use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

macro_rules! extract_handshake(
    ( $m:expr, $t:path ) => (
        match $m.payload {
            MessagePayload::Handshake { ref parsed, .. } => match parsed.payload {
                $t(ref hm) => Some(hm),
                _ => None,
            },
            _ => None,
        }
    )
);

pub type HandleFunction =
    fn(&mut ClientSessionImpl, m: &Message) -> Result<HandleOutcome<ConnState>, TlsError>;

/// These are effectively operations on the ClientSessionImpl, variant
/// on the wait state.  They must not have state of their own.
pub struct Handler {
    pub expect: Expectation,
    pub handle: HandleFunction,
}

fn hs_message(sess: &ClientSessionImpl, typ: HandshakeType, payload: HandshakePayload) -> Message {
    Message {
        typ: ContentType::Handshake,
        version: sess.common.record_version(),
        payload: MessagePayload::handshake(HandshakeMessagePayload { typ, payload }),
    }
}

pub fn emit_client_hello(sess: &mut ClientSessionImpl) {
    let random = Random::generate();
    random.write_slice(&mut sess.common.randoms.client_random);

    let offers_ecdhe = sess.config.ciphersuites.iter().any(|scs| scs.is_ecdhe());

    let mut exts = Vec::new();
    if offers_ecdhe {
        exts.push(ClientExtension::EllipticCurves(EllipticCurveList::supported()));
        exts.push(ClientExtension::ECPointFormats(ECPointFormatList::supported()));
    }
    if sess.config.max_version.is_atleast(ProtocolVersion::TLSv1_2) {
        exts.push(ClientExtension::SignatureAlgorithms(vec![
            SignatureAndHashAlgorithm {
                hash: HashAlgorithm::SHA256,
                sign: SignatureAlgorithm::RSA,
            },
            SignatureAndHashAlgorithm {
                hash: HashAlgorithm::SHA1,
                sign: SignatureAlgorithm::RSA,
            },
        ]));
    }

    let ch = hs_message(
        sess,
        HandshakeType::ClientHello,
        HandshakePayload::ClientHello(ClientHelloPayload {
            client_version: sess.handshake_data.offered_version,
            random,
            session_id: SessionID::empty(),
            cipher_suites: sess.config.ciphersuites.iter().map(|scs| scs.suite).collect(),
            compression_methods: vec![Compression::Null],
            extensions: exts,
        }),
    );

    debug!("sending ClientHello {:#?}", ch);
    // queueing the hello cannot fail: the write side is plaintext
    sess.common.send_msg(ch).expect("plaintext send cannot fail");
}

fn handle_server_hello(
    sess: &mut ClientSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let server_hello = extract_handshake!(m, HandshakePayload::ServerHello).unwrap();
    debug!("we got ServerHello {:#?}", server_hello);

    let version = server_hello.server_version;
    if !version.is_atleast(sess.config.min_version)
        || sess.handshake_data.offered_version.get_u16() < version.get_u16()
    {
        return Err(TlsError::UnsupportedVersion);
    }

    if server_hello.compression_method != Compression::Null {
        return Err(TlsError::PeerIncompatibleError(
            "server chose non-null compression".to_string(),
        ));
    }

    let scs = sess
        .find_cipher_suite(server_hello.cipher_suite)
        .ok_or_else(|| {
            TlsError::PeerIncompatibleError("server chose non-offered ciphersuite".to_string())
        })?;

    if !scs.usable_for_version(version) {
        return Err(TlsError::PeerIncompatibleError(
            "server chose unusable ciphersuite for version".to_string(),
        ));
    }

    info!("using ciphersuite {:?} at {:?}", scs.suite, version);

    sess.common.negotiated_version = Some(version);
    sess.common.suite = Some(scs);
    server_hello
        .random
        .write_slice(&mut sess.common.randoms.server_random);

    Ok(HandleOutcome::Accepted(ConnState::ExpectCertificate))
}

pub static EXPECT_SERVER_HELLO: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[HandshakeType::ServerHello],
    },
    handle: handle_server_hello,
};

fn handle_certificate(
    sess: &mut ClientSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let cert_chain = extract_handshake!(m, HandshakePayload::Certificate).unwrap();

    let leaf = verify::get_leaf(cert_chain)?;
    let public_key = verify::extract_rsa_public_key(leaf)?;

    sess.handshake_data.server_public_key = Some(public_key);
    sess.handshake_data.server_cert_chain = cert_chain.clone();
    sess.common
        .push_event(TlsEvent::PeerCertificates(cert_chain.clone()));

    let next = if sess.common.suite.unwrap().is_ecdhe() {
        ConnState::ExpectServerKx
    } else {
        ConnState::ExpectCertificateRequest
    };

    Ok(HandleOutcome::Accepted(next))
}

pub static EXPECT_CERTIFICATE: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[HandshakeType::Certificate],
    },
    handle: handle_certificate,
};

fn handle_server_kx(
    sess: &mut ClientSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let opaque_kx = extract_handshake!(m, HandshakePayload::ServerKeyExchange).unwrap();
    let version = sess.common.negotiated_version.unwrap();

    let decoded_kx = opaque_kx
        .unwrap_ecdhe(version)
        .ok_or(TlsError::CorruptMessagePayload(ContentType::Handshake))?;

    if decoded_kx.params.curve_params.named_curve != NamedCurve::secp256r1 {
        return Err(TlsError::IllegalParameter("unsupported named curve"));
    }

    // The signature covers both randoms then the raw params.
    let mut message = Vec::new();
    message.extend_from_slice(&sess.common.randoms.client_random);
    message.extend_from_slice(&sess.common.randoms.server_random);
    decoded_kx.params.encode(&mut message);

    verify::verify_kx_signature(
        version,
        &decoded_kx.dss,
        &message,
        sess.handshake_data.server_public_key.as_ref().unwrap(),
    )?;

    debug!("ECDHE params signed ok, curve {:?}", decoded_kx.params.curve_params.named_curve);
    sess.handshake_data.server_ecdh_params = Some(decoded_kx.params);

    Ok(HandleOutcome::Accepted(ConnState::ExpectCertificateRequest))
}

pub static EXPECT_SERVER_KX: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[HandshakeType::ServerKeyExchange],
    },
    handle: handle_server_kx,
};

// --- Either a CertificateRequest, or a ServerHelloDone. ---
// A CertificateRequest means the server wants client auth, which we
// answer with an empty certificate list.
fn handle_certificate_req(
    sess: &mut ClientSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    if let Some(certreq) = extract_handshake!(m, HandshakePayload::CertificateRequest) {
        info!("got CertificateRequest {:?}", certreq);
        warn!("client auth not supported, will present no certificate");
        sess.handshake_data.certreq_received = true;
        return Ok(HandleOutcome::Accepted(ConnState::ExpectServerHelloDone));
    }

    Ok(HandleOutcome::Skip(ConnState::ExpectServerHelloDone))
}

pub static EXPECT_CERTIFICATE_REQUEST: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[
            HandshakeType::CertificateRequest,
            HandshakeType::ServerHelloDone,
        ],
    },
    handle: handle_certificate_req,
};

fn emit_empty_certificate(sess: &mut ClientSessionImpl) -> Result<(), TlsError> {
    let cert = hs_message(
        sess,
        HandshakeType::Certificate,
        HandshakePayload::Certificate(Vec::new()),
    );
    sess.common.send_msg(cert)
}

fn emit_clientkx(sess: &mut ClientSessionImpl, body: Vec<u8>) -> Result<(), TlsError> {
    let ckx = hs_message(
        sess,
        HandshakeType::ClientKeyExchange,
        HandshakePayload::ClientKeyExchange(Payload(body)),
    );
    sess.common.send_msg(ckx)
}

fn emit_ccs(sess: &mut ClientSessionImpl) -> Result<(), TlsError> {
    let ccs = Message {
        typ: ContentType::ChangeCipherSpec,
        version: sess.common.record_version(),
        payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload {}),
    };
    sess.common.send_msg(ccs)
}

fn emit_finished(sess: &mut ClientSessionImpl) -> Result<(), TlsError> {
    let verify_data = {
        let secrets = sess.common.secrets.as_ref().unwrap();
        let digest = sess
            .common
            .transcript
            .transcript_digest(secrets.version, secrets.suite.hash);
        secrets.client_verify_data(&digest)
    };

    let f = hs_message(
        sess,
        HandshakeType::Finished,
        HandshakePayload::Finished(Payload(verify_data)),
    );
    sess.common.send_msg(f)
}

/// RSA key exchange: a fresh premaster of our offered version plus 46
/// random bytes, sealed under the server's public key.
fn client_kx_rsa(sess: &mut ClientSessionImpl) -> Result<(), TlsError> {
    let mut premaster = vec![0u8; 48];
    premaster[..2].copy_from_slice(&sess.handshake_data.offered_version.get_u16().to_be_bytes());
    crate::rand::fill_random(&mut premaster[2..]);

    let sealed = verify::encrypt_premaster(
        sess.handshake_data.server_public_key.as_ref().unwrap(),
        &premaster,
    )?;

    emit_clientkx(sess, PayloadU16::new(sealed).get_encoding())?;
    sess.common.set_premaster(premaster);
    Ok(())
}

/// ECDHE key exchange: make our ephemeral pair, send the public
/// point, and derive the shared secret with the server's point.
fn client_kx_ecdhe(sess: &mut ClientSessionImpl) -> Result<(), TlsError> {
    let params = sess.handshake_data.server_ecdh_params.as_ref().unwrap();

    let their_public = PublicKey::from_sec1_bytes(&params.public.0)
        .map_err(|_| TlsError::IllegalParameter("unparseable server public point"))?;

    let ours = EphemeralSecret::random(&mut OsRng);
    let our_point = ours.public_key().to_encoded_point(false);
    let shared = ours.diffie_hellman(&their_public);
    let premaster = shared.raw_secret_bytes().to_vec();

    emit_clientkx(
        sess,
        PayloadU8::new(our_point.as_bytes().to_vec()).get_encoding(),
    )?;
    sess.common.set_premaster(premaster);
    Ok(())
}

fn handle_server_hello_done(
    sess: &mut ClientSessionImpl,
    _m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    // 1. If asked for a certificate, present our (absent) one.
    // 2. Complete the key exchange and emit a ClientKeyExchange.
    // 3. Emit a ChangeCipherSpec and switch the write side.
    // 4. Emit a Finished, our first message under the new keys.

    if sess.handshake_data.certreq_received {
        emit_empty_certificate(sess)?;
    }

    if sess.common.suite.unwrap().is_ecdhe() {
        client_kx_ecdhe(sess)?;
    } else {
        client_kx_rsa(sess)?;
    }

    emit_ccs(sess)?;
    sess.common.switch_to_pending(Side::Write)?;

    emit_finished(sess)?;

    Ok(HandleOutcome::Accepted(ConnState::ExpectCCS))
}

pub static EXPECT_SERVER_HELLO_DONE: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[HandshakeType::ServerHelloDone],
    },
    handle: handle_server_hello_done,
};

// -- Waiting for their CCS --
fn handle_ccs(
    sess: &mut ClientSessionImpl,
    _m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    // nb. the msgs layer validates the trivial contents of a CCS
    sess.common.switch_to_pending(Side::Read)?;
    Ok(HandleOutcome::Accepted(ConnState::ExpectFinished))
}

pub static EXPECT_CCS: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::ChangeCipherSpec],
        handshake_types: &[],
    },
    handle: handle_ccs,
};

// -- Waiting for their Finished --
fn handle_finished(
    sess: &mut ClientSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let finished = extract_handshake!(m, HandshakePayload::Finished).unwrap();

    if !sess.common.both_switched() {
        return Err(TlsError::General("finished before cipher switch".to_string()));
    }

    let expect = sess
        .common
        .read_verify_expect
        .take()
        .ok_or_else(|| TlsError::General("no expected verify data".to_string()))?;

    if expect.ct_eq(&finished.0).unwrap_u8() != 1 {
        return Err(TlsError::InvalidHandshakeProof);
    }

    sess.common.finish_handshake();
    Ok(HandleOutcome::Accepted(ConnState::Traffic))
}

pub static EXPECT_FINISHED: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[HandshakeType::Finished],
    },
    handle: handle_finished,
};

// -- Traffic transit state --
fn handle_traffic(
    sess: &mut ClientSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    if m.is_handshake_type(HandshakeType::HelloRequest) {
        // renegotiation is not supported; decline politely
        sess.common
            .send_warning_alert(AlertDescription::NoRenegotiation);
        return Ok(HandleOutcome::Accepted(ConnState::Traffic));
    }

    let body = m.get_opaque_payload().unwrap().0.clone();
    sess.common.take_received_plaintext(&body);
    Ok(HandleOutcome::Accepted(ConnState::Traffic))
}

pub static TRAFFIC: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::ApplicationData, ContentType::Handshake],
        handshake_types: &[HandshakeType::HelloRequest],
    },
    handle: handle_traffic,
};
