use crate::error::TlsError;
use crate::handshake::{Expectation, HandleOutcome};
use crate::msgs::base::{Payload, PayloadU16, PayloadU8};
use crate::msgs::ccs::ChangeCipherSpecPayload;
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::{Compression, ContentType, HandshakeType, NamedCurve};
use crate::msgs::handshake::{DigitallySignedStruct, ECDHEServerKeyExchange, HandshakeMessagePayload};
use crate::msgs::handshake::{HandshakePayload, Random, ServerECDHParams, ServerHelloPayload};
use crate::msgs::handshake::{ServerKeyExchangePayload, SessionID};
use crate::msgs::message::{Message, MessagePayload};
use crate::server::{ConnState, ServerSessionImpl};
use crate::session::Side;
use crate::suites;

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
    fn(&mut ServerSessionImpl, m: &Message) -> Result<HandleOutcome<ConnState>, TlsError>;

/// These are effectively operations on the ServerSessionImpl, variant
/// on the wait state.  They must not have state of their own.
pub struct Handler {
    pub expect: Expectation,
    pub handle: HandleFunction,
}

fn hs_message(sess: &ServerSessionImpl, typ: HandshakeType, payload: HandshakePayload) -> Message {
    Message {
        typ: ContentType::Handshake,
        version: sess.common.record_version(),
        payload: MessagePayload::handshake(HandshakeMessagePayload { typ, payload }),
    }
}

fn emit_server_hello(sess: &mut ServerSessionImpl) -> Result<(), TlsError> {
    let random = Random::generate();
    random.write_slice(&mut sess.common.randoms.server_random);

    let sh = hs_message(
        sess,
        HandshakeType::ServerHello,
        HandshakePayload::ServerHello(ServerHelloPayload {
            server_version: sess.common.negotiated_version.unwrap(),
            random,
            session_id: SessionID::empty(),
            cipher_suite: sess.common.suite.unwrap().suite,
            compression_method: Compression::Null,
            extensions: Vec::new(),
        }),
    );

    debug!("sending ServerHello {:#?}", sh);
    sess.common.send_msg(sh)
}

fn emit_certificate(sess: &mut ServerSessionImpl) -> Result<(), TlsError> {
    if sess.config.cert_chain.is_empty() {
        return Err(TlsError::General("no server certificate configured".to_string()));
    }

    let c = hs_message(
        sess,
        HandshakeType::Certificate,
        HandshakePayload::Certificate(sess.config.cert_chain.clone()),
    );
    sess.common.send_msg(c)
}

fn emit_server_kx(sess: &mut ServerSessionImpl) -> Result<(), TlsError> {
    let version = sess.common.negotiated_version.unwrap();

    let secret = EphemeralSecret::random(&mut OsRng);
    let our_point = secret.public_key().to_encoded_point(false);
    let params = ServerECDHParams::new(NamedCurve::secp256r1, our_point.as_bytes());

    // The signature covers both randoms then the raw params.
    let mut message = Vec::new();
    message.extend_from_slice(&sess.common.randoms.client_random);
    message.extend_from_slice(&sess.common.randoms.server_random);
    params.encode(&mut message);

    let signer = sess
        .config
        .signer
        .as_ref()
        .ok_or_else(|| TlsError::General("no server key configured".to_string()))?
        .clone();
    let (alg, sig) = signer.sign_kx(version, &message)?;

    let skx = hs_message(
        sess,
        HandshakeType::ServerKeyExchange,
        HandshakePayload::ServerKeyExchange(ServerKeyExchangePayload::ECDHE(
            ECDHEServerKeyExchange {
                params,
                dss: DigitallySignedStruct::new(alg, sig),
            },
        )),
    );

    sess.handshake_data.ecdh_secret = Some(secret);
    sess.common.send_msg(skx)
}

fn emit_server_hello_done(sess: &mut ServerSessionImpl) -> Result<(), TlsError> {
    let done = hs_message(
        sess,
        HandshakeType::ServerHelloDone,
        HandshakePayload::ServerHelloDone,
    );
    sess.common.send_msg(done)
}

fn emit_ccs(sess: &mut ServerSessionImpl) -> Result<(), TlsError> {
    let ccs = Message {
        typ: ContentType::ChangeCipherSpec,
        version: sess.common.record_version(),
        payload: MessagePayload::ChangeCipherSpec(ChangeCipherSpecPayload {}),
    };
    sess.common.send_msg(ccs)
}

fn emit_finished(sess: &mut ServerSessionImpl) -> Result<(), TlsError> {
    let verify_data = {
        let secrets = sess.common.secrets.as_ref().unwrap();
        let digest = sess
            .common
            .transcript
            .transcript_digest(secrets.version, secrets.suite.hash);
        secrets.server_verify_data(&digest)
    };

    let f = hs_message(
        sess,
        HandshakeType::Finished,
        HandshakePayload::Finished(Payload(verify_data)),
    );
    sess.common.send_msg(f)
}

fn handle_client_hello(
    sess: &mut ServerSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let client_hello = extract_handshake!(m, HandshakePayload::ClientHello).unwrap();
    debug!("we got ClientHello {:#?}", client_hello);

    // Negotiate the highest version both sides speak.
    let client_version = client_hello.client_version;
    let version = if client_version.get_u16() >= sess.config.max_version.get_u16() {
        sess.config.max_version
    } else {
        client_version
    };

    if !version.is_atleast(sess.config.min_version) {
        return Err(TlsError::UnsupportedVersion);
    }

    if !client_hello.offers_compression(Compression::Null) {
        return Err(TlsError::PeerIncompatibleError(
            "client did not offer null compression".to_string(),
        ));
    }

    sess.handshake_data.client_hello_version = client_version;
    sess.common.negotiated_version = Some(version);
    client_hello
        .random
        .write_slice(&mut sess.common.randoms.client_random);

    // First of our suites the client also offers, rsa-auth and
    // usable at this version, wins.
    let scs = suites::choose_ciphersuite(
        &client_hello.cipher_suites,
        &sess.config.ciphersuites,
        version,
    )
    .ok_or(TlsError::NoSuitableCipherSuite)?;

    info!("using ciphersuite {:?} at {:?}", scs.suite, version);
    sess.common.suite = Some(scs);

    emit_server_hello(sess)?;
    emit_certificate(sess)?;
    if scs.is_ecdhe() {
        emit_server_kx(sess)?;
    }
    emit_server_hello_done(sess)?;

    let next = if scs.is_ecdhe() {
        ConnState::ExpectClientKxEcdhe
    } else {
        ConnState::ExpectClientKxRsa
    };

    Ok(HandleOutcome::Accepted(next))
}

pub static EXPECT_CLIENT_HELLO: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[HandshakeType::ClientHello],
    },
    handle: handle_client_hello,
};

/// RSA key transport, with the countermeasure from RFC 5246 D.4: a
/// premaster that fails its checks is replaced with a random one and
/// the complaint held back until Finished verification, so nothing
/// about the padding or version check leaks through timing.
fn handle_client_kx_rsa(
    sess: &mut ServerSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let opaque_kx = extract_handshake!(m, HandshakePayload::ClientKeyExchange).unwrap();

    let mut rd = Reader::init(&opaque_kx.0);
    let sealed = PayloadU16::read(&mut rd)
        .filter(|_| !rd.any_left())
        .ok_or(TlsError::CorruptMessagePayload(ContentType::Handshake))?;

    let signer = sess
        .config
        .signer
        .as_ref()
        .ok_or_else(|| TlsError::General("no server key configured".to_string()))?
        .clone();

    let offered = sess.handshake_data.client_hello_version.get_u16().to_be_bytes();

    let premaster = match signer.decrypt_premaster(&sealed.0) {
        Ok(pms) if pms.len() == 48 && pms[..2] == offered => pms,
        Ok(_) => {
            sess.handshake_data.deferred_error = Some(TlsError::UnsupportedVersion);
            crate::rand::random_vec(48)
        }
        Err(()) => crate::rand::random_vec(48),
    };

    sess.common.set_premaster(premaster);
    Ok(HandleOutcome::Accepted(ConnState::ExpectCertificateVerify))
}

pub static EXPECT_CLIENT_KX_RSA: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[HandshakeType::ClientKeyExchange],
    },
    handle: handle_client_kx_rsa,
};

fn handle_client_kx_ecdhe(
    sess: &mut ServerSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let opaque_kx = extract_handshake!(m, HandshakePayload::ClientKeyExchange).unwrap();

    let mut rd = Reader::init(&opaque_kx.0);
    let point = PayloadU8::read(&mut rd)
        .filter(|_| !rd.any_left())
        .ok_or(TlsError::CorruptMessagePayload(ContentType::Handshake))?;

    let their_public = PublicKey::from_sec1_bytes(&point.0)
        .map_err(|_| TlsError::IllegalParameter("unparseable client public point"))?;

    let secret = sess
        .handshake_data
        .ecdh_secret
        .take()
        .ok_or_else(|| TlsError::General("no ephemeral key".to_string()))?;

    let shared = secret.diffie_hellman(&their_public);
    sess.common.set_premaster(shared.raw_secret_bytes().to_vec());

    Ok(HandleOutcome::Accepted(ConnState::ExpectCertificateVerify))
}

pub static EXPECT_CLIENT_KX_ECDHE: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake],
        handshake_types: &[HandshakeType::ClientKeyExchange],
    },
    handle: handle_client_kx_ecdhe,
};

// --- Either a CertificateVerify, or straight to the client's CCS. ---
fn handle_certificate_verify(
    _sess: &mut ServerSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    if extract_handshake!(m, HandshakePayload::CertificateVerify).is_some() {
        // we never send a CertificateRequest, so nothing to check
        warn!("ignoring CertificateVerify: client auth not supported");
        return Ok(HandleOutcome::Accepted(ConnState::ExpectCCS));
    }

    Ok(HandleOutcome::Skip(ConnState::ExpectCCS))
}

pub static EXPECT_CERTIFICATE_VERIFY: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::Handshake, ContentType::ChangeCipherSpec],
        handshake_types: &[HandshakeType::CertificateVerify],
    },
    handle: handle_certificate_verify,
};

// -- Waiting for their CCS --
fn handle_ccs(
    sess: &mut ServerSessionImpl,
    _m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
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
    sess: &mut ServerSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let finished = extract_handshake!(m, HandshakePayload::Finished).unwrap();

    if sess.common.both_switched() {
        return Err(TlsError::General("finished after cipher switch".to_string()));
    }

    let expect = sess
        .common
        .read_verify_expect
        .take()
        .ok_or_else(|| TlsError::General("no expected verify data".to_string()))?;

    if expect.ct_eq(&finished.0).unwrap_u8() != 1 {
        // a deferred key exchange complaint beats the generic one
        return Err(sess
            .handshake_data
            .deferred_error
            .take()
            .unwrap_or(TlsError::InvalidHandshakeProof));
    }

    if let Some(err) = sess.handshake_data.deferred_error.take() {
        return Err(err);
    }

    emit_ccs(sess)?;
    sess.common.switch_to_pending(Side::Write)?;
    emit_finished(sess)?;

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
    sess: &mut ServerSessionImpl,
    m: &Message,
) -> Result<HandleOutcome<ConnState>, TlsError> {
    let body = m.get_opaque_payload().unwrap().0.clone();
    sess.common.take_received_plaintext(&body);
    Ok(HandleOutcome::Accepted(ConnState::Traffic))
}

pub static TRAFFIC: Handler = Handler {
    expect: Expectation {
        content_types: &[ContentType::ApplicationData],
        handshake_types: &[],
    },
    handle: handle_traffic,
};
