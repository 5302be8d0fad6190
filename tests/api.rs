// Assorted public API tests: full handshakes over in-memory pipes,
// protocol failure paths, and frame round-trips.

use std::io::{Read, Write};
use std::sync::{Arc, OnceLock};

use classic_tls::msgs::base::{Payload, PayloadU16};
use classic_tls::msgs::codec::{Codec, Reader};
use classic_tls::msgs::enums::{
    AlertDescription, AlertLevel, ClientCertificateType, Compression, ContentType, HandshakeType,
    HashAlgorithm, SignatureAlgorithm,
};
use classic_tls::msgs::handshake::{
    CertificateRequestPayload, ClientHelloPayload, HandshakeMessagePayload, HandshakePayload,
    Random, ServerHelloPayload, SessionID, SignatureAndHashAlgorithm,
};
use classic_tls::msgs::message::{Message, MessagePayload};
use classic_tls::suites;
use classic_tls::{
    Certificate, CipherSuite, ClientConfig, ClientSession, PrivateKey, ProtocolVersion,
    ServerConfig, ServerSession, Session, SupportedCipherSuite, TlsError, TlsEvent,
};

use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

struct TestKey {
    cert_der: Vec<u8>,
    key_der: Vec<u8>,
    public: RsaPublicKey,
}

fn test_key() -> &'static TestKey {
    static KEY: OnceLock<TestKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        TestKey {
            cert_der: key
                .to_public_key()
                .to_public_key_der()
                .unwrap()
                .as_bytes()
                .to_vec(),
            key_der: key.to_pkcs8_der().unwrap().as_bytes().to_vec(),
            public: key.to_public_key(),
        }
    })
}

fn make_server_config() -> ServerConfig {
    let mut cfg = ServerConfig::new();
    cfg.set_single_cert(
        vec![Certificate(test_key().cert_der.clone())],
        PrivateKey(test_key().key_der.clone()),
    );
    cfg
}

fn make_client_config() -> ClientConfig {
    ClientConfig::new()
}

fn transfer(left: &mut dyn Session, right: &mut dyn Session) {
    let mut buf = Vec::new();

    while left.wants_write() {
        if left.write_tls(&mut buf).unwrap() == 0 {
            break;
        }
    }

    feed(right, &buf);
}

fn feed(sess: &mut dyn Session, bytes: &[u8]) {
    let mut rd = std::io::Cursor::new(bytes);
    while (rd.position() as usize) < bytes.len() {
        sess.read_tls(&mut rd).unwrap();
    }
}

fn do_handshake(client: &mut ClientSession, server: &mut ServerSession) {
    assert!(client.is_handshaking());
    assert!(server.is_handshaking());
    transfer(client, server);
    server.process_new_packets().unwrap();
    assert!(server.is_handshaking());
    transfer(server, client);
    client.process_new_packets().unwrap();
    assert!(client.is_handshaking());
    transfer(client, server);
    server.process_new_packets().unwrap();
    assert!(!server.is_handshaking());
    transfer(server, client);
    client.process_new_packets().unwrap();
    assert!(!client.is_handshaking());
}

fn check_read(reader: &mut dyn Read, bytes: &[u8]) {
    let mut buf = vec![0u8; bytes.len() + 16];
    let got = reader.read(&mut buf).unwrap();
    assert_eq!(&buf[..got], bytes);
}

fn restrict(
    suite: &'static SupportedCipherSuite,
    version: ProtocolVersion,
) -> (ClientConfig, ServerConfig) {
    let mut client_config = make_client_config();
    client_config.ciphersuites = vec![suite];
    client_config.min_version = version;
    client_config.max_version = version;

    let mut server_config = make_server_config();
    server_config.ciphersuites = vec![suite];
    server_config.min_version = version;
    server_config.max_version = version;

    (client_config, server_config)
}

// ---- full handshakes ----

#[test]
fn full_handshake_tls12_rsa() {
    let (client_config, server_config) =
        restrict(&suites::TLS_RSA_WITH_AES_128_CBC_SHA, ProtocolVersion::TLSv1_2);

    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));
    do_handshake(&mut client, &mut server);

    let cm = client.get_master_secret().unwrap();
    let sm = server.get_master_secret().unwrap();
    assert_eq!(cm.len(), 48);
    assert_eq!(cm, sm);
}

#[test]
fn full_handshake_every_suite_and_version() {
    let versions = [
        ProtocolVersion::TLSv1_0,
        ProtocolVersion::TLSv1_1,
        ProtocolVersion::TLSv1_2,
    ];

    for suite in suites::ALL_CIPHERSUITES.iter().copied() {
        for version in versions.iter() {
            if !suite.usable_for_version(*version) {
                continue;
            }

            let (client_config, server_config) = restrict(suite, *version);
            let mut client = ClientSession::new(&Arc::new(client_config));
            let mut server = ServerSession::new(&Arc::new(server_config));
            do_handshake(&mut client, &mut server);

            client.write_all(b"from client").unwrap();
            transfer(&mut client, &mut server);
            server.process_new_packets().unwrap();
            check_read(&mut server, b"from client");

            server.write_all(b"from server").unwrap();
            transfer(&mut server, &mut client);
            client.process_new_packets().unwrap();
            check_read(&mut client, b"from server");

            assert_eq!(
                client.get_master_secret().unwrap(),
                server.get_master_secret().unwrap(),
                "master secret mismatch for {:?} at {:?}",
                suite.suite,
                version
            );
        }
    }
}

#[test]
fn buffered_client_data_sent() {
    let client_config = make_client_config();
    let server_config = make_server_config();
    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));

    assert_eq!(5, client.write(b"hello").unwrap());

    do_handshake(&mut client, &mut server);
    transfer(&mut client, &mut server);
    server.process_new_packets().unwrap();

    check_read(&mut server, b"hello");
}

#[test]
fn events_surface_cert_and_secure() {
    let client_config = make_client_config();
    let server_config = make_server_config();
    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));
    do_handshake(&mut client, &mut server);

    let mut saw_certs = false;
    let mut saw_secure = false;
    let mut first_transition = None;
    while let Some(ev) = client.poll_event() {
        match ev {
            TlsEvent::PeerCertificates(certs) => {
                assert_eq!(certs.len(), 1);
                assert_eq!(certs[0].0, test_key().cert_der);
                saw_certs = true;
            }
            TlsEvent::Secure => saw_secure = true,
            TlsEvent::StateChange { from, to } => {
                first_transition.get_or_insert((from, to));
            }
        }
    }
    assert!(saw_certs);
    assert!(saw_secure);
    assert_eq!(first_transition, Some(("hello", "certificate")));

    let saw_secure = std::iter::from_fn(|| server.poll_event())
        .any(|ev| matches!(ev, TlsEvent::Secure));
    assert!(saw_secure);

    assert_eq!(
        client.get_peer_certificates().unwrap()[0].0,
        test_key().cert_der
    );
}

#[test]
fn version_negotiation_downgrades_to_client_max() {
    let mut client_config = make_client_config();
    client_config.max_version = ProtocolVersion::TLSv1_1;
    let server_config = make_server_config();

    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));
    do_handshake(&mut client, &mut server);

    assert_eq!(
        client.get_master_secret().unwrap(),
        server.get_master_secret().unwrap()
    );
}

#[test]
fn version_floor_rejected_by_client() {
    let mut client_config = make_client_config();
    client_config.min_version = ProtocolVersion::TLSv1_2;
    let mut server_config = make_server_config();
    server_config.max_version = ProtocolVersion::TLSv1_0;

    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));

    transfer(&mut client, &mut server);
    server.process_new_packets().unwrap();
    transfer(&mut server, &mut client);

    assert_eq!(
        client.process_new_packets(),
        Err(TlsError::UnsupportedVersion)
    );
}

#[test]
fn no_common_suite_fails_handshake() {
    let mut client_config = make_client_config();
    client_config.ciphersuites = vec![&suites::TLS_RSA_WITH_RC4_128_MD5];
    let mut server_config = make_server_config();
    server_config.ciphersuites = vec![&suites::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256];

    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));

    transfer(&mut client, &mut server);
    assert_eq!(
        server.process_new_packets(),
        Err(TlsError::NoSuitableCipherSuite)
    );

    // the server said why before giving up
    transfer(&mut server, &mut client);
    assert_eq!(
        client.process_new_packets(),
        Err(TlsError::AlertReceived(AlertDescription::HandshakeFailure))
    );
}

// ---- record-layer failure paths ----

#[test]
fn application_data_before_handshake_is_rejected() {
    let server_config = make_server_config();
    let mut server = ServerSession::new(&Arc::new(server_config));

    feed(&mut server, b"\x17\x03\x01\x00\x05hello");
    match server.process_new_packets() {
        Err(TlsError::InappropriateMessage { got_type, .. }) => {
            assert_eq!(got_type, ContentType::ApplicationData)
        }
        other => panic!("expected InappropriateMessage, got {:?}", other),
    }
}

#[test]
fn oversized_record_is_rejected() {
    let server_config = make_server_config();
    let mut server = ServerSession::new(&Arc::new(server_config));

    // length 16384 + 2048 + 1
    feed(&mut server, b"\x17\x03\x01\x48\x01");
    assert_eq!(
        server.process_new_packets(),
        Err(TlsError::PeerSentOversizedRecord)
    );
}

#[test]
fn unknown_content_type_is_rejected() {
    let server_config = make_server_config();
    let mut server = ServerSession::new(&Arc::new(server_config));

    feed(&mut server, b"\x63\x03\x01\x00\x01\x00");
    match server.process_new_packets() {
        Err(TlsError::InappropriateMessage { got_type, .. }) => {
            assert_eq!(got_type, ContentType::Unknown(0x63))
        }
        other => panic!("expected InappropriateMessage, got {:?}", other),
    }
}

#[test]
fn tampered_record_fails_bad_record_mac() {
    let client_config = make_client_config();
    let server_config = make_server_config();
    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));
    do_handshake(&mut client, &mut server);

    client.write_all(b"sensitive").unwrap();
    let mut buf = Vec::new();
    while client.wants_write() {
        client.write_tls(&mut buf).unwrap();
    }

    let last = buf.len() - 1;
    buf[last] ^= 0x01;
    feed(&mut server, &buf);

    assert_eq!(server.process_new_packets(), Err(TlsError::DecryptError));
}

#[test]
fn plaintext_record_after_cipher_switch_is_unexpected() {
    let client_config = make_client_config();
    let server_config = make_server_config();
    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));
    do_handshake(&mut client, &mut server);

    // a bare plaintext CCS, long after the real cipher switch
    feed(&mut server, b"\x14\x03\x03\x00\x01\x01");
    assert_eq!(
        server.process_new_packets(),
        Err(TlsError::UnexpectedPlaintext)
    );
}

#[test]
fn close_notify_closes_cleanly() {
    let client_config = make_client_config();
    let server_config = make_server_config();
    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));
    do_handshake(&mut client, &mut server);

    client.send_close_notify();
    transfer(&mut client, &mut server);
    server.process_new_packets().unwrap();

    let mut buf = [0u8; 16];
    assert_eq!(server.read(&mut buf).unwrap(), 0);
}

// ---- the Bleichenbacher countermeasure ----

fn split_records(buf: &[u8]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < buf.len() {
        let len = u16::from_be_bytes([buf[i + 3], buf[i + 4]]) as usize;
        out.push(buf[i..i + 5 + len].to_vec());
        i += 5 + len;
    }
    out
}

/// A ClientKeyExchange whose premaster decrypts fine but repeats the
/// wrong protocol version, as an attacker padding-oracle probe would.
fn forged_rsa_ckx(public: &RsaPublicKey) -> Vec<u8> {
    let mut premaster = vec![0x42u8; 48];
    premaster[0] = 0x03;
    premaster[1] = 0x01; // client offered 0x0303

    let mut rng = rand::rngs::OsRng;
    let sealed = public.encrypt(&mut rng, Pkcs1v15Encrypt, &premaster).unwrap();

    let mut body = Vec::new();
    PayloadU16::new(sealed).encode(&mut body);

    let mut hs = vec![0x10];
    hs.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    hs.extend_from_slice(&body);

    let mut record = vec![0x16, 0x03, 0x03];
    record.extend_from_slice(&(hs.len() as u16).to_be_bytes());
    record.extend_from_slice(&hs);
    record
}

#[test]
fn premaster_version_mismatch_defers_to_finished() {
    let (client_config, server_config) =
        restrict(&suites::TLS_RSA_WITH_AES_128_CBC_SHA, ProtocolVersion::TLSv1_2);
    let mut client = ClientSession::new(&Arc::new(client_config));
    let mut server = ServerSession::new(&Arc::new(server_config));

    transfer(&mut client, &mut server);
    server.process_new_packets().unwrap();
    transfer(&mut server, &mut client);
    client.process_new_packets().unwrap();

    // client flight two: ClientKeyExchange, CCS, Finished
    let mut buf = Vec::new();
    while client.wants_write() {
        client.write_tls(&mut buf).unwrap();
    }
    let records = split_records(&buf);
    assert_eq!(records.len(), 3);

    // swap in a key exchange carrying the wrong premaster version
    feed(&mut server, &forged_rsa_ckx(&test_key().public));
    feed(&mut server, &records[1]);
    feed(&mut server, &records[2]);

    // nothing failed until the Finished, and then with the complaint
    // noticed at key exchange time
    assert_eq!(
        server.process_new_packets(),
        Err(TlsError::UnsupportedVersion)
    );
}

// ---- frame round-trips ----

fn roundtrip(m: Message) -> Message {
    let buf = m.get_encoding();
    let mut r = Reader::init(&buf);
    let mut parsed = Message::read(&mut r).unwrap();
    assert!(!r.any_left());
    assert!(parsed.decode_payload(ProtocolVersion::TLSv1_2));
    parsed
}

fn handshake_roundtrip(typ: HandshakeType, payload: HandshakePayload) -> HandshakeMessagePayload {
    let m = Message {
        typ: ContentType::Handshake,
        version: ProtocolVersion::TLSv1_2,
        payload: MessagePayload::handshake(HandshakeMessagePayload { typ, payload }),
    };

    match roundtrip(m).payload {
        MessagePayload::Handshake { parsed, .. } => {
            assert_eq!(parsed.typ, typ);
            parsed
        }
        other => panic!("expected handshake payload, got {:?}", other),
    }
}

#[test]
fn change_cipher_spec_roundtrip() {
    let m = Message {
        typ: ContentType::ChangeCipherSpec,
        version: ProtocolVersion::TLSv1_2,
        payload: MessagePayload::ChangeCipherSpec(classic_tls::msgs::ccs::ChangeCipherSpecPayload),
    };

    let parsed = roundtrip(m);
    assert_eq!(parsed.typ, ContentType::ChangeCipherSpec);
    assert!(matches!(
        parsed.payload,
        MessagePayload::ChangeCipherSpec(_)
    ));
}

#[test]
fn alert_roundtrip() {
    let m = Message::build_alert(
        ProtocolVersion::TLSv1_2,
        AlertLevel::Fatal,
        AlertDescription::IllegalParameter,
    );

    match roundtrip(m).payload {
        MessagePayload::Alert(alert) => {
            assert_eq!(alert.level, AlertLevel::Fatal);
            assert_eq!(alert.description, AlertDescription::IllegalParameter);
        }
        other => panic!("expected alert, got {:?}", other),
    }
}

#[test]
fn client_hello_roundtrip() {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as u32;

    let parsed = handshake_roundtrip(
        HandshakeType::ClientHello,
        HandshakePayload::ClientHello(ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: Random::generate(),
            session_id: SessionID::empty(),
            cipher_suites: vec![CipherSuite::TLS_ECDH_anon_WITH_AES_256_CBC_SHA],
            compression_methods: vec![Compression::Null, Compression::Deflate],
            extensions: Vec::new(),
        }),
    );

    match parsed.payload {
        HandshakePayload::ClientHello(ch) => {
            assert!(ch.random.gmt_unix_time <= now);
            assert!(ch.session_id.is_empty());
            assert_eq!(
                ch.cipher_suites,
                vec![CipherSuite::TLS_ECDH_anon_WITH_AES_256_CBC_SHA]
            );
            assert_eq!(
                ch.compression_methods,
                vec![Compression::Null, Compression::Deflate]
            );
        }
        other => panic!("expected ClientHello, got {:?}", other),
    }
}

#[test]
fn server_hello_roundtrip() {
    let parsed = handshake_roundtrip(
        HandshakeType::ServerHello,
        HandshakePayload::ServerHello(ServerHelloPayload {
            server_version: ProtocolVersion::TLSv1_1,
            random: Random::generate(),
            session_id: SessionID::empty(),
            cipher_suite: CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
            compression_method: Compression::Deflate,
            extensions: Vec::new(),
        }),
    );

    match parsed.payload {
        HandshakePayload::ServerHello(sh) => {
            assert_eq!(sh.server_version, ProtocolVersion::TLSv1_1);
            assert_eq!(sh.cipher_suite, CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA);
            assert_eq!(sh.compression_method, Compression::Deflate);
        }
        other => panic!("expected ServerHello, got {:?}", other),
    }
}

#[test]
fn certificate_roundtrip() {
    let parsed = handshake_roundtrip(
        HandshakeType::Certificate,
        HandshakePayload::Certificate(vec![Certificate(b"hello".to_vec())]),
    );

    match parsed.payload {
        HandshakePayload::Certificate(certs) => {
            assert_eq!(certs.len(), 1);
            assert_eq!(certs[0].0, b"hello".to_vec());
        }
        other => panic!("expected Certificate, got {:?}", other),
    }
}

#[test]
fn certificate_request_roundtrip() {
    let parsed = handshake_roundtrip(
        HandshakeType::CertificateRequest,
        HandshakePayload::CertificateRequest(CertificateRequestPayload {
            certtypes: vec![ClientCertificateType::RSAFixedDH],
            sigalgs: vec![SignatureAndHashAlgorithm {
                hash: HashAlgorithm::SHA1,
                sign: SignatureAlgorithm::RSA,
            }],
            canames: vec![PayloadU16::new(b"der".to_vec())],
        }),
    );

    match parsed.payload {
        HandshakePayload::CertificateRequest(cr) => {
            assert_eq!(cr.certtypes, vec![ClientCertificateType::RSAFixedDH]);
            assert_eq!(
                cr.sigalgs,
                vec![SignatureAndHashAlgorithm {
                    hash: HashAlgorithm::SHA1,
                    sign: SignatureAlgorithm::RSA,
                }]
            );
            assert_eq!(cr.canames, vec![PayloadU16::new(b"der".to_vec())]);
        }
        other => panic!("expected CertificateRequest, got {:?}", other),
    }
}

#[test]
fn finished_roundtrip() {
    let parsed = handshake_roundtrip(
        HandshakeType::Finished,
        HandshakePayload::Finished(Payload(b"hello".to_vec())),
    );

    match parsed.payload {
        HandshakePayload::Finished(body) => assert_eq!(body.0, b"hello".to_vec()),
        other => panic!("expected Finished, got {:?}", other),
    }
}
