use crate::key;
use crate::msgs::base::{Payload, PayloadU16, PayloadU8};
use crate::msgs::codec;
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::{CipherSuite, Compression, ECCurveType, ECPointFormat};
use crate::msgs::enums::{ClientCertificateType, ExtensionType, NamedCurve};
use crate::msgs::enums::{HandshakeType, HashAlgorithm, ProtocolVersion, SignatureAlgorithm};
use crate::rand;

use std::time::{SystemTime, UNIX_EPOCH};

/// The 32-byte hello random: 4-byte unix seconds plus 28 bytes of
/// fresh randomness.
#[derive(Debug, Clone)]
pub struct Random {
    pub gmt_unix_time: u32,
    pub opaque: [u8; 28],
}

impl Codec for Random {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::encode_u32(self.gmt_unix_time, bytes);
        bytes.extend_from_slice(&self.opaque);
    }

    fn read(r: &mut Reader) -> Option<Random> {
        let time = try_ret!(codec::read_u32(r));
        let bytes = try_ret!(r.take(28));
        let mut opaque = [0u8; 28];
        opaque.copy_from_slice(bytes);

        Some(Random {
            gmt_unix_time: time,
            opaque,
        })
    }
}

impl Random {
    /// Make a fresh random, stamped with the current time.
    pub fn generate() -> Random {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);

        let mut opaque = [0u8; 28];
        rand::fill_random(&mut opaque);

        Random {
            gmt_unix_time: now,
            opaque,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Random {
        let mut rd = Reader::init(bytes);
        Random::read(&mut rd).unwrap()
    }

    pub fn write_slice(&self, out: &mut [u8]) {
        let buf = self.get_encoding();
        out.copy_from_slice(&buf);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionID {
    pub bytes: Vec<u8>,
}

impl Codec for SessionID {
    fn encode(&self, bytes: &mut Vec<u8>) {
        (self.bytes.len() as u8).encode(bytes);
        bytes.extend_from_slice(&self.bytes);
    }

    fn read(r: &mut Reader) -> Option<SessionID> {
        let len = try_ret!(u8::read(r)) as usize;
        if len > 32 {
            return None;
        }
        let bytes = try_ret!(r.take(len)).to_vec();
        Some(SessionID { bytes })
    }
}

impl SessionID {
    pub fn empty() -> SessionID {
        SessionID { bytes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct UnknownExtension {
    pub typ: ExtensionType,
    pub payload: Payload,
}

impl UnknownExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.payload.encode(bytes);
    }

    fn read(typ: ExtensionType, r: &mut Reader) -> Option<UnknownExtension> {
        let payload = try_ret!(Payload::read(r));
        Some(UnknownExtension { typ, payload })
    }
}

pub type ECPointFormatList = Vec<ECPointFormat>;

pub trait SupportedPointFormats {
    fn supported() -> ECPointFormatList;
}

impl SupportedPointFormats for ECPointFormatList {
    fn supported() -> ECPointFormatList {
        vec![ECPointFormat::Uncompressed]
    }
}

impl Codec for ECPointFormatList {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::encode_vec_u8(bytes, self);
    }

    fn read(r: &mut Reader) -> Option<ECPointFormatList> {
        codec::read_vec_u8::<ECPointFormat>(r)
    }
}

pub type EllipticCurveList = Vec<NamedCurve>;

pub trait SupportedCurves {
    fn supported() -> EllipticCurveList;
}

impl SupportedCurves for EllipticCurveList {
    fn supported() -> EllipticCurveList {
        vec![NamedCurve::secp256r1]
    }
}

impl Codec for EllipticCurveList {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::encode_vec_u16(bytes, self);
    }

    fn read(r: &mut Reader) -> Option<EllipticCurveList> {
        codec::read_vec_u16::<NamedCurve>(r)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureAndHashAlgorithm {
    pub hash: HashAlgorithm,
    pub sign: SignatureAlgorithm,
}

impl Codec for SignatureAndHashAlgorithm {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.hash.encode(bytes);
        self.sign.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<SignatureAndHashAlgorithm> {
        let hash = try_ret!(HashAlgorithm::read(r));
        let sign = try_ret!(SignatureAlgorithm::read(r));
        Some(SignatureAndHashAlgorithm { hash, sign })
    }
}

pub type SupportedSignatureAlgorithms = Vec<SignatureAndHashAlgorithm>;

impl Codec for SupportedSignatureAlgorithms {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::encode_vec_u16(bytes, self);
    }

    fn read(r: &mut Reader) -> Option<SupportedSignatureAlgorithms> {
        codec::read_vec_u16::<SignatureAndHashAlgorithm>(r)
    }
}

#[derive(Debug, Clone)]
pub enum ClientExtension {
    ECPointFormats(ECPointFormatList),
    EllipticCurves(EllipticCurveList),
    SignatureAlgorithms(SupportedSignatureAlgorithms),
    Unknown(UnknownExtension),
}

impl ClientExtension {
    pub fn get_type(&self) -> ExtensionType {
        match *self {
            ClientExtension::ECPointFormats(_) => ExtensionType::ECPointFormats,
            ClientExtension::EllipticCurves(_) => ExtensionType::EllipticCurves,
            ClientExtension::SignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            ClientExtension::Unknown(ref r) => r.typ,
        }
    }
}

impl Codec for ClientExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.get_type().encode(bytes);

        let mut sub: Vec<u8> = Vec::new();
        match *self {
            ClientExtension::ECPointFormats(ref r) => r.encode(&mut sub),
            ClientExtension::EllipticCurves(ref r) => r.encode(&mut sub),
            ClientExtension::SignatureAlgorithms(ref r) => r.encode(&mut sub),
            ClientExtension::Unknown(ref r) => r.encode(&mut sub),
        }

        codec::encode_u16(sub.len() as u16, bytes);
        bytes.append(&mut sub);
    }

    fn read(r: &mut Reader) -> Option<ClientExtension> {
        let typ = try_ret!(ExtensionType::read(r));
        let len = try_ret!(codec::read_u16(r)) as usize;
        let mut sub = try_ret!(r.sub(len));

        Some(match typ {
            ExtensionType::ECPointFormats => {
                ClientExtension::ECPointFormats(try_ret!(ECPointFormatList::read(&mut sub)))
            }
            ExtensionType::EllipticCurves => {
                ClientExtension::EllipticCurves(try_ret!(EllipticCurveList::read(&mut sub)))
            }
            ExtensionType::SignatureAlgorithms => ClientExtension::SignatureAlgorithms(try_ret!(
                SupportedSignatureAlgorithms::read(&mut sub)
            )),
            _ => ClientExtension::Unknown(try_ret!(UnknownExtension::read(typ, &mut sub))),
        })
    }
}

#[derive(Debug, Clone)]
pub enum ServerExtension {
    ECPointFormats(ECPointFormatList),
    RenegotiationInfo(PayloadU8),
    Unknown(UnknownExtension),
}

impl ServerExtension {
    pub fn get_type(&self) -> ExtensionType {
        match *self {
            ServerExtension::ECPointFormats(_) => ExtensionType::ECPointFormats,
            ServerExtension::RenegotiationInfo(_) => ExtensionType::RenegotiationInfo,
            ServerExtension::Unknown(ref r) => r.typ,
        }
    }
}

impl Codec for ServerExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.get_type().encode(bytes);

        let mut sub: Vec<u8> = Vec::new();
        match *self {
            ServerExtension::ECPointFormats(ref r) => r.encode(&mut sub),
            ServerExtension::RenegotiationInfo(ref r) => r.encode(&mut sub),
            ServerExtension::Unknown(ref r) => r.encode(&mut sub),
        }

        codec::encode_u16(sub.len() as u16, bytes);
        bytes.append(&mut sub);
    }

    fn read(r: &mut Reader) -> Option<ServerExtension> {
        let typ = try_ret!(ExtensionType::read(r));
        let len = try_ret!(codec::read_u16(r)) as usize;
        let mut sub = try_ret!(r.sub(len));

        Some(match typ {
            ExtensionType::ECPointFormats => {
                ServerExtension::ECPointFormats(try_ret!(ECPointFormatList::read(&mut sub)))
            }
            ExtensionType::RenegotiationInfo => {
                ServerExtension::RenegotiationInfo(try_ret!(PayloadU8::read(&mut sub)))
            }
            _ => ServerExtension::Unknown(try_ret!(UnknownExtension::read(typ, &mut sub))),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClientHelloPayload {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionID,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<Compression>,
    pub extensions: Vec<ClientExtension>,
}

impl Codec for ClientHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.client_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        codec::encode_vec_u16(bytes, &self.cipher_suites);
        codec::encode_vec_u8(bytes, &self.compression_methods);

        if !self.extensions.is_empty() {
            codec::encode_vec_u16(bytes, &self.extensions);
        }
    }

    fn read(r: &mut Reader) -> Option<ClientHelloPayload> {
        let mut ret = ClientHelloPayload {
            client_version: try_ret!(ProtocolVersion::read(r)),
            random: try_ret!(Random::read(r)),
            session_id: try_ret!(SessionID::read(r)),
            cipher_suites: try_ret!(codec::read_vec_u16::<CipherSuite>(r)),
            compression_methods: try_ret!(codec::read_vec_u8::<Compression>(r)),
            extensions: Vec::new(),
        };

        if r.any_left() {
            ret.extensions = try_ret!(codec::read_vec_u16::<ClientExtension>(r));
        }

        Some(ret)
    }
}

impl ClientHelloPayload {
    pub fn offers_compression(&self, c: Compression) -> bool {
        self.compression_methods.contains(&c)
    }

    pub fn offers_suite(&self, suite: CipherSuite) -> bool {
        self.cipher_suites.contains(&suite)
    }
}

#[derive(Debug, Clone)]
pub struct ServerHelloPayload {
    pub server_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionID,
    pub cipher_suite: CipherSuite,
    pub compression_method: Compression,
    pub extensions: Vec<ServerExtension>,
}

impl Codec for ServerHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.server_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        self.cipher_suite.encode(bytes);
        self.compression_method.encode(bytes);

        if !self.extensions.is_empty() {
            codec::encode_vec_u16(bytes, &self.extensions);
        }
    }

    fn read(r: &mut Reader) -> Option<ServerHelloPayload> {
        let mut ret = ServerHelloPayload {
            server_version: try_ret!(ProtocolVersion::read(r)),
            random: try_ret!(Random::read(r)),
            session_id: try_ret!(SessionID::read(r)),
            cipher_suite: try_ret!(CipherSuite::read(r)),
            compression_method: try_ret!(Compression::read(r)),
            extensions: Vec::new(),
        };

        if r.any_left() {
            ret.extensions = try_ret!(codec::read_vec_u16::<ServerExtension>(r));
        }

        Some(ret)
    }
}

pub type CertificatePayload = Vec<key::Certificate>;

impl Codec for CertificatePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::encode_vec_u24(bytes, self);
    }

    fn read(r: &mut Reader) -> Option<CertificatePayload> {
        codec::read_vec_u24::<key::Certificate>(r)
    }
}

#[derive(Debug, Clone)]
pub struct ECParameters {
    pub curve_type: ECCurveType,
    pub named_curve: NamedCurve,
}

impl Codec for ECParameters {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.curve_type.encode(bytes);
        self.named_curve.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<ECParameters> {
        let curve_type = try_ret!(ECCurveType::read(r));
        if curve_type != ECCurveType::NamedCurve {
            return None;
        }

        let named_curve = try_ret!(NamedCurve::read(r));
        Some(ECParameters {
            curve_type,
            named_curve,
        })
    }
}

/// The signed portion of a ServerKeyExchange: curve naming plus the
/// server's ephemeral public point.
#[derive(Debug, Clone)]
pub struct ServerECDHParams {
    pub curve_params: ECParameters,
    pub public: PayloadU8,
}

impl ServerECDHParams {
    pub fn new(named_curve: NamedCurve, pubkey: &[u8]) -> ServerECDHParams {
        ServerECDHParams {
            curve_params: ECParameters {
                curve_type: ECCurveType::NamedCurve,
                named_curve,
            },
            public: PayloadU8::new(pubkey.to_vec()),
        }
    }
}

impl Codec for ServerECDHParams {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.curve_params.encode(bytes);
        self.public.encode(bytes);
    }

    fn read(r: &mut Reader) -> Option<ServerECDHParams> {
        let cp = try_ret!(ECParameters::read(r));
        let pb = try_ret!(PayloadU8::read(r));

        Some(ServerECDHParams {
            curve_params: cp,
            public: pb,
        })
    }
}

/// A signature and, for TLS 1.2, the algorithm pair it was made with.
/// Earlier versions imply the algorithm from the cipher suite.
#[derive(Debug, Clone)]
pub struct DigitallySignedStruct {
    pub alg: Option<SignatureAndHashAlgorithm>,
    pub sig: PayloadU16,
}

impl DigitallySignedStruct {
    pub fn new(alg: Option<SignatureAndHashAlgorithm>, sig: Vec<u8>) -> DigitallySignedStruct {
        DigitallySignedStruct {
            alg,
            sig: PayloadU16::new(sig),
        }
    }

    pub fn read_version(r: &mut Reader, version: ProtocolVersion) -> Option<DigitallySignedStruct> {
        let alg = if version.is_atleast(ProtocolVersion::TLSv1_2) {
            Some(try_ret!(SignatureAndHashAlgorithm::read(r)))
        } else {
            None
        };

        let sig = try_ret!(PayloadU16::read(r));
        Some(DigitallySignedStruct { alg, sig })
    }

    pub fn encode(&self, bytes: &mut Vec<u8>) {
        if let Some(ref alg) = self.alg {
            alg.encode(bytes);
        }
        self.sig.encode(bytes);
    }
}

#[derive(Debug, Clone)]
pub struct ECDHEServerKeyExchange {
    pub params: ServerECDHParams,
    pub dss: DigitallySignedStruct,
}

impl ECDHEServerKeyExchange {
    pub fn encode(&self, bytes: &mut Vec<u8>) {
        self.params.encode(bytes);
        self.dss.encode(bytes);
    }
}

/// ServerKeyExchange bodies can only be parsed once the key exchange
/// algorithm is known, so they are captured opaque first.
#[derive(Debug, Clone)]
pub enum ServerKeyExchangePayload {
    ECDHE(ECDHEServerKeyExchange),
    Unknown(Payload),
}

impl Codec for ServerKeyExchangePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        match *self {
            ServerKeyExchangePayload::ECDHE(ref x) => x.encode(bytes),
            ServerKeyExchangePayload::Unknown(ref x) => x.encode(bytes),
        }
    }

    fn read(r: &mut Reader) -> Option<ServerKeyExchangePayload> {
        Payload::read(r).map(ServerKeyExchangePayload::Unknown)
    }
}

impl ServerKeyExchangePayload {
    pub fn unwrap_ecdhe(&self, version: ProtocolVersion) -> Option<ECDHEServerKeyExchange> {
        if let ServerKeyExchangePayload::Unknown(ref raw) = *self {
            let mut rd = Reader::init(&raw.0);

            let params = try_ret!(ServerECDHParams::read(&mut rd));
            let dss = try_ret!(DigitallySignedStruct::read_version(&mut rd, version));

            if rd.any_left() {
                return None;
            }

            return Some(ECDHEServerKeyExchange { params, dss });
        }

        None
    }
}

/// A DER-encoded DistinguishedName, carried opaque.
pub type DistinguishedName = PayloadU16;

#[derive(Debug, Clone)]
pub struct CertificateRequestPayload {
    pub certtypes: Vec<ClientCertificateType>,
    pub sigalgs: SupportedSignatureAlgorithms,
    pub canames: Vec<DistinguishedName>,
}

impl CertificateRequestPayload {
    fn read_version(r: &mut Reader, version: ProtocolVersion) -> Option<CertificateRequestPayload> {
        let certtypes = try_ret!(codec::read_vec_u8::<ClientCertificateType>(r));

        let sigalgs = if version.is_atleast(ProtocolVersion::TLSv1_2) {
            try_ret!(SupportedSignatureAlgorithms::read(r))
        } else {
            Vec::new()
        };

        let canames = try_ret!(codec::read_vec_u16::<DistinguishedName>(r));

        Some(CertificateRequestPayload {
            certtypes,
            sigalgs,
            canames,
        })
    }

    fn encode(&self, bytes: &mut Vec<u8>) {
        codec::encode_vec_u8(bytes, &self.certtypes);

        if !self.sigalgs.is_empty() {
            self.sigalgs.encode(bytes);
        }

        codec::encode_vec_u16(bytes, &self.canames);
    }
}

#[derive(Debug, Clone)]
pub enum HandshakePayload {
    HelloRequest,
    ClientHello(ClientHelloPayload),
    ServerHello(ServerHelloPayload),
    Certificate(CertificatePayload),
    ServerKeyExchange(ServerKeyExchangePayload),
    CertificateRequest(CertificateRequestPayload),
    ServerHelloDone,
    CertificateVerify(Payload),
    ClientKeyExchange(Payload),
    Finished(Payload),
    Unknown(Payload),
}

impl HandshakePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        match *self {
            HandshakePayload::HelloRequest | HandshakePayload::ServerHelloDone => {}
            HandshakePayload::ClientHello(ref x) => x.encode(bytes),
            HandshakePayload::ServerHello(ref x) => x.encode(bytes),
            HandshakePayload::Certificate(ref x) => x.encode(bytes),
            HandshakePayload::ServerKeyExchange(ref x) => x.encode(bytes),
            HandshakePayload::CertificateRequest(ref x) => x.encode(bytes),
            HandshakePayload::CertificateVerify(ref x) => x.encode(bytes),
            HandshakePayload::ClientKeyExchange(ref x) => x.encode(bytes),
            HandshakePayload::Finished(ref x) => x.encode(bytes),
            HandshakePayload::Unknown(ref x) => x.encode(bytes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandshakeMessagePayload {
    pub typ: HandshakeType,
    pub payload: HandshakePayload,
}

impl HandshakeMessagePayload {
    pub fn read_version(r: &mut Reader, version: ProtocolVersion) -> Option<HandshakeMessagePayload> {
        let typ = try_ret!(HandshakeType::read(r));
        let len = try_ret!(codec::read_u24(r)) as usize;
        let mut sub = try_ret!(r.sub(len));

        let payload = match typ {
            HandshakeType::HelloRequest if sub.left() == 0 => HandshakePayload::HelloRequest,
            HandshakeType::ClientHello => {
                HandshakePayload::ClientHello(try_ret!(ClientHelloPayload::read(&mut sub)))
            }
            HandshakeType::ServerHello => {
                HandshakePayload::ServerHello(try_ret!(ServerHelloPayload::read(&mut sub)))
            }
            HandshakeType::Certificate => {
                HandshakePayload::Certificate(try_ret!(CertificatePayload::read(&mut sub)))
            }
            HandshakeType::ServerKeyExchange => {
                HandshakePayload::ServerKeyExchange(try_ret!(ServerKeyExchangePayload::read(
                    &mut sub
                )))
            }
            HandshakeType::CertificateRequest => HandshakePayload::CertificateRequest(try_ret!(
                CertificateRequestPayload::read_version(&mut sub, version)
            )),
            HandshakeType::ServerHelloDone if sub.left() == 0 => HandshakePayload::ServerHelloDone,
            HandshakeType::CertificateVerify => {
                HandshakePayload::CertificateVerify(try_ret!(Payload::read(&mut sub)))
            }
            HandshakeType::ClientKeyExchange => {
                HandshakePayload::ClientKeyExchange(try_ret!(Payload::read(&mut sub)))
            }
            HandshakeType::Finished => {
                HandshakePayload::Finished(try_ret!(Payload::read(&mut sub)))
            }
            _ => HandshakePayload::Unknown(try_ret!(Payload::read(&mut sub))),
        };

        if sub.any_left() {
            return None;
        }

        Some(HandshakeMessagePayload { typ, payload })
    }

    pub fn len(&self) -> usize {
        self.get_encoding().len()
    }
}

impl Codec for HandshakeMessagePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        // encode the body first, to learn its length
        let mut sub: Vec<u8> = Vec::new();
        self.payload.encode(&mut sub);

        self.typ.encode(bytes);
        codec::encode_u24(sub.len() as u32, bytes);
        bytes.append(&mut sub);
    }

    fn read(r: &mut Reader) -> Option<HandshakeMessagePayload> {
        HandshakeMessagePayload::read_version(r, ProtocolVersion::TLSv1_2)
    }
}
