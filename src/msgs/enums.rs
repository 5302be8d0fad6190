use crate::msgs::codec::{encode_u16, read_u16, Codec, Reader};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ProtocolVersion {
    SSLv2,
    SSLv3,
    TLSv1_0,
    TLSv1_1,
    TLSv1_2,
    Unknown(u16),
}

impl ProtocolVersion {
    pub fn get_u16(&self) -> u16 {
        match *self {
            ProtocolVersion::SSLv2 => 0x0200,
            ProtocolVersion::SSLv3 => 0x0300,
            ProtocolVersion::TLSv1_0 => 0x0301,
            ProtocolVersion::TLSv1_1 => 0x0302,
            ProtocolVersion::TLSv1_2 => 0x0303,
            ProtocolVersion::Unknown(v) => v,
        }
    }

    /// True for any 0x03XX version, ie. something that shares the
    /// TLS record layer framing.
    pub fn is_tls_family(&self) -> bool {
        (self.get_u16() & 0xff00) == 0x0300
    }

    pub fn is_atleast(&self, other: ProtocolVersion) -> bool {
        self.get_u16() >= other.get_u16()
    }
}

impl Codec for ProtocolVersion {
    fn encode(&self, bytes: &mut Vec<u8>) {
        encode_u16(self.get_u16(), bytes);
    }

    fn read(r: &mut Reader) -> Option<ProtocolVersion> {
        Some(match try_ret!(read_u16(r)) {
            0x0200 => ProtocolVersion::SSLv2,
            0x0300 => ProtocolVersion::SSLv3,
            0x0301 => ProtocolVersion::TLSv1_0,
            0x0302 => ProtocolVersion::TLSv1_1,
            0x0303 => ProtocolVersion::TLSv1_2,
            x => ProtocolVersion::Unknown(x),
        })
    }
}

wire_enum! {@U8
    ContentType {
        ChangeCipherSpec => 0x14,
        Alert => 0x15,
        Handshake => 0x16,
        ApplicationData => 0x17,
    }
}

wire_enum! {@U8
    HandshakeType {
        HelloRequest => 0x00,
        ClientHello => 0x01,
        ServerHello => 0x02,
        Certificate => 0x0b,
        ServerKeyExchange => 0x0c,
        CertificateRequest => 0x0d,
        ServerHelloDone => 0x0e,
        CertificateVerify => 0x0f,
        ClientKeyExchange => 0x10,
        Finished => 0x14,
    }
}

wire_enum! {@U8
    AlertLevel {
        Warning => 0x01,
        Fatal => 0x02,
    }
}

wire_enum! {@U8
    AlertDescription {
        CloseNotify => 0x00,
        UnexpectedMessage => 0x0a,
        BadRecordMac => 0x14,
        DecryptionFailed => 0x15,
        RecordOverflow => 0x16,
        DecompressionFailure => 0x1e,
        HandshakeFailure => 0x28,
        NoCertificate => 0x29,
        BadCertificate => 0x2a,
        UnsupportedCertificate => 0x2b,
        CertificateRevoked => 0x2c,
        CertificateExpired => 0x2d,
        CertificateUnknown => 0x2e,
        IllegalParameter => 0x2f,
        UnknownCA => 0x30,
        AccessDenied => 0x31,
        DecodeError => 0x32,
        DecryptError => 0x33,
        ExportRestriction => 0x3c,
        ProtocolVersion => 0x46,
        InsufficientSecurity => 0x47,
        InternalError => 0x50,
        UserCanceled => 0x5a,
        NoRenegotiation => 0x64,
        UnsupportedExtension => 0x6e,
    }
}

wire_enum! {@U8
    Compression {
        Null => 0x00,
        Deflate => 0x01,
    }
}

wire_enum! {@U8
    HashAlgorithm {
        NONE => 0x00,
        MD5 => 0x01,
        SHA1 => 0x02,
        SHA224 => 0x03,
        SHA256 => 0x04,
        SHA384 => 0x05,
        SHA512 => 0x06,
    }
}

wire_enum! {@U8
    SignatureAlgorithm {
        Anonymous => 0x00,
        RSA => 0x01,
        DSA => 0x02,
        ECDSA => 0x03,
    }
}

wire_enum! {@U8
    ClientCertificateType {
        RSASign => 0x01,
        DSSSign => 0x02,
        RSAFixedDH => 0x03,
        DSSFixedDH => 0x04,
        RSAEphemeralDH => 0x05,
        DSSEphemeralDH => 0x06,
        FortezzaDMS => 0x14,
        ECDSASign => 0x40,
    }
}

wire_enum! {@U8
    ECCurveType {
        ExplicitPrime => 0x01,
        ExplicitChar2 => 0x02,
        NamedCurve => 0x03,
    }
}

wire_enum! {@U8
    ECPointFormat {
        Uncompressed => 0x00,
        ANSIX962CompressedPrime => 0x01,
        ANSIX962CompressedChar2 => 0x02,
    }
}

wire_enum! {@U16
    NamedCurve {
        secp256r1 => 0x0017,
        secp384r1 => 0x0018,
        secp521r1 => 0x0019,
        X25519 => 0x001d,
    }
}

wire_enum! {@U16
    ExtensionType {
        ServerName => 0x0000,
        EllipticCurves => 0x000a,
        ECPointFormats => 0x000b,
        SignatureAlgorithms => 0x000d,
        Heartbeat => 0x000f,
        SessionTicket => 0x0023,
        RenegotiationInfo => 0xff01,
    }
}

wire_enum! {@U16
    CipherSuite {
        TLS_RSA_WITH_RC4_128_MD5 => 0x0004,
        TLS_RSA_WITH_RC4_128_SHA => 0x0005,
        TLS_RSA_WITH_AES_128_CBC_SHA => 0x002f,
        TLS_RSA_WITH_AES_256_CBC_SHA => 0x0035,
        TLS_RSA_WITH_AES_128_CBC_SHA256 => 0x003c,
        TLS_RSA_WITH_AES_256_CBC_SHA256 => 0x003d,
        TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA => 0xc013,
        TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA => 0xc014,
        TLS_ECDH_anon_WITH_AES_256_CBC_SHA => 0xc019,
        TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256 => 0xc027,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::codec::{Codec, Reader};

    #[test]
    fn unknown_discriminants_survive_a_round_trip() {
        let suite = CipherSuite::read_bytes(&[0x12, 0x34]).unwrap();
        assert_eq!(suite, CipherSuite::Unknown(0x1234));
        assert_eq!(suite.get_encoding(), vec![0x12, 0x34]);

        let typ = ContentType::read_bytes(&[0x63]).unwrap();
        assert_eq!(typ, ContentType::Unknown(0x63));
        assert_eq!(typ.get_encoding(), vec![0x63]);
    }

    #[test]
    fn protocol_version_ordering() {
        assert!(ProtocolVersion::TLSv1_2.is_atleast(ProtocolVersion::TLSv1_0));
        assert!(!ProtocolVersion::TLSv1_0.is_atleast(ProtocolVersion::TLSv1_1));
        assert!(ProtocolVersion::TLSv1_1.is_tls_family());
        assert!(!ProtocolVersion::SSLv2.is_tls_family());
    }

    #[test]
    fn alert_codes_match_rfc5246() {
        assert_eq!(AlertDescription::BadRecordMac.get_u8(), 20);
        assert_eq!(AlertDescription::RecordOverflow.get_u8(), 22);
        assert_eq!(AlertDescription::ProtocolVersion.get_u8(), 70);
        assert_eq!(AlertDescription::InternalError.get_u8(), 80);

        let mut r = Reader::init(&[0x2f]);
        assert_eq!(
            AlertDescription::read(&mut r),
            Some(AlertDescription::IllegalParameter)
        );
    }
}
