use crate::msgs::enums::{CipherSuite, HashAlgorithm, ProtocolVersion, SignatureAlgorithm};

#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KeyExchangeAlgorithm {
    RSA,
    ECDHE_RSA,
}

#[allow(non_camel_case_types)]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BulkAlgorithm {
    AES_128_CBC,
    AES_256_CBC,
    RC4_128,
}

impl BulkAlgorithm {
    pub fn is_stream(&self) -> bool {
        matches!(*self, BulkAlgorithm::RC4_128)
    }
}

/// A cipher suite supported by this crate, with everything the record
/// layer and key schedule need to know about it.
#[derive(Debug)]
pub struct SupportedCipherSuite {
    /// The TLS enumeration naming this cipher suite.
    pub suite: CipherSuite,
    pub kx: KeyExchangeAlgorithm,
    pub sign: SignatureAlgorithm,
    pub bulk: BulkAlgorithm,

    /// The hash HMACed over each record.
    pub mac: HashAlgorithm,

    /// The PRF hash, used for TLS 1.2 key derivation and transcript
    /// hashing.  Earlier versions use MD5/SHA1 regardless.
    pub hash: HashAlgorithm,

    pub mac_key_len: usize,
    pub enc_key_len: usize,

    /// Cipher block size; zero for stream suites.
    pub block_len: usize,

    /// IV material taken from the key block (seeds the TLS 1.0 CBC
    /// chain; later versions put a fresh IV in each record).
    pub fixed_iv_len: usize,

    /// The lowest protocol version this suite may be used with.
    pub min_version: ProtocolVersion,
}

impl PartialEq for SupportedCipherSuite {
    fn eq(&self, other: &SupportedCipherSuite) -> bool {
        self.suite == other.suite
    }
}

impl SupportedCipherSuite {
    pub fn key_block_len(&self) -> usize {
        (self.mac_key_len + self.enc_key_len + self.fixed_iv_len) * 2
    }

    pub fn mac_len(&self) -> usize {
        match self.mac {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA256 => 32,
            _ => unreachable!("registry only carries MD5/SHA1/SHA256 MACs"),
        }
    }

    /// Length of Finished verify_data under this suite.
    pub fn verify_data_len(&self) -> usize {
        12
    }

    pub fn is_ecdhe(&self) -> bool {
        self.kx == KeyExchangeAlgorithm::ECDHE_RSA
    }

    pub fn usable_for_version(&self, version: ProtocolVersion) -> bool {
        version.is_atleast(self.min_version)
    }
}

pub static TLS_RSA_WITH_RC4_128_MD5: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_RSA_WITH_RC4_128_MD5,
    kx: KeyExchangeAlgorithm::RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::RC4_128,
    mac: HashAlgorithm::MD5,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 16,
    enc_key_len: 16,
    block_len: 0,
    fixed_iv_len: 0,
    min_version: ProtocolVersion::TLSv1_0,
};

pub static TLS_RSA_WITH_RC4_128_SHA: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_RSA_WITH_RC4_128_SHA,
    kx: KeyExchangeAlgorithm::RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::RC4_128,
    mac: HashAlgorithm::SHA1,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 20,
    enc_key_len: 16,
    block_len: 0,
    fixed_iv_len: 0,
    min_version: ProtocolVersion::TLSv1_0,
};

pub static TLS_RSA_WITH_AES_128_CBC_SHA: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
    kx: KeyExchangeAlgorithm::RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::AES_128_CBC,
    mac: HashAlgorithm::SHA1,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 20,
    enc_key_len: 16,
    block_len: 16,
    fixed_iv_len: 16,
    min_version: ProtocolVersion::TLSv1_0,
};

pub static TLS_RSA_WITH_AES_256_CBC_SHA: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
    kx: KeyExchangeAlgorithm::RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::AES_256_CBC,
    mac: HashAlgorithm::SHA1,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 20,
    enc_key_len: 32,
    block_len: 16,
    fixed_iv_len: 16,
    min_version: ProtocolVersion::TLSv1_0,
};

pub static TLS_RSA_WITH_AES_128_CBC_SHA256: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256,
    kx: KeyExchangeAlgorithm::RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::AES_128_CBC,
    mac: HashAlgorithm::SHA256,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 32,
    enc_key_len: 16,
    block_len: 16,
    fixed_iv_len: 16,
    min_version: ProtocolVersion::TLSv1_2,
};

pub static TLS_RSA_WITH_AES_256_CBC_SHA256: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256,
    kx: KeyExchangeAlgorithm::RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::AES_256_CBC,
    mac: HashAlgorithm::SHA256,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 32,
    enc_key_len: 32,
    block_len: 16,
    fixed_iv_len: 16,
    min_version: ProtocolVersion::TLSv1_2,
};

pub static TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    kx: KeyExchangeAlgorithm::ECDHE_RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::AES_128_CBC,
    mac: HashAlgorithm::SHA1,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 20,
    enc_key_len: 16,
    block_len: 16,
    fixed_iv_len: 16,
    min_version: ProtocolVersion::TLSv1_0,
};

pub static TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    kx: KeyExchangeAlgorithm::ECDHE_RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::AES_256_CBC,
    mac: HashAlgorithm::SHA1,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 20,
    enc_key_len: 32,
    block_len: 16,
    fixed_iv_len: 16,
    min_version: ProtocolVersion::TLSv1_0,
};

pub static TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: SupportedCipherSuite = SupportedCipherSuite {
    suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
    kx: KeyExchangeAlgorithm::ECDHE_RSA,
    sign: SignatureAlgorithm::RSA,
    bulk: BulkAlgorithm::AES_128_CBC,
    mac: HashAlgorithm::SHA256,
    hash: HashAlgorithm::SHA256,
    mac_key_len: 32,
    enc_key_len: 16,
    block_len: 16,
    fixed_iv_len: 16,
    min_version: ProtocolVersion::TLSv1_2,
};

/// All the cipher suites this crate supports, strongest first.
pub static ALL_CIPHERSUITES: [&SupportedCipherSuite; 9] = [
    &TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
    &TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
    &TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
    &TLS_RSA_WITH_AES_256_CBC_SHA256,
    &TLS_RSA_WITH_AES_128_CBC_SHA256,
    &TLS_RSA_WITH_AES_256_CBC_SHA,
    &TLS_RSA_WITH_AES_128_CBC_SHA,
    &TLS_RSA_WITH_RC4_128_SHA,
    &TLS_RSA_WITH_RC4_128_MD5,
];

/// Walk `ours` in priority order; the first suite the peer also
/// offers, with rsa authentication and a low enough floor for
/// `version`, wins.
pub fn choose_ciphersuite(
    peer_offers: &[CipherSuite],
    ours: &[&'static SupportedCipherSuite],
    version: ProtocolVersion,
) -> Option<&'static SupportedCipherSuite> {
    ours.iter()
        .find(|scs| {
            peer_offers.contains(&scs.suite)
                && scs.sign == SignatureAlgorithm::RSA
                && scs.usable_for_version(version)
        })
        .copied()
}

/// Find the registry entry for `suite` within `ours`.
pub fn find_in_list(
    suite: CipherSuite,
    ours: &[&'static SupportedCipherSuite],
) -> Option<&'static SupportedCipherSuite> {
    ours.iter().find(|scs| scs.suite == suite).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::enums::{CipherSuite, ProtocolVersion};

    #[test]
    fn server_preference_wins() {
        let peer = vec![
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
        ];
        let ours: Vec<&'static SupportedCipherSuite> = ALL_CIPHERSUITES.to_vec();

        let chosen = choose_ciphersuite(&peer, &ours, ProtocolVersion::TLSv1_2).unwrap();
        assert_eq!(chosen, &TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA);
    }

    #[test]
    fn version_floor_excludes_sha256_suites() {
        let peer = vec![
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256,
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
        ];
        let ours: Vec<&'static SupportedCipherSuite> = ALL_CIPHERSUITES.to_vec();

        let chosen = choose_ciphersuite(&peer, &ours, ProtocolVersion::TLSv1_1).unwrap();
        assert_eq!(chosen, &TLS_RSA_WITH_AES_128_CBC_SHA);
    }

    #[test]
    fn no_overlap_gives_none() {
        let peer = vec![CipherSuite::Unknown(0x1234)];
        let ours: Vec<&'static SupportedCipherSuite> = ALL_CIPHERSUITES.to_vec();

        assert!(choose_ciphersuite(&peer, &ours, ProtocolVersion::TLSv1_2).is_none());
    }

    #[test]
    fn key_block_lengths() {
        assert_eq!(TLS_RSA_WITH_AES_128_CBC_SHA.key_block_len(), 104);
        assert_eq!(TLS_RSA_WITH_RC4_128_SHA.key_block_len(), 72);
        assert_eq!(TLS_RSA_WITH_AES_256_CBC_SHA256.key_block_len(), 160);
    }
}
