use crate::msgs::enums::{HashAlgorithm, ProtocolVersion};

use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::{Sha256, Sha384};

/// The running handshake transcript: the exact bytes of every
/// handshake message (headers included) exchanged this epoch,
/// `hello_request` excepted.
///
/// The digest over it cannot be maintained incrementally, because
/// which hash applies is not known until the suite is negotiated, and
/// TLS 1.0/1.1 need both MD5 and SHA1.  So the raw bytes are kept and
/// hashed on demand.
pub struct HandshakeHash {
    buffer: Vec<u8>,
}

impl HandshakeHash {
    pub fn new() -> HandshakeHash {
        HandshakeHash { buffer: Vec::new() }
    }

    pub fn update_raw(&mut self, buf: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(buf);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The transcript hash Finished verification works over: the
    /// suite's PRF hash for TLS 1.2, MD5 then SHA1 concatenated for
    /// earlier versions.
    pub fn transcript_digest(&self, version: ProtocolVersion, prf_hash: HashAlgorithm) -> Vec<u8> {
        if version.is_atleast(ProtocolVersion::TLSv1_2) {
            match prf_hash {
                HashAlgorithm::SHA256 => Sha256::digest(&self.buffer).to_vec(),
                HashAlgorithm::SHA384 => Sha384::digest(&self.buffer).to_vec(),
                _ => unreachable!("suite registry only carries SHA256/SHA384 PRFs"),
            }
        } else {
            let mut out = Md5::digest(&self.buffer).to_vec();
            out.extend_from_slice(&Sha1::digest(&self.buffer));
            out
        }
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::HandshakeHash;
    use crate::msgs::enums::{HashAlgorithm, ProtocolVersion};

    #[test]
    fn legacy_digest_is_md5_then_sha1() {
        let mut hh = HandshakeHash::new();
        hh.update_raw(b"abc");

        let digest = hh.transcript_digest(ProtocolVersion::TLSv1_0, HashAlgorithm::SHA256);
        assert_eq!(digest.len(), 16 + 20);
        assert_eq!(
            &digest[..16],
            b"\x90\x01\x50\x98\x3c\xd2\x4f\xb0\xd6\x96\x3f\x7d\x28\xe1\x7f\x72"
        );
        assert_eq!(
            &digest[16..],
            b"\xa9\x99\x3e\x36\x47\x06\x81\x6a\xba\x3e\x25\x71\x78\x50\xc2\x6c\x9c\xd0\xd8\x9d"
        );
    }

    #[test]
    fn tls12_digest_is_suite_hash() {
        let mut hh = HandshakeHash::new();
        hh.update_raw(b"abc");

        let digest = hh.transcript_digest(ProtocolVersion::TLSv1_2, HashAlgorithm::SHA256);
        assert_eq!(
            digest,
            b"\xba\x78\x16\xbf\x8f\x01\xcf\xea\x41\x41\x40\xde\x5d\xae\x22\x23\
              \xb0\x03\x61\xa3\x96\x17\x7a\x9c\xb4\x10\xff\x61\xf2\x00\x15\xad"
                .to_vec()
        );
    }

    #[test]
    fn accumulation_order_matters() {
        let mut one = HandshakeHash::new();
        one.update_raw(b"ab").update_raw(b"c");

        let mut two = HandshakeHash::new();
        two.update_raw(b"c").update_raw(b"ab");

        assert_ne!(
            one.transcript_digest(ProtocolVersion::TLSv1_2, HashAlgorithm::SHA256),
            two.transcript_digest(ProtocolVersion::TLSv1_2, HashAlgorithm::SHA256)
        );

        one.clear();
        assert!(one.is_empty());
    }
}
