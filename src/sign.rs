use crate::error::TlsError;
use crate::key;
use crate::msgs::enums::{HashAlgorithm, ProtocolVersion, SignatureAlgorithm};
use crate::msgs::handshake::SignatureAndHashAlgorithm;

use md5::{Digest, Md5};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey};
use sha1::Sha1;
use sha2::Sha256;

/// A server's RSA key: signs key exchange parameters and unwraps
/// RSA-transported premaster secrets.
pub struct RsaSigner {
    key: RsaPrivateKey,
}

impl RsaSigner {
    /// Make a new `RsaSigner` from a DER encoding, in either PKCS#8
    /// or PKCS#1 format.
    pub fn new(der: &key::PrivateKey) -> Result<RsaSigner, ()> {
        RsaPrivateKey::from_pkcs8_der(&der.0)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(&der.0))
            .map(|key| RsaSigner { key })
            .map_err(|_| ())
    }

    pub fn from_key(key: RsaPrivateKey) -> RsaSigner {
        RsaSigner { key }
    }

    /// Sign the ServerKeyExchange input.  TLS 1.2 names the algorithm
    /// pair on the wire; earlier versions imply RSA over MD5+SHA1.
    pub fn sign_kx(
        &self,
        version: ProtocolVersion,
        message: &[u8],
    ) -> Result<(Option<SignatureAndHashAlgorithm>, Vec<u8>), TlsError> {
        if version.is_atleast(ProtocolVersion::TLSv1_2) {
            let sig = self
                .key
                .sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(message))
                .map_err(|_| TlsError::General("kx signing failed".to_string()))?;

            Ok((
                Some(SignatureAndHashAlgorithm {
                    hash: HashAlgorithm::SHA256,
                    sign: SignatureAlgorithm::RSA,
                }),
                sig,
            ))
        } else {
            let mut digest = Md5::digest(message).to_vec();
            digest.extend_from_slice(&Sha1::digest(message));

            let sig = self
                .key
                .sign(Pkcs1v15Sign::new_unprefixed(), &digest)
                .map_err(|_| TlsError::General("kx signing failed".to_string()))?;

            Ok((None, sig))
        }
    }

    /// Unwrap an RSA-transported premaster secret.  Failure is
    /// indistinct by design: the caller substitutes a random
    /// premaster rather than reporting anything.
    pub fn decrypt_premaster(&self, ciphertext: &[u8]) -> Result<Vec<u8>, ()> {
        self.key
            .decrypt(Pkcs1v15Encrypt, ciphertext)
            .map_err(|_| ())
    }
}
