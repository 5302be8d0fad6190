use crate::error::TlsError;
use crate::key;
use crate::msgs::enums::{HashAlgorithm, ProtocolVersion, SignatureAlgorithm};
use crate::msgs::handshake::DigitallySignedStruct;
use crate::x509;

use md5::{Digest, Md5};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384};

/// Take the end-entity certificate from a chain.  Chain validation is
/// a job for the surrounding application, not this crate.
pub fn get_leaf(chain: &[key::Certificate]) -> Result<&key::Certificate, TlsError> {
    chain
        .first()
        .ok_or(TlsError::InvalidCertificate("empty certificate chain"))
}

/// Pull an RSA public key out of `cert`: either a DER certificate
/// whose SubjectPublicKeyInfo we walk to, or a bare DER SPKI.
pub fn extract_rsa_public_key(cert: &key::Certificate) -> Result<RsaPublicKey, TlsError> {
    if let Ok(key) = RsaPublicKey::from_public_key_der(cert.as_ref()) {
        return Ok(key);
    }

    let spki = x509::extract_spki(cert.as_ref())
        .ok_or(TlsError::InvalidCertificate("unparseable certificate"))?;

    RsaPublicKey::from_public_key_der(spki)
        .map_err(|_| TlsError::InvalidCertificate("unsupported subject public key"))
}

/// The digest-and-padding scheme a ServerKeyExchange signature uses:
/// RSA-PKCS#1 over the named hash for TLS 1.2, RSA-PKCS#1 over a raw
/// MD5+SHA1 concatenation before that.
pub fn verify_kx_signature(
    version: ProtocolVersion,
    dss: &DigitallySignedStruct,
    message: &[u8],
    pubkey: &RsaPublicKey,
) -> Result<(), TlsError> {
    let result = if version.is_atleast(ProtocolVersion::TLSv1_2) {
        let alg = dss
            .alg
            .as_ref()
            .ok_or(TlsError::IllegalParameter("missing signature algorithm"))?;

        if alg.sign != SignatureAlgorithm::RSA {
            return Err(TlsError::IllegalParameter("unsupported signature algorithm"));
        }

        match alg.hash {
            HashAlgorithm::SHA1 => {
                pubkey.verify(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(message), &dss.sig.0)
            }
            HashAlgorithm::SHA256 => pubkey.verify(
                Pkcs1v15Sign::new::<Sha256>(),
                &Sha256::digest(message),
                &dss.sig.0,
            ),
            HashAlgorithm::SHA384 => pubkey.verify(
                Pkcs1v15Sign::new::<Sha384>(),
                &Sha384::digest(message),
                &dss.sig.0,
            ),
            _ => return Err(TlsError::IllegalParameter("unsupported signature hash")),
        }
    } else {
        let mut digest = Md5::digest(message).to_vec();
        digest.extend_from_slice(&Sha1::digest(message));
        pubkey.verify(Pkcs1v15Sign::new_unprefixed(), &digest, &dss.sig.0)
    };

    result.map_err(|_| TlsError::InvalidHandshakeProof)
}

/// RSA key transport: seal the premaster secret under the server's
/// public key.
pub fn encrypt_premaster(pubkey: &RsaPublicKey, premaster: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut rng = rand::rngs::OsRng;
    pubkey
        .encrypt(&mut rng, Pkcs1v15Encrypt, premaster)
        .map_err(|_| TlsError::General("premaster encryption failed".to_string()))
}
