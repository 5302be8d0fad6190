use crate::msgs::enums::{HashAlgorithm, ProtocolVersion};

use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384};

/// P_hash from RFC 5246 section 5: expand `secret` keyed HMAC output
/// over `seed` until `out` is full.
fn p_hash<M: Mac + hmac::digest::KeyInit>(out: &mut [u8], secret: &[u8], seed: &[u8]) {
    // A(1)
    let mut current_a = {
        let mut ctx = <M as hmac::digest::KeyInit>::new_from_slice(secret)
            .expect("hmac accepts any key length");
        ctx.update(seed);
        ctx.finalize().into_bytes()
    };

    let mut offs = 0;
    while offs < out.len() {
        // P_hash[i] = HMAC_hash(secret, A(i) + seed)
        let mut ctx = <M as hmac::digest::KeyInit>::new_from_slice(secret)
            .expect("hmac accepts any key length");
        ctx.update(&current_a);
        ctx.update(seed);
        let p_term = ctx.finalize().into_bytes();

        let take = std::cmp::min(p_term.len(), out.len() - offs);
        out[offs..offs + take].copy_from_slice(&p_term[..take]);
        offs += take;

        // A(i+1) = HMAC_hash(secret, A(i))
        let mut ctx = <M as hmac::digest::KeyInit>::new_from_slice(secret)
            .expect("hmac accepts any key length");
        ctx.update(&current_a);
        current_a = ctx.finalize().into_bytes();
    }
}

fn concat(label: &[u8], seed: &[u8]) -> Vec<u8> {
    let mut ret = Vec::with_capacity(label.len() + seed.len());
    ret.extend_from_slice(label);
    ret.extend_from_slice(seed);
    ret
}

/// The TLS 1.2 PRF: P_hash with the suite's PRF hash.
pub fn prf_tls12(out: &mut [u8], hash: HashAlgorithm, secret: &[u8], label: &[u8], seed: &[u8]) {
    let joined_seed = concat(label, seed);

    match hash {
        HashAlgorithm::SHA256 => p_hash::<Hmac<Sha256>>(out, secret, &joined_seed),
        HashAlgorithm::SHA384 => p_hash::<Hmac<Sha384>>(out, secret, &joined_seed),
        _ => unreachable!("suite registry only carries SHA256/SHA384 PRFs"),
    }
}

/// The TLS 1.0/1.1 PRF (RFC 2246 section 5): the secret is split into
/// halves feeding P_MD5 and P_SHA1, whose outputs are XORed.
pub fn prf_legacy(out: &mut [u8], secret: &[u8], label: &[u8], seed: &[u8]) {
    let joined_seed = concat(label, seed);

    let half = (secret.len() + 1) / 2;
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let mut md5_out = vec![0u8; out.len()];
    p_hash::<Hmac<Md5>>(&mut md5_out, s1, &joined_seed);
    p_hash::<Hmac<Sha1>>(out, s2, &joined_seed);

    for (o, m) in out.iter_mut().zip(md5_out) {
        *o ^= m;
    }
}

/// Dispatch on the negotiated version.
pub fn prf(
    out: &mut [u8],
    version: ProtocolVersion,
    hash: HashAlgorithm,
    secret: &[u8],
    label: &[u8],
    seed: &[u8],
) {
    if version.is_atleast(ProtocolVersion::TLSv1_2) {
        prf_tls12(out, hash, secret, label, seed);
    } else {
        prf_legacy(out, secret, label, seed);
    }
}
