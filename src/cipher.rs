use crate::error::TlsError;
use crate::msgs::codec;
use crate::msgs::codec::Codec;
use crate::msgs::enums::{ContentType, HashAlgorithm, ProtocolVersion};
use crate::msgs::fragmenter::MAX_FRAGMENT_LEN;
use crate::msgs::message::{BorrowMessage, Message, MessagePayload};
use crate::rand;
use crate::session::SessionSecrets;
use crate::suites::{BulkAlgorithm, SupportedCipherSuite};

use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use md5::Md5;
use rc4::{consts::U16, KeyInit, Rc4, StreamCipher};
use sha1::Sha1;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Objects with this trait protect outgoing records.
pub trait MessageEncrypter: Send {
    fn encrypt(&mut self, m: BorrowMessage, seq: u64) -> Result<Message, TlsError>;
}

/// Objects with this trait deprotect incoming records.
pub trait MessageDecrypter: Send {
    fn decrypt(&mut self, m: Message, seq: u64) -> Result<Message, TlsError>;
}

impl dyn MessageEncrypter {
    pub fn invalid() -> Box<dyn MessageEncrypter> {
        Box::new(InvalidMessageEncrypter {})
    }
}

impl dyn MessageDecrypter {
    pub fn invalid() -> Box<dyn MessageDecrypter> {
        Box::new(InvalidMessageDecrypter {})
    }
}

pub type MessageCipherPair = (Box<dyn MessageDecrypter>, Box<dyn MessageEncrypter>);

/// The record MAC: HMAC_hash(mac_key, seq || type || version || len || body).
struct RecordMac {
    alg: HashAlgorithm,
    key: Vec<u8>,
}

impl RecordMac {
    fn new(alg: HashAlgorithm, key: &[u8]) -> RecordMac {
        RecordMac {
            alg,
            key: key.to_vec(),
        }
    }

    fn mac_len(&self) -> usize {
        match self.alg {
            HashAlgorithm::MD5 => 16,
            HashAlgorithm::SHA1 => 20,
            HashAlgorithm::SHA256 => 32,
            _ => unreachable!("registry only carries MD5/SHA1/SHA256 MACs"),
        }
    }

    fn compute(
        &self,
        seq: u64,
        typ: ContentType,
        version: ProtocolVersion,
        body: &[u8],
    ) -> Vec<u8> {
        let mut header = Vec::with_capacity(13);
        codec::encode_u64(seq, &mut header);
        typ.encode(&mut header);
        version.encode(&mut header);
        codec::encode_u16(body.len() as u16, &mut header);

        match self.alg {
            HashAlgorithm::MD5 => {
                let mut ctx = <Hmac<Md5> as Mac>::new_from_slice(&self.key)
                    .expect("hmac accepts any key length");
                ctx.update(&header);
                ctx.update(body);
                ctx.finalize().into_bytes().to_vec()
            }
            HashAlgorithm::SHA1 => {
                let mut ctx = <Hmac<Sha1> as Mac>::new_from_slice(&self.key)
                    .expect("hmac accepts any key length");
                ctx.update(&header);
                ctx.update(body);
                ctx.finalize().into_bytes().to_vec()
            }
            HashAlgorithm::SHA256 => {
                let mut ctx = <Hmac<Sha256> as Mac>::new_from_slice(&self.key)
                    .expect("hmac accepts any key length");
                ctx.update(&header);
                ctx.update(body);
                ctx.finalize().into_bytes().to_vec()
            }
            _ => unreachable!("registry only carries MD5/SHA1/SHA256 MACs"),
        }
    }
}

enum CbcKey {
    Aes128(Vec<u8>),
    Aes256(Vec<u8>),
}

impl CbcKey {
    fn new(bulk: BulkAlgorithm, key: &[u8]) -> CbcKey {
        match bulk {
            BulkAlgorithm::AES_128_CBC => CbcKey::Aes128(key.to_vec()),
            BulkAlgorithm::AES_256_CBC => CbcKey::Aes256(key.to_vec()),
            BulkAlgorithm::RC4_128 => unreachable!("rc4 is not a block cipher"),
        }
    }

    fn block_len(&self) -> usize {
        16
    }

    fn encrypt_in_place(&self, iv: &[u8], buf: &mut [u8]) -> Result<(), TlsError> {
        let len = buf.len();
        let res = match *self {
            CbcKey::Aes128(ref key) => Aes128CbcEnc::new_from_slices(key, iv)
                .map_err(|_| TlsError::General("bad cbc key material".to_string()))?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map(|_| ()),
            CbcKey::Aes256(ref key) => Aes256CbcEnc::new_from_slices(key, iv)
                .map_err(|_| TlsError::General("bad cbc key material".to_string()))?
                .encrypt_padded_mut::<NoPadding>(buf, len)
                .map(|_| ()),
        };

        res.map_err(|_| TlsError::General("block encrypt failed".to_string()))
    }

    fn decrypt_in_place(&self, iv: &[u8], buf: &mut [u8]) -> Result<(), TlsError> {
        let res = match *self {
            CbcKey::Aes128(ref key) => Aes128CbcDec::new_from_slices(key, iv)
                .map_err(|_| TlsError::DecryptError)?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map(|_| ()),
            CbcKey::Aes256(ref key) => Aes256CbcDec::new_from_slices(key, iv)
                .map_err(|_| TlsError::DecryptError)?
                .decrypt_padded_mut::<NoPadding>(buf)
                .map(|_| ()),
        };

        res.map_err(|_| TlsError::DecryptError)
    }
}

/// Make the read/write cipher pair for the suite and secrets, with
/// material role-assigned from the key block.
pub fn new_record_cipher_pair(
    scs: &'static SupportedCipherSuite,
    secrets: &SessionSecrets,
) -> MessageCipherPair {
    // Make a key block, and chop it up.
    let key_block = secrets.make_key_block();

    let mut offs = 0;
    let client_write_mac_key = &key_block[offs..offs + scs.mac_key_len];
    offs += scs.mac_key_len;
    let server_write_mac_key = &key_block[offs..offs + scs.mac_key_len];
    offs += scs.mac_key_len;
    let client_write_key = &key_block[offs..offs + scs.enc_key_len];
    offs += scs.enc_key_len;
    let server_write_key = &key_block[offs..offs + scs.enc_key_len];
    offs += scs.enc_key_len;
    let client_write_iv = &key_block[offs..offs + scs.fixed_iv_len];
    offs += scs.fixed_iv_len;
    let server_write_iv = &key_block[offs..offs + scs.fixed_iv_len];

    let (write_mac, write_key, write_iv, read_mac, read_key, read_iv) =
        if secrets.randoms.we_are_client {
            (
                client_write_mac_key,
                client_write_key,
                client_write_iv,
                server_write_mac_key,
                server_write_key,
                server_write_iv,
            )
        } else {
            (
                server_write_mac_key,
                server_write_key,
                server_write_iv,
                client_write_mac_key,
                client_write_key,
                client_write_iv,
            )
        };

    let version = secrets.version;

    match scs.bulk {
        BulkAlgorithm::AES_128_CBC | BulkAlgorithm::AES_256_CBC => (
            Box::new(CbcMessageDecrypter::new(
                scs, version, read_mac, read_key, read_iv,
            )),
            Box::new(CbcMessageEncrypter::new(
                scs, version, write_mac, write_key, write_iv,
            )),
        ),
        BulkAlgorithm::RC4_128 => (
            Box::new(StreamMessageDecrypter::new(scs, read_mac, read_key)),
            Box::new(StreamMessageEncrypter::new(scs, write_mac, write_key)),
        ),
    }
}

/// A `MessageEncrypter` for CBC suites.
///
/// TLS 1.1 and later put a fresh random IV at the front of every
/// record; TLS 1.0 chains, using the last ciphertext block.
pub struct CbcMessageEncrypter {
    key: CbcKey,
    mac: RecordMac,
    version: ProtocolVersion,
    chain_iv: Vec<u8>,
}

/// A `MessageDecrypter` for CBC suites.
pub struct CbcMessageDecrypter {
    key: CbcKey,
    mac: RecordMac,
    version: ProtocolVersion,
    chain_iv: Vec<u8>,
}

fn explicit_iv(version: ProtocolVersion) -> bool {
    version.is_atleast(ProtocolVersion::TLSv1_1)
}

impl CbcMessageEncrypter {
    fn new(
        scs: &'static SupportedCipherSuite,
        version: ProtocolVersion,
        mac_key: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> CbcMessageEncrypter {
        CbcMessageEncrypter {
            key: CbcKey::new(scs.bulk, key),
            mac: RecordMac::new(scs.mac, mac_key),
            version,
            chain_iv: iv.to_vec(),
        }
    }
}

impl MessageEncrypter for CbcMessageEncrypter {
    fn encrypt(&mut self, msg: BorrowMessage, seq: u64) -> Result<Message, TlsError> {
        let block = self.key.block_len();

        let mac = self.mac.compute(seq, msg.typ, msg.version, msg.payload);

        // body || mac || pad || pad_len, padded out to a block boundary
        let mut buf = Vec::with_capacity(msg.payload.len() + mac.len() + block);
        buf.extend_from_slice(msg.payload);
        buf.extend_from_slice(&mac);

        let pad_len = (block - ((buf.len() + 1) % block)) % block;
        for _ in 0..=pad_len {
            buf.push(pad_len as u8);
        }

        let iv = if explicit_iv(self.version) {
            rand::random_vec(block)
        } else {
            self.chain_iv.clone()
        };

        self.key.encrypt_in_place(&iv, &mut buf)?;

        let body = if explicit_iv(self.version) {
            let mut whole = iv;
            whole.extend_from_slice(&buf);
            whole
        } else {
            // next record chains from our last ciphertext block
            self.chain_iv = buf[buf.len() - block..].to_vec();
            buf
        };

        Ok(Message {
            typ: msg.typ,
            version: msg.version,
            payload: MessagePayload::opaque(body),
        })
    }
}

impl CbcMessageDecrypter {
    fn new(
        scs: &'static SupportedCipherSuite,
        version: ProtocolVersion,
        mac_key: &[u8],
        key: &[u8],
        iv: &[u8],
    ) -> CbcMessageDecrypter {
        CbcMessageDecrypter {
            key: CbcKey::new(scs.bulk, key),
            mac: RecordMac::new(scs.mac, mac_key),
            version,
            chain_iv: iv.to_vec(),
        }
    }
}

impl MessageDecrypter for CbcMessageDecrypter {
    fn decrypt(&mut self, mut msg: Message, seq: u64) -> Result<Message, TlsError> {
        let block = self.key.block_len();
        let mac_len = self.mac.mac_len();

        let payload = msg
            .take_opaque_payload()
            .ok_or(TlsError::DecryptError)?;
        let mut buf = payload.0;

        // A record this epoch could not have produced: lengths are
        // public, so rejecting on them leaks nothing.
        let min_len = if explicit_iv(self.version) {
            2 * block
        } else {
            block
        };
        if buf.len() < min_len || buf.len() % block != 0 {
            return Err(TlsError::UnexpectedPlaintext);
        }

        let iv = if explicit_iv(self.version) {
            let iv = buf[..block].to_vec();
            buf.drain(..block);
            iv
        } else {
            let iv = self.chain_iv.clone();
            self.chain_iv = buf[buf.len() - block..].to_vec();
            iv
        };

        // Too short to hold even an empty body, a MAC and the pad
        // length byte: no valid ciphertext looks like this.
        if buf.len() < mac_len + 1 {
            return Err(TlsError::UnexpectedPlaintext);
        }

        self.key.decrypt_in_place(&iv, &mut buf)?;

        // Padding check: all pad_len + 1 trailing bytes must equal
        // pad_len.  The MAC runs regardless, over the length the
        // padding implies, so a padding failure and a MAC failure are
        // not distinguishable from the outcome.
        // TODO: equalise MAC timing across pad lengths by always
        // hashing a length-equalised buffer.
        let claimed_pad = *buf.last().unwrap() as usize;

        let (pad_len, mut ok) = if buf.len() < mac_len + claimed_pad + 1 {
            (0, 0u8)
        } else {
            (claimed_pad, 1u8)
        };

        for i in 0..=pad_len {
            ok &= buf[buf.len() - 1 - i].ct_eq(&(pad_len as u8)).unwrap_u8();
        }

        let body_len = buf.len() - 1 - pad_len - mac_len;
        let body = &buf[..body_len];
        let mac_received = &buf[body_len..body_len + mac_len];

        let mac_expect = self.mac.compute(seq, msg.typ, msg.version, body);
        ok &= mac_expect.ct_eq(mac_received).unwrap_u8();

        if ok != 1 {
            return Err(TlsError::DecryptError);
        }

        if body_len > MAX_FRAGMENT_LEN {
            return Err(TlsError::PeerSentOversizedRecord);
        }

        let body = body.to_vec();
        Ok(Message {
            typ: msg.typ,
            version: msg.version,
            payload: MessagePayload::opaque(body),
        })
    }
}

/// A `MessageEncrypter` for the RC4 stream suites: body || mac, under
/// a keystream that runs on across records.
pub struct StreamMessageEncrypter {
    cipher: Rc4<U16>,
    mac: RecordMac,
}

/// A `MessageDecrypter` for the RC4 stream suites.
pub struct StreamMessageDecrypter {
    cipher: Rc4<U16>,
    mac: RecordMac,
}

impl StreamMessageEncrypter {
    fn new(scs: &'static SupportedCipherSuite, mac_key: &[u8], key: &[u8]) -> StreamMessageEncrypter {
        StreamMessageEncrypter {
            cipher: Rc4::new_from_slice(key).expect("rc4 key is 16 bytes"),
            mac: RecordMac::new(scs.mac, mac_key),
        }
    }
}

impl MessageEncrypter for StreamMessageEncrypter {
    fn encrypt(&mut self, msg: BorrowMessage, seq: u64) -> Result<Message, TlsError> {
        let mac = self.mac.compute(seq, msg.typ, msg.version, msg.payload);

        let mut buf = Vec::with_capacity(msg.payload.len() + mac.len());
        buf.extend_from_slice(msg.payload);
        buf.extend_from_slice(&mac);

        self.cipher.apply_keystream(&mut buf);

        Ok(Message {
            typ: msg.typ,
            version: msg.version,
            payload: MessagePayload::opaque(buf),
        })
    }
}

impl StreamMessageDecrypter {
    fn new(scs: &'static SupportedCipherSuite, mac_key: &[u8], key: &[u8]) -> StreamMessageDecrypter {
        StreamMessageDecrypter {
            cipher: Rc4::new_from_slice(key).expect("rc4 key is 16 bytes"),
            mac: RecordMac::new(scs.mac, mac_key),
        }
    }
}

impl MessageDecrypter for StreamMessageDecrypter {
    fn decrypt(&mut self, mut msg: Message, seq: u64) -> Result<Message, TlsError> {
        let mac_len = self.mac.mac_len();

        let payload = msg
            .take_opaque_payload()
            .ok_or(TlsError::DecryptError)?;
        let mut buf = payload.0;

        if buf.len() < mac_len {
            return Err(TlsError::UnexpectedPlaintext);
        }

        self.cipher.apply_keystream(&mut buf);

        let body_len = buf.len() - mac_len;
        let mac_expect = self.mac.compute(seq, msg.typ, msg.version, &buf[..body_len]);

        if mac_expect.ct_eq(&buf[body_len..]).unwrap_u8() != 1 {
            return Err(TlsError::DecryptError);
        }

        if body_len > MAX_FRAGMENT_LEN {
            return Err(TlsError::PeerSentOversizedRecord);
        }

        buf.truncate(body_len);
        Ok(Message {
            typ: msg.typ,
            version: msg.version,
            payload: MessagePayload::opaque(buf),
        })
    }
}

/// A `MessageEncrypter` which doesn't work, for before key exchange.
pub struct InvalidMessageEncrypter {}

impl MessageEncrypter for InvalidMessageEncrypter {
    fn encrypt(&mut self, _m: BorrowMessage, _seq: u64) -> Result<Message, TlsError> {
        Err(TlsError::General("encrypt not yet available".to_string()))
    }
}

/// A `MessageDecrypter` which doesn't work.
pub struct InvalidMessageDecrypter {}

impl MessageDecrypter for InvalidMessageDecrypter {
    fn decrypt(&mut self, _m: Message, _seq: u64) -> Result<Message, TlsError> {
        Err(TlsError::DecryptError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::enums::{ContentType, ProtocolVersion};
    use crate::msgs::message::BorrowMessage;
    use crate::suites;

    fn cbc_pair(
        version: ProtocolVersion,
    ) -> (CbcMessageDecrypter, CbcMessageEncrypter) {
        let scs = &suites::TLS_RSA_WITH_AES_128_CBC_SHA;
        let mac_key = [0x0bu8; 20];
        let key = [0x42u8; 16];
        let iv = [0x17u8; 16];

        (
            CbcMessageDecrypter::new(scs, version, &mac_key, &key, &iv),
            CbcMessageEncrypter::new(scs, version, &mac_key, &key, &iv),
        )
    }

    fn appdata(payload: &'static [u8], version: ProtocolVersion) -> BorrowMessage<'static> {
        BorrowMessage {
            typ: ContentType::ApplicationData,
            version,
            payload,
        }
    }

    fn body_of(mut m: Message) -> Vec<u8> {
        m.take_opaque_payload().unwrap().0
    }

    #[test]
    fn cbc_round_trip_tls12() {
        let (mut dec, mut enc) = cbc_pair(ProtocolVersion::TLSv1_2);

        let sealed = enc
            .encrypt(appdata(b"hello world", ProtocolVersion::TLSv1_2), 0)
            .unwrap();
        let opened = dec.decrypt(sealed, 0).unwrap();
        assert_eq!(body_of(opened), b"hello world".to_vec());
    }

    #[test]
    fn cbc_round_trip_tls10_chained_iv() {
        let (mut dec, mut enc) = cbc_pair(ProtocolVersion::TLSv1_0);

        for seq in 0..3u64 {
            let sealed = enc
                .encrypt(appdata(b"chained records", ProtocolVersion::TLSv1_0), seq)
                .unwrap();
            let opened = dec.decrypt(sealed, seq).unwrap();
            assert_eq!(body_of(opened), b"chained records".to_vec());
        }
    }

    #[test]
    fn wrong_sequence_number_fails() {
        let (mut dec, mut enc) = cbc_pair(ProtocolVersion::TLSv1_2);

        let sealed = enc
            .encrypt(appdata(b"hello", ProtocolVersion::TLSv1_2), 0)
            .unwrap();
        assert_eq!(dec.decrypt(sealed, 1).unwrap_err(), TlsError::DecryptError);
    }

    #[test]
    fn bitflip_fails_mac() {
        let (mut dec, mut enc) = cbc_pair(ProtocolVersion::TLSv1_2);

        let mut sealed = enc
            .encrypt(appdata(b"hello world", ProtocolVersion::TLSv1_2), 0)
            .unwrap();
        if let MessagePayload::Opaque(ref mut p) = sealed.payload {
            let last = p.0.len() - 1;
            p.0[last] ^= 0x01;
        }

        assert_eq!(dec.decrypt(sealed, 0).unwrap_err(), TlsError::DecryptError);
    }

    #[test]
    fn undersized_record_is_unexpected() {
        let (mut dec, _) = cbc_pair(ProtocolVersion::TLSv1_2);

        let short = Message {
            typ: ContentType::ChangeCipherSpec,
            version: ProtocolVersion::TLSv1_2,
            payload: MessagePayload::opaque(vec![0x01]),
        };
        assert_eq!(
            dec.decrypt(short, 0).unwrap_err(),
            TlsError::UnexpectedPlaintext
        );
    }

    #[test]
    fn stream_round_trip_and_forgery() {
        let scs = &suites::TLS_RSA_WITH_RC4_128_SHA;
        let mac_key = [0x0bu8; 20];
        let key = [0x42u8; 16];

        let mut enc = StreamMessageEncrypter::new(scs, &mac_key, &key);
        let mut dec = StreamMessageDecrypter::new(scs, &mac_key, &key);

        let sealed = enc
            .encrypt(appdata(b"stream suite", ProtocolVersion::TLSv1_2), 0)
            .unwrap();
        let opened = dec.decrypt(sealed, 0).unwrap();
        assert_eq!(body_of(opened), b"stream suite".to_vec());

        // keystreams have advanced in step; a flipped bit now fails
        let mut forged = enc
            .encrypt(appdata(b"stream suite", ProtocolVersion::TLSv1_2), 1)
            .unwrap();
        if let MessagePayload::Opaque(ref mut p) = forged.payload {
            p.0[0] ^= 0x80;
        }
        assert_eq!(dec.decrypt(forged, 1).unwrap_err(), TlsError::DecryptError);
    }
}
