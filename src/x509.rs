//! Just enough ASN.1/X.509 to pull the SubjectPublicKeyInfo out of a
//! DER certificate.  Nothing here validates anything.

/// A single DER element: its tag and its contents.
struct DerElement<'a> {
    tag: u8,
    body: &'a [u8],
    /// The whole element, header included.
    raw: &'a [u8],
}

struct DerReader<'a> {
    buf: &'a [u8],
    offs: usize,
}

const TAG_SEQUENCE: u8 = 0x30;
const CONSTRUCTED_CONTEXT_0: u8 = 0xa0;

impl<'a> DerReader<'a> {
    fn init(buf: &'a [u8]) -> DerReader<'a> {
        DerReader { buf, offs: 0 }
    }

    fn next(&mut self) -> Option<DerElement<'a>> {
        let start = self.offs;
        let rest = &self.buf[self.offs..];
        if rest.len() < 2 {
            return None;
        }

        let tag = rest[0];
        let (len, header_len) = match rest[1] {
            n if n < 0x80 => (n as usize, 2),
            0x81 => {
                if rest.len() < 3 {
                    return None;
                }
                (rest[2] as usize, 3)
            }
            0x82 => {
                if rest.len() < 4 {
                    return None;
                }
                (((rest[2] as usize) << 8) | rest[3] as usize, 4)
            }
            _ => return None,
        };

        if rest.len() < header_len + len {
            return None;
        }

        self.offs += header_len + len;
        Some(DerElement {
            tag,
            body: &rest[header_len..header_len + len],
            raw: &self.buf[start..self.offs],
        })
    }
}

/// Walk `cert_der` down to its SubjectPublicKeyInfo and return that
/// element whole (header included), ready to hand to a key parser.
///
/// The path is Certificate -> tbsCertificate -> skip version, serial,
/// signature algorithm, issuer, validity, subject -> SPKI.
pub fn extract_spki(cert_der: &[u8]) -> Option<&[u8]> {
    let mut outer = DerReader::init(cert_der);
    let cert = outer.next()?;
    if cert.tag != TAG_SEQUENCE {
        return None;
    }

    let mut cert_body = DerReader::init(cert.body);
    let tbs = cert_body.next()?;
    if tbs.tag != TAG_SEQUENCE {
        return None;
    }

    let mut tbs_body = DerReader::init(tbs.body);
    let mut elem = tbs_body.next()?;

    // the explicit version tag is optional (absent means v1)
    if elem.tag == CONSTRUCTED_CONTEXT_0 {
        elem = tbs_body.next()?;
    }

    // serial is in `elem` now; skip signature alg, issuer, validity,
    // subject
    for _ in 0..4 {
        tbs_body.next()?;
    }

    let spki = tbs_body.next()?;
    if spki.tag != TAG_SEQUENCE {
        return None;
    }

    Some(spki.raw)
}

#[cfg(test)]
mod tests {
    use super::{DerReader, TAG_SEQUENCE};

    #[test]
    fn reader_handles_long_form_lengths() {
        // SEQUENCE of 0x81-length form wrapping 130 zero bytes
        let mut buf = vec![TAG_SEQUENCE, 0x81, 0x82];
        buf.extend_from_slice(&[0u8; 0x82]);

        let mut rd = DerReader::init(&buf);
        let elem = rd.next().unwrap();
        assert_eq!(elem.tag, TAG_SEQUENCE);
        assert_eq!(elem.body.len(), 0x82);
        assert_eq!(elem.raw.len(), buf.len());
        assert!(rd.next().is_none());
    }

    #[test]
    fn truncated_elements_give_none() {
        let short = [TAG_SEQUENCE, 0x05, 0x01];
        let mut rd = DerReader::init(&short);
        assert!(rd.next().is_none());

        let bare = [TAG_SEQUENCE];
        let mut rd = DerReader::init(&bare);
        assert!(rd.next().is_none());
    }

    #[test]
    fn non_certificate_junk_gives_none() {
        assert!(super::extract_spki(b"hello").is_none());

        let not_a_cert = [0x30, 0x02, 0x02, 0x00];
        assert!(super::extract_spki(&not_a_cert).is_none());
    }
}
