//! Human-shareable string encoding for identifiers and invitations.
//!
//! A base32 variant with a digit-first alphabet (no `I`, `O`, `S` or `U`)
//! and least-significant-bit-first packing, optionally wrapped with a
//! 4-byte SHA-256 checksum so typos are caught on decode.

use data_encoding::{BitOrder, Encoding, Specification};
use lazy_static::lazy_static;

use crate::error::{Error, Result};
use crate::util::hash;

const ALPHABET: &str = "0123456789ABCDEFGHJKLMNPQRTVWXYZ";

lazy_static! {
    static ref BASE32C: Encoding = {
        let mut spec = Specification::new();
        spec.symbols.push_str(ALPHABET);
        spec.bit_order = BitOrder::LeastSignificantFirst;
        spec.check_trailing_bits = true;
        spec.encoding().expect("valid base32 specification")
    };
}

pub fn encode(p: &[u8]) -> String {
    BASE32C.encode(p)
}

pub fn decode(s: &str) -> Result<Vec<u8>> {
    BASE32C
        .decode(s.as_bytes())
        .map_err(|_| Error::Parse("base32", "invalid character or padding"))
}

/// Encodes with a trailing 4-byte checksum.
pub fn check_encode(p: &[u8]) -> String {
    let digest = hash(p);
    let mut buf = Vec::with_capacity(p.len() + 4);
    buf.extend_from_slice(p);
    buf.extend_from_slice(&digest[..4]);
    encode(&buf)
}

/// Decodes and validates the trailing checksum.
pub fn check_decode(s: &str) -> Result<Vec<u8>> {
    let buf = decode(s)?;
    if buf.len() < 4 {
        return Err(Error::Parse("base32", "checksummed value too short"));
    }
    let (payload, checksum) = buf.split_at(buf.len() - 4);
    let digest = hash(payload);
    if digest[..4] != *checksum {
        return Err(Error::Parse("base32", "checksum mismatch"));
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        for len in [0usize, 1, 2, 5, 31, 32, 100] {
            let p: Vec<u8> = (0..len).map(|i| i as u8).collect();
            assert_eq!(decode(&encode(&p)).unwrap(), p);
        }
    }

    #[test]
    fn rejects_foreign_characters() {
        assert!(decode("ABCI").is_err()); // 'I' is not in the alphabet
        assert!(decode("abc").is_err()); // lowercase
    }

    #[test]
    fn check_roundtrip_and_tamper() {
        let p = b"pebble invitation".to_vec();
        let s = check_encode(&p);
        assert_eq!(check_decode(&s).unwrap(), p);

        // Swapping two distinct characters breaks the checksum.
        let mut chars: Vec<char> = s.chars().collect();
        let (a, b) = (0, chars.len() - 1);
        if chars[a] != chars[b] {
            chars.swap(a, b);
            let tampered: String = chars.into_iter().collect();
            assert!(check_decode(&tampered).is_err());
        }
    }

    #[test]
    fn check_decode_rejects_short_input() {
        assert!(check_decode(&encode(&[1, 2])).is_err());
    }
}
