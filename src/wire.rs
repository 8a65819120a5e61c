//! Canonical byte codec shared by every wire structure.
//!
//! All participants must produce identical encodings, so variable-length
//! fields use a strict length prefix: values up to 127 take one byte;
//! longer values set the high bit and use two big-endian bytes. A
//! two-byte encoding of a value that fits in one is rejected as
//! non-canonical.

use crate::error::{Error, Result};
use crate::util::HashValue;

/// Longest encodable variable-length field.
pub const MAX_VECTOR_LEN: usize = 0x7FFF;

/// Incremental reader over a wire buffer.
pub struct BufferReader<'a> {
    buf: &'a [u8],
    name: &'static str,
}

impl<'a> BufferReader<'a> {
    pub fn new(name: &'static str, buf: &'a [u8]) -> Self {
        BufferReader { buf, name }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn short(&self) -> Error {
        Error::Parse(self.name, "short buffer")
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(self.short());
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes(b.try_into().expect("4 bytes")))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_be_bytes(b.try_into().expect("8 bytes")))
    }

    pub fn read_hash(&mut self) -> Result<HashValue> {
        let b = self.read_bytes(32)?;
        Ok(b.try_into().expect("32 bytes"))
    }

    /// Reads a length-prefixed field, enforcing canonical prefixes.
    pub fn read_vec(&mut self) -> Result<&'a [u8]> {
        let first = self.read_u8()? as usize;
        let len = if first > 127 {
            let second = self.read_u8()? as usize;
            let len = ((first & 127) << 8) + second;
            if len <= 127 {
                return Err(Error::Parse(self.name, "non-canonical length encoding"));
            }
            len
        } else {
            first
        };
        self.read_bytes(len)
    }

    /// Consumes and returns everything left in the buffer.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }
}

/// Growable writer producing canonical encodings.
#[derive(Default)]
pub struct BufferWriter {
    buf: Vec<u8>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write(&mut self, p: &[u8]) {
        self.buf.extend_from_slice(p);
    }

    pub fn write_u8(&mut self, b: u8) {
        self.buf.push(b);
    }

    pub fn write_u32(&mut self, n: u32) {
        self.buf.extend_from_slice(&n.to_be_bytes());
    }

    pub fn write_u64(&mut self, n: u64) {
        self.buf.extend_from_slice(&n.to_be_bytes());
    }

    /// Writes a length-prefixed field.
    ///
    /// Panics if `p` exceeds [`MAX_VECTOR_LEN`]; field lengths are under
    /// the caller's control, never attacker input.
    pub fn write_vec(&mut self, p: &[u8]) {
        let len = p.len();
        assert!(len <= MAX_VECTOR_LEN, "vector too long for wire encoding");
        if len > 127 {
            self.buf.push(((len >> 8) | 128) as u8);
            self.buf.push(len as u8);
        } else {
            self.buf.push(len as u8);
        }
        self.buf.extend_from_slice(p);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(p: &[u8]) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_vec(p);
        let bytes = w.into_bytes();
        let mut r = BufferReader::new("test", &bytes);
        let out = r.read_vec().unwrap().to_vec();
        assert!(r.is_empty());
        out
    }

    #[test]
    fn vector_roundtrip_short_and_long() {
        for len in [0usize, 1, 127, 128, 300, MAX_VECTOR_LEN] {
            let p = vec![0xA5u8; len];
            assert_eq!(roundtrip(&p), p);
        }
    }

    #[test]
    fn short_vector_uses_one_byte_prefix() {
        let mut w = BufferWriter::new();
        w.write_vec(&[1, 2, 3]);
        assert_eq!(w.into_bytes(), vec![3, 1, 2, 3]);
    }

    #[test]
    fn non_canonical_length_rejected() {
        // 0x80 0x05 encodes length 5 in two bytes; one byte suffices.
        let bytes = [0x80, 0x05, 1, 2, 3, 4, 5];
        let mut r = BufferReader::new("test", &bytes);
        assert!(matches!(r.read_vec(), Err(Error::Parse(_, _))));
    }

    #[test]
    fn short_buffer_rejected() {
        let mut r = BufferReader::new("test", &[4, 1, 2]);
        assert!(r.read_vec().is_err());
        let mut r = BufferReader::new("test", &[0, 1]);
        assert!(r.read_u64().is_err());
    }

    #[test]
    fn integers_are_big_endian() {
        let mut w = BufferWriter::new();
        w.write_u32(0x01020304);
        w.write_u64(0x0102030405060708);
        let bytes = w.into_bytes();
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        let mut r = BufferReader::new("test", &bytes);
        assert_eq!(r.read_u32().unwrap(), 0x01020304);
        assert_eq!(r.read_u64().unwrap(), 0x0102030405060708);
    }
}
