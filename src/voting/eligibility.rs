//! Eligible-voter roster embedded in the election parameters.
//!
//! Each entry maps the hash of a voter's long-term public key to a
//! commitment over their real-world identity. Insertion order is part of
//! the canonical encoding, so lists built from the same inputs in the
//! same order encode identically.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::util::HashValue;
use crate::wire::{BufferReader, BufferWriter};

const ELIGIBILITY_LIST_MAGIC: u32 = 0x454C_4C01;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibilityList {
    order: Vec<HashValue>,
    entries: HashMap<HashValue, HashValue>,
}

impl EligibilityList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; returns false without modifying the list if the
    /// public-key hash is already present.
    pub fn add(&mut self, pubkey_hash: HashValue, id_commitment: HashValue) -> bool {
        if self.entries.contains_key(&pubkey_hash) {
            return false;
        }
        self.order.push(pubkey_hash);
        self.entries.insert(pubkey_hash, id_commitment);
        true
    }

    pub fn contains(&self, pubkey_hash: &HashValue) -> bool {
        self.entries.contains_key(pubkey_hash)
    }

    pub fn id_commitment(&self, pubkey_hash: &HashValue) -> Option<&HashValue> {
        self.entries.get(pubkey_hash)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_u32(ELIGIBILITY_LIST_MAGIC);
        for pubkey_hash in &self.order {
            w.write(pubkey_hash);
            w.write(&self.entries[pubkey_hash]);
        }
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new("eligibility list", bytes);
        if r.read_u32()? != ELIGIBILITY_LIST_MAGIC {
            return Err(Error::Parse("eligibility list", "bad magic"));
        }
        let mut list = EligibilityList::new();
        while !r.is_empty() {
            let pubkey_hash = r.read_hash()?;
            let id_commitment = r.read_hash()?;
            if !list.add(pubkey_hash, id_commitment) {
                return Err(Error::Duplicate("eligibility list public key"));
            }
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::hash;

    #[test]
    fn roundtrip_preserves_order() {
        let mut list = EligibilityList::new();
        for i in 0..5u8 {
            assert!(list.add(hash(&[i]), hash(&[i, i])));
        }
        let decoded = EligibilityList::from_bytes(&list.to_bytes()).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.to_bytes(), list.to_bytes());
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut list = EligibilityList::new();
        assert!(list.add(hash(b"a"), hash(b"x")));
        assert!(!list.add(hash(b"a"), hash(b"y")));
        assert_eq!(list.id_commitment(&hash(b"a")), Some(&hash(b"x")));

        let mut bytes = list.to_bytes();
        let entry = bytes[4..68].to_vec();
        bytes.extend_from_slice(&entry);
        assert!(matches!(
            EligibilityList::from_bytes(&bytes),
            Err(Error::Duplicate(_))
        ));
    }

    #[test]
    fn bad_magic_rejected() {
        let list = EligibilityList::new();
        let mut bytes = list.to_bytes();
        bytes[0] ^= 1;
        assert!(EligibilityList::from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_entry_rejected() {
        let mut list = EligibilityList::new();
        list.add(hash(b"a"), hash(b"x"));
        let bytes = list.to_bytes();
        assert!(EligibilityList::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    }
}
