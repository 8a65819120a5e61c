use sha2::{Digest, Sha256};

/// A 32-byte SHA-256 digest, used throughout the protocol wherever a
/// fixed-size identifier or commitment is required.
pub type HashValue = [u8; 32];

/// SHA-256 of a single byte slice.
pub fn hash(data: &[u8]) -> HashValue {
    Sha256::digest(data).into()
}

/// SHA-256 over the concatenation of several byte slices.
pub fn hash_all(parts: &[&[u8]]) -> HashValue {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Derives a purpose-specific key from a local seed.
pub fn kdf(seed: &[u8], label: &str) -> HashValue {
    hash_all(&[b"pebble.kdf", label.as_bytes(), seed])
}

/// Derives a purpose-specific key bound to one election.
pub fn kdf_id(seed: &[u8], election_id: &HashValue, label: &str) -> HashValue {
    hash_all(&[b"pebble.kdf", label.as_bytes(), election_id, seed])
}
