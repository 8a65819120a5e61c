//! Time-locked ballot encryption and the signed ballot wrapper.
//!
//! The symmetric key is the hash of the puzzle input, so decryption
//! becomes possible exactly when the puzzle is solved or its solution
//! revealed. AES-GCM authenticates the ciphertext; a decryption that
//! passes authentication under the wrong solution is not possible.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::anoncred::{AnonymitySet, Secret};
use crate::error::{Error, Result};
use crate::util::hash;
use crate::vdf::VdfSolution;
use crate::wire::{BufferReader, BufferWriter};

use super::methods::Ballot;

const NONCE_LEN: usize = 12;

/// A ballot sealed under a time-lock puzzle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBallot {
    pub vdf_input: Vec<u8>,
    pub payload: Vec<u8>,
}

impl EncryptedBallot {
    /// Seals `ballot` under the key derived from `vdf_input`. The
    /// payload is a fresh random nonce followed by the ciphertext.
    pub fn encrypt(ballot: &[u8], vdf_input: &[u8]) -> Result<Self> {
        let key = hash(vdf_input);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), ballot)
            .map_err(|_| Error::Crypto("ballot encryption failed"))?;
        let mut payload = nonce.to_vec();
        payload.extend_from_slice(&ciphertext);
        Ok(EncryptedBallot {
            vdf_input: vdf_input.to_vec(),
            payload,
        })
    }

    /// Opens the ballot with a solved puzzle. The solution's input must
    /// match the ballot's byte for byte; deriving the key from an
    /// unrelated solution would otherwise silently decrypt to garbage
    /// that fails authentication anyway.
    pub fn decrypt(&self, sol: &VdfSolution) -> Result<Ballot> {
        if sol.input != self.vdf_input {
            return Err(Error::Crypto("solution does not match ballot puzzle"));
        }
        if self.payload.len() < NONCE_LEN {
            return Err(Error::Parse("encrypted ballot", "payload too short"));
        }
        let key = hash(&self.vdf_input);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        let (nonce, ciphertext) = self.payload.split_at(NONCE_LEN);
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| Error::Crypto("ballot authentication failed"))
    }

    /// Wraps the ballot with a membership signature over its encoding
    /// and the signer's credential identifier, so neither the ballot
    /// nor the identifier can be swapped out after the fact.
    pub fn sign(&self, set: &dyn AnonymitySet, secret: &dyn Secret) -> Result<SignedBallot> {
        let credential = secret.credential();
        let mut msg = self.to_bytes();
        msg.extend_from_slice(&credential);
        let signature = set.sign(secret, &msg)?;
        Ok(SignedBallot {
            credential,
            signature,
            encrypted_ballot: self.clone(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_vec(&self.vdf_input);
        w.write(&self.payload);
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new("encrypted ballot", bytes);
        let vdf_input = r.read_vec()?.to_vec();
        let payload = r.read_remaining().to_vec();
        Ok(EncryptedBallot { vdf_input, payload })
    }
}

/// An encrypted ballot plus an anonymous membership signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBallot {
    pub credential: Vec<u8>,
    pub signature: Vec<u8>,
    pub encrypted_ballot: EncryptedBallot,
}

impl SignedBallot {
    /// Checks the membership signature against the anonymity set.
    pub fn verify(&self, set: &dyn AnonymitySet) -> Result<()> {
        let mut msg = self.encrypted_ballot.to_bytes();
        msg.extend_from_slice(&self.credential);
        set.verify(&self.credential, &self.signature, &msg)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_vec(&self.credential);
        w.write_vec(&self.signature);
        w.write(&self.encrypted_ballot.to_bytes());
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new("signed ballot", bytes);
        let credential = r.read_vec()?.to_vec();
        let signature = r.read_vec()?.to_vec();
        let encrypted_ballot = EncryptedBallot::from_bytes(r.read_remaining())?;
        Ok(SignedBallot {
            credential,
            signature,
            encrypted_ballot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anoncred::mock::MockCredentialSystem;
    use crate::anoncred::{Commitment, CredentialSystem};

    fn fake_solution(input: &[u8]) -> VdfSolution {
        VdfSolution {
            input: input.to_vec(),
            output: vec![1, 2, 3],
            proof: vec![],
        }
    }

    #[test]
    fn encrypt_then_decrypt() {
        let enc = EncryptedBallot::encrypt(b"ballot", b"puzzle input").unwrap();
        let dec = enc.decrypt(&fake_solution(b"puzzle input")).unwrap();
        assert_eq!(dec, b"ballot");
    }

    #[test]
    fn wrong_solution_input_rejected() {
        let enc = EncryptedBallot::encrypt(b"ballot", b"puzzle input").unwrap();
        assert!(enc.decrypt(&fake_solution(b"other input")).is_err());
    }

    #[test]
    fn tampered_payload_fails_authentication() {
        let mut enc = EncryptedBallot::encrypt(b"ballot", b"puzzle input").unwrap();
        let last = enc.payload.len() - 1;
        enc.payload[last] ^= 1;
        assert!(matches!(
            enc.decrypt(&fake_solution(b"puzzle input")),
            Err(Error::Crypto(_))
        ));
    }

    #[test]
    fn short_payload_rejected() {
        let enc = EncryptedBallot {
            vdf_input: b"puzzle input".to_vec(),
            payload: vec![0; NONCE_LEN - 1],
        };
        assert!(matches!(
            enc.decrypt(&fake_solution(b"puzzle input")),
            Err(Error::Parse(_, _))
        ));
    }

    #[test]
    fn signed_ballot_roundtrip_and_verify() {
        let sys = MockCredentialSystem;
        let secret = sys.derive_secret(b"voter").unwrap();
        let commitments: Vec<Commitment> = vec![secret.commitment().unwrap()];
        let set = sys.make_anonymity_set(&commitments).unwrap();

        let enc = EncryptedBallot::encrypt(b"ballot", b"puzzle input").unwrap();
        let signed = enc.sign(set.as_ref(), secret.as_ref()).unwrap();
        signed.verify(set.as_ref()).unwrap();

        let decoded = SignedBallot::from_bytes(&signed.to_bytes()).unwrap();
        assert_eq!(decoded, signed);
        decoded.verify(set.as_ref()).unwrap();
    }

    #[test]
    fn resealed_ballot_breaks_signature() {
        let sys = MockCredentialSystem;
        let secret = sys.derive_secret(b"voter").unwrap();
        let set = sys
            .make_anonymity_set(&[secret.commitment().unwrap()])
            .unwrap();

        let enc = EncryptedBallot::encrypt(b"ballot", b"puzzle input").unwrap();
        let mut signed = enc.sign(set.as_ref(), secret.as_ref()).unwrap();
        signed.encrypted_ballot =
            EncryptedBallot::encrypt(b"other ballot", b"puzzle input").unwrap();
        assert!(signed.verify(set.as_ref()).is_err());
    }
}
