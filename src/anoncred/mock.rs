//! Transparent credential system for tests and demos.
//!
//! Everything here is plain SHA-256: the commitment is derivable from
//! the credential identifier, so signatures are linkable and provide
//! **no anonymity whatsoever**. What the mock does preserve is the shape
//! the election engine relies on: deterministic secret derivation,
//! sorted-unique accumulation, message binding and membership checking.

use std::any::Any;

use crate::error::{Error, Result};
use crate::util::{hash_all, HashValue};

use super::{AnonymitySet, Commitment, CredentialSystem, Secret};

const COMMITMENT_LEN: usize = 32;

fn credential_of(seed: &HashValue) -> HashValue {
    hash_all(&[b"mock.credential", seed])
}

fn commitment_of(credential: &HashValue) -> HashValue {
    hash_all(&[b"mock.commitment", credential])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MockCredentialSystem;

#[derive(Debug, Clone)]
pub struct MockSecret {
    credential: HashValue,
}

impl Secret for MockSecret {
    fn commitment(&self) -> Result<Commitment> {
        Ok(Commitment::new(commitment_of(&self.credential).to_vec()))
    }

    fn credential(&self) -> Vec<u8> {
        self.credential.to_vec()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct MockAnonymitySet {
    commitments: Vec<Vec<u8>>,
}

impl AnonymitySet for MockAnonymitySet {
    fn len(&self) -> usize {
        self.commitments.len()
    }

    fn sign(&self, secret: &dyn Secret, msg: &[u8]) -> Result<Vec<u8>> {
        let secret = secret
            .as_any()
            .downcast_ref::<MockSecret>()
            .ok_or(Error::Crypto("secret not derived by this system"))?;
        let commitment = commitment_of(&secret.credential);
        if self.commitments.binary_search(&commitment.to_vec()).is_err() {
            return Err(Error::NotFound("commitment not in anonymity set"));
        }
        Ok(hash_all(&[b"mock.sig", &commitment, &secret.credential, msg]).to_vec())
    }

    fn verify(&self, credential: &[u8], sig: &[u8], msg: &[u8]) -> Result<()> {
        let credential: HashValue = credential
            .try_into()
            .map_err(|_| Error::Parse("credential", "wrong length"))?;
        let commitment = commitment_of(&credential);
        if self.commitments.binary_search(&commitment.to_vec()).is_err() {
            return Err(Error::Crypto("commitment not in anonymity set"));
        }
        let expected = hash_all(&[b"mock.sig", &commitment, &credential, msg]);
        if sig != expected.as_slice() {
            return Err(Error::Crypto("invalid membership signature"));
        }
        Ok(())
    }
}

impl CredentialSystem for MockCredentialSystem {
    fn derive_secret(&self, seed: &[u8]) -> Result<Box<dyn Secret>> {
        let seed = hash_all(&[b"mock.seed", seed]);
        Ok(Box::new(MockSecret {
            credential: credential_of(&seed),
        }))
    }

    fn parse_commitment(&self, bytes: &[u8]) -> Result<Commitment> {
        if bytes.len() != COMMITMENT_LEN {
            return Err(Error::Parse("commitment", "wrong length"));
        }
        Ok(Commitment::new(bytes.to_vec()))
    }

    fn make_anonymity_set(&self, commitments: &[Commitment]) -> Result<Box<dyn AnonymitySet>> {
        if commitments.is_empty() {
            return Err(Error::NotFound("no commitments to accumulate"));
        }
        let mut sorted: Vec<Vec<u8>> = commitments
            .iter()
            .map(|c| c.as_bytes().to_vec())
            .collect();
        sorted.sort();
        sorted.dedup();
        Ok(Box::new(MockAnonymitySet {
            commitments: sorted,
        }))
    }
}
