//! Capability traits for the anonymous-credential backend.
//!
//! The protocol engine never looks inside credentials; it derives a
//! per-voter secret, posts its public commitment, and later signs
//! ballots with a membership proof that exposes only a stable
//! credential identifier. Concrete zero-knowledge systems plug in by
//! implementing [`CredentialSystem`]; [`mock`] provides a transparent
//! stand-in for tests and demos.

use std::any::Any;

use crate::error::Result;

pub mod mock;

/// A public commitment to a voter's anonymity secret.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Commitment(Vec<u8>);

impl Commitment {
    pub fn new(bytes: Vec<u8>) -> Self {
        Commitment(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// A voter's anonymity secret, derived deterministically from a seed.
pub trait Secret {
    /// The public commitment posted during credential generation.
    fn commitment(&self) -> Result<Commitment>;

    /// The stable credential identifier exposed at signing time. Two
    /// ballots signed with the same secret carry the same identifier,
    /// which is what makes double votes detectable.
    fn credential(&self) -> Vec<u8>;

    /// Escape hatch for implementations to recover their concrete type
    /// inside [`AnonymitySet::sign`].
    fn as_any(&self) -> &dyn Any;
}

/// A membership accumulator over a set of commitments.
pub trait AnonymitySet {
    /// Number of distinct commitments in the set.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produces a proof that `secret`'s commitment is in the set,
    /// bound to `msg` and to the secret's credential identifier,
    /// without revealing which commitment it is.
    fn sign(&self, secret: &dyn Secret, msg: &[u8]) -> Result<Vec<u8>>;

    /// Checks a membership proof against a credential identifier.
    fn verify(&self, credential: &[u8], sig: &[u8], msg: &[u8]) -> Result<()>;
}

/// Constructor capability for a concrete credential system.
pub trait CredentialSystem {
    /// Deterministically derives a voter secret from a seed.
    fn derive_secret(&self, seed: &[u8]) -> Result<Box<dyn Secret>>;

    /// Validates and wraps commitment bytes read from the log.
    fn parse_commitment(&self, bytes: &[u8]) -> Result<Commitment>;

    /// Builds the membership accumulator. Implementations must sort the
    /// commitments ascending by raw bytes and collapse adjacent
    /// duplicates before accumulating: every participant has to arrive
    /// at an identical root, so the ordering is protocol-critical.
    fn make_anonymity_set(&self, commitments: &[Commitment]) -> Result<Box<dyn AnonymitySet>>;
}
