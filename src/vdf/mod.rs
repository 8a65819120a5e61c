//! Verifiable delay functions used as time-lock puzzles.
//!
//! A puzzle input encodes a difficulty `t`, an RSA-style modulus `n` and
//! a base `x`; the output is `x^(2^t) mod n`. Anyone can recompute the
//! output with `t` sequential squarings, the creator can shortcut the
//! work with the factorization of `n`, and a Fiat-Shamir proof lets
//! third parties check a claimed output far faster than recomputing it.

use crate::error::Result;

mod pietrzak;

pub use pietrzak::PietrzakVdf;

/// A solved (or creator-generated) time-lock puzzle.
///
/// `input` encodes `(t, n, x)` with fixed-width big-endian integers.
/// `proof` is either a sequence of recursive-halving witnesses (publicly
/// verifiable) or a single modulus factor (creator self-check only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdfSolution {
    pub input: Vec<u8>,
    pub output: Vec<u8>,
    pub proof: Vec<u8>,
}

/// A delay-function engine the election can be generic over.
pub trait Vdf {
    /// Creates a fresh puzzle requiring roughly `seconds` of sequential
    /// work, solved via the creator's trapdoor. The difficulty is
    /// clamped to the engine's bound rather than rejected, since the
    /// creator controls the request.
    fn create(&self, seconds: u64) -> Result<VdfSolution>;

    /// Solves a puzzle by literal repeated squaring, producing a
    /// publicly verifiable proof.
    fn solve(&self, input: &[u8]) -> Result<VdfSolution>;

    /// Verifies a claimed solution. Pure and deterministic; rejects any
    /// solution whose output is not exactly the `t`-fold squaring of
    /// the encoded base.
    fn verify(&self, sol: &VdfSolution) -> Result<()>;
}
