//! Pietrzak-style VDF over a random RSA modulus.
//!
//! The prover repeatedly halves the difficulty, committing at each step
//! to `muRoot = x^(2^(t/2-1))` in a SHA-256 transcript and folding the
//! instance with a 128-bit challenge drawn from it. Verification replays
//! the transcript and finishes with at most `DELTA` literal squarings,
//! so it is exponentially cheaper than solving while remaining sound
//! under the random-oracle assumption.

use crypto_bigint::{Encoding, U512};
use num_bigint::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::rngs::OsRng;

use crate::error::{Error, Result};
use crate::util::hash;
use crate::wire::{BufferReader, BufferWriter};

use super::{Vdf, VdfSolution};

const MODULUS_BITS: usize = 1024;
const MODULUS_BYTES: usize = MODULUS_BITS / 8;
const FACTOR_BYTES: usize = MODULUS_BITS / 16;
/// Difficulty floor below which the halving recursion stops and
/// verification falls back to literal squaring.
const DELTA: u64 = 4096;
/// Transcript integers are padded to this width regardless of modulus
/// size; part of the wire protocol, not tunable.
const TRANSCRIPT_PAD: usize = 256;

/// Pietrzak VDF engine with a difficulty bound and a seconds-to-
/// difficulty conversion factor (squarings per second).
#[derive(Debug, Clone, Copy)]
pub struct PietrzakVdf {
    pub max_difficulty: u64,
    pub difficulty_conversion: u64,
}

/// Left-pads a big-endian encoding to a fixed width.
fn fill_bytes(v: &BigUint, len: usize) -> Vec<u8> {
    let bytes = v.to_bytes_be();
    assert!(bytes.len() <= len, "integer wider than its wire field");
    let mut out = vec![0u8; len];
    out[len - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// `a^b * c mod n`
fn exp_and_mul(a: &BigUint, b: &BigUint, c: &BigUint, n: &BigUint) -> BigUint {
    a.modpow(b, n) * c % n
}

fn random_prime() -> BigUint {
    let p: U512 = crypto_primes::generate_prime(Some(MODULUS_BITS / 2));
    BigUint::from_bytes_be(&p.to_be_bytes())
}

/// Miller-Rabin check on a value parsed from an (at most) 64-byte field.
fn is_prime_factor(v: &BigUint) -> bool {
    let bytes = v.to_bytes_be();
    if bytes.len() > FACTOR_BYTES {
        return false;
    }
    let mut buf = [0u8; FACTOR_BYTES];
    buf[FACTOR_BYTES - bytes.len()..].copy_from_slice(&bytes);
    crypto_primes::is_prime(&U512::from_be_slice(&buf))
}

/// Running Fiat-Shamir transcript: a SHA-256 chain over the instance and
/// every committed witness, from which challenges are drawn.
struct Transcript {
    state: [u8; 32],
}

impl Transcript {
    fn new(t: u64) -> Self {
        Transcript {
            state: hash(&t.to_be_bytes()),
        }
    }

    fn add(&mut self, v: &BigUint) {
        let mut buf = Vec::with_capacity(32 + TRANSCRIPT_PAD);
        buf.extend_from_slice(&self.state);
        buf.extend_from_slice(&fill_bytes(v, TRANSCRIPT_PAD));
        self.state = hash(&buf);
    }

    /// The low 16 bytes of the current state, as an integer. Challenges
    /// are unpredictable until the prover has fixed the output.
    fn challenge(&self) -> BigUint {
        BigUint::from_bytes_be(&self.state[..16])
    }
}

/// Evaluates `x^(2^t) mod n` by some strategy.
trait Squarer {
    fn eval(&self, x: &BigUint, t: u64) -> BigUint;
}

/// The honest strategy: literal repeated squaring, batched through
/// `2^DELTA` exponents to amortize the modpow setup.
struct RepeatedSquarer {
    n: BigUint,
}

impl Squarer for RepeatedSquarer {
    fn eval(&self, x: &BigUint, mut t: u64) -> BigUint {
        let chunk = BigUint::one() << DELTA as usize;
        let mut r = x.clone();
        while t >= DELTA {
            r = r.modpow(&chunk, &self.n);
            t -= DELTA;
        }
        if t != 0 {
            r = r.modpow(&(BigUint::one() << t as usize), &self.n);
        }
        r
    }
}

/// The creator's shortcut: with φ(n) known, `2^t mod φ(n)` reduces the
/// whole evaluation to a single modular exponentiation.
struct TrapdoorSquarer {
    n: BigUint,
    phi: BigUint,
}

impl TrapdoorSquarer {
    fn new(p: &BigUint, q: &BigUint) -> Self {
        TrapdoorSquarer {
            n: p * q,
            phi: (p - 1u8) * (q - 1u8),
        }
    }
}

impl Squarer for TrapdoorSquarer {
    fn eval(&self, x: &BigUint, t: u64) -> BigUint {
        let e = BigUint::from(2u8).modpow(&BigUint::from(t), &self.phi);
        x.modpow(&e, &self.n)
    }
}

/// A freshly generated puzzle plus the creator-side trapdoor material.
struct Puzzle {
    input: Vec<u8>,
    t: u64,
    x: BigUint,
    factor: BigUint,
    trapdoor: TrapdoorSquarer,
}

impl PietrzakVdf {
    pub fn new(max_difficulty: u64, difficulty_conversion: u64) -> Self {
        PietrzakVdf {
            max_difficulty,
            difficulty_conversion,
        }
    }

    fn parse_input(&self, input: &[u8]) -> Result<(u64, BigUint, BigUint)> {
        let mut r = BufferReader::new("vdf input", input);
        let t = r.read_u64()?;
        if t > self.max_difficulty {
            return Err(Error::Parse("vdf input", "difficulty above bound"));
        }
        let n = BigUint::from_bytes_be(r.read_bytes(MODULUS_BYTES)?);
        let x = BigUint::from_bytes_be(r.read_bytes(MODULUS_BYTES)?);
        if n <= BigUint::one() {
            return Err(Error::Parse("vdf input", "modulus too small"));
        }
        Ok((t, n, x))
    }

    fn generate(&self, seconds: u64) -> Puzzle {
        let mut t = seconds.saturating_mul(self.difficulty_conversion);
        if t > self.max_difficulty {
            t = self.max_difficulty;
        }
        // Verification requires an even difficulty.
        t &= !1;
        let p = random_prime();
        let q = random_prime();
        let trapdoor = TrapdoorSquarer::new(&p, &q);
        let x = OsRng.gen_biguint_below(&trapdoor.n);
        let mut w = BufferWriter::new();
        w.write_u64(t);
        w.write(&fill_bytes(&trapdoor.n, MODULUS_BYTES));
        w.write(&fill_bytes(&x, MODULUS_BYTES));
        Puzzle {
            input: w.into_bytes(),
            t,
            x,
            factor: p,
            trapdoor,
        }
    }

    /// Evaluates the puzzle and runs the halving protocol with the given
    /// squarer, committing witnesses to the transcript as it goes.
    fn prove(&self, input: &[u8], t0: u64, n: &BigUint, x0: &BigUint, sqr: &dyn Squarer) -> VdfSolution {
        let mut x = x0 % n;
        let y0 = sqr.eval(&x, t0);
        let mut tr = Transcript::new(t0);
        tr.add(n);
        tr.add(&x);
        tr.add(&y0);
        let mut proof = Vec::new();
        let mut t = t0;
        let mut y = y0.clone();
        while t > DELTA {
            if t % 2 != 0 {
                t += 1;
                y = &y * &y % n;
            }
            t /= 2;
            let mu_root = sqr.eval(&x, t - 1);
            proof.extend_from_slice(&fill_bytes(&mu_root, MODULUS_BYTES));
            tr.add(&mu_root);
            let r = tr.challenge();
            let mu = &mu_root * &mu_root % n;
            x = exp_and_mul(&x, &r, &mu, n);
            y = exp_and_mul(&mu, &r, &y, n);
        }
        VdfSolution {
            input: input.to_vec(),
            output: fill_bytes(&y0, MODULUS_BYTES),
            proof,
        }
    }

    /// Creates a puzzle whose proof is the 64-byte modulus factor.
    ///
    /// Such a solution is only accepted by [`Self::self_check`]; it never
    /// convinces another participant, but checking it is O(1) in `t`,
    /// which makes it useful for validating locally stored material.
    pub fn create_with_factor_proof(&self, seconds: u64) -> VdfSolution {
        let puz = self.generate(seconds);
        let y = puz.trapdoor.eval(&(&puz.x % &puz.trapdoor.n), puz.t);
        VdfSolution {
            output: fill_bytes(&y, MODULUS_BYTES),
            proof: fill_bytes(&puz.factor, FACTOR_BYTES),
            input: puz.input,
        }
    }

    /// Trusted creator-side check of a factor-form solution.
    ///
    /// Sound only for the party that generated the puzzle: possession of
    /// a valid factor proves the output correct but says nothing about
    /// sequential work performed, so this must never stand in for
    /// [`Vdf::verify`] on third-party solutions.
    pub fn self_check(&self, sol: &VdfSolution) -> Result<()> {
        let (t, n, mut x) = self.parse_input(&sol.input)?;
        if t % 2 != 0 {
            return Err(Error::Crypto("vdf difficulty not even"));
        }
        x %= &n;
        let y = BigUint::from_bytes_be(&sol.output);
        if y >= n {
            return Err(Error::Crypto("vdf output not reduced modulo n"));
        }
        if sol.proof.len() != FACTOR_BYTES {
            return Err(Error::Parse("vdf proof", "not a factor-form proof"));
        }
        let p = BigUint::from_bytes_be(&sol.proof);
        let two = BigUint::from(2u8);
        if p <= two {
            return Err(Error::Crypto("invalid modulus factor"));
        }
        let q = &n / &p;
        let rem = &n % &p;
        if !rem.is_zero()
            || q <= two
            || p == q
            || !is_prime_factor(&p)
            || !is_prime_factor(&q)
        {
            return Err(Error::Crypto("invalid modulus factor"));
        }
        if TrapdoorSquarer::new(&p, &q).eval(&x, t) != y {
            return Err(Error::Crypto("trapdoor evaluation does not match output"));
        }
        Ok(())
    }
}

impl Vdf for PietrzakVdf {
    fn create(&self, seconds: u64) -> Result<VdfSolution> {
        let puz = self.generate(seconds);
        // The trapdoor makes the halving protocol cheap, so creators can
        // emit the same publicly verifiable proof form as solvers and
        // the factorization never leaves this function.
        let n = puz.trapdoor.n.clone();
        Ok(self.prove(&puz.input, puz.t, &n, &puz.x, &puz.trapdoor))
    }

    fn solve(&self, input: &[u8]) -> Result<VdfSolution> {
        let (t, n, x) = self.parse_input(input)?;
        let sqr = RepeatedSquarer { n: n.clone() };
        Ok(self.prove(input, t, &n, &x, &sqr))
    }

    fn verify(&self, sol: &VdfSolution) -> Result<()> {
        let (mut t, n, mut x) = self.parse_input(&sol.input)?;
        if t % 2 != 0 {
            return Err(Error::Crypto("vdf difficulty not even"));
        }
        x %= &n;
        let mut y = BigUint::from_bytes_be(&sol.output);
        if y >= n {
            return Err(Error::Crypto("vdf output not reduced modulo n"));
        }
        if sol.proof.len() == FACTOR_BYTES {
            return Err(Error::Crypto(
                "factor-form proof is only valid for the creator's self-check",
            ));
        }
        let mut tr = Transcript::new(t);
        tr.add(&n);
        tr.add(&x);
        tr.add(&y);
        let mut rd = BufferReader::new("vdf proof", &sol.proof);
        while t > DELTA {
            if t % 2 != 0 {
                t += 1;
                y = &y * &y % &n;
            }
            t /= 2;
            let mu_root = BigUint::from_bytes_be(rd.read_bytes(MODULUS_BYTES)?);
            tr.add(&mu_root);
            let r = tr.challenge();
            let mu = &mu_root * &mu_root % &n;
            x = exp_and_mul(&x, &r, &mu, &n);
            y = exp_and_mul(&mu, &r, &y, &n);
        }
        if !rd.is_empty() {
            return Err(Error::Parse("vdf proof", "trailing bytes"));
        }
        let sqr = RepeatedSquarer { n };
        if sqr.eval(&x, t) != y {
            return Err(Error::Crypto("final evaluation check failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PietrzakVdf {
        PietrzakVdf::new(1 << 16, 1)
    }

    #[test]
    fn create_and_solve_agree() {
        let vdf = engine();
        let created = vdf.create(10_000).unwrap();
        let solved = vdf.solve(&created.input).unwrap();
        assert_eq!(created.output, solved.output);
        assert_eq!(created.proof, solved.proof);
        vdf.verify(&created).unwrap();
        vdf.verify(&solved).unwrap();
    }

    #[test]
    fn factor_proof_self_checks_but_never_publicly_verifies() {
        let vdf = engine();
        let sol = vdf.create_with_factor_proof(10_000);
        vdf.self_check(&sol).unwrap();
        assert!(matches!(vdf.verify(&sol), Err(Error::Crypto(_))));
        // And general proofs are not factor proofs.
        let general = vdf.create(10_000).unwrap();
        assert!(vdf.self_check(&general).is_err());
    }

    #[test]
    fn small_difficulties_verify() {
        let vdf = engine();
        for seconds in [0u64, 2, 100, 5000] {
            let sol = vdf.create(seconds).unwrap();
            vdf.verify(&sol).unwrap();
        }
    }

    #[test]
    fn verify_is_deterministic() {
        let vdf = engine();
        let sol = vdf.create(9_000).unwrap();
        for _ in 0..3 {
            vdf.verify(&sol).unwrap();
        }
    }

    #[test]
    fn flipped_output_byte_rejected() {
        let vdf = engine();
        let sol = vdf.create(10_000).unwrap();
        for i in [0usize, 17, sol.output.len() - 1] {
            let mut bad = sol.clone();
            bad.output[i] ^= 0x40;
            assert!(vdf.verify(&bad).is_err(), "flipped output byte {i}");
        }
    }

    #[test]
    fn flipped_proof_byte_rejected() {
        let vdf = engine();
        let sol = vdf.create(10_000).unwrap();
        assert!(!sol.proof.is_empty());
        for i in [0usize, sol.proof.len() / 2, sol.proof.len() - 1] {
            let mut bad = sol.clone();
            bad.proof[i] ^= 0x01;
            assert!(vdf.verify(&bad).is_err(), "flipped proof byte {i}");
        }
    }

    #[test]
    fn truncated_and_extended_proofs_rejected() {
        let vdf = engine();
        let sol = vdf.create(60_000).unwrap();
        let mut truncated = sol.clone();
        truncated.proof.truncate(sol.proof.len() - 1);
        assert!(vdf.verify(&truncated).is_err());
        let mut extended = sol.clone();
        extended.proof.push(0);
        assert!(vdf.verify(&extended).is_err());
    }

    #[test]
    fn excessive_difficulty_rejected_before_any_work() {
        let vdf = PietrzakVdf::new(1000, 1);
        let created = engine().create(10_000).unwrap();
        assert!(matches!(
            vdf.solve(&created.input),
            Err(Error::Parse(_, _))
        ));
        assert!(vdf.verify(&created).is_err());
    }

    #[test]
    fn malformed_input_rejected() {
        let vdf = engine();
        assert!(vdf.solve(&[1, 2, 3]).is_err());
        // Odd difficulty fails verification even with a correct output.
        let mut sol = vdf.create(10_000).unwrap();
        let mut t = u64::from_be_bytes(sol.input[..8].try_into().unwrap());
        t += 1;
        sol.input[..8].copy_from_slice(&t.to_be_bytes());
        assert!(matches!(vdf.verify(&sol), Err(Error::Crypto(_))));
    }

    #[test]
    fn difficulty_clamped_to_bound() {
        let vdf = PietrzakVdf::new(5000, 1000);
        let sol = vdf.create(u64::MAX).unwrap();
        let t = u64::from_be_bytes(sol.input[..8].try_into().unwrap());
        assert_eq!(t, 5000);
        vdf.verify(&sol).unwrap();
    }
}
