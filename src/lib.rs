//! Protocol engine for anonymous, coercion-resistant elections over an
//! untrusted append-only broadcast log.
//!
//! Ballots are encrypted under a key derived from a time-lock puzzle
//! (a Pietrzak-style verifiable delay function), signed with an anonymous
//! membership proof, and posted to a shared log. Once the tally phase
//! begins voters reveal their puzzle solutions, and any observer can
//! decrypt, verify and tally the ballots without trusting the log
//! operator or any single participant.
//!
//! The zero-knowledge credential backend, the log transport and local
//! secret storage are capability traits ([`anoncred::CredentialSystem`],
//! [`voting::broadcast::BroadcastChannel`],
//! [`voting::secrets::SecretsManager`]); this crate supplies the phase
//! state machine, the delay-function engine, the wire formats and the
//! tally logic.

pub mod anoncred;
pub mod base32c;
pub mod error;
pub mod util;
pub mod vdf;
pub mod voting;
pub mod wire;

pub use error::{Error, Result};
