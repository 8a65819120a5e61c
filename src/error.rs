use thiserror::Error;

use crate::voting::params::ElectionPhase;

pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error taxonomy.
///
/// Parse and crypto failures on individual log entries are swallowed
/// during batch aggregation; phase errors on direct user actions always
/// propagate to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed wire data: short buffer, wrong magic, non-canonical
    /// length encoding, unknown version.
    #[error("error parsing {0}: {1}")]
    Parse(&'static str, &'static str),
    /// An operation was invoked outside its valid election phase.
    #[error("operation not valid in the {0:?} phase")]
    Phase(ElectionPhase),
    /// A signature, authenticated decryption or VDF check failed.
    #[error("cryptographic verification failed: {0}")]
    Crypto(&'static str),
    /// A required record is missing: no matching decryption message, or
    /// no locally saved secret.
    #[error("not found: {0}")]
    NotFound(&'static str),
    /// Duplicate key in an eligibility list or anonymity set.
    #[error("duplicate key: {0}")]
    Duplicate(&'static str),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
