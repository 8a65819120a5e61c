//! The election engine: one voter's view of one election.
//!
//! All state lives on the broadcast channel and in the local secrets
//! store; the engine itself is stateless between calls. Every read path
//! re-derives its conclusions from the full log, so two honest
//! participants computing [`Election::progress`] at the same instant
//! agree bit for bit even over an adversarial log.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};

use crate::anoncred::{AnonymitySet, Commitment, CredentialSystem};
use crate::error::{Error, Result};
use crate::util::hash;
use crate::vdf::{PietrzakVdf, Vdf, VdfSolution};

use super::ballot::{EncryptedBallot, SignedBallot};
use super::broadcast::BroadcastChannel;
use super::messages::{CredentialMessage, DecryptionMessage, Message};
use super::methods::{Ballot, Registry, Tally, VotingMethod};
use super::params::{ElectionParams, ElectionPhase};
use super::secrets::SecretsManager;
use super::ElectionId;

/// Where an election stands, as computable from the log right now.
///
/// The meaning of `count`/`total` depends on the phase: during casting
/// they are valid ballots out of anonymity-set members; during tallying,
/// decrypted ballots out of ballots still expected to decrypt; after the
/// end, decrypted ballots out of all valid ballots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub phase: ElectionPhase,
    pub count: usize,
    pub total: usize,
    pub tally: Option<Tally>,
}

pub struct Election {
    cred_sys: Arc<dyn CredentialSystem>,
    channel: Box<dyn BroadcastChannel>,
    secrets: Box<dyn SecretsManager>,
    vdf: Box<dyn Vdf>,
    method: Box<dyn VotingMethod>,
    params: ElectionParams,
}

impl Election {
    pub fn new(
        channel: Box<dyn BroadcastChannel>,
        secrets: Box<dyn SecretsManager>,
        cred_sys: Arc<dyn CredentialSystem>,
    ) -> Result<Self> {
        Self::with_registry(channel, secrets, cred_sys, &Registry::default())
    }

    pub fn with_registry(
        channel: Box<dyn BroadcastChannel>,
        secrets: Box<dyn SecretsManager>,
        cred_sys: Arc<dyn CredentialSystem>,
        registry: &Registry,
    ) -> Result<Self> {
        let params = channel.params()?;
        let method = registry.get(&params.voting_method, params.choices.len())?;
        // Scale difficulty so a puzzle created at the start of the cast
        // phase matures right at the tally boundary.
        let window = (params.tally_start - params.cast_start).num_seconds().max(1) as u64;
        let conversion = (params.max_vdf_difficulty / window).max(1);
        let vdf = PietrzakVdf::new(params.max_vdf_difficulty, conversion);
        Ok(Election {
            cred_sys,
            channel,
            secrets,
            vdf: Box::new(vdf),
            method,
            params,
        })
    }

    pub fn id(&self) -> ElectionId {
        self.channel.id()
    }

    pub fn params(&self) -> &ElectionParams {
        &self.params
    }

    pub fn phase(&self) -> ElectionPhase {
        self.params.phase()
    }

    /// Posts this voter's credential commitment, signed by their
    /// long-term key.
    pub fn post_credential(&self) -> Result<()> {
        if self.phase() != ElectionPhase::CredGen {
            return Err(Error::Phase(self.phase()));
        }
        let key = self.secrets.signing_key()?;
        let secret = self.secrets.anonymity_secret(self.cred_sys.as_ref())?;
        let commitment = secret.commitment()?;
        let msg = CredentialMessage::sign(commitment.into_bytes(), &key, &self.id());
        self.channel.post(&Message::Credential(msg))
    }

    /// Builds the anonymity set from every credential posting on the
    /// log. Only available once credential generation has closed, so
    /// that all honest participants accumulate the same set.
    ///
    /// Postings with bad signatures or unparseable commitments are
    /// dropped; when the election carries an eligibility list, postings
    /// from keys outside it are dropped too. If one key posted several
    /// commitments the latest wins, letting a voter recover from a lost
    /// seed before casting opens.
    pub fn anonymity_set(&self) -> Result<Box<dyn AnonymitySet>> {
        if self.phase() <= ElectionPhase::CredGen {
            return Err(Error::Phase(self.phase()));
        }
        let restricted = !self.params.eligibility_list.is_empty();
        let mut by_key: HashMap<[u8; 32], Commitment> = HashMap::new();
        for msg in self.channel.get()? {
            let cred = match msg {
                Message::Credential(c) => c,
                _ => continue,
            };
            if let Err(e) = cred.verify(&self.id()) {
                debug!("dropping credential posting: {e}");
                continue;
            }
            let key_hash = hash(&cred.public_key);
            if restricted && !self.params.eligibility_list.contains(&key_hash) {
                debug!("dropping credential posting from ineligible key");
                continue;
            }
            match self.cred_sys.parse_commitment(&cred.credential) {
                Ok(commitment) => {
                    by_key.insert(key_hash, commitment);
                }
                Err(e) => debug!("dropping unparseable commitment: {e}"),
            }
        }
        let commitments: Vec<Commitment> = by_key.into_values().collect();
        self.cred_sys.make_anonymity_set(&commitments)
    }

    /// Casts a ballot for the given selection of choice indices.
    ///
    /// The puzzle is sized to the time remaining until the tally phase,
    /// and the solution is persisted before the ballot is posted: once
    /// the ballot is on the log, the reveal must not depend on anything
    /// that can be lost.
    pub fn vote(&self, selection: &[usize]) -> Result<()> {
        if self.phase() != ElectionPhase::Cast {
            return Err(Error::Phase(self.phase()));
        }
        let set = self.anonymity_set()?;
        let secret = self.secrets.anonymity_secret(self.cred_sys.as_ref())?;
        let ballot = self.method.vote(selection)?;

        let remaining = (self.params.tally_start - Utc::now()).num_seconds().max(0) as u64;
        let sol = self.vdf.create(remaining)?;
        self.secrets.set_vdf_solution(&sol)?;

        let encrypted = EncryptedBallot::encrypt(&ballot, &sol.input)?;
        let signed = encrypted.sign(set.as_ref(), secret.as_ref())?;
        self.secrets.set_ballot(&signed)?;
        self.channel.post(&Message::Ballot(signed))
    }

    /// Reveals the decryption of this voter's own ballot, from the
    /// solution saved at cast time.
    pub fn reveal_ballot_decryption(&self) -> Result<()> {
        if self.phase() != ElectionPhase::Tally {
            return Err(Error::Phase(self.phase()));
        }
        let sol = self.secrets.vdf_solution()?;
        self.post_ballot_decryption(&sol)
    }

    /// Posts a puzzle solution, typically one recovered by solving
    /// another voter's puzzle the slow way.
    pub fn post_ballot_decryption(&self, sol: &VdfSolution) -> Result<()> {
        if self.phase() != ElectionPhase::Tally {
            return Err(Error::Phase(self.phase()));
        }
        self.channel
            .post(&Message::Decryption(DecryptionMessage::from_solution(sol)))
    }

    /// Valid ballots whose decryption has not appeared on the log yet.
    /// These are the puzzles solvers should be grinding on.
    pub fn missing_decryptions(&self) -> Result<Vec<EncryptedBallot>> {
        if self.phase() < ElectionPhase::Tally {
            return Err(Error::Phase(self.phase()));
        }
        let set = self.anonymity_set()?;
        let (ballots, decryptions) = self.partition_log()?;
        let mut missing = Vec::new();
        for ballot in self.dedup_valid(&ballots, set.as_ref()) {
            if let Err(Error::NotFound(_)) =
                self.decrypt_ballot(&ballot.encrypted_ballot, &decryptions)
            {
                missing.push(ballot.encrypted_ballot.clone());
            }
        }
        Ok(missing)
    }

    /// Computes the election's progress, and its tally once the log
    /// carries decryptable ballots.
    pub fn progress(&self) -> Result<Progress> {
        let phase = self.phase();
        if phase <= ElectionPhase::CredGen {
            return Ok(Progress {
                phase,
                count: 0,
                total: 0,
                tally: None,
            });
        }
        // No surviving commitments means no valid ballots, not a
        // failure: an empty or fully-spammed log still has a progress.
        let set = match self.anonymity_set() {
            Ok(set) => Some(set),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let (ballots, decryptions) = self.partition_log()?;
        let valid = match &set {
            Some(set) => self.dedup_valid(&ballots, set.as_ref()),
            None => Vec::new(),
        };

        if phase == ElectionPhase::Cast {
            return Ok(Progress {
                phase,
                count: valid.len(),
                total: set.as_ref().map_or(0, |s| s.len()),
                tally: None,
            });
        }

        let mut decrypted: Vec<Ballot> = Vec::new();
        let mut undecryptable = 0usize;
        for ballot in &valid {
            match self.decrypt_ballot(&ballot.encrypted_ballot, &decryptions) {
                Ok(plain) => decrypted.push(plain),
                Err(Error::NotFound(_)) => {}
                Err(e) => {
                    warn!("ballot will never decrypt: {e}");
                    undecryptable += 1;
                }
            }
        }
        let total = match phase {
            // Ballots proven undecryptable are no longer expected.
            ElectionPhase::Tally => valid.len() - undecryptable,
            _ => valid.len(),
        };
        Ok(Progress {
            phase,
            count: decrypted.len(),
            total,
            tally: Some(self.method.tally(&decrypted)),
        })
    }

    fn partition_log(&self) -> Result<(Vec<SignedBallot>, Vec<DecryptionMessage>)> {
        let mut ballots = Vec::new();
        let mut decryptions = Vec::new();
        for msg in self.channel.get()? {
            match msg {
                Message::Ballot(b) => ballots.push(b),
                Message::Decryption(d) => decryptions.push(d),
                Message::Credential(_) => {}
            }
        }
        Ok((ballots, decryptions))
    }

    /// Filters the raw ballot list down to at most one valid ballot per
    /// credential. The first ballot posted under a credential claims
    /// it, valid or not: letting a later ballot reclaim a credential
    /// would allow vote replacement after observing the log.
    fn dedup_valid(&self, ballots: &[SignedBallot], set: &dyn AnonymitySet) -> Vec<SignedBallot> {
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut valid = Vec::new();
        for ballot in ballots {
            if !seen.insert(ballot.credential.clone()) {
                debug!("dropping repeat ballot for credential");
                continue;
            }
            match ballot.verify(set) {
                Ok(()) => valid.push(ballot.clone()),
                Err(e) => debug!("dropping ballot with bad signature: {e}"),
            }
        }
        valid
    }

    /// Finds a verifying decryption for a ballot and opens it.
    ///
    /// A reveal whose proof fails verification is ignored rather than
    /// fatal, since anyone can post garbage under a matching input
    /// hash. A reveal that verifies but fails authenticated decryption
    /// condemns the ballot: the puzzle has exactly one solution, so no
    /// future reveal can do better.
    fn decrypt_ballot(
        &self,
        encrypted: &EncryptedBallot,
        decryptions: &[DecryptionMessage],
    ) -> Result<Ballot> {
        let input_hash = hash(&encrypted.vdf_input);
        for dec in decryptions.iter().filter(|d| d.input_hash == input_hash) {
            let sol = dec.solution_for(&encrypted.vdf_input);
            if let Err(e) = self.vdf.verify(&sol) {
                debug!("ignoring decryption with bad proof: {e}");
                continue;
            }
            return encrypted.decrypt(&sol);
        }
        Err(Error::NotFound("ballot decryption"))
    }
}
