//! Local voter secrets.
//!
//! Everything a voter must not lose mid-election hangs off one random
//! seed: the long-term signing key and the per-election anonymity
//! secret are both derived from it, and the cast ballot plus its puzzle
//! solution are persisted so a crash between casting and the tally
//! phase cannot orphan an undecryptable ballot.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use data_encoding::HEXLOWER;
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::anoncred::{CredentialSystem, Secret};
use crate::error::{Error, Result};
use crate::util::{kdf, kdf_id};
use crate::vdf::VdfSolution;
use crate::wire::{BufferReader, BufferWriter};

use super::ballot::SignedBallot;
use super::ElectionId;

pub trait SecretsManager {
    /// Long-term key that signs credential postings.
    fn signing_key(&self) -> Result<SigningKey>;

    /// Per-election anonymity secret, derived so that the same voter
    /// always recovers the same secret for the same election.
    fn anonymity_secret(&self, sys: &dyn CredentialSystem) -> Result<Box<dyn Secret>>;

    fn ballot(&self) -> Result<SignedBallot>;
    fn set_ballot(&self, ballot: &SignedBallot) -> Result<()>;

    fn vdf_solution(&self) -> Result<VdfSolution>;
    fn set_vdf_solution(&self, sol: &VdfSolution) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretsFile {
    seed: String,
    #[serde(default)]
    elections: HashMap<String, ElectionSecrets>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ElectionSecrets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ballot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vdf_solution: Option<String>,
}

/// JSON-file-backed secrets store, scoped to one election.
pub struct FileSecretsManager {
    path: PathBuf,
    election_id: ElectionId,
}

impl FileSecretsManager {
    /// Opens the store, creating the file with a fresh random seed on
    /// first use.
    pub fn open(path: impl AsRef<Path>, election_id: ElectionId) -> Result<Self> {
        let manager = FileSecretsManager {
            path: path.as_ref().to_path_buf(),
            election_id,
        };
        manager.load()?;
        Ok(manager)
    }

    fn load(&self) -> Result<SecretsFile> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let mut seed = [0u8; 32];
                OsRng.fill_bytes(&mut seed);
                let file = SecretsFile {
                    seed: HEXLOWER.encode(&seed),
                    elections: HashMap::new(),
                };
                self.save(&file)?;
                Ok(file)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, file: &SecretsFile) -> Result<()> {
        fs::write(&self.path, serde_json::to_vec_pretty(file)?)?;
        Ok(())
    }

    fn seed(&self) -> Result<[u8; 32]> {
        let file = self.load()?;
        let bytes = HEXLOWER
            .decode(file.seed.as_bytes())
            .map_err(|_| Error::Parse("secrets file", "seed is not valid hex"))?;
        bytes
            .try_into()
            .map_err(|_| Error::Parse("secrets file", "seed has wrong length"))
    }

    fn election_key(&self) -> String {
        HEXLOWER.encode(&self.election_id)
    }

    fn read_blob(
        &self,
        select: impl Fn(&ElectionSecrets) -> Option<&String>,
        missing: &'static str,
    ) -> Result<Vec<u8>> {
        let file = self.load()?;
        let entry = file
            .elections
            .get(&self.election_key())
            .and_then(|e| select(e))
            .ok_or(Error::NotFound(missing))?;
        HEXLOWER
            .decode(entry.as_bytes())
            .map_err(|_| Error::Parse("secrets file", "stored blob is not valid hex"))
    }

    fn write_blob(
        &self,
        select: impl Fn(&mut ElectionSecrets) -> &mut Option<String>,
        bytes: &[u8],
    ) -> Result<()> {
        let mut file = self.load()?;
        let entry = file.elections.entry(self.election_key()).or_default();
        *select(entry) = Some(HEXLOWER.encode(bytes));
        self.save(&file)
    }
}

impl SecretsManager for FileSecretsManager {
    fn signing_key(&self) -> Result<SigningKey> {
        Ok(SigningKey::from_bytes(&kdf(&self.seed()?, "signing.ed25519")))
    }

    fn anonymity_secret(&self, sys: &dyn CredentialSystem) -> Result<Box<dyn Secret>> {
        let seed = kdf_id(&self.seed()?, &self.election_id, "anoncred");
        sys.derive_secret(&seed)
    }

    fn ballot(&self) -> Result<SignedBallot> {
        let bytes = self.read_blob(|e| e.ballot.as_ref(), "saved ballot")?;
        SignedBallot::from_bytes(&bytes)
    }

    fn set_ballot(&self, ballot: &SignedBallot) -> Result<()> {
        self.write_blob(|e| &mut e.ballot, &ballot.to_bytes())
    }

    fn vdf_solution(&self) -> Result<VdfSolution> {
        let bytes = self.read_blob(|e| e.vdf_solution.as_ref(), "saved puzzle solution")?;
        let mut r = BufferReader::new("saved puzzle solution", &bytes);
        let input = r.read_vec()?.to_vec();
        let output = r.read_vec()?.to_vec();
        let proof = r.read_vec()?.to_vec();
        Ok(VdfSolution {
            input,
            output,
            proof,
        })
    }

    fn set_vdf_solution(&self, sol: &VdfSolution) -> Result<()> {
        let mut w = BufferWriter::new();
        w.write_vec(&sol.input);
        w.write_vec(&sol.output);
        w.write_vec(&sol.proof);
        self.write_blob(|e| &mut e.vdf_solution, &w.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anoncred::mock::MockCredentialSystem;

    fn manager(dir: &tempfile::TempDir, eid: u8) -> FileSecretsManager {
        FileSecretsManager::open(dir.path().join("secrets.json"), [eid; 32]).unwrap()
    }

    #[test]
    fn seed_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let first = manager(&dir, 1).signing_key().unwrap();
        let second = manager(&dir, 1).signing_key().unwrap();
        assert_eq!(first.to_bytes(), second.to_bytes());
    }

    #[test]
    fn anonymity_secret_is_stable_per_election() {
        let dir = tempfile::tempdir().unwrap();
        let sys = MockCredentialSystem;
        let a = manager(&dir, 1).anonymity_secret(&sys).unwrap();
        let b = manager(&dir, 1).anonymity_secret(&sys).unwrap();
        let other = manager(&dir, 2).anonymity_secret(&sys).unwrap();
        assert_eq!(a.credential(), b.credential());
        assert_ne!(a.credential(), other.credential());
    }

    #[test]
    fn solution_roundtrip_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir, 1);
        assert!(matches!(m.vdf_solution(), Err(Error::NotFound(_))));

        let sol = VdfSolution {
            input: vec![1; 200],
            output: vec![2; 128],
            proof: vec![3; 640],
        };
        m.set_vdf_solution(&sol).unwrap();
        assert_eq!(m.vdf_solution().unwrap(), sol);

        // Scoped by election: a different election sees nothing.
        assert!(manager(&dir, 2).vdf_solution().is_err());
    }

    #[test]
    fn ballot_roundtrip() {
        use crate::voting::ballot::EncryptedBallot;
        let dir = tempfile::tempdir().unwrap();
        let m = manager(&dir, 1);
        let ballot = SignedBallot {
            credential: vec![9; 32],
            signature: vec![8; 64],
            encrypted_ballot: EncryptedBallot {
                vdf_input: vec![7; 40],
                payload: vec![6; 30],
            },
        };
        m.set_ballot(&ballot).unwrap();
        assert_eq!(m.ballot().unwrap(), ballot);
    }
}
