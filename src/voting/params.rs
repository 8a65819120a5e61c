//! Election parameters and the phase state machine.
//!
//! The four phases are a pure step function of the clock against three
//! strictly increasing boundary timestamps; no participant ever posts a
//! "phase change" message, so nobody can be tricked into acting early
//! or late by a malicious log.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::wire::{BufferReader, BufferWriter};

use super::eligibility::EligibilityList;

const PARAMS_VERSION: u32 = 0;

/// Maximum number of choices a single election may offer.
pub const MAX_CHOICES: usize = 255;

/// The four consecutive phases of an election.
///
/// The discriminants double as wire tags for the message kind posted
/// during each phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ElectionPhase {
    /// Voters post credential commitments.
    CredGen = 1,
    /// Voters post encrypted, time-locked ballots.
    Cast = 2,
    /// Voters reveal decryption keys; solvers race the stragglers.
    Tally = 3,
    /// The log is final and the result can be computed by anyone.
    End = 4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionParams {
    pub cast_start: DateTime<Utc>,
    pub tally_start: DateTime<Utc>,
    pub tally_end: DateTime<Utc>,
    pub max_vdf_difficulty: u64,
    pub voting_method: String,
    pub title: String,
    pub description: String,
    pub choices: Vec<String>,
    pub eligibility_list: EligibilityList,
}

impl ElectionParams {
    /// Current phase as a step function of the clock.
    pub fn phase(&self) -> ElectionPhase {
        self.phase_at(Utc::now())
    }

    pub fn phase_at(&self, now: DateTime<Utc>) -> ElectionPhase {
        if now < self.cast_start {
            ElectionPhase::CredGen
        } else if now < self.tally_start {
            ElectionPhase::Cast
        } else if now < self.tally_end {
            ElectionPhase::Tally
        } else {
            ElectionPhase::End
        }
    }

    fn validate(&self) -> Result<()> {
        if self.cast_start >= self.tally_start || self.tally_start >= self.tally_end {
            return Err(Error::Parse(
                "election params",
                "phase boundaries not strictly increasing",
            ));
        }
        if self.choices.is_empty() || self.choices.len() > MAX_CHOICES {
            return Err(Error::Parse("election params", "choice count out of range"));
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        w.write_u32(PARAMS_VERSION);
        w.write_u64(self.cast_start.timestamp() as u64);
        w.write_u64(self.tally_start.timestamp() as u64);
        w.write_u64(self.tally_end.timestamp() as u64);
        w.write_u64(self.max_vdf_difficulty);
        w.write_vec(self.voting_method.as_bytes());
        w.write_vec(self.title.as_bytes());
        w.write_vec(self.description.as_bytes());
        w.write_u8(self.choices.len() as u8);
        for choice in &self.choices {
            w.write_vec(choice.as_bytes());
        }
        w.write(&self.eligibility_list.to_bytes());
        w.into_bytes()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut r = BufferReader::new("election params", bytes);
        if r.read_u32()? != PARAMS_VERSION {
            return Err(Error::Parse("election params", "unknown version"));
        }
        let cast_start = read_timestamp(&mut r)?;
        let tally_start = read_timestamp(&mut r)?;
        let tally_end = read_timestamp(&mut r)?;
        let max_vdf_difficulty = r.read_u64()?;
        let voting_method = read_string(&mut r)?;
        let title = read_string(&mut r)?;
        let description = read_string(&mut r)?;
        let count = r.read_u8()? as usize;
        let mut choices = Vec::with_capacity(count);
        for _ in 0..count {
            choices.push(read_string(&mut r)?);
        }
        let eligibility_list = EligibilityList::from_bytes(r.read_remaining())?;
        let params = ElectionParams {
            cast_start,
            tally_start,
            tally_end,
            max_vdf_difficulty,
            voting_method,
            title,
            description,
            choices,
            eligibility_list,
        };
        params.validate()?;
        Ok(params)
    }
}

fn read_timestamp(r: &mut BufferReader<'_>) -> Result<DateTime<Utc>> {
    let unix = r.read_u64()?;
    DateTime::from_timestamp(unix as i64, 0)
        .ok_or(Error::Parse("election params", "timestamp out of range"))
}

fn read_string(r: &mut BufferReader<'_>) -> Result<String> {
    let bytes = r.read_vec()?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::Parse("election params", "invalid UTF-8 string"))
}
