//! Pluggable voting methods.
//!
//! A method turns a voter's selection into opaque ballot bytes and later
//! folds a batch of decrypted ballots into a tally. Malformed ballots
//! are skipped during tallying rather than failing the whole count; by
//! the time tallying runs, ballot bytes are adversarial input.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::params::MAX_CHOICES;

/// Decrypted ballot bytes; their interpretation belongs to the method.
pub type Ballot = Vec<u8>;

/// Votes received by one choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyCount {
    pub index: usize,
    pub count: u64,
}

/// Per-choice vote counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<TallyCount>,
}

impl Tally {
    fn zeroed(num_choices: usize) -> Self {
        Tally {
            counts: (0..num_choices)
                .map(|index| TallyCount { index, count: 0 })
                .collect(),
        }
    }

    fn add(&mut self, index: usize) {
        self.counts[index].count += 1;
    }

    /// Counts in choice order.
    pub fn counts(&self) -> &[TallyCount] {
        &self.counts
    }

    pub fn count_for(&self, index: usize) -> u64 {
        self.counts[index].count
    }

    /// Counts sorted ascending by votes, ties broken by choice index.
    /// The ordering is total, so every participant ranks identically.
    pub fn sorted(&self) -> Vec<TallyCount> {
        let mut sorted = self.counts.clone();
        sorted.sort_by_key(|c| (c.count, c.index));
        sorted
    }
}

pub trait VotingMethod {
    /// Encodes a selection of choice indices into ballot bytes.
    fn vote(&self, selection: &[usize]) -> Result<Ballot>;

    /// Counts a batch of decrypted ballots, skipping malformed ones.
    fn tally(&self, ballots: &[Ballot]) -> Tally;
}

/// Single-choice voting: the ballot is one byte naming the chosen index.
pub struct Plurality {
    choices: usize,
}

impl VotingMethod for Plurality {
    fn vote(&self, selection: &[usize]) -> Result<Ballot> {
        match selection {
            [c] if *c < self.choices => Ok(vec![*c as u8]),
            [_] => Err(Error::Parse("selection", "choice index out of range")),
            _ => Err(Error::Parse("selection", "exactly one choice required")),
        }
    }

    fn tally(&self, ballots: &[Ballot]) -> Tally {
        let mut tally = Tally::zeroed(self.choices);
        for ballot in ballots {
            match ballot.as_slice() {
                [c] if (*c as usize) < self.choices => tally.add(*c as usize),
                _ => log::debug!("skipping malformed plurality ballot"),
            }
        }
        tally
    }
}

/// Approval voting: one byte per choice, 1 to approve and 0 to reject.
/// A ballot with any other byte value is void in its entirety.
pub struct Approval {
    choices: usize,
}

impl VotingMethod for Approval {
    fn vote(&self, selection: &[usize]) -> Result<Ballot> {
        let mut ballot = vec![0u8; self.choices];
        for &c in selection {
            if c >= self.choices {
                return Err(Error::Parse("selection", "choice index out of range"));
            }
            ballot[c] = 1;
        }
        Ok(ballot)
    }

    fn tally(&self, ballots: &[Ballot]) -> Tally {
        let mut tally = Tally::zeroed(self.choices);
        for ballot in ballots {
            if ballot.len() != self.choices || ballot.iter().any(|&b| b > 1) {
                log::debug!("skipping malformed approval ballot");
                continue;
            }
            for (index, &approved) in ballot.iter().enumerate() {
                if approved == 1 {
                    tally.add(index);
                }
            }
        }
        tally
    }
}

type MethodConstructor = fn(usize) -> Box<dyn VotingMethod>;

/// Name-indexed registry of voting methods.
pub struct Registry {
    constructors: HashMap<&'static str, MethodConstructor>,
}

impl Registry {
    pub fn empty() -> Self {
        Registry {
            constructors: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, constructor: MethodConstructor) {
        self.constructors.insert(name, constructor);
    }

    /// Instantiates the named method for an election with `num_choices`
    /// choices.
    pub fn get(&self, name: &str, num_choices: usize) -> Result<Box<dyn VotingMethod>> {
        if num_choices == 0 || num_choices > MAX_CHOICES {
            return Err(Error::Parse("election params", "choice count out of range"));
        }
        let constructor = self
            .constructors
            .get(name)
            .ok_or(Error::NotFound("voting method"))?;
        Ok(constructor(num_choices))
    }
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Registry::empty();
        registry.register("Plurality", |choices| Box::new(Plurality { choices }));
        registry.register("Approval", |choices| Box::new(Approval { choices }));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ballots(method: &dyn VotingMethod, selections: &[&[usize]]) -> Vec<Ballot> {
        selections
            .iter()
            .map(|s| method.vote(s).unwrap())
            .collect()
    }

    #[test]
    fn plurality_counts_votes() {
        let method = Registry::default().get("Plurality", 3).unwrap();
        let tally = method.tally(&ballots(method.as_ref(), &[&[0], &[1], &[1], &[2]]));
        assert_eq!(tally.count_for(0), 1);
        assert_eq!(tally.count_for(1), 2);
        assert_eq!(tally.count_for(2), 1);
    }

    #[test]
    fn plurality_rejects_bad_selections() {
        let method = Registry::default().get("Plurality", 3).unwrap();
        assert!(method.vote(&[3]).is_err());
        assert!(method.vote(&[]).is_err());
        assert!(method.vote(&[0, 1]).is_err());
    }

    #[test]
    fn plurality_skips_malformed_ballots() {
        let method = Registry::default().get("Plurality", 2).unwrap();
        let tally = method.tally(&[vec![0], vec![7], vec![0, 1], vec![], vec![1]]);
        assert_eq!(tally.count_for(0), 1);
        assert_eq!(tally.count_for(1), 1);
    }

    #[test]
    fn approval_counts_independent_approvals() {
        let method = Registry::default().get("Approval", 3).unwrap();
        let tally = method.tally(&ballots(method.as_ref(), &[&[1, 0], &[1], &[2, 0]]));
        assert_eq!(tally.count_for(0), 2);
        assert_eq!(tally.count_for(1), 2);
        assert_eq!(tally.count_for(2), 1);
    }

    #[test]
    fn approval_voids_whole_malformed_ballot() {
        let method = Registry::default().get("Approval", 2).unwrap();
        let tally = method.tally(&[vec![1, 2], vec![1], vec![0, 1]]);
        assert_eq!(tally.count_for(0), 0);
        assert_eq!(tally.count_for(1), 1);
    }

    #[test]
    fn sorted_breaks_ties_by_index() {
        let method = Registry::default().get("Plurality", 4).unwrap();
        let tally = method.tally(&ballots(method.as_ref(), &[&[2], &[1], &[3], &[1]]));
        let order: Vec<usize> = tally.sorted().iter().map(|c| c.index).collect();
        assert_eq!(order, vec![0, 2, 3, 1]);
    }

    #[test]
    fn unknown_method_and_bad_choice_counts_rejected() {
        let registry = Registry::default();
        assert!(matches!(
            registry.get("Borda", 3),
            Err(Error::NotFound(_))
        ));
        assert!(registry.get("Plurality", 0).is_err());
        assert!(registry.get("Plurality", 256).is_err());
    }
}
