//! Instant-runoff tally over ranked ballots.
//!
//! Each round, every ballot counts toward its highest-ranked candidate that is still in the
//! running. Ballots with no such candidate left are exhausted and abstain. A candidate holding a
//! strict majority of the votes cast in a round wins. Otherwise every candidate tied for the fewest
//! votes is eliminated at once and the next round begins. The active set shrinks every round, so
//! the tally terminates after at most one round per candidate.

use std::collections::BTreeSet;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::{BallotError, Error, InvalidInput};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count<Id> {
    pub candidate: Id,
    pub votes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round<Id> {
    pub number: usize,
    /// Votes per active candidate, ordered by candidate.
    pub counts: Vec<Count<Id>>,
    pub exhausted: usize,
    #[serde(default = "Vec::new", skip_serializing_if = "Vec::is_empty")]
    pub eliminated: Vec<Id>,
}

impl<Id> Round<Id> {
    pub fn votes_cast(&self) -> usize {
        self.counts.iter().map(|c| c.votes).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Victory {
    /// Strict majority of the votes cast in the final round.
    Majority,
    /// Last candidate remaining after all others were eliminated.
    LastRemaining,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally<Id> {
    pub winner: Id,
    pub victory: Victory,
    pub rounds: Vec<Round<Id>>,
}

impl<Id: PartialEq> Tally<Id> {
    /// Votes held by the winner in the final round.
    pub fn winning_votes(&self) -> usize {
        self.rounds
            .last()
            .and_then(|r| r.counts.iter().find(|c| c.candidate == self.winner))
            .map(|c| c.votes)
            .unwrap_or(0)
    }
}

/// Fails if `ballot` is empty, ranks a candidate twice, or ranks something outside of
/// `candidates`. `index` identifies the ballot in the returned error.
pub fn validate_ballot<Id>(
    candidates: &BTreeSet<Id>,
    index: usize,
    ballot: &[Id],
) -> Result<(), Error<Id>>
where
    Id: Ord + Clone + Debug,
{
    let invalid = |reason| InvalidInput::InvalidBallot {
        ballot: index,
        reason,
    };
    if ballot.is_empty() {
        return Err(invalid(BallotError::Empty).into());
    }
    let mut seen = BTreeSet::new();
    for id in ballot {
        if !candidates.contains(id) {
            return Err(invalid(BallotError::UnknownCandidate(id.clone())).into());
        }
        if !seen.insert(id) {
            return Err(invalid(BallotError::Duplicate(id.clone())).into());
        }
    }
    Ok(())
}

/// Run an instant-runoff tally of `ballots` over `candidates`. Ballots may rank any subset of the
/// candidates, most preferred first.
///
/// Fails with `EmptyCollection` when there are no candidates, `InvalidInput` when a ballot does
/// not pass [`validate_ballot`], and `NoClearWinner` when all remaining candidates are tied (which
/// includes the case of every remaining candidate holding zero votes).
pub fn instant_runoff<Id, Candidates, Ballot>(
    candidates: Candidates,
    ballots: &[Ballot],
) -> Result<Tally<Id>, Error<Id>>
where
    Id: Ord + Clone + Debug,
    Candidates: IntoIterator<Item = Id>,
    Ballot: AsRef<[Id]>,
{
    let mut active: BTreeSet<Id> = candidates.into_iter().collect();
    if active.is_empty() {
        return Err(Error::EmptyCollection);
    }
    for (index, ballot) in ballots.iter().enumerate() {
        validate_ballot(&active, index, ballot.as_ref())?;
    }

    let mut rounds: Vec<Round<Id>> = Vec::new();
    loop {
        let mut round = count(rounds.len() + 1, &active, ballots);
        tracing::debug!(
            round = round.number,
            active = active.len(),
            cast = round.votes_cast(),
            exhausted = round.exhausted,
            "tally round",
        );

        if active.len() == 1 {
            let winner = round.counts[0].candidate.clone();
            rounds.push(round);
            return Ok(Tally {
                winner,
                victory: Victory::LastRemaining,
                rounds,
            });
        }

        let cast = round.votes_cast();
        let leader = round.counts.iter().max_by_key(|c| c.votes);
        if let Some(leader) = leader.filter(|c| (c.votes * 2) > cast) {
            let winner = leader.candidate.clone();
            rounds.push(round);
            return Ok(Tally {
                winner,
                victory: Victory::Majority,
                rounds,
            });
        }

        let fewest = round.counts.iter().map(|c| c.votes).min().unwrap_or(0);
        let eliminated: Vec<Id> = round
            .counts
            .iter()
            .filter(|c| c.votes == fewest)
            .map(|c| c.candidate.clone())
            .collect();
        if eliminated.len() == active.len() {
            rounds.push(round);
            return Err(Error::NoClearWinner {
                tied: eliminated,
                rounds,
            });
        }

        for id in &eliminated {
            active.remove(id);
        }
        round.eliminated = eliminated;
        rounds.push(round);
    }
}

fn count<Id, Ballot>(number: usize, active: &BTreeSet<Id>, ballots: &[Ballot]) -> Round<Id>
where
    Id: Ord + Clone,
    Ballot: AsRef<[Id]>,
{
    let mut counts: Vec<Count<Id>> = active
        .iter()
        .map(|id| Count {
            candidate: id.clone(),
            votes: 0,
        })
        .collect();
    let mut exhausted = 0;
    for ballot in ballots {
        let choice = ballot.as_ref().iter().find(|id| active.contains(*id));
        // `counts` is sorted by candidate since it was built from a BTreeSet.
        match choice.and_then(|id| counts.binary_search_by(|c| c.candidate.cmp(id)).ok()) {
            Some(index) => counts[index].votes += 1,
            None => exhausted += 1,
        }
    }
    Round {
        number,
        counts,
        exhausted,
        eliminated: Vec::new(),
    }
}
