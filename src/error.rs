use std::fmt::Debug;

use thiserror::Error;

use crate::tally::Round;

/// Failures of the selection algorithms. All of them are recoverable: callers are expected to
/// translate them into a rejection of the request or fall back to another strategy.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Error<Id: Debug> {
    #[error("invalid input: {0}")]
    InvalidInput(InvalidInput<Id>),

    #[error("no candidates to select from")]
    EmptyCollection,

    /// Every remaining candidate is tied. `tied` holds that final set, `rounds` the trace up to and
    /// including the deadlocked round.
    #[error("no clear winner, {} candidates tied after {} rounds", tied.len(), rounds.len())]
    NoClearWinner {
        tied: Vec<Id>,
        rounds: Vec<Round<Id>>,
    },
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum InvalidInput<Id: Debug> {
    #[error("{0:?} is not a member of the collection")]
    NotAMember(Id),

    #[error("ballot {ballot} is invalid: {reason}")]
    InvalidBallot { ballot: usize, reason: BallotError<Id> },
}

#[derive(Clone, Debug, PartialEq, Error)]
pub enum BallotError<Id: Debug> {
    #[error("no candidates ranked")]
    Empty,

    #[error("{0:?} is ranked more than once")]
    Duplicate(Id),

    #[error("{0:?} is not a candidate")]
    UnknownCandidate(Id),
}

impl<Id: Debug> From<InvalidInput<Id>> for Error<Id> {
    fn from(err: InvalidInput<Id>) -> Self {
        Self::InvalidInput(err)
    }
}

impl<Id: Debug> Error<Id> {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
