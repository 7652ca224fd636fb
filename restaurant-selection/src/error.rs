use thiserror::Error;

use crate::{DecisionMethod, RestaurantId, UserId};

#[derive(Debug, Error)]
pub enum DecisionError {
    #[error(transparent)]
    Engine(#[from] decision_engine::Error<RestaurantId>),

    #[error("restaurant {0} is already in the collection")]
    DuplicateRestaurant(RestaurantId),

    #[error("decision is no longer active")]
    NotActive,

    #[error("decision uses {actual:?} selection, not {expected:?}")]
    WrongMethod {
        expected: DecisionMethod,
        actual: DecisionMethod,
    },

    #[error("{0} is not a participant in this decision")]
    NotParticipant(UserId),

    #[error("{0} has already submitted a ballot")]
    AlreadyVoted(UserId),

    #[error("a tiered decision needs at least one participant")]
    NoParticipants,

    #[error("voting is still open: {submitted} of {expected} ballots submitted")]
    NotReady { submitted: usize, expected: usize },

    #[error("voting closed at the deadline")]
    VotingClosed,

    #[error("deadline passed without any ballots")]
    Expired,

    #[error("invalid selection config: {0}")]
    InvalidConfig(String),
}

impl DecisionError {
    /// Bad input from the caller, as opposed to a decision in the wrong state.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            Self::Engine(err) => err.is_invalid_input(),
            Self::DuplicateRestaurant(_) | Self::NotParticipant(_) | Self::InvalidConfig(_) => true,
            _ => false,
        }
    }
}
