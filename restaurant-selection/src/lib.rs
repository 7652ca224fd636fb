//! Restaurant collections and the group decisions made over them.

mod collection;
mod config;
mod decision;
mod error;
#[cfg(test)]
mod test;

use serde::{Deserialize, Serialize};

pub use decision_engine::{
    tally::{Round, Victory},
    CandidateWeight, Draw, Normalized, Selection,
};

pub use crate::collection::{Collection, Owner};
pub use crate::config::SelectionConfig;
pub use crate::decision::{
    history, BallotStatus, Decision, DecisionMethod, DecisionResult, DecisionStatus, NewDecision,
    WeightSnapshot,
};
pub use crate::error::DecisionError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(RestaurantId);
define_id!(CollectionId);
define_id!(DecisionId);
define_id!(UserId);
define_id!(GroupId);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub cuisine: String,
    /// 1 ($) through 4 ($$$$).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_range: Option<u8>,
    /// Out of 5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

impl Restaurant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RestaurantId::new(id),
            name: name.into(),
            address: String::new(),
            cuisine: String::new(),
            price_range: None,
            rating: None,
        }
    }
}

impl decision_engine::Candidate for Restaurant {
    type Id = RestaurantId;

    fn id(&self) -> Self::Id {
        self.id.clone()
    }
}
