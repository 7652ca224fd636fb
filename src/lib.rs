pub mod criteria;
mod error;
pub mod num;
pub mod tally;
pub mod weights;

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

pub use crate::error::{BallotError, Error, InvalidInput};
pub use crate::num::Normalized;
pub use crate::tally::{instant_runoff, Tally};
pub use crate::weights::{CandidateWeight, Selection};

pub trait Candidate {
    type Id: Ord + Clone + Debug;
    fn id(&self) -> Self::Id;
}

/// Where a weighted draw landed, kept so that a selection can be checked against the weights it
/// was made from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Draw {
    /// Position in `[0, total_weight)`.
    pub position: f64,
    pub total_weight: f64,
    /// Set when every weight was zero and the draw was made uniformly instead.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uniform: bool,
}

#[derive(Debug)]
pub struct Selected<'c, Candidate> {
    pub candidate: &'c Candidate,
    pub weight: Normalized,
    pub draw: Draw,
}

/// Perform a random selection of one of the provided candidates, weighted by the paired
/// `Normalized` weight. Candidates are walked in order of their IDs, accumulating weight until the
/// running sum exceeds a uniform draw from `[0, total_weight)`.
///
/// Duplicate candidates are only considered once, keeping the last weight given. If every weight is
/// zero the selection falls back to a uniform draw over all candidates.
pub fn select<'c, Rng, Candidate, Candidates>(
    rng: &mut Rng,
    candidates: Candidates,
) -> Result<Selected<'c, Candidate>, Error<Candidate::Id>>
where
    Rng: rand::Rng,
    Candidate: crate::Candidate + 'c,
    Candidates: IntoIterator<Item = (&'c Candidate, Normalized)>,
{
    // Collect into a map to remove duplicate candidates.
    let candidates: BTreeMap<Candidate::Id, (&'c Candidate, Normalized)> = candidates
        .into_iter()
        .map(|(candidate, weight)| (candidate.id(), (candidate, weight)))
        .collect();
    if candidates.is_empty() {
        return Err(Error::EmptyCollection);
    }
    let candidates: Vec<(&'c Candidate, Normalized)> = candidates.into_values().collect();

    let total_weight: f64 = candidates.iter().map(|(_, w)| w.as_f64()).sum();
    if total_weight <= 0.0 {
        tracing::warn!(
            candidates = candidates.len(),
            "all weights are zero, selecting uniformly",
        );
        let index = rng.gen_range(0..candidates.len());
        let (candidate, weight) = candidates[index];
        return Ok(Selected {
            candidate,
            weight,
            draw: Draw {
                position: index as f64,
                total_weight: candidates.len() as f64,
                uniform: true,
            },
        });
    }

    let position = rng.gen::<f64>() * total_weight;
    let mut running = 0.0;
    // Floating point error may leave `running` just short of `total_weight`, in which case the
    // last candidate with a nonzero weight is picked.
    let mut picked = None;
    for &(candidate, weight) in &candidates {
        if weight.is_zero() {
            continue;
        }
        picked = Some((candidate, weight));
        running += weight.as_f64();
        if running > position {
            break;
        }
    }
    let (candidate, weight) = picked.ok_or(Error::EmptyCollection)?;
    Ok(Selected {
        candidate,
        weight,
        draw: Draw {
            position,
            total_weight,
            uniform: false,
        },
    })
}
