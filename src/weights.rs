use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::criteria::recency::{days_between, RecoveryCurve};
use crate::{Error, InvalidInput, Normalized};

/// A past completed selection of `candidate`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection<Id> {
    pub candidate: Id,
    pub selected_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateWeight {
    pub weight: Normalized,
    pub days_until_full_weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_selected_at: Option<DateTime<Utc>>,
}

impl CandidateWeight {
    pub const FULL: Self = Self {
        weight: Normalized::ONE,
        days_until_full_weight: 0.0,
        last_selected_at: None,
    };
}

/// Fails with `InvalidInput` when `selection` refers to a candidate outside of `members`.
pub fn check_member<Id>(members: &BTreeSet<Id>, selection: &Selection<Id>) -> Result<(), Error<Id>>
where
    Id: Ord + Clone + Debug,
{
    if members.contains(&selection.candidate) {
        return Ok(());
    }
    Err(InvalidInput::NotAMember(selection.candidate.clone()).into())
}

/// Weigh every member by how recently it was last selected. Members absent from `history` get a
/// weight of exactly 1. History entries for candidates that are no longer members are skipped,
/// since restaurants may be removed from a collection after being picked.
pub fn calculate<'h, Id, Members, History>(
    curve: &RecoveryCurve,
    members: Members,
    history: History,
    now: DateTime<Utc>,
) -> BTreeMap<Id, CandidateWeight>
where
    Id: Ord + Clone + Debug + 'h,
    Members: IntoIterator<Item = Id>,
    History: IntoIterator<Item = &'h Selection<Id>>,
{
    let members: BTreeSet<Id> = members.into_iter().collect();
    let mut last_selected: BTreeMap<Id, DateTime<Utc>> = BTreeMap::new();
    for selection in history {
        if let Err(err) = check_member(&members, selection) {
            tracing::debug!(%err, "skipping selection history entry");
            continue;
        }
        last_selected
            .entry(selection.candidate.clone())
            .and_modify(|t| *t = (*t).max(selection.selected_at))
            .or_insert(selection.selected_at);
    }

    members
        .into_iter()
        .map(|id| {
            let weight = match last_selected.get(&id) {
                None => CandidateWeight::FULL,
                Some(&selected_at) => {
                    let days = days_between(selected_at, now);
                    CandidateWeight {
                        weight: curve.weight(days),
                        days_until_full_weight: curve.days_until_full_weight(days),
                        last_selected_at: Some(selected_at),
                    }
                }
            };
            (id, weight)
        })
        .collect()
}
