use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use decision_engine::{
    tally::{self, Round, Tally, Victory},
    weights, CandidateWeight, Draw, Normalized, Selection,
};
use serde::{Deserialize, Serialize};

use crate::{
    Collection, CollectionId, DecisionError, DecisionId, GroupId, Restaurant, RestaurantId,
    SelectionConfig, UserId,
};

pub type WeightSnapshot = BTreeMap<RestaurantId, CandidateWeight>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionMethod {
    Random,
    Tiered,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum DecisionStatus {
    Active,
    Completed { result: DecisionResult },
    Expired,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub restaurant_id: RestaurantId,
    pub selected_at: DateTime<Utc>,
    pub reasoning: String,
    /// Weights the random draw was made from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<WeightSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draw: Option<Draw>,
    /// Round-by-round trace of a tiered tally.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rounds: Vec<Round<RestaurantId>>,
}

/// Parameters for starting a decision over a collection.
#[derive(Clone, Debug)]
pub struct NewDecision {
    pub id: DecisionId,
    pub group_id: Option<GroupId>,
    pub method: DecisionMethod,
    pub deadline: DateTime<Utc>,
    pub visit_date: Option<NaiveDate>,
    pub participants: Vec<UserId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BallotStatus {
    pub submitted: usize,
    pub expected: usize,
    pub deadline_passed: bool,
}

impl BallotStatus {
    /// Voting can be closed once every participant has voted or the deadline has passed.
    pub fn is_ready(&self) -> bool {
        self.deadline_passed || (self.submitted >= self.expected)
    }
}

/// One selection event over a snapshot of a collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub collection_id: CollectionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    method: DecisionMethod,
    #[serde(flatten)]
    status: DecisionStatus,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_date: Option<NaiveDate>,
    participants: Vec<UserId>,
    #[serde(default)]
    ballots: BTreeMap<UserId, Vec<RestaurantId>>,
    /// Collection members at creation time.
    candidates: Vec<Restaurant>,
}

impl Decision {
    pub fn new(
        params: NewDecision,
        collection: &Collection,
        now: DateTime<Utc>,
    ) -> Result<Self, DecisionError> {
        if collection.is_empty() {
            return Err(decision_engine::Error::EmptyCollection.into());
        }
        let mut seen = BTreeSet::new();
        let participants: Vec<UserId> = params
            .participants
            .into_iter()
            .filter(|p| seen.insert(p.clone()))
            .collect();
        if (params.method == DecisionMethod::Tiered) && participants.is_empty() {
            return Err(DecisionError::NoParticipants);
        }
        Ok(Self {
            id: params.id,
            collection_id: collection.id.clone(),
            group_id: params.group_id,
            method: params.method,
            status: DecisionStatus::Active,
            created_at: now,
            deadline: params.deadline,
            visit_date: params.visit_date,
            participants,
            ballots: BTreeMap::new(),
            candidates: collection.restaurants().to_vec(),
        })
    }

    pub fn method(&self) -> DecisionMethod {
        self.method
    }

    pub fn status(&self) -> &DecisionStatus {
        &self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, DecisionStatus::Active)
    }

    pub fn result(&self) -> Option<&DecisionResult> {
        match &self.status {
            DecisionStatus::Completed { result } => Some(result),
            _ => None,
        }
    }

    pub fn participants(&self) -> &[UserId] {
        &self.participants
    }

    pub fn ballots(&self) -> &BTreeMap<UserId, Vec<RestaurantId>> {
        &self.ballots
    }

    pub fn candidates(&self) -> &[Restaurant] {
        &self.candidates
    }

    /// The completed selection, in the form consumed by weight calculation.
    pub fn selection(&self) -> Option<Selection<RestaurantId>> {
        self.result().map(|result| Selection {
            candidate: result.restaurant_id.clone(),
            selected_at: result.selected_at,
        })
    }

    pub fn ballot_status(&self, now: DateTime<Utc>) -> BallotStatus {
        BallotStatus {
            submitted: self.ballots.len(),
            expected: self.participants.len(),
            deadline_passed: now >= self.deadline,
        }
    }

    pub fn submit_ballot(
        &mut self,
        participant: UserId,
        ranking: Vec<RestaurantId>,
        now: DateTime<Utc>,
    ) -> Result<BallotStatus, DecisionError> {
        self.expect_active(DecisionMethod::Tiered)?;
        if now >= self.deadline {
            return Err(DecisionError::VotingClosed);
        }
        if !self.participants.contains(&participant) {
            return Err(DecisionError::NotParticipant(participant));
        }
        if self.ballots.contains_key(&participant) {
            return Err(DecisionError::AlreadyVoted(participant));
        }
        let candidates: BTreeSet<RestaurantId> =
            self.candidates.iter().map(|r| r.id.clone()).collect();
        tally::validate_ballot(&candidates, self.ballots.len(), &ranking)?;

        tracing::debug!(decision = %self.id, %participant, ranked = ranking.len(), "ballot submitted");
        self.ballots.insert(participant, ranking);
        Ok(self.ballot_status(now))
    }

    /// Pick a restaurant by weighted random draw, biased away from recent selections in
    /// `history`.
    pub fn complete_random<R: rand::Rng>(
        &mut self,
        rng: &mut R,
        history: &[Selection<RestaurantId>],
        config: &SelectionConfig,
        now: DateTime<Utc>,
    ) -> Result<DecisionResult, DecisionError> {
        self.expect_active(DecisionMethod::Random)?;
        let candidates: Vec<&Restaurant> = self.candidates.iter().collect();
        let pick = weighted_pick(rng, &candidates, history, config, now)?;
        let reasoning = describe_draw(&pick, candidates.len());
        let result = DecisionResult {
            restaurant_id: pick.restaurant.id.clone(),
            selected_at: now,
            reasoning,
            weights: Some(pick.weights),
            draw: Some(pick.draw),
            rounds: Vec::new(),
        };
        Ok(self.complete(result))
    }

    /// Close voting and tally the ballots. When the tally ends in a tie, the winner is drawn from
    /// the tied restaurants as in [`Decision::complete_random`].
    ///
    /// A decision whose deadline passed without any ballots expires instead, and
    /// `DecisionError::Expired` is returned.
    pub fn complete_tiered<R: rand::Rng>(
        &mut self,
        rng: &mut R,
        history: &[Selection<RestaurantId>],
        config: &SelectionConfig,
        now: DateTime<Utc>,
    ) -> Result<DecisionResult, DecisionError> {
        self.expect_active(DecisionMethod::Tiered)?;
        let status = self.ballot_status(now);
        if !status.is_ready() {
            return Err(DecisionError::NotReady {
                submitted: status.submitted,
                expected: status.expected,
            });
        }
        if self.expire_if_overdue(now) {
            return Err(DecisionError::Expired);
        }

        let ballots: Vec<&[RestaurantId]> = self.ballots.values().map(Vec::as_slice).collect();
        let ids = self.candidates.iter().map(|r| r.id.clone());
        let result = match tally::instant_runoff(ids, &ballots) {
            Ok(tally) => {
                let reasoning = self.describe_tally(&tally);
                DecisionResult {
                    restaurant_id: tally.winner,
                    selected_at: now,
                    reasoning,
                    weights: None,
                    draw: None,
                    rounds: tally.rounds,
                }
            }
            Err(decision_engine::Error::NoClearWinner { tied, rounds }) => {
                tracing::warn!(
                    decision = %self.id,
                    tied = tied.len(),
                    rounds = rounds.len(),
                    "tally ended in a tie, falling back to weighted random selection",
                );
                let candidates: Vec<&Restaurant> = self
                    .candidates
                    .iter()
                    .filter(|r| tied.contains(&r.id))
                    .collect();
                let pick = weighted_pick(rng, &candidates, history, config, now)?;
                let tied_names: Vec<&str> = candidates.iter().map(|r| r.name.as_str()).collect();
                let mut reasoning = format!(
                    "{} tied in round {}; {} was drawn from them by weighted random \
                     selection (weight {:.2} of {:.2}).",
                    tied_names.join(", "),
                    rounds.last().map_or(0, |r| r.number),
                    pick.restaurant.name,
                    pick.weight,
                    pick.draw.total_weight,
                );
                self.write_rounds(&mut reasoning, &rounds);
                DecisionResult {
                    restaurant_id: pick.restaurant.id.clone(),
                    selected_at: now,
                    reasoning,
                    weights: Some(pick.weights),
                    draw: Some(pick.draw),
                    rounds,
                }
            }
            Err(err) => return Err(err.into()),
        };
        Ok(self.complete(result))
    }

    /// Expire a tiered decision whose deadline passed without a single ballot. Returns whether the
    /// decision expired.
    pub fn expire_if_overdue(&mut self, now: DateTime<Utc>) -> bool {
        let overdue = self.is_active()
            && (self.method == DecisionMethod::Tiered)
            && self.ballots.is_empty()
            && (now >= self.deadline);
        if overdue {
            tracing::info!(decision = %self.id, "decision expired without ballots");
            self.status = DecisionStatus::Expired;
        }
        overdue
    }

    fn expect_active(&self, method: DecisionMethod) -> Result<(), DecisionError> {
        if !self.is_active() {
            return Err(DecisionError::NotActive);
        }
        if self.method != method {
            return Err(DecisionError::WrongMethod {
                expected: method,
                actual: self.method,
            });
        }
        Ok(())
    }

    fn complete(&mut self, result: DecisionResult) -> DecisionResult {
        tracing::info!(
            decision = %self.id,
            collection = %self.collection_id,
            method = ?self.method,
            restaurant = %result.restaurant_id,
            "decision completed",
        );
        self.status = DecisionStatus::Completed {
            result: result.clone(),
        };
        result
    }

    /// Display name of a candidate, falling back to its ID.
    pub fn restaurant_name<'a>(&'a self, id: &'a RestaurantId) -> &'a str {
        self.candidates
            .iter()
            .find(|r| &r.id == id)
            .map(|r| r.name.as_str())
            .unwrap_or(id.as_str())
    }

    fn describe_tally(&self, tally: &Tally<RestaurantId>) -> String {
        let name = self.restaurant_name(&tally.winner);
        let mut reasoning = match (tally.victory, tally.rounds.last()) {
            (Victory::Majority, Some(last)) => format!(
                "{name} won round {} with a majority of {} of {} votes.",
                last.number,
                tally.winning_votes(),
                last.votes_cast(),
            ),
            (_, last) => format!(
                "{name} was the last restaurant remaining in round {}.",
                last.map_or(0, |r| r.number),
            ),
        };
        self.write_rounds(&mut reasoning, &tally.rounds);
        reasoning
    }

    fn write_rounds(&self, out: &mut String, rounds: &[Round<RestaurantId>]) {
        for round in rounds {
            let counts: Vec<String> = round
                .counts
                .iter()
                .map(|c| format!("{} {}", self.restaurant_name(&c.candidate), c.votes))
                .collect();
            let _ = write!(out, " Round {}: {}", round.number, counts.join(", "));
            if round.exhausted > 0 {
                let _ = write!(out, ", {} exhausted", round.exhausted);
            }
            if !round.eliminated.is_empty() {
                let eliminated: Vec<&str> =
                    round.eliminated.iter().map(|id| self.restaurant_name(id)).collect();
                let _ = write!(out, "; eliminated {}", eliminated.join(", "));
            }
            out.push('.');
        }
    }
}

/// Completed selections over `collection`, oldest decisions first as given.
pub fn history<'d, Decisions>(
    collection: &CollectionId,
    decisions: Decisions,
) -> Vec<Selection<RestaurantId>>
where
    Decisions: IntoIterator<Item = &'d Decision>,
{
    decisions
        .into_iter()
        .filter(|d| &d.collection_id == collection)
        .filter_map(Decision::selection)
        .collect()
}

struct Pick<'r> {
    restaurant: &'r Restaurant,
    weight: Normalized,
    weights: WeightSnapshot,
    draw: Draw,
}

fn weighted_pick<'r, R: rand::Rng>(
    rng: &mut R,
    candidates: &[&'r Restaurant],
    history: &[Selection<RestaurantId>],
    config: &SelectionConfig,
    now: DateTime<Utc>,
) -> Result<Pick<'r>, DecisionError> {
    let curve = config.recovery_curve()?;
    let weights = weights::calculate(&curve, candidates.iter().map(|r| r.id.clone()), history, now);
    let selected = decision_engine::select(
        rng,
        candidates.iter().map(|&r| {
            let weight = weights.get(&r.id).map(|w| w.weight).unwrap_or(Normalized::ONE);
            (r, weight)
        }),
    )?;
    Ok(Pick {
        restaurant: selected.candidate,
        weight: selected.weight,
        weights,
        draw: selected.draw,
    })
}

fn describe_draw(pick: &Pick, candidates: usize) -> String {
    if pick.draw.uniform {
        return format!(
            "{} was picked uniformly at random from {candidates} restaurants.",
            pick.restaurant.name
        );
    }
    format!(
        "{} was picked by weighted random draw from {candidates} restaurants (weight {:.2} of \
         {:.2} total).",
        pick.restaurant.name, pick.weight, pick.draw.total_weight,
    )
}
