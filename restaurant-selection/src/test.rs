use crate::*;
use chrono::{DateTime, Duration, TimeZone as _, Utc};
use decision_engine::num::assert_within;
use proptest::{prop_assert, prop_assert_eq, proptest};
use rand::{rngs::SmallRng, SeedableRng as _};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 6, 17, 30, 0).unwrap()
}

fn collection(names: &[&str]) -> Collection {
    let mut collection = Collection::new("c1", "Friday lunch", Owner::Group(GroupId::new("g1")));
    for name in names {
        let mut restaurant = Restaurant::new(*name, *name);
        restaurant.cuisine = "test".to_string();
        collection.add(restaurant).unwrap();
    }
    collection
}

fn users(names: &[&str]) -> Vec<UserId> {
    names.iter().map(|n| UserId::new(*n)).collect()
}

fn ranking(ids: &[&str]) -> Vec<RestaurantId> {
    ids.iter().map(|id| RestaurantId::new(*id)).collect()
}

fn new_decision(method: DecisionMethod, participants: &[&str]) -> NewDecision {
    NewDecision {
        id: DecisionId::new("d1"),
        group_id: Some(GroupId::new("g1")),
        method,
        deadline: now() + Duration::hours(2),
        visit_date: Some(now().date_naive()),
        participants: users(participants),
    }
}

fn selected(id: &str, days_ago: i64) -> Selection<RestaurantId> {
    Selection {
        candidate: RestaurantId::new(id),
        selected_at: now() - Duration::days(days_ago),
    }
}

#[test]
fn random_decision_completes() {
    let collection = collection(&["A", "B", "C"]);
    let mut decision =
        Decision::new(new_decision(DecisionMethod::Random, &[]), &collection, now()).unwrap();
    assert!(decision.is_active());
    assert!(decision.result().is_none());

    let mut rng = SmallRng::seed_from_u64(5);
    let history = [selected("A", 0), selected("B", 15)];
    let config = SelectionConfig::default();
    let result = decision
        .complete_random(&mut rng, &history, &config, now())
        .unwrap();

    assert!(collection.contains(&result.restaurant_id));
    assert_eq!(result.selected_at, now());
    let weights = result.weights.as_ref().unwrap();
    assert_eq!(weights.len(), 3);
    assert_within(weights[&RestaurantId::new("A")].weight.as_f64(), 0.1, 1e-9);
    assert_within(weights[&RestaurantId::new("B")].weight.as_f64(), 0.55, 1e-9);
    assert_eq!(weights[&RestaurantId::new("C")], CandidateWeight::FULL);
    assert_within(result.draw.unwrap().total_weight, 1.65, 1e-9);
    assert!(result.reasoning.contains("weighted random draw"));
    assert!(result.reasoning.contains(decision.restaurant_name(&result.restaurant_id)));

    assert!(matches!(decision.status(), DecisionStatus::Completed { .. }));
    assert_eq!(decision.selection().unwrap().candidate, result.restaurant_id);
    let err = decision
        .complete_random(&mut rng, &history, &config, now())
        .unwrap_err();
    assert!(matches!(err, DecisionError::NotActive));
}

#[test]
fn empty_collection_is_rejected() {
    let collection = collection(&[]);
    let err =
        Decision::new(new_decision(DecisionMethod::Random, &[]), &collection, now()).unwrap_err();
    assert!(matches!(
        err,
        DecisionError::Engine(decision_engine::Error::EmptyCollection)
    ));
}

#[test]
fn tiered_decision_needs_participants() {
    let collection = collection(&["A"]);
    let err =
        Decision::new(new_decision(DecisionMethod::Tiered, &[]), &collection, now()).unwrap_err();
    assert!(matches!(err, DecisionError::NoParticipants));
}

#[test]
fn tiered_runoff_completes_once_everyone_voted() {
    let collection = collection(&["A", "B", "C"]);
    let voters: Vec<String> = (0..9).map(|i| format!("u{i}")).collect();
    let voter_refs: Vec<&str> = voters.iter().map(String::as_str).collect();
    let mut decision = Decision::new(
        new_decision(DecisionMethod::Tiered, &voter_refs),
        &collection,
        now(),
    )
    .unwrap();

    let rankings = [
        (4, ["A", "B", "C"]),
        (3, ["B", "A", "C"]),
        (2, ["C", "B", "A"]),
    ];
    let mut voters = voters.iter();
    let mut rng = SmallRng::seed_from_u64(0);
    for (count, order) in rankings {
        for _ in 0..count {
            let voter = voters.next().unwrap();
            let err = decision
                .complete_tiered(&mut rng, &[], &SelectionConfig::default(), now())
                .unwrap_err();
            assert!(matches!(err, DecisionError::NotReady { .. }));
            decision
                .submit_ballot(UserId::new(voter.as_str()), ranking(&order), now())
                .unwrap();
        }
    }
    let status = decision.ballot_status(now());
    assert_eq!((status.submitted, status.expected), (9, 9));
    assert!(status.is_ready());

    let result = decision
        .complete_tiered(&mut rng, &[], &SelectionConfig::default(), now())
        .unwrap();
    assert_eq!(result.restaurant_id, RestaurantId::new("B"));
    assert_eq!(result.rounds.len(), 2);
    assert_eq!(result.rounds[0].eliminated, ranking(&["C"]));
    assert!(result.weights.is_none());
    assert!(
        result.reasoning.starts_with("B won round 2 with a majority of 5 of 9 votes."),
        "{}",
        result.reasoning
    );
    assert!(result.reasoning.contains("Round 1: A 4, B 3, C 2; eliminated C."));
}

#[test]
fn ballots_are_validated() {
    let collection = collection(&["A", "B"]);
    let mut decision = Decision::new(
        new_decision(DecisionMethod::Tiered, &["ana", "ben"]),
        &collection,
        now(),
    )
    .unwrap();

    let err = decision
        .submit_ballot(UserId::new("ana"), ranking(&["A", "A"]), now())
        .unwrap_err();
    assert!(err.is_invalid_input());
    let err = decision
        .submit_ballot(UserId::new("ana"), ranking(&["Z"]), now())
        .unwrap_err();
    assert!(err.is_invalid_input());
    let err = decision
        .submit_ballot(UserId::new("ana"), Vec::new(), now())
        .unwrap_err();
    assert!(err.is_invalid_input());
    let err = decision
        .submit_ballot(UserId::new("eve"), ranking(&["A"]), now())
        .unwrap_err();
    assert!(matches!(err, DecisionError::NotParticipant(_)));

    let status = decision
        .submit_ballot(UserId::new("ana"), ranking(&["B"]), now())
        .unwrap();
    assert!(!status.is_ready());
    let err = decision
        .submit_ballot(UserId::new("ana"), ranking(&["A"]), now())
        .unwrap_err();
    assert!(matches!(err, DecisionError::AlreadyVoted(_)));

    let late = decision.deadline + Duration::minutes(1);
    let err = decision
        .submit_ballot(UserId::new("ben"), ranking(&["A"]), late)
        .unwrap_err();
    assert!(matches!(err, DecisionError::VotingClosed));
}

#[test]
fn method_mismatch() {
    let collection = collection(&["A", "B"]);
    let mut decision =
        Decision::new(new_decision(DecisionMethod::Random, &["ana"]), &collection, now()).unwrap();
    let err = decision
        .submit_ballot(UserId::new("ana"), ranking(&["A"]), now())
        .unwrap_err();
    assert!(matches!(
        err,
        DecisionError::WrongMethod {
            expected: DecisionMethod::Tiered,
            actual: DecisionMethod::Random,
        }
    ));
}

#[test]
fn deadline_closes_partial_voting() {
    let collection = collection(&["A", "B"]);
    let mut decision = Decision::new(
        new_decision(DecisionMethod::Tiered, &["ana", "ben", "cat"]),
        &collection,
        now(),
    )
    .unwrap();
    decision
        .submit_ballot(UserId::new("ana"), ranking(&["B", "A"]), now())
        .unwrap();

    let mut rng = SmallRng::seed_from_u64(0);
    let late = decision.deadline;
    let result = decision
        .complete_tiered(&mut rng, &[], &SelectionConfig::default(), late)
        .unwrap();
    assert_eq!(result.restaurant_id, RestaurantId::new("B"));
    assert_eq!(result.selected_at, late);
}

#[test]
fn deadline_without_ballots_expires() {
    let collection = collection(&["A", "B"]);
    let mut decision = Decision::new(
        new_decision(DecisionMethod::Tiered, &["ana"]),
        &collection,
        now(),
    )
    .unwrap();
    assert!(!decision.expire_if_overdue(now()));

    let mut rng = SmallRng::seed_from_u64(0);
    let late = decision.deadline + Duration::hours(1);
    let err = decision
        .complete_tiered(&mut rng, &[], &SelectionConfig::default(), late)
        .unwrap_err();
    assert!(matches!(err, DecisionError::Expired));
    assert_eq!(decision.status(), &DecisionStatus::Expired);
    assert!(decision.result().is_none());
    assert!(!decision.expire_if_overdue(late));
}

#[test]
fn tied_tally_falls_back_to_weighted_random() {
    let collection = collection(&["A", "B", "C"]);
    let mut decision = Decision::new(
        new_decision(DecisionMethod::Tiered, &["ana", "ben"]),
        &collection,
        now(),
    )
    .unwrap();
    decision
        .submit_ballot(UserId::new("ana"), ranking(&["A"]), now())
        .unwrap();
    decision
        .submit_ballot(UserId::new("ben"), ranking(&["B"]), now())
        .unwrap();

    let mut rng = SmallRng::seed_from_u64(9);
    let history = [selected("A", 3)];
    let result = decision
        .complete_tiered(&mut rng, &history, &SelectionConfig::default(), now())
        .unwrap();
    let winner = result.restaurant_id.as_str();
    assert!(winner == "A" || winner == "B");
    // C had no votes and was eliminated before the tie.
    assert_eq!(result.rounds[0].eliminated, ranking(&["C"]));
    let weights = result.weights.as_ref().unwrap();
    assert_eq!(weights.len(), 2);
    assert!(weights[&RestaurantId::new("A")].weight < Normalized::ONE);
    assert!(result.reasoning.starts_with("A, B tied in round 2;"));
}

#[test]
fn history_only_includes_completed_decisions_of_the_collection() {
    let collection = collection(&["A", "B"]);
    let config = SelectionConfig::default();
    let mut rng = SmallRng::seed_from_u64(3);
    let mut decisions = Vec::new();
    for day in 0..3 {
        let at = now() + Duration::days(day);
        let mut decision =
            Decision::new(new_decision(DecisionMethod::Random, &[]), &collection, at).unwrap();
        let past = history(&collection.id, &decisions);
        decision.complete_random(&mut rng, &past, &config, at).unwrap();
        decisions.push(decision);
    }
    decisions.push(
        Decision::new(new_decision(DecisionMethod::Random, &[]), &collection, now()).unwrap(),
    );
    let other = Collection::new("c2", "Other", Owner::User(UserId::new("ana")));
    assert!(history(&other.id, &decisions).is_empty());

    let past = history(&collection.id, &decisions);
    assert_eq!(past.len(), 3);
    assert_eq!(past[2].selected_at, now() + Duration::days(2));
}

#[test]
fn decision_serializes_as_json() {
    let collection = collection(&["A", "B"]);
    let mut decision =
        Decision::new(new_decision(DecisionMethod::Random, &[]), &collection, now()).unwrap();
    let json = serde_json::to_value(&decision).unwrap();
    assert_eq!(json["method"], "random");
    assert_eq!(json["status"], "active");
    assert!(json.get("result").is_none());

    let mut rng = SmallRng::seed_from_u64(1);
    decision
        .complete_random(&mut rng, &[], &SelectionConfig::default(), now())
        .unwrap();
    let json = serde_json::to_string(&decision).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["status"], "completed");
    assert!(value["result"]["reasoning"].is_string());

    let restored: Decision = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, decision);
}

#[test]
fn tiered_decision_restores_from_json() {
    let collection = collection(&["A", "B", "C"]);
    let mut decision = Decision::new(
        new_decision(DecisionMethod::Tiered, &["ana", "ben", "cy"]),
        &collection,
        now(),
    )
    .unwrap();
    for (user, first) in [("ana", "A"), ("ben", "B"), ("cy", "C")] {
        decision
            .submit_ballot(UserId::new(user), ranking(&[first]), now())
            .unwrap();
    }
    let mut rng = SmallRng::seed_from_u64(4);
    let result = decision
        .complete_tiered(&mut rng, &[], &SelectionConfig::default(), now())
        .unwrap();
    assert_eq!(result.rounds.len(), 1);
    assert!(result.rounds[0].eliminated.is_empty());
    assert!(
        result.reasoning.starts_with("A, B, C tied in round 1;"),
        "{}",
        result.reasoning
    );

    let json = serde_json::to_string(&decision).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["method"], "tiered");
    assert_eq!(value["result"]["rounds"][0]["counts"][1]["votes"], 1);
    let restored: Decision = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, decision);
    assert_eq!(restored.result(), Some(&result));
}

proptest! {
    #[test]
    fn random_selection_is_a_member(seed: u64, days_ago in proptest::collection::vec(0_i64..60, 0..8)) {
        let names = ["A", "B", "C", "D"];
        let collection = collection(&names);
        let history: Vec<Selection<RestaurantId>> = days_ago
            .iter()
            .enumerate()
            .map(|(i, days)| selected(names[i % names.len()], *days))
            .collect();
        let mut decision =
            Decision::new(new_decision(DecisionMethod::Random, &[]), &collection, now()).unwrap();
        let mut rng = SmallRng::seed_from_u64(seed);
        let result = decision
            .complete_random(&mut rng, &history, &SelectionConfig::default(), now())
            .unwrap();
        prop_assert!(collection.contains(&result.restaurant_id));
        let weights = result.weights.as_ref().unwrap();
        prop_assert_eq!(weights.len(), names.len());
        for weight in weights.values() {
            prop_assert!(weight.weight.as_f64() >= 0.1);
            prop_assert!(weight.weight <= Normalized::ONE);
        }
    }
}
