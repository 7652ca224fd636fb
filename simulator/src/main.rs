mod config;

use std::{
    collections::BTreeMap,
    io::{stdin, BufRead},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use decision_engine::weights;
use rand::{rngs::SmallRng, SeedableRng as _};
use restaurant_selection::{
    history, Collection, Decision, DecisionId, DecisionMethod, NewDecision, Owner, Restaurant,
    RestaurantId, UserId,
};

use crate::config::{init_tracing, Overrides, SimulatorConfig};

const HEADER: &str = "id,name,address,cuisine,price_range,rating";

/// Run restaurant decisions over a collection read from stdin as CSV
/// (`id,name,address,cuisine,price_range,rating`).
#[derive(Debug, Parser)]
struct Cli {
    /// Configuration file. Defaults to `decide.toml` in the working directory.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for reproducible draws.
    #[arg(long)]
    seed: Option<u64>,
    #[command(flatten)]
    overrides: Overrides,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Make one weighted random decision per day and report how often each restaurant was picked.
    Simulate {
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
    /// Run a tiered decision from a JSON object mapping participants to their rankings.
    Tally {
        #[arg(long)]
        ballots: PathBuf,
        /// Print the completed decision as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SimulatorConfig::load(cli.config.as_deref(), &cli.overrides)?;
    init_tracing(&config.logging)?;
    tracing::debug!(?cli, ?config, "starting simulator");

    let collection = read_collection(stdin().lock())?;
    tracing::info!(restaurants = collection.len(), "collection loaded");

    let mut rng = match cli.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    match cli.command {
        Command::Simulate { days } => simulate(&collection, &config, &mut rng, days),
        Command::Tally { ballots, json } => tally(&collection, &config, &mut rng, &ballots, json),
    }
}

fn read_collection<R: BufRead>(input: R) -> Result<Collection> {
    let mut collection = Collection::new("stdin", "stdin", Owner::User(UserId::new("simulator")));
    for (index, line) in input.lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() || line.starts_with(HEADER) {
            continue;
        }
        let restaurant =
            parse_restaurant(&line).with_context(|| format!("invalid line {}", index + 1))?;
        collection.add(restaurant)?;
    }
    if collection.is_empty() {
        bail!("no restaurants given on stdin");
    }
    Ok(collection)
}

fn parse_restaurant(line: &str) -> Result<Restaurant> {
    let fields = line.split(',').map(str::trim).collect::<Vec<&str>>();
    if fields.len() < 2 {
        bail!("expected at least id and name");
    }
    let field = |i: usize| fields.get(i).copied().filter(|f| !f.is_empty());
    let mut restaurant = Restaurant::new(fields[0], fields[1]);
    restaurant.address = field(2).unwrap_or_default().to_string();
    restaurant.cuisine = field(3).unwrap_or_default().to_string();
    restaurant.price_range = field(4)
        .map(|f| f.parse::<u8>().context("price_range"))
        .transpose()?;
    restaurant.rating = field(5)
        .map(|f| f.parse::<f32>().context("rating"))
        .transpose()?;
    Ok(restaurant)
}

fn simulate(
    collection: &Collection,
    config: &SimulatorConfig,
    rng: &mut SmallRng,
    days: u32,
) -> Result<()> {
    let start = Utc::now();
    let mut decisions: Vec<Decision> = Vec::with_capacity(days as usize);
    for day in 0..days {
        let at = start + Duration::days(day as i64);
        let mut decision = Decision::new(
            NewDecision {
                id: DecisionId::new(format!("day-{day}")),
                group_id: None,
                method: DecisionMethod::Random,
                deadline: at,
                visit_date: Some(at.date_naive()),
                participants: Vec::new(),
            },
            collection,
            at,
        )?;
        let past = history(&collection.id, &decisions);
        decision.complete_random(rng, &past, &config.selection, at)?;
        decisions.push(decision);
    }

    let mut picks: BTreeMap<&RestaurantId, usize> = BTreeMap::new();
    for decision in &decisions {
        if let Some(result) = decision.result() {
            *picks.entry(&result.restaurant_id).or_default() += 1;
        }
    }
    let end = start + Duration::days(days as i64);
    let curve = config.selection.recovery_curve()?;
    let current = weights::calculate(
        &curve,
        collection.restaurants().iter().map(|r| r.id.clone()),
        &history(&collection.id, &decisions),
        end,
    );

    println!("restaurant,picks,share,weight,days_until_full_weight");
    for restaurant in collection.restaurants() {
        let count = picks.get(&restaurant.id).copied().unwrap_or(0);
        let weight = current
            .get(&restaurant.id)
            .copied()
            .unwrap_or(weights::CandidateWeight::FULL);
        println!(
            "{},{},{:.4},{:.4},{:.1}",
            restaurant.name,
            count,
            count as f64 / days.max(1) as f64,
            weight.weight,
            weight.days_until_full_weight,
        );
    }
    Ok(())
}

fn tally(
    collection: &Collection,
    config: &SimulatorConfig,
    rng: &mut SmallRng,
    ballots: &Path,
    json: bool,
) -> Result<()> {
    let contents = std::fs::read_to_string(ballots)
        .with_context(|| format!("failed to read {}", ballots.display()))?;
    let ballots: BTreeMap<UserId, Vec<RestaurantId>> =
        serde_json::from_str(&contents).context("ballots must map participants to rankings")?;

    let now = Utc::now();
    let mut decision = Decision::new(
        NewDecision {
            id: DecisionId::new("tally"),
            group_id: None,
            method: DecisionMethod::Tiered,
            deadline: now + Duration::hours(1),
            visit_date: None,
            participants: ballots.keys().cloned().collect(),
        },
        collection,
        now,
    )?;
    for (participant, ranking) in ballots {
        decision
            .submit_ballot(participant.clone(), ranking, now)
            .with_context(|| format!("ballot from {participant}"))?;
    }
    decision.complete_tiered(rng, &[], &config.selection, now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }
    if let Some(result) = decision.result() {
        for round in &result.rounds {
            let counts: Vec<String> = round
                .counts
                .iter()
                .map(|c| format!("{}={}", decision.restaurant_name(&c.candidate), c.votes))
                .collect();
            println!("round {}: {}", round.number, counts.join(" "));
        }
        println!("winner: {}", decision.restaurant_name(&result.restaurant_id));
        println!("{}", result.reasoning);
    }
    Ok(())
}
