//! Headless Battle Runner
//!
//! Plays a battle from a config file against the headless scene and prints
//! the outcome. Players auto-attack random enemies, or stay idle so every
//! round goes through the command timeout.

use std::path::PathBuf;
use std::sync::Arc;

use battle_stage::battle::{
    BattleAction, BattleConfig, BattleFlow, BattlePhase, Catalogs, EnemyStrategy,
    RandomTargetStrategy, Side,
};
use battle_stage::core::{BattleSettings, Result};
use battle_stage::steps::HeadlessScene;
use clap::Parser;
use serde::Serialize;

/// Headless Battle Runner - play a configured battle to the end
#[derive(Parser, Debug)]
#[command(name = "battle_runner")]
#[command(about = "Run a turn-based battle headlessly and report the result")]
struct Args {
    /// Battle config (.json or .toml)
    config: PathBuf,

    /// Battle settings TOML; defaults apply when omitted
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Skill / item / summon catalogs (JSON)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Override the pause between actions (milliseconds)
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Never submit player commands; every round times out
    #[arg(long)]
    idle_players: bool,

    /// Stop after this many turns
    #[arg(long, default_value_t = 100)]
    max_turns: u32,

    /// Output format: json or text
    #[arg(long, default_value = "json")]
    format: String,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Serialize)]
struct UnitSummary {
    id: String,
    name: String,
    side: Side,
    hp: u32,
    max_hp: u32,
}

/// JSON output structure
#[derive(Serialize)]
struct RunSummary {
    result: String,
    turns: u32,
    seed: Option<u64>,
    events: usize,
    units: Vec<UnitSummary>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let mut settings = match &args.settings {
        Some(path) => BattleSettings::load(path)?,
        None => BattleSettings::default(),
    };
    if args.seed.is_some() {
        settings.rng_seed = args.seed;
    }
    if let Some(delay) = args.delay_ms {
        settings.action_delay_ms = delay;
    }
    let catalogs = match &args.catalog {
        Some(path) => Catalogs::load(path)?,
        None => Catalogs::new(),
    };
    let config = BattleConfig::load(&args.config)?;

    let binding = Arc::new(HeadlessScene::new());
    let mut flow = BattleFlow::new(settings.clone(), catalogs, binding.clone())?;
    flow.start_battle(&config)?;
    binding.sync_with(flow.scene());

    let mut players = RandomTargetStrategy::new(settings.rng_seed.map(|seed| seed.wrapping_add(1)));

    while flow.phase() == BattlePhase::Command && flow.state().turn <= args.max_turns {
        if args.idle_players {
            flow.on_timer_tick().await?;
            continue;
        }

        let Some(actor_id) = flow.current_actor().cloned() else {
            flow.on_timer_tick().await?;
            continue;
        };
        let action = flow
            .scene()
            .unit(&actor_id)
            .and_then(|unit| players.choose_action(unit, flow.scene()))
            .unwrap_or_else(|| BattleAction::defend(actor_id.clone()));
        flow.submit_action(action).await?;
        binding.sync_with(flow.scene());
    }

    let result = match flow.state().result {
        Some(result) => format!("{:?}", result).to_lowercase(),
        None => "unfinished".to_string(),
    };
    let units = flow
        .scene()
        .units()
        .map(|unit| UnitSummary {
            id: unit.id.to_string(),
            name: unit.name.clone(),
            side: Side::of(unit),
            hp: unit.stats.hp,
            max_hp: unit.stats.max_hp,
        })
        .collect();
    let summary = RunSummary {
        result,
        turns: flow.state().turn,
        seed: settings.rng_seed,
        events: flow.events().history().len(),
        units,
    };

    match args.format.as_str() {
        "text" => {
            println!("Battle Result");
            println!("=============");
            println!("Result: {}", summary.result);
            println!("Turns: {}", summary.turns);
            println!("Events: {}", summary.events);
            println!();
            for unit in &summary.units {
                println!(
                    "  {:?} {} ({}): {}/{} hp",
                    unit.side, unit.name, unit.id, unit.hp, unit.max_hp
                );
            }
            if let Some(seed) = summary.seed {
                println!("Seed: {}", seed);
            }
        }
        other => {
            if other != "json" {
                tracing::warn!("Unknown format '{}', defaulting to json", other);
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
