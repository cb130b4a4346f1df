//! Choreography Preview
//!
//! Plays an authored step list through the headless scene and prints every
//! scene call it produced, with the total playback time.

use std::path::PathBuf;
use std::sync::Arc;

use battle_stage::core::{Result, UnitId};
use battle_stage::steps::{HeadlessScene, SkillStep, StepContext, StepExecutor};
use clap::Parser;
use tokio::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "choreo_preview")]
#[command(about = "Preview a skill step list against a headless scene")]
struct Args {
    /// JSON array of steps
    steps: PathBuf,

    /// Start every step at once instead of one after another
    #[arg(long)]
    parallel: bool,

    /// Unit bound to "actor"
    #[arg(long, default_value = "actor")]
    actor: String,

    /// Units bound to "target" (repeatable)
    #[arg(long)]
    target: Vec<String>,

    /// Output format: json or text
    #[arg(long, default_value = "text")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let contents = std::fs::read_to_string(&args.steps)?;
    let steps: Vec<SkillStep> = serde_json::from_str(&contents)?;

    let scene = Arc::new(HeadlessScene::new());
    let executor = StepExecutor::new(scene.clone());
    let ctx = StepContext::new(
        UnitId::new(args.actor),
        args.target.into_iter().map(UnitId::new).collect(),
    );

    let start = Instant::now();
    if args.parallel {
        executor.execute_steps_parallel_in(&steps, &ctx).await?;
    } else {
        executor.execute_steps_in(&steps, &ctx).await?;
    }
    let elapsed = start.elapsed();
    tracing::info!("Played {} steps in {} ms", steps.len(), elapsed.as_millis());

    let calls = scene.take_calls();
    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&calls)?);
    } else {
        for (i, call) in calls.iter().enumerate() {
            println!("{:>3}. {:?}", i + 1, call);
        }
        println!("Total: {} ms", elapsed.as_millis());
    }
    Ok(())
}
