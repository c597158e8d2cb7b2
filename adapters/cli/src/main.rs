#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs a Chrono Tiles level headlessly.

mod script;
mod simulation;

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use chrono_tiles_world::Level;
use tracing::info;
use tracing_subscriber::EnvFilter;

use self::{script::Script, simulation::Simulation};

/// Runs a level against a timeline of scripted session inputs.
#[derive(Debug, Parser)]
#[command(name = "chrono-tiles")]
#[command(about = "Headless driver for Chrono Tiles levels")]
struct CliArgs {
    /// Level description in TOML.
    #[arg(long)]
    level: PathBuf,
    /// Timed session inputs in TOML.
    #[arg(long)]
    script: Option<PathBuf>,
    /// Number of ticks to simulate. Defaults to the last scripted input plus
    /// one recording window.
    #[arg(long)]
    ticks: Option<u64>,
}

/// Entry point for the Chrono Tiles command-line interface.
fn main() -> Result<()> {
    init_tracing();
    let args = CliArgs::parse();

    let level_source = fs::read_to_string(&args.level)
        .with_context(|| format!("failed to read level {}", args.level.display()))?;
    let level = Level::from_toml_str(&level_source)
        .with_context(|| format!("invalid level {}", args.level.display()))?;

    let script = match &args.script {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            Script::from_toml_str(&source)
                .with_context(|| format!("invalid script {}", path.display()))?
        }
        None => Script::default(),
    };

    let ticks = args
        .ticks
        .unwrap_or_else(|| script.default_ticks(level.time_limit()));
    info!(
        rows = level.dimensions().rows(),
        columns = level.dimensions().columns(),
        floors = level.floor_count(),
        ticks,
        "level loaded"
    );

    let mut simulation = Simulation::new(&level)?;
    let simulated = simulation.run(&script, ticks)?;

    let status = simulation.status();
    println!(
        "{:?} after {simulated} ticks, {:.2}s left in the window",
        status.game_state,
        status.remaining.as_secs_f32()
    );
    for agent in simulation.agents().iter() {
        println!(
            "{:<8} at {} {:?} record {:?}",
            agent.color, agent.position, agent.state, agent.record_state
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
