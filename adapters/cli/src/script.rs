//! Timed session inputs read from TOML script files.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono_tiles_core::SessionCommand;
use serde::Deserialize;

const DEFAULT_TICK_SECS: f32 = 0.05;

#[derive(Debug, Deserialize)]
struct ScriptFile {
    #[serde(default = "default_tick_secs")]
    tick_secs: f32,
    #[serde(default)]
    inputs: Vec<ScriptedInput>,
}

#[derive(Debug, Deserialize)]
struct ScriptedInput {
    at_secs: f32,
    command: SessionCommand,
}

fn default_tick_secs() -> f32 {
    DEFAULT_TICK_SECS
}

/// Session inputs scheduled on tick indices.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Script {
    tick: Duration,
    schedule: Vec<(u64, SessionCommand)>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs_f32(DEFAULT_TICK_SECS),
            schedule: Vec::new(),
        }
    }
}

impl Script {
    /// Parses a script, snapping every input onto the nearest tick.
    pub(crate) fn from_toml_str(contents: &str) -> Result<Self> {
        let file: ScriptFile = toml::from_str(contents).context("failed to parse script")?;
        let tick = match Duration::try_from_secs_f32(file.tick_secs) {
            Ok(tick) if !tick.is_zero() => tick,
            _ => bail!("tick_secs must be positive and finite, got {}", file.tick_secs),
        };

        let mut schedule = Vec::with_capacity(file.inputs.len());
        for input in file.inputs {
            if !input.at_secs.is_finite() || input.at_secs < 0.0 {
                bail!("input time must be non-negative, got {}", input.at_secs);
            }
            let due = (input.at_secs / file.tick_secs).round() as u64;
            schedule.push((due, input.command));
        }
        schedule.sort_by_key(|(tick, _)| *tick);

        Ok(Self { tick, schedule })
    }

    /// Simulated time covered by one tick.
    pub(crate) fn tick(&self) -> Duration {
        self.tick
    }

    /// Inputs due on the provided tick, in script order.
    pub(crate) fn inputs_at(&self, tick: u64) -> impl Iterator<Item = SessionCommand> + '_ {
        self.schedule
            .iter()
            .filter(move |(due, _)| *due == tick)
            .map(|(_, command)| *command)
    }

    /// Tick count that covers every input plus one more window of `tail`.
    pub(crate) fn default_ticks(&self, tail: Duration) -> u64 {
        let last = self.schedule.last().map_or(0, |(tick, _)| *tick);
        let tail_ticks = (tail.as_secs_f64() / self.tick.as_secs_f64()).ceil() as u64;
        last.saturating_add(tail_ticks).saturating_add(1)
    }
}
