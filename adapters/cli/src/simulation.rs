//! Owns the world and the systems and runs them in tick order.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tiles_core::{AgentView, Command, Event, GameState, SessionCommand, SessionStatus};
use chrono_tiles_system_pathfinding::Pathfinder;
use chrono_tiles_system_session::{Config, GoalTiles, Session};
use chrono_tiles_world::{self as world, query, Level, World};
use tracing::{debug, info, warn};

use crate::script::Script;

/// Headless simulation of one level.
#[derive(Debug)]
pub(crate) struct Simulation {
    world: World,
    session: Session,
    pathfinder: Pathfinder,
    events: Vec<Event>,
    ticks: u64,
}

impl Simulation {
    /// Builds the world and a goal-driven session for the level.
    pub(crate) fn new(level: &Level) -> Result<Self> {
        let config = Config::from_level(level)
            .with_completion_rule(Box::new(GoalTiles::from_level(level)));
        let session = Session::new(config).context("failed to configure session")?;
        Ok(Self {
            world: World::from_level(level),
            session,
            pathfinder: Pathfinder::new(),
            events: Vec::new(),
            ticks: 0,
        })
    }

    /// Runs up to `ticks` ticks, feeding scripted inputs as they come due.
    ///
    /// Stops early once the puzzle is completed. Returns the number of ticks
    /// simulated.
    pub(crate) fn run(&mut self, script: &Script, ticks: u64) -> Result<u64> {
        for tick in 0..ticks {
            for input in script.inputs_at(tick) {
                self.submit(input)?;
            }
            self.step(script.tick())?;
            if self.session.game_state() == GameState::Completed {
                info!(tick, "puzzle solved");
                break;
            }
        }
        Ok(self.ticks)
    }

    /// Current session values.
    pub(crate) fn status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Snapshot of every agent.
    pub(crate) fn agents(&self) -> AgentView {
        query::agent_view(&self.world)
    }

    fn submit(&mut self, input: SessionCommand) -> Result<()> {
        let mut commands = Vec::new();
        if let Err(rejection) =
            self.session
                .handle_input(input, &self.world, &mut self.pathfinder, &mut commands)
        {
            warn!(?input, %rejection, "scripted input rejected");
        }
        self.apply(commands)
    }

    fn step(&mut self, dt: Duration) -> Result<()> {
        self.apply(vec![Command::Tick { dt }])?;
        let mut commands = Vec::new();
        self.session
            .tick(dt, &self.world, &mut commands)
            .context("session tick failed")?;
        self.apply(commands)?;
        self.ticks += 1;
        Ok(())
    }

    fn apply(&mut self, commands: Vec<Command>) -> Result<()> {
        for command in commands {
            world::apply(&mut self.world, command, &mut self.events)
                .context("world rejected a session command")?;
        }
        for event in self.events.drain(..) {
            match event {
                Event::TimeAdvanced { .. } => {}
                Event::AgentStepCompleted { agent, to, .. } => {
                    debug!(%agent, %to, "agent arrived");
                }
                other => debug!(event = ?other, "world event"),
            }
        }
        Ok(())
    }
}
