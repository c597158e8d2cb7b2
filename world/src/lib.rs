#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Chrono Tiles.
//!
//! The world owns the tile grid and every agent's state machine. It mutates
//! exclusively through [`apply`] and exposes read-only access through the
//! [`query`] module.

mod agent;
pub mod attributes;
mod grid;
mod level;

use chrono_tiles_core::{AgentColor, Command, Event, GridCoordinates, TileAttribute};
use thiserror::Error;
use tracing::debug;

use self::{
    agent::PuzzleAgent,
    attributes::{Barrier, CrumblingTile, SpawnerPlatform},
    grid::TileGrid,
};

pub use self::level::{FloorConfig, GoalConfig, Level, LevelConfig, LevelError, TileFeature};

/// Structural inconsistencies detected while applying commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    /// A command named an agent the level does not contain.
    #[error("agent {0} does not exist in this level")]
    UnknownAgent(AgentColor),
    /// A coordinate lies outside every floor of the grid.
    #[error("{0} lies outside the grid")]
    OutOfBounds(GridCoordinates),
    /// A live step skipped tiles or changed floors.
    #[error("agent {agent} cannot step from {from} to {to}")]
    NotAdjacent {
        /// Agent asked to move.
        agent: AgentColor,
        /// Tile the agent stands on.
        from: GridCoordinates,
        /// Requested tile.
        to: GridCoordinates,
    },
    /// A live step was requested while another step is still in flight.
    #[error("agent {0} is still moving")]
    AgentBusy(AgentColor),
}

/// Represents the authoritative Chrono Tiles world state.
#[derive(Debug)]
pub struct World {
    grid: TileGrid,
    agents: Vec<PuzzleAgent>,
    tick_index: u64,
}

impl World {
    /// Builds a world from a validated level. Every agent starts inactive on
    /// its spawner.
    #[must_use]
    pub fn from_level(level: &Level) -> Self {
        let mut grid = TileGrid::new(level.dimensions(), level.floors().to_vec());
        for (coords, feature) in level.features() {
            let attribute: Box<dyn TileAttribute> = match feature {
                TileFeature::Spawner(agent) => Box::new(SpawnerPlatform::new(*agent)),
                TileFeature::Barrier => Box::new(Barrier),
                TileFeature::Crumbling => Box::new(CrumblingTile::new()),
            };
            let _ = grid.insert_attribute(*coords, attribute);
        }

        let mut agents: Vec<PuzzleAgent> = grid
            .spawners()
            .map(|(coords, color)| PuzzleAgent::new(color, coords, level.step_duration()))
            .collect();
        agents.sort_by_key(PuzzleAgent::color);

        Self {
            grid,
            agents,
            tick_index: 0,
        }
    }

    /// Attaches a tile attribute at `coords`, returning the one it replaces.
    ///
    /// Spawner attributes placed this way do not create agents; agents come
    /// from the level only.
    pub fn insert_attribute(
        &mut self,
        coords: GridCoordinates,
        attribute: Box<dyn TileAttribute>,
    ) -> Result<Option<Box<dyn TileAttribute>>, WorldError> {
        if !self.grid.contains(coords) {
            return Err(WorldError::OutOfBounds(coords));
        }
        Ok(self.grid.insert_attribute(coords, attribute))
    }

    fn agent_and_grid(
        &mut self,
        color: AgentColor,
    ) -> Result<(&mut PuzzleAgent, &mut TileGrid), WorldError> {
        let agent = self
            .agents
            .iter_mut()
            .find(|agent| agent.color() == color)
            .ok_or(WorldError::UnknownAgent(color))?;
        Ok((agent, &mut self.grid))
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Agents are always processed in color order.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), WorldError> {
    match command {
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });
            let World { grid, agents, .. } = world;
            for agent in agents.iter_mut() {
                agent.advance(dt, grid, out_events);
            }
        }
        Command::MoveAgent { agent, to } => {
            let (agent, grid) = world.agent_and_grid(agent)?;
            agent.move_to(to, grid, out_events)?;
        }
        Command::SetAgentState { agent, state } => {
            let (agent, _) = world.agent_and_grid(agent)?;
            agent.set_state(state, out_events);
        }
        Command::AssignRecording { agent, recording } => {
            let (agent, _) = world.agent_and_grid(agent)?;
            debug!(agent = %agent.color(), actions = recording.len(), "recording assigned");
            agent.assign_recording(recording, out_events);
        }
        Command::ClearRecording { agent } => {
            let (agent, _) = world.agent_and_grid(agent)?;
            agent.clear_recording(out_events);
        }
        Command::ResetAgents => {
            for agent in world.agents.iter_mut() {
                agent.reset_to_spawn(out_events);
            }
            world.grid.reset_attributes();
            out_events.push(Event::AgentsReset);
        }
        Command::HaltAgents => {
            for agent in world.agents.iter_mut() {
                agent.halt(out_events);
            }
        }
    }
    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use chrono_tiles_core::{
        AgentColor, AgentSnapshot, AgentView, FloorLayoutView, GridCoordinates, GridDimensions,
        Recording, TileAttribute, TileType,
    };

    use super::World;

    /// Captures a read-only view of every agent in color order.
    #[must_use]
    pub fn agent_view(world: &World) -> AgentView {
        AgentView::from_snapshots(world.agents.iter().map(|agent| agent.snapshot()).collect())
    }

    /// Snapshot of a single agent.
    #[must_use]
    pub fn agent(world: &World, color: AgentColor) -> Option<AgentSnapshot> {
        world
            .agents
            .iter()
            .find(|agent| agent.color() == color)
            .map(|agent| agent.snapshot())
    }

    /// Colors of every agent in the level.
    #[must_use]
    pub fn agent_colors(world: &World) -> Vec<AgentColor> {
        world.agents.iter().map(|agent| agent.color()).collect()
    }

    /// Frozen recording currently held by an agent.
    #[must_use]
    pub fn recording(world: &World, color: AgentColor) -> Option<&Recording> {
        world
            .agents
            .iter()
            .find(|agent| agent.color() == color)
            .and_then(|agent| agent.recording())
    }

    /// Dimensions shared by every floor.
    #[must_use]
    pub fn dimensions(world: &World) -> GridDimensions {
        world.grid.dimensions()
    }

    /// Number of floors in the level.
    #[must_use]
    pub fn floor_count(world: &World) -> usize {
        world.grid.floor_count()
    }

    /// Static layout of the provided floor.
    #[must_use]
    pub fn floor_layout(world: &World, floor: i32) -> Option<FloorLayoutView<'_>> {
        world.grid.floor_layout(floor)
    }

    /// Tile type at `coords`, if the tile slot exists.
    #[must_use]
    pub fn tile_type(world: &World, coords: GridCoordinates) -> Option<TileType> {
        world.grid.tile_type(coords)
    }

    /// Attribute attached to the tile at `coords`, if any.
    #[must_use]
    pub fn tile_attribute(world: &World, coords: GridCoordinates) -> Option<&dyn TileAttribute> {
        world.grid.attribute(coords)
    }

    /// Reports whether an agent may step onto `coords` right now.
    #[must_use]
    pub fn can_enter(world: &World, coords: GridCoordinates) -> bool {
        world.grid.can_enter(coords)
    }

    /// Number of ticks applied since the world was built.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono_tiles_core::{AgentState, RecordState, RecordedAction, Recording};

    use super::*;

    fn level(rows: &[&str]) -> Level {
        Level::try_from(LevelConfig {
            time_limit_secs: 5.0,
            seconds_per_tile: 0.5,
            floors: vec![FloorConfig {
                rows: rows.iter().map(|row| (*row).to_owned()).collect(),
            }],
            goals: Vec::new(),
        })
        .expect("valid level")
    }

    #[test]
    fn agents_spawn_inactive_on_their_spawners() {
        let world = World::from_level(&level(&["B.R", "..."]));
        let view = query::agent_view(&world).into_vec();

        assert_eq!(view.len(), 2);
        assert_eq!(view[0].color, AgentColor::Red);
        assert_eq!(view[0].position, GridCoordinates::new(0, 2, 0));
        assert_eq!(view[1].color, AgentColor::Blue);
        assert!(view.iter().all(|agent| agent.state == AgentState::Inactive));
        assert!(query::tile_attribute(&world, GridCoordinates::new(0, 0, 0))
            .and_then(|attribute| attribute.spawned_agent())
            .is_some());
    }

    #[test]
    fn unknown_agents_are_structural_errors() {
        let mut world = World::from_level(&level(&["R.."]));
        let mut events = Vec::new();
        let result = apply(
            &mut world,
            Command::MoveAgent {
                agent: AgentColor::Cyan,
                to: GridCoordinates::new(0, 1, 0),
            },
            &mut events,
        );
        assert_eq!(result, Err(WorldError::UnknownAgent(AgentColor::Cyan)));
        assert!(events.is_empty());
    }

    #[test]
    fn reset_returns_agents_and_restores_tiles() {
        let mut world = World::from_level(&level(&["R~."]));
        let mut events = Vec::new();
        let crumble = GridCoordinates::new(0, 1, 0);

        let commands = [
            Command::SetAgentState {
                agent: AgentColor::Red,
                state: AgentState::Idle,
            },
            Command::MoveAgent {
                agent: AgentColor::Red,
                to: crumble,
            },
            Command::Tick {
                dt: Duration::from_millis(500),
            },
            Command::MoveAgent {
                agent: AgentColor::Red,
                to: GridCoordinates::new(0, 2, 0),
            },
        ];
        for command in commands {
            apply(&mut world, command, &mut events).expect("command applies");
        }
        assert!(!query::can_enter(&world, crumble));

        apply(&mut world, Command::ResetAgents, &mut events).expect("reset applies");
        let red = query::agent(&world, AgentColor::Red).expect("red exists");
        assert_eq!(red.position, GridCoordinates::new(0, 0, 0));
        assert_eq!(red.state, AgentState::Inactive);
        assert!(red.motion.is_none());
        assert!(query::can_enter(&world, crumble));
        assert_eq!(events.last(), Some(&Event::AgentsReset));
    }

    #[test]
    fn halt_keeps_record_indicators() {
        let mut world = World::from_level(&level(&["R.."]));
        let mut events = Vec::new();
        let recording: Recording = [RecordedAction::IdleTime(Duration::from_secs(3))]
            .into_iter()
            .collect();
        let commands = [
            Command::AssignRecording {
                agent: AgentColor::Red,
                recording,
            },
            Command::SetAgentState {
                agent: AgentColor::Red,
                state: AgentState::Recorded,
            },
            Command::HaltAgents,
        ];
        for command in commands {
            apply(&mut world, command, &mut events).expect("command applies");
        }

        let red = query::agent(&world, AgentColor::Red).expect("red exists");
        assert_eq!(red.state, AgentState::Inactive);
        assert_eq!(red.record_state, RecordState::Play);
        assert_eq!(
            query::recording(&world, AgentColor::Red).map(Recording::len),
            Some(1)
        );
    }

    #[test]
    fn attributes_cannot_be_inserted_off_grid() {
        let mut world = World::from_level(&level(&["R.."]));
        let outside = GridCoordinates::new(0, 0, 3);
        assert_eq!(
            world
                .insert_attribute(outside, Box::new(Barrier))
                .map(|previous| previous.is_some()),
            Err(WorldError::OutOfBounds(outside))
        );
    }
}
