#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session orchestration for Chrono Tiles.
//!
//! The session owns the game phase, the recording countdown and the pending
//! path of the live agent. It turns [`SessionCommand`] inputs and elapsed time
//! into [`Command`] batches for the world, and records what the live agent
//! does so later cycles can replay it next to the new live agent.

mod completion;

use std::{collections::BTreeMap, mem, time::Duration};

use chrono_tiles_core::{
    AgentColor, AgentState, Command, GameState, GridCoordinates, RecordedAction, Recording,
    SessionCommand, SessionStatus,
};
use chrono_tiles_system_pathfinding::Pathfinder;
use chrono_tiles_world::{query, Level, World};
use thiserror::Error;
use tracing::{debug, info};

pub use self::completion::{CompletionRule, GoalTiles};

/// Inputs the session refused. A rejected input never changes state.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    /// Agents cannot be selected while a recording cycle runs.
    #[error("agent selection is locked while recording")]
    SelectionLocked,
    /// The named agent does not exist in the level.
    #[error("agent {0} is not part of this level")]
    UnknownAgent(AgentColor),
    /// The input needs a selected agent.
    #[error("no agent is selected")]
    NoSelection,
    /// A destination was picked for an agent other than the selected one.
    #[error("agent {0} is not the selected agent")]
    NotSelected(AgentColor),
    /// The input is not accepted in the current game state.
    #[error("{input} is not accepted in the {state:?} state")]
    WrongState {
        /// Input that was refused.
        input: &'static str,
        /// Game state at the time of the input.
        state: GameState,
    },
    /// The floor does not exist in the level.
    #[error("floor {0} does not exist")]
    UnknownFloor(i32),
    /// The picked tile is not on the focused floor or the agent's floor.
    #[error("floor {0} is not the floor in focus")]
    FloorMismatch(i32),
    /// The picked tile is the tile the agent stands on.
    #[error("agent already stands on {0}")]
    AlreadyThere(GridCoordinates),
    /// The tile the agent stands on does not let it leave.
    #[error("agent cannot leave {0}")]
    CurrentBlocked(GridCoordinates),
    /// The picked tile cannot be entered.
    #[error("{0} cannot be entered")]
    TargetBlocked(GridCoordinates),
    /// No walkable route leads to the picked tile.
    #[error("no path leads to {0}")]
    NoPath(GridCoordinates),
}

/// Configuration and state inconsistencies of a session.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Sessions cannot be built without a rule deciding when the puzzle is solved.
    #[error("a completion rule must be configured")]
    MissingCompletionRule,
    /// The recording window must last longer than zero.
    #[error("time limit must be greater than zero")]
    ZeroTimeLimit,
    /// The selected agent vanished from the world.
    #[error("selected agent {0} is missing from the world")]
    MissingAgent(AgentColor),
}

/// Configuration parameters required to construct a session.
#[derive(Debug)]
pub struct Config {
    time_limit: Duration,
    completion: Option<Box<dyn CompletionRule>>,
}

impl Config {
    /// Creates a configuration with the provided recording window and no
    /// completion rule.
    #[must_use]
    pub fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            completion: None,
        }
    }

    /// Creates a configuration using the recording window of a level.
    #[must_use]
    pub fn from_level(level: &Level) -> Self {
        Self::new(level.time_limit())
    }

    /// Installs the rule that decides when the puzzle is solved.
    #[must_use]
    pub fn with_completion_rule(mut self, rule: Box<dyn CompletionRule>) -> Self {
        self.completion = Some(rule);
        self
    }
}

/// Orchestrates recording cycles over a world.
#[derive(Debug)]
pub struct Session {
    game_state: GameState,
    time_limit: Duration,
    remaining: Duration,
    selected: Option<AgentColor>,
    floor_focus: i32,
    pick_enabled: bool,
    /// Pending tiles, destination first.
    path: Option<Vec<GridCoordinates>>,
    recording_idle: bool,
    idle: Duration,
    recordings: BTreeMap<AgentColor, Recording>,
    completion: Box<dyn CompletionRule>,
}

impl Session {
    /// Creates a session in the `Start` state.
    pub fn new(config: Config) -> Result<Self, SessionError> {
        let completion = config
            .completion
            .ok_or(SessionError::MissingCompletionRule)?;
        if config.time_limit.is_zero() {
            return Err(SessionError::ZeroTimeLimit);
        }

        Ok(Self {
            game_state: GameState::Start,
            time_limit: config.time_limit,
            remaining: config.time_limit,
            selected: None,
            floor_focus: 0,
            pick_enabled: true,
            path: None,
            recording_idle: false,
            idle: Duration::ZERO,
            recordings: BTreeMap::new(),
            completion,
        })
    }

    /// Values presentation layers display.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            game_state: self.game_state,
            remaining: self.remaining,
            selected: self.selected,
            floor_focus: self.floor_focus,
            pick_enabled: self.pick_enabled,
        }
    }

    /// Current session phase.
    #[must_use]
    pub fn game_state(&self) -> GameState {
        self.game_state
    }

    /// Latest recording captured for an agent.
    #[must_use]
    pub fn recording(&self, agent: AgentColor) -> Option<&Recording> {
        self.recordings.get(&agent)
    }

    /// Handles a single input, pushing the resulting world commands onto `out`.
    pub fn handle_input(
        &mut self,
        input: SessionCommand,
        world: &World,
        pathfinder: &mut Pathfinder,
        out: &mut Vec<Command>,
    ) -> Result<(), Rejection> {
        let result = match input {
            SessionCommand::SelectAgent { agent } => self.select_agent(agent, world),
            SessionCommand::PickDestination { agent, target } => {
                self.pick_destination(agent, target, world, pathfinder)
            }
            SessionCommand::Play => self.play(world, out),
            SessionCommand::Stop => match self.game_state {
                GameState::Play => {
                    self.stop(out);
                    Ok(())
                }
                state => Err(Rejection::WrongState {
                    input: "stop",
                    state,
                }),
            },
            SessionCommand::Reset => {
                self.enter_start(world, out);
                Ok(())
            }
            SessionCommand::SetFloorFocus { floor } => self.set_floor_focus(floor, world),
            SessionCommand::DeclareCompleted => match self.game_state {
                GameState::Completed => Err(Rejection::WrongState {
                    input: "declare_completed",
                    state: GameState::Completed,
                }),
                _ => {
                    self.complete(out);
                    Ok(())
                }
            },
        };

        if let Err(rejection) = &result {
            debug!(?input, %rejection, state = ?self.game_state, "input rejected");
        }
        result
    }

    /// Runs the per-tick session work after the world advanced by `dt`.
    ///
    /// The live recording step runs first, then the completion rule, then the
    /// countdown.
    pub fn tick(
        &mut self,
        dt: Duration,
        world: &World,
        out: &mut Vec<Command>,
    ) -> Result<(), SessionError> {
        if self.game_state != GameState::Play {
            return Ok(());
        }

        self.record_step(dt, world, out)?;

        if self.completion.is_complete(world) {
            self.complete(out);
            return Ok(());
        }

        self.remaining = self.remaining.saturating_sub(dt);
        if self.remaining.is_zero() {
            info!("recording window expired");
            self.stop(out);
        }
        Ok(())
    }

    fn select_agent(&mut self, agent: AgentColor, world: &World) -> Result<(), Rejection> {
        if self.game_state == GameState::Play {
            return Err(Rejection::SelectionLocked);
        }
        let snapshot = query::agent(world, agent).ok_or(Rejection::UnknownAgent(agent))?;
        self.selected = Some(agent);
        self.floor_focus = snapshot.position.floor();
        debug!(%agent, floor = self.floor_focus, "agent selected");
        Ok(())
    }

    fn pick_destination(
        &mut self,
        agent: AgentColor,
        target: GridCoordinates,
        world: &World,
        pathfinder: &mut Pathfinder,
    ) -> Result<(), Rejection> {
        if target.floor() != self.floor_focus {
            return Err(Rejection::FloorMismatch(target.floor()));
        }
        let selected = self.selected.ok_or(Rejection::NoSelection)?;
        if agent != selected {
            return Err(Rejection::NotSelected(agent));
        }
        if self.game_state != GameState::Play {
            return Err(Rejection::WrongState {
                input: "pick_destination",
                state: self.game_state,
            });
        }

        let snapshot = query::agent(world, agent).ok_or(Rejection::UnknownAgent(agent))?;
        let start = snapshot.committed_position();
        if !start.same_floor(target) {
            return Err(Rejection::FloorMismatch(target.floor()));
        }
        if start == target {
            return Err(Rejection::AlreadyThere(target));
        }
        if !query::can_enter(world, start) {
            return Err(Rejection::CurrentBlocked(start));
        }
        if !query::can_enter(world, target) {
            return Err(Rejection::TargetBlocked(target));
        }

        let layout = query::floor_layout(world, target.floor())
            .ok_or(Rejection::UnknownFloor(target.floor()))?;
        let path = pathfinder
            .find_path(start, target, layout, |coords| query::can_enter(world, coords))
            .ok_or(Rejection::NoPath(target))?;

        debug!(%agent, %start, %target, moves = path.moves(), "path assigned");
        let mut steps = path.into_steps();
        steps.reverse();
        self.path = Some(steps);
        Ok(())
    }

    fn play(&mut self, world: &World, out: &mut Vec<Command>) -> Result<(), Rejection> {
        if matches!(self.game_state, GameState::Play | GameState::Completed) {
            return Err(Rejection::WrongState {
                input: "play",
                state: self.game_state,
            });
        }
        let live = self.selected.ok_or(Rejection::NoSelection)?;

        let _ = self.recordings.insert(live, Recording::new());
        self.pick_enabled = false;
        self.path = None;
        self.restart_idle();

        out.push(Command::ClearRecording { agent: live });
        for agent in query::agent_colors(world) {
            let state = if agent == live {
                AgentState::Idle
            } else {
                AgentState::Recorded
            };
            out.push(Command::SetAgentState { agent, state });
        }

        self.game_state = GameState::Play;
        info!(agent = %live, remaining = ?self.remaining, "recording started");
        Ok(())
    }

    fn stop(&mut self, out: &mut Vec<Command>) {
        self.flush_idle();
        if let Some(agent) = self.selected {
            let recording = self.recordings.get(&agent).cloned().unwrap_or_default();
            info!(%agent, actions = recording.len(), "recording stored");
            out.push(Command::AssignRecording { agent, recording });
            out.push(Command::SetAgentState {
                agent,
                state: AgentState::Inactive,
            });
        }

        self.remaining = self.time_limit;
        self.path = None;
        self.recording_idle = false;
        self.idle = Duration::ZERO;
        self.pick_enabled = true;
        out.push(Command::ResetAgents);
        self.game_state = GameState::Stop;
    }

    fn complete(&mut self, out: &mut Vec<Command>) {
        self.path = None;
        self.recording_idle = false;
        self.idle = Duration::ZERO;
        self.pick_enabled = false;
        out.push(Command::HaltAgents);
        self.game_state = GameState::Completed;
        info!("puzzle completed");
    }

    fn enter_start(&mut self, world: &World, out: &mut Vec<Command>) {
        self.recordings.clear();
        for agent in query::agent_colors(world) {
            out.push(Command::ClearRecording { agent });
        }
        out.push(Command::ResetAgents);

        self.game_state = GameState::Start;
        self.remaining = self.time_limit;
        self.selected = None;
        self.floor_focus = 0;
        self.pick_enabled = true;
        self.path = None;
        self.recording_idle = false;
        self.idle = Duration::ZERO;
        info!("session reset");
    }

    fn set_floor_focus(&mut self, floor: i32, world: &World) -> Result<(), Rejection> {
        let exists =
            usize::try_from(floor).map_or(false, |index| index < query::floor_count(world));
        if !exists {
            return Err(Rejection::UnknownFloor(floor));
        }
        self.floor_focus = floor;
        Ok(())
    }

    fn record_step(
        &mut self,
        dt: Duration,
        world: &World,
        out: &mut Vec<Command>,
    ) -> Result<(), SessionError> {
        let Some(agent) = self.selected else {
            return Ok(());
        };
        let snapshot = query::agent(world, agent).ok_or(SessionError::MissingAgent(agent))?;

        let Some(path) = self.path.as_mut() else {
            if self.recording_idle {
                self.idle = self.idle.saturating_add(dt);
            }
            return Ok(());
        };
        if !snapshot.reached_destination {
            return Ok(());
        }

        let mut next = path.pop();
        if next == Some(snapshot.position) {
            next = path.pop();
        }
        let Some(next) = next else {
            self.abandon_path(agent, out);
            return Ok(());
        };

        self.flush_idle();
        if !query::can_enter(world, next) {
            debug!(%agent, tile = %next, "path blocked");
            self.abandon_path(agent, out);
            return Ok(());
        }

        self.live_recording(agent).push(RecordedAction::TileMovement(next));
        out.push(Command::MoveAgent { agent, to: next });
        Ok(())
    }

    fn abandon_path(&mut self, agent: AgentColor, out: &mut Vec<Command>) {
        self.path = None;
        self.restart_idle();
        out.push(Command::SetAgentState {
            agent,
            state: AgentState::Idle,
        });
    }

    fn restart_idle(&mut self) {
        self.recording_idle = true;
        self.idle = Duration::ZERO;
    }

    fn flush_idle(&mut self) {
        if !mem::replace(&mut self.recording_idle, false) {
            return;
        }
        let idle = mem::take(&mut self.idle);
        if idle.is_zero() {
            return;
        }
        if let Some(agent) = self.selected {
            self.live_recording(agent).push(RecordedAction::IdleTime(idle));
        }
    }

    fn live_recording(&mut self, agent: AgentColor) -> &mut Recording {
        self.recordings.entry(agent).or_default()
    }
}
