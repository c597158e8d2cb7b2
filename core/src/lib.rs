#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Chrono Tiles engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and the systems. Adapters submit [`SessionCommand`]
//! values to the session orchestrator, the orchestrator answers with
//! [`Command`] batches, the world executes those commands via its `apply`
//! entry point, and then broadcasts [`Event`] values describing what changed.
//! Presentation layers read snapshots such as [`AgentView`] and never write
//! back into the simulation.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Location of a single tile expressed as row, column and floor.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct GridCoordinates {
    row: i32,
    column: i32,
    floor: i32,
}

impl GridCoordinates {
    /// Creates a new tile coordinate.
    #[must_use]
    pub const fn new(row: i32, column: i32, floor: i32) -> Self {
        Self { row, column, floor }
    }

    /// Zero-based row index of the tile.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Zero-based column index of the tile.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Floor the tile belongs to.
    #[must_use]
    pub const fn floor(&self) -> i32 {
        self.floor
    }

    /// Returns the coordinate displaced by the provided row and column deltas
    /// on the same floor.
    #[must_use]
    pub const fn offset(self, rows: i32, columns: i32) -> Self {
        Self {
            row: self.row + rows,
            column: self.column + columns,
            floor: self.floor,
        }
    }

    /// Computes the Manhattan distance between two coordinates, ignoring floors.
    #[must_use]
    pub fn manhattan_distance(self, other: GridCoordinates) -> u32 {
        self.row.abs_diff(other.row) + self.column.abs_diff(other.column)
    }

    /// Computes the Chebyshev distance between two coordinates, ignoring floors.
    #[must_use]
    pub fn chebyshev_distance(self, other: GridCoordinates) -> u32 {
        self.row
            .abs_diff(other.row)
            .max(self.column.abs_diff(other.column))
    }

    /// Reports whether both coordinates lie on the same floor.
    #[must_use]
    pub const fn same_floor(self, other: GridCoordinates) -> bool {
        self.floor == other.floor
    }
}

impl fmt::Display for GridCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{} floor {})", self.row, self.column, self.floor)
    }
}

/// Row and column extent shared by every floor of a level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDimensions {
    rows: u32,
    columns: u32,
}

impl GridDimensions {
    /// Creates a new dimension descriptor.
    #[must_use]
    pub const fn new(rows: u32, columns: u32) -> Self {
        Self { rows, columns }
    }

    /// Number of rows on each floor.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of columns on each floor.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of tiles on a single floor.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        let count = u64::from(self.rows) * u64::from(self.columns);
        usize::try_from(count).unwrap_or(0)
    }

    /// Reports whether the row and column of `coords` fall inside the floor.
    ///
    /// The floor component is not inspected; callers validate floors against
    /// the level separately.
    #[must_use]
    pub fn contains(&self, coords: GridCoordinates) -> bool {
        u32::try_from(coords.row()).map_or(false, |row| row < self.rows)
            && u32::try_from(coords.column()).map_or(false, |column| column < self.columns)
    }

    /// Row-major offset of `coords` within a single floor.
    #[must_use]
    pub fn index(&self, coords: GridCoordinates) -> Option<usize> {
        if !self.contains(coords) {
            return None;
        }
        let row = usize::try_from(coords.row()).ok()?;
        let column = usize::try_from(coords.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}

/// Static layout classification of a single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileType {
    /// Hole in the layout. Never walkable.
    Empty,
    /// Home tile of an agent.
    Spawner,
    /// Regular floor tile.
    Normal,
}

/// Color identity of a puzzle agent.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AgentColor {
    /// Red agent.
    Red,
    /// Green agent.
    Green,
    /// Blue agent.
    Blue,
    /// Magenta agent.
    Magenta,
    /// Yellow agent.
    Yellow,
    /// Cyan agent.
    Cyan,
}

impl AgentColor {
    /// Maps a level glyph to the agent whose spawner it denotes.
    #[must_use]
    pub const fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            'R' => Some(Self::Red),
            'G' => Some(Self::Green),
            'B' => Some(Self::Blue),
            'M' => Some(Self::Magenta),
            'Y' => Some(Self::Yellow),
            'C' => Some(Self::Cyan),
            _ => None,
        }
    }
}

impl fmt::Display for AgentColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Yellow => "yellow",
            Self::Cyan => "cyan",
        };
        f.pad(name)
    }
}

/// Control state of a puzzle agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    /// Not controlled and not replaying.
    Inactive,
    /// Live-controlled and stationary.
    Idle,
    /// Live-controlled and stepping between two tiles.
    Moving,
    /// Replaying a frozen recording.
    Recorded,
}

/// Visual record indicator reported to presentation layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordState {
    /// No indicator.
    None,
    /// A recording exists and is ready for replay.
    Available,
    /// The recording is being replayed.
    Play,
    /// Replay halted on an invalid action.
    Error,
    /// Replay consumed every recorded action.
    Completed,
}

/// Overall phase of a puzzle session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// Fresh session; nothing recorded yet.
    Start,
    /// Between recording cycles.
    Stop,
    /// A recording cycle is running.
    Play,
    /// The puzzle was solved.
    Completed,
}

/// One unit of a recorded movement track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordedAction {
    /// Stand still for the provided duration.
    IdleTime(Duration),
    /// Step onto the provided tile.
    TileMovement(GridCoordinates),
}

/// Ordered, append-only list of recorded actions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recording {
    actions: Vec<RecordedAction>,
}

impl Recording {
    /// Creates an empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action to the end of the recording.
    pub fn push(&mut self, action: RecordedAction) {
        self.actions.push(action);
    }

    /// Action stored at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&RecordedAction> {
        self.actions.get(index)
    }

    /// Number of recorded actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Reports whether no actions were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Recorded actions in playback order.
    #[must_use]
    pub fn actions(&self) -> &[RecordedAction] {
        &self.actions
    }

    /// Tile movements in playback order, skipping idle waits.
    pub fn tile_movements(&self) -> impl Iterator<Item = GridCoordinates> + '_ {
        self.actions.iter().filter_map(|action| match action {
            RecordedAction::TileMovement(coords) => Some(*coords),
            RecordedAction::IdleTime(_) => None,
        })
    }
}

impl FromIterator<RecordedAction> for Recording {
    fn from_iter<I: IntoIterator<Item = RecordedAction>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

/// Runtime behavior attached to a single tile.
///
/// Attributes are owned by the world's grid and looked up by coordinate. The
/// hooks are the only place where tile enterability may change, and they are
/// only ever invoked from the world's tick, never during a path search.
pub trait TileAttribute: fmt::Debug {
    /// Reports whether an agent may currently step onto the tile.
    fn can_enter(&self) -> bool;

    /// Invoked once an agent finishes stepping onto the tile.
    fn on_tile_enter(&mut self, _agent: AgentColor) {}

    /// Invoked when an agent starts stepping off the tile.
    fn on_tile_exit(&mut self, _agent: AgentColor) {}

    /// Restores the attribute to its level-load condition.
    fn on_reset(&mut self) {}

    /// Agent homed on this tile, if the attribute is a spawner.
    fn spawned_agent(&self) -> Option<AgentColor> {
        None
    }
}

/// Reasons a replaying agent may refuse a recorded tile movement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplayFault {
    /// The recorded tile is further than one tile away or on another floor.
    NotAdjacent,
    /// The recorded tile cannot be entered.
    TargetBlocked,
    /// The tile the agent stands on does not exist in the grid.
    MissingTile,
    /// The tile the agent stands on no longer lets it leave.
    CurrentBlocked,
}

/// Mutations the world accepts.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Starts a live step of `agent` onto the adjacent tile `to`.
    MoveAgent {
        /// Agent to move.
        agent: AgentColor,
        /// Tile the agent steps onto.
        to: GridCoordinates,
    },
    /// Requests an agent state transition.
    SetAgentState {
        /// Agent to update.
        agent: AgentColor,
        /// Requested state.
        state: AgentState,
    },
    /// Hands a frozen recording to an agent for later replay.
    AssignRecording {
        /// Agent receiving the recording.
        agent: AgentColor,
        /// Frozen action list.
        recording: Recording,
    },
    /// Drops the recording held by an agent.
    ClearRecording {
        /// Agent losing its recording.
        agent: AgentColor,
    },
    /// Returns every agent to its spawner and resets every tile attribute.
    ResetAgents,
    /// Forces every agent inactive without touching record indicators.
    HaltAgents,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// An agent started stepping between two tiles.
    AgentStepStarted {
        /// Agent that started moving.
        agent: AgentColor,
        /// Tile the agent is leaving.
        from: GridCoordinates,
        /// Tile the agent is heading to.
        to: GridCoordinates,
    },
    /// An agent finished stepping onto a tile.
    AgentStepCompleted {
        /// Agent that arrived.
        agent: AgentColor,
        /// Tile the agent left.
        from: GridCoordinates,
        /// Tile the agent now occupies.
        to: GridCoordinates,
    },
    /// An agent entered a new control state.
    AgentStateChanged {
        /// Agent whose state changed.
        agent: AgentColor,
        /// State now active.
        state: AgentState,
    },
    /// An agent's record indicator changed.
    RecordStateChanged {
        /// Agent whose indicator changed.
        agent: AgentColor,
        /// Indicator now shown.
        state: RecordState,
    },
    /// A replaying agent rejected its next recorded action.
    ReplayHalted {
        /// Agent whose replay halted.
        agent: AgentColor,
        /// Index of the rejected action.
        action_index: usize,
        /// Tile the rejected action targeted.
        target: GridCoordinates,
        /// Validation rule that failed.
        fault: ReplayFault,
    },
    /// Every agent returned to its spawner and tile attributes were reset.
    AgentsReset,
}

/// Inputs the presentation layer feeds into the session orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    /// Selects the agent that will be live during the next recording cycle.
    SelectAgent {
        /// Agent to select.
        agent: AgentColor,
    },
    /// Requests that the live agent walk to `target`.
    PickDestination {
        /// Agent the pick was issued for.
        agent: AgentColor,
        /// Destination tile.
        target: GridCoordinates,
    },
    /// Starts a recording cycle.
    Play,
    /// Ends the running recording cycle.
    Stop,
    /// Discards every recording and returns to the start of the session.
    Reset,
    /// Moves the interaction focus to another floor.
    SetFloorFocus {
        /// Floor to focus.
        floor: i32,
    },
    /// External signal that the puzzle was solved.
    DeclareCompleted,
}

/// Session values presentation layers display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current session phase.
    pub game_state: GameState,
    /// Time left in the recording window.
    pub remaining: Duration,
    /// Agent selected for the next or current cycle.
    pub selected: Option<AgentColor>,
    /// Floor the interaction focus is on.
    pub floor_focus: i32,
    /// Whether agents currently accept selection picks.
    pub pick_enabled: bool,
}

/// Live step currently being interpolated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    /// Tile the agent is leaving.
    pub from: GridCoordinates,
    /// Tile the agent is heading to.
    pub to: GridCoordinates,
    /// Interpolation progress in `[0, 1]`.
    pub progress: f32,
}

/// Immutable representation of a single agent used for queries.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentSnapshot {
    /// Color identity of the agent.
    pub color: AgentColor,
    /// Spawner tile the agent returns to on reset.
    pub spawn: GridCoordinates,
    /// Last tile the agent fully arrived on.
    pub position: GridCoordinates,
    /// Control state.
    pub state: AgentState,
    /// Record indicator.
    pub record_state: RecordState,
    /// Whether the last live step finished.
    pub reached_destination: bool,
    /// Whether the agent holds a frozen recording.
    pub has_recording: bool,
    /// Step in progress, if any.
    pub motion: Option<Motion>,
}

impl AgentSnapshot {
    /// Tile the agent will occupy once its current step completes.
    #[must_use]
    pub fn committed_position(&self) -> GridCoordinates {
        self.motion.map_or(self.position, |motion| motion.to)
    }
}

/// Read-only snapshot describing all agents within the level.
#[derive(Clone, Debug, Default)]
pub struct AgentView {
    snapshots: Vec<AgentSnapshot>,
}

impl AgentView {
    /// Creates a new agent view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<AgentSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.color);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in color order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentSnapshot> {
        self.snapshots.iter()
    }

    /// Snapshot of the agent with the provided color, if present.
    #[must_use]
    pub fn get(&self, color: AgentColor) -> Option<&AgentSnapshot> {
        self.snapshots.iter().find(|snapshot| snapshot.color == color)
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<AgentSnapshot> {
        self.snapshots
    }
}

/// Read-only view of one floor's static tile layout.
#[derive(Clone, Copy, Debug)]
pub struct FloorLayoutView<'a> {
    tiles: &'a [TileType],
    dimensions: GridDimensions,
    floor: i32,
}

impl<'a> FloorLayoutView<'a> {
    /// Captures a new layout view backed by the provided row-major tiles.
    #[must_use]
    pub fn new(tiles: &'a [TileType], dimensions: GridDimensions, floor: i32) -> Self {
        Self {
            tiles,
            dimensions,
            floor,
        }
    }

    /// Floor the view describes.
    #[must_use]
    pub const fn floor(&self) -> i32 {
        self.floor
    }

    /// Dimensions of the floor.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// Tile type at `coords`, ignoring its floor component.
    #[must_use]
    pub fn tile_type(&self, coords: GridCoordinates) -> Option<TileType> {
        self.dimensions
            .index(coords)
            .and_then(|index| self.tiles.get(index).copied())
    }
}
