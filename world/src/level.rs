//! TOML level format and its validation.

use std::{collections::BTreeMap, time::Duration};

use chrono_tiles_core::{AgentColor, GridCoordinates, GridDimensions, TileType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NORMAL_GLYPH: char = '.';
const EMPTY_GLYPH: char = '_';
const BARRIER_GLYPH: char = '#';
const CRUMBLING_GLYPH: char = '~';

/// Raw level description as written in level files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Length of each recording window in seconds.
    pub time_limit_secs: f32,
    /// Time an agent needs to step from one tile to the next, in seconds.
    pub seconds_per_tile: f32,
    /// Floors from the ground floor upwards.
    pub floors: Vec<FloorConfig>,
    /// Goal tiles used by goal-based completion rules.
    #[serde(default)]
    pub goals: Vec<GoalConfig>,
}

/// Glyph map of a single floor, one string per row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorConfig {
    /// Rows from row zero downwards.
    pub rows: Vec<String>,
}

/// Goal tile assigned to an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalConfig {
    /// Agent the goal belongs to.
    pub agent: AgentColor,
    /// Row of the goal tile.
    pub row: i32,
    /// Column of the goal tile.
    pub column: i32,
    /// Floor of the goal tile.
    #[serde(default)]
    pub floor: i32,
}

/// Special tile behavior requested by a level glyph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileFeature {
    /// Spawner of the provided agent.
    Spawner(AgentColor),
    /// Impassable barrier.
    Barrier,
    /// Floor that collapses once walked off.
    Crumbling,
}

/// Validated level ready to build a world from.
#[derive(Clone, Debug, PartialEq)]
pub struct Level {
    dimensions: GridDimensions,
    floors: Vec<Vec<TileType>>,
    features: Vec<(GridCoordinates, TileFeature)>,
    goals: BTreeMap<AgentColor, GridCoordinates>,
    time_limit: Duration,
    step_duration: Duration,
}

/// Reasons a level description may be rejected.
#[derive(Debug, Error)]
pub enum LevelError {
    /// The document is not valid TOML or misses fields.
    #[error("failed to parse level: {0}")]
    Parse(#[from] toml::de::Error),
    /// No floors were declared.
    #[error("level declares no floors")]
    NoFloors,
    /// A floor has no rows or its first row is empty.
    #[error("floor {floor} has no tiles")]
    EmptyFloor {
        /// Offending floor.
        floor: usize,
    },
    /// A floor's row count differs from the ground floor's.
    #[error("floor {floor} has {found} rows, expected {expected}")]
    FloorHeightMismatch {
        /// Offending floor.
        floor: usize,
        /// Rows found on the floor.
        found: usize,
        /// Rows on the ground floor.
        expected: usize,
    },
    /// A row's width differs from the ground floor's first row.
    #[error("floor {floor} row {row} is {found} tiles wide, expected {expected}")]
    RaggedRow {
        /// Offending floor.
        floor: usize,
        /// Offending row.
        row: usize,
        /// Tiles found in the row.
        found: usize,
        /// Tiles in the ground floor's first row.
        expected: usize,
    },
    /// A glyph has no tile meaning.
    #[error("unknown glyph '{glyph}' at {at}")]
    UnknownGlyph {
        /// Glyph found in the map.
        glyph: char,
        /// Position of the glyph.
        at: GridCoordinates,
    },
    /// An agent has more than one spawner.
    #[error("agent {agent} has more than one spawner")]
    DuplicateSpawner {
        /// Agent spawned twice.
        agent: AgentColor,
    },
    /// No spawner glyph appears in the level.
    #[error("level declares no agents")]
    NoAgents,
    /// A goal names an agent without a spawner.
    #[error("goal for {agent} refers to an agent that is not in the level")]
    GoalWithoutAgent {
        /// Agent named by the goal.
        agent: AgentColor,
    },
    /// A goal lies outside the grid or on an empty tile.
    #[error("goal for {agent} at {at} is not a walkable tile")]
    GoalNotWalkable {
        /// Agent named by the goal.
        agent: AgentColor,
        /// Goal position.
        at: GridCoordinates,
    },
    /// An agent received more than one goal.
    #[error("agent {agent} has more than one goal")]
    DuplicateGoal {
        /// Agent named twice.
        agent: AgentColor,
    },
    /// The recording window is not a positive number of seconds that fits a
    /// `Duration`.
    #[error("time limit must be positive and finite, got {0}")]
    InvalidTimeLimit(f32),
    /// The step duration is negative, not finite or too large.
    #[error("seconds per tile must be non-negative and finite, got {0}")]
    InvalidStepDuration(f32),
    /// Grid dimensions exceed the supported coordinate range.
    #[error("level is too large")]
    TooLarge,
}

impl Level {
    /// Parses and validates a TOML level document.
    pub fn from_toml_str(contents: &str) -> Result<Self, LevelError> {
        let config: LevelConfig = toml::from_str(contents)?;
        Self::try_from(config)
    }

    /// Dimensions shared by every floor.
    #[must_use]
    pub const fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    /// Number of floors.
    #[must_use]
    pub fn floor_count(&self) -> usize {
        self.floors.len()
    }

    /// Row-major tile types of every floor.
    #[must_use]
    pub fn floors(&self) -> &[Vec<TileType>] {
        &self.floors
    }

    /// Tiles that carry special behavior, in map reading order.
    #[must_use]
    pub fn features(&self) -> &[(GridCoordinates, TileFeature)] {
        &self.features
    }

    /// Spawner position of every agent in color order.
    pub fn spawners(&self) -> impl Iterator<Item = (AgentColor, GridCoordinates)> + '_ {
        let mut spawners: Vec<_> = self
            .features
            .iter()
            .filter_map(|(coords, feature)| match feature {
                TileFeature::Spawner(agent) => Some((*agent, *coords)),
                TileFeature::Barrier | TileFeature::Crumbling => None,
            })
            .collect();
        spawners.sort_by_key(|(agent, _)| *agent);
        spawners.into_iter()
    }

    /// Goal tile of every agent that has one.
    #[must_use]
    pub fn goals(&self) -> &BTreeMap<AgentColor, GridCoordinates> {
        &self.goals
    }

    /// Length of each recording window.
    #[must_use]
    pub const fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Time a single tile step takes.
    #[must_use]
    pub const fn step_duration(&self) -> Duration {
        self.step_duration
    }
}

impl TryFrom<LevelConfig> for Level {
    type Error = LevelError;

    fn try_from(config: LevelConfig) -> Result<Self, Self::Error> {
        let time_limit = Duration::try_from_secs_f32(config.time_limit_secs)
            .ok()
            .filter(|limit| !limit.is_zero())
            .ok_or(LevelError::InvalidTimeLimit(config.time_limit_secs))?;
        let step_duration = Duration::try_from_secs_f32(config.seconds_per_tile)
            .map_err(|_| LevelError::InvalidStepDuration(config.seconds_per_tile))?;

        let ground = config.floors.first().ok_or(LevelError::NoFloors)?;
        let height = ground.rows.len();
        let width = ground
            .rows
            .first()
            .map_or(0, |row| row.chars().count());
        if height == 0 || width == 0 {
            return Err(LevelError::EmptyFloor { floor: 0 });
        }
        let dimensions = GridDimensions::new(
            u32::try_from(height).map_err(|_| LevelError::TooLarge)?,
            u32::try_from(width).map_err(|_| LevelError::TooLarge)?,
        );
        // Coordinates are signed; every index must survive the round trip.
        if i32::try_from(height).is_err() || i32::try_from(width).is_err() {
            return Err(LevelError::TooLarge);
        }

        let mut floors = Vec::with_capacity(config.floors.len());
        let mut features = Vec::new();
        for (floor_index, floor) in config.floors.iter().enumerate() {
            if floor.rows.is_empty() {
                return Err(LevelError::EmptyFloor { floor: floor_index });
            }
            if floor.rows.len() != height {
                return Err(LevelError::FloorHeightMismatch {
                    floor: floor_index,
                    found: floor.rows.len(),
                    expected: height,
                });
            }
            let floor_id = i32::try_from(floor_index).map_err(|_| LevelError::TooLarge)?;

            let mut tiles = Vec::with_capacity(dimensions.tile_count());
            for (row_index, row) in floor.rows.iter().enumerate() {
                let found = row.chars().count();
                if found != width {
                    return Err(LevelError::RaggedRow {
                        floor: floor_index,
                        row: row_index,
                        found,
                        expected: width,
                    });
                }
                for (column_index, glyph) in row.chars().enumerate() {
                    let at = GridCoordinates::new(
                        row_index as i32,
                        column_index as i32,
                        floor_id,
                    );
                    let (tile, feature) = parse_glyph(glyph, at)?;
                    tiles.push(tile);
                    if let Some(feature) = feature {
                        features.push((at, feature));
                    }
                }
            }
            floors.push(tiles);
        }

        let mut spawned = BTreeMap::new();
        for (coords, feature) in &features {
            if let TileFeature::Spawner(agent) = feature {
                if spawned.insert(*agent, *coords).is_some() {
                    return Err(LevelError::DuplicateSpawner { agent: *agent });
                }
            }
        }
        if spawned.is_empty() {
            return Err(LevelError::NoAgents);
        }

        let mut goals = BTreeMap::new();
        for goal in &config.goals {
            let at = GridCoordinates::new(goal.row, goal.column, goal.floor);
            if !spawned.contains_key(&goal.agent) {
                return Err(LevelError::GoalWithoutAgent { agent: goal.agent });
            }
            let walkable = usize::try_from(goal.floor)
                .ok()
                .and_then(|floor| floors.get(floor))
                .and_then(|tiles| dimensions.index(at).and_then(|index| tiles.get(index)))
                .map_or(false, |tile| *tile != TileType::Empty);
            if !walkable {
                return Err(LevelError::GoalNotWalkable {
                    agent: goal.agent,
                    at,
                });
            }
            if goals.insert(goal.agent, at).is_some() {
                return Err(LevelError::DuplicateGoal { agent: goal.agent });
            }
        }

        Ok(Self {
            dimensions,
            floors,
            features,
            goals,
            time_limit,
            step_duration,
        })
    }
}

fn parse_glyph(
    glyph: char,
    at: GridCoordinates,
) -> Result<(TileType, Option<TileFeature>), LevelError> {
    let parsed = match glyph {
        NORMAL_GLYPH => (TileType::Normal, None),
        EMPTY_GLYPH => (TileType::Empty, None),
        BARRIER_GLYPH => (TileType::Normal, Some(TileFeature::Barrier)),
        CRUMBLING_GLYPH => (TileType::Normal, Some(TileFeature::Crumbling)),
        other => match AgentColor::from_glyph(other) {
            Some(agent) => (TileType::Spawner, Some(TileFeature::Spawner(agent))),
            None => return Err(LevelError::UnknownGlyph { glyph, at }),
        },
    };
    Ok(parsed)
}
