//! Rules deciding when a puzzle counts as solved.

use std::{collections::BTreeMap, fmt};

use chrono_tiles_core::{AgentColor, GridCoordinates};
use chrono_tiles_world::{query, Level, World};

/// Success condition evaluated by the session after every recording tick.
pub trait CompletionRule: fmt::Debug {
    /// Reports whether the puzzle is solved in the provided world state.
    fn is_complete(&self, world: &World) -> bool;
}

/// Solved once every agent with a goal tile stands still on it.
///
/// A rule without goals never reports success.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GoalTiles {
    goals: BTreeMap<AgentColor, GridCoordinates>,
}

impl GoalTiles {
    /// Creates a rule from explicit goal tiles.
    #[must_use]
    pub fn new(goals: BTreeMap<AgentColor, GridCoordinates>) -> Self {
        Self { goals }
    }

    /// Creates a rule from the goals declared by a level.
    #[must_use]
    pub fn from_level(level: &Level) -> Self {
        Self::new(level.goals().clone())
    }

    /// Goal tile of every agent the rule watches.
    #[must_use]
    pub fn goals(&self) -> &BTreeMap<AgentColor, GridCoordinates> {
        &self.goals
    }
}

impl CompletionRule for GoalTiles {
    fn is_complete(&self, world: &World) -> bool {
        !self.goals.is_empty()
            && self.goals.iter().all(|(agent, goal)| {
                query::agent(world, *agent)
                    .map_or(false, |snapshot| {
                        snapshot.motion.is_none() && snapshot.position == *goal
                    })
            })
    }
}
