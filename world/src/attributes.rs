//! Tile attribute variants shipped with the world.

use chrono_tiles_core::{AgentColor, TileAttribute};

/// Home tile of a single agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnerPlatform {
    agent: AgentColor,
}

impl SpawnerPlatform {
    /// Creates a spawner for the provided agent.
    #[must_use]
    pub const fn new(agent: AgentColor) -> Self {
        Self { agent }
    }
}

impl TileAttribute for SpawnerPlatform {
    fn can_enter(&self) -> bool {
        true
    }

    fn spawned_agent(&self) -> Option<AgentColor> {
        Some(self.agent)
    }
}

/// Solid obstacle that no agent may enter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Barrier;

impl TileAttribute for Barrier {
    fn can_enter(&self) -> bool {
        false
    }
}

/// Floor that gives way once an agent walks off it.
///
/// The tile stays enterable while occupied and collapses on exit. A reset
/// restores it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CrumblingTile {
    collapsed: bool,
}

impl CrumblingTile {
    /// Creates an intact crumbling tile.
    #[must_use]
    pub const fn new() -> Self {
        Self { collapsed: false }
    }

    /// Reports whether the tile already gave way.
    #[must_use]
    pub const fn is_collapsed(&self) -> bool {
        self.collapsed
    }
}

impl TileAttribute for CrumblingTile {
    fn can_enter(&self) -> bool {
        !self.collapsed
    }

    fn on_tile_exit(&mut self, _agent: AgentColor) {
        self.collapsed = true;
    }

    fn on_reset(&mut self) {
        self.collapsed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crumbling_tile_collapses_on_exit_and_recovers_on_reset() {
        let mut tile = CrumblingTile::new();
        assert!(tile.can_enter());

        tile.on_tile_enter(AgentColor::Red);
        assert!(tile.can_enter(), "entering must not collapse the tile");

        tile.on_tile_exit(AgentColor::Red);
        assert!(!tile.can_enter());
        assert!(tile.is_collapsed());

        tile.on_reset();
        assert!(tile.can_enter());
    }

    #[test]
    fn spawner_reports_its_agent() {
        let spawner = SpawnerPlatform::new(AgentColor::Cyan);
        assert!(spawner.can_enter());
        assert_eq!(spawner.spawned_agent(), Some(AgentColor::Cyan));
        assert_eq!(Barrier.spawned_agent(), None);
        assert!(!Barrier.can_enter());
    }
}
