//! Static per-floor layout plus the runtime attributes attached to tiles.

use std::collections::BTreeMap;

use chrono_tiles_core::{
    AgentColor, FloorLayoutView, GridCoordinates, GridDimensions, TileAttribute, TileType,
};

/// Dense tile layout for every floor of a level.
#[derive(Debug)]
pub(crate) struct TileGrid {
    dimensions: GridDimensions,
    floors: Vec<Vec<TileType>>,
    attributes: BTreeMap<GridCoordinates, Box<dyn TileAttribute>>,
}

impl TileGrid {
    /// Creates a grid from row-major floor layouts that all share `dimensions`.
    pub(crate) fn new(dimensions: GridDimensions, floors: Vec<Vec<TileType>>) -> Self {
        Self {
            dimensions,
            floors,
            attributes: BTreeMap::new(),
        }
    }

    pub(crate) fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    pub(crate) fn floor_count(&self) -> usize {
        self.floors.len()
    }

    /// Reports whether `coords` names a tile slot of this grid, empty or not.
    pub(crate) fn contains(&self, coords: GridCoordinates) -> bool {
        self.floor_tiles(coords.floor()).is_some() && self.dimensions.contains(coords)
    }

    pub(crate) fn tile_type(&self, coords: GridCoordinates) -> Option<TileType> {
        let tiles = self.floor_tiles(coords.floor())?;
        self.dimensions
            .index(coords)
            .and_then(|index| tiles.get(index).copied())
    }

    /// Reports whether a physical tile exists at `coords`.
    pub(crate) fn tile_exists(&self, coords: GridCoordinates) -> bool {
        matches!(
            self.tile_type(coords),
            Some(TileType::Normal | TileType::Spawner)
        )
    }

    /// Reports whether an agent may step onto `coords` right now.
    pub(crate) fn can_enter(&self, coords: GridCoordinates) -> bool {
        self.tile_exists(coords)
            && self
                .attributes
                .get(&coords)
                .map_or(true, |attribute| attribute.can_enter())
    }

    pub(crate) fn attribute(&self, coords: GridCoordinates) -> Option<&dyn TileAttribute> {
        self.attributes.get(&coords).map(Box::as_ref)
    }

    pub(crate) fn insert_attribute(
        &mut self,
        coords: GridCoordinates,
        attribute: Box<dyn TileAttribute>,
    ) -> Option<Box<dyn TileAttribute>> {
        self.attributes.insert(coords, attribute)
    }

    pub(crate) fn floor_layout(&self, floor: i32) -> Option<FloorLayoutView<'_>> {
        self.floor_tiles(floor)
            .map(|tiles| FloorLayoutView::new(tiles, self.dimensions, floor))
    }

    /// Runs the enter hook of the attribute at `coords`, if any.
    pub(crate) fn enter(&mut self, coords: GridCoordinates, agent: AgentColor) {
        if let Some(attribute) = self.attributes.get_mut(&coords) {
            attribute.on_tile_enter(agent);
        }
    }

    /// Runs the exit hook of the attribute at `coords`, if any.
    pub(crate) fn exit(&mut self, coords: GridCoordinates, agent: AgentColor) {
        if let Some(attribute) = self.attributes.get_mut(&coords) {
            attribute.on_tile_exit(agent);
        }
    }

    /// Restores every attribute to its level-load condition.
    pub(crate) fn reset_attributes(&mut self) {
        for attribute in self.attributes.values_mut() {
            attribute.on_reset();
        }
    }

    /// Spawner tiles in coordinate order together with the agent they home.
    pub(crate) fn spawners(&self) -> impl Iterator<Item = (GridCoordinates, AgentColor)> + '_ {
        self.attributes.iter().filter_map(|(coords, attribute)| {
            attribute
                .spawned_agent()
                .map(|agent| (*coords, agent))
        })
    }

    fn floor_tiles(&self, floor: i32) -> Option<&[TileType]> {
        let index = usize::try_from(floor).ok()?;
        self.floors.get(index).map(Vec::as_slice)
    }
}
