#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single-floor best-first grid search used to turn a picked tile into a
//! walkable step sequence.
//!
//! Every search rebuilds a dense node grid for the destination floor. Cells
//! that are holes or cannot be entered are marked unusable up front and never
//! expanded. Nodes live in an arena and point at their parent by index, so
//! path reconstruction is a plain index walk.

use chrono_tiles_core::{FloorLayoutView, GridCoordinates, GridDimensions, TileType};
use tracing::debug;

/// Expansion order: `+column`, `-column`, `+row`, `-row`, as `(row, column)`
/// deltas.
const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];

/// Ordered tile sequence from a start tile to a destination tile, both
/// included.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    steps: Vec<GridCoordinates>,
}

impl Path {
    /// Tile the path starts on.
    #[must_use]
    pub fn start(&self) -> GridCoordinates {
        self.steps[0]
    }

    /// Tile the path ends on.
    #[must_use]
    pub fn destination(&self) -> GridCoordinates {
        self.steps[self.steps.len() - 1]
    }

    /// Every tile of the path in walking order.
    #[must_use]
    pub fn steps(&self) -> &[GridCoordinates] {
        &self.steps
    }

    /// Number of single-tile moves needed to walk the path.
    #[must_use]
    pub fn moves(&self) -> usize {
        self.steps.len() - 1
    }

    /// Consumes the path, yielding its tiles in walking order.
    #[must_use]
    pub fn into_steps(self) -> Vec<GridCoordinates> {
        self.steps
    }
}

#[derive(Clone, Copy, Debug)]
struct PathNode {
    position: GridCoordinates,
    g_cost: u32,
    h_cost: u32,
    parent: Option<usize>,
}

impl PathNode {
    fn f_cost(&self) -> u32 {
        self.g_cost + self.h_cost
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cell {
    Unvisited,
    Unusable,
    Node { index: usize, closed: bool },
}

/// Reusable search workspace.
#[derive(Debug)]
pub struct Pathfinder {
    dimensions: GridDimensions,
    cells: Vec<Cell>,
    nodes: Vec<PathNode>,
    open: Vec<usize>,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self {
            dimensions: GridDimensions::new(0, 0),
            cells: Vec::new(),
            nodes: Vec::new(),
            open: Vec::new(),
        }
    }
}

impl Pathfinder {
    /// Creates a pathfinder with an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Searches `layout` for a route from `start` to `destination`.
    ///
    /// `can_enter` reports the live enterability of a tile; tiles it rejects
    /// are never part of the result, except the start tile itself. Open nodes
    /// are scanned linearly and the first one with the lowest `f` cost wins,
    /// so among equally short routes the one explored first is returned.
    ///
    /// Returns `None` when the destination is unreachable, when either
    /// endpoint lies off the layout or on another floor, or when both
    /// endpoints coincide.
    pub fn find_path<F>(
        &mut self,
        start: GridCoordinates,
        destination: GridCoordinates,
        layout: FloorLayoutView<'_>,
        can_enter: F,
    ) -> Option<Path>
    where
        F: Fn(GridCoordinates) -> bool,
    {
        if !start.same_floor(destination) || destination.floor() != layout.floor() {
            debug!(%start, %destination, "cross-floor paths are not supported");
            return None;
        }
        let dimensions = layout.dimensions();
        if !dimensions.contains(start) || !dimensions.contains(destination) {
            return None;
        }
        if start == destination {
            return None;
        }

        self.prepare(layout, &can_enter);

        let root = self.push_node(start, 0, start.manhattan_distance(destination), None);
        self.set_cell(start, Cell::Node {
            index: root,
            closed: false,
        });
        let mut current = root;

        loop {
            let parent = self.nodes[current];
            for (rows, columns) in NEIGHBOR_OFFSETS {
                let position = parent.position.offset(rows, columns);
                let Some(cell_index) = self.dimensions.index(position) else {
                    continue;
                };
                let g_cost = parent.g_cost + 1;
                let h_cost = position.manhattan_distance(destination);

                match self.cells[cell_index] {
                    Cell::Unusable | Cell::Node { closed: true, .. } => continue,
                    Cell::Node { index, .. } if self.nodes[index].f_cost() <= g_cost + h_cost => {
                        continue
                    }
                    Cell::Unvisited | Cell::Node { .. } => {}
                }

                let child = self.push_node(position, g_cost, h_cost, Some(current));
                self.cells[cell_index] = Cell::Node {
                    index: child,
                    closed: false,
                };
                if position == destination {
                    return Some(self.reconstruct(child));
                }
                self.open.push(child);
            }

            self.close(parent.position);
            match self.select_open() {
                Some(next) => current = next,
                None => {
                    debug!(%start, %destination, explored = self.nodes.len(), "no path");
                    return None;
                }
            }
        }
    }

    fn prepare<F>(&mut self, layout: FloorLayoutView<'_>, can_enter: &F)
    where
        F: Fn(GridCoordinates) -> bool,
    {
        let dimensions = layout.dimensions();
        self.dimensions = dimensions;
        self.nodes.clear();
        self.open.clear();
        self.cells.clear();
        self.cells.resize(dimensions.tile_count(), Cell::Unvisited);

        let columns = usize::try_from(dimensions.columns()).unwrap_or(0);
        if columns == 0 {
            return;
        }
        for (index, cell) in self.cells.iter_mut().enumerate() {
            let (Ok(row), Ok(column)) = (i32::try_from(index / columns), i32::try_from(index % columns))
            else {
                *cell = Cell::Unusable;
                continue;
            };
            let coords = GridCoordinates::new(row, column, layout.floor());
            let walkable = layout
                .tile_type(coords)
                .map_or(false, |tile| tile != TileType::Empty);
            if !walkable || !can_enter(coords) {
                *cell = Cell::Unusable;
            }
        }
    }

    fn push_node(
        &mut self,
        position: GridCoordinates,
        g_cost: u32,
        h_cost: u32,
        parent: Option<usize>,
    ) -> usize {
        self.nodes.push(PathNode {
            position,
            g_cost,
            h_cost,
            parent,
        });
        self.nodes.len() - 1
    }

    fn set_cell(&mut self, position: GridCoordinates, cell: Cell) {
        if let Some(index) = self.dimensions.index(position) {
            self.cells[index] = cell;
        }
    }

    fn close(&mut self, position: GridCoordinates) {
        if let Some(index) = self.dimensions.index(position) {
            if let Cell::Node { closed, .. } = &mut self.cells[index] {
                *closed = true;
            }
        }
    }

    /// Drops open entries whose cell was closed, then returns the first entry
    /// with the lowest `f` cost.
    fn select_open(&mut self) -> Option<usize> {
        let Self {
            dimensions,
            cells,
            nodes,
            open,
        } = self;
        open.retain(|&node| {
            dimensions
                .index(nodes[node].position)
                .map_or(false, |index| {
                    !matches!(cells[index], Cell::Node { closed: true, .. })
                })
        });

        let mut best: Option<usize> = None;
        for &candidate in open.iter() {
            best = match best {
                Some(existing) if nodes[existing].f_cost() <= nodes[candidate].f_cost() => {
                    Some(existing)
                }
                _ => Some(candidate),
            };
        }
        best
    }

    fn reconstruct(&self, last: usize) -> Path {
        let mut steps = Vec::new();
        let mut cursor = Some(last);
        while let Some(index) = cursor {
            let node = &self.nodes[index];
            steps.push(node.position);
            cursor = node.parent;
        }
        steps.reverse();
        Path { steps }
    }
}
