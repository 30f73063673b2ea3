//! Square and hexagonal cell tessellations with a carved-passage edge set.
//!
//! Two grid-adjacent cells share an edge. While the edge is intact the cells
//! are *connected* and a wall separates them; once the edge is recorded in the
//! removed-edge set the cells are *disconnected* and a passage joins them.

use std::collections::{BTreeSet, HashMap};

use learninator_core::{Occupant, Vec2};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::hex::{Hex, HexLayout, Orientation};

const SQRT_3: f32 = 1.732_050_8;

/// Dense index of a cell inside its grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellIndex(usize);

impl CellIndex {
    /// Wraps a raw index.
    #[must_use]
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    /// Raw index into the grid's cell storage.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }
}

/// Address of a cell in its tessellation's native coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellCoord {
    /// Column and row of a square cell.
    Square {
        /// Zero-based column index.
        column: u32,
        /// Zero-based row index.
        row: u32,
    },
    /// Cube coordinates of a hexagonal cell.
    Hex(Hex),
}

/// Single addressable cell with search bookkeeping and an occupancy index.
#[derive(Clone, Debug)]
pub struct Cell {
    coord: CellCoord,
    center: Vec2,
    visited: bool,
    parent: Option<CellIndex>,
    heuristic: f32,
    population: BTreeSet<Occupant>,
}

impl Cell {
    fn new(coord: CellCoord, center: Vec2) -> Self {
        Self {
            coord,
            center,
            visited: false,
            parent: None,
            heuristic: 0.0,
            population: BTreeSet::new(),
        }
    }

    /// Native coordinates of the cell.
    #[must_use]
    pub const fn coord(&self) -> CellCoord {
        self.coord
    }

    /// Centre of the cell in world units.
    #[must_use]
    pub const fn center(&self) -> Vec2 {
        self.center
    }

    /// Whether the maze generator has reached the cell.
    #[must_use]
    pub const fn visited(&self) -> bool {
        self.visited
    }

    /// Search backpointer set by the solver.
    #[must_use]
    pub const fn parent(&self) -> Option<CellIndex> {
        self.parent
    }

    /// Priority assigned by the solver.
    #[must_use]
    pub const fn heuristic(&self) -> f32 {
        self.heuristic
    }

    /// Entities whose centre currently lies inside the cell.
    #[must_use]
    pub fn population(&self) -> &BTreeSet<Occupant> {
        &self.population
    }
}

/// Construction parameters for a square grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Width of the covered area in world units.
    pub width: f32,
    /// Height of the covered area in world units.
    pub height: f32,
    /// Side length of a square cell.
    pub cell_size: f32,
    /// Keep the solver path available for display.
    pub cheats: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 600.0,
            cell_size: 100.0,
            cheats: false,
        }
    }
}

/// Construction parameters for a hexagonal grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HexGridConfig {
    /// Width of the covered area in world units.
    pub width: f32,
    /// Height of the covered area in world units.
    pub height: f32,
    /// Circumradius of a single hex.
    pub tile_size: f32,
    /// Lay hexes out with a corner pointing up.
    pub pointy_tiles: bool,
    /// Keep the solver path available for display.
    pub cheats: bool,
}

impl Default for HexGridConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 600.0,
            tile_size: 40.0,
            pointy_tiles: true,
            cheats: false,
        }
    }
}

#[derive(Clone, Debug)]
enum Shape {
    Square {
        columns: u32,
        rows: u32,
        cell_width: f32,
        cell_height: f32,
    },
    Hex {
        layout: HexLayout,
        lookup: HashMap<Hex, CellIndex>,
    },
}

/// Bounded tessellation of cells plus the set of carved passages.
#[derive(Clone, Debug)]
pub struct Grid {
    shape: Shape,
    cells: Vec<Cell>,
    removed_edges: BTreeSet<(CellIndex, CellIndex)>,
    width: f32,
    height: f32,
    cheats: bool,
}

impl Grid {
    /// Tessellates the configured area into square cells of `cell_size`.
    #[must_use]
    pub fn square(config: &GridConfig) -> Self {
        let defaults = GridConfig::default();
        let width = positive_or(config.width, defaults.width, "grid.width");
        let height = positive_or(config.height, defaults.height, "grid.height");
        let cell_size = positive_or(config.cell_size, defaults.cell_size, "grid.cell_size");
        let columns = ((width / cell_size).floor() as u32).max(1);
        let rows = ((height / cell_size).floor() as u32).max(1);
        Self::square_cells(columns, rows, cell_size, cell_size, width, height, config.cheats)
    }

    /// Splits the area into exactly `columns` by `rows` rectangular cells.
    #[must_use]
    pub fn square_with_counts(
        columns: u32,
        rows: u32,
        width: f32,
        height: f32,
        cheats: bool,
    ) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let width = positive_or(width, columns as f32, "maze.width");
        let height = positive_or(height, rows as f32, "maze.height");
        Self::square_cells(
            columns,
            rows,
            width / columns as f32,
            height / rows as f32,
            width,
            height,
            cheats,
        )
    }

    fn square_cells(
        columns: u32,
        rows: u32,
        cell_width: f32,
        cell_height: f32,
        width: f32,
        height: f32,
        cheats: bool,
    ) -> Self {
        let mut cells = Vec::with_capacity(columns as usize * rows as usize);
        for row in 0..rows {
            for column in 0..columns {
                let center = Vec2::new(
                    (column as f32 + 0.5) * cell_width,
                    (row as f32 + 0.5) * cell_height,
                );
                cells.push(Cell::new(CellCoord::Square { column, row }, center));
            }
        }
        Self {
            shape: Shape::Square {
                columns,
                rows,
                cell_width,
                cell_height,
            },
            cells,
            removed_edges: BTreeSet::new(),
            width,
            height,
            cheats,
        }
    }

    /// Tessellates the configured area into a rectangle of hexagons.
    #[must_use]
    pub fn hex(config: &HexGridConfig) -> Self {
        let defaults = HexGridConfig::default();
        let width = positive_or(config.width, defaults.width, "hex.width");
        let height = positive_or(config.height, defaults.height, "hex.height");
        let size = positive_or(config.tile_size, defaults.tile_size, "hex.tile_size");

        let (orientation, columns, rows, origin) = if config.pointy_tiles {
            let columns = (width / (SQRT_3 * size) - 0.5).floor().max(1.0) as i32;
            let rows = ((height - 0.5 * size) / (1.5 * size)).floor().max(1.0) as i32;
            (
                Orientation::Pointy,
                columns,
                rows,
                Vec2::new(SQRT_3 / 2.0 * size, size),
            )
        } else {
            let columns = ((width - 0.5 * size) / (1.5 * size)).floor().max(1.0) as i32;
            let rows = (height / (SQRT_3 * size) - 0.5).floor().max(1.0) as i32;
            (
                Orientation::Flat,
                columns,
                rows,
                Vec2::new(size, SQRT_3 / 2.0 * size),
            )
        };
        let layout = HexLayout::new(orientation, size, origin);

        let mut cells = Vec::new();
        let mut lookup = HashMap::new();
        for row in 0..rows {
            for column in 0..columns {
                let hex = match orientation {
                    Orientation::Pointy => Hex::new(column - (row - (row & 1)) / 2, row),
                    Orientation::Flat => Hex::new(column, row - (column - (column & 1)) / 2),
                };
                let _ = lookup.insert(hex, CellIndex(cells.len()));
                cells.push(Cell::new(CellCoord::Hex(hex), layout.to_pixel(hex)));
            }
        }

        Self {
            shape: Shape::Hex { layout, lookup },
            cells,
            removed_edges: BTreeSet::new(),
            width,
            height,
            cheats: config.cheats,
        }
    }

    /// Width of the covered area.
    #[must_use]
    pub const fn width(&self) -> f32 {
        self.width
    }

    /// Height of the covered area.
    #[must_use]
    pub const fn height(&self) -> f32 {
        self.height
    }

    /// Whether the solver path should be exposed for display.
    #[must_use]
    pub const fn cheats(&self) -> bool {
        self.cheats
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the grid holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterator over every cell index in storage order.
    pub fn indices(&self) -> impl Iterator<Item = CellIndex> {
        (0..self.cells.len()).map(CellIndex)
    }

    /// Cell stored at `index`, if it exists.
    #[must_use]
    pub fn cell(&self, index: CellIndex) -> Option<&Cell> {
        self.cells.get(index.0)
    }

    /// Bounds-checked lookup by native coordinates.
    #[must_use]
    pub fn cell_at(&self, coord: CellCoord) -> Option<CellIndex> {
        match (coord, &self.shape) {
            (CellCoord::Square { column, row }, Shape::Square { columns, rows, .. }) => {
                if column < *columns && row < *rows {
                    Some(CellIndex((row * columns + column) as usize))
                } else {
                    None
                }
            }
            (CellCoord::Hex(hex), Shape::Hex { lookup, .. }) => lookup.get(&hex).copied(),
            _ => None,
        }
    }

    /// Cell containing `point`, if the point lies inside the grid.
    #[must_use]
    pub fn cell_at_point(&self, point: Vec2) -> Option<CellIndex> {
        if !point.is_finite() {
            return None;
        }
        match &self.shape {
            Shape::Square {
                cell_width,
                cell_height,
                ..
            } => {
                if point.x < 0.0 || point.y < 0.0 {
                    return None;
                }
                let column = (point.x / cell_width).floor() as u32;
                let row = (point.y / cell_height).floor() as u32;
                self.cell_at(CellCoord::Square { column, row })
            }
            Shape::Hex { layout, lookup } => {
                lookup.get(&layout.from_pixel(point).round()).copied()
            }
        }
    }

    /// Grid-adjacent cells, omitting out-of-bounds positions.
    #[must_use]
    pub fn neighbors(&self, index: CellIndex) -> Vec<CellIndex> {
        let Some(cell) = self.cells.get(index.0) else {
            return Vec::new();
        };
        match cell.coord {
            CellCoord::Square { column, row } => {
                let mut candidates = Vec::with_capacity(4);
                if let Some(north) = row.checked_sub(1) {
                    candidates.push(CellCoord::Square { column, row: north });
                }
                candidates.push(CellCoord::Square {
                    column: column + 1,
                    row,
                });
                candidates.push(CellCoord::Square {
                    column,
                    row: row + 1,
                });
                if let Some(west) = column.checked_sub(1) {
                    candidates.push(CellCoord::Square { column: west, row });
                }
                candidates
                    .into_iter()
                    .filter_map(|coord| self.cell_at(coord))
                    .collect()
            }
            CellCoord::Hex(hex) => hex
                .neighbors()
                .into_iter()
                .filter_map(|neighbor| self.cell_at(CellCoord::Hex(neighbor)))
                .collect(),
        }
    }

    /// Whether the two cells share an edge.
    #[must_use]
    pub fn are_adjacent(&self, first: CellIndex, second: CellIndex) -> bool {
        let (Some(a), Some(b)) = (self.cells.get(first.0), self.cells.get(second.0)) else {
            return false;
        };
        match (a.coord, b.coord) {
            (
                CellCoord::Square { column, row },
                CellCoord::Square {
                    column: other_column,
                    row: other_row,
                },
            ) => column.abs_diff(other_column) + row.abs_diff(other_row) == 1,
            (CellCoord::Hex(hex), CellCoord::Hex(other)) => hex.distance(other) == 1,
            _ => false,
        }
    }

    /// True iff the cells are adjacent and the edge between them is intact.
    #[must_use]
    pub fn are_connected(&self, first: CellIndex, second: CellIndex) -> bool {
        self.are_adjacent(first, second) && !self.removed_edges.contains(&edge(first, second))
    }

    /// True iff the cells are adjacent and a passage was carved between them.
    #[must_use]
    pub fn is_passage(&self, first: CellIndex, second: CellIndex) -> bool {
        self.are_adjacent(first, second) && self.removed_edges.contains(&edge(first, second))
    }

    /// Neighbours still separated from `index` by an intact edge.
    #[must_use]
    pub fn connected_neighbors(&self, index: CellIndex) -> Vec<CellIndex> {
        self.neighbors(index)
            .into_iter()
            .filter(|neighbor| self.are_connected(index, *neighbor))
            .collect()
    }

    /// Neighbours reachable from `index` through a carved passage.
    #[must_use]
    pub fn disconnected_neighbors(&self, index: CellIndex) -> Vec<CellIndex> {
        self.neighbors(index)
            .into_iter()
            .filter(|neighbor| !self.are_connected(index, *neighbor))
            .collect()
    }

    /// Connected neighbours the generator has not visited yet.
    #[must_use]
    pub fn unvisited_neighbors(&self, index: CellIndex) -> Vec<CellIndex> {
        self.connected_neighbors(index)
            .into_iter()
            .filter(|neighbor| !self.cells[neighbor.0].visited)
            .collect()
    }

    /// Records a carved passage; returns `false` when the cells are not adjacent.
    pub fn remove_edge_between(&mut self, first: CellIndex, second: CellIndex) -> bool {
        if !self.are_adjacent(first, second) {
            return false;
        }
        let _ = self.removed_edges.insert(edge(first, second));
        true
    }

    /// Carved passages as unordered index pairs, smaller index first.
    pub fn removed_edges(&self) -> impl Iterator<Item = (CellIndex, CellIndex)> + '_ {
        self.removed_edges.iter().copied()
    }

    /// Number of carved passages.
    #[must_use]
    pub fn carved_edge_count(&self) -> usize {
        self.removed_edges.len()
    }

    /// Euclidean distance between two cell centres.
    #[must_use]
    pub fn cell_distance(&self, first: CellIndex, second: CellIndex) -> f32 {
        match (self.cells.get(first.0), self.cells.get(second.0)) {
            (Some(a), Some(b)) => a.center.distance(b.center),
            _ => f32::INFINITY,
        }
    }

    /// Outline of the cell, corners in winding order.
    #[must_use]
    pub fn polygon(&self, index: CellIndex) -> Vec<Vec2> {
        let Some(cell) = self.cells.get(index.0) else {
            return Vec::new();
        };
        match (&self.shape, cell.coord) {
            (
                Shape::Square {
                    cell_width,
                    cell_height,
                    ..
                },
                CellCoord::Square { column, row },
            ) => {
                let left = column as f32 * cell_width;
                let top = row as f32 * cell_height;
                let right = left + cell_width;
                let bottom = top + cell_height;
                vec![
                    Vec2::new(left, top),
                    Vec2::new(right, top),
                    Vec2::new(right, bottom),
                    Vec2::new(left, bottom),
                ]
            }
            (Shape::Hex { layout, .. }, CellCoord::Hex(hex)) => layout.corners(hex).to_vec(),
            _ => Vec::new(),
        }
    }

    /// Clears carved passages and all search state for re-generation.
    pub fn reset(&mut self) {
        self.removed_edges.clear();
        for cell in &mut self.cells {
            cell.visited = false;
            cell.parent = None;
            cell.heuristic = 0.0;
        }
    }

    /// Clears solver backpointers and priorities.
    pub fn reset_search(&mut self) {
        for cell in &mut self.cells {
            cell.parent = None;
            cell.heuristic = 0.0;
        }
    }

    /// Empties every cell's population index.
    pub fn clear_population(&mut self) {
        for cell in &mut self.cells {
            cell.population.clear();
        }
    }

    /// Records `occupant` in the cell containing `point`.
    pub fn populate(&mut self, point: Vec2, occupant: Occupant) -> Option<CellIndex> {
        let index = self.cell_at_point(point)?;
        let _ = self.cells[index.0].population.insert(occupant);
        Some(index)
    }

    /// Cells whose population index is empty.
    #[must_use]
    pub fn vacant_cells(&self) -> Vec<CellIndex> {
        self.indices()
            .filter(|index| self.cells[index.0].population.is_empty())
            .collect()
    }

    pub(crate) fn mark_visited(&mut self, index: CellIndex) {
        if let Some(cell) = self.cells.get_mut(index.0) {
            cell.visited = true;
        }
    }

    pub(crate) fn set_search_step(&mut self, index: CellIndex, parent: CellIndex, heuristic: f32) {
        if let Some(cell) = self.cells.get_mut(index.0) {
            cell.parent = Some(parent);
            cell.heuristic = heuristic;
        }
    }
}

fn edge(first: CellIndex, second: CellIndex) -> (CellIndex, CellIndex) {
    if first <= second {
        (first, second)
    } else {
        (second, first)
    }
}

fn positive_or(value: f32, fallback: f32, field: &'static str) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        warn!(field, value, fallback, "invalid grid dimension, using default");
        fallback
    }
}
