#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Grid tessellations, randomized maze carving and maze solving.
//!
//! A [`Maze`] owns a [`grid::Grid`], carves a spanning tree of passages
//! through it with a randomized depth-first search, turns every remaining
//! edge into a collidable [`Wall`] and solves a path from the entrance cell to
//! the exit cell.

pub mod grid;
pub mod hex;
pub mod solve;

use std::collections::BTreeSet;

use learninator_core::{Vec2, Wall};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::grid::{CellIndex, Grid, HexGridConfig};

/// Construction parameters for a rectangular maze.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeConfig {
    /// Number of cell columns.
    pub x_count: u32,
    /// Number of cell rows.
    pub y_count: u32,
    /// Width of the maze in world units.
    pub width: f32,
    /// Height of the maze in world units.
    pub height: f32,
    /// Keep the outer boundary sealed; otherwise leave an entrance and an exit gap.
    pub closed: bool,
    /// Keep the solver path available for display.
    pub cheats: bool,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            x_count: 6,
            y_count: 6,
            width: 600.0,
            height: 600.0,
            closed: true,
            cheats: false,
        }
    }
}

/// Errors raised while rebuilding a maze from recorded passages.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MazeError {
    /// A recorded passage references cells that are missing or not adjacent.
    #[error("cells {first} and {second} cannot share a passage")]
    InvalidPassage {
        /// First cell of the passage.
        first: usize,
        /// Second cell of the passage.
        second: usize,
    },
}

/// Carved maze with its walls and entrance-to-exit solution.
#[derive(Clone, Debug)]
pub struct Maze {
    grid: Grid,
    closed: bool,
    walls: Vec<Wall>,
    start: CellIndex,
    end: CellIndex,
    solution: Vec<CellIndex>,
}

impl Maze {
    /// Carves a new rectangular maze.
    pub fn generate<R: Rng + ?Sized>(config: &MazeConfig, rng: &mut R) -> Self {
        let grid = Grid::square_with_counts(
            config.x_count,
            config.y_count,
            config.width,
            config.height,
            config.cheats,
        );
        Self::carve(grid, config.closed, rng)
    }

    /// Carves a new maze over a hexagonal tessellation.
    pub fn generate_hex<R: Rng + ?Sized>(config: &HexGridConfig, closed: bool, rng: &mut R) -> Self {
        Self::carve(Grid::hex(config), closed, rng)
    }

    /// Carves passages through an arbitrary grid, discarding previous passages.
    pub fn carve<R: Rng + ?Sized>(mut grid: Grid, closed: bool, rng: &mut R) -> Self {
        carve_spanning_tree(&mut grid, CellIndex::new(0), rng);
        Self::assemble(grid, closed)
    }

    /// Rebuilds a rectangular maze from previously carved passages.
    pub fn from_passages(config: &MazeConfig, passages: &[(usize, usize)]) -> Result<Self, MazeError> {
        let mut grid = Grid::square_with_counts(
            config.x_count,
            config.y_count,
            config.width,
            config.height,
            config.cheats,
        );
        for &(first, second) in passages {
            if !grid.remove_edge_between(CellIndex::new(first), CellIndex::new(second)) {
                return Err(MazeError::InvalidPassage { first, second });
            }
        }
        let indices: Vec<CellIndex> = grid.indices().collect();
        for index in indices {
            grid.mark_visited(index);
        }
        Ok(Self::assemble(grid, config.closed))
    }

    fn assemble(mut grid: Grid, closed: bool) -> Self {
        let start = CellIndex::new(0);
        let end = CellIndex::new(grid.len().saturating_sub(1));
        let walls = materialize_walls(&grid, closed, start, end);
        let solution = solve::solve(&mut grid, start, end);
        debug!(
            cells = grid.len(),
            passages = grid.carved_edge_count(),
            walls = walls.len(),
            solution = solution.len(),
            "maze assembled"
        );
        Self {
            grid,
            closed,
            walls,
            start,
            end,
            solution,
        }
    }

    /// Underlying tessellation with its carved passages.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Mutable access for population indexing.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    /// Whether the outer boundary is sealed.
    #[must_use]
    pub const fn closed(&self) -> bool {
        self.closed
    }

    /// Collidable wall segments, each boundary emitted once.
    #[must_use]
    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Entrance cell.
    #[must_use]
    pub const fn start(&self) -> CellIndex {
        self.start
    }

    /// Exit cell in the opposite corner.
    #[must_use]
    pub const fn end(&self) -> CellIndex {
        self.end
    }

    /// Path from entrance to exit found at assembly time; empty when unsolvable.
    #[must_use]
    pub fn solution(&self) -> &[CellIndex] {
        &self.solution
    }

    /// Runs the solver again between arbitrary cells.
    pub fn solve_between(&mut self, start: CellIndex, target: CellIndex) -> Vec<CellIndex> {
        solve::solve(&mut self.grid, start, target)
    }

    /// Carved passages as raw index pairs.
    #[must_use]
    pub fn passages(&self) -> Vec<(usize, usize)> {
        self.grid
            .removed_edges()
            .map(|(first, second)| (first.get(), second.get()))
            .collect()
    }

    /// Centre of the given cell, if it exists.
    #[must_use]
    pub fn cell_center(&self, index: CellIndex) -> Option<Vec2> {
        self.grid.cell(index).map(|cell| cell.center())
    }
}

/// Randomized depth-first carving with an explicit stack.
///
/// After the walk from `seed` finishes, any cell left unvisited starts a fresh
/// walk so that every cell ends up visited.
pub fn carve_spanning_tree<R: Rng + ?Sized>(grid: &mut Grid, seed: CellIndex, rng: &mut R) {
    grid.reset();
    if grid.is_empty() {
        return;
    }

    let mut stack: Vec<CellIndex> = Vec::new();
    walk_from(grid, seed, &mut stack, rng);

    let indices: Vec<CellIndex> = grid.indices().collect();
    for index in indices {
        let unvisited = grid.cell(index).is_some_and(|cell| !cell.visited());
        if unvisited {
            walk_from(grid, index, &mut stack, rng);
        }
    }
}

fn walk_from<R: Rng + ?Sized>(
    grid: &mut Grid,
    seed: CellIndex,
    stack: &mut Vec<CellIndex>,
    rng: &mut R,
) {
    let mut current = seed;
    grid.mark_visited(current);
    loop {
        let candidates = grid.unvisited_neighbors(current);
        if let Some(&next) = candidates.choose(rng) {
            stack.push(current);
            let _ = grid.remove_edge_between(current, next);
            grid.mark_visited(next);
            current = next;
        } else if let Some(previous) = stack.pop() {
            current = previous;
        } else {
            break;
        }
    }
}

/// Emits a wall for every intact edge and every outer boundary edge.
///
/// Shared edges are keyed by their unordered cell pair so each is emitted
/// once. When `closed` is false the outer edge furthest left on `start` and
/// the outer edge furthest right on `end` stay open.
#[must_use]
pub fn materialize_walls(grid: &Grid, closed: bool, start: CellIndex, end: CellIndex) -> Vec<Wall> {
    let mut walls = Vec::new();
    let mut drawn: BTreeSet<(CellIndex, CellIndex)> = BTreeSet::new();
    let entrance = if closed { None } else { outer_edge(grid, start, Side::Left) };
    let exit = if closed { None } else { outer_edge(grid, end, Side::Right) };

    for index in grid.indices() {
        let Some(cell) = grid.cell(index) else {
            continue;
        };
        let polygon = grid.polygon(index);
        for (corner, &from) in polygon.iter().enumerate() {
            let to = polygon[(corner + 1) % polygon.len()];
            match neighbor_across(grid, cell.center(), from, to) {
                Some(neighbor) if neighbor != index => {
                    let key = if index < neighbor {
                        (index, neighbor)
                    } else {
                        (neighbor, index)
                    };
                    if !drawn.insert(key) {
                        continue;
                    }
                    if grid.are_connected(index, neighbor) {
                        walls.push(Wall::new(from, to));
                    }
                }
                _ => {
                    let opening = (index, corner);
                    if entrance == Some(opening) || exit == Some(opening) {
                        continue;
                    }
                    walls.push(Wall::new(from, to));
                }
            }
        }
    }
    walls
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

fn neighbor_across(grid: &Grid, center: Vec2, from: Vec2, to: Vec2) -> Option<CellIndex> {
    let midpoint = (from + to) * 0.5;
    grid.cell_at_point(center + (midpoint - center) * 2.0)
}

fn outer_edge(grid: &Grid, index: CellIndex, side: Side) -> Option<(CellIndex, usize)> {
    let cell = grid.cell(index)?;
    let polygon = grid.polygon(index);
    let mut best: Option<(usize, f32)> = None;
    for (corner, &from) in polygon.iter().enumerate() {
        let to = polygon[(corner + 1) % polygon.len()];
        if neighbor_across(grid, cell.center(), from, to).is_some() {
            continue;
        }
        let x = (from.x + to.x) * 0.5;
        let better = match (best, side) {
            (None, _) => true,
            (Some((_, current)), Side::Left) => x < current,
            (Some((_, current)), Side::Right) => x > current,
        };
        if better {
            best = Some((corner, x));
        }
    }
    best.map(|(corner, _)| (index, corner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn maze(x_count: u32, y_count: u32, closed: bool, seed: u64) -> Maze {
        let config = MazeConfig {
            x_count,
            y_count,
            width: x_count as f32 * 100.0,
            height: y_count as f32 * 100.0,
            closed,
            cheats: false,
        };
        Maze::generate(&config, &mut ChaCha8Rng::seed_from_u64(seed))
    }

    #[test]
    fn six_by_six_carves_a_spanning_tree() {
        let maze = maze(6, 6, true, 7);
        assert_eq!(maze.grid().carved_edge_count(), 35);
        assert!(maze.grid().indices().all(|index| maze
            .grid()
            .cell(index)
            .is_some_and(|cell| cell.visited())));
    }

    #[test]
    fn solver_connects_entrance_and_exit() {
        let maze = maze(6, 6, true, 11);
        let path = maze.solution();
        assert_eq!(path.first().copied(), Some(maze.start()));
        assert_eq!(path.last().copied(), Some(maze.end()));
        for pair in path.windows(2) {
            assert!(maze.grid().is_passage(pair[0], pair[1]));
        }
    }

    #[test]
    fn closed_four_by_four_emits_each_edge_once() {
        let maze = maze(4, 4, true, 3);
        let interior_edges = 2 * 4 * 3;
        let intact = interior_edges - maze.grid().carved_edge_count();
        let boundary = 4 * 4;
        assert_eq!(maze.walls().len(), intact + boundary);

        let mut seen = BTreeSet::new();
        for wall in maze.walls() {
            let (a, b) = (wall.start(), wall.end());
            let key = if (a.x, a.y) <= (b.x, b.y) {
                (a.x as i64, a.y as i64, b.x as i64, b.y as i64)
            } else {
                (b.x as i64, b.y as i64, a.x as i64, a.y as i64)
            };
            assert!(seen.insert(key), "duplicate wall {wall:?}");
        }
    }

    #[test]
    fn open_maze_leaves_entrance_and_exit() {
        let closed = maze(4, 4, true, 5);
        let open = maze(4, 4, false, 5);
        assert_eq!(open.walls().len() + 2, closed.walls().len());
        let entrance_gap = Wall::new(Vec2::new(0.0, 100.0), Vec2::new(0.0, 0.0));
        assert!(!open.walls().contains(&entrance_gap));
        assert!(closed.walls().contains(&entrance_gap));
    }

    #[test]
    fn generation_is_deterministic_for_equal_seeds() {
        assert_eq!(maze(8, 5, true, 99).passages(), maze(8, 5, true, 99).passages());
    }

    #[test]
    fn hex_maze_is_fully_connected() {
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let maze = Maze::generate_hex(&HexGridConfig::default(), true, &mut rng);
        let cells = maze.grid().len();
        assert_eq!(maze.grid().carved_edge_count(), cells - 1);
        assert!(!maze.solution().is_empty());
    }

    #[test]
    fn passages_rebuild_identical_walls() {
        let original = maze(5, 5, true, 42);
        let config = MazeConfig {
            x_count: 5,
            y_count: 5,
            width: 500.0,
            height: 500.0,
            ..MazeConfig::default()
        };
        let rebuilt = Maze::from_passages(&config, &original.passages()).expect("valid passages");
        assert_eq!(rebuilt.walls(), original.walls());
        assert_eq!(rebuilt.solution(), original.solution());
    }

    #[test]
    fn invalid_passage_is_reported() {
        let error = Maze::from_passages(&MazeConfig::default(), &[(0, 7)]).unwrap_err();
        assert_eq!(error, MazeError::InvalidPassage { first: 0, second: 7 });
    }

    #[test]
    fn single_cell_maze_is_trivially_solved() {
        let maze = maze(1, 1, true, 1);
        assert_eq!(maze.walls().len(), 4);
        assert_eq!(maze.solution(), &[CellIndex::new(0)]);
    }
}
