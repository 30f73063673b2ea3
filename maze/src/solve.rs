//! Greedy best-first search through carved passages.

use std::collections::BTreeSet;

use crate::grid::{CellIndex, Grid};

/// Finds a path from `start` to `target` through carved passages.
///
/// Each open cell is ranked by the length of its backpointer chain plus the
/// straight-line distance to the target; the lowest rank is expanded next.
/// The result runs from `start` to `target` inclusive and is a valid path,
/// not necessarily the shortest one. An empty result means the target is
/// unreachable.
pub fn solve(grid: &mut Grid, start: CellIndex, target: CellIndex) -> Vec<CellIndex> {
    grid.reset_search();
    if grid.cell(start).is_none() || grid.cell(target).is_none() {
        return Vec::new();
    }

    let mut open: Vec<CellIndex> = Vec::new();
    let mut closed: BTreeSet<CellIndex> = BTreeSet::new();
    let mut current = start;

    loop {
        let _ = closed.insert(current);
        if current == target {
            break;
        }

        for neighbor in grid.disconnected_neighbors(current) {
            if closed.contains(&neighbor) || open.contains(&neighbor) {
                continue;
            }
            let travelled = path_length(grid, current) + grid.cell_distance(current, neighbor);
            let heuristic = travelled + grid.cell_distance(neighbor, target);
            grid.set_search_step(neighbor, current, heuristic);
            open.push(neighbor);
        }

        let Some(best) = lowest_heuristic(grid, &open) else {
            return Vec::new();
        };
        current = open.remove(best);
    }

    let mut path = vec![target];
    let mut cursor = target;
    while let Some(parent) = grid.cell(cursor).and_then(|cell| cell.parent()) {
        path.push(parent);
        cursor = parent;
    }
    path.reverse();
    path
}

fn path_length(grid: &Grid, from: CellIndex) -> f32 {
    let mut length = 0.0;
    let mut cursor = from;
    while let Some(parent) = grid.cell(cursor).and_then(|cell| cell.parent()) {
        length += grid.cell_distance(cursor, parent);
        cursor = parent;
    }
    length
}

fn lowest_heuristic(grid: &Grid, open: &[CellIndex]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (position, index) in open.iter().enumerate() {
        let heuristic = grid
            .cell(*index)
            .map_or(f32::INFINITY, |cell| cell.heuristic());
        match best {
            Some((_, lowest)) if heuristic >= lowest => {}
            _ => best = Some((position, heuristic)),
        }
    }
    best.map(|(position, _)| position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor(length: u32) -> Grid {
        let mut grid = Grid::square_with_counts(length, 1, length as f32, 1.0, false);
        for index in 1..length as usize {
            assert!(grid.remove_edge_between(CellIndex::new(index - 1), CellIndex::new(index)));
        }
        grid
    }

    #[test]
    fn walks_a_corridor_end_to_end() {
        let mut grid = corridor(5);
        let path = solve(&mut grid, CellIndex::new(0), CellIndex::new(4));
        let raw: Vec<usize> = path.iter().map(CellIndex::get).collect();
        assert_eq!(raw, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn start_equal_to_target_yields_single_cell() {
        let mut grid = corridor(3);
        let path = solve(&mut grid, CellIndex::new(1), CellIndex::new(1));
        assert_eq!(path, vec![CellIndex::new(1)]);
    }

    #[test]
    fn unreachable_target_yields_empty_path() {
        let mut grid = Grid::square_with_counts(3, 1, 3.0, 1.0, false);
        assert!(grid.remove_edge_between(CellIndex::new(0), CellIndex::new(1)));
        let path = solve(&mut grid, CellIndex::new(0), CellIndex::new(2));
        assert!(path.is_empty());
    }

    #[test]
    fn backpointers_follow_the_returned_path() {
        let mut grid = corridor(4);
        let path = solve(&mut grid, CellIndex::new(0), CellIndex::new(3));
        for pair in path.windows(2) {
            let parent = grid.cell(pair[1]).and_then(|cell| cell.parent());
            assert_eq!(parent, Some(pair[0]));
        }
    }
}
