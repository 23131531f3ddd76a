//! Breadth-first searches over the paved lane.

use std::collections::VecDeque;

use pathforge_core::CellCoord;

use crate::grid::TileGrid;

/// Dense hop-distance grid seeded from the lane exit.
///
/// Only path tiles (including both terminals) are traversable. Distances
/// default to `u16::MAX` for unreachable cells so callers can distinguish
/// open ground from lane tiles that cannot reach the exit.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct NavigationField {
    width: u32,
    height: u32,
    distances: Vec<u16>,
}

impl NavigationField {
    /// Rebuilds the distances using a reverse breadth-first search from the exit.
    pub(crate) fn rebuild(&mut self, grid: &TileGrid) {
        let cell_count = grid.tiles().len();
        if self.distances.len() != cell_count {
            self.distances = vec![u16::MAX; cell_count];
        } else {
            self.distances.fill(u16::MAX);
        }
        self.width = grid.columns();
        self.height = grid.rows();

        let exit = grid.end();
        let Some(exit_index) = grid.index(exit) else {
            return;
        };
        self.distances[exit_index] = 0;

        let mut queue = VecDeque::new();
        queue.push_back(exit);

        while let Some(cell) = queue.pop_front() {
            let Some(current_index) = grid.index(cell) else {
                continue;
            };
            let current_distance = self.distances[current_index];

            if current_distance >= u16::MAX.saturating_sub(1) {
                continue;
            }

            let next_distance = current_distance + 1;

            for neighbor in grid.neighbors(cell) {
                if !grid.tile(neighbor).is_some_and(|tile| tile.is_path()) {
                    continue;
                }

                let Some(neighbor_index) = grid.index(neighbor) else {
                    continue;
                };

                if self.distances[neighbor_index] <= next_distance {
                    continue;
                }

                self.distances[neighbor_index] = next_distance;
                queue.push_back(neighbor);
            }
        }
    }

    /// Hop distance to the exit, or `None` when the cell cannot reach it.
    #[must_use]
    pub(crate) fn distance(&self, cell: CellCoord) -> Option<u16> {
        if cell.column() >= self.width || cell.row() >= self.height {
            return None;
        }

        let width = usize::try_from(self.width).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let row = usize::try_from(cell.row()).ok()?;
        let offset = row.checked_mul(width)?.checked_add(column)?;
        self.distances
            .get(offset)
            .copied()
            .filter(|distance| *distance != u16::MAX)
    }
}

/// Marks every path tile reachable from `origin` through path tiles.
pub(crate) fn flood_from(grid: &TileGrid, origin: CellCoord) -> Vec<bool> {
    let mut reached = vec![false; grid.tiles().len()];
    let Some(origin_index) = grid.index(origin) else {
        return reached;
    };
    if !grid.tile(origin).is_some_and(|tile| tile.is_path()) {
        return reached;
    }

    reached[origin_index] = true;
    let mut queue = VecDeque::from([origin]);

    while let Some(cell) = queue.pop_front() {
        for neighbor in grid.neighbors(cell) {
            if !grid.tile(neighbor).is_some_and(|tile| tile.is_path()) {
                continue;
            }
            let Some(index) = grid.index(neighbor) else {
                continue;
            };
            if reached[index] {
                continue;
            }
            reached[index] = true;
            queue.push_back(neighbor);
        }
    }

    reached
}

/// Traces the lane from start to end when it forms a simple chain.
///
/// Every reachable path tile must have exactly two path neighbours, except the
/// terminals which must have exactly one.
pub(crate) fn trace_chain(grid: &TileGrid, reached: &[bool]) -> Option<Vec<CellCoord>> {
    let end_index = grid.index(grid.end())?;
    if !reached.get(end_index).copied().unwrap_or(false) {
        return None;
    }

    let path_degree = |cell: CellCoord| {
        grid.neighbors(cell)
            .filter(|neighbor| grid.tile(*neighbor).is_some_and(|tile| tile.is_path()))
            .count()
    };

    for (index, is_reached) in reached.iter().enumerate() {
        if !is_reached {
            continue;
        }
        let index = u32::try_from(index).ok()?;
        let cell = CellCoord::new(index % grid.columns(), index / grid.columns());
        let expected = if cell == grid.start() || cell == grid.end() {
            1
        } else {
            2
        };
        if path_degree(cell) != expected {
            return None;
        }
    }

    let mut chain = vec![grid.start()];
    let mut previous: Option<CellCoord> = None;
    let mut current = grid.start();

    while current != grid.end() {
        if chain.len() > reached.len() {
            return None;
        }
        let next = grid.neighbors(current).find(|neighbor| {
            Some(*neighbor) != previous
                && grid.tile(*neighbor).is_some_and(|tile| tile.is_path())
        })?;
        previous = Some(current);
        current = next;
        chain.push(current);
    }

    Some(chain)
}
