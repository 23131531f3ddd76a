//! Tile grid storage and procedural layout generation.

use pathforge_core::{CellCoord, TileKind};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Parameters controlling procedural grid generation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridConfig {
    /// Number of columns.
    pub columns: u32,
    /// Number of rows.
    pub rows: u32,
    /// Probability that an empty cell becomes a rock.
    pub rock_rate: f32,
    /// Seed for rock and overlay placement.
    pub seed: u64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            columns: 22,
            rows: 12,
            rock_rate: 0.06,
            seed: 0,
        }
    }
}

/// Dense row-major grid of tiles with relic and rune overlays.
#[derive(Clone, Debug, PartialEq)]
pub struct TileGrid {
    columns: u32,
    rows: u32,
    tiles: Vec<TileKind>,
    start: CellCoord,
    end: CellCoord,
    relics: Vec<CellCoord>,
    runes: Vec<CellCoord>,
}

impl TileGrid {
    /// Creates an empty grid with terminals on the middle row.
    ///
    /// Dimensions are clamped to at least four columns and one row so both
    /// terminals fit.
    #[must_use]
    pub fn blank(columns: u32, rows: u32) -> Self {
        let columns = columns.max(4);
        let rows = rows.max(1);
        let count = columns as usize * rows as usize;
        let start = CellCoord::new(1, rows / 2);
        let end = CellCoord::new(columns - 2, rows / 2);
        let mut grid = Self {
            columns,
            rows,
            tiles: vec![TileKind::Empty; count],
            start,
            end,
            relics: Vec::new(),
            runes: Vec::new(),
        };
        let _ = grid.set(start, TileKind::Start);
        let _ = grid.set(end, TileKind::End);
        grid
    }

    /// Generates a grid with rocks, relics and runes from a seed.
    #[must_use]
    pub fn generate(config: &GridConfig) -> Self {
        let mut grid = Self::blank(config.columns, config.rows);
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let (columns, rows) = (grid.columns, grid.rows);

        for row in 0..rows {
            for column in 0..columns {
                let cell = CellCoord::new(column, row);
                if grid.tile(cell) == Some(TileKind::Empty) && rng.gen::<f32>() < config.rock_rate
                {
                    let _ = grid.set(cell, TileKind::Rock);
                }
            }
        }

        for terminal in [grid.start, grid.end] {
            for row in terminal.row().saturating_sub(2)..=terminal.row() + 2 {
                for column in terminal.column().saturating_sub(2)..=terminal.column() + 2 {
                    let cell = CellCoord::new(column, row);
                    if grid.tile(cell) == Some(TileKind::Rock) {
                        let _ = grid.set(cell, TileKind::Empty);
                    }
                }
            }
        }

        if columns >= 7 && rows >= 5 {
            let attempts = (columns / 8).max(2);
            for _ in 0..attempts {
                let cell = CellCoord::new(
                    rng.gen_range(3..=columns - 4),
                    rng.gen_range(2..=rows - 3),
                );
                if grid.tile(cell) == Some(TileKind::Empty) && !grid.has_relic(cell) {
                    grid.relics.push(cell);
                }
            }
        }

        if columns >= 9 && rows >= 7 {
            let mut wanted = 0;
            if rng.gen::<f32>() < 0.12 {
                wanted += 1;
                if rng.gen::<f32>() < 0.03 {
                    wanted += 1;
                }
            }
            let mut tries = 0;
            while grid.runes.len() < wanted && tries < 80 {
                tries += 1;
                let cell = CellCoord::new(
                    rng.gen_range(4..=columns - 5),
                    rng.gen_range(3..=rows - 4),
                );
                let clear = grid.tile(cell) == Some(TileKind::Empty)
                    && !grid.has_relic(cell)
                    && !grid.has_rune(cell)
                    && cell.manhattan_distance(grid.start) >= 6
                    && cell.manhattan_distance(grid.end) >= 6;
                if clear {
                    grid.runes.push(cell);
                }
            }
        }

        grid
    }

    /// Reassembles a grid from persisted parts, validating its invariants.
    #[must_use]
    pub fn from_parts(
        columns: u32,
        rows: u32,
        tiles: Vec<TileKind>,
        relics: Vec<CellCoord>,
        runes: Vec<CellCoord>,
    ) -> Option<Self> {
        if columns == 0 || rows == 0 || tiles.len() != columns as usize * rows as usize {
            return None;
        }

        let locate = |wanted: TileKind| {
            let mut found = tiles
                .iter()
                .enumerate()
                .filter(|(_, tile)| **tile == wanted)
                .map(|(index, _)| index);
            let first = found.next()?;
            if found.next().is_some() {
                return None;
            }
            let index = u32::try_from(first).ok()?;
            Some(CellCoord::new(index % columns, index / columns))
        };
        let start = locate(TileKind::Start)?;
        let end = locate(TileKind::End)?;

        let grid = Self {
            columns,
            rows,
            tiles,
            start,
            end,
            relics,
            runes,
        };
        let overlays_valid = grid
            .relics
            .iter()
            .chain(grid.runes.iter())
            .all(|cell| grid.contains(*cell))
            && !grid.relics.iter().any(|cell| grid.runes.contains(cell));
        overlays_valid.then_some(grid)
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Lane entrance.
    #[must_use]
    pub const fn start(&self) -> CellCoord {
        self.start
    }

    /// Lane exit.
    #[must_use]
    pub const fn end(&self) -> CellCoord {
        self.end
    }

    /// Relic overlay cells.
    #[must_use]
    pub fn relics(&self) -> &[CellCoord] {
        &self.relics
    }

    /// Rune overlay cells.
    #[must_use]
    pub fn runes(&self) -> &[CellCoord] {
        &self.runes
    }

    /// Tiles in row-major order.
    #[must_use]
    pub fn tiles(&self) -> &[TileKind] {
        &self.tiles
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Tile stored at the cell.
    #[must_use]
    pub fn tile(&self, cell: CellCoord) -> Option<TileKind> {
        self.index(cell).map(|index| self.tiles[index])
    }

    /// Reports whether a relic overlay sits on the cell.
    #[must_use]
    pub fn has_relic(&self, cell: CellCoord) -> bool {
        self.relics.contains(&cell)
    }

    /// Reports whether a rune overlay sits on the cell.
    #[must_use]
    pub fn has_rune(&self, cell: CellCoord) -> bool {
        self.runes.contains(&cell)
    }

    /// Adds a rune overlay, refusing cells that already carry an overlay.
    pub fn add_rune(&mut self, cell: CellCoord) -> bool {
        if !self.contains(cell) || self.has_relic(cell) || self.has_rune(cell) {
            return false;
        }
        self.runes.push(cell);
        true
    }

    /// Adds a relic overlay, refusing cells that already carry an overlay.
    pub fn add_relic(&mut self, cell: CellCoord) -> bool {
        if !self.contains(cell) || self.has_relic(cell) || self.has_rune(cell) {
            return false;
        }
        self.relics.push(cell);
        true
    }

    /// In-bounds orthogonal neighbours in east, west, south, north order.
    pub fn neighbors(&self, cell: CellCoord) -> impl Iterator<Item = CellCoord> {
        let (columns, rows) = (self.columns, self.rows);
        let offsets: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        offsets.into_iter().filter_map(move |(dx, dy)| {
            let column = i64::from(cell.column()) + dx;
            let row = i64::from(cell.row()) + dy;
            if column < 0 || row < 0 || column >= i64::from(columns) || row >= i64::from(rows) {
                return None;
            }
            Some(CellCoord::new(column as u32, row as u32))
        })
    }

    pub(crate) fn set(&mut self, cell: CellCoord, kind: TileKind) -> bool {
        match self.index(cell) {
            Some(index) => {
                self.tiles[index] = kind;
                true
            }
            None => false,
        }
    }

    pub(crate) fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.contains(cell) {
            return None;
        }
        let width = usize::try_from(self.columns).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let row = usize::try_from(cell.row()).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_grid_places_terminals_on_middle_row() {
        let grid = TileGrid::blank(10, 8);
        assert_eq!(grid.start(), CellCoord::new(1, 4));
        assert_eq!(grid.end(), CellCoord::new(8, 4));
        assert_eq!(grid.tile(grid.start()), Some(TileKind::Start));
        assert_eq!(grid.tile(grid.end()), Some(TileKind::End));
        assert_eq!(grid.tile(CellCoord::new(10, 0)), None);
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let config = GridConfig {
            seed: 99,
            rock_rate: 0.2,
            ..GridConfig::default()
        };
        assert_eq!(TileGrid::generate(&config), TileGrid::generate(&config));
    }

    #[test]
    fn generation_keeps_terminal_surroundings_clear() {
        for seed in 0..16 {
            let grid = TileGrid::generate(&GridConfig {
                seed,
                rock_rate: 0.9,
                ..GridConfig::default()
            });
            for terminal in [grid.start(), grid.end()] {
                for cell in grid.neighbors(terminal) {
                    assert_ne!(grid.tile(cell), Some(TileKind::Rock), "seed {seed}");
                }
            }
        }
    }

    #[test]
    fn overlays_never_coincide() {
        for seed in 0..64 {
            let grid = TileGrid::generate(&GridConfig {
                seed,
                ..GridConfig::default()
            });
            for rune in grid.runes() {
                assert!(!grid.has_relic(*rune));
                assert!(rune.manhattan_distance(grid.start()) >= 6);
            }
            let mut relics = grid.relics().to_vec();
            relics.dedup();
            assert_eq!(relics.len(), grid.relics().len());
        }
    }

    #[test]
    fn from_parts_rejects_duplicate_terminals() {
        let grid = TileGrid::blank(6, 3);
        let mut tiles = grid.tiles().to_vec();
        tiles[0] = TileKind::Start;
        assert!(TileGrid::from_parts(6, 3, tiles, Vec::new(), Vec::new()).is_none());
        let rebuilt = TileGrid::from_parts(6, 3, grid.tiles().to_vec(), Vec::new(), Vec::new());
        assert_eq!(rebuilt, Some(grid));
    }

    #[test]
    fn neighbors_follow_east_west_south_north_order() {
        let grid = TileGrid::blank(5, 5);
        let around: Vec<_> = grid.neighbors(CellCoord::new(2, 2)).collect();
        assert_eq!(
            around,
            vec![
                CellCoord::new(3, 2),
                CellCoord::new(1, 2),
                CellCoord::new(2, 3),
                CellCoord::new(2, 1),
            ]
        );
        assert_eq!(grid.neighbors(CellCoord::new(0, 0)).count(), 2);
    }
}
