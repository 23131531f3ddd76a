//! Lane topology: the tile grid plus its lazily derived path caches.

use std::sync::Arc;

use pathforge_core::{BuildError, CellCoord, PathVariant, TileKind};
use rand::Rng;

use crate::{
    grid::TileGrid,
    navigation::{flood_from, trace_chain, NavigationField},
};

/// Derived state recomputed on demand after any grid mutation.
#[derive(Clone, Debug, Default)]
struct PathCaches {
    distances: Option<NavigationField>,
    chain: Option<Option<Arc<[CellCoord]>>>,
    reachable: Option<Vec<bool>>,
    powered_runes: Option<Vec<CellCoord>>,
}

/// Owns the tile grid and keeps every path cache consistent with it.
///
/// All grid writes go through this type and clear the four caches
/// unconditionally; each cache is rebuilt on its next read.
#[derive(Clone, Debug)]
pub struct GridTopology {
    grid: TileGrid,
    caches: PathCaches,
}

impl GridTopology {
    /// Wraps a grid with empty caches.
    #[must_use]
    pub fn new(grid: TileGrid) -> Self {
        Self {
            grid,
            caches: PathCaches::default(),
        }
    }

    /// Underlying tile grid.
    #[must_use]
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    /// Tile stored at the cell.
    #[must_use]
    pub fn tile(&self, cell: CellCoord) -> Option<TileKind> {
        self.grid.tile(cell)
    }

    /// Paves a lane tile, returning `false` when the build is not allowed.
    pub fn build(&mut self, cell: CellCoord, variant: PathVariant) -> bool {
        self.try_build(cell, variant, false).is_ok()
    }

    /// Validates a build without mutating anything.
    pub fn check_build(
        &self,
        cell: CellCoord,
        variant: PathVariant,
        allow_rock: bool,
    ) -> Result<(), BuildError> {
        match self.grid.tile(cell) {
            None => Err(BuildError::OutOfBounds),
            Some(TileKind::Start | TileKind::End) => Err(BuildError::Terminal),
            Some(TileKind::Tower) => Err(BuildError::Tower),
            Some(TileKind::Rock) if !allow_rock => Err(BuildError::Rock),
            Some(TileKind::Path(current)) if current == variant => Err(BuildError::SameVariant),
            Some(_) => Ok(()),
        }
    }

    /// Paves a lane tile after validating it.
    pub fn try_build(
        &mut self,
        cell: CellCoord,
        variant: PathVariant,
        allow_rock: bool,
    ) -> Result<(), BuildError> {
        self.check_build(cell, variant, allow_rock)?;
        let _ = self.grid.set(cell, TileKind::Path(variant));
        self.invalidate();
        Ok(())
    }

    /// Reverts a tower or non-terminal lane tile to open ground.
    ///
    /// Returns the tile that was removed.
    pub fn erase(&mut self, cell: CellCoord) -> Option<TileKind> {
        let tile = self.grid.tile(cell)?;
        match tile {
            TileKind::Tower | TileKind::Path(_) => {
                let _ = self.grid.set(cell, TileKind::Empty);
                self.invalidate();
                Some(tile)
            }
            _ => None,
        }
    }

    /// Marks a cell as occupied by a tower.
    pub(crate) fn occupy(&mut self, cell: CellCoord, allow_rock: bool) -> bool {
        match self.grid.tile(cell) {
            Some(TileKind::Empty) => {}
            Some(TileKind::Rock) if allow_rock => {}
            _ => return false,
        }
        let _ = self.grid.set(cell, TileKind::Tower);
        self.invalidate();
        true
    }

    /// Reports whether the lane is a single valid chain from start to end.
    pub fn is_chain_valid(&mut self) -> bool {
        self.chain_path().is_some()
    }

    /// Ordered lane cells from start to end, when the lane is a valid chain.
    pub fn chain_path(&mut self) -> Option<Arc<[CellCoord]>> {
        if self.caches.chain.is_none() {
            self.ensure_reachable();
            let chain = self
                .caches
                .reachable
                .as_deref()
                .and_then(|reached| trace_chain(&self.grid, reached))
                .map(Arc::from);
            self.caches.chain = Some(chain);
        }
        self.caches.chain.clone().flatten()
    }

    /// Hop distance from the cell to the end, or `None` when unreachable.
    pub fn distance_to_end(&mut self, cell: CellCoord) -> Option<u32> {
        self.ensure_distances();
        self.caches
            .distances
            .as_ref()
            .and_then(|field| field.distance(cell))
            .map(u32::from)
    }

    /// Picks the next lane cell on a shortest route to the end.
    ///
    /// Among lane neighbours strictly closer to the end one is chosen
    /// uniformly; `previous` is excluded unless it is the only option.
    pub fn next_cell<R: Rng + ?Sized>(
        &mut self,
        cell: CellCoord,
        previous: Option<CellCoord>,
        rng: &mut R,
    ) -> Option<CellCoord> {
        let here = self.distance_to_end(cell)?;
        let mut candidates: Vec<CellCoord> = Vec::with_capacity(4);
        for neighbor in self.grid.neighbors(cell) {
            if !self.grid.tile(neighbor).is_some_and(|tile| tile.is_path()) {
                continue;
            }
            let closer = self
                .caches
                .distances
                .as_ref()
                .and_then(|field| field.distance(neighbor))
                .is_some_and(|distance| u32::from(distance) < here);
            if closer {
                candidates.push(neighbor);
            }
        }

        if candidates.len() > 1 {
            if let Some(previous) = previous {
                candidates.retain(|candidate| *candidate != previous);
            }
        }

        match candidates.len() {
            0 => None,
            1 => Some(candidates[0]),
            count => Some(candidates[rng.gen_range(0..count)]),
        }
    }

    /// Reports whether the cell can be reached from the start through lane tiles.
    pub fn is_reachable(&mut self, cell: CellCoord) -> bool {
        self.ensure_reachable();
        let Some(index) = self.grid.index(cell) else {
            return false;
        };
        self.caches
            .reachable
            .as_ref()
            .and_then(|reached| reached.get(index).copied())
            .unwrap_or(false)
    }

    /// Rune overlays that are reachable and paved with conductive tiles.
    pub fn powered_runes(&mut self) -> &[CellCoord] {
        if self.caches.powered_runes.is_none() {
            self.ensure_reachable();
            let powered = match &self.caches.reachable {
                Some(reached) => self
                    .grid
                    .runes()
                    .iter()
                    .copied()
                    .filter(|rune| {
                        self.grid.tile(*rune) == Some(TileKind::Path(PathVariant::Conductive))
                            && self
                                .grid
                                .index(*rune)
                                .and_then(|index| reached.get(index).copied())
                                .unwrap_or(false)
                    })
                    .collect(),
                None => Vec::new(),
            };
            self.caches.powered_runes = Some(powered);
        }
        self.caches.powered_runes.as_deref().unwrap_or(&[])
    }

    /// Number of relic overlays lying on the current chain.
    pub fn relics_on_path(&mut self) -> u32 {
        let Some(chain) = self.chain_path() else {
            return 0;
        };
        let count = self
            .grid
            .relics()
            .iter()
            .filter(|relic| chain.contains(relic))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Counts orthogonal neighbours holding the given lane variant.
    #[must_use]
    pub fn adjacent_variant_count(&self, cell: CellCoord, variant: PathVariant) -> u32 {
        let count = self
            .grid
            .neighbors(cell)
            .filter(|neighbor| self.grid.tile(*neighbor) == Some(TileKind::Path(variant)))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Flips one random non-terminal lane tile around `cell` toward mud.
    ///
    /// Mud reverts to standard paving; any other variant becomes mud.
    pub fn corrupt_near<R: Rng + ?Sized>(
        &mut self,
        cell: CellCoord,
        rng: &mut R,
    ) -> Option<(CellCoord, PathVariant)> {
        let mut candidates = Vec::with_capacity(9);
        for dy in -1_i64..=1 {
            for dx in -1_i64..=1 {
                let column = i64::from(cell.column()) + dx;
                let row = i64::from(cell.row()) + dy;
                if column < 0 || row < 0 {
                    continue;
                }
                let neighbor = CellCoord::new(column as u32, row as u32);
                if let Some(TileKind::Path(variant)) = self.grid.tile(neighbor) {
                    candidates.push((neighbor, variant));
                }
            }
        }

        if candidates.is_empty() {
            return None;
        }

        let (target, current) = candidates[rng.gen_range(0..candidates.len())];
        let replacement = if current == PathVariant::Mud {
            PathVariant::Standard
        } else {
            PathVariant::Mud
        };
        let _ = self.grid.set(target, TileKind::Path(replacement));
        self.invalidate();
        Some((target, replacement))
    }

    fn ensure_reachable(&mut self) {
        if self.caches.reachable.is_none() {
            self.caches.reachable = Some(flood_from(&self.grid, self.grid.start()));
        }
    }

    fn ensure_distances(&mut self) {
        if self.caches.distances.is_none() {
            let mut field = NavigationField::default();
            field.rebuild(&self.grid);
            self.caches.distances = Some(field);
        }
    }

    fn invalidate(&mut self) {
        self.caches = PathCaches::default();
    }
}

impl PartialEq for GridTopology {
    fn eq(&self, other: &Self) -> bool {
        self.grid == other.grid
    }
}
