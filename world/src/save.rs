//! Persistent run records capturing everything needed to rebuild a world.

use std::{fs, path::Path, sync::Arc};

use glam::Vec2;
use pathforge_core::{CellCoord, GameTables, RunStats, TargetMode, TileKind, TowerKey};
use serde::{Deserialize, Serialize};

use crate::{grid::TileGrid, GridConfig, World};

/// Errors raised while persisting or restoring a run.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Reading or writing the save file failed.
    #[error("save file error: {0}")]
    Io(#[from] std::io::Error),
    /// The record could not be encoded or decoded as JSON.
    #[error("malformed save record: {0}")]
    Json(#[from] serde_json::Error),
    /// A tile carried an unknown wire code.
    #[error("unknown tile code {code}")]
    UnknownTile {
        /// Offending code.
        code: u8,
    },
    /// The flattened grid did not describe a valid lane.
    #[error("grid record is inconsistent")]
    InvalidGrid,
    /// A tower record points at a cell that is not a tower tile.
    #[error("tower at ({column}, {row}) does not sit on a tower tile")]
    MisplacedTower {
        /// Column of the tower.
        column: u32,
        /// Row of the tower.
        row: u32,
    },
    /// A tower record names a branch its definition lacks.
    #[error("tower {key:?} has no branch named {branch}")]
    UnknownBranch {
        /// Tower type.
        key: TowerKey,
        /// Branch name stored in the record.
        branch: String,
    },
}

/// Flattened tile grid with its overlays.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridRecord {
    /// Number of columns.
    pub cols: u32,
    /// Number of rows.
    pub rows: u32,
    /// Row-major tile codes.
    pub flat: Vec<u8>,
    /// Start cell as `[column, row]`.
    pub start: [u32; 2],
    /// End cell as `[column, row]`.
    pub end: [u32; 2],
    /// Relic overlay cells.
    #[serde(default)]
    pub relics: Vec<[u32; 2]>,
    /// Rune overlay cells.
    #[serde(default)]
    pub runes: Vec<[u32; 2]>,
}

/// Persisted state of one tower.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerRecord {
    /// Column of the tower.
    pub gx: u32,
    /// Row of the tower.
    pub gy: u32,
    /// Tower type.
    pub key: TowerKey,
    /// Current level.
    pub level: u32,
    /// Total gold invested.
    pub spent: i64,
    /// Chosen branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Target acquisition mode.
    #[serde(default)]
    pub target: TargetMode,
    /// Remaining overclock cooldown.
    #[serde(default)]
    pub oc_cd: f32,
    /// Remaining overclock time.
    #[serde(default)]
    pub oc_t: f32,
}

/// Persisted hero state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeroRecord {
    /// Horizontal tile-space position.
    pub x: f32,
    /// Vertical tile-space position.
    pub y: f32,
    /// Remaining dash cooldown.
    #[serde(default)]
    pub dash_cd: f32,
    /// Remaining shock cooldown.
    #[serde(default)]
    pub shock_cd: f32,
}

/// Complete save record of a run between waves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Seed of the run.
    pub seed: u64,
    /// Biome label.
    pub biome: String,
    /// Grid and overlays.
    pub grid: GridRecord,
    /// Placed towers.
    pub towers: Vec<TowerRecord>,
    /// Hero state.
    pub hero: HeroRecord,
    /// Run statistics.
    pub stats: RunStats,
}

impl RunRecord {
    /// Captures the persistent state of a world.
    #[must_use]
    pub fn capture(world: &World) -> Self {
        let grid = world.topology.grid();
        let pair = |cell: CellCoord| [cell.column(), cell.row()];
        Self {
            seed: world.seed,
            biome: world.biome.clone(),
            grid: GridRecord {
                cols: grid.columns(),
                rows: grid.rows(),
                flat: grid.tiles().iter().map(|tile| tile.code()).collect(),
                start: pair(grid.start()),
                end: pair(grid.end()),
                relics: grid.relics().iter().copied().map(pair).collect(),
                runes: grid.runes().iter().copied().map(pair).collect(),
            },
            towers: world
                .towers
                .iter()
                .map(|tower| TowerRecord {
                    gx: tower.cell().column(),
                    gy: tower.cell().row(),
                    key: tower.key(),
                    level: tower.level(),
                    spent: tower.spent(),
                    branch: tower.branch().map(str::to_owned),
                    target: tower.mode(),
                    oc_cd: tower.overclock_cooldown(),
                    oc_t: tower.overclock_time(),
                })
                .collect(),
            hero: HeroRecord {
                x: world.hero.position.x,
                y: world.hero.position.y,
                dash_cd: world.hero.dash_cooldown,
                shock_cd: world.hero.shock_cooldown,
            },
            stats: world.stats.clone(),
        }
    }

    /// Rebuilds a world from the record.
    pub fn restore(&self, tables: Arc<GameTables>) -> Result<World, SaveError> {
        let tiles = self
            .grid
            .flat
            .iter()
            .map(|code| TileKind::from_code(*code).ok_or(SaveError::UnknownTile { code: *code }))
            .collect::<Result<Vec<_>, _>>()?;
        let cell = |[column, row]: [u32; 2]| CellCoord::new(column, row);
        let grid = TileGrid::from_parts(
            self.grid.cols,
            self.grid.rows,
            tiles,
            self.grid.relics.iter().copied().map(cell).collect(),
            self.grid.runes.iter().copied().map(cell).collect(),
        )
        .ok_or(SaveError::InvalidGrid)?;
        if grid.start() != cell(self.grid.start) || grid.end() != cell(self.grid.end) {
            return Err(SaveError::InvalidGrid);
        }

        for record in &self.towers {
            let at = CellCoord::new(record.gx, record.gy);
            if grid.tile(at) != Some(TileKind::Tower) {
                return Err(SaveError::MisplacedTower {
                    column: record.gx,
                    row: record.gy,
                });
            }
            if let Some(branch) = &record.branch {
                let known = tables
                    .towers
                    .get(record.key)
                    .and_then(|definition| definition.branch(branch))
                    .is_some();
                if !known {
                    return Err(SaveError::UnknownBranch {
                        key: record.key,
                        branch: branch.clone(),
                    });
                }
            }
        }

        let mut world = World::new(tables, grid, self.stats.clone(), self.seed);
        world.biome = self.biome.clone();
        world.hero.position = Vec2::new(self.hero.x, self.hero.y);
        world.hero.dash_cooldown = self.hero.dash_cd;
        world.hero.shock_cooldown = self.hero.shock_cd;

        for record in &self.towers {
            let cell = CellCoord::new(record.gx, record.gy);
            let id = world.towers.insert(record.key, cell, record.spent);
            if let Some(tower) = world.towers.get_mut(id) {
                tower.level = record.level.max(1);
                tower.branch = record.branch.clone();
                tower.mode = record.target;
                tower.overclock_cooldown = record.oc_cd.max(0.0);
                tower.overclock_time = record.oc_t.max(0.0);
            }
        }
        world.refresh_buffs();
        Ok(world)
    }

    /// Encodes the record as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes a record from JSON.
    pub fn from_json(text: &str) -> Result<Self, SaveError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Writes the record to disk.
    pub fn write(&self, path: &Path) -> Result<(), SaveError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads a record from disk.
    pub fn load(path: &Path) -> Result<Self, SaveError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Restores the run saved at `path`, or starts a fresh one when the file
    /// is missing or unusable.
    #[must_use]
    pub fn load_or_default(path: &Path, tables: Arc<GameTables>, fallback: &GridConfig) -> World {
        Self::load(path)
            .and_then(|record| record.restore(Arc::clone(&tables)))
            .unwrap_or_else(|_| World::generate(tables, fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply, query};
    use pathforge_core::{Command, PathVariant};

    fn sample_world() -> World {
        let mut world = World::new(
            Arc::new(GameTables::default()),
            TileGrid::blank(10, 6),
            RunStats::default(),
            7,
        );
        let mut events = Vec::new();
        for column in 2..8 {
            apply(
                &mut world,
                Command::BuildPath {
                    cell: CellCoord::new(column, 3),
                    variant: PathVariant::Standard,
                },
                &mut events,
            );
        }
        apply(
            &mut world,
            Command::PlaceTower {
                key: TowerKey::Cannon,
                cell: CellCoord::new(4, 2),
            },
            &mut events,
        );
        world
    }

    #[test]
    fn capture_flattens_tiles_with_wire_codes() {
        let record = RunRecord::capture(&sample_world());

        assert_eq!(record.grid.flat.len(), 60);
        assert_eq!(record.grid.flat[3 * 10 + 1], 3);
        assert_eq!(record.grid.flat[3 * 10 + 8], 4);
        assert_eq!(record.grid.flat[2 * 10 + 4], 2);
        assert_eq!(record.towers.len(), 1);
        assert_eq!(record.towers[0].spent, 100);
    }

    #[test]
    fn unknown_tile_codes_are_rejected() {
        let mut record = RunRecord::capture(&sample_world());
        record.grid.flat[0] = 7;

        let error = record
            .restore(Arc::new(GameTables::default()))
            .expect_err("code 7 is unused");
        assert!(matches!(error, SaveError::UnknownTile { code: 7 }));
    }

    #[test]
    fn towers_must_sit_on_tower_tiles() {
        let mut record = RunRecord::capture(&sample_world());
        record.towers[0].gx = 0;

        let error = record
            .restore(Arc::new(GameTables::default()))
            .expect_err("misplaced tower");
        assert!(matches!(error, SaveError::MisplacedTower { column: 0, row: 2 }));
    }

    #[test]
    fn missing_files_fall_back_to_a_fresh_world() {
        let path = std::env::temp_dir().join("pathforge-missing-save-file.json");
        let _ = fs::remove_file(&path);

        let world = RunRecord::load_or_default(
            &path,
            Arc::new(GameTables::default()),
            &GridConfig {
                seed: 3,
                ..GridConfig::default()
            },
        );

        assert_eq!(query::seed(&world), 3);
        assert_eq!(query::tower_count(&world), 0);
    }

    #[test]
    fn corrupt_json_reports_a_json_error() {
        assert!(matches!(
            RunRecord::from_json("{\"seed\": "),
            Err(SaveError::Json(_))
        ));
    }
}
