#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Pathforge engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.
//!
//! The data tables, run statistics and balance profile live here as well so
//! that every layer agrees on a single typed representation.

mod profile;
mod stats;
mod tables;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use profile::{BalanceProfile, EnemyProfile, ProfileMeta, TowerProfile};
pub use stats::{
    BonusKind, Effect, FlagKind, Flags, Perk, Rarity, RerollError, ResourceKind, RuneAura,
    RunStats, Talent, TalentError, TerrainTuning, TowerBonus, PERK_REROLL_COST,
};
pub use tables::{
    Aura, Branch, BranchMods, DamageMultipliers, EnemyArchetype, EnemyTable, GameTables, Overclock,
    StatMods, TowerBehavior, TowerDefinition, TowerTable,
};

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that a path tile of the given variant be paved onto a cell.
    BuildPath {
        /// Cell receiving the new tile.
        cell: CellCoord,
        /// Variant of path tile to pave.
        variant: PathVariant,
    },
    /// Requests that a cell be cleared, selling any tower occupying it.
    Erase {
        /// Cell targeted for clearing.
        cell: CellCoord,
    },
    /// Requests placement of a tower on an empty cell.
    PlaceTower {
        /// Type of tower to construct.
        key: TowerKey,
        /// Cell the tower occupies.
        cell: CellCoord,
    },
    /// Requests that an existing tower be sold for a refund.
    SellTower {
        /// Identifier of the tower to sell.
        tower: TowerId,
    },
    /// Requests a single level upgrade for a tower.
    UpgradeTower {
        /// Identifier of the tower to upgrade.
        tower: TowerId,
    },
    /// Commits a tower to one of its branch upgrade paths.
    ChooseBranch {
        /// Identifier of the tower choosing a branch.
        tower: TowerId,
        /// Name of the branch as declared by the tower definition.
        branch: String,
    },
    /// Changes the target acquisition mode of a tower.
    SetTargetMode {
        /// Identifier of the tower being reconfigured.
        tower: TowerId,
        /// Mode the tower should use from now on.
        mode: TargetMode,
    },
    /// Triggers the timed overclock buff of a tower.
    Overclock {
        /// Identifier of the tower to overclock.
        tower: TowerId,
    },
    /// Requests that the next wave begins.
    StartWave {
        /// Number of waves fought at once for bonus reward.
        assault: u32,
    },
    /// Requests that an enemy enters the lane at the start terminal.
    SpawnEnemy {
        /// Archetype of the enemy to spawn.
        key: EnemyKey,
        /// Wave whose tier scales the enemy's stats and bounty.
        wave: u32,
    },
    /// Requests that an enemy enters the lane at a specific path cell.
    SpawnEnemyAt {
        /// Archetype of the enemy to spawn.
        key: EnemyKey,
        /// Path cell the enemy appears on.
        cell: CellCoord,
    },
    /// Requests that a ready tower attacks using its archetype behaviour.
    TowerAttack {
        /// Identifier of the attacking tower.
        tower: TowerId,
        /// Enemy chosen by the targeting system.
        target: EnemyId,
    },
    /// Closes the active wave and pays out the end-of-wave income.
    CompleteWave,
    /// Applies every effect carried by a perk to the run statistics.
    ApplyPerk {
        /// Perk selected by the player.
        perk: Perk,
    },
    /// Spends a perk reroll so a fresh offer can be drawn.
    RerollPerks,
    /// Purchases a talent node with a talent point.
    BuyTalent {
        /// Talent node being purchased.
        talent: Talent,
    },
    /// Ends the run immediately by draining all lives.
    ForceFailure,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a path tile was paved.
    PathBuilt {
        /// Cell that received the tile.
        cell: CellCoord,
        /// Variant that now occupies the cell.
        variant: PathVariant,
    },
    /// Reports that paving a tile was refused.
    PathRejected {
        /// Cell the request referenced.
        cell: CellCoord,
        /// Reason the request was refused.
        reason: BuildError,
    },
    /// Confirms that a cell was cleared back to empty ground.
    TileErased {
        /// Cell that was cleared.
        cell: CellCoord,
    },
    /// Confirms that a tower was placed.
    TowerPlaced {
        /// Identifier allocated for the tower.
        tower: TowerId,
        /// Type of tower constructed.
        key: TowerKey,
        /// Cell the tower occupies.
        cell: CellCoord,
        /// Gold spent on the placement.
        cost: i64,
    },
    /// Reports that a tower placement was refused.
    TowerPlacementRejected {
        /// Type of tower that was requested.
        key: TowerKey,
        /// Cell the request referenced.
        cell: CellCoord,
        /// Reason the placement was refused.
        reason: PlacementError,
    },
    /// Confirms that a tower was sold.
    TowerSold {
        /// Identifier of the removed tower.
        tower: TowerId,
        /// Gold returned to the player.
        refund: i64,
    },
    /// Confirms that a tower gained a level.
    TowerUpgraded {
        /// Identifier of the upgraded tower.
        tower: TowerId,
        /// Level reached after the upgrade.
        level: u32,
        /// Gold spent on the upgrade.
        cost: i64,
    },
    /// Reports that a tower upgrade was refused.
    TowerUpgradeRejected {
        /// Identifier of the tower the request referenced.
        tower: TowerId,
        /// Reason the upgrade was refused.
        reason: UpgradeError,
    },
    /// Confirms that a tower committed to a branch.
    BranchChosen {
        /// Identifier of the tower.
        tower: TowerId,
        /// Name of the chosen branch.
        branch: String,
    },
    /// Reports that a branch choice was refused.
    BranchRejected {
        /// Identifier of the tower the request referenced.
        tower: TowerId,
        /// Reason the choice was refused.
        reason: BranchError,
    },
    /// Confirms that a tower switched target modes.
    TargetModeChanged {
        /// Identifier of the tower.
        tower: TowerId,
        /// Mode now in effect.
        mode: TargetMode,
    },
    /// Confirms that a tower entered overclock.
    OverclockStarted {
        /// Identifier of the tower.
        tower: TowerId,
        /// Seconds the buff remains active.
        duration: f32,
    },
    /// Reports that an overclock request was refused.
    OverclockRejected {
        /// Identifier of the tower the request referenced.
        tower: TowerId,
    },
    /// Announces that a wave began.
    WaveStarted {
        /// Wave number that began.
        wave: u32,
        /// Number of waves fought at once.
        assault: u32,
    },
    /// Reports that a wave could not begin.
    WaveRejected {
        /// Wave number that was requested.
        wave: u32,
        /// Reason the wave was refused.
        reason: WaveStartError,
    },
    /// Announces that a wave finished and income was paid.
    WaveCompleted {
        /// Wave number that finished.
        wave: u32,
        /// Gold paid for clearing the wave, excluding interest.
        reward: i64,
    },
    /// Confirms that an enemy entered the lane.
    EnemySpawned {
        /// Identifier allocated for the enemy.
        enemy: EnemyId,
        /// Archetype of the enemy.
        key: EnemyKey,
        /// Cell the enemy appeared on.
        cell: CellCoord,
    },
    /// Reports that an enemy could not be spawned.
    SpawnRejected {
        /// Archetype that was requested.
        key: EnemyKey,
    },
    /// Announces that an enemy died.
    EnemyKilled {
        /// Identifier of the dead enemy.
        enemy: EnemyId,
        /// Archetype of the dead enemy.
        key: EnemyKey,
        /// Gold paid for the kill.
        reward: i64,
        /// Whether a fragment dropped.
        fragment: bool,
    },
    /// Announces that an enemy reached the end terminal.
    EnemyLeaked {
        /// Identifier of the enemy.
        enemy: EnemyId,
        /// Archetype of the enemy.
        key: EnemyKey,
    },
    /// Announces that a boss crossed a health threshold.
    BossPhaseReached {
        /// Identifier of the boss.
        enemy: EnemyId,
        /// Phase entered, starting at one.
        phase: u8,
        /// Cell the boss occupied when the phase began.
        cell: CellCoord,
    },
    /// Announces that a sapper flipped a path tile.
    TerrainCorrupted {
        /// Cell that changed.
        cell: CellCoord,
        /// Variant the cell now holds.
        variant: PathVariant,
    },
    /// Confirms that a tower launched projectiles.
    ProjectileFired {
        /// Identifier of the firing tower.
        tower: TowerId,
        /// Enemy the projectiles were aimed at.
        target: EnemyId,
        /// Number of projectiles launched.
        count: u32,
    },
    /// Reports that a shot was lost to a mud tile.
    ShotMissed {
        /// Identifier of the firing tower.
        tower: TowerId,
        /// Enemy the shot was aimed at.
        target: EnemyId,
    },
    /// Confirms that an area or chain tower struck enemies.
    TowerStruck {
        /// Identifier of the attacking tower.
        tower: TowerId,
        /// Number of enemies hit.
        hits: u32,
    },
    /// Confirms that a perk was applied.
    PerkApplied {
        /// Identifier of the perk.
        id: String,
    },
    /// Confirms that a perk reroll was spent.
    PerksRerolled {
        /// Rerolls left afterwards.
        remaining: u32,
    },
    /// Reports that a perk reroll was refused.
    RerollRejected {
        /// Reason the reroll was refused.
        reason: RerollError,
    },
    /// Confirms that a talent was purchased.
    TalentPurchased {
        /// Identifier of the talent node.
        id: String,
    },
    /// Reports that a talent purchase was refused.
    TalentRejected {
        /// Identifier of the talent node.
        id: String,
        /// Reason the purchase was refused.
        reason: TalentError,
    },
    /// Announces that the run ended with no lives remaining.
    RunFailed {
        /// Wave during which the run ended.
        wave: u32,
    },
}

/// Unique identifier assigned to an enemy.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct EnemyId(u32);

impl EnemyId {
    /// Creates a new enemy identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Unique identifier assigned to a tower.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TowerId(u32);

impl TowerId {
    /// Creates a new tower identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single grid cell.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }

    /// Computes the Manhattan distance between two cells.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.column.abs_diff(other.column) + self.row.abs_diff(other.row)
    }

    /// Computes the Chebyshev (king move) distance between two cells.
    #[must_use]
    pub fn chebyshev_distance(self, other: CellCoord) -> u32 {
        self.column
            .abs_diff(other.column)
            .max(self.row.abs_diff(other.row))
    }

    /// Tile-space point at the centre of the cell.
    #[must_use]
    pub fn center(self) -> TilePoint {
        TilePoint::new(self.column as f32 + 0.5, self.row as f32 + 0.5)
    }
}

/// Continuous position measured in tile units.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct TilePoint {
    x: f32,
    y: f32,
}

impl TilePoint {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate in tiles.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical coordinate in tiles.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Squared euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: TilePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Cell containing the point, if it lies in non-negative space.
    #[must_use]
    pub fn cell(self) -> Option<CellCoord> {
        if self.x < 0.0 || self.y < 0.0 {
            return None;
        }
        Some(CellCoord::new(self.x.floor() as u32, self.y.floor() as u32))
    }
}

/// Paved lane variants, each with its own cost and movement modifier.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathVariant {
    /// Plain lane tile.
    Standard,
    /// Accelerating lane that pays a small gold bonus on kills.
    Fast,
    /// Slowing lane that makes projectiles miss.
    Mud,
    /// Lane that powers runes and strengthens tesla chains.
    Conductive,
    /// Lane that prolongs slows and dampens fire.
    Cryo,
    /// Lane that sets enemies alight.
    Magma,
    /// Lane that exposes enemies to extra damage.
    Rune,
}

impl PathVariant {
    /// Every variant in declaration order.
    pub const ALL: [PathVariant; 7] = [
        PathVariant::Standard,
        PathVariant::Fast,
        PathVariant::Mud,
        PathVariant::Conductive,
        PathVariant::Cryo,
        PathVariant::Magma,
        PathVariant::Rune,
    ];

    /// Paves consumed when building the variant.
    #[must_use]
    pub const fn paves_cost(self) -> i64 {
        match self {
            PathVariant::Standard => 1,
            PathVariant::Fast | PathVariant::Mud => 6,
            PathVariant::Conductive => 8,
            PathVariant::Cryo | PathVariant::Magma => 9,
            PathVariant::Rune => 14,
        }
    }

    /// Multiplier applied to enemy speed while standing on the variant.
    #[must_use]
    pub const fn speed_multiplier(self) -> f32 {
        match self {
            PathVariant::Standard | PathVariant::Conductive | PathVariant::Rune => 1.0,
            PathVariant::Fast => 1.55,
            PathVariant::Mud => 0.35,
            PathVariant::Cryo => 0.85,
            PathVariant::Magma => 0.95,
        }
    }
}

/// Terrain stored in a single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum TileKind {
    /// Buildable open ground.
    #[default]
    Empty,
    /// Impassable boulder.
    Rock,
    /// Cell occupied by a tower.
    Tower,
    /// Lane entrance.
    Start,
    /// Lane exit.
    End,
    /// Paved lane tile.
    Path(PathVariant),
}

impl TileKind {
    /// Reports whether enemies may walk on the tile.
    #[must_use]
    pub const fn is_path(self) -> bool {
        matches!(self, TileKind::Path(_) | TileKind::Start | TileKind::End)
    }

    /// Reports whether the tile is one of the two lane terminals.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, TileKind::Start | TileKind::End)
    }

    /// Lane variant held by the tile, if any.
    #[must_use]
    pub const fn variant(self) -> Option<PathVariant> {
        match self {
            TileKind::Path(variant) => Some(variant),
            _ => None,
        }
    }

    /// Movement multiplier applied while standing on the tile.
    #[must_use]
    pub const fn speed_multiplier(self) -> f32 {
        match self {
            TileKind::Path(variant) => variant.speed_multiplier(),
            _ => 1.0,
        }
    }

    /// Numeric code used by persisted grids.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            TileKind::Empty => 0,
            TileKind::Tower => 2,
            TileKind::Start => 3,
            TileKind::End => 4,
            TileKind::Rock => 9,
            TileKind::Path(PathVariant::Standard) => 1,
            TileKind::Path(PathVariant::Fast) => 11,
            TileKind::Path(PathVariant::Mud) => 12,
            TileKind::Path(PathVariant::Conductive) => 13,
            TileKind::Path(PathVariant::Cryo) => 14,
            TileKind::Path(PathVariant::Magma) => 15,
            TileKind::Path(PathVariant::Rune) => 16,
        }
    }

    /// Decodes a persisted tile code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        let kind = match code {
            0 => TileKind::Empty,
            1 => TileKind::Path(PathVariant::Standard),
            2 => TileKind::Tower,
            3 => TileKind::Start,
            4 => TileKind::End,
            9 => TileKind::Rock,
            11 => TileKind::Path(PathVariant::Fast),
            12 => TileKind::Path(PathVariant::Mud),
            13 => TileKind::Path(PathVariant::Conductive),
            14 => TileKind::Path(PathVariant::Cryo),
            15 => TileKind::Path(PathVariant::Magma),
            16 => TileKind::Path(PathVariant::Rune),
            _ => return None,
        };
        Some(kind)
    }
}

/// Categories of damage dealt by towers and terrain.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DamageType {
    /// Bullets and shrapnel.
    Kinetic,
    /// Armour-piercing rounds that treat armour at half value.
    Pierce,
    /// Electrical discharge.
    Energy,
    /// Flames and burning.
    Fire,
    /// Frost.
    Cold,
    /// Blast damage.
    Explosive,
    /// Toxins and poison.
    Bio,
}

impl DamageType {
    /// Every damage type in declaration order.
    pub const ALL: [DamageType; 7] = [
        DamageType::Kinetic,
        DamageType::Pierce,
        DamageType::Energy,
        DamageType::Fire,
        DamageType::Cold,
        DamageType::Explosive,
        DamageType::Bio,
    ];

    /// Dense index of the damage type.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Reports whether armour reduces damage of this type.
    #[must_use]
    pub const fn is_armored_against(self) -> bool {
        matches!(
            self,
            DamageType::Kinetic | DamageType::Pierce | DamageType::Explosive
        )
    }
}

/// Status effects that can be attached to enemies.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    /// Reduces movement speed.
    Slow,
    /// Prevents movement entirely.
    Stun,
    /// Strips armour.
    Shred,
    /// Increases damage taken.
    Vuln,
    /// Fire damage over time.
    Burn,
    /// Bio damage over time.
    Poison,
    /// Reduces movement speed slightly.
    Shock,
}

impl StatusKind {
    /// Whether reapplying refreshes stacks to the maximum instead of summing them.
    #[must_use]
    pub const fn refreshes_stacks(self) -> bool {
        matches!(
            self,
            StatusKind::Slow
                | StatusKind::Burn
                | StatusKind::Poison
                | StatusKind::Shock
                | StatusKind::Stun
        )
    }
}

/// Status payload delivered by an attack.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OnHit {
    /// Status kind applied.
    pub kind: StatusKind,
    /// Duration in seconds.
    pub duration: f32,
    /// Stack count applied.
    #[serde(default = "one_stack")]
    pub stacks: u32,
    /// Strength applied, meaningful for slows.
    #[serde(default)]
    pub strength: f32,
    /// Probability the status lands on a hit.
    #[serde(default = "certain")]
    pub chance: f32,
}

impl OnHit {
    /// Creates a guaranteed single-stack payload.
    #[must_use]
    pub const fn new(kind: StatusKind, duration: f32) -> Self {
        Self {
            kind,
            duration,
            stacks: 1,
            strength: 0.0,
            chance: 1.0,
        }
    }

    /// Overrides the stack count.
    #[must_use]
    pub const fn with_stacks(mut self, stacks: u32) -> Self {
        self.stacks = stacks;
        self
    }

    /// Overrides the probability the status lands.
    #[must_use]
    pub const fn with_chance(mut self, chance: f32) -> Self {
        self.chance = chance;
        self
    }

    /// Overrides the strength.
    #[must_use]
    pub const fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }
}

const fn one_stack() -> u32 {
    1
}

const fn certain() -> f32 {
    1.0
}

/// Target acquisition modes supported by attacking towers.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetMode {
    /// Enemy furthest along the lane.
    #[default]
    First,
    /// Enemy least far along the lane.
    Last,
    /// Enemy with the most health plus shield.
    Strongest,
    /// Enemy nearest to the tower.
    Closest,
    /// Enemy with the highest effective armour.
    Armored,
}

impl TargetMode {
    /// Every mode in cycling order.
    pub const ALL: [TargetMode; 5] = [
        TargetMode::First,
        TargetMode::Last,
        TargetMode::Strongest,
        TargetMode::Closest,
        TargetMode::Armored,
    ];

    /// Mode following this one when cycling.
    #[must_use]
    pub fn next(self) -> Self {
        let index = Self::ALL
            .iter()
            .position(|mode| *mode == self)
            .unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }
}

/// Traits attached to enemy archetypes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnemyTag {
    /// Wave boss with phases and reduced slow/momentum caps.
    Boss,
    /// Elite that drops fragments more often.
    Elite,
    /// Regenerating enemy.
    Regen,
    /// Enemy that corrupts the lane while walking it.
    Sapper,
    /// Quick runner.
    Fast,
    /// Heavily armoured enemy.
    Armored,
    /// Enemy carrying a shield.
    Shielded,
}

/// Tower archetypes available to the player.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TowerKey {
    /// Rapid-fire kinetic turret.
    Gatling,
    /// Long-range piercing rifle.
    Sniper,
    /// Chain-lightning coil.
    Tesla,
    /// Freezing area emitter.
    Cryo,
    /// Long-range splash artillery.
    Mortar,
    /// Short-range splash gun.
    Cannon,
    /// Support aura beacon.
    Beacon,
    /// Burning area emitter.
    Flame,
}

impl TowerKey {
    /// Every tower key in declaration order.
    pub const ALL: [TowerKey; 8] = [
        TowerKey::Gatling,
        TowerKey::Sniper,
        TowerKey::Tesla,
        TowerKey::Cryo,
        TowerKey::Mortar,
        TowerKey::Cannon,
        TowerKey::Beacon,
        TowerKey::Flame,
    ];
}

/// Enemy archetypes that can appear in waves.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnemyKey {
    /// Baseline infantry.
    Soldier,
    /// Fast, fragile runner.
    Scout,
    /// Regenerating brute.
    Mutant,
    /// Fire-resistant raider.
    Pyro,
    /// Slow armoured hulk.
    Tank,
    /// Shielded wisp.
    Wisp,
    /// Shielded, armoured elite.
    Elite,
    /// Wave boss.
    Boss,
    /// Lane-corrupting saboteur.
    Sapper,
}

impl EnemyKey {
    /// Every enemy key in declaration order.
    pub const ALL: [EnemyKey; 9] = [
        EnemyKey::Soldier,
        EnemyKey::Scout,
        EnemyKey::Mutant,
        EnemyKey::Pyro,
        EnemyKey::Tank,
        EnemyKey::Wisp,
        EnemyKey::Elite,
        EnemyKey::Boss,
        EnemyKey::Sapper,
    ];
}

/// Reasons a path build request can be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// The cell lies outside the grid.
    OutOfBounds,
    /// The cell is the start or end terminal.
    Terminal,
    /// The cell holds a rock and rock building is not unlocked.
    Rock,
    /// The cell is occupied by a tower.
    Tower,
    /// The cell already holds the requested variant.
    SameVariant,
    /// The variant has not been unlocked.
    Locked,
    /// Not enough paves remain.
    InsufficientPaves,
}

/// Reasons a tower placement can be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementError {
    /// The cell lies outside the grid.
    OutOfBounds,
    /// The cell is not open ground.
    Occupied,
    /// The tower has not been unlocked.
    Locked,
    /// Not enough gold remains.
    InsufficientGold,
}

/// Reasons a tower upgrade can be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpgradeError {
    /// No tower with the identifier exists.
    UnknownTower,
    /// Not enough gold remains.
    InsufficientGold,
}

/// Reasons a branch choice can be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchError {
    /// No tower with the identifier exists.
    UnknownTower,
    /// The tower is below level three.
    LevelTooLow,
    /// The tower already chose a branch.
    AlreadyChosen,
    /// The definition declares no branch with that name.
    UnknownBranch,
}

/// Reasons a wave can fail to start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaveStartError {
    /// The built lane is not a single valid chain from start to end.
    BrokenLane,
    /// A wave is already running.
    AlreadyActive,
    /// The run has no lives remaining.
    RunOver,
}

/// Immutable representation of a single enemy used for targeting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemySnapshot {
    /// Identifier assigned to the enemy.
    pub id: EnemyId,
    /// Archetype of the enemy.
    pub key: EnemyKey,
    /// Continuous position of the enemy.
    pub position: TilePoint,
    /// Cell the enemy currently occupies.
    pub cell: CellCoord,
    /// Lane progress; larger values are closer to the end.
    pub progress: i64,
    /// Remaining health.
    pub hp: f32,
    /// Remaining shield.
    pub shield: f32,
    /// Effective armour after shred.
    pub armor: f32,
}

/// Read-only snapshot describing all enemies on the lane.
#[derive(Clone, Debug, Default)]
pub struct EnemyView {
    snapshots: Vec<EnemySnapshot>,
}

impl EnemyView {
    /// Creates a new enemy view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<EnemySnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured enemy snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemySnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<EnemySnapshot> {
        self.snapshots
    }
}

/// Immutable representation of a single tower used for targeting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TowerSnapshot {
    /// Identifier allocated to the tower.
    pub id: TowerId,
    /// Type of tower.
    pub key: TowerKey,
    /// Attack behaviour of the tower.
    pub behavior: TowerBehavior,
    /// Cell the tower occupies.
    pub cell: CellCoord,
    /// Current target acquisition mode.
    pub mode: TargetMode,
    /// Effective attack range in tiles.
    pub range: f32,
    /// Whether the attack cooldown has elapsed.
    pub ready: bool,
}

/// Read-only snapshot describing all towers placed in the world.
#[derive(Clone, Debug, Default)]
pub struct TowerView {
    snapshots: Vec<TowerSnapshot>,
}

impl TowerView {
    /// Creates a new tower view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TowerSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured tower snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &TowerSnapshot> {
        self.snapshots.iter()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TowerSnapshot> {
        self.snapshots
    }
}

/// Assignment of an enemy to a tower produced by the targeting system.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TowerTarget {
    /// Tower that acquired the target.
    pub tower: TowerId,
    /// Enemy selected by the tower's mode.
    pub enemy: EnemyId,
}
