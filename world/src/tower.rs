//! Authoritative tower state and identifier allocation.

use std::collections::BTreeMap;

use pathforge_core::{
    Aura, BranchMods, CellCoord, RunStats, StatMods, TargetMode, TowerBehavior, TowerDefinition,
    TowerId, TowerKey,
};

/// Level at which a tower may commit to a branch.
const BRANCH_LEVEL: u32 = 3;

/// Mutable state of a placed tower.
#[derive(Clone, Debug, PartialEq)]
pub struct Tower {
    id: TowerId,
    key: TowerKey,
    cell: CellCoord,
    pub(crate) level: u32,
    pub(crate) spent: i64,
    pub(crate) cooldown: f32,
    pub(crate) branch: Option<String>,
    pub(crate) mode: TargetMode,
    pub(crate) overclock_time: f32,
    pub(crate) overclock_cooldown: f32,
}

/// Stats of a tower after every multiplier has been folded in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveStats {
    /// Damage per hit.
    pub damage: f32,
    /// Attacks per second.
    pub rate: f32,
    /// Attack range in tiles.
    pub range: f32,
    /// Splash radius in tiles.
    pub splash: f32,
    /// Extra enemies a projectile may pass through.
    pub pierce: u32,
    /// Seconds between attacks.
    pub cooldown: f32,
}

impl Tower {
    /// Creates a level one tower that has cost `spent` gold.
    #[must_use]
    pub(crate) fn new(id: TowerId, key: TowerKey, cell: CellCoord, spent: i64) -> Self {
        Self {
            id,
            key,
            cell,
            level: 1,
            spent,
            cooldown: 0.0,
            branch: None,
            mode: TargetMode::default(),
            overclock_time: 0.0,
            overclock_cooldown: 0.0,
        }
    }

    /// Identifier of the tower.
    #[must_use]
    pub const fn id(&self) -> TowerId {
        self.id
    }

    /// Tower type.
    #[must_use]
    pub const fn key(&self) -> TowerKey {
        self.key
    }

    /// Cell the tower occupies.
    #[must_use]
    pub const fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Current level, starting at one.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Total gold invested in the tower.
    #[must_use]
    pub const fn spent(&self) -> i64 {
        self.spent
    }

    /// Target acquisition mode.
    #[must_use]
    pub const fn mode(&self) -> TargetMode {
        self.mode
    }

    /// Chosen branch, if any.
    #[must_use]
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    /// Remaining attack cooldown in seconds.
    #[must_use]
    pub const fn cooldown(&self) -> f32 {
        self.cooldown
    }

    /// Remaining overclock time in seconds.
    #[must_use]
    pub const fn overclock_time(&self) -> f32 {
        self.overclock_time
    }

    /// Remaining overclock cooldown in seconds.
    #[must_use]
    pub const fn overclock_cooldown(&self) -> f32 {
        self.overclock_cooldown
    }

    /// Reports whether the attack cooldown has elapsed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.cooldown <= 0.0
    }

    /// Reports whether an overclock is running.
    #[must_use]
    pub fn is_overclocked(&self) -> bool {
        self.overclock_time > 0.0
    }

    /// Gold needed to reach the next level.
    #[must_use]
    pub fn upgrade_cost(&self, definition: &TowerDefinition) -> i64 {
        (definition.cost as f32 * 0.65 + 40.0 * self.level as f32).floor() as i64
    }

    /// Reports whether the tower may commit to a branch.
    #[must_use]
    pub fn can_branch(&self) -> bool {
        self.level >= BRANCH_LEVEL && self.branch.is_none()
    }

    /// Reports whether both overclock timers have elapsed.
    #[must_use]
    pub fn can_overclock(&self) -> bool {
        self.overclock_time <= 0.0 && self.overclock_cooldown <= 0.0
    }

    /// Counts every timer down by `dt`, clamping at zero. Returns whether an
    /// overclock ran out during this step.
    pub(crate) fn tick(&mut self, dt: f32) -> bool {
        let overclocked = self.is_overclocked();
        self.cooldown = (self.cooldown - dt).max(0.0);
        self.overclock_time = (self.overclock_time - dt).max(0.0);
        self.overclock_cooldown = (self.overclock_cooldown - dt).max(0.0);
        overclocked && !self.is_overclocked()
    }

    /// Modifiers of the chosen branch.
    #[must_use]
    pub fn branch_mods<'a>(&self, definition: &'a TowerDefinition) -> Option<&'a BranchMods> {
        let name = self.branch.as_deref()?;
        definition.branch(name).map(|branch| &branch.mods)
    }

    /// Aura projected onto nearby towers, if this tower supports others.
    #[must_use]
    pub fn aura(&self, definition: &TowerDefinition) -> Option<Aura> {
        let branch = self.branch_mods(definition);
        let mut aura = branch
            .and_then(|mods| mods.aura)
            .or(definition.aura)?;
        if self.is_overclocked() && branch.is_some_and(|mods| mods.aura_overclock) {
            aura = aura.combine(StatMods::new(1.12, 1.12, 1.08));
        }
        Some(aura)
    }

    /// Folds the level curve, run multipliers, auras, perk bonuses, branch
    /// and overclock into the tower's attack stats.
    #[must_use]
    pub fn effective(
        &self,
        definition: &TowerDefinition,
        stats: &RunStats,
        buffs: StatMods,
    ) -> EffectiveStats {
        let lvl = self.level.saturating_sub(1) as f32;
        let damage_curve = ((1.0 + 0.16 * lvl.min(9.0)) * (1.0 + 0.08 * (lvl - 9.0).max(0.0)))
            .min(3.0);
        let range_curve = (1.0 + 0.03 * lvl).min(1.45);
        let rate_curve = (1.0 + 0.06 * lvl).min(1.85);

        let bonus = stats.tower_bonus(self.key);
        let branch = self.branch_mods(definition);
        let branch_stats = branch.map(|mods| mods.stats).unwrap_or_default();
        let overclock = if self.is_overclocked() {
            definition.overclock.mods
        } else {
            StatMods::default()
        };

        let damage = definition.damage
            * damage_curve
            * stats.dmg_mul
            * stats.damage_type_mul.get(definition.damage_type)
            * buffs.damage_mul
            * bonus.damage_mul
            * branch_stats.damage_mul
            * overclock.damage_mul;
        let rate = definition.rate
            * rate_curve
            * stats.rate_mul
            * buffs.rate_mul
            * bonus.rate_mul
            * branch_stats.rate_mul
            * overclock.rate_mul;
        let range = definition.range
            * range_curve
            * stats.range_mul
            * buffs.range_mul
            * bonus.range_mul
            * branch_stats.range_mul
            * overclock.range_mul;

        let mut splash = definition.splash + branch.map_or(0.0, |mods| mods.splash_add);
        if stats.flags.all_projectiles_splash && definition.behavior == TowerBehavior::Projectile {
            splash = splash.max(0.55);
        }
        let pierce = definition.pierce + branch.map_or(0, |mods| mods.pierce_add);

        EffectiveStats {
            damage,
            rate,
            range,
            splash,
            pierce,
            cooldown: (1.0 / rate.max(0.01)).max(0.02),
        }
    }

    /// Radius of the aura this tower projects, in tiles.
    #[must_use]
    pub(crate) fn aura_radius(&self, definition: &TowerDefinition, stats: &RunStats) -> f32 {
        let lvl = self.level.saturating_sub(1) as f32;
        definition.range * (1.0 + 0.03 * lvl).min(1.45) * stats.range_mul
    }
}

/// Registry that stores towers and manages identifier allocation.
#[derive(Clone, Debug, Default)]
pub(crate) struct TowerRegistry {
    entries: BTreeMap<TowerId, Tower>,
    next_tower_id: u32,
}

impl TowerRegistry {
    /// Allocates an identifier and stores a fresh level one tower.
    pub(crate) fn insert(&mut self, key: TowerKey, cell: CellCoord, spent: i64) -> TowerId {
        let id = TowerId::new(self.next_tower_id);
        self.next_tower_id = self.next_tower_id.saturating_add(1);
        let _ = self.entries.insert(id, Tower::new(id, key, cell, spent));
        id
    }

    pub(crate) fn remove(&mut self, id: TowerId) -> Option<Tower> {
        self.entries.remove(&id)
    }

    pub(crate) fn get(&self, id: TowerId) -> Option<&Tower> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: TowerId) -> Option<&mut Tower> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn at(&self, cell: CellCoord) -> Option<TowerId> {
        self.entries
            .values()
            .find(|tower| tower.cell == cell)
            .map(|tower| tower.id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Tower> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tower> {
        self.entries.values_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
