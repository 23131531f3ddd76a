//! Run statistics together with the typed effects that mutate them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{DamageMultipliers, DamageType, OnHit, PathVariant, StatusKind, TowerKey};

/// Independent boolean switches unlocked by perks and talents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Flags {
    /// Towers and path tiles may be built over rocks.
    pub rock_building: bool,
    /// Every projectile gains at least a small splash radius.
    pub all_projectiles_splash: bool,
    /// Relics on the lane pay gold at the end of each wave.
    pub path_gold: bool,
    /// Bosses killed on boss waves pay double gold.
    pub boss_bounty: bool,
    /// Chain towers gain an extra jump next to conductive tiles.
    pub conduct_mastery: bool,
    /// Repaving an existing lane tile costs no paves.
    pub path_reforge_free: bool,
}

/// Names of the flags in [`Flags`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// See [`Flags::rock_building`].
    RockBuilding,
    /// See [`Flags::all_projectiles_splash`].
    AllProjectilesSplash,
    /// See [`Flags::path_gold`].
    PathGold,
    /// See [`Flags::boss_bounty`].
    BossBounty,
    /// See [`Flags::conduct_mastery`].
    ConductMastery,
    /// See [`Flags::path_reforge_free`].
    PathReforgeFree,
}

impl Flags {
    /// Raises the named flag.
    pub fn raise(&mut self, flag: FlagKind) {
        match flag {
            FlagKind::RockBuilding => self.rock_building = true,
            FlagKind::AllProjectilesSplash => self.all_projectiles_splash = true,
            FlagKind::PathGold => self.path_gold = true,
            FlagKind::BossBounty => self.boss_bounty = true,
            FlagKind::ConductMastery => self.conduct_mastery = true,
            FlagKind::PathReforgeFree => self.path_reforge_free = true,
        }
    }
}

/// Per-tower bonuses granted by perks and talents.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerBonus {
    /// Damage multiplier.
    pub damage_mul: f32,
    /// Fire-rate multiplier.
    pub rate_mul: f32,
    /// Range multiplier.
    pub range_mul: f32,
    /// Extra slow strength.
    pub slow_strength_add: f32,
    /// Extra chain jumps.
    pub chains_add: u32,
    /// Extra shock duration.
    pub shock_dur_add: f32,
    /// Extra burn stacks.
    pub burn_stacks_add: u32,
}

impl Default for TowerBonus {
    fn default() -> Self {
        Self {
            damage_mul: 1.0,
            rate_mul: 1.0,
            range_mul: 1.0,
            slow_strength_add: 0.0,
            chains_add: 0,
            shock_dur_add: 0.0,
            burn_stacks_add: 0,
        }
    }
}

/// Fields of [`TowerBonus`] that effects can adjust.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    /// Multiplies [`TowerBonus::damage_mul`].
    DamageMul,
    /// Multiplies [`TowerBonus::rate_mul`].
    RateMul,
    /// Multiplies [`TowerBonus::range_mul`].
    RangeMul,
    /// Adds to [`TowerBonus::slow_strength_add`].
    SlowStrengthAdd,
    /// Adds to [`TowerBonus::chains_add`].
    ChainsAdd,
    /// Adds to [`TowerBonus::shock_dur_add`].
    ShockDurAdd,
    /// Adds to [`TowerBonus::burn_stacks_add`].
    BurnStacksAdd,
}

impl TowerBonus {
    fn adjust(&mut self, kind: BonusKind, value: f32) {
        match kind {
            BonusKind::DamageMul => self.damage_mul *= value,
            BonusKind::RateMul => self.rate_mul *= value,
            BonusKind::RangeMul => self.range_mul *= value,
            BonusKind::SlowStrengthAdd => self.slow_strength_add += value,
            BonusKind::ChainsAdd => self.chains_add += value.max(0.0).round() as u32,
            BonusKind::ShockDurAdd => self.shock_dur_add += value,
            BonusKind::BurnStacksAdd => self.burn_stacks_add += value.max(0.0).round() as u32,
        }
    }
}

/// Resources that effects can grant directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Spendable gold.
    Gold,
    /// Meta-progression fragments.
    Fragments,
    /// Path build budget.
    Paves,
    /// Upper bound on regenerated paves.
    PavesCap,
    /// Remaining lives.
    Lives,
    /// Shield absorbing leaks before lives.
    CoreShield,
    /// Unspent talent points.
    TalentPoints,
}

/// Local aura granted by powered runes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuneAura {
    /// Damage multiplier for towers near a powered rune.
    pub damage_mul: f32,
    /// Range multiplier for towers near a powered rune.
    pub range_mul: f32,
    /// Chebyshev radius of the aura in cells.
    pub radius: u32,
}

impl Default for RuneAura {
    fn default() -> Self {
        Self {
            damage_mul: 1.06,
            range_mul: 1.05,
            radius: 2,
        }
    }
}

/// Terrain interaction knobs read by enemies and towers each tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainTuning {
    /// Chance per tick that a rune tile applies vulnerability.
    pub rune_vuln_chance: f32,
    /// Chance per tick that a magma tile ignites the enemy.
    pub magma_burn_chance: f32,
    /// Seconds added to an existing slow per tick on cryo tiles.
    pub cryo_tile_slow_extend: f32,
    /// Aura granted by powered runes.
    pub rune_aura: RuneAura,
}

impl Default for TerrainTuning {
    fn default() -> Self {
        Self {
            rune_vuln_chance: 0.10,
            magma_burn_chance: 0.25,
            cryo_tile_slow_extend: 0.05,
            rune_aura: RuneAura::default(),
        }
    }
}

/// Single resolved modification to [`RunStats`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Multiplies global tower damage.
    DamageMul(f32),
    /// Multiplies global tower fire rate.
    RateMul(f32),
    /// Multiplies global tower range.
    RangeMul(f32),
    /// Multiplies damage of one damage type.
    DamageTypeMul(DamageType, f32),
    /// Adds gold paid per kill.
    GoldPerKill(i64),
    /// Adds to the fragment drop chance.
    FragChance(f32),
    /// Adds to the end-of-wave interest rate.
    Interest(f32),
    /// Multiplies the weakness damage multiplier.
    WeaknessMul(f32),
    /// Multiplies enemy movement speed.
    EnemySpeedMul(f32),
    /// Multiplies tower placement cost.
    TowerCostMul(f32),
    /// Adds to the sell refund fraction.
    SellRefund(f32),
    /// Multiplies overclock duration.
    OverclockDurMul(f32),
    /// Adjusts a per-tower bonus.
    TowerBonus(TowerKey, BonusKind, f32),
    /// Adds a status to every damaging hit.
    GlobalOnHit(OnHit),
    /// Grants a one-off amount of a resource.
    Grant(ResourceKind, i64),
    /// Adds perk rerolls.
    PerkRerolls(u32),
    /// Raises a flag.
    Flag(FlagKind),
    /// Unlocks a tower for placement.
    UnlockTower(TowerKey),
    /// Unlocks a path variant for paving.
    UnlockPath(PathVariant),
    /// Sets the rune vulnerability chance.
    RuneVulnChance(f32),
    /// Sets the magma ignition chance.
    MagmaBurnChance(f32),
    /// Sets the cryo slow extension.
    CryoSlowExtend(f32),
    /// Replaces the powered rune aura.
    RuneAura(RuneAura),
}

/// Rarity tiers of perks, from most to least common.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Rarity {
    /// Common.
    #[serde(rename = "C")]
    Common,
    /// Rare.
    #[serde(rename = "R")]
    Rare,
    /// Epic.
    #[serde(rename = "E")]
    Epic,
    /// Legendary.
    #[serde(rename = "L")]
    Legendary,
    /// SS+.
    #[serde(rename = "SS+")]
    SsPlus,
    /// SS++.
    #[serde(rename = "SS++")]
    SsPlusPlus,
    /// SSS.
    #[serde(rename = "SSS")]
    Sss,
    /// Omega.
    #[serde(rename = "Ω")]
    Omega,
}

impl Rarity {
    /// Every rarity from most to least common.
    pub const ALL: [Rarity; 8] = [
        Rarity::Common,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::SsPlus,
        Rarity::SsPlusPlus,
        Rarity::Sss,
        Rarity::Omega,
    ];

    /// Short label shown next to perk names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Rarity::Common => "C",
            Rarity::Rare => "R",
            Rarity::Epic => "E",
            Rarity::Legendary => "L",
            Rarity::SsPlus => "SS+",
            Rarity::SsPlusPlus => "SS++",
            Rarity::Sss => "SSS",
            Rarity::Omega => "Ω",
        }
    }
}

/// Perk offered between waves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Perk {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Effects applied when chosen.
    pub effects: Vec<Effect>,
}

/// Node of the talent tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Talent {
    /// Stable identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Nodes that must be owned first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Nodes that lock this one out once owned.
    #[serde(default)]
    pub exclusive_with: Vec<String>,
    /// Effects applied on purchase.
    pub effects: Vec<Effect>,
}

/// Reasons a talent purchase can be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TalentError {
    /// The node is already owned.
    AlreadyOwned,
    /// No talent points remain.
    NoPoints,
    /// A mutually exclusive node is owned.
    Excluded,
    /// A prerequisite is missing.
    MissingPrerequisite,
}

/// Fragments spent on each perk reroll.
pub const PERK_REROLL_COST: i64 = 25;

/// Reasons a perk reroll can be refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RerollError {
    /// No rerolls remain.
    NoRerolls,
    /// Fewer fragments than a reroll costs.
    NotEnoughFragments,
}

/// Economic and progression state of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunStats {
    /// Spendable gold.
    pub gold: i64,
    /// Meta-progression fragments.
    pub fragments: i64,
    /// Path build budget.
    pub paves: i64,
    /// Upper bound for regenerated paves.
    pub paves_cap: i64,
    /// Remaining lives.
    pub lives: i64,
    /// Shield absorbing leaks before lives.
    pub core_shield: i64,
    /// Current wave number, starting at one.
    pub wave: u32,
    /// Unspent talent points.
    pub talent_points: u32,
    /// Owned talent nodes.
    pub talent_nodes: BTreeSet<String>,
    /// Remaining perk rerolls.
    pub perk_rerolls: u32,
    /// Global damage multiplier.
    pub dmg_mul: f32,
    /// Global fire-rate multiplier.
    pub rate_mul: f32,
    /// Global range multiplier.
    pub range_mul: f32,
    /// Gold added to every kill.
    pub gold_per_kill: i64,
    /// Chance that a kill drops a fragment.
    pub frag_chance: f32,
    /// Fraction of gold paid as interest each wave.
    pub interest: f32,
    /// Damage multiplier against an enemy's weakness.
    pub weakness_mul: f32,
    /// Enemy movement speed multiplier.
    pub enemy_speed_mul: f32,
    /// Tower placement cost multiplier.
    pub tower_cost_mul: f32,
    /// Fraction of spend refunded on sale.
    pub sell_refund: f32,
    /// Overclock duration multiplier.
    pub overclock_dur_mul: f32,
    /// Per-damage-type multipliers.
    pub damage_type_mul: DamageMultipliers,
    /// Boolean switches.
    pub flags: Flags,
    /// Per-tower bonuses.
    pub tower_bonus: BTreeMap<TowerKey, TowerBonus>,
    /// Statuses attached to every damaging hit.
    pub global_on_hit: BTreeMap<StatusKind, OnHit>,
    /// Towers available for placement.
    pub unlocked_towers: BTreeSet<TowerKey>,
    /// Path variants available for paving.
    pub unlocked_paths: BTreeSet<PathVariant>,
    /// Terrain interaction knobs.
    pub terrain: TerrainTuning,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            gold: 300,
            fragments: 0,
            paves: 120,
            paves_cap: 160,
            lives: 20,
            core_shield: 0,
            wave: 1,
            talent_points: 0,
            talent_nodes: BTreeSet::new(),
            perk_rerolls: 1,
            dmg_mul: 1.0,
            rate_mul: 1.0,
            range_mul: 1.0,
            gold_per_kill: 0,
            frag_chance: 0.10,
            interest: 0.02,
            weakness_mul: 1.8,
            enemy_speed_mul: 1.0,
            tower_cost_mul: 1.0,
            sell_refund: 0.70,
            overclock_dur_mul: 1.0,
            damage_type_mul: DamageMultipliers::default(),
            flags: Flags::default(),
            tower_bonus: BTreeMap::new(),
            global_on_hit: BTreeMap::new(),
            unlocked_towers: [TowerKey::Gatling, TowerKey::Cannon].into_iter().collect(),
            unlocked_paths: [PathVariant::Standard].into_iter().collect(),
            terrain: TerrainTuning::default(),
        }
    }
}

impl RunStats {
    /// Applies a single effect. Every effect funnels through this dispatcher.
    pub fn apply_effect(&mut self, effect: &Effect) {
        match *effect {
            Effect::DamageMul(value) => self.dmg_mul *= value,
            Effect::RateMul(value) => self.rate_mul *= value,
            Effect::RangeMul(value) => self.range_mul *= value,
            Effect::DamageTypeMul(damage_type, value) => {
                let current = self.damage_type_mul.get(damage_type);
                self.damage_type_mul.set(damage_type, current * value);
            }
            Effect::GoldPerKill(amount) => self.gold_per_kill += amount,
            Effect::FragChance(value) => self.frag_chance = (self.frag_chance + value).min(1.0),
            Effect::Interest(value) => self.interest += value,
            Effect::WeaknessMul(value) => self.weakness_mul *= value,
            Effect::EnemySpeedMul(value) => self.enemy_speed_mul *= value,
            Effect::TowerCostMul(value) => self.tower_cost_mul *= value,
            Effect::SellRefund(value) => {
                self.sell_refund = (self.sell_refund + value).clamp(0.0, 1.0);
            }
            Effect::OverclockDurMul(value) => self.overclock_dur_mul *= value,
            Effect::TowerBonus(key, kind, value) => {
                self.tower_bonus.entry(key).or_default().adjust(kind, value);
            }
            Effect::GlobalOnHit(on_hit) => {
                let _ = self.global_on_hit.insert(on_hit.kind, on_hit);
            }
            Effect::Grant(resource, amount) => self.grant(resource, amount),
            Effect::PerkRerolls(count) => self.perk_rerolls += count,
            Effect::Flag(flag) => self.flags.raise(flag),
            Effect::UnlockTower(key) => {
                let _ = self.unlocked_towers.insert(key);
            }
            Effect::UnlockPath(variant) => {
                let _ = self.unlocked_paths.insert(variant);
            }
            Effect::RuneVulnChance(value) => self.terrain.rune_vuln_chance = value,
            Effect::MagmaBurnChance(value) => self.terrain.magma_burn_chance = value,
            Effect::CryoSlowExtend(value) => self.terrain.cryo_tile_slow_extend = value,
            Effect::RuneAura(aura) => self.terrain.rune_aura = aura,
        }
    }

    fn grant(&mut self, resource: ResourceKind, amount: i64) {
        match resource {
            ResourceKind::Gold => self.gold += amount,
            ResourceKind::Fragments => self.fragments += amount,
            ResourceKind::Paves => self.paves += amount,
            ResourceKind::PavesCap => self.paves_cap += amount,
            ResourceKind::Lives => self.lives += amount,
            ResourceKind::CoreShield => self.core_shield += amount,
            ResourceKind::TalentPoints => {
                let added = u32::try_from(amount.max(0)).unwrap_or(u32::MAX);
                self.talent_points = self.talent_points.saturating_add(added);
            }
        }
    }

    /// Applies every effect carried by a perk.
    pub fn apply_perk(&mut self, perk: &Perk) {
        for effect in &perk.effects {
            self.apply_effect(effect);
        }
    }

    /// Checks whether a talent may be purchased right now.
    pub fn check_talent(&self, talent: &Talent) -> Result<(), TalentError> {
        if self.talent_nodes.contains(&talent.id) {
            return Err(TalentError::AlreadyOwned);
        }
        if self.talent_points == 0 {
            return Err(TalentError::NoPoints);
        }
        if talent
            .exclusive_with
            .iter()
            .any(|id| self.talent_nodes.contains(id))
        {
            return Err(TalentError::Excluded);
        }
        if !talent
            .prerequisites
            .iter()
            .all(|id| self.talent_nodes.contains(id))
        {
            return Err(TalentError::MissingPrerequisite);
        }
        Ok(())
    }

    /// Spends a talent point on the node and applies its effects.
    pub fn buy_talent(&mut self, talent: &Talent) -> Result<(), TalentError> {
        self.check_talent(talent)?;
        self.talent_points -= 1;
        let _ = self.talent_nodes.insert(talent.id.clone());
        for effect in &talent.effects {
            self.apply_effect(effect);
        }
        Ok(())
    }

    /// Consumes one reroll and its fragment cost.
    pub fn spend_perk_reroll(&mut self) -> Result<(), RerollError> {
        if self.perk_rerolls == 0 {
            return Err(RerollError::NoRerolls);
        }
        if self.fragments < PERK_REROLL_COST {
            return Err(RerollError::NotEnoughFragments);
        }
        self.perk_rerolls -= 1;
        self.fragments -= PERK_REROLL_COST;
        Ok(())
    }

    /// Pays interest, relic gold and regenerates paves at the end of a wave.
    pub fn end_wave_income(&mut self, relics_on_path: u32) {
        let interest = (self.gold.max(0) as f64 * f64::from(self.interest)).floor() as i64;
        self.gold += interest;
        if self.flags.path_gold {
            self.gold += 12 * i64::from(relics_on_path);
        }
        if self.paves < self.paves_cap {
            let regen = 8 + (2 * i64::from(relics_on_path)).min(8);
            self.paves = (self.paves + regen).min(self.paves_cap);
        }
    }

    /// Absorbs a leak with the core shield, falling back to lives.
    pub fn absorb_leak(&mut self) {
        if self.core_shield > 0 {
            self.core_shield -= 1;
        } else {
            self.lives -= 1;
        }
    }

    /// Gold needed to place a tower with the given base cost.
    #[must_use]
    pub fn tower_cost(&self, base_cost: i64) -> i64 {
        (base_cost as f64 * f64::from(self.tower_cost_mul)).floor() as i64
    }

    /// Bonus table for a tower, defaulting to neutral values.
    #[must_use]
    pub fn tower_bonus(&self, key: TowerKey) -> TowerBonus {
        self.tower_bonus.get(&key).copied().unwrap_or_default()
    }

    /// Reports whether the tower may be placed.
    #[must_use]
    pub fn is_tower_unlocked(&self, key: TowerKey) -> bool {
        self.unlocked_towers.contains(&key)
    }

    /// Reports whether the path variant may be paved.
    #[must_use]
    pub fn is_path_unlocked(&self, variant: PathVariant) -> bool {
        variant == PathVariant::Standard || self.unlocked_paths.contains(&variant)
    }

    /// Reports whether the run has ended.
    #[must_use]
    pub fn is_defeated(&self) -> bool {
        self.lives <= 0
    }
}
