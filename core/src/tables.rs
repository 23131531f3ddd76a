//! Tower and enemy data tables consumed by the simulation.

use serde::{Deserialize, Serialize};

use crate::{DamageType, EnemyKey, EnemyTag, OnHit, StatusKind, TowerKey};

/// Attack behaviour shared by a family of towers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TowerBehavior {
    /// Fires travelling projectiles at a single target.
    Projectile,
    /// Chills every enemy in range.
    Frost,
    /// Burns every enemy in range.
    Flame,
    /// Arcs lightning from a primary target to nearby enemies.
    Chain,
    /// Never attacks; buffs nearby towers instead.
    Support,
}

impl TowerBehavior {
    /// Reports whether the behaviour strikes every enemy in range at once.
    #[must_use]
    pub const fn is_area(self) -> bool {
        matches!(self, TowerBehavior::Frost | TowerBehavior::Flame)
    }
}

/// Multiplicative adjustments to the three core tower statistics.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatMods {
    /// Damage multiplier.
    pub damage_mul: f32,
    /// Fire-rate multiplier.
    pub rate_mul: f32,
    /// Range multiplier.
    pub range_mul: f32,
}

impl StatMods {
    /// Creates a new modifier triple.
    #[must_use]
    pub const fn new(damage_mul: f32, rate_mul: f32, range_mul: f32) -> Self {
        Self {
            damage_mul,
            rate_mul,
            range_mul,
        }
    }

    /// Combines two modifier triples multiplicatively.
    #[must_use]
    pub fn combine(self, other: StatMods) -> Self {
        Self {
            damage_mul: self.damage_mul * other.damage_mul,
            rate_mul: self.rate_mul * other.rate_mul,
            range_mul: self.range_mul * other.range_mul,
        }
    }
}

impl Default for StatMods {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// Aura broadcast by support towers.
pub type Aura = StatMods;

/// Typed modifier bag granted by a branch upgrade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchMods {
    /// Damage, rate and range multipliers.
    pub stats: StatMods,
    /// Extra splash radius in tiles.
    pub splash_add: f32,
    /// Extra enemies a projectile passes through.
    pub pierce_add: u32,
    /// Extra projectiles per shot.
    pub multishot: u32,
    /// Armour removed by each projectile hit.
    pub armor_shred: f32,
    /// Extra slow strength for frost towers.
    pub slow_strength_add: f32,
    /// Probability that a frost pulse stuns.
    pub stun_chance: f32,
    /// Stun duration in seconds.
    pub stun_duration: f32,
    /// Extra burn stacks for flame towers.
    pub burn_stacks_add: u32,
    /// Extra chain jumps for chain towers.
    pub chains_add: u32,
    /// Extra shock duration for chain towers.
    pub shock_dur_add: f32,
    /// Statuses applied on every hit.
    pub on_hit: Vec<OnHit>,
    /// Replacement aura for support towers.
    pub aura: Option<Aura>,
    /// Whether the aura strengthens while overclocked.
    pub aura_overclock: bool,
}

impl Default for BranchMods {
    fn default() -> Self {
        Self {
            stats: StatMods::default(),
            splash_add: 0.0,
            pierce_add: 0,
            multishot: 0,
            armor_shred: 0.0,
            slow_strength_add: 0.0,
            stun_chance: 0.0,
            stun_duration: 0.25,
            burn_stacks_add: 0,
            chains_add: 0,
            shock_dur_add: 0.0,
            on_hit: Vec::new(),
            aura: None,
            aura_overclock: false,
        }
    }
}

/// Named branch upgrade path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Name used to select the branch.
    pub name: String,
    /// Modifiers granted once chosen.
    pub mods: BranchMods,
}

impl Branch {
    fn new(name: &str, mods: BranchMods) -> Self {
        Self {
            name: name.to_owned(),
            mods,
        }
    }
}

/// Timed buff a tower can trigger manually.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overclock {
    /// Seconds the buff lasts before global scaling.
    pub duration: f32,
    /// Seconds before the buff can be triggered again.
    pub cooldown: f32,
    /// Multipliers applied while active.
    pub mods: StatMods,
}

impl Default for Overclock {
    fn default() -> Self {
        Self {
            duration: 4.0,
            cooldown: 14.0,
            mods: StatMods::default(),
        }
    }
}

/// Immutable definition of a tower archetype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerDefinition {
    /// Key identifying the archetype.
    pub key: TowerKey,
    /// Display name.
    pub name: String,
    /// Gold cost before global scaling.
    pub cost: i64,
    /// Damage per hit at level one.
    pub damage: f32,
    /// Attacks per second at level one.
    pub rate: f32,
    /// Attack range in tiles at level one.
    pub range: f32,
    /// Splash radius in tiles.
    #[serde(default)]
    pub splash: f32,
    /// Enemies a projectile passes through before vanishing.
    #[serde(default)]
    pub pierce: u32,
    /// Projectile speed in tiles per second.
    #[serde(default = "default_projectile_speed")]
    pub projectile_speed: f32,
    /// Damage type dealt.
    pub damage_type: DamageType,
    /// Attack behaviour.
    pub behavior: TowerBehavior,
    /// Probability a shot at an enemy on mud misses.
    #[serde(default = "default_mud_miss")]
    pub mud_miss_chance: f32,
    /// Mutually exclusive branch upgrades.
    #[serde(default)]
    pub branches: Vec<Branch>,
    /// Overclock ability.
    #[serde(default)]
    pub overclock: Overclock,
    /// Base aura for support towers.
    #[serde(default)]
    pub aura: Option<Aura>,
}

fn default_projectile_speed() -> f32 {
    12.0
}

fn default_mud_miss() -> f32 {
    0.24
}

impl TowerDefinition {
    /// Looks up a branch by name.
    #[must_use]
    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|branch| branch.name == name)
    }
}

/// Keyed collection of tower definitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerTable {
    definitions: Vec<TowerDefinition>,
}

impl TowerTable {
    /// Creates a table from the provided definitions.
    #[must_use]
    pub fn new(definitions: Vec<TowerDefinition>) -> Self {
        Self { definitions }
    }

    /// Looks up the definition for a key.
    #[must_use]
    pub fn get(&self, key: TowerKey) -> Option<&TowerDefinition> {
        self.definitions.iter().find(|definition| definition.key == key)
    }

    /// Iterates over every definition.
    pub fn iter(&self) -> impl Iterator<Item = &TowerDefinition> {
        self.definitions.iter()
    }

    /// Iterates mutably over every definition.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TowerDefinition> {
        self.definitions.iter_mut()
    }
}

/// Per-damage-type multipliers, defaulting to one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DamageMultipliers([f32; 7]);

impl DamageMultipliers {
    /// Multiplier for the damage type.
    #[must_use]
    pub fn get(&self, damage_type: DamageType) -> f32 {
        self.0[damage_type.index()]
    }

    /// Replaces the multiplier for the damage type.
    pub fn set(&mut self, damage_type: DamageType, value: f32) {
        self.0[damage_type.index()] = value;
    }

    /// Returns a copy with one multiplier replaced.
    #[must_use]
    pub fn with(mut self, damage_type: DamageType, value: f32) -> Self {
        self.set(damage_type, value);
        self
    }
}

impl Default for DamageMultipliers {
    fn default() -> Self {
        Self([1.0; 7])
    }
}

/// Immutable definition of an enemy archetype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyArchetype {
    /// Key identifying the archetype.
    pub key: EnemyKey,
    /// Display name.
    pub name: String,
    /// Movement speed in tiles per second.
    pub speed: f32,
    /// Health multiplier applied to the base pool of thirty.
    pub hp: f32,
    /// Flat armour.
    pub armor: f32,
    /// Health regenerated per second.
    pub regen: f32,
    /// Shield multiplier applied to the base pool of eight.
    pub shield: f32,
    /// Damage type that deals critical damage.
    pub weakness: Option<DamageType>,
    /// Damage multipliers applied after armour.
    #[serde(default)]
    pub resist: DamageMultipliers,
    /// Shield effectiveness multipliers.
    #[serde(default)]
    pub shield_mult: DamageMultipliers,
    /// Behavioural tags.
    #[serde(default)]
    pub tags: Vec<EnemyTag>,
}

impl EnemyArchetype {
    /// Reports whether the archetype carries the tag.
    #[must_use]
    pub fn has_tag(&self, tag: EnemyTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Keyed collection of enemy archetypes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyTable {
    archetypes: Vec<EnemyArchetype>,
}

impl EnemyTable {
    /// Creates a table from the provided archetypes.
    #[must_use]
    pub fn new(archetypes: Vec<EnemyArchetype>) -> Self {
        Self { archetypes }
    }

    /// Looks up the archetype for a key.
    #[must_use]
    pub fn get(&self, key: EnemyKey) -> Option<&EnemyArchetype> {
        self.archetypes.iter().find(|archetype| archetype.key == key)
    }

    /// Iterates over every archetype.
    pub fn iter(&self) -> impl Iterator<Item = &EnemyArchetype> {
        self.archetypes.iter()
    }

    /// Iterates mutably over every archetype.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EnemyArchetype> {
        self.archetypes.iter_mut()
    }
}

/// Tower and enemy tables bundled for a single run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameTables {
    /// Tower definitions.
    pub towers: TowerTable,
    /// Enemy archetypes.
    pub enemies: EnemyTable,
}

impl Default for GameTables {
    fn default() -> Self {
        Self {
            towers: TowerTable::new(default_towers()),
            enemies: EnemyTable::new(default_enemies()),
        }
    }
}

fn stats(damage_mul: f32, rate_mul: f32, range_mul: f32) -> StatMods {
    StatMods::new(damage_mul, rate_mul, range_mul)
}

#[allow(clippy::too_many_arguments)]
fn tower(
    key: TowerKey,
    name: &str,
    cost: i64,
    damage: f32,
    rate: f32,
    range: f32,
    damage_type: DamageType,
    behavior: TowerBehavior,
) -> TowerDefinition {
    TowerDefinition {
        key,
        name: name.to_owned(),
        cost,
        damage,
        rate,
        range,
        splash: 0.0,
        pierce: 0,
        projectile_speed: default_projectile_speed(),
        damage_type,
        behavior,
        mud_miss_chance: default_mud_miss(),
        branches: Vec::new(),
        overclock: Overclock::default(),
        aura: None,
    }
}

fn default_towers() -> Vec<TowerDefinition> {
    let gatling = TowerDefinition {
        branches: vec![
            Branch::new(
                "minigun",
                BranchMods {
                    stats: stats(1.0, 1.35, 1.0),
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "ap_rounds",
                BranchMods {
                    stats: stats(1.1, 1.0, 1.0),
                    armor_shred: 1.0,
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "twin",
                BranchMods {
                    multishot: 1,
                    ..BranchMods::default()
                },
            ),
        ],
        overclock: Overclock {
            mods: stats(1.0, 1.5, 1.0),
            ..Overclock::default()
        },
        ..tower(
            TowerKey::Gatling,
            "Gatling",
            60,
            6.0,
            4.0,
            2.6,
            DamageType::Kinetic,
            TowerBehavior::Projectile,
        )
    };

    let sniper = TowerDefinition {
        projectile_speed: 22.0,
        mud_miss_chance: 0.15,
        branches: vec![
            Branch::new(
                "deadeye",
                BranchMods {
                    stats: stats(1.4, 1.0, 1.0),
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "railgun",
                BranchMods {
                    pierce_add: 2,
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "marker",
                BranchMods {
                    on_hit: vec![OnHit::new(StatusKind::Vuln, 2.0)],
                    ..BranchMods::default()
                },
            ),
        ],
        overclock: Overclock {
            mods: stats(1.6, 1.0, 1.0),
            ..Overclock::default()
        },
        ..tower(
            TowerKey::Sniper,
            "Sniper",
            110,
            38.0,
            0.7,
            5.5,
            DamageType::Pierce,
            TowerBehavior::Projectile,
        )
    };

    let tesla = TowerDefinition {
        branches: vec![
            Branch::new(
                "storm",
                BranchMods {
                    chains_add: 2,
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "overload",
                BranchMods {
                    stats: stats(1.25, 1.0, 1.0),
                    shock_dur_add: 0.6,
                    ..BranchMods::default()
                },
            ),
        ],
        overclock: Overclock {
            mods: stats(1.2, 1.4, 1.0),
            ..Overclock::default()
        },
        ..tower(
            TowerKey::Tesla,
            "Tesla",
            120,
            14.0,
            1.1,
            3.0,
            DamageType::Energy,
            TowerBehavior::Chain,
        )
    };

    let cryo = TowerDefinition {
        branches: vec![
            Branch::new(
                "permafrost",
                BranchMods {
                    slow_strength_add: 0.1,
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "shatter",
                BranchMods {
                    stun_chance: 0.12,
                    stun_duration: 0.35,
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "brittle",
                BranchMods {
                    on_hit: vec![OnHit::new(StatusKind::Shred, 2.0)],
                    ..BranchMods::default()
                },
            ),
        ],
        overclock: Overclock {
            mods: stats(1.0, 1.3, 1.2),
            ..Overclock::default()
        },
        ..tower(
            TowerKey::Cryo,
            "Cryo",
            90,
            3.0,
            0.9,
            2.2,
            DamageType::Cold,
            TowerBehavior::Frost,
        )
    };

    let mortar = TowerDefinition {
        splash: 1.2,
        projectile_speed: 8.0,
        branches: vec![
            Branch::new(
                "cluster",
                BranchMods {
                    splash_add: 0.6,
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "napalm",
                BranchMods {
                    on_hit: vec![OnHit::new(StatusKind::Burn, 2.5).with_stacks(2)],
                    ..BranchMods::default()
                },
            ),
        ],
        overclock: Overclock {
            mods: stats(1.35, 1.0, 1.0),
            ..Overclock::default()
        },
        ..tower(
            TowerKey::Mortar,
            "Mortar",
            130,
            22.0,
            0.55,
            4.5,
            DamageType::Explosive,
            TowerBehavior::Projectile,
        )
    };

    let cannon = TowerDefinition {
        splash: 0.7,
        projectile_speed: 10.0,
        branches: vec![
            Branch::new(
                "heavy",
                BranchMods {
                    stats: stats(1.3, 1.0, 1.0),
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "shrapnel",
                BranchMods {
                    splash_add: 0.4,
                    pierce_add: 1,
                    ..BranchMods::default()
                },
            ),
        ],
        overclock: Overclock {
            mods: stats(1.0, 1.4, 1.0),
            ..Overclock::default()
        },
        ..tower(
            TowerKey::Cannon,
            "Cannon",
            100,
            18.0,
            0.9,
            3.0,
            DamageType::Explosive,
            TowerBehavior::Projectile,
        )
    };

    let beacon = TowerDefinition {
        aura: Some(stats(1.08, 1.05, 1.04)),
        branches: vec![
            Branch::new(
                "amplifier",
                BranchMods {
                    aura: Some(stats(1.12, 1.05, 1.0)),
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "relay",
                BranchMods {
                    aura: Some(stats(1.05, 1.12, 1.08)),
                    aura_overclock: true,
                    ..BranchMods::default()
                },
            ),
        ],
        ..tower(
            TowerKey::Beacon,
            "Beacon",
            140,
            0.0,
            1.0,
            2.5,
            DamageType::Kinetic,
            TowerBehavior::Support,
        )
    };

    let flame = TowerDefinition {
        branches: vec![
            Branch::new(
                "inferno",
                BranchMods {
                    burn_stacks_add: 2,
                    ..BranchMods::default()
                },
            ),
            Branch::new(
                "toxic",
                BranchMods {
                    on_hit: vec![OnHit::new(StatusKind::Poison, 2.4)],
                    ..BranchMods::default()
                },
            ),
        ],
        overclock: Overclock {
            mods: stats(1.3, 1.0, 1.15),
            ..Overclock::default()
        },
        ..tower(
            TowerKey::Flame,
            "Flame",
            95,
            4.0,
            2.0,
            1.8,
            DamageType::Fire,
            TowerBehavior::Flame,
        )
    };

    vec![gatling, sniper, tesla, cryo, mortar, cannon, beacon, flame]
}

#[allow(clippy::too_many_arguments)]
fn enemy(
    key: EnemyKey,
    name: &str,
    speed: f32,
    hp: f32,
    armor: f32,
    regen: f32,
    shield: f32,
    weakness: Option<DamageType>,
    tags: &[EnemyTag],
) -> EnemyArchetype {
    EnemyArchetype {
        key,
        name: name.to_owned(),
        speed,
        hp,
        armor,
        regen,
        shield,
        weakness,
        resist: DamageMultipliers::default(),
        shield_mult: DamageMultipliers::default(),
        tags: tags.to_vec(),
    }
}

fn default_enemies() -> Vec<EnemyArchetype> {
    use DamageType::{Bio, Cold, Energy, Fire, Kinetic, Pierce};

    let mut mutant = enemy(
        EnemyKey::Mutant,
        "Mutant",
        0.9,
        1.4,
        1.0,
        3.0,
        0.0,
        Some(Fire),
        &[EnemyTag::Regen],
    );
    mutant.resist = DamageMultipliers::default().with(Bio, 0.5);

    let mut pyro = enemy(
        EnemyKey::Pyro,
        "Pyro",
        1.0,
        1.2,
        1.0,
        0.0,
        0.0,
        Some(Cold),
        &[],
    );
    pyro.resist = DamageMultipliers::default().with(Fire, 0.4);

    let mut tank = enemy(
        EnemyKey::Tank,
        "Tank",
        0.6,
        3.0,
        6.0,
        0.0,
        0.0,
        Some(Pierce),
        &[EnemyTag::Armored],
    );
    tank.resist = DamageMultipliers::default().with(Kinetic, 0.8);

    let mut wisp = enemy(
        EnemyKey::Wisp,
        "Wisp",
        1.4,
        0.7,
        0.0,
        0.0,
        2.0,
        Some(Energy),
        &[EnemyTag::Shielded, EnemyTag::Fast],
    );
    wisp.resist = DamageMultipliers::default().with(Cold, 1.2);
    wisp.shield_mult = DamageMultipliers::default()
        .with(Energy, 1.5)
        .with(Kinetic, 0.8);

    let mut elite = enemy(
        EnemyKey::Elite,
        "Elite",
        0.9,
        2.6,
        3.0,
        1.0,
        3.0,
        Some(Energy),
        &[EnemyTag::Elite, EnemyTag::Shielded],
    );
    elite.shield_mult = DamageMultipliers::default().with(Energy, 1.5);

    let mut boss = enemy(
        EnemyKey::Boss,
        "Warlord",
        0.55,
        18.0,
        5.0,
        4.0,
        6.0,
        None,
        &[EnemyTag::Boss, EnemyTag::Regen, EnemyTag::Shielded],
    );
    boss.resist = DamageMultipliers::default().with(Cold, 0.8);
    boss.shield_mult = DamageMultipliers::default().with(Energy, 1.3);

    vec![
        enemy(
            EnemyKey::Soldier,
            "Soldier",
            1.0,
            1.0,
            0.0,
            0.0,
            0.0,
            None,
            &[],
        ),
        enemy(
            EnemyKey::Scout,
            "Scout",
            1.7,
            0.6,
            0.0,
            0.0,
            0.0,
            Some(Cold),
            &[EnemyTag::Fast],
        ),
        mutant,
        pyro,
        tank,
        wisp,
        elite,
        boss,
        enemy(
            EnemyKey::Sapper,
            "Sapper",
            1.1,
            1.1,
            2.0,
            0.0,
            0.0,
            Some(Pierce),
            &[EnemyTag::Sapper],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_cover_every_key() {
        let tables = GameTables::default();
        for key in TowerKey::ALL {
            assert!(tables.towers.get(key).is_some(), "missing tower {key:?}");
        }
        for key in EnemyKey::ALL {
            assert!(tables.enemies.get(key).is_some(), "missing enemy {key:?}");
        }
    }

    #[test]
    fn branches_are_capped_at_three() {
        let tables = GameTables::default();
        for definition in tables.towers.iter() {
            assert!(!definition.branches.is_empty());
            assert!(definition.branches.len() <= 3, "{:?}", definition.key);
        }
    }

    #[test]
    fn soldier_is_an_unarmoured_baseline() {
        let tables = GameTables::default();
        let soldier = tables.enemies.get(EnemyKey::Soldier).expect("soldier");
        assert_eq!(soldier.armor, 0.0);
        assert_eq!(soldier.shield, 0.0);
        assert_eq!(soldier.weakness, None);
        assert_eq!(soldier.resist, DamageMultipliers::default());
    }

    #[test]
    fn tables_survive_binary_round_trip() {
        let tables = GameTables::default();
        let bytes = bincode::serialize(&tables).expect("serialize tables");
        let decoded: GameTables = bincode::deserialize(&bytes).expect("deserialize tables");
        assert_eq!(decoded, tables);
    }

    #[test]
    fn partial_json_definitions_use_defaults() {
        let json = r#"{
            "key": "GATLING", "name": "Test", "cost": 10, "damage": 1.0,
            "rate": 1.0, "range": 2.0, "damage_type": "KINETIC",
            "behavior": "projectile"
        }"#;
        let definition: TowerDefinition = serde_json::from_str(json).expect("parse");
        assert_eq!(definition.projectile_speed, 12.0);
        assert_eq!(definition.mud_miss_chance, 0.24);
        assert_eq!(definition.overclock.duration, 4.0);
        assert!(definition.branches.is_empty());
    }
}
