//! Procedural perk catalog and rarity-weighted rolls.

use std::collections::HashSet;

use pathforge_core::{
    BonusKind, DamageType, Effect, OnHit, Perk, Rarity, ResourceKind, StatusKind, TowerKey,
};
use rand::Rng;

const MAX_ROLL_ATTEMPTS: usize = 5000;
const MAX_RARITY_BIAS: f32 = 0.60;
const MAX_ON_HIT_CHANCE: f32 = 0.80;
/// Range perks roll a reduced share of the shared multiplier ranges.
const RANGE_SCALE: f32 = 0.7;

const BASE_WEIGHTS: [f64; 8] = [1.0, 0.35, 0.12, 0.03, 0.006, 0.0012, 0.000_05, 0.000_000_08];
const BIAS_SLOPES: [f64; 8] = [-0.78, -0.55, 0.40, 1.05, 1.90, 2.50, 3.10, 3.60];

const DAMAGE_FLAVOURS: [&str; 12] = [
    "Forge",
    "Rage",
    "Discipline",
    "Focus",
    "Fury",
    "Zenith",
    "Momentum",
    "Overdrive",
    "Precision",
    "Anvil",
    "Ascension",
    "Vanguard",
];
const ECONOMY_FLAVOURS: [&str; 12] = [
    "Exchange",
    "Tribute",
    "Plunder",
    "Tithe",
    "Contract",
    "Bounty",
    "Brokerage",
    "Profit",
    "Usury",
    "Goldsmith",
    "Banker",
    "Wager",
];
const UTILITY_FLAVOURS: [&str; 10] = [
    "Cartography",
    "Sighting",
    "Scope",
    "Optics",
    "Recon",
    "Radar",
    "Tactics",
    "Coordination",
    "Command",
    "Ballistics",
];
const ON_HIT_FLAVOURS: [&str; 10] = [
    "Spark",
    "Fissure",
    "Bleed",
    "Corrosion",
    "Frost",
    "Surge",
    "Scar",
    "Marking",
    "Fracture",
    "Venom",
];
const STATUS_TEMPLATES: [(StatusKind, f32); 5] = [
    (StatusKind::Shred, 2.0),
    (StatusKind::Poison, 2.4),
    (StatusKind::Vuln, 1.6),
    (StatusKind::Slow, 1.0),
    (StatusKind::Shock, 1.2),
];

/// How a template turns into concrete effects when rolled.
#[derive(Clone, Debug, PartialEq)]
pub enum RollKind {
    /// Global damage multiplier.
    DamageMul,
    /// Global fire-rate multiplier.
    RateMul,
    /// Global range multiplier.
    RangeMul,
    /// Damage multiplier for one damage type.
    DamageTypeMul(DamageType),
    /// Additive gold per kill.
    GoldPerKill,
    /// One-off paves grant.
    Paves,
    /// Paves cap increase.
    PavesCap,
    /// One talent point.
    TalentPoint,
    /// Damage multiplier for one tower.
    TowerDamage(TowerKey),
    /// Fire-rate multiplier for one tower.
    TowerRate(TowerKey),
    /// Chance to apply a status on every hit.
    GlobalOnHit {
        /// Status applied.
        status: StatusKind,
        /// Status duration in seconds.
        duration: f32,
        /// Stacks applied.
        stacks: u32,
    },
    /// Fixed effects with nothing to roll.
    Fixed(Vec<Effect>),
}

/// Unrolled catalog entry.
#[derive(Clone, Debug, PartialEq)]
pub struct PerkTemplate {
    /// Stable identifier shared by every roll of the template.
    pub id: String,
    /// Base display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Roll recipe.
    pub roll: RollKind,
}

impl PerkTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, rarity: Rarity, roll: RollKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rarity,
            roll,
        }
    }

    /// Resolves the template into a concrete perk.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> Perk {
        let rarity = self.rarity;
        let (name, effects) = match &self.roll {
            RollKind::DamageMul => {
                let value = roll_fraction(rarity, 1.0, rng);
                (percent_name(&self.name, value), vec![Effect::DamageMul(1.0 + value)])
            }
            RollKind::RateMul => {
                let value = roll_fraction(rarity, 1.0, rng);
                (percent_name(&self.name, value), vec![Effect::RateMul(1.0 + value)])
            }
            RollKind::RangeMul => {
                let value = roll_fraction(rarity, RANGE_SCALE, rng);
                (percent_name(&self.name, value), vec![Effect::RangeMul(1.0 + value)])
            }
            RollKind::DamageTypeMul(damage_type) => {
                let value = roll_fraction(rarity, 1.0, rng);
                (
                    percent_name(&self.name, value),
                    vec![Effect::DamageTypeMul(*damage_type, 1.0 + value)],
                )
            }
            RollKind::GoldPerKill => {
                let (low, high) = gold_range(rarity);
                let value = rng.gen_range(low..=high);
                (
                    format!("{} +{value} gold/kill", self.name),
                    vec![Effect::GoldPerKill(value)],
                )
            }
            RollKind::Paves => {
                let (low, high) = paves_range(rarity);
                let value = rng.gen_range(low..=high);
                (
                    format!("{} +{value} paves", self.name),
                    vec![Effect::Grant(ResourceKind::Paves, value)],
                )
            }
            RollKind::PavesCap => {
                let (low, high) = paves_range(rarity);
                let value = rng.gen_range(low..=high);
                (
                    format!("{} +{value} cap", self.name),
                    vec![Effect::Grant(ResourceKind::PavesCap, value)],
                )
            }
            RollKind::TalentPoint => (
                format!("{} +1 talent point", self.name),
                vec![Effect::Grant(ResourceKind::TalentPoints, 1)],
            ),
            RollKind::TowerDamage(key) => {
                let value = roll_fraction(rarity, 1.0, rng);
                (
                    percent_name(&self.name, value),
                    vec![Effect::TowerBonus(*key, BonusKind::DamageMul, 1.0 + value)],
                )
            }
            RollKind::TowerRate(key) => {
                let value = roll_fraction(rarity, 1.0, rng);
                (
                    percent_name(&self.name, value),
                    vec![Effect::TowerBonus(*key, BonusKind::RateMul, 1.0 + value)],
                )
            }
            RollKind::GlobalOnHit {
                status,
                duration,
                stacks,
            } => {
                let chance =
                    (on_hit_base_chance(rarity) + rng.gen::<f32>() * 0.06).min(MAX_ON_HIT_CHANCE);
                let on_hit = OnHit::new(*status, *duration)
                    .with_stacks(*stacks)
                    .with_chance(chance);
                (
                    format!("{} ({}%)", self.name, (chance * 100.0) as u32),
                    vec![Effect::GlobalOnHit(on_hit)],
                )
            }
            RollKind::Fixed(effects) => (self.name.clone(), effects.clone()),
        };

        Perk {
            id: self.id.clone(),
            name,
            rarity,
            effects,
        }
    }
}

/// Rarity weights reshaped by `bias`, indexed like [`Rarity::ALL`].
///
/// The bias is clamped to `0.0..=0.6` and moves probability mass from the
/// common tiers towards the rare ones.
#[must_use]
pub fn rarity_weights(bias: f32) -> [f64; 8] {
    let bias = f64::from(bias.clamp(0.0, MAX_RARITY_BIAS));
    let mut weights = BASE_WEIGHTS;
    for (weight, slope) in weights.iter_mut().zip(BIAS_SLOPES) {
        *weight *= 1.0 + slope * bias;
    }
    weights
}

/// Perk catalog bucketed by rarity.
#[derive(Clone, Debug)]
pub struct PerkFactory {
    templates: Vec<PerkTemplate>,
    buckets: [Vec<usize>; 8],
}

impl Default for PerkFactory {
    fn default() -> Self {
        Self::procedural()
    }
}

impl PerkFactory {
    /// Builds a factory over explicit templates.
    #[must_use]
    pub fn with_templates(templates: Vec<PerkTemplate>) -> Self {
        let mut buckets: [Vec<usize>; 8] = Default::default();
        for (index, template) in templates.iter().enumerate() {
            buckets[rarity_index(template.rarity)].push(index);
        }
        Self { templates, buckets }
    }

    /// Builds the full procedural catalog.
    #[must_use]
    pub fn procedural() -> Self {
        let mut templates = Vec::new();

        for rarity in Rarity::ALL {
            let tag = rarity.label();
            for (index, flavour) in DAMAGE_FLAVOURS.iter().enumerate() {
                templates.push(PerkTemplate::new(
                    format!("GEN_DMG_{tag}_{index}"),
                    format!("{flavour} (Damage)"),
                    rarity,
                    RollKind::DamageMul,
                ));
                templates.push(PerkTemplate::new(
                    format!("GEN_RATE_{tag}_{index}"),
                    format!("{flavour} (Rate)"),
                    rarity,
                    RollKind::RateMul,
                ));
            }
            for (index, flavour) in UTILITY_FLAVOURS.iter().enumerate() {
                templates.push(PerkTemplate::new(
                    format!("GEN_RANGE_{tag}_{index}"),
                    format!("{flavour} (Range)"),
                    rarity,
                    RollKind::RangeMul,
                ));
            }
            for (index, flavour) in ECONOMY_FLAVOURS.iter().enumerate() {
                templates.push(PerkTemplate::new(
                    format!("GEN_GPK_{tag}_{index}"),
                    format!("{flavour} (Bounty)"),
                    rarity,
                    RollKind::GoldPerKill,
                ));
                templates.push(PerkTemplate::new(
                    format!("GEN_PAV_{tag}_{index}"),
                    format!("{flavour} (Paves)"),
                    rarity,
                    RollKind::Paves,
                ));
                templates.push(PerkTemplate::new(
                    format!("GEN_CAP_{tag}_{index}"),
                    format!("{flavour} (Cap)"),
                    rarity,
                    RollKind::PavesCap,
                ));
            }
        }

        for damage_type in DamageType::ALL {
            let type_name = format!("{damage_type:?}").to_uppercase();
            for rarity in Rarity::ALL {
                for (index, flavour) in DAMAGE_FLAVOURS.iter().enumerate() {
                    templates.push(PerkTemplate::new(
                        format!("DT_{type_name}_{}_{index}", rarity.label()),
                        format!("{flavour} • {type_name}"),
                        rarity,
                        RollKind::DamageTypeMul(damage_type),
                    ));
                }
            }
        }

        for key in TowerKey::ALL {
            let tower_name = format!("{key:?}").to_uppercase();
            for rarity in Rarity::ALL {
                for (index, flavour) in DAMAGE_FLAVOURS.iter().enumerate() {
                    templates.push(PerkTemplate::new(
                        format!("T_{tower_name}_DMG_{}_{index}", rarity.label()),
                        format!("{flavour} • {tower_name} Damage"),
                        rarity,
                        RollKind::TowerDamage(key),
                    ));
                    templates.push(PerkTemplate::new(
                        format!("T_{tower_name}_RATE_{}_{index}", rarity.label()),
                        format!("{flavour} • {tower_name} Rate"),
                        rarity,
                        RollKind::TowerRate(key),
                    ));
                }
            }
        }

        for (status, duration) in STATUS_TEMPLATES {
            let status_name = format!("{status:?}").to_uppercase();
            for rarity in Rarity::ALL {
                for (index, flavour) in ON_HIT_FLAVOURS.iter().enumerate() {
                    templates.push(PerkTemplate::new(
                        format!("GOH_{status_name}_{}_{index}", rarity.label()),
                        format!("{flavour} • {status_name}"),
                        rarity,
                        RollKind::GlobalOnHit {
                            status,
                            duration,
                            stacks: 1,
                        },
                    ));
                }
            }
        }

        templates.extend(unique_templates());
        Self::with_templates(templates)
    }

    /// Number of templates in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Reports whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterates over the catalog templates.
    pub fn templates(&self) -> impl Iterator<Item = &PerkTemplate> {
        self.templates.iter()
    }

    /// Rolls up to `count` perks with distinct ids.
    ///
    /// Fewer perks are returned when the catalog cannot supply enough distinct
    /// templates within the attempt limit.
    pub fn roll<R: Rng + ?Sized>(&self, count: usize, rarity_bias: f32, rng: &mut R) -> Vec<Perk> {
        let mut picks = Vec::with_capacity(count);
        if self.templates.is_empty() {
            return picks;
        }

        let weights = rarity_weights(rarity_bias);
        let mut used = HashSet::new();
        let mut attempts = 0;
        while picks.len() < count && attempts < MAX_ROLL_ATTEMPTS {
            attempts += 1;
            let rarity = pick_weighted(&weights, rng);
            let Some(bucket) = self.bucket(rarity) else {
                break;
            };
            let template = &self.templates[bucket[rng.gen_range(0..bucket.len())]];
            if !used.insert(template.id.as_str()) {
                continue;
            }
            picks.push(template.resolve(rng));
        }
        picks
    }

    /// Bucket for `rarity`, or the most common non-empty bucket.
    fn bucket(&self, rarity: usize) -> Option<&[usize]> {
        if !self.buckets[rarity].is_empty() {
            return Some(&self.buckets[rarity]);
        }
        self.buckets
            .iter()
            .find(|bucket| !bucket.is_empty())
            .map(Vec::as_slice)
    }
}

fn unique_templates() -> Vec<PerkTemplate> {
    vec![
        PerkTemplate::new(
            "OMEGA_TALENT_PT",
            "Awakening",
            Rarity::Omega,
            RollKind::TalentPoint,
        ),
        PerkTemplate::new(
            "OMEGA_RELIC_0",
            "Primordial Key",
            Rarity::Omega,
            RollKind::Fixed(vec![Effect::DamageMul(1.25), Effect::RateMul(1.12)]),
        ),
        PerkTemplate::new(
            "OMEGA_RELIC_1",
            "Heart of the Forge",
            Rarity::Omega,
            RollKind::Fixed(vec![Effect::GoldPerKill(25)]),
        ),
        PerkTemplate::new(
            "OMEGA_RELIC_2",
            "Seal of Infinity",
            Rarity::Omega,
            RollKind::Fixed(vec![Effect::PerkRerolls(2)]),
        ),
        PerkTemplate::new(
            "OMEGA_RELIC_3",
            "Absolute Fragment",
            Rarity::Omega,
            RollKind::Fixed(vec![Effect::RangeMul(1.18), Effect::TowerCostMul(0.90)]),
        ),
        PerkTemplate::new(
            "SSS_REROLL_1",
            "Forge of Fate • +1 reroll",
            Rarity::Sss,
            RollKind::Fixed(vec![Effect::PerkRerolls(1)]),
        ),
        PerkTemplate::new(
            "L_REROLL_1",
            "Reroll • +1",
            Rarity::Legendary,
            RollKind::Fixed(vec![Effect::PerkRerolls(1)]),
        ),
    ]
}

fn rarity_index(rarity: Rarity) -> usize {
    Rarity::ALL
        .iter()
        .position(|candidate| *candidate == rarity)
        .unwrap_or(0)
}

fn pick_weighted<R: Rng + ?Sized>(weights: &[f64; 8], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0;
    }
    let target = rng.gen::<f64>() * total;
    let mut accumulated = 0.0;
    for (index, weight) in weights.iter().enumerate() {
        accumulated += weight;
        if accumulated >= target {
            return index;
        }
    }
    weights.len() - 1
}

fn roll_fraction<R: Rng + ?Sized>(rarity: Rarity, scale: f32, rng: &mut R) -> f32 {
    let (low, high) = multiplier_range(rarity);
    rng.gen_range(low * scale..high * scale)
}

fn percent_name(base: &str, value: f32) -> String {
    format!("{base} +{}%", (value * 100.0).round() as i32)
}

fn multiplier_range(rarity: Rarity) -> (f32, f32) {
    match rarity {
        Rarity::Common => (0.06, 0.12),
        Rarity::Rare => (0.12, 0.20),
        Rarity::Epic => (0.20, 0.32),
        Rarity::Legendary => (0.32, 0.48),
        Rarity::SsPlus => (0.48, 0.70),
        Rarity::SsPlusPlus => (0.70, 0.95),
        Rarity::Sss => (0.95, 1.25),
        Rarity::Omega => (1.25, 1.80),
    }
}

fn gold_range(rarity: Rarity) -> (i64, i64) {
    match rarity {
        Rarity::Common => (1, 2),
        Rarity::Rare => (2, 4),
        Rarity::Epic => (4, 7),
        Rarity::Legendary => (7, 11),
        Rarity::SsPlus => (11, 16),
        Rarity::SsPlusPlus => (16, 23),
        Rarity::Sss => (23, 32),
        Rarity::Omega => (40, 60),
    }
}

fn paves_range(rarity: Rarity) -> (i64, i64) {
    match rarity {
        Rarity::Common => (2, 4),
        Rarity::Rare => (4, 7),
        Rarity::Epic => (7, 12),
        Rarity::Legendary => (12, 18),
        Rarity::SsPlus => (18, 28),
        Rarity::SsPlusPlus => (28, 40),
        Rarity::Sss => (40, 60),
        Rarity::Omega => (80, 120),
    }
}

fn on_hit_base_chance(rarity: Rarity) -> f32 {
    match rarity {
        Rarity::Common => 0.10,
        Rarity::Rare => 0.14,
        Rarity::Epic => 0.18,
        Rarity::Legendary => 0.24,
        Rarity::SsPlus => 0.30,
        Rarity::SsPlusPlus => 0.36,
        Rarity::Sss => 0.42,
        Rarity::Omega => 0.55,
    }
}
