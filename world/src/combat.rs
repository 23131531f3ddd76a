//! Damage resolution and status bookkeeping for enemies.

use std::collections::BTreeMap;

use pathforge_core::{DamageMultipliers, DamageType, OnHit, StatusKind};

/// Highest stack count reachable by additive statuses.
const MAX_ADDITIVE_STACKS: u32 = 10;

/// Active status on an enemy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Status {
    /// Seconds remaining.
    pub duration: f32,
    /// Stack count.
    pub stacks: u32,
    /// Strength, meaningful for slows.
    pub strength: f32,
}

/// Aggregate effect of all statuses for the current tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TickModifiers {
    /// Fraction of speed removed by slows.
    pub slow: f32,
    /// Whether movement is suppressed.
    pub stunned: bool,
    /// Armour removed by shred.
    pub shred: f32,
    /// Extra damage fraction taken.
    pub vuln: f32,
    /// Fire damage per second.
    pub burn_dps: f32,
    /// Bio damage per second.
    pub poison_dps: f32,
    /// Whether a shock is active.
    pub shocked: bool,
}

/// Statuses keyed by kind; at most one entry per kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusBook {
    entries: BTreeMap<StatusKind, Status>,
}

impl StatusBook {
    /// Merges a status into the book.
    ///
    /// Duration and strength keep the maximum. Stacks keep the maximum for
    /// refreshing kinds and otherwise add up to a cap of ten.
    pub fn add(&mut self, on_hit: &OnHit) {
        let incoming = Status {
            duration: on_hit.duration,
            stacks: on_hit.stacks.max(1),
            strength: on_hit.strength,
        };
        match self.entries.get_mut(&on_hit.kind) {
            Some(existing) => {
                existing.duration = existing.duration.max(incoming.duration);
                existing.stacks = if on_hit.kind.refreshes_stacks() {
                    existing.stacks.max(incoming.stacks)
                } else {
                    (existing.stacks + incoming.stacks).min(MAX_ADDITIVE_STACKS)
                };
                existing.strength = existing.strength.max(incoming.strength);
            }
            None => {
                let _ = self.entries.insert(on_hit.kind, incoming);
            }
        }
    }

    /// Status currently stored for the kind.
    #[must_use]
    pub fn get(&self, kind: StatusKind) -> Option<&Status> {
        self.entries.get(&kind)
    }

    /// Extends an existing status, returning whether one was present.
    pub fn extend(&mut self, kind: StatusKind, seconds: f32) -> bool {
        match self.entries.get_mut(&kind) {
            Some(status) => {
                status.duration += seconds;
                true
            }
            None => false,
        }
    }

    /// Reports whether no statuses are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ages every status by `dt`, drops expired ones and aggregates the rest.
    pub fn tick(&mut self, dt: f32, boss: bool) -> TickModifiers {
        for status in self.entries.values_mut() {
            status.duration -= dt;
        }
        self.entries.retain(|_, status| status.duration > 0.0);

        let slow_cap = if boss { 0.40 } else { 0.50 };
        let mut modifiers = TickModifiers::default();
        for (kind, status) in &self.entries {
            let stacks = status.stacks as f32;
            match kind {
                StatusKind::Slow => {
                    let slow = (status.strength + 0.04 * (stacks - 1.0)).min(slow_cap);
                    modifiers.slow = modifiers.slow.max(slow);
                }
                StatusKind::Stun => modifiers.stunned = true,
                StatusKind::Shred => modifiers.shred = modifiers.shred.max(0.8 * stacks),
                StatusKind::Vuln => modifiers.vuln = modifiers.vuln.max(0.12 * stacks),
                StatusKind::Burn => modifiers.burn_dps += 1.2 + 0.9 * stacks,
                StatusKind::Poison => modifiers.poison_dps += 0.9 + 0.7 * stacks,
                StatusKind::Shock => modifiers.shocked = true,
            }
        }
        modifiers
    }
}

/// Mutable health, shield and armour of an enemy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vitals {
    /// Current health.
    pub hp: f32,
    /// Maximum health.
    pub max_hp: f32,
    /// Current shield.
    pub shield: f32,
    /// Armour before shred.
    pub base_armor: f32,
    /// Armour after shred for the current tick.
    pub armor: f32,
    /// Multiplier applied to incoming damage by vulnerability.
    pub vuln_mult: f32,
    /// Whether the enemy is still alive.
    pub alive: bool,
}

impl Vitals {
    /// Creates full-health vitals.
    #[must_use]
    pub fn new(max_hp: f32, shield: f32, armor: f32) -> Self {
        Self {
            hp: max_hp,
            max_hp,
            shield,
            base_armor: armor,
            armor,
            vuln_mult: 1.0,
            alive: true,
        }
    }
}

/// Static defensive traits consulted while resolving a hit.
#[derive(Clone, Copy, Debug)]
pub struct Defenses<'a> {
    /// Damage type that crits.
    pub weakness: Option<DamageType>,
    /// Multiplier applied on a weakness hit.
    pub weakness_mul: f32,
    /// Post-armour damage multipliers.
    pub resist: &'a DamageMultipliers,
    /// Shield effectiveness multipliers.
    pub shield_mult: &'a DamageMultipliers,
    /// Whether the enemy stands on a cryo tile.
    pub on_cryo: bool,
}

/// Outcome of a single damage application.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DamageReport {
    /// Whether the hit exploited the enemy's weakness.
    pub crit: bool,
    /// Health removed.
    pub dealt: f32,
    /// Shield removed.
    pub absorbed: f32,
}

/// Resolves a hit in the fixed order terrain, vulnerability, shield, armour,
/// weakness, resistance.
pub fn resolve_damage(
    vitals: &mut Vitals,
    defenses: &Defenses<'_>,
    amount: f32,
    damage_type: DamageType,
) -> DamageReport {
    if !vitals.alive {
        return DamageReport::default();
    }

    let mut amount = amount;
    if damage_type == DamageType::Fire && defenses.on_cryo {
        amount *= 0.80;
    }
    amount *= vitals.vuln_mult;

    let mut absorbed = 0.0;
    if vitals.shield > 0.0 {
        let multiplier = defenses.shield_mult.get(damage_type);
        let effective = amount * multiplier;
        if effective <= vitals.shield {
            vitals.shield -= effective;
            return DamageReport {
                crit: false,
                dealt: 0.0,
                absorbed: effective,
            };
        }
        absorbed = vitals.shield;
        amount = (effective - vitals.shield) / multiplier.max(0.01);
        vitals.shield = 0.0;
    }

    if damage_type.is_armored_against() {
        let armor = if damage_type == DamageType::Pierce {
            vitals.armor * 0.5
        } else {
            vitals.armor
        };
        amount = (amount - armor).max(1.0);
    }

    let crit = defenses.weakness == Some(damage_type);
    if crit {
        amount *= defenses.weakness_mul;
    }

    amount *= defenses.resist.get(damage_type);

    vitals.hp -= amount;
    if vitals.hp <= 0.0 {
        vitals.alive = false;
    }

    DamageReport {
        crit,
        dealt: amount,
        absorbed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defenses<'a>(
        resist: &'a DamageMultipliers,
        shield_mult: &'a DamageMultipliers,
        weakness: Option<DamageType>,
    ) -> Defenses<'a> {
        Defenses {
            weakness,
            weakness_mul: 1.8,
            resist,
            shield_mult,
            on_cryo: false,
        }
    }

    #[test]
    fn shield_overage_carries_into_health_space() {
        let resist = DamageMultipliers::default();
        let shield_mult = DamageMultipliers::default().with(DamageType::Energy, 1.5);
        let mut vitals = Vitals::new(200.0, 100.0, 0.0);

        let report = resolve_damage(
            &mut vitals,
            &defenses(&resist, &shield_mult, None),
            80.0,
            DamageType::Energy,
        );

        assert_eq!(vitals.shield, 0.0);
        assert!((report.dealt - 20.0 / 1.5).abs() < 1e-4);
        assert!((vitals.hp - (200.0 - 13.333_333)).abs() < 1e-3);
        assert!(!report.crit);
    }

    #[test]
    fn shield_absorbs_hits_it_can_cover() {
        let resist = DamageMultipliers::default();
        let shield_mult = DamageMultipliers::default();
        let mut vitals = Vitals::new(50.0, 30.0, 0.0);

        let report = resolve_damage(
            &mut vitals,
            &defenses(&resist, &shield_mult, Some(DamageType::Kinetic)),
            30.0,
            DamageType::Kinetic,
        );

        assert_eq!(vitals.shield, 0.0);
        assert_eq!(vitals.hp, 50.0);
        assert_eq!(report, DamageReport {
            crit: false,
            dealt: 0.0,
            absorbed: 30.0,
        });
    }

    #[test]
    fn armor_never_reduces_a_hit_below_one() {
        let resist = DamageMultipliers::default();
        let shield_mult = DamageMultipliers::default();
        let mut vitals = Vitals::new(100.0, 0.0, 50.0);

        let report = resolve_damage(
            &mut vitals,
            &defenses(&resist, &shield_mult, None),
            10.0,
            DamageType::Kinetic,
        );

        assert_eq!(report.dealt, 1.0);
        assert_eq!(vitals.hp, 99.0);
    }

    #[test]
    fn pierce_counts_half_the_armor() {
        let resist = DamageMultipliers::default();
        let shield_mult = DamageMultipliers::default();
        let mut vitals = Vitals::new(100.0, 0.0, 10.0);

        let report = resolve_damage(
            &mut vitals,
            &defenses(&resist, &shield_mult, None),
            20.0,
            DamageType::Pierce,
        );

        assert_eq!(report.dealt, 15.0);
    }

    #[test]
    fn armor_ignores_elemental_damage() {
        let resist = DamageMultipliers::default();
        let shield_mult = DamageMultipliers::default();
        let mut vitals = Vitals::new(100.0, 0.0, 50.0);

        let report = resolve_damage(
            &mut vitals,
            &defenses(&resist, &shield_mult, None),
            10.0,
            DamageType::Cold,
        );

        assert_eq!(report.dealt, 10.0);
    }

    #[test]
    fn weakness_flags_crit_only_for_matching_type() {
        let resist = DamageMultipliers::default();
        let shield_mult = DamageMultipliers::default();
        let defenses = defenses(&resist, &shield_mult, Some(DamageType::Fire));

        let mut vitals = Vitals::new(100.0, 0.0, 0.0);
        let fire = resolve_damage(&mut vitals, &defenses, 10.0, DamageType::Fire);
        assert!(fire.crit);
        assert!((fire.dealt - 18.0).abs() < 1e-4);

        for other in DamageType::ALL
            .into_iter()
            .filter(|damage_type| *damage_type != DamageType::Fire)
        {
            let mut vitals = Vitals::new(100.0, 0.0, 0.0);
            assert!(!resolve_damage(&mut vitals, &defenses, 10.0, other).crit);
        }
    }

    #[test]
    fn resistance_is_a_multiplier_applied_last() {
        let resist = DamageMultipliers::default().with(DamageType::Bio, 0.5);
        let shield_mult = DamageMultipliers::default();
        let mut vitals = Vitals::new(100.0, 0.0, 0.0);
        vitals.vuln_mult = 1.2;

        let report = resolve_damage(
            &mut vitals,
            &defenses(&resist, &shield_mult, Some(DamageType::Bio)),
            10.0,
            DamageType::Bio,
        );

        assert!((report.dealt - 10.0 * 1.2 * 1.8 * 0.5).abs() < 1e-4);
    }

    #[test]
    fn fire_is_dampened_on_cryo_tiles() {
        let resist = DamageMultipliers::default();
        let shield_mult = DamageMultipliers::default();
        let mut defenses = defenses(&resist, &shield_mult, None);
        defenses.on_cryo = true;
        let mut vitals = Vitals::new(100.0, 0.0, 0.0);

        let report = resolve_damage(&mut vitals, &defenses, 10.0, DamageType::Fire);

        assert!((report.dealt - 8.0).abs() < 1e-5);
    }

    #[test]
    fn dead_enemies_ignore_further_damage() {
        let resist = DamageMultipliers::default();
        let shield_mult = DamageMultipliers::default();
        let defenses = defenses(&resist, &shield_mult, None);
        let mut vitals = Vitals::new(5.0, 0.0, 0.0);

        let _ = resolve_damage(&mut vitals, &defenses, 10.0, DamageType::Energy);
        assert!(!vitals.alive);
        let hp = vitals.hp;

        let report = resolve_damage(&mut vitals, &defenses, 10.0, DamageType::Energy);
        assert_eq!(report, DamageReport::default());
        assert_eq!(vitals.hp, hp);
    }

    #[test]
    fn refreshing_statuses_keep_maximum_stacks() {
        let mut book = StatusBook::default();
        book.add(&OnHit::new(StatusKind::Slow, 1.0).with_strength(0.3));
        book.add(
            &OnHit::new(StatusKind::Slow, 0.5)
                .with_strength(0.2)
                .with_stacks(2),
        );

        let slow = book.get(StatusKind::Slow).expect("slow stored");
        assert_eq!(slow.strength, 0.3);
        assert_eq!(slow.stacks, 2);
        assert_eq!(slow.duration, 1.0);
    }

    #[test]
    fn additive_statuses_sum_stacks_up_to_ten() {
        let mut book = StatusBook::default();
        for _ in 0..4 {
            book.add(&OnHit::new(StatusKind::Shred, 2.0).with_stacks(3));
        }
        assert_eq!(book.get(StatusKind::Shred).map(|s| s.stacks), Some(10));
    }

    #[test]
    fn tick_expires_statuses_and_aggregates_the_rest() {
        let mut book = StatusBook::default();
        book.add(&OnHit::new(StatusKind::Slow, 2.0).with_strength(0.45).with_stacks(4));
        book.add(&OnHit::new(StatusKind::Burn, 2.0).with_stacks(2));
        book.add(&OnHit::new(StatusKind::Stun, 0.1));

        let modifiers = book.tick(0.2, false);

        assert!(book.get(StatusKind::Stun).is_none());
        assert!(!modifiers.stunned);
        assert_eq!(modifiers.slow, 0.50);
        assert!((modifiers.burn_dps - 3.0).abs() < 1e-5);

        let boss = book.tick(0.1, true);
        assert_eq!(boss.slow, 0.40);
    }
}
