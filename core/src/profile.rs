//! Balance profile produced by the tuner and applied to the data tables.

use serde::{Deserialize, Serialize};

use crate::GameTables;

/// Multipliers applied to every tower definition.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TowerProfile {
    /// Damage multiplier.
    pub damage_mul: f32,
    /// Fire-rate multiplier.
    pub rate_mul: f32,
    /// Range multiplier.
    pub range_mul: f32,
    /// Cost multiplier, rounded to whole gold.
    pub cost_mul: f32,
}

impl Default for TowerProfile {
    fn default() -> Self {
        Self {
            damage_mul: 1.0,
            rate_mul: 1.0,
            range_mul: 1.0,
            cost_mul: 1.0,
        }
    }
}

/// Adjustments applied to every enemy archetype.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnemyProfile {
    /// Health multiplier.
    pub hp_mul: f32,
    /// Flat armour added before rounding.
    pub armor_add: i32,
    /// Speed multiplier.
    pub speed_mul: f32,
    /// Regeneration multiplier.
    pub regen_mul: f32,
    /// Shield multiplier, rounded to whole points.
    pub shield_mul: f32,
}

impl Default for EnemyProfile {
    fn default() -> Self {
        Self {
            hp_mul: 1.0,
            armor_add: 0,
            speed_mul: 1.0,
            regen_mul: 1.0,
            shield_mul: 1.0,
        }
    }
}

/// Provenance recorded by the tuner alongside a profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    /// Difficulty label the profile was tuned for.
    pub target: String,
    /// Mean waves the tuner aimed for.
    pub target_wave: f32,
    /// Episodes simulated per fitness evaluation.
    pub episodes: usize,
    /// Wave cap per episode.
    pub max_waves: u32,
    /// Mean waves cleared by the winning genome.
    pub mean_waves: f32,
    /// Standard deviation of waves cleared.
    pub std_waves: f32,
    /// Waves cleared in each episode.
    pub samples: Vec<u32>,
}

/// Flat record of multipliers handed from the tuner to the live game.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceProfile {
    /// Tower-side multipliers.
    pub tower: TowerProfile,
    /// Enemy-side adjustments.
    pub enemy: EnemyProfile,
    /// Tuning provenance, absent for hand-written profiles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ProfileMeta>,
}

impl BalanceProfile {
    /// Applies the profile to the tables once, before any simulation starts.
    pub fn apply(&self, tables: &mut GameTables) {
        for definition in tables.towers.iter_mut() {
            definition.cost = (definition.cost as f32 * self.tower.cost_mul).round() as i64;
            definition.damage *= self.tower.damage_mul;
            definition.rate *= self.tower.rate_mul;
            definition.range *= self.tower.range_mul;
        }

        for archetype in tables.enemies.iter_mut() {
            archetype.hp *= self.enemy.hp_mul;
            archetype.speed *= self.enemy.speed_mul;
            archetype.regen *= self.enemy.regen_mul;
            archetype.armor = (archetype.armor + self.enemy.armor_add as f32)
                .round()
                .max(0.0);
            archetype.shield = (archetype.shield * self.enemy.shield_mul).round();
        }
    }

    /// Returns tables with the profile applied.
    #[must_use]
    pub fn applied_to(&self, tables: &GameTables) -> GameTables {
        let mut tables = tables.clone();
        self.apply(&mut tables);
        tables
    }
}
