//! Balance genomes and their genetic operators.

use pathforge_core::{BalanceProfile, EnemyProfile, TowerProfile};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Number of tunable genes.
pub const GENE_COUNT: usize = 8;

/// Search range and mutation width of a single gene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gene {
    /// Name of the profile field the gene drives.
    pub name: &'static str,
    /// Smallest admissible value.
    pub low: f64,
    /// Largest admissible value.
    pub high: f64,
    /// Standard deviation of a gaussian mutation step.
    pub sigma: f64,
    /// Whether the gene only takes whole values.
    pub integer: bool,
}

impl Gene {
    const fn real(name: &'static str, low: f64, high: f64, sigma: f64) -> Self {
        Self {
            name,
            low,
            high,
            sigma,
            integer: false,
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        let value = value.clamp(self.low, self.high);
        if self.integer {
            value.round()
        } else {
            value
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.integer {
            rng.gen_range(self.low as i64..=self.high as i64) as f64
        } else {
            rng.gen_range(self.low..=self.high)
        }
    }
}

/// Gene table in genome order.
pub const GENES: [Gene; GENE_COUNT] = [
    Gene::real("tower.damage_mul", 0.70, 1.30, 0.05),
    Gene::real("tower.rate_mul", 0.80, 1.25, 0.04),
    Gene::real("tower.cost_mul", 0.90, 1.15, 0.03),
    Gene::real("enemy.hp_mul", 0.50, 1.80, 0.10),
    Gene {
        name: "enemy.armor_add",
        low: -6.0,
        high: 10.0,
        sigma: 1.5,
        integer: true,
    },
    Gene::real("enemy.speed_mul", 0.85, 1.25, 0.03),
    Gene::real("enemy.regen_mul", 0.50, 1.30, 0.06),
    Gene::real("enemy.shield_mul", 0.70, 1.40, 0.06),
];

/// Candidate set of balance multipliers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceGenome {
    values: [f64; GENE_COUNT],
}

impl Default for BalanceGenome {
    fn default() -> Self {
        Self::identity()
    }
}

impl BalanceGenome {
    /// Genome that leaves every table untouched.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            values: [1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0],
        }
    }

    /// Builds a genome from raw values, clamping each into its range.
    #[must_use]
    pub fn from_values(values: [f64; GENE_COUNT]) -> Self {
        let mut genome = Self { values };
        genome.clamp();
        genome
    }

    /// Draws every gene uniformly from its range.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut values = [0.0; GENE_COUNT];
        for (value, gene) in values.iter_mut().zip(GENES.iter()) {
            *value = gene.sample(rng);
        }
        Self { values }
    }

    /// Gene values in genome order.
    #[must_use]
    pub fn values(&self) -> &[f64; GENE_COUNT] {
        &self.values
    }

    /// Exact bit pattern used to memoise fitness.
    #[must_use]
    pub fn fingerprint(&self) -> [u64; GENE_COUNT] {
        self.values.map(f64::to_bits)
    }

    /// Profile applying this genome to the tables.
    #[must_use]
    pub fn to_profile(&self) -> BalanceProfile {
        let [damage, rate, cost, hp, armor, speed, regen, shield] = self.values;
        BalanceProfile {
            tower: TowerProfile {
                damage_mul: damage as f32,
                rate_mul: rate as f32,
                range_mul: 1.0,
                cost_mul: cost as f32,
            },
            enemy: EnemyProfile {
                hp_mul: hp as f32,
                armor_add: armor.round() as i32,
                speed_mul: speed as f32,
                regen_mul: regen as f32,
                shield_mul: shield as f32,
            },
            meta: None,
        }
    }

    /// Picks each gene from either parent with equal probability.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &Self, rng: &mut R) -> Self {
        let mut values = self.values;
        for (value, theirs) in values.iter_mut().zip(other.values.iter()) {
            if rng.gen_bool(0.5) {
                *value = *theirs;
            }
        }
        Self { values }
    }

    /// Perturbs every gene with gaussian noise, resetting a gene to a fresh
    /// uniform draw with probability `big_jump`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, big_jump: f64, rng: &mut R) {
        let big_jump = big_jump.clamp(0.0, 1.0);
        for (value, gene) in self.values.iter_mut().zip(GENES.iter()) {
            if rng.gen_bool(big_jump) {
                *value = gene.sample(rng);
                continue;
            }
            if let Ok(step) = Normal::new(0.0, gene.sigma) {
                *value += step.sample(rng);
            }
        }
        self.clamp();
    }

    fn clamp(&mut self) {
        for (value, gene) in self.values.iter_mut().zip(GENES.iter()) {
            *value = gene.clamp(*value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn in_range(genome: &BalanceGenome) -> bool {
        genome
            .values()
            .iter()
            .zip(GENES.iter())
            .all(|(value, gene)| (gene.low..=gene.high).contains(value))
    }

    #[test]
    fn identity_genome_maps_to_identity_profile() {
        assert_eq!(
            BalanceGenome::identity().to_profile(),
            BalanceProfile::default()
        );
    }

    #[test]
    fn random_genomes_respect_ranges() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..200 {
            let genome = BalanceGenome::random(&mut rng);
            assert!(in_range(&genome));
            assert_eq!(genome.values()[4].fract(), 0.0);
        }
    }

    #[test]
    fn mutation_stays_clamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut genome = BalanceGenome::from_values([1.30, 0.80, 1.15, 1.80, 10.0, 0.85, 0.5, 1.4]);
        for _ in 0..500 {
            genome.mutate(0.12, &mut rng);
            assert!(in_range(&genome));
            assert_eq!(genome.values()[4].fract(), 0.0);
        }
    }

    #[test]
    fn crossover_only_mixes_parent_genes() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let low = BalanceGenome::from_values(GENES.map(|gene| gene.low));
        let high = BalanceGenome::from_values(GENES.map(|gene| gene.high));

        let child = low.crossover(&high, &mut rng);

        for (value, gene) in child.values().iter().zip(GENES.iter()) {
            assert!(*value == gene.low || *value == gene.high);
        }
    }

    #[test]
    fn fingerprint_distinguishes_tiny_differences() {
        let base = BalanceGenome::identity();
        let mut values = *base.values();
        values[0] += 1e-12;
        assert_ne!(
            base.fingerprint(),
            BalanceGenome::from_values(values).fingerprint()
        );
    }
}
