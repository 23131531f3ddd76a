#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Genetic search for balance profiles.
//!
//! [`GeneticTuner`] evolves [`BalanceGenome`]s whose fitness is the distance
//! between the mean waves cleared by the auto-bot and a target wave. Every
//! genome is measured over the same episode seeds, and evaluations run in
//! parallel with rayon.

mod config;
mod genome;
mod profile;

use std::{collections::HashMap, sync::Arc};

use pathforge_core::{BalanceProfile, GameTables, ProfileMeta};
use pathforge_system_balance::{BalanceSimulator, EpisodeConfig};
use pathforge_system_progression::PerkSource;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use config::{
    ConfigError, TunerConfig, ENV_EPISODES, ENV_GENERATIONS, ENV_MAX_WAVES, ENV_SAMPLES,
    ENV_TARGET, SOLID_TARGET,
};
pub use genome::{BalanceGenome, Gene, GENES, GENE_COUNT};
pub use profile::{load_profile, summary_markdown, write_profile, PROFILE_FILE, SUMMARY_FILE};

/// Weight of overshooting the target on top of the absolute distance.
const OVERSHOOT_PENALTY: f64 = 0.4;
/// Weight of the spread of cleared waves across episodes.
const SPREAD_PENALTY: f64 = 0.12;

/// Failures of a tuning run.
#[derive(Debug, thiserror::Error)]
pub enum TunerError {
    /// The configuration cannot be run.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Writing an output file failed.
    #[error("failed to write tuner output: {0}")]
    Io(#[from] std::io::Error),
    /// Encoding the profile failed.
    #[error("failed to encode balance profile: {0}")]
    Json(#[from] serde_json::Error),
}

/// Waves cleared by one genome over the shared episode seeds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Waves cleared per episode, in seed order.
    pub samples: Vec<u32>,
    /// Mean waves cleared.
    pub mean: f64,
    /// Population standard deviation of the waves cleared.
    pub std: f64,
    /// Fitness, lower is better.
    pub fitness: f64,
}

impl Evaluation {
    /// Scores `samples` against `target`.
    #[must_use]
    pub fn from_samples(samples: Vec<u32>, target: f64) -> Self {
        let count = samples.len().max(1) as f64;
        let mean = samples.iter().map(|&waves| f64::from(waves)).sum::<f64>() / count;
        let variance = samples
            .iter()
            .map(|&waves| (f64::from(waves) - mean).powi(2))
            .sum::<f64>()
            / count;
        let std = variance.sqrt();
        let fitness = (mean - target).abs()
            + OVERSHOOT_PENALTY * (mean - target).max(0.0)
            + SPREAD_PENALTY * std;
        Self {
            samples,
            mean,
            std,
            fitness,
        }
    }
}

/// Fitness summary of one generation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Zero-based generation index.
    pub generation: usize,
    /// Best fitness seen so far, across all generations.
    pub best_fitness: f64,
    /// Mean fitness of this generation.
    pub mean_fitness: f64,
}

/// Result of a tuning run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TunerReport {
    /// Per-generation fitness summaries.
    pub generations: Vec<GenerationStats>,
    /// Best genome found.
    pub best: BalanceGenome,
    /// Evaluation of the best genome.
    pub evaluation: Evaluation,
    /// Profile derived from the best genome, with provenance.
    pub profile: BalanceProfile,
}

/// Evolves balance genomes toward a target survival curve.
#[derive(Debug)]
pub struct GeneticTuner<P> {
    tables: Arc<GameTables>,
    perks: P,
    config: TunerConfig,
    episode: EpisodeConfig,
}

impl<P: PerkSource + Sync> GeneticTuner<P> {
    /// Creates a tuner over the base `tables`.
    pub fn new(tables: Arc<GameTables>, perks: P, config: TunerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let episode = EpisodeConfig {
            max_waves: config.max_waves,
            ..EpisodeConfig::default()
        };
        Ok(Self {
            tables,
            perks,
            config,
            episode,
        })
    }

    /// Replaces the episode template; its seed is ignored.
    #[must_use]
    pub fn with_episode(mut self, episode: EpisodeConfig) -> Self {
        self.episode = EpisodeConfig {
            max_waves: self.config.max_waves,
            ..episode
        };
        self
    }

    /// Configuration of the run.
    #[must_use]
    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Episode seeds shared by every genome of a run.
    #[must_use]
    pub fn episode_seeds(&self) -> Vec<u64> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(1);
        (0..self.config.episodes)
            .map(|_| rng.gen_range(0..1_000_000))
            .collect()
    }

    /// Measures `genome` over `seeds`.
    #[must_use]
    pub fn evaluate(&self, genome: &BalanceGenome, seeds: &[u64]) -> Evaluation {
        let tables = Arc::new(genome.to_profile().applied_to(&self.tables));
        let simulator = BalanceSimulator::new(tables, &self.perks);
        let samples = seeds
            .par_iter()
            .map(|&seed| simulator.run_episode(&self.episode.with_seed(seed)).waves_cleared)
            .collect();
        Evaluation::from_samples(samples, f64::from(self.config.target_wave()))
    }

    /// Runs every generation and returns the best genome found.
    pub fn run(&self) -> Result<TunerReport, TunerError> {
        self.config.validate()?;
        let config = &self.config;
        let seeds = self.episode_seeds();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut memo: HashMap<[u64; GENE_COUNT], Evaluation> = HashMap::new();

        let mut population = Vec::with_capacity(config.population);
        population.push(BalanceGenome::identity());
        while population.len() < config.population {
            population.push(BalanceGenome::random(&mut rng));
        }

        info!(
            label = %config.target,
            target_wave = config.target_wave(),
            population = config.population,
            generations = config.generations,
            episodes = config.episodes,
            max_waves = config.max_waves,
            "tuning balance"
        );

        let mut best: Option<(BalanceGenome, Evaluation)> = None;
        let mut generations = Vec::with_capacity(config.generations);
        for generation in 0..config.generations.max(1) {
            self.evaluate_missing(&population, &seeds, &mut memo);

            let mut ranked: Vec<(BalanceGenome, f64)> = population
                .iter()
                .map(|genome| {
                    let fitness = memo
                        .get(&genome.fingerprint())
                        .map_or(f64::INFINITY, |evaluation| evaluation.fitness);
                    (*genome, fitness)
                })
                .collect();
            ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

            let (leader, leader_fitness) = ranked[0];
            let improved = best
                .as_ref()
                .map_or(true, |(_, evaluation)| leader_fitness < evaluation.fitness);
            if improved {
                if let Some(evaluation) = memo.get(&leader.fingerprint()) {
                    best = Some((leader, evaluation.clone()));
                }
            }

            let mean_fitness =
                ranked.iter().map(|(_, fitness)| fitness).sum::<f64>() / ranked.len() as f64;
            let best_fitness = best
                .as_ref()
                .map_or(leader_fitness, |(_, evaluation)| evaluation.fitness);
            info!(
                generation,
                best_fitness,
                mean_fitness,
                evaluated = memo.len(),
                "generation complete"
            );
            generations.push(GenerationStats {
                generation,
                best_fitness,
                mean_fitness,
            });

            if generation + 1 < config.generations {
                population = self.breed(&ranked, &mut rng);
            }
        }

        let (genome, evaluation) = best.ok_or(ConfigError::EmptyPopulation)?;
        let mut profile = genome.to_profile();
        profile.meta = Some(ProfileMeta {
            target: config.target.clone(),
            target_wave: config.target_wave(),
            episodes: config.episodes,
            max_waves: config.max_waves,
            mean_waves: evaluation.mean as f32,
            std_waves: evaluation.std as f32,
            samples: evaluation.samples.clone(),
        });
        Ok(TunerReport {
            generations,
            best: genome,
            evaluation,
            profile,
        })
    }

    fn evaluate_missing(
        &self,
        population: &[BalanceGenome],
        seeds: &[u64],
        memo: &mut HashMap<[u64; GENE_COUNT], Evaluation>,
    ) {
        let mut pending: Vec<BalanceGenome> = Vec::new();
        for genome in population {
            let key = genome.fingerprint();
            if !memo.contains_key(&key) && !pending.iter().any(|other| other.fingerprint() == key) {
                pending.push(*genome);
            }
        }
        debug!(pending = pending.len(), "evaluating genomes");

        let evaluated: Vec<_> = pending
            .par_iter()
            .map(|genome| (genome.fingerprint(), self.evaluate(genome, seeds)))
            .collect();
        memo.extend(evaluated);
    }

    fn breed(&self, ranked: &[(BalanceGenome, f64)], rng: &mut ChaCha8Rng) -> Vec<BalanceGenome> {
        let config = &self.config;
        let size = config.population;
        let elites = config.elites.min(size);
        let reseeded = ((size as f64) * config.reseed_fraction.clamp(0.0, 1.0)).round() as usize;
        let reseeded = reseeded.min(size - elites);

        let mut next: Vec<BalanceGenome> = ranked.iter().take(elites).map(|(genome, _)| *genome).collect();
        for _ in 0..reseeded {
            next.push(BalanceGenome::random(rng));
        }
        while next.len() < size {
            let mother = tournament(ranked, config.tournament, rng);
            let father = tournament(ranked, config.tournament, rng);
            let mut child = mother.crossover(&father, rng);
            child.mutate(config.big_jump, rng);
            next.push(child);
        }
        next
    }
}

/// Samples `size` contestants with replacement and keeps the fittest.
fn tournament<R: Rng + ?Sized>(ranked: &[(BalanceGenome, f64)], size: usize, rng: &mut R) -> BalanceGenome {
    let mut winner = rng.gen_range(0..ranked.len());
    for _ in 1..size.max(1) {
        let contender = rng.gen_range(0..ranked.len());
        if ranked[contender].1 < ranked[winner].1 {
            winner = contender;
        }
    }
    ranked[winner].0
}
