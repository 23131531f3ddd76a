//! Tuner configuration loaded from TOML and the environment.

use std::{fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};

/// Difficulty label that aims for the longer survival curve.
pub const SOLID_TARGET: &str = "humain_solide";

/// Environment variable naming the difficulty label.
pub const ENV_TARGET: &str = "PATHFORGE_BALANCE_TARGET";
/// Environment variable overriding the population size.
pub const ENV_SAMPLES: &str = "PATHFORGE_BALANCE_SAMPLES";
/// Environment variable overriding the episodes per evaluation.
pub const ENV_EPISODES: &str = "PATHFORGE_BALANCE_EPISODES";
/// Environment variable overriding the wave cap per episode.
pub const ENV_MAX_WAVES: &str = "PATHFORGE_BALANCE_MAX_WAVES";
/// Environment variable overriding the generation count.
pub const ENV_GENERATIONS: &str = "PATHFORGE_BALANCE_GENERATIONS";

/// Failures while assembling a tuner configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read tuner config: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML for this schema.
    #[error("malformed tuner config: {0}")]
    Toml(#[from] toml::de::Error),
    /// An environment override could not be parsed.
    #[error("{name} has invalid value {value:?}")]
    Override {
        /// Variable name.
        name: &'static str,
        /// Raw value found in the environment.
        value: String,
    },
    /// The population would hold no genome.
    #[error("population must hold at least one genome")]
    EmptyPopulation,
    /// Fitness would be measured over zero episodes.
    #[error("at least one episode per evaluation is required")]
    NoEpisodes,
}

/// Parameters of a tuning run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Difficulty label recorded in the profile.
    pub target: String,
    /// Explicit mean wave to aim for, overriding the label.
    pub target_wave: Option<f32>,
    /// Genomes per generation.
    pub population: usize,
    /// Generations to evolve.
    pub generations: usize,
    /// Episodes simulated per fitness evaluation.
    pub episodes: usize,
    /// Wave cap of every episode.
    pub max_waves: u32,
    /// Best genomes copied unchanged into the next generation.
    pub elites: usize,
    /// Share of each generation replaced by fresh random genomes.
    pub reseed_fraction: f64,
    /// Contestants per tournament.
    pub tournament: usize,
    /// Per-gene probability of a full reset during mutation.
    pub big_jump: f64,
    /// Seed of the tuner and of the shared episode seeds.
    pub seed: u64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            target: SOLID_TARGET.to_owned(),
            target_wave: None,
            population: 28,
            generations: 12,
            episodes: 6,
            max_waves: 25,
            elites: 2,
            reseed_fraction: 0.15,
            tournament: 4,
            big_jump: 0.12,
            seed: 123,
        }
    }
}

impl TunerConfig {
    /// Parses a configuration from TOML; absent keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// Applies the `PATHFORGE_BALANCE_*` overrides of the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides resolved through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(target) = lookup(ENV_TARGET) {
            let target = target.trim();
            if !target.is_empty() {
                self.target = target.to_owned();
            }
        }
        if let Some(value) = parse_override(&lookup, ENV_SAMPLES)? {
            self.population = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_EPISODES)? {
            self.episodes = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_MAX_WAVES)? {
            self.max_waves = value;
        }
        if let Some(value) = parse_override(&lookup, ENV_GENERATIONS)? {
            self.generations = value;
        }
        Ok(self)
    }

    /// Rejects configurations the tuner cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.episodes == 0 {
            return Err(ConfigError::NoEpisodes);
        }
        Ok(())
    }

    /// Mean number of cleared waves the tuner aims for.
    #[must_use]
    pub fn target_wave(&self) -> f32 {
        match self.target_wave {
            Some(wave) => wave,
            None if self.target == SOLID_TARGET => 20.0,
            None => 12.0,
        }
    }
}

fn parse_override<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Override { name, value: raw })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = TunerConfig::from_toml_str("population = 8\nseed = 5\n").expect("valid toml");

        assert_eq!(config.population, 8);
        assert_eq!(config.seed, 5);
        assert_eq!(config.generations, 12);
        assert_eq!(config.episodes, 6);
        assert_eq!(config.max_waves, 25);
    }

    #[test]
    fn environment_overrides_take_precedence() {
        let config = TunerConfig::default()
            .with_overrides(env(&[
                (ENV_TARGET, "casual"),
                (ENV_SAMPLES, "10"),
                (ENV_EPISODES, " 3 "),
                (ENV_MAX_WAVES, "15"),
                (ENV_GENERATIONS, "4"),
            ]))
            .expect("valid overrides");

        assert_eq!(config.target, "casual");
        assert_eq!(config.population, 10);
        assert_eq!(config.episodes, 3);
        assert_eq!(config.max_waves, 15);
        assert_eq!(config.generations, 4);
    }

    #[test]
    fn malformed_overrides_are_reported() {
        let error = TunerConfig::default()
            .with_overrides(env(&[(ENV_EPISODES, "many")]))
            .expect_err("not a number");

        assert!(matches!(
            error,
            ConfigError::Override { name: ENV_EPISODES, .. }
        ));
    }

    #[test]
    fn target_labels_map_to_waves() {
        let mut config = TunerConfig::default();
        assert_eq!(config.target_wave(), 20.0);

        config.target = "casual".to_owned();
        assert_eq!(config.target_wave(), 12.0);

        config.target_wave = Some(7.5);
        assert_eq!(config.target_wave(), 7.5);
    }

    #[test]
    fn empty_population_is_rejected() {
        let config = TunerConfig {
            population: 0,
            ..TunerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyPopulation)));
    }
}
