use std::sync::Arc;

use pathforge_core::{Effect, GameTables, Perk, Rarity, ResourceKind};
use pathforge_system_balance::{BalanceSimulator, EpisodeConfig, EpisodeResult};
use pathforge_system_progression::{PerkFactory, PerkSource};
use rand::RngCore;

struct GildedOffers;

impl PerkSource for GildedOffers {
    fn roll(&self, count: usize, _rarity_bias: f32, _rng: &mut dyn RngCore) -> Vec<Perk> {
        (0..count.min(1))
            .map(|_| Perk {
                id: "GILDED".to_owned(),
                name: "Gilded".to_owned(),
                rarity: Rarity::Common,
                effects: vec![Effect::Grant(ResourceKind::Gold, 1000)],
            })
            .collect()
    }
}

fn short_config(seed: u64, max_waves: u32) -> EpisodeConfig {
    EpisodeConfig {
        seed,
        max_waves,
        ..EpisodeConfig::default()
    }
}

fn run(seed: u64, max_waves: u32) -> EpisodeResult {
    let factory = PerkFactory::procedural();
    BalanceSimulator::new(Arc::new(GameTables::default()), &factory)
        .run_episode(&short_config(seed, max_waves))
}

#[test]
fn identical_seeds_replay_identically() {
    let first = run(17, 3);
    let second = run(17, 3);

    assert_eq!(first, second);
    assert_eq!(first.seed, 17);
    assert!(first.waves_cleared <= 3);
    assert!(first.lives_end <= 20);
}

#[test]
fn first_wave_is_always_survivable() {
    let simulator = BalanceSimulator::new(Arc::new(GameTables::default()), GildedOffers);
    let result = simulator.run_episode(&short_config(5, 1));

    assert_eq!(result.waves_cleared, 1);
    assert!(result.lives_end > 0);
    assert!(result.gold_end >= 1000);
}

#[test]
fn hitting_the_tick_cap_loses_the_wave() {
    let config = EpisodeConfig {
        tick_cap: 1,
        ..short_config(3, 5)
    };
    let result = BalanceSimulator::new(Arc::new(GameTables::default()), GildedOffers)
        .run_episode(&config);

    assert_eq!(result.waves_cleared, 0);
    assert_eq!(result.lives_end, 0);
}
