#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless episode runner used to measure difficulty.
//!
//! [`BalanceSimulator::run_episode`] plays a complete run with the
//! [`AutoBot`]: it paves a serpentine lane, places and upgrades towers, fights
//! the waves planned by the wave director and picks talents and perks between
//! waves. The outcome depends only on the tables, the perk source and the
//! episode seed.

mod bot;

use std::{sync::Arc, time::Duration};

use pathforge_core::{
    CellCoord, Command, EnemyKey, Event, GameTables, PathVariant, RunStats, TowerTarget,
};
use pathforge_system_progression::PerkSource;
use pathforge_system_spawning::{Config as SpawnConfig, Spawning};
use pathforge_system_tower_combat::TowerCombat;
use pathforge_system_tower_targeting::TowerTargeting;
use pathforge_system_wave_generation::WaveDirector;
use pathforge_world::{self as world, query, GridConfig, TileGrid, World};
use rand::{seq::SliceRandom, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use bot::{score_perk, AutoBot};

/// Ticks simulated per wave before the wave counts as lost.
pub const DEFAULT_TICK_CAP: u32 = 20_000;
/// Biome recorded for simulated runs.
const EPISODE_BIOME: &str = "PLAINS";

/// Parameters of a single simulated run.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeConfig {
    /// Seed for the grid, the bot and the world.
    pub seed: u64,
    /// Last wave the episode may reach.
    pub max_waves: u32,
    /// Grid columns.
    pub columns: u32,
    /// Grid rows.
    pub rows: u32,
    /// Fixed simulation timestep.
    pub tick: Duration,
    /// Ticks allowed per wave.
    pub tick_cap: u32,
    /// Ascension level fed to the wave director.
    pub ascension: u32,
    /// Perks offered after each cleared wave.
    pub perk_choices: usize,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_waves: 25,
            columns: 22,
            rows: 12,
            tick: Duration::from_nanos(16_666_667),
            tick_cap: DEFAULT_TICK_CAP,
            ascension: 0,
            perk_choices: 3,
        }
    }
}

impl EpisodeConfig {
    /// Returns a copy of the configuration using `seed`.
    #[must_use]
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }
}

/// Outcome of a simulated run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeResult {
    /// Seed the episode ran with.
    pub seed: u64,
    /// Waves survived, counting every wave folded into an assault.
    pub waves_cleared: u32,
    /// Gold left at the end.
    pub gold_end: i64,
    /// Lives left at the end.
    pub lives_end: i64,
}

/// How a single wave ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WaveOutcome {
    Cleared,
    Defeated,
    TimedOut,
}

/// Runs complete headless episodes over fixed tables.
#[derive(Debug)]
pub struct BalanceSimulator<P> {
    tables: Arc<GameTables>,
    perks: P,
    director: WaveDirector,
}

impl<P: PerkSource> BalanceSimulator<P> {
    /// Creates a simulator over `tables` drawing perk offers from `perks`.
    #[must_use]
    pub fn new(tables: Arc<GameTables>, perks: P) -> Self {
        Self {
            tables,
            perks,
            director: WaveDirector::new(),
        }
    }

    /// Plays one episode to defeat or to the wave cap.
    #[must_use]
    pub fn run_episode(&self, config: &EpisodeConfig) -> EpisodeResult {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut bot = AutoBot::default();
        let mut events = Vec::new();
        let mut world = self.open_world(&bot, config, &mut events);
        let mut arena = Arena::new();

        bot.spend_talents(&mut world, &mut events);
        bot.place_towers(&mut world, 10, 1, &mut events);

        let mut waves_cleared = 0;
        let mut last_lives_lost = 0;
        loop {
            let stats = query::stats(&world);
            let wave = stats.wave;
            if wave > config.max_waves || stats.is_defeated() {
                break;
            }
            let lives_before = stats.lives;
            let assault = bot
                .choose_assault(stats, last_lives_lost)
                .min(config.max_waves - wave + 1);

            bot.begin_wave(wave);
            bot.upgrade_best(&mut world, &mut events);
            bot.place_towers(&mut world, 12 + (wave / 6) as usize, wave, &mut events);

            events.clear();
            world::apply(&mut world, Command::StartWave { assault }, &mut events);
            if !events
                .iter()
                .any(|event| matches!(event, Event::WaveStarted { .. }))
            {
                warn!(seed = config.seed, wave, "wave refused to start");
                world::apply(&mut world, Command::ForceFailure, &mut events);
                break;
            }

            let relics = world.relics_on_path();
            let mut queue: Vec<(EnemyKey, u32)> = Vec::new();
            for offset in 0..assault {
                let tier = wave + offset;
                let plan = self.director.plan(tier, relics, config.ascension);
                queue.extend(
                    self.director
                        .spawn_list(&plan, &mut rng)
                        .into_iter()
                        .map(|key| (key, tier)),
                );
            }
            queue.shuffle(&mut rng);
            arena.spawning.clear();
            arena.spawning.enqueue(queue);

            match arena.fight(&mut world, assault, config) {
                WaveOutcome::Cleared => {}
                WaveOutcome::Defeated => break,
                WaveOutcome::TimedOut => {
                    debug!(seed = config.seed, wave, "wave hit the tick cap");
                    world::apply(&mut world, Command::ForceFailure, &mut events);
                    break;
                }
            }

            events.clear();
            world::apply(&mut world, Command::CompleteWave, &mut events);
            waves_cleared += assault;
            last_lives_lost = (lives_before - query::stats(&world).lives).max(0);

            bot.spend_talents(&mut world, &mut events);
            let bias = ((0.03 * wave as f32).min(0.60) + 0.12 * (assault - 1) as f32).clamp(0.0, 0.85);
            let mut options = self.perks.roll(config.perk_choices, bias, &mut rng);
            while bot.wants_reroll(&options, wave) {
                events.clear();
                world::apply(&mut world, Command::RerollPerks, &mut events);
                if !events
                    .iter()
                    .any(|event| matches!(event, Event::PerksRerolled { .. }))
                {
                    break;
                }
                options = self.perks.roll(config.perk_choices, 0.0, &mut rng);
            }
            if let Some(index) = bot.choose_perk(&options, wave, &mut rng) {
                let perk = options[index].clone();
                world::apply(&mut world, Command::ApplyPerk { perk }, &mut events);
            }
            bot.spend_talents(&mut world, &mut events);

            let stats = query::stats(&world);
            debug!(
                seed = config.seed,
                wave,
                assault,
                gold = stats.gold,
                lives = stats.lives,
                towers = query::tower_count(&world),
                "wave cleared"
            );
        }

        let stats = query::stats(&world);
        let result = EpisodeResult {
            seed: config.seed,
            waves_cleared,
            gold_end: stats.gold,
            lives_end: stats.lives,
        };
        debug!(?result, "episode finished");
        result
    }

    /// Builds the episode world with a paved lane.
    fn open_world(&self, bot: &AutoBot, config: &EpisodeConfig, events: &mut Vec<Event>) -> World {
        let grid = TileGrid::generate(&GridConfig {
            columns: config.columns,
            rows: config.rows,
            rock_rate: 0.0,
            seed: config.seed,
        });
        let distance = grid.start().manhattan_distance(grid.end());
        let paves = (f64::from(distance) * 1.12) as i64 + 2;
        let stats = RunStats {
            paves,
            paves_cap: paves + 16,
            ..RunStats::default()
        };

        let lane = bot.plan_lane(&grid, paves);
        let mut world = self.pave(grid.clone(), stats.clone(), config.seed, &lane, events);
        if !world.is_lane_valid() {
            warn!(seed = config.seed, "serpentine lane rejected, paving a straight lane");
            let straight = bot::straight_lane(grid.start(), grid.end());
            world = self.pave(grid, stats, config.seed, &straight, events);
        }
        world
    }

    fn pave(
        &self,
        grid: TileGrid,
        stats: RunStats,
        seed: u64,
        lane: &[CellCoord],
        events: &mut Vec<Event>,
    ) -> World {
        let mut world = World::new(Arc::clone(&self.tables), grid, stats, seed);
        world.set_biome(EPISODE_BIOME);
        for &cell in lane {
            world::apply(
                &mut world,
                Command::BuildPath {
                    cell,
                    variant: PathVariant::Standard,
                },
                events,
            );
        }
        world
    }
}

/// Systems and scratch buffers driving the fight of one wave.
struct Arena {
    spawning: Spawning,
    targeting: TowerTargeting,
    combat: TowerCombat,
    events: Vec<Event>,
    commands: Vec<Command>,
    targets: Vec<TowerTarget>,
}

impl Arena {
    fn new() -> Self {
        Self {
            spawning: Spawning::new(SpawnConfig::default()),
            targeting: TowerTargeting::new(),
            combat: TowerCombat::new(),
            events: Vec::new(),
            commands: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Ticks the world until the wave resolves.
    fn fight(&mut self, world: &mut World, assault: u32, config: &EpisodeConfig) -> WaveOutcome {
        for _ in 0..config.tick_cap {
            if query::stats(world).is_defeated() {
                return WaveOutcome::Defeated;
            }
            if self.spawning.is_idle() && query::enemy_count(world) == 0 {
                return WaveOutcome::Cleared;
            }

            self.events.clear();
            world::apply(world, Command::Tick { dt: config.tick }, &mut self.events);

            self.commands.clear();
            self.spawning.handle(&self.events, &mut self.commands);
            for event in &self.events {
                if let Event::BossPhaseReached { phase, cell, .. } = *event {
                    reinforce(phase, cell, assault, &mut self.commands);
                }
            }
            for command in self.commands.drain(..) {
                world::apply(world, command, &mut self.events);
            }

            let towers = query::tower_view(world);
            let enemies = query::enemy_view(world);
            self.targeting
                .handle(&towers, &enemies, &mut self.targets);
            self.combat.handle(towers, &self.targets, &mut self.commands);
            for command in self.commands.drain(..) {
                world::apply(world, command, &mut self.events);
            }
        }

        if query::stats(world).is_defeated() {
            WaveOutcome::Defeated
        } else if self.spawning.is_idle() && query::enemy_count(world) == 0 {
            WaveOutcome::Cleared
        } else {
            WaveOutcome::TimedOut
        }
    }
}

/// Boss reinforcements: scouts at the first phase, elites at the second.
fn reinforce(phase: u8, cell: CellCoord, assault: u32, out: &mut Vec<Command>) {
    let (key, count) = match phase {
        1 => (EnemyKey::Scout, 4 + assault),
        2 => (EnemyKey::Elite, 2 + assault),
        _ => return,
    };
    out.extend((0..count).map(|_| Command::SpawnEnemyAt { key, cell }));
}
