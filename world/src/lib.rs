#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Pathforge.
//!
//! The world owns the lane topology, towers, enemies, projectiles and run
//! statistics. Adapters and systems mutate it exclusively through [`apply`]
//! and observe it through the [`query`] module.

mod combat;
mod enemy;
mod grid;
mod navigation;
mod projectile;
mod save;
mod topology;
mod tower;

use std::{collections::BTreeMap, sync::Arc};

use glam::Vec2;
use pathforge_core::{
    BranchError, BuildError, CellCoord, Command, DamageType, EnemyArchetype, EnemyId, EnemyKey,
    EnemyTag, Event, GameTables, OnHit, PathVariant, PlacementError, RunStats, StatMods,
    StatusKind, TerrainTuning, TileKind, TilePoint, TowerBehavior, TowerId, TowerKey,
    UpgradeError, WaveStartError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use combat::{resolve_damage, DamageReport, Defenses, Status, StatusBook, TickModifiers, Vitals};
pub use enemy::{Enemy, EnemySignal, SpawnScaling, TerrainContext};
pub use grid::{GridConfig, TileGrid};
pub use projectile::Projectile;
pub use save::{GridRecord, HeroRecord, RunRecord, SaveError, TowerRecord};
pub use topology::GridTopology;
pub use tower::{EffectiveStats, Tower};

use projectile::Volley;
use tower::TowerRegistry;

/// Mixed into the run seed so the world stream differs from grid generation.
const WORLD_STREAM_SALT: u64 = 0x5eed_c0de_9a7f_0f0e;
/// Lifetime of a projectile in seconds.
const PROJECTILE_TTL: f32 = 2.6;
/// Radius in tiles searched for each chain lightning hop.
const CHAIN_RADIUS: f32 = 3.0;
/// Damage fraction carried by every chain hop after the first target.
const CHAIN_FALLOFF: f32 = 0.72;
/// Biome recorded for runs that never chose one.
const DEFAULT_BIOME: &str = "HIGHLANDS";

/// Player avatar state persisted alongside the run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hero {
    /// Continuous tile-space position.
    pub position: Vec2,
    /// Remaining dash cooldown in seconds.
    pub dash_cooldown: f32,
    /// Remaining shock cooldown in seconds.
    pub shock_cooldown: f32,
}

impl Hero {
    fn tick(&mut self, dt: f32) {
        self.dash_cooldown = (self.dash_cooldown - dt).max(0.0);
        self.shock_cooldown = (self.shock_cooldown - dt).max(0.0);
    }
}

/// Represents the authoritative Pathforge world state.
#[derive(Clone, Debug)]
pub struct World {
    tables: Arc<GameTables>,
    archetypes: BTreeMap<EnemyKey, Arc<EnemyArchetype>>,
    topology: GridTopology,
    stats: RunStats,
    towers: TowerRegistry,
    buffs: BTreeMap<TowerId, StatMods>,
    enemies: Vec<Enemy>,
    projectiles: Vec<Projectile>,
    rng: ChaCha8Rng,
    seed: u64,
    biome: String,
    hero: Hero,
    next_enemy_id: u32,
    wave_active: bool,
    assault: u32,
    failure_reported: bool,
}

impl World {
    /// Creates a world over the provided grid with the given run statistics.
    #[must_use]
    pub fn new(tables: Arc<GameTables>, grid: TileGrid, stats: RunStats, seed: u64) -> Self {
        let archetypes = tables
            .enemies
            .iter()
            .map(|archetype| (archetype.key, Arc::new(archetype.clone())))
            .collect();
        let hero = Hero {
            position: point(grid.start().center()),
            dash_cooldown: 0.0,
            shock_cooldown: 0.0,
        };
        let mut world = Self {
            tables,
            archetypes,
            topology: GridTopology::new(grid),
            stats,
            towers: TowerRegistry::default(),
            buffs: BTreeMap::new(),
            enemies: Vec::new(),
            projectiles: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed ^ WORLD_STREAM_SALT),
            seed,
            biome: DEFAULT_BIOME.to_owned(),
            hero,
            next_enemy_id: 0,
            wave_active: false,
            assault: 1,
            failure_reported: false,
        };
        world.refresh_buffs();
        world
    }

    /// Creates a world over a procedurally generated grid with default stats.
    #[must_use]
    pub fn generate(tables: Arc<GameTables>, config: &GridConfig) -> Self {
        Self::new(
            tables,
            TileGrid::generate(config),
            RunStats::default(),
            config.seed,
        )
    }

    /// Ordered lane cells when the lane forms a valid chain.
    pub fn lane(&mut self) -> Option<Arc<[CellCoord]>> {
        self.topology.chain_path()
    }

    /// Reports whether the lane is a single valid chain from start to end.
    pub fn is_lane_valid(&mut self) -> bool {
        self.topology.is_chain_valid()
    }

    /// Hop distance from the cell to the end of the lane.
    pub fn distance_to_end(&mut self, cell: CellCoord) -> Option<u32> {
        self.topology.distance_to_end(cell)
    }

    /// Runes currently powered by a reachable conductive tile.
    pub fn powered_runes(&mut self) -> Vec<CellCoord> {
        self.topology.powered_runes().to_vec()
    }

    /// Relic overlays lying on the current lane.
    pub fn relics_on_path(&mut self) -> u32 {
        self.topology.relics_on_path()
    }

    /// Replaces the biome label recorded with the run.
    pub fn set_biome(&mut self, biome: impl Into<String>) {
        self.biome = biome.into();
    }

    fn step(&mut self, dt: f32, out_events: &mut Vec<Event>) {
        let mut corrupted = false;
        let mut signals = Vec::new();
        {
            let mut context = FieldContext {
                topology: &mut self.topology,
                rng: &mut self.rng,
                tuning: self.stats.terrain,
            };
            for enemy in &mut self.enemies {
                enemy.update(dt, &mut context, &mut signals);
                for signal in signals.drain(..) {
                    match signal {
                        EnemySignal::BossPhase { phase, cell } => {
                            out_events.push(Event::BossPhaseReached {
                                enemy: enemy.id(),
                                phase,
                                cell,
                            });
                        }
                        EnemySignal::Corrupted { cell, variant } => {
                            corrupted = true;
                            out_events.push(Event::TerrainCorrupted { cell, variant });
                        }
                    }
                }
            }
        }
        if corrupted {
            self.refresh_routes();
        }

        let mut projectiles = std::mem::take(&mut self.projectiles);
        projectiles.retain_mut(|projectile| projectile.advance(dt, &mut self.enemies, &mut self.rng));
        self.projectiles = projectiles;

        let mut overclock_ended = false;
        for tower in self.towers.iter_mut() {
            overclock_ended |= tower.tick(dt);
        }
        self.hero.tick(dt);

        self.settle(out_events);
        if overclock_ended {
            self.refresh_buffs();
        }
    }

    fn settle(&mut self, out_events: &mut Vec<Event>) {
        let boss_wave = self.stats.wave % 10 == 0;
        for enemy in &self.enemies {
            if !enemy.is_alive() {
                let archetype = enemy.archetype();
                let mut reward = enemy.bounty();
                if boss_wave && self.stats.flags.boss_bounty && archetype.has_tag(EnemyTag::Boss) {
                    reward *= 2;
                }
                let mut chance = self.stats.frag_chance;
                if archetype.has_tag(EnemyTag::Elite) {
                    chance += 0.12;
                }
                let fragment = self.rng.gen::<f32>() < chance;
                self.stats.gold += reward;
                if fragment {
                    self.stats.fragments += 1;
                }
                out_events.push(Event::EnemyKilled {
                    enemy: enemy.id(),
                    key: enemy.key(),
                    reward,
                    fragment,
                });
            } else if enemy.is_finished() {
                self.stats.absorb_leak();
                out_events.push(Event::EnemyLeaked {
                    enemy: enemy.id(),
                    key: enemy.key(),
                });
            }
        }
        self.enemies.retain(Enemy::is_active);
        self.report_failure(out_events);
    }

    fn report_failure(&mut self, out_events: &mut Vec<Event>) {
        if self.stats.is_defeated() && !self.failure_reported {
            self.failure_reported = true;
            out_events.push(Event::RunFailed {
                wave: self.stats.wave,
            });
        }
    }

    fn refresh_routes(&mut self) {
        let lane = self.topology.chain_path();
        for enemy in &mut self.enemies {
            enemy.forget_route(lane.clone());
        }
        self.refresh_buffs();
    }

    /// Recomputes the aura and rune multipliers granted to every tower.
    fn refresh_buffs(&mut self) {
        let tables = Arc::clone(&self.tables);
        let beacons: Vec<(TowerId, Vec2, StatMods, f32)> = self
            .towers
            .iter()
            .filter_map(|tower| {
                let definition = tables.towers.get(tower.key())?;
                let aura = tower.aura(definition)?;
                let radius = tower.aura_radius(definition, &self.stats);
                Some((tower.id(), point(tower.cell().center()), aura, radius))
            })
            .collect();
        let runes = self.topology.powered_runes().to_vec();
        let rune_aura = self.stats.terrain.rune_aura;

        self.buffs.clear();
        for tower in self.towers.iter() {
            let center = point(tower.cell().center());
            let mut mods = StatMods::default();
            for (beacon, origin, aura, radius) in &beacons {
                if *beacon != tower.id() && origin.distance_squared(center) <= radius * radius {
                    mods = mods.combine(*aura);
                }
            }
            if runes
                .iter()
                .any(|rune| rune.chebyshev_distance(tower.cell()) <= rune_aura.radius)
            {
                mods = mods.combine(StatMods::new(rune_aura.damage_mul, 1.0, rune_aura.range_mul));
            }
            let _ = self.buffs.insert(tower.id(), mods);
        }
    }

    fn build_path(&mut self, cell: CellCoord, variant: PathVariant, out_events: &mut Vec<Event>) {
        let allow_rock = self.stats.flags.rock_building;
        let outcome = self
            .topology
            .check_build(cell, variant, allow_rock)
            .and_then(|()| {
                if !self.stats.is_path_unlocked(variant) {
                    return Err(BuildError::Locked);
                }
                let reforging = matches!(self.topology.tile(cell), Some(TileKind::Path(_)));
                let cost = if reforging && self.stats.flags.path_reforge_free {
                    0
                } else {
                    variant.paves_cost()
                };
                if self.stats.paves < cost {
                    return Err(BuildError::InsufficientPaves);
                }
                self.topology.try_build(cell, variant, allow_rock)?;
                self.stats.paves -= cost;
                Ok(())
            });

        match outcome {
            Ok(()) => {
                self.refresh_routes();
                out_events.push(Event::PathBuilt { cell, variant });
            }
            Err(reason) => out_events.push(Event::PathRejected { cell, reason }),
        }
    }

    fn place_tower(
        &mut self,
        key: TowerKey,
        cell: CellCoord,
        out_events: &mut Vec<Event>,
    ) {
        let allow_rock = self.stats.flags.rock_building;
        let rejection = match self.topology.tile(cell) {
            None => Some(PlacementError::OutOfBounds),
            Some(TileKind::Empty) => None,
            Some(TileKind::Rock) if allow_rock => None,
            Some(_) => Some(PlacementError::Occupied),
        };
        let definition = self.tables.towers.get(key);
        let rejection = rejection.or_else(|| {
            if !self.stats.is_tower_unlocked(key) || definition.is_none() {
                Some(PlacementError::Locked)
            } else {
                None
            }
        });
        let cost = definition.map_or(0, |definition| self.stats.tower_cost(definition.cost));
        let rejection = rejection.or_else(|| {
            (self.stats.gold < cost).then_some(PlacementError::InsufficientGold)
        });

        if let Some(reason) = rejection {
            out_events.push(Event::TowerPlacementRejected { key, cell, reason });
            return;
        }
        if !self.topology.occupy(cell, allow_rock) {
            out_events.push(Event::TowerPlacementRejected {
                key,
                cell,
                reason: PlacementError::Occupied,
            });
            return;
        }

        self.stats.gold -= cost;
        let tower = self.towers.insert(key, cell, cost);
        self.refresh_buffs();
        out_events.push(Event::TowerPlaced {
            tower,
            key,
            cell,
            cost,
        });
    }

    fn sell_tower(&mut self, id: TowerId, out_events: &mut Vec<Event>) {
        let Some(tower) = self.towers.remove(id) else {
            return;
        };
        let refund = (tower.spent() as f32 * self.stats.sell_refund).floor() as i64;
        self.stats.gold += refund;
        let _ = self.topology.erase(tower.cell());
        let _ = self.buffs.remove(&id);
        self.refresh_buffs();
        out_events.push(Event::TowerSold { tower: id, refund });
    }

    fn upgrade_tower(&mut self, id: TowerId, out_events: &mut Vec<Event>) {
        let tables = Arc::clone(&self.tables);
        let Some((tower, definition)) = self
            .towers
            .get_mut(id)
            .and_then(|tower| tables.towers.get(tower.key()).map(|definition| (tower, definition)))
        else {
            out_events.push(Event::TowerUpgradeRejected {
                tower: id,
                reason: UpgradeError::UnknownTower,
            });
            return;
        };

        let cost = tower.upgrade_cost(definition);
        if self.stats.gold < cost {
            out_events.push(Event::TowerUpgradeRejected {
                tower: id,
                reason: UpgradeError::InsufficientGold,
            });
            return;
        }
        self.stats.gold -= cost;
        tower.level += 1;
        tower.spent += cost;
        let level = tower.level;
        self.refresh_buffs();
        out_events.push(Event::TowerUpgraded {
            tower: id,
            level,
            cost,
        });
    }

    fn choose_branch(&mut self, id: TowerId, branch: String, out_events: &mut Vec<Event>) {
        let tables = Arc::clone(&self.tables);
        let outcome = match self.towers.get_mut(id) {
            None => Err(BranchError::UnknownTower),
            Some(tower) if tower.branch().is_some() => Err(BranchError::AlreadyChosen),
            Some(tower) if !tower.can_branch() => Err(BranchError::LevelTooLow),
            Some(tower) => {
                let known = tables
                    .towers
                    .get(tower.key())
                    .and_then(|definition| definition.branch(&branch))
                    .is_some();
                if known {
                    tower.branch = Some(branch.clone());
                    Ok(())
                } else {
                    Err(BranchError::UnknownBranch)
                }
            }
        };

        match outcome {
            Ok(()) => {
                self.refresh_buffs();
                out_events.push(Event::BranchChosen { tower: id, branch });
            }
            Err(reason) => out_events.push(Event::BranchRejected { tower: id, reason }),
        }
    }

    fn overclock(&mut self, id: TowerId, out_events: &mut Vec<Event>) {
        let tables = Arc::clone(&self.tables);
        let duration_mul = self.stats.overclock_dur_mul;
        let started = self.towers.get_mut(id).and_then(|tower| {
            let definition = tables.towers.get(tower.key())?;
            if !tower.can_overclock() {
                return None;
            }
            let duration = definition.overclock.duration * duration_mul;
            tower.overclock_time = duration;
            tower.overclock_cooldown = definition.overclock.cooldown;
            Some(duration)
        });

        match started {
            Some(duration) => {
                self.refresh_buffs();
                out_events.push(Event::OverclockStarted { tower: id, duration });
            }
            None => out_events.push(Event::OverclockRejected { tower: id }),
        }
    }

    fn start_wave(&mut self, assault: u32, out_events: &mut Vec<Event>) {
        let wave = self.stats.wave;
        let rejection = if self.stats.is_defeated() {
            Some(WaveStartError::RunOver)
        } else if self.wave_active {
            Some(WaveStartError::AlreadyActive)
        } else if !self.topology.is_chain_valid() {
            Some(WaveStartError::BrokenLane)
        } else {
            None
        };

        if let Some(reason) = rejection {
            out_events.push(Event::WaveRejected { wave, reason });
            return;
        }
        self.wave_active = true;
        self.assault = assault.max(1);
        out_events.push(Event::WaveStarted {
            wave,
            assault: self.assault,
        });
    }

    fn complete_wave(&mut self, out_events: &mut Vec<Event>) {
        if !self.wave_active {
            return;
        }
        let wave = self.stats.wave;
        let assault = self.assault;
        let reward = ((85.0 + 7.0 * wave as f32) * (1.0 + 0.55 * (assault - 1) as f32)).floor()
            as i64;
        self.stats.gold += reward;
        let relics = self.topology.relics_on_path();
        self.stats.end_wave_income(relics);
        for covered in wave..wave + assault {
            if covered % 5 == 0 {
                self.stats.talent_points += 1;
                if covered % 10 == 0 {
                    self.stats.talent_points += 1;
                }
            }
        }
        self.stats.wave += assault;
        self.projectiles.clear();
        self.wave_active = false;
        self.assault = 1;
        out_events.push(Event::WaveCompleted { wave, reward });
    }

    fn spawn_enemy(
        &mut self,
        key: EnemyKey,
        wave: u32,
        cell: Option<CellCoord>,
        out_events: &mut Vec<Event>,
    ) {
        let cell = cell.unwrap_or_else(|| self.topology.grid().start());
        let on_lane = self
            .topology
            .tile(cell)
            .is_some_and(|tile| tile.is_path() && tile != TileKind::End);
        let distance = self.topology.distance_to_end(cell);
        let archetype = self.archetypes.get(&key).cloned();
        let (Some(distance), Some(archetype), true) = (distance, archetype, on_lane) else {
            out_events.push(Event::SpawnRejected { key });
            return;
        };

        let id = EnemyId::new(self.next_enemy_id);
        self.next_enemy_id = self.next_enemy_id.saturating_add(1);
        let scaling = SpawnScaling {
            wave,
            speed_mul: self.stats.enemy_speed_mul,
            weakness_mul: self.stats.weakness_mul,
            gold_per_kill: self.stats.gold_per_kill,
        };
        let lane = self.topology.chain_path();
        self.enemies
            .push(Enemy::spawn(id, archetype, scaling, cell, lane, Some(distance)));
        out_events.push(Event::EnemySpawned {
            enemy: id,
            key,
            cell,
        });
    }

    fn attack(&mut self, id: TowerId, target: EnemyId, out_events: &mut Vec<Event>) {
        let tables = Arc::clone(&self.tables);
        let Some(tower) = self.towers.get(id) else {
            return;
        };
        let Some(definition) = tables.towers.get(tower.key()) else {
            return;
        };
        if !tower.is_ready() || definition.behavior == TowerBehavior::Support {
            return;
        }
        let buffs = self.buffs.get(&id).copied().unwrap_or_default();
        let effective = tower.effective(definition, &self.stats, buffs);
        let origin = point(tower.cell().center());
        let cell = tower.cell();
        let branch = tower.branch_mods(definition).cloned().unwrap_or_default();

        let Some(primary) = self.enemies.iter().position(|enemy| {
            enemy.id() == target
                && enemy.is_active()
                && enemy.position().distance_squared(origin) <= effective.range * effective.range
        }) else {
            return;
        };

        let bonus = self.stats.tower_bonus(definition.key);
        let mut on_hit = branch.on_hit.clone();
        on_hit.extend(self.stats.global_on_hit.values().copied());
        let damage_type = definition.damage_type;

        match definition.behavior {
            TowerBehavior::Frost | TowerBehavior::Flame => {
                let status = if definition.behavior == TowerBehavior::Frost {
                    OnHit::new(StatusKind::Slow, 1.4)
                        .with_strength(0.35 + branch.slow_strength_add + bonus.slow_strength_add)
                } else {
                    OnHit::new(StatusKind::Burn, 2.2)
                        .with_stacks(1 + branch.burn_stacks_add + bonus.burn_stacks_add)
                };
                let reach = effective.range * effective.range;
                let mut hits = 0;
                for enemy in &mut self.enemies {
                    if !enemy.is_active() || enemy.position().distance_squared(origin) > reach {
                        continue;
                    }
                    let _ = enemy.take_damage(effective.damage, damage_type);
                    enemy.add_status(&status);
                    if branch.stun_chance > 0.0 && self.rng.gen::<f32>() < branch.stun_chance {
                        enemy.add_status(&OnHit::new(StatusKind::Stun, branch.stun_duration));
                    }
                    afflict(enemy, &on_hit, &mut self.rng);
                    hits += 1;
                }
                out_events.push(Event::TowerStruck { tower: id, hits });
            }
            TowerBehavior::Chain => {
                let mut chains = 2 + branch.chains_add + bonus.chains_add;
                if self
                    .topology
                    .adjacent_variant_count(cell, PathVariant::Conductive)
                    > 0
                {
                    chains += if self.stats.flags.conduct_mastery { 2 } else { 1 };
                }
                let shock = OnHit::new(
                    StatusKind::Shock,
                    1.0 + branch.shock_dur_add + bonus.shock_dur_add,
                );
                let strike = Strike {
                    damage: effective.damage,
                    damage_type,
                    shock,
                };
                let hits = self.chain_lightning(primary, chains, &strike, &on_hit);
                out_events.push(Event::TowerStruck { tower: id, hits });
            }
            TowerBehavior::Projectile => {
                let enemy = &mut self.enemies[primary];
                let on_mud = enemy.standing_on() == TileKind::Path(PathVariant::Mud);
                if on_mud && self.rng.gen::<f32>() < definition.mud_miss_chance {
                    out_events.push(Event::ShotMissed { tower: id, target });
                } else {
                    let count = 1 + branch.multishot;
                    let volley = Volley {
                        tower: id,
                        origin,
                        damage: effective.damage,
                        damage_type,
                        splash: effective.splash,
                        pierce: effective.pierce,
                        speed: definition.projectile_speed,
                        ttl: PROJECTILE_TTL,
                        on_hit,
                    };
                    volley.launch(enemy.position(), count, &mut self.projectiles);
                    if branch.armor_shred > 0.0 {
                        enemy.add_status(&OnHit::new(StatusKind::Shred, 2.5));
                    }
                    out_events.push(Event::ProjectileFired {
                        tower: id,
                        target,
                        count,
                    });
                }
            }
            TowerBehavior::Support => return,
        }

        if let Some(tower) = self.towers.get_mut(id) {
            tower.cooldown = effective.cooldown;
        }
    }

    fn chain_lightning(
        &mut self,
        primary: usize,
        chains: u32,
        strike: &Strike,
        on_hit: &[OnHit],
    ) -> u32 {
        let mut struck = vec![primary];
        let mut current = primary;
        let mut amount = strike.damage;
        loop {
            let enemy = &mut self.enemies[current];
            let _ = enemy.take_damage(amount, strike.damage_type);
            enemy.add_status(&strike.shock);
            afflict(enemy, on_hit, &mut self.rng);

            if struck.len() > chains as usize {
                break;
            }
            let from = self.enemies[current].position();
            let reach = CHAIN_RADIUS * CHAIN_RADIUS;
            let mut next: Option<(usize, f32)> = None;
            for (index, candidate) in self.enemies.iter().enumerate() {
                if struck.contains(&index) || !candidate.is_active() {
                    continue;
                }
                let distance = candidate.position().distance_squared(from);
                if distance <= reach && next.map_or(true, |(_, best)| distance < best) {
                    next = Some((index, distance));
                }
            }
            let Some((index, _)) = next else {
                break;
            };
            struck.push(index);
            current = index;
            amount = strike.damage * CHAIN_FALLOFF;
        }
        u32::try_from(struck.len()).unwrap_or(u32::MAX)
    }
}

/// Damage and shock carried along a lightning chain.
struct Strike {
    damage: f32,
    damage_type: DamageType,
    shock: OnHit,
}

/// Applies on-hit payloads, rolling each one's chance.
fn afflict<R: Rng + ?Sized>(enemy: &mut Enemy, on_hit: &[OnHit], rng: &mut R) {
    for payload in on_hit {
        if payload.chance >= 1.0 || rng.gen::<f32>() < payload.chance {
            enemy.add_status(payload);
        }
    }
}

fn point(tile: TilePoint) -> Vec2 {
    Vec2::new(tile.x(), tile.y())
}

/// Lane access handed to enemies while the world advances them.
struct FieldContext<'a> {
    topology: &'a mut GridTopology,
    rng: &'a mut ChaCha8Rng,
    tuning: TerrainTuning,
}

impl TerrainContext for FieldContext<'_> {
    fn tile(&self, cell: CellCoord) -> Option<TileKind> {
        self.topology.tile(cell)
    }

    fn end(&self) -> CellCoord {
        self.topology.grid().end()
    }

    fn distance_to_end(&mut self, cell: CellCoord) -> Option<u32> {
        self.topology.distance_to_end(cell)
    }

    fn next_cell(&mut self, cell: CellCoord, previous: Option<CellCoord>) -> Option<CellCoord> {
        self.topology.next_cell(cell, previous, &mut *self.rng)
    }

    fn roll(&mut self) -> f32 {
        self.rng.gen()
    }

    fn corrupt_near(&mut self, cell: CellCoord) -> Option<(CellCoord, PathVariant)> {
        self.topology.corrupt_near(cell, &mut *self.rng)
    }

    fn tuning(&self) -> TerrainTuning {
        self.tuning
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            out_events.push(Event::TimeAdvanced { dt });
            world.step(dt.as_secs_f32(), out_events);
        }
        Command::BuildPath { cell, variant } => world.build_path(cell, variant, out_events),
        Command::Erase { cell } => {
            if let Some(tower) = world.towers.at(cell) {
                world.sell_tower(tower, out_events);
            } else if let Some(TileKind::Path(_)) = world.topology.erase(cell) {
                world.refresh_routes();
                out_events.push(Event::TileErased { cell });
            }
        }
        Command::PlaceTower { key, cell } => world.place_tower(key, cell, out_events),
        Command::SellTower { tower } => world.sell_tower(tower, out_events),
        Command::UpgradeTower { tower } => world.upgrade_tower(tower, out_events),
        Command::ChooseBranch { tower, branch } => world.choose_branch(tower, branch, out_events),
        Command::SetTargetMode { tower, mode } => {
            if let Some(state) = world.towers.get_mut(tower) {
                state.mode = mode;
                out_events.push(Event::TargetModeChanged { tower, mode });
            }
        }
        Command::Overclock { tower } => world.overclock(tower, out_events),
        Command::StartWave { assault } => world.start_wave(assault, out_events),
        Command::SpawnEnemy { key, wave } => world.spawn_enemy(key, wave, None, out_events),
        Command::SpawnEnemyAt { key, cell } => {
            let wave = world.stats.wave;
            world.spawn_enemy(key, wave, Some(cell), out_events);
        }
        Command::TowerAttack { tower, target } => world.attack(tower, target, out_events),
        Command::CompleteWave => world.complete_wave(out_events),
        Command::ApplyPerk { perk } => {
            world.stats.apply_perk(&perk);
            world.refresh_buffs();
            out_events.push(Event::PerkApplied { id: perk.id });
        }
        Command::RerollPerks => match world.stats.spend_perk_reroll() {
            Ok(()) => out_events.push(Event::PerksRerolled {
                remaining: world.stats.perk_rerolls,
            }),
            Err(reason) => out_events.push(Event::RerollRejected { reason }),
        },
        Command::BuyTalent { talent } => match world.stats.buy_talent(&talent) {
            Ok(()) => {
                world.refresh_buffs();
                out_events.push(Event::TalentPurchased { id: talent.id });
            }
            Err(reason) => out_events.push(Event::TalentRejected {
                id: talent.id,
                reason,
            }),
        },
        Command::ForceFailure => {
            world.stats.lives = 0;
            world.wave_active = false;
            world.report_failure(out_events);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use pathforge_core::{
        CellCoord, EnemySnapshot, EnemyView, GameTables, RunStats, TilePoint, TowerId,
        TowerSnapshot, TowerView,
    };

    use super::{EffectiveStats, Enemy, Hero, Projectile, TileGrid, Tower, World};

    /// Provides read-only access to the world's tile grid.
    #[must_use]
    pub fn tile_grid(world: &World) -> &TileGrid {
        world.topology.grid()
    }

    /// Run statistics of the current run.
    #[must_use]
    pub fn stats(world: &World) -> &RunStats {
        &world.stats
    }

    /// Data tables the world was created with.
    #[must_use]
    pub fn tables(world: &World) -> &GameTables {
        &world.tables
    }

    /// Seed the run was created from.
    #[must_use]
    pub fn seed(world: &World) -> u64 {
        world.seed
    }

    /// Biome label of the run.
    #[must_use]
    pub fn biome(world: &World) -> &str {
        &world.biome
    }

    /// Player avatar state.
    #[must_use]
    pub fn hero(world: &World) -> &Hero {
        &world.hero
    }

    /// Reports whether a wave is currently running.
    #[must_use]
    pub fn wave_active(world: &World) -> bool {
        world.wave_active
    }

    /// Assault multiplier of the running wave.
    #[must_use]
    pub fn assault(world: &World) -> u32 {
        world.assault
    }

    /// Live enemies in spawn order.
    #[must_use]
    pub fn enemies(world: &World) -> &[Enemy] {
        &world.enemies
    }

    /// Number of live enemies.
    #[must_use]
    pub fn enemy_count(world: &World) -> usize {
        world.enemies.len()
    }

    /// Projectiles in flight.
    #[must_use]
    pub fn projectiles(world: &World) -> &[Projectile] {
        &world.projectiles
    }

    /// Towers in identifier order.
    pub fn towers(world: &World) -> impl Iterator<Item = &Tower> {
        world.towers.iter()
    }

    /// Number of placed towers.
    #[must_use]
    pub fn tower_count(world: &World) -> usize {
        world.towers.len()
    }

    /// Tower with the given identifier.
    #[must_use]
    pub fn tower(world: &World, id: TowerId) -> Option<&Tower> {
        world.towers.get(id)
    }

    /// Identifier of the tower occupying the cell.
    #[must_use]
    pub fn tower_at(world: &World, cell: CellCoord) -> Option<TowerId> {
        world.towers.at(cell)
    }

    /// Effective stats of a tower including every active buff.
    #[must_use]
    pub fn tower_stats(world: &World, id: TowerId) -> Option<EffectiveStats> {
        let tower = world.towers.get(id)?;
        let definition = world.tables.towers.get(tower.key())?;
        let buffs = world.buffs.get(&id).copied().unwrap_or_default();
        Some(tower.effective(definition, &world.stats, buffs))
    }

    /// Captures a read-only view of the enemies on the lane.
    #[must_use]
    pub fn enemy_view(world: &World) -> EnemyView {
        let snapshots = world
            .enemies
            .iter()
            .filter(|enemy| enemy.is_active())
            .map(|enemy| {
                let vitals = enemy.vitals();
                EnemySnapshot {
                    id: enemy.id(),
                    key: enemy.key(),
                    position: TilePoint::new(enemy.position().x, enemy.position().y),
                    cell: enemy.cell(),
                    progress: enemy.progress(),
                    hp: vitals.hp,
                    shield: vitals.shield,
                    armor: vitals.armor,
                }
            })
            .collect();
        EnemyView::from_snapshots(snapshots)
    }

    /// Captures a read-only view of the placed towers.
    #[must_use]
    pub fn tower_view(world: &World) -> TowerView {
        let snapshots = world
            .towers
            .iter()
            .filter_map(|tower| {
                let definition = world.tables.towers.get(tower.key())?;
                let stats = tower_stats(world, tower.id())?;
                Some(TowerSnapshot {
                    id: tower.id(),
                    key: tower.key(),
                    behavior: definition.behavior,
                    cell: tower.cell(),
                    mode: tower.mode(),
                    range: stats.range,
                    ready: tower.is_ready(),
                })
            })
            .collect();
        TowerView::from_snapshots(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use pathforge_core::{Effect, Perk, Rarity, RerollError, TargetMode};

    const TICK: Duration = Duration::from_nanos(16_666_667);

    fn straight_world() -> World {
        let mut world = World::new(
            Arc::new(GameTables::default()),
            TileGrid::blank(10, 8),
            RunStats::default(),
            42,
        );
        let mut events = Vec::new();
        for column in 2..8 {
            apply(
                &mut world,
                Command::BuildPath {
                    cell: CellCoord::new(column, 4),
                    variant: PathVariant::Standard,
                },
                &mut events,
            );
        }
        assert!(world.is_lane_valid());
        world
    }

    fn place(world: &mut World, key: TowerKey, cell: CellCoord) -> TowerId {
        let mut events = Vec::new();
        apply(world, Command::PlaceTower { key, cell }, &mut events);
        match events.as_slice() {
            [Event::TowerPlaced { tower, .. }] => *tower,
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn building_paths_spends_paves() {
        let world = straight_world();
        assert_eq!(world.stats.paves, 120 - 6);
    }

    #[test]
    fn locked_variants_are_rejected_before_spending() {
        let mut world = straight_world();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::BuildPath {
                cell: CellCoord::new(3, 4),
                variant: PathVariant::Fast,
            },
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::PathRejected {
                cell: CellCoord::new(3, 4),
                reason: BuildError::Locked,
            }]
        );
        assert_eq!(world.stats.paves, 114);
    }

    #[test]
    fn placement_checks_bounds_occupancy_unlock_and_gold() {
        let mut world = straight_world();
        let mut events = Vec::new();
        let attempts = [
            (TowerKey::Gatling, CellCoord::new(40, 0), PlacementError::OutOfBounds),
            (TowerKey::Gatling, CellCoord::new(3, 4), PlacementError::Occupied),
            (TowerKey::Sniper, CellCoord::new(3, 3), PlacementError::Locked),
        ];
        for (key, cell, _) in attempts {
            apply(&mut world, Command::PlaceTower { key, cell }, &mut events);
        }
        let reasons: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                Event::TowerPlacementRejected { reason, .. } => Some(*reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            attempts.iter().map(|(_, _, reason)| *reason).collect::<Vec<_>>()
        );

        world.stats.gold = 10;
        events.clear();
        apply(
            &mut world,
            Command::PlaceTower {
                key: TowerKey::Gatling,
                cell: CellCoord::new(3, 3),
            },
            &mut events,
        );
        assert!(matches!(
            events[0],
            Event::TowerPlacementRejected {
                reason: PlacementError::InsufficientGold,
                ..
            }
        ));
    }

    #[test]
    fn selling_refunds_spend_fraction_and_frees_cell() {
        let mut world = straight_world();
        let tower = place(&mut world, TowerKey::Gatling, CellCoord::new(3, 3));
        let mut events = Vec::new();
        apply(&mut world, Command::UpgradeTower { tower }, &mut events);
        assert_eq!(world.stats.gold, 300 - 60 - 79);

        events.clear();
        apply(
            &mut world,
            Command::Erase {
                cell: CellCoord::new(3, 3),
            },
            &mut events,
        );
        assert_eq!(
            events,
            vec![Event::TowerSold {
                tower,
                refund: 97,
            }]
        );
        assert_eq!(world.topology.tile(CellCoord::new(3, 3)), Some(TileKind::Empty));
        assert_eq!(query::tower_count(&world), 0);
    }

    #[test]
    fn branch_choice_requires_level_three() {
        let mut world = straight_world();
        world.stats.gold = 10_000;
        let tower = place(&mut world, TowerKey::Gatling, CellCoord::new(3, 3));
        let mut events = Vec::new();
        let choose = |branch: &str| Command::ChooseBranch {
            tower,
            branch: branch.to_owned(),
        };

        apply(&mut world, choose("twin"), &mut events);
        apply(&mut world, Command::UpgradeTower { tower }, &mut events);
        apply(&mut world, Command::UpgradeTower { tower }, &mut events);
        apply(&mut world, choose("unknown"), &mut events);
        apply(&mut world, choose("twin"), &mut events);
        apply(&mut world, choose("minigun"), &mut events);

        let outcomes: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                Event::BranchRejected { reason, .. } => Some(Err(*reason)),
                Event::BranchChosen { branch, .. } => Some(Ok(branch.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            outcomes,
            vec![
                Err(BranchError::LevelTooLow),
                Err(BranchError::UnknownBranch),
                Ok("twin".to_owned()),
                Err(BranchError::AlreadyChosen),
            ]
        );
    }

    #[test]
    fn armor_piercing_shots_add_one_shred_stack() {
        let mut tables = GameTables::default();
        for definition in tables.towers.iter_mut() {
            for branch in &mut definition.branches {
                if branch.name == "ap_rounds" {
                    branch.mods.armor_shred = 3.0;
                }
            }
        }
        let mut world = World::new(
            Arc::new(tables),
            TileGrid::blank(10, 8),
            RunStats::default(),
            42,
        );
        let mut events = Vec::new();
        for column in 2..8 {
            apply(
                &mut world,
                Command::BuildPath {
                    cell: CellCoord::new(column, 4),
                    variant: PathVariant::Standard,
                },
                &mut events,
            );
        }
        world.stats.gold = 10_000;
        let tower = place(&mut world, TowerKey::Gatling, CellCoord::new(4, 3));
        apply(&mut world, Command::UpgradeTower { tower }, &mut events);
        apply(&mut world, Command::UpgradeTower { tower }, &mut events);
        apply(
            &mut world,
            Command::ChooseBranch {
                tower,
                branch: "ap_rounds".to_owned(),
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::SpawnEnemyAt {
                key: EnemyKey::Tank,
                cell: CellCoord::new(4, 4),
            },
            &mut events,
        );

        apply(
            &mut world,
            Command::TowerAttack {
                tower,
                target: EnemyId::new(0),
            },
            &mut events,
        );

        let shred = query::enemies(&world)[0]
            .statuses()
            .get(StatusKind::Shred)
            .copied()
            .expect("shredded");
        assert_eq!(shred.stacks, 1);
        assert!((shred.duration - 2.5).abs() < 1e-6);
    }

    #[test]
    fn waves_require_a_valid_lane() {
        let mut world = World::new(
            Arc::new(GameTables::default()),
            TileGrid::blank(10, 8),
            RunStats::default(),
            1,
        );
        let mut events = Vec::new();
        apply(&mut world, Command::StartWave { assault: 1 }, &mut events);
        assert_eq!(
            events,
            vec![Event::WaveRejected {
                wave: 1,
                reason: WaveStartError::BrokenLane,
            }]
        );
    }

    #[test]
    fn completing_an_assault_advances_several_waves() {
        let mut world = straight_world();
        world.stats.wave = 4;
        let mut events = Vec::new();
        apply(&mut world, Command::StartWave { assault: 2 }, &mut events);
        apply(&mut world, Command::StartWave { assault: 1 }, &mut events);
        apply(&mut world, Command::CompleteWave, &mut events);

        assert!(matches!(
            events[1],
            Event::WaveRejected {
                reason: WaveStartError::AlreadyActive,
                ..
            }
        ));
        let reward = ((85.0 + 28.0) * 1.55_f32).floor() as i64;
        assert_eq!(events[2], Event::WaveCompleted { wave: 4, reward });
        assert_eq!(world.stats.wave, 6);
        assert_eq!(world.stats.talent_points, 1);
    }

    #[test]
    fn assault_enemies_carry_the_tier_of_their_own_wave() {
        let mut world = straight_world();
        world.stats.wave = 4;
        let mut events = Vec::new();
        apply(&mut world, Command::StartWave { assault: 2 }, &mut events);
        apply(&mut world, Command::SpawnEnemy { key: EnemyKey::Soldier, wave: 4 }, &mut events);
        apply(&mut world, Command::SpawnEnemy { key: EnemyKey::Soldier, wave: 5 }, &mut events);

        let hp = GameTables::default()
            .enemies
            .get(EnemyKey::Soldier)
            .map(|archetype| archetype.hp)
            .expect("soldier");
        let spawned = query::enemies(&world);
        assert_eq!(spawned.len(), 2);
        assert!((spawned[0].vitals().max_hp - 30.0 * hp * (1.0 + 0.23 * 3.0)).abs() < 1e-3);
        assert!((spawned[1].vitals().max_hp - 30.0 * hp * (1.0 + 0.23 * 4.0)).abs() < 1e-3);
        assert_eq!(world.stats.wave, 4);
    }

    #[test]
    fn leaks_consume_lives_and_report_failure_once() {
        let mut world = straight_world();
        world.stats.lives = 1;
        let mut events = Vec::new();
        apply(&mut world, Command::SpawnEnemy { key: EnemyKey::Scout, wave: 1 }, &mut events);
        apply(&mut world, Command::SpawnEnemy { key: EnemyKey::Scout, wave: 1 }, &mut events);
        for _ in 0..600 {
            apply(&mut world, Command::Tick { dt: TICK }, &mut events);
        }

        let leaks = events
            .iter()
            .filter(|event| matches!(event, Event::EnemyLeaked { .. }))
            .count();
        let failures = events
            .iter()
            .filter(|event| matches!(event, Event::RunFailed { .. }))
            .count();
        assert_eq!(leaks, 2);
        assert_eq!(failures, 1);
        assert!(world.stats.is_defeated());
    }

    #[test]
    fn spawning_needs_a_route_to_the_end() {
        let mut world = World::new(
            Arc::new(GameTables::default()),
            TileGrid::blank(10, 8),
            RunStats::default(),
            1,
        );
        let mut events = Vec::new();
        apply(&mut world, Command::SpawnEnemy { key: EnemyKey::Soldier, wave: 1 }, &mut events);
        assert_eq!(
            events,
            vec![Event::SpawnRejected {
                key: EnemyKey::Soldier
            }]
        );
    }

    #[test]
    fn frost_towers_chill_everything_in_range() {
        let mut world = straight_world();
        let _ = world.stats.unlocked_towers.insert(TowerKey::Cryo);
        let tower = place(&mut world, TowerKey::Cryo, CellCoord::new(4, 3));
        let mut events = Vec::new();
        for cell in [CellCoord::new(3, 4), CellCoord::new(5, 4)] {
            apply(
                &mut world,
                Command::SpawnEnemyAt {
                    key: EnemyKey::Soldier,
                    cell,
                },
                &mut events,
            );
        }

        apply(
            &mut world,
            Command::TowerAttack {
                tower,
                target: EnemyId::new(0),
            },
            &mut events,
        );

        assert!(events.contains(&Event::TowerStruck { tower, hits: 2 }));
        for enemy in query::enemies(&world) {
            let slow = enemy.statuses().get(StatusKind::Slow).expect("slowed");
            assert!((slow.strength - 0.35).abs() < 1e-6);
        }
        assert!(!query::tower(&world, tower).expect("tower").is_ready());
    }

    #[test]
    fn chain_lightning_hops_between_nearby_enemies() {
        let mut world = straight_world();
        let _ = world.stats.unlocked_towers.insert(TowerKey::Tesla);
        let tower = place(&mut world, TowerKey::Tesla, CellCoord::new(4, 3));
        let mut events = Vec::new();
        for column in [3, 4, 5, 6] {
            apply(
                &mut world,
                Command::SpawnEnemyAt {
                    key: EnemyKey::Soldier,
                    cell: CellCoord::new(column, 4),
                },
                &mut events,
            );
        }

        apply(
            &mut world,
            Command::TowerAttack {
                tower,
                target: EnemyId::new(1),
            },
            &mut events,
        );

        assert!(events.contains(&Event::TowerStruck { tower, hits: 3 }));
        let first = &query::enemies(&world)[1];
        assert!((first.vitals().hp - (30.0 - 14.0)).abs() < 1e-4);
    }

    #[test]
    fn chain_lightning_deals_the_towers_damage_type() {
        let mut tables = GameTables::default();
        for definition in tables.towers.iter_mut() {
            if definition.key == TowerKey::Tesla {
                definition.damage_type = DamageType::Bio;
            }
        }
        let mut world = World::new(
            Arc::new(tables),
            TileGrid::blank(10, 8),
            RunStats::default(),
            42,
        );
        let mut events = Vec::new();
        for column in 2..8 {
            apply(
                &mut world,
                Command::BuildPath {
                    cell: CellCoord::new(column, 4),
                    variant: PathVariant::Standard,
                },
                &mut events,
            );
        }
        let _ = world.stats.unlocked_towers.insert(TowerKey::Tesla);
        let tower = place(&mut world, TowerKey::Tesla, CellCoord::new(4, 3));
        apply(
            &mut world,
            Command::SpawnEnemyAt {
                key: EnemyKey::Mutant,
                cell: CellCoord::new(4, 4),
            },
            &mut events,
        );
        let full = query::enemies(&world)[0].vitals().hp;

        apply(
            &mut world,
            Command::TowerAttack {
                tower,
                target: EnemyId::new(0),
            },
            &mut events,
        );

        // Mutants halve bio damage.
        let hp = query::enemies(&world)[0].vitals().hp;
        assert!((full - hp - 14.0 * 0.5).abs() < 1e-4);
    }

    #[test]
    fn beacon_aura_buffs_neighbouring_towers() {
        let mut world = straight_world();
        let _ = world.stats.unlocked_towers.insert(TowerKey::Beacon);
        world.stats.gold = 10_000;
        let gatling = place(&mut world, TowerKey::Gatling, CellCoord::new(3, 3));
        let before = query::tower_stats(&world, gatling).expect("stats");
        let _ = place(&mut world, TowerKey::Beacon, CellCoord::new(4, 3));
        let after = query::tower_stats(&world, gatling).expect("stats");

        assert!((after.damage - before.damage * 1.08).abs() < 1e-4);
        assert!((after.range - before.range * 1.04).abs() < 1e-4);
    }

    #[test]
    fn perk_rerolls_spend_charges_and_fragments() {
        let mut world = straight_world();
        world.stats.fragments = 30;
        let mut events = Vec::new();

        apply(&mut world, Command::RerollPerks, &mut events);
        apply(&mut world, Command::RerollPerks, &mut events);

        assert_eq!(
            events,
            vec![
                Event::PerksRerolled { remaining: 0 },
                Event::RerollRejected {
                    reason: RerollError::NoRerolls,
                },
            ]
        );
        assert_eq!(world.stats.fragments, 5);
    }

    #[test]
    fn buffs_are_rebuilt_only_when_an_overclock_ends() {
        let mut world = straight_world();
        let tower = place(&mut world, TowerKey::Gatling, CellCoord::new(3, 3));
        let mut events = Vec::new();
        apply(&mut world, Command::Overclock { tower }, &mut events);
        let marker = TowerId::new(99);
        let _ = world.buffs.insert(marker, StatMods::default());

        for _ in 0..10 {
            apply(&mut world, Command::Tick { dt: TICK }, &mut events);
        }
        assert!(world.buffs.contains_key(&marker));

        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(5),
            },
            &mut events,
        );
        assert!(!world.buffs.contains_key(&marker));
        assert!(world.buffs.contains_key(&tower));
    }

    #[test]
    fn perks_change_run_stats_and_target_modes_cycle() {
        let mut world = straight_world();
        let tower = place(&mut world, TowerKey::Gatling, CellCoord::new(3, 3));
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ApplyPerk {
                perk: Perk {
                    id: "sharp".to_owned(),
                    name: "Sharp".to_owned(),
                    rarity: Rarity::Common,
                    effects: vec![Effect::DamageMul(1.5)],
                },
            },
            &mut events,
        );
        apply(
            &mut world,
            Command::SetTargetMode {
                tower,
                mode: TargetMode::Strongest,
            },
            &mut events,
        );

        let stats = query::tower_stats(&world, tower).expect("stats");
        assert!((stats.damage - 9.0).abs() < 1e-4);
        assert_eq!(
            query::tower(&world, tower).map(Tower::mode),
            Some(TargetMode::Strongest)
        );
    }
}
