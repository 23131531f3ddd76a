//! Enemy state machine advanced once per tick.

use std::sync::Arc;

use glam::Vec2;
use pathforge_core::{
    CellCoord, DamageType, EnemyArchetype, EnemyId, EnemyKey, EnemyTag, OnHit, PathVariant,
    StatusKind, TerrainTuning, TileKind,
};

use crate::combat::{resolve_damage, DamageReport, Defenses, StatusBook, Vitals};

/// Seconds of lane time between sapper corruption attempts.
const SAPPER_INTERVAL: f32 = 2.4;

/// Read access to the lane plus the injected random stream, handed to
/// enemies for the duration of one update.
pub trait TerrainContext {
    /// Tile stored at the cell.
    fn tile(&self, cell: CellCoord) -> Option<TileKind>;
    /// Lane exit.
    fn end(&self) -> CellCoord;
    /// Hop distance from the cell to the exit.
    fn distance_to_end(&mut self, cell: CellCoord) -> Option<u32>;
    /// Branch-resolved next waypoint.
    fn next_cell(&mut self, cell: CellCoord, previous: Option<CellCoord>) -> Option<CellCoord>;
    /// Uniform sample in `[0, 1)`.
    fn roll(&mut self) -> f32;
    /// Flips a lane tile near the cell toward mud.
    fn corrupt_near(&mut self, cell: CellCoord) -> Option<(CellCoord, PathVariant)>;
    /// Terrain interaction knobs.
    fn tuning(&self) -> TerrainTuning;
}

/// One-shot signals raised by an enemy during its update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EnemySignal {
    /// A boss crossed a health threshold.
    BossPhase {
        /// Phase entered, starting at one.
        phase: u8,
        /// Cell the boss occupied.
        cell: CellCoord,
    },
    /// A sapper flipped a lane tile.
    Corrupted {
        /// Cell that changed.
        cell: CellCoord,
        /// Variant the cell now holds.
        variant: PathVariant,
    },
}

/// Run-wide values that scale a freshly spawned enemy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnScaling {
    /// Wave the enemy belongs to.
    pub wave: u32,
    /// Global enemy speed multiplier.
    pub speed_mul: f32,
    /// Multiplier applied to weakness hits.
    pub weakness_mul: f32,
    /// Gold added to every kill.
    pub gold_per_kill: i64,
}

/// Live enemy walking the lane.
#[derive(Clone, Debug)]
pub struct Enemy {
    id: EnemyId,
    archetype: Arc<EnemyArchetype>,
    position: Vec2,
    cell: CellCoord,
    previous: Option<CellCoord>,
    next: Option<CellCoord>,
    lane: Option<Arc<[CellCoord]>>,
    lane_index: usize,
    progress: i64,
    steps: u32,
    vitals: Vitals,
    statuses: StatusBook,
    base_speed: f32,
    weakness_mul: f32,
    boss_phase: u8,
    reward: i64,
    tile_gold_bonus: i64,
    standing_on: TileKind,
    sapper_timer: f32,
    finished: bool,
}

impl Enemy {
    /// Creates an enemy on the given lane cell with wave-scaled stats.
    #[must_use]
    pub fn spawn(
        id: EnemyId,
        archetype: Arc<EnemyArchetype>,
        scaling: SpawnScaling,
        cell: CellCoord,
        lane: Option<Arc<[CellCoord]>>,
        distance_to_end: Option<u32>,
    ) -> Self {
        let tier = 1.0 + 0.23 * (scaling.wave.max(1) - 1) as f32;
        let max_hp = 30.0 * archetype.hp * tier;
        let shield = archetype.shield * 8.0 * tier;
        let reward = (5.0 + scaling.wave as f32 * 1.6).floor() as i64 + scaling.gold_per_kill;
        let lane_index = lane
            .as_ref()
            .and_then(|lane| lane.iter().position(|candidate| *candidate == cell))
            .unwrap_or(0);
        Self {
            id,
            position: cell_center(cell),
            cell,
            previous: None,
            next: None,
            lane,
            lane_index,
            progress: -i64::from(distance_to_end.unwrap_or(0)),
            steps: 0,
            vitals: Vitals::new(max_hp, shield, archetype.armor),
            statuses: StatusBook::default(),
            base_speed: archetype.speed * scaling.speed_mul,
            weakness_mul: scaling.weakness_mul,
            boss_phase: 0,
            reward,
            tile_gold_bonus: 0,
            standing_on: TileKind::Start,
            sapper_timer: 0.0,
            finished: false,
            archetype,
        }
    }

    /// Identifier of the enemy.
    #[must_use]
    pub fn id(&self) -> EnemyId {
        self.id
    }

    /// Archetype key of the enemy.
    #[must_use]
    pub fn key(&self) -> EnemyKey {
        self.archetype.key
    }

    /// Archetype the enemy was spawned from.
    #[must_use]
    pub fn archetype(&self) -> &EnemyArchetype {
        &self.archetype
    }

    /// Continuous tile-space position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Cell the enemy currently occupies.
    #[must_use]
    pub fn cell(&self) -> CellCoord {
        self.cell
    }

    /// Lane progress; larger values are closer to the end.
    #[must_use]
    pub fn progress(&self) -> i64 {
        self.progress
    }

    /// Health, shield and armour.
    #[must_use]
    pub fn vitals(&self) -> &Vitals {
        &self.vitals
    }

    /// Active statuses.
    #[must_use]
    pub fn statuses(&self) -> &StatusBook {
        &self.statuses
    }

    /// Tile the enemy stood on during its last update.
    #[must_use]
    pub fn standing_on(&self) -> TileKind {
        self.standing_on
    }

    /// Gold paid when the enemy dies, including the terrain bonus.
    #[must_use]
    pub fn bounty(&self) -> i64 {
        self.reward + self.tile_gold_bonus
    }

    /// Reports whether the enemy is alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.vitals.alive
    }

    /// Reports whether the enemy reached the end of the lane.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Reports whether the enemy still participates in combat.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.vitals.alive && !self.finished
    }

    /// Applies a hit through the damage resolution pipeline.
    pub fn take_damage(&mut self, amount: f32, damage_type: DamageType) -> DamageReport {
        let defenses = Defenses {
            weakness: self.archetype.weakness,
            weakness_mul: self.weakness_mul,
            resist: &self.archetype.resist,
            shield_mult: &self.archetype.shield_mult,
            on_cryo: self.standing_on == TileKind::Path(PathVariant::Cryo),
        };
        resolve_damage(&mut self.vitals, &defenses, amount, damage_type)
    }

    /// Attaches a status.
    pub fn add_status(&mut self, on_hit: &OnHit) {
        self.statuses.add(on_hit);
    }

    /// Drops the cached next waypoint so it is recomputed against a new lane.
    pub fn forget_route(&mut self, lane: Option<Arc<[CellCoord]>>) {
        self.next = None;
        self.lane_index = lane
            .as_ref()
            .and_then(|lane| lane.iter().position(|candidate| *candidate == self.cell))
            .unwrap_or(0);
        self.lane = lane;
    }

    /// Advances statuses, terrain effects and movement by `dt` seconds.
    pub fn update<C: TerrainContext>(
        &mut self,
        dt: f32,
        context: &mut C,
        signals: &mut Vec<EnemySignal>,
    ) {
        if !self.is_active() {
            return;
        }

        let boss = self.archetype.has_tag(EnemyTag::Boss);
        let modifiers = self.statuses.tick(dt, boss);
        self.vitals.armor = (self.vitals.base_armor - modifiers.shred).max(0.0);
        self.vitals.vuln_mult = 1.0 + modifiers.vuln;

        if self.archetype.regen > 0.0 && self.vitals.hp < self.vitals.max_hp {
            let mut regen = self.archetype.regen * dt;
            if modifiers.burn_dps > 0.0 {
                regen *= 0.4;
            }
            self.vitals.hp = (self.vitals.hp + regen).min(self.vitals.max_hp);
        }

        if modifiers.burn_dps > 0.0 {
            let _ = self.take_damage(modifiers.burn_dps * dt, DamageType::Fire);
        }
        if modifiers.poison_dps > 0.0 {
            let _ = self.take_damage(modifiers.poison_dps * dt, DamageType::Bio);
        }
        if !self.vitals.alive {
            return;
        }

        if boss {
            let fraction = self.vitals.hp / self.vitals.max_hp.max(f32::EPSILON);
            if self.boss_phase == 0 && fraction < 0.66 {
                self.boss_phase = 1;
                signals.push(EnemySignal::BossPhase {
                    phase: 1,
                    cell: self.cell,
                });
            }
            if self.boss_phase == 1 && fraction < 0.33 {
                self.boss_phase = 2;
                signals.push(EnemySignal::BossPhase {
                    phase: 2,
                    cell: self.cell,
                });
            }
        }

        if modifiers.stunned {
            return;
        }

        let tile = position_cell(self.position)
            .and_then(|cell| context.tile(cell))
            .unwrap_or(self.standing_on);
        self.standing_on = tile;
        self.apply_terrain(tile, dt, context, signals);

        let mut speed = self.base_speed * (1.0 - modifiers.slow);
        if modifiers.shocked {
            speed *= 0.86;
        }
        speed *= tile.speed_multiplier();
        let momentum_cap = if boss { 0.25 } else { 0.40 };
        speed *= 1.0 + (0.004 * self.steps as f32).min(momentum_cap);

        self.advance(speed * dt, context);
    }

    fn apply_terrain<C: TerrainContext>(
        &mut self,
        tile: TileKind,
        dt: f32,
        context: &mut C,
        signals: &mut Vec<EnemySignal>,
    ) {
        let tuning = context.tuning();
        self.tile_gold_bonus = 0;
        match tile {
            TileKind::Path(PathVariant::Fast) => self.tile_gold_bonus = 2,
            TileKind::Path(PathVariant::Magma) => {
                if context.roll() < tuning.magma_burn_chance {
                    self.statuses.add(&OnHit::new(StatusKind::Burn, 1.8));
                }
            }
            TileKind::Path(PathVariant::Cryo) => {
                let _ = self
                    .statuses
                    .extend(StatusKind::Slow, tuning.cryo_tile_slow_extend);
            }
            TileKind::Path(PathVariant::Rune) => {
                if context.roll() < tuning.rune_vuln_chance {
                    self.statuses.add(&OnHit::new(StatusKind::Vuln, 0.7));
                }
            }
            _ => {}
        }

        if self.archetype.has_tag(EnemyTag::Sapper) {
            self.sapper_timer += dt;
            if self.sapper_timer >= SAPPER_INTERVAL {
                self.sapper_timer = 0.0;
                if let Some((cell, variant)) = context.corrupt_near(self.cell) {
                    signals.push(EnemySignal::Corrupted { cell, variant });
                }
            }
        }
    }

    fn advance<C: TerrainContext>(&mut self, distance: f32, context: &mut C) {
        let mut budget = distance;
        while budget > 0.0 && !self.finished {
            let target = match self.next {
                Some(target) => target,
                None => match self.resolve_next(context) {
                    Some(target) => {
                        self.next = Some(target);
                        target
                    }
                    None => {
                        self.finished = true;
                        return;
                    }
                },
            };

            let destination = cell_center(target);
            let offset = destination - self.position;
            let remaining = offset.length();
            if remaining <= budget {
                self.position = destination;
                budget -= remaining;
                self.arrive(target, context);
            } else {
                self.position += offset / remaining * budget;
                budget = 0.0;
            }
        }
    }

    fn resolve_next<C: TerrainContext>(&mut self, context: &mut C) -> Option<CellCoord> {
        if let Some(next) = context.next_cell(self.cell, self.previous) {
            return Some(next);
        }
        let lane = self.lane.as_ref()?;
        if lane.get(self.lane_index) != Some(&self.cell) {
            self.lane_index = lane.iter().position(|candidate| *candidate == self.cell)?;
        }
        lane.get(self.lane_index + 1).copied()
    }

    fn arrive<C: TerrainContext>(&mut self, target: CellCoord, context: &mut C) {
        self.previous = Some(self.cell);
        self.cell = target;
        self.next = None;
        self.steps += 1;
        if let Some(lane) = &self.lane {
            if lane.get(self.lane_index + 1) == Some(&target) {
                self.lane_index += 1;
            }
        }

        let distance = context.distance_to_end(target);
        if let Some(distance) = distance {
            self.progress = -i64::from(distance);
        }
        if target == context.end() || distance == Some(0) {
            self.finished = true;
        }
    }
}

fn cell_center(cell: CellCoord) -> Vec2 {
    Vec2::new(cell.column() as f32 + 0.5, cell.row() as f32 + 0.5)
}

fn position_cell(position: Vec2) -> Option<CellCoord> {
    if position.x < 0.0 || position.y < 0.0 {
        return None;
    }
    Some(CellCoord::new(position.x.floor() as u32, position.y.floor() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathforge_core::{DamageMultipliers, GameTables};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use crate::{grid::TileGrid, topology::GridTopology};

    struct Field {
        topology: GridTopology,
        rng: ChaCha8Rng,
        tuning: TerrainTuning,
    }

    impl TerrainContext for Field {
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
            self.topology.next_cell(cell, previous, &mut self.rng)
        }

        fn roll(&mut self) -> f32 {
            self.rng.gen()
        }

        fn corrupt_near(&mut self, cell: CellCoord) -> Option<(CellCoord, PathVariant)> {
            self.topology.corrupt_near(cell, &mut self.rng)
        }

        fn tuning(&self) -> TerrainTuning {
            self.tuning
        }
    }

    fn field(variant: PathVariant) -> Field {
        let mut topology = GridTopology::new(TileGrid::blank(10, 3));
        for column in 2..8 {
            assert!(topology.build(CellCoord::new(column, 1), PathVariant::Standard));
            if variant != PathVariant::Standard {
                assert!(topology.build(CellCoord::new(column, 1), variant));
            }
        }
        Field {
            topology,
            rng: ChaCha8Rng::seed_from_u64(5),
            tuning: TerrainTuning::default(),
        }
    }

    fn archetype(key: EnemyKey) -> Arc<EnemyArchetype> {
        Arc::new(
            GameTables::default()
                .enemies
                .get(key)
                .cloned()
                .expect("archetype"),
        )
    }

    fn spawn(field: &mut Field, archetype: Arc<EnemyArchetype>, wave: u32) -> Enemy {
        let start = field.topology.grid().start();
        let lane = field.topology.chain_path();
        let distance = field.topology.distance_to_end(start);
        Enemy::spawn(
            EnemyId::new(1),
            archetype,
            SpawnScaling {
                wave,
                speed_mul: 1.0,
                weakness_mul: 1.8,
                gold_per_kill: 0,
            },
            start,
            lane,
            distance,
        )
    }

    fn run(enemy: &mut Enemy, field: &mut Field, seconds: f32) -> Vec<EnemySignal> {
        let mut signals = Vec::new();
        let ticks = (seconds * 60.0).round() as usize;
        for _ in 0..ticks {
            enemy.update(1.0 / 60.0, field, &mut signals);
        }
        signals
    }

    #[test]
    fn spawn_scales_health_by_wave_tier() {
        let mut field = field(PathVariant::Standard);
        let enemy = spawn(&mut field, archetype(EnemyKey::Wisp), 5);
        let tier = 1.0 + 0.23 * 4.0;
        assert!((enemy.vitals().max_hp - 30.0 * 0.7 * tier).abs() < 1e-4);
        assert!((enemy.vitals().shield - 2.0 * 8.0 * tier).abs() < 1e-4);
        assert_eq!(enemy.bounty(), 13);
        assert_eq!(enemy.progress(), -7);
    }

    #[test]
    fn soldier_walks_the_lane_and_finishes() {
        let mut field = field(PathVariant::Standard);
        let mut enemy = spawn(&mut field, archetype(EnemyKey::Soldier), 1);

        let _ = run(&mut enemy, &mut field, 3.0);
        assert!(!enemy.is_finished());
        assert!(enemy.progress() > -7);

        let _ = run(&mut enemy, &mut field, 6.0);
        assert!(enemy.is_finished());
        assert_eq!(enemy.cell(), field.topology.grid().end());
    }

    #[test]
    fn stunned_enemies_hold_position_but_keep_burning() {
        let mut field = field(PathVariant::Standard);
        let mut enemy = spawn(&mut field, archetype(EnemyKey::Soldier), 1);
        enemy.add_status(&OnHit::new(StatusKind::Stun, 1.0));
        enemy.add_status(&OnHit::new(StatusKind::Burn, 1.0));
        let start = enemy.position();

        let _ = run(&mut enemy, &mut field, 0.5);

        assert_eq!(enemy.position(), start);
        assert!(enemy.vitals().hp < enemy.vitals().max_hp);
    }

    #[test]
    fn mud_slows_movement() {
        let mut standard = field(PathVariant::Standard);
        let mut mud = field(PathVariant::Mud);
        let mut quick = spawn(&mut standard, archetype(EnemyKey::Soldier), 1);
        let mut slow = spawn(&mut mud, archetype(EnemyKey::Soldier), 1);

        let _ = run(&mut quick, &mut standard, 3.0);
        let _ = run(&mut slow, &mut mud, 3.0);

        assert!(slow.position().x < quick.position().x);
    }

    #[test]
    fn boss_phases_fire_once_each() {
        let mut field = field(PathVariant::Standard);
        let mut boss = spawn(&mut field, archetype(EnemyKey::Boss), 10);
        let shield = boss.vitals().shield;
        let max_hp = boss.vitals().max_hp;
        let _ = boss.take_damage(shield, DamageType::Fire);
        let _ = boss.take_damage(max_hp * 0.5, DamageType::Fire);

        let mut signals = Vec::new();
        boss.update(1.0 / 60.0, &mut field, &mut signals);
        boss.update(1.0 / 60.0, &mut field, &mut signals);
        assert_eq!(signals.len(), 1);
        assert!(matches!(signals[0], EnemySignal::BossPhase { phase: 1, .. }));

        let _ = boss.take_damage(max_hp * 0.3, DamageType::Fire);
        boss.update(1.0 / 60.0, &mut field, &mut signals);
        boss.update(1.0 / 60.0, &mut field, &mut signals);
        assert_eq!(signals.len(), 2);
        assert!(matches!(signals[1], EnemySignal::BossPhase { phase: 2, .. }));
    }

    #[test]
    fn sapper_corrupts_the_lane_periodically() {
        let mut field = field(PathVariant::Standard);
        let mut sapper = spawn(&mut field, archetype(EnemyKey::Sapper), 1);

        let early = run(&mut sapper, &mut field, 2.2);
        assert!(early.is_empty());

        let later = run(&mut sapper, &mut field, 0.5);
        assert!(later.iter().any(|signal| matches!(
            signal,
            EnemySignal::Corrupted {
                variant: PathVariant::Mud,
                ..
            }
        )));
    }

    #[test]
    fn missing_branch_data_falls_back_to_the_lane() {
        let mut field = field(PathVariant::Standard);
        let mut enemy = spawn(&mut field, archetype(EnemyKey::Soldier), 1);
        let lane = field.topology.chain_path();
        // break the distance map so only the cached lane remains
        let _ = field.topology.erase(CellCoord::new(7, 1));
        enemy.forget_route(lane);

        let _ = run(&mut enemy, &mut field, 1.2);

        assert_eq!(enemy.cell(), CellCoord::new(2, 1));
    }

    #[test]
    fn exhausted_routes_mark_the_enemy_finished() {
        let mut field = field(PathVariant::Standard);
        let mut enemy = spawn(&mut field, archetype(EnemyKey::Soldier), 1);
        let _ = field.topology.erase(CellCoord::new(2, 1));
        enemy.forget_route(None);

        let _ = run(&mut enemy, &mut field, 0.1);

        assert!(enemy.is_finished());
    }

    #[test]
    fn weakness_multiplier_comes_from_spawn_scaling() {
        let mut field = field(PathVariant::Standard);
        let mut scout = spawn(&mut field, archetype(EnemyKey::Scout), 1);
        let report = scout.take_damage(5.0, DamageType::Cold);
        assert!(report.crit);
        assert!((report.dealt - 9.0).abs() < 1e-5);
        assert_eq!(scout.archetype().resist, DamageMultipliers::default());
    }
}
