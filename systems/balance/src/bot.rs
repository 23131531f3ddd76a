//! Heuristic player used by headless episodes.

use std::collections::HashSet;

use pathforge_core::{
    CellCoord, Command, Effect, Event, FlagKind, GameTables, Perk, Rarity, ResourceKind, RunStats,
    Talent, TileKind, TowerId, TowerKey,
};
use pathforge_system_progression::TalentCatalog;
use pathforge_world::{self as world, query, TileGrid, World};
use rand::Rng;

/// Maximum Manhattan reach counted when scoring a tower spot.
const COVERAGE_REACH: i64 = 3;
/// Waves after which the composition cycle restarts.
const CYCLE_REFRESH: u32 = 5;
/// Best perk score below which an offer is rerolled.
const REROLL_BELOW: f32 = 1.0;

/// Slot of the rotating tower composition.
#[derive(Clone, Copy, Debug)]
struct Role {
    keys: &'static [TowerKey],
    min_wave: u32,
}

/// Core damage, area, anti-shield, control and burn, in placement order.
const ROLES: [Role; 5] = [
    Role {
        keys: &[TowerKey::Gatling, TowerKey::Sniper],
        min_wave: 1,
    },
    Role {
        keys: &[TowerKey::Cannon, TowerKey::Mortar],
        min_wave: 1,
    },
    Role {
        keys: &[TowerKey::Tesla],
        min_wave: 5,
    },
    Role {
        keys: &[TowerKey::Cryo],
        min_wave: 7,
    },
    Role {
        keys: &[TowerKey::Flame],
        min_wave: 9,
    },
];

/// Scripted player that builds, upgrades and picks rewards.
#[derive(Clone, Debug)]
pub struct AutoBot {
    talents: TalentCatalog,
    cycle: usize,
}

impl Default for AutoBot {
    fn default() -> Self {
        Self::new(TalentCatalog::standard())
    }
}

impl AutoBot {
    /// Creates a bot that buys talents from `talents`.
    #[must_use]
    pub fn new(talents: TalentCatalog) -> Self {
        Self { talents, cycle: 0 }
    }

    /// Restarts the composition cycle every few waves.
    pub fn begin_wave(&mut self, wave: u32) {
        if wave % CYCLE_REFRESH == 1 {
            self.cycle = 0;
        }
    }

    /// Interior lane cells of a serpentine lane between the terminals.
    ///
    /// The lane runs along the terminal row and dips downwards in U-shaped
    /// teeth while `budget` paves allow. Teeth are separated by a gap column so
    /// every lane cell keeps exactly two lane neighbours.
    #[must_use]
    pub fn plan_lane(&self, grid: &TileGrid, budget: i64) -> Vec<CellCoord> {
        let (start, end) = (grid.start(), grid.end());
        if start.row() != end.row() || start.column() >= end.column() {
            return straight_lane(start, end);
        }

        let row = start.row();
        let straight = i64::from(end.column() - start.column() - 1);
        let mut extra = (budget - straight).max(0);
        let max_depth = grid.rows().saturating_sub(2).saturating_sub(row);

        let mut cells = Vec::new();
        let mut column = start.column() + 1;
        let mut next_tooth = start.column() + 2;
        while column < end.column() {
            let fits = column >= next_tooth && column + 2 < end.column();
            let depth = max_depth.min(u32::try_from(extra / 2).unwrap_or(u32::MAX));
            if fits && depth > 0 {
                cells.extend((0..=depth).map(|step| CellCoord::new(column, row + step)));
                cells.push(CellCoord::new(column + 1, row + depth));
                cells.extend(
                    (0..=depth)
                        .rev()
                        .map(|step| CellCoord::new(column + 2, row + step)),
                );
                extra -= 2 * i64::from(depth);
                column += 3;
                next_tooth = column + 1;
            } else {
                cells.push(CellCoord::new(column, row));
                column += 1;
            }
        }
        cells
    }

    /// Picks how many waves to fight at once.
    ///
    /// Assaults are only attempted by a healthy, wealthy run that lost no
    /// lives last wave, and never fold a boss wave into a regular one.
    #[must_use]
    pub fn choose_assault(&self, stats: &RunStats, last_lives_lost: i64) -> u32 {
        let wave = stats.wave;
        if wave < 6 || wave % 10 == 0 || last_lives_lost > 0 {
            return 1;
        }
        let multi = if stats.lives >= 18 && stats.gold >= 500 && wave >= 12 {
            3
        } else if stats.lives >= 15 && stats.gold >= 250 {
            2
        } else {
            1
        };
        multi.min(10 - wave % 10)
    }

    /// Upgrades the tower closest to the lane that is cheapest to improve.
    pub fn upgrade_best(&mut self, world: &mut World, out_events: &mut Vec<Event>) {
        let lane: Vec<CellCoord> = world.lane().map(|lane| lane.to_vec()).unwrap_or_default();
        let stats = query::stats(world);
        let tables = query::tables(world);

        let mut best: Option<(TowerId, f64)> = None;
        for tower in query::towers(world) {
            let Some(definition) = tables.towers.get(tower.key()) else {
                continue;
            };
            let cost = tower.upgrade_cost(definition);
            if cost <= 0 || stats.gold < cost {
                continue;
            }
            let distance = lane
                .iter()
                .map(|cell| cell.manhattan_distance(tower.cell()))
                .min()
                .unwrap_or(99);
            let score = 100.0 - f64::from(distance) * 10.0 - cost as f64 * 0.05;
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((tower.id(), score));
            }
        }

        let Some((id, _)) = best else {
            return;
        };
        world::apply(world, Command::UpgradeTower { tower: id }, out_events);

        let branch = query::tower(world, id).and_then(|tower| {
            if tower.branch().is_some() || !tower.can_branch() {
                return None;
            }
            let definition = query::tables(world).towers.get(tower.key())?;
            definition.branches.first().map(|branch| branch.name.clone())
        });
        if let Some(branch) = branch {
            world::apply(world, Command::ChooseBranch { tower: id, branch }, out_events);
        }
    }

    /// Places towers on the spots covering the most lane cells.
    pub fn place_towers(
        &mut self,
        world: &mut World,
        max_towers: usize,
        wave: u32,
        out_events: &mut Vec<Event>,
    ) {
        let Some(lane) = world.lane() else {
            return;
        };
        let lane: HashSet<CellCoord> = lane.iter().copied().collect();
        let mut spots = coverage_spots(query::tile_grid(world), &lane);
        spots.sort_by(|a, b| b.cmp(a));

        for (_, column, row) in spots {
            if query::tower_count(world) >= max_towers {
                break;
            }
            let Some((key, next_cycle)) =
                self.pick_tower(query::stats(world), query::tables(world), wave)
            else {
                break;
            };
            let cell = CellCoord::new(column, row);
            world::apply(world, Command::PlaceTower { key, cell }, out_events);
            if matches!(out_events.last(), Some(Event::TowerPlaced { .. })) {
                self.cycle = next_cycle;
            }
        }
    }

    /// Buys talents greedily while points remain.
    pub fn spend_talents(&self, world: &mut World, out_events: &mut Vec<Event>) {
        while query::stats(world).talent_points > 0 {
            let mut best: Option<(&Talent, f32)> = None;
            for talent in self.talents.available(query::stats(world)) {
                let score = talent_score(talent);
                if best.map_or(true, |(_, current)| score > current) {
                    best = Some((talent, score));
                }
            }
            let Some(talent) = best.map(|(talent, _)| talent.clone()) else {
                break;
            };
            world::apply(world, Command::BuyTalent { talent }, out_events);
            if !matches!(out_events.last(), Some(Event::TalentPurchased { .. })) {
                break;
            }
        }
    }

    /// Index of the preferred perk among `options`, if any.
    pub fn choose_perk<R: Rng + ?Sized>(
        &self,
        options: &[Perk],
        wave: u32,
        rng: &mut R,
    ) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, perk) in options.iter().enumerate() {
            let score = score_perk(perk, wave) + rng.gen::<f32>() * 0.05;
            if best.map_or(true, |(_, current)| score > current) {
                best = Some((index, score));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Whether an offer is too weak to keep when a reroll is available.
    #[must_use]
    pub fn wants_reroll(&self, options: &[Perk], wave: u32) -> bool {
        let best = options
            .iter()
            .map(|perk| score_perk(perk, wave))
            .fold(None, |best: Option<f32>, score| {
                Some(best.map_or(score, |best| best.max(score)))
            });
        best.map_or(false, |best| best < REROLL_BELOW)
    }

    /// Next tower in the composition cycle the run can afford, falling back
    /// to the cheapest affordable unlocked tower.
    fn pick_tower(
        &self,
        stats: &RunStats,
        tables: &GameTables,
        wave: u32,
    ) -> Option<(TowerKey, usize)> {
        let affordable = |key: TowerKey| {
            stats.is_tower_unlocked(key)
                && tables
                    .towers
                    .get(key)
                    .is_some_and(|definition| stats.gold >= stats.tower_cost(definition.cost))
        };

        for offset in 0..ROLES.len() {
            let index = (self.cycle + offset) % ROLES.len();
            let role = ROLES[index];
            if wave < role.min_wave {
                continue;
            }
            if let Some(key) = role.keys.iter().copied().find(|key| affordable(*key)) {
                return Some((key, (index + 1) % ROLES.len()));
            }
        }

        tables
            .towers
            .iter()
            .filter(|definition| affordable(definition.key))
            .min_by_key(|definition| definition.cost)
            .map(|definition| (definition.key, self.cycle))
    }
}

/// Empty cells near the lane as `(coverage, column, row)`.
fn coverage_spots(grid: &TileGrid, lane: &HashSet<CellCoord>) -> Vec<(u32, u32, u32)> {
    let mut spots = Vec::new();
    for row in 0..grid.rows() {
        for column in 0..grid.columns() {
            if grid.tile(CellCoord::new(column, row)) != Some(TileKind::Empty) {
                continue;
            }
            let mut coverage = 0;
            for dy in -2_i64..=2 {
                for dx in -2_i64..=2 {
                    if dx.abs() + dy.abs() > COVERAGE_REACH {
                        continue;
                    }
                    let (x, y) = (i64::from(column) + dx, i64::from(row) + dy);
                    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
                        continue;
                    };
                    if lane.contains(&CellCoord::new(x, y)) {
                        coverage += 1;
                    }
                }
            }
            if coverage > 0 {
                spots.push((coverage, column, row));
            }
        }
    }
    spots
}

/// Horizontal then vertical lane between two terminals, terminals excluded.
pub(crate) fn straight_lane(start: CellCoord, end: CellCoord) -> Vec<CellCoord> {
    let mut cells = Vec::new();
    let (mut column, mut row) = (start.column(), start.row());
    while column != end.column() {
        column = if end.column() > column {
            column + 1
        } else {
            column - 1
        };
        cells.push(CellCoord::new(column, row));
    }
    while row != end.row() {
        row = if end.row() > row { row + 1 } else { row - 1 };
        cells.push(CellCoord::new(column, row));
    }
    cells.retain(|cell| *cell != start && *cell != end);
    cells
}

fn talent_score(talent: &Talent) -> f32 {
    talent
        .effects
        .iter()
        .map(|effect| match effect {
            Effect::UnlockTower(_) => 6.0,
            Effect::GlobalOnHit(_) => 4.0,
            Effect::Flag(FlagKind::AllProjectilesSplash) => 3.5,
            Effect::TowerBonus(..) => 3.0,
            Effect::Flag(FlagKind::BossBounty) => 2.0,
            Effect::OverclockDurMul(_) => 1.5,
            Effect::Grant(ResourceKind::Paves | ResourceKind::PavesCap, _) => 1.0,
            _ => 0.5,
        })
        .sum()
}

fn rarity_factor(rarity: Rarity) -> f32 {
    match rarity {
        Rarity::Common => 1.0,
        Rarity::Rare => 1.2,
        Rarity::Epic => 1.5,
        Rarity::Legendary => 2.0,
        Rarity::SsPlus => 3.0,
        Rarity::SsPlusPlus => 4.0,
        Rarity::Sss => 6.0,
        Rarity::Omega => 10.0,
    }
}

/// Expected value of a perk at `wave`, before jitter.
#[must_use]
pub fn score_perk(perk: &Perk, wave: u32) -> f32 {
    let power = 0.8 + (wave as f32 / 10.0).min(2.0);
    let economy = if wave < 8 { 1.2 } else { 0.8 };
    let utility = 0.9;

    let score: f32 = perk
        .effects
        .iter()
        .map(|effect| match *effect {
            Effect::DamageMul(value) => power * (value - 1.0) * 10.0,
            Effect::RateMul(value) => power * (value - 1.0) * 9.0,
            Effect::RangeMul(value) => utility * (value - 1.0) * 7.0,
            Effect::DamageTypeMul(_, value) => power * (value - 1.0) * 6.0,
            Effect::GoldPerKill(amount) => economy * amount as f32 * 1.6,
            Effect::PerkRerolls(count) => economy * count as f32 * 2.0,
            Effect::TowerBonus(..) => power * 4.0,
            Effect::GlobalOnHit(_) => utility * 3.5,
            Effect::Grant(ResourceKind::Paves, amount) => utility * amount as f32 * 0.7,
            Effect::Grant(ResourceKind::PavesCap, amount) => utility * amount as f32 * 0.4,
            Effect::Grant(ResourceKind::TalentPoints, _) => 25.0,
            _ => 0.0,
        })
        .sum();
    score * rarity_factor(perk.rarity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn perk(id: &str, rarity: Rarity, effects: Vec<Effect>) -> Perk {
        Perk {
            id: id.to_owned(),
            name: id.to_owned(),
            rarity,
            effects,
        }
    }

    #[test]
    fn serpentine_lane_forms_a_single_chain() {
        let grid = TileGrid::blank(22, 12);
        let bot = AutoBot::default();
        let cells = bot.plan_lane(&grid, 40);

        assert_eq!(cells.len(), 40);
        let unique: HashSet<CellCoord> = cells.iter().copied().collect();
        assert_eq!(unique.len(), cells.len());
        for pair in cells.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
        assert_eq!(cells.first(), Some(&CellCoord::new(2, 6)));
        assert_eq!(cells.last(), Some(&CellCoord::new(19, 6)));
    }

    #[test]
    fn tight_budgets_fall_back_to_the_straight_row() {
        let grid = TileGrid::blank(12, 5);
        let cells = AutoBot::default().plan_lane(&grid, 3);
        assert_eq!(cells, straight_lane(grid.start(), grid.end()));
        assert_eq!(cells.len(), 8);
    }

    #[test]
    fn assaults_need_a_healthy_run() {
        let bot = AutoBot::default();
        let mut stats = RunStats {
            wave: 12,
            gold: 600,
            lives: 20,
            ..RunStats::default()
        };
        assert_eq!(bot.choose_assault(&stats, 0), 3);
        assert_eq!(bot.choose_assault(&stats, 1), 1);

        stats.wave = 19;
        assert_eq!(bot.choose_assault(&stats, 0), 1);
        stats.wave = 20;
        assert_eq!(bot.choose_assault(&stats, 0), 1);
        stats.wave = 4;
        assert_eq!(bot.choose_assault(&stats, 0), 1);
    }

    #[test]
    fn talent_points_dominate_perk_scores() {
        let talent = perk(
            "T",
            Rarity::Common,
            vec![Effect::Grant(ResourceKind::TalentPoints, 1)],
        );
        let damage = perk("D", Rarity::Rare, vec![Effect::DamageMul(1.15)]);
        assert!(score_perk(&talent, 3) > score_perk(&damage, 3));

        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let bot = AutoBot::default();
        assert_eq!(bot.choose_perk(&[damage, talent], 3, &mut rng), Some(1));
        assert_eq!(bot.choose_perk(&[], 3, &mut rng), None);
    }

    #[test]
    fn only_weak_offers_are_rerolled() {
        let bot = AutoBot::default();
        let weak = perk("W", Rarity::Common, vec![Effect::DamageMul(1.05)]);
        let strong = perk("S", Rarity::Rare, vec![Effect::DamageMul(1.15)]);

        assert!(bot.wants_reroll(&[weak.clone()], 3));
        assert!(!bot.wants_reroll(&[weak, strong], 3));
        assert!(!bot.wants_reroll(&[], 3));
    }

    #[test]
    fn economy_perks_lose_weight_later_in_the_run() {
        let bounty = perk("G", Rarity::Common, vec![Effect::GoldPerKill(2)]);
        assert!((score_perk(&bounty, 3) - 3.84).abs() < 1e-4);
        assert!((score_perk(&bounty, 9) - 2.56).abs() < 1e-4);
    }

    #[test]
    fn greedy_talents_favour_tower_unlocks() {
        let catalog = TalentCatalog::standard();
        let scores: Vec<(&str, f32)> = catalog
            .roots()
            .map(|talent| (talent.id.as_str(), talent_score(talent)))
            .collect();
        assert_eq!(scores, [("F1", 2.0), ("A1", 6.0), ("C1", 6.0)]);
    }
}
