#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that computes deterministic tower targets from world snapshots.

use pathforge_core::{
    EnemyId, EnemyView, TargetMode, TilePoint, TowerBehavior, TowerId, TowerTarget, TowerView,
};

/// Tower targeting system that reuses scratch buffers to avoid repeated allocations.
#[derive(Debug, Default)]
pub struct TowerTargeting {
    tower_workspace: Vec<TowerWorkspace>,
    enemy_workspace: Vec<EnemyCandidate>,
}

impl TowerTargeting {
    /// Creates a new tower targeting system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes one target per ready attacking tower.
    ///
    /// The output buffer is cleared before populating it with the latest
    /// assignments. Enemies are scanned in identifier order and a candidate
    /// only replaces the current pick when it is strictly better, so ties go
    /// to the enemy found first.
    pub fn handle(&mut self, towers: &TowerView, enemies: &EnemyView, out: &mut Vec<TowerTarget>) {
        out.clear();

        if towers.iter().next().is_none() || enemies.iter().next().is_none() {
            return;
        }

        self.prepare_tower_workspace(towers);
        if self.tower_workspace.is_empty() {
            return;
        }

        self.prepare_enemy_workspace(enemies);

        for tower in &self.tower_workspace {
            let max_distance = tower.range * tower.range;
            let mut best: Option<BestCandidate> = None;

            for candidate in &self.enemy_workspace {
                let distance_sq = candidate.position.distance_squared(tower.center);
                if distance_sq > max_distance {
                    continue;
                }

                let current = BestCandidate {
                    enemy: candidate.id,
                    score: score(tower.mode, candidate, distance_sq),
                };

                match &mut best {
                    Some(existing) => {
                        if current.score > existing.score {
                            *existing = current;
                        }
                    }
                    None => best = Some(current),
                }
            }

            if let Some(best_candidate) = best {
                out.push(TowerTarget {
                    tower: tower.id,
                    enemy: best_candidate.enemy,
                });
            }
        }
    }

    fn prepare_tower_workspace(&mut self, towers: &TowerView) {
        self.tower_workspace.clear();
        let (lower, _) = towers.iter().size_hint();
        self.tower_workspace.reserve(lower);

        for snapshot in towers.iter() {
            if !snapshot.ready || snapshot.behavior == TowerBehavior::Support {
                continue;
            }
            if snapshot.range <= 0.0 {
                continue;
            }

            self.tower_workspace.push(TowerWorkspace {
                id: snapshot.id,
                mode: snapshot.mode,
                center: snapshot.cell.center(),
                range: snapshot.range,
            });
        }
    }

    fn prepare_enemy_workspace(&mut self, enemies: &EnemyView) {
        self.enemy_workspace.clear();
        let (lower, _) = enemies.iter().size_hint();
        self.enemy_workspace.reserve(lower);

        for snapshot in enemies.iter() {
            self.enemy_workspace.push(EnemyCandidate {
                id: snapshot.id,
                position: snapshot.position,
                progress: snapshot.progress,
                durability: snapshot.hp + snapshot.shield,
                armor: snapshot.armor,
            });
        }
    }
}

/// Larger scores are preferred by every mode.
fn score(mode: TargetMode, candidate: &EnemyCandidate, distance_sq: f32) -> f64 {
    match mode {
        TargetMode::First => candidate.progress as f64,
        TargetMode::Last => -(candidate.progress as f64),
        TargetMode::Strongest => f64::from(candidate.durability),
        TargetMode::Closest => -f64::from(distance_sq),
        TargetMode::Armored => f64::from(candidate.armor),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TowerWorkspace {
    id: TowerId,
    mode: TargetMode,
    center: TilePoint,
    range: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct EnemyCandidate {
    id: EnemyId,
    position: TilePoint,
    progress: i64,
    durability: f32,
    armor: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BestCandidate {
    enemy: EnemyId,
    score: f64,
}
