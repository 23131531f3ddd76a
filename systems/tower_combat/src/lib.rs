#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that turns targeting assignments into attack commands.

use pathforge_core::{Command, TowerBehavior, TowerId, TowerSnapshot, TowerTarget, TowerView};

/// Tower combat system that queues attack commands for ready towers.
#[derive(Debug, Default)]
pub struct TowerCombat {
    scratch: Vec<Command>,
}

impl TowerCombat {
    /// Creates a new tower combat system with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits `Command::TowerAttack` entries for towers ready to attack.
    pub fn handle(&mut self, towers: TowerView, tower_targets: &[TowerTarget], out: &mut Vec<Command>) {
        if tower_targets.is_empty() {
            return;
        }

        let snapshots = towers.into_vec();
        if snapshots.is_empty() {
            return;
        }

        self.scratch.clear();

        for target in tower_targets {
            if let Some(snapshot) = find_tower(&snapshots, target.tower) {
                if snapshot.ready && snapshot.behavior != TowerBehavior::Support {
                    self.scratch.push(Command::TowerAttack {
                        tower: target.tower,
                        target: target.enemy,
                    });
                }
            }
        }

        if self.scratch.is_empty() {
            return;
        }

        out.reserve(self.scratch.len());
        out.append(&mut self.scratch);
    }
}

fn find_tower(snapshots: &[TowerSnapshot], tower: TowerId) -> Option<&TowerSnapshot> {
    snapshots
        .binary_search_by_key(&tower, |snapshot| snapshot.id)
        .ok()
        .map(|index| &snapshots[index])
}
