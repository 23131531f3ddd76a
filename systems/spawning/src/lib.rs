#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system that releases a wave's enemy queue onto the
//! lane at a fixed cadence.

use std::{collections::VecDeque, time::Duration};

use pathforge_core::{Command, EnemyKey, Event};

/// Gap between consecutive spawns used by the live game and the simulator.
pub const DEFAULT_SPAWN_GAP: Duration = Duration::from_millis(280);

/// Configuration parameters required to construct the spawning system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    spawn_gap: Duration,
}

impl Config {
    /// Creates a new configuration using the provided spawn cadence.
    #[must_use]
    pub const fn new(spawn_gap: Duration) -> Self {
        Self { spawn_gap }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_SPAWN_GAP)
    }
}

/// Pure system that emits spawn commands while its queue holds enemies.
#[derive(Debug)]
pub struct Spawning {
    spawn_gap: Duration,
    cooldown: Duration,
    queue: VecDeque<(EnemyKey, u32)>,
}

impl Spawning {
    /// Creates a new spawning system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            spawn_gap: config.spawn_gap,
            cooldown: Duration::ZERO,
            queue: VecDeque::new(),
        }
    }

    /// Appends enemies, each paired with the wave that scales it, to the back
    /// of the queue. The first enemy of an empty queue spawns on the next
    /// elapsed tick.
    pub fn enqueue(&mut self, entries: impl IntoIterator<Item = (EnemyKey, u32)>) {
        if self.queue.is_empty() {
            self.cooldown = Duration::ZERO;
        }
        self.queue.extend(entries);
    }

    /// Appends enemies that all belong to `wave`.
    pub fn enqueue_wave(&mut self, wave: u32, keys: impl IntoIterator<Item = EnemyKey>) {
        self.enqueue(keys.into_iter().map(|key| (key, wave)));
    }

    /// Number of enemies still waiting to spawn.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Reports whether every queued enemy has been released.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every queued enemy.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.cooldown = Duration::ZERO;
    }

    /// Consumes events to emit spawn commands.
    ///
    /// Elapsed time is read from `TimeAdvanced` events; a `RunFailed` event
    /// discards the rest of the queue.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        let mut budget = Duration::ZERO;
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => budget = budget.saturating_add(*dt),
                Event::RunFailed { .. } => {
                    self.clear();
                    return;
                }
                _ => {}
            }
        }

        if budget.is_zero() {
            return;
        }

        while let Some((key, wave)) = self.next_release(&mut budget) {
            out.push(Command::SpawnEnemy { key, wave });
        }
    }

    fn next_release(&mut self, budget: &mut Duration) -> Option<(EnemyKey, u32)> {
        if self.queue.is_empty() {
            return None;
        }
        if self.cooldown > *budget {
            self.cooldown -= *budget;
            *budget = Duration::ZERO;
            return None;
        }
        *budget -= self.cooldown;
        self.cooldown = self.spawn_gap;
        self.queue.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gap_releases_everything_at_once() {
        let mut spawning = Spawning::new(Config::new(Duration::ZERO));
        spawning.enqueue_wave(1, [EnemyKey::Soldier, EnemyKey::Scout, EnemyKey::Tank]);

        let mut out = Vec::new();
        spawning.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_millis(1),
            }],
            &mut out,
        );

        assert_eq!(out.len(), 3);
        assert!(spawning.is_idle());
    }

    #[test]
    fn queued_waves_travel_with_their_enemies() {
        let mut spawning = Spawning::new(Config::new(Duration::ZERO));
        spawning.enqueue([(EnemyKey::Soldier, 3), (EnemyKey::Tank, 5)]);

        let mut out = Vec::new();
        spawning.handle(
            &[Event::TimeAdvanced {
                dt: Duration::from_millis(1),
            }],
            &mut out,
        );

        assert_eq!(
            out,
            vec![
                Command::SpawnEnemy {
                    key: EnemyKey::Soldier,
                    wave: 3,
                },
                Command::SpawnEnemy {
                    key: EnemyKey::Tank,
                    wave: 5,
                },
            ]
        );
    }
}
