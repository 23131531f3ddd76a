use std::{sync::Arc, time::Duration};

use pathforge_core::{CellCoord, Command, EnemyKey, Event, GameTables, PathVariant, RunStats};
use pathforge_system_spawning::{Config, Spawning};
use pathforge_world::{self as world, query, TileGrid, World};

const TICK: Duration = Duration::from_nanos(16_666_667);

#[test]
fn first_enemy_spawns_immediately_then_every_gap() {
    let mut spawning = Spawning::new(Config::default());
    spawning.enqueue_wave(1, [EnemyKey::Soldier, EnemyKey::Scout, EnemyKey::Soldier]);

    let mut released = Vec::new();
    for tick in 0..40 {
        let mut commands = Vec::new();
        spawning.handle(&[Event::TimeAdvanced { dt: TICK }], &mut commands);
        if !commands.is_empty() {
            released.push(tick);
        }
    }

    assert_eq!(released, vec![0, 16, 33]);
    assert!(spawning.is_idle());
}

#[test]
fn large_steps_release_several_enemies() {
    let mut spawning = Spawning::new(Config::new(Duration::from_millis(500)));
    spawning.enqueue_wave(1, [EnemyKey::Soldier; 6]);

    let mut commands = Vec::new();
    spawning.handle(
        &[Event::TimeAdvanced {
            dt: Duration::from_secs(2),
        }],
        &mut commands,
    );

    assert_eq!(commands.len(), 5, "one immediate spawn plus one per gap");
    assert_eq!(spawning.pending(), 1);
    assert!(commands
        .iter()
        .all(|command| *command
            == Command::SpawnEnemy {
                key: EnemyKey::Soldier,
                wave: 1,
            }));
}

#[test]
fn events_without_time_do_not_spawn() {
    let mut spawning = Spawning::new(Config::default());
    spawning.enqueue_wave(1, [EnemyKey::Tank]);

    let mut commands = Vec::new();
    spawning.handle(&[Event::WaveStarted { wave: 1, assault: 1 }], &mut commands);

    assert!(commands.is_empty());
    assert_eq!(spawning.pending(), 1);
}

#[test]
fn run_failure_discards_the_queue() {
    let mut spawning = Spawning::new(Config::default());
    spawning.enqueue_wave(1, [EnemyKey::Tank, EnemyKey::Boss]);

    let mut commands = Vec::new();
    spawning.handle(
        &[
            Event::TimeAdvanced { dt: TICK },
            Event::RunFailed { wave: 3 },
        ],
        &mut commands,
    );

    assert!(commands.is_empty());
    assert!(spawning.is_idle());
}

#[test]
fn deterministic_replay_produces_identical_sequence() {
    let first = replay();
    let second = replay();

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.spawned.len(), 5);
    assert_eq!(
        first.spawned.iter().map(|(_, key)| *key).collect::<Vec<_>>(),
        queue()
    );
}

fn queue() -> Vec<EnemyKey> {
    vec![
        EnemyKey::Soldier,
        EnemyKey::Scout,
        EnemyKey::Mutant,
        EnemyKey::Soldier,
        EnemyKey::Scout,
    ]
}

#[derive(Debug, PartialEq)]
struct ReplayOutcome {
    spawned: Vec<(u32, EnemyKey)>,
    positions: Vec<(f32, f32)>,
}

fn replay() -> ReplayOutcome {
    let mut world = World::new(
        Arc::new(GameTables::default()),
        TileGrid::blank(16, 5),
        RunStats::default(),
        11,
    );
    let mut events = Vec::new();
    for column in 2..14 {
        world::apply(
            &mut world,
            Command::BuildPath {
                cell: CellCoord::new(column, 2),
                variant: PathVariant::Standard,
            },
            &mut events,
        );
    }
    world::apply(&mut world, Command::StartWave { assault: 1 }, &mut events);

    let mut spawning = Spawning::new(Config::default());
    spawning.enqueue_wave(1, queue());
    let mut spawned = Vec::new();

    for tick in 0..120 {
        let mut generated = Vec::new();
        world::apply(&mut world, Command::Tick { dt: TICK }, &mut generated);
        let mut commands = Vec::new();
        spawning.handle(&generated, &mut commands);
        for command in commands {
            let mut spawn_events = Vec::new();
            world::apply(&mut world, command, &mut spawn_events);
            for event in spawn_events {
                if let Event::EnemySpawned { key, .. } = event {
                    spawned.push((tick, key));
                }
            }
        }
    }

    let positions = query::enemies(&world)
        .iter()
        .map(|enemy| (enemy.position().x, enemy.position().y))
        .collect();
    ReplayOutcome { spawned, positions }
}
