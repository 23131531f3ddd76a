use std::{sync::Arc, time::Duration};

use pathforge_core::{
    CellCoord, Command, EnemyKey, Event, GameTables, PathVariant, RunStats, TowerBehavior,
    TowerKey,
};
use pathforge_world::{self as world, query, TileGrid, World};

const TICK: Duration = Duration::from_nanos(16_666_667);

#[test]
fn adjacent_gatling_kills_a_lone_soldier() {
    let mut world = World::new(
        Arc::new(GameTables::default()),
        TileGrid::blank(10, 8),
        RunStats::default(),
        42,
    );
    let mut events = Vec::new();
    for column in 2..8 {
        world::apply(
            &mut world,
            Command::BuildPath {
                cell: CellCoord::new(column, 4),
                variant: PathVariant::Standard,
            },
            &mut events,
        );
    }
    assert_eq!(query::tile_grid(&world).start(), CellCoord::new(1, 4));
    assert_eq!(query::tile_grid(&world).end(), CellCoord::new(8, 4));
    assert!(world.is_lane_valid());

    world::apply(
        &mut world,
        Command::PlaceTower {
            key: TowerKey::Gatling,
            cell: CellCoord::new(4, 3),
        },
        &mut events,
    );
    world::apply(&mut world, Command::StartWave { assault: 1 }, &mut events);
    world::apply(
        &mut world,
        Command::SpawnEnemy {
            key: EnemyKey::Soldier,
            wave: 1,
        },
        &mut events,
    );
    let gold_before = query::stats(&world).gold;

    let gatling = query::tower_view(&world)
        .into_vec()
        .pop()
        .expect("gatling placed");
    let stats = query::tower_stats(&world, gatling.id).expect("gatling stats");
    let soldier_hp = query::enemies(&world)[0].vitals().max_hp;
    // chord of the range circle across the lane row
    let chord = 2.0 * (stats.range * stats.range - 1.0).sqrt();
    assert!(stats.damage * stats.rate * chord >= soldier_hp);

    let mut killed = None;
    for _ in 0..1_200 {
        let mut generated = Vec::new();
        world::apply(&mut world, Command::Tick { dt: TICK }, &mut generated);
        attack_first_in_range(&mut world, &mut generated);
        if let Some(reward) = generated.iter().find_map(|event| match event {
            Event::EnemyKilled { reward, .. } => Some(*reward),
            _ => None,
        }) {
            killed = Some(reward);
        }
        assert!(
            !generated
                .iter()
                .any(|event| matches!(event, Event::EnemyLeaked { .. })),
            "soldier leaked past the gatling"
        );
        if killed.is_some() {
            break;
        }
    }

    assert_eq!(killed, Some(6));
    assert_eq!(query::stats(&world).gold, gold_before + 6);
    assert_eq!(query::enemy_count(&world), 0);
}

fn attack_first_in_range(world: &mut World, out: &mut Vec<Event>) {
    let enemies = query::enemy_view(world);
    let towers = query::tower_view(world);
    for tower in towers.iter() {
        if !tower.ready || tower.behavior == TowerBehavior::Support {
            continue;
        }
        let origin = tower.cell.center();
        let target = enemies
            .iter()
            .filter(|enemy| enemy.position.distance_squared(origin) <= tower.range * tower.range)
            .max_by_key(|enemy| enemy.progress);
        if let Some(target) = target {
            world::apply(
                world,
                Command::TowerAttack {
                    tower: tower.id,
                    target: target.id,
                },
                out,
            );
        }
    }
}
