use std::{sync::Arc, time::Duration};

use pathforge_core::{
    CellCoord, Command, Effect, Event, GameTables, PathVariant, Perk, Rarity, RunStats,
    TargetMode, TileKind, TowerKey,
};
use pathforge_world::{self as world, query, RunRecord, TileGrid, World};

fn played_world() -> World {
    let tables = Arc::new(GameTables::default());
    let mut world = World::new(tables, TileGrid::blank(12, 7), RunStats::default(), 1234);
    world.set_biome("PLAINS");
    let mut events = Vec::new();
    let unlock = Perk {
        id: "roads".to_owned(),
        name: "Roads".to_owned(),
        rarity: Rarity::Rare,
        effects: vec![
            Effect::UnlockPath(PathVariant::Fast),
            Effect::DamageMul(1.1),
            Effect::Grant(pathforge_core::ResourceKind::Gold, 1_000),
        ],
    };
    world::apply(&mut world, Command::ApplyPerk { perk: unlock }, &mut events);

    for column in 2..10 {
        let variant = if column == 5 {
            PathVariant::Fast
        } else {
            PathVariant::Standard
        };
        world::apply(
            &mut world,
            Command::BuildPath {
                cell: CellCoord::new(column, 3),
                variant,
            },
            &mut events,
        );
    }

    world::apply(
        &mut world,
        Command::PlaceTower {
            key: TowerKey::Gatling,
            cell: CellCoord::new(4, 2),
        },
        &mut events,
    );
    let tower = events
        .iter()
        .find_map(|event| match event {
            Event::TowerPlaced { tower, .. } => Some(*tower),
            _ => None,
        })
        .expect("gatling placed");
    for command in [
        Command::UpgradeTower { tower },
        Command::UpgradeTower { tower },
        Command::ChooseBranch {
            tower,
            branch: "ap_rounds".to_owned(),
        },
        Command::SetTargetMode {
            tower,
            mode: TargetMode::Armored,
        },
        Command::Overclock { tower },
        Command::Tick {
            dt: Duration::from_millis(500),
        },
    ] {
        world::apply(&mut world, command, &mut events);
    }
    world
}

#[test]
fn restored_world_matches_the_saved_world() {
    let world = played_world();
    let record = RunRecord::capture(&world);
    assert_eq!(record.towers[0].level, 3);
    assert_eq!(record.towers[0].branch.as_deref(), Some("ap_rounds"));
    assert!(record.towers[0].oc_t > 0.0);
    assert!(record.grid.flat.contains(&TileKind::Path(PathVariant::Fast).code()));

    let json = record.to_json().expect("encode");
    let decoded = RunRecord::from_json(&json).expect("decode");
    assert_eq!(decoded, record);

    let restored = decoded
        .restore(Arc::new(GameTables::default()))
        .expect("restore");

    assert_eq!(RunRecord::capture(&restored), record);
    assert_eq!(query::tile_grid(&restored), query::tile_grid(&world));
    assert_eq!(query::stats(&restored), query::stats(&world));
    assert_eq!(query::biome(&restored), "PLAINS");
    assert_eq!(query::hero(&restored), query::hero(&world));

    let original: Vec<_> = query::towers(&world).cloned().collect();
    let rebuilt: Vec<_> = query::towers(&restored).cloned().collect();
    assert_eq!(original, rebuilt);
    for tower in &original {
        assert_eq!(
            query::tower_stats(&restored, tower.id()),
            query::tower_stats(&world, tower.id())
        );
    }
}

#[test]
fn writing_and_loading_a_save_file_round_trips() {
    let world = played_world();
    let record = RunRecord::capture(&world);
    let path = std::env::temp_dir().join(format!(
        "pathforge-round-trip-{}.json",
        std::process::id()
    ));

    record.write(&path).expect("write save");
    let loaded = RunRecord::load(&path).expect("load save");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded, record);
}
