use std::sync::Arc;

use pathforge_core::GameTables;
use pathforge_system_progression::PerkFactory;
use pathforge_system_tuner::{ConfigError, GeneticTuner, TunerConfig, TunerReport};

fn small_config(seed: u64) -> TunerConfig {
    TunerConfig {
        target: "casual".to_owned(),
        target_wave: Some(2.0),
        population: 4,
        generations: 3,
        episodes: 2,
        max_waves: 2,
        elites: 1,
        seed,
        ..TunerConfig::default()
    }
}

fn tune(seed: u64) -> TunerReport {
    let factory = PerkFactory::procedural();
    GeneticTuner::new(Arc::new(GameTables::default()), &factory, small_config(seed))
        .expect("valid config")
        .run()
        .expect("tuning succeeds")
}

#[test]
fn best_fitness_never_regresses() {
    let report = tune(11);

    assert_eq!(report.generations.len(), 3);
    for pair in report.generations.windows(2) {
        assert!(pair[1].best_fitness <= pair[0].best_fitness);
    }
    let last = report.generations.last().expect("generations");
    assert_eq!(last.best_fitness, report.evaluation.fitness);
}

#[test]
fn report_carries_profile_provenance() {
    let report = tune(11);

    let meta = report.profile.meta.as_ref().expect("meta");
    assert_eq!(meta.target, "casual");
    assert_eq!(meta.target_wave, 2.0);
    assert_eq!(meta.episodes, 2);
    assert_eq!(meta.samples.len(), 2);
    assert!(meta.samples.iter().all(|&waves| waves <= 2));
    assert_eq!(report.profile.tower, report.best.to_profile().tower);
    assert_eq!(report.profile.enemy, report.best.to_profile().enemy);
}

#[test]
fn tuning_is_reproducible() {
    assert_eq!(tune(5), tune(5));
}

#[test]
fn empty_population_is_refused() {
    let factory = PerkFactory::procedural();
    let config = TunerConfig {
        population: 0,
        ..small_config(1)
    };

    let error = GeneticTuner::new(Arc::new(GameTables::default()), &factory, config)
        .expect_err("no genomes");
    assert!(matches!(error, ConfigError::EmptyPopulation));
}
