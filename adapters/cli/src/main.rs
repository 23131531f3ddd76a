#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter for the Pathforge balance tooling.
//!
//! The binary tunes balance profiles, replays single auto-bot episodes,
//! previews wave plans and converts saved runs to and from shareable codes.

mod run_code;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pathforge_core::{EnemyKey, GameTables};
use pathforge_system_balance::{BalanceSimulator, EpisodeConfig};
use pathforge_system_progression::PerkFactory;
use pathforge_system_tuner::{load_profile, write_profile, GeneticTuner, TunerConfig};
use pathforge_system_wave_generation::WaveDirector;
use pathforge_world::{GridConfig, RunRecord, World};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment switch raising the default log level to debug.
const ENV_BALANCE_LOG: &str = "PATHFORGE_BALANCE_LOG";

#[derive(Parser, Debug)]
#[command(name = "pathforge", version)]
#[command(about = "Headless balance tooling for the Pathforge tower defence")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evolve a balance profile toward a target survival curve.
    Tune(TuneArgs),
    /// Play one auto-bot episode and print its outcome.
    Episode(EpisodeArgs),
    /// Preview the theme and roster of a wave.
    Plan(PlanArgs),
    /// Print the run code of a save file, or of a freshly generated run.
    ExportRun(ExportArgs),
    /// Decode a run code and write it as a save file.
    ImportRun(ImportArgs),
}

#[derive(Args, Debug)]
struct TuneArgs {
    /// TOML file with tuner settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Difficulty label, e.g. `humain_solide`.
    #[arg(long)]
    target: Option<String>,
    /// Explicit mean wave to aim for.
    #[arg(long)]
    target_wave: Option<f32>,
    /// Genomes per generation.
    #[arg(long)]
    population: Option<usize>,
    /// Generations to evolve.
    #[arg(long)]
    generations: Option<usize>,
    /// Episodes per fitness evaluation.
    #[arg(long)]
    episodes: Option<usize>,
    /// Wave cap per episode.
    #[arg(long)]
    max_waves: Option<u32>,
    /// Tuner seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Directory receiving the profile and its summary.
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct EpisodeArgs {
    /// Episode seed.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Wave cap.
    #[arg(long, default_value_t = 25)]
    max_waves: u32,
    /// Balance profile applied to the tables first.
    #[arg(long)]
    profile: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Wave to plan.
    #[arg(long, default_value_t = 1)]
    wave: u32,
    /// Relics lying on the lane.
    #[arg(long, default_value_t = 0)]
    relics: u32,
    /// Ascension level.
    #[arg(long, default_value_t = 0)]
    ascension: u32,
    /// Seed of the roster draw.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Save file to export; a fresh run is generated when absent.
    #[arg(long)]
    save: Option<PathBuf>,
    /// Seed of a freshly generated run.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Columns of a freshly generated run.
    #[arg(long, default_value_t = 22)]
    columns: u32,
    /// Rows of a freshly generated run.
    #[arg(long, default_value_t = 12)]
    rows: u32,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Run code produced by `export-run`.
    code: String,
    /// Destination save file.
    #[arg(long, default_value = "pathforge_save.json")]
    out: PathBuf,
}

#[derive(Serialize)]
struct PlanReport {
    wave: u32,
    boss: bool,
    keywords: Vec<String>,
    roster: Vec<EnemyKey>,
}

/// Entry point for the Pathforge command-line interface.
fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Tune(args) => tune(&args),
        Command::Episode(args) => episode(&args),
        Command::Plan(args) => plan(&args),
        Command::ExportRun(args) => export_run(&args),
        Command::ImportRun(args) => import_run(&args),
    }
}

fn init_tracing() {
    let level = if is_truthy(std::env::var(ENV_BALANCE_LOG).ok().as_deref()) {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn is_truthy(value: Option<&str>) -> bool {
    value.map_or(false, |value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "2" | "true" | "yes" | "on" | "debug"
        )
    })
}

fn tune_config(args: &TuneArgs) -> Result<TunerConfig> {
    let config = match &args.config {
        Some(path) => TunerConfig::load(path)
            .with_context(|| format!("failed to load tuner config {}", path.display()))?,
        None => TunerConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("invalid PATHFORGE_BALANCE_* override")?;

    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    if args.target_wave.is_some() {
        config.target_wave = args.target_wave;
    }
    if let Some(population) = args.population {
        config.population = population;
    }
    if let Some(generations) = args.generations {
        config.generations = generations;
    }
    if let Some(episodes) = args.episodes {
        config.episodes = episodes;
    }
    if let Some(max_waves) = args.max_waves {
        config.max_waves = max_waves;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn tune(args: &TuneArgs) -> Result<()> {
    let config = tune_config(args)?;
    let factory = PerkFactory::procedural();
    let tuner = GeneticTuner::new(Arc::new(GameTables::default()), &factory, config)
        .context("tuner configuration rejected")?;
    let report = tuner.run().context("tuning failed")?;

    let path = write_profile(&args.out, &report.profile)
        .with_context(|| format!("failed to write profile into {}", args.out.display()))?;
    info!(path = %path.display(), fitness = report.evaluation.fitness, "wrote balance profile");
    print_json(&report.profile.meta)
}

fn episode(args: &EpisodeArgs) -> Result<()> {
    let tables = tables_with_profile(args.profile.as_deref());
    let factory = PerkFactory::procedural();
    let config = EpisodeConfig {
        seed: args.seed,
        max_waves: args.max_waves,
        ..EpisodeConfig::default()
    };
    let result = BalanceSimulator::new(Arc::new(tables), &factory).run_episode(&config);
    print_json(&result)
}

fn tables_with_profile(path: Option<&Path>) -> GameTables {
    let tables = GameTables::default();
    match path.and_then(load_profile) {
        Some(profile) => profile.applied_to(&tables),
        None => tables,
    }
}

fn plan(args: &PlanArgs) -> Result<()> {
    let director = WaveDirector::new();
    let plan = director.plan(args.wave, args.relics, args.ascension);
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let roster = director.spawn_list(&plan, &mut rng);
    print_json(&PlanReport {
        wave: plan.wave,
        boss: plan.boss,
        keywords: plan.keywords.iter().map(ToString::to_string).collect(),
        roster,
    })
}

fn export_run(args: &ExportArgs) -> Result<()> {
    let record = match &args.save {
        Some(path) => RunRecord::load(path)
            .with_context(|| format!("failed to read save file {}", path.display()))?,
        None => {
            let world = World::generate(
                Arc::new(GameTables::default()),
                &GridConfig {
                    columns: args.columns,
                    rows: args.rows,
                    seed: args.seed,
                    ..GridConfig::default()
                },
            );
            RunRecord::capture(&world)
        }
    };
    println!("{}", run_code::encode(&record).context("failed to encode run")?);
    Ok(())
}

fn import_run(args: &ImportArgs) -> Result<()> {
    let record = run_code::decode(&args.code).context("invalid run code")?;
    let _ = record
        .restore(Arc::new(GameTables::default()))
        .context("run code describes an unplayable run")?;
    if let Some(parent) = args.out.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    record
        .write(&args.out)
        .with_context(|| format!("failed to write save file {}", args.out.display()))?;
    info!(path = %args.out.display(), "imported run");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to encode output")?
    );
    Ok(())
}
