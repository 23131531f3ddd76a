//! Reading and writing tuned balance profiles.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use pathforge_core::BalanceProfile;
use tracing::{info, warn};

use crate::TunerError;

/// File name of the JSON profile.
pub const PROFILE_FILE: &str = "balance_profile.json";
/// File name of the Markdown summary.
pub const SUMMARY_FILE: &str = "balance_profile.md";

/// Loads a profile, returning `None` when the file is missing or corrupt.
#[must_use]
pub fn load_profile(path: &Path) -> Option<BalanceProfile> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            warn!(path = %path.display(), %error, "balance profile unavailable, using identity");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(profile) => Some(profile),
        Err(error) => {
            warn!(path = %path.display(), %error, "balance profile is corrupt, using identity");
            None
        }
    }
}

/// Writes the profile and its Markdown summary into `directory`.
///
/// Returns the path of the JSON profile.
pub fn write_profile(directory: &Path, profile: &BalanceProfile) -> Result<PathBuf, TunerError> {
    fs::create_dir_all(directory)?;
    let json_path = directory.join(PROFILE_FILE);
    fs::write(&json_path, serde_json::to_string_pretty(profile)?)?;

    let summary_path = directory.join(SUMMARY_FILE);
    fs::write(&summary_path, summary_markdown(profile))?;
    info!(path = %summary_path.display(), "wrote balance summary");
    Ok(json_path)
}

/// Renders the human-readable summary of a profile.
#[must_use]
pub fn summary_markdown(profile: &BalanceProfile) -> String {
    let mut out = String::from("# Pathforge Balance Profile\n\n");
    if let Some(meta) = &profile.meta {
        let _ = writeln!(
            out,
            "- Target: **{}** (target_mean≈{})",
            meta.target, meta.target_wave
        );
        let _ = writeln!(out, "- Episodes: **{}**", meta.episodes);
        let _ = writeln!(out, "- Max waves: **{}**", meta.max_waves);
        let _ = writeln!(
            out,
            "- Result mean waves: **{:.2}** (std {:.2})",
            meta.mean_waves, meta.std_waves
        );
        let _ = writeln!(out, "- Samples: `{:?}`", meta.samples);
    }

    out.push_str("\n## Multipliers\n\n### Towers\n\n");
    let tower = &profile.tower;
    for (name, value) in [
        ("damage_mul", tower.damage_mul),
        ("rate_mul", tower.rate_mul),
        ("range_mul", tower.range_mul),
        ("cost_mul", tower.cost_mul),
    ] {
        let _ = writeln!(out, "- {name}: `{value:.3}`");
    }

    out.push_str("\n### Enemies\n\n");
    let enemy = &profile.enemy;
    let _ = writeln!(out, "- hp_mul: `{:.3}`", enemy.hp_mul);
    let _ = writeln!(out, "- armor_add: `{}`", enemy.armor_add);
    for (name, value) in [
        ("speed_mul", enemy.speed_mul),
        ("regen_mul", enemy.regen_mul),
        ("shield_mul", enemy.shield_mul),
    ] {
        let _ = writeln!(out, "- {name}: `{value:.3}`");
    }
    out
}
