#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Perk and talent content for a run.
//!
//! The perk factory expands a small set of stat kinds into a large procedural
//! catalog and rolls rarity-weighted offers from it. The talent catalog holds
//! the three talent trees whose nodes are bought with talent points.

mod perks;
mod talents;

use pathforge_core::Perk;
use rand::RngCore;

pub use perks::{rarity_weights, PerkFactory, PerkTemplate, RollKind};
pub use talents::TalentCatalog;

/// Supplier of perk offers between waves.
///
/// Episode runners receive a source instead of a concrete catalog so tests can
/// script the exact offers.
pub trait PerkSource {
    /// Rolls up to `count` distinct perks with the given rarity bias.
    fn roll(&self, count: usize, rarity_bias: f32, rng: &mut dyn RngCore) -> Vec<Perk>;
}

impl PerkSource for PerkFactory {
    fn roll(&self, count: usize, rarity_bias: f32, rng: &mut dyn RngCore) -> Vec<Perk> {
        PerkFactory::roll(self, count, rarity_bias, rng)
    }
}

impl<T: PerkSource + ?Sized> PerkSource for &T {
    fn roll(&self, count: usize, rarity_bias: f32, rng: &mut dyn RngCore) -> Vec<Perk> {
        (**self).roll(count, rarity_bias, rng)
    }
}
