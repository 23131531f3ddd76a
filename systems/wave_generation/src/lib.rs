#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic themed wave planning.
//!
//! [`WaveDirector::plan`] derives a wave's theme purely from the wave number,
//! the relics lying on the lane and the ascension level, so previews of
//! upcoming waves never disagree with what is eventually fought.
//! [`WaveDirector::spawn_list`] turns a plan into the ordered roster of
//! enemies using the caller's random stream.

use std::fmt;

use pathforge_core::EnemyKey;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Every tenth wave is a boss wave.
pub const BOSS_INTERVAL: u32 = 10;

const BOSS_ESCORT: [EnemyKey; 8] = [
    EnemyKey::Boss,
    EnemyKey::Elite,
    EnemyKey::Tank,
    EnemyKey::Wisp,
    EnemyKey::Scout,
    EnemyKey::Mutant,
    EnemyKey::Pyro,
    EnemyKey::Scout,
];

/// Theme tag attached to a wave plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    /// Many light enemies.
    Swarm,
    /// Quick enemies.
    Fast,
    /// Even mix of the roster.
    Mixed,
    /// Mixed roster, paired with [`Keyword::Mixed`].
    Tactical,
    /// Regenerating enemies.
    Regen,
    /// Mutants dominate.
    Mutant,
    /// Heavy assault.
    Siege,
    /// Armoured enemies dominate.
    Armored,
    /// Shielded enemies dominate.
    Shields,
    /// Elite enemies dominate.
    Elite,
    /// Boss wave marker.
    Boss,
    /// Boss wave flavour.
    Apex,
    /// Boss wave flavour.
    Unstoppable,
    /// Relic count lying on the lane.
    Relics(u32),
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keyword::Swarm => f.write_str("Swarm"),
            Keyword::Fast => f.write_str("Fast"),
            Keyword::Mixed => f.write_str("Mixed"),
            Keyword::Tactical => f.write_str("Tactical"),
            Keyword::Regen => f.write_str("Regen"),
            Keyword::Mutant => f.write_str("Mutant"),
            Keyword::Siege => f.write_str("Siege"),
            Keyword::Armored => f.write_str("Armored"),
            Keyword::Shields => f.write_str("Shields"),
            Keyword::Elite => f.write_str("Elite"),
            Keyword::Boss => f.write_str("BOSS"),
            Keyword::Apex => f.write_str("Apex"),
            Keyword::Unstoppable => f.write_str("Unstoppable"),
            Keyword::Relics(count) => write!(f, "Relics+{count}"),
        }
    }
}

/// Theme and boss flag describing an upcoming wave.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavePlan {
    /// Wave number the plan describes.
    pub wave: u32,
    /// Whether the wave is a boss wave.
    pub boss: bool,
    /// Theme keywords in display order.
    pub keywords: Vec<Keyword>,
    /// Relics on the lane when the plan was made.
    pub relics_in_path: u32,
}

impl WavePlan {
    /// Reports whether the plan carries the keyword.
    #[must_use]
    pub fn has(&self, keyword: Keyword) -> bool {
        self.keywords.contains(&keyword)
    }
}

/// Stateless planner for wave themes and rosters.
#[derive(Clone, Copy, Debug, Default)]
pub struct WaveDirector;

impl WaveDirector {
    /// Creates a new director.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Plans the theme of a wave.
    ///
    /// The same inputs always yield the same plan.
    #[must_use]
    pub fn plan(&self, wave: u32, relics_in_path: u32, ascension: u32) -> WavePlan {
        let mut rng = SplitMix64::new(derive_plan_seed(wave, relics_in_path, ascension));
        let themes = themes_for(wave);
        let index = (rng.next_u64() % themes.len() as u64) as usize;

        let mut keywords = themes[index].to_vec();
        if relics_in_path > 0 {
            keywords.push(Keyword::Relics(relics_in_path));
        }

        let boss = wave > 0 && wave % BOSS_INTERVAL == 0;
        if boss {
            let lead = keywords.first().copied();
            keywords = vec![Keyword::Boss, Keyword::Apex, Keyword::Unstoppable];
            keywords.extend(lead);
        }

        WavePlan {
            wave,
            boss,
            keywords,
            relics_in_path,
        }
    }

    /// Builds the roster for a planned wave.
    ///
    /// Boss waves return the fixed boss escort. Regular waves draw
    /// `9 + floor(1.7 × wave)` enemies from the wave's roster weighted by the
    /// plan's keywords. Callers shuffle the result themselves.
    pub fn spawn_list<R: Rng + ?Sized>(&self, plan: &WavePlan, rng: &mut R) -> Vec<EnemyKey> {
        if plan.boss {
            return BOSS_ESCORT.to_vec();
        }

        let mut pool = Vec::new();
        for (key, weight) in roster_weights(plan) {
            let copies = ((weight * 10.0).round() as usize).max(1);
            pool.extend(std::iter::repeat(key).take(copies));
        }

        let count = 9 + (plan.wave as f32 * 1.7) as usize;
        (0..count)
            .map(|_| pool[rng.gen_range(0..pool.len())])
            .collect()
    }
}

/// Theme pool widening with the wave number so armour and shield themes
/// never open a run.
fn themes_for(wave: u32) -> &'static [[Keyword; 2]] {
    const SWARM: [Keyword; 2] = [Keyword::Swarm, Keyword::Fast];
    const MIXED: [Keyword; 2] = [Keyword::Mixed, Keyword::Tactical];
    const REGEN: [Keyword; 2] = [Keyword::Regen, Keyword::Mutant];
    const SIEGE: [Keyword; 2] = [Keyword::Siege, Keyword::Armored];
    const SHIELDS: [Keyword; 2] = [Keyword::Shields, Keyword::Elite];

    match wave {
        0..=2 => &[SWARM, MIXED],
        3..=4 => &[SWARM, MIXED, REGEN],
        5..=7 => &[SWARM, SIEGE, REGEN, MIXED],
        _ => &[SWARM, SIEGE, SHIELDS, REGEN, MIXED],
    }
}

fn roster(wave: u32) -> &'static [EnemyKey] {
    use EnemyKey::{Elite, Mutant, Pyro, Scout, Soldier, Tank, Wisp};

    match wave {
        0..=2 => &[Soldier, Scout],
        3..=4 => &[Soldier, Scout, Mutant],
        5..=6 => &[Soldier, Scout, Mutant, Pyro],
        7..=9 => &[Soldier, Scout, Mutant, Pyro, Tank],
        10..=12 => &[Soldier, Scout, Mutant, Pyro, Tank, Wisp],
        _ => &[Soldier, Scout, Tank, Mutant, Wisp, Pyro, Elite],
    }
}

fn roster_weights(plan: &WavePlan) -> Vec<(EnemyKey, f32)> {
    let wave = plan.wave;
    let swarm = plan.has(Keyword::Fast) || plan.has(Keyword::Swarm);
    let siege = (plan.has(Keyword::Armored) || plan.has(Keyword::Siege)) && wave >= 6;
    let regen = plan.has(Keyword::Regen) || plan.has(Keyword::Mutant);
    let shields = (plan.has(Keyword::Shields) || plan.has(Keyword::Elite)) && wave >= 9;

    roster(wave)
        .iter()
        .map(|&key| {
            let mut weight = 1.0;
            if swarm && matches!(key, EnemyKey::Scout | EnemyKey::Wisp | EnemyKey::Soldier) {
                weight *= 1.45;
            }
            if siege && matches!(key, EnemyKey::Tank | EnemyKey::Elite | EnemyKey::Pyro) {
                weight *= 1.40;
            }
            if regen && key == EnemyKey::Mutant {
                weight *= 1.60;
            }
            if shields && matches!(key, EnemyKey::Elite | EnemyKey::Wisp) {
                weight *= 1.55;
            }
            (key, weight)
        })
        .collect()
}

fn derive_plan_seed(wave: u32, relics_in_path: u32, ascension: u32) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(wave.to_le_bytes());
    hasher.update(relics_in_path.to_le_bytes());
    hasher.update(ascension.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[derive(Clone, Copy, Debug)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        let seed = if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed };
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn weight_of(plan: &WavePlan, key: EnemyKey) -> Option<f32> {
        roster_weights(plan)
            .into_iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, weight)| weight)
    }

    fn plan_with(wave: u32, keywords: Vec<Keyword>) -> WavePlan {
        WavePlan {
            wave,
            boss: false,
            keywords,
            relics_in_path: 0,
        }
    }

    #[test]
    fn plans_are_reproducible() {
        let director = WaveDirector::new();
        for wave in 1..40 {
            assert_eq!(director.plan(wave, 2, 1), director.plan(wave, 2, 1));
        }
    }

    #[test]
    fn early_waves_never_roll_armor_or_shield_themes() {
        let director = WaveDirector::new();
        for wave in 1..=4 {
            for relics in 0..6 {
                for ascension in 0..4 {
                    let plan = director.plan(wave, relics, ascension);
                    assert!(!plan.has(Keyword::Armored), "{plan:?}");
                    assert!(!plan.has(Keyword::Shields), "{plan:?}");
                }
            }
        }
    }

    #[test]
    fn every_tenth_wave_is_a_boss_wave() {
        let director = WaveDirector::new();
        let plan = director.plan(20, 1, 0);
        assert!(plan.boss);
        assert_eq!(
            &plan.keywords[..3],
            &[Keyword::Boss, Keyword::Apex, Keyword::Unstoppable]
        );
        assert_eq!(plan.keywords.len(), 4);
        assert!(!director.plan(19, 1, 0).boss);
    }

    #[test]
    fn relics_are_announced_as_a_keyword() {
        let plan = WaveDirector::new().plan(3, 2, 0);
        assert_eq!(plan.keywords.last(), Some(&Keyword::Relics(2)));
        assert_eq!(Keyword::Relics(2).to_string(), "Relics+2");
    }

    #[test]
    fn boss_waves_return_the_fixed_escort() {
        let director = WaveDirector::new();
        let plan = director.plan(10, 0, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(director.spawn_list(&plan, &mut rng), BOSS_ESCORT.to_vec());
    }

    #[test]
    fn roster_size_grows_with_the_wave() {
        let director = WaveDirector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(director.spawn_list(&plan_with(1, vec![]), &mut rng).len(), 10);
        assert_eq!(director.spawn_list(&plan_with(5, vec![]), &mut rng).len(), 17);
        assert_eq!(director.spawn_list(&plan_with(13, vec![]), &mut rng).len(), 31);
    }

    #[test]
    fn early_rosters_hold_only_light_enemies() {
        let director = WaveDirector::new();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let list = director.spawn_list(&director.plan(2, 0, 0), &mut rng);
        assert!(list
            .iter()
            .all(|key| matches!(key, EnemyKey::Soldier | EnemyKey::Scout)));
    }

    #[test]
    fn keywords_reweight_the_roster() {
        let swarm = plan_with(12, vec![Keyword::Swarm, Keyword::Fast]);
        assert_eq!(weight_of(&swarm, EnemyKey::Scout), Some(1.45));
        assert_eq!(weight_of(&swarm, EnemyKey::Tank), Some(1.0));

        let siege_early = plan_with(5, vec![Keyword::Siege, Keyword::Armored]);
        assert_eq!(weight_of(&siege_early, EnemyKey::Pyro), Some(1.0));
        let siege = plan_with(8, vec![Keyword::Siege, Keyword::Armored]);
        assert_eq!(weight_of(&siege, EnemyKey::Tank), Some(1.4));

        let shields = plan_with(14, vec![Keyword::Shields, Keyword::Elite]);
        assert_eq!(weight_of(&shields, EnemyKey::Elite), Some(1.55));

        let regen = plan_with(3, vec![Keyword::Regen, Keyword::Mutant]);
        assert_eq!(weight_of(&regen, EnemyKey::Mutant), Some(1.6));
    }
}
