//! The Foundation, Arsenal and Conduction talent trees.

use pathforge_core::{
    BonusKind, Effect, FlagKind, OnHit, PathVariant, ResourceKind, RunStats, RuneAura, StatusKind,
    Talent, TowerKey,
};

/// Every talent node of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct TalentCatalog {
    talents: Vec<Talent>,
}

impl Default for TalentCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl TalentCatalog {
    /// Builds a catalog from explicit nodes.
    #[must_use]
    pub fn new(talents: Vec<Talent>) -> Self {
        Self { talents }
    }

    /// Builds the three standard trees.
    #[must_use]
    pub fn standard() -> Self {
        use Effect::{Flag, Grant, TowerBonus, UnlockPath, UnlockTower};

        let talents = vec![
            node(
                "F1",
                "Amplified Essence",
                &[],
                &[],
                vec![Grant(ResourceKind::Paves, 30), Grant(ResourceKind::PavesCap, 30)],
            ),
            node(
                "F2",
                "Forge Roads",
                &["F1"],
                &[],
                vec![UnlockPath(PathVariant::Fast), UnlockPath(PathVariant::Mud)],
            ),
            node(
                "F3",
                "Conductivity",
                &["F2"],
                &[],
                vec![UnlockPath(PathVariant::Conductive)],
            ),
            node(
                "F4A",
                "Living Runes",
                &["F3"],
                &["F4B"],
                vec![
                    UnlockPath(PathVariant::Rune),
                    Effect::RuneAura(RuneAura {
                        damage_mul: 1.08,
                        range_mul: 1.06,
                        radius: 3,
                    }),
                    Effect::RuneVulnChance(0.30),
                ],
            ),
            node(
                "F4B",
                "Cryo Alchemy",
                &["F3"],
                &["F4A"],
                vec![UnlockPath(PathVariant::Cryo), Effect::CryoSlowExtend(0.16)],
            ),
            node(
                "F5",
                "Magma Foundry",
                &["F3"],
                &[],
                vec![UnlockPath(PathVariant::Magma), Effect::MagmaBurnChance(0.55)],
            ),
            node(
                "F6",
                "Reforge Protocol",
                &["F5"],
                &[],
                vec![Flag(FlagKind::PathReforgeFree)],
            ),
            node("A1", "Artillery", &[], &[], vec![UnlockTower(TowerKey::Mortar)]),
            node("A2", "Precision", &["A1"], &[], vec![UnlockTower(TowerKey::Sniper)]),
            node("A3", "Relay", &["A1"], &[], vec![UnlockTower(TowerKey::Beacon)]),
            node(
                "A4A",
                "Piercing Rounds",
                &["A2"],
                &["A4B"],
                vec![TowerBonus(TowerKey::Sniper, BonusKind::DamageMul, 1.20)],
            ),
            node(
                "A4B",
                "Splash Doctrine",
                &["A2"],
                &["A4A"],
                vec![Flag(FlagKind::AllProjectilesSplash)],
            ),
            node(
                "A5",
                "Shredding",
                &["A3"],
                &[],
                vec![Effect::GlobalOnHit(
                    OnHit::new(StatusKind::Shred, 2.0).with_chance(0.18),
                )],
            ),
            node("A6", "Boss Bounty", &["A5"], &[], vec![Flag(FlagKind::BossBounty)]),
            node("C1", "Electromancy", &[], &[], vec![UnlockTower(TowerKey::Tesla)]),
            node(
                "C2",
                "Cryomancy",
                &["C1"],
                &[],
                vec![
                    UnlockTower(TowerKey::Cryo),
                    TowerBonus(TowerKey::Cryo, BonusKind::SlowStrengthAdd, 0.04),
                ],
            ),
            node("C3", "Pyromancy", &["C1"], &[], vec![UnlockTower(TowerKey::Flame)]),
            node(
                "C4A",
                "Arc Mastery",
                &["C1"],
                &["C4B"],
                vec![
                    TowerBonus(TowerKey::Tesla, BonusKind::ChainsAdd, 2.0),
                    TowerBonus(TowerKey::Tesla, BonusKind::ShockDurAdd, 0.5),
                    Flag(FlagKind::ConductMastery),
                ],
            ),
            node(
                "C4B",
                "Thermal Mastery",
                &["C3"],
                &["C4A"],
                vec![
                    TowerBonus(TowerKey::Flame, BonusKind::BurnStacksAdd, 2.0),
                    Effect::GlobalOnHit(OnHit::new(StatusKind::Burn, 1.4).with_chance(0.10)),
                ],
            ),
            // Hero shockwave upgrade; the hero ability lives outside the simulation.
            node("C5", "Shockwave", &["C2"], &[], Vec::new()),
            node(
                "C6",
                "Overcadence",
                &["C5"],
                &[],
                vec![Effect::OverclockDurMul(1.20)],
            ),
        ];
        Self { talents }
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Talent> {
        self.talents.iter().find(|talent| talent.id == id)
    }

    /// Iterates over every node in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Talent> {
        self.talents.iter()
    }

    /// Nodes the run could buy right now.
    pub fn available<'a>(&'a self, stats: &'a RunStats) -> impl Iterator<Item = &'a Talent> + 'a {
        self.talents
            .iter()
            .filter(move |talent| stats.check_talent(talent).is_ok())
    }

    /// Nodes without prerequisites.
    pub fn roots(&self) -> impl Iterator<Item = &Talent> {
        self.talents
            .iter()
            .filter(|talent| talent.prerequisites.is_empty())
    }
}

fn node(
    id: &str,
    name: &str,
    prerequisites: &[&str],
    exclusive_with: &[&str],
    effects: Vec<Effect>,
) -> Talent {
    Talent {
        id: id.to_owned(),
        name: name.to_owned(),
        prerequisites: prerequisites.iter().map(|id| (*id).to_owned()).collect(),
        exclusive_with: exclusive_with.iter().map(|id| (*id).to_owned()).collect(),
        effects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathforge_core::TalentError;

    fn stats_with_points(points: u32) -> RunStats {
        RunStats {
            talent_points: points,
            ..RunStats::default()
        }
    }

    #[test]
    fn prerequisites_and_exclusions_reference_known_nodes() {
        let catalog = TalentCatalog::standard();
        assert_eq!(catalog.iter().count(), 20);
        for talent in catalog.iter() {
            for id in talent.prerequisites.iter().chain(&talent.exclusive_with) {
                assert!(catalog.get(id).is_some(), "{} references {id}", talent.id);
            }
        }
        let roots: Vec<&str> = catalog.roots().map(|t| t.id.as_str()).collect();
        assert_eq!(roots, ["F1", "A1", "C1"]);
    }

    #[test]
    fn only_roots_are_available_on_a_fresh_run() {
        let catalog = TalentCatalog::standard();
        let stats = stats_with_points(1);
        let available: Vec<&str> = catalog.available(&stats).map(|t| t.id.as_str()).collect();
        assert_eq!(available, ["F1", "A1", "C1"]);
        assert_eq!(catalog.available(&RunStats::default()).count(), 0);
    }

    #[test]
    fn buying_a_branch_locks_out_its_sibling() {
        let catalog = TalentCatalog::standard();
        let mut stats = stats_with_points(5);
        for id in ["A1", "A2", "A4A"] {
            let talent = catalog.get(id).expect("known node");
            stats.buy_talent(talent).expect("purchasable");
        }

        let sibling = catalog.get("A4B").expect("known node");
        assert_eq!(stats.check_talent(sibling), Err(TalentError::Excluded));
        assert!((stats.tower_bonus(TowerKey::Sniper).damage_mul - 1.2).abs() < 1e-6);
        assert!(stats.is_tower_unlocked(TowerKey::Mortar));
        assert!(stats.is_tower_unlocked(TowerKey::Sniper));
    }

    #[test]
    fn foundation_tree_unlocks_terrain() {
        let catalog = TalentCatalog::standard();
        let mut stats = stats_with_points(4);
        for id in ["F1", "F2", "F3", "F5"] {
            stats
                .buy_talent(catalog.get(id).expect("known node"))
                .expect("purchasable");
        }

        assert_eq!(stats.paves, 150);
        assert_eq!(stats.paves_cap, 190);
        assert!(stats.is_path_unlocked(PathVariant::Fast));
        assert!(stats.is_path_unlocked(PathVariant::Magma));
        assert!(!stats.is_path_unlocked(PathVariant::Rune));
        assert!((stats.terrain.magma_burn_chance - 0.55).abs() < 1e-6);
        assert_eq!(stats.talent_points, 0);
    }
}
