//! Travelling projectiles and their collision resolution.

use glam::Vec2;
use pathforge_core::{DamageType, EnemyId, OnHit, TowerId};
use rand::Rng;

use crate::enemy::Enemy;

/// Distance in tiles at which a projectile connects with an enemy.
const COLLISION_RADIUS: f32 = 0.35;
/// Fraction of the hit damage dealt to enemies caught in the splash.
const SPLASH_FACTOR: f32 = 0.55;

/// Projectile fired by a tower.
#[derive(Clone, Debug, PartialEq)]
pub struct Projectile {
    tower: TowerId,
    position: Vec2,
    velocity: Vec2,
    damage: f32,
    damage_type: DamageType,
    splash: f32,
    pierce: u32,
    ttl: f32,
    on_hit: Vec<OnHit>,
    struck: Vec<EnemyId>,
}

/// Launch parameters shared by every projectile of one volley.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Volley {
    pub(crate) tower: TowerId,
    pub(crate) origin: Vec2,
    pub(crate) damage: f32,
    pub(crate) damage_type: DamageType,
    pub(crate) splash: f32,
    pub(crate) pierce: u32,
    pub(crate) speed: f32,
    pub(crate) ttl: f32,
    pub(crate) on_hit: Vec<OnHit>,
}

impl Volley {
    /// Spawns `count` projectiles aimed at `target`, fanned out by a fixed
    /// angular step around the direct line.
    pub(crate) fn launch(&self, target: Vec2, count: u32, out: &mut Vec<Projectile>) {
        let direction = (target - self.origin).try_normalize().unwrap_or(Vec2::X);
        let velocity = direction * self.speed;
        let half = (count.saturating_sub(1)) as f32 / 2.0;
        for index in 0..count {
            let spread = (index as f32 - half) * 0.07;
            out.push(Projectile {
                tower: self.tower,
                position: self.origin,
                velocity: Vec2::from_angle(spread).rotate(velocity),
                damage: self.damage,
                damage_type: self.damage_type,
                splash: self.splash,
                pierce: self.pierce,
                ttl: self.ttl,
                on_hit: self.on_hit.clone(),
                struck: Vec::new(),
            });
        }
    }
}

impl Projectile {
    /// Tower that fired the projectile.
    #[must_use]
    pub fn tower(&self) -> TowerId {
        self.tower
    }

    /// Current tile-space position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Velocity in tiles per second.
    #[must_use]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Remaining lifetime in seconds.
    #[must_use]
    pub fn ttl(&self) -> f32 {
        self.ttl
    }

    /// Moves the projectile and resolves at most one collision.
    ///
    /// Returns `false` once the projectile expired or spent its last pierce.
    pub(crate) fn advance<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        enemies: &mut [Enemy],
        rng: &mut R,
    ) -> bool {
        self.position += self.velocity * dt;
        self.ttl -= dt;
        if self.ttl <= 0.0 {
            return false;
        }

        let reach = COLLISION_RADIUS * COLLISION_RADIUS;
        let Some(index) = enemies.iter().position(|enemy| {
            enemy.is_active()
                && !self.struck.contains(&enemy.id())
                && enemy.position().distance_squared(self.position) < reach
        }) else {
            return true;
        };

        let hit = &mut enemies[index];
        let _ = hit.take_damage(self.damage, self.damage_type);
        for on_hit in &self.on_hit {
            if on_hit.chance >= 1.0 || rng.gen::<f32>() < on_hit.chance {
                hit.add_status(on_hit);
            }
        }
        let center = hit.position();
        let hit_id = hit.id();
        self.struck.push(hit_id);

        if self.splash > 0.0 {
            let radius = self.splash * self.splash;
            for enemy in enemies.iter_mut() {
                if enemy.id() == hit_id || !enemy.is_active() {
                    continue;
                }
                if enemy.position().distance_squared(center) <= radius {
                    let _ = enemy.take_damage(self.damage * SPLASH_FACTOR, self.damage_type);
                }
            }
        }

        if self.pierce > 0 {
            self.pierce -= 1;
            true
        } else {
            false
        }
    }
}
