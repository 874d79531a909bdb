//! Test fixtures and helpers.
//!
//! Pre-built battles and unit configurations
//! for consistent testing.

use std::sync::Arc;

use battle_core::components::{Team, UnitClass, UnitId};
use battle_core::data::{BattleSettings, Loadout, UnitConfig};
use battle_core::math::Vec2Fixed;
use battle_core::simulation::{BattleWorld, SpawnRequest};
use fixed::types::I32F32;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::formation::{spawn_team, FormationShape, TeamSetup};

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Ground position from float coordinates.
#[must_use]
pub fn pos(x: f64, z: f64) -> Vec2Fixed {
    Vec2Fixed::from_f64(x, z)
}

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`. Safe to call from every test; only the first call
/// installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

/// Melee config with no randomness: exact damage, exact cooldown, no dodge.
#[must_use]
pub fn steady_melee(damage: f64, health: f64) -> UnitConfig {
    UnitConfig {
        id: "steady_melee".to_string(),
        attack_damage: fixed_f(damage),
        max_health: fixed_f(health),
        dodge_chance: I32F32::ZERO,
        damage_random_percent: I32F32::ZERO,
        attack_speed_random_percent: I32F32::ZERO,
        ..UnitConfig::melee()
    }
}

/// Config that never moves and never dodges. Useful as a target dummy.
#[must_use]
pub fn dummy(class: UnitClass, health: f64) -> UnitConfig {
    let base = match class {
        UnitClass::Melee => UnitConfig::melee(),
        UnitClass::Ranged => UnitConfig::ranged(),
        UnitClass::Commander => UnitConfig::commander(),
    };
    UnitConfig {
        id: format!("dummy_{}", class.name()),
        max_health: fixed_f(health),
        move_speed: I32F32::ZERO,
        dodge_chance: I32F32::ZERO,
        ..base
    }
}

/// Spawn one unit from a plain config.
///
/// # Panics
///
/// Panics if the config does not validate for `class`.
pub fn spawn_unit(
    world: &mut BattleWorld,
    team: Team,
    class: UnitClass,
    config: UnitConfig,
    position: Vec2Fixed,
) -> UnitId {
    world
        .spawn(SpawnRequest::new(team, class, Arc::new(config), position))
        .expect("fixture config must validate")
}

/// One Cube melee against one Sphere melee, within reach of each other.
///
/// # Panics
///
/// Panics if the standard loadout fails to spawn.
#[must_use]
pub fn melee_duel(seed: u64) -> BattleWorld {
    let mut world = BattleWorld::new(BattleSettings::with_seed(seed));
    let loadout = Loadout::standard();
    for (team, x) in [(Team::Cube, -0.75), (Team::Sphere, 0.75)] {
        world
            .spawn(SpawnRequest::new(team, UnitClass::Melee, loadout.melee.clone(), pos(x, 0.0)))
            .expect("standard melee must spawn");
    }
    world
}

/// Two lines of melee closing on each other.
///
/// # Panics
///
/// Panics if the standard loadout fails to spawn.
#[must_use]
pub fn melee_skirmish(seed: u64, per_side: usize) -> BattleWorld {
    army_battle(seed, FormationShape::Line, per_side, 0, 0)
}

/// Both teams with every class, facing off across a 30 unit gap.
///
/// # Panics
///
/// Panics if the standard loadout fails to spawn.
#[must_use]
pub fn mixed_battle(seed: u64, per_side: usize) -> BattleWorld {
    let ranged = per_side / 3;
    let melee = per_side - ranged;
    army_battle(seed, FormationShape::Square, melee, ranged, 1)
}

/// Mirror-matched armies in the given formation.
///
/// # Panics
///
/// Panics if the standard loadout fails to spawn.
#[must_use]
pub fn army_battle(
    seed: u64,
    shape: FormationShape,
    melee: usize,
    ranged: usize,
    commanders: usize,
) -> BattleWorld {
    let mut world = BattleWorld::new(BattleSettings::with_seed(seed));
    let loadout = Loadout::standard();
    for team in Team::ALL {
        let setup = TeamSetup::facing_off(team, shape, 30.0).with_counts(melee, ranged, commanders);
        spawn_team(&mut world, &loadout, &setup).expect("standard loadout must spawn");
    }
    world
}
