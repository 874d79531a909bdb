//! # Battle Core
//!
//! Deterministic simulation core for the Cube vs Sphere battle.
//!
//! This crate contains **only** simulation logic:
//! - No rendering, animation or audio
//! - No IO (configuration text is handed in by the caller)
//! - No system randomness (one seeded RNG per battle)
//! - No floating-point math (uses fixed-point)
//!
//! Presentation layers spawn units through [`simulation::BattleWorld::spawn`],
//! advance the battle with [`simulation::BattleWorld::tick`], and react to the
//! returned [`events::TickEvents`].
//!
//! ## Crate Structure
//!
//! - [`components`] - Unit state, teams and classes
//! - [`data`] - Unit configs and battle settings (RON)
//! - [`spatial`] - Proximity queries over live units
//! - [`targeting`] - Nearest-enemy selection
//! - [`steering`] - Approach, orbit and separation
//! - [`combat`] - Attack rolls, dodge and crowd limits
//! - [`projectile`] - Arcing projectiles and their pool
//! - [`ability`] - Commander slam and charge
//! - [`events`] - Presentation events
//! - [`simulation`] - The battle loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ability;
pub mod combat;
pub mod components;
pub mod data;
pub mod error;
pub mod events;
pub mod math;
pub mod projectile;
pub mod rng;
pub mod simulation;
pub mod spatial;
pub mod steering;
pub mod targeting;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ability::{AbilityController, AbilityKind, AbilitySequence};
    pub use crate::combat::{AttackStyle, CombatResolver, DamageOutcome};
    pub use crate::components::*;
    pub use crate::data::{BattleSettings, Loadout, UnitConfig};
    pub use crate::error::{BattleError, Result};
    pub use crate::events::{BattleEvent, TickEvents};
    pub use crate::math::{Fixed, Vec2Fixed, Vec3Fixed};
    pub use crate::projectile::{Projectile, ProjectileSimulator};
    pub use crate::simulation::{BattleOutcome, BattleWorld, SpawnRequest};
    pub use crate::spatial::{SpatialIndex, TeamFilter};
    pub use crate::steering::SteeringPolicy;
    pub use crate::targeting::TargetingPolicy;
}
