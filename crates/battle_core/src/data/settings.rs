//! Battle-wide tuning knobs.
//!
//! These are the parameters that do not belong to a single unit's stat
//! block: neighbor radii, cadences, projectile ballistics, ability timings.

use serde::{Deserialize, Serialize};

use crate::components::UnitClass;
use crate::error::{BattleError, Result};
use crate::math::{fixed_serde, Fixed};

/// Target acquisition parameters for one unit class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetingSettings {
    /// Enemies farther than this are ignored.
    #[serde(with = "fixed_serde")]
    pub detection_radius: Fixed,
    /// Seconds between re-evaluations. Zero re-evaluates every tick.
    #[serde(with = "fixed_serde")]
    pub search_interval: Fixed,
}

/// Separation steering parameters for one unit class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparationSettings {
    /// Neighbors inside this radius push the unit away.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
    /// Length of the separation vector after normalization.
    #[serde(with = "fixed_serde")]
    pub strength: Fixed,
    /// Whether enemies also contribute.
    pub include_enemies: bool,
    /// Seconds a computed separation vector stays cached. Zero recomputes on every move.
    #[serde(with = "fixed_serde")]
    pub refresh_interval: Fixed,
}

/// Per-class behavior parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSettings {
    /// Target acquisition.
    pub targeting: TargetingSettings,
    /// Separation steering.
    pub separation: SeparationSettings,
    /// Whether the unit circles its target instead of approaching head-on.
    pub orbit: bool,
}

/// Ranged projectile ballistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectileSettings {
    /// Flight speed in units per second.
    #[serde(with = "fixed_serde")]
    pub speed: Fixed,
    /// Peak height of the parabolic arc.
    #[serde(with = "fixed_serde")]
    pub arc_height: Fixed,
    /// Projectiles resolve after this many seconds regardless of progress.
    #[serde(with = "fixed_serde")]
    pub max_lifetime: Fixed,
    /// Radius searched for a victim at the impact point.
    #[serde(with = "fixed_serde")]
    pub hit_radius: Fixed,
    /// Height above the shooter's position where projectiles start.
    #[serde(with = "fixed_serde")]
    pub launch_height: Fixed,
    /// Slots allocated up front.
    pub pool_capacity: usize,
}

/// Commander ability timings that are not part of the unit config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilitySettings {
    /// Peak height of the slam hop.
    #[serde(with = "fixed_serde")]
    pub slam_jump_height: Fixed,
    /// Seconds rising.
    #[serde(with = "fixed_serde")]
    pub slam_rise_time: Fixed,
    /// Seconds falling.
    #[serde(with = "fixed_serde")]
    pub slam_fall_time: Fixed,
    /// Distance enemies are pushed away from the slam center.
    #[serde(with = "fixed_serde")]
    pub slam_knockback_distance: Fixed,
    /// Fraction of the slam radius that triggers the slam.
    #[serde(with = "fixed_serde")]
    pub slam_trigger_fraction: Fixed,
    /// Distance stepped backwards before a charge.
    #[serde(with = "fixed_serde")]
    pub charge_back_distance: Fixed,
    /// Seconds spent stepping back.
    #[serde(with = "fixed_serde")]
    pub charge_back_time: Fixed,
    /// Gap left between the dash end and the target.
    #[serde(with = "fixed_serde")]
    pub charge_stop_offset: Fixed,
    /// Charges only start when the target is farther than this.
    #[serde(with = "fixed_serde")]
    pub charge_min_distance: Fixed,
}

impl Default for ProjectileSettings {
    fn default() -> Self {
        Self {
            speed: Fixed::from_num(15),
            arc_height: Fixed::from_num(2),
            max_lifetime: Fixed::from_num(4),
            hit_radius: Fixed::from_num(0.6),
            launch_height: Fixed::from_num(0.5),
            pool_capacity: 50,
        }
    }
}

impl Default for AbilitySettings {
    fn default() -> Self {
        Self {
            slam_jump_height: Fixed::from_num(2.5),
            slam_rise_time: Fixed::from_num(0.25),
            slam_fall_time: Fixed::from_num(0.2),
            slam_knockback_distance: Fixed::from_num(6),
            slam_trigger_fraction: Fixed::from_num(0.9),
            charge_back_distance: Fixed::from_num(0.8),
            charge_back_time: Fixed::from_num(0.12),
            charge_stop_offset: Fixed::from_num(1.5),
            charge_min_distance: Fixed::from_num(2),
        }
    }
}

/// All battle-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleSettings {
    /// Seed for every random roll in the battle.
    pub seed: u64,
    /// Side length of a spatial index cell.
    #[serde(with = "fixed_serde")]
    pub grid_cell_size: Fixed,

    /// Melee behavior.
    pub melee: ClassSettings,
    /// Ranged behavior.
    pub ranged: ClassSettings,
    /// Commander behavior.
    pub commander: ClassSettings,

    /// Allies around a target beyond which further melee attackers hold back.
    pub max_attackers_per_target: u32,
    /// Crowd radius as a multiple of the requester's attack range.
    #[serde(with = "fixed_serde")]
    pub crowd_range_multiplier: Fixed,
    /// Seconds between crowd re-checks.
    #[serde(with = "fixed_serde")]
    pub crowd_check_interval: Fixed,

    /// Beyond this multiple of attack range units approach head-on.
    #[serde(with = "fixed_serde")]
    pub orbit_threshold_multiplier: Fixed,
    /// Weight of the tangential component while orbiting.
    #[serde(with = "fixed_serde")]
    pub orbit_weight: Fixed,
    /// Ranged units holding position drift apart at this fraction of move speed.
    #[serde(with = "fixed_serde")]
    pub hold_separation_factor: Fixed,
    /// Extra reach added to the fallback melee range when deciding to switch.
    #[serde(with = "fixed_serde")]
    pub fallback_trigger_margin: Fixed,

    /// Projectile ballistics.
    pub projectile: ProjectileSettings,
    /// Commander ability timings.
    pub ability: AbilitySettings,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            seed: 0x00C0_FFEE,
            grid_cell_size: Fixed::from_num(4),
            melee: ClassSettings {
                targeting: TargetingSettings {
                    detection_radius: Fixed::from_num(1000),
                    search_interval: Fixed::from_num(0.4),
                },
                separation: SeparationSettings {
                    radius: Fixed::from_num(0.8),
                    strength: Fixed::from_num(0.5),
                    include_enemies: true,
                    refresh_interval: Fixed::from_num(0.12),
                },
                orbit: true,
            },
            ranged: ClassSettings {
                targeting: TargetingSettings {
                    detection_radius: Fixed::from_num(60),
                    search_interval: Fixed::from_num(0.3),
                },
                separation: SeparationSettings {
                    radius: Fixed::from_num(1.2),
                    strength: Fixed::from_num(0.7),
                    include_enemies: false,
                    refresh_interval: Fixed::ZERO,
                },
                orbit: false,
            },
            commander: ClassSettings {
                targeting: TargetingSettings {
                    detection_radius: Fixed::from_num(40),
                    search_interval: Fixed::ZERO,
                },
                separation: SeparationSettings {
                    radius: Fixed::from_num(2),
                    strength: Fixed::ONE,
                    include_enemies: true,
                    refresh_interval: Fixed::ZERO,
                },
                orbit: false,
            },
            max_attackers_per_target: 6,
            crowd_range_multiplier: Fixed::from_num(1.2),
            crowd_check_interval: Fixed::from_num(0.2),
            orbit_threshold_multiplier: Fixed::from_num(1.5),
            orbit_weight: Fixed::from_num(0.7),
            hold_separation_factor: Fixed::from_num(0.5),
            fallback_trigger_margin: Fixed::from_num(0.1),
            projectile: ProjectileSettings::default(),
            ability: AbilitySettings::default(),
        }
    }
}

impl BattleSettings {
    /// Default settings with a specific seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Parse settings from RON text. Missing fields keep their defaults.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| BattleError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Behavior parameters for a class.
    #[must_use]
    pub const fn class(&self, class: UnitClass) -> &ClassSettings {
        match class {
            UnitClass::Melee => &self.melee,
            UnitClass::Ranged => &self.ranged,
            UnitClass::Commander => &self.commander,
        }
    }
}
