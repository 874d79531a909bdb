//! Unit stat blocks for data-driven loadouts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::components::UnitClass;
use crate::error::{BattleError, Result};
use crate::math::{fixed_serde, Fixed};

/// Fallback melee parameters for ranged units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangedConfig {
    /// Whether the unit switches to melee when an enemy gets close.
    pub can_fallback_melee: bool,

    /// Damage of a fallback melee strike. Zero means 30% of `attack_damage`.
    #[serde(with = "fixed_serde")]
    pub fallback_melee_damage: Fixed,

    /// Reach of a fallback melee strike.
    #[serde(with = "fixed_serde")]
    pub fallback_melee_range: Fixed,
}

impl Default for RangedConfig {
    fn default() -> Self {
        Self {
            can_fallback_melee: true,
            fallback_melee_damage: Fixed::from_num(7),
            fallback_melee_range: Fixed::from_num(1.3),
        }
    }
}

/// Special ability parameters for commanders.
///
/// Cube commanders use the slam fields, Sphere commanders the charge fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommanderConfig {
    /// Damage dealt to each enemy caught by a slam.
    #[serde(with = "fixed_serde")]
    pub slam_damage: Fixed,
    /// Radius of the slam area.
    #[serde(with = "fixed_serde")]
    pub slam_radius: Fixed,
    /// Seconds between slams.
    #[serde(with = "fixed_serde")]
    pub slam_cooldown: Fixed,

    /// Damage dealt to each enemy caught by a charge.
    #[serde(with = "fixed_serde")]
    pub charge_damage: Fixed,
    /// Maximum dash length.
    #[serde(with = "fixed_serde")]
    pub charge_distance: Fixed,
    /// Dash speed in units per second.
    #[serde(with = "fixed_serde")]
    pub charge_speed: Fixed,
    /// Base radius of the charge impact (scaled by 1.5 at resolution).
    #[serde(with = "fixed_serde")]
    pub charge_radius: Fixed,
    /// Seconds between charges.
    #[serde(with = "fixed_serde")]
    pub charge_cooldown: Fixed,
    /// Distance enemies are pushed along the charge direction.
    #[serde(with = "fixed_serde")]
    pub charge_knockback_distance: Fixed,
}

impl Default for CommanderConfig {
    fn default() -> Self {
        Self {
            slam_damage: Fixed::from_num(180),
            slam_radius: Fixed::from_num(7),
            slam_cooldown: Fixed::from_num(5),
            charge_damage: Fixed::from_num(130),
            charge_distance: Fixed::from_num(9),
            charge_speed: Fixed::from_num(16),
            charge_radius: Fixed::from_num(2.5),
            charge_cooldown: Fixed::from_num(5.5),
            charge_knockback_distance: Fixed::from_num(7),
        }
    }
}

/// Immutable stat block shared by every unit of one loadout entry.
///
/// # Example RON
///
/// ```ron
/// UnitConfig(
///     id: "cube_archer",
///     max_health: 90.0,
///     attack_damage: 12.0,
///     attack_range: 14.0,
///     attack_speed: 0.8,
///     move_speed: 3.5,
///     dodge_chance: 0.05,
///     damage_random_percent: 0.1,
///     attack_speed_random_percent: 0.05,
///     ranged: Some(RangedConfig(
///         can_fallback_melee: true,
///         fallback_melee_damage: 7.0,
///         fallback_melee_range: 1.3,
///     )),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Unique string identifier for this loadout entry.
    pub id: String,
    /// Human readable name.
    pub display_name: String,

    /// Health at spawn.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Base damage per regular attack.
    #[serde(with = "fixed_serde")]
    pub attack_damage: Fixed,
    /// Reach of regular attacks.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Attacks per second.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,
    /// Movement speed in units per second.
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,

    /// Probability in `[0, 1]` that an incoming hit is dodged.
    #[serde(with = "fixed_serde")]
    pub dodge_chance: Fixed,
    /// Damage spread in `[0, 0.5]`.
    #[serde(with = "fixed_serde")]
    pub damage_random_percent: Fixed,
    /// Cooldown spread in `[0, 0.5]`.
    #[serde(with = "fixed_serde")]
    pub attack_speed_random_percent: Fixed,

    /// Ranged-only parameters.
    pub ranged: Option<RangedConfig>,
    /// Commander-only parameters.
    pub commander: Option<CommanderConfig>,

    /// Army value used by balance reports.
    pub cost: u32,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            id: "melee".to_string(),
            display_name: String::new(),
            max_health: Fixed::from_num(150),
            attack_damage: Fixed::from_num(15),
            attack_range: Fixed::from_num(1.6),
            attack_speed: Fixed::from_num(1.2),
            move_speed: Fixed::from_num(4),
            dodge_chance: Fixed::from_num(0.05),
            damage_random_percent: Fixed::from_num(0.1),
            attack_speed_random_percent: Fixed::from_num(0.05),
            ranged: None,
            commander: None,
            cost: 1,
        }
    }
}

impl UnitConfig {
    /// Default melee loadout entry.
    #[must_use]
    pub fn melee() -> Self {
        Self::default()
    }

    /// Default ranged loadout entry.
    #[must_use]
    pub fn ranged() -> Self {
        Self {
            id: "ranged".to_string(),
            max_health: Fixed::from_num(90),
            attack_damage: Fixed::from_num(12),
            attack_range: Fixed::from_num(14),
            attack_speed: Fixed::from_num(0.8),
            move_speed: Fixed::from_num(3.5),
            ranged: Some(RangedConfig::default()),
            cost: 2,
            ..Self::default()
        }
    }

    /// Default commander loadout entry.
    #[must_use]
    pub fn commander() -> Self {
        Self {
            id: "commander".to_string(),
            max_health: Fixed::from_num(600),
            attack_damage: Fixed::from_num(35),
            attack_range: Fixed::from_num(2.2),
            attack_speed: Fixed::from_num(0.9),
            move_speed: Fixed::from_num(3.5),
            commander: Some(CommanderConfig::default()),
            cost: 10,
            ..Self::default()
        }
    }

    /// Parse a config from RON text.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| BattleError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Seconds between attacks before randomization, never dividing by zero.
    #[must_use]
    pub fn base_attack_interval(&self) -> Fixed {
        Fixed::ONE / self.attack_speed.max(crate::math::MIN_DENOMINATOR)
    }

    /// Check that this config can drive a unit of `class`.
    pub fn validate_for(&self, class: UnitClass) -> Result<()> {
        self.check(
            "max_health",
            self.max_health > Fixed::ZERO,
            "must be positive",
        )?;
        self.check(
            "attack_damage",
            self.attack_damage >= Fixed::ZERO,
            "must not be negative",
        )?;
        self.check(
            "attack_range",
            self.attack_range >= Fixed::ZERO,
            "must not be negative",
        )?;
        self.check(
            "attack_speed",
            self.attack_speed >= Fixed::ZERO,
            "must not be negative",
        )?;
        self.check(
            "move_speed",
            self.move_speed >= Fixed::ZERO,
            "must not be negative",
        )?;
        self.check(
            "dodge_chance",
            self.dodge_chance >= Fixed::ZERO && self.dodge_chance <= Fixed::ONE,
            "must be within [0, 1]",
        )?;
        let half = Fixed::from_num(0.5);
        self.check(
            "damage_random_percent",
            self.damage_random_percent >= Fixed::ZERO && self.damage_random_percent <= half,
            "must be within [0, 0.5]",
        )?;
        self.check(
            "attack_speed_random_percent",
            self.attack_speed_random_percent >= Fixed::ZERO
                && self.attack_speed_random_percent <= half,
            "must be within [0, 0.5]",
        )?;

        match class {
            UnitClass::Melee => Ok(()),
            UnitClass::Ranged => {
                let Some(ranged) = &self.ranged else {
                    return self.check("ranged", false, "block is required for ranged units");
                };
                self.check_non_negative(&[
                    ("ranged.fallback_melee_damage", ranged.fallback_melee_damage),
                    ("ranged.fallback_melee_range", ranged.fallback_melee_range),
                ])
            }
            UnitClass::Commander => {
                let Some(commander) = &self.commander else {
                    return self.check("commander", false, "block is required for commanders");
                };
                self.check_non_negative(&[
                    ("commander.slam_damage", commander.slam_damage),
                    ("commander.slam_radius", commander.slam_radius),
                    ("commander.slam_cooldown", commander.slam_cooldown),
                    ("commander.charge_damage", commander.charge_damage),
                    ("commander.charge_distance", commander.charge_distance),
                    ("commander.charge_speed", commander.charge_speed),
                    ("commander.charge_radius", commander.charge_radius),
                    ("commander.charge_cooldown", commander.charge_cooldown),
                    (
                        "commander.charge_knockback_distance",
                        commander.charge_knockback_distance,
                    ),
                ])
            }
        }
    }

    fn check_non_negative(&self, fields: &[(&'static str, Fixed)]) -> Result<()> {
        for &(field, value) in fields {
            self.check(field, value >= Fixed::ZERO, "must not be negative")?;
        }
        Ok(())
    }

    fn check(&self, field: &'static str, ok: bool, reason: &str) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(BattleError::InvalidConfig {
                config_id: self.id.clone(),
                field,
                reason: reason.to_string(),
            })
        }
    }
}

/// The three configs one team fields, as loaded from data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadoutData {
    /// Melee entry.
    pub melee: UnitConfig,
    /// Ranged entry.
    pub ranged: UnitConfig,
    /// Commander entry.
    pub commander: UnitConfig,
}

impl Default for LoadoutData {
    fn default() -> Self {
        Self {
            melee: UnitConfig::melee(),
            ranged: UnitConfig::ranged(),
            commander: UnitConfig::commander(),
        }
    }
}

/// Shared, validated loadout handed to spawn requests.
#[derive(Debug, Clone)]
pub struct Loadout {
    /// Melee entry.
    pub melee: Arc<UnitConfig>,
    /// Ranged entry.
    pub ranged: Arc<UnitConfig>,
    /// Commander entry.
    pub commander: Arc<UnitConfig>,
}

impl Loadout {
    /// Validate loaded data and wrap each entry for sharing.
    pub fn from_data(data: LoadoutData) -> Result<Self> {
        data.melee.validate_for(UnitClass::Melee)?;
        data.ranged.validate_for(UnitClass::Ranged)?;
        data.commander.validate_for(UnitClass::Commander)?;
        Ok(Self {
            melee: Arc::new(data.melee),
            ranged: Arc::new(data.ranged),
            commander: Arc::new(data.commander),
        })
    }

    /// Parse and validate a loadout from RON text.
    pub fn from_ron(source_name: &str, text: &str) -> Result<Self> {
        let data: LoadoutData = ron::from_str(text).map_err(|e| BattleError::DataParseError {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })?;
        Self::from_data(data)
    }

    /// Built-in loadout using each class's default stats.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            melee: Arc::new(UnitConfig::melee()),
            ranged: Arc::new(UnitConfig::ranged()),
            commander: Arc::new(UnitConfig::commander()),
        }
    }

    /// Config for a class.
    #[must_use]
    pub fn for_class(&self, class: UnitClass) -> Arc<UnitConfig> {
        match class {
            UnitClass::Melee => Arc::clone(&self.melee),
            UnitClass::Ranged => Arc::clone(&self.ranged),
            UnitClass::Commander => Arc::clone(&self.commander),
        }
    }
}
