//! Configuration data for battles.
//!
//! This module contains pure data structures that describe unit loadouts
//! and battle-wide settings. All structs deserialize from RON; parse
//! failures surface as [`BattleError::DataParseError`](crate::error::BattleError).
//!
//! **Note:** This module performs no file IO - callers read the text.

mod settings;
mod unit_config;

pub use settings::{
    AbilitySettings, BattleSettings, ClassSettings, ProjectileSettings, SeparationSettings,
    TargetingSettings,
};
pub use unit_config::{CommanderConfig, Loadout, LoadoutData, RangedConfig, UnitConfig};
