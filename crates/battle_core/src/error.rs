//! Error types for the battle simulation.
//!
//! Errors only occur at the setup boundary (spawning, loading configuration).
//! Once a unit is in the world, every tick is infallible: stale references
//! and degenerate numbers are handled in place.

use thiserror::Error;

use crate::components::UnitId;

/// Result type alias using [`BattleError`].
pub type Result<T> = std::result::Result<T, BattleError>;

/// Top-level error type for battle simulation setup errors.
#[derive(Debug, Error)]
pub enum BattleError {
    /// A spawn request arrived without a unit configuration.
    #[error("Spawn request for {class} unit has no configuration")]
    MissingConfig {
        /// Class of the unit that was requested.
        class: &'static str,
    },

    /// A configuration value is outside its valid range or a class block is missing.
    #[error("Invalid unit configuration '{config_id}': {field} {reason}")]
    InvalidConfig {
        /// Identifier of the offending config.
        config_id: String,
        /// Field that failed validation.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Invalid unit identifier.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Data parsing error.
    #[error("Failed to parse data '{source_name}': {message}")]
    DataParseError {
        /// Name of the data source (file name or label).
        source_name: String,
        /// Error message.
        message: String,
    },
}
