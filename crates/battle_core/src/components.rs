//! Unit state definitions.
//!
//! A unit is one [`UnitState`] record in the world's arena. Behavior lives in
//! the policy modules; this module only holds data and the few invariants
//! that belong to the data itself (clamped timers, one-way health).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ability::AbilitySequence;
use crate::data::UnitConfig;
use crate::math::{Fixed, Vec2Fixed};

/// Unique identifier for units. Assigned sequentially from 1, never reused.
pub type UnitId = u64;

/// One of the two opposing factions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// Team A.
    Cube,
    /// Team B.
    Sphere,
}

impl Team {
    /// The opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Cube => Self::Sphere,
            Self::Sphere => Self::Cube,
        }
    }

    /// Both teams in roster order.
    pub const ALL: [Self; 2] = [Self::Cube, Self::Sphere];
}

/// Unit archetype. Selects targeting, combat and ability behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitClass {
    /// Close-combat infantry.
    Melee,
    /// Archer firing arcing projectiles, with a melee fallback.
    Ranged,
    /// Heavy unit with a team-specific special ability.
    Commander,
}

impl UnitClass {
    /// Lowercase name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Melee => "melee",
            Self::Ranged => "ranged",
            Self::Commander => "commander",
        }
    }
}

impl fmt::Display for UnitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a unit did during its last update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitActivity {
    /// No target, or halted behind a crowd.
    #[default]
    Idle,
    /// Closing in on a target.
    Moving,
    /// Struck or fired this tick.
    Attacking,
    /// In range, waiting for the attack timer.
    OnCooldown,
    /// Running a commander ability sequence.
    UsingAbility,
}

/// Outcome of subtracting health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthChange {
    /// Unit survived.
    Damaged,
    /// Health reached zero on this hit.
    Killed,
    /// Unit was already dead; nothing changed.
    AlreadyDead,
}

/// Per-unit mutable simulation state.
#[derive(Debug, Clone)]
pub struct UnitState {
    /// Arena key.
    pub id: UnitId,
    /// Faction, fixed at spawn.
    pub team: Team,
    /// Archetype, fixed at spawn.
    pub class: UnitClass,
    /// Shared stat block.
    pub config: Arc<UnitConfig>,

    /// Ground-plane position.
    pub position: Vec2Fixed,
    /// Vertical offset above the ground (slam hop).
    pub height: Fixed,
    /// Unit-length heading on the ground plane.
    pub facing: Vec2Fixed,

    /// Current health. Never increases.
    pub health: Fixed,
    /// Seconds until the next attack is allowed.
    pub attack_timer: Fixed,
    /// Last update's activity.
    pub activity: UnitActivity,
    /// Seconds until the commander ability is ready again.
    pub ability_cooldown: Fixed,
    /// Ability sequence in progress.
    pub ability: Option<AbilitySequence>,
    /// Current target, resolved by id each tick.
    pub current_target: Option<UnitId>,
    /// Cleared exactly once when health first reaches zero.
    pub alive: bool,

    /// Orbit side preference in `[-1, 1]`, fixed at spawn.
    pub surround_bias: Fixed,
    /// Seconds until the next target re-evaluation.
    pub target_search_timer: Fixed,
    /// Seconds until the cached separation vector is recomputed.
    pub separation_timer: Fixed,
    /// Last computed separation vector.
    pub cached_separation: Vec2Fixed,
    /// Seconds until the crowd check is repeated.
    pub crowd_check_timer: Fixed,
    /// Result of the last crowd check.
    pub crowded: bool,
    /// Target a ranged unit is fighting hand to hand.
    pub melee_mode_target: Option<UnitId>,
}

impl UnitState {
    /// Whether the unit still participates in the battle.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Whether `other` is a live unit on the opposing team.
    #[must_use]
    pub fn is_valid_enemy(&self, other: &Self) -> bool {
        other.alive && other.team != self.team && other.id != self.id
    }

    /// Advance every countdown by `dt`, clamping at zero.
    pub fn tick_timers(&mut self, dt: Fixed) {
        self.attack_timer = (self.attack_timer - dt).max(Fixed::ZERO);
        self.ability_cooldown = (self.ability_cooldown - dt).max(Fixed::ZERO);
        self.target_search_timer = (self.target_search_timer - dt).max(Fixed::ZERO);
        self.separation_timer = (self.separation_timer - dt).max(Fixed::ZERO);
        self.crowd_check_timer = (self.crowd_check_timer - dt).max(Fixed::ZERO);
    }

    /// Subtract health. Negative amounts are ignored so health never rises.
    pub fn take_damage(&mut self, amount: Fixed) -> HealthChange {
        if !self.alive {
            return HealthChange::AlreadyDead;
        }

        self.health -= amount.max(Fixed::ZERO);
        if self.health <= Fixed::ZERO {
            self.alive = false;
            self.ability = None;
            self.current_target = None;
            self.activity = UnitActivity::Idle;
            HealthChange::Killed
        } else {
            HealthChange::Damaged
        }
    }
}
