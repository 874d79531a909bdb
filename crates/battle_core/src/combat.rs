//! Attack resolution.
//!
//! This module implements the per-attack rules shared by every class:
//! - Range check against squared distance
//! - Damage spread and attack-interval spread rolled from the battle RNG
//! - Dodge rolled on the target; a dodge cancels all damage
//! - Crowd limit: melee units hold back when enough allies already engage

use crate::components::{HealthChange, Team, UnitClass, UnitId, UnitState};
use crate::data::{BattleSettings, UnitConfig};
use crate::math::{Fixed, Vec2Fixed};
use crate::rng::BattleRng;
use crate::spatial::{QueryFilter, SpatialIndex};

/// Which kind of strike produced an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttackStyle {
    /// Regular melee strike.
    Melee,
    /// Ranged unit fighting hand to hand.
    FallbackMelee,
    /// Projectile release.
    Ranged,
}

/// Result of delivering damage to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// The target dodged; health unchanged.
    Dodged,
    /// Damage applied and the target survived.
    Hit {
        /// Damage actually subtracted.
        damage: Fixed,
        /// Health left.
        remaining: Fixed,
    },
    /// Damage applied and the target died on this hit.
    Killed {
        /// Damage actually subtracted.
        damage: Fixed,
    },
    /// The target was already dead or missing.
    Ignored,
}

impl DamageOutcome {
    /// Whether damage landed (the target was hit or killed).
    #[must_use]
    pub const fn landed(self) -> bool {
        matches!(self, Self::Hit { .. } | Self::Killed { .. })
    }
}

/// Stateless attack rules.
pub struct CombatResolver;

impl CombatResolver {
    /// Whether `target` is within `range` of `from` (inclusive).
    #[must_use]
    pub fn in_range(from: Vec2Fixed, target: Vec2Fixed, range: Fixed) -> bool {
        from.distance_squared(target) <= range.saturating_mul(range)
    }

    /// Whether a unit's attack timer allows a strike or shot this tick.
    #[must_use]
    pub fn attack_ready(unit: &UnitState) -> bool {
        unit.is_alive() && unit.attack_timer <= Fixed::ZERO
    }

    /// Damage after the random spread. Never negative.
    pub fn roll_damage(base: Fixed, random_percent: Fixed, rng: &mut BattleRng) -> Fixed {
        (base * rng.spread(random_percent)).max(Fixed::ZERO)
    }

    /// Seconds until the next attack: `1 / attack_speed` times the spread.
    pub fn roll_attack_interval(config: &UnitConfig, rng: &mut BattleRng) -> Fixed {
        config.base_attack_interval() * rng.spread(config.attack_speed_random_percent)
    }

    /// Deliver `amount` to `target`, rolling its dodge first.
    ///
    /// Dead targets are ignored without consuming randomness.
    pub fn resolve_hit(target: &mut UnitState, amount: Fixed, rng: &mut BattleRng) -> DamageOutcome {
        if !target.is_alive() {
            return DamageOutcome::Ignored;
        }
        if rng.roll(target.config.dodge_chance) {
            return DamageOutcome::Dodged;
        }

        let before = target.health;
        match target.take_damage(amount) {
            HealthChange::Damaged => DamageOutcome::Hit {
                damage: before - target.health,
                remaining: target.health,
            },
            HealthChange::Killed => DamageOutcome::Killed {
                damage: before - target.health,
            },
            HealthChange::AlreadyDead => DamageOutcome::Ignored,
        }
    }

    /// Whether enough same-team melee allies already crowd `target`.
    ///
    /// Counts allies (not the requester) within the requester's attack range
    /// times the crowd multiplier. A limit of zero disables the check.
    #[must_use]
    pub fn is_target_crowded(
        index: &SpatialIndex,
        requester: UnitId,
        team: Team,
        target: Vec2Fixed,
        attack_range: Fixed,
        settings: &BattleSettings,
    ) -> bool {
        let limit = settings.max_attackers_per_target;
        if limit == 0 {
            return false;
        }
        let radius = attack_range * settings.crowd_range_multiplier;
        let filter = QueryFilter::team(team)
            .with_class(UnitClass::Melee)
            .excluding(requester);
        let engaged = index.count_within(target, radius, &filter);
        engaged >= limit as usize
    }
}
