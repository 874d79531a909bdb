//! Presentation events.
//!
//! The simulation never calls out to animation, audio or effects code. It
//! records what happened during a tick as [`BattleEvent`]s and hands them back
//! from [`BattleWorld::tick`](crate::simulation::BattleWorld::tick). Nothing
//! in an event feeds back into the simulation.

use crate::ability::AbilityKind;
use crate::combat::AttackStyle;
use crate::components::{Team, UnitClass, UnitId};
use crate::math::{Fixed, Vec2Fixed, Vec3Fixed};
use crate::projectile::ProjectileId;

/// Something observable that happened during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleEvent {
    /// A unit swung or fired.
    AttackPerformed {
        /// Attacker.
        attacker: UnitId,
        /// Intended victim.
        target: UnitId,
        /// Kind of strike.
        style: AttackStyle,
        /// Attacker position.
        position: Vec2Fixed,
    },
    /// An incoming hit was dodged.
    AttackDodged {
        /// Unit that dodged.
        target: UnitId,
        /// Attacker, if known.
        source: Option<UnitId>,
    },
    /// A unit lost health.
    HitTaken {
        /// Damaged unit.
        target: UnitId,
        /// Attacker, if known.
        source: Option<UnitId>,
        /// Health removed.
        damage: Fixed,
        /// Health left (zero or below on a kill).
        remaining_health: Fixed,
        /// Where the damaged unit stood.
        position: Vec2Fixed,
    },
    /// A unit died. Emitted exactly once per unit.
    Death {
        /// Dead unit.
        unit: UnitId,
        /// Its team.
        team: Team,
        /// Its class.
        class: UnitClass,
        /// Where it fell.
        position: Vec2Fixed,
        /// Unit that dealt the killing blow, if known.
        killer: Option<UnitId>,
    },
    /// A commander started an ability sequence.
    AbilityTriggered {
        /// Commander.
        unit: UnitId,
        /// Ability started.
        kind: AbilityKind,
        /// Commander position at the start.
        position: Vec2Fixed,
    },
    /// An ability sequence resolved its damage step.
    AbilityImpact {
        /// Commander.
        unit: UnitId,
        /// Ability resolved.
        kind: AbilityKind,
        /// Center of the damage area.
        center: Vec2Fixed,
        /// Radius of the damage area.
        radius: Fixed,
        /// Enemies that took damage.
        hits: u32,
    },
    /// A unit was shoved by an ability.
    Knockback {
        /// Displaced unit.
        unit: UnitId,
        /// Position before.
        from: Vec2Fixed,
        /// Position after.
        to: Vec2Fixed,
    },
    /// A projectile left the bow.
    ProjectileLaunched {
        /// Pool slot.
        projectile: ProjectileId,
        /// Shooter.
        source: UnitId,
        /// Release point.
        origin: Vec3Fixed,
        /// Aim point.
        destination: Vec3Fixed,
        /// Seconds until arrival.
        travel_time: Fixed,
    },
    /// A projectile came down.
    ProjectileImpact {
        /// Pool slot (already free again).
        projectile: ProjectileId,
        /// Shooter.
        source: UnitId,
        /// Impact point.
        position: Vec3Fixed,
        /// Unit hit, if any.
        hit: Option<UnitId>,
    },
}

/// Everything that happened in one tick, in the order it happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Events in emission order.
    pub events: Vec<BattleEvent>,
}

impl TickEvents {
    /// Record an event.
    pub fn push(&mut self, event: BattleEvent) {
        self.events.push(event);
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether nothing happened.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &BattleEvent> {
        self.events.iter()
    }

    /// Units that died this tick.
    #[must_use]
    pub fn deaths(&self) -> Vec<UnitId> {
        self.events
            .iter()
            .filter_map(|event| match event {
                BattleEvent::Death { unit, .. } => Some(*unit),
                _ => None,
            })
            .collect()
    }

    /// Total health removed this tick.
    #[must_use]
    pub fn total_damage(&self) -> Fixed {
        self.events
            .iter()
            .map(|event| match event {
                BattleEvent::HitTaken { damage, .. } => *damage,
                _ => Fixed::ZERO,
            })
            .sum()
    }
}

impl<'a> IntoIterator for &'a TickEvents {
    type Item = &'a BattleEvent;
    type IntoIter = std::slice::Iter<'a, BattleEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
