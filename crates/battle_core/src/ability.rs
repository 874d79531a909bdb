//! Commander special abilities.
//!
//! Cube commanders slam the ground, Sphere commanders charge. Both run as an
//! [`AbilitySequence`] stored on the commander and advanced once per tick:
//!
//! - Area slam: rise, fall, then damage and radial knockback around the
//!   commander.
//! - Line charge: a short step back, a dash toward the target, then damage
//!   and knockback along the dash direction around the landing point.
//!
//! While a sequence runs the commander neither moves nor attacks on its own.
//! Only the commander's death cancels a sequence; the damage step is then
//! skipped entirely.

use serde::{Deserialize, Serialize};

use crate::components::Team;
use crate::data::{AbilitySettings, CommanderConfig};
use crate::math::{ease_in_quad, ease_out_quad, Fixed, Vec2Fixed, MIN_DENOMINATOR, MIN_DISTANCE_SQ};
use crate::rng::BattleRng;

/// Which special ability a commander uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Jump and slam, hitting everything around the commander.
    AreaSlam,
    /// Dash at the target, hitting everything around the landing point.
    LineCharge,
}

impl AbilityKind {
    /// The ability a team's commanders use.
    #[must_use]
    pub const fn for_team(team: Team) -> Self {
        match team {
            Team::Cube => Self::AreaSlam,
            Team::Sphere => Self::LineCharge,
        }
    }
}

/// Slam sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlamPhase {
    /// Going up.
    Rising,
    /// Coming down.
    Falling,
}

/// Charge sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargePhase {
    /// Stepping back before the dash.
    WindBack,
    /// Dashing toward the end point.
    Dash,
}

/// An ability in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilitySequence {
    /// Area slam.
    Slam {
        /// Current sub-state.
        phase: SlamPhase,
        /// Seconds spent in the current sub-state.
        elapsed: Fixed,
    },
    /// Line charge.
    Charge {
        /// Current sub-state.
        phase: ChargePhase,
        /// Seconds spent in the current sub-state.
        elapsed: Fixed,
        /// Position when the charge started.
        start: Vec2Fixed,
        /// End of the step back.
        back: Vec2Fixed,
        /// End of the dash.
        end: Vec2Fixed,
        /// Unit-length dash direction.
        direction: Vec2Fixed,
        /// Seconds the dash takes.
        dash_time: Fixed,
    },
}

impl AbilitySequence {
    /// The ability this sequence performs.
    #[must_use]
    pub const fn kind(&self) -> AbilityKind {
        match self {
            Self::Slam { .. } => AbilityKind::AreaSlam,
            Self::Charge { .. } => AbilityKind::LineCharge,
        }
    }
}

/// How hit enemies are displaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Knockback {
    /// Straight away from the effect center.
    Radial {
        /// Push distance.
        distance: Fixed,
    },
    /// Along a fixed direction.
    Linear {
        /// Unit-length push direction.
        direction: Vec2Fixed,
        /// Push distance.
        distance: Fixed,
    },
}

impl Knockback {
    /// Displacement for a victim standing at `victim`.
    ///
    /// A victim exactly on the center is pushed in a random direction.
    pub fn displacement(&self, center: Vec2Fixed, victim: Vec2Fixed, rng: &mut BattleRng) -> Vec2Fixed {
        match *self {
            Self::Radial { distance } => {
                let away = victim - center;
                let direction = if away.length_squared() <= MIN_DISTANCE_SQ {
                    rng.ground_direction()
                } else {
                    away.normalize()
                };
                direction.scale(distance)
            }
            Self::Linear {
                direction,
                distance,
            } => direction.scale(distance),
        }
    }
}

/// Damage step of a finished sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityEffect {
    /// Ability that produced the effect.
    pub kind: AbilityKind,
    /// Center of the damage area.
    pub center: Vec2Fixed,
    /// Radius of the damage area (inclusive).
    pub radius: Fixed,
    /// Base damage per enemy before spread.
    pub damage: Fixed,
    /// Displacement applied to each enemy that takes damage.
    pub knockback: Knockback,
}

/// Result of advancing a sequence by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilityStep {
    /// Still running; the commander should be placed here.
    InProgress {
        /// Ground position.
        position: Vec2Fixed,
        /// Height above ground.
        height: Fixed,
    },
    /// Finished; apply the effect and return to normal behavior.
    Complete {
        /// Final ground position.
        position: Vec2Fixed,
        /// Damage step to run.
        effect: AbilityEffect,
    },
}

/// Trigger checks and sequencing for commander abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityController {
    settings: AbilitySettings,
}

impl AbilityController {
    /// Controller with the given timings.
    #[must_use]
    pub const fn new(settings: AbilitySettings) -> Self {
        Self { settings }
    }

    /// Radius within which an enemy makes a slam worthwhile.
    #[must_use]
    pub fn slam_trigger_radius(&self, config: &CommanderConfig) -> Fixed {
        config.slam_radius * self.settings.slam_trigger_fraction
    }

    /// Whether a target at `distance` is in the charge window.
    #[must_use]
    pub fn charge_in_window(&self, config: &CommanderConfig, distance: Fixed) -> bool {
        distance > self.settings.charge_min_distance
            && distance < config.charge_distance * Fixed::from_num(1.5)
    }

    /// Cooldown started when an ability fires.
    #[must_use]
    pub const fn cooldown(kind: AbilityKind, config: &CommanderConfig) -> Fixed {
        match kind {
            AbilityKind::AreaSlam => config.slam_cooldown,
            AbilityKind::LineCharge => config.charge_cooldown,
        }
    }

    /// Start a slam.
    #[must_use]
    pub const fn begin_slam(&self) -> AbilitySequence {
        AbilitySequence::Slam {
            phase: SlamPhase::Rising,
            elapsed: Fixed::ZERO,
        }
    }

    /// Plan a charge from `start` toward `target`.
    ///
    /// The dash stops `charge_stop_offset` short of the target, clamped to
    /// `[1, charge_distance]`. Returns `None` when the target is on top of
    /// the commander.
    #[must_use]
    pub fn begin_charge(
        &self,
        config: &CommanderConfig,
        start: Vec2Fixed,
        target: Vec2Fixed,
    ) -> Option<AbilitySequence> {
        let offset = target - start;
        if offset.length_squared() <= MIN_DISTANCE_SQ {
            return None;
        }
        let distance = offset.length();
        let direction = offset.normalize();

        let max_travel = config.charge_distance.max(Fixed::ONE);
        let travel = (distance - self.settings.charge_stop_offset).clamp(Fixed::ONE, max_travel);

        Some(AbilitySequence::Charge {
            phase: ChargePhase::WindBack,
            elapsed: Fixed::ZERO,
            start,
            back: start - direction.scale(self.settings.charge_back_distance),
            end: start + direction.scale(travel),
            direction,
            dash_time: travel / config.charge_speed.max(MIN_DENOMINATOR),
        })
    }

    /// Advance a running sequence by `dt`.
    ///
    /// Leftover time from a finished sub-state carries into the next one.
    pub fn advance(
        &self,
        sequence: &mut AbilitySequence,
        config: &CommanderConfig,
        position: Vec2Fixed,
        dt: Fixed,
    ) -> AbilityStep {
        let dt = dt.max(Fixed::ZERO);
        match sequence {
            AbilitySequence::Slam { phase, elapsed } => {
                *elapsed += dt;
                if *phase == SlamPhase::Rising && *elapsed >= self.settings.slam_rise_time {
                    *elapsed -= self.settings.slam_rise_time;
                    *phase = SlamPhase::Falling;
                }
                if *phase == SlamPhase::Falling && *elapsed >= self.settings.slam_fall_time {
                    return AbilityStep::Complete {
                        position,
                        effect: AbilityEffect {
                            kind: AbilityKind::AreaSlam,
                            center: position,
                            radius: config.slam_radius,
                            damage: config.slam_damage,
                            knockback: Knockback::Radial {
                                distance: self.settings.slam_knockback_distance,
                            },
                        },
                    };
                }

                let peak = self.settings.slam_jump_height;
                let height = match phase {
                    SlamPhase::Rising => {
                        peak * ease_out_quad(fraction(*elapsed, self.settings.slam_rise_time))
                    }
                    SlamPhase::Falling => {
                        peak * (Fixed::ONE
                            - ease_in_quad(fraction(*elapsed, self.settings.slam_fall_time)))
                    }
                };
                AbilityStep::InProgress { position, height }
            }
            AbilitySequence::Charge {
                phase,
                elapsed,
                start,
                back,
                end,
                direction,
                dash_time,
            } => {
                *elapsed += dt;
                if *phase == ChargePhase::WindBack && *elapsed >= self.settings.charge_back_time {
                    *elapsed -= self.settings.charge_back_time;
                    *phase = ChargePhase::Dash;
                }
                if *phase == ChargePhase::Dash && *elapsed >= *dash_time {
                    return AbilityStep::Complete {
                        position: *end,
                        effect: AbilityEffect {
                            kind: AbilityKind::LineCharge,
                            center: *end,
                            radius: config.charge_radius * Fixed::from_num(1.5),
                            damage: config.charge_damage,
                            knockback: Knockback::Linear {
                                direction: *direction,
                                distance: config.charge_knockback_distance,
                            },
                        },
                    };
                }

                let position = match phase {
                    ChargePhase::WindBack => start.lerp(
                        *back,
                        ease_in_quad(fraction(*elapsed, self.settings.charge_back_time)),
                    ),
                    ChargePhase::Dash => {
                        back.lerp(*end, ease_out_quad(fraction(*elapsed, *dash_time)))
                    }
                };
                AbilityStep::InProgress {
                    position,
                    height: Fixed::ZERO,
                }
            }
        }
    }
}

fn fraction(elapsed: Fixed, duration: Fixed) -> Fixed {
    if duration <= Fixed::ZERO {
        return Fixed::ONE;
    }
    (elapsed / duration).min(Fixed::ONE)
}
