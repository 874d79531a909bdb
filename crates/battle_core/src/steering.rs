//! Movement direction composition.
//!
//! A moving unit combines two vectors: an approach vector toward its target
//! (with a tangential orbit component for melee units closing the last few
//! meters) and a separation vector pushing it away from close neighbors.
//! Everything is on the ground plane, so separation never has a vertical
//! component.

use crate::components::{Team, UnitClass, UnitId};
use crate::data::{BattleSettings, SeparationSettings};
use crate::math::{Fixed, Vec2Fixed, MIN_DISTANCE_SQ};
use crate::spatial::{QueryFilter, SpatialIndex, TeamFilter};

/// Steering behavior for one unit class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringPolicy {
    /// Whether to circle the target when close.
    pub orbit: bool,
    /// Orbiting starts inside this multiple of attack range.
    pub orbit_threshold_multiplier: Fixed,
    /// Weight of the tangential component.
    pub orbit_weight: Fixed,
    /// Neighbor push-away parameters.
    pub separation: SeparationSettings,
}

impl SteeringPolicy {
    /// Policy for a class under the given battle settings.
    #[must_use]
    pub const fn for_class(class: UnitClass, settings: &BattleSettings) -> Self {
        let class_settings = settings.class(class);
        Self {
            orbit: class_settings.orbit,
            orbit_threshold_multiplier: settings.orbit_threshold_multiplier,
            orbit_weight: settings.orbit_weight,
            separation: class_settings.separation,
        }
    }

    /// Unit-length approach direction from `from` toward `target`.
    ///
    /// Inside the orbit band (outside attack range but within the orbit
    /// threshold) the direction bends sideways. The side comes from the
    /// sign of `surround_bias`, so a unit always circles the same way.
    #[must_use]
    pub fn approach_direction(
        &self,
        from: Vec2Fixed,
        target: Vec2Fixed,
        attack_range: Fixed,
        surround_bias: Fixed,
    ) -> Vec2Fixed {
        let offset = target - from;
        let dist_sq = offset.length_squared();
        if dist_sq <= MIN_DISTANCE_SQ {
            return Vec2Fixed::ZERO;
        }
        let to_target = offset.normalize();
        if !self.orbit {
            return to_target;
        }

        let threshold = attack_range * self.orbit_threshold_multiplier;
        let in_band = dist_sq < threshold.saturating_mul(threshold)
            && dist_sq > attack_range.saturating_mul(attack_range);
        if !in_band {
            return to_target;
        }

        let side = if surround_bias < Fixed::ZERO {
            -Fixed::ONE
        } else {
            Fixed::ONE
        };
        let tangent = to_target.perpendicular().scale(side * self.orbit_weight);
        (to_target + tangent).normalize()
    }

    /// Separation vector for a unit at `position`, read from the index.
    #[must_use]
    pub fn separation_from_index(
        &self,
        index: &SpatialIndex,
        id: UnitId,
        team: Team,
        position: Vec2Fixed,
    ) -> Vec2Fixed {
        let team_filter = if self.separation.include_enemies {
            TeamFilter::Any
        } else {
            TeamFilter::Only(team)
        };
        let filter = QueryFilter {
            team: team_filter,
            class: None,
            exclude: Some(id),
        };
        let mut neighbors = Vec::new();
        index.query_into(position, self.separation.radius, &filter, &mut neighbors);

        separation_vector(
            position,
            neighbors.iter().filter_map(|&other| index.position(other)),
            self.separation.radius,
            self.separation.strength,
        )
    }

    /// Final travel direction: normalized sum of approach and separation.
    #[must_use]
    pub fn combine(approach: Vec2Fixed, separation: Vec2Fixed) -> Vec2Fixed {
        if separation.length_squared() <= MIN_DISTANCE_SQ {
            return approach;
        }
        (approach + separation).normalize()
    }
}

/// Inverse-square push away from neighbors strictly inside `radius`.
///
/// Each neighbor contributes `(position - neighbor) / |position - neighbor|²`;
/// the average is normalized and scaled by `strength`. Coincident neighbors
/// are skipped. Returns zero when nothing contributes.
#[must_use]
pub fn separation_vector<I>(position: Vec2Fixed, neighbors: I, radius: Fixed, strength: Fixed) -> Vec2Fixed
where
    I: IntoIterator<Item = Vec2Fixed>,
{
    let radius_sq = radius.saturating_mul(radius);
    let mut sum = Vec2Fixed::ZERO;
    let mut count = 0i32;

    for neighbor in neighbors {
        let away = position - neighbor;
        let dist_sq = away.length_squared();
        if dist_sq >= radius_sq || dist_sq <= MIN_DISTANCE_SQ {
            continue;
        }
        sum += Vec2Fixed::new(away.x / dist_sq, away.y / dist_sq);
        count += 1;
    }

    if count == 0 {
        return Vec2Fixed::ZERO;
    }
    let average = Vec2Fixed::new(sum.x / Fixed::from_num(count), sum.y / Fixed::from_num(count));
    average.normalize().scale(strength)
}

/// Displacement for one tick of travel.
#[must_use]
pub fn displacement(direction: Vec2Fixed, move_speed: Fixed, dt: Fixed) -> Vec2Fixed {
    direction.scale(move_speed * dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Fixed, b: f64) -> bool {
        (a.to_num::<f64>() - b).abs() < 1e-3
    }

    #[test]
    fn test_far_target_is_approached_directly() {
        let policy = SteeringPolicy::for_class(UnitClass::Melee, &BattleSettings::default());
        let dir = policy.approach_direction(
            Vec2Fixed::ZERO,
            Vec2Fixed::from_f64(10.0, 0.0),
            Fixed::from_num(1.6),
            Fixed::from_num(0.5),
        );
        assert!(close(dir.x, 1.0));
        assert!(close(dir.y, 0.0));
    }

    #[test]
    fn test_orbit_band_bends_toward_bias_side() {
        let policy = SteeringPolicy::for_class(UnitClass::Melee, &BattleSettings::default());
        let target = Vec2Fixed::from_f64(2.0, 0.0);
        let range = Fixed::from_num(1.6);

        let left = policy.approach_direction(Vec2Fixed::ZERO, target, range, Fixed::from_num(0.3));
        let right = policy.approach_direction(Vec2Fixed::ZERO, target, range, Fixed::from_num(-0.3));

        assert!(left.x > Fixed::ZERO && right.x > Fixed::ZERO);
        assert!(left.y > Fixed::ZERO);
        assert!(right.y < Fixed::ZERO);
        assert!(close(left.length(), 1.0));
    }

    #[test]
    fn test_ranged_never_orbits() {
        let policy = SteeringPolicy::for_class(UnitClass::Ranged, &BattleSettings::default());
        let dir = policy.approach_direction(
            Vec2Fixed::ZERO,
            Vec2Fixed::from_f64(0.0, 15.0),
            Fixed::from_num(14),
            Fixed::ONE,
        );
        assert!(close(dir.x, 0.0));
        assert!(close(dir.y, 1.0));
    }

    #[test]
    fn test_separation_pushes_away_and_has_strength_length() {
        let sep = separation_vector(
            Vec2Fixed::ZERO,
            [Vec2Fixed::from_f64(0.5, 0.0), Vec2Fixed::from_f64(5.0, 0.0)],
            Fixed::from_num(0.8),
            Fixed::from_num(0.5),
        );
        assert!(close(sep.x, -0.5));
        assert!(close(sep.y, 0.0));
    }

    #[test]
    fn test_separation_skips_coincident_and_empty() {
        let sep = separation_vector(
            Vec2Fixed::ZERO,
            [Vec2Fixed::ZERO],
            Fixed::ONE,
            Fixed::ONE,
        );
        assert!(sep.is_zero());
    }

    #[test]
    fn test_separation_from_index_respects_team_setting() {
        let settings = BattleSettings::default();
        let mut index = SpatialIndex::new(settings.grid_cell_size);
        index.insert(1, Team::Cube, UnitClass::Ranged, Vec2Fixed::ZERO);
        index.insert(2, Team::Sphere, UnitClass::Melee, Vec2Fixed::from_f64(0.5, 0.0));

        let ranged = SteeringPolicy::for_class(UnitClass::Ranged, &settings);
        assert!(ranged
            .separation_from_index(&index, 1, Team::Cube, Vec2Fixed::ZERO)
            .is_zero());

        let commander = SteeringPolicy::for_class(UnitClass::Commander, &settings);
        let push = commander.separation_from_index(&index, 1, Team::Cube, Vec2Fixed::ZERO);
        assert!(push.x < Fixed::ZERO);
    }

    #[test]
    fn test_combine_without_separation_keeps_approach() {
        let approach = Vec2Fixed::from_f64(1.0, 0.0);
        assert_eq!(SteeringPolicy::combine(approach, Vec2Fixed::ZERO), approach);
        let blended = SteeringPolicy::combine(approach, Vec2Fixed::from_f64(0.0, 1.0));
        assert!(close(blended.length(), 1.0));
        assert!(close(blended.x, blended.y.to_num::<f64>()));
    }
}
