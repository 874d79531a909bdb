//! Target acquisition.
//!
//! Each class differs only in detection radius and re-evaluation cadence.
//! Selection is always "nearest live enemy by squared distance, lowest id on
//! ties", so two worlds with the same state pick the same targets.

use crate::components::{Team, UnitClass, UnitId};
use crate::data::{BattleSettings, TargetingSettings};
use crate::math::{Fixed, Vec2Fixed};
use crate::spatial::{QueryFilter, SpatialIndex};

/// Targeting behavior for one unit class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetingPolicy {
    /// Enemies farther away are never selected.
    pub detection_radius: Fixed,
    /// Seconds between routine re-evaluations.
    pub search_interval: Fixed,
}

impl TargetingPolicy {
    /// Build from explicit settings.
    #[must_use]
    pub const fn new(settings: TargetingSettings) -> Self {
        Self {
            detection_radius: settings.detection_radius,
            search_interval: settings.search_interval,
        }
    }

    /// Policy for a class under the given battle settings.
    #[must_use]
    pub const fn for_class(class: UnitClass, settings: &BattleSettings) -> Self {
        Self::new(settings.class(class).targeting)
    }

    /// Whether a unit should search again this tick.
    ///
    /// An invalid current target forces a search regardless of cadence.
    #[must_use]
    pub fn should_reacquire(&self, search_timer: Fixed, target_still_valid: bool) -> bool {
        !target_still_valid || search_timer <= Fixed::ZERO
    }

    /// Nearest live enemy of `team` within the detection radius.
    #[must_use]
    pub fn acquire(
        &self,
        index: &SpatialIndex,
        requester: UnitId,
        team: Team,
        position: Vec2Fixed,
    ) -> Option<(UnitId, Vec2Fixed)> {
        let filter = QueryFilter::team(team.opponent()).excluding(requester);
        index.nearest(position, self.detection_radius, &filter)
    }
}

/// Pick the nearest candidate to `from`, breaking ties by lowest id.
///
/// Reference selection used by property tests; [`SpatialIndex::nearest`]
/// applies the same ordering.
#[must_use]
pub fn select_nearest<I>(from: Vec2Fixed, candidates: I) -> Option<UnitId>
where
    I: IntoIterator<Item = (UnitId, Vec2Fixed)>,
{
    candidates
        .into_iter()
        .map(|(id, position)| (position.distance_squared(from), id))
        .min()
        .map(|(_, id)| id)
}
