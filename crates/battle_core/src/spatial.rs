//! Proximity queries over live units.
//!
//! A uniform hash grid keyed by integer cell coordinates. Units are
//! re-bucketed whenever they move and dropped the moment they die, so a
//! query never returns a dead unit. Distance tests are exact (squared
//! distance against the stored position); the grid only narrows the
//! candidate set.
//!
//! Very large radii fall back to a scan of every entry in id order, which is
//! cheaper than walking thousands of empty cells.

use std::collections::{BTreeMap, HashMap};

use crate::components::{Team, UnitClass, UnitId};
use crate::math::{Fixed, Vec2Fixed};

/// Which teams a query accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamFilter {
    /// Both teams.
    Any,
    /// Only members of this team.
    Only(Team),
}

impl TeamFilter {
    const fn accepts(self, team: Team) -> bool {
        match self {
            Self::Any => true,
            Self::Only(wanted) => matches!(
                (wanted, team),
                (Team::Cube, Team::Cube) | (Team::Sphere, Team::Sphere)
            ),
        }
    }
}

/// Full query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFilter {
    /// Team restriction.
    pub team: TeamFilter,
    /// Class restriction.
    pub class: Option<UnitClass>,
    /// Unit to leave out (usually the one asking).
    pub exclude: Option<UnitId>,
}

impl QueryFilter {
    /// Accept members of one team.
    #[must_use]
    pub const fn team(team: Team) -> Self {
        Self {
            team: TeamFilter::Only(team),
            class: None,
            exclude: None,
        }
    }

    /// Restrict to a class.
    #[must_use]
    pub const fn with_class(mut self, class: UnitClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Leave out one unit.
    #[must_use]
    pub const fn excluding(mut self, id: UnitId) -> Self {
        self.exclude = Some(id);
        self
    }

    fn accepts(&self, id: UnitId, entry: &Entry) -> bool {
        if self.exclude == Some(id) {
            return false;
        }
        if !self.team.accepts(entry.team) {
            return false;
        }
        match self.class {
            Some(class) => class == entry.class,
            None => true,
        }
    }
}

type Cell = (i32, i32);

#[derive(Debug, Clone, Copy)]
struct Entry {
    position: Vec2Fixed,
    team: Team,
    class: UnitClass,
    cell: Cell,
}

/// Hash-grid index of live units.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: Fixed,
    cells: HashMap<Cell, Vec<UnitId>>,
    entries: BTreeMap<UnitId, Entry>,
}

impl SpatialIndex {
    /// Create an empty index. Non-positive cell sizes fall back to 1.
    #[must_use]
    pub fn new(cell_size: Fixed) -> Self {
        let cell_size = if cell_size > Fixed::ZERO {
            cell_size
        } else {
            Fixed::ONE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
            entries: BTreeMap::new(),
        }
    }

    fn cell_of(&self, position: Vec2Fixed) -> Cell {
        (
            (position.x / self.cell_size)
                .floor()
                .saturating_to_num::<i32>(),
            (position.y / self.cell_size)
                .floor()
                .saturating_to_num::<i32>(),
        )
    }

    /// Add a unit. Re-inserting an existing id moves it.
    pub fn insert(&mut self, id: UnitId, team: Team, class: UnitClass, position: Vec2Fixed) {
        self.remove(id);
        let cell = self.cell_of(position);
        self.cells.entry(cell).or_default().push(id);
        self.entries.insert(
            id,
            Entry {
                position,
                team,
                class,
                cell,
            },
        );
    }

    /// Record a new position for a unit already in the index.
    ///
    /// Returns `false` if the unit is not indexed (e.g. already dead).
    pub fn update(&mut self, id: UnitId, position: Vec2Fixed) -> bool {
        let new_cell = self.cell_of(position);
        let Some(entry) = self.entries.get_mut(&id) else {
            return false;
        };

        entry.position = position;
        if entry.cell != new_cell {
            let old_cell = entry.cell;
            entry.cell = new_cell;
            if let Some(bucket) = self.cells.get_mut(&old_cell) {
                bucket.retain(|&other| other != id);
                if bucket.is_empty() {
                    self.cells.remove(&old_cell);
                }
            }
            self.cells.entry(new_cell).or_default().push(id);
        }
        true
    }

    /// Drop a unit. Returns whether it was present.
    pub fn remove(&mut self, id: UnitId) -> bool {
        let Some(entry) = self.entries.remove(&id) else {
            return false;
        };
        if let Some(bucket) = self.cells.get_mut(&entry.cell) {
            bucket.retain(|&other| other != id);
            if bucket.is_empty() {
                self.cells.remove(&entry.cell);
            }
        }
        true
    }

    /// Whether a unit is indexed.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Indexed position of a unit.
    #[must_use]
    pub fn position(&self, id: UnitId) -> Option<Vec2Fixed> {
        self.entries.get(&id).map(|entry| entry.position)
    }

    /// Number of indexed units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All live units of `team_filter` within `radius` of `center`.
    ///
    /// Each qualifying id appears exactly once. `exclude` leaves out the
    /// querying unit.
    #[must_use]
    pub fn query_radius(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        team_filter: TeamFilter,
        exclude: Option<UnitId>,
    ) -> Vec<UnitId> {
        let filter = QueryFilter {
            team: team_filter,
            class: None,
            exclude,
        };
        let mut out = Vec::new();
        self.query_into(center, radius, &filter, &mut out);
        out
    }

    /// Filtered radius query writing into a reusable buffer.
    ///
    /// Clears `out` before populating it.
    pub fn query_into(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        filter: &QueryFilter,
        out: &mut Vec<UnitId>,
    ) {
        out.clear();
        self.visit(center, radius, filter, |id, _, _| out.push(id));
    }

    /// Number of units matching `filter` within `radius`.
    #[must_use]
    pub fn count_within(&self, center: Vec2Fixed, radius: Fixed, filter: &QueryFilter) -> usize {
        let mut count = 0;
        self.visit(center, radius, filter, |_, _, _| count += 1);
        count
    }

    /// Closest unit matching `filter` within `radius`.
    ///
    /// Ties on squared distance go to the lowest id.
    #[must_use]
    pub fn nearest(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        filter: &QueryFilter,
    ) -> Option<(UnitId, Vec2Fixed)> {
        let mut best: Option<(UnitId, Vec2Fixed, Fixed)> = None;
        self.visit(center, radius, filter, |id, position, dist_sq| {
            let better = match best {
                None => true,
                Some((best_id, _, best_dist)) => {
                    dist_sq < best_dist || (dist_sq == best_dist && id < best_id)
                }
            };
            if better {
                best = Some((id, position, dist_sq));
            }
        });
        best.map(|(id, position, _)| (id, position))
    }

    /// Call `f(id, position, dist_sq)` for every match.
    fn visit<F>(&self, center: Vec2Fixed, radius: Fixed, filter: &QueryFilter, mut f: F)
    where
        F: FnMut(UnitId, Vec2Fixed, Fixed),
    {
        if radius < Fixed::ZERO || self.entries.is_empty() {
            return;
        }
        let radius_sq = radius.saturating_mul(radius);

        let mut check = |id: UnitId, entry: &Entry| {
            if !filter.accepts(id, entry) {
                return;
            }
            let dist_sq = entry.position.distance_squared(center);
            if dist_sq <= radius_sq {
                f(id, entry.position, dist_sq);
            }
        };

        let min = self.cell_of(Vec2Fixed::new(
            center.x.saturating_sub(radius),
            center.y.saturating_sub(radius),
        ));
        let max = self.cell_of(Vec2Fixed::new(
            center.x.saturating_add(radius),
            center.y.saturating_add(radius),
        ));
        let span_x = i64::from(max.0) - i64::from(min.0) + 1;
        let span_y = i64::from(max.1) - i64::from(min.1) + 1;
        let cells_in_box = span_x.saturating_mul(span_y);

        if cells_in_box > self.cells.len() as i64 {
            for (&id, entry) in &self.entries {
                check(id, entry);
            }
            return;
        }

        for row in min.1..=max.1 {
            for col in min.0..=max.0 {
                let Some(bucket) = self.cells.get(&(col, row)) else {
                    continue;
                };
                for &id in bucket {
                    if let Some(entry) = self.entries.get(&id) {
                        check(id, entry);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: f64, y: f64) -> Vec2Fixed {
        Vec2Fixed::from_f64(x, y)
    }

    fn index_with(units: &[(UnitId, Team, f64, f64)]) -> SpatialIndex {
        let mut index = SpatialIndex::new(Fixed::from_num(4));
        for &(id, team, x, y) in units {
            index.insert(id, team, UnitClass::Melee, pos(x, y));
        }
        index
    }

    #[test]
    fn test_query_radius_filters_by_team_and_distance() {
        let index = index_with(&[
            (1, Team::Cube, 0.0, 0.0),
            (2, Team::Sphere, 3.0, 0.0),
            (3, Team::Sphere, 10.0, 0.0),
            (4, Team::Cube, 1.0, 1.0),
        ]);

        let mut found = index.query_radius(
            pos(0.0, 0.0),
            Fixed::from_num(5),
            TeamFilter::Only(Team::Sphere),
            None,
        );
        found.sort_unstable();
        assert_eq!(found, vec![2]);

        let mut all = index.query_radius(pos(0.0, 0.0), Fixed::from_num(5), TeamFilter::Any, Some(1));
        all.sort_unstable();
        assert_eq!(all, vec![2, 4]);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let index = index_with(&[(1, Team::Cube, 5.0, 0.0)]);
        let found = index.query_radius(pos(0.0, 0.0), Fixed::from_num(5), TeamFilter::Any, None);
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn test_removed_units_are_not_returned() {
        let mut index = index_with(&[(1, Team::Cube, 0.0, 0.0), (2, Team::Cube, 1.0, 0.0)]);
        assert!(index.remove(1));
        assert!(!index.remove(1));
        let found = index.query_radius(pos(0.0, 0.0), Fixed::from_num(3), TeamFilter::Any, None);
        assert_eq!(found, vec![2]);
    }

    #[test]
    fn test_update_moves_between_cells() {
        let mut index = index_with(&[(1, Team::Cube, 0.0, 0.0)]);
        assert!(index.update(1, pos(21.0, -13.0)));

        let near_origin =
            index.query_radius(pos(0.0, 0.0), Fixed::from_num(2), TeamFilter::Any, None);
        assert!(near_origin.is_empty());

        let near_new =
            index.query_radius(pos(20.0, -13.0), Fixed::from_num(2), TeamFilter::Any, None);
        assert_eq!(near_new, vec![1]);
        assert!(!index.update(99, pos(0.0, 0.0)));
    }

    #[test]
    fn test_large_radius_matches_grid_walk() {
        let units: Vec<(UnitId, Team, f64, f64)> = (1..=40)
            .map(|i| {
                let team = if i % 2 == 0 { Team::Cube } else { Team::Sphere };
                (i, team, (i as f64) * 1.7 - 30.0, (i as f64 * 0.9) % 11.0)
            })
            .collect();
        let index = index_with(&units);

        // Small radius walks cells, huge radius scans entries; both must agree
        // with a brute-force distance check.
        for radius in [3.0, 12.0, 5000.0] {
            let mut found = index.query_radius(
                pos(0.0, 0.0),
                Fixed::from_num(radius),
                TeamFilter::Any,
                None,
            );
            found.sort_unstable();
            let r_sq = Fixed::from_num(radius) * Fixed::from_num(radius);
            let expected: Vec<UnitId> = units
                .iter()
                .filter(|(_, _, x, y)| pos(*x, *y).distance_squared(pos(0.0, 0.0)) <= r_sq)
                .map(|(id, _, _, _)| *id)
                .collect();
            assert_eq!(found, expected, "radius {radius}");
        }
    }

    #[test]
    fn test_nearest_breaks_ties_by_lowest_id() {
        let index = index_with(&[
            (7, Team::Sphere, 2.0, 0.0),
            (3, Team::Sphere, -2.0, 0.0),
            (5, Team::Sphere, 0.0, 2.0),
        ]);
        let (id, _) = index
            .nearest(pos(0.0, 0.0), Fixed::from_num(10), &QueryFilter::team(Team::Sphere))
            .unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn test_class_filter_and_count() {
        let mut index = SpatialIndex::new(Fixed::from_num(2));
        index.insert(1, Team::Cube, UnitClass::Melee, pos(0.0, 0.0));
        index.insert(2, Team::Cube, UnitClass::Ranged, pos(0.5, 0.0));
        index.insert(3, Team::Cube, UnitClass::Melee, pos(0.0, 0.5));

        let filter = QueryFilter::team(Team::Cube)
            .with_class(UnitClass::Melee)
            .excluding(1);
        assert_eq!(index.count_within(pos(0.0, 0.0), Fixed::ONE, &filter), 1);
    }
}
