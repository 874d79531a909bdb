//! Formation layouts for spawning armies.
//!
//! The battle core only knows about single spawn requests. This module turns
//! "40 melee in a wedge" into a list of positions and spawns one unit per
//! position, the way a setup screen would.
//!
//! Offsets are in grid units: `x` runs along the team's right, `z` along its
//! forward direction. They are scaled by the spacing at spawn time.

use battle_core::components::{Team, UnitClass, UnitId};
use battle_core::data::Loadout;
use battle_core::error::Result;
use battle_core::math::Vec2Fixed;
use battle_core::simulation::{BattleWorld, SpawnRequest};

/// Default distance between neighbors in a formation.
pub const DEFAULT_SPACING: f64 = 1.5;

/// Default distance (in grid units) between the melee row and the rows
/// behind and in front of it.
pub const DEFAULT_ROW_OFFSET: f64 = 2.0;

/// Shape of a formation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FormationShape {
    /// Single rank, centered.
    #[default]
    Line,
    /// Triangle with the point forward: rows of 1, 2, 3, ...
    Wedge,
    /// Near-square grid.
    Square,
    /// Shallow 120 degree crescent.
    Arc,
}

impl FormationShape {
    /// All shapes.
    pub const ALL: [Self; 4] = [Self::Line, Self::Wedge, Self::Square, Self::Arc];
}

/// Grid offsets for `count` units in `shape`.
///
/// Only the arc depends on `spacing`: its radius is in world units and is
/// converted back to grid units.
#[must_use]
pub fn formation_offsets(shape: FormationShape, count: usize, spacing: f64) -> Vec<(f64, f64)> {
    let mut offsets = Vec::with_capacity(count);
    if count == 0 {
        return offsets;
    }

    match shape {
        FormationShape::Line => {
            let half = (count as f64 - 1.0) * 0.5;
            for i in 0..count {
                offsets.push((i as f64 - half, 0.0));
            }
        }
        FormationShape::Wedge => {
            let mut remaining = count;
            let mut row = 0usize;
            while remaining > 0 {
                let row_size = remaining.min(row + 1);
                let half = (row_size as f64 - 1.0) * 0.5;
                for i in 0..row_size {
                    offsets.push((i as f64 - half, -(row as f64)));
                }
                remaining -= row_size;
                row += 1;
            }
        }
        FormationShape::Square => {
            let rows = (count as f64).sqrt().ceil() as usize;
            let cols = count.div_ceil(rows);
            let half_cols = (cols as f64 - 1.0) * 0.5;
            let half_rows = (rows as f64 - 1.0) * 0.5;
            'grid: for r in 0..rows {
                for c in 0..cols {
                    if offsets.len() >= count {
                        break 'grid;
                    }
                    offsets.push((c as f64 - half_cols, -(r as f64 - half_rows)));
                }
            }
        }
        FormationShape::Arc => {
            if count == 1 {
                offsets.push((0.0, 0.0));
                return offsets;
            }
            let radius = (count as f64 * 0.4).max(2.0);
            let half_angle = 60f64.to_radians();
            let spacing = if spacing > 0.0 { spacing } else { 1.0 };
            for i in 0..count {
                let t = i as f64 / (count as f64 - 1.0);
                let angle = -half_angle + 2.0 * half_angle * t;
                let x = angle.sin() * radius;
                let z = angle.cos() * radius * -0.4;
                offsets.push((x / spacing, z / spacing));
            }
        }
    }

    offsets
}

/// How one team lines up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamSetup {
    /// Faction.
    pub team: Team,
    /// Shape of the melee and ranged blocks. Commanders always form a line.
    pub shape: FormationShape,
    /// Melee count.
    pub melee: usize,
    /// Ranged count.
    pub ranged: usize,
    /// Commander count.
    pub commanders: usize,
    /// Center of the formation, world units.
    pub origin: (f64, f64),
    /// Direction the team faces. Need not be normalized.
    pub forward: (f64, f64),
    /// Distance between neighbors.
    pub spacing: f64,
    /// Row gap in grid units.
    pub row_offset: f64,
}

impl TeamSetup {
    /// Standard setup: Cube on the left facing +x, Sphere on the right
    /// facing -x, `gap` world units apart.
    #[must_use]
    pub fn facing_off(team: Team, shape: FormationShape, gap: f64) -> Self {
        let (origin, forward) = match team {
            Team::Cube => ((-gap * 0.5, 0.0), (1.0, 0.0)),
            Team::Sphere => ((gap * 0.5, 0.0), (-1.0, 0.0)),
        };
        Self {
            team,
            shape,
            melee: 0,
            ranged: 0,
            commanders: 0,
            origin,
            forward,
            spacing: DEFAULT_SPACING,
            row_offset: DEFAULT_ROW_OFFSET,
        }
    }

    /// Set unit counts.
    #[must_use]
    pub const fn with_counts(mut self, melee: usize, ranged: usize, commanders: usize) -> Self {
        self.melee = melee;
        self.ranged = ranged;
        self.commanders = commanders;
        self
    }

    /// Total units this setup spawns.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.melee + self.ranged + self.commanders
    }

    fn world_position(&self, offset: (f64, f64), row_shift: f64) -> Vec2Fixed {
        let (fx, fz) = self.forward;
        let length = (fx * fx + fz * fz).sqrt();
        let (fx, fz) = if length > 0.0 {
            (fx / length, fz / length)
        } else {
            (1.0, 0.0)
        };
        // Right-hand side of the facing direction.
        let (rx, rz) = (fz, -fx);

        let x = offset.0 * self.spacing;
        let z = (offset.1 + row_shift) * self.spacing;
        Vec2Fixed::from_f64(
            self.origin.0 + rx * x + fx * z,
            self.origin.1 + rz * x + fz * z,
        )
    }
}

/// Spawn a whole team: melee in front, ranged one row back, commanders one
/// row ahead.
///
/// # Errors
///
/// Propagates the first spawn error.
pub fn spawn_team(world: &mut BattleWorld, loadout: &Loadout, setup: &TeamSetup) -> Result<Vec<UnitId>> {
    let facing = {
        let (fx, fz) = setup.forward;
        Vec2Fixed::from_f64(fx, fz)
    };
    let blocks = [
        (UnitClass::Melee, setup.shape, setup.melee, 0.0),
        (UnitClass::Ranged, setup.shape, setup.ranged, -setup.row_offset),
        (UnitClass::Commander, FormationShape::Line, setup.commanders, setup.row_offset),
    ];

    let mut ids = Vec::with_capacity(setup.total());
    for (class, shape, count, row_shift) in blocks {
        let config = loadout.for_class(class);
        for offset in formation_offsets(shape, count, setup.spacing) {
            let request = SpawnRequest::new(
                setup.team,
                class,
                config.clone(),
                setup.world_position(offset, row_shift),
            )
            .facing(facing);
            ids.push(world.spawn(request)?);
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_core::data::BattleSettings;

    #[test]
    fn test_every_shape_yields_count_distinct_offsets() {
        for shape in FormationShape::ALL {
            for count in [0usize, 1, 2, 7, 25] {
                let offsets = formation_offsets(shape, count, DEFAULT_SPACING);
                assert_eq!(offsets.len(), count, "{shape:?} x {count}");
                for (i, a) in offsets.iter().enumerate() {
                    for b in &offsets[i + 1..] {
                        let d = (a.0 - b.0).hypot(a.1 - b.1);
                        assert!(d > 1e-6, "{shape:?} x {count} has overlapping slots");
                    }
                }
            }
        }
    }

    #[test]
    fn test_line_is_centered() {
        let offsets = formation_offsets(FormationShape::Line, 4, DEFAULT_SPACING);
        assert_eq!(offsets, vec![(-1.5, 0.0), (-0.5, 0.0), (0.5, 0.0), (1.5, 0.0)]);
    }

    #[test]
    fn test_wedge_rows_grow_by_one() {
        let offsets = formation_offsets(FormationShape::Wedge, 6, DEFAULT_SPACING);
        let rows: Vec<usize> = [0.0, -1.0, -2.0]
            .iter()
            .map(|z| offsets.iter().filter(|o| o.1 == *z).count())
            .collect();
        assert_eq!(rows, vec![1, 2, 3]);
    }

    #[test]
    fn test_square_fits_grid() {
        let offsets = formation_offsets(FormationShape::Square, 10, DEFAULT_SPACING);
        let xs: std::collections::BTreeSet<i64> =
            offsets.iter().map(|o| (o.0 * 10.0) as i64).collect();
        // 10 units -> 4 rows of up to 3 columns
        assert_eq!(xs.len(), 3);
    }

    #[test]
    fn test_spawn_team_places_rows() {
        let mut world = BattleWorld::new(BattleSettings::default());
        let loadout = Loadout::standard();
        let setup = TeamSetup::facing_off(Team::Cube, FormationShape::Line, 30.0).with_counts(3, 2, 1);
        let ids = spawn_team(&mut world, &loadout, &setup).unwrap();
        assert_eq!(ids.len(), 6);

        let x_of = |id: UnitId| world.unit(id).unwrap().position.x.to_num::<f64>();
        // Cube faces +x: ranged behind (smaller x), commander ahead.
        assert!(x_of(ids[3]) < x_of(ids[0]));
        assert!(x_of(ids[5]) > x_of(ids[0]));
        assert_eq!(world.roster(Team::Cube).len(), 6);
    }
}
