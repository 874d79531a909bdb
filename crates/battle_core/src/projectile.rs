//! Ranged projectile ballistics.
//!
//! A projectile flies from its origin to a fixed destination along a
//! parabola. Progress is `t = clamp01(elapsed / travel_time)`; the ground
//! track is a straight lerp and the height gets an extra
//! `4 * arc_height * t * (1 - t)`, which is zero at both ends and peaks at
//! the midpoint. Projectiles do not home: the destination is wherever the
//! target stood at release.
//!
//! Flight records live in a [`ProjectilePool`] that is filled up front and
//! grows when every slot is busy, so a volley never fails for lack of space.

use tracing::debug;

use crate::components::{Team, UnitId};
use crate::data::ProjectileSettings;
use crate::math::{clamp01, Fixed, Vec3Fixed, MIN_DENOMINATOR};

/// Pool slot index. Slots are reused after impact.
pub type ProjectileId = usize;

/// One projectile in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projectile {
    /// Release point.
    pub origin: Vec3Fixed,
    /// Aim point.
    pub destination: Vec3Fixed,
    /// Seconds since release.
    pub elapsed: Fixed,
    /// Seconds to reach the destination. Zero means immediate impact.
    pub travel_time: Fixed,
    /// Peak extra height of the arc.
    pub arc_height: Fixed,
    /// Damage delivered on impact.
    pub damage: Fixed,
    /// Team of the shooter. Only the other team can be hit.
    pub team: Team,
    /// Shooter id. May refer to a unit that has since died.
    pub source: UnitId,
}

impl Projectile {
    /// Start a flight from `origin` to `destination` at `speed`.
    ///
    /// Speeds below a small epsilon are clamped, so travel time is always
    /// finite.
    #[must_use]
    pub fn launch(
        origin: Vec3Fixed,
        destination: Vec3Fixed,
        speed: Fixed,
        arc_height: Fixed,
        damage: Fixed,
        team: Team,
        source: UnitId,
    ) -> Self {
        let distance = origin.distance(destination);
        Self {
            origin,
            destination,
            elapsed: Fixed::ZERO,
            travel_time: distance / speed.max(MIN_DENOMINATOR),
            arc_height,
            damage,
            team,
            source,
        }
    }

    /// Flight progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> Fixed {
        if self.travel_time <= Fixed::ZERO {
            return Fixed::ONE;
        }
        clamp01(self.elapsed / self.travel_time)
    }

    /// Point on the arc at progress `t` (clamped to `[0, 1]`).
    #[must_use]
    pub fn position_at(&self, t: Fixed) -> Vec3Fixed {
        let t = clamp01(t);
        let mut point = self.origin.lerp(self.destination, t);
        point.y += arc_offset(self.arc_height, t);
        point
    }

    /// Current point on the arc.
    #[must_use]
    pub fn position(&self) -> Vec3Fixed {
        self.position_at(self.progress())
    }

    /// Advance the flight clock. Returns `true` once the projectile must
    /// resolve: it arrived, or it outlived `max_lifetime`.
    pub fn advance(&mut self, dt: Fixed, max_lifetime: Fixed) -> bool {
        self.elapsed += dt.max(Fixed::ZERO);
        self.progress() >= Fixed::ONE || self.elapsed >= max_lifetime
    }
}

/// Extra height of a parabolic arc at progress `t`.
#[must_use]
pub fn arc_offset(arc_height: Fixed, t: Fixed) -> Fixed {
    let t = clamp01(t);
    Fixed::from_num(4) * arc_height * t * (Fixed::ONE - t)
}

/// Reusable flight records.
#[derive(Debug, Clone, Default)]
pub struct ProjectilePool {
    slots: Vec<Option<Projectile>>,
    free: Vec<ProjectileId>,
}

impl ProjectilePool {
    /// Pool with `capacity` free slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            // Reversed so the lowest slot is handed out first.
            free: (0..capacity).rev().collect(),
        }
    }

    /// Store a projectile, growing the pool if every slot is busy.
    pub fn acquire(&mut self, projectile: Projectile) -> ProjectileId {
        if let Some(id) = self.free.pop() {
            self.slots[id] = Some(projectile);
            return id;
        }
        let id = self.slots.len();
        self.slots.push(Some(projectile));
        debug!(capacity = self.slots.len(), "Projectile pool grew");
        id
    }

    /// Return a slot to the pool, handing back its projectile.
    pub fn release(&mut self, id: ProjectileId) -> Option<Projectile> {
        let projectile = self.slots.get_mut(id)?.take()?;
        self.free.push(id);
        Some(projectile)
    }

    /// Projectile in a slot, if the slot is busy.
    #[must_use]
    pub fn get(&self, id: ProjectileId) -> Option<&Projectile> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, id: ProjectileId) -> Option<&mut Projectile> {
        self.slots.get_mut(id).and_then(Option::as_mut)
    }

    /// Total slots, busy or free.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Busy slots.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// A projectile that finished its flight this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectileLanding {
    /// Slot the projectile occupied.
    pub id: ProjectileId,
    /// Where it came down.
    pub position: Vec3Fixed,
    /// Damage to deliver.
    pub damage: Fixed,
    /// Shooter's team.
    pub team: Team,
    /// Shooter id.
    pub source: UnitId,
    /// Whether the lifetime limit ended the flight early.
    pub timed_out: bool,
}

/// Owns every projectile in flight.
#[derive(Debug, Clone)]
pub struct ProjectileSimulator {
    settings: ProjectileSettings,
    pool: ProjectilePool,
    /// Busy slots in launch order.
    active: Vec<ProjectileId>,
}

impl ProjectileSimulator {
    /// Simulator with a prewarmed pool.
    #[must_use]
    pub fn new(settings: ProjectileSettings) -> Self {
        Self {
            settings,
            pool: ProjectilePool::with_capacity(settings.pool_capacity),
            active: Vec::new(),
        }
    }

    /// Ballistics in use.
    #[must_use]
    pub const fn settings(&self) -> &ProjectileSettings {
        &self.settings
    }

    /// Release a projectile with the configured speed and arc.
    pub fn launch(
        &mut self,
        origin: Vec3Fixed,
        destination: Vec3Fixed,
        damage: Fixed,
        team: Team,
        source: UnitId,
    ) -> ProjectileId {
        let projectile = Projectile::launch(
            origin,
            destination,
            self.settings.speed,
            self.settings.arc_height,
            damage,
            team,
            source,
        );
        let id = self.pool.acquire(projectile);
        self.active.push(id);
        id
    }

    /// Advance every flight by `dt` and return the ones that must resolve.
    ///
    /// Finished projectiles are released back to the pool before this
    /// returns; landings are in launch order.
    pub fn advance(&mut self, dt: Fixed) -> Vec<ProjectileLanding> {
        let max_lifetime = self.settings.max_lifetime;
        let mut landings = Vec::new();
        let pool = &mut self.pool;

        self.active.retain(|&id| {
            let Some(projectile) = pool.get_mut(id) else {
                return false;
            };
            let arrived = projectile.elapsed + dt >= projectile.travel_time;
            if !projectile.advance(dt, max_lifetime) {
                return true;
            }
            let landing = ProjectileLanding {
                id,
                position: projectile.position(),
                damage: projectile.damage,
                team: projectile.team,
                source: projectile.source,
                timed_out: !arrived,
            };
            pool.release(id);
            landings.push(landing);
            false
        });

        landings
    }

    /// Projectiles currently in flight.
    pub fn in_flight(&self) -> impl Iterator<Item = (ProjectileId, &Projectile)> + '_ {
        self.active
            .iter()
            .filter_map(|&id| self.pool.get(id).map(|projectile| (id, projectile)))
    }

    /// Number of projectiles in flight.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// The backing pool.
    #[must_use]
    pub const fn pool(&self) -> &ProjectilePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BattleSettings;
    use proptest::prelude::*;

    fn approx(value: Fixed, expected: f64, tolerance: f64) -> bool {
        (value.to_num::<f64>() - expected).abs() <= tolerance
    }

    fn straight_shot() -> Projectile {
        Projectile::launch(
            Vec3Fixed::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO),
            Vec3Fixed::new(Fixed::from_num(10), Fixed::ZERO, Fixed::ZERO),
            Fixed::from_num(15),
            Fixed::from_num(2),
            Fixed::from_num(12),
            Team::Cube,
            1,
        )
    }

    #[test]
    fn test_travel_time_and_midflight_position() {
        let mut shot = straight_shot();
        assert!(approx(shot.travel_time, 0.6667, 1e-3));

        shot.advance(Fixed::from_num(0.333), Fixed::from_num(4));
        let pos = shot.position();
        assert!(approx(pos.x, 5.0, 0.05));
        assert!(pos.y > Fixed::ZERO);
    }

    #[test]
    fn test_zero_distance_impacts_immediately() {
        let origin = Vec3Fixed::new(Fixed::from_num(3), Fixed::ZERO, Fixed::from_num(3));
        let mut shot = Projectile::launch(
            origin,
            origin,
            Fixed::from_num(15),
            Fixed::from_num(2),
            Fixed::ONE,
            Team::Sphere,
            4,
        );
        assert_eq!(shot.progress(), Fixed::ONE);
        assert!(shot.advance(Fixed::ZERO, Fixed::from_num(4)));
        assert_eq!(shot.position(), origin);
    }

    #[test]
    fn test_lifetime_cutoff() {
        let mut shot = Projectile::launch(
            Vec3Fixed::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO),
            Vec3Fixed::new(Fixed::from_num(100), Fixed::ZERO, Fixed::ZERO),
            Fixed::from_num(1),
            Fixed::ZERO,
            Fixed::ONE,
            Team::Cube,
            1,
        );
        assert!(!shot.advance(Fixed::from_num(3), Fixed::from_num(4)));
        assert!(shot.advance(Fixed::from_num(1), Fixed::from_num(4)));
    }

    #[test]
    fn test_pool_grows_and_reuses_slots() {
        let mut pool = ProjectilePool::with_capacity(1);
        let a = pool.acquire(straight_shot());
        let b = pool.acquire(straight_shot());
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.in_use(), 2);

        assert!(pool.release(a).is_some());
        assert!(pool.release(a).is_none());
        let c = pool.acquire(straight_shot());
        assert_eq!(c, a);
        assert_ne!(b, c);
    }

    #[test]
    fn test_simulator_releases_landed_projectiles() {
        let mut settings = BattleSettings::default().projectile;
        settings.pool_capacity = 2;
        let mut sim = ProjectileSimulator::new(settings);
        for _ in 0..3 {
            sim.launch(
                Vec3Fixed::new(Fixed::ZERO, Fixed::ZERO, Fixed::ZERO),
                Vec3Fixed::new(Fixed::from_num(3), Fixed::ZERO, Fixed::ZERO),
                Fixed::from_num(10),
                Team::Cube,
                1,
            );
        }
        assert_eq!(sim.active_count(), 3);
        assert_eq!(sim.pool().capacity(), 3);

        let landings = sim.advance(Fixed::ONE);
        assert_eq!(landings.len(), 3);
        assert!(landings.iter().all(|landing| !landing.timed_out));
        assert_eq!(sim.active_count(), 0);
        assert_eq!(sim.pool().in_use(), 0);
    }

    proptest! {
        #[test]
        fn prop_arc_endpoints_and_peak(
            ox in -50i32..50, oz in -50i32..50, dx in -50i32..50, dz in -50i32..50,
            arc in 0i32..6,
        ) {
            let shot = Projectile::launch(
                Vec3Fixed::new(Fixed::from_num(ox), Fixed::ZERO, Fixed::from_num(oz)),
                Vec3Fixed::new(Fixed::from_num(dx), Fixed::ZERO, Fixed::from_num(dz)),
                Fixed::from_num(15),
                Fixed::from_num(arc),
                Fixed::ONE,
                Team::Cube,
                1,
            );
            prop_assert_eq!(shot.position_at(Fixed::ZERO), shot.origin);
            prop_assert_eq!(shot.position_at(Fixed::ONE), shot.destination);

            let half = Fixed::from_num(0.5);
            let peak = arc_offset(shot.arc_height, half);
            prop_assert_eq!(peak, shot.arc_height);
            for step in 0..=20 {
                let t = Fixed::from_num(step) / Fixed::from_num(20);
                prop_assert!(arc_offset(shot.arc_height, t) <= peak);
                prop_assert!(arc_offset(shot.arc_height, t) >= Fixed::ZERO);
            }
        }
    }
}
