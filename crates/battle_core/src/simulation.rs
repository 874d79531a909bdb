//! Core battle loop.
//!
//! [`BattleWorld`] owns every unit, the spatial index, the projectile pool
//! and the random source, and advances them together one tick at a time.
//!
//! # Determinism
//!
//! All operations in this module are deterministic for a given seed:
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - One seeded RNG, drawn in a fixed order
//! - Units update in ascending id order
//! - Spatial queries resolve ties by id
//!
//! # Tick order
//!
//! 1. Every live unit, in id order: timers, targeting, then its class
//!    behavior (move, attack, fire, or run an ability).
//! 2. Projectiles advance; landed ones resolve against the index.
//! 3. Team rosters drop units that died this tick.
//!
//! A unit killed during step 1 is removed from the spatial index at once,
//! so no later unit in the same tick can target or hit it. Its record stays
//! in the arena marked dead.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use battle_core::components::{Team, UnitClass};
//! use battle_core::data::{BattleSettings, UnitConfig};
//! use battle_core::math::Vec2Fixed;
//! use battle_core::simulation::{BattleWorld, SpawnRequest};
//!
//! let mut world = BattleWorld::new(BattleSettings::with_seed(7));
//! let melee = Arc::new(UnitConfig::melee());
//!
//! world
//!     .spawn(SpawnRequest::new(Team::Cube, UnitClass::Melee, Arc::clone(&melee), Vec2Fixed::from_f64(-5.0, 0.0)))
//!     .unwrap();
//! world
//!     .spawn(SpawnRequest::new(Team::Sphere, UnitClass::Melee, melee, Vec2Fixed::from_f64(5.0, 0.0)))
//!     .unwrap();
//!
//! let events = world.tick();
//! assert_eq!(world.get_tick(), 1);
//! assert!(events.deaths().is_empty());
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::{debug, info, trace};

use crate::ability::{AbilityController, AbilityEffect, AbilityKind, AbilityStep};
use crate::combat::{AttackStyle, CombatResolver, DamageOutcome};
use crate::components::{Team, UnitActivity, UnitClass, UnitId, UnitState};
use crate::data::{BattleSettings, UnitConfig};
use crate::error::{BattleError, Result};
use crate::events::{BattleEvent, TickEvents};
use crate::math::{Fixed, Vec2Fixed, Vec3Fixed, MIN_DISTANCE_SQ};
use crate::projectile::ProjectileSimulator;
use crate::rng::BattleRng;
use crate::spatial::{QueryFilter, SpatialIndex, TeamFilter};
use crate::steering::{displacement, SteeringPolicy};
use crate::targeting::TargetingPolicy;

/// Ticks per second for [`BattleWorld::tick`].
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in seconds.
#[must_use]
pub fn tick_duration() -> Fixed {
    Fixed::ONE / Fixed::from_num(TICK_RATE)
}

/// Fraction of regular attack damage a fallback strike deals when the
/// ranged config leaves the fallback damage at zero.
const FALLBACK_DAMAGE_FRACTION: Fixed = Fixed::from_bits(1_288_490_189);

/// Request to place a unit on the battlefield.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Faction.
    pub team: Team,
    /// Archetype.
    pub class: UnitClass,
    /// Stat block. Spawning without one is rejected.
    pub config: Option<Arc<UnitConfig>>,
    /// Ground position.
    pub position: Vec2Fixed,
    /// Initial heading. Zero picks a default facing the enemy side.
    pub facing: Vec2Fixed,
    /// Initial attack timer. `None` draws a random offset so volleys
    /// spread out.
    pub attack_delay: Option<Fixed>,
}

impl SpawnRequest {
    /// Request with a config and default facing.
    #[must_use]
    pub fn new(team: Team, class: UnitClass, config: Arc<UnitConfig>, position: Vec2Fixed) -> Self {
        Self {
            team,
            class,
            config: Some(config),
            position,
            facing: Vec2Fixed::ZERO,
            attack_delay: None,
        }
    }

    /// Set the initial heading.
    #[must_use]
    pub const fn facing(mut self, facing: Vec2Fixed) -> Self {
        self.facing = facing;
        self
    }

    /// Fix the initial attack timer instead of randomizing it.
    #[must_use]
    pub const fn with_attack_delay(mut self, seconds: Fixed) -> Self {
        self.attack_delay = Some(seconds);
        self
    }
}

/// Storage for every unit ever spawned, live or dead.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic iteration via
/// sorted keys.
#[derive(Debug, Clone)]
pub struct UnitArena {
    units: HashMap<UnitId, UnitState>,
    next_id: UnitId,
}

impl UnitArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a unit built for the next id and return that id.
    fn insert_with(&mut self, build: impl FnOnce(UnitId) -> UnitState) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        self.units.insert(id, build(id));
        id
    }

    /// Remove a unit by id.
    fn remove(&mut self, id: UnitId) -> Option<UnitState> {
        self.units.remove(&id)
    }

    /// Get a unit by id.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&UnitState> {
        self.units.get(&id)
    }

    fn get_mut(&mut self, id: UnitId) -> Option<&mut UnitState> {
        self.units.get_mut(&id)
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Number of units, dead ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sorted unit ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all units (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &UnitState)> {
        self.units.iter()
    }
}

impl Default for UnitArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether and how a battle has ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleOutcome {
    /// Both teams still have live units.
    InProgress,
    /// Only this team has live units left.
    Victory(Team),
    /// Nobody is left standing.
    Draw,
}

const fn roster_slot(team: Team) -> usize {
    match team {
        Team::Cube => 0,
        Team::Sphere => 1,
    }
}

/// The battle simulation.
///
/// Owns all battle state and advances it deterministically. Presentation
/// code observes the world through the returned [`TickEvents`] and the
/// read-only accessors; it never mutates units directly.
#[derive(Debug, Clone)]
pub struct BattleWorld {
    /// Ticks run so far.
    tick: u64,
    /// Simulated seconds so far.
    elapsed: Fixed,
    settings: BattleSettings,
    units: UnitArena,
    /// Live unit ids per team, compacted at the end of each tick.
    rosters: [Vec<UnitId>; 2],
    index: SpatialIndex,
    projectiles: ProjectileSimulator,
    abilities: AbilityController,
    rng: BattleRng,
    finished: bool,
}

impl BattleWorld {
    /// Create an empty battlefield.
    #[must_use]
    pub fn new(settings: BattleSettings) -> Self {
        Self {
            tick: 0,
            elapsed: Fixed::ZERO,
            units: UnitArena::new(),
            rosters: [Vec::new(), Vec::new()],
            index: SpatialIndex::new(settings.grid_cell_size),
            projectiles: ProjectileSimulator::new(settings.projectile),
            abilities: AbilityController::new(settings.ability),
            rng: BattleRng::seeded(settings.seed),
            finished: false,
            settings,
        }
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Simulated seconds so far.
    #[must_use]
    pub const fn elapsed(&self) -> Fixed {
        self.elapsed
    }

    /// Settings the world was built with.
    #[must_use]
    pub const fn settings(&self) -> &BattleSettings {
        &self.settings
    }

    /// All units, dead ones included.
    #[must_use]
    pub const fn units(&self) -> &UnitArena {
        &self.units
    }

    /// Look up one unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&UnitState> {
        self.units.get(id)
    }

    /// Live units of a team as of the end of the last tick.
    #[must_use]
    pub fn roster(&self, team: Team) -> &[UnitId] {
        &self.rosters[roster_slot(team)]
    }

    /// Number of live units on a team right now.
    #[must_use]
    pub fn live_count(&self, team: Team) -> usize {
        self.roster(team)
            .iter()
            .filter(|&&id| self.units.get(id).is_some_and(UnitState::is_alive))
            .count()
    }

    /// Proximity index of live units.
    #[must_use]
    pub const fn index(&self) -> &SpatialIndex {
        &self.index
    }

    /// Projectiles in flight.
    #[must_use]
    pub const fn projectiles(&self) -> &ProjectileSimulator {
        &self.projectiles
    }

    /// Current result of the battle.
    #[must_use]
    pub fn outcome(&self) -> BattleOutcome {
        let cube = self.live_count(Team::Cube);
        let sphere = self.live_count(Team::Sphere);
        match (cube, sphere) {
            (0, 0) => BattleOutcome::Draw,
            (0, _) => BattleOutcome::Victory(Team::Sphere),
            (_, 0) => BattleOutcome::Victory(Team::Cube),
            _ => BattleOutcome::InProgress,
        }
    }

    /// Place a unit and return its id.
    ///
    /// # Errors
    ///
    /// [`BattleError::MissingConfig`] if the request carries no config, and
    /// [`BattleError::InvalidConfig`] if the config fails validation for the
    /// requested class.
    pub fn spawn(&mut self, request: SpawnRequest) -> Result<UnitId> {
        let config = request.config.ok_or(BattleError::MissingConfig {
            class: request.class.name(),
        })?;
        config.validate_for(request.class)?;

        let class_settings = *self.settings.class(request.class);
        let attack_timer = match request.attack_delay {
            Some(delay) => delay.max(Fixed::ZERO),
            None => self
                .rng
                .range(Fixed::ZERO, config.base_attack_interval()),
        };
        let surround_bias = self.rng.signed_unit();
        let target_search_timer = self
            .rng
            .range(Fixed::ZERO, class_settings.targeting.search_interval);
        let separation_timer = self
            .rng
            .range(Fixed::ZERO, class_settings.separation.refresh_interval);

        let facing = if request.facing.length_squared() > MIN_DISTANCE_SQ {
            request.facing.normalize()
        } else {
            match request.team {
                Team::Cube => Vec2Fixed::new(Fixed::ONE, Fixed::ZERO),
                Team::Sphere => Vec2Fixed::new(-Fixed::ONE, Fixed::ZERO),
            }
        };

        let team = request.team;
        let class = request.class;
        let position = request.position;
        let id = self.units.insert_with(|id| UnitState {
            id,
            team,
            class,
            health: config.max_health,
            config,
            position,
            height: Fixed::ZERO,
            facing,
            attack_timer,
            activity: UnitActivity::Idle,
            ability_cooldown: Fixed::ZERO,
            ability: None,
            current_target: None,
            alive: true,
            surround_bias,
            target_search_timer,
            separation_timer,
            cached_separation: Vec2Fixed::ZERO,
            crowd_check_timer: Fixed::ZERO,
            crowded: false,
            melee_mode_target: None,
        });

        self.rosters[roster_slot(team)].push(id);
        self.index.insert(id, team, class, position);
        debug!(unit = id, ?team, %class, x = %position.x, z = %position.y, "Unit spawned");
        Ok(id)
    }

    /// Remove a unit from the battle entirely.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnitNotFound`] if the id was never spawned or
    /// was already removed.
    pub fn despawn(&mut self, id: UnitId) -> Result<()> {
        let unit = self.units.remove(id).ok_or(BattleError::UnitNotFound(id))?;
        self.index.remove(id);
        self.rosters[roster_slot(unit.team)].retain(|&other| other != id);
        Ok(())
    }

    /// Advance by one fixed tick of [`tick_duration`] seconds.
    pub fn tick(&mut self) -> TickEvents {
        self.step(tick_duration())
    }

    /// Advance by `dt` seconds. Negative durations are treated as zero.
    pub fn step(&mut self, dt: Fixed) -> TickEvents {
        let dt = dt.max(Fixed::ZERO);
        let mut events = TickEvents::default();

        // 1. Units, in id order
        for id in self.units.sorted_ids() {
            self.update_unit(id, dt, &mut events);
        }

        // 2. Projectiles
        self.update_projectiles(dt, &mut events);

        // 3. Rosters
        self.compact_rosters();

        self.tick += 1;
        self.elapsed += dt;

        if !self.finished {
            let outcome = self.outcome();
            if outcome != BattleOutcome::InProgress && !self.units.is_empty() {
                self.finished = true;
                info!(tick = self.tick, ?outcome, "Battle decided");
            }
        }

        #[cfg(feature = "debug-validation")]
        self.validate();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            trace!(tick = self.tick, state_hash = hash, "Battle state hash");
        }

        events
    }

    fn update_unit(&mut self, id: UnitId, dt: Fixed, events: &mut TickEvents) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        unit.tick_timers(dt);
        let class = unit.class;

        match class {
            UnitClass::Melee => self.update_melee(id, dt, events),
            UnitClass::Ranged => self.update_ranged(id, dt, events),
            UnitClass::Commander => self.update_commander(id, dt, events),
        }
    }

    // ------------------------------------------------------------------
    // Targeting
    // ------------------------------------------------------------------

    fn live_enemy_position(&self, team: Team, target: UnitId) -> Option<Vec2Fixed> {
        self.units
            .get(target)
            .filter(|other| other.is_alive() && other.team != team)
            .map(|other| other.position)
    }

    /// Keep or replace the unit's target. Returns the target and where it is.
    fn refresh_target(&mut self, id: UnitId) -> Option<(UnitId, Vec2Fixed)> {
        let unit = self.units.get(id)?;
        let (team, class, position) = (unit.team, unit.class, unit.position);
        let search_timer = unit.target_search_timer;
        let current = unit
            .current_target
            .and_then(|target| self.live_enemy_position(team, target).map(|pos| (target, pos)));

        let policy = TargetingPolicy::for_class(class, &self.settings);
        if !policy.should_reacquire(search_timer, current.is_some()) {
            return current;
        }

        let found = policy.acquire(&self.index, id, team, position);
        let unit = self.units.get_mut(id)?;
        unit.target_search_timer = policy.search_interval;

        let new_target = found.map(|(target, _)| target);
        if new_target != unit.current_target {
            trace!(unit = id, target = ?new_target, "Target changed");
            // A new target needs a fresh crowd reading.
            unit.crowd_check_timer = Fixed::ZERO;
        }
        unit.current_target = new_target;
        found
    }

    // ------------------------------------------------------------------
    // Class behavior
    // ------------------------------------------------------------------

    fn update_melee(&mut self, id: UnitId, dt: Fixed, events: &mut TickEvents) {
        let Some((target, target_pos)) = self.refresh_target(id) else {
            self.set_activity(id, UnitActivity::Idle);
            return;
        };
        self.refresh_separation_cache(id);

        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        let position = unit.position;
        let range = unit.config.attack_range;
        let damage = unit.config.attack_damage;

        if unit.crowd_check_timer <= Fixed::ZERO {
            unit.crowded = CombatResolver::is_target_crowded(
                &self.index,
                id,
                unit.team,
                target_pos,
                range,
                &self.settings,
            );
            unit.crowd_check_timer = self.settings.crowd_check_interval;
        }

        if CombatResolver::in_range(position, target_pos, range) {
            self.strike(id, target, target_pos, AttackStyle::Melee, damage, events);
        } else if unit.crowded {
            face_toward(unit, target_pos);
            unit.activity = UnitActivity::Idle;
        } else {
            self.move_toward(id, target_pos, dt);
        }
    }

    fn update_ranged(&mut self, id: UnitId, dt: Fixed, events: &mut TickEvents) {
        let Some((target, target_pos)) = self.refresh_target(id) else {
            if let Some(unit) = self.units.get_mut(id) {
                unit.activity = UnitActivity::Idle;
                unit.melee_mode_target = None;
            }
            return;
        };

        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if unit.melee_mode_target != Some(target) {
            unit.melee_mode_target = None;
        }
        let config = Arc::clone(&unit.config);
        let distance_sq = unit.position.distance_squared(target_pos);

        if let Some(fallback) = config.ranged.as_ref().filter(|r| r.can_fallback_melee) {
            let trigger = fallback.fallback_melee_range + self.settings.fallback_trigger_margin;
            if distance_sq <= trigger.saturating_mul(trigger) {
                unit.melee_mode_target = Some(target);
            }
            if unit.melee_mode_target.is_some() {
                let reach = fallback.fallback_melee_range;
                if distance_sq > reach.saturating_mul(reach) {
                    self.move_toward(id, target_pos, dt);
                }
                let base = if fallback.fallback_melee_damage > Fixed::ZERO {
                    fallback.fallback_melee_damage
                } else {
                    config.attack_damage * FALLBACK_DAMAGE_FRACTION
                };
                self.fallback_strike(id, reach, base, events);
                return;
            }
        }

        let range = config.attack_range;
        if distance_sq > range.saturating_mul(range) {
            self.move_toward(id, target_pos, dt);
            return;
        }

        self.hold_position(id, dt);
        self.fire(id, target, target_pos, events);
    }

    fn update_commander(&mut self, id: UnitId, dt: Fixed, events: &mut TickEvents) {
        if self.advance_ability(id, dt, events) {
            return;
        }

        let Some((target, target_pos)) = self.refresh_target(id) else {
            self.set_activity(id, UnitActivity::Idle);
            return;
        };

        if self.try_trigger_ability(id, target_pos, events) {
            return;
        }

        let Some(unit) = self.units.get(id) else {
            return;
        };
        let (position, range, damage) = (
            unit.position,
            unit.config.attack_range,
            unit.config.attack_damage,
        );
        if CombatResolver::in_range(position, target_pos, range) {
            self.strike(id, target, target_pos, AttackStyle::Melee, damage, events);
        } else {
            self.move_toward(id, target_pos, dt);
        }
    }

    // ------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------

    fn set_activity(&mut self, id: UnitId, activity: UnitActivity) {
        if let Some(unit) = self.units.get_mut(id) {
            unit.activity = activity;
        }
    }

    fn refresh_separation_cache(&mut self, id: UnitId) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        let steering = SteeringPolicy::for_class(unit.class, &self.settings);
        let interval = steering.separation.refresh_interval;
        if interval <= Fixed::ZERO || unit.separation_timer > Fixed::ZERO {
            return;
        }
        unit.cached_separation =
            steering.separation_from_index(&self.index, id, unit.team, unit.position);
        unit.separation_timer = interval;
    }

    fn move_toward(&mut self, id: UnitId, target_pos: Vec2Fixed, dt: Fixed) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        let steering = SteeringPolicy::for_class(unit.class, &self.settings);
        let separation = if steering.separation.refresh_interval > Fixed::ZERO {
            unit.cached_separation
        } else {
            steering.separation_from_index(&self.index, id, unit.team, unit.position)
        };
        let approach = steering.approach_direction(
            unit.position,
            target_pos,
            unit.config.attack_range,
            unit.surround_bias,
        );
        let direction = SteeringPolicy::combine(approach, separation);

        unit.position += displacement(direction, unit.config.move_speed, dt);
        if direction.length_squared() > MIN_DISTANCE_SQ {
            unit.facing = direction;
        }
        unit.activity = UnitActivity::Moving;
        self.index.update(id, unit.position);
    }

    /// In-range ranged units drift apart without leaving range.
    fn hold_position(&mut self, id: UnitId, dt: Fixed) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        let steering = SteeringPolicy::for_class(unit.class, &self.settings);
        let separation =
            steering.separation_from_index(&self.index, id, unit.team, unit.position);
        if separation.length_squared() <= MIN_DISTANCE_SQ {
            return;
        }
        let speed = unit.config.move_speed * self.settings.hold_separation_factor;
        unit.position += displacement(separation, speed, dt);
        self.index.update(id, unit.position);
    }

    fn knock_back(&mut self, id: UnitId, offset: Vec2Fixed, events: &mut TickEvents) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        let from = unit.position;
        unit.position += offset;
        self.index.update(id, unit.position);
        events.push(BattleEvent::Knockback {
            unit: id,
            from,
            to: unit.position,
        });
    }

    // ------------------------------------------------------------------
    // Attacks
    // ------------------------------------------------------------------

    /// Melee strike on the current target, gated by the attack timer.
    fn strike(
        &mut self,
        id: UnitId,
        target: UnitId,
        target_pos: Vec2Fixed,
        style: AttackStyle,
        base_damage: Fixed,
        events: &mut TickEvents,
    ) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        face_toward(unit, target_pos);
        if !CombatResolver::attack_ready(unit) {
            unit.activity = UnitActivity::OnCooldown;
            return;
        }

        unit.attack_timer = CombatResolver::roll_attack_interval(&unit.config, &mut self.rng);
        unit.activity = UnitActivity::Attacking;
        let damage =
            CombatResolver::roll_damage(base_damage, unit.config.damage_random_percent, &mut self.rng);
        let position = unit.position;

        events.push(BattleEvent::AttackPerformed {
            attacker: id,
            target,
            style,
            position,
        });
        self.apply_damage(target, damage, Some(id), events);
    }

    /// Hand-to-hand strike by a ranged unit on whichever enemy is closest.
    fn fallback_strike(&mut self, id: UnitId, reach: Fixed, base_damage: Fixed, events: &mut TickEvents) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        if !CombatResolver::attack_ready(unit) {
            unit.activity = UnitActivity::OnCooldown;
            return;
        }
        unit.attack_timer = CombatResolver::roll_attack_interval(&unit.config, &mut self.rng);
        unit.activity = UnitActivity::Attacking;

        let filter = QueryFilter::team(unit.team.opponent());
        let Some((victim, victim_pos)) = self.index.nearest(unit.position, reach, &filter) else {
            return;
        };
        face_toward(unit, victim_pos);
        let damage =
            CombatResolver::roll_damage(base_damage, unit.config.damage_random_percent, &mut self.rng);
        let position = unit.position;

        events.push(BattleEvent::AttackPerformed {
            attacker: id,
            target: victim,
            style: AttackStyle::FallbackMelee,
            position,
        });
        self.apply_damage(victim, damage, Some(id), events);
    }

    /// Release a projectile at where the target stands now.
    fn fire(&mut self, id: UnitId, target: UnitId, target_pos: Vec2Fixed, events: &mut TickEvents) {
        let Some(unit) = self.units.get_mut(id) else {
            return;
        };
        face_toward(unit, target_pos);
        if !CombatResolver::attack_ready(unit) {
            unit.activity = UnitActivity::OnCooldown;
            return;
        }

        unit.attack_timer = CombatResolver::roll_attack_interval(&unit.config, &mut self.rng);
        unit.activity = UnitActivity::Attacking;
        let damage = CombatResolver::roll_damage(
            unit.config.attack_damage,
            unit.config.damage_random_percent,
            &mut self.rng,
        );

        let launch_height = self.projectiles.settings().launch_height;
        let origin = Vec3Fixed::from_ground(unit.position, unit.height + launch_height);
        let destination = Vec3Fixed::from_ground(target_pos, Fixed::ZERO);
        let (team, position) = (unit.team, unit.position);

        let projectile = self.projectiles.launch(origin, destination, damage, team, id);
        let travel_time = self
            .projectiles
            .pool()
            .get(projectile)
            .map_or(Fixed::ZERO, |p| p.travel_time);

        events.push(BattleEvent::AttackPerformed {
            attacker: id,
            target,
            style: AttackStyle::Ranged,
            position,
        });
        events.push(BattleEvent::ProjectileLaunched {
            projectile,
            source: id,
            origin,
            destination,
            travel_time,
        });
    }

    /// Deliver damage to a unit, handling dodge, death and index removal.
    fn apply_damage(
        &mut self,
        target: UnitId,
        amount: Fixed,
        source: Option<UnitId>,
        events: &mut TickEvents,
    ) -> DamageOutcome {
        let Some(unit) = self.units.get_mut(target) else {
            return DamageOutcome::Ignored;
        };
        let outcome = CombatResolver::resolve_hit(unit, amount, &mut self.rng);
        if matches!(outcome, DamageOutcome::Killed { .. }) {
            unit.height = Fixed::ZERO;
        }
        let (position, team, class, health) = (unit.position, unit.team, unit.class, unit.health);

        match outcome {
            DamageOutcome::Dodged => {
                events.push(BattleEvent::AttackDodged { target, source });
            }
            DamageOutcome::Hit { damage, remaining } => {
                events.push(BattleEvent::HitTaken {
                    target,
                    source,
                    damage,
                    remaining_health: remaining,
                    position,
                });
            }
            DamageOutcome::Killed { damage } => {
                events.push(BattleEvent::HitTaken {
                    target,
                    source,
                    damage,
                    remaining_health: health,
                    position,
                });
                events.push(BattleEvent::Death {
                    unit: target,
                    team,
                    class,
                    position,
                    killer: source,
                });
                self.index.remove(target);
                debug!(unit = target, ?team, %class, killer = ?source, "Unit died");
            }
            DamageOutcome::Ignored => {}
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Abilities
    // ------------------------------------------------------------------

    /// Run one tick of an active ability. Returns whether one was active.
    fn advance_ability(&mut self, id: UnitId, dt: Fixed, events: &mut TickEvents) -> bool {
        let Some(unit) = self.units.get_mut(id) else {
            return false;
        };
        let Some(mut sequence) = unit.ability else {
            return false;
        };
        let config = Arc::clone(&unit.config);
        let Some(commander) = config.commander.as_ref() else {
            unit.ability = None;
            return false;
        };

        match self.abilities.advance(&mut sequence, commander, unit.position, dt) {
            AbilityStep::InProgress { position, height } => {
                unit.ability = Some(sequence);
                unit.position = position;
                unit.height = height;
                unit.activity = UnitActivity::UsingAbility;
                self.index.update(id, position);
            }
            AbilityStep::Complete { position, effect } => {
                unit.ability = None;
                unit.position = position;
                unit.height = Fixed::ZERO;
                unit.attack_timer = Fixed::ZERO;
                unit.activity = UnitActivity::Idle;
                self.index.update(id, position);
                self.resolve_ability(id, effect, events);
            }
        }
        true
    }

    fn try_trigger_ability(&mut self, id: UnitId, target_pos: Vec2Fixed, events: &mut TickEvents) -> bool {
        let Some(unit) = self.units.get(id) else {
            return false;
        };
        if unit.ability_cooldown > Fixed::ZERO {
            return false;
        }
        let Some(config) = unit.config.commander.as_ref() else {
            return false;
        };

        let kind = AbilityKind::for_team(unit.team);
        let sequence = match kind {
            AbilityKind::AreaSlam => {
                let radius = self.abilities.slam_trigger_radius(config);
                let filter = QueryFilter::team(unit.team.opponent());
                self.index
                    .nearest(unit.position, radius, &filter)
                    .map(|_| self.abilities.begin_slam())
            }
            AbilityKind::LineCharge => {
                let distance = unit.position.distance(target_pos);
                if self.abilities.charge_in_window(config, distance) {
                    self.abilities.begin_charge(config, unit.position, target_pos)
                } else {
                    None
                }
            }
        };
        let Some(sequence) = sequence else {
            return false;
        };
        let cooldown = AbilityController::cooldown(kind, config);
        let position = unit.position;

        let Some(unit) = self.units.get_mut(id) else {
            return false;
        };
        unit.ability = Some(sequence);
        unit.ability_cooldown = cooldown;
        unit.activity = UnitActivity::UsingAbility;
        face_toward(unit, target_pos);

        events.push(BattleEvent::AbilityTriggered {
            unit: id,
            kind,
            position,
        });
        debug!(unit = id, ?kind, "Ability triggered");
        true
    }

    /// Damage and shove every live enemy inside the effect area.
    fn resolve_ability(&mut self, id: UnitId, effect: AbilityEffect, events: &mut TickEvents) {
        let Some(unit) = self.units.get(id) else {
            return;
        };
        let team = unit.team;
        let spread = unit.config.damage_random_percent;

        let mut victims = self.index.query_radius(
            effect.center,
            effect.radius,
            TeamFilter::Only(team.opponent()),
            Some(id),
        );
        victims.sort_unstable();

        let mut hits = 0u32;
        for victim in victims {
            let damage = CombatResolver::roll_damage(effect.damage, spread, &mut self.rng);
            let outcome = self.apply_damage(victim, damage, Some(id), events);
            if !outcome.landed() {
                continue;
            }
            hits += 1;
            if let DamageOutcome::Hit { .. } = outcome {
                let Some(victim_pos) = self.units.get(victim).map(|v| v.position) else {
                    continue;
                };
                let offset = effect
                    .knockback
                    .displacement(effect.center, victim_pos, &mut self.rng);
                self.knock_back(victim, offset, events);
            }
        }

        events.push(BattleEvent::AbilityImpact {
            unit: id,
            kind: effect.kind,
            center: effect.center,
            radius: effect.radius,
            hits,
        });
        debug!(unit = id, kind = ?effect.kind, hits, "Ability resolved");
    }

    // ------------------------------------------------------------------
    // Projectiles and bookkeeping
    // ------------------------------------------------------------------

    fn update_projectiles(&mut self, dt: Fixed, events: &mut TickEvents) {
        let hit_radius = self.projectiles.settings().hit_radius;

        for landing in self.projectiles.advance(dt) {
            if landing.timed_out {
                trace!(projectile = landing.id, "Projectile timed out");
            }
            let filter = QueryFilter::team(landing.team.opponent());
            let hit = self
                .index
                .nearest(landing.position.ground(), hit_radius, &filter)
                .map(|(victim, _)| victim);
            if let Some(victim) = hit {
                self.apply_damage(victim, landing.damage, Some(landing.source), events);
            }
            events.push(BattleEvent::ProjectileImpact {
                projectile: landing.id,
                source: landing.source,
                position: landing.position,
                hit,
            });
        }
    }

    fn compact_rosters(&mut self) {
        for roster in &mut self.rosters {
            roster.retain(|&id| self.units.get(id).is_some_and(UnitState::is_alive));
        }
    }

    #[cfg(feature = "debug-validation")]
    fn validate(&self) {
        for (&id, unit) in self.units.iter() {
            assert_eq!(
                unit.is_alive(),
                self.index.contains(id),
                "unit {id} index membership disagrees with alive flag"
            );
            if unit.is_alive() {
                assert_eq!(self.index.position(id), Some(unit.position));
                assert!(unit.attack_timer >= Fixed::ZERO);
                assert!(unit.ability_cooldown >= Fixed::ZERO);
            }
        }
    }

    /// Compute a hash of the battle state.
    ///
    /// Two worlds built from the same settings and spawns and advanced by the
    /// same durations produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.elapsed.to_bits().hash(&mut hasher);

        let ids = self.units.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(unit) = self.units.get(id) {
                id.hash(&mut hasher);
                unit.team.hash(&mut hasher);
                unit.class.hash(&mut hasher);
                unit.alive.hash(&mut hasher);
                unit.position.hash(&mut hasher);
                unit.height.to_bits().hash(&mut hasher);
                unit.health.to_bits().hash(&mut hasher);
                unit.attack_timer.to_bits().hash(&mut hasher);
                unit.ability_cooldown.to_bits().hash(&mut hasher);
                unit.current_target.hash(&mut hasher);
                unit.activity.hash(&mut hasher);
            }
        }

        self.projectiles.active_count().hash(&mut hasher);
        for (id, projectile) in self.projectiles.in_flight() {
            id.hash(&mut hasher);
            projectile.elapsed.to_bits().hash(&mut hasher);
            projectile.destination.hash(&mut hasher);
            projectile.damage.to_bits().hash(&mut hasher);
        }

        self.rng.stream_position().hash(&mut hasher);
        hasher.finish()
    }
}

impl Default for BattleWorld {
    fn default() -> Self {
        Self::new(BattleSettings::default())
    }
}

fn face_toward(unit: &mut UnitState, point: Vec2Fixed) {
    let offset = point - unit.position;
    if offset.length_squared() > MIN_DISTANCE_SQ {
        unit.facing = offset.normalize();
    }
}
