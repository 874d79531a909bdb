//! End-to-end battle scenarios.
//!
//! Each test builds a small battlefield by hand, runs real ticks and checks
//! what the units did through the public world API and the event stream.

use std::sync::Arc;

use battle_core::prelude::*;
use battle_core::simulation::tick_duration;
use battle_test_utils::fixtures::{dummy, fixed_f, init_test_tracing, pos, steady_melee};

fn world(seed: u64) -> BattleWorld {
    init_test_tracing();
    BattleWorld::new(BattleSettings::with_seed(seed))
}

fn spawn(
    world: &mut BattleWorld,
    team: Team,
    class: UnitClass,
    config: UnitConfig,
    position: Vec2Fixed,
) -> UnitId {
    world
        .spawn(SpawnRequest::new(team, class, Arc::new(config), position))
        .unwrap()
}

fn spawn_ready(
    world: &mut BattleWorld,
    team: Team,
    class: UnitClass,
    config: UnitConfig,
    position: Vec2Fixed,
) -> UnitId {
    world
        .spawn(SpawnRequest::new(team, class, Arc::new(config), position).with_attack_delay(Fixed::ZERO))
        .unwrap()
}

fn run_until<F>(world: &mut BattleWorld, max_ticks: u32, mut done: F) -> Vec<TickEvents>
where
    F: FnMut(&TickEvents) -> bool,
{
    let mut history = Vec::new();
    for _ in 0..max_ticks {
        let events = world.tick();
        let stop = done(&events);
        history.push(events);
        if stop {
            return history;
        }
    }
    panic!("condition not reached within {max_ticks} ticks");
}

// =============================================================================
// Melee
// =============================================================================

#[test]
fn test_melee_strike_resolves_in_one_tick() {
    let mut w = world(1);
    let attacker_config = UnitConfig {
        attack_damage: Fixed::from_num(10),
        attack_range: fixed_f(1.5),
        attack_speed: Fixed::ONE,
        ..UnitConfig::melee()
    };
    let a = spawn_ready(&mut w, Team::Cube, UnitClass::Melee, attacker_config, pos(0.0, 0.0));
    let b = w
        .spawn(
            SpawnRequest::new(
                Team::Sphere,
                UnitClass::Melee,
                Arc::new(dummy(UnitClass::Melee, 50.0)),
                pos(1.0, 0.0),
            )
            .with_attack_delay(Fixed::from_num(10)),
        )
        .unwrap();

    let events = w.tick();

    let damage = events
        .iter()
        .find_map(|e| match e {
            BattleEvent::HitTaken { target, source, damage, .. } if *target == b => {
                assert_eq!(*source, Some(a));
                Some(*damage)
            }
            _ => None,
        })
        .expect("attack should land on the first tick");
    assert!(damage >= fixed_f(9.0) && damage <= fixed_f(11.0), "damage {damage}");

    let health = w.unit(b).unwrap().health;
    assert!(health >= fixed_f(39.0) && health <= fixed_f(41.0), "health {health}");

    let timer = w.unit(a).unwrap().attack_timer;
    assert!(timer >= fixed_f(0.95) && timer <= fixed_f(1.05), "timer {timer}");
    assert_eq!(w.unit(a).unwrap().activity, UnitActivity::Attacking);
}

#[test]
fn test_melee_closes_distance_then_attacks() {
    let mut w = world(2);
    let a = spawn_ready(&mut w, Team::Cube, UnitClass::Melee, steady_melee(10.0, 150.0), pos(0.0, 0.0));
    let b = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 500.0), pos(8.0, 0.0));

    let start = w.unit(a).unwrap().position.distance(pos(8.0, 0.0));
    w.tick();
    let after = w.unit(a).unwrap().position.distance(pos(8.0, 0.0));
    assert!(after < start);
    assert_eq!(w.unit(a).unwrap().activity, UnitActivity::Moving);

    run_until(&mut w, 100, |events| {
        events
            .iter()
            .any(|e| matches!(e, BattleEvent::AttackPerformed { target, .. } if *target == b))
    });
    let gap = w.unit(a).unwrap().position.distance(w.unit(b).unwrap().position);
    assert!(gap <= UnitConfig::melee().attack_range);
}

#[test]
fn test_crowded_attacker_holds_back() {
    let mut w = world(4);
    let enemy = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 100_000.0), pos(0.0, 0.0));

    for i in 0..6 {
        let angle = f64::from(i) * std::f64::consts::TAU / 6.0;
        spawn(
            &mut w,
            Team::Cube,
            UnitClass::Melee,
            UnitConfig::melee(),
            pos(angle.cos() * 1.2, angle.sin() * 1.2),
        );
    }
    let late = spawn(&mut w, Team::Cube, UnitClass::Melee, UnitConfig::melee(), pos(5.0, 0.0));
    assert_eq!(w.settings().max_attackers_per_target, 6);

    for _ in 0..20 {
        w.tick();
        let unit = w.unit(late).unwrap();
        assert!(unit.crowded);
        assert_eq!(unit.position, pos(5.0, 0.0));
        assert_eq!(unit.current_target, Some(enemy));
    }
}

#[test]
fn test_crowd_limit_zero_disables_holding_back() {
    init_test_tracing();
    let settings = BattleSettings {
        max_attackers_per_target: 0,
        ..BattleSettings::with_seed(4)
    };
    let mut w = BattleWorld::new(settings);
    spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 100_000.0), pos(0.0, 0.0));
    for i in 0..6 {
        let angle = f64::from(i) * std::f64::consts::TAU / 6.0;
        spawn(
            &mut w,
            Team::Cube,
            UnitClass::Melee,
            UnitConfig::melee(),
            pos(angle.cos() * 1.2, angle.sin() * 1.2),
        );
    }
    let late = spawn(&mut w, Team::Cube, UnitClass::Melee, UnitConfig::melee(), pos(5.0, 0.0));

    w.tick();
    assert!(!w.unit(late).unwrap().crowded);
    assert_ne!(w.unit(late).unwrap().position, pos(5.0, 0.0));
}

#[test]
fn test_equidistant_targets_resolve_to_lowest_id() {
    let mut w = world(5);
    let hunter = spawn(&mut w, Team::Cube, UnitClass::Melee, UnitConfig::melee(), pos(0.0, 0.0));
    let first = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 100.0), pos(3.0, 0.0));
    spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 100.0), pos(-3.0, 0.0));

    w.tick();
    assert_eq!(w.unit(hunter).unwrap().current_target, Some(first));
}

#[test]
fn test_dead_target_is_replaced() {
    let mut w = world(6);
    let hunter = spawn_ready(&mut w, Team::Cube, UnitClass::Melee, steady_melee(500.0, 150.0), pos(0.0, 0.0));
    let weak = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 10.0), pos(1.0, 0.0));
    let other = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 10.0), pos(6.0, 0.0));

    let events = w.tick();
    assert_eq!(events.deaths(), vec![weak]);
    assert!(!w.index().contains(weak));

    w.tick();
    assert_eq!(w.unit(hunter).unwrap().current_target, Some(other));
    assert_eq!(w.roster(Team::Sphere), &[other]);
}

// =============================================================================
// Ranged
// =============================================================================

#[test]
fn test_ranged_projectile_hits_target() {
    let mut w = world(7);
    let archer = spawn_ready(&mut w, Team::Cube, UnitClass::Ranged, UnitConfig::ranged(), pos(0.0, 0.0));
    let target = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 500.0), pos(10.0, 0.0));

    let first = w.tick();
    let launched = first.iter().find_map(|e| match e {
        BattleEvent::ProjectileLaunched { projectile, source, travel_time, .. } => {
            assert_eq!(*source, archer);
            Some((*projectile, *travel_time))
        }
        _ => None,
    });
    let (projectile, travel_time) = launched.expect("archer should fire at once");
    assert!((travel_time - fixed_f(0.667)).abs() < fixed_f(0.01));
    assert_eq!(w.projectiles().active_count(), 1);

    let history = run_until(&mut w, 40, |events| {
        events
            .iter()
            .any(|e| matches!(e, BattleEvent::ProjectileImpact { projectile: p, .. } if *p == projectile))
    });
    let impact = history.last().unwrap();
    assert!(impact.iter().any(|e| matches!(
        e,
        BattleEvent::ProjectileImpact { hit: Some(hit), .. } if *hit == target
    )));
    assert!(impact.iter().any(|e| matches!(
        e,
        BattleEvent::HitTaken { target: t, source: Some(s), .. } if *t == target && *s == archer
    )));
    assert!(w.unit(target).unwrap().health < fixed_f(500.0));

    // Flight time is about 13-14 ticks.
    let ticks = history.len() as u32 + 1;
    let expected = (travel_time / tick_duration()).to_num::<f64>();
    assert!((f64::from(ticks) - expected).abs() <= 2.0, "landed after {ticks} ticks");
}

#[test]
fn test_projectile_misses_moved_target() {
    let mut w = world(8);
    spawn_ready(&mut w, Team::Cube, UnitClass::Ranged, UnitConfig::ranged(), pos(0.0, 0.0));
    let target = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 500.0), pos(10.0, 0.0));

    w.tick();
    w.despawn(target).unwrap();
    let decoy = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 500.0), pos(10.0, 5.0));

    let history = run_until(&mut w, 40, |events| {
        events
            .iter()
            .any(|e| matches!(e, BattleEvent::ProjectileImpact { .. }))
    });
    assert!(history
        .last()
        .unwrap()
        .iter()
        .any(|e| matches!(e, BattleEvent::ProjectileImpact { hit: None, .. })));
    assert_eq!(w.unit(decoy).unwrap().health, fixed_f(500.0));
}

#[test]
fn test_projectile_pool_grows_under_load() {
    init_test_tracing();
    let mut settings = BattleSettings::with_seed(9);
    settings.projectile.pool_capacity = 1;
    let mut w = BattleWorld::new(settings);

    for i in 0..3 {
        spawn_ready(
            &mut w,
            Team::Cube,
            UnitClass::Ranged,
            UnitConfig::ranged(),
            pos(0.0, f64::from(i) * 2.0),
        );
    }
    spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 5000.0), pos(10.0, 2.0));

    w.tick();
    assert_eq!(w.projectiles().active_count(), 3);
    assert!(w.projectiles().pool().capacity() >= 3);
}

#[test]
fn test_ranged_falls_back_to_melee_when_engaged() {
    let mut w = world(10);
    let archer = spawn_ready(&mut w, Team::Cube, UnitClass::Ranged, UnitConfig::ranged(), pos(0.0, 0.0));
    let brute = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 500.0), pos(1.0, 0.0));

    let events = w.tick();
    assert!(events.iter().any(|e| matches!(
        e,
        BattleEvent::AttackPerformed { attacker, target, style: AttackStyle::FallbackMelee, .. }
            if *attacker == archer && *target == brute
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, BattleEvent::ProjectileLaunched { .. })));
    assert_eq!(w.unit(archer).unwrap().melee_mode_target, Some(brute));
    assert!(w.unit(brute).unwrap().health < fixed_f(500.0));
}

#[test]
fn test_ranged_holds_position_in_range() {
    let mut w = world(11);
    let archer = spawn(&mut w, Team::Cube, UnitClass::Ranged, UnitConfig::ranged(), pos(0.0, 0.0));
    spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 5000.0), pos(10.0, 0.0));

    for _ in 0..30 {
        w.tick();
    }
    // Alone, there is nobody to drift away from.
    assert_eq!(w.unit(archer).unwrap().position, pos(0.0, 0.0));
}

// =============================================================================
// Commanders
// =============================================================================

#[test]
fn test_slam_hits_only_enemies_inside_radius() {
    let mut w = world(12);
    let boss = spawn(&mut w, Team::Cube, UnitClass::Commander, UnitConfig::commander(), pos(0.0, 0.0));
    let near = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 1000.0), pos(2.0, 0.0));
    let mid = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 1000.0), pos(0.0, 5.0));
    let far = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 1000.0), pos(-9.0, 0.0));
    assert_eq!(UnitConfig::commander().commander.unwrap().slam_radius, Fixed::from_num(7));

    let first = w.tick();
    assert!(first.iter().any(|e| matches!(
        e,
        BattleEvent::AbilityTriggered { unit, kind: AbilityKind::AreaSlam, .. } if *unit == boss
    )));

    let history = run_until(&mut w, 30, |events| {
        events
            .iter()
            .any(|e| matches!(e, BattleEvent::AbilityImpact { .. }))
    });
    let impact = history.last().unwrap();
    assert!(impact.iter().any(|e| matches!(
        e,
        BattleEvent::AbilityImpact { hits: 2, kind: AbilityKind::AreaSlam, .. }
    )));

    let knocked: Vec<UnitId> = impact
        .iter()
        .filter_map(|e| match e {
            BattleEvent::Knockback { unit, .. } => Some(*unit),
            _ => None,
        })
        .collect();
    assert_eq!(knocked, vec![near, mid]);

    assert!(w.unit(near).unwrap().health < fixed_f(1000.0));
    assert!(w.unit(mid).unwrap().health < fixed_f(1000.0));
    assert_eq!(w.unit(far).unwrap().health, fixed_f(1000.0));
    assert_eq!(w.unit(far).unwrap().position, pos(-9.0, 0.0));

    // Pushed straight away from the commander.
    assert!(w.unit(near).unwrap().position.x > fixed_f(2.0));
    assert!(w.unit(mid).unwrap().position.y > fixed_f(5.0));
    assert_eq!(w.unit(boss).unwrap().height, Fixed::ZERO);
    assert!(w.unit(boss).unwrap().ability_cooldown > Fixed::ZERO);
}

#[test]
fn test_slam_still_lands_after_target_dies_midwindup() {
    let mut w = world(17);
    let boss = spawn(&mut w, Team::Cube, UnitClass::Commander, UnitConfig::commander(), pos(0.0, 0.0));
    let target = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 5000.0), pos(2.0, 0.0));
    let bystander = spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 5000.0), pos(0.0, 4.0));

    w.tick();
    assert_eq!(w.unit(boss).unwrap().current_target, Some(target));
    assert!(w.unit(boss).unwrap().ability.is_some());

    w.tick();
    w.despawn(target).unwrap();

    let history = run_until(&mut w, 30, |events| {
        events
            .iter()
            .any(|e| matches!(e, BattleEvent::AbilityImpact { .. }))
    });
    assert!(history.last().unwrap().iter().any(|e| matches!(
        e,
        BattleEvent::AbilityImpact { unit, hits: 1, kind: AbilityKind::AreaSlam, .. } if *unit == boss
    )));
    assert!(w.unit(bystander).unwrap().health < fixed_f(5000.0));
}

#[test]
fn test_charge_dashes_and_pushes_along_line() {
    let mut w = world(13);
    let boss = spawn(&mut w, Team::Sphere, UnitClass::Commander, UnitConfig::commander(), pos(0.0, 0.0));
    let victim = spawn(&mut w, Team::Cube, UnitClass::Melee, dummy(UnitClass::Melee, 1000.0), pos(6.0, 0.0));

    let first = w.tick();
    assert!(first.iter().any(|e| matches!(
        e,
        BattleEvent::AbilityTriggered { unit, kind: AbilityKind::LineCharge, .. } if *unit == boss
    )));

    // Wind-back moves the commander away from the target first.
    w.tick();
    assert!(w.unit(boss).unwrap().position.x < Fixed::ZERO);

    let history = run_until(&mut w, 30, |events| {
        events
            .iter()
            .any(|e| matches!(e, BattleEvent::AbilityImpact { .. }))
    });
    let impact = history.last().unwrap();
    assert!(impact.iter().any(|e| matches!(
        e,
        BattleEvent::AbilityImpact { hits: 1, kind: AbilityKind::LineCharge, .. }
    )));

    // Dash stops 1.5 short of where the target stood.
    let landed = w.unit(boss).unwrap().position;
    assert!((landed.x - fixed_f(4.5)).abs() < fixed_f(0.01));

    let victim_state = w.unit(victim).unwrap();
    assert!(victim_state.health < fixed_f(1000.0));
    assert!(victim_state.position.x > fixed_f(12.0));
    assert!(victim_state.position.y.abs() < fixed_f(0.01));
}

#[test]
fn test_commander_ability_respects_cooldown() {
    let mut w = world(14);
    let boss = spawn(&mut w, Team::Cube, UnitClass::Commander, UnitConfig::commander(), pos(0.0, 0.0));
    spawn(&mut w, Team::Sphere, UnitClass::Melee, dummy(UnitClass::Melee, 100_000.0), pos(3.0, 0.0));

    let mut triggers = 0;
    // 3 seconds: one slam, cooldown still running.
    for _ in 0..60 {
        let events = w.tick();
        triggers += events
            .iter()
            .filter(|e| matches!(e, BattleEvent::AbilityTriggered { unit, .. } if *unit == boss))
            .count();
    }
    assert_eq!(triggers, 1);
}

#[test]
fn test_far_flung_units_do_not_break_the_tick() {
    let mut w = world(18);
    let left = spawn(&mut w, Team::Cube, UnitClass::Melee, UnitConfig::melee(), pos(-30_000.0, 0.0));
    let right = spawn(&mut w, Team::Sphere, UnitClass::Melee, UnitConfig::melee(), pos(30_000.0, 0.0));
    let archer = spawn(&mut w, Team::Cube, UnitClass::Ranged, UnitConfig::ranged(), pos(29_990.0, 0.0));

    for _ in 0..5 {
        w.tick();
    }
    // Out of detection range of each other; the archer is the only close enemy.
    assert!(w.unit(left).unwrap().current_target.is_none());
    assert_eq!(w.unit(left).unwrap().position, pos(-30_000.0, 0.0));
    assert_eq!(w.unit(right).unwrap().current_target, Some(archer));
    assert_eq!(w.outcome(), BattleOutcome::InProgress);
}

// =============================================================================
// Whole battles and data
// =============================================================================

#[test]
fn test_small_battle_reaches_outcome() {
    let mut w = battle_test_utils::fixtures::mixed_battle(15, 6);
    assert_eq!(w.outcome(), BattleOutcome::InProgress);

    let mut deaths = 0;
    for _ in 0..(20 * 240) {
        let events = w.tick();
        deaths += events.deaths().len();
        if w.outcome() != BattleOutcome::InProgress {
            break;
        }
    }
    assert_ne!(w.outcome(), BattleOutcome::InProgress);
    assert!(deaths >= 7);

    for (_, unit) in w.units().iter() {
        assert_eq!(unit.is_alive(), w.index().contains(unit.id));
        assert!(unit.health <= unit.config.max_health);
    }
}

#[test]
fn test_loadout_from_ron_drives_spawns() {
    let text = r#"(
        melee: (id: "cube_guard", max_health: 200.0, attack_damage: 20.0),
        ranged: (
            id: "cube_archer",
            attack_range: 12.0,
            ranged: Some((can_fallback_melee: false)),
        ),
        commander: (
            id: "cube_king",
            max_health: 800.0,
            commander: Some((slam_radius: 6.0)),
        ),
    )"#;
    let loadout = Loadout::from_ron("cube.ron", text).unwrap();
    assert_eq!(loadout.melee.max_health, Fixed::from_num(200));

    let mut w = world(16);
    let id = w
        .spawn(SpawnRequest::new(
            Team::Cube,
            UnitClass::Commander,
            loadout.for_class(UnitClass::Commander),
            Vec2Fixed::ZERO,
        ))
        .unwrap();
    let unit = w.unit(id).unwrap();
    assert_eq!(unit.health, Fixed::from_num(800));
    assert_eq!(unit.config.id, "cube_king");
}

#[test]
fn test_bad_loadout_is_rejected() {
    let missing_block = r#"(commander: (id: "no_block"))"#;
    assert!(matches!(
        Loadout::from_ron("bad.ron", missing_block),
        Err(BattleError::InvalidConfig { .. })
    ));
    assert!(matches!(
        Loadout::from_ron("broken.ron", "(melee: ("),
        Err(BattleError::DataParseError { .. })
    ));
}

#[test]
fn test_negative_ability_values_rejected_at_spawn() {
    let mut w = world(19);
    let mut config = UnitConfig::commander();
    if let Some(block) = config.commander.as_mut() {
        block.charge_distance = Fixed::from_num(-4);
    }
    let result = w.spawn(SpawnRequest::new(Team::Sphere, UnitClass::Commander, Arc::new(config), Vec2Fixed::ZERO));
    assert!(matches!(
        result,
        Err(BattleError::InvalidConfig { field: "commander.charge_distance", .. })
    ));
    assert!(w.units().is_empty());
}

#[test]
fn test_settings_from_ron() {
    let settings = BattleSettings::from_ron(
        "battle.ron",
        "(seed: 99, max_attackers_per_target: 4, projectile: (speed: 20.0))",
    )
    .unwrap();
    assert_eq!(settings.seed, 99);
    assert_eq!(settings.max_attackers_per_target, 4);
    assert_eq!(settings.projectile.speed, Fixed::from_num(20));
    assert_eq!(settings.projectile.arc_height, BattleSettings::default().projectile.arc_height);
}
