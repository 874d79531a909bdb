//! Balance testing utilities.
//!
//! Runs batches of seeded battles to completion and summarizes who won,
//! how long it took and how much of each army survived. Mirror matches
//! should land near 50/50 across seeds.

use battle_core::components::Team;
use battle_core::data::{BattleSettings, Loadout};
use battle_core::error::Result;
use battle_core::simulation::{BattleOutcome, BattleWorld};
use tracing::debug;

use crate::formation::{spawn_team, FormationShape, TeamSetup};

/// Result of a simulated battle.
#[derive(Debug, Clone)]
pub struct BattleResult {
    /// The winning team (None if draw/timeout).
    pub winner: Option<Team>,
    /// Simulation ticks elapsed.
    pub ticks: u64,
    /// Starting army value for Cube.
    pub army_value_cube: u32,
    /// Starting army value for Sphere.
    pub army_value_sphere: u32,
    /// Remaining army value for Cube.
    pub remaining_value_cube: u32,
    /// Remaining army value for Sphere.
    pub remaining_value_sphere: u32,
}

impl BattleResult {
    /// Winner's surviving value over the loser's starting value.
    #[must_use]
    pub fn remaining_ratio(&self) -> f64 {
        match self.winner {
            Some(Team::Cube) if self.army_value_sphere > 0 => {
                self.remaining_value_cube as f64 / self.army_value_sphere as f64
            }
            Some(Team::Sphere) if self.army_value_cube > 0 => {
                self.remaining_value_sphere as f64 / self.army_value_cube as f64
            }
            _ => 0.0,
        }
    }
}

/// Statistics for a set of battles.
#[derive(Debug, Clone, Default)]
pub struct BattleStats {
    /// Total battles run.
    pub total_battles: u32,
    /// Wins for Cube.
    pub wins_cube: u32,
    /// Wins for Sphere.
    pub wins_sphere: u32,
    /// Draws (timeouts or simultaneous elimination).
    pub draws: u32,
    /// Average ticks to resolution.
    pub avg_ticks: f64,
    /// Average remaining value ratio (winner's remaining / loser's starting).
    pub avg_remaining_ratio: f64,
}

impl BattleStats {
    /// Aggregate a batch of results.
    #[must_use]
    pub fn from_results(results: &[BattleResult]) -> Self {
        let mut stats = Self {
            total_battles: results.len() as u32,
            ..Self::default()
        };
        if results.is_empty() {
            return stats;
        }

        let mut ticks = 0u64;
        let mut ratio = 0.0;
        for result in results {
            match result.winner {
                Some(Team::Cube) => stats.wins_cube += 1,
                Some(Team::Sphere) => stats.wins_sphere += 1,
                None => stats.draws += 1,
            }
            ticks += result.ticks;
            ratio += result.remaining_ratio();
        }
        stats.avg_ticks = ticks as f64 / results.len() as f64;
        stats.avg_remaining_ratio = ratio / results.len() as f64;
        stats
    }

    /// Cube win rate (0.0 to 1.0).
    pub fn win_rate_cube(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_cube as f64 / self.total_battles as f64
    }

    /// Sphere win rate (0.0 to 1.0).
    pub fn win_rate_sphere(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_sphere as f64 / self.total_battles as f64
    }

    /// Check if the matchup is balanced (Cube win rate within range).
    pub fn is_balanced(&self, min_rate: f64, max_rate: f64) -> bool {
        let rate = self.win_rate_cube();
        rate >= min_rate && rate <= max_rate
    }
}

/// Unit composition for one side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArmyComposition {
    /// Melee count.
    pub melee: usize,
    /// Ranged count.
    pub ranged: usize,
    /// Commander count.
    pub commanders: usize,
}

impl ArmyComposition {
    /// Create a new army composition.
    pub const fn new(melee: usize, ranged: usize, commanders: usize) -> Self {
        Self {
            melee,
            ranged,
            commanders,
        }
    }

    /// Army value under a loadout.
    pub fn total_cost(&self, loadout: &Loadout) -> u32 {
        self.melee as u32 * loadout.melee.cost
            + self.ranged as u32 * loadout.ranged.cost
            + self.commanders as u32 * loadout.commander.cost
    }

    /// Units in the army.
    pub const fn total_units(&self) -> usize {
        self.melee + self.ranged + self.commanders
    }
}

/// Sum of `cost` over a team's living units.
pub fn living_value(world: &BattleWorld, team: Team) -> u32 {
    world
        .roster(team)
        .iter()
        .filter_map(|&id| world.unit(id))
        .filter(|unit| unit.is_alive())
        .map(|unit| unit.config.cost)
        .sum()
}

/// Everything needed to run one battle.
#[derive(Debug, Clone)]
pub struct Matchup {
    /// Cube loadout.
    pub cube_loadout: Loadout,
    /// Sphere loadout.
    pub sphere_loadout: Loadout,
    /// Cube army.
    pub cube: ArmyComposition,
    /// Sphere army.
    pub sphere: ArmyComposition,
    /// Formation both sides use.
    pub shape: FormationShape,
    /// Distance between the two formations.
    pub gap: f64,
    /// Battles running longer than this are draws.
    pub max_ticks: u64,
}

impl Matchup {
    /// Mirror match with the standard loadout.
    #[must_use]
    pub fn mirror(army: ArmyComposition) -> Self {
        Self {
            cube_loadout: Loadout::standard(),
            sphere_loadout: Loadout::standard(),
            cube: army,
            sphere: army,
            shape: FormationShape::Line,
            gap: 30.0,
            max_ticks: 20 * 180,
        }
    }

    /// Run one battle under `settings`.
    pub fn run(&self, settings: BattleSettings) -> Result<BattleResult> {
        let mut world = BattleWorld::new(settings);
        let sides = [
            (Team::Cube, &self.cube_loadout, self.cube),
            (Team::Sphere, &self.sphere_loadout, self.sphere),
        ];
        for (team, loadout, army) in sides {
            let setup = TeamSetup::facing_off(team, self.shape, self.gap).with_counts(
                army.melee,
                army.ranged,
                army.commanders,
            );
            spawn_team(&mut world, loadout, &setup)?;
        }

        let army_value_cube = living_value(&world, Team::Cube);
        let army_value_sphere = living_value(&world, Team::Sphere);

        let mut outcome = world.outcome();
        while outcome == BattleOutcome::InProgress && world.get_tick() < self.max_ticks {
            world.tick();
            outcome = world.outcome();
        }

        let winner = match outcome {
            BattleOutcome::Victory(team) => Some(team),
            BattleOutcome::Draw | BattleOutcome::InProgress => None,
        };
        debug!(seed = world.settings().seed, ticks = world.get_tick(), ?winner, "Battle finished");

        Ok(BattleResult {
            winner,
            ticks: world.get_tick(),
            army_value_cube,
            army_value_sphere,
            remaining_value_cube: living_value(&world, Team::Cube),
            remaining_value_sphere: living_value(&world, Team::Sphere),
        })
    }

    /// Run one battle per seed and aggregate.
    pub fn run_batch(&self, seeds: impl IntoIterator<Item = u64>) -> Result<BattleStats> {
        let results = seeds
            .into_iter()
            .map(|seed| self.run(BattleSettings::with_seed(seed)))
            .collect::<Result<Vec<_>>>()?;
        Ok(BattleStats::from_results(&results))
    }
}
