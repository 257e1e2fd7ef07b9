//! Drives a [`TacticalController`] through a scenario.
//!
//! Rosters are static apart from scheduled removals, so successive ticks
//! mostly exercise directive de-duplication and potential warm starts.

use std::io::Write;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use tactics_core::controller::{AbilityTarget, TacticalController, TickInput, TickReport};
use tactics_core::error::TacticsError;
use tactics_core::grid::Grid;
use tactics_core::math::Vec2Fixed;
use tactics_core::unit::{UnitId, UnitRecord};

use crate::scenario::{Removal, Scenario, ScenarioError};

/// Error type for scenario runs.
#[derive(Error, Debug)]
pub enum RunError {
    /// Scenario could not be loaded or materialised.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The controller rejected a tick.
    #[error("Tick failed: {0}")]
    Tick(#[from] TacticsError),
    /// Writing output failed.
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    /// Serializing a report failed.
    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Wall-clock statistics of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickTiming {
    /// Ticks measured.
    pub ticks: u64,
    /// Mean tick time in microseconds.
    pub mean_us: f64,
    /// Slowest tick in microseconds.
    pub max_us: f64,
    /// Total directives emitted.
    pub directives: usize,
    /// Total directives suppressed as repeats.
    pub suppressed: usize,
}

/// A scenario materialised into controller inputs.
pub struct ScenarioRunner {
    controller: TacticalController,
    terrain: Grid<bool>,
    own: Vec<UnitRecord>,
    enemy: Vec<UnitRecord>,
    civilians: Vec<UnitRecord>,
    anchor: Vec2Fixed,
    scout_points: Vec<Vec2Fixed>,
    ability_targets: Vec<AbilityTarget>,
    removals: Vec<Removal>,
}

impl ScenarioRunner {
    /// Build the controller and rosters for `scenario`.
    pub fn new(scenario: &Scenario) -> Result<Self, RunError> {
        let config = scenario.tactics_config()?;
        Ok(Self {
            controller: TacticalController::new(config)?,
            terrain: scenario.terrain()?,
            own: scenario.own_units(),
            enemy: scenario.enemy_units(),
            civilians: scenario.civilian_units(),
            anchor: scenario.anchor_point(),
            scout_points: scenario.scout_positions(),
            ability_targets: scenario.ability_target_list(),
            removals: scenario.removals.clone(),
        })
    }

    /// Underlying controller.
    #[must_use]
    pub fn controller(&self) -> &TacticalController {
        &self.controller
    }

    /// Units still alive on either side.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.own.len() + self.enemy.len() + self.civilians.len()
    }

    /// Run the next tick, applying removals scheduled for it first.
    pub fn step(&mut self) -> Result<TickReport, RunError> {
        let next = self.controller.ticks() + 1;
        let due: Vec<UnitId> = self
            .removals
            .iter()
            .filter(|r| r.tick == next)
            .map(|r| UnitId(r.unit))
            .collect();
        for id in due {
            self.remove(id);
        }

        let input = TickInput::new(&self.terrain, &self.own, &self.enemy)
            .with_civilians(&self.civilians)
            .with_anchor(self.anchor)
            .with_scout_points(&self.scout_points)
            .with_ability_targets(&self.ability_targets);
        Ok(self.controller.tick(&input)?)
    }

    fn remove(&mut self, id: UnitId) {
        let before = self.alive();
        self.own.retain(|u| u.id != id);
        self.enemy.retain(|u| u.id != id);
        self.civilians.retain(|u| u.id != id);
        if self.alive() == before {
            tracing::warn!(unit = id.0, "Scheduled removal of unknown unit");
        }
        self.controller.remove_unit(id);
        tracing::debug!(unit = id.0, "Unit removed");
    }

    /// Run `ticks` ticks, writing each report as one JSON line.
    pub fn run_to_writer<W: Write>(&mut self, ticks: u64, out: &mut W) -> Result<(), RunError> {
        for _ in 0..ticks {
            let report = self.step()?;
            serde_json::to_writer(&mut *out, &report)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Run `ticks` ticks and time each one.
    pub fn bench(&mut self, ticks: u64) -> Result<TickTiming, RunError> {
        let mut total = Duration::ZERO;
        let mut max = Duration::ZERO;
        let mut directives = 0;
        let mut suppressed = 0;
        for _ in 0..ticks {
            let start = Instant::now();
            let report = self.step()?;
            let elapsed = start.elapsed();
            total += elapsed;
            max = max.max(elapsed);
            directives += report.directives.len();
            suppressed += report.suppressed;
        }
        let mean_us = if ticks == 0 {
            0.0
        } else {
            total.as_secs_f64() * 1e6 / ticks as f64
        };
        Ok(TickTiming {
            ticks,
            mean_us,
            max_us: max.as_secs_f64() * 1e6,
            directives,
            suppressed,
        })
    }
}
