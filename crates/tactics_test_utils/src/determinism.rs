//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the controller produces identical
//! directives given identical inputs.
//!
//! # Testing Strategy
//!
//! Hosts replay recorded ticks to debug unit behaviour, which only works if
//! decisions are reproducible. Sources of non-determinism include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Directives are emitted in roster order, never in cache order.
//!
//! - **Heap tie-breaking**: equal path distances are ordered by cell index.
//!
//! - **System randomness**: the core never calls into it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tactics_core::config::TacticsConfig;
use tactics_core::controller::{TacticalController, TickInput, TickReport};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks run.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic run).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the runs were deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Controller is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a stateful process multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance the state by one step
/// * `hash` - Function to compute a state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Hash everything a host would observe from one tick.
#[must_use]
pub fn report_hash(report: &TickReport) -> u64 {
    let mut hasher = DefaultHasher::new();
    report.tick.hash(&mut hasher);
    report.directives.hash(&mut hasher);
    report.suppressed.hash(&mut hasher);
    for decision in &report.decisions {
        decision.unit.hash(&mut hasher);
        decision.stance.hash(&mut hasher);
    }
    report.potential_residual.map(f64::to_bits).hash(&mut hasher);
    hasher.finish()
}

/// Verify that two controllers fed the same input produce identical
/// report streams.
///
/// # Panics
///
/// Panics if the config is invalid or a tick fails.
pub fn verify_controller_determinism(
    config: &TacticsConfig,
    input: &TickInput<'_>,
    ticks: u64,
) -> DeterminismResult {
    verify_determinism(
        2,
        ticks,
        || {
            let controller =
                TacticalController::new(config.clone()).expect("test config must be valid");
            (controller, 0u64)
        },
        |state: &mut (TacticalController, u64)| {
            let report = state.0.tick(input).expect("tick failed");
            state.1 = compute_hash(&(state.1, report_hash(&report)));
        },
        |state| state.1,
    )
}

/// Compare two controllers tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(tick)` for the first tick whose reports
/// differ.
///
/// # Panics
///
/// Panics if the config is invalid or a tick fails.
pub fn find_first_divergence(
    config: &TacticsConfig,
    input: &TickInput<'_>,
    ticks: u64,
) -> Option<u64> {
    let mut first = TacticalController::new(config.clone()).expect("test config must be valid");
    let mut second = TacticalController::new(config.clone()).expect("test config must be valid");

    for tick in 1..=ticks {
        let a = first.tick(input).expect("tick failed");
        let b = second.tick(input).expect("tick failed");
        if report_hash(&a) != report_hash(&b) {
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for engine inputs.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use tactics_core::grid::{Cell, Grid};
    use tactics_core::math::Vec2Fixed;
    use tactics_core::unit::{Faction, UnitId, UnitRecord};

    /// Generate a cell inside a `width x height` grid.
    pub fn arb_cell(width: u32, height: u32) -> impl Strategy<Value = Cell> {
        (0..width, 0..height).prop_map(|(x, y)| Cell::new(x, y))
    }

    /// Generate a position inside a `width x height` grid, snapped to
    /// quarter cells.
    pub fn arb_position(width: u32, height: u32) -> impl Strategy<Value = Vec2Fixed> {
        let max_x = (width * 4 - 1) as i32;
        let max_y = (height * 4 - 1) as i32;
        (0..=max_x, 0..=max_y)
            .prop_map(|(x, y)| Vec2Fixed::from_f64(f64::from(x) / 4.0, f64::from(y) / 4.0))
    }

    /// Generate an armed unit of `faction` inside the grid.
    pub fn arb_unit(faction: Faction, width: u32, height: u32) -> impl Strategy<Value = UnitRecord> {
        (
            any::<u16>(),
            arb_position(width, height),
            1.0f64..400.0,
            0.0f64..100.0,
            0.5f64..40.0,
            0.0f64..9.0,
        )
            .prop_map(move |(id, position, health, shield, dps, range)| {
                let mut unit = UnitRecord::new(UnitId(u64::from(id)), faction, position);
                unit.health = health;
                unit.shield = shield;
                unit.ground_dps = dps;
                unit.ground_range = range;
                unit.air_range = range;
                unit.sight_range = range;
                unit
            })
    }

    /// Generate up to `max` armed units of `faction`.
    pub fn arb_roster(
        faction: Faction,
        width: u32,
        height: u32,
        max: usize,
    ) -> impl Strategy<Value = Vec<UnitRecord>> {
        prop::collection::vec(arb_unit(faction, width, height), 0..=max)
    }

    /// Generate terrain where roughly `blocked_percent` of cells are walls.
    pub fn arb_terrain(
        width: u32,
        height: u32,
        blocked_percent: u8,
    ) -> impl Strategy<Value = Grid<bool>> {
        let cells = (width * height) as usize;
        prop::collection::vec(0u8..100, cells).prop_map(move |rolls| {
            Grid::from_fn(width, height, |c| {
                rolls[(c.y * width + c.x) as usize] >= blocked_percent
            })
        })
    }

    /// Generate a positive cost grid with values in `[1, 10)`.
    pub fn arb_cost_grid(width: u32, height: u32) -> impl Strategy<Value = Grid<f64>> {
        let cells = (width * height) as usize;
        prop::collection::vec(1.0f64..10.0, cells).prop_map(move |values| {
            Grid::from_fn(width, height, |c| values[(c.y * width + c.x) as usize])
        })
    }
}
