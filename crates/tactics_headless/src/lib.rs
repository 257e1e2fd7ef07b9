//! Headless scenario runner for the tactics engine.
//!
//! Loads a scenario from RON, feeds its rosters to a
//! [`TacticalController`](tactics_core::controller::TacticalController)
//! every tick and writes the resulting reports:
//!
//! - **stdout**: one JSON tick report per line
//! - **stderr**: logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! cargo run -p tactics_headless -- run --scenario crates/tactics_headless/scenarios/skirmish.ron
//! cargo run -p tactics_headless -- bench --scenario crates/tactics_headless/scenarios/skirmish.ron --ticks 5000
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod runner;
pub mod scenario;

pub use runner::{RunError, ScenarioRunner, TickTiming};
pub use scenario::{Scenario, ScenarioError};
