//! # Tactics Core
//!
//! Per-tick tactical decision engine for real-time strategy armies.
//!
//! Given terrain walkability and the visible rosters, each tick the engine
//! predicts where own units would win a fight, finds short paths toward
//! targets and toward safety, and emits one de-duplicated command per army
//! unit.
//!
//! This crate is a pure in-process library:
//! - No IO
//! - No threads
//! - No system randomness
//!
//! ## Crate Structure
//!
//! - [`grid`] - Rectangular fields and cell coordinates
//! - [`influence`] - Health and dps presence maps
//! - [`prediction`] - Lanchester-style combat confidence
//! - [`multigrid`] - Potential field relaxation
//! - [`pathfinding`] - Multi-source Dijkstra
//! - [`controller`] - Attack / Hold / Retreat decisions
//! - [`config`] - Tunables

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod config;
pub mod controller;
pub mod directive;
pub mod error;
pub mod grid;
pub mod influence;
pub mod math;
pub mod multigrid;
pub mod pathfinding;
pub mod prediction;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CostModel, RetreatMode, TacticsConfig};
    pub use crate::controller::{
        AbilityTarget, TacticalController, TickInput, TickReport, UnitDecision,
    };
    pub use crate::directive::{AbilityId, ActionCache, CombatStance, Directive, UnitDirective};
    pub use crate::error::{Result, TacticsError};
    pub use crate::grid::{Cell, Grid, Neighbourhood, BLOCKED};
    pub use crate::influence::{InfluenceBuilder, Presence, RangePolicy};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::multigrid::{CycleMode, PotentialField, Smoother, SolverConfig};
    pub use crate::pathfinding::{shortest_paths, PathResult};
    pub use crate::prediction::{CombatPrediction, ExponentModel};
    pub use crate::unit::{CasterStats, Faction, UnitId, UnitRecord};
}
