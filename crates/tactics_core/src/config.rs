//! Tunables for one controller session.
//!
//! Every field has a default, so a RON document only needs the values it
//! overrides:
//!
//! ```
//! use tactics_core::config::TacticsConfig;
//!
//! let config = TacticsConfig::from_ron_str("(attack_hop_cap: 5)").unwrap();
//! assert_eq!(config.attack_hop_cap, 5);
//! assert_eq!(config.retreat_hop_cap, 8);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticsError};
use crate::grid::{Cell, Neighbourhood, BLOCKED};
use crate::influence::RangePolicy;
use crate::multigrid::{Smoother, SolverConfig, MIN_COARSE_FLOOR};
use crate::prediction::{CombatPrediction, ExponentModel};

/// Risk surcharge added to the attack-path cost of walkable cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CostModel {
    /// `1 + max(0, -k * confidence)`: losing ground is expensive.
    Confidence {
        /// Weight `k`.
        risk_weight: f64,
    },
    /// `1 + k * enemy_dps`: any threat is expensive.
    EnemyDps {
        /// Weight `k`.
        risk_weight: f64,
    },
}

impl Default for CostModel {
    fn default() -> Self {
        Self::Confidence { risk_weight: 7.0 }
    }
}

impl CostModel {
    /// Weight of the surcharge.
    #[must_use]
    pub fn risk_weight(self) -> f64 {
        match self {
            Self::Confidence { risk_weight } | Self::EnemyDps { risk_weight } => risk_weight,
        }
    }

    /// Cost of entering `cell`; [`BLOCKED`] where the terrain is.
    #[must_use]
    pub fn cell_cost(self, prediction: &CombatPrediction, walkable: bool, cell: Cell) -> f64 {
        if !walkable {
            return BLOCKED;
        }
        match self {
            Self::Confidence { risk_weight } => {
                1.0 + (-risk_weight * prediction.confidence(cell)).max(0.0)
            }
            Self::EnemyDps { risk_weight } => 1.0 + risk_weight * prediction.enemy_threat(cell),
        }
    }
}

/// How retreating units pick where to go.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RetreatMode {
    /// Follow the capped shortest path toward the nearest civilian.
    Paths,
    /// Step along the ascent of the civilian potential field.
    Potential {
        /// Distance moved per directive, in cells.
        step: f64,
    },
}

impl Default for RetreatMode {
    fn default() -> Self {
        Self::Paths
    }
}

/// Controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Cells walked along the attack path before reading confidence.
    pub attack_hop_cap: usize,
    /// Cells walked along the retreat path.
    pub retreat_hop_cap: usize,
    /// Minimum confidence at the attack path's far end to attack.
    pub attack_threshold: f64,
    /// Path cost surcharge.
    pub cost_model: CostModel,
    /// Pathfinder connectivity.
    pub neighbourhood: Neighbourhood,
    /// Footprint radius of each unit.
    pub range_policy: RangePolicy,
    /// Force exponent field.
    pub exponent: ExponentModel,
    /// Retreat target selection.
    pub retreat_mode: RetreatMode,
    /// Potential field solver.
    pub solver: SolverConfig,
}

impl Default for TacticsConfig {
    fn default() -> Self {
        Self {
            attack_hop_cap: 8,
            retreat_hop_cap: 8,
            attack_threshold: 0.0,
            cost_model: CostModel::default(),
            neighbourhood: Neighbourhood::Diagonal,
            range_policy: RangePolicy::Sight,
            exponent: ExponentModel::default(),
            retreat_mode: RetreatMode::Paths,
            solver: SolverConfig::default(),
        }
    }
}

impl TacticsConfig {
    /// Parse a RON document and validate it.
    pub fn from_ron_str(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty RON.
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| TacticsError::InvalidConfig(e.to_string()))
    }

    /// Reject values the controller cannot work with.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.attack_hop_cap == 0 {
            problems.push("attack_hop_cap must be at least 1".to_string());
        }
        if self.retreat_hop_cap == 0 {
            problems.push("retreat_hop_cap must be at least 1".to_string());
        }
        if !self.attack_threshold.is_finite() {
            problems.push("attack_threshold must be finite".to_string());
        }
        let weight = self.cost_model.risk_weight();
        if !(weight.is_finite() && weight >= 0.0) {
            problems.push(format!("risk_weight must be finite and >= 0, got {weight}"));
        }
        match self.exponent {
            ExponentModel::Terrain { sigma } if !(sigma.is_finite() && sigma >= 0.0) => {
                problems.push(format!("exponent sigma must be finite and >= 0, got {sigma}"));
            }
            ExponentModel::Uniform(e) if !(1.0..=2.0).contains(&e) => {
                problems.push(format!("uniform exponent must lie in [1, 2], got {e}"));
            }
            _ => {}
        }
        if let RetreatMode::Potential { step } = self.retreat_mode {
            if !(step.is_finite() && step > 0.0) {
                problems.push(format!("retreat step must be positive, got {step}"));
            }
        }

        let solver = &self.solver;
        if solver.coarse_floor < MIN_COARSE_FLOOR {
            problems.push(format!(
                "solver coarse_floor must be at least {MIN_COARSE_FLOOR}, got {}",
                solver.coarse_floor
            ));
        }
        if !(solver.screening.is_finite() && solver.screening >= 0.0) {
            problems.push(format!(
                "solver screening must be finite and >= 0, got {}",
                solver.screening
            ));
        }
        if let Smoother::Jacobi { omega } = solver.smoother {
            if !(omega > 0.0 && omega <= 1.0) {
                problems.push(format!("jacobi omega must lie in (0, 1], got {omega}"));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(TacticsError::InvalidConfig(problems.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::influence::Presence;
    use crate::grid::Grid;
    use crate::multigrid::CycleMode;

    #[test]
    fn test_defaults_are_valid() {
        let config = TacticsConfig::default();
        config.validate().unwrap();
        assert_eq!(config.attack_hop_cap, 8);
        assert_eq!(config.retreat_hop_cap, 8);
        assert_eq!(config.cost_model.risk_weight(), 7.0);
        assert_eq!(config.neighbourhood, Neighbourhood::Diagonal);
        assert_eq!(config.range_policy, RangePolicy::Sight);
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = TacticsConfig::from_ron_str(
            "(
                retreat_hop_cap: 4,
                neighbourhood: Orthogonal,
                solver: (cycle: W, pre_sweeps: 3),
            )",
        )
        .unwrap();
        assert_eq!(config.retreat_hop_cap, 4);
        assert_eq!(config.attack_hop_cap, 8);
        assert_eq!(config.neighbourhood, Neighbourhood::Orthogonal);
        assert_eq!(config.solver.cycle, CycleMode::W);
        assert_eq!(config.solver.pre_sweeps, 3);
        assert_eq!(config.solver.post_sweeps, 2);
    }

    #[test]
    fn test_round_trip_through_ron() {
        let config = TacticsConfig {
            retreat_mode: RetreatMode::Potential { step: 3.0 },
            cost_model: CostModel::EnemyDps { risk_weight: 0.5 },
            ..TacticsConfig::default()
        };
        let text = config.to_ron_string().unwrap();
        assert_eq!(TacticsConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = TacticsConfig::from_ron_str("(attack_hop_cap: \"many\")").unwrap_err();
        assert!(matches!(err, TacticsError::ConfigParse(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = TacticsConfig {
            attack_threshold: f64::NAN,
            exponent: ExponentModel::Terrain { sigma: -1.0 },
            solver: SolverConfig {
                coarse_floor: 0,
                ..SolverConfig::default()
            },
            ..TacticsConfig::default()
        };
        let Err(TacticsError::InvalidConfig(message)) = config.validate() else {
            panic!("expected InvalidConfig");
        };
        assert!(message.contains("attack_threshold"));
        assert!(message.contains("sigma"));
        assert!(message.contains("coarse_floor"));
    }

    #[test]
    fn test_zero_hop_caps_rejected() {
        for (attack, retreat) in [(0, 8), (8, 0)] {
            let config = TacticsConfig {
                attack_hop_cap: attack,
                retreat_hop_cap: retreat,
                ..TacticsConfig::default()
            };
            let Err(TacticsError::InvalidConfig(message)) = config.validate() else {
                panic!("expected InvalidConfig for caps ({attack}, {retreat})");
            };
            assert!(message.contains("hop_cap"));
        }
        let minimal = TacticsConfig {
            attack_hop_cap: 1,
            retreat_hop_cap: 1,
            ..TacticsConfig::default()
        };
        minimal.validate().unwrap();
    }

    #[test]
    fn test_unscreened_solver_is_accepted() {
        let config = TacticsConfig::from_ron_str("(solver: (screening: 0.0))").unwrap();
        assert_eq!(config.solver.screening, 0.0);
    }

    #[test]
    fn test_cost_models() {
        let cell = Cell::new(1, 1);
        let mut enemy = Presence::empty(3, 3);
        enemy.health[cell] = 100.0;
        enemy.dps[cell] = 2.0;
        let prediction =
            CombatPrediction::new(Presence::empty(3, 3), enemy, Grid::filled(3, 3, 1.0)).unwrap();

        let confidence = CostModel::Confidence { risk_weight: 7.0 };
        let expected = 1.0 + 7.0 * (200.0_f64).ln_1p();
        assert!((confidence.cell_cost(&prediction, true, cell) - expected).abs() < 1e-9);
        assert_eq!(confidence.cell_cost(&prediction, true, Cell::new(0, 0)), 1.0);
        assert_eq!(confidence.cell_cost(&prediction, false, cell), BLOCKED);

        let dps = CostModel::EnemyDps { risk_weight: 0.5 };
        assert_eq!(dps.cell_cost(&prediction, true, cell), 2.0);
    }
}
