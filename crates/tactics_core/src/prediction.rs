//! Combat outcome prediction from two influence maps.
//!
//! A Lanchester-style force model: the fighting strength of a side at a
//! cell is `dps * health^e`, where the exponent `e` in `[1, 2]` reflects
//! how many units can engage at once. Open ground approaches the square
//! law (`e = 2`), chokepoints approach linear attrition (`e = 1`).
//!
//! Confidence is `ln(1 + force) - ln(1 + enemy_force)`. It is finite when
//! either side is absent, zero when both are, and exactly antisymmetric
//! under swapping the sides.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::{Cell, Grid};
use crate::influence::Presence;

/// How the force exponent field is derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExponentModel {
    /// Gaussian-smoothed walkability with the given sigma (in cells).
    Terrain {
        /// Smoothing radius.
        sigma: f64,
    },
    /// The same exponent everywhere.
    Uniform(f64),
}

impl Default for ExponentModel {
    fn default() -> Self {
        Self::Terrain { sigma: 5.0 }
    }
}

impl ExponentModel {
    /// Build the exponent field for a walkability grid.
    #[must_use]
    pub fn field(&self, walkable: &Grid<bool>) -> Grid<f64> {
        match *self {
            Self::Terrain { sigma } => exponent_field(walkable, sigma),
            Self::Uniform(e) => walkable.map(|_| e.clamp(1.0, 2.0)),
        }
    }
}

/// `1 + clip(blur(walkable)², 0, 1)`: open terrain trends to 2,
/// narrow corridors to 1.
#[must_use]
pub fn exponent_field(walkable: &Grid<bool>, sigma: f64) -> Grid<f64> {
    Grid::mask_from_walkability(walkable)
        .gaussian_blur(sigma)
        .map(|&d| 1.0 + (d * d).clamp(0.0, 1.0))
}

/// Lanchester force of one side at a cell.
#[inline]
fn force(dps: f64, health: f64, exponent: f64) -> f64 {
    if dps <= 0.0 || health <= 0.0 {
        0.0
    } else {
        dps * health.powf(exponent)
    }
}

/// Own and enemy presence plus the exponent field for one tick.
///
/// Confidence is evaluated per cell on demand rather than for the whole map.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatPrediction {
    own: Presence,
    enemy: Presence,
    exponent: Grid<f64>,
}

impl CombatPrediction {
    /// Combine presences and exponents; all grids must share one shape.
    pub fn new(own: Presence, enemy: Presence, exponent: Grid<f64>) -> Result<Self> {
        exponent.ensure_same_shape(&own.health)?;
        exponent.ensure_same_shape(&own.dps)?;
        exponent.ensure_same_shape(&enemy.health)?;
        exponent.ensure_same_shape(&enemy.dps)?;
        Ok(Self {
            own,
            enemy,
            exponent,
        })
    }

    /// Own presence.
    #[must_use]
    pub fn own(&self) -> &Presence {
        &self.own
    }

    /// Enemy presence.
    #[must_use]
    pub fn enemy(&self) -> &Presence {
        &self.enemy
    }

    /// Force exponent field.
    #[must_use]
    pub fn exponent(&self) -> &Grid<f64> {
        &self.exponent
    }

    /// `(width, height)` of every map in the prediction.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.exponent.dimensions()
    }

    /// Own Lanchester force at `cell`.
    #[must_use]
    pub fn own_force(&self, cell: Cell) -> f64 {
        force(
            self.own.dps_at(cell),
            self.own.health_at(cell),
            self.exponent[cell],
        )
    }

    /// Enemy Lanchester force at `cell`.
    #[must_use]
    pub fn enemy_force(&self, cell: Cell) -> f64 {
        force(
            self.enemy.dps_at(cell),
            self.enemy.health_at(cell),
            self.exponent[cell],
        )
    }

    /// Signed advantage at `cell`; positive favours own units.
    #[must_use]
    pub fn confidence(&self, cell: Cell) -> f64 {
        let own = self.own_force(cell);
        let enemy = self.enemy_force(cell);
        if own == 0.0 && enemy == 0.0 {
            return 0.0;
        }
        own.ln_1p() - enemy.ln_1p()
    }

    /// Enemy dps presence at `cell`.
    #[must_use]
    pub fn enemy_threat(&self, cell: Cell) -> f64 {
        self.enemy.dps_at(cell)
    }

    /// The same prediction seen from the enemy side.
    #[must_use]
    pub fn swapped(self) -> Self {
        Self {
            own: self.enemy,
            enemy: self.own,
            exponent: self.exponent,
        }
    }

    /// Confidence for every cell. Meant for hosts and diagnostics; the
    /// controller queries single cells.
    #[must_use]
    pub fn confidence_field(&self) -> Grid<f64> {
        Grid::from_fn(self.exponent.width(), self.exponent.height(), |c| {
            self.confidence(c)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TacticsError;

    fn presence_with(cell: Cell, health: f64, dps: f64) -> Presence {
        let mut p = Presence::empty(8, 8);
        p.health[cell] = health;
        p.dps[cell] = dps;
        p
    }

    fn uniform(e: f64) -> Grid<f64> {
        Grid::filled(8, 8, e)
    }

    #[test]
    fn test_empty_rosters_tie() {
        let prediction =
            CombatPrediction::new(Presence::empty(8, 8), Presence::empty(8, 8), uniform(2.0))
                .unwrap();
        for cell in prediction.exponent().cells() {
            assert_eq!(prediction.confidence(cell), 0.0);
        }
    }

    #[test]
    fn test_square_law_favours_larger_army() {
        let cell = Cell::new(3, 3);
        let prediction = CombatPrediction::new(
            presence_with(cell, 100.0, 10.0),
            presence_with(cell, 50.0, 5.0),
            uniform(2.0),
        )
        .unwrap();
        let expected = (10.0_f64 * 100.0 * 100.0).ln_1p() - (5.0_f64 * 50.0 * 50.0).ln_1p();
        assert!((prediction.confidence(cell) - expected).abs() < 1e-12);
        assert!(prediction.confidence(cell) > 0.0);
    }

    #[test]
    fn test_one_sided_presence_is_finite() {
        let cell = Cell::new(1, 1);
        let prediction = CombatPrediction::new(
            Presence::empty(8, 8),
            presence_with(cell, 80.0, 6.0),
            uniform(1.5),
        )
        .unwrap();
        let c = prediction.confidence(cell);
        assert!(c.is_finite());
        assert!(c < 0.0);
        assert_eq!(prediction.enemy_threat(cell), 6.0);
    }

    #[test]
    fn test_swapping_negates_confidence() {
        let cell = Cell::new(4, 2);
        let prediction = CombatPrediction::new(
            presence_with(cell, 120.0, 7.0),
            presence_with(cell, 90.0, 11.0),
            uniform(1.7),
        )
        .unwrap();
        let c = prediction.confidence(cell);
        let swapped = prediction.swapped();
        assert_eq!(swapped.confidence(cell), -c);
    }

    #[test]
    fn test_health_without_dps_has_no_force() {
        let cell = Cell::new(2, 2);
        let prediction = CombatPrediction::new(
            presence_with(cell, 500.0, 0.0),
            Presence::empty(8, 8),
            uniform(2.0),
        )
        .unwrap();
        assert_eq!(prediction.own_force(cell), 0.0);
        assert_eq!(prediction.confidence(cell), 0.0);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = CombatPrediction::new(
            Presence::empty(8, 8),
            Presence::empty(8, 9),
            uniform(2.0),
        );
        assert!(matches!(
            result,
            Err(TacticsError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_exponent_open_ground_is_two() {
        let field = exponent_field(&Grid::open(16, 16), 5.0);
        for &e in field.values() {
            assert!((e - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_exponent_drops_in_corridor() {
        // A one-cell corridor through solid rock.
        let walkable = Grid::from_fn(31, 31, |c| c.y == 15);
        let field = exponent_field(&walkable, 3.0);
        let corridor = field[Cell::new(15, 15)];
        assert!(corridor >= 1.0 && corridor < 1.2, "corridor exponent {corridor}");
        for &e in field.values() {
            assert!((1.0..=2.0).contains(&e));
        }
    }

    #[test]
    fn test_uniform_model_is_clamped() {
        let field = ExponentModel::Uniform(3.0).field(&Grid::open(4, 4));
        assert!(field.values().iter().all(|&e| e == 2.0));
    }

    #[test]
    fn test_confidence_field_matches_point_queries() {
        let cell = Cell::new(5, 5);
        let prediction = CombatPrediction::new(
            presence_with(cell, 10.0, 1.0),
            presence_with(Cell::new(1, 1), 10.0, 1.0),
            uniform(2.0),
        )
        .unwrap();
        let field = prediction.confidence_field();
        assert_eq!(field[cell], prediction.confidence(cell));
        assert_eq!(field[Cell::new(1, 1)], prediction.confidence(Cell::new(1, 1)));
    }
}
