//! Geometric multigrid relaxation for the retreat potential field.
//!
//! Solves the screened, masked Poisson problem
//!
//! ```text
//! (n·x − s) / h² + κ·x = rhs
//! ```
//!
//! where `s` is the mask-weighted sum of the four orthogonal neighbours of a
//! cell and `n` the sum of their mask weights. Blocked cells (mask `0`) are
//! excluded from both, are never updated and carry no residual, so walls
//! neither contribute nor receive potential. `κ > 0` keeps the warm-started
//! field bounded on a domain without fixed-value boundaries; `κ = 0` is the
//! plain masked Poisson problem.
//!
//! One cycle pre-smooths, restricts the residual to a half-resolution grid by
//! block means, recurses, expands the coarse correction back by repetition,
//! adds it and post-smooths. Recursion stops once either dimension drops
//! below the coarse floor (never less than [`MIN_COARSE_FLOOR`]), so depth is
//! bounded by `log2(min(W, H))`. A cycle whose result has a larger residual
//! norm than its input is discarded, so [`multigrid_cycle`] never increases
//! the residual.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grid::{Cell, Grid, Neighbourhood};

/// Floor for the relaxation divisor at isolated cells.
const MIN_DIVISOR: f64 = 1e-3;

/// Smallest usable coarse floor. A 1x1 level restricts to itself.
pub const MIN_COARSE_FLOOR: u32 = 2;

/// Recursion schedule of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CycleMode {
    /// One coarse visit per level.
    #[default]
    V,
    /// Two coarse visits per level.
    W,
    /// An F-cycle followed by a V-cycle per level.
    F,
}

impl CycleMode {
    /// Coarse-grid visits made from one level.
    #[must_use]
    pub fn sub_cycles(self) -> &'static [CycleMode] {
        match self {
            Self::V => &[Self::V],
            Self::W => &[Self::W, Self::W],
            Self::F => &[Self::F, Self::V],
        }
    }
}

/// Relaxation sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Smoother {
    /// Red-black Gauss-Seidel.
    RedBlack,
    /// Weighted Jacobi.
    Jacobi {
        /// Relaxation weight in `(0, 1]`.
        omega: f64,
    },
}

impl Default for Smoother {
    fn default() -> Self {
        Self::RedBlack
    }
}

/// Multigrid solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Run the solver at all. Disabling it is a valid way to shed per-tick
    /// work; the last field is kept.
    pub enabled: bool,
    /// Recursion schedule.
    pub cycle: CycleMode,
    /// Smoothing sweeps before each coarse correction.
    pub pre_sweeps: u32,
    /// Smoothing sweeps after each coarse correction.
    pub post_sweeps: u32,
    /// Relaxation method.
    pub smoother: Smoother,
    /// Screening coefficient `κ`.
    pub screening: f64,
    /// Levels with a dimension below this are returned unmodified. Values
    /// under [`MIN_COARSE_FLOOR`] act as [`MIN_COARSE_FLOOR`].
    pub coarse_floor: u32,
    /// Cycles run per tick.
    pub cycles_per_tick: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cycle: CycleMode::V,
            pre_sweeps: 2,
            post_sweeps: 2,
            smoother: Smoother::RedBlack,
            screening: 0.05,
            coarse_floor: 8,
            cycles_per_tick: 1,
        }
    }
}

/// Sum of the orthogonal neighbours' mask weights, per cell.
#[must_use]
pub fn neighbour_weights(mask: &Grid<f64>) -> Grid<f64> {
    Grid::from_fn(mask.width(), mask.height(), |cell| {
        mask.neighbours(cell, Neighbourhood::Orthogonal)
            .map(|(n, _, _)| mask[n])
            .sum()
    })
}

#[inline]
fn masked_neighbour_sum(x: &Grid<f64>, mask: &Grid<f64>, cell: Cell) -> f64 {
    x.neighbours(cell, Neighbourhood::Orthogonal)
        .map(|(n, _, _)| mask[n] * x[n])
        .sum()
}

/// One grid level of the problem.
struct Level<'a> {
    rhs: &'a Grid<f64>,
    mask: &'a Grid<f64>,
    weights: Grid<f64>,
    h2: f64,
    screening: f64,
}

impl<'a> Level<'a> {
    fn new(rhs: &'a Grid<f64>, mask: &'a Grid<f64>, h2: f64, screening: f64) -> Self {
        Self {
            rhs,
            mask,
            weights: neighbour_weights(mask),
            h2,
            screening,
        }
    }

    #[inline]
    fn relaxed(&self, x: &Grid<f64>, cell: Cell) -> f64 {
        let divisor = (self.weights[cell] + self.screening * self.h2).max(MIN_DIVISOR);
        (masked_neighbour_sum(x, self.mask, cell) + self.h2 * self.rhs[cell]) / divisor
    }

    fn smooth(&self, x: &mut Grid<f64>, smoother: Smoother) {
        match smoother {
            Smoother::RedBlack => {
                for colour in 0..2 {
                    for i in 0..x.cell_count() {
                        let cell = x.cell_at(i);
                        if (cell.x + cell.y) % 2 != colour || self.mask[cell] <= 0.0 {
                            continue;
                        }
                        let value = self.relaxed(x, cell);
                        x[cell] = value;
                    }
                }
            }
            Smoother::Jacobi { omega } => {
                let previous = x.clone();
                for i in 0..x.cell_count() {
                    let cell = x.cell_at(i);
                    if self.mask[cell] <= 0.0 {
                        continue;
                    }
                    let relaxed = self.relaxed(&previous, cell);
                    x[cell] = (1.0 - omega) * previous[cell] + omega * relaxed;
                }
            }
        }
    }

    fn residual_norm(&self, x: &Grid<f64>) -> f64 {
        self.residual(x).values().iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    fn residual(&self, x: &Grid<f64>) -> Grid<f64> {
        Grid::from_fn(x.width(), x.height(), |cell| {
            if self.mask[cell] <= 0.0 {
                return 0.0;
            }
            let s = masked_neighbour_sum(x, self.mask, cell);
            let operator = (self.weights[cell] * x[cell] - s) / self.h2 + self.screening * x[cell];
            self.rhs[cell] - operator
        })
    }
}

/// Residual `rhs − A·x` at unit spacing; zero on blocked cells.
pub fn residual(
    x: &Grid<f64>,
    rhs: &Grid<f64>,
    mask: &Grid<f64>,
    screening: f64,
) -> Result<Grid<f64>> {
    x.ensure_same_shape(rhs)?;
    x.ensure_same_shape(mask)?;
    Ok(Level::new(rhs, mask, 1.0, screening).residual(x))
}

/// L2 norm of the residual over unblocked cells.
pub fn residual_norm(
    x: &Grid<f64>,
    rhs: &Grid<f64>,
    mask: &Grid<f64>,
    screening: f64,
) -> Result<f64> {
    x.ensure_same_shape(rhs)?;
    x.ensure_same_shape(mask)?;
    Ok(Level::new(rhs, mask, 1.0, screening).residual_norm(x))
}

/// Half-resolution residual and mask by 2x2 block means.
///
/// The residual is weighted by the mask before averaging. Blocks cut off by
/// an odd edge average over the cells they actually contain.
#[must_use]
pub fn restrict(residual: &Grid<f64>, mask: &Grid<f64>) -> (Grid<f64>, Grid<f64>) {
    let (w, h) = residual.dimensions();
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let mut coarse_r = Grid::zeros(cw, ch);
    let mut coarse_b = Grid::zeros(cw, ch);
    for cy in 0..ch {
        for cx in 0..cw {
            let mut r_sum = 0.0;
            let mut b_sum = 0.0;
            let mut count = 0.0;
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let fine = Cell::new(2 * cx + dx, 2 * cy + dy);
                if !residual.contains(fine) {
                    continue;
                }
                r_sum += residual[fine] * mask[fine];
                b_sum += mask[fine];
                count += 1.0;
            }
            let coarse = Cell::new(cx, cy);
            coarse_r[coarse] = r_sum / count;
            coarse_b[coarse] = b_sum / count;
        }
    }
    (coarse_r, coarse_b)
}

/// Expand a coarse grid by repeating each value over its 2x2 block, cropped
/// to `width x height`.
#[must_use]
pub fn prolongate(coarse: &Grid<f64>, width: u32, height: u32) -> Grid<f64> {
    Grid::from_fn(width, height, |cell| coarse[Cell::new(cell.x / 2, cell.y / 2)])
}

fn cycle_level(x: &mut Grid<f64>, level: &Level<'_>, mode: CycleMode, config: &SolverConfig) {
    let (w, h) = x.dimensions();
    let floor = config.coarse_floor.max(MIN_COARSE_FLOOR);
    if w < floor || h < floor {
        return;
    }

    for _ in 0..config.pre_sweeps {
        level.smooth(x, config.smoother);
    }

    for &sub_mode in mode.sub_cycles() {
        let r = level.residual(x);
        let (coarse_rhs, coarse_mask) = restrict(&r, level.mask);
        // Coarse spacing: h² doubles per level.
        let coarse = Level::new(&coarse_rhs, &coarse_mask, 2.0 * level.h2, level.screening);
        let mut correction = Grid::zeros(coarse_rhs.width(), coarse_rhs.height());
        cycle_level(&mut correction, &coarse, sub_mode, config);

        let expanded = prolongate(&correction, w, h);
        for i in 0..x.cell_count() {
            if level.mask.values()[i] > 0.0 {
                x.values_mut()[i] += expanded.values()[i];
            }
        }

        for _ in 0..config.post_sweeps {
            level.smooth(x, config.smoother);
        }
    }
}

/// Run one multigrid cycle in place at unit spacing.
///
/// `x` is left untouched when the cycle would raise the residual norm.
pub fn multigrid_cycle(
    x: &mut Grid<f64>,
    rhs: &Grid<f64>,
    mask: &Grid<f64>,
    config: &SolverConfig,
) -> Result<()> {
    x.ensure_same_shape(rhs)?;
    x.ensure_same_shape(mask)?;
    let level = Level::new(rhs, mask, 1.0, config.screening);
    let before = level.residual_norm(x);
    let mut candidate = x.clone();
    cycle_level(&mut candidate, &level, config.cycle, config);
    let after = level.residual_norm(&candidate);
    if after <= before {
        *x = candidate;
    } else {
        tracing::debug!(before, after, "Multigrid cycle discarded; residual would grow");
    }
    Ok(())
}

/// Session-scoped retreat potential, refined a little every tick.
///
/// Each solve starts from the previous tick's field, which amortises the
/// cost and keeps the gradient from jumping between ticks.
#[derive(Debug, Clone, Default)]
pub struct PotentialField {
    field: Option<Grid<f64>>,
    solves: u64,
}

impl PotentialField {
    /// A field that has not been solved yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current field, `None` before the first solve.
    #[must_use]
    pub fn field(&self) -> Option<&Grid<f64>> {
        self.field.as_ref()
    }

    /// Number of solves since creation or the last reset.
    #[must_use]
    pub fn solves(&self) -> u64 {
        self.solves
    }

    /// Drop the field; the next solve starts from zero.
    pub fn reset(&mut self) {
        self.field = None;
        self.solves = 0;
    }

    /// Refine the field against `rhs` and `mask` and return the residual
    /// norm afterwards.
    pub fn solve(&mut self, rhs: &Grid<f64>, mask: &Grid<f64>, config: &SolverConfig) -> Result<f64> {
        rhs.ensure_same_shape(mask)?;
        let (w, h) = rhs.dimensions();
        let mut field = match self.field.take() {
            Some(field) if field.dimensions() == (w, h) => field,
            Some(field) => {
                tracing::debug!(
                    old = ?field.dimensions(),
                    new = ?(w, h),
                    "Potential field reshaped; starting from zero"
                );
                Grid::zeros(w, h)
            }
            None => Grid::zeros(w, h),
        };
        for (value, &b) in field.values_mut().iter_mut().zip(mask.values()) {
            if b <= 0.0 {
                *value = 0.0;
            }
        }
        for _ in 0..config.cycles_per_tick {
            multigrid_cycle(&mut field, rhs, mask, config)?;
        }
        let norm = residual_norm(&field, rhs, mask, config.screening)?;
        self.field = Some(field);
        self.solves += 1;
        tracing::debug!(
            solves = self.solves,
            cycles = config.cycles_per_tick,
            residual = norm,
            "Potential field refined"
        );
        Ok(norm)
    }

    /// Field value at `cell`, zero before the first solve.
    #[must_use]
    pub fn value(&self, cell: Cell) -> f64 {
        self.field.as_ref().map_or(0.0, |f| f[cell])
    }

    /// Field gradient at `cell`.
    #[must_use]
    pub fn gradient(&self, cell: Cell) -> (f64, f64) {
        self.field.as_ref().map_or((0.0, 0.0), |f| f.gradient(cell))
    }

    /// Unit vector of steepest ascent at `cell`, `None` where the field is
    /// flat.
    #[must_use]
    pub fn ascent_direction(&self, cell: Cell) -> Option<(f64, f64)> {
        let (gx, gy) = self.gradient(cell);
        let norm = gx.hypot(gy);
        (norm > 1e-10).then(|| (gx / norm, gy / norm))
    }
}
