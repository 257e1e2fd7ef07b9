//! Rectangular per-tick grids.
//!
//! Every field the engine derives (presence, confidence, potential, path
//! distances) lives on a [`Grid`] with exactly the terrain grid's
//! dimensions and is addressed by the same [`Cell`] coordinates.
//!
//! Cost grids mark blocked terrain with [`BLOCKED`] (`+inf`) so that the
//! solver and the pathfinder treat walls through plain arithmetic instead of
//! consulting a separate boolean mask.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticsError};
use crate::math::{Fixed, Vec2Fixed};

/// Cost sentinel for impassable cells.
pub const BLOCKED: f64 = f64::INFINITY;

/// Integer grid coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Cell {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl Cell {
    /// Create a cell coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// World position of this cell.
    #[must_use]
    pub fn to_world(self) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(self.x), Fixed::from_num(self.y))
    }

    /// Squared euclidean distance in cells.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> u64 {
        let dx = u64::from(self.x.abs_diff(other.x));
        let dy = u64::from(self.y.abs_diff(other.y));
        dx * dx + dy * dy
    }
}

/// Which neighbours a cell connects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Neighbourhood {
    /// 4-connected.
    Orthogonal,
    /// 8-connected; diagonal steps cost `sqrt(2)` times the entered cell.
    #[default]
    Diagonal,
}

/// Direction offsets, orthogonal first.
const OFFSETS: [(i32, i32); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

impl Neighbourhood {
    /// Step offsets for this neighbourhood.
    #[must_use]
    pub fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            Self::Orthogonal => &OFFSETS[..4],
            Self::Diagonal => &OFFSETS,
        }
    }
}

/// A rectangular array of values stored in row-major order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: u32,
    height: u32,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn filled(width: u32, height: u32, value: T) -> Self {
        assert!(width > 0, "Grid width must be positive");
        assert!(height > 0, "Grid height must be positive");
        Self {
            width,
            height,
            cells: vec![value; (width as usize) * (height as usize)],
        }
    }
}

impl<T> Grid<T> {
    /// Wrap a row-major buffer.
    pub fn from_vec(width: u32, height: u32, cells: Vec<T>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TacticsError::EmptyGrid { width, height });
        }
        let expected = (width as usize) * (height as usize);
        if cells.len() != expected {
            return Err(TacticsError::BufferLength {
                width,
                height,
                expected,
                found: cells.len(),
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Create a grid by evaluating `f` at every cell.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(Cell) -> T) -> Self {
        assert!(width > 0 && height > 0, "Grid dimensions must be positive");
        let mut cells = Vec::with_capacity((width as usize) * (height as usize));
        for y in 0..height {
            for x in 0..width {
                cells.push(f(Cell::new(x, y)));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    /// Grid width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Check if signed coordinates fall inside the grid.
    #[inline]
    #[must_use]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    /// Check if a cell lies inside the grid.
    #[inline]
    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.x < self.width && cell.y < self.height
    }

    /// Row-major index of a cell.
    ///
    /// # Panics
    ///
    /// Panics if the cell is out of bounds.
    #[inline]
    #[must_use]
    pub fn index_of(&self, cell: Cell) -> usize {
        assert!(
            self.contains(cell),
            "cell ({}, {}) outside {}x{} grid",
            cell.x,
            cell.y,
            self.width,
            self.height
        );
        (cell.y as usize) * (self.width as usize) + (cell.x as usize)
    }

    /// Cell for a row-major index.
    #[inline]
    #[must_use]
    pub fn cell_at(&self, index: usize) -> Cell {
        let w = self.width as usize;
        Cell::new((index % w) as u32, (index / w) as u32)
    }

    /// Value at signed coordinates, `None` when out of bounds.
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> Option<&T> {
        if self.in_bounds(x, y) {
            Some(&self.cells[(y as usize) * (self.width as usize) + (x as usize)])
        } else {
            None
        }
    }

    /// Cell displaced by `(dx, dy)`, `None` when that leaves the grid.
    #[inline]
    #[must_use]
    pub fn offset(&self, cell: Cell, dx: i32, dy: i32) -> Option<Cell> {
        let x = i64::from(cell.x) + i64::from(dx);
        let y = i64::from(cell.y) + i64::from(dy);
        self.in_bounds(x, y).then(|| Cell::new(x as u32, y as u32))
    }

    /// In-bounds neighbours of `cell` along with the step offset taken.
    pub fn neighbours(
        &self,
        cell: Cell,
        neighbourhood: Neighbourhood,
    ) -> impl Iterator<Item = (Cell, i32, i32)> + '_ {
        neighbourhood
            .offsets()
            .iter()
            .filter_map(move |&(dx, dy)| self.offset(cell, dx, dy).map(|n| (n, dx, dy)))
    }

    /// Cell containing a world position: rounded to the nearest cell and
    /// clamped into the grid.
    #[must_use]
    pub fn cell_of(&self, pos: Vec2Fixed) -> Cell {
        let (x, y) = pos.rounded();
        Cell::new(
            x.clamp(0, i64::from(self.width) - 1) as u32,
            y.clamp(0, i64::from(self.height) - 1) as u32,
        )
    }

    /// Iterate all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.cells.len()).map(|i| self.cell_at(i))
    }

    /// Iterate `(cell, value)` pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Cell, &T)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, v)| (self.cell_at(i), v))
    }

    /// Raw row-major values.
    #[must_use]
    pub fn values(&self) -> &[T] {
        &self.cells
    }

    /// Mutable raw row-major values.
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.cells
    }

    /// Transform every value into a new grid of the same shape.
    #[must_use]
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            cells: self.cells.iter().map(f).collect(),
        }
    }

    /// True when `other` has the same dimensions.
    #[must_use]
    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.dimensions() == other.dimensions()
    }

    /// Fail with [`TacticsError::DimensionMismatch`] unless `other` has the
    /// same dimensions.
    pub fn ensure_same_shape<U>(&self, other: &Grid<U>) -> Result<()> {
        if self.same_shape(other) {
            Ok(())
        } else {
            Err(TacticsError::DimensionMismatch {
                expected: self.dimensions(),
                found: other.dimensions(),
            })
        }
    }
}

impl<T> Index<Cell> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, cell: Cell) -> &T {
        &self.cells[self.index_of(cell)]
    }
}

impl<T> IndexMut<Cell> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, cell: Cell) -> &mut T {
        let i = self.index_of(cell);
        &mut self.cells[i]
    }
}

impl Grid<bool> {
    /// Walkability grid with every cell passable.
    #[must_use]
    pub fn open(width: u32, height: u32) -> Self {
        Self::filled(width, height, true)
    }
}

impl Grid<f64> {
    /// Grid of zeros.
    #[must_use]
    pub fn zeros(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    /// Unit cost on walkable cells, [`BLOCKED`] elsewhere.
    #[must_use]
    pub fn cost_from_walkability(walkable: &Grid<bool>) -> Self {
        walkable.map(|&w| if w { 1.0 } else { BLOCKED })
    }

    /// `1.0` on walkable cells, `0.0` elsewhere.
    #[must_use]
    pub fn mask_from_walkability(walkable: &Grid<bool>) -> Self {
        walkable.map(|&w| if w { 1.0 } else { 0.0 })
    }

    /// Separable Gaussian blur with reflecting borders.
    ///
    /// The kernel is truncated at four standard deviations. A non-positive
    /// `sigma` returns an unchanged copy.
    #[must_use]
    pub fn gaussian_blur(&self, sigma: f64) -> Self {
        if sigma <= 0.0 {
            return self.clone();
        }
        let kernel = gaussian_kernel(sigma);
        let radius = (kernel.len() / 2) as i64;
        let (w, h) = (i64::from(self.width), i64::from(self.height));

        let mut horizontal = Self::zeros(self.width, self.height);
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect(x + k as i64 - radius, w);
                    acc += weight * self.cells[(y * w + sx) as usize];
                }
                horizontal.cells[(y * w + x) as usize] = acc;
            }
        }

        let mut out = Self::zeros(self.width, self.height);
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = reflect(y + k as i64 - radius, h);
                    acc += weight * horizontal.cells[(sy * w + x) as usize];
                }
                out.cells[(y * w + x) as usize] = acc;
            }
        }
        out
    }

    /// Central-difference gradient at `cell`, one-sided at the borders.
    #[must_use]
    pub fn gradient(&self, cell: Cell) -> (f64, f64) {
        let x_lo = Cell::new(cell.x.saturating_sub(1), cell.y);
        let x_hi = Cell::new((cell.x + 1).min(self.width - 1), cell.y);
        let y_lo = Cell::new(cell.x, cell.y.saturating_sub(1));
        let y_hi = Cell::new(cell.x, (cell.y + 1).min(self.height - 1));
        (
            (self[x_hi] - self[x_lo]) / 2.0,
            (self[y_hi] - self[y_lo]) / 2.0,
        )
    }
}

/// Normalised Gaussian weights covering `[-4 sigma, 4 sigma]`.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5) as i64;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= total;
    }
    kernel
}

/// Mirror an index into `[0, n)` (half-sample symmetric: `d c b a | a b c d`).
#[inline]
fn reflect(i: i64, n: i64) -> i64 {
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m < n {
        m
    } else {
        period - 1 - m
    }
}
