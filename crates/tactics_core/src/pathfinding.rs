//! Multi-source Dijkstra over a cost grid.
//!
//! All sources are seeded at distance zero at once, so one pass answers
//! "how far is the nearest source, and which way" for every cell. Entering a
//! cell costs that cell's value; diagonal steps cost `sqrt(2)` times as much
//! and may not cut past a blocked orthogonal neighbour. Blocked cells carry
//! [`BLOCKED`](crate::grid::BLOCKED) and are never relaxed.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::grid::{Cell, Grid, Neighbourhood};

/// A tentative distance in the priority queue.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    distance: f64,
    /// Row-major cell index; doubles as the deterministic tie-breaker.
    index: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse for min-heap behaviour.
        match other.distance.total_cmp(&self.distance) {
            Ordering::Equal => other.index.cmp(&self.index),
            ord => ord,
        }
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Distances to the nearest source and the predecessor links needed to walk
/// back to it.
#[derive(Debug, Clone)]
pub struct PathResult {
    dist: Grid<f64>,
    prev: Vec<Option<usize>>,
    sources: Vec<Cell>,
}

impl PathResult {
    /// Result with no sources: everything unreachable.
    #[must_use]
    pub fn unreachable(width: u32, height: u32) -> Self {
        Self {
            dist: Grid::filled(width, height, f64::INFINITY),
            prev: vec![None; (width as usize) * (height as usize)],
            sources: Vec::new(),
        }
    }

    /// Distance grid; `+inf` marks unreachable cells.
    #[must_use]
    pub fn distances(&self) -> &Grid<f64> {
        &self.dist
    }

    /// Seed cells, sorted and deduplicated.
    #[must_use]
    pub fn sources(&self) -> &[Cell] {
        &self.sources
    }

    /// Distance from `cell` to the nearest source.
    #[must_use]
    pub fn distance(&self, cell: Cell) -> f64 {
        self.dist[cell]
    }

    /// Whether any source can be reached from `cell`.
    #[must_use]
    pub fn is_reachable(&self, cell: Cell) -> bool {
        self.dist[cell].is_finite()
    }

    /// Whether `cell` is one of the seeds.
    #[must_use]
    pub fn is_source(&self, cell: Cell) -> bool {
        self.sources.binary_search(&cell).is_ok()
    }

    /// Walk from `target` toward its nearest source, visiting at most
    /// `limit` cells.
    ///
    /// The returned path starts at `target` and ends at the farthest cell
    /// reached, which is the source itself when the cap allows. Unreachable
    /// targets yield an empty path.
    #[must_use]
    pub fn path(&self, target: Cell, limit: usize) -> Vec<Cell> {
        let mut path = Vec::new();
        if !self.is_reachable(target) {
            return path;
        }
        let mut current = Some(self.dist.index_of(target));
        while let Some(index) = current {
            if path.len() >= limit {
                break;
            }
            path.push(self.dist.cell_at(index));
            current = self.prev[index];
        }
        path
    }

    /// Uncapped [`path`](Self::path).
    #[must_use]
    pub fn full_path(&self, target: Cell) -> Vec<Cell> {
        self.path(target, usize::MAX)
    }

    /// Source nearest to `cell`, if reachable.
    #[must_use]
    pub fn nearest_source(&self, cell: Cell) -> Option<Cell> {
        self.full_path(cell).last().copied()
    }
}

/// Distances from every cell to the nearest of `sources`.
///
/// Duplicate sources are harmless. An empty source set returns an
/// all-unreachable result without searching.
///
/// # Panics
///
/// Panics if a source lies outside the grid.
#[must_use]
pub fn shortest_paths(cost: &Grid<f64>, sources: &[Cell], neighbourhood: Neighbourhood) -> PathResult {
    let (width, height) = cost.dimensions();
    let mut result = PathResult::unreachable(width, height);
    if sources.is_empty() {
        return result;
    }

    let mut seeds = sources.to_vec();
    seeds.sort_unstable();
    seeds.dedup();

    let mut open_set = BinaryHeap::with_capacity(seeds.len());
    for &source in &seeds {
        let index = cost.index_of(source);
        result.dist.values_mut()[index] = 0.0;
        open_set.push(HeapEntry {
            distance: 0.0,
            index,
        });
    }
    result.sources = seeds;

    while let Some(HeapEntry { distance, index }) = open_set.pop() {
        // Stale entry: a shorter distance was recorded after it was pushed.
        if distance > result.dist.values()[index] {
            continue;
        }
        let current = cost.cell_at(index);

        for (next, dx, dy) in cost.neighbours(current, neighbourhood) {
            let step = cost[next];
            if !step.is_finite() {
                continue;
            }
            let diagonal = dx != 0 && dy != 0;
            if diagonal && !diagonal_is_clear(cost, current, dx, dy) {
                continue;
            }
            let step = if diagonal {
                step * std::f64::consts::SQRT_2
            } else {
                step
            };

            let next_index = cost.index_of(next);
            let alt = distance + step;
            if alt < result.dist.values()[next_index] {
                result.dist.values_mut()[next_index] = alt;
                result.prev[next_index] = Some(index);
                open_set.push(HeapEntry {
                    distance: alt,
                    index: next_index,
                });
            }
        }
    }

    result
}

/// A diagonal step must not squeeze between two cells when either is
/// blocked.
#[inline]
fn diagonal_is_clear(cost: &Grid<f64>, from: Cell, dx: i32, dy: i32) -> bool {
    let side_x = cost.offset(from, dx, 0);
    let side_y = cost.offset(from, 0, dy);
    matches!((side_x, side_y), (Some(a), Some(b)) if cost[a].is_finite() && cost[b].is_finite())
}
