//! Influence maps: per-cell combat presence of a unit roster.
//!
//! Each armed unit splats a disk onto two grids:
//! - health presence adds up `health + shield` of every covering unit;
//! - dps presence keeps the **maximum** dps among covering units. A cell is
//!   as dangerous as its worst single threat, not as the summed alpha strike.
//!
//! Disk footprints are looked up in a [`DiskCache`] keyed by the rounded
//! radius, since many units share a type and therefore a range.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::grid::{Cell, Grid};
use crate::unit::UnitRecord;

/// Which radius a unit's footprint covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RangePolicy {
    /// Sight radius.
    #[default]
    Sight,
    /// Larger of the ground and air weapon ranges.
    Engagement,
    /// Larger of weapon ranges and sight.
    Max,
}

impl RangePolicy {
    /// Footprint radius of `unit` under this policy.
    #[must_use]
    pub fn radius(self, unit: &UnitRecord) -> f64 {
        match self {
            Self::Sight => unit.sight_range,
            Self::Engagement => unit.ground_range.max(unit.air_range),
            Self::Max => unit.ground_range.max(unit.air_range).max(unit.sight_range),
        }
    }
}

/// Offsets `(dx, dy)` with `dx² + dy² <= radius²`, centre included.
#[must_use]
pub fn disk_offsets(radius: u32) -> Vec<(i32, i32)> {
    let r = radius as i32;
    let r2 = i64::from(r) * i64::from(r);
    let mut offsets = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            if i64::from(dx * dx + dy * dy) <= r2 {
                offsets.push((dx, dy));
            }
        }
    }
    offsets
}

/// Memoised disk footprints keyed by integer radius.
#[derive(Debug, Clone, Default)]
pub struct DiskCache {
    offsets: HashMap<u32, Vec<(i32, i32)>>,
}

impl DiskCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for a radius: rounded to the nearest cell, non-finite and
    /// negative radii collapse to zero.
    #[must_use]
    pub fn key(radius: f64) -> u32 {
        if radius.is_finite() && radius > 0.0 {
            radius.round() as u32
        } else {
            0
        }
    }

    /// Footprint for `radius`, computed on first use.
    pub fn offsets(&mut self, radius: f64) -> &[(i32, i32)] {
        self.offsets.entry(Self::key(radius)).or_insert_with_key(|&r| {
            tracing::trace!(radius = r, "Caching disk footprint");
            disk_offsets(r)
        })
    }

    /// Number of distinct radii cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// True when nothing has been cached yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Health and dps presence of one faction.
#[derive(Debug, Clone, PartialEq)]
pub struct Presence {
    /// Summed `health + shield` of units covering each cell.
    pub health: Grid<f64>,
    /// Highest dps among units covering each cell.
    pub dps: Grid<f64>,
}

impl Presence {
    /// Presence of an empty roster.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            health: Grid::zeros(width, height),
            dps: Grid::zeros(width, height),
        }
    }

    /// `(width, height)` of both maps.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.health.dimensions()
    }

    /// Health presence at `cell`.
    #[must_use]
    pub fn health_at(&self, cell: Cell) -> f64 {
        self.health[cell]
    }

    /// Dps presence at `cell`.
    #[must_use]
    pub fn dps_at(&self, cell: Cell) -> f64 {
        self.dps[cell]
    }
}

/// Builds [`Presence`] maps, reusing disk footprints across calls.
#[derive(Debug, Clone, Default)]
pub struct InfluenceBuilder {
    cache: DiskCache,
    policy: RangePolicy,
}

impl InfluenceBuilder {
    /// Builder with an empty footprint cache.
    #[must_use]
    pub fn new(policy: RangePolicy) -> Self {
        Self::with_cache(policy, DiskCache::new())
    }

    /// Builder reusing an existing footprint cache.
    #[must_use]
    pub fn with_cache(policy: RangePolicy, cache: DiskCache) -> Self {
        Self { cache, policy }
    }

    /// Active range policy.
    #[must_use]
    pub fn policy(&self) -> RangePolicy {
        self.policy
    }

    /// Footprint cache.
    #[must_use]
    pub fn cache(&self) -> &DiskCache {
        &self.cache
    }

    /// Accumulate presence for `units` on a `width x height` grid.
    ///
    /// Units without dps contribute nothing. Footprint cells outside the
    /// grid are clipped.
    pub fn build(&mut self, dimensions: (u32, u32), units: &[UnitRecord]) -> Presence {
        let (width, height) = dimensions;
        let mut presence = Presence::empty(width, height);
        for unit in units.iter().filter(|u| u.is_combatant()) {
            self.splat(&mut presence, unit);
        }
        presence
    }

    /// Add one unit's footprint to `presence`.
    pub fn splat(&mut self, presence: &mut Presence, unit: &UnitRecord) {
        if !unit.is_combatant() {
            return;
        }
        let centre = presence.health.cell_of(unit.position);
        let health = unit.effective_health();
        let offsets = self.cache.offsets(self.policy.radius(unit));
        for &(dx, dy) in offsets {
            let Some(cell) = presence.health.offset(centre, dx, dy) else {
                continue;
            };
            presence.health[cell] += health;
            let dps = &mut presence.dps[cell];
            *dps = dps.max(unit.ground_dps);
        }
    }
}

/// Point sources for the potential field: `1.0` per unit at its cell.
#[must_use]
pub fn civilian_sources<'a>(
    dimensions: (u32, u32),
    units: impl IntoIterator<Item = &'a UnitRecord>,
) -> Grid<f64> {
    let mut sources = Grid::zeros(dimensions.0, dimensions.1);
    for unit in units {
        let cell = sources.cell_of(unit.position);
        sources[cell] += 1.0;
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2Fixed;
    use crate::unit::{Faction, UnitId};

    fn armed(id: u64, x: i32, y: i32, health: f64, dps: f64, range: f64) -> UnitRecord {
        let mut unit = UnitRecord::new(UnitId(id), Faction::Own, Vec2Fixed::from_int(x, y));
        unit.health = health;
        unit.ground_dps = dps;
        unit.ground_range = range;
        unit.sight_range = range;
        unit
    }

    #[test]
    fn test_disk_offsets_sizes() {
        assert_eq!(disk_offsets(0), vec![(0, 0)]);
        assert_eq!(disk_offsets(1).len(), 5);
        assert_eq!(disk_offsets(2).len(), 13);
        assert!(disk_offsets(5).contains(&(5, 0)));
        assert!(!disk_offsets(5).contains(&(4, 4)));
    }

    #[test]
    fn test_cache_keys_by_rounded_radius() {
        let mut cache = DiskCache::new();
        let a = cache.offsets(5.2).len();
        let b = cache.offsets(4.8).len();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        cache.offsets(f64::NAN);
        assert_eq!(DiskCache::key(-3.0), 0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_health_sums_and_dps_maxes() {
        let mut builder = InfluenceBuilder::new(RangePolicy::Sight);
        let units = [
            armed(1, 5, 5, 100.0, 10.0, 2.0),
            armed(2, 6, 5, 50.0, 4.0, 2.0),
        ];
        let presence = builder.build((12, 12), &units);

        let shared = Cell::new(5, 5);
        assert_eq!(presence.health_at(shared), 150.0);
        assert_eq!(presence.dps_at(shared), 10.0);

        // Only the second unit reaches (8, 5).
        assert_eq!(presence.health_at(Cell::new(8, 5)), 50.0);
        assert_eq!(presence.dps_at(Cell::new(8, 5)), 4.0);

        assert_eq!(presence.health_at(Cell::new(0, 0)), 0.0);
        assert_eq!(builder.cache().len(), 1);
    }

    #[test]
    fn test_shield_counts_as_health() {
        let mut builder = InfluenceBuilder::default();
        let mut unit = armed(1, 3, 3, 40.0, 5.0, 1.0);
        unit.shield = 60.0;
        let presence = builder.build((8, 8), &[unit]);
        assert_eq!(presence.health_at(Cell::new(3, 3)), 100.0);
    }

    #[test]
    fn test_unarmed_units_are_ignored() {
        let mut builder = InfluenceBuilder::default();
        let presence = builder.build((8, 8), &[armed(1, 3, 3, 100.0, 0.0, 3.0)]);
        assert!(presence.health.values().iter().all(|&h| h == 0.0));
        assert!(presence.dps.values().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_footprint_clipped_at_border() {
        let mut builder = InfluenceBuilder::default();
        let presence = builder.build((6, 6), &[armed(1, 0, 0, 10.0, 1.0, 2.0)]);
        let covered = presence.health.values().iter().filter(|&&h| h > 0.0).count();
        // Quarter disk of radius 2: (0,0) (1,0) (2,0) (0,1) (1,1) (0,2).
        assert_eq!(covered, 6);
    }

    #[test]
    fn test_range_policies() {
        let mut unit = armed(1, 0, 0, 1.0, 1.0, 0.0);
        unit.ground_range = 3.0;
        unit.air_range = 6.0;
        unit.sight_range = 9.0;
        assert_eq!(RangePolicy::Sight.radius(&unit), 9.0);
        assert_eq!(RangePolicy::Engagement.radius(&unit), 6.0);
        assert_eq!(RangePolicy::Max.radius(&unit), 9.0);
    }

    #[test]
    fn test_civilian_sources_count_units_per_cell() {
        let units = [
            armed(1, 2, 2, 40.0, 0.0, 0.0),
            armed(2, 2, 2, 40.0, 0.0, 0.0),
            armed(3, 4, 1, 40.0, 0.0, 0.0),
        ];
        let sources = civilian_sources((6, 6), &units);
        assert_eq!(sources[Cell::new(2, 2)], 2.0);
        assert_eq!(sources[Cell::new(4, 1)], 1.0);
        assert_eq!(sources.values().iter().sum::<f64>(), 3.0);
    }
}
