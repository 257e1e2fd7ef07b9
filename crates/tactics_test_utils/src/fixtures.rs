//! Test fixtures and helpers.
//!
//! Terrain layouts and unit rosters for consistent testing.

use tactics_core::directive::AbilityId;
use tactics_core::grid::Grid;
use tactics_core::math::Vec2Fixed;
use tactics_core::unit::{CasterStats, Faction, UnitId, UnitRecord};

/// Fully walkable terrain.
#[must_use]
pub fn open_terrain(width: u32, height: u32) -> Grid<bool> {
    Grid::open(width, height)
}

/// Terrain drawn as text rows, top row first: `#` is blocked, anything else
/// walkable. Rows shorter than the first are padded with walkable cells.
///
/// # Panics
///
/// Panics if `rows` is empty or the first row is empty.
#[must_use]
pub fn terrain_from_rows(rows: &[&str]) -> Grid<bool> {
    let width = rows.first().map_or(0, |r| r.chars().count()) as u32;
    assert!(width > 0, "terrain needs at least one non-empty row");
    let height = rows.len() as u32;
    Grid::from_fn(width, height, |cell| {
        rows[cell.y as usize].chars().nth(cell.x as usize) != Some('#')
    })
}

/// Open terrain split by a full-height wall at column `wall_x`.
#[must_use]
pub fn walled_terrain(width: u32, height: u32, wall_x: u32) -> Grid<bool> {
    Grid::from_fn(width, height, |cell| cell.x != wall_x)
}

/// Fluent builder for [`UnitRecord`]s.
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    unit: UnitRecord,
}

impl UnitBuilder {
    /// Own unit at an integer position.
    #[must_use]
    pub fn own(id: u64, x: i32, y: i32) -> Self {
        Self::new(id, Faction::Own, x, y)
    }

    /// Enemy unit at an integer position.
    #[must_use]
    pub fn enemy(id: u64, x: i32, y: i32) -> Self {
        Self::new(id, Faction::Enemy, x, y)
    }

    /// Unit of any faction at an integer position.
    #[must_use]
    pub fn new(id: u64, faction: Faction, x: i32, y: i32) -> Self {
        Self {
            unit: UnitRecord::new(UnitId(id), faction, Vec2Fixed::from_int(x, y)),
        }
    }

    /// Hit points.
    #[must_use]
    pub fn health(mut self, health: f64) -> Self {
        self.unit.health = health;
        self
    }

    /// Shield points.
    #[must_use]
    pub fn shield(mut self, shield: f64) -> Self {
        self.unit.shield = shield;
        self
    }

    /// Ground dps.
    #[must_use]
    pub fn dps(mut self, dps: f64) -> Self {
        self.unit.ground_dps = dps;
        self
    }

    /// Same value for ground range, air range and sight.
    #[must_use]
    pub fn range(mut self, range: f64) -> Self {
        self.unit.ground_range = range;
        self.unit.air_range = range;
        self.unit.sight_range = range;
        self
    }

    /// Mark as flying.
    #[must_use]
    pub fn flying(mut self) -> Self {
        self.unit.flying = true;
        self
    }

    /// Mark as idle.
    #[must_use]
    pub fn idle(mut self) -> Self {
        self.unit.idle = true;
        self
    }

    /// Give the unit an ability.
    #[must_use]
    pub fn caster(mut self, ability: u32, energy: f64, energy_cost: f64) -> Self {
        self.unit.caster = Some(CasterStats {
            ability: AbilityId(ability),
            energy,
            energy_cost,
        });
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> UnitRecord {
        self.unit
    }
}

/// A worker-like non-combatant.
#[must_use]
pub fn civilian(id: u64, faction: Faction, x: i32, y: i32) -> UnitRecord {
    UnitBuilder::new(id, faction, x, y).health(40.0).build()
}

/// Two-unit skirmish on an open 20x20 map: own unit at (10, 10), enemy at
/// (12, 10), both with range 5. Stats are `(health, dps)`.
#[must_use]
pub fn skirmish(own: (f64, f64), enemy: (f64, f64)) -> (Grid<bool>, Vec<UnitRecord>, Vec<UnitRecord>) {
    let own = UnitBuilder::own(1, 10, 10)
        .health(own.0)
        .dps(own.1)
        .range(5.0)
        .build();
    let enemy = UnitBuilder::enemy(2, 12, 10)
        .health(enemy.0)
        .dps(enemy.1)
        .range(5.0)
        .build();
    (open_terrain(20, 20), vec![own], vec![enemy])
}

/// A line of `count` identical units along a row, one cell apart.
#[must_use]
pub fn squad(
    first_id: u64,
    faction: Faction,
    origin: (i32, i32),
    count: u32,
    health: f64,
    dps: f64,
) -> Vec<UnitRecord> {
    (0..count)
        .map(|i| {
            UnitBuilder::new(
                first_id + u64::from(i),
                faction,
                origin.0 + i as i32,
                origin.1,
            )
            .health(health)
            .dps(dps)
            .range(5.0)
            .build()
        })
        .collect()
}

/// Parse a roster written in RON, e.g. for data-driven tests.
///
/// # Errors
///
/// Returns the RON error if the text does not describe a list of units.
pub fn roster_from_ron(source: &str) -> Result<Vec<UnitRecord>, ron::error::SpannedError> {
    ron::from_str(source)
}
