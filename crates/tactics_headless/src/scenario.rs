//! Scenario definitions and configuration.
//!
//! A scenario is a fixed terrain, the rosters seen every tick and the
//! controller tuning, written in RON. Terrain is drawn as text rows, top row
//! first, with `#` for blocked cells and `.` for walkable ones.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tactics_core::config::TacticsConfig;
use tactics_core::controller::AbilityTarget;
use tactics_core::directive::AbilityId;
use tactics_core::error::TacticsError;
use tactics_core::grid::Grid;
use tactics_core::math::Vec2Fixed;
use tactics_core::unit::{CasterStats, Faction, UnitId, UnitRecord};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The terrain rows are empty, ragged or use unknown characters.
    #[error("Invalid scenario map: {0}")]
    InvalidMap(String),
    /// A position is not a finite point inside the map.
    #[error("Invalid scenario position: {0}")]
    InvalidPosition(String),
    /// The tactics engine rejected the terrain or the embedded config.
    #[error("Invalid scenario for the tactics engine: {0}")]
    Engine(#[from] TacticsError),
}

/// Spell-casting stats of a unit placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CasterSpec {
    /// Ability id.
    pub ability: u32,
    /// Current energy.
    pub energy: f64,
    /// Energy per cast.
    pub energy_cost: f64,
}

/// One unit placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Unit id, unique within the scenario.
    pub id: u64,
    /// Position in cells.
    pub position: (f64, f64),
    /// Hit points.
    pub health: f64,
    /// Shield points.
    #[serde(default)]
    pub shield: f64,
    /// Ground dps; zero for civilians.
    #[serde(default)]
    pub dps: f64,
    /// Weapon range and sight.
    #[serde(default)]
    pub range: f64,
    /// Flying unit.
    #[serde(default)]
    pub flying: bool,
    /// Unit has no order.
    #[serde(default)]
    pub idle: bool,
    /// Caster stats, if any.
    #[serde(default)]
    pub caster: Option<CasterSpec>,
}

impl UnitSpec {
    /// Convert to the record the controller reads.
    #[must_use]
    pub fn to_record(&self, faction: Faction) -> UnitRecord {
        let mut unit = UnitRecord::new(
            UnitId(self.id),
            faction,
            Vec2Fixed::from_f64(self.position.0, self.position.1),
        );
        unit.health = self.health;
        unit.shield = self.shield;
        unit.ground_dps = self.dps;
        unit.ground_range = self.range;
        unit.air_range = self.range;
        unit.sight_range = self.range;
        unit.flying = self.flying;
        unit.idle = self.idle;
        unit.caster = self.caster.map(|c| CasterStats {
            ability: AbilityId(c.ability),
            energy: c.energy,
            energy_cost: c.energy_cost,
        });
        unit
    }
}

/// A pending ability cast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbilitySpec {
    /// Ability id.
    pub ability: u32,
    /// Target point, `None` for self-cast.
    #[serde(default)]
    pub target: Option<(f64, f64)>,
}

/// A unit destroyed before the given tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Removal {
    /// Tick (1-based) before which the unit disappears.
    pub tick: u64,
    /// Unit id.
    pub unit: u64,
}

const fn default_ticks() -> u64 {
    10
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Terrain rows, top row first.
    pub map: Vec<String>,
    /// Own army and casters.
    pub own: Vec<UnitSpec>,
    /// Enemy army.
    pub enemy: Vec<UnitSpec>,
    /// Own non-combatants.
    #[serde(default)]
    pub civilians: Vec<UnitSpec>,
    /// Enemy non-combatants.
    #[serde(default)]
    pub enemy_civilians: Vec<UnitSpec>,
    /// Fallback retreat point.
    pub anchor: (f64, f64),
    /// Exploration points.
    #[serde(default)]
    pub scout_points: Vec<(f64, f64)>,
    /// Pending ability casts, repeated every tick.
    #[serde(default)]
    pub ability_targets: Vec<AbilitySpec>,
    /// Controller tuning; defaults when absent.
    #[serde(default)]
    pub config: Option<TacticsConfig>,
    /// Ticks to run.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    /// Units destroyed during the run.
    #[serde(default)]
    pub removals: Vec<Removal>,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        let terrain = scenario.terrain()?;
        scenario.check_positions(terrain.dimensions())?;
        scenario.tactics_config()?;
        Ok(scenario)
    }

    /// Every point must lie inside the map, so fixed-point conversion
    /// cannot overflow.
    fn check_positions(&self, (width, height): (u32, u32)) -> Result<(), ScenarioError> {
        let inside = |&(x, y): &(f64, f64)| {
            (0.0..=f64::from(width)).contains(&x) && (0.0..=f64::from(height)).contains(&y)
        };
        let units = self
            .own
            .iter()
            .chain(&self.enemy)
            .chain(&self.civilians)
            .chain(&self.enemy_civilians);
        for unit in units {
            if !inside(&unit.position) {
                return Err(ScenarioError::InvalidPosition(format!(
                    "unit {} at {:?}",
                    unit.id, unit.position
                )));
            }
        }
        let points = std::iter::once(&self.anchor)
            .chain(&self.scout_points)
            .chain(self.ability_targets.iter().filter_map(|a| a.target.as_ref()));
        for point in points {
            if !inside(point) {
                return Err(ScenarioError::InvalidPosition(format!("point {point:?}")));
            }
        }
        Ok(())
    }

    /// Walkability grid drawn by [`map`](Self::map).
    pub fn terrain(&self) -> Result<Grid<bool>, ScenarioError> {
        let height = self.map.len();
        let width = self.map.first().map_or(0, |row| row.chars().count());
        if width == 0 || height == 0 {
            return Err(ScenarioError::InvalidMap("map is empty".to_string()));
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in self.map.iter().enumerate() {
            if row.chars().count() != width {
                return Err(ScenarioError::InvalidMap(format!(
                    "row {y} has {} cells, expected {width}",
                    row.chars().count()
                )));
            }
            for (x, ch) in row.chars().enumerate() {
                match ch {
                    '.' => cells.push(true),
                    '#' => cells.push(false),
                    other => {
                        return Err(ScenarioError::InvalidMap(format!(
                            "unknown terrain '{other}' at ({x}, {y})"
                        )));
                    }
                }
            }
        }
        Ok(Grid::from_vec(width as u32, height as u32, cells)?)
    }

    /// Validated controller tuning.
    pub fn tactics_config(&self) -> Result<TacticsConfig, ScenarioError> {
        let config = self.config.clone().unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Own units as records.
    #[must_use]
    pub fn own_units(&self) -> Vec<UnitRecord> {
        self.own.iter().map(|u| u.to_record(Faction::Own)).collect()
    }

    /// Enemy units as records.
    #[must_use]
    pub fn enemy_units(&self) -> Vec<UnitRecord> {
        self.enemy.iter().map(|u| u.to_record(Faction::Enemy)).collect()
    }

    /// Civilians of both sides as records.
    #[must_use]
    pub fn civilian_units(&self) -> Vec<UnitRecord> {
        self.civilians
            .iter()
            .map(|u| u.to_record(Faction::Own))
            .chain(self.enemy_civilians.iter().map(|u| u.to_record(Faction::Enemy)))
            .collect()
    }

    /// Anchor as a world position.
    #[must_use]
    pub fn anchor_point(&self) -> Vec2Fixed {
        Vec2Fixed::from_f64(self.anchor.0, self.anchor.1)
    }

    /// Scout points as world positions.
    #[must_use]
    pub fn scout_positions(&self) -> Vec<Vec2Fixed> {
        self.scout_points
            .iter()
            .map(|&(x, y)| Vec2Fixed::from_f64(x, y))
            .collect()
    }

    /// Ability targets as the controller reads them.
    #[must_use]
    pub fn ability_target_list(&self) -> Vec<AbilityTarget> {
        self.ability_targets
            .iter()
            .map(|a| AbilityTarget {
                ability: AbilityId(a.ability),
                target: a.target.map(|(x, y)| Vec2Fixed::from_f64(x, y)),
            })
            .collect()
    }

    /// Create a standard 1v1 skirmish: two squads on an open 32x16 field
    /// with a low wall, workers behind the own squad.
    #[must_use]
    pub fn skirmish() -> Self {
        let mut map = vec![".".repeat(32); 16];
        for row in &mut map[4..12] {
            row.replace_range(16..17, "#");
        }
        let squad = |first: u64, x: f64, health: f64, dps: f64| -> Vec<UnitSpec> {
            (0..4)
                .map(|i| UnitSpec {
                    id: first + i,
                    position: (x, 6.0 + i as f64),
                    health,
                    shield: 0.0,
                    dps,
                    range: 5.0,
                    flying: false,
                    idle: false,
                    caster: None,
                })
                .collect()
        };
        let workers = (0..3)
            .map(|i| UnitSpec {
                id: 100 + i,
                position: (1.0, 6.0 + i as f64),
                health: 40.0,
                shield: 0.0,
                dps: 0.0,
                range: 0.0,
                flying: false,
                idle: false,
                caster: None,
            })
            .collect();

        Self {
            name: "Standard Skirmish".to_string(),
            description: "Two squads meet around a wall; own workers sit behind".to_string(),
            map,
            own: squad(1, 10.0, 100.0, 8.0),
            enemy: squad(50, 22.0, 120.0, 10.0),
            civilians: workers,
            enemy_civilians: Vec::new(),
            anchor: (0.0, 8.0),
            scout_points: vec![(31.0, 0.0), (31.0, 15.0)],
            ability_targets: Vec::new(),
            config: None,
            ticks: default_ticks(),
            removals: Vec::new(),
        }
    }
}
