//! Per-tick unit snapshots supplied by the roster collaborator.

use serde::{Deserialize, Serialize};

use crate::directive::AbilityId;
use crate::math::Vec2Fixed;

/// Stable identifier of a unit for the lifetime of the unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct UnitId(pub u64);

/// Side a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Faction {
    /// Controlled by this engine.
    #[default]
    Own,
    /// Hostile.
    Enemy,
}

/// Spell-casting support stats for units that use abilities instead of
/// fighting in the army.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CasterStats {
    /// Ability this unit casts.
    pub ability: AbilityId,
    /// Current energy.
    pub energy: f64,
    /// Energy needed per cast.
    pub energy_cost: f64,
}

impl CasterStats {
    /// Whether there is enough energy for one cast.
    #[must_use]
    pub fn can_cast(&self) -> bool {
        self.energy >= self.energy_cost
    }
}

/// Snapshot of one combat-relevant unit for a single tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Identity, stable across ticks.
    pub id: UnitId,
    /// Side.
    #[serde(default)]
    pub faction: Faction,
    /// World position; rounded to a cell for grid operations.
    pub position: Vec2Fixed,
    /// Hit points.
    pub health: f64,
    /// Shield points, counted as extra health.
    #[serde(default)]
    pub shield: f64,
    /// Damage per second against ground targets.
    #[serde(default)]
    pub ground_dps: f64,
    /// Weapon range against ground targets.
    #[serde(default)]
    pub ground_range: f64,
    /// Weapon range against air targets.
    #[serde(default)]
    pub air_range: f64,
    /// Sight radius.
    #[serde(default)]
    pub sight_range: f64,
    /// Flying units ignore terrain and cannot be reached by ground paths.
    #[serde(default)]
    pub flying: bool,
    /// No current order.
    #[serde(default)]
    pub idle: bool,
    /// Present for support casters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caster: Option<CasterStats>,
}

impl UnitRecord {
    /// A unit with the given identity and position and no combat stats.
    #[must_use]
    pub fn new(id: UnitId, faction: Faction, position: Vec2Fixed) -> Self {
        Self {
            id,
            faction,
            position,
            health: 0.0,
            shield: 0.0,
            ground_dps: 0.0,
            ground_range: 0.0,
            air_range: 0.0,
            sight_range: 0.0,
            flying: false,
            idle: false,
            caster: None,
        }
    }

    /// Health plus shield.
    #[must_use]
    pub fn effective_health(&self) -> f64 {
        self.health + self.shield
    }

    /// Whether this unit projects combat presence.
    #[must_use]
    pub fn is_combatant(&self) -> bool {
        self.ground_dps > 0.0
    }

    /// Whether this unit belongs to the army this engine micro-manages.
    #[must_use]
    pub fn is_army(&self) -> bool {
        self.faction == Faction::Own && self.is_combatant() && self.caster.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_health_includes_shield() {
        let mut unit = UnitRecord::new(UnitId(1), Faction::Own, Vec2Fixed::ZERO);
        unit.health = 40.0;
        unit.shield = 20.0;
        assert_eq!(unit.effective_health(), 60.0);
    }

    #[test]
    fn test_army_membership() {
        let mut unit = UnitRecord::new(UnitId(1), Faction::Own, Vec2Fixed::ZERO);
        assert!(!unit.is_army(), "unarmed units are not army");

        unit.ground_dps = 10.0;
        assert!(unit.is_army());

        unit.caster = Some(CasterStats {
            ability: AbilityId(7),
            energy: 50.0,
            energy_cost: 25.0,
        });
        assert!(!unit.is_army(), "casters are handled separately");

        unit.caster = None;
        unit.faction = Faction::Enemy;
        assert!(!unit.is_army());
    }

    #[test]
    fn test_caster_energy_gate() {
        let stats = CasterStats {
            ability: AbilityId(1),
            energy: 24.9,
            energy_cost: 25.0,
        };
        assert!(!stats.can_cast());
        assert!(CasterStats { energy: 25.0, ..stats }.can_cast());
    }
}
