//! Unit-level commands and the cache that keeps them from repeating.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::math::Vec2Fixed;
use crate::unit::UnitId;

/// Identifier of an ability understood by the command executor.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct AbilityId(pub u32);

/// A command for one unit.
///
/// The set is closed: the command executor matches it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Directive {
    /// Attack-move toward a point, engaging anything on the way.
    Attack(Vec2Fixed),
    /// Move toward a point without engaging.
    Move(Vec2Fixed),
    /// Stop and hold position, cancelling any movement order.
    Hold,
    /// Use an ability, optionally at a target point.
    AbilityUse {
        /// Ability to cast.
        ability: AbilityId,
        /// Target point, `None` for self-cast abilities.
        target: Option<Vec2Fixed>,
    },
    /// Explicitly do nothing.
    Idle,
}

impl Directive {
    /// Target point of the directive, if it has one.
    #[must_use]
    pub fn target(&self) -> Option<Vec2Fixed> {
        match self {
            Self::Attack(p) | Self::Move(p) => Some(*p),
            Self::AbilityUse { target, .. } => *target,
            Self::Hold | Self::Idle => None,
        }
    }
}

/// A directive addressed to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitDirective {
    /// Recipient.
    pub unit: UnitId,
    /// What to do.
    pub directive: Directive,
}

/// Combat stance a unit is classified into each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CombatStance {
    /// Predicted to win: advance.
    Attack,
    /// No threat and no favourable fight: stand still.
    Hold,
    /// Threatened and predicted to lose: fall back.
    Retreat,
}

/// Last directive emitted per unit.
///
/// Entries must be purged through [`ActionCache::remove`] when a unit dies,
/// otherwise a reused identifier could be wrongly suppressed.
#[derive(Debug, Clone, Default)]
pub struct ActionCache {
    last: HashMap<UnitId, Directive>,
}

impl ActionCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `directive` for `unit` and report whether it should be
    /// emitted. Returns `false` when it equals the last emitted directive.
    pub fn should_emit(&mut self, unit: UnitId, directive: Directive) -> bool {
        match self.last.insert(unit, directive) {
            Some(previous) => previous != directive,
            None => true,
        }
    }

    /// Last directive emitted for `unit`.
    #[must_use]
    pub fn last(&self, unit: UnitId) -> Option<&Directive> {
        self.last.get(&unit)
    }

    /// Forget a unit. Returns the directive that was cached for it.
    pub fn remove(&mut self, unit: UnitId) -> Option<Directive> {
        self.last.remove(&unit)
    }

    /// Number of tracked units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last.len()
    }

    /// True when no unit is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }

    /// Forget every unit.
    pub fn clear(&mut self) {
        self.last.clear();
    }
}
