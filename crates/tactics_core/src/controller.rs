//! Per-tick tactical decisions for the army.
//!
//! Each call to [`TacticalController::tick`] runs the whole pipeline to
//! completion: presence maps, combat prediction, path costs, multi-source
//! paths toward enemies and toward own civilians, optionally a potential
//! field refinement, and finally one stance per army unit. Only the emitted
//! directives survive between ticks (in the [`ActionCache`]), together with
//! the warm-started [`PotentialField`]; stances are recomputed from scratch.
//!
//! # Example
//!
//! ```
//! use tactics_core::prelude::*;
//!
//! let walkable = Grid::open(20, 20);
//! let mut own = UnitRecord::new(UnitId(1), Faction::Own, Vec2Fixed::from_int(10, 10));
//! own.health = 100.0;
//! own.ground_dps = 10.0;
//! own.sight_range = 5.0;
//! let mut enemy = UnitRecord::new(UnitId(2), Faction::Enemy, Vec2Fixed::from_int(12, 10));
//! enemy.health = 50.0;
//! enemy.ground_dps = 5.0;
//! enemy.sight_range = 5.0;
//!
//! let mut controller = TacticalController::new(TacticsConfig::default()).unwrap();
//! let own = [own];
//! let enemy = [enemy];
//! let report = controller.tick(&TickInput::new(&walkable, &own, &enemy)).unwrap();
//! assert_eq!(report.stance_of(UnitId(1)), Some(CombatStance::Attack));
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{RetreatMode, TacticsConfig};
use crate::directive::{AbilityId, ActionCache, CombatStance, Directive, UnitDirective};
use crate::error::{Result, TacticsError};
use crate::grid::{Cell, Grid};
use crate::influence::{civilian_sources, InfluenceBuilder};
use crate::math::Vec2Fixed;
use crate::multigrid::PotentialField;
use crate::pathfinding::{shortest_paths, PathResult};
use crate::prediction::CombatPrediction;
use crate::unit::{Faction, UnitId, UnitRecord};

/// A point where the host wants an ability cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityTarget {
    /// Ability required.
    pub ability: AbilityId,
    /// Where to cast it; `None` for self-cast abilities.
    pub target: Option<Vec2Fixed>,
}

/// Everything the controller reads in one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput<'a> {
    /// Terrain walkability; must keep its dimensions for the whole session.
    pub walkable: &'a Grid<bool>,
    /// Own units, army and casters.
    pub own: &'a [UnitRecord],
    /// Visible enemy units.
    pub enemy: &'a [UnitRecord],
    /// Non-combatants of either side. Own ones are retreat destinations,
    /// enemy ones are attack targets.
    pub civilians: &'a [UnitRecord],
    /// Fallback retreat point.
    pub anchor: Vec2Fixed,
    /// Exploration points for idle attackers with nothing to attack.
    pub scout_points: &'a [Vec2Fixed],
    /// Pending ability casts.
    pub ability_targets: &'a [AbilityTarget],
}

impl<'a> TickInput<'a> {
    /// Input with just terrain and the two armies.
    #[must_use]
    pub fn new(walkable: &'a Grid<bool>, own: &'a [UnitRecord], enemy: &'a [UnitRecord]) -> Self {
        Self {
            walkable,
            own,
            enemy,
            civilians: &[],
            anchor: Vec2Fixed::ZERO,
            scout_points: &[],
            ability_targets: &[],
        }
    }

    /// Set the civilian roster.
    #[must_use]
    pub fn with_civilians(mut self, civilians: &'a [UnitRecord]) -> Self {
        self.civilians = civilians;
        self
    }

    /// Set the fallback retreat point.
    #[must_use]
    pub fn with_anchor(mut self, anchor: Vec2Fixed) -> Self {
        self.anchor = anchor;
        self
    }

    /// Set the exploration points.
    #[must_use]
    pub fn with_scout_points(mut self, points: &'a [Vec2Fixed]) -> Self {
        self.scout_points = points;
        self
    }

    /// Set the pending ability casts.
    #[must_use]
    pub fn with_ability_targets(mut self, targets: &'a [AbilityTarget]) -> Self {
        self.ability_targets = targets;
        self
    }

    /// `(width, height)` of the terrain.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.walkable.dimensions()
    }
}

/// Stance chosen for one army unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDecision {
    /// Unit classified.
    pub unit: UnitId,
    /// Its stance this tick.
    pub stance: CombatStance,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    /// Tick number, starting at 1 for a fresh session.
    pub tick: u64,
    /// Directives to hand to the command executor, in roster order.
    pub directives: Vec<UnitDirective>,
    /// Directives dropped because they repeated the unit's last one.
    pub suppressed: usize,
    /// Stance of every army unit, including those without a directive.
    pub decisions: Vec<UnitDecision>,
    /// Potential field residual after this tick's solve, if one ran.
    pub potential_residual: Option<f64>,
}

impl TickReport {
    /// Stance assigned to `unit`, if it was classified.
    #[must_use]
    pub fn stance_of(&self, unit: UnitId) -> Option<CombatStance> {
        self.decisions
            .iter()
            .find(|d| d.unit == unit)
            .map(|d| d.stance)
    }

    /// Directive emitted for `unit`, if any.
    #[must_use]
    pub fn directive_for(&self, unit: UnitId) -> Option<Directive> {
        self.directives
            .iter()
            .find(|d| d.unit == unit)
            .map(|d| d.directive)
    }
}

/// Everything derived from one tick's input that unit decisions read.
struct TickContext<'a> {
    input: &'a TickInput<'a>,
    prediction: CombatPrediction,
    attack_targets: Vec<(Cell, Vec2Fixed)>,
    attack_paths: PathResult,
    retreat_paths: PathResult,
}

/// Session-scoped tactical controller.
///
/// Construct one per game session and call [`tick`](Self::tick) once per
/// simulation step. Not meant to be shared between threads mid-tick.
#[derive(Debug)]
pub struct TacticalController {
    config: TacticsConfig,
    influence: InfluenceBuilder,
    potential: PotentialField,
    cache: ActionCache,
    exponent: Option<Grid<f64>>,
    dimensions: Option<(u32, u32)>,
    tick: u64,
}

impl TacticalController {
    /// Controller for a new session. Fails on an invalid config.
    pub fn new(config: TacticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            influence: InfluenceBuilder::new(config.range_policy),
            config,
            potential: PotentialField::new(),
            cache: ActionCache::new(),
            exponent: None,
            dimensions: None,
            tick: 0,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TacticsConfig {
        &self.config
    }

    /// Last-directive cache.
    #[must_use]
    pub fn cache(&self) -> &ActionCache {
        &self.cache
    }

    /// Retreat potential field.
    #[must_use]
    pub fn potential(&self) -> &PotentialField {
        &self.potential
    }

    /// Ticks run this session.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Terrain dimensions the session is bound to, once the first tick ran.
    #[must_use]
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Forget a destroyed unit so a reused id is not suppressed.
    pub fn remove_unit(&mut self, unit: UnitId) -> Option<Directive> {
        self.cache.remove(unit)
    }

    /// Drop all session state; the next tick may bind new terrain.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.potential.reset();
        self.exponent = None;
        self.dimensions = None;
        self.tick = 0;
    }

    /// Combat prediction for `input` without deciding or emitting anything.
    pub fn predict(&mut self, input: &TickInput<'_>) -> Result<CombatPrediction> {
        self.bind_terrain(input.walkable)?;
        let dims = input.dimensions();
        let own = self.influence.build(dims, input.own);
        let enemy = self.influence.build(dims, input.enemy);
        let exponent = match &self.exponent {
            Some(exponent) => exponent.clone(),
            None => self.config.exponent.field(input.walkable),
        };
        CombatPrediction::new(own, enemy, exponent)
    }

    /// Run one tick and return the directives to emit.
    pub fn tick(&mut self, input: &TickInput<'_>) -> Result<TickReport> {
        let prediction = self.predict(input)?;
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        let walkable = input.walkable;
        let (width, height) = walkable.dimensions();
        let cost = Grid::from_fn(width, height, |cell| {
            self.config
                .cost_model
                .cell_cost(&prediction, walkable[cell], cell)
        });

        let attack_targets: Vec<(Cell, Vec2Fixed)> = input
            .enemy
            .iter()
            .chain(input.civilians.iter().filter(|u| u.faction == Faction::Enemy))
            .filter(|u| !u.flying)
            .map(|u| (walkable.cell_of(u.position), u.position))
            .collect();
        let retreat_sources: Vec<&UnitRecord> = input
            .civilians
            .iter()
            .filter(|u| u.faction == Faction::Own)
            .collect();

        let attack_cells: Vec<Cell> = attack_targets.iter().map(|&(cell, _)| cell).collect();
        if attack_cells.is_empty() {
            tracing::debug!(tick = self.tick, "No ground targets; attack paths skipped");
        }
        let attack_paths = shortest_paths(&cost, &attack_cells, self.config.neighbourhood);

        let retreat_paths = match self.config.retreat_mode {
            RetreatMode::Paths => {
                let cells: Vec<Cell> = retreat_sources
                    .iter()
                    .map(|u| walkable.cell_of(u.position))
                    .collect();
                shortest_paths(&cost, &cells, self.config.neighbourhood)
            }
            RetreatMode::Potential { .. } => PathResult::unreachable(width, height),
        };

        if matches!(self.config.retreat_mode, RetreatMode::Potential { .. }) {
            report.potential_residual = self.refine_potential(walkable, &retreat_sources)?;
        }

        let context = TickContext {
            input,
            prediction,
            attack_targets,
            attack_paths,
            retreat_paths,
        };

        for unit in input.own.iter().filter(|u| u.is_army()) {
            let (stance, directive) = self.decide(&context, unit);
            tracing::trace!(tick = self.tick, unit = unit.id.0, ?stance, ?directive, "Classified unit");
            report.decisions.push(UnitDecision {
                unit: unit.id,
                stance,
            });
            let Some(directive) = directive else {
                continue;
            };
            if self.cache.should_emit(unit.id, directive) {
                report.directives.push(UnitDirective {
                    unit: unit.id,
                    directive,
                });
            } else {
                report.suppressed += 1;
            }
        }

        report.directives.extend(assign_abilities(input));

        tracing::debug!(
            tick = self.tick,
            army = report.decisions.len(),
            enemies = input.enemy.len(),
            emitted = report.directives.len(),
            suppressed = report.suppressed,
            "Tactics tick complete"
        );
        Ok(report)
    }

    /// Bind the session to the first terrain seen and reject any other
    /// shape afterwards.
    fn bind_terrain(&mut self, walkable: &Grid<bool>) -> Result<()> {
        let found = walkable.dimensions();
        match self.dimensions {
            Some(expected) if expected != found => {
                return Err(TacticsError::DimensionMismatch { expected, found });
            }
            Some(_) => {}
            None => {
                self.dimensions = Some(found);
                self.exponent = Some(self.config.exponent.field(walkable));
            }
        }
        Ok(())
    }

    /// Refine the potential field toward own civilians. Skipped when there
    /// are none or the solver is disabled; the previous field is kept.
    fn refine_potential(
        &mut self,
        walkable: &Grid<bool>,
        sources: &[&UnitRecord],
    ) -> Result<Option<f64>> {
        if !self.config.solver.enabled {
            return Ok(None);
        }
        if sources.is_empty() {
            tracing::warn!(tick = self.tick, "No civilians to retreat to; potential solve skipped");
            return Ok(None);
        }
        let rhs = civilian_sources(walkable.dimensions(), sources.iter().copied());
        let mask = Grid::mask_from_walkability(walkable);
        let norm = self.potential.solve(&rhs, &mask, &self.config.solver)?;
        Ok(Some(norm))
    }

    fn decide(
        &self,
        context: &TickContext<'_>,
        unit: &UnitRecord,
    ) -> (CombatStance, Option<Directive>) {
        let walkable = context.input.walkable;
        let cell = walkable.cell_of(unit.position);

        let path = context
            .attack_paths
            .path(cell, self.config.attack_hop_cap);
        let far = path.last().copied().unwrap_or(cell);

        if context.prediction.confidence(far) >= self.config.attack_threshold {
            let directive = if path.is_empty() {
                self.attack_without_path(context, unit)
            } else {
                Some(Directive::Attack(far.to_world()))
            };
            return (CombatStance::Attack, directive);
        }

        if context.prediction.enemy_threat(cell) > 0.0 {
            return (CombatStance::Retreat, Some(self.retreat(context, cell)));
        }

        (CombatStance::Hold, Some(Directive::Hold))
    }

    /// Attack order for a unit with no ground path to any target.
    fn attack_without_path(&self, context: &TickContext<'_>, unit: &UnitRecord) -> Option<Directive> {
        let nearest = context
            .attack_targets
            .iter()
            .min_by_key(|&&(_, point)| point.distance_squared(unit.position));
        if let Some(&(_, point)) = nearest {
            return Some(Directive::Attack(point));
        }

        // Scouting only redirects units that are not already busy.
        let points = context.input.scout_points;
        let available = unit.idle || self.cache.last(unit.id) == Some(&Directive::Hold);
        if points.is_empty() || !available {
            return None;
        }
        let index = (unit.id.0 % points.len() as u64) as usize;
        Some(Directive::Attack(points[index]))
    }

    fn retreat(&self, context: &TickContext<'_>, cell: Cell) -> Directive {
        let anchor = Directive::Move(context.input.anchor);
        match self.config.retreat_mode {
            RetreatMode::Paths => {
                let cap = self.config.retreat_hop_cap;
                let path = context.retreat_paths.path(cell, cap);
                match path.last() {
                    None => anchor,
                    // Already close to safety: fight on the way in.
                    Some(&far) if path.len() < cap => Directive::Attack(far.to_world()),
                    Some(&far) => Directive::Move(far.to_world()),
                }
            }
            RetreatMode::Potential { step } => {
                let Some(direction) = self.potential.ascent_direction(cell) else {
                    return anchor;
                };
                let target = walk_until_blocked(context.input.walkable, cell, direction, step);
                if target == cell {
                    anchor
                } else {
                    Directive::Move(target.to_world())
                }
            }
        }
    }
}

/// Last cell reached walking up to `step` cells from `start` along the unit
/// vector `(dx, dy)`. Stops before the first blocked cell or diagonal corner
/// cut, and at the map edge.
fn walk_until_blocked(walkable: &Grid<bool>, start: Cell, (dx, dy): (f64, f64), step: f64) -> Cell {
    // Half-cell samples never skip a cell.
    let samples = (step * 2.0).ceil().max(1.0) as u32;
    let max_x = f64::from(walkable.width() - 1);
    let max_y = f64::from(walkable.height() - 1);
    let mut reached = start;
    for i in 1..=samples {
        let t = step * f64::from(i) / f64::from(samples);
        let x = (f64::from(start.x) + t * dx).clamp(0.0, max_x);
        let y = (f64::from(start.y) + t * dy).clamp(0.0, max_y);
        let next = walkable.cell_of(Vec2Fixed::from_f64(x, y));
        if next == reached {
            continue;
        }
        let corner_clear = next.x == reached.x
            || next.y == reached.y
            || (walkable[Cell::new(next.x, reached.y)] && walkable[Cell::new(reached.x, next.y)]);
        if !walkable[next] || !corner_clear {
            break;
        }
        reached = next;
    }
    reached
}

/// Pair idle casters that can afford a cast with pending targets of their
/// ability, in roster order. Each target is used at most once.
fn assign_abilities(input: &TickInput<'_>) -> Vec<UnitDirective> {
    let mut used = vec![false; input.ability_targets.len()];
    let mut directives = Vec::new();
    for unit in input.own.iter().filter(|u| u.faction == Faction::Own && u.idle) {
        let Some(caster) = unit.caster.filter(|c| c.can_cast()) else {
            continue;
        };
        let slot = input
            .ability_targets
            .iter()
            .enumerate()
            .find(|&(i, t)| !used[i] && t.ability == caster.ability);
        if let Some((i, target)) = slot {
            used[i] = true;
            directives.push(UnitDirective {
                unit: unit.id,
                directive: Directive::AbilityUse {
                    ability: caster.ability,
                    target: target.target,
                },
            });
        }
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::ExponentModel;
    use crate::unit::CasterStats;

    fn fighter(id: u64, faction: Faction, x: i32, y: i32, health: f64, dps: f64) -> UnitRecord {
        let mut unit = UnitRecord::new(UnitId(id), faction, Vec2Fixed::from_int(x, y));
        unit.health = health;
        unit.ground_dps = dps;
        unit.ground_range = 5.0;
        unit.sight_range = 5.0;
        unit
    }

    fn civilian(id: u64, faction: Faction, x: i32, y: i32) -> UnitRecord {
        let mut unit = UnitRecord::new(UnitId(id), faction, Vec2Fixed::from_int(x, y));
        unit.health = 40.0;
        unit
    }

    fn controller() -> TacticalController {
        TacticalController::new(TacticsConfig {
            exponent: ExponentModel::Uniform(2.0),
            ..TacticsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_stronger_army_attacks() {
        let walkable = Grid::open(20, 20);
        let own = [fighter(1, Faction::Own, 10, 10, 100.0, 10.0)];
        let enemy = [fighter(2, Faction::Enemy, 12, 10, 50.0, 5.0)];
        let mut controller = controller();
        let report = controller.tick(&TickInput::new(&walkable, &own, &enemy)).unwrap();
        assert_eq!(report.stance_of(UnitId(1)), Some(CombatStance::Attack));
        assert_eq!(
            report.directive_for(UnitId(1)),
            Some(Directive::Attack(Vec2Fixed::from_int(12, 10)))
        );
        assert_eq!(report.tick, 1);
    }

    #[test]
    fn test_weaker_army_retreats_to_anchor_without_civilians() {
        let walkable = Grid::open(20, 20);
        let own = [fighter(1, Faction::Own, 10, 10, 50.0, 5.0)];
        let enemy = [fighter(2, Faction::Enemy, 12, 10, 100.0, 10.0)];
        let anchor = Vec2Fixed::from_int(1, 1);
        let mut controller = controller();
        let input = TickInput::new(&walkable, &own, &enemy).with_anchor(anchor);
        let report = controller.tick(&input).unwrap();
        assert_eq!(report.stance_of(UnitId(1)), Some(CombatStance::Retreat));
        assert_eq!(report.directive_for(UnitId(1)), Some(Directive::Move(anchor)));
    }

    #[test]
    fn test_retreat_follows_capped_path_to_civilians() {
        let walkable = Grid::open(30, 5);
        let own = [fighter(1, Faction::Own, 15, 2, 50.0, 5.0)];
        let enemy = [fighter(2, Faction::Enemy, 17, 2, 100.0, 10.0)];
        let civilians = [civilian(3, Faction::Own, 1, 2)];
        let mut controller = controller();
        let input = TickInput::new(&walkable, &own, &enemy).with_civilians(&civilians);
        let report = controller.tick(&input).unwrap();
        assert_eq!(report.stance_of(UnitId(1)), Some(CombatStance::Retreat));
        let Some(Directive::Move(target)) = report.directive_for(UnitId(1)) else {
            panic!("expected a move order");
        };
        // Eight cells along the way, starting from the unit's own cell.
        assert_eq!(target.rounded().0, 8);
    }

    #[test]
    fn test_retreat_near_civilians_attack_moves() {
        let walkable = Grid::open(20, 5);
        let own = [fighter(1, Faction::Own, 4, 2, 50.0, 5.0)];
        let enemy = [fighter(2, Faction::Enemy, 6, 2, 100.0, 10.0)];
        let civilians = [civilian(3, Faction::Own, 1, 2)];
        let mut controller = controller();
        let input = TickInput::new(&walkable, &own, &enemy).with_civilians(&civilians);
        let report = controller.tick(&input).unwrap();
        assert_eq!(
            report.directive_for(UnitId(1)),
            Some(Directive::Attack(Vec2Fixed::from_int(1, 2)))
        );
    }

    #[test]
    fn test_no_enemies_means_attack_or_scout() {
        let walkable = Grid::open(10, 10);
        let mut unit = fighter(4, Faction::Own, 3, 3, 50.0, 5.0);
        unit.idle = true;
        let own = [unit];
        let scouts = [Vec2Fixed::from_int(0, 9), Vec2Fixed::from_int(9, 9)];
        let mut controller = controller();
        let input = TickInput::new(&walkable, &own, &[]).with_scout_points(&scouts);
        let report = controller.tick(&input).unwrap();
        assert_eq!(report.stance_of(UnitId(4)), Some(CombatStance::Attack));
        assert_eq!(report.directive_for(UnitId(4)), Some(Directive::Attack(scouts[0])));
    }

    #[test]
    fn test_busy_unit_is_not_sent_scouting() {
        let walkable = Grid::open(10, 10);
        let own = [fighter(4, Faction::Own, 3, 3, 50.0, 5.0)];
        let scouts = [Vec2Fixed::from_int(9, 9)];
        let mut controller = controller();
        let input = TickInput::new(&walkable, &own, &[]).with_scout_points(&scouts);
        let report = controller.tick(&input).unwrap();
        assert!(report.directives.is_empty());
        assert_eq!(report.suppressed, 0);
    }

    #[test]
    fn test_walled_off_target_attacked_directly() {
        let walkable = Grid::from_fn(20, 20, |c| c.x != 10);
        let own = [fighter(1, Faction::Own, 3, 3, 100.0, 10.0)];
        let enemy = [fighter(2, Faction::Enemy, 16, 3, 50.0, 5.0)];
        let mut controller = controller();
        let report = controller.tick(&TickInput::new(&walkable, &own, &enemy)).unwrap();
        assert_eq!(
            report.directive_for(UnitId(1)),
            Some(Directive::Attack(Vec2Fixed::from_int(16, 3)))
        );
    }

    #[test]
    fn test_flying_enemies_are_not_targets() {
        let walkable = Grid::open(20, 20);
        let own = [fighter(1, Faction::Own, 3, 3, 100.0, 10.0)];
        let mut flyer = fighter(2, Faction::Enemy, 16, 16, 50.0, 5.0);
        flyer.flying = true;
        let enemy = [flyer];
        let mut controller = controller();
        let report = controller.tick(&TickInput::new(&walkable, &own, &enemy)).unwrap();
        // No ground target and no scout points: attack stance, no order.
        assert_eq!(report.stance_of(UnitId(1)), Some(CombatStance::Attack));
        assert!(report.directives.is_empty());
    }

    #[test]
    fn test_enemy_civilians_are_targets() {
        let walkable = Grid::open(20, 20);
        let own = [fighter(1, Faction::Own, 3, 3, 100.0, 10.0)];
        let civilians = [civilian(7, Faction::Enemy, 5, 3)];
        let mut controller = controller();
        let input = TickInput::new(&walkable, &own, &[]).with_civilians(&civilians);
        let report = controller.tick(&input).unwrap();
        assert_eq!(
            report.directive_for(UnitId(1)),
            Some(Directive::Attack(Vec2Fixed::from_int(5, 3)))
        );
    }

    #[test]
    fn test_repeat_tick_is_suppressed_and_removal_reemits() {
        let walkable = Grid::open(20, 20);
        let own = [fighter(1, Faction::Own, 10, 10, 100.0, 10.0)];
        let enemy = [fighter(2, Faction::Enemy, 12, 10, 50.0, 5.0)];
        let mut controller = controller();
        let input = TickInput::new(&walkable, &own, &enemy);

        assert_eq!(controller.tick(&input).unwrap().directives.len(), 1);
        let second = controller.tick(&input).unwrap();
        assert!(second.directives.is_empty());
        assert_eq!(second.suppressed, 1);

        assert!(controller.remove_unit(UnitId(1)).is_some());
        assert_eq!(controller.tick(&input).unwrap().directives.len(), 1);
    }

    #[test]
    fn test_hold_when_losing_but_unthreatened() {
        let walkable = Grid::open(30, 5);
        let own = [fighter(1, Faction::Own, 2, 2, 10.0, 1.0)];
        // The capped path ends outside both footprints, where confidence is 0.
        let enemy = [fighter(2, Faction::Enemy, 27, 2, 1000.0, 50.0)];
        let mut controller = TacticalController::new(TacticsConfig {
            attack_threshold: 0.5,
            exponent: ExponentModel::Uniform(2.0),
            ..TacticsConfig::default()
        })
        .unwrap();
        let report = controller.tick(&TickInput::new(&walkable, &own, &enemy)).unwrap();
        assert_eq!(report.stance_of(UnitId(1)), Some(CombatStance::Hold));
        assert_eq!(report.directive_for(UnitId(1)), Some(Directive::Hold));
    }

    #[test]
    fn test_potential_retreat_moves_toward_civilians() {
        let walkable = Grid::open(32, 32);
        let own = [fighter(1, Faction::Own, 20, 16, 50.0, 5.0)];
        let enemy = [fighter(2, Faction::Enemy, 22, 16, 100.0, 10.0)];
        let civilians = [civilian(3, Faction::Own, 12, 16)];
        let mut controller = TacticalController::new(TacticsConfig {
            exponent: ExponentModel::Uniform(2.0),
            retreat_mode: RetreatMode::Potential { step: 4.0 },
            ..TacticsConfig::default()
        })
        .unwrap();
        let input = TickInput::new(&walkable, &own, &enemy).with_civilians(&civilians);
        let mut report = controller.tick(&input).unwrap();
        for _ in 0..5 {
            report = controller.tick(&input).unwrap();
        }
        assert!(report.potential_residual.is_some());
        assert_eq!(report.stance_of(UnitId(1)), Some(CombatStance::Retreat));
        let Some(Directive::Move(target)) = controller.cache().last(UnitId(1)).copied() else {
            panic!("expected a move order");
        };
        assert!(target.rounded().0 < 20);
    }

    #[test]
    fn test_potential_retreat_stops_at_walls() {
        // Civilians sit behind a thick wall; the field leaks across it.
        let walkable = Grid::from_fn(32, 32, |c| !((14..=17).contains(&c.x) && c.y >= 6));
        let mut own = Vec::new();
        for (i, x) in (10..=13).enumerate() {
            own.push(fighter(10 + i as u64, Faction::Own, x, 14, 20.0, 1.0));
            own.push(fighter(20 + i as u64, Faction::Own, x, 20, 20.0, 1.0));
        }
        let mut enemy = fighter(2, Faction::Enemy, 8, 17, 2000.0, 50.0);
        enemy.sight_range = 8.0;
        let enemy = [enemy];
        let civilians = [civilian(3, Faction::Own, 26, 20)];
        let mut controller = TacticalController::new(TacticsConfig {
            exponent: ExponentModel::Uniform(2.0),
            retreat_mode: RetreatMode::Potential { step: 4.0 },
            ..TacticsConfig::default()
        })
        .unwrap();
        let input = TickInput::new(&walkable, &own, &enemy).with_civilians(&civilians);

        let mut retreats = 0;
        for _ in 0..9 {
            let report = controller.tick(&input).unwrap();
            for unit in &own {
                if report.stance_of(unit.id) != Some(CombatStance::Retreat) {
                    continue;
                }
                let Some(Directive::Move(target)) = controller.cache().last(unit.id).copied() else {
                    panic!("expected a move order for {:?}", unit.id);
                };
                let cell = walkable.cell_of(target);
                assert!(walkable[cell], "{:?} sent onto blocked {cell:?}", unit.id);
                assert!(cell.x < 14, "{:?} sent across the wall to {cell:?}", unit.id);
                retreats += 1;
            }
        }
        assert!(retreats > 0);
    }

    #[test]
    fn test_walk_until_blocked() {
        let walkable = Grid::from_fn(12, 12, |c| c.x != 7);
        let start = Cell::new(3, 5);
        assert_eq!(walk_until_blocked(&walkable, start, (1.0, 0.0), 6.0), Cell::new(6, 5));
        assert_eq!(walk_until_blocked(&walkable, start, (-1.0, 0.0), 2.0), Cell::new(1, 5));
        // Clamped at the map edge.
        assert_eq!(walk_until_blocked(&walkable, start, (0.0, 1.0), 20.0), Cell::new(3, 11));
        // Facing an adjacent wall goes nowhere.
        assert_eq!(walk_until_blocked(&walkable, Cell::new(6, 5), (1.0, 0.0), 4.0), Cell::new(6, 5));

        // No squeezing diagonally between two blocked corners.
        let mut pinched = Grid::open(6, 6);
        pinched[Cell::new(2, 1)] = false;
        pinched[Cell::new(1, 2)] = false;
        let diagonal = std::f64::consts::FRAC_1_SQRT_2;
        assert_eq!(
            walk_until_blocked(&pinched, Cell::new(1, 1), (diagonal, diagonal), 3.0),
            Cell::new(1, 1)
        );
    }

    #[test]
    fn test_casters_use_abilities_and_skip_micro() {
        let walkable = Grid::open(10, 10);
        let mut queen = fighter(5, Faction::Own, 2, 2, 100.0, 4.0);
        queen.idle = true;
        queen.caster = Some(CasterStats {
            ability: AbilityId(1),
            energy: 30.0,
            energy_cost: 25.0,
        });
        let mut tired = queen.clone();
        tired.id = UnitId(6);
        tired.caster = Some(CasterStats {
            ability: AbilityId(1),
            energy: 10.0,
            energy_cost: 25.0,
        });
        let own = [tired, queen];
        let targets = [
            AbilityTarget {
                ability: AbilityId(2),
                target: None,
            },
            AbilityTarget {
                ability: AbilityId(1),
                target: Some(Vec2Fixed::from_int(3, 3)),
            },
        ];
        let mut controller = controller();
        let input = TickInput::new(&walkable, &own, &[]).with_ability_targets(&targets);
        let report = controller.tick(&input).unwrap();
        assert!(report.decisions.is_empty());
        assert_eq!(
            report.directives,
            vec![UnitDirective {
                unit: UnitId(5),
                directive: Directive::AbilityUse {
                    ability: AbilityId(1),
                    target: Some(Vec2Fixed::from_int(3, 3)),
                },
            }]
        );
    }

    #[test]
    fn test_terrain_shape_is_fixed_per_session() {
        let mut controller = controller();
        controller
            .tick(&TickInput::new(&Grid::open(10, 10), &[], &[]))
            .unwrap();
        let err = controller
            .tick(&TickInput::new(&Grid::open(12, 10), &[], &[]))
            .unwrap_err();
        assert!(matches!(err, TacticsError::DimensionMismatch { .. }));

        controller.reset();
        assert_eq!(controller.ticks(), 0);
        controller
            .tick(&TickInput::new(&Grid::open(12, 10), &[], &[]))
            .unwrap();
        assert_eq!(controller.dimensions(), Some((12, 10)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TacticsConfig {
            attack_threshold: f64::INFINITY,
            ..TacticsConfig::default()
        };
        assert!(TacticalController::new(config).is_err());
    }
}
