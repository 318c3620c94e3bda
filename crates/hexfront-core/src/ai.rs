//! Computer opponent.
//!
//! A [`Strategist`] reads a `GameState` snapshot and produces at most one
//! purchase and a set of moves per planning phase, plus fight-or-flee
//! decisions for combats in which its faction defends. Behavior is shaped by
//! five weights ([`AiWeights`]); every random roll draws from the caller's
//! RNG.

use crate::combat::{total_power, CombatOutcome};
use crate::game_state::{GameError, GamePhase, GameState, PendingPurchase};
use crate::hex::HexCoord;
use crate::mapgen::base_candidates;
use crate::pathfinding::{find_path, movement_budget, path_cost, PathConfig};
use crate::settings::{AiWeights, Difficulty};
use crate::types::{Faction, UnitId};
use crate::unit::{Unit, UnitType};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Distance from the base within which enemies count as a threat.
const THREAT_RADIUS: u32 = 3;

/// Purchase preferences, best first.
const DEFENSIVE_UNITS: [UnitType; 2] = [UnitType::Artillery, UnitType::Infantry];
const FAST_UNITS: [UnitType; 2] = [UnitType::Helicopter, UnitType::Tank];
/// Most expensive first.
const OFFENSIVE_UNITS: [UnitType; 4] = [
    UnitType::Helicopter,
    UnitType::Artillery,
    UnitType::Tank,
    UnitType::Infantry,
];

/// Why a unit was given its move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveIntent {
    Retreat,
    Defend,
    CaptureResource,
    Attack,
    Wander,
}

/// A move the strategist wants to queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedMove {
    pub unit_id: UnitId,
    pub to: HexCoord,
    pub intent: MoveIntent,
}

/// Orders for one planning phase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnPlan {
    pub purchase: Option<PendingPurchase>,
    pub moves: Vec<PlannedMove>,
}

/// Heuristic decision-maker for one faction.
#[derive(Clone, Debug)]
pub struct Strategist {
    pub faction: Faction,
    pub weights: AiWeights,
}

impl Strategist {
    /// Create a strategist using a difficulty tier's weights.
    pub fn new(faction: Faction, difficulty: Difficulty) -> Self {
        Self::with_weights(faction, difficulty.weights())
    }

    /// Create a strategist with explicit weights.
    pub fn with_weights(faction: Faction, weights: AiWeights) -> Self {
        Self { faction, weights }
    }

    fn roll<R: Rng + ?Sized>(rng: &mut R, weight: f32) -> bool {
        rng.gen::<f32>() < weight
    }

    fn enemies<'a>(&self, state: &'a GameState) -> impl Iterator<Item = &'a Unit> + 'a {
        state.units_of(self.faction.opponent())
    }

    // ==================== Threat assessment ====================

    /// Enemy units within striking distance of our base.
    pub fn threats_to_base<'a>(&self, state: &'a GameState) -> Vec<&'a Unit> {
        let Some(base) = state.base_of(self.faction) else {
            return Vec::new();
        };
        self.enemies(state)
            .filter(|u| u.position.distance(&base) <= THREAT_RADIUS)
            .collect()
    }

    /// Base is threatened by two or more enemies, or by more than 5 attack.
    pub fn base_threatened(&self, state: &GameState) -> bool {
        let threats = self.threats_to_base(state);
        threats.len() >= 2 || total_power(&threats) > 5
    }

    /// Adjacent enemy attack relative to the unit's remaining health.
    pub fn unit_threat(&self, state: &GameState, unit: &Unit) -> f32 {
        let adjacent: u32 = unit
            .position
            .neighbors()
            .iter()
            .filter_map(|n| state.unit_at(n))
            .filter(|u| u.owner != unit.owner)
            .map(|u| u.attack_power())
            .sum();
        adjacent as f32 / unit.lifespan.max(1) as f32
    }

    /// Resource hexes we do not control yet and have no unit on.
    fn open_resources(&self, state: &GameState) -> Vec<HexCoord> {
        state
            .map
            .resource_hexes()
            .into_iter()
            .filter(|h| h.owner != Some(self.faction))
            .filter(|h| state.unit_at(&h.coord).map_or(true, |u| u.owner != self.faction))
            .map(|h| h.coord)
            .collect()
    }

    // ==================== Planning ====================

    /// Decide this faction's purchase and moves.
    #[instrument(skip_all, fields(faction = %self.faction, turn = state.turn))]
    pub fn plan_turn<R: Rng + ?Sized>(&self, state: &GameState, rng: &mut R) -> TurnPlan {
        let mut plan = TurnPlan::default();
        let mut claimed: HashSet<HexCoord> = HashSet::new();
        let threatened = self.base_threatened(state);

        plan.purchase = self.choose_purchase(state, threatened, rng);
        if let Some(purchase) = &plan.purchase {
            claimed.insert(purchase.position);
        }

        let unit_ids: Vec<UnitId> = state.units_of(self.faction).map(|u| u.id).collect();
        for id in unit_ids {
            let Some(unit) = state.unit(id) else {
                continue;
            };
            if let Some(planned) = self.choose_move(state, unit, threatened, &claimed, rng) {
                claimed.insert(planned.to);
                plan.moves.push(planned);
            }
        }

        debug!(
            purchase = ?plan.purchase.as_ref().map(|p| p.unit_type),
            moves = plan.moves.len(),
            "turn planned"
        );
        plan
    }

    /// Pick a unit type and a deployment hex, if we can afford anything.
    pub fn choose_purchase<R: Rng + ?Sized>(
        &self,
        state: &GameState,
        threatened: bool,
        rng: &mut R,
    ) -> Option<PendingPurchase> {
        let points = state.player(self.faction).points;
        let affordable: Vec<UnitType> = UnitType::all()
            .iter()
            .copied()
            .filter(|t| t.cost() <= points)
            .collect();
        if affordable.is_empty() {
            return None;
        }

        let position = self.deployment_hex(state, rng)?;
        let first_affordable =
            |prefs: &[UnitType]| prefs.iter().copied().find(|t| affordable.contains(t));

        let mut choice = None;
        if threatened {
            choice = first_affordable(&DEFENSIVE_UNITS);
        }
        if choice.is_none()
            && !self.open_resources(state).is_empty()
            && Self::roll(rng, self.weights.resource_focus)
        {
            choice = first_affordable(&FAST_UNITS);
        }
        if choice.is_none() && Self::roll(rng, self.weights.aggressiveness) {
            choice = first_affordable(&OFFENSIVE_UNITS);
        }
        let unit_type = match choice {
            Some(t) => t,
            None if Self::roll(rng, self.weights.unit_diversity) => {
                self.least_owned(state, &affordable)?
            }
            None => affordable.iter().copied().min_by_key(|t| t.cost())?,
        };

        Some(PendingPurchase {
            faction: self.faction,
            unit_type,
            position,
        })
    }

    /// Affordable type with the fewest copies on our roster.
    fn least_owned(&self, state: &GameState, affordable: &[UnitType]) -> Option<UnitType> {
        affordable.iter().copied().min_by_key(|t| {
            state
                .units_of(self.faction)
                .filter(|u| u.unit_type == *t)
                .count()
        })
    }

    /// Random hex next to our base where a new unit can be deployed.
    fn deployment_hex<R: Rng + ?Sized>(&self, state: &GameState, rng: &mut R) -> Option<HexCoord> {
        let base = state.base_of(self.faction)?;
        let options: Vec<HexCoord> = state
            .map
            .neighbors(&base)
            .into_iter()
            .filter(|c| {
                state.map.get(c).map_or(false, |h| {
                    h.terrain.is_buildable() && !h.is_base && !h.is_occupied()
                })
            })
            .collect();
        options.choose(rng).copied()
    }

    /// Pick one unit's move. Rules are tried in priority order; a rule that
    /// yields no usable hex falls through to the next.
    fn choose_move<R: Rng + ?Sized>(
        &self,
        state: &GameState,
        unit: &Unit,
        threatened: bool,
        claimed: &HashSet<HexCoord>,
        rng: &mut R,
    ) -> Option<PlannedMove> {
        let planned = |to: HexCoord, intent: MoveIntent| PlannedMove {
            unit_id: unit.id,
            to,
            intent,
        };
        let own_base = state.base_of(self.faction);

        // 1. Fall back when in danger
        if self.unit_threat(state, unit) > self.weights.retreat_threshold {
            let toward_base = own_base.and_then(|b| step_toward(state, unit, b, claimed));
            if let Some(to) = toward_base.or_else(|| self.step_away(state, unit, claimed)) {
                return Some(planned(to, MoveIntent::Retreat));
            }
        }

        // 2. Intercept whoever is closest to our base
        if threatened && Self::roll(rng, self.weights.defense_preference) {
            if let Some(base) = own_base {
                let target = self
                    .threats_to_base(state)
                    .into_iter()
                    .min_by_key(|u| (u.position.distance(&base), u.position))
                    .map_or(base, |u| u.position);
                if let Some(to) = step_toward(state, unit, target, claimed) {
                    return Some(planned(to, MoveIntent::Defend));
                }
            }
        }

        // 3. Grab the nearest open resource
        if suits_capture(unit.unit_type) && Self::roll(rng, self.weights.resource_focus) {
            let nearest = self
                .open_resources(state)
                .into_iter()
                .filter(|c| !claimed.contains(c))
                .min_by_key(|c| (unit.position.distance(c), *c));
            if let Some(to) = nearest.and_then(|c| step_toward(state, unit, c, claimed)) {
                return Some(planned(to, MoveIntent::CaptureResource));
            }
        }

        // 4. Push toward the enemy base
        if Self::roll(rng, self.weights.aggressiveness) {
            let enemy_base = state.base_of(self.faction.opponent());
            if let Some(to) = enemy_base.and_then(|b| step_toward(state, unit, b, claimed)) {
                return Some(planned(to, MoveIntent::Attack));
            }
        }

        // 5. Anywhere reachable
        let options: Vec<HexCoord> = state
            .reachable_destinations(unit.id)
            .ok()?
            .into_iter()
            .filter(|c| !claimed.contains(c))
            .collect();
        options
            .choose(rng)
            .map(|to| planned(*to, MoveIntent::Wander))
    }

    /// Reachable hex that puts the most distance between the unit and the
    /// nearest enemy, if it improves on staying put.
    fn step_away(
        &self,
        state: &GameState,
        unit: &Unit,
        claimed: &HashSet<HexCoord>,
    ) -> Option<HexCoord> {
        let enemies: Vec<HexCoord> = self.enemies(state).map(|u| u.position).collect();
        let nearest_enemy = |c: &HexCoord| {
            enemies
                .iter()
                .map(|e| e.distance(c))
                .min()
                .unwrap_or(u32::MAX)
        };

        let current = nearest_enemy(&unit.position);
        state
            .reachable_destinations(unit.id)
            .ok()?
            .into_iter()
            .filter(|c| !claimed.contains(c))
            .map(|c| (nearest_enemy(&c), c))
            .filter(|(d, _)| *d > current)
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))
            .map(|(_, c)| c)
    }

    // ==================== Combat ====================

    /// Decide whether our defenders should flee a combat.
    ///
    /// Only combats in which this faction defends are considered; the
    /// answer is always `false` otherwise.
    pub fn should_retreat<R: Rng + ?Sized>(
        &self,
        state: &GameState,
        combat_index: usize,
        rng: &mut R,
    ) -> bool {
        let Some(combat) = state.combats.get(combat_index) else {
            return false;
        };
        let defenders: Vec<&Unit> = combat
            .defenders
            .iter()
            .filter_map(|id| state.unit(*id))
            .collect();
        if defenders.is_empty() || defenders.iter().any(|u| u.owner != self.faction) {
            return false;
        }
        let attackers: Vec<&Unit> = combat
            .attackers
            .iter()
            .filter_map(|id| state.unit(*id))
            .collect();

        let attacker_power = total_power(&attackers) as f32;
        let defender_power = total_power(&defenders) as f32;
        let avg_health =
            defenders.iter().map(|u| u.health_fraction()).sum::<f32>() / defenders.len() as f32;

        attacker_power > 1.5 * defender_power
            || avg_health < self.weights.retreat_threshold
            || rng.gen::<f32>() < 0.1 * (1.0 - self.weights.aggressiveness)
    }

    // ==================== Setup ====================

    /// Pick a base site on the rim, as far as possible from the opponent's
    /// base. Ties (or no opposing base yet) are broken at random.
    pub fn choose_base_location<R: Rng + ?Sized>(
        &self,
        state: &GameState,
        rng: &mut R,
    ) -> Option<HexCoord> {
        let candidates = base_candidates(&state.map);
        let best: Vec<HexCoord> = match state.base_of(self.faction.opponent()) {
            Some(enemy) => {
                let furthest = candidates.iter().map(|c| c.distance(&enemy)).max()?;
                candidates
                    .into_iter()
                    .filter(|c| c.distance(&enemy) == furthest)
                    .collect()
            }
            None => candidates,
        };
        best.choose(rng).copied()
    }

    // ==================== Driving the engine ====================

    /// Plan a turn and queue it through the same calls a human uses.
    pub fn queue_turn<R: Rng + ?Sized>(
        &self,
        state: &mut GameState,
        rng: &mut R,
    ) -> Result<TurnPlan, GameError> {
        let plan = self.plan_turn(state, rng);
        if let Some(p) = &plan.purchase {
            state.add_pending_purchase(p.faction, p.unit_type, p.position)?;
        }
        for m in &plan.moves {
            state.add_pending_move(self.faction, m.unit_id, m.to)?;
        }
        Ok(plan)
    }

    /// Resolve every open combat in which this faction defends.
    pub fn resolve_defensive_combats<R: Rng + ?Sized>(
        &self,
        state: &mut GameState,
        rng: &mut R,
    ) -> Result<Vec<CombatOutcome>, GameError> {
        let mut outcomes = Vec::new();
        for index in state.unresolved_combats() {
            if state.phase != GamePhase::Combat {
                break;
            }
            let defends = state.combats.get(index).map_or(false, |c| {
                !c.resolved
                    && c.defenders
                        .iter()
                        .any(|id| state.unit(*id).map_or(false, |u| u.owner == self.faction))
            });
            if !defends {
                continue;
            }
            let retreat = self.should_retreat(state, index, rng);
            debug!(index, retreat, "defensive combat decision");
            outcomes.push(state.resolve_combat(index, retreat)?);
        }
        Ok(outcomes)
    }
}

/// Unit types sent to occupy resource hexes.
fn suits_capture(unit_type: UnitType) -> bool {
    matches!(
        unit_type,
        UnitType::Infantry | UnitType::Tank | UnitType::Helicopter
    )
}

/// Furthest enterable, unclaimed hex along the cheapest path to `target`
/// that the unit can reach this round.
fn step_toward(
    state: &GameState,
    unit: &Unit,
    target: HexCoord,
    claimed: &HashSet<HexCoord>,
) -> Option<HexCoord> {
    let config = PathConfig::unbounded(unit.is_flying());
    let path = find_path(&state.map, unit.position, target, &config)?;
    let budget = movement_budget(unit.movement_range());

    let mut spent = 0u32;
    let mut best = None;
    for pair in path.path.windows(2) {
        spent = spent.saturating_add(path_cost(&state.map, pair, &config)?);
        if spent > budget {
            break;
        }
        let step = pair[1];
        let free = state
            .map
            .get(&step)
            .map_or(false, |h| h.can_enter(unit.owner, unit.is_flying()));
        if free && !claimed.contains(&step) {
            best = Some(step);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Map;
    use crate::settings::GameConfig;
    use crate::terrain::Terrain;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const PLAYER_BASE: HexCoord = HexCoord::new(-4, 0);
    const AI_BASE: HexCoord = HexCoord::new(4, 0);

    fn create_planning_game() -> GameState {
        let mut game = GameState::new(GameConfig::small(), Map::filled(4, Terrain::Plain));
        game.set_base_location(Faction::Player, PLAYER_BASE).unwrap();
        game.set_base_location(Faction::Ai, AI_BASE).unwrap();
        game
    }

    fn spawn(game: &mut GameState, owner: Faction, unit_type: UnitType, q: i32, r: i32) -> UnitId {
        game.spawn_unit(owner, unit_type, HexCoord::new(q, r)).unwrap()
    }

    fn weights(aggressiveness: f32, defense: f32, resource: f32, diversity: f32) -> AiWeights {
        AiWeights {
            aggressiveness,
            defense_preference: defense,
            resource_focus: resource,
            unit_diversity: diversity,
            retreat_threshold: 0.5,
        }
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn test_base_threat() {
        let mut game = create_planning_game();
        let ai = Strategist::new(Faction::Ai, Difficulty::Medium);
        assert!(!ai.base_threatened(&game));

        spawn(&mut game, Faction::Player, UnitType::Infantry, 2, 0);
        assert!(!ai.base_threatened(&game));

        spawn(&mut game, Faction::Player, UnitType::Medic, 2, 1);
        assert!(ai.base_threatened(&game));
    }

    #[test]
    fn test_base_threat_by_power() {
        let mut game = create_planning_game();
        let ai = Strategist::new(Faction::Ai, Difficulty::Medium);
        spawn(&mut game, Faction::Player, UnitType::Artillery, 2, 0);
        // A single artillery carries 5 attack, not more than 5
        assert!(!ai.base_threatened(&game));
    }

    #[test]
    fn test_unit_threat() {
        let mut game = create_planning_game();
        let ai = Strategist::new(Faction::Ai, Difficulty::Medium);
        let id = spawn(&mut game, Faction::Ai, UnitType::Infantry, 0, 0);
        spawn(&mut game, Faction::Player, UnitType::Tank, 1, 0);

        let unit = game.unit(id).unwrap();
        assert!((ai.unit_threat(&game, unit) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_purchase_defensive_when_threatened() {
        let mut game = create_planning_game();
        spawn(&mut game, Faction::Player, UnitType::Infantry, 2, 0);
        spawn(&mut game, Faction::Player, UnitType::Infantry, 2, 1);
        let ai = Strategist::with_weights(Faction::Ai, weights(0.0, 0.0, 0.0, 0.0));

        let purchase = ai.choose_purchase(&game, true, &mut rng()).unwrap();
        assert_eq!(purchase.unit_type, UnitType::Artillery);
        assert!(purchase.position.is_adjacent(&AI_BASE));
    }

    #[test]
    fn test_purchase_offensive_and_cheapest() {
        let mut game = create_planning_game();

        let aggressive = Strategist::with_weights(Faction::Ai, weights(1.0, 0.0, 0.0, 0.0));
        let purchase = aggressive.choose_purchase(&game, false, &mut rng()).unwrap();
        assert_eq!(purchase.unit_type, UnitType::Helicopter);

        // Steps down to the best unit it can afford
        for (points, expected) in [(14, UnitType::Artillery), (11, UnitType::Tank)] {
            game.player_mut(Faction::Ai).points = points;
            let purchase = aggressive.choose_purchase(&game, false, &mut rng()).unwrap();
            assert_eq!(purchase.unit_type, expected);
        }
        game.player_mut(Faction::Ai).points = 20;

        let passive = Strategist::with_weights(Faction::Ai, weights(0.0, 0.0, 0.0, 0.0));
        let purchase = passive.choose_purchase(&game, false, &mut rng()).unwrap();
        assert_eq!(purchase.unit_type, UnitType::Infantry);
    }

    #[test]
    fn test_offensive_preference_follows_cost() {
        assert!(OFFENSIVE_UNITS
            .windows(2)
            .all(|pair| pair[0].cost() >= pair[1].cost()));
    }

    #[test]
    fn test_purchase_diversity() {
        let mut game = create_planning_game();
        spawn(&mut game, Faction::Ai, UnitType::Infantry, 0, 0);
        let ai = Strategist::with_weights(Faction::Ai, weights(0.0, 0.0, 0.0, 1.0));

        let purchase = ai.choose_purchase(&game, false, &mut rng()).unwrap();
        assert_ne!(purchase.unit_type, UnitType::Infantry);
    }

    #[test]
    fn test_no_purchase_when_broke_or_boxed_in() {
        let mut game = create_planning_game();
        let ai = Strategist::new(Faction::Ai, Difficulty::Hard);

        game.player_mut(Faction::Ai).points = 4;
        assert!(ai.choose_purchase(&game, false, &mut rng()).is_none());

        game.player_mut(Faction::Ai).points = 20;
        for n in game.map.neighbors(&AI_BASE) {
            game.map.get_mut(&n).unwrap().terrain = Terrain::Water;
        }
        assert!(ai.choose_purchase(&game, false, &mut rng()).is_none());
    }

    #[test]
    fn test_threatened_unit_retreats() {
        let mut game = create_planning_game();
        let id = spawn(&mut game, Faction::Ai, UnitType::Infantry, 0, 0);
        spawn(&mut game, Faction::Player, UnitType::Tank, -1, 0);
        let ai = Strategist::with_weights(Faction::Ai, weights(0.0, 0.0, 0.0, 0.0));

        let plan = ai.plan_turn(&game, &mut rng());
        let planned = plan.moves.iter().find(|m| m.unit_id == id).unwrap();
        assert_eq!(planned.intent, MoveIntent::Retreat);
        assert!(planned.to.distance(&AI_BASE) < HexCoord::ORIGIN.distance(&AI_BASE));
    }

    #[test]
    fn test_resource_capture_move() {
        let mut game = create_planning_game();
        let coord = HexCoord::new(2, -1);
        {
            let hex = game.map.get_mut(&coord).unwrap();
            hex.terrain = Terrain::Resource;
            hex.is_resource_hex = true;
            hex.resource_value = 2;
        }
        let id = spawn(&mut game, Faction::Ai, UnitType::Tank, 3, 0);
        let ai = Strategist::with_weights(Faction::Ai, weights(0.0, 0.0, 1.0, 0.0));

        let plan = ai.plan_turn(&game, &mut rng());
        let planned = plan.moves.iter().find(|m| m.unit_id == id).unwrap();
        assert_eq!(planned.intent, MoveIntent::CaptureResource);
        assert_eq!(planned.to, coord);
    }

    #[test]
    fn test_attack_move_capped_by_range() {
        let mut game = create_planning_game();
        let id = spawn(&mut game, Faction::Ai, UnitType::Infantry, 3, 0);
        let ai = Strategist::with_weights(Faction::Ai, weights(1.0, 0.0, 0.0, 0.0));

        let plan = ai.plan_turn(&game, &mut rng());
        let planned = plan.moves.iter().find(|m| m.unit_id == id).unwrap();
        assert_eq!(planned.intent, MoveIntent::Attack);
        assert_eq!(planned.to.distance(&HexCoord::new(3, 0)), 2);
        assert!(game.validate_move(id, planned.to).is_ok());
    }

    #[test]
    fn test_planned_moves_are_legal_and_distinct() {
        let mut game = create_planning_game();
        for (q, r) in [(3, 0), (3, 1), (2, 1), (2, 0)] {
            spawn(&mut game, Faction::Ai, UnitType::Infantry, q, r);
        }
        let ai = Strategist::new(Faction::Ai, Difficulty::Hard);

        for seed in 0..10 {
            let plan = ai.plan_turn(&game, &mut ChaCha8Rng::seed_from_u64(seed));
            let mut seen = HashSet::new();
            for m in &plan.moves {
                assert!(seen.insert(m.to), "two units sent to {}", m.to);
                assert!(game.validate_move(m.unit_id, m.to).is_ok());
            }
        }
    }

    #[test]
    fn test_plan_determinism() {
        let mut game = create_planning_game();
        spawn(&mut game, Faction::Ai, UnitType::Tank, 2, 0);
        spawn(&mut game, Faction::Ai, UnitType::Infantry, 3, -1);
        let ai = Strategist::new(Faction::Ai, Difficulty::Medium);

        let a = ai.plan_turn(&game, &mut ChaCha8Rng::seed_from_u64(99));
        let b = ai.plan_turn(&game, &mut ChaCha8Rng::seed_from_u64(99));
        assert_eq!(a, b);
    }

    #[test]
    fn test_should_retreat_when_outgunned() {
        let mut game = create_planning_game();
        // (1,-1) is scanned before (0,0), so the medic defends
        spawn(&mut game, Faction::Ai, UnitType::Medic, 1, -1);
        spawn(&mut game, Faction::Player, UnitType::Tank, 0, 0);
        game.execute_moves().unwrap();
        assert_eq!(game.combats.len(), 1);

        let fearless = Strategist::with_weights(Faction::Ai, weights(1.0, 0.0, 0.0, 0.0));
        assert!(fearless.should_retreat(&game, 0, &mut rng()));
        assert!(!fearless.should_retreat(&game, 5, &mut rng()));
    }

    #[test]
    fn test_should_stand_when_evenly_matched() {
        let mut game = create_planning_game();
        spawn(&mut game, Faction::Ai, UnitType::Infantry, 1, -1);
        spawn(&mut game, Faction::Player, UnitType::Infantry, 0, 0);
        game.execute_moves().unwrap();

        let fearless = Strategist::with_weights(Faction::Ai, weights(1.0, 0.0, 0.0, 0.0));
        assert!(!fearless.should_retreat(&game, 0, &mut rng()));
    }

    #[test]
    fn test_should_not_retreat_as_attacker() {
        let mut game = create_planning_game();
        spawn(&mut game, Faction::Player, UnitType::Infantry, 0, 0);
        spawn(&mut game, Faction::Ai, UnitType::Infantry, 1, 0);
        game.execute_moves().unwrap();

        // (0,0) is scanned first, so the player defends
        let ai = Strategist::new(Faction::Ai, Difficulty::Easy);
        assert!(!ai.should_retreat(&game, 0, &mut rng()));
    }

    #[test]
    fn test_choose_base_location() {
        let mut game = GameState::new(GameConfig::small(), Map::filled(4, Terrain::Plain));
        let ai = Strategist::new(Faction::Ai, Difficulty::Medium);

        let first = ai.choose_base_location(&game, &mut rng()).unwrap();
        assert!(game.map.is_edge(&first));

        game.set_base_location(Faction::Player, PLAYER_BASE).unwrap();
        let site = ai.choose_base_location(&game, &mut rng()).unwrap();
        assert_eq!(site.distance(&PLAYER_BASE), 8);
        game.set_base_location(Faction::Ai, site).unwrap();
        assert_eq!(game.phase, GamePhase::Planning);
    }

    #[test]
    fn test_queue_turn() {
        let mut game = create_planning_game();
        spawn(&mut game, Faction::Ai, UnitType::Tank, 2, 0);
        let ai = Strategist::with_weights(Faction::Ai, weights(1.0, 0.0, 0.0, 0.0));

        let plan = ai.queue_turn(&mut game, &mut rng()).unwrap();
        assert_eq!(game.pending_moves.len(), plan.moves.len());
        assert_eq!(game.pending_purchases.len(), 1);
        assert!(game.execute_moves().is_ok());
    }

    #[test]
    fn test_resolve_defensive_combats() {
        let mut game = create_planning_game();
        spawn(&mut game, Faction::Ai, UnitType::Infantry, 0, 0);
        spawn(&mut game, Faction::Player, UnitType::Infantry, 1, 0);
        game.execute_moves().unwrap();
        let ai = Strategist::new(Faction::Ai, Difficulty::Medium);

        let outcomes = ai.resolve_defensive_combats(&mut game, &mut rng()).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(game.phase, GamePhase::Planning);
        assert!(game.check_invariants().is_ok());
    }
}
