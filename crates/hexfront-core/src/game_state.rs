//! Root game state containing all game data.
//!
//! Units live in one arena (`GameState::units`). Hexes and player rosters
//! only hold unit ids, and every unit creation, relocation and removal goes
//! through [`GameState::spawn_unit`], [`GameState::relocate_unit`] and
//! [`GameState::remove_unit`] so the three views never drift apart.

use crate::combat::Combat;
use crate::hex::HexCoord;
use crate::map::Map;
use crate::mapgen;
use crate::pathfinding::{find_path, find_reachable, PathConfig};
use crate::player::{Player, PlayerKind};
use crate::settings::{GameConfig, SettingsError};
use crate::types::{Faction, UnitId};
use crate::unit::{Unit, UnitType};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// The complete state of a match at any point in time.
///
/// Fully serializable; nothing outside this struct is needed to resume a
/// match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Match configuration (immutable after creation).
    pub config: GameConfig,
    /// The game map.
    pub map: Map,
    /// All live units, indexed by ID.
    pub units: BTreeMap<UnitId, Unit>,
    /// Both sides, indexed by [`Faction::index`].
    pub players: [Player; 2],
    /// Current phase.
    pub phase: GamePhase,
    /// Current round number (0 during setup, 1 once both bases exist).
    pub turn: u32,
    /// Seconds left in the planning phase.
    pub planning_time_remaining: u32,
    /// Moves queued this planning phase.
    pub pending_moves: Vec<PendingMove>,
    /// Purchases queued this planning phase.
    pub pending_purchases: Vec<PendingPurchase>,
    /// Combats detected this round; empty outside the combat phase.
    pub combats: Vec<Combat>,
    /// Victor, once the game is over. `None` in `GameOver` means a draw.
    pub winner: Option<Faction>,
    /// Next available unit ID.
    pub next_unit_id: UnitId,
}

impl GameState {
    /// Create a new match on an existing map.
    pub fn new(config: GameConfig, map: Map) -> Self {
        let players = Faction::both().map(|faction| {
            let kind = match faction {
                Faction::Player => PlayerKind::Human,
                Faction::Ai => PlayerKind::Computer,
            };
            Player::new(faction, kind, config.starting_points, config.base_max_health)
        });

        Self {
            planning_time_remaining: config.planning_time_secs,
            config,
            map,
            units: BTreeMap::new(),
            players,
            phase: GamePhase::Setup,
            turn: 0,
            pending_moves: Vec::new(),
            pending_purchases: Vec::new(),
            combats: Vec::new(),
            winner: None,
            next_unit_id: 1,
        }
    }

    /// Create a new match on a freshly generated map. Fails if the config
    /// does not validate.
    pub fn generate<R: Rng + ?Sized>(
        config: GameConfig,
        rng: &mut R,
    ) -> Result<Self, SettingsError> {
        let map = mapgen::generate_map(&config, rng)?;
        Ok(Self::new(config, map))
    }

    /// Get a player by faction.
    pub fn player(&self, faction: Faction) -> &Player {
        &self.players[faction.index()]
    }

    /// Get a mutable player by faction.
    pub fn player_mut(&mut self, faction: Faction) -> &mut Player {
        &mut self.players[faction.index()]
    }

    /// Get a unit by ID.
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable unit by ID.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Get the unit standing on a hex.
    pub fn unit_at(&self, coord: &HexCoord) -> Option<&Unit> {
        self.map.get(coord)?.unit.and_then(|id| self.units.get(&id))
    }

    /// Units of a faction in roster order.
    pub fn units_of(&self, faction: Faction) -> impl Iterator<Item = &Unit> + '_ {
        self.player(faction)
            .units
            .iter()
            .filter_map(|id| self.units.get(id))
    }

    /// Base location of a faction, if placed.
    pub fn base_of(&self, faction: Faction) -> Option<HexCoord> {
        self.player(faction).base_location
    }

    /// Check if the game has ended.
    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    /// Check if the game ended without a winner.
    pub fn is_draw(&self) -> bool {
        self.is_game_over() && self.winner.is_none()
    }

    /// Allocate a new unit ID.
    pub fn allocate_unit_id(&mut self) -> UnitId {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        id
    }

    /// Create a unit on an empty hex and add it to its owner's roster.
    pub fn spawn_unit(
        &mut self,
        owner: Faction,
        unit_type: UnitType,
        coord: HexCoord,
    ) -> Result<UnitId, GameError> {
        let hex = self
            .map
            .get(&coord)
            .ok_or(GameError::InvalidPlacement {
                coord,
                reason: "off the grid",
            })?;
        if hex.is_occupied() {
            return Err(GameError::InvalidPlacement {
                coord,
                reason: "hex is occupied",
            });
        }

        let id = self.allocate_unit_id();
        self.units.insert(id, Unit::new(id, owner, unit_type, coord));
        if let Some(hex) = self.map.get_mut(&coord) {
            hex.unit = Some(id);
        }
        self.player_mut(owner).units.push(id);
        Ok(id)
    }

    /// Move a unit to an empty hex, updating both hexes and the unit.
    pub fn relocate_unit(&mut self, id: UnitId, to: HexCoord) -> Result<(), GameError> {
        let from = self
            .units
            .get(&id)
            .map(|u| u.position)
            .ok_or_else(|| missing_unit(id))?;
        if from == to {
            return Ok(());
        }

        let target = self.map.get(&to).ok_or(GameError::IllegalMove {
            unit: id,
            to,
            reason: "off the grid",
        })?;
        if target.is_occupied() {
            return Err(GameError::IllegalMove {
                unit: id,
                to,
                reason: "destination is occupied",
            });
        }

        if let Some(hex) = self.map.get_mut(&from) {
            if hex.unit == Some(id) {
                hex.unit = None;
            }
        }
        if let Some(hex) = self.map.get_mut(&to) {
            hex.unit = Some(id);
        }
        if let Some(unit) = self.units.get_mut(&id) {
            unit.position = to;
        }
        Ok(())
    }

    /// Remove a unit from the arena, its hex and its owner's roster.
    pub fn remove_unit(&mut self, id: UnitId) -> Result<Unit, GameError> {
        let unit = self.units.remove(&id).ok_or_else(|| missing_unit(id))?;

        if let Some(hex) = self.map.get_mut(&unit.position) {
            if hex.unit == Some(id) {
                hex.unit = None;
            }
        }
        self.player_mut(unit.owner).units.retain(|u| *u != id);
        Ok(unit)
    }

    /// Hexes a unit could legally end a move on this round, sorted.
    pub fn reachable_destinations(&self, unit_id: UnitId) -> Result<Vec<HexCoord>, GameError> {
        let unit = self.unit(unit_id).ok_or_else(|| missing_unit(unit_id))?;
        let config = PathConfig::for_range(unit.movement_range(), unit.is_flying());

        let mut destinations: Vec<HexCoord> = find_reachable(&self.map, unit.position, &config)
            .into_keys()
            .filter(|c| *c != unit.position)
            .filter(|c| {
                self.map
                    .get(c)
                    .map_or(false, |h| h.can_enter(unit.owner, unit.is_flying()))
            })
            .collect();
        destinations.sort();
        Ok(destinations)
    }

    /// Check that a unit can reach `to` this round and end its move there.
    pub fn validate_move(&self, unit_id: UnitId, to: HexCoord) -> Result<(), GameError> {
        let unit = self.unit(unit_id).ok_or_else(|| missing_unit(unit_id))?;
        let illegal = |reason| GameError::IllegalMove {
            unit: unit_id,
            to,
            reason,
        };

        let hex = self.map.get(&to).ok_or_else(|| illegal("off the grid"))?;
        if !hex.can_enter(unit.owner, unit.is_flying()) {
            return Err(illegal("destination cannot be entered"));
        }

        let config = PathConfig::for_range(unit.movement_range(), unit.is_flying());
        find_path(&self.map, unit.position, to, &config)
            .map(|_| ())
            .ok_or_else(|| illegal("out of movement range"))
    }

    /// Verify that the arena, hexes and rosters agree, every unit's health
    /// is within bounds, and queued orders and open combats only name live
    /// units.
    pub fn check_invariants(&self) -> Result<(), GameError> {
        let violation = |msg: String| Err(GameError::InvariantViolation(msg));

        // Hex -> arena -> roster
        for (coord, hex) in self.map.iter() {
            let Some(id) = hex.unit else {
                continue;
            };
            let Some(unit) = self.units.get(&id) else {
                return violation(format!("hex {coord} references missing unit {id}"));
            };
            if unit.position != *coord {
                return violation(format!(
                    "unit {id} is on hex {coord} but records position {}",
                    unit.position
                ));
            }
        }

        // Arena -> hex and roster
        for (id, unit) in &self.units {
            if self.map.get(&unit.position).and_then(|h| h.unit) != Some(*id) {
                return violation(format!("unit {id} is not on its hex {}", unit.position));
            }
            let rosters = Faction::both()
                .iter()
                .filter(|f| self.player(**f).owns_unit(*id))
                .count();
            if rosters != 1 || !self.player(unit.owner).owns_unit(*id) {
                return violation(format!("unit {id} is on {rosters} rosters"));
            }
            if unit.lifespan == 0 || unit.lifespan > unit.max_lifespan() {
                return violation(format!(
                    "unit {id} lifespan {} outside 1..={}",
                    unit.lifespan,
                    unit.max_lifespan()
                ));
            }
        }

        // Roster -> arena
        for player in &self.players {
            let mut seen = HashSet::new();
            for id in &player.units {
                if !self.units.contains_key(id) || !seen.insert(*id) {
                    return violation(format!("roster of {} lists unit {id} badly", player.id));
                }
            }
        }

        // Bases
        for player in &self.players {
            let Some(base) = player.base_location else {
                continue;
            };
            match self.map.get(&base) {
                Some(hex) if hex.is_base_of(player.id) => {
                    if hex.base_health != Some(player.base_health) {
                        return violation(format!("base health of {} out of sync", player.id));
                    }
                }
                _ => return violation(format!("base of {} missing at {base}", player.id)),
            }
        }

        // Orders and combats
        if self.phase == GamePhase::Execution {
            return violation("orders are still executing".to_string());
        }
        if let Some(order) = self
            .pending_moves
            .iter()
            .find(|m| !self.units.contains_key(&m.unit_id))
        {
            return violation(format!("move queued for missing unit {}", order.unit_id));
        }
        for (index, combat) in self.combats.iter().enumerate() {
            if combat.resolved {
                continue;
            }
            if let Some(id) = combat.defenders.iter().find(|id| !self.units.contains_key(*id)) {
                return violation(format!("combat {index} defended by missing unit {id}"));
            }
            if !combat.attackers.iter().any(|id| self.units.contains_key(id)) {
                return violation(format!("combat {index} has no surviving attacker"));
            }
        }
        if self.phase == GamePhase::Combat && self.combats.iter().all(|c| c.resolved) {
            return violation("combat phase without an open combat".to_string());
        }

        Ok(())
    }
}

pub(crate) fn missing_unit(id: UnitId) -> GameError {
    warn!(unit = id, "unit not found");
    GameError::InvariantViolation(format!("unit {id} not found"))
}

/// Phase of the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GamePhase {
    /// Waiting for both bases to be placed.
    #[default]
    Setup,
    /// Both factions are queuing orders.
    Planning,
    /// Orders are being applied (never observed between calls).
    Execution,
    /// Combats are waiting to be resolved.
    Combat,
    /// Game has ended.
    GameOver,
}

/// A queued move order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMove {
    pub unit_id: UnitId,
    pub faction: Faction,
    pub from: HexCoord,
    pub to: HexCoord,
}

/// A queued unit purchase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPurchase {
    pub faction: Faction,
    pub unit_type: UnitType,
    pub position: HexCoord,
}

/// Errors that can occur during game operations.
///
/// Every transition leaves the state untouched when it returns one of these.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("invalid placement at {coord}: {reason}")]
    InvalidPlacement {
        coord: HexCoord,
        reason: &'static str,
    },
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u32, available: u32 },
    #[error("illegal move of unit {unit} to {to}: {reason}")]
    IllegalMove {
        unit: UnitId,
        to: HexCoord,
        reason: &'static str,
    },
    #[error("unit {0} had nowhere to retreat and was destroyed")]
    NoRetreatAvailable(UnitId),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("operation requires phase {expected:?}, game is in {actual:?}")]
    InvalidPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("no combat at index {0}")]
    NoSuchCombat(usize),
    #[error("combat {0} is already resolved")]
    CombatAlreadyResolved(usize),
    #[error("game is over")]
    GameOver,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Terrain;

    fn create_test_game() -> GameState {
        GameState::new(GameConfig::small(), Map::filled(4, Terrain::Plain))
    }

    #[test]
    fn test_game_creation() {
        let game = create_test_game();
        assert_eq!(game.phase, GamePhase::Setup);
        assert_eq!(game.turn, 0);
        assert_eq!(game.player(Faction::Player).points, 20);
        assert_eq!(game.player(Faction::Ai).kind, PlayerKind::Computer);
        assert_eq!(game.planning_time_remaining, 30);
        assert!(game.check_invariants().is_ok());
    }

    #[test]
    fn test_id_allocation() {
        let mut game = create_test_game();
        assert_eq!(game.allocate_unit_id(), 1);
        assert_eq!(game.allocate_unit_id(), 2);
    }

    #[test]
    fn test_spawn_unit() {
        let mut game = create_test_game();
        let coord = HexCoord::new(1, 0);
        let id = game
            .spawn_unit(Faction::Player, UnitType::Infantry, coord)
            .unwrap();

        assert_eq!(game.unit_at(&coord).map(|u| u.id), Some(id));
        assert!(game.player(Faction::Player).owns_unit(id));
        assert!(game.check_invariants().is_ok());

        let err = game.spawn_unit(Faction::Ai, UnitType::Tank, coord);
        assert!(matches!(err, Err(GameError::InvalidPlacement { .. })));
        assert_eq!(game.units.len(), 1);
    }

    #[test]
    fn test_spawn_off_grid() {
        let mut game = create_test_game();
        let err = game.spawn_unit(Faction::Player, UnitType::Infantry, HexCoord::new(9, 9));
        assert!(matches!(err, Err(GameError::InvalidPlacement { .. })));
        assert_eq!(game.next_unit_id, 1);
    }

    #[test]
    fn test_relocate_unit() {
        let mut game = create_test_game();
        let from = HexCoord::new(0, 0);
        let to = HexCoord::new(2, -1);
        let id = game.spawn_unit(Faction::Ai, UnitType::Tank, from).unwrap();

        game.relocate_unit(id, to).unwrap();
        assert!(game.unit_at(&from).is_none());
        assert_eq!(game.unit(id).unwrap().position, to);
        assert!(game.check_invariants().is_ok());
    }

    #[test]
    fn test_relocate_onto_occupied_fails() {
        let mut game = create_test_game();
        let a = game
            .spawn_unit(Faction::Ai, UnitType::Tank, HexCoord::new(0, 0))
            .unwrap();
        game.spawn_unit(Faction::Player, UnitType::Tank, HexCoord::new(1, 0))
            .unwrap();

        let before = game.clone();
        assert!(game.relocate_unit(a, HexCoord::new(1, 0)).is_err());
        assert_eq!(game, before);
    }

    #[test]
    fn test_remove_unit() {
        let mut game = create_test_game();
        let coord = HexCoord::new(-1, 2);
        let id = game
            .spawn_unit(Faction::Player, UnitType::Medic, coord)
            .unwrap();

        let removed = game.remove_unit(id).unwrap();
        assert_eq!(removed.id, id);
        assert!(game.unit_at(&coord).is_none());
        assert!(game.player(Faction::Player).units.is_empty());
        assert!(matches!(
            game.remove_unit(id),
            Err(GameError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_invariants_detect_desync() {
        let mut game = create_test_game();
        let id = game
            .spawn_unit(Faction::Player, UnitType::Infantry, HexCoord::new(0, 1))
            .unwrap();

        // Bypass the arena API
        game.map.get_mut(&HexCoord::new(0, 1)).unwrap().unit = None;
        assert!(game.check_invariants().is_err());

        game.map.get_mut(&HexCoord::new(0, 1)).unwrap().unit = Some(id);
        game.player_mut(Faction::Ai).units.push(id);
        assert!(game.check_invariants().is_err());
    }

    #[test]
    fn test_invariants_detect_stale_orders() {
        let mut game = create_test_game();
        let id = game
            .spawn_unit(Faction::Player, UnitType::Infantry, HexCoord::new(0, 1))
            .unwrap();
        game.pending_moves.push(PendingMove {
            unit_id: id,
            faction: Faction::Player,
            from: HexCoord::new(0, 1),
            to: HexCoord::new(1, 1),
        });
        assert!(game.check_invariants().is_ok());

        game.remove_unit(id).unwrap();
        assert!(matches!(
            game.check_invariants(),
            Err(GameError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_invariants_detect_stale_combats() {
        let mut game = create_test_game();
        let defender = game
            .spawn_unit(Faction::Player, UnitType::Infantry, HexCoord::new(0, 0))
            .unwrap();
        let attacker = game
            .spawn_unit(Faction::Ai, UnitType::Infantry, HexCoord::new(1, 0))
            .unwrap();
        game.combats
            .push(Combat::new(HexCoord::ORIGIN, vec![attacker], vec![defender]));
        game.phase = GamePhase::Combat;
        assert!(game.check_invariants().is_ok());

        let mut stale = game.clone();
        stale.remove_unit(defender).unwrap();
        assert!(stale.check_invariants().is_err());

        let mut stale = game.clone();
        stale.remove_unit(attacker).unwrap();
        assert!(stale.check_invariants().is_err());

        // A resolved combat may name the dead, but the phase needs an open one
        let mut stale = game.clone();
        stale.remove_unit(attacker).unwrap();
        stale.combats[0].resolved = true;
        assert!(stale.check_invariants().is_err());
        stale.phase = GamePhase::Planning;
        assert!(stale.check_invariants().is_ok());

        game.phase = GamePhase::Execution;
        assert!(game.check_invariants().is_err());
    }

    #[test]
    fn test_reachable_destinations() {
        let mut game = create_test_game();
        let id = game
            .spawn_unit(Faction::Player, UnitType::Artillery, HexCoord::ORIGIN)
            .unwrap();
        game.spawn_unit(Faction::Ai, UnitType::Infantry, HexCoord::new(1, 0))
            .unwrap();

        let destinations = game.reachable_destinations(id).unwrap();
        assert_eq!(destinations.len(), 5);
        assert!(!destinations.contains(&HexCoord::new(1, 0)));
    }

    #[test]
    fn test_validate_move() {
        let mut game = create_test_game();
        game.map.get_mut(&HexCoord::new(0, 2)).unwrap().terrain = Terrain::Water;
        let id = game
            .spawn_unit(Faction::Player, UnitType::Infantry, HexCoord::ORIGIN)
            .unwrap();

        assert!(game.validate_move(id, HexCoord::new(2, 0)).is_ok());
        assert!(matches!(
            game.validate_move(id, HexCoord::new(3, 0)),
            Err(GameError::IllegalMove { .. })
        ));
        assert!(matches!(
            game.validate_move(id, HexCoord::new(0, 2)),
            Err(GameError::IllegalMove { .. })
        ));
        assert!(matches!(
            game.validate_move(99, HexCoord::new(1, 0)),
            Err(GameError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_game_serialization() {
        let mut game = create_test_game();
        game.spawn_unit(Faction::Ai, UnitType::Helicopter, HexCoord::new(2, 1))
            .unwrap();

        let json = serde_json::to_string(&game).unwrap();
        let restored: GameState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, game);
    }
}
