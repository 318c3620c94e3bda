//! Player state: points, base and unit roster.

use crate::hex::HexCoord;
use crate::types::{Faction, UnitId};
use serde::{Deserialize, Serialize};

/// Who issues a faction's orders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerKind {
    Human,
    Computer,
}

/// One side of a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Faction this player controls.
    pub id: Faction,
    /// Human or computer controlled.
    pub kind: PlayerKind,
    /// Purchasing currency.
    pub points: u32,
    /// Base hex, once placed.
    pub base_location: Option<HexCoord>,
    /// Current base health; mirrors the base hex.
    pub base_health: u32,
    /// Base health at placement.
    pub max_base_health: u32,
    /// Ids of live units, in spawn order. The game's unit arena owns the units.
    pub units: Vec<UnitId>,
}

impl Player {
    /// Create a new player with default values.
    pub fn new(id: Faction, kind: PlayerKind, points: u32, max_base_health: u32) -> Self {
        Self {
            id,
            kind,
            points,
            base_location: None,
            base_health: max_base_health,
            max_base_health,
            units: Vec::new(),
        }
    }

    /// Check if the player has placed a base.
    pub fn has_base(&self) -> bool {
        self.base_location.is_some()
    }

    /// Check if player can afford a purchase.
    pub fn can_afford(&self, cost: u32) -> bool {
        self.points >= cost
    }

    /// Spend points (returns false if insufficient).
    pub fn spend_points(&mut self, amount: u32) -> bool {
        if self.points >= amount {
            self.points -= amount;
            true
        } else {
            false
        }
    }

    /// Add points.
    pub fn add_points(&mut self, amount: u32) {
        self.points = self.points.saturating_add(amount);
    }

    /// Check if a unit is on this player's roster.
    pub fn owns_unit(&self, unit_id: UnitId) -> bool {
        self.units.contains(&unit_id)
    }

    /// Number of live units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_player() -> Player {
        Player::new(Faction::Player, PlayerKind::Human, 20, 50)
    }

    #[test]
    fn test_player_creation() {
        let player = create_test_player();
        assert_eq!(player.id, Faction::Player);
        assert_eq!(player.points, 20);
        assert_eq!(player.base_health, 50);
        assert!(!player.has_base());
        assert!(player.units.is_empty());
    }

    #[test]
    fn test_spend_points() {
        let mut player = create_test_player();

        assert!(player.can_afford(15));
        assert!(player.spend_points(15));
        assert_eq!(player.points, 5);

        assert!(!player.can_afford(10));
        assert!(!player.spend_points(10));
        assert_eq!(player.points, 5);
    }

    #[test]
    fn test_add_points() {
        let mut player = create_test_player();
        player.add_points(3);
        assert_eq!(player.points, 23);
    }

    #[test]
    fn test_roster() {
        let mut player = create_test_player();
        player.units.push(4);
        assert!(player.owns_unit(4));
        assert!(!player.owns_unit(5));
        assert_eq!(player.unit_count(), 1);
    }
}
