//! Unit system - purchasable combat units and their fixed stats.

use crate::hex::HexCoord;
use crate::types::{Faction, UnitId};
use serde::{Deserialize, Serialize};

/// A unit on the game map.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier.
    pub id: UnitId,
    /// Type of unit.
    pub unit_type: UnitType,
    /// Owning faction.
    pub owner: Faction,
    /// Current position on the map.
    pub position: HexCoord,
    /// Remaining health; the unit is removed when this reaches 0.
    pub lifespan: u32,
    /// Ability tags granted by the unit type.
    pub abilities: Vec<Ability>,
    /// Has the unit moved this round?
    pub has_moved: bool,
    /// Is the unit part of an unresolved combat?
    pub is_engaged_in_combat: bool,
}

impl Unit {
    /// Create a new unit at full health.
    pub fn new(id: UnitId, owner: Faction, unit_type: UnitType, position: HexCoord) -> Self {
        let stats = unit_type.stats();
        Self {
            id,
            unit_type,
            owner,
            position,
            lifespan: stats.max_lifespan,
            abilities: vec![stats.ability],
            has_moved: false,
            is_engaged_in_combat: false,
        }
    }

    /// Get the unit's stats.
    pub fn stats(&self) -> UnitStats {
        self.unit_type.stats()
    }

    /// Attack power contributed to combats and sieges.
    pub fn attack_power(&self) -> u32 {
        self.stats().attack_power
    }

    /// Movement range in whole movement points.
    pub fn movement_range(&self) -> u32 {
        self.stats().movement_range
    }

    /// Maximum health for this unit type.
    pub fn max_lifespan(&self) -> u32 {
        self.stats().max_lifespan
    }

    /// Check if the unit crosses water.
    pub fn is_flying(&self) -> bool {
        self.stats().flying
    }

    /// Check if the unit carries an ability.
    pub fn has_ability(&self, ability: Ability) -> bool {
        self.abilities.contains(&ability)
    }

    /// Take damage.
    pub fn take_damage(&mut self, damage: u32) {
        self.lifespan = self.lifespan.saturating_sub(damage);
    }

    /// Heal the unit, capped at its maximum lifespan.
    pub fn heal(&mut self, amount: u32) {
        self.lifespan = (self.lifespan + amount).min(self.max_lifespan());
    }

    /// Check if unit is dead.
    pub fn is_dead(&self) -> bool {
        self.lifespan == 0
    }

    /// Remaining health as a fraction of maximum.
    pub fn health_fraction(&self) -> f32 {
        self.lifespan as f32 / self.max_lifespan().max(1) as f32
    }

    /// Reset per-round flags.
    pub fn new_round(&mut self) {
        self.has_moved = false;
        self.is_engaged_in_combat = false;
    }
}

/// Types of units available for purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitType {
    Infantry,
    Tank,
    Artillery,
    Helicopter,
    Medic,
}

impl UnitType {
    /// Get the stats for this unit type.
    pub const fn stats(&self) -> UnitStats {
        match self {
            UnitType::Infantry => UnitStats::ground(2, 2, 5, 5, Ability::TerrainBonus),
            UnitType::Tank => UnitStats::ground(3, 4, 8, 10, Ability::RapidMovement),
            UnitType::Artillery => UnitStats::ground(1, 5, 4, 12, Ability::RangedAttack),
            UnitType::Helicopter => UnitStats::air(4, 3, 4, 15, Ability::Stealth),
            UnitType::Medic => UnitStats::ground(2, 1, 4, 8, Ability::Healing),
        }
    }

    /// Purchase cost in points.
    pub const fn cost(&self) -> u32 {
        self.stats().cost
    }

    /// Get all unit types in purchase-menu order.
    pub const fn all() -> &'static [UnitType] {
        &[
            UnitType::Infantry,
            UnitType::Tank,
            UnitType::Artillery,
            UnitType::Helicopter,
            UnitType::Medic,
        ]
    }
}

impl std::fmt::Display for UnitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UnitType::Infantry => "Infantry",
            UnitType::Tank => "Tank",
            UnitType::Artillery => "Artillery",
            UnitType::Helicopter => "Helicopter",
            UnitType::Medic => "Medic",
        };
        f.write_str(name)
    }
}

/// Stats for a unit type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Movement points per round.
    pub movement_range: u32,
    /// Damage dealt in combat and siege.
    pub attack_power: u32,
    /// Health at purchase.
    pub max_lifespan: u32,
    /// Purchase cost in points.
    pub cost: u32,
    /// Signature ability.
    pub ability: Ability,
    /// Can cross water.
    pub flying: bool,
}

impl UnitStats {
    /// Create ground unit stats.
    pub const fn ground(
        movement_range: u32,
        attack_power: u32,
        max_lifespan: u32,
        cost: u32,
        ability: Ability,
    ) -> Self {
        Self {
            movement_range,
            attack_power,
            max_lifespan,
            cost,
            ability,
            flying: false,
        }
    }

    /// Create air unit stats.
    pub const fn air(
        movement_range: u32,
        attack_power: u32,
        max_lifespan: u32,
        cost: u32,
        ability: Ability,
    ) -> Self {
        Self {
            flying: true,
            ..Self::ground(movement_range, attack_power, max_lifespan, cost, ability)
        }
    }
}

/// Special ability tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    RangedAttack,
    /// Restores health to adjacent friendly units each round.
    Healing,
    /// Defends at x1.5 on mountain or forest.
    TerrainBonus,
    RapidMovement,
    Stealth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_creation() {
        let unit = Unit::new(1, Faction::Player, UnitType::Infantry, HexCoord::new(2, -1));
        assert_eq!(unit.id, 1);
        assert_eq!(unit.owner, Faction::Player);
        assert_eq!(unit.lifespan, 5);
        assert_eq!(unit.max_lifespan(), 5);
        assert_eq!(unit.abilities, vec![Ability::TerrainBonus]);
        assert!(!unit.has_moved);
        assert!(!unit.is_engaged_in_combat);
    }

    #[test]
    fn test_unit_stats() {
        let tank = UnitType::Tank.stats();
        assert_eq!(tank.movement_range, 3);
        assert_eq!(tank.attack_power, 4);
        assert_eq!(tank.max_lifespan, 8);
        assert_eq!(tank.cost, 10);
        assert!(!tank.flying);

        let heli = UnitType::Helicopter.stats();
        assert!(heli.flying);
        assert_eq!(heli.cost, 15);
        assert_eq!(heli.ability, Ability::Stealth);

        assert_eq!(UnitType::Artillery.cost(), 12);
        assert_eq!(UnitType::Medic.stats().attack_power, 1);
    }

    #[test]
    fn test_unit_damage_and_heal() {
        let mut unit = Unit::new(1, Faction::Ai, UnitType::Tank, HexCoord::ORIGIN);
        unit.take_damage(3);
        assert_eq!(unit.lifespan, 5);

        unit.heal(10);
        assert_eq!(unit.lifespan, 8);
    }

    #[test]
    fn test_unit_death() {
        let mut unit = Unit::new(1, Faction::Ai, UnitType::Medic, HexCoord::ORIGIN);
        unit.take_damage(100);
        assert!(unit.is_dead());
        assert_eq!(unit.lifespan, 0);
    }

    #[test]
    fn test_health_fraction() {
        let mut unit = Unit::new(1, Faction::Player, UnitType::Artillery, HexCoord::ORIGIN);
        unit.take_damage(1);
        assert!((unit.health_fraction() - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn test_new_round_clears_flags() {
        let mut unit = Unit::new(1, Faction::Player, UnitType::Infantry, HexCoord::ORIGIN);
        unit.has_moved = true;
        unit.is_engaged_in_combat = true;
        unit.new_round();
        assert!(!unit.has_moved);
        assert!(!unit.is_engaged_in_combat);
    }

    #[test]
    fn test_unit_serialization() {
        let unit = Unit::new(7, Faction::Player, UnitType::Helicopter, HexCoord::new(-3, 1));
        let json = serde_json::to_string(&unit).unwrap();
        let restored: Unit = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, unit);
    }
}
