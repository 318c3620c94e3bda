//! Core type aliases and small shared enums.

use serde::{Deserialize, Serialize};

/// Unique identifier for a unit.
pub type UnitId = u64;

/// One of the two sides in a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Faction {
    /// The human-controlled side.
    Player,
    /// The computer-controlled side.
    Ai,
}

impl Faction {
    /// The opposing faction.
    pub const fn opponent(self) -> Faction {
        match self {
            Faction::Player => Faction::Ai,
            Faction::Ai => Faction::Player,
        }
    }

    /// Index into the two-element player table.
    pub const fn index(self) -> usize {
        match self {
            Faction::Player => 0,
            Faction::Ai => 1,
        }
    }

    /// Both factions in table order.
    pub const fn both() -> [Faction; 2] {
        [Faction::Player, Faction::Ai]
    }
}

impl std::fmt::Display for Faction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Faction::Player => write!(f, "player"),
            Faction::Ai => write!(f, "ai"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent() {
        assert_eq!(Faction::Player.opponent(), Faction::Ai);
        assert_eq!(Faction::Ai.opponent(), Faction::Player);
    }

    #[test]
    fn test_index() {
        for faction in Faction::both() {
            assert_eq!(Faction::both()[faction.index()], faction);
        }
    }
}
