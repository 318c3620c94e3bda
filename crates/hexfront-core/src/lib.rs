//! Hexfront Core Library
//!
//! This crate contains the game engine for Hexfront, a turn-based strategy
//! game on a hexagonal grid. Two factions place a base, buy units, issue
//! simultaneous movement orders and fight over resource hexes until one base
//! is captured or worn down.
//!
//! # Design Principles
//!
//! - **No UI dependencies**: rendering, input and storage live elsewhere
//! - **Injected randomness**: every random decision draws from a caller RNG
//! - **Serializable**: the whole match round-trips through a [`SaveSlot`]
//! - **Rule violations are values**: transitions return `Result` and leave
//!   the state untouched on error

// Grid and world
pub mod hex;
pub mod map;
pub mod terrain;
pub mod types;

// Configuration
pub mod settings;

// World generation
pub mod mapgen;

// Game state and turn engine
pub mod game_state;
pub mod player;
pub mod turn;
pub mod victory;

// Units, movement and combat
pub mod combat;
pub mod pathfinding;
pub mod unit;

// Computer opponent
pub mod ai;

// Persistence
pub mod save;

// Re-exports for convenience
pub use ai::{MoveIntent, PlannedMove, Strategist, TurnPlan};
pub use combat::{Combat, CombatOutcome, FightResult};
pub use game_state::{GameError, GamePhase, GameState, PendingMove, PendingPurchase};
pub use hex::HexCoord;
pub use map::{Hex, Map};
pub use mapgen::{generate_map, place_resources, MapGenerator};
pub use pathfinding::{find_path, find_reachable, is_in_line_of_sight, PathConfig, PathResult};
pub use player::{Player, PlayerKind};
pub use save::{SaveError, SaveSlot};
pub use settings::{AiWeights, Difficulty, GameConfig, SettingsError, TerrainDistribution};
pub use terrain::Terrain;
pub use turn::{RoundReport, RoundSummary};
pub use types::*;
pub use unit::{Ability, Unit, UnitStats, UnitType};
pub use victory::Outcome;
