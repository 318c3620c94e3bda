//! Save slot: everything the UI needs to persist and later resume a match.
//!
//! The slot is plain JSON. Storage (local storage, files) belongs to the
//! caller; this module only encodes, decodes and checks consistency.

use crate::game_state::{GameError, GameState};
use crate::hex::HexCoord;
use crate::settings::{Difficulty, SettingsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors raised while encoding or restoring a save slot.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("malformed save data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("saved configuration is invalid: {0}")]
    Settings(#[from] SettingsError),
    #[error("saved game is inconsistent: {0}")]
    Invalid(#[from] GameError),
}

/// A persisted match plus the bits of UI state needed to resume it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveSlot {
    pub game: GameState,
    /// Hex the player had selected, if any.
    pub selected_hex: Option<HexCoord>,
    /// The computer was mid-decision when the slot was written.
    pub ai_turn_in_progress: bool,
    /// Planning countdown shown to the player, in seconds.
    pub timer_value: u32,
    pub difficulty: Difficulty,
}

impl SaveSlot {
    /// Snapshot a match with no UI selection.
    pub fn new(game: GameState, difficulty: Difficulty) -> Self {
        let timer_value = game.planning_time_remaining;
        Self {
            game,
            selected_hex: None,
            ai_turn_in_progress: false,
            timer_value,
            difficulty,
        }
    }

    /// Encode the slot as JSON.
    pub fn to_json(&self) -> Result<String, SaveError> {
        let json = serde_json::to_string(self)?;
        debug!(bytes = json.len(), turn = self.game.turn, "save slot encoded");
        Ok(json)
    }

    /// Decode a slot and check that the restored match is consistent.
    pub fn from_json(json: &str) -> Result<Self, SaveError> {
        let slot: SaveSlot = serde_json::from_str(json)?;
        slot.validate()?;
        debug!(turn = slot.game.turn, phase = ?slot.game.phase, "save slot restored");
        Ok(slot)
    }

    /// Check the configuration, the unit cross-references and that no
    /// order or open combat names a unit that is gone.
    pub fn validate(&self) -> Result<(), SaveError> {
        self.game.config.validate()?;
        if let Some(coord) = self.selected_hex {
            if !self.game.map.contains(&coord) {
                warn!(%coord, "selected hex is off the grid");
                return Err(GameError::InvariantViolation(format!(
                    "selected hex {coord} is off the grid"
                ))
                .into());
            }
        }
        self.game.check_invariants()?;
        Ok(())
    }
}
