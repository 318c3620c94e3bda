//! Victory conditions: base capture and base destruction.

use crate::game_state::GameState;
use crate::types::Faction;
use serde::{Deserialize, Serialize};

/// How a finished game ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Winner(Faction),
    /// Both bases fell in the same round.
    Draw,
}

impl Outcome {
    /// The winning faction, if any.
    pub fn winner(&self) -> Option<Faction> {
        match self {
            Outcome::Winner(faction) => Some(*faction),
            Outcome::Draw => None,
        }
    }
}

/// Check whether a faction has a unit standing on the enemy base.
///
/// Captures on both bases in the same round are a draw.
pub fn check_base_capture(state: &GameState) -> Option<Outcome> {
    let captured_by = |faction: Faction| {
        state
            .base_of(faction.opponent())
            .and_then(|base| state.unit_at(&base))
            .map_or(false, |unit| unit.owner == faction)
    };

    match (captured_by(Faction::Player), captured_by(Faction::Ai)) {
        (true, true) => Some(Outcome::Draw),
        (true, false) => Some(Outcome::Winner(Faction::Player)),
        (false, true) => Some(Outcome::Winner(Faction::Ai)),
        (false, false) => None,
    }
}

/// Check whether a placed base has been worn down to zero health.
pub fn check_base_destroyed(state: &GameState) -> Option<Outcome> {
    let destroyed = |faction: Faction| {
        let player = state.player(faction);
        player.has_base() && player.base_health == 0
    };

    match (destroyed(Faction::Player), destroyed(Faction::Ai)) {
        (true, true) => Some(Outcome::Draw),
        (true, false) => Some(Outcome::Winner(Faction::Ai)),
        (false, true) => Some(Outcome::Winner(Faction::Player)),
        (false, false) => None,
    }
}
