//! Combat detection and resolution math.
//!
//! A combat forms around a hex whose unit has enemy units on adjacent hexes.
//! Each unit defends at most once per round but may attack from several
//! hexes. Resolution is
//! deterministic: both sides pool their attack power and split the opposing
//! pool evenly as damage, unless the defenders retreat instead.

use crate::game_state::{GameError, GameState};
use crate::hex::HexCoord;
use crate::map::Map;
use crate::terrain::Terrain;
use crate::turn::RoundSummary;
use crate::types::UnitId;
use crate::unit::{Ability, Unit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An engagement waiting to be resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combat {
    /// Hex of the defending unit.
    pub hex: HexCoord,
    /// Enemy units adjacent to the defender.
    pub attackers: Vec<UnitId>,
    /// Units on the combat hex.
    pub defenders: Vec<UnitId>,
    /// Has this combat been resolved?
    pub resolved: bool,
    /// Defenders that fled, if the defenders chose to retreat.
    pub retreating: Option<Vec<UnitId>>,
}

impl Combat {
    /// Create an unresolved combat.
    pub fn new(hex: HexCoord, attackers: Vec<UnitId>, defenders: Vec<UnitId>) -> Self {
        Self {
            hex,
            attackers,
            defenders,
            resolved: false,
            retreating: None,
        }
    }

    /// Every unit involved, attackers first.
    pub fn participants(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.attackers.iter().chain(self.defenders.iter()).copied()
    }
}

/// Find all combats on the board.
///
/// Hexes are scanned in row-major order. A hex whose unit already fights
/// elsewhere is skipped, so a lone pair of enemies produces one combat.
/// Every enemy neighbor joins as an attacker, engaged or not.
pub fn detect_combats(state: &GameState) -> Vec<Combat> {
    let mut engaged: HashSet<UnitId> = HashSet::new();
    let mut combats = Vec::new();

    for coord in state.map.sorted_coords() {
        let Some(defender) = state.unit_at(&coord) else {
            continue;
        };
        if engaged.contains(&defender.id) {
            continue;
        }

        let attackers: Vec<UnitId> = state
            .map
            .neighbors(&coord)
            .iter()
            .filter_map(|n| state.unit_at(n))
            .filter(|u| u.owner != defender.owner)
            .map(|u| u.id)
            .collect();
        if attackers.is_empty() {
            continue;
        }

        engaged.insert(defender.id);
        engaged.extend(attackers.iter().copied());
        combats.push(Combat::new(coord, attackers, vec![defender.id]));
    }

    combats
}

/// Power totals and per-unit damage for a stand-and-fight resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FightResult {
    /// Summed attack power of the attackers.
    pub attacker_power: u32,
    /// Summed attack power of the defenders, after any terrain bonus.
    pub defender_power: u32,
    /// Did the defenders get the terrain bonus?
    pub terrain_bonus: bool,
    /// Damage dealt to each attacker.
    pub damage_per_attacker: u32,
    /// Damage dealt to each defender.
    pub damage_per_defender: u32,
}

/// Summed attack power of a group of units.
pub fn total_power(units: &[&Unit]) -> u32 {
    units.iter().map(|u| u.attack_power()).sum()
}

/// Check whether defenders on this terrain earn the x1.5 bonus.
pub fn has_terrain_bonus(defenders: &[&Unit], terrain: Terrain) -> bool {
    terrain.grants_defense_bonus() && defenders.iter().any(|u| u.has_ability(Ability::TerrainBonus))
}

/// Compute the damage each side deals.
///
/// Each side's pooled power is split evenly (floor, minimum 1) across the
/// opposing units.
pub fn fight_damage(attackers: &[&Unit], defenders: &[&Unit], terrain: Terrain) -> FightResult {
    let attacker_power = total_power(attackers);
    let mut defender_power = total_power(defenders);

    let terrain_bonus = has_terrain_bonus(defenders, terrain);
    if terrain_bonus {
        defender_power = defender_power * 3 / 2;
    }

    FightResult {
        attacker_power,
        defender_power,
        terrain_bonus,
        damage_per_attacker: split_damage(defender_power, attackers.len()),
        damage_per_defender: split_damage(attacker_power, defenders.len()),
    }
}

fn split_damage(power: u32, targets: usize) -> u32 {
    if targets == 0 {
        return 0;
    }
    (power / targets as u32).max(1)
}

/// First adjacent hex (in neighbor order) a unit can fall back to: on the
/// grid, empty, not a base, and dry unless the unit flies.
pub fn retreat_destination(map: &Map, unit: &Unit) -> Option<HexCoord> {
    unit.position
        .neighbors()
        .into_iter()
        .find(|n| map.get(n).map_or(false, |h| h.is_retreat_target(unit.is_flying())))
}

/// What happened when a combat was resolved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CombatOutcome {
    /// Index of the resolved combat.
    pub index: usize,
    /// Did the defenders retreat?
    pub retreated: bool,
    /// Defenders that reached a retreat hex.
    pub fled: Vec<UnitId>,
    /// Units removed from the board.
    pub destroyed: Vec<UnitId>,
    /// `NoRetreatAvailable` for each defender that had nowhere to go.
    pub failed_retreats: Vec<GameError>,
    /// Power and damage figures when the sides fought.
    pub fight: Option<FightResult>,
    /// End-of-round summary, if this was the last open combat.
    pub round: Option<RoundSummary>,
}
