//! Game grid with hex cells and spatial queries.

use crate::hex::HexCoord;
use crate::terrain::Terrain;
use crate::types::{Faction, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The hexagon-shaped game grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Map {
    /// Distance from the center hex to the outer rim.
    pub radius: u32,
    /// All hexes indexed by coordinate.
    /// Serialized as a list of hexes since JSON requires string keys.
    #[serde(with = "hex_list")]
    pub hexes: HashMap<HexCoord, Hex>,
}

/// Serializes the hex table as a sequence; each hex carries its own coordinate.
mod hex_list {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(map: &HashMap<HexCoord, Hex>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut hexes: Vec<&Hex> = map.values().collect();
        hexes.sort_by_key(|h| h.coord);
        serializer.collect_seq(hexes)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<HexCoord, Hex>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hexes: Vec<Hex> = Deserialize::deserialize(deserializer)?;
        Ok(hexes.into_iter().map(|h| (h.coord, h)).collect())
    }
}

impl Map {
    /// Create an empty grid with the given radius.
    pub fn new(radius: u32) -> Self {
        Self {
            radius,
            hexes: HashMap::new(),
        }
    }

    /// Create a grid filled with a single terrain type (useful for testing).
    pub fn filled(radius: u32, terrain: Terrain) -> Self {
        let mut map = Self::new(radius);
        for coord in HexCoord::ORIGIN.spiral(radius) {
            map.set(Hex::new(coord, terrain));
        }
        map
    }

    /// Get a hex at the given coordinate.
    pub fn get(&self, coord: &HexCoord) -> Option<&Hex> {
        self.hexes.get(coord)
    }

    /// Get a mutable reference to a hex.
    pub fn get_mut(&mut self, coord: &HexCoord) -> Option<&mut Hex> {
        self.hexes.get_mut(coord)
    }

    /// Insert or replace a hex.
    pub fn set(&mut self, hex: Hex) {
        self.hexes.insert(hex.coord, hex);
    }

    /// Terrain at a coordinate, if it is on the grid.
    pub fn terrain(&self, coord: &HexCoord) -> Option<Terrain> {
        self.get(coord).map(|h| h.terrain)
    }

    /// Check if a coordinate lies on the grid.
    pub fn contains(&self, coord: &HexCoord) -> bool {
        self.hexes.contains_key(coord)
    }

    /// Check if a coordinate is on the outer rim of the grid.
    pub fn is_edge(&self, coord: &HexCoord) -> bool {
        self.contains(coord) && HexCoord::ORIGIN.distance(coord) == self.radius
    }

    /// Get on-grid neighbors of a hex, in direction order.
    pub fn neighbors(&self, coord: &HexCoord) -> Vec<HexCoord> {
        coord
            .neighbors()
            .into_iter()
            .filter(|n| self.contains(n))
            .collect()
    }

    /// Get all hexes within a radius of a center (inclusive), skipping off-grid cells.
    pub fn hexes_in_radius(&self, center: &HexCoord, radius: u32) -> Vec<&Hex> {
        center
            .spiral(radius)
            .iter()
            .filter_map(|c| self.get(c))
            .collect()
    }

    /// Get the total number of hexes.
    pub fn hex_count(&self) -> usize {
        self.hexes.len()
    }

    /// Iterate over all hexes (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&HexCoord, &Hex)> {
        self.hexes.iter()
    }

    /// Iterate mutably over all hexes (unordered).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&HexCoord, &mut Hex)> {
        self.hexes.iter_mut()
    }

    /// All coordinates in row-major order.
    pub fn sorted_coords(&self) -> Vec<HexCoord> {
        let mut coords: Vec<HexCoord> = self.hexes.keys().copied().collect();
        coords.sort();
        coords
    }

    /// Count hexes of each terrain type.
    pub fn terrain_counts(&self) -> HashMap<Terrain, usize> {
        let mut counts = HashMap::new();
        for hex in self.hexes.values() {
            *counts.entry(hex.terrain).or_insert(0) += 1;
        }
        counts
    }

    /// Resource hexes in row-major order.
    pub fn resource_hexes(&self) -> Vec<&Hex> {
        let mut hexes: Vec<&Hex> = self.hexes.values().filter(|h| h.is_resource_hex).collect();
        hexes.sort_by_key(|h| h.coord);
        hexes
    }
}

impl Default for Map {
    fn default() -> Self {
        Self::new(0)
    }
}

/// A single cell of the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hex {
    /// Position on the grid.
    pub coord: HexCoord,
    /// Terrain type.
    pub terrain: Terrain,
    /// Is this hex a faction's base?
    pub is_base: bool,
    /// Does this hex pay out points each round when occupied?
    pub is_resource_hex: bool,
    /// Points per round granted to the occupant's owner.
    pub resource_value: u32,
    /// Faction that owns this hex (base owner or last resource controller).
    pub owner: Option<Faction>,
    /// Occupying unit; a reference into the game's unit arena.
    pub unit: Option<UnitId>,
    /// Remaining base health; present only on base hexes.
    pub base_health: Option<u32>,
}

impl Hex {
    /// Create a new hex with just terrain.
    pub fn new(coord: HexCoord, terrain: Terrain) -> Self {
        Self {
            coord,
            terrain,
            is_base: false,
            is_resource_hex: false,
            resource_value: 0,
            owner: None,
            unit: None,
            base_health: None,
        }
    }

    /// Stable identifier for this hex, its coordinate key.
    pub fn id(&self) -> String {
        self.coord.key()
    }

    /// Check if a unit currently stands here.
    pub fn is_occupied(&self) -> bool {
        self.unit.is_some()
    }

    /// Check if this hex is the base of the given faction.
    pub fn is_base_of(&self, faction: Faction) -> bool {
        self.is_base && self.owner == Some(faction)
    }

    /// Check if a unit may end its movement here.
    ///
    /// The hex must be unoccupied; bases are off-limits except the enemy's,
    /// and water only admits flying units.
    pub fn can_enter(&self, faction: Faction, flying: bool) -> bool {
        if self.is_occupied() {
            return false;
        }
        if self.terrain.is_water() && !flying {
            return false;
        }
        !self.is_base || self.is_base_of(faction.opponent())
    }

    /// Check if a retreating unit may fall back here.
    pub fn is_retreat_target(&self, flying: bool) -> bool {
        !self.is_occupied() && !self.is_base && (flying || !self.terrain.is_water())
    }
}

impl Default for Hex {
    fn default() -> Self {
        Self::new(HexCoord::default(), Terrain::default())
    }
}
