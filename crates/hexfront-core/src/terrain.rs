//! Terrain types for the game grid.

use serde::{Deserialize, Serialize};

/// Movement cost of an impassable hex.
pub const IMPASSABLE: u32 = u32::MAX;

/// Terrain type for a hex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    #[default]
    Plain,
    Mountain,
    Forest,
    Water,
    Desert,
    /// A resource site; plays like open ground.
    Resource,
}

impl Terrain {
    /// Cost to enter a hex of this terrain, in tenths of a movement point.
    ///
    /// Water reports [`IMPASSABLE`]; flying units ignore that at the
    /// pathfinding layer.
    pub const fn movement_cost(&self) -> u32 {
        match self {
            Terrain::Plain | Terrain::Desert | Terrain::Resource => 10,
            Terrain::Forest => 15,
            Terrain::Mountain => 20,
            Terrain::Water => IMPASSABLE,
        }
    }

    /// Check if this is water.
    pub const fn is_water(&self) -> bool {
        matches!(self, Terrain::Water)
    }

    /// Check if this terrain blocks line of sight when it lies between two points.
    pub const fn blocks_sight(&self) -> bool {
        matches!(self, Terrain::Mountain | Terrain::Forest)
    }

    /// Check if defenders standing here may claim a terrain bonus.
    pub const fn grants_defense_bonus(&self) -> bool {
        matches!(self, Terrain::Mountain | Terrain::Forest)
    }

    /// Check if a base or a purchased unit may be placed on this terrain.
    pub const fn is_buildable(&self) -> bool {
        !matches!(self, Terrain::Water | Terrain::Mountain)
    }

    /// Terrains produced by noise generation (everything except resource sites).
    pub const fn generated() -> &'static [Terrain] {
        &[
            Terrain::Plain,
            Terrain::Mountain,
            Terrain::Forest,
            Terrain::Water,
            Terrain::Desert,
        ]
    }

    /// Get all terrain variants.
    pub const fn all() -> &'static [Terrain] {
        &[
            Terrain::Plain,
            Terrain::Mountain,
            Terrain::Forest,
            Terrain::Water,
            Terrain::Desert,
            Terrain::Resource,
        ]
    }
}

impl std::fmt::Display for Terrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Terrain::Plain => "Plain",
            Terrain::Mountain => "Mountain",
            Terrain::Forest => "Forest",
            Terrain::Water => "Water",
            Terrain::Desert => "Desert",
            Terrain::Resource => "Resource",
        };
        f.write_str(name)
    }
}
