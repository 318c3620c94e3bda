//! Game settings and configuration.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Tunable constants for a match, shared by world generation and the turn
/// engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Distance from the center hex to the rim.
    pub grid_radius: u32,
    /// Target terrain fractions for world generation.
    pub terrain: TerrainDistribution,
    /// Number of resource hexes to place.
    pub resource_hex_count: usize,
    /// Points per round a resource hex can be worth.
    pub resource_value_range: RangeInclusive<u32>,
    /// Health of a freshly placed base.
    pub base_max_health: u32,
    /// Points each faction starts with.
    pub starting_points: u32,
    /// Planning timer, reset at the start of every round.
    pub planning_time_secs: u32,
    /// Enemy units within this distance of a base deal siege damage.
    pub siege_radius: u32,
    /// Health restored by a medic to each adjacent friendly unit per round.
    pub medic_heal_amount: u32,
}

impl GameConfig {
    /// Create settings for a small board (useful for quick matches and tests).
    pub fn small() -> Self {
        Self {
            grid_radius: 4,
            resource_hex_count: 3,
            ..Default::default()
        }
    }

    /// Validate settings and return any errors.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.grid_radius < 3 {
            return Err(SettingsError::GridTooSmall(self.grid_radius));
        }
        self.terrain.validate()?;
        if self.resource_value_range.is_empty() {
            return Err(SettingsError::EmptyResourceRange);
        }
        let band_size = mid_band_size(self.grid_radius);
        if self.resource_hex_count > band_size {
            return Err(SettingsError::TooManyResources {
                requested: self.resource_hex_count,
                available: band_size,
            });
        }
        if self.base_max_health == 0 {
            return Err(SettingsError::ZeroBaseHealth);
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            grid_radius: 7,
            terrain: TerrainDistribution::default(),
            resource_hex_count: 6,
            resource_value_range: 2..=4,
            base_max_health: 50,
            starting_points: 20,
            planning_time_secs: 30,
            siege_radius: 3,
            medic_heal_amount: 1,
        }
    }
}

/// Hexes strictly between the center and the rim.
fn mid_band_size(radius: u32) -> usize {
    (1..radius).map(|k| 6 * k as usize).sum()
}

/// Target terrain fractions; must sum to 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainDistribution {
    pub plain: f32,
    pub forest: f32,
    pub mountain: f32,
    pub water: f32,
    pub desert: f32,
}

impl TerrainDistribution {
    const SUM_TOLERANCE: f32 = 0.01;

    /// Fraction targeted for a terrain type (resource sites are placed
    /// separately and have no target).
    pub fn target(&self, terrain: crate::terrain::Terrain) -> f32 {
        use crate::terrain::Terrain;
        match terrain {
            Terrain::Plain => self.plain,
            Terrain::Forest => self.forest,
            Terrain::Mountain => self.mountain,
            Terrain::Water => self.water,
            Terrain::Desert => self.desert,
            Terrain::Resource => 0.0,
        }
    }

    /// Validate that every fraction is in range and they sum to 1.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let fractions = [self.plain, self.forest, self.mountain, self.water, self.desert];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(SettingsError::FractionOutOfRange);
        }
        let sum: f32 = fractions.iter().sum();
        if (sum - 1.0).abs() > Self::SUM_TOLERANCE {
            return Err(SettingsError::DistributionSum(sum));
        }
        Ok(())
    }
}

impl Default for TerrainDistribution {
    fn default() -> Self {
        Self {
            plain: 0.40,
            forest: 0.20,
            mountain: 0.15,
            water: 0.15,
            desert: 0.10,
        }
    }
}

/// Computer opponent difficulty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Behavior weights for this tier.
    pub const fn weights(&self) -> AiWeights {
        match self {
            Difficulty::Easy => AiWeights {
                aggressiveness: 0.3,
                defense_preference: 0.3,
                resource_focus: 0.3,
                unit_diversity: 0.2,
                retreat_threshold: 0.7,
            },
            Difficulty::Medium => AiWeights {
                aggressiveness: 0.5,
                defense_preference: 0.5,
                resource_focus: 0.5,
                unit_diversity: 0.5,
                retreat_threshold: 0.5,
            },
            Difficulty::Hard => AiWeights {
                aggressiveness: 0.8,
                defense_preference: 0.7,
                resource_focus: 0.7,
                unit_diversity: 0.7,
                retreat_threshold: 0.3,
            },
        }
    }
}

/// Five behavior weights in `[0, 1]` driving the computer opponent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiWeights {
    pub aggressiveness: f32,
    pub defense_preference: f32,
    pub resource_focus: f32,
    pub unit_diversity: f32,
    /// Threat level (or lost-health fraction) above which units fall back.
    pub retreat_threshold: f32,
}

impl Default for AiWeights {
    fn default() -> Self {
        Difficulty::default().weights()
    }
}

/// Errors from invalid game settings.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("grid radius {0} is too small (minimum 3)")]
    GridTooSmall(u32),
    #[error("terrain fractions must be between 0 and 1")]
    FractionOutOfRange,
    #[error("terrain fractions sum to {0}, expected 1")]
    DistributionSum(f32),
    #[error("resource value range is empty")]
    EmptyResourceRange,
    #[error("{requested} resource hexes requested but only {available} fit")]
    TooManyResources { requested: usize, available: usize },
    #[error("base health must be positive")]
    ZeroBaseHealth,
}
