//! Procedural map generation.
//!
//! Terrain comes from three layered value-noise fields (height, moisture,
//! temperature) sampled at each hex's pixel position. A balancing pass then
//! nudges the terrain mix toward the configured distribution by eroding
//! cluster boundaries, and finally resource hexes are scattered through the
//! mid-radius band.
//!
//! All randomness comes from the caller's RNG, so a seeded RNG reproduces
//! the same map.

use crate::hex::HexCoord;
use crate::map::{Hex, Map};
use crate::settings::{GameConfig, SettingsError, TerrainDistribution};
use crate::terrain::Terrain;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use tracing::{debug, instrument};

/// Probability that an interior hex (all neighbors alike) is reassigned.
const INTERIOR_REASSIGN_CHANCE: f64 = 0.05;

/// Upper bound on balancing passes.
const MAX_BALANCE_PASSES: usize = 20;

/// Noise octaves as (lattice spacing in pixel units, weight).
const OCTAVES: [(f32, f32); 3] = [(6.0, 0.6), (3.0, 0.3), (1.5, 0.1)];

/// Generates game maps from a config and an injected RNG.
pub struct MapGenerator<'a, R: Rng + ?Sized> {
    rng: &'a mut R,
    config: &'a GameConfig,
}

impl<'a, R: Rng + ?Sized> MapGenerator<'a, R> {
    /// Create a new map generator.
    pub fn new(config: &'a GameConfig, rng: &'a mut R) -> Self {
        Self { rng, config }
    }

    /// Generate a complete map: terrain and resource hexes, no units or bases.
    ///
    /// The config is validated first; nothing is drawn from the RNG when it
    /// is rejected.
    #[instrument(skip_all, name = "generate_map")]
    pub fn generate(&mut self) -> Result<Map, SettingsError> {
        self.config.validate()?;
        let radius = self.config.grid_radius;
        let mut map = Map::filled(radius, Terrain::Plain);

        // Phase 1: Noise-driven terrain
        self.generate_terrain(&mut map);

        // Phase 2: Pull the mix toward the configured distribution
        self.balance_terrain(&mut map);

        // Phase 3: Resource hexes
        place_resources(
            &mut map,
            self.config.resource_hex_count,
            &self.config.resource_value_range,
            &mut *self.rng,
        );

        debug!(
            radius,
            hexes = map.hex_count(),
            resources = map.resource_hexes().len(),
            "map generated"
        );
        Ok(map)
    }

    /// Assign terrain from the height, moisture and temperature fields.
    fn generate_terrain(&mut self, map: &mut Map) {
        let coords = map.sorted_coords();
        let height = self.noise_field(&coords, map.radius);
        let moisture = self.noise_field(&coords, map.radius);
        let temperature = self.noise_field(&coords, map.radius);

        for (i, coord) in coords.iter().enumerate() {
            let terrain = classify(height[i], moisture[i], temperature[i]);
            if let Some(hex) = map.get_mut(coord) {
                hex.terrain = terrain;
            }
        }
    }

    /// Sample a fresh multi-octave value-noise field at each coordinate,
    /// normalized to `[0, 1]`.
    fn noise_field(&mut self, coords: &[HexCoord], radius: u32) -> Vec<f32> {
        // Pixel extent of the board at unit hex size, padded by one hex
        let extent = (radius as f32 + 1.0) * 2.0;
        let mut values = vec![0.0f32; coords.len()];

        for (spacing, weight) in OCTAVES {
            let cells = (2.0 * extent / spacing).ceil() as usize + 2;

            // Random lattice values
            let mut grid = vec![0.0f32; cells * cells];
            for val in grid.iter_mut() {
                *val = self.rng.gen::<f32>();
            }

            for (i, coord) in coords.iter().enumerate() {
                let (px, py) = coord.to_pixel(1.0);
                let x = (px + extent) / spacing;
                let y = (py + extent) / spacing;

                let x0 = (x.floor().max(0.0) as usize).min(cells - 1);
                let y0 = (y.floor().max(0.0) as usize).min(cells - 1);
                let x1 = (x0 + 1).min(cells - 1);
                let y1 = (y0 + 1).min(cells - 1);

                let fx = smoothstep(x - x0 as f32);
                let fy = smoothstep(y - y0 as f32);

                // Bilinear interpolation
                let v00 = grid[y0 * cells + x0];
                let v10 = grid[y0 * cells + x1];
                let v01 = grid[y1 * cells + x0];
                let v11 = grid[y1 * cells + x1];

                let v0 = v00 * (1.0 - fx) + v10 * fx;
                let v1 = v01 * (1.0 - fx) + v11 * fx;
                values[i] += (v0 * (1.0 - fy) + v1 * fy) * weight;
            }
        }

        normalize(&mut values);
        values
    }

    /// Reassign hexes from over-represented terrains to under-represented
    /// ones, working inward from cluster boundaries.
    fn balance_terrain(&mut self, map: &mut Map) {
        let targets = target_counts(&self.config.terrain, map.hex_count());
        let tolerance = (map.hex_count() as f32 * 0.02).max(1.0);
        let coords = map.sorted_coords();

        for pass in 0..MAX_BALANCE_PASSES {
            let mut counts = map.terrain_counts();
            let balanced = Terrain::generated().iter().all(|t| {
                counts.get(t).copied().unwrap_or(0) as f32 <= targets[t] + tolerance
            });
            if balanced {
                debug!(pass, "terrain balanced");
                return;
            }

            for coord in &coords {
                let Some(current) = map.terrain(coord) else {
                    continue;
                };
                if counts.get(&current).copied().unwrap_or(0) as f32 <= targets[&current] {
                    continue;
                }
                if !is_boundary(map, coord) && !self.rng.gen_bool(INTERIOR_REASSIGN_CHANCE) {
                    continue;
                }

                let Some(replacement) = pick_replacement(map, coord, &counts, &targets) else {
                    continue;
                };

                if let Some(hex) = map.get_mut(coord) {
                    hex.terrain = replacement;
                }
                if let Some(c) = counts.get_mut(&current) {
                    *c = c.saturating_sub(1);
                }
                *counts.entry(replacement).or_insert(0) += 1;
            }
        }

        debug!("terrain balancing hit pass limit");
    }
}

/// Generate a map in one call.
pub fn generate_map<R: Rng + ?Sized>(
    config: &GameConfig,
    rng: &mut R,
) -> Result<Map, SettingsError> {
    MapGenerator::new(config, rng).generate()
}

/// Turn up to `count` buildable hexes in the band between center and rim
/// into resource hexes worth a random amount from `values`.
///
/// Water and mountain are never picked. Returns the chosen coordinates in
/// the order they were drawn. An empty `values` range places nothing.
pub fn place_resources<R: Rng + ?Sized>(
    map: &mut Map,
    count: usize,
    values: &RangeInclusive<u32>,
    rng: &mut R,
) -> Vec<HexCoord> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<HexCoord> = map
        .sorted_coords()
        .into_iter()
        .filter(|c| {
            let dist = HexCoord::ORIGIN.distance(c);
            dist > 0 && dist < map.radius
        })
        .filter(|c| map.terrain(c).map_or(false, |t| t.is_buildable()))
        .collect();

    candidates.shuffle(rng);
    if candidates.len() < count {
        debug!(
            wanted = count,
            available = candidates.len(),
            "not enough land for all resource hexes"
        );
    }
    candidates.truncate(count);

    for coord in &candidates {
        let value = rng.gen_range(values.clone());
        if let Some(hex) = map.get_mut(coord) {
            hex.terrain = Terrain::Resource;
            hex.is_resource_hex = true;
            hex.resource_value = value;
        }
    }
    candidates
}

/// Valid base sites: rim hexes that are buildable and not resource hexes,
/// in row-major order.
pub fn base_candidates(map: &Map) -> Vec<HexCoord> {
    map.sorted_coords()
        .into_iter()
        .filter(|c| map.is_edge(c))
        .filter(|c| map.get(c).map_or(false, is_valid_base_site))
        .collect()
}

/// Check whether a hex may hold a base.
pub fn is_valid_base_site(hex: &Hex) -> bool {
    hex.terrain.is_buildable() && !hex.is_resource_hex && !hex.is_base
}

/// Map noise samples to terrain using fixed thresholds.
pub fn classify(height: f32, moisture: f32, temperature: f32) -> Terrain {
    if height > 0.75 {
        Terrain::Mountain
    } else if height > 0.6 && moisture > 0.5 {
        Terrain::Forest
    } else if height < 0.3 {
        Terrain::Water
    } else if moisture < 0.3 && temperature > 0.6 {
        Terrain::Desert
    } else {
        Terrain::Plain
    }
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn normalize(values: &mut [f32]) {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;
    for v in values.iter_mut() {
        *v = if span > f32::EPSILON {
            (*v - min) / span
        } else {
            0.5
        };
    }
}

fn target_counts(distribution: &TerrainDistribution, total: usize) -> HashMap<Terrain, f32> {
    Terrain::all()
        .iter()
        .map(|t| (*t, distribution.target(*t) * total as f32))
        .collect()
}

fn is_boundary(map: &Map, coord: &HexCoord) -> bool {
    let Some(terrain) = map.terrain(coord) else {
        return false;
    };
    map.neighbors(coord)
        .iter()
        .any(|n| map.terrain(n) != Some(terrain))
}

/// Choose what an over-represented hex becomes: the neediest neighboring
/// terrain that is still under target, else the neediest terrain overall.
fn pick_replacement(
    map: &Map,
    coord: &HexCoord,
    counts: &HashMap<Terrain, usize>,
    targets: &HashMap<Terrain, f32>,
) -> Option<Terrain> {
    let deficit = |t: Terrain| targets[&t] - counts.get(&t).copied().unwrap_or(0) as f32;

    let neighbor_terrains = map
        .neighbors(coord)
        .into_iter()
        .filter_map(|n| map.terrain(&n))
        .filter(|t| *t != Terrain::Resource);

    neediest(neighbor_terrains, deficit)
        .or_else(|| neediest(Terrain::generated().iter().copied(), deficit))
}

fn neediest(
    candidates: impl Iterator<Item = Terrain>,
    deficit: impl Fn(Terrain) -> f32,
) -> Option<Terrain> {
    candidates
        .filter(|t| deficit(*t) >= 1.0)
        .max_by(|a, b| deficit(*a).total_cmp(&deficit(*b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generate(seed: u64, config: &GameConfig) -> Map {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        generate_map(config, &mut rng).unwrap()
    }

    #[test]
    fn test_classify_thresholds() {
        assert_eq!(classify(0.8, 0.5, 0.5), Terrain::Mountain);
        assert_eq!(classify(0.7, 0.6, 0.5), Terrain::Forest);
        assert_eq!(classify(0.7, 0.4, 0.5), Terrain::Plain);
        assert_eq!(classify(0.2, 0.9, 0.9), Terrain::Water);
        assert_eq!(classify(0.5, 0.2, 0.7), Terrain::Desert);
        assert_eq!(classify(0.5, 0.5, 0.5), Terrain::Plain);
    }

    #[test]
    fn test_map_generation_determinism() {
        let config = GameConfig::default();
        let map1 = generate(123, &config);
        let map2 = generate(123, &config);
        assert_eq!(map1, map2);
    }

    #[test]
    fn test_map_covers_full_hexagon() {
        let config = GameConfig::default();
        let map = generate(1, &config);
        // 3r^2 + 3r + 1
        assert_eq!(map.hex_count(), 169);
        assert!(map.iter().all(|(_, h)| h.unit.is_none() && !h.is_base));
    }

    #[test]
    fn test_distribution_is_approximated() {
        let config = GameConfig::default();
        let map = generate(7, &config);
        let counts = map.terrain_counts();
        let total = map.hex_count() as f32;
        let resources = counts.get(&Terrain::Resource).copied().unwrap_or(0) as f32;

        for terrain in Terrain::generated() {
            let fraction = counts.get(terrain).copied().unwrap_or(0) as f32 / total;
            let target = config.terrain.target(*terrain);
            // Resource hexes are carved out of land after balancing
            assert!(
                (fraction - target).abs() <= 0.08 + resources / total,
                "{terrain}: {fraction} vs {target}"
            );
        }
    }

    #[test]
    fn test_resource_placement() {
        let config = GameConfig::default();
        for seed in 0..5 {
            let map = generate(seed, &config);
            let resources = map.resource_hexes();
            assert_eq!(resources.len(), config.resource_hex_count);

            for hex in resources {
                let dist = HexCoord::ORIGIN.distance(&hex.coord);
                assert!(dist > 0 && dist < config.grid_radius);
                assert!(config.resource_value_range.contains(&hex.resource_value));
            }
        }
    }

    #[test]
    fn test_resources_avoid_water_and_mountain() {
        // Water everywhere, a mountain ring at distance 2, and three plains
        // in the band: one on the ring, two at distance 1 and 3
        let mut map = Map::filled(4, Terrain::Water);
        for c in HexCoord::ORIGIN.ring(2) {
            map.get_mut(&c).unwrap().terrain = Terrain::Mountain;
        }
        let plains = [HexCoord::new(2, 0), HexCoord::new(0, 1), HexCoord::new(-3, 0)];
        for c in plains {
            map.get_mut(&c).unwrap().terrain = Terrain::Plain;
        }
        // Outside the band
        map.get_mut(&HexCoord::ORIGIN).unwrap().terrain = Terrain::Plain;
        map.get_mut(&HexCoord::new(4, 0)).unwrap().terrain = Terrain::Plain;

        for seed in 0..10 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut prepared = map.clone();
            let mut picked = place_resources(&mut prepared, 6, &(2..=4), &mut rng);
            picked.sort();
            let mut expected = plains.to_vec();
            expected.sort();
            assert_eq!(picked, expected);

            for (coord, hex) in prepared.iter() {
                assert_eq!(hex.is_resource_hex, plains.contains(coord), "{coord}");
            }
        }
    }

    #[test]
    fn test_resources_limited_to_count() {
        let mut map = Map::filled(4, Terrain::Plain);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let picked = place_resources(&mut map, 4, &(3..=3), &mut rng);
        assert_eq!(picked.len(), 4);
        assert_eq!(map.resource_hexes().len(), 4);
        assert!(map.resource_hexes().iter().all(|h| h.resource_value == 3));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = GameConfig {
            resource_value_range: 4..=2,
            ..GameConfig::small()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            generate_map(&config, &mut rng),
            Err(SettingsError::EmptyResourceRange)
        );

        let mut map = Map::filled(4, Terrain::Plain);
        assert!(place_resources(&mut map, 3, &config.resource_value_range, &mut rng).is_empty());
        assert!(map.resource_hexes().is_empty());
    }

    #[test]
    fn test_terrain_is_clustered() {
        let config = GameConfig::default();
        let map = generate(42, &config);

        // Most hexes should share terrain with at least one neighbor
        let coherent = map
            .iter()
            .filter(|(c, h)| {
                map.neighbors(c)
                    .iter()
                    .any(|n| map.terrain(n) == Some(h.terrain))
            })
            .count();
        assert!(coherent * 10 >= map.hex_count() * 6);
    }

    #[test]
    fn test_base_candidates() {
        let mut map = Map::filled(3, Terrain::Plain);
        map.get_mut(&HexCoord::new(3, 0)).unwrap().terrain = Terrain::Water;
        map.get_mut(&HexCoord::new(-3, 0)).unwrap().terrain = Terrain::Mountain;

        let candidates = base_candidates(&map);
        assert_eq!(candidates.len(), 16);
        assert!(candidates.iter().all(|c| map.is_edge(c)));
        assert!(!candidates.contains(&HexCoord::new(3, 0)));
        assert!(!candidates.contains(&HexCoord::new(-3, 0)));
    }
}
