//! Hex coordinate system for the game grid.
//!
//! Uses axial coordinates `(q, r)` on a hexagon-shaped board centered at the
//! origin. Cube form `(x = q, z = r, y = -x - z)` is used for distance,
//! rounding and line sampling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Axial direction offsets in neighbor order: E, NE, NW, W, SW, SE.
pub const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

const SQRT_3: f32 = 1.732_050_8;

/// Axial coordinates for a hex cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct HexCoord {
    /// Column axis.
    pub q: i32,
    /// Diagonal row axis.
    pub r: i32,
}

impl PartialOrd for HexCoord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HexCoord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Row-major ordering for deterministic iteration
        (self.r, self.q).cmp(&(other.r, other.q))
    }
}

impl HexCoord {
    /// The origin of the board.
    pub const ORIGIN: HexCoord = HexCoord::new(0, 0);

    /// Create a new hex coordinate.
    #[inline]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// The implied third cube component.
    #[inline]
    pub const fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Get all 6 neighboring hexes.
    ///
    /// Returns neighbors in order: E, NE, NW, W, SW, SE
    pub fn neighbors(&self) -> [HexCoord; 6] {
        DIRECTIONS.map(|(dq, dr)| HexCoord::new(self.q + dq, self.r + dr))
    }

    /// Neighbor in a single direction (index into [`DIRECTIONS`], wrapped).
    pub fn neighbor(&self, direction: usize) -> HexCoord {
        let (dq, dr) = DIRECTIONS[direction % 6];
        HexCoord::new(self.q + dq, self.r + dr)
    }

    /// Calculate the distance to another hex (in hex steps).
    pub fn distance(&self, other: &HexCoord) -> u32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        dq.max(dr).max(ds) as u32
    }

    /// Check whether two hexes share an edge.
    pub fn is_adjacent(&self, other: &HexCoord) -> bool {
        self.distance(other) == 1
    }

    /// Convert to cube coordinates `(x, y, z)` with `x + y + z = 0`.
    pub const fn to_cube(&self) -> (i32, i32, i32) {
        (self.q, self.s(), self.r)
    }

    /// Create a HexCoord from cube coordinates.
    ///
    /// Note: Input must satisfy x + y + z = 0
    pub const fn from_cube(x: i32, _y: i32, z: i32) -> Self {
        Self { q: x, r: z }
    }

    /// Round fractional cube coordinates to the nearest hex.
    pub fn cube_round(x: f32, y: f32, z: f32) -> Self {
        let mut rx = x.round();
        let ry = y.round();
        let mut rz = z.round();

        let dx = (rx - x).abs();
        let dy = (ry - y).abs();
        let dz = (rz - z).abs();

        // Reset the component with the largest rounding error
        if dx > dy && dx > dz {
            rx = -ry - rz;
        } else if dy <= dz {
            rz = -rx - ry;
        }

        Self::new(rx as i32, rz as i32)
    }

    /// Get a ring of hexes at exactly the given distance.
    ///
    /// Starts at the south-west corner and walks the six sides.
    pub fn ring(&self, radius: u32) -> Vec<HexCoord> {
        if radius == 0 {
            return vec![*self];
        }

        let mut result = Vec::with_capacity(6 * radius as usize);
        let (sw_q, sw_r) = DIRECTIONS[4];
        let mut current = HexCoord::new(
            self.q + sw_q * radius as i32,
            self.r + sw_r * radius as i32,
        );

        for side in 0..6 {
            for _ in 0..radius {
                result.push(current);
                current = current.neighbor(side);
            }
        }

        result
    }

    /// Get all hexes within a given radius (inclusive), center first and then
    /// ring by ring outward.
    pub fn spiral(&self, radius: u32) -> Vec<HexCoord> {
        let mut result = vec![*self];
        for k in 1..=radius {
            result.extend(self.ring(k));
        }
        result
    }

    /// Pixel position of the hex center for a pointy-top layout.
    pub fn to_pixel(&self, size: f32) -> (f32, f32) {
        let x = size * (SQRT_3 * self.q as f32 + SQRT_3 / 2.0 * self.r as f32);
        let y = size * (1.5 * self.r as f32);
        (x, y)
    }

    /// Hex containing a pixel position for a pointy-top layout.
    pub fn from_pixel(x: f32, y: f32, size: f32) -> Self {
        let q = (SQRT_3 / 3.0 * x - y / 3.0) / size;
        let r = (2.0 / 3.0 * y) / size;
        Self::cube_round(q, -q - r, r)
    }

    /// Sample the straight line to another hex, inclusive of both endpoints.
    pub fn line_to(&self, other: &HexCoord) -> Vec<HexCoord> {
        let n = self.distance(other);
        if n == 0 {
            return vec![*self];
        }

        // Nudge off exact edges so ties round consistently
        const EPS: f32 = 1e-4;
        let (ax, ay, az) = self.to_cube();
        let (bx, by, bz) = other.to_cube();
        let (ax, ay, az) = (ax as f32 + EPS, ay as f32 + EPS, az as f32 - 2.0 * EPS);
        let (bx, by, bz) = (bx as f32 + EPS, by as f32 + EPS, bz as f32 - 2.0 * EPS);

        (0..=n)
            .map(|i| {
                let t = i as f32 / n as f32;
                HexCoord::cube_round(
                    ax + (bx - ax) * t,
                    ay + (by - ay) * t,
                    az + (bz - az) * t,
                )
            })
            .collect()
    }

    /// String key used by external lookups, formatted as `"q,r"`.
    pub fn key(&self) -> String {
        format!("{},{}", self.q, self.r)
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// Error parsing a `"q,r"` coordinate key.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid hex key: {0:?}")]
pub struct ParseHexKeyError(pub String);

impl FromStr for HexCoord {
    type Err = ParseHexKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseHexKeyError(s.to_string());
        let (q, r) = s.split_once(',').ok_or_else(err)?;
        let q = q.trim().parse().map_err(|_| err())?;
        let r = r.trim().parse().map_err(|_| err())?;
        Ok(HexCoord::new(q, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let coord = HexCoord::new(3, 5);
        assert_eq!(coord.q, 3);
        assert_eq!(coord.r, 5);
        assert_eq!(coord.s(), -8);
    }

    #[test]
    fn test_distance_same_hex() {
        let coord = HexCoord::new(5, 5);
        assert_eq!(coord.distance(&coord), 0);
    }

    #[test]
    fn test_distance_neighbors() {
        let coord = HexCoord::new(2, -1);
        for neighbor in coord.neighbors() {
            assert_eq!(coord.distance(&neighbor), 1);
        }
    }

    #[test]
    fn test_distance_known_values() {
        assert_eq!(HexCoord::ORIGIN.distance(&HexCoord::new(3, 0)), 3);
        assert_eq!(HexCoord::ORIGIN.distance(&HexCoord::new(2, -4)), 4);
        assert_eq!(HexCoord::new(-2, 1).distance(&HexCoord::new(1, 1)), 3);
    }

    #[test]
    fn test_neighbor_order() {
        let n = HexCoord::ORIGIN.neighbors();
        assert_eq!(n[0], HexCoord::new(1, 0)); // E
        assert_eq!(n[1], HexCoord::new(1, -1)); // NE
        assert_eq!(n[2], HexCoord::new(0, -1)); // NW
        assert_eq!(n[3], HexCoord::new(-1, 0)); // W
        assert_eq!(n[4], HexCoord::new(-1, 1)); // SW
        assert_eq!(n[5], HexCoord::new(0, 1)); // SE
    }

    #[test]
    fn test_ring_sizes() {
        let center = HexCoord::new(1, 1);
        assert_eq!(center.ring(0), vec![center]);
        for radius in 1..5 {
            let ring = center.ring(radius);
            assert_eq!(ring.len(), 6 * radius as usize);
            assert!(ring.iter().all(|h| center.distance(h) == radius));
        }
    }

    #[test]
    fn test_spiral() {
        let center = HexCoord::ORIGIN;
        assert_eq!(center.spiral(0), vec![center]);

        let spiral = center.spiral(2);
        assert_eq!(spiral.len(), 19); // 1 + 6 + 12
        assert_eq!(spiral[0], center);
        assert!(spiral.iter().all(|h| center.distance(h) <= 2));
    }

    #[test]
    fn test_cube_roundtrip() {
        let original = HexCoord::new(7, -3);
        let (x, y, z) = original.to_cube();
        assert_eq!(x + y + z, 0);
        assert_eq!(HexCoord::from_cube(x, y, z), original);
    }

    #[test]
    fn test_pixel_roundtrip() {
        for hex in HexCoord::ORIGIN.spiral(4) {
            let (x, y) = hex.to_pixel(10.0);
            assert_eq!(HexCoord::from_pixel(x, y, 10.0), hex);
        }
    }

    #[test]
    fn test_line_to() {
        let a = HexCoord::new(-2, 0);
        let b = HexCoord::new(2, 0);
        let line = a.line_to(&b);
        assert_eq!(line.len(), 5);
        assert_eq!(line.first(), Some(&a));
        assert_eq!(line.last(), Some(&b));
        for pair in line.windows(2) {
            assert_eq!(pair[0].distance(&pair[1]), 1);
        }
    }

    #[test]
    fn test_key_roundtrip() {
        let coord = HexCoord::new(-3, 7);
        assert_eq!(coord.key(), "-3,7");
        assert_eq!("-3,7".parse::<HexCoord>(), Ok(coord));
        assert!("nope".parse::<HexCoord>().is_err());
        assert!("1,x".parse::<HexCoord>().is_err());
    }

    #[test]
    fn test_display() {
        let coord = HexCoord::new(3, 7);
        assert_eq!(format!("{}", coord), "(3, 7)");
    }
}
