//! A* pathfinding and line of sight on the hex grid.
//!
//! Costs are fixed point: one movement point is 10, so forest (1.5) costs 15
//! and mountain (2) costs 20.

use crate::hex::HexCoord;
use crate::map::Map;
use crate::terrain::IMPASSABLE;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Fixed-point scale of one movement point.
pub const COST_SCALE: u32 = 10;

/// Convert a unit's movement range into a path cost budget.
pub const fn movement_budget(movement_range: u32) -> u32 {
    movement_range * COST_SCALE
}

/// A route and what it costs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathResult {
    /// Hexes from start to goal, both included.
    pub path: Vec<HexCoord>,
    pub total_cost: u32,
}

/// Search limits.
#[derive(Clone, Debug)]
pub struct PathConfig {
    /// Maximum total cost a path may have.
    pub max_cost: u32,
    /// Flying units cross water.
    pub flying: bool,
}

impl PathConfig {
    /// Budget for a unit with the given movement range.
    pub fn for_range(movement_range: u32, flying: bool) -> Self {
        Self {
            max_cost: movement_budget(movement_range),
            flying,
        }
    }

    /// No cost limit; used when planning long routes.
    pub fn unbounded(flying: bool) -> Self {
        Self {
            max_cost: u32::MAX,
            flying,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self::for_range(2, false)
    }
}

/// Queue entry; `BinaryHeap` pops the lowest estimate first.
#[derive(Debug, PartialEq, Eq)]
struct Visit {
    estimate: u32,
    cost: u32,
    coord: HexCoord,
}

impl Ord for Visit {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.estimate, other.cost, other.coord).cmp(&(self.estimate, self.cost, self.coord))
    }
}

impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Best-first search shared by [`find_path`] (A*) and [`find_reachable`]
/// (Dijkstra, a zero estimate).
struct Search<'a> {
    map: &'a Map,
    config: &'a PathConfig,
    costs: HashMap<HexCoord, u32>,
    parents: HashMap<HexCoord, HexCoord>,
    queue: BinaryHeap<Visit>,
}

impl<'a> Search<'a> {
    fn new(map: &'a Map, config: &'a PathConfig, start: HexCoord, estimate: u32) -> Self {
        let mut queue = BinaryHeap::new();
        queue.push(Visit {
            estimate,
            cost: 0,
            coord: start,
        });
        Self {
            map,
            config,
            costs: HashMap::from([(start, 0)]),
            parents: HashMap::new(),
            queue,
        }
    }

    /// Settle the next hex and relax its neighbors.
    fn next<F>(&mut self, estimate: &F) -> Option<(HexCoord, u32)>
    where
        F: Fn(&HexCoord) -> u32,
    {
        while let Some(Visit { coord, cost, .. }) = self.queue.pop() {
            if self.costs.get(&coord).map_or(false, |&best| cost > best) {
                continue;
            }

            for neighbor in self.map.neighbors(&coord) {
                let step = entry_cost(self.map, &neighbor, self.config);
                if step == IMPASSABLE {
                    continue;
                }
                let total = cost.saturating_add(step);
                if total > self.config.max_cost
                    || self.costs.get(&neighbor).map_or(false, |&best| total >= best)
                {
                    continue;
                }
                self.costs.insert(neighbor, total);
                self.parents.insert(neighbor, coord);
                self.queue.push(Visit {
                    estimate: total.saturating_add(estimate(&neighbor)),
                    cost: total,
                    coord: neighbor,
                });
            }
            return Some((coord, cost));
        }
        None
    }

    /// Walk parent links back from `goal` to the start.
    fn route_to(&self, goal: HexCoord) -> Vec<HexCoord> {
        let mut route: Vec<HexCoord> =
            std::iter::successors(Some(goal), |c| self.parents.get(c).copied()).collect();
        route.reverse();
        route
    }
}

/// Find the cheapest path between two hexes using A*.
///
/// Returns None if no path exists or the cheapest one costs more than
/// `config.max_cost`.
pub fn find_path(
    map: &Map,
    start: HexCoord,
    goal: HexCoord,
    config: &PathConfig,
) -> Option<PathResult> {
    if !map.contains(&start) {
        return None;
    }

    // Cheapest terrain costs one movement point, so this never overestimates
    let remaining = |c: &HexCoord| c.distance(&goal) * COST_SCALE;
    let mut search = Search::new(map, config, start, remaining(&start));
    while let Some((coord, cost)) = search.next(&remaining) {
        if coord == goal {
            return Some(PathResult {
                path: search.route_to(goal),
                total_cost: cost,
            });
        }
    }
    None
}

/// Every hex reachable within the configured budget, with its cheapest cost.
/// The start is included at cost 0.
pub fn find_reachable(map: &Map, start: HexCoord, config: &PathConfig) -> HashMap<HexCoord, u32> {
    if !map.contains(&start) {
        return HashMap::new();
    }

    let mut search = Search::new(map, config, start, 0);
    while search.next(&|_: &HexCoord| 0).is_some() {}
    search.costs
}

/// Check whether `to` is visible from `from`.
///
/// Mountains and forests strictly between the endpoints block the view;
/// the endpoints themselves never do.
pub fn is_in_line_of_sight(map: &Map, from: HexCoord, to: HexCoord) -> bool {
    let line = from.line_to(&to);
    if line.len() <= 2 {
        return true;
    }

    line[1..line.len() - 1]
        .iter()
        .all(|coord| map.terrain(coord).map_or(true, |t| !t.blocks_sight()))
}

/// Get the movement cost to enter a hex.
fn entry_cost(map: &Map, coord: &HexCoord, config: &PathConfig) -> u32 {
    let Some(hex) = map.get(coord) else {
        return IMPASSABLE;
    };

    if hex.terrain.is_water() {
        return if config.flying {
            COST_SCALE
        } else {
            IMPASSABLE
        };
    }

    hex.terrain.movement_cost()
}

/// Cost of walking a path, not counting the hex it starts on. None if any
/// step is impassable.
pub fn path_cost(map: &Map, path: &[HexCoord], config: &PathConfig) -> Option<u32> {
    path.iter().skip(1).try_fold(0u32, |total, coord| {
        match entry_cost(map, coord, config) {
            IMPASSABLE => None,
            cost => Some(total.saturating_add(cost)),
        }
    })
}
