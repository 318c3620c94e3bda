//! Turn engine: the phase state machine and every transition that mutates a
//! match.
//!
//! ```text
//! Setup -> Planning -> Execution -> Combat -> Planning -> ... -> GameOver
//!                           \__________________/^
//! ```
//!
//! `Execution` is entered and left inside [`GameState::execute_moves`]; it
//! resolves either to `Combat` or straight back to `Planning` through the
//! end-of-round pipeline. Every transition returns `Err` without touching
//! the state when the request breaks a rule.

use crate::combat::{detect_combats, fight_damage, retreat_destination, CombatOutcome};
use crate::game_state::{missing_unit, GameError, GamePhase, GameState, PendingMove, PendingPurchase};
use crate::hex::HexCoord;
use crate::mapgen::is_valid_base_site;
use crate::types::{Faction, UnitId};
use crate::unit::{Ability, Unit, UnitType};
use crate::victory::{check_base_capture, check_base_destroyed, Outcome};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// What `execute_moves` did with the queued orders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoundReport {
    /// Units created by accepted purchases.
    pub spawned: Vec<UnitId>,
    /// Purchases that failed validation, with the reason.
    pub rejected_purchases: Vec<(PendingPurchase, GameError)>,
    /// Units that moved.
    pub moved: Vec<UnitId>,
    /// Moves that failed validation, with the reason.
    pub rejected_moves: Vec<(PendingMove, GameError)>,
    /// Number of combats waiting to be resolved.
    pub combats: usize,
    /// Set when the game ended this call.
    pub outcome: Option<Outcome>,
    /// End-of-round summary, when the round closed without combat.
    pub round: Option<RoundSummary>,
}

/// Effects of the end-of-round pipeline.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Siege damage taken by each base, indexed by [`Faction::index`].
    pub siege_damage: [u32; 2],
    /// Points collected from resource hexes, indexed by [`Faction::index`].
    pub resources_collected: [u32; 2],
    /// Units that regained health from a medic.
    pub units_healed: usize,
    /// Set when a base fell to siege damage.
    pub outcome: Option<Outcome>,
}

impl GameState {
    fn require_phase(&self, expected: GamePhase) -> Result<(), GameError> {
        if self.phase == GamePhase::GameOver {
            return Err(GameError::GameOver);
        }
        if self.phase != expected {
            return Err(GameError::InvalidPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    /// Place a faction's base. Once both bases exist the first round begins.
    #[instrument(skip_all, fields(faction = %faction, coord = %coord))]
    pub fn set_base_location(&mut self, faction: Faction, coord: HexCoord) -> Result<(), GameError> {
        self.require_phase(GamePhase::Setup)?;

        let placement = |reason| GameError::InvalidPlacement { coord, reason };
        if self.player(faction).has_base() {
            return Err(placement("faction already has a base"));
        }
        let hex = self.map.get(&coord).ok_or_else(|| placement("off the grid"))?;
        if !is_valid_base_site(hex) {
            return Err(placement("hex cannot hold a base"));
        }

        let health = self.config.base_max_health;
        if let Some(hex) = self.map.get_mut(&coord) {
            hex.is_base = true;
            hex.owner = Some(faction);
            hex.base_health = Some(health);
        }
        let player = self.player_mut(faction);
        player.base_location = Some(coord);
        player.max_base_health = health;
        player.base_health = health;
        info!("base placed");

        if self.players.iter().all(|p| p.has_base()) {
            self.phase = GamePhase::Planning;
            self.turn = 1;
            self.planning_time_remaining = self.config.planning_time_secs;
            info!("setup complete, planning round 1");
        }
        Ok(())
    }

    /// Queue a unit purchase. Validation happens when orders execute.
    pub fn add_pending_purchase(
        &mut self,
        faction: Faction,
        unit_type: UnitType,
        position: HexCoord,
    ) -> Result<(), GameError> {
        self.require_phase(GamePhase::Planning)?;
        debug!(%faction, %unit_type, %position, "purchase queued");
        self.pending_purchases.push(PendingPurchase {
            faction,
            unit_type,
            position,
        });
        Ok(())
    }

    /// Queue a move, replacing any move already queued for the same unit.
    pub fn add_pending_move(
        &mut self,
        faction: Faction,
        unit_id: UnitId,
        to: HexCoord,
    ) -> Result<(), GameError> {
        self.require_phase(GamePhase::Planning)?;
        let unit = self.unit(unit_id).ok_or_else(|| missing_unit(unit_id))?;
        if unit.owner != faction {
            return Err(GameError::IllegalMove {
                unit: unit_id,
                to,
                reason: "unit belongs to the other faction",
            });
        }

        let order = PendingMove {
            unit_id,
            faction,
            from: unit.position,
            to,
        };
        self.pending_moves.retain(|m| m.unit_id != unit_id);
        debug!(unit = unit_id, from = %order.from, %to, "move queued");
        self.pending_moves.push(order);
        Ok(())
    }

    /// Withdraw a unit's queued move. Returns whether one was queued.
    pub fn cancel_pending_move(&mut self, unit_id: UnitId) -> bool {
        let before = self.pending_moves.len();
        self.pending_moves.retain(|m| m.unit_id != unit_id);
        self.pending_moves.len() != before
    }

    /// Withdraw a faction's queued purchases at a hex. Returns whether any
    /// were queued.
    pub fn cancel_pending_purchase(&mut self, faction: Faction, position: HexCoord) -> bool {
        let before = self.pending_purchases.len();
        self.pending_purchases
            .retain(|p| !(p.faction == faction && p.position == position));
        self.pending_purchases.len() != before
    }

    /// Count down the planning timer. Returns true once it has run out; the
    /// caller then executes the round.
    pub fn tick_planning_timer(&mut self, elapsed_secs: u32) -> bool {
        if self.phase != GamePhase::Planning {
            return false;
        }
        self.planning_time_remaining = self.planning_time_remaining.saturating_sub(elapsed_secs);
        self.planning_time_remaining == 0
    }

    /// Indices of combats still waiting for resolution.
    pub fn unresolved_combats(&self) -> Vec<usize> {
        self.combats
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.resolved)
            .map(|(i, _)| i)
            .collect()
    }

    /// Apply all queued purchases, then all queued moves, then look for
    /// captures and combats.
    ///
    /// Individual orders that break a rule are skipped and listed in the
    /// report; they never abort the round.
    #[instrument(skip_all, fields(turn = self.turn))]
    pub fn execute_moves(&mut self) -> Result<RoundReport, GameError> {
        self.require_phase(GamePhase::Planning)?;
        self.phase = GamePhase::Execution;
        let mut report = RoundReport::default();

        for purchase in std::mem::take(&mut self.pending_purchases) {
            match self.apply_purchase(&purchase) {
                Ok(id) => report.spawned.push(id),
                Err(err) => {
                    debug!(?purchase, %err, "purchase rejected");
                    report.rejected_purchases.push((purchase, err));
                }
            }
        }

        for order in std::mem::take(&mut self.pending_moves) {
            match self.apply_move(&order) {
                Ok(()) => report.moved.push(order.unit_id),
                Err(err) => {
                    debug!(?order, %err, "move rejected");
                    report.rejected_moves.push((order, err));
                }
            }
        }

        if let Some(outcome) = check_base_capture(self) {
            self.finish(outcome);
            report.outcome = Some(outcome);
            return Ok(report);
        }

        let combats = detect_combats(self);
        if !combats.is_empty() {
            for id in combats.iter().flat_map(|c| c.participants()) {
                if let Some(unit) = self.units.get_mut(&id) {
                    unit.is_engaged_in_combat = true;
                }
            }
            report.combats = combats.len();
            self.combats = combats;
            self.phase = GamePhase::Combat;
            info!(combats = report.combats, "combat phase");
            return Ok(report);
        }

        let summary = self.end_round();
        report.outcome = summary.outcome;
        report.round = Some(summary);
        Ok(report)
    }

    fn apply_purchase(&mut self, purchase: &PendingPurchase) -> Result<UnitId, GameError> {
        let placement = |reason| GameError::InvalidPlacement {
            coord: purchase.position,
            reason,
        };

        let hex = self
            .map
            .get(&purchase.position)
            .ok_or_else(|| placement("off the grid"))?;
        if hex.is_base {
            return Err(placement("cannot deploy onto a base"));
        }
        if !hex.terrain.is_buildable() {
            return Err(placement("terrain cannot hold a new unit"));
        }
        if hex.is_occupied() {
            return Err(placement("hex is occupied"));
        }

        let base = self
            .base_of(purchase.faction)
            .ok_or_else(|| placement("faction has no base"))?;
        if !base.is_adjacent(&purchase.position) {
            return Err(placement("not adjacent to base"));
        }

        let cost = purchase.unit_type.cost();
        let player = self.player_mut(purchase.faction);
        let available = player.points;
        if !player.spend_points(cost) {
            return Err(GameError::InsufficientFunds {
                needed: cost,
                available,
            });
        }

        self.spawn_unit(purchase.faction, purchase.unit_type, purchase.position)
            .map_err(|err| {
                self.player_mut(purchase.faction).add_points(cost);
                err
            })
    }

    fn apply_move(&mut self, order: &PendingMove) -> Result<(), GameError> {
        let unit = self
            .unit(order.unit_id)
            .ok_or_else(|| missing_unit(order.unit_id))?;
        let illegal = |reason| GameError::IllegalMove {
            unit: order.unit_id,
            to: order.to,
            reason,
        };

        if unit.owner != order.faction {
            return Err(illegal("unit belongs to the other faction"));
        }
        if unit.position != order.from {
            return Err(illegal("unit is no longer where the order was given"));
        }
        if order.to == order.from {
            return Err(illegal("unit is already there"));
        }
        let hex = self.map.get(&order.to).ok_or_else(|| illegal("off the grid"))?;
        if !hex.can_enter(unit.owner, unit.is_flying()) {
            return Err(illegal("destination cannot be entered"));
        }

        self.relocate_unit(order.unit_id, order.to)?;
        if let Some(unit) = self.units.get_mut(&order.unit_id) {
            unit.has_moved = true;
        }
        Ok(())
    }

    /// Resolve one combat, either by retreating its defenders or by fighting
    /// it out. Resolving the last open combat closes the round.
    #[instrument(skip_all, fields(index = index, retreat = retreat))]
    pub fn resolve_combat(&mut self, index: usize, retreat: bool) -> Result<CombatOutcome, GameError> {
        self.require_phase(GamePhase::Combat)?;
        let combat = self
            .combats
            .get(index)
            .ok_or(GameError::NoSuchCombat(index))?;
        if combat.resolved {
            return Err(GameError::CombatAlreadyResolved(index));
        }
        let combat = combat.clone();

        // Look everything up before mutating anything. Units destroyed in an
        // earlier combat this round no longer take part.
        let attackers = self.live_units(&combat.attackers);
        let defenders = self.live_units(&combat.defenders);
        let terrain = self.map.terrain(&combat.hex).unwrap_or_default();

        let mut outcome = CombatOutcome {
            index,
            retreated: retreat,
            ..Default::default()
        };

        if retreat {
            for defender in &defenders {
                let id = defender.id;
                match retreat_destination(&self.map, defender) {
                    Some(to) => {
                        self.relocate_unit(id, to)?;
                        outcome.fled.push(id);
                    }
                    None => {
                        self.remove_unit(id)?;
                        debug!(unit = id, "no retreat available, unit destroyed");
                        outcome.destroyed.push(id);
                        outcome.failed_retreats.push(GameError::NoRetreatAvailable(id));
                    }
                }
            }
        } else if attackers.is_empty() || defenders.is_empty() {
            debug!(hex = %combat.hex, "one side is gone, nothing to fight");
        } else {
            let attacker_refs: Vec<&Unit> = attackers.iter().collect();
            let defender_refs: Vec<&Unit> = defenders.iter().collect();
            let fight = fight_damage(&attacker_refs, &defender_refs, terrain);
            let hits: Vec<(UnitId, u32)> = attackers
                .iter()
                .map(|u| (u.id, fight.damage_per_attacker))
                .chain(defenders.iter().map(|u| (u.id, fight.damage_per_defender)))
                .collect();
            for (id, damage) in hits {
                if self.damage_unit(id, damage)? {
                    outcome.destroyed.push(id);
                }
            }
            outcome.fight = Some(fight);
        }

        if let Some(c) = self.combats.get_mut(index) {
            c.resolved = true;
            if retreat {
                c.retreating = Some(outcome.fled.clone());
            }
        }
        info!(
            hex = %combat.hex,
            destroyed = outcome.destroyed.len(),
            "combat resolved"
        );

        self.close_empty_combats();

        if self.combats.iter().all(|c| c.resolved) {
            let summary = match check_base_capture(self) {
                Some(captured) => {
                    self.finish(captured);
                    RoundSummary {
                        outcome: Some(captured),
                        ..Default::default()
                    }
                }
                None => self.end_round(),
            };
            outcome.round = Some(summary);
        }
        Ok(outcome)
    }

    fn live_units(&self, ids: &[UnitId]) -> Vec<Unit> {
        ids.iter().filter_map(|id| self.unit(*id).cloned()).collect()
    }

    /// Mark open combats with no surviving attacker or defender as resolved.
    fn close_empty_combats(&mut self) {
        let units = &self.units;
        for (index, combat) in self.combats.iter_mut().enumerate() {
            if combat.resolved {
                continue;
            }
            let alive = |ids: &[UnitId]| ids.iter().any(|id| units.contains_key(id));
            if !alive(&combat.attackers) || !alive(&combat.defenders) {
                combat.resolved = true;
                debug!(index, hex = %combat.hex, "combat closed, one side destroyed");
            }
        }
    }

    /// Apply damage and remove the unit if it died. Returns whether it died.
    fn damage_unit(&mut self, id: UnitId, damage: u32) -> Result<bool, GameError> {
        let unit = self.unit_mut(id).ok_or_else(|| missing_unit(id))?;
        unit.take_damage(damage);
        if unit.is_dead() {
            self.remove_unit(id)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Siege, resources, healing, flag reset, next round.
    fn end_round(&mut self) -> RoundSummary {
        let mut summary = RoundSummary::default();

        // Siege
        let radius = self.config.siege_radius;
        for faction in Faction::both() {
            let Some(base) = self.base_of(faction) else {
                continue;
            };
            let damage: u32 = self
                .units
                .values()
                .filter(|u| u.owner != faction && u.position.distance(&base) <= radius)
                .map(|u| u.attack_power())
                .sum();
            summary.siege_damage[faction.index()] = damage;
            if damage > 0 {
                self.damage_base(faction, damage);
            }
        }
        if let Some(outcome) = check_base_destroyed(self) {
            self.finish(outcome);
            summary.outcome = Some(outcome);
            return summary;
        }

        // Resources
        let payouts: Vec<(HexCoord, Faction, u32)> = self
            .map
            .resource_hexes()
            .iter()
            .filter_map(|hex| {
                let unit = self.unit_at(&hex.coord)?;
                Some((hex.coord, unit.owner, hex.resource_value))
            })
            .collect();
        for (coord, owner, value) in payouts {
            self.player_mut(owner).add_points(value);
            summary.resources_collected[owner.index()] += value;
            if let Some(hex) = self.map.get_mut(&coord) {
                hex.owner = Some(owner);
            }
        }

        summary.units_healed = self.apply_medic_healing();

        for unit in self.units.values_mut() {
            unit.new_round();
        }

        self.combats.clear();
        self.turn += 1;
        self.phase = GamePhase::Planning;
        self.planning_time_remaining = self.config.planning_time_secs;
        info!(
            turn = self.turn,
            player_siege = summary.siege_damage[0],
            ai_siege = summary.siege_damage[1],
            "round ended"
        );
        summary
    }

    fn damage_base(&mut self, faction: Faction, damage: u32) {
        let player = self.player_mut(faction);
        player.base_health = player.base_health.saturating_sub(damage);
        let (health, base) = (player.base_health, player.base_location);

        if let Some(hex) = base.and_then(|b| self.map.get_mut(&b)) {
            hex.base_health = Some(health);
        }
        debug!(%faction, damage, health, "base besieged");
    }

    /// Each medic heals every adjacent friendly unit. Returns how many
    /// heals restored health.
    fn apply_medic_healing(&mut self) -> usize {
        let mut targets = Vec::new();
        for medic in self.units.values().filter(|u| u.has_ability(Ability::Healing)) {
            for neighbor in medic.position.neighbors() {
                if let Some(unit) = self.unit_at(&neighbor) {
                    if unit.owner == medic.owner {
                        targets.push(unit.id);
                    }
                }
            }
        }

        let amount = self.config.medic_heal_amount;
        let mut healed = 0;
        for id in targets {
            if let Some(unit) = self.units.get_mut(&id) {
                let before = unit.lifespan;
                unit.heal(amount);
                if unit.lifespan > before {
                    healed += 1;
                }
            }
        }
        healed
    }

    fn finish(&mut self, outcome: Outcome) {
        self.winner = outcome.winner();
        self.phase = GamePhase::GameOver;
        self.pending_moves.clear();
        self.pending_purchases.clear();
        info!(?outcome, turn = self.turn, "game over");
    }
}
