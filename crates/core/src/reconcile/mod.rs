//! Reconciliation of live vote events into the snapshot state
//!
//! The engine is the only owner of per-unit voting state. Snapshots replace
//! the baseline; stream events are folded in exactly once each. Bad or late
//! events never overwrite a valid vote and never produce an error: they are
//! logged and dropped so one corrupt payload cannot disturb the other units.

mod event_log;

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};
use uuid::Uuid;

pub use event_log::{EventLog, DEFAULT_EVENT_LOG_CAPACITY};

use crate::invariants::assert_engine_invariants;
use crate::models::{UnitStatus, UnitVotingState, VoteCastEvent, VoteDeletedEvent, VotingSnapshot};

/// Result of applying a `vote-cast` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOutcome {
    /// State updated
    Applied,
    /// Event id already applied
    Duplicate,
    /// Option text or color missing; existing state kept
    Invalid,
    /// Unit already shows a valid vote; first valid vote wins
    AlreadyVoted,
    /// Event belongs to another voting
    WrongVoting,
    /// Unit is not part of the loaded snapshot
    UnknownUnit,
}

/// Result of applying a `vote-deleted` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Applied,
    Duplicate,
    /// Delete refers to a vote the unit no longer holds
    Stale,
    UnknownUnit,
}

/// Voted / pending unit counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteCounters {
    pub total_units: usize,
    pub units_voted: usize,
    pub units_pending: usize,
}

impl VoteCounters {
    fn mark_voted(&mut self) {
        self.units_voted = (self.units_voted + 1).min(self.total_units);
        self.units_pending = self.units_pending.saturating_sub(1);
    }

    fn mark_pending(&mut self) {
        self.units_voted = self.units_voted.saturating_sub(1);
        self.units_pending = (self.units_pending + 1).min(self.total_units);
    }
}

/// Single owner of the reconciled unit map
#[derive(Debug)]
pub struct ReconciliationEngine {
    voting_id: Option<Uuid>,
    units: HashMap<Uuid, UnitVotingState>,
    /// Unit ids in snapshot order
    order: Vec<Uuid>,
    counters: VoteCounters,
    applied_casts: EventLog,
    applied_deletes: EventLog,
    /// Last valid vote seen per unit, restored when a later snapshot row is corrupt
    last_valid: HashMap<Uuid, UnitVotingState>,
    has_baseline: bool,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::with_log_capacity(DEFAULT_EVENT_LOG_CAPACITY)
    }

    /// Create an engine whose event logs remember at most `capacity` ids each
    pub fn with_log_capacity(capacity: usize) -> Self {
        Self {
            voting_id: None,
            units: HashMap::new(),
            order: Vec::new(),
            counters: VoteCounters::default(),
            applied_casts: EventLog::with_capacity(capacity),
            applied_deletes: EventLog::with_capacity(capacity),
            last_valid: HashMap::new(),
            has_baseline: false,
        }
    }

    /// Whether a snapshot has been loaded successfully
    pub fn has_baseline(&self) -> bool {
        self.has_baseline
    }

    pub fn voting_id(&self) -> Option<Uuid> {
        self.voting_id
    }

    pub fn counters(&self) -> VoteCounters {
        self.counters
    }

    /// Replace the baseline with an authoritative snapshot.
    ///
    /// Applied event ids survive the reload. A row that claims a vote but
    /// lacks option data is repaired from the last valid vote seen for that
    /// unit when one exists.
    pub fn load_snapshot(&mut self, snapshot: &VotingSnapshot) {
        self.voting_id = Some(snapshot.voting.id);
        self.units.clear();
        self.order.clear();

        for row in &snapshot.units {
            let mut state = row.clone();

            if state.has_valid_vote() {
                self.last_valid.insert(state.property_unit_id, state.clone());
            } else if state.has_voted {
                match self.last_valid.get(&state.property_unit_id) {
                    Some(cached) if state.vote_id.is_none() || state.vote_id == cached.vote_id => {
                        debug!(unit = %state.unit_number, "Restoring last valid vote over corrupt snapshot row");
                        state.vote_id = cached.vote_id;
                        state.option_text = cached.option_text.clone();
                        state.option_code = cached.option_code.clone();
                        state.color = cached.color.clone();
                        state.voted_at = cached.voted_at;
                    }
                    _ => {
                        warn!(unit = %state.unit_number, "Snapshot row marked voted without option data");
                    }
                }
            } else {
                self.last_valid.remove(&state.property_unit_id);
            }

            if self.units.insert(state.property_unit_id, state).is_none() {
                self.order.push(row.property_unit_id);
            }
        }

        let total_units = self.units.len();
        let units_voted = self
            .units
            .values()
            .filter(|u| u.display_status() == UnitStatus::Voted)
            .count();
        self.counters = VoteCounters {
            total_units,
            units_voted,
            units_pending: total_units - units_voted,
        };
        self.has_baseline = true;

        info!(
            voting_id = %snapshot.voting.id,
            total_units,
            units_voted,
            "Snapshot loaded"
        );
        assert_engine_invariants(self);
    }

    /// Fold a `vote-cast` event into the state
    pub fn apply_cast_event(&mut self, event: &VoteCastEvent) -> CastOutcome {
        if self.applied_casts.contains(&event.id) {
            debug!(event_id = %event.id, "Ignoring duplicate vote-cast");
            return CastOutcome::Duplicate;
        }

        if !event.has_complete_option() {
            warn!(
                event_id = %event.id,
                unit_id = %event.property_unit_id,
                "Dropping vote-cast with missing option data"
            );
            return CastOutcome::Invalid;
        }

        if let Some(voting_id) = self.voting_id {
            if event.voting_id != voting_id {
                debug!(event_id = %event.id, voting_id = %event.voting_id, "Ignoring vote-cast for another voting");
                return CastOutcome::WrongVoting;
            }
        }

        let Some(unit) = self.units.get_mut(&event.property_unit_id) else {
            warn!(event_id = %event.id, unit_id = %event.property_unit_id, "vote-cast for unknown unit");
            return CastOutcome::UnknownUnit;
        };

        if unit.has_valid_vote() {
            debug!(
                event_id = %event.id,
                unit = %unit.unit_number,
                "Unit already holds a valid vote, keeping it"
            );
            return CastOutcome::AlreadyVoted;
        }

        unit.record_vote(event);
        self.last_valid.insert(unit.property_unit_id, unit.clone());
        self.applied_casts.record(event.id);
        self.counters.mark_voted();

        debug!(event_id = %event.id, unit = %unit.unit_number, "Applied vote-cast");
        assert_engine_invariants(self);
        CastOutcome::Applied
    }

    /// Fold a `vote-deleted` event into the state
    pub fn apply_delete_event(&mut self, event: &VoteDeletedEvent) -> DeleteOutcome {
        if self.applied_deletes.contains(&event.id) {
            debug!(event_id = %event.id, "Ignoring duplicate vote-deleted");
            return DeleteOutcome::Duplicate;
        }

        let Some(unit) = self.units.get_mut(&event.property_unit_id) else {
            warn!(event_id = %event.id, unit_id = %event.property_unit_id, "vote-deleted for unknown unit");
            return DeleteOutcome::UnknownUnit;
        };

        if let Some(current) = unit.vote_id {
            if current != event.id {
                debug!(
                    event_id = %event.id,
                    current_vote = %current,
                    unit = %unit.unit_number,
                    "Ignoring vote-deleted for a superseded vote"
                );
                return DeleteOutcome::Stale;
            }
        }

        let was_voted = unit.display_status() == UnitStatus::Voted;
        unit.clear_vote();
        if was_voted {
            self.counters.mark_pending();
        }
        self.last_valid.remove(&event.property_unit_id);
        self.applied_deletes.record(event.id);

        debug!(event_id = %event.id, unit = %unit.unit_number, "Applied vote-deleted");
        assert_engine_invariants(self);
        DeleteOutcome::Applied
    }

    /// Current state of one unit
    pub fn unit(&self, unit_id: &Uuid) -> Option<&UnitVotingState> {
        self.units.get(unit_id)
    }

    /// Units in snapshot order
    pub fn units(&self) -> impl Iterator<Item = &UnitVotingState> {
        self.order.iter().filter_map(|id| self.units.get(id))
    }

    /// Owned copy of every unit's state, in snapshot order
    pub fn snapshot_state(&self) -> Vec<UnitVotingState> {
        self.units().cloned().collect()
    }

    /// Ids of units currently displayed as voted
    pub fn voted_unit_ids(&self) -> HashSet<Uuid> {
        self.units
            .values()
            .filter(|u| u.display_status() == UnitStatus::Voted)
            .map(|u| u.property_unit_id)
            .collect()
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PropertyUnit, Voting, VotingType};
    use chrono::Utc;

    fn make_voting() -> Voting {
        Voting {
            id: Uuid::new_v4(),
            voting_group_id: Uuid::new_v4(),
            title: "Cambio de administrador".to_string(),
            description: None,
            voting_type: VotingType::Simple,
            is_secret: false,
            allows_abstention: false,
            is_active: true,
            display_order: 1,
            required_percentage: 51.0,
        }
    }

    fn make_unit(number: &str, coefficient: f64) -> UnitVotingState {
        UnitVotingState::pending(&PropertyUnit {
            id: Uuid::new_v4(),
            unit_number: number.to_string(),
            coefficient,
            resident: None,
        })
    }

    fn make_snapshot(voting: &Voting, units: Vec<UnitVotingState>) -> VotingSnapshot {
        VotingSnapshot {
            voting: voting.clone(),
            options: Vec::new(),
            units,
            fetched_at: Utc::now(),
        }
    }

    fn cast(voting: &Voting, unit: &UnitVotingState, text: &str, color: &str) -> VoteCastEvent {
        VoteCastEvent {
            id: Uuid::new_v4(),
            voting_id: voting.id,
            property_unit_id: unit.property_unit_id,
            voting_option_id: Some(Uuid::new_v4()),
            option_text: Some(text.to_string()),
            option_code: Some(text.to_uppercase()),
            color: Some(color.to_string()),
            voted_at: Some(Utc::now()),
        }
    }

    fn engine_with(units: Vec<UnitVotingState>) -> (ReconciliationEngine, Voting) {
        let voting = make_voting();
        let mut engine = ReconciliationEngine::new();
        engine.load_snapshot(&make_snapshot(&voting, units));
        (engine, voting)
    }

    #[test]
    fn test_no_baseline_before_snapshot() {
        let engine = ReconciliationEngine::new();
        assert!(!engine.has_baseline());
        assert_eq!(engine.counters(), VoteCounters::default());
    }

    #[test]
    fn test_cast_is_idempotent() {
        let unit = make_unit("101", 30.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);
        let event = cast(&voting, &unit, "Sí", "#22c55e");

        assert_eq!(engine.apply_cast_event(&event), CastOutcome::Applied);
        let after_once = engine.snapshot_state();
        let counters_once = engine.counters();

        assert_eq!(engine.apply_cast_event(&event), CastOutcome::Duplicate);
        assert_eq!(engine.snapshot_state(), after_once);
        assert_eq!(engine.counters(), counters_once);
        assert_eq!(engine.counters().units_voted, 1);
    }

    #[test]
    fn test_invalid_event_does_not_regress_valid_state() {
        let unit = make_unit("101", 30.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);
        engine.apply_cast_event(&cast(&voting, &unit, "Sí", "#22c55e"));
        let before = engine.unit(&unit.property_unit_id).cloned().unwrap();

        let corrupt = cast(&voting, &unit, "undefined", "#22c55e");
        assert_eq!(engine.apply_cast_event(&corrupt), CastOutcome::Invalid);

        let after = engine.unit(&unit.property_unit_id).unwrap();
        assert_eq!(after, &before);
        assert_eq!(after.option_text.as_deref(), Some("Sí"));
        assert_eq!(after.color.as_deref(), Some("#22c55e"));
    }

    #[test]
    fn test_invalid_event_on_pending_unit_keeps_pending() {
        let unit = make_unit("102", 20.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);

        let mut corrupt = cast(&voting, &unit, "No", "null");
        corrupt.color = Some("null".to_string());
        assert_eq!(engine.apply_cast_event(&corrupt), CastOutcome::Invalid);
        assert_eq!(
            engine.unit(&unit.property_unit_id).unwrap().display_status(),
            UnitStatus::Pending
        );
        assert_eq!(engine.counters().units_pending, 1);
    }

    #[test]
    fn test_first_valid_vote_wins() {
        let unit = make_unit("103", 10.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);
        engine.apply_cast_event(&cast(&voting, &unit, "Sí", "#22c55e"));

        let late = cast(&voting, &unit, "No", "#ef4444");
        assert_eq!(engine.apply_cast_event(&late), CastOutcome::AlreadyVoted);
        assert_eq!(
            engine.unit(&unit.property_unit_id).unwrap().option_text.as_deref(),
            Some("Sí")
        );
        assert_eq!(engine.counters().units_voted, 1);
    }

    #[test]
    fn test_retract_then_recast() {
        let unit = make_unit("104", 25.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);
        let first = cast(&voting, &unit, "Sí", "#22c55e");
        engine.apply_cast_event(&first);

        let deleted = VoteDeletedEvent {
            id: first.id,
            property_unit_id: unit.property_unit_id,
        };
        assert_eq!(engine.apply_delete_event(&deleted), DeleteOutcome::Applied);

        let state = engine.unit(&unit.property_unit_id).unwrap();
        assert_eq!(state.display_status(), UnitStatus::Pending);
        assert!(state.option_text.is_none());
        assert!(state.option_code.is_none());
        assert!(state.color.is_none());
        assert_eq!(engine.counters().units_voted, 0);
        assert_eq!(engine.counters().units_pending, 1);

        let recast = cast(&voting, &unit, "No", "#ef4444");
        assert_eq!(engine.apply_cast_event(&recast), CastOutcome::Applied);
        let state = engine.unit(&unit.property_unit_id).unwrap();
        assert_eq!(state.option_text.as_deref(), Some("No"));
        assert_eq!(engine.counters().units_voted, 1);
    }

    #[test]
    fn test_duplicate_delete_ignored() {
        let unit = make_unit("105", 25.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);
        let first = cast(&voting, &unit, "Sí", "#22c55e");
        engine.apply_cast_event(&first);

        let deleted = VoteDeletedEvent {
            id: first.id,
            property_unit_id: unit.property_unit_id,
        };
        engine.apply_delete_event(&deleted);
        assert_eq!(engine.apply_delete_event(&deleted), DeleteOutcome::Duplicate);
        assert_eq!(engine.counters().units_pending, 1);
    }

    #[test]
    fn test_stale_delete_does_not_free_recast() {
        let unit = make_unit("106", 25.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);
        engine.apply_cast_event(&cast(&voting, &unit, "Sí", "#22c55e"));

        let stale = VoteDeletedEvent {
            id: Uuid::new_v4(),
            property_unit_id: unit.property_unit_id,
        };
        assert_eq!(engine.apply_delete_event(&stale), DeleteOutcome::Stale);
        assert_eq!(
            engine.unit(&unit.property_unit_id).unwrap().display_status(),
            UnitStatus::Voted
        );
    }

    #[test]
    fn test_delete_on_pending_unit_keeps_counters() {
        let unit = make_unit("107", 25.0);
        let other = make_unit("108", 75.0);
        let (mut engine, _) = engine_with(vec![unit.clone(), other]);

        let deleted = VoteDeletedEvent {
            id: Uuid::new_v4(),
            property_unit_id: unit.property_unit_id,
        };
        assert_eq!(engine.apply_delete_event(&deleted), DeleteOutcome::Applied);
        assert_eq!(engine.counters().units_voted, 0);
        assert_eq!(engine.counters().units_pending, 2);
    }

    #[test]
    fn test_wrong_voting_and_unknown_unit() {
        let unit = make_unit("109", 50.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);

        let mut foreign = cast(&voting, &unit, "Sí", "#22c55e");
        foreign.voting_id = Uuid::new_v4();
        assert_eq!(engine.apply_cast_event(&foreign), CastOutcome::WrongVoting);

        let stranger = make_unit("999", 1.0);
        let event = cast(&voting, &stranger, "Sí", "#22c55e");
        assert_eq!(engine.apply_cast_event(&event), CastOutcome::UnknownUnit);
        assert_eq!(engine.counters().units_voted, 0);
    }

    #[test]
    fn test_invalid_event_can_be_redelivered_complete() {
        let unit = make_unit("110", 50.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);

        let mut event = cast(&voting, &unit, "Sí", "#22c55e");
        event.option_text = Some("undefined".to_string());
        assert_eq!(engine.apply_cast_event(&event), CastOutcome::Invalid);

        event.option_text = Some("Sí".to_string());
        assert_eq!(engine.apply_cast_event(&event), CastOutcome::Applied);
    }

    #[test]
    fn test_snapshot_counts_corrupt_rows_as_pending() {
        let mut corrupt = make_unit("201", 40.0);
        corrupt.has_voted = true;
        corrupt.option_text = Some("Sí".to_string());
        corrupt.color = None;
        let pending = make_unit("202", 60.0);

        let (engine, _) = engine_with(vec![corrupt, pending]);
        assert_eq!(engine.counters().units_voted, 0);
        assert_eq!(engine.counters().units_pending, 2);
    }

    #[test]
    fn test_reload_repairs_corrupt_row_from_last_valid_vote() {
        let unit = make_unit("203", 40.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);
        let event = cast(&voting, &unit, "Sí", "#22c55e");
        engine.apply_cast_event(&event);

        let mut corrupt = unit.clone();
        corrupt.has_voted = true;
        corrupt.vote_id = Some(event.id);
        corrupt.option_text = Some("undefined".to_string());
        engine.load_snapshot(&make_snapshot(&voting, vec![corrupt]));

        let state = engine.unit(&unit.property_unit_id).unwrap();
        assert_eq!(state.option_text.as_deref(), Some("Sí"));
        assert_eq!(state.color.as_deref(), Some("#22c55e"));
        assert_eq!(engine.counters().units_voted, 1);
    }

    #[test]
    fn test_reload_keeps_applied_ids() {
        let unit = make_unit("204", 40.0);
        let (mut engine, voting) = engine_with(vec![unit.clone()]);
        let event = cast(&voting, &unit, "Sí", "#22c55e");
        engine.apply_cast_event(&event);

        engine.load_snapshot(&make_snapshot(&voting, vec![unit.clone()]));
        assert_eq!(engine.apply_cast_event(&event), CastOutcome::Duplicate);
    }

    #[test]
    fn test_voted_unit_ids() {
        let a = make_unit("A", 30.0);
        let b = make_unit("B", 70.0);
        let (mut engine, voting) = engine_with(vec![a.clone(), b.clone()]);
        engine.apply_cast_event(&cast(&voting, &a, "Sí", "#22c55e"));

        let voted = engine.voted_unit_ids();
        assert!(voted.contains(&a.property_unit_id));
        assert!(!voted.contains(&b.property_unit_id));
        assert_eq!(engine.snapshot_state()[0].unit_number, "A");
    }
}
