//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{UnitStatus, UnitVotingState};
use crate::reconcile::ReconciliationEngine;

/// Validate that the engine counters agree with its unit map
pub fn assert_engine_invariants(engine: &ReconciliationEngine) {
    let counters = engine.counters();

    debug_assert!(
        counters.units_voted + counters.units_pending == counters.total_units,
        "Counters out of balance: {} voted + {} pending != {} total",
        counters.units_voted,
        counters.units_pending,
        counters.total_units
    );

    if cfg!(debug_assertions) {
        let voted = engine
            .units()
            .filter(|u| u.display_status() == UnitStatus::Voted)
            .count();
        debug_assert!(
            voted == counters.units_voted,
            "Counter says {} voted but {} units display as voted",
            counters.units_voted,
            voted
        );
    }
}

/// Validate that a unit never shows a vote without option data
pub fn assert_unit_display_consistent(unit: &UnitVotingState) {
    debug_assert!(
        unit.display_status() == UnitStatus::Pending
            || (unit.option_text.is_some() && unit.color.is_some()),
        "Unit {} displays voted without option data",
        unit.unit_number
    );
}

/// Validate that a coefficient is a usable weight
pub fn assert_coefficient_valid(unit: &UnitVotingState) {
    debug_assert!(
        unit.coefficient.is_finite() && unit.coefficient >= 0.0,
        "Unit {} has invalid coefficient {}",
        unit.unit_number,
        unit.coefficient
    );
}
